//! Client service.

use std::sync::Arc;

use crate::{
    db::query::{ColumnRef, Filter, FilterValue},
    models::{
        from_record, to_record, Cliente, ClienteCreate, ClienteFilters, ClienteUpdate,
        DeleteOutcome, EntityKind, ListRequest, Page,
    },
    services::{typed_page, LifecycleGovernor, ListFilters, QueryComposer},
    Result,
};

const KIND: EntityKind = EntityKind::Cliente;

#[derive(Clone)]
pub struct ClienteService {
    governor: Arc<LifecycleGovernor>,
    composer: Arc<QueryComposer>,
}

impl ClienteService {
    pub fn new(governor: Arc<LifecycleGovernor>, composer: Arc<QueryComposer>) -> Self {
        Self { governor, composer }
    }

    pub async fn create(&self, input: ClienteCreate, actor: Option<&str>) -> Result<Cliente> {
        let record = self.governor.create(KIND, to_record(&input)?, actor).await?;
        from_record(record)
    }

    pub async fn get(&self, id: i64) -> Result<Cliente> {
        from_record(self.governor.get(KIND, id).await?)
    }

    pub async fn update(
        &self,
        id: i64,
        changes: ClienteUpdate,
        actor: Option<&str>,
    ) -> Result<Cliente> {
        let record = self
            .governor
            .update(KIND, id, to_record(&changes)?, actor)
            .await?;
        from_record(record)
    }

    /// Hard delete. Refused while invoices, pets or quotes reference the client.
    pub async fn delete(&self, id: i64) -> Result<DeleteOutcome> {
        self.governor.delete(KIND, id).await
    }

    /// Refused while any referencing row exists, active or not.
    pub async fn deactivate(&self, id: i64, actor: Option<&str>) -> Result<Cliente> {
        from_record(self.governor.deactivate(KIND, id, actor).await?)
    }

    pub async fn reactivate(&self, id: i64, actor: Option<&str>) -> Result<Cliente> {
        from_record(self.governor.reactivate(KIND, id, actor).await?)
    }

    pub async fn list(&self, request: &ListRequest<ClienteFilters>) -> Result<Page<Cliente>> {
        let page = self.composer.list(KIND, request).await?;
        typed_page(page, from_record)
    }
}

impl ListFilters for ClienteFilters {
    fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    fn activo(&self) -> Option<bool> {
        self.activo
    }

    fn predicates(&self) -> Vec<Filter> {
        let mut filters = Vec::new();
        if let Some(cedula) = &self.cedula {
            filters.push(Filter::Eq {
                column: ColumnRef::base("cedula"),
                value: FilterValue::Text(cedula.clone()),
            });
        }
        if let Some(ruc) = &self.ruc {
            filters.push(Filter::Eq {
                column: ColumnRef::base("ruc"),
                value: FilterValue::Text(ruc.clone()),
            });
        }
        if let Some(telefono) = &self.telefono {
            filters.push(Filter::Contains {
                column: ColumnRef::base("telefono"),
                needle: telefono.clone(),
            });
        }
        if let Some(direccion) = &self.direccion {
            filters.push(Filter::Contains {
                column: ColumnRef::base("direccion"),
                needle: direccion.clone(),
            });
        }
        if self.fecha_nacimiento_desde.is_some() || self.fecha_nacimiento_hasta.is_some() {
            filters.push(Filter::Range {
                column: ColumnRef::base("fecha_nacimiento"),
                from: self.fecha_nacimiento_desde.map(FilterValue::Date),
                to: self.fecha_nacimiento_hasta.map(FilterValue::Date),
            });
        }
        filters
    }
}
