//! Pet service.

use std::sync::Arc;

use crate::{
    db::query::{ColumnRef, Filter, FilterValue},
    models::{
        from_record, to_record, DeleteOutcome, EntityKind, ListRequest, Mascota, MascotaCreate,
        MascotaFilters, MascotaSummary, MascotaUpdate, Page,
    },
    services::{typed_page, LifecycleGovernor, ListFilters, QueryComposer},
    Result,
};

const KIND: EntityKind = EntityKind::Mascota;

#[derive(Clone)]
pub struct MascotaService {
    governor: Arc<LifecycleGovernor>,
    composer: Arc<QueryComposer>,
}

impl MascotaService {
    pub fn new(governor: Arc<LifecycleGovernor>, composer: Arc<QueryComposer>) -> Self {
        Self { governor, composer }
    }

    /// Create a pet for an active client, species and breed. The breed must belong to the
    /// species.
    pub async fn create(&self, input: MascotaCreate, actor: Option<&str>) -> Result<Mascota> {
        let record = self.governor.create(KIND, to_record(&input)?, actor).await?;
        Mascota::try_from(record)
    }

    pub async fn get(&self, id: i64) -> Result<Mascota> {
        Mascota::try_from(self.governor.get(KIND, id).await?)
    }

    pub async fn update(
        &self,
        id: i64,
        changes: MascotaUpdate,
        actor: Option<&str>,
    ) -> Result<Mascota> {
        let record = self
            .governor
            .update(KIND, id, to_record(&changes)?, actor)
            .await?;
        Mascota::try_from(record)
    }

    pub async fn delete(&self, id: i64) -> Result<DeleteOutcome> {
        self.governor.delete(KIND, id).await
    }

    pub async fn deactivate(&self, id: i64, actor: Option<&str>) -> Result<Mascota> {
        Mascota::try_from(self.governor.deactivate(KIND, id, actor).await?)
    }

    pub async fn reactivate(&self, id: i64, actor: Option<&str>) -> Result<Mascota> {
        Mascota::try_from(self.governor.reactivate(KIND, id, actor).await?)
    }

    pub async fn list(&self, request: &ListRequest<MascotaFilters>) -> Result<Page<Mascota>> {
        let page = self.composer.list(KIND, request).await?;
        typed_page(page, Mascota::try_from)
    }

    /// Active pets of one client, by name.
    pub async fn list_by_cliente(&self, cliente_id: i64) -> Result<Vec<MascotaSummary>> {
        self.composer
            .list_owned(KIND, EntityKind::Cliente, cliente_id)
            .await?
            .into_iter()
            .map(from_record)
            .collect()
    }
}

impl ListFilters for MascotaFilters {
    fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    fn activo(&self) -> Option<bool> {
        self.activo
    }

    fn predicates(&self) -> Vec<Filter> {
        let ids = [
            ("cliente_id", self.cliente_id),
            ("especie_id", self.especie_id),
            ("raza_id", self.raza_id),
        ];
        let mut filters: Vec<Filter> = ids
            .into_iter()
            .filter_map(|(column, id)| {
                id.map(|id| Filter::Eq {
                    column: ColumnRef::base(column),
                    value: FilterValue::Int(id),
                })
            })
            .collect();

        if let Some(sexo) = self.sexo {
            filters.push(Filter::Eq {
                column: ColumnRef::base("sexo"),
                value: FilterValue::Text(sexo.as_str().to_string()),
            });
        }
        if let Some(chip) = &self.chip {
            filters.push(Filter::Contains {
                column: ColumnRef::base("chip"),
                needle: chip.clone(),
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
