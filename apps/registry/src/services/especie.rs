//! Species service.

use std::sync::Arc;

use crate::{
    db::query::Filter,
    models::{
        from_record, to_record, DeleteOutcome, EntityKind, Especie, EspecieCreate, EspecieFilters,
        EspecieUpdate, ListRequest, Page,
    },
    services::{typed_page, LifecycleGovernor, ListFilters, QueryComposer},
    Result,
};

const KIND: EntityKind = EntityKind::Especie;

#[derive(Clone)]
pub struct EspecieService {
    governor: Arc<LifecycleGovernor>,
    composer: Arc<QueryComposer>,
}

impl EspecieService {
    pub fn new(governor: Arc<LifecycleGovernor>, composer: Arc<QueryComposer>) -> Self {
        Self { governor, composer }
    }

    pub async fn create(&self, input: EspecieCreate, actor: Option<&str>) -> Result<Especie> {
        let record = self.governor.create(KIND, to_record(&input)?, actor).await?;
        from_record(record)
    }

    pub async fn get(&self, id: i64) -> Result<Especie> {
        from_record(self.governor.get(KIND, id).await?)
    }

    pub async fn update(
        &self,
        id: i64,
        changes: EspecieUpdate,
        actor: Option<&str>,
    ) -> Result<Especie> {
        let record = self
            .governor
            .update(KIND, id, to_record(&changes)?, actor)
            .await?;
        from_record(record)
    }

    /// Hard delete. Refused while the species owns breeds or pets.
    pub async fn delete(&self, id: i64) -> Result<DeleteOutcome> {
        self.governor.delete(KIND, id).await
    }

    pub async fn deactivate(&self, id: i64, actor: Option<&str>) -> Result<Especie> {
        from_record(self.governor.deactivate(KIND, id, actor).await?)
    }

    pub async fn reactivate(&self, id: i64, actor: Option<&str>) -> Result<Especie> {
        from_record(self.governor.reactivate(KIND, id, actor).await?)
    }

    pub async fn list(&self, request: &ListRequest<EspecieFilters>) -> Result<Page<Especie>> {
        let page = self.composer.list(KIND, request).await?;
        typed_page(page, from_record)
    }
}

impl ListFilters for EspecieFilters {
    fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    fn activo(&self) -> Option<bool> {
        self.activo
    }

    fn predicates(&self) -> Vec<Filter> {
        Vec::new()
    }
}
