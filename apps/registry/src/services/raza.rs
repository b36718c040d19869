//! Breed service.

use std::sync::Arc;

use crate::{
    db::query::{ColumnRef, Filter, FilterValue},
    models::{
        to_record, DeleteOutcome, EntityKind, ListRequest, Page, Raza, RazaCreate, RazaFilters,
        RazaUpdate,
    },
    services::{typed_page, LifecycleGovernor, ListFilters, QueryComposer},
    Result,
};

const KIND: EntityKind = EntityKind::Raza;

#[derive(Clone)]
pub struct RazaService {
    governor: Arc<LifecycleGovernor>,
    composer: Arc<QueryComposer>,
}

impl RazaService {
    pub fn new(governor: Arc<LifecycleGovernor>, composer: Arc<QueryComposer>) -> Self {
        Self { governor, composer }
    }

    /// Create a breed under an active species. Names are unique per species.
    pub async fn create(&self, input: RazaCreate, actor: Option<&str>) -> Result<Raza> {
        let record = self.governor.create(KIND, to_record(&input)?, actor).await?;
        Raza::try_from(record)
    }

    pub async fn get(&self, id: i64) -> Result<Raza> {
        Raza::try_from(self.governor.get(KIND, id).await?)
    }

    pub async fn update(&self, id: i64, changes: RazaUpdate, actor: Option<&str>) -> Result<Raza> {
        let record = self
            .governor
            .update(KIND, id, to_record(&changes)?, actor)
            .await?;
        Raza::try_from(record)
    }

    pub async fn delete(&self, id: i64) -> Result<DeleteOutcome> {
        self.governor.delete(KIND, id).await
    }

    pub async fn deactivate(&self, id: i64, actor: Option<&str>) -> Result<Raza> {
        Raza::try_from(self.governor.deactivate(KIND, id, actor).await?)
    }

    pub async fn reactivate(&self, id: i64, actor: Option<&str>) -> Result<Raza> {
        Raza::try_from(self.governor.reactivate(KIND, id, actor).await?)
    }

    pub async fn list(&self, request: &ListRequest<RazaFilters>) -> Result<Page<Raza>> {
        let page = self.composer.list(KIND, request).await?;
        typed_page(page, Raza::try_from)
    }

    /// Active breeds of one species, by name.
    pub async fn list_by_especie(&self, especie_id: i64) -> Result<Vec<Raza>> {
        self.composer
            .list_owned(KIND, EntityKind::Especie, especie_id)
            .await?
            .into_iter()
            .map(Raza::try_from)
            .collect()
    }
}

impl ListFilters for RazaFilters {
    fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    fn activo(&self) -> Option<bool> {
        self.activo
    }

    fn predicates(&self) -> Vec<Filter> {
        self.especie_id
            .map(|id| Filter::Eq {
                column: ColumnRef::base("especie_id"),
                value: FilterValue::Int(id),
            })
            .into_iter()
            .collect()
    }
}
