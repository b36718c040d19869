//! Business logic layer
//!
//! The lifecycle governor and query composer are generic over entity descriptors; the
//! per-entity services wrap them with typed payloads and responses.

pub mod cliente;
pub mod dependents;
pub mod descriptor;
pub mod especie;
pub mod lifecycle;
pub mod mascota;
pub mod query;
pub mod raza;
pub mod uniqueness;

pub use cliente::ClienteService;
pub use dependents::DependencyScanner;
pub use descriptor::{DescriptorSet, EntityDescriptor};
pub use especie::EspecieService;
pub use lifecycle::LifecycleGovernor;
pub use mascota::MascotaService;
pub use query::{ListFilters, QueryComposer};
pub use raza::RazaService;
pub use uniqueness::UniquenessChecker;

use crate::{
    models::{Page, Record},
    Result,
};

/// Convert every row of a page, failing on the first malformed one.
pub(crate) fn typed_page<T>(
    page: Page<Record>,
    convert: impl Fn(Record) -> Result<T>,
) -> Result<Page<T>> {
    let data = page
        .data
        .into_iter()
        .map(convert)
        .collect::<Result<Vec<_>>>()?;
    Ok(Page {
        data,
        pagination: page.pagination,
    })
}
