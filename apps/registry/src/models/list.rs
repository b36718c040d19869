use serde::{Deserialize, Serialize};

/// Declarative list request: pagination, entity-specific filters, sort.
///
/// Accepts both English keys and the `paginacion`/`filtros`/`ordenamiento` spelling.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListRequest<F> {
    #[serde(default, alias = "paginacion")]
    pub pagination: PaginationParams,
    #[serde(default, alias = "filtros")]
    pub filters: F,
    #[serde(default, alias = "ordenamiento")]
    pub sort: Option<SortParams>,
}

impl<F: Default> ListRequest<F> {
    pub fn with_filters(filters: F) -> Self {
        Self {
            pagination: PaginationParams::default(),
            filters,
            sort: None,
        }
    }

    pub fn page(mut self, page: i64, limit: i64) -> Self {
        self.pagination.page = Some(page);
        self.pagination.limit = Some(limit);
        self
    }

    pub fn sorted_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sort = Some(SortParams {
            field: field.into(),
            direction,
        });
        self
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaginationParams {
    #[serde(default, alias = "pagina")]
    pub page: Option<i64>,
    #[serde(default, alias = "limite")]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SortParams {
    #[serde(alias = "campo")]
    pub field: String,
    #[serde(default, alias = "direccion")]
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    #[serde(alias = "ASC")]
    Asc,
    #[serde(alias = "DESC")]
    Desc,
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

/// Confirmation returned by hard deletes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteOutcome {
    pub mensaje: String,
}
