//! Query composer: declarative list requests to filtered, sorted, paginated reads.

use std::sync::Arc;

use crate::{
    config::RegistryConfig,
    db::query::{ColumnRef, Filter, FilterValue, Join, PageQuery, Projection, SortSpec},
    db::traits::RecordStore,
    models::{EntityKind, ListRequest, Page, PaginationMeta, PaginationParams, Record, SortDirection},
    services::descriptor::{render, DescriptorSet, EntityDescriptor},
    Error, Result,
};

/// Entity-specific filter payloads.
pub trait ListFilters {
    /// Free-text term matched against the entity's search columns.
    fn search(&self) -> Option<&str>;

    /// Requested `activo` value; `None` lists active rows only.
    fn activo(&self) -> Option<bool>;

    /// Exact, substring and range predicates beyond search and `activo`.
    fn predicates(&self) -> Vec<Filter>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Window {
    pub page: i64,
    pub limit: i64,
    pub offset: i64,
}

pub struct QueryComposer {
    store: Arc<dyn RecordStore>,
    descriptors: Arc<DescriptorSet>,
    default_limit: i64,
    max_limit: i64,
}

impl QueryComposer {
    pub fn new(
        store: Arc<dyn RecordStore>,
        descriptors: Arc<DescriptorSet>,
        config: &RegistryConfig,
    ) -> Self {
        Self {
            store,
            descriptors,
            default_limit: config.default_page_limit,
            max_limit: config.max_page_limit,
        }
    }

    pub async fn list<F: ListFilters>(
        &self,
        kind: EntityKind,
        request: &ListRequest<F>,
    ) -> Result<Page<Record>> {
        let d = self.descriptor(kind)?;
        self.list_inner(d, request)
            .await
            .map_err(|e| e.wrap_internal(&format!("Error al listar {}", d.plural)))
    }

    /// Active rows of `kind` owned by one parent, ordered by name. Fails NotFound when the
    /// parent does not exist.
    pub async fn list_owned(
        &self,
        kind: EntityKind,
        parent: EntityKind,
        parent_id: i64,
    ) -> Result<Vec<Record>> {
        let d = self.descriptor(kind)?;
        let pd = self.descriptor(parent)?;
        let context = format!("Error al obtener {} por {}", d.plural, pd.label);
        self.list_owned_inner(d, pd, parent_id)
            .await
            .map_err(|e| e.wrap_internal(&context))
    }

    fn descriptor(&self, kind: EntityKind) -> Result<&EntityDescriptor> {
        self.descriptors
            .get(kind)
            .ok_or_else(|| Error::Internal(format!("No descriptor registered for {}", kind)))
    }

    async fn list_inner<F: ListFilters>(
        &self,
        d: &EntityDescriptor,
        request: &ListRequest<F>,
    ) -> Result<Page<Record>> {
        let window = self.window(&request.pagination);

        let mut query = self.base_query(d)?;
        query.filters.push(Filter::Eq {
            column: ColumnRef::base("activo"),
            value: FilterValue::Bool(request.filters.activo().unwrap_or(true)),
        });
        if let Some(term) = request.filters.search().map(str::trim).filter(|t| !t.is_empty()) {
            query.filters.push(Filter::AnyContains {
                columns: d.search_columns.clone(),
                needle: term.to_string(),
            });
        }
        query.filters.extend(request.filters.predicates());

        let (column, direction) = match &request.sort {
            Some(sort) => match d.sort_column(&sort.field) {
                Some(column) => (column.clone(), sort.direction),
                None => (ColumnRef::base(d.name_column), sort.direction),
            },
            None => (ColumnRef::base(d.name_column), SortDirection::Asc),
        };
        query.sort = Some(SortSpec { column, direction });
        query.offset = window.offset;
        query.limit = Some(window.limit);

        let (data, total) = self.store.query_page(&d.table, &query).await?;

        Ok(Page {
            data,
            pagination: PaginationMeta {
                page: window.page,
                limit: window.limit,
                total,
                total_pages: total_pages(total, window.limit),
            },
        })
    }

    async fn list_owned_inner(
        &self,
        d: &EntityDescriptor,
        pd: &EntityDescriptor,
        parent_id: i64,
    ) -> Result<Vec<Record>> {
        let parent = d.parent(pd.kind).ok_or_else(|| {
            Error::Internal(format!("{} is not a parent of {}", pd.kind, d.kind))
        })?;
        if self.store.find_by_id(&pd.table, parent_id).await?.is_none() {
            return Err(Error::NotFound(render(pd.messages.not_found, parent_id)));
        }

        let mut query = self.base_query(d)?;
        query.filters.push(Filter::Eq {
            column: ColumnRef::base(parent.fk_column),
            value: FilterValue::Int(parent_id),
        });
        query.filters.push(Filter::Eq {
            column: ColumnRef::base("activo"),
            value: FilterValue::Bool(true),
        });
        query.sort = Some(SortSpec {
            column: ColumnRef::base(d.name_column),
            direction: SortDirection::Asc,
        });

        let (rows, _) = self.store.query_page(&d.table, &query).await?;
        Ok(rows)
    }

    /// Joins and summary projections for every declared parent.
    fn base_query(&self, d: &EntityDescriptor) -> Result<PageQuery> {
        let mut query = PageQuery::default();
        for parent in &d.parents {
            let alias = parent.kind.as_str();
            query.joins.push(Join {
                alias: alias.to_string(),
                table: self.descriptor(parent.kind)?.table.clone(),
                fk_column: parent.fk_column.to_string(),
            });
            query
                .projections
                .extend(parent.summary.iter().map(|(column, output)| Projection {
                    column: ColumnRef::joined(alias, *column),
                    output: output.to_string(),
                }));
        }
        Ok(query)
    }

    pub(crate) fn window(&self, params: &PaginationParams) -> Window {
        let page = params.page.filter(|p| *p >= 1).unwrap_or(1);
        let limit = params
            .limit
            .filter(|l| *l >= 1)
            .unwrap_or(self.default_limit)
            .min(self.max_limit);
        let offset = params
            .offset
            .filter(|o| *o >= 0)
            .unwrap_or_else(|| (page - 1).saturating_mul(limit));
        Window {
            page,
            limit,
            offset,
        }
    }
}

fn total_pages(total: i64, limit: i64) -> i64 {
    if limit <= 0 {
        return 0;
    }
    (total + limit - 1) / limit
}
