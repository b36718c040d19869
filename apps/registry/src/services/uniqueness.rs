//! Pre-write uniqueness checks.

use crate::{
    db::query::{FilterValue, ScopeField, TableRef},
    db::traits::RecordStore,
    models::Record,
    services::descriptor::UniqueScope,
    Result,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct UniquenessChecker {
    store: Arc<dyn RecordStore>,
}

impl UniquenessChecker {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Whether a row other than `exclude_id` already holds every value of `scope`.
    pub async fn has_conflict(
        &self,
        table: &TableRef,
        scope: &[ScopeField],
        exclude_id: Option<i64>,
    ) -> Result<bool> {
        if scope.is_empty() {
            return Ok(false);
        }
        let existing = self.store.find_by_scope(table, scope, exclude_id).await?;
        Ok(existing.is_some())
    }
}

/// Build the lookup for `unique` from a candidate row.
///
/// Returns `None` when the unique column (or its scoping column) is NULL or missing: absent
/// values never conflict.
pub(crate) fn scope_for(unique: &UniqueScope, values: &Record) -> Option<Vec<ScopeField>> {
    let value = FilterValue::from_json(values.get(unique.column)?)?;
    let mut scope = vec![ScopeField {
        column: unique.column.to_string(),
        value,
        normalized: unique.normalized,
    }];
    if let Some(column) = unique.scoped_by {
        scope.push(ScopeField {
            column: column.to_string(),
            value: FilterValue::from_json(values.get(column)?)?,
            normalized: false,
        });
    }
    Some(scope)
}
