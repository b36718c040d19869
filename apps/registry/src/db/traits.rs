//! Record store trait definition

use super::query::{PageQuery, ScopeField, TableRef};
use crate::models::Record;
use crate::Result;
use async_trait::async_trait;

/// Abstract interface over a table-per-entity relational store.
///
/// Write operations report storage constraint failures as `Error::Constraint` so callers can
/// map them back to domain errors.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch one row by primary key.
    async fn find_by_id(&self, table: &TableRef, id: i64) -> Result<Option<Record>>;

    /// Find any row matching every scope field, optionally excluding one id.
    async fn find_by_scope(
        &self,
        table: &TableRef,
        scope: &[ScopeField],
        exclude_id: Option<i64>,
    ) -> Result<Option<Record>>;

    /// Whether `table` holds a row with `fk_column = id` (and `active_column = true` if given).
    async fn exists_filtered(
        &self,
        table: &str,
        fk_column: &str,
        id: i64,
        active_column: Option<&str>,
    ) -> Result<bool>;

    /// Schema lookup: does the table exist.
    async fn table_exists(&self, table: &str) -> Result<bool>;

    /// Schema lookup: does the table have the column.
    async fn column_exists(&self, table: &str, column: &str) -> Result<bool>;

    /// Insert a row and return it as stored (with its generated id).
    async fn insert(&self, table: &TableRef, values: Record) -> Result<Record>;

    async fn update_fields(&self, table: &TableRef, id: i64, values: Record) -> Result<()>;

    async fn delete(&self, table: &TableRef, id: i64) -> Result<()>;

    /// Filtered, sorted page plus the total count of the filtered set.
    async fn query_page(&self, table: &TableRef, query: &PageQuery) -> Result<(Vec<Record>, i64)>;
}
