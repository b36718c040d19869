//! Dependent-table scanning.
//!
//! Dependent tables are not modeled relations: they may or may not exist in a given
//! deployment, and only some of them carry an `activo` flag. Both facts are discovered with
//! schema lookups on every scan.

use crate::{
    db::traits::RecordStore, models::EntityKind, services::descriptor::DependentTable, Result,
};
use std::sync::Arc;

const ACTIVE_COLUMN: &str = "activo";

#[derive(Clone)]
pub struct DependencyScanner {
    store: Arc<dyn RecordStore>,
}

impl DependencyScanner {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Whether any of `tables` references `id`.
    ///
    /// Fails open per table: a table whose check errors is logged and treated as holding no
    /// dependents, and the scan moves on to the next one.
    pub async fn has_dependents(
        &self,
        entity: EntityKind,
        id: i64,
        tables: &[DependentTable],
    ) -> bool {
        for dependent in tables {
            match self.check_table(entity, id, dependent).await {
                Ok(true) => {
                    tracing::debug!(
                        entity = %entity,
                        id,
                        table = dependent.table,
                        "Found dependent rows"
                    );
                    return true;
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(
                        entity = %entity,
                        id,
                        table = dependent.table,
                        error = %e,
                        "Dependent-table check failed; skipping table"
                    );
                }
            }
        }
        false
    }

    async fn check_table(
        &self,
        entity: EntityKind,
        id: i64,
        dependent: &DependentTable,
    ) -> Result<bool> {
        if !self.store.table_exists(dependent.table).await? {
            tracing::debug!(
                entity = %entity,
                table = dependent.table,
                "Dependent table not present; skipping"
            );
            return Ok(false);
        }

        let active_column = if dependent.active_only {
            let has_flag = self
                .store
                .column_exists(dependent.table, ACTIVE_COLUMN)
                .await?;
            tracing::debug!(
                table = dependent.table,
                has_flag,
                "Checked dependent table for an active flag"
            );
            has_flag.then_some(ACTIVE_COLUMN)
        } else {
            None
        };

        self.store
            .exists_filtered(dependent.table, dependent.fk_column, id, active_column)
            .await
    }
}
