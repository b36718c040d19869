//! Lifecycle governor.
//!
//! One engine drives create / read / update / delete / deactivate / reactivate for every
//! entity kind, parameterized by its [`EntityDescriptor`]. Entity states are `Active` and
//! `Inactive`; `activo` only changes through `deactivate` and `reactivate`.
//!
//! Checks are check-then-write and are not serialized across concurrent calls. Storage
//! constraint violations that slip past the pre-checks are mapped back to the same domain
//! errors the pre-checks produce.

use chrono::Utc;
use futures::future::try_join_all;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;

use crate::{
    db::traits::RecordStore,
    error::ConstraintKind,
    models::{DeleteOutcome, EntityKind, Record},
    services::descriptor::{render, DescriptorSet, EntityDescriptor, ParentRef},
    services::dependents::DependencyScanner,
    services::uniqueness::{scope_for, UniquenessChecker},
    Error, Result,
};

const ACTIVE_COLUMN: &str = "activo";

/// Columns owned by the governor; stripped from create and update payloads.
const AUDIT_COLUMNS: [&str; 5] = [
    ACTIVE_COLUMN,
    "fecha_creacion",
    "fecha_mod",
    "usuario_creacion",
    "usuario_mod",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WritePhase {
    Create,
    Update,
}

pub struct LifecycleGovernor {
    store: Arc<dyn RecordStore>,
    descriptors: Arc<DescriptorSet>,
    uniqueness: UniquenessChecker,
    dependents: DependencyScanner,
    default_actor: String,
}

impl LifecycleGovernor {
    pub fn new(
        store: Arc<dyn RecordStore>,
        descriptors: Arc<DescriptorSet>,
        default_actor: impl Into<String>,
    ) -> Self {
        Self {
            uniqueness: UniquenessChecker::new(store.clone()),
            dependents: DependencyScanner::new(store.clone()),
            store,
            descriptors,
            default_actor: default_actor.into(),
        }
    }

    pub fn descriptors(&self) -> &DescriptorSet {
        &self.descriptors
    }

    pub async fn create(
        &self,
        kind: EntityKind,
        input: Record,
        actor: Option<&str>,
    ) -> Result<Record> {
        let d = self.descriptor(kind)?;
        self.create_governed(d, input, &self.actor(actor))
            .await
            .map_err(|e| e.wrap_internal(&d.context("crear")))
    }

    pub async fn get(&self, kind: EntityKind, id: i64) -> Result<Record> {
        let d = self.descriptor(kind)?;
        self.fetch_hydrated(d, id)
            .await
            .map_err(|e| e.wrap_internal(&d.context("obtener")))
    }

    pub async fn update(
        &self,
        kind: EntityKind,
        id: i64,
        changes: Record,
        actor: Option<&str>,
    ) -> Result<Record> {
        let d = self.descriptor(kind)?;
        self.update_governed(d, id, changes, &self.actor(actor))
            .await
            .map_err(|e| e.wrap_internal(&d.context("actualizar")))
    }

    pub async fn delete(&self, kind: EntityKind, id: i64) -> Result<DeleteOutcome> {
        let d = self.descriptor(kind)?;
        self.delete_governed(d, id)
            .await
            .map_err(|e| e.wrap_internal(&d.context("eliminar")))
    }

    pub async fn deactivate(
        &self,
        kind: EntityKind,
        id: i64,
        actor: Option<&str>,
    ) -> Result<Record> {
        let d = self.descriptor(kind)?;
        self.deactivate_governed(d, id, &self.actor(actor))
            .await
            .map_err(|e| e.wrap_internal(&d.context("inactivar")))
    }

    pub async fn reactivate(
        &self,
        kind: EntityKind,
        id: i64,
        actor: Option<&str>,
    ) -> Result<Record> {
        let d = self.descriptor(kind)?;
        self.reactivate_governed(d, id, &self.actor(actor))
            .await
            .map_err(|e| e.wrap_internal(&d.context("reactivar")))
    }

    fn descriptor(&self, kind: EntityKind) -> Result<&EntityDescriptor> {
        self.descriptors
            .get(kind)
            .ok_or_else(|| Error::Internal(format!("No descriptor registered for {}", kind)))
    }

    fn actor(&self, actor: Option<&str>) -> String {
        actor
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .unwrap_or(&self.default_actor)
            .to_string()
    }

    async fn create_governed(
        &self,
        d: &EntityDescriptor,
        mut values: Record,
        actor: &str,
    ) -> Result<Record> {
        strip_governed_columns(d, &mut values);
        normalize_text(d, &mut values, true)?;
        for (column, default) in &d.defaults {
            if values.get(*column).map_or(true, JsonValue::is_null) {
                values.insert(column.to_string(), default.clone());
            }
        }

        for unique in &d.unique_scopes {
            let Some(scope) = scope_for(unique, &values) else {
                continue;
            };
            if self.uniqueness.has_conflict(&d.table, &scope, None).await? {
                tracing::debug!(entity = %d.kind, column = unique.column, "Create blocked: duplicate value");
                return Err(Error::Conflict(unique.create_message.to_string()));
            }
        }

        let mut parents = HashMap::new();
        for parent in &d.parents {
            let Some(parent_id) = int_value(&values, parent.fk_column) else {
                return Err(Error::NotFound(parent.missing_on_write.to_string()));
            };
            let row = self.resolve_parent(parent, parent_id).await?;
            if !is_active(&row) {
                tracing::debug!(entity = %d.kind, parent = %parent.kind, parent_id, "Create blocked: inactive parent");
                return Err(Error::BadRequest(parent.inactive_on_create.to_string()));
            }
            parents.insert(parent.kind, row);
        }
        self.check_consistency(d, &values, &parents).await?;

        let now = timestamp();
        values.insert(ACTIVE_COLUMN.to_string(), JsonValue::Bool(true));
        values.insert("fecha_creacion".to_string(), now.clone());
        values.insert("fecha_mod".to_string(), now);
        values.insert("usuario_creacion".to_string(), JsonValue::from(actor));

        let mut row = self
            .store
            .insert(&d.table, values)
            .await
            .map_err(|e| remap_write_error(d, e, WritePhase::Create))?;

        tracing::info!(
            entity = %d.kind,
            id = int_value(&row, &d.table.id_column).unwrap_or_default(),
            actor,
            "Created"
        );

        for parent in &d.parents {
            attach_summary(&mut row, parent, parents.get(&parent.kind));
        }
        Ok(row)
    }

    async fn update_governed(
        &self,
        d: &EntityDescriptor,
        id: i64,
        mut changes: Record,
        actor: &str,
    ) -> Result<Record> {
        let current = self.fetch(d, id).await?;
        strip_governed_columns(d, &mut changes);
        normalize_text(d, &mut changes, false)?;

        let mut effective = current.clone();
        effective.extend(changes.clone());

        for unique in &d.unique_scopes {
            let touched = changes_value(&current, &changes, unique.column, unique.normalized)
                || unique
                    .scoped_by
                    .map_or(false, |c| changes_value(&current, &changes, c, false));
            if !touched {
                continue;
            }
            let Some(scope) = scope_for(unique, &effective) else {
                continue;
            };
            if self.uniqueness.has_conflict(&d.table, &scope, Some(id)).await? {
                tracing::debug!(entity = %d.kind, id, column = unique.column, "Update blocked: duplicate value");
                return Err(Error::Conflict(unique.update_message.to_string()));
            }
        }

        let mut parents = HashMap::new();
        for parent in &d.parents {
            if !changes_value(&current, &changes, parent.fk_column, false) {
                continue;
            }
            let Some(parent_id) = int_value(&changes, parent.fk_column) else {
                continue;
            };
            let row = self.resolve_parent(parent, parent_id).await?;
            if !is_active(&row) {
                tracing::debug!(entity = %d.kind, id, parent = %parent.kind, parent_id, "Update blocked: inactive parent");
                return Err(Error::BadRequest(parent.inactive_on_update.to_string()));
            }
            parents.insert(parent.kind, row);
        }

        let consistency_touched = d.consistency.iter().any(|rule| {
            changes_value(&current, &changes, rule.local_column, false)
                || d.parent(rule.via)
                    .map_or(false, |p| changes_value(&current, &changes, p.fk_column, false))
        });
        if consistency_touched {
            self.check_consistency(d, &effective, &parents).await?;
        }

        changes.insert("fecha_mod".to_string(), timestamp());
        changes.insert("usuario_mod".to_string(), JsonValue::from(actor));
        self.store
            .update_fields(&d.table, id, changes)
            .await
            .map_err(|e| remap_write_error(d, e, WritePhase::Update))?;

        tracing::info!(entity = %d.kind, id, actor, "Updated");
        self.fetch_hydrated(d, id).await
    }

    async fn delete_governed(&self, d: &EntityDescriptor, id: i64) -> Result<DeleteOutcome> {
        self.fetch(d, id).await?;

        for owned in &d.owned_collections {
            if self
                .store
                .exists_filtered(owned.table, owned.fk_column, id, None)
                .await?
            {
                tracing::debug!(entity = %d.kind, id, table = owned.table, "Delete blocked: owned rows");
                return Err(Error::Conflict(owned.message.to_string()));
            }
        }

        if self
            .dependents
            .has_dependents(d.kind, id, &d.delete_dependents.tables)
            .await
        {
            tracing::debug!(entity = %d.kind, id, "Delete blocked: dependent rows");
            return Err(Error::Conflict(d.delete_dependents.message.to_string()));
        }

        match self.store.delete(&d.table, id).await {
            Ok(()) => {}
            Err(Error::Constraint(violation)) if violation.kind == ConstraintKind::ForeignKey => {
                tracing::debug!(entity = %d.kind, id, %violation, "Delete rejected by storage");
                return Err(Error::Conflict(
                    d.messages.delete_blocked_by_storage.to_string(),
                ));
            }
            Err(e) => return Err(e),
        }

        tracing::info!(entity = %d.kind, id, "Deleted");
        Ok(DeleteOutcome {
            mensaje: render(d.messages.deleted, id),
        })
    }

    async fn deactivate_governed(
        &self,
        d: &EntityDescriptor,
        id: i64,
        actor: &str,
    ) -> Result<Record> {
        let current = self.fetch(d, id).await?;
        if !is_active(&current) {
            return Err(Error::BadRequest(render(d.messages.already_inactive, id)));
        }
        if d.deactivate_checks_parents {
            self.ensure_parents_active(d, &current, |p| p.inactive_on_deactivate)
                .await?;
        }
        if self
            .dependents
            .has_dependents(d.kind, id, &d.deactivate_dependents.tables)
            .await
        {
            tracing::debug!(entity = %d.kind, id, "Deactivate blocked: dependent rows");
            return Err(Error::Conflict(d.deactivate_dependents.message.to_string()));
        }
        self.set_active(d, id, false, actor).await
    }

    async fn reactivate_governed(
        &self,
        d: &EntityDescriptor,
        id: i64,
        actor: &str,
    ) -> Result<Record> {
        let current = self.fetch(d, id).await?;
        if is_active(&current) {
            return Err(Error::BadRequest(render(d.messages.already_active, id)));
        }
        self.ensure_parents_active(d, &current, |p| p.inactive_on_reactivate)
            .await?;
        self.set_active(d, id, true, actor).await
    }

    async fn set_active(
        &self,
        d: &EntityDescriptor,
        id: i64,
        active: bool,
        actor: &str,
    ) -> Result<Record> {
        let mut changes = Record::new();
        changes.insert(ACTIVE_COLUMN.to_string(), JsonValue::Bool(active));
        changes.insert("fecha_mod".to_string(), timestamp());
        changes.insert("usuario_mod".to_string(), JsonValue::from(actor));
        self.store.update_fields(&d.table, id, changes).await?;

        if active {
            tracing::info!(entity = %d.kind, id, actor, "Reactivated");
        } else {
            tracing::info!(entity = %d.kind, id, actor, "Deactivated");
        }
        self.fetch_hydrated(d, id).await
    }

    /// Fail with the message `pick` returns for the first inactive parent.
    async fn ensure_parents_active(
        &self,
        d: &EntityDescriptor,
        row: &Record,
        pick: impl Fn(&ParentRef) -> Option<&'static str>,
    ) -> Result<()> {
        for parent in &d.parents {
            let Some(message) = pick(parent) else {
                continue;
            };
            let Some(parent_id) = int_value(row, parent.fk_column) else {
                continue;
            };
            let parent_table = &self.descriptor(parent.kind)?.table;
            if let Some(parent_row) = self.store.find_by_id(parent_table, parent_id).await? {
                if !is_active(&parent_row) {
                    tracing::debug!(entity = %d.kind, parent = %parent.kind, parent_id, "Transition blocked: inactive parent");
                    return Err(Error::BadRequest(message.to_string()));
                }
            }
        }
        Ok(())
    }

    async fn check_consistency(
        &self,
        d: &EntityDescriptor,
        effective: &Record,
        resolved: &HashMap<EntityKind, Record>,
    ) -> Result<()> {
        for rule in &d.consistency {
            let parent = d.parent(rule.via).ok_or_else(|| {
                Error::Internal(format!("{}: undeclared parent {}", d.kind, rule.via))
            })?;
            let Some(parent_id) = int_value(effective, parent.fk_column) else {
                continue;
            };
            let fetched;
            let parent_row = match resolved.get(&rule.via) {
                Some(row) => row,
                None => {
                    fetched = self.resolve_parent(parent, parent_id).await?;
                    &fetched
                }
            };
            if parent_row.get(rule.parent_column) != effective.get(rule.local_column) {
                return Err(Error::BadRequest(rule.message.to_string()));
            }
        }
        Ok(())
    }

    async fn resolve_parent(&self, parent: &ParentRef, id: i64) -> Result<Record> {
        let pd = self.descriptor(parent.kind)?;
        self.store
            .find_by_id(&pd.table, id)
            .await?
            .ok_or_else(|| Error::NotFound(render(pd.messages.not_found, id)))
    }

    async fn fetch(&self, d: &EntityDescriptor, id: i64) -> Result<Record> {
        self.store
            .find_by_id(&d.table, id)
            .await?
            .ok_or_else(|| Error::NotFound(render(d.messages.not_found, id)))
    }

    /// Fetch a row and attach the summaries of its parents.
    async fn fetch_hydrated(&self, d: &EntityDescriptor, id: i64) -> Result<Record> {
        let mut row = self.fetch(d, id).await?;

        let lookups = d.parents.iter().map(|parent| {
            let row = &row;
            async move {
                let found = match int_value(row, parent.fk_column) {
                    Some(parent_id) => {
                        let table = &self.descriptor(parent.kind)?.table;
                        self.store.find_by_id(table, parent_id).await?
                    }
                    None => None,
                };
                Ok::<_, Error>(found)
            }
        });
        let found = try_join_all(lookups).await?;

        for (parent, parent_row) in d.parents.iter().zip(found) {
            attach_summary(&mut row, parent, parent_row.as_ref());
        }
        Ok(row)
    }
}

fn timestamp() -> JsonValue {
    JsonValue::from(Utc::now().to_rfc3339())
}

fn is_active(row: &Record) -> bool {
    row.get(ACTIVE_COLUMN)
        .and_then(JsonValue::as_bool)
        .unwrap_or(false)
}

fn int_value(row: &Record, column: &str) -> Option<i64> {
    row.get(column).and_then(JsonValue::as_i64)
}

fn strip_governed_columns(d: &EntityDescriptor, values: &mut Record) {
    values.remove(&d.table.id_column);
    for column in AUDIT_COLUMNS {
        values.remove(column);
    }
}

/// Trim text fields. Empty required fields are rejected; empty optional fields become NULL.
/// On create, absent fields are treated as empty.
fn normalize_text(d: &EntityDescriptor, values: &mut Record, creating: bool) -> Result<()> {
    for field in &d.text_fields {
        let text = match values.get(field.column) {
            Some(JsonValue::String(s)) => Some(s.trim().to_string()),
            Some(JsonValue::Null) => None,
            Some(_) => continue,
            None if creating => None,
            None => continue,
        };
        match (text.filter(|t| !t.is_empty()), field.required_message(creating)) {
            (Some(text), _) => {
                values.insert(field.column.to_string(), JsonValue::String(text));
            }
            (None, Some(message)) => return Err(Error::BadRequest(message.to_string())),
            (None, None) => {
                values.insert(field.column.to_string(), JsonValue::Null);
            }
        }
    }
    Ok(())
}

/// Whether `changes` carries a value for `column` different from `current`.
fn changes_value(current: &Record, changes: &Record, column: &str, normalized: bool) -> bool {
    let Some(next) = changes.get(column) else {
        return false;
    };
    let previous = current.get(column).unwrap_or(&JsonValue::Null);
    match (normalized, next, previous) {
        (true, JsonValue::String(a), JsonValue::String(b)) => {
            a.trim().to_lowercase() != b.trim().to_lowercase()
        }
        _ => next != previous,
    }
}

fn attach_summary(row: &mut Record, parent: &ParentRef, parent_row: Option<&Record>) {
    for (column, output) in &parent.summary {
        let value = parent_row
            .and_then(|r| r.get(*column))
            .cloned()
            .unwrap_or(JsonValue::Null);
        row.insert(output.to_string(), value);
    }
}

/// Map a storage constraint violation back to the domain error its pre-check would raise.
/// Unrecognized violations pass through and surface as internal errors.
fn remap_write_error(d: &EntityDescriptor, error: Error, phase: WritePhase) -> Error {
    let Error::Constraint(violation) = error else {
        return error;
    };
    let mapped = match violation.kind {
        ConstraintKind::Unique => d
            .unique_scopes
            .iter()
            .find(|u| violation.mentions(u.column))
            .map(|u| match phase {
                WritePhase::Create => Error::Conflict(u.create_message.to_string()),
                WritePhase::Update => Error::Conflict(u.update_message.to_string()),
            }),
        ConstraintKind::ForeignKey => d
            .parents
            .iter()
            .find(|p| violation.mentions(p.fk_column))
            .map(|p| Error::NotFound(p.missing_on_write.to_string())),
    };
    mapped.unwrap_or(Error::Constraint(violation))
}
