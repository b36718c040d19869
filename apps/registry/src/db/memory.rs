//! In-process `RecordStore` implementation.
//!
//! Mirrors the relational behavior the services rely on: generated ids, unique indexes
//! (optionally trim/case-normalized), foreign keys that reject dangling writes and referenced
//! deletes, schema lookups, and joined paged reads.
//!
//! Primary use-case: deterministic tests of the governed services without a database.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use crate::{
    db::query::{ColumnRef, Filter, FilterValue, PageQuery, ScopeField, TableRef},
    db::traits::RecordStore,
    error::ConstraintViolation,
    models::{Record, SortDirection},
    Error, Result,
};

const AUDIT_COLUMNS: [&str; 5] = [
    "activo",
    "usuario_creacion",
    "fecha_creacion",
    "usuario_mod",
    "fecha_mod",
];

/// Schema of one in-memory table.
#[derive(Debug, Clone)]
pub struct TableDef {
    name: String,
    id_column: String,
    columns: Vec<String>,
    unique: Vec<UniqueIndex>,
    foreign_keys: Vec<ForeignKey>,
}

#[derive(Debug, Clone)]
struct UniqueIndex {
    name: String,
    /// `(column, normalized)`
    columns: Vec<(String, bool)>,
}

#[derive(Debug, Clone)]
struct ForeignKey {
    column: String,
    references: String,
}

impl TableDef {
    pub fn new(name: &str, id_column: &str) -> Self {
        Self {
            name: name.to_string(),
            id_column: id_column.to_string(),
            columns: vec![id_column.to_string()],
            unique: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    pub fn columns(mut self, columns: &[&str]) -> Self {
        for column in columns {
            if !self.columns.iter().any(|c| c == column) {
                self.columns.push(column.to_string());
            }
        }
        self
    }

    /// `activo` plus creation/modification stamps.
    pub fn audited(self) -> Self {
        self.columns(&AUDIT_COLUMNS)
    }

    /// Exact-match unique index. Rows with a NULL in any indexed column never conflict.
    pub fn unique(mut self, name: &str, columns: &[&str]) -> Self {
        self.unique.push(UniqueIndex {
            name: name.to_string(),
            columns: columns.iter().map(|c| (c.to_string(), false)).collect(),
        });
        self
    }

    /// Unique index on `LOWER(TRIM(normalized))`, optionally scoped by exact columns.
    pub fn unique_normalized(mut self, name: &str, normalized: &str, scoped_by: &[&str]) -> Self {
        let mut columns = vec![(normalized.to_string(), true)];
        columns.extend(scoped_by.iter().map(|c| (c.to_string(), false)));
        self.unique.push(UniqueIndex {
            name: name.to_string(),
            columns,
        });
        self
    }

    pub fn foreign_key(mut self, column: &str, references: &str) -> Self {
        self.foreign_keys.push(ForeignKey {
            column: column.to_string(),
            references: references.to_string(),
        });
        self.columns(&[column])
    }
}

struct MemoryTable {
    def: TableDef,
    rows: BTreeMap<i64, Record>,
    next_id: i64,
}

#[derive(Default)]
struct MemoryState {
    tables: HashMap<String, MemoryTable>,
}

impl MemoryState {
    fn table(&self, name: &str) -> Result<&MemoryTable> {
        self.tables
            .get(name)
            .ok_or_else(|| Error::Internal(format!("relation \"{}\" does not exist", name)))
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut MemoryTable> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| Error::Internal(format!("relation \"{}\" does not exist", name)))
    }

    fn check_unique(&self, table: &MemoryTable, candidate: &Record, id: i64) -> Result<()> {
        for index in &table.def.unique {
            let key: Option<Vec<JsonValue>> = index
                .columns
                .iter()
                .map(|(column, normalized)| {
                    candidate
                        .get(column)
                        .filter(|v| !v.is_null())
                        .map(|v| normalize_key(v, *normalized))
                })
                .collect();
            let Some(key) = key else {
                continue;
            };

            let clash = table.rows.iter().any(|(other_id, row)| {
                *other_id != id
                    && index.columns.iter().zip(&key).all(|((column, normalized), k)| {
                        row.get(column)
                            .filter(|v| !v.is_null())
                            .map(|v| normalize_key(v, *normalized) == *k)
                            .unwrap_or(false)
                    })
            });

            if clash {
                let columns: Vec<&str> = index.columns.iter().map(|(c, _)| c.as_str()).collect();
                let values: Vec<String> = key.iter().map(display_value).collect();
                return Err(Error::Constraint(ConstraintViolation::unique(format!(
                    "{} Key ({})=({}) already exists.",
                    index.name,
                    columns.join(", "),
                    values.join(", ")
                ))));
            }
        }
        Ok(())
    }

    fn check_foreign_keys(&self, table: &MemoryTable, candidate: &Record) -> Result<()> {
        for fk in &table.def.foreign_keys {
            let Some(value) = candidate.get(&fk.column).filter(|v| !v.is_null()) else {
                continue;
            };
            let parent = self.table(&fk.references)?;
            let present = value
                .as_i64()
                .map(|id| parent.rows.contains_key(&id))
                .unwrap_or(false);
            if !present {
                return Err(Error::Constraint(ConstraintViolation::foreign_key(format!(
                    "{}_{}_fkey Key ({})=({}) is not present in table \"{}\".",
                    table.def.name,
                    fk.column,
                    fk.column,
                    display_value(value),
                    fk.references
                ))));
            }
        }
        Ok(())
    }

    fn check_not_referenced(&self, table: &str, id: i64) -> Result<()> {
        for other in self.tables.values() {
            for fk in other.def.foreign_keys.iter().filter(|fk| fk.references == table) {
                let referenced = other
                    .rows
                    .values()
                    .any(|row| row.get(&fk.column).and_then(JsonValue::as_i64) == Some(id));
                if referenced {
                    return Err(Error::Constraint(ConstraintViolation::foreign_key(format!(
                        "{}_{}_fkey Key ({})=({}) is still referenced from table \"{}\".",
                        other.def.name, fk.column, fk.column, id, other.def.name
                    ))));
                }
            }
        }
        Ok(())
    }
}

/// In-memory RecordStore implementation
#[derive(Default)]
pub struct MemoryRecordStore {
    state: Mutex<MemoryState>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-loaded with the especie / raza / cliente / mascota schema.
    pub fn registry() -> Self {
        Self::new()
            .with_table(
                TableDef::new("especie", "especie_id")
                    .columns(&["nombre", "descripcion"])
                    .audited()
                    .unique_normalized("especie_nombre_normalizado_key", "nombre", &[]),
            )
            .with_table(
                TableDef::new("raza", "raza_id")
                    .foreign_key("especie_id", "especie")
                    .columns(&["nombre", "descripcion"])
                    .audited()
                    .unique_normalized("raza_especie_nombre_key", "nombre", &["especie_id"]),
            )
            .with_table(
                TableDef::new("cliente", "cliente_id")
                    .columns(&[
                        "nombre",
                        "cedula",
                        "ruc",
                        "telefono",
                        "direccion",
                        "fecha_nacimiento",
                        "ubicacion_gps",
                    ])
                    .audited()
                    .unique("cliente_cedula_key", &["cedula"])
                    .unique("cliente_ruc_key", &["ruc"]),
            )
            .with_table(
                TableDef::new("mascota", "mascota_id")
                    .foreign_key("cliente_id", "cliente")
                    .foreign_key("especie_id", "especie")
                    .foreign_key("raza_id", "raza")
                    .columns(&[
                        "nombre",
                        "fecha_nacimiento",
                        "sexo",
                        "chip",
                        "pelaje",
                        "descripcion",
                    ])
                    .audited()
                    .unique("mascota_chip_key", &["chip"]),
            )
    }

    pub fn with_table(self, def: TableDef) -> Self {
        if let Ok(mut state) = self.state.lock() {
            insert_table(&mut state, def);
        }
        self
    }

    pub fn add_table(&self, def: TableDef) -> Result<()> {
        let mut state = self.lock()?;
        insert_table(&mut state, def);
        Ok(())
    }

    pub fn row_count(&self, table: &str) -> Result<usize> {
        let state = self.lock()?;
        Ok(state.table(table)?.rows.len())
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| Error::Internal("memory store lock poisoned".to_string()))
    }
}

fn insert_table(state: &mut MemoryState, def: TableDef) {
    state.tables.insert(
        def.name.clone(),
        MemoryTable {
            def,
            rows: BTreeMap::new(),
            next_id: 1,
        },
    );
}

fn normalize_key(value: &JsonValue, normalized: bool) -> JsonValue {
    match (value, normalized) {
        (JsonValue::String(s), true) => JsonValue::String(s.trim().to_lowercase()),
        _ => value.clone(),
    }
}

fn display_value(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn reject_unknown_columns(def: &TableDef, values: &Record) -> Result<()> {
    for column in values.keys() {
        if !def.columns.iter().any(|c| c == column) {
            return Err(Error::Internal(format!(
                "column \"{}\" of relation \"{}\" does not exist",
                column, def.name
            )));
        }
    }
    Ok(())
}

fn matches_value(value: &JsonValue, expected: &FilterValue) -> bool {
    match expected {
        FilterValue::Int(i) => value.as_i64() == Some(*i),
        FilterValue::Text(s) => value.as_str() == Some(s.as_str()),
        FilterValue::Bool(b) => value.as_bool() == Some(*b),
        FilterValue::Date(_) => value.as_str() == expected.to_json().as_str(),
    }
}

fn compare_to(value: &JsonValue, bound: &FilterValue) -> Option<Ordering> {
    match bound {
        FilterValue::Int(i) => value.as_i64().map(|v| v.cmp(i)),
        FilterValue::Text(s) => value.as_str().map(|v| v.cmp(s.as_str())),
        FilterValue::Date(_) => {
            let bound = bound.to_json();
            let bound = bound.as_str()?;
            value
                .as_str()
                .map(|v| v.get(..10).unwrap_or(v).cmp(bound))
        }
        FilterValue::Bool(_) => None,
    }
}

fn contains_ci(value: &JsonValue, needle: &str) -> bool {
    value
        .as_str()
        .map(|v| v.to_lowercase().contains(&needle.to_lowercase()))
        .unwrap_or(false)
}

/// Ascending order with NULLs last.
fn sort_order(a: &JsonValue, b: &JsonValue) -> Ordering {
    match (a, b) {
        (JsonValue::Null, JsonValue::Null) => Ordering::Equal,
        (JsonValue::Null, _) => Ordering::Greater,
        (_, JsonValue::Null) => Ordering::Less,
        (JsonValue::Number(x), JsonValue::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (JsonValue::String(x), JsonValue::String(y)) => x
            .to_lowercase()
            .cmp(&y.to_lowercase())
            .then_with(|| x.cmp(y)),
        (JsonValue::Bool(x), JsonValue::Bool(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

struct JoinedRow<'a> {
    id: i64,
    base: &'a Record,
    joined: HashMap<&'a str, Option<&'a Record>>,
}

impl JoinedRow<'_> {
    fn get(&self, column: &ColumnRef) -> &JsonValue {
        const NULL: &JsonValue = &JsonValue::Null;
        let source = match &column.alias {
            None => Some(self.base),
            Some(alias) => self.joined.get(alias.as_str()).copied().flatten(),
        };
        source.and_then(|r| r.get(&column.column)).unwrap_or(NULL)
    }

    fn matches(&self, filter: &Filter) -> bool {
        match filter {
            Filter::Eq { column, value } => matches_value(self.get(column), value),
            Filter::Contains { column, needle } => contains_ci(self.get(column), needle),
            Filter::AnyContains { columns, needle } => {
                columns.is_empty() || columns.iter().any(|c| contains_ci(self.get(c), needle))
            }
            Filter::Range { column, from, to } => {
                let value = self.get(column);
                let lower_ok = from
                    .as_ref()
                    .map(|b| matches!(compare_to(value, b), Some(Ordering::Greater | Ordering::Equal)))
                    .unwrap_or(true);
                let upper_ok = to
                    .as_ref()
                    .map(|b| matches!(compare_to(value, b), Some(Ordering::Less | Ordering::Equal)))
                    .unwrap_or(true);
                lower_ok && upper_ok
            }
        }
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn find_by_id(&self, table: &TableRef, id: i64) -> Result<Option<Record>> {
        let state = self.lock()?;
        Ok(state.table(&table.name)?.rows.get(&id).cloned())
    }

    async fn find_by_scope(
        &self,
        table: &TableRef,
        scope: &[ScopeField],
        exclude_id: Option<i64>,
    ) -> Result<Option<Record>> {
        if scope.is_empty() {
            return Ok(None);
        }
        let state = self.lock()?;
        let found = state
            .table(&table.name)?
            .rows
            .iter()
            .filter(|(id, _)| Some(**id) != exclude_id)
            .find(|(_, row)| {
                scope.iter().all(|field| {
                    let Some(value) = row.get(&field.column) else {
                        return false;
                    };
                    match (&field.value, field.normalized) {
                        (FilterValue::Text(expected), true) => value
                            .as_str()
                            .map(|v| v.trim().to_lowercase() == expected.trim().to_lowercase())
                            .unwrap_or(false),
                        (expected, _) => matches_value(value, expected),
                    }
                })
            })
            .map(|(_, row)| row.clone());
        Ok(found)
    }

    async fn exists_filtered(
        &self,
        table: &str,
        fk_column: &str,
        id: i64,
        active_column: Option<&str>,
    ) -> Result<bool> {
        let state = self.lock()?;
        let table = state.table(table)?;
        for column in std::iter::once(fk_column).chain(active_column) {
            if !table.def.columns.iter().any(|c| c == column) {
                return Err(Error::Internal(format!(
                    "column \"{}\" does not exist",
                    column
                )));
            }
        }
        Ok(table.rows.values().any(|row| {
            row.get(fk_column).and_then(JsonValue::as_i64) == Some(id)
                && active_column
                    .map(|c| row.get(c).and_then(JsonValue::as_bool) == Some(true))
                    .unwrap_or(true)
        }))
    }

    async fn table_exists(&self, table: &str) -> Result<bool> {
        let state = self.lock()?;
        Ok(state.tables.contains_key(table))
    }

    async fn column_exists(&self, table: &str, column: &str) -> Result<bool> {
        let state = self.lock()?;
        Ok(state
            .tables
            .get(table)
            .map(|t| t.def.columns.iter().any(|c| c == column))
            .unwrap_or(false))
    }

    async fn insert(&self, table: &TableRef, values: Record) -> Result<Record> {
        let mut state = self.lock()?;
        let current = state.table(&table.name)?;
        reject_unknown_columns(&current.def, &values)?;

        let id = current.next_id;
        let mut row: Record = current
            .def
            .columns
            .iter()
            .map(|c| (c.clone(), JsonValue::Null))
            .collect();
        row.extend(values);
        row.insert(current.def.id_column.clone(), JsonValue::from(id));

        state.check_unique(current, &row, id)?;
        state.check_foreign_keys(current, &row)?;

        let target = state.table_mut(&table.name)?;
        target.rows.insert(id, row.clone());
        target.next_id += 1;
        Ok(row)
    }

    async fn update_fields(&self, table: &TableRef, id: i64, values: Record) -> Result<()> {
        let mut state = self.lock()?;
        let current = state.table(&table.name)?;
        reject_unknown_columns(&current.def, &values)?;

        // Zero rows affected, like an UPDATE with no matching id.
        let Some(existing) = current.rows.get(&id) else {
            return Ok(());
        };
        let mut row = existing.clone();
        row.extend(values);

        state.check_unique(current, &row, id)?;
        state.check_foreign_keys(current, &row)?;

        state.table_mut(&table.name)?.rows.insert(id, row);
        Ok(())
    }

    async fn delete(&self, table: &TableRef, id: i64) -> Result<()> {
        let mut state = self.lock()?;
        state.table(&table.name)?;
        state.check_not_referenced(&table.name, id)?;
        state.table_mut(&table.name)?.rows.remove(&id);
        Ok(())
    }

    async fn query_page(&self, table: &TableRef, query: &PageQuery) -> Result<(Vec<Record>, i64)> {
        let state = self.lock()?;
        let base = state.table(&table.name)?;

        let mut join_tables = Vec::with_capacity(query.joins.len());
        for join in &query.joins {
            join_tables.push((join, state.table(&join.table.name)?));
        }

        let mut rows: Vec<JoinedRow<'_>> = base
            .rows
            .iter()
            .map(|(id, row)| {
                let joined = join_tables
                    .iter()
                    .map(|(join, parent)| {
                        let parent_row = row
                            .get(&join.fk_column)
                            .and_then(JsonValue::as_i64)
                            .and_then(|fk| parent.rows.get(&fk));
                        (join.alias.as_str(), parent_row)
                    })
                    .collect();
                JoinedRow {
                    id: *id,
                    base: row,
                    joined,
                }
            })
            .filter(|row| query.filters.iter().all(|f| row.matches(f)))
            .collect();

        let total = rows.len() as i64;

        if let Some(sort) = &query.sort {
            rows.sort_by(|a, b| {
                let ordering = sort_order(a.get(&sort.column), b.get(&sort.column));
                let ordering = match sort.direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                };
                ordering.then_with(|| a.id.cmp(&b.id))
            });
        }

        let offset = usize::try_from(query.offset.max(0)).unwrap_or(usize::MAX);
        let limit = query
            .limit
            .map(|l| usize::try_from(l.max(0)).unwrap_or(usize::MAX))
            .unwrap_or(usize::MAX);

        let page = rows
            .iter()
            .skip(offset)
            .take(limit)
            .map(|row| {
                let mut record = row.base.clone();
                for projection in &query.projections {
                    record.insert(projection.output.clone(), row.get(&projection.column).clone());
                }
                record
            })
            .collect();

        Ok((page, total))
    }
}
