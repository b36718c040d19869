//! PostgreSQL-backed `RecordStore` implementation

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgArguments, PgDatabaseError};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row};

use crate::{
    db::query::{
        is_plain_identifier, ColumnRef, Filter, FilterValue, PageQuery, ScopeField, TableRef,
    },
    db::traits::RecordStore,
    error::{ConstraintKind, ConstraintViolation},
    models::{Record, SortDirection},
    Error, Result,
};

const BASE_ALIAS: &str = "t";

/// PostgreSQL-backed RecordStore implementation
#[derive(Clone)]
pub struct PostgresRecordStore {
    pub(crate) pool: PgPool,
}

impl PostgresRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn quote(ident: &str) -> Result<String> {
    if !is_plain_identifier(ident) {
        return Err(Error::Internal(format!("Invalid SQL identifier: {}", ident)));
    }
    Ok(format!("\"{}\"", ident))
}

fn column_sql(column: &ColumnRef) -> Result<String> {
    let alias = match &column.alias {
        Some(alias) => quote(alias)?,
        None => BASE_ALIAS.to_string(),
    };
    Ok(format!("{}.{}", alias, quote(&column.column)?))
}

fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &'q FilterValue,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        FilterValue::Int(v) => query.bind(*v),
        FilterValue::Text(v) => query.bind(v.as_str()),
        FilterValue::Bool(v) => query.bind(*v),
        FilterValue::Date(v) => query.bind(*v),
    }
}

/// Escape LIKE wildcards so the needle matches literally.
fn like_pattern(needle: &str) -> String {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn row_to_record(row: &sqlx::postgres::PgRow) -> Result<Record> {
    let value: JsonValue = row.try_get("data").map_err(Error::Database)?;
    match value {
        JsonValue::Object(map) => Ok(map),
        other => Err(Error::Internal(format!(
            "Expected a JSON object row, got {}",
            other
        ))),
    }
}

/// Map SQLSTATE 23505 / 23503 to `Error::Constraint`, keeping the constraint name and detail
/// as the hint.
fn map_write_error(err: sqlx::Error) -> Error {
    if let sqlx::Error::Database(db) = &err {
        let kind = if db.is_unique_violation() {
            Some(ConstraintKind::Unique)
        } else if db.is_foreign_key_violation() {
            Some(ConstraintKind::ForeignKey)
        } else {
            None
        };

        if let Some(kind) = kind {
            let detail = db
                .try_downcast_ref::<PgDatabaseError>()
                .and_then(|pg| pg.detail())
                .unwrap_or_default();
            let constraint = db.constraint().unwrap_or_default();
            let hint = format!("{} {}", constraint, detail).trim().to_string();
            return Error::Constraint(ConstraintViolation {
                kind,
                hint: if hint.is_empty() { None } else { Some(hint) },
            });
        }
    }
    Error::Database(err)
}

struct WhereClause {
    sql: String,
    binds: Vec<FilterValue>,
}

fn build_where(filters: &[Filter]) -> Result<WhereClause> {
    let mut clauses = Vec::new();
    let mut binds = Vec::new();

    for filter in filters {
        match filter {
            Filter::Eq { column, value } => {
                binds.push(value.clone());
                clauses.push(format!("{} = ${}", column_sql(column)?, binds.len()));
            }
            Filter::Contains { column, needle } => {
                binds.push(FilterValue::Text(like_pattern(needle)));
                clauses.push(format!("{} ILIKE ${}", column_sql(column)?, binds.len()));
            }
            Filter::AnyContains { columns, needle } => {
                if columns.is_empty() {
                    continue;
                }
                binds.push(FilterValue::Text(like_pattern(needle)));
                let param = binds.len();
                let ors = columns
                    .iter()
                    .map(|c| Ok(format!("{} ILIKE ${}", column_sql(c)?, param)))
                    .collect::<Result<Vec<_>>>()?;
                clauses.push(format!("({})", ors.join(" OR ")));
            }
            Filter::Range { column, from, to } => {
                let col = column_sql(column)?;
                if let Some(from) = from {
                    binds.push(from.clone());
                    clauses.push(format!("{} >= ${}", col, binds.len()));
                }
                if let Some(to) = to {
                    binds.push(to.clone());
                    clauses.push(format!("{} <= ${}", col, binds.len()));
                }
            }
        }
    }

    let sql = if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    };
    Ok(WhereClause { sql, binds })
}

#[async_trait]
impl RecordStore for PostgresRecordStore {
    async fn find_by_id(&self, table: &TableRef, id: i64) -> Result<Option<Record>> {
        let sql = format!(
            "SELECT to_jsonb({a}) AS data FROM {t} AS {a} WHERE {a}.{id} = $1",
            a = BASE_ALIAS,
            t = quote(&table.name)?,
            id = quote(&table.id_column)?,
        );

        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        row.as_ref().map(row_to_record).transpose()
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

        let mut where_clauses = vec![];
        let mut bind_count = 0;
        for field in scope {
            bind_count += 1;
            let col = format!("{}.{}", BASE_ALIAS, quote(&field.column)?);
            if field.normalized {
                where_clauses.push(format!(
                    "LOWER(TRIM({})) = LOWER(TRIM(${}))",
                    col, bind_count
                ));
            } else {
                where_clauses.push(format!("{} = ${}", col, bind_count));
            }
        }
        if exclude_id.is_some() {
            bind_count += 1;
            where_clauses.push(format!(
                "{}.{} <> ${}",
                BASE_ALIAS,
                quote(&table.id_column)?,
                bind_count
            ));
        }

        let sql = format!(
            "SELECT to_jsonb({a}) AS data FROM {t} AS {a} WHERE {w} LIMIT 1",
            a = BASE_ALIAS,
            t = quote(&table.name)?,
            w = where_clauses.join(" AND "),
        );

        let mut query = sqlx::query(&sql);
        for field in scope {
            query = bind_value(query, &field.value);
        }
        if let Some(exclude) = exclude_id {
            query = query.bind(exclude);
        }

        let row = query
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        row.as_ref().map(row_to_record).transpose()
    }

    async fn exists_filtered(
        &self,
        table: &str,
        fk_column: &str,
        id: i64,
        active_column: Option<&str>,
    ) -> Result<bool> {
        let active = match active_column {
            Some(column) => format!(" AND {} = true", quote(column)?),
            None => String::new(),
        };
        let sql = format!(
            "SELECT EXISTS (SELECT 1 FROM {} WHERE {} = $1{} LIMIT 1)",
            quote(table)?,
            quote(fk_column)?,
            active
        );

        let exists = sqlx::query_scalar::<_, bool>(&sql)
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(exists)
    }

    async fn table_exists(&self, table: &str) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (
                SELECT 1 FROM information_schema.tables
                WHERE table_schema = current_schema() AND table_name = $1
             )",
        )
        .bind(table)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(exists)
    }

    async fn column_exists(&self, table: &str, column: &str) -> Result<bool> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM information_schema.columns
             WHERE table_schema = current_schema() AND table_name = $1 AND column_name = $2",
        )
        .bind(table)
        .bind(column)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(count > 0)
    }

    async fn insert(&self, table: &TableRef, values: Record) -> Result<Record> {
        if values.is_empty() {
            return Err(Error::Internal(format!(
                "Refusing to insert an empty row into {}",
                table.name
            )));
        }

        let columns = values
            .keys()
            .map(|c| quote(c))
            .collect::<Result<Vec<_>>>()?
            .join(", ");
        let t = quote(&table.name)?;
        let sql = format!(
            "INSERT INTO {t} AS {a} ({columns})
             SELECT {columns} FROM jsonb_populate_record(NULL::{t}, $1::jsonb)
             RETURNING to_jsonb({a}) AS data",
            t = t,
            a = BASE_ALIAS,
            columns = columns,
        );

        let row = sqlx::query(&sql)
            .bind(JsonValue::Object(values))
            .fetch_one(&self.pool)
            .await
            .map_err(map_write_error)?;

        row_to_record(&row)
    }

    async fn update_fields(&self, table: &TableRef, id: i64, values: Record) -> Result<()> {
        if values.is_empty() {
            return Ok(());
        }

        let assignments = values
            .keys()
            .map(|c| {
                let c = quote(c)?;
                Ok(format!("{c} = s.{c}"))
            })
            .collect::<Result<Vec<_>>>()?
            .join(", ");
        let t = quote(&table.name)?;
        let sql = format!(
            "UPDATE {t} AS {a} SET {assignments}
             FROM jsonb_populate_record(NULL::{t}, $1::jsonb) AS s
             WHERE {a}.{id} = $2",
            t = t,
            a = BASE_ALIAS,
            assignments = assignments,
            id = quote(&table.id_column)?,
        );

        sqlx::query(&sql)
            .bind(JsonValue::Object(values))
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_write_error)?;

        Ok(())
    }

    async fn delete(&self, table: &TableRef, id: i64) -> Result<()> {
        let sql = format!(
            "DELETE FROM {} WHERE {} = $1",
            quote(&table.name)?,
            quote(&table.id_column)?
        );

        sqlx::query(&sql)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_write_error)?;

        Ok(())
    }

    async fn query_page(&self, table: &TableRef, query: &PageQuery) -> Result<(Vec<Record>, i64)> {
        let mut from = format!("{} AS {}", quote(&table.name)?, BASE_ALIAS);
        for join in &query.joins {
            let alias = quote(&join.alias)?;
            from.push_str(&format!(
                " LEFT JOIN {} AS {alias} ON {alias}.{} = {}.{}",
                quote(&join.table.name)?,
                quote(&join.table.id_column)?,
                BASE_ALIAS,
                quote(&join.fk_column)?,
                alias = alias,
            ));
        }

        let where_clause = build_where(&query.filters)?;

        // Count query
        let count_sql = format!("SELECT COUNT(*) AS total FROM {}{}", from, where_clause.sql);
        let mut count_q = sqlx::query(&count_sql);
        for value in &where_clause.binds {
            count_q = bind_value(count_q, value);
        }
        let total: i64 = count_q
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?
            .try_get("total")
            .map_err(Error::Database)?;

        let mut select = format!("to_jsonb({})", BASE_ALIAS);
        if !query.projections.is_empty() {
            let pairs = query
                .projections
                .iter()
                .map(|p| {
                    if !is_plain_identifier(&p.output) {
                        return Err(Error::Internal(format!(
                            "Invalid projection name: {}",
                            p.output
                        )));
                    }
                    Ok(format!("'{}', {}", p.output, column_sql(&p.column)?))
                })
                .collect::<Result<Vec<_>>>()?;
            select.push_str(&format!(" || jsonb_build_object({})", pairs.join(", ")));
        }

        let mut sql = format!("SELECT {} AS data FROM {}{}", select, from, where_clause.sql);

        let tiebreak = format!("{}.{} ASC", BASE_ALIAS, quote(&table.id_column)?);
        match &query.sort {
            Some(sort) => {
                let direction = match sort.direction {
                    SortDirection::Asc => "ASC",
                    SortDirection::Desc => "DESC",
                };
                sql.push_str(&format!(
                    " ORDER BY {} {}, {}",
                    column_sql(&sort.column)?,
                    direction,
                    tiebreak
                ));
            }
            None => sql.push_str(&format!(" ORDER BY {}", tiebreak)),
        }

        // Add pagination
        let mut bind_count = where_clause.binds.len();
        if query.limit.is_some() {
            bind_count += 1;
            sql.push_str(&format!(" LIMIT ${}", bind_count));
        }
        bind_count += 1;
        sql.push_str(&format!(" OFFSET ${}", bind_count));

        let mut main_q = sqlx::query(&sql);
        for value in &where_clause.binds {
            main_q = bind_value(main_q, value);
        }
        if let Some(limit) = query.limit {
            main_q = main_q.bind(limit);
        }
        main_q = main_q.bind(query.offset.max(0));

        let rows = main_q
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        let records = rows.iter().map(row_to_record).collect::<Result<Vec<_>>>()?;
        Ok((records, total))
    }
}
