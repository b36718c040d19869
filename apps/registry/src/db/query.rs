//! Store-neutral description of lookups and paged reads.
//!
//! The services build these values from entity descriptors; each `RecordStore` implementation
//! turns them into its own execution plan.

use crate::models::SortDirection;
use chrono::NaiveDate;
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    pub name: String,
    pub id_column: String,
}

impl TableRef {
    pub fn new(name: impl Into<String>, id_column: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id_column: id_column.into(),
        }
    }
}

/// A typed scalar used in predicates.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Int(i64),
    Text(String),
    Bool(bool),
    Date(NaiveDate),
}

impl FilterValue {
    /// Convert a record value into a predicate value. `null`, arrays and objects yield `None`.
    pub fn from_json(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::Number(n) => n.as_i64().map(FilterValue::Int),
            JsonValue::String(s) => Some(FilterValue::Text(s.clone())),
            JsonValue::Bool(b) => Some(FilterValue::Bool(*b)),
            _ => None,
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            FilterValue::Int(v) => JsonValue::from(*v),
            FilterValue::Text(v) => JsonValue::from(v.as_str()),
            FilterValue::Bool(v) => JsonValue::from(*v),
            FilterValue::Date(v) => JsonValue::from(v.format("%Y-%m-%d").to_string()),
        }
    }
}

/// One column of a uniqueness scope.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopeField {
    pub column: String,
    pub value: FilterValue,
    /// Compare with `LOWER(TRIM(..))` on both sides.
    pub normalized: bool,
}

/// A column of the base table (`alias == None`) or of a joined parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    pub alias: Option<String>,
    pub column: String,
}

impl ColumnRef {
    pub fn base(column: impl Into<String>) -> Self {
        Self {
            alias: None,
            column: column.into(),
        }
    }

    pub fn joined(alias: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            alias: Some(alias.into()),
            column: column.into(),
        }
    }
}

/// `LEFT JOIN table AS alias ON alias.id = base.fk_column`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    pub alias: String,
    pub table: TableRef,
    pub fk_column: String,
}

/// Extra output key carrying a joined column, e.g. `especie_nombre`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    pub column: ColumnRef,
    pub output: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq {
        column: ColumnRef,
        value: FilterValue,
    },
    /// Case-insensitive substring match.
    Contains {
        column: ColumnRef,
        needle: String,
    },
    /// Case-insensitive substring match against any of the columns.
    AnyContains {
        columns: Vec<ColumnRef>,
        needle: String,
    },
    /// Inclusive range; either bound may be omitted.
    Range {
        column: ColumnRef,
        from: Option<FilterValue>,
        to: Option<FilterValue>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortSpec {
    pub column: ColumnRef,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageQuery {
    pub joins: Vec<Join>,
    pub projections: Vec<Projection>,
    pub filters: Vec<Filter>,
    pub sort: Option<SortSpec>,
    pub offset: i64,
    /// `None` reads every matching row.
    pub limit: Option<i64>,
}

/// True for identifiers safe to interpolate into SQL: `[a-z_][a-z0-9_]*`.
pub fn is_plain_identifier(ident: &str) -> bool {
    let mut chars = ident.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}
