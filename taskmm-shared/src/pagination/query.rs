//! Entity manifests, filter sets and sort specs shared by both pagination
//! engines.
//!
//! Column names reaching SQL always come from an entity's static manifest,
//! never from the request, so they are safe to splice into query text. Values
//! are always bound.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Postgres, QueryBuilder};

/// How a column's values are typed in SQL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    BigInt,
    Text,
    Timestamp,
}

/// A filterable column of an entity
///
/// Only non-nullable columns can be sorted on: a keyset continuation
/// (`column > last`) never matches NULL, so NULL rows would fall out of the
/// walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnKind,
    pub nullable: bool,
}

impl Column {
    pub const fn big_int(name: &'static str) -> Self {
        Self::new(name, ColumnKind::BigInt)
    }

    pub const fn text(name: &'static str) -> Self {
        Self::new(name, ColumnKind::Text)
    }

    pub const fn timestamp(name: &'static str) -> Self {
        Self::new(name, ColumnKind::Timestamp)
    }

    /// Marks the column as allowing NULL
    pub const fn nullable(self) -> Self {
        Self {
            nullable: true,
            ..self
        }
    }

    pub const fn is_sortable(&self) -> bool {
        !self.nullable
    }

    const fn new(name: &'static str, kind: ColumnKind) -> Self {
        Self {
            name,
            kind,
            nullable: false,
        }
    }
}

/// A table whose rows can be listed through the pagination engines
///
/// Every implementor is soft-deletable: its table carries a nullable
/// `deleted_at` column, and rows with a value there are never returned.
pub trait Entity: for<'r> FromRow<'r, PgRow> + Send + Unpin {
    /// Table name
    const TABLE: &'static str;

    /// Column list selected for the public view of a row
    const SELECT: &'static str;

    /// Primary key, the fallback sort column
    const PRIMARY_KEY: &'static Column;

    /// Columns that may be filtered, searched or sorted on
    const COLUMNS: &'static [Column];

    /// Value of a manifest column on this row
    fn value_of(&self, column: &str) -> SqlValue;

    /// Looks up a manifest column by name
    fn column(name: &str) -> Option<&'static Column> {
        Self::COLUMNS.iter().find(|column| column.name == name)
    }
}

/// A scalar bound into a query
#[derive(Debug, Clone, PartialEq, PartialOrd, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Int(i64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl SqlValue {
    /// Appends this value as a bind parameter
    pub fn push_bind(self, qb: &mut QueryBuilder<'static, Postgres>) {
        match self {
            SqlValue::Null => qb.push_bind(Option::<String>::None),
            SqlValue::Int(v) => qb.push_bind(v),
            SqlValue::Text(v) => qb.push_bind(v),
            SqlValue::Timestamp(v) => qb.push_bind(v),
        };
    }

    /// Interprets a JSON value as a value of the given column kind
    pub fn from_json(value: &serde_json::Value, kind: ColumnKind) -> Option<Self> {
        match (kind, value) {
            (ColumnKind::BigInt, serde_json::Value::Number(n)) => n.as_i64().map(SqlValue::Int),
            (ColumnKind::Text, serde_json::Value::String(s)) => Some(SqlValue::Text(s.clone())),
            (ColumnKind::Timestamp, serde_json::Value::String(s)) => {
                DateTime::parse_from_rfc3339(s)
                    .ok()
                    .map(|dt| SqlValue::Timestamp(dt.with_timezone(&Utc)))
            }
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            SqlValue::Null => serde_json::Value::Null,
            SqlValue::Int(v) => serde_json::Value::from(*v),
            SqlValue::Text(v) => serde_json::Value::from(v.as_str()),
            SqlValue::Timestamp(v) => serde_json::Value::from(v.to_rfc3339()),
        }
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Int(value)
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(value: DateTime<Utc>) -> Self {
        SqlValue::Timestamp(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// Right-hand side of an equality filter
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    /// `column = value`
    One(SqlValue),

    /// `column IN (values)`; an empty set matches nothing
    AnyOf(Vec<SqlValue>),
}

/// Equality filters keyed by column name
///
/// Names that are not in the entity's manifest are ignored when the
/// predicate is built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filters {
    entries: Vec<(String, FilterValue)>,
}

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `column = value`
    pub fn eq(mut self, column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.entries
            .push((column.into(), FilterValue::One(value.into())));
        self
    }

    /// Adds `column = value` when a value is present
    pub fn eq_opt<V: Into<SqlValue>>(self, column: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(value) => self.eq(column, value),
            None => self,
        }
    }

    /// Adds `column IN (values)`
    pub fn any_of<V: Into<SqlValue>>(
        mut self,
        column: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.entries.push((column.into(), FilterValue::AnyOf(values)));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FilterValue)> {
        self.entries.iter().map(|(column, value)| (column.as_str(), value))
    }
}

/// Case-insensitive substring search across text columns
#[derive(Debug, Clone, PartialEq)]
pub struct Search {
    pub text: String,
    pub columns: &'static [&'static str],
}

impl Search {
    /// Builds a search when there is something to search for
    pub fn new(text: Option<&str>, columns: &'static [&'static str]) -> Option<Self> {
        let text = text?.trim();
        if text.is_empty() || columns.is_empty() {
            return None;
        }
        Some(Self {
            text: text.to_string(),
            columns,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }

    /// Comparison that selects rows after a cursor in this direction
    pub fn after_operator(&self) -> &'static str {
        match self {
            SortDirection::Asc => ">",
            SortDirection::Desc => "<",
        }
    }
}

/// A resolved sort: a manifest column plus a direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub column: &'static Column,
    pub direction: SortDirection,
}

impl SortSpec {
    /// Parses `column` (ascending) or `-column` (descending)
    ///
    /// Falls back to descending primary key when the value is absent, empty,
    /// names a column outside the manifest or names a nullable column.
    pub fn parse<E: Entity>(raw: Option<&str>) -> Self {
        let fallback = Self {
            column: E::PRIMARY_KEY,
            direction: SortDirection::Desc,
        };

        let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
            return fallback;
        };

        let (name, direction) = match raw.strip_prefix('-') {
            Some(name) => (name, SortDirection::Desc),
            None => (raw, SortDirection::Asc),
        };

        match E::column(name) {
            Some(column) if column.is_sortable() => Self { column, direction },
            Some(column) => {
                tracing::debug!(table = E::TABLE, column = column.name, "Nullable column is not sortable");
                fallback
            }
            None => fallback,
        }
    }
}

/// Appends the `WHERE` clause shared by every listing: soft-delete
/// exclusion, equality filters and the optional search
pub(crate) fn push_predicates<E: Entity>(
    qb: &mut QueryBuilder<'static, Postgres>,
    filters: &Filters,
    search: Option<&Search>,
) {
    qb.push(" WHERE deleted_at IS NULL");

    for (name, value) in filters.iter() {
        let Some(column) = E::column(name) else {
            tracing::debug!(table = E::TABLE, column = name, "Ignoring unknown filter column");
            continue;
        };

        match value {
            FilterValue::One(SqlValue::Null) => {
                qb.push(" AND ").push(column.name).push(" IS NULL");
            }
            FilterValue::One(value) => {
                qb.push(" AND ").push(column.name).push(" = ");
                value.clone().push_bind(qb);
            }
            FilterValue::AnyOf(values) if values.is_empty() => {
                qb.push(" AND FALSE");
            }
            FilterValue::AnyOf(values) => {
                qb.push(" AND ").push(column.name).push(" IN (");
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        qb.push(", ");
                    }
                    value.clone().push_bind(qb);
                }
                qb.push(")");
            }
        }
    }

    if let Some(search) = search {
        let columns: Vec<&Column> = search
            .columns
            .iter()
            .filter_map(|name| E::column(name))
            .filter(|column| column.kind == ColumnKind::Text)
            .collect();

        if !columns.is_empty() {
            let pattern = format!("%{}%", search.text);
            qb.push(" AND (");
            for (i, column) in columns.iter().enumerate() {
                if i > 0 {
                    qb.push(" OR ");
                }
                qb.push(column.name).push(" ILIKE ");
                qb.push_bind(pattern.clone());
            }
            qb.push(")");
        }
    }
}
