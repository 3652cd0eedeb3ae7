//! Persistence contract used by domain controllers.
//!
//! Rows are column/value maps keyed by table name. Search filters are typed
//! [`Condition`]s, so values are never spliced into query text.

use std::{cmp::Ordering, fmt};

use async_trait::async_trait;
use indexmap::IndexMap;
use log::error;

use crate::core::{RestError, Value};

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

pub type Row = IndexMap<String, Value>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ge,
    Le,
    Gt,
    Lt,
}

impl Comparison {
    pub fn sql(self) -> &'static str {
        match self {
            Comparison::Eq => "=",
            Comparison::Ge => ">=",
            Comparison::Le => "<=",
            Comparison::Gt => ">",
            Comparison::Lt => "<",
        }
    }
}

/// `column <op> value`
#[derive(Clone, Debug, PartialEq)]
pub struct Condition {
    pub column: String,
    pub op: Comparison,
    pub value: Value,
}

impl Condition {
    pub fn new(column: &str, op: Comparison, value: impl Into<Value>) -> Self {
        Self {
            column: column.to_string(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(column: &str, value: impl Into<Value>) -> Self {
        Self::new(column, Comparison::Eq, value)
    }

    /// Whether `row` satisfies the condition. Missing and null columns never do.
    pub fn matches(&self, row: &Row) -> bool {
        let Some(ordering) = row
            .get(&self.column)
            .and_then(|actual| compare(actual, &self.value))
        else {
            return false;
        };
        match self.op {
            Comparison::Eq => ordering == Ordering::Equal,
            Comparison::Ge => ordering != Ordering::Less,
            Comparison::Le => ordering != Ordering::Greater,
            Comparison::Gt => ordering == Ordering::Greater,
            Comparison::Lt => ordering == Ordering::Less,
        }
    }
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Null, _) | (_, Value::Null) => None,
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => left.as_f64()?.partial_cmp(&right.as_f64()?),
    }
}

/// Equality conditions for every column of `filter`.
pub fn equalities(filter: &Row) -> Vec<Condition> {
    filter
        .iter()
        .map(|(column, value)| Condition::eq(column, value.clone()))
        .collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Real,
    Text,
}

impl ColumnType {
    pub fn sql(self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Text => "TEXT",
        }
    }
}

/// Table layout; every table also has an integer primary key `id`.
#[derive(Debug, PartialEq, Eq)]
pub struct TableSchema {
    pub name: &'static str,
    pub columns: &'static [(&'static str, ColumnType)],
}

/// Underlying storage fault. Callers only ever see `INTERNAL_DB_ERROR`.
#[derive(Debug, Clone, PartialEq)]
pub enum StorageError {
    UnknownTable(String),
    RowNotFound { table: String, id: i64 },
    InvalidIdentifier(String),
    Backend(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::UnknownTable(table) => write!(f, "no such table: {table}"),
            StorageError::RowNotFound { table, id } => {
                write!(f, "no row with id {id} in table {table}")
            }
            StorageError::InvalidIdentifier(name) => write!(f, "invalid identifier: {name}"),
            StorageError::Backend(message) => write!(f, "database failure: {message}"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<StorageError> for RestError {
    fn from(err: StorageError) -> Self {
        error!("Storage error: {err}");
        RestError::storage()
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Generic create/read/update/delete/search/count backend.
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Creates `schema` unless it already exists.
    async fn ensure_table(&self, schema: &TableSchema) -> StorageResult<()>;

    /// Inserts a row and returns it as stored, `id` included.
    async fn insert(&self, table: &str, values: Row) -> StorageResult<Row>;

    /// Changes the given columns of row `id` and returns the updated row.
    async fn update(&self, table: &str, id: i64, values: Row) -> StorageResult<Row>;

    /// Rows whose columns equal every entry of `filter`.
    async fn select(
        &self,
        table: &str,
        filter: Option<&Row>,
        columns: Option<&[&str]>,
    ) -> StorageResult<Vec<Row>>;

    /// One page of the rows matching `conditions`; `page_index` is 1-based.
    async fn search(
        &self,
        table: &str,
        conditions: &[Condition],
        page_size: u32,
        page_index: u32,
        columns: Option<&[&str]>,
    ) -> StorageResult<Vec<Row>>;

    async fn count(&self, table: &str, conditions: &[Condition]) -> StorageResult<u64>;

    async fn delete(&self, table: &str, filter: &Row) -> StorageResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ErrorCode;

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_condition_matching() {
        let r = row(&[("created_at", Value::Int(100)), ("name", Value::from("ann"))]);
        assert!(Condition::new("created_at", Comparison::Ge, 100).matches(&r));
        assert!(Condition::new("created_at", Comparison::Le, 100).matches(&r));
        assert!(!Condition::new("created_at", Comparison::Gt, 100).matches(&r));
        assert!(Condition::new("created_at", Comparison::Lt, 100.5).matches(&r));
        assert!(Condition::eq("name", "ann").matches(&r));
        assert!(!Condition::eq("missing", 1).matches(&r));
    }

    #[test]
    fn test_comparison_sql() {
        let ops = [
            Comparison::Eq,
            Comparison::Ge,
            Comparison::Le,
            Comparison::Gt,
            Comparison::Lt,
        ];
        let sql: Vec<_> = ops.iter().map(|op| op.sql()).collect();
        assert_eq!(sql, ["=", ">=", "<=", ">", "<"]);
    }

    #[test]
    fn test_storage_error_hides_detail() {
        for fault in [
            StorageError::UnknownTable("users".into()),
            StorageError::Backend("disk I/O error".into()),
        ] {
            let err: RestError = fault.into();
            assert_eq!(err.code, ErrorCode::InternalDbError);
            assert_eq!(err.message, "Internal database error");
            assert!(err.parameters.is_empty());
        }
    }
}
