//! SQLite backend over an sqlx connection pool.
//!
//! Every value travels as a bound parameter. Table and column names cannot be
//! bound, so they must match [`IDENTIFIER`] before they reach query text.

use std::{path::Path, str::FromStr};

use async_trait::async_trait;
use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;
use sqlx::{
    query::Query,
    sqlite::{
        Sqlite, SqliteArguments, SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow,
    },
    Column as _, Row as _, TypeInfo as _, ValueRef as _,
};

use crate::core::Value;

use super::{
    equalities, Condition, Persistence, Row, StorageError, StorageResult, TableSchema,
};

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier pattern"));

const ID_COLUMN: &str = "id";

type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        StorageError::Backend(err.to_string())
    }
}

/// Rows kept in a SQLite database file.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens the database at `path`, creating it and its directory if needed.
    pub async fn open(path: &str) -> StorageResult<Self> {
        if let Some(parent) = Path::new(path)
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
        {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                StorageError::Backend(format!("cannot create {}: {e}", parent.display()))
            })?;
        }
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        info!("Opened database at {path}");
        Ok(Self { pool })
    }

    /// A private database that lives as long as the store.
    pub async fn in_memory() -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        // Each connection would see its own empty database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    async fn fetch(&self, table: &str, id: i64) -> StorageResult<Row> {
        let sql = format!("SELECT * FROM {} WHERE {ID_COLUMN} = ?", identifier(table)?);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| failure(table, e))?;
        match row {
            Some(row) => to_row(&row),
            None => Err(StorageError::RowNotFound {
                table: table.to_string(),
                id,
            }),
        }
    }
}

fn identifier(name: &str) -> StorageResult<&str> {
    if IDENTIFIER.is_match(name) {
        Ok(name)
    } else {
        Err(StorageError::InvalidIdentifier(name.to_string()))
    }
}

fn identifiers<'a>(names: impl IntoIterator<Item = &'a str>) -> StorageResult<String> {
    let names = names
        .into_iter()
        .map(identifier)
        .collect::<StorageResult<Vec<_>>>()?;
    Ok(names.join(", "))
}

fn projection(columns: Option<&[&str]>) -> StorageResult<String> {
    match columns {
        Some(columns) if !columns.is_empty() => identifiers(columns.iter().copied()),
        _ => Ok("*".to_string()),
    }
}

fn filter_clause(conditions: &[Condition]) -> StorageResult<String> {
    if conditions.is_empty() {
        return Ok(String::new());
    }
    let clauses = conditions
        .iter()
        .map(|c| -> StorageResult<String> {
            Ok(format!("{} {} ?", identifier(&c.column)?, c.op.sql()))
        })
        .collect::<StorageResult<Vec<_>>>()?;
    Ok(format!(" WHERE {}", clauses.join(" AND ")))
}

fn bind<'q>(query: SqliteQuery<'q>, value: &Value) -> SqliteQuery<'q> {
    match value {
        Value::Null => query.bind(None::<i64>),
        Value::Bool(b) => query.bind(*b),
        Value::Int(i) => query.bind(*i),
        Value::Float(f) => query.bind(*f),
        Value::String(s) => query.bind(s.clone()),
        structured => query.bind(structured.to_json().to_string()),
    }
}

fn bind_conditions<'q>(mut query: SqliteQuery<'q>, conditions: &[Condition]) -> SqliteQuery<'q> {
    for condition in conditions {
        query = bind(query, &condition.value);
    }
    query
}

/// Maps a result row by the storage class of each value.
fn to_row(row: &SqliteRow) -> StorageResult<Row> {
    let mut out = Row::with_capacity(row.len());
    for column in row.columns() {
        let index = column.ordinal();
        let raw = row.try_get_raw(index)?;
        let value = if raw.is_null() {
            Value::Null
        } else {
            let kind = raw.type_info().name().to_string();
            match kind.as_str() {
                "INTEGER" => Value::Int(row.try_get(index)?),
                "REAL" => Value::Float(row.try_get(index)?),
                "BLOB" => {
                    let bytes: Vec<u8> = row.try_get(index)?;
                    Value::String(String::from_utf8_lossy(&bytes).into_owned())
                }
                _ => Value::String(row.try_get(index)?),
            }
        };
        out.insert(column.name().to_string(), value);
    }
    Ok(out)
}

fn failure(table: &str, err: sqlx::Error) -> StorageError {
    if let sqlx::Error::Database(db) = &err {
        if db.message().starts_with("no such table") {
            return StorageError::UnknownTable(table.to_string());
        }
    }
    err.into()
}

#[async_trait]
impl Persistence for SqliteStore {
    async fn ensure_table(&self, schema: &TableSchema) -> StorageResult<()> {
        let mut columns = vec![format!("{ID_COLUMN} INTEGER PRIMARY KEY")];
        for (name, kind) in schema.columns {
            columns.push(format!("{} {}", identifier(name)?, kind.sql()));
        }
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            identifier(schema.name)?,
            columns.join(", ")
        );
        sqlx::query(&sql).execute(&self.pool).await?;
        info!("Ensured table [{}]", schema.name);
        Ok(())
    }

    async fn insert(&self, table: &str, values: Row) -> StorageResult<Row> {
        let values: Vec<_> = values
            .into_iter()
            .filter(|(column, _)| column != ID_COLUMN)
            .collect();
        let sql = if values.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", identifier(table)?)
        } else {
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                identifier(table)?,
                identifiers(values.iter().map(|(column, _)| column.as_str()))?,
                vec!["?"; values.len()].join(", ")
            )
        };

        let mut query = sqlx::query(&sql);
        for (_, value) in &values {
            query = bind(query, value);
        }
        let id = query
            .execute(&self.pool)
            .await
            .map_err(|e| failure(table, e))?
            .last_insert_rowid();

        debug!("Inserted row {id} into [{table}]");
        self.fetch(table, id).await
    }

    async fn update(&self, table: &str, id: i64, values: Row) -> StorageResult<Row> {
        let values: Vec<_> = values
            .into_iter()
            .filter(|(column, _)| column != ID_COLUMN)
            .collect();
        if values.is_empty() {
            return self.fetch(table, id).await;
        }

        let assignments = values
            .iter()
            .map(|(column, _)| -> StorageResult<String> {
                Ok(format!("{} = ?", identifier(column)?))
            })
            .collect::<StorageResult<Vec<_>>>()?;
        let sql = format!(
            "UPDATE {} SET {} WHERE {ID_COLUMN} = ?",
            identifier(table)?,
            assignments.join(", ")
        );

        let mut query = sqlx::query(&sql);
        for (_, value) in &values {
            query = bind(query, value);
        }
        let affected = query
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| failure(table, e))?
            .rows_affected();
        if affected == 0 {
            return Err(StorageError::RowNotFound {
                table: table.to_string(),
                id,
            });
        }

        debug!("Updated row {id} of [{table}]");
        self.fetch(table, id).await
    }

    async fn select(
        &self,
        table: &str,
        filter: Option<&Row>,
        columns: Option<&[&str]>,
    ) -> StorageResult<Vec<Row>> {
        let conditions = filter.map(equalities).unwrap_or_default();
        let sql = format!(
            "SELECT {} FROM {}{}",
            projection(columns)?,
            identifier(table)?,
            filter_clause(&conditions)?
        );
        let rows = bind_conditions(sqlx::query(&sql), &conditions)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| failure(table, e))?;
        rows.iter().map(to_row).collect()
    }

    async fn search(
        &self,
        table: &str,
        conditions: &[Condition],
        page_size: u32,
        page_index: u32,
        columns: Option<&[&str]>,
    ) -> StorageResult<Vec<Row>> {
        let offset = i64::from(page_index.saturating_sub(1)) * i64::from(page_size);
        let sql = format!(
            "SELECT {} FROM {}{} ORDER BY {ID_COLUMN} LIMIT ? OFFSET ?",
            projection(columns)?,
            identifier(table)?,
            filter_clause(conditions)?
        );
        let rows = bind_conditions(sqlx::query(&sql), conditions)
            .bind(i64::from(page_size))
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| failure(table, e))?;
        rows.iter().map(to_row).collect()
    }

    async fn count(&self, table: &str, conditions: &[Condition]) -> StorageResult<u64> {
        let sql = format!(
            "SELECT COUNT({ID_COLUMN}) FROM {}{}",
            identifier(table)?,
            filter_clause(conditions)?
        );
        let row = bind_conditions(sqlx::query(&sql), conditions)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| failure(table, e))?;
        let count: i64 = row.try_get(0)?;
        Ok(count.max(0) as u64)
    }

    async fn delete(&self, table: &str, filter: &Row) -> StorageResult<()> {
        let conditions = equalities(filter);
        let sql = format!(
            "DELETE FROM {}{}",
            identifier(table)?,
            filter_clause(&conditions)?
        );
        let deleted = bind_conditions(sqlx::query(&sql), &conditions)
            .execute(&self.pool)
            .await
            .map_err(|e| failure(table, e))?
            .rows_affected();
        debug!("Deleted {deleted} row(s) from [{table}]");
        Ok(())
    }
}
