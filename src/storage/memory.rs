//! In-memory reference backend.

use std::collections::BTreeMap;

use async_trait::async_trait;
use dashmap::DashMap;
use log::{debug, info};

use crate::core::Value;

use super::{
    equalities, Condition, Persistence, Row, StorageError, StorageResult, TableSchema,
};

const ID_COLUMN: &str = "id";

#[derive(Default)]
struct Table {
    last_id: i64,
    rows: BTreeMap<i64, Row>,
}

impl Table {
    fn matching<'a>(&'a self, conditions: &'a [Condition]) -> impl Iterator<Item = &'a Row> + 'a {
        self.rows
            .values()
            .filter(move |row| conditions.iter().all(|c| c.matches(row)))
    }
}

/// Tables of rows kept in process memory, ids assigned from 1.
#[derive(Default)]
pub struct MemoryStore {
    tables: DashMap<String, Table>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates every table in `names` that does not exist yet.
    pub fn with_tables<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let store = Self::new();
        for name in names {
            store.create_table(name.as_ref());
        }
        store
    }

    pub fn create_table(&self, name: &str) {
        if !self.tables.contains_key(name) {
            info!("Creating table [{name}]");
            self.tables.insert(name.to_string(), Table::default());
        }
    }

    fn missing(table: &str) -> StorageError {
        StorageError::UnknownTable(table.to_string())
    }
}

fn project(row: &Row, columns: Option<&[&str]>) -> Row {
    match columns {
        None => row.clone(),
        Some(columns) => columns
            .iter()
            .map(|column| {
                let value = row.get(*column).cloned().unwrap_or_default();
                (column.to_string(), value)
            })
            .collect(),
    }
}

#[async_trait]
impl Persistence for MemoryStore {
    async fn ensure_table(&self, schema: &TableSchema) -> StorageResult<()> {
        self.create_table(schema.name);
        Ok(())
    }

    async fn insert(&self, table: &str, values: Row) -> StorageResult<Row> {
        let mut entry = self.tables.get_mut(table).ok_or_else(|| Self::missing(table))?;
        entry.last_id += 1;
        let id = entry.last_id;

        let mut row = Row::with_capacity(values.len() + 1);
        row.insert(ID_COLUMN.to_string(), Value::Int(id));
        row.extend(values.into_iter().filter(|(column, _)| column != ID_COLUMN));
        entry.rows.insert(id, row.clone());

        debug!("Inserted row {id} into [{table}]");
        Ok(row)
    }

    async fn update(&self, table: &str, id: i64, values: Row) -> StorageResult<Row> {
        let mut entry = self.tables.get_mut(table).ok_or_else(|| Self::missing(table))?;
        let row = entry
            .rows
            .get_mut(&id)
            .ok_or_else(|| StorageError::RowNotFound {
                table: table.to_string(),
                id,
            })?;
        for (column, value) in values {
            if column != ID_COLUMN {
                row.insert(column, value);
            }
        }
        debug!("Updated row {id} of [{table}]");
        Ok(row.clone())
    }

    async fn select(
        &self,
        table: &str,
        filter: Option<&Row>,
        columns: Option<&[&str]>,
    ) -> StorageResult<Vec<Row>> {
        let entry = self.tables.get(table).ok_or_else(|| Self::missing(table))?;
        let conditions = filter.map(equalities).unwrap_or_default();
        Ok(entry
            .matching(&conditions)
            .map(|row| project(row, columns))
            .collect())
    }

    async fn search(
        &self,
        table: &str,
        conditions: &[Condition],
        page_size: u32,
        page_index: u32,
        columns: Option<&[&str]>,
    ) -> StorageResult<Vec<Row>> {
        let entry = self.tables.get(table).ok_or_else(|| Self::missing(table))?;
        let offset = page_index.saturating_sub(1) as usize * page_size as usize;
        Ok(entry
            .matching(conditions)
            .skip(offset)
            .take(page_size as usize)
            .map(|row| project(row, columns))
            .collect())
    }

    async fn count(&self, table: &str, conditions: &[Condition]) -> StorageResult<u64> {
        let entry = self.tables.get(table).ok_or_else(|| Self::missing(table))?;
        Ok(entry.matching(conditions).count() as u64)
    }

    async fn delete(&self, table: &str, filter: &Row) -> StorageResult<()> {
        let mut entry = self.tables.get_mut(table).ok_or_else(|| Self::missing(table))?;
        let conditions = equalities(filter);
        let before = entry.rows.len();
        entry
            .rows
            .retain(|_, row| !conditions.iter().all(|c| c.matches(row)));
        debug!("Deleted {} row(s) from [{table}]", before - entry.rows.len());
        Ok(())
    }
}
