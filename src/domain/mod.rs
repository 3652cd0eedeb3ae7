//! Reference services built on the registry and the persistence contract.

pub mod controller;
pub mod list;
pub mod pager;
pub mod user;

pub use controller::UserController;
pub use list::ObjectsList;
pub use pager::Pager;
pub use user::{User, UserFilter, UserStatus, UsersList, USERS_SCHEMA, USERS_TABLE};

use std::sync::Arc;

use crate::{
    config::Storage,
    storage::{MemoryStore, Persistence, SqliteStore, StorageError, StorageResult, TableSchema},
};

/// Layout of a table the reference services know how to create.
pub fn table_schema(name: &str) -> Option<&'static TableSchema> {
    [&USERS_SCHEMA].into_iter().find(|schema| schema.name == name)
}

/// Opens the configured backend and creates its tables.
pub async fn open_store(config: &Storage) -> StorageResult<Arc<dyn Persistence>> {
    let store: Arc<dyn Persistence> = match &config.path {
        Some(path) => Arc::new(SqliteStore::open(path).await?),
        None => Arc::new(MemoryStore::new()),
    };
    for table in &config.tables {
        let schema =
            table_schema(table).ok_or_else(|| StorageError::UnknownTable(table.clone()))?;
        store.ensure_table(schema).await?;
    }
    Ok(store)
}
