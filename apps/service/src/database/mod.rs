/// Database abstraction layer
///
/// Local LibSQL (SQLite) storage for the endpoint catalog, sample history,
/// alert cooldowns and the digest cache.

pub mod migrations;
pub mod models;
pub mod repository;

pub use repository::{Database, DatabaseImpl};

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

use crate::pool::open_pool;

/// Initialize database with schema
pub async fn initialize_database(conn: &libsql::Connection) -> Result<()> {
    migrations::run_migrations(conn).await
}

/// Open the database file at `path`, creating and migrating it as needed
pub async fn open_database(path: impl AsRef<Path>) -> Result<Arc<DatabaseImpl>> {
    if let Some(parent) = path.as_ref().parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let pool = open_pool(path).await?;
    {
        let conn = pool.get().await?;
        initialize_database(&conn).await?;
    }

    Ok(Arc::new(DatabaseImpl::new_from_pool(pool)))
}
