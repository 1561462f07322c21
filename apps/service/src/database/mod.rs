/// Database abstraction layer
///
/// Stores target configuration and per-target history samples in LibSQL
/// (SQLite), behind the [`Database`] trait the pipeline talks to.

pub mod migrations;
pub mod models;
pub mod repository;
pub mod stats;

pub use repository::{Database, DatabaseImpl};

use anyhow::Result;

/// Initialize database with schema
pub async fn initialize_database(conn: &libsql::Connection) -> Result<()> {
    migrations::run_migrations(conn).await
}

#[cfg(test)]
pub(crate) mod test_support {
    use anyhow::Result;
    use tempfile::{TempDir, tempdir};

    use super::DatabaseImpl;
    use crate::pool::open_pool;

    /// Fresh on-disk database; keep the `TempDir` alive for the test's duration
    pub async fn create_test_database() -> Result<(DatabaseImpl, TempDir)> {
        let temp_dir = tempdir()?;
        let pool = open_pool(temp_dir.path().join("test.db")).await?;

        let conn = pool.get().await?;
        super::initialize_database(&conn).await?;
        drop(conn);

        Ok((DatabaseImpl::new_from_pool(pool), temp_dir))
    }
}
