use std::path::{Path, PathBuf};

use sqlx::{
    Sqlite, Transaction,
    pool::PoolConnection,
    sqlite::{
        SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
    },
};

use crate::core::db::error::StoreError;

pub(super) struct StoreState {
    store_file: PathBuf,
    pool: SqlitePool,
}

impl std::fmt::Debug for StoreState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreState")
            .field("store_file", &self.store_file)
            .finish()
    }
}

impl StoreState {
    pub(super) async fn new<P: AsRef<Path>>(store_file: P) -> Result<Self, StoreError> {
        let store_file = store_file.as_ref().to_path_buf();
        if let Some(parent) = store_file.parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                return Err(StoreError::Storage(format!(
                    "store file parent does not exist: {parent:?}"
                )));
            }
        }

        let connect_opts = SqliteConnectOptions::new()
            .filename(&store_file)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_opts)
            .await?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Storage(e.to_string()))?;
        tracing::debug!(store_file = ?store_file, "store opened");
        Ok(Self { store_file, pool })
    }

    pub(super) async fn conn(&self) -> Result<PoolConnection<Sqlite>, StoreError> {
        Ok(self.pool.acquire().await?)
    }

    pub(super) async fn begin(&self) -> Result<Transaction<'static, Sqlite>, StoreError> {
        Ok(self.pool.begin().await?)
    }

    /// Flush the WAL into the main file and release all connections. The
    /// store file is then safe to copy or move; reopen with `new`.
    pub(super) async fn close(&self) -> Result<(), StoreError> {
        sqlx::query("PRAGMA wal_checkpoint(TRUNCATE);")
            .execute(&self.pool)
            .await?;
        self.pool.close().await;
        tracing::debug!(store_file = ?self.store_file, "store closed");
        Ok(())
    }
}
