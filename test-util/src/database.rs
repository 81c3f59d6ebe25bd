//! Throwaway databases with the schema applied.

use forumd::{
    db::DbPool,
    forum::{Forum, ForumConfig},
    server::bootstrap::setup_database,
};
#[cfg(all(feature = "sqlite", not(feature = "postgres")))]
use tempfile::TempDir;

use crate::AnyError;

/// Connections each test pool may open.
const TEST_POOL_SIZE: u32 = 4;

/// A migrated database that lives as long as this value.
///
/// With `SQLite` the file sits in a private temporary directory, so pooled
/// connections share one database (an in-memory URL would give each
/// connection its own). With `PostgreSQL` the URL comes from
/// `FORUMD_TEST_DATABASE_URL` and the caller owns cleanup.
#[derive(Debug)]
pub struct TempDatabase {
    #[cfg(all(feature = "sqlite", not(feature = "postgres")))]
    _dir: TempDir,
    url: String,
}

impl TempDatabase {
    /// Create a fresh database.
    ///
    /// # Errors
    /// Returns an error if the temporary directory cannot be created or the
    /// path is not valid UTF-8.
    #[cfg(all(feature = "sqlite", not(feature = "postgres")))]
    pub fn new() -> Result<Self, AnyError> {
        let dir = TempDir::new()?;
        let path = dir.path().join("forumd.db");
        let url = path
            .to_str()
            .ok_or("database path is not valid UTF-8")?
            .to_owned();
        Ok(Self { _dir: dir, url })
    }

    /// Point at the database named by `FORUMD_TEST_DATABASE_URL`.
    ///
    /// # Errors
    /// Returns an error if the variable is unset.
    #[cfg(feature = "postgres")]
    pub fn new() -> Result<Self, AnyError> {
        let url = std::env::var("FORUMD_TEST_DATABASE_URL")
            .map_err(|_| "FORUMD_TEST_DATABASE_URL must name a scratch database")?;
        Ok(Self { url })
    }

    /// Connection string for the database.
    #[must_use]
    pub fn url(&self) -> &str { &self.url }

    /// Build a pool and apply migrations.
    ///
    /// # Errors
    /// Propagates pool, audit and migration failures.
    pub async fn pool(&self) -> Result<DbPool, AnyError> {
        Ok(setup_database(&self.url, TEST_POOL_SIZE).await?)
    }

    /// Build a [`Forum`] over a migrated pool.
    ///
    /// # Errors
    /// See [`TempDatabase::pool`].
    pub async fn forum(&self, config: ForumConfig) -> Result<Forum, AnyError> {
        Ok(Forum::new(self.pool().await?, config))
    }
}
