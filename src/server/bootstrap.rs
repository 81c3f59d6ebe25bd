//! Database bring-up shared by the daemon and administrative commands.

use anyhow::{Context, Result};
use tracing::info;

use super::cli::AppConfig;
use crate::{
    db::{DbPool, apply_migrations, audit_backend, establish_pool},
    forum::{Forum, ForumConfig},
};

/// Sets up the database connection pool and runs migrations.
///
/// Audits the backend's capabilities on the first pooled connection, then
/// applies any pending migrations.
///
/// # Errors
/// Returns an error when the pool cannot be built, the backend is too old, or
/// a migration fails.
pub async fn setup_database(database: &str, pool_size: u32) -> Result<DbPool> {
    let pool = establish_pool(database, pool_size)
        .await
        .with_context(|| format!("failed to open database '{database}'"))?;
    {
        let mut conn = pool.get().await.context("failed to get db connection")?;
        audit_backend(&mut conn)
            .await
            .context("database backend failed the capability audit")?;
        apply_migrations(&mut conn, database)
            .await
            .context("failed to apply migrations")?;
    }
    info!(database, pool_size, "database ready");
    Ok(pool)
}

/// Open the configured database and wrap it in a [`Forum`].
///
/// # Errors
/// See [`setup_database`].
pub async fn open_forum(cfg: &AppConfig) -> Result<Forum> {
    let pool = setup_database(&cfg.database, cfg.pool_size).await?;
    Ok(Forum::new(pool, ForumConfig::from(cfg)))
}
