//! Connection and pool helpers for database access.

use cfg_if::cfg_if;
#[cfg(feature = "sqlite")]
use diesel::{ConnectionError, ConnectionResult};
#[cfg(feature = "sqlite")]
use diesel_async::{AsyncConnection, SimpleAsyncConnection};
#[cfg(feature = "sqlite")]
use diesel_async::pooled_connection::ManagerConfig;
use diesel_async::pooled_connection::{AsyncDieselConnectionManager, PoolError, bb8::Pool};
#[cfg(feature = "sqlite")]
use diesel_async::sync_connection_wrapper::SyncConnectionWrapper;
use diesel_migrations::{EmbeddedMigrations, embed_migrations};
#[cfg(feature = "sqlite")]
use futures_util::future::BoxFuture;

cfg_if! {
    if #[cfg(all(feature = "sqlite", feature = "postgres", not(feature = "lint")))] {
        compile_error!("Either feature 'sqlite' or 'postgres' must be enabled, not both");
    } else if #[cfg(feature = "sqlite")] {
        use diesel::sqlite::{Sqlite, SqliteConnection};
        /// Database backend type for `SQLite`.
        pub type Backend = Sqlite;
        /// Embedded database migrations for `SQLite`.
        pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations/sqlite");
        /// Connection type for `SQLite` database access.
        pub type DbConnection = SyncConnectionWrapper<SqliteConnection>;
        /// Connection pool type for `SQLite`.
        pub type DbPool = Pool<DbConnection>;
    } else if #[cfg(all(feature = "postgres", not(feature = "sqlite")))] {
        use diesel::pg::Pg;
        use diesel_async::AsyncPgConnection;
        /// Database backend type for PostgreSQL.
        pub type Backend = Pg;
        /// Embedded database migrations for PostgreSQL.
        pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations/postgres");
        /// Connection type for PostgreSQL database access.
        pub type DbConnection = AsyncPgConnection;
        /// Connection pool type for PostgreSQL.
        pub type DbPool = Pool<DbConnection>;
    } else {
        compile_error!("Either feature 'sqlite' or 'postgres' must be enabled");
    }
}

/// Per-connection settings. Foreign keys are off by default in `SQLite`;
/// WAL and a busy timeout let concurrent writers queue instead of failing.
#[cfg(feature = "sqlite")]
const SQLITE_PRAGMAS: &str =
    "PRAGMA foreign_keys = ON; PRAGMA journal_mode = WAL; PRAGMA busy_timeout = 5000;";

/// Open a single connection with the backend's session settings applied.
///
/// # Errors
/// Returns any error raised while connecting or applying the settings.
#[cfg(feature = "sqlite")]
pub async fn connect(database_url: &str) -> ConnectionResult<DbConnection> {
    let mut conn = DbConnection::establish(database_url).await?;
    conn.batch_execute(SQLITE_PRAGMAS)
        .await
        .map_err(ConnectionError::CouldntSetupConfiguration)?;
    Ok(conn)
}

/// Open a single connection with the backend's session settings applied.
///
/// # Errors
/// Returns any error raised while connecting.
#[cfg(all(feature = "postgres", not(feature = "sqlite")))]
pub async fn connect(database_url: &str) -> diesel::ConnectionResult<DbConnection> {
    use diesel_async::AsyncConnection;
    DbConnection::establish(database_url).await
}

/// Statement that takes the `SQLite` write lock without changing any row.
#[cfg(feature = "sqlite")]
const SQLITE_WRITE_LOCK: &str = "UPDATE categories SET topic_count = topic_count WHERE 0";

/// Claim the write lock as the first statement of a read-then-write
/// transaction.
///
/// A deferred `SQLite` transaction that reads first cannot upgrade to a
/// writer once another connection has committed, and fails at once with
/// `SQLITE_BUSY` regardless of the busy timeout. Writing first makes it queue
/// like any other writer. Postgres locks rows instead, so this is a no-op
/// there.
pub(crate) async fn lock_for_write(conn: &mut DbConnection) -> diesel::QueryResult<()> {
    cfg_if! {
        if #[cfg(feature = "sqlite")] {
            conn.batch_execute(SQLITE_WRITE_LOCK).await
        } else {
            let _ = conn;
            Ok(())
        }
    }
}

#[cfg(feature = "sqlite")]
fn sqlite_setup(url: &str) -> BoxFuture<'_, ConnectionResult<DbConnection>> {
    Box::pin(connect(url))
}

/// Create a pooled connection to the configured database.
///
/// Pooled `SQLite` connections get the same pragmas as [`connect`]. Note that
/// every `:memory:` connection is a distinct database, so pools should point
/// at a file.
///
/// # Examples
///
/// ```no_run
/// use forumd::db::establish_pool;
/// async fn example() {
///     let pool = establish_pool("forumd.db", 4)
///         .await
///         .expect("failed to build pool");
/// }
/// ```
///
/// # Errors
/// Returns any error reported by the underlying connection pool builder.
pub async fn establish_pool(database_url: &str, max_size: u32) -> Result<DbPool, PoolError> {
    cfg_if! {
        if #[cfg(feature = "sqlite")] {
            let mut manager_config = ManagerConfig::default();
            manager_config.custom_setup = Box::new(sqlite_setup);
            let manager = AsyncDieselConnectionManager::<DbConnection>::new_with_config(
                database_url,
                manager_config,
            );
        } else {
            let manager = AsyncDieselConnectionManager::<DbConnection>::new(database_url);
        }
    }
    Pool::builder().max_size(max_size.max(1)).build(manager).await
}
