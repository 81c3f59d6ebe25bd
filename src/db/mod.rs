//! Manage database connections and forum queries.
//!
//! This module tree exposes helpers for creating pooled Diesel connections,
//! running embedded migrations, auditing backend capabilities, and the
//! stores behind the forum: topics, replies, engagement, counters and
//! aggregate statistics.

mod audit;
mod categories;
mod connection;
mod counters;
mod engagement;
mod members;
mod migrations;
mod replies;
mod stats;
mod topics;
pub mod validate;


#[cfg(all(feature = "postgres", not(feature = "sqlite")))]
pub use self::audit::audit_postgres_features;
#[cfg(feature = "sqlite")]
pub use self::audit::audit_sqlite_features;
pub use self::{
    categories::{category_by_id, category_by_slug, create_category, list_categories},
    connection::{Backend, DbConnection, DbPool, MIGRATIONS, connect, establish_pool},
    counters::{
        CounterField,
        CounterTarget,
        RecountReport,
        TopicCounters,
        adjust,
        recount_all,
        recount_topic,
    },
    engagement::{ToggleOutcome, is_active, list_active_targets, toggle},
    members::{display_names, fallback_name, upsert_member},
    migrations::{apply_migrations, run_migrations},
    replies::{add_reply, delete_reply, edit_reply, live_reply, load_thread, mark_best_answer},
    stats::{Contributor, PlatformStats, platform_stats, top_contributors},
    topics::{
        DeleteOutcome,
        TopicDraft,
        TopicEdit,
        TopicPage,
        TopicQuery,
        create_topic,
        delete_topic,
        edit_topic,
        list_topics,
        live_topic,
        record_view,
        set_pinned,
    },
};

/// Run the capability audit for the active backend.
///
/// # Errors
/// Returns any error reported by the backend audit.
#[must_use = "handle the result"]
pub async fn audit_backend(conn: &mut DbConnection) -> diesel::QueryResult<()> {
    cfg_if::cfg_if! {
        if #[cfg(feature = "sqlite")] {
            audit_sqlite_features(conn).await
        } else {
            audit_postgres_features(conn).await
        }
    }
}
