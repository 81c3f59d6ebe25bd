//! Service façade over the stores.
//!
//! [`Forum`] owns the connection pool and is cheap to clone. Reads check out
//! a connection and are retried once on transient failures. Writes run on a
//! spawned task so a caller that goes away cannot cancel a transaction half
//! way through; they are never retried. Platform statistics and the
//! leaderboard are cached for a configurable window.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use chrono::Utc;
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{error, warn};

use crate::{
    db::{
        self,
        Contributor,
        DbConnection,
        DbPool,
        DeleteOutcome,
        PlatformStats,
        RecountReport,
        ToggleOutcome,
        TopicCounters,
        TopicDraft,
        TopicEdit,
        TopicPage,
        TopicQuery,
        validate,
    },
    error::{ForumError, ForumResult},
    models::{Category, EngagementKind, Member, Reply, Target, TargetType, Topic},
    privileges::{Actor, Privileges},
    thread::ThreadNode,
};

/// Tunables for the aggregation service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ForumConfig {
    /// Trailing window for the active member count.
    pub active_window: chrono::Duration,
    /// Leaderboard points per best answer.
    pub best_answer_bonus: u32,
    /// How long statistics may be served from cache. Zero disables caching.
    pub stats_ttl: Duration,
}

impl Default for ForumConfig {
    fn default() -> Self {
        Self {
            active_window: chrono::Duration::days(i64::from(cli_defs::DEFAULT_ACTIVE_WINDOW_DAYS)),
            best_answer_bonus: cli_defs::DEFAULT_BEST_ANSWER_BONUS,
            stats_ttl: Duration::from_secs(cli_defs::DEFAULT_STATS_CACHE_SECS),
        }
    }
}

impl From<&cli_defs::AppConfig> for ForumConfig {
    fn from(cfg: &cli_defs::AppConfig) -> Self {
        Self {
            active_window: chrono::Duration::days(i64::from(cfg.active_window_days)),
            best_answer_bonus: cfg.best_answer_bonus,
            stats_ttl: Duration::from_secs(cfg.stats_cache_secs),
        }
    }
}

/// A topic as shown on its own page.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicDetail {
    /// The topic, with the view just recorded.
    pub topic: Topic,
    /// Its category.
    pub category: Category,
    /// Assembled reply forest.
    pub thread: Vec<ThreadNode>,
}

struct Cached<T> {
    value: T,
    stored: Instant,
}

impl<T: Clone> Cached<T> {
    fn fresh(&self, ttl: Duration) -> Option<T> {
        (self.stored.elapsed() < ttl).then(|| self.value.clone())
    }
}

#[derive(Default)]
struct StatsCache {
    platform: RwLock<Option<Cached<PlatformStats>>>,
    leaderboard: RwLock<HashMap<u32, Cached<Vec<Contributor>>>>,
}

impl StatsCache {
    async fn clear(&self) {
        self.platform.write().await.take();
        self.leaderboard.write().await.clear();
    }
}

/// Entry point for every forum operation.
#[derive(Clone)]
pub struct Forum {
    pool: DbPool,
    config: Arc<ForumConfig>,
    cache: Arc<StatsCache>,
}

impl std::fmt::Debug for Forum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Forum")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Forum {
    /// Wrap an established pool.
    #[must_use]
    pub fn new(pool: DbPool, config: ForumConfig) -> Self {
        Self {
            pool,
            config: Arc::new(config),
            cache: Arc::new(StatsCache::default()),
        }
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &ForumConfig { &self.config }

    async fn read_once<T, F>(&self, f: &F) -> ForumResult<T>
    where
        F: for<'c> Fn(&'c mut DbConnection) -> BoxFuture<'c, ForumResult<T>>,
    {
        let mut conn = self.pool.get().await.map_err(ForumError::pool)?;
        f(&mut *conn).await
    }

    async fn read<T, F>(&self, op: &'static str, f: F) -> ForumResult<T>
    where
        F: for<'c> Fn(&'c mut DbConnection) -> BoxFuture<'c, ForumResult<T>>,
    {
        match self.read_once(&f).await {
            Err(err) if err.is_transient() => {
                warn!(op, error = %err, "transient read failure; retrying once");
                self.read_once(&f).await
            }
            other => other,
        }
    }

    async fn write<T, F>(&self, op: &'static str, f: F) -> ForumResult<T>
    where
        T: Send + 'static,
        F: for<'c> FnOnce(&'c mut DbConnection) -> BoxFuture<'c, ForumResult<T>> + Send + 'static,
    {
        let pool = self.pool.clone();
        let task = tokio::spawn(async move {
            let mut conn = pool.get().await.map_err(ForumError::pool)?;
            f(&mut *conn).await
        });
        task.await.map_err(|err| {
            error!(op, error = %err, "write task did not complete");
            ForumError::Interrupted
        })?
    }

    /// Create a topic authored by `actor`.
    ///
    /// # Errors
    /// See [`db::create_topic`].
    pub async fn create_topic(&self, actor: &Actor, draft: TopicDraft) -> ForumResult<Topic> {
        let actor = actor.clone();
        self.write("create_topic", move |conn| {
            Box::pin(async move { db::create_topic(conn, &actor, &draft).await })
        })
        .await
    }

    /// List live topics.
    ///
    /// # Errors
    /// See [`db::list_topics`].
    pub async fn list_topics(&self, actor: &Actor, query: TopicQuery) -> ForumResult<TopicPage> {
        actor.require(Privileges::READ)?;
        self.read("list_topics", move |conn| {
            let query = query.clone();
            Box::pin(async move { db::list_topics(conn, &query).await })
        })
        .await
    }

    /// Record a view and return the topic with its category and reply forest.
    ///
    /// # Errors
    /// Returns [`ForumError::NotFound`] for missing or deleted topics.
    pub async fn get_topic(&self, actor: &Actor, topic_id: i32) -> ForumResult<TopicDetail> {
        actor.require(Privileges::READ)?;
        self.write("get_topic", move |conn| {
            Box::pin(async move {
                db::record_view(conn, topic_id).await?;
                let topic = db::live_topic(conn, topic_id).await?;
                let category = db::category_by_id(conn, topic.category_id)
                    .await?
                    .ok_or(ForumError::NotFound("category"))?;
                let thread = db::load_thread(conn, topic_id).await?;
                Ok(TopicDetail {
                    topic,
                    category,
                    thread,
                })
            })
        })
        .await
    }

    /// Count one view of a topic.
    ///
    /// # Errors
    /// See [`db::record_view`].
    pub async fn record_view(&self, actor: &Actor, topic_id: i32) -> ForumResult<i32> {
        actor.require(Privileges::READ)?;
        self.write("record_view", move |conn| {
            Box::pin(async move { db::record_view(conn, topic_id).await })
        })
        .await
    }

    /// Reply forest of a topic, without recording a view.
    ///
    /// # Errors
    /// See [`db::load_thread`].
    pub async fn get_thread(&self, actor: &Actor, topic_id: i32) -> ForumResult<Vec<ThreadNode>> {
        actor.require(Privileges::READ)?;
        self.read("get_thread", move |conn| {
            Box::pin(async move { db::load_thread(conn, topic_id).await })
        })
        .await
    }

    /// Edit a topic.
    ///
    /// # Errors
    /// See [`db::edit_topic`].
    pub async fn edit_topic(
        &self,
        actor: &Actor,
        topic_id: i32,
        edit: TopicEdit,
    ) -> ForumResult<Topic> {
        let actor = actor.clone();
        self.write("edit_topic", move |conn| {
            Box::pin(async move { db::edit_topic(conn, &actor, topic_id, &edit).await })
        })
        .await
    }

    /// Delete a topic.
    ///
    /// # Errors
    /// See [`db::delete_topic`].
    pub async fn delete_topic(&self, actor: &Actor, topic_id: i32) -> ForumResult<DeleteOutcome> {
        let actor = actor.clone();
        self.write("delete_topic", move |conn| {
            Box::pin(async move { db::delete_topic(conn, &actor, topic_id).await })
        })
        .await
    }

    /// Pin or unpin a topic.
    ///
    /// # Errors
    /// See [`db::set_pinned`].
    pub async fn pin_topic(&self, actor: &Actor, topic_id: i32, pinned: bool) -> ForumResult<Topic> {
        let actor = actor.clone();
        self.write("pin_topic", move |conn| {
            Box::pin(async move { db::set_pinned(conn, &actor, topic_id, pinned).await })
        })
        .await
    }

    /// Add a reply.
    ///
    /// # Errors
    /// See [`db::add_reply`].
    pub async fn add_reply(
        &self,
        actor: &Actor,
        topic_id: i32,
        body: String,
        parent_reply_id: Option<i32>,
    ) -> ForumResult<Reply> {
        let actor = actor.clone();
        self.write("add_reply", move |conn| {
            Box::pin(async move {
                db::add_reply(conn, &actor, topic_id, &body, parent_reply_id).await
            })
        })
        .await
    }

    /// Edit a reply.
    ///
    /// # Errors
    /// See [`db::edit_reply`].
    pub async fn edit_reply(&self, actor: &Actor, reply_id: i32, body: String) -> ForumResult<Reply> {
        let actor = actor.clone();
        self.write("edit_reply", move |conn| {
            Box::pin(async move { db::edit_reply(conn, &actor, reply_id, &body).await })
        })
        .await
    }

    /// Delete a reply.
    ///
    /// # Errors
    /// See [`db::delete_reply`].
    pub async fn delete_reply(&self, actor: &Actor, reply_id: i32) -> ForumResult<DeleteOutcome> {
        let actor = actor.clone();
        self.write("delete_reply", move |conn| {
            Box::pin(async move { db::delete_reply(conn, &actor, reply_id).await })
        })
        .await
    }

    /// Mark the accepted answer of a topic.
    ///
    /// # Errors
    /// See [`db::mark_best_answer`].
    pub async fn mark_best_answer(
        &self,
        actor: &Actor,
        topic_id: i32,
        reply_id: i32,
    ) -> ForumResult<Topic> {
        let actor = actor.clone();
        self.write("mark_best_answer", move |conn| {
            Box::pin(async move { db::mark_best_answer(conn, &actor, topic_id, reply_id).await })
        })
        .await
    }

    /// Toggle a like or bookmark.
    ///
    /// # Errors
    /// See [`db::toggle`].
    pub async fn toggle(
        &self,
        actor: &Actor,
        target: Target,
        kind: EngagementKind,
    ) -> ForumResult<ToggleOutcome> {
        let actor = actor.clone();
        self.write("toggle", move |conn| {
            Box::pin(async move { db::toggle(conn, &actor, target, kind).await })
        })
        .await
    }

    /// Whether the actor holds a `kind` record on `target`.
    ///
    /// # Errors
    /// See [`db::is_active`].
    pub async fn is_active(
        &self,
        actor: &Actor,
        target: Target,
        kind: EngagementKind,
    ) -> ForumResult<bool> {
        actor.require(Privileges::READ)?;
        let user_id = actor.user_id;
        self.read("is_active", move |conn| {
            Box::pin(async move { db::is_active(conn, user_id, target, kind).await })
        })
        .await
    }

    /// Live targets on which the actor holds a `kind` record.
    ///
    /// # Errors
    /// See [`db::list_active_targets`].
    pub async fn list_active_targets(
        &self,
        actor: &Actor,
        target_type: TargetType,
        kind: EngagementKind,
    ) -> ForumResult<Vec<i32>> {
        actor.require(Privileges::READ)?;
        let user_id = actor.user_id;
        self.read("list_active_targets", move |conn| {
            Box::pin(async move { db::list_active_targets(conn, user_id, target_type, kind).await })
        })
        .await
    }

    /// All categories.
    ///
    /// # Errors
    /// Returns any storage error.
    pub async fn list_categories(&self, actor: &Actor) -> ForumResult<Vec<Category>> {
        actor.require(Privileges::READ)?;
        self.read("list_categories", move |conn| {
            Box::pin(async move { Ok(db::list_categories(conn).await?) })
        })
        .await
    }

    /// Create a category. Operator surface; no actor is involved.
    ///
    /// # Errors
    /// See [`db::create_category`].
    pub async fn create_category(&self, slug: String, name: String) -> ForumResult<Category> {
        self.write("create_category", move |conn| {
            Box::pin(async move { db::create_category(conn, &slug, &name).await })
        })
        .await
    }

    /// Insert or rename a member in the directory.
    ///
    /// # Errors
    /// See [`db::upsert_member`].
    pub async fn upsert_member(&self, id: i32, display_name: String) -> ForumResult<Member> {
        self.write("upsert_member", move |conn| {
            Box::pin(async move { db::upsert_member(conn, id, &display_name).await })
        })
        .await
    }

    /// Platform totals, served from cache when fresh.
    ///
    /// # Errors
    /// See [`db::platform_stats`].
    pub async fn platform_stats(&self, actor: &Actor) -> ForumResult<PlatformStats> {
        actor.require(Privileges::READ)?;
        let ttl = self.config.stats_ttl;
        if let Some(hit) = self
            .cache
            .platform
            .read()
            .await
            .as_ref()
            .and_then(|c| c.fresh(ttl))
        {
            return Ok(hit);
        }
        let since = Utc::now().naive_utc() - self.config.active_window;
        let stats = self
            .read("platform_stats", move |conn| {
                Box::pin(async move { db::platform_stats(conn, since).await })
            })
            .await?;
        if !ttl.is_zero() {
            *self.cache.platform.write().await = Some(Cached {
                value: stats,
                stored: Instant::now(),
            });
        }
        Ok(stats)
    }

    /// Leaderboard of the top `limit` contributors, served from cache when
    /// fresh.
    ///
    /// # Errors
    /// Returns [`ForumError::Validation`] for a limit outside `1..=100`, or
    /// any storage error.
    pub async fn top_contributors(&self, actor: &Actor, limit: u32) -> ForumResult<Vec<Contributor>> {
        actor.require(Privileges::READ)?;
        let limit = validate::page_size("limit", limit)?;
        let ttl = self.config.stats_ttl;
        if let Some(hit) = self
            .cache
            .leaderboard
            .read()
            .await
            .get(&limit)
            .and_then(|c| c.fresh(ttl))
        {
            return Ok(hit);
        }
        let bonus = self.config.best_answer_bonus;
        let board = self
            .read("top_contributors", move |conn| {
                Box::pin(async move { db::top_contributors(conn, limit, bonus).await })
            })
            .await?;
        if !ttl.is_zero() {
            self.cache.leaderboard.write().await.insert(
                limit,
                Cached {
                    value: board.clone(),
                    stored: Instant::now(),
                },
            );
        }
        Ok(board)
    }

    /// Rebuild one topic's counters. Requires
    /// [`Privileges::MANAGE_COUNTERS`].
    ///
    /// # Errors
    /// See [`db::recount_topic`].
    pub async fn recount_topic(&self, actor: &Actor, topic_id: i32) -> ForumResult<TopicCounters> {
        actor.require(Privileges::MANAGE_COUNTERS)?;
        let counters = self
            .write("recount_topic", move |conn| {
                Box::pin(async move { db::recount_topic(conn, topic_id).await })
            })
            .await?;
        self.cache.clear().await;
        Ok(counters)
    }

    /// Rebuild every counter. Operator surface.
    ///
    /// # Errors
    /// See [`db::recount_all`].
    pub async fn recount_all(&self) -> ForumResult<RecountReport> {
        let report = self
            .write("recount_all", |conn| {
                Box::pin(async move { db::recount_all(conn).await })
            })
            .await?;
        self.cache.clear().await;
        Ok(report)
    }
}
