//! Counter synchronizer.
//!
//! Every denormalised count (`reply_count`, `like_count`, `view_count` on
//! topics, `like_count` on replies and `topic_count` on categories) changes
//! only through [`adjust`], a single `UPDATE .. SET c = c + delta` statement.
//! The recount functions rebuild counts from the stored records and are the
//! repair path, not the hot path.

use std::fmt;

use cfg_if::cfg_if;
use diesel::{
    QueryableByName,
    prelude::*,
    sql_query,
    sql_types::Integer,
};
use diesel_async::{AsyncConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::connection::DbConnection;
use crate::error::{ForumError, ForumResult};

/// Row owning a counter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CounterTarget {
    /// A topic row.
    Topic(i32),
    /// A reply row.
    Reply(i32),
    /// A category row.
    Category(i32),
}

impl CounterTarget {
    const fn entity(self) -> &'static str {
        match self {
            Self::Topic(_) => "topic",
            Self::Reply(_) => "reply",
            Self::Category(_) => "category",
        }
    }
}

impl fmt::Display for CounterTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Topic(id) | Self::Reply(id) | Self::Category(id) => {
                write!(f, "{} {id}", self.entity())
            }
        }
    }
}

/// Counter column on a [`CounterTarget`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CounterField {
    /// `topics.reply_count`.
    Replies,
    /// `topics.like_count` or `replies.like_count`.
    Likes,
    /// `topics.view_count`.
    Views,
    /// `categories.topic_count`.
    Topics,
}

impl fmt::Display for CounterField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Replies => "reply_count",
            Self::Likes => "like_count",
            Self::Views => "view_count",
            Self::Topics => "topic_count",
        })
    }
}

/// Atomically add `delta` to a counter and return its new value.
///
/// Callers run this inside the same transaction as the record change that
/// motivates it, so a failure here rolls both back.
///
/// # Errors
/// Returns [`ForumError::NotFound`] when the row is missing,
/// [`ForumError::Conflict`] when `field` does not exist on the target or the
/// counter would become negative, and any database error.
#[must_use = "handle the result"]
pub async fn adjust(
    conn: &mut DbConnection,
    target: CounterTarget,
    field: CounterField,
    delta: i32,
) -> ForumResult<i32> {
    use crate::schema::{categories::dsl as c, replies::dsl as r, topics::dsl as t};
    let updated: Option<i32> = match (target, field) {
        (CounterTarget::Topic(id), CounterField::Replies) => {
            diesel::update(t::topics.find(id))
                .set(t::reply_count.eq(t::reply_count + delta))
                .returning(t::reply_count)
                .get_result(conn)
                .await
                .optional()?
        }
        (CounterTarget::Topic(id), CounterField::Likes) => {
            diesel::update(t::topics.find(id))
                .set(t::like_count.eq(t::like_count + delta))
                .returning(t::like_count)
                .get_result(conn)
                .await
                .optional()?
        }
        (CounterTarget::Topic(id), CounterField::Views) => {
            diesel::update(t::topics.find(id))
                .set(t::view_count.eq(t::view_count + delta))
                .returning(t::view_count)
                .get_result(conn)
                .await
                .optional()?
        }
        (CounterTarget::Reply(id), CounterField::Likes) => {
            diesel::update(r::replies.find(id))
                .set(r::like_count.eq(r::like_count + delta))
                .returning(r::like_count)
                .get_result(conn)
                .await
                .optional()?
        }
        (CounterTarget::Category(id), CounterField::Topics) => {
            diesel::update(c::categories.find(id))
                .set(c::topic_count.eq(c::topic_count + delta))
                .returning(c::topic_count)
                .get_result(conn)
                .await
                .optional()?
        }
        (target, field) => {
            return Err(ForumError::conflict(format!(
                "{field} is not tracked on {}",
                target.entity()
            )));
        }
    };
    let value = updated.ok_or(ForumError::NotFound(target.entity()))?;
    if value < 0 {
        return Err(ForumError::conflict(format!(
            "{field} on {target} would become negative"
        )));
    }
    debug!(%target, %field, delta, value, "counter adjusted");
    Ok(value)
}

/// Counts rebuilt for a single topic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, QueryableByName, Serialize, Deserialize)]
pub struct TopicCounters {
    /// Stored replies, tombstones included.
    #[diesel(sql_type = Integer)]
    pub reply_count: i32,
    /// Likes on the topic itself.
    #[diesel(sql_type = Integer)]
    pub like_count: i32,
}

/// Rows touched by [`recount_all`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecountReport {
    /// Topics whose counters were rebuilt.
    pub topics: usize,
    /// Replies whose counters were rebuilt.
    pub replies: usize,
    /// Categories whose counters were rebuilt.
    pub categories: usize,
}

const TOPIC_COUNTS: &str = "UPDATE topics SET \
     reply_count = (SELECT COUNT(*) FROM replies r WHERE r.topic_id = topics.id), \
     like_count = (SELECT COUNT(*) FROM engagements e \
         WHERE e.target_type = 'topic' AND e.target_id = topics.id AND e.kind = 'like')";

const REPLY_COUNTS: &str = "UPDATE replies SET \
     like_count = (SELECT COUNT(*) FROM engagements e \
         WHERE e.target_type = 'reply' AND e.target_id = replies.id AND e.kind = 'like')";

const CATEGORY_COUNTS: &str = "UPDATE categories SET \
     topic_count = (SELECT COUNT(*) FROM topics t \
         WHERE t.category_id = categories.id AND t.deleted = FALSE)";

cfg_if! {
    if #[cfg(feature = "sqlite")] {
        const ID_PARAM: &str = "?";
    } else {
        const ID_PARAM: &str = "$1";
    }
}

/// Rebuild a topic's `reply_count` and `like_count`, and the `like_count`
/// of each of its replies, from the stored records.
///
/// # Errors
/// Returns [`ForumError::NotFound`] when the topic does not exist, or any
/// database error.
#[must_use = "handle the result"]
pub async fn recount_topic(conn: &mut DbConnection, topic_id: i32) -> ForumResult<TopicCounters> {
    conn.transaction::<_, ForumError, _>(|conn| {
        Box::pin(async move {
            let counters: Option<TopicCounters> = sql_query(format!(
                "{TOPIC_COUNTS} WHERE topics.id = {ID_PARAM} RETURNING reply_count, like_count"
            ))
            .bind::<Integer, _>(topic_id)
            .get_result(conn)
            .await
            .optional()?;
            let counters = counters.ok_or(ForumError::NotFound("topic"))?;
            sql_query(format!("{REPLY_COUNTS} WHERE replies.topic_id = {ID_PARAM}"))
                .bind::<Integer, _>(topic_id)
                .execute(conn)
                .await?;
            info!(topic_id, ?counters, "topic counters rebuilt");
            Ok(counters)
        })
    })
    .await
}

/// Rebuild every counter in the database in one transaction.
///
/// # Errors
/// Returns any database error.
#[must_use = "handle the result"]
pub async fn recount_all(conn: &mut DbConnection) -> ForumResult<RecountReport> {
    conn.transaction::<_, ForumError, _>(|conn| {
        Box::pin(async move {
            let report = RecountReport {
                topics: sql_query(TOPIC_COUNTS).execute(conn).await?,
                replies: sql_query(REPLY_COUNTS).execute(conn).await?,
                categories: sql_query(CATEGORY_COUNTS).execute(conn).await?,
            };
            info!(?report, "all counters rebuilt");
            Ok(report)
        })
    })
    .await
}
