//! Engagement ledger: per-user likes and bookmarks.
//!
//! The composite primary key on `engagements` is the only guard against
//! duplicates. A toggle first tries to delete the caller's record; only when
//! nothing was deleted does it insert, with `ON CONFLICT DO NOTHING` so a
//! racing insert cannot fail or double count.

use chrono::Utc;
use diesel::{dsl::exists, prelude::*};
use diesel_async::{AsyncConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    connection::DbConnection,
    counters::{CounterField, CounterTarget, adjust},
    topics::topic_is_live,
};
use crate::{
    error::{ForumError, ForumResult},
    models::{EngagementKind, NewEngagement, Target, TargetType},
    privileges::{Actor, Privileges},
};

/// Result of [`toggle`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleOutcome {
    /// Whether the caller's record exists after the toggle.
    pub active: bool,
    /// The target's `like_count` for likes, or its bookmark total.
    pub new_count: i64,
}

const fn counter_target(target: Target) -> CounterTarget {
    match target.target_type {
        TargetType::Topic => CounterTarget::Topic(target.target_id),
        TargetType::Reply => CounterTarget::Reply(target.target_id),
    }
}

async fn target_is_live(conn: &mut DbConnection, target: Target) -> ForumResult<bool> {
    use crate::schema::replies::dsl as r;
    match target.target_type {
        TargetType::Topic => topic_is_live(conn, target.target_id).await,
        TargetType::Reply => {
            let live = diesel::select(exists(
                r::replies.find(target.target_id).filter(r::deleted.eq(false)),
            ))
            .get_result(conn)
            .await?;
            Ok(live)
        }
    }
}

async fn like_count(conn: &mut DbConnection, target: Target) -> ForumResult<i64> {
    use crate::schema::{replies::dsl as r, topics::dsl as t};
    let count: Option<i32> = match target.target_type {
        TargetType::Topic => {
            t::topics
                .find(target.target_id)
                .select(t::like_count)
                .first(conn)
                .await
                .optional()?
        }
        TargetType::Reply => {
            r::replies
                .find(target.target_id)
                .select(r::like_count)
                .first(conn)
                .await
                .optional()?
        }
    };
    count
        .map(i64::from)
        .ok_or(ForumError::NotFound(target.target_type.as_str()))
}

async fn record_count(
    conn: &mut DbConnection,
    target: Target,
    kind: EngagementKind,
) -> ForumResult<i64> {
    use crate::schema::engagements::dsl as e;
    let count = e::engagements
        .filter(e::target_type.eq(target.target_type.as_str()))
        .filter(e::target_id.eq(target.target_id))
        .filter(e::kind.eq(kind.as_str()))
        .count()
        .get_result(conn)
        .await?;
    Ok(count)
}

/// Flip the actor's `kind` record on `target`.
///
/// Likes move the target's `like_count` in the same transaction. Removing a
/// record is allowed even after the target was deleted; creating one needs a
/// live target.
///
/// # Errors
/// Returns [`ForumError::Authorization`] when the actor may not engage and
/// [`ForumError::NotFound`] when a new record would point at a missing or
/// deleted target.
#[must_use = "handle the result"]
pub async fn toggle(
    conn: &mut DbConnection,
    actor: &Actor,
    target: Target,
    kind: EngagementKind,
) -> ForumResult<ToggleOutcome> {
    use crate::schema::engagements::dsl as e;
    actor.require(Privileges::ENGAGE)?;
    conn.transaction::<_, ForumError, _>(|conn| {
        Box::pin(async move {
            let removed = diesel::delete(
                e::engagements
                    .filter(e::user_id.eq(actor.user_id))
                    .filter(e::target_type.eq(target.target_type.as_str()))
                    .filter(e::target_id.eq(target.target_id))
                    .filter(e::kind.eq(kind.as_str())),
            )
            .execute(conn)
            .await?;

            let (active, delta) = if removed > 0 {
                (false, -1)
            } else {
                if !target_is_live(conn, target).await? {
                    return Err(ForumError::NotFound(target.target_type.as_str()));
                }
                let row = NewEngagement {
                    user_id: actor.user_id,
                    target_type: target.target_type.as_str(),
                    target_id: target.target_id,
                    kind: kind.as_str(),
                    organization_id: &actor.organization_id,
                    created_at: Utc::now().naive_utc(),
                };
                let inserted = diesel::insert_into(e::engagements)
                    .values(&row)
                    .on_conflict_do_nothing()
                    .execute(conn)
                    .await?;
                (true, if inserted > 0 { 1 } else { 0 })
            };

            let new_count = match kind {
                EngagementKind::Like if delta != 0 => i64::from(
                    adjust(conn, counter_target(target), CounterField::Likes, delta).await?,
                ),
                EngagementKind::Like => like_count(conn, target).await?,
                EngagementKind::Bookmark => record_count(conn, target, kind).await?,
            };
            debug!(
                user_id = actor.user_id,
                target = ?target,
                %kind,
                active,
                new_count,
                "engagement toggled"
            );
            Ok(ToggleOutcome { active, new_count })
        })
    })
    .await
}

/// Whether `user_id` currently holds a `kind` record on `target`.
///
/// # Errors
/// Returns any database error.
#[must_use = "handle the result"]
pub async fn is_active(
    conn: &mut DbConnection,
    user_id: i32,
    target: Target,
    kind: EngagementKind,
) -> ForumResult<bool> {
    use crate::schema::engagements::dsl as e;
    let active = diesel::select(exists(
        e::engagements
            .filter(e::user_id.eq(user_id))
            .filter(e::target_type.eq(target.target_type.as_str()))
            .filter(e::target_id.eq(target.target_id))
            .filter(e::kind.eq(kind.as_str())),
    ))
    .get_result(conn)
    .await?;
    Ok(active)
}

/// Identifiers of live targets on which `user_id` holds a `kind` record,
/// most recent first.
///
/// # Errors
/// Returns any database error.
#[must_use = "handle the result"]
pub async fn list_active_targets(
    conn: &mut DbConnection,
    user_id: i32,
    target_type: TargetType,
    kind: EngagementKind,
) -> ForumResult<Vec<i32>> {
    use crate::schema::{engagements::dsl as e, replies::dsl as r, topics::dsl as t};
    let mine = e::engagements
        .filter(e::user_id.eq(user_id))
        .filter(e::target_type.eq(target_type.as_str()))
        .filter(e::kind.eq(kind.as_str()))
        .order((e::created_at.desc(), e::target_id.desc()))
        .select(e::target_id);
    let ids = match target_type {
        TargetType::Topic => {
            mine.filter(e::target_id.eq_any(t::topics.filter(t::deleted.eq(false)).select(t::id)))
                .load(conn)
                .await?
        }
        TargetType::Reply => {
            mine.filter(e::target_id.eq_any(r::replies.filter(r::deleted.eq(false)).select(r::id)))
                .load(conn)
                .await?
        }
    };
    Ok(ids)
}
