//! Reply tree store.
//!
//! Replies keep an explicit `topic_id` and an optional parent inside the
//! same topic. A parent must already exist and be live when a child is
//! inserted, so parent chains are acyclic by construction.

use chrono::Utc;
use diesel::{dsl::exists, prelude::*};
use diesel_async::{AsyncConnection, RunQueryDsl};
use tracing::debug;

use super::{
    connection::{DbConnection, lock_for_write},
    counters::{CounterField, CounterTarget, adjust},
    topics::{DeleteOutcome, live_topic},
    validate,
};
use crate::{
    error::{ForumError, ForumResult},
    models::{NewReply, Reply, TOMBSTONE_BODY, TargetType, Topic},
    privileges::{Actor, Privileges},
    thread::{ThreadNode, assemble},
};

async fn reply_by_id(conn: &mut DbConnection, reply_id: i32) -> ForumResult<Option<Reply>> {
    use crate::schema::replies::dsl as r;
    let reply = r::replies
        .find(reply_id)
        .select(Reply::as_select())
        .first(conn)
        .await
        .optional()?;
    Ok(reply)
}

/// Fetch a reply that has not been deleted.
///
/// # Errors
/// Returns [`ForumError::NotFound`] when the reply is absent or a tombstone.
#[must_use = "handle the result"]
pub async fn live_reply(conn: &mut DbConnection, reply_id: i32) -> ForumResult<Reply> {
    reply_by_id(conn, reply_id)
        .await?
        .filter(|r| !r.deleted)
        .ok_or(ForumError::NotFound("reply"))
}

async fn has_children(conn: &mut DbConnection, reply_id: i32) -> ForumResult<bool> {
    use crate::schema::replies::dsl as r;
    let found = diesel::select(exists(r::replies.filter(r::parent_reply_id.eq(reply_id))))
        .get_result(conn)
        .await?;
    Ok(found)
}

/// Remove a reply row and the engagement records pointing at it.
async fn purge(conn: &mut DbConnection, reply_id: i32) -> ForumResult<()> {
    use crate::schema::{engagements::dsl as e, replies::dsl as r};
    diesel::delete(
        e::engagements
            .filter(e::target_type.eq(TargetType::Reply.as_str()))
            .filter(e::target_id.eq(reply_id)),
    )
    .execute(conn)
    .await?;
    diesel::delete(r::replies.find(reply_id)).execute(conn).await?;
    Ok(())
}

/// Add a reply to a live topic, optionally beneath a live parent reply in
/// the same topic.
///
/// # Errors
/// Returns [`ForumError::Validation`] for a blank or overlong body,
/// [`ForumError::Authorization`] when the actor may not reply, and
/// [`ForumError::NotFound`] when the topic or parent is missing, deleted or
/// the parent belongs to another topic.
#[must_use = "handle the result"]
pub async fn add_reply(
    conn: &mut DbConnection,
    actor: &Actor,
    topic_id: i32,
    body: &str,
    parent_reply_id: Option<i32>,
) -> ForumResult<Reply> {
    use crate::schema::replies::dsl as r;
    actor.require(Privileges::POST_REPLY)?;
    let body = validate::required_text("body", body, validate::MAX_BODY_CHARS)?;
    conn.transaction::<_, ForumError, _>(|conn| {
        Box::pin(async move {
            // Write first so the transaction holds the write lock before it reads.
            adjust(conn, CounterTarget::Topic(topic_id), CounterField::Replies, 1).await?;
            live_topic(conn, topic_id).await?;
            if let Some(parent_id) = parent_reply_id {
                let parent = live_reply(conn, parent_id).await?;
                if parent.topic_id != topic_id {
                    return Err(ForumError::NotFound("reply"));
                }
            }
            let now = Utc::now().naive_utc();
            let row = NewReply {
                organization_id: &actor.organization_id,
                topic_id,
                parent_reply_id,
                author_id: actor.user_id,
                body,
                created_at: now,
                updated_at: now,
            };
            let reply = diesel::insert_into(r::replies)
                .values(&row)
                .returning(Reply::as_returning())
                .get_result(conn)
                .await?;
            debug!(reply_id = reply.id, topic_id, ?parent_reply_id, "reply added");
            Ok(reply)
        })
    })
    .await
}

/// Replace the body of a live reply written by the actor.
///
/// # Errors
/// Returns [`ForumError::NotFound`] for missing or deleted replies,
/// [`ForumError::Authorization`] unless the actor wrote the reply, and
/// [`ForumError::Validation`] for a blank or overlong body.
#[must_use = "handle the result"]
pub async fn edit_reply(
    conn: &mut DbConnection,
    actor: &Actor,
    reply_id: i32,
    body: &str,
) -> ForumResult<Reply> {
    use crate::schema::replies::dsl as r;
    let body = validate::required_text("body", body, validate::MAX_BODY_CHARS)?;
    conn.transaction::<_, ForumError, _>(|conn| {
        Box::pin(async move {
            lock_for_write(conn).await?;
            let reply = live_reply(conn, reply_id).await?;
            if reply.author_id != actor.user_id {
                return Err(ForumError::Authorization(
                    "only the author may edit this reply",
                ));
            }
            let updated = diesel::update(r::replies.find(reply_id))
                .set((r::body.eq(body), r::updated_at.eq(Utc::now().naive_utc())))
                .returning(Reply::as_returning())
                .get_result(conn)
                .await?;
            Ok(updated)
        })
    })
    .await
}

/// Delete a reply.
///
/// A reply with children becomes a tombstone and keeps counting toward the
/// topic's `reply_count`. A leaf is removed with its engagement records and
/// the count drops by one; tombstoned ancestors left without children are
/// then removed the same way, walking upward. The topic's best answer is
/// cleared when it pointed at this reply.
///
/// # Errors
/// Returns [`ForumError::NotFound`] for missing or deleted replies and
/// [`ForumError::Authorization`] unless the actor wrote the reply or holds
/// [`Privileges::MODERATE`].
#[must_use = "handle the result"]
pub async fn delete_reply(
    conn: &mut DbConnection,
    actor: &Actor,
    reply_id: i32,
) -> ForumResult<DeleteOutcome> {
    use crate::schema::{replies::dsl as r, topics::dsl as t};
    conn.transaction::<_, ForumError, _>(|conn| {
        Box::pin(async move {
            lock_for_write(conn).await?;
            let reply = live_reply(conn, reply_id).await?;
            if !actor.may_delete(reply.author_id) {
                return Err(ForumError::Authorization(
                    "only the author or a moderator may delete this reply",
                ));
            }
            diesel::update(
                t::topics
                    .find(reply.topic_id)
                    .filter(t::best_answer_reply_id.eq(reply_id)),
            )
            .set(t::best_answer_reply_id.eq(None::<i32>))
            .execute(conn)
            .await?;

            if has_children(conn, reply_id).await? {
                diesel::update(r::replies.find(reply_id))
                    .set((
                        r::deleted.eq(true),
                        r::body.eq(TOMBSTONE_BODY),
                        r::updated_at.eq(Utc::now().naive_utc()),
                    ))
                    .execute(conn)
                    .await?;
                debug!(reply_id, "reply tombstoned");
                return Ok(DeleteOutcome::Soft);
            }

            purge(conn, reply_id).await?;
            adjust(conn, CounterTarget::Topic(reply.topic_id), CounterField::Replies, -1).await?;
            let mut removed = 1_u32;
            let mut next = reply.parent_reply_id;
            while let Some(parent_id) = next {
                let Some(parent) = reply_by_id(conn, parent_id).await? else {
                    break;
                };
                if !parent.deleted || has_children(conn, parent_id).await? {
                    break;
                }
                purge(conn, parent_id).await?;
                adjust(conn, CounterTarget::Topic(reply.topic_id), CounterField::Replies, -1)
                    .await?;
                removed += 1;
                next = parent.parent_reply_id;
            }
            debug!(reply_id, removed, "reply removed");
            Ok(DeleteOutcome::Hard)
        })
    })
    .await
}

/// Record `reply_id` as the accepted answer of `topic_id`.
///
/// # Errors
/// Returns [`ForumError::NotFound`] for a missing or deleted topic,
/// [`ForumError::Authorization`] unless the actor wrote the topic, and
/// [`ForumError::NotFound`] when the reply is missing, deleted or belongs to
/// another topic.
#[must_use = "handle the result"]
pub async fn mark_best_answer(
    conn: &mut DbConnection,
    actor: &Actor,
    topic_id: i32,
    reply_id: i32,
) -> ForumResult<Topic> {
    use crate::schema::topics::dsl as t;
    conn.transaction::<_, ForumError, _>(|conn| {
        Box::pin(async move {
            lock_for_write(conn).await?;
            let topic = live_topic(conn, topic_id).await?;
            if topic.author_id != actor.user_id {
                return Err(ForumError::Authorization(
                    "only the topic author may choose the best answer",
                ));
            }
            let reply = live_reply(conn, reply_id).await?;
            if reply.topic_id != topic_id {
                return Err(ForumError::NotFound("reply"));
            }
            let updated = diesel::update(t::topics.find(topic_id))
                .set(t::best_answer_reply_id.eq(Some(reply_id)))
                .returning(Topic::as_returning())
                .get_result(conn)
                .await?;
            debug!(topic_id, reply_id, "best answer marked");
            Ok(updated)
        })
    })
    .await
}

/// Load every stored reply of a live topic and assemble the forest.
///
/// # Errors
/// Returns [`ForumError::NotFound`] when the topic is missing or deleted.
#[must_use = "handle the result"]
pub async fn load_thread(conn: &mut DbConnection, topic_id: i32) -> ForumResult<Vec<ThreadNode>> {
    use crate::schema::replies::dsl as r;
    live_topic(conn, topic_id).await?;
    let rows = r::replies
        .filter(r::topic_id.eq(topic_id))
        .order((r::created_at.asc(), r::id.asc()))
        .select(Reply::as_select())
        .load(conn)
        .await?;
    Ok(assemble(rows))
}
