//! Topic store: create, edit, delete, pin, view and list topics.

use cfg_if::cfg_if;
use chrono::Utc;
use diesel::{dsl::exists, prelude::*, sql_types::Text};
use diesel_async::{AsyncConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    categories::category_by_slug,
    connection::{Backend, DbConnection, lock_for_write},
    counters::{CounterField, CounterTarget, adjust},
    validate,
};
use crate::{
    error::{ForumError, ForumResult},
    models::{NewTopic, TOMBSTONE_BODY, TargetType, Topic, TopicSort, TopicSummary},
    privileges::{Actor, Privileges},
    schema::topics,
};

diesel::define_sql_function! {
    /// SQL `lower()`.
    fn lower(x: Text) -> Text;
}

const DEFAULT_PAGE_SIZE: u32 = 20;

/// Fields for a new topic. The author comes from the [`Actor`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicDraft {
    /// Topic title.
    pub title: String,
    /// Topic body.
    pub body: String,
    /// Category slug.
    pub category: String,
}

/// Partial update of a topic. Absent fields are left unchanged.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicEdit {
    /// Replacement title.
    #[serde(default)]
    pub title: Option<String>,
    /// Replacement body.
    #[serde(default)]
    pub body: Option<String>,
    /// Slug of the category to move the topic to.
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(AsChangeset)]
#[diesel(table_name = topics)]
struct TopicChanges<'a> {
    title: Option<&'a str>,
    body: Option<&'a str>,
    category_id: Option<i32>,
    updated_at: chrono::NaiveDateTime,
}

/// Filter, ordering and paging for [`list_topics`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicQuery {
    /// Restrict to a category slug.
    #[serde(default)]
    pub category: Option<String>,
    /// Case-insensitive substring of the title or body.
    #[serde(default)]
    pub search: Option<String>,
    /// Ordering after pinned topics.
    #[serde(default)]
    pub sort: TopicSort,
    /// One-based page number.
    #[serde(default = "first_page")]
    pub page: u32,
    /// Topics per page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

const fn first_page() -> u32 { 1 }

const fn default_page_size() -> u32 { DEFAULT_PAGE_SIZE }

impl Default for TopicQuery {
    fn default() -> Self {
        Self {
            category: None,
            search: None,
            sort: TopicSort::Newest,
            page: first_page(),
            page_size: default_page_size(),
        }
    }
}

/// One page of topic summaries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicPage {
    /// Topics on this page.
    pub items: Vec<TopicSummary>,
    /// One-based page number.
    pub page: u32,
    /// Requested page size.
    pub page_size: u32,
    /// Matching topics across all pages.
    pub total: i64,
}

/// How a delete was carried out.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    /// The row was kept as a tombstone to anchor descendants.
    Soft,
    /// The row was removed.
    Hard,
}

/// Fetch a topic that has not been deleted.
///
/// # Errors
/// Returns [`ForumError::NotFound`] when the topic is absent or deleted.
#[must_use = "handle the result"]
pub async fn live_topic(conn: &mut DbConnection, topic_id: i32) -> ForumResult<Topic> {
    use crate::schema::topics::dsl as t;
    t::topics
        .find(topic_id)
        .filter(t::deleted.eq(false))
        .select(Topic::as_select())
        .first(conn)
        .await
        .optional()?
        .ok_or(ForumError::NotFound("topic"))
}

/// Whether a live topic with this id exists.
///
/// # Errors
/// Returns any database error.
pub(crate) async fn topic_is_live(conn: &mut DbConnection, topic_id: i32) -> ForumResult<bool> {
    use crate::schema::topics::dsl as t;
    let live = diesel::select(exists(
        t::topics.find(topic_id).filter(t::deleted.eq(false)),
    ))
    .get_result(conn)
    .await?;
    Ok(live)
}

/// Create a topic with zeroed counters in the named category.
///
/// # Errors
/// Returns [`ForumError::Validation`] for blank or overlong fields and unknown
/// categories, [`ForumError::Authorization`] when the actor may not post, and
/// any database error.
#[must_use = "handle the result"]
pub async fn create_topic(
    conn: &mut DbConnection,
    actor: &Actor,
    draft: &TopicDraft,
) -> ForumResult<Topic> {
    use crate::schema::topics::dsl as t;
    actor.require(Privileges::POST_TOPIC)?;
    let title = validate::required_text("title", &draft.title, validate::MAX_TITLE_CHARS)?;
    let body = validate::required_text("body", &draft.body, validate::MAX_BODY_CHARS)?;
    let slug = draft.category.trim();
    conn.transaction::<_, ForumError, _>(|conn| {
        Box::pin(async move {
            lock_for_write(conn).await?;
            let category = category_by_slug(conn, slug)
                .await?
                .ok_or_else(|| ForumError::validation(format!("unknown category '{slug}'")))?;
            let now = Utc::now().naive_utc();
            let row = NewTopic {
                organization_id: &actor.organization_id,
                category_id: category.id,
                author_id: actor.user_id,
                title,
                body,
                created_at: now,
                updated_at: now,
            };
            let topic = diesel::insert_into(t::topics)
                .values(&row)
                .returning(Topic::as_returning())
                .get_result(conn)
                .await?;
            adjust(conn, CounterTarget::Category(category.id), CounterField::Topics, 1).await?;
            debug!(topic_id = topic.id, author_id = actor.user_id, "topic created");
            Ok(topic)
        })
    })
    .await
}

/// Apply an author's edit to a live topic.
///
/// Moving the topic to another category moves one unit of `topic_count`.
///
/// # Errors
/// Returns [`ForumError::NotFound`] for missing or deleted topics,
/// [`ForumError::Authorization`] unless the actor wrote the topic, and
/// [`ForumError::Validation`] for empty edits, bad fields or unknown
/// categories.
#[must_use = "handle the result"]
pub async fn edit_topic(
    conn: &mut DbConnection,
    actor: &Actor,
    topic_id: i32,
    edit: &TopicEdit,
) -> ForumResult<Topic> {
    use crate::schema::topics::dsl as t;
    if edit.title.is_none() && edit.body.is_none() && edit.category.is_none() {
        return Err(ForumError::validation("nothing to update"));
    }
    let title = edit
        .title
        .as_deref()
        .map(|v| validate::required_text("title", v, validate::MAX_TITLE_CHARS))
        .transpose()?;
    let body = edit
        .body
        .as_deref()
        .map(|v| validate::required_text("body", v, validate::MAX_BODY_CHARS))
        .transpose()?;
    conn.transaction::<_, ForumError, _>(|conn| {
        Box::pin(async move {
            lock_for_write(conn).await?;
            let topic = live_topic(conn, topic_id).await?;
            if topic.author_id != actor.user_id {
                return Err(ForumError::Authorization(
                    "only the author may edit this topic",
                ));
            }
            let mut category_id = None;
            if let Some(slug) = edit.category.as_deref().map(str::trim) {
                let category = category_by_slug(conn, slug)
                    .await?
                    .ok_or_else(|| ForumError::validation(format!("unknown category '{slug}'")))?;
                if category.id != topic.category_id {
                    adjust(conn, CounterTarget::Category(topic.category_id), CounterField::Topics, -1)
                        .await?;
                    adjust(conn, CounterTarget::Category(category.id), CounterField::Topics, 1)
                        .await?;
                    category_id = Some(category.id);
                }
            }
            let changes = TopicChanges {
                title,
                body,
                category_id,
                updated_at: Utc::now().naive_utc(),
            };
            let updated = diesel::update(t::topics.find(topic_id))
                .set(&changes)
                .returning(Topic::as_returning())
                .get_result(conn)
                .await?;
            Ok(updated)
        })
    })
    .await
}

/// Delete a topic.
///
/// A topic with replies is soft-deleted and every reply under it becomes a
/// tombstone, so `reply_count` stays equal to the stored replies. A topic
/// without replies is removed together with its engagement records. Either
/// way the category loses one from `topic_count`.
///
/// # Errors
/// Returns [`ForumError::NotFound`] for missing or deleted topics and
/// [`ForumError::Authorization`] unless the actor wrote the topic or holds
/// [`Privileges::MODERATE`].
#[must_use = "handle the result"]
pub async fn delete_topic(
    conn: &mut DbConnection,
    actor: &Actor,
    topic_id: i32,
) -> ForumResult<DeleteOutcome> {
    use crate::schema::{engagements::dsl as e, replies::dsl as r, topics::dsl as t};
    conn.transaction::<_, ForumError, _>(|conn| {
        Box::pin(async move {
            lock_for_write(conn).await?;
            let topic = live_topic(conn, topic_id).await?;
            if !actor.may_delete(topic.author_id) {
                return Err(ForumError::Authorization(
                    "only the author or a moderator may delete this topic",
                ));
            }
            let has_replies: bool = diesel::select(exists(r::replies.filter(r::topic_id.eq(topic_id))))
                .get_result(conn)
                .await?;
            let now = Utc::now().naive_utc();
            let outcome = if has_replies {
                diesel::update(t::topics.find(topic_id))
                    .set((t::deleted.eq(true), t::pinned.eq(false), t::updated_at.eq(now)))
                    .execute(conn)
                    .await?;
                diesel::update(r::replies.filter(r::topic_id.eq(topic_id)))
                    .set((
                        r::deleted.eq(true),
                        r::body.eq(TOMBSTONE_BODY),
                        r::updated_at.eq(now),
                    ))
                    .execute(conn)
                    .await?;
                DeleteOutcome::Soft
            } else {
                diesel::delete(
                    e::engagements
                        .filter(e::target_type.eq(TargetType::Topic.as_str()))
                        .filter(e::target_id.eq(topic_id)),
                )
                .execute(conn)
                .await?;
                diesel::delete(t::topics.find(topic_id)).execute(conn).await?;
                DeleteOutcome::Hard
            };
            adjust(conn, CounterTarget::Category(topic.category_id), CounterField::Topics, -1)
                .await?;
            debug!(topic_id, ?outcome, actor = actor.user_id, "topic deleted");
            Ok(outcome)
        })
    })
    .await
}

/// Pin or unpin a live topic.
///
/// # Errors
/// Returns [`ForumError::Authorization`] without [`Privileges::PIN_TOPIC`] and
/// [`ForumError::NotFound`] for missing or deleted topics.
#[must_use = "handle the result"]
pub async fn set_pinned(
    conn: &mut DbConnection,
    actor: &Actor,
    topic_id: i32,
    pinned: bool,
) -> ForumResult<Topic> {
    use crate::schema::topics::dsl as t;
    actor.require(Privileges::PIN_TOPIC)?;
    diesel::update(t::topics.find(topic_id).filter(t::deleted.eq(false)))
        .set(t::pinned.eq(pinned))
        .returning(Topic::as_returning())
        .get_result(conn)
        .await
        .optional()?
        .ok_or(ForumError::NotFound("topic"))
}

/// Count one view of a live topic and return the new `view_count`.
///
/// # Errors
/// Returns [`ForumError::NotFound`] for missing or deleted topics.
#[must_use = "handle the result"]
pub async fn record_view(conn: &mut DbConnection, topic_id: i32) -> ForumResult<i32> {
    conn.transaction::<_, ForumError, _>(|conn| {
        Box::pin(async move {
            // Write first so the transaction holds the write lock before it reads.
            let views = adjust(conn, CounterTarget::Topic(topic_id), CounterField::Views, 1).await?;
            if !topic_is_live(conn, topic_id).await? {
                return Err(ForumError::NotFound("topic"));
            }
            Ok(views)
        })
    })
    .await
}

/// Fold the needle the way the backend's `lower()` folds the columns.
/// `SQLite` only folds ASCII, so folding other letters here would make an
/// exact-case non-ASCII search miss its own text.
fn fold_case(search: &str) -> String {
    cfg_if! {
        if #[cfg(feature = "sqlite")] {
            search.to_ascii_lowercase()
        } else {
            search.to_lowercase()
        }
    }
}

/// Escape `LIKE` metacharacters and wrap the needle for substring matching.
fn like_pattern(search: &str) -> String {
    let mut pattern = String::with_capacity(search.len() + 2);
    pattern.push('%');
    for ch in fold_case(search).chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

fn filtered(category_id: Option<i32>, pattern: Option<&str>) -> topics::BoxedQuery<'_, Backend> {
    use crate::schema::topics::dsl as t;
    let mut query = t::topics.filter(t::deleted.eq(false)).into_boxed();
    if let Some(id) = category_id {
        query = query.filter(t::category_id.eq(id));
    }
    if let Some(pattern) = pattern {
        query = query.filter(
            lower(t::title)
                .like(pattern)
                .escape('\\')
                .or(lower(t::body).like(pattern).escape('\\')),
        );
    }
    query
}

/// List live topics, pinned first, then by the requested order with newest
/// first as the tie-break.
///
/// # Errors
/// Returns [`ForumError::Validation`] for out-of-range paging or an unknown
/// category slug, and any database error.
#[must_use = "handle the result"]
pub async fn list_topics(conn: &mut DbConnection, query: &TopicQuery) -> ForumResult<TopicPage> {
    use crate::schema::topics::dsl as t;
    if query.page < 1 {
        return Err(ForumError::validation("page must be at least 1"));
    }
    let page_size = validate::page_size("page_size", query.page_size)?;
    let category_id = match query.category.as_deref().map(str::trim) {
        Some(slug) if !slug.is_empty() => Some(
            category_by_slug(conn, slug)
                .await?
                .ok_or_else(|| ForumError::validation(format!("unknown category '{slug}'")))?
                .id,
        ),
        _ => None,
    };
    let pattern = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(like_pattern);

    let total: i64 = filtered(category_id, pattern.as_deref())
        .count()
        .get_result(conn)
        .await?;

    let ordered = match query.sort {
        TopicSort::Newest => filtered(category_id, pattern.as_deref()).order((
            t::pinned.desc(),
            t::created_at.desc(),
            t::id.desc(),
        )),
        TopicSort::MostViewed => filtered(category_id, pattern.as_deref()).order((
            t::pinned.desc(),
            t::view_count.desc(),
            t::created_at.desc(),
            t::id.desc(),
        )),
        TopicSort::MostLiked => filtered(category_id, pattern.as_deref()).order((
            t::pinned.desc(),
            t::like_count.desc(),
            t::created_at.desc(),
            t::id.desc(),
        )),
    };
    let offset = i64::from(query.page - 1) * i64::from(page_size);
    let rows = ordered
        .limit(i64::from(page_size))
        .offset(offset)
        .select(Topic::as_select())
        .load(conn)
        .await?;

    Ok(TopicPage {
        items: rows.into_iter().map(TopicSummary::from).collect(),
        page: query.page,
        page_size,
        total,
    })
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::like_pattern;

    #[rstest]
    #[case("Sensor", "%sensor%")]
    #[case("50%", "%50\\%%")]
    #[case("a_b", "%a\\_b%")]
    fn like_pattern_escapes(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(like_pattern(input), expected);
    }

    #[cfg(feature = "sqlite")]
    #[rstest]
    fn sqlite_needles_keep_non_ascii_case() {
        assert_eq!(like_pattern("ÖLstand"), "%Ölstand%");
    }
}
