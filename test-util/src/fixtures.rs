//! Canned actors and seed data.

use std::time::Duration;

use forumd::{
    Actor,
    Role,
    db::TopicDraft,
    forum::{Forum, ForumConfig},
};

use crate::{AnyError, TempDatabase};

/// Slug and name of the first seeded category.
pub const QUALITY: (&str, &str) = ("quality", "Quality");
/// Slug and name of the second seeded category.
pub const SAFETY: (&str, &str) = ("safety", "Safety");

/// Organisation stamped on fixture actors.
const ORGANIZATION: &str = "acme";

/// An ordinary member.
#[must_use]
pub fn member(user_id: i32) -> Actor { Actor::new(user_id, Role::Member, ORGANIZATION) }

/// An administrator.
#[must_use]
pub fn admin(user_id: i32) -> Actor { Actor::new(user_id, Role::Admin, ORGANIZATION) }

/// Default configuration with the statistics cache disabled.
#[must_use]
pub fn uncached() -> ForumConfig {
    ForumConfig {
        stats_ttl: Duration::ZERO,
        ..ForumConfig::default()
    }
}

/// A topic draft filed under `category`.
#[must_use]
pub fn draft(title: &str, body: &str, category: &str) -> TopicDraft {
    TopicDraft {
        title: title.to_owned(),
        body: body.to_owned(),
        category: category.to_owned(),
    }
}

/// Create the [`QUALITY`] and [`SAFETY`] categories.
///
/// # Errors
/// Propagates category creation failures.
pub async fn seed_categories(forum: &Forum) -> Result<(), AnyError> {
    for (slug, name) in [QUALITY, SAFETY] {
        forum.create_category(slug.to_owned(), name.to_owned()).await?;
    }
    Ok(())
}

/// A fresh database with seeded categories and a forum over it.
///
/// The returned [`TempDatabase`] must outlive the forum.
///
/// # Errors
/// Propagates database setup and seeding failures.
pub async fn seeded_forum(config: ForumConfig) -> Result<(TempDatabase, Forum), AnyError> {
    let db = TempDatabase::new()?;
    let forum = db.forum(config).await?;
    seed_categories(&forum).await?;
    Ok((db, forum))
}
