//! Row types and the small closed vocabularies stored alongside them.

use std::{fmt, str::FromStr};

use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

/// Body stored in place of a reply's text once it has been soft-deleted.
pub const TOMBSTONE_BODY: &str = "[deleted]";

/// A member of the display-name directory.
#[derive(Queryable, Selectable, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[diesel(table_name = crate::schema::members)]
pub struct Member {
    /// Identifier issued by the identity provider.
    pub id: i32,
    /// Name rendered on leaderboards.
    pub display_name: String,
    /// Registration time.
    pub created_at: NaiveDateTime,
}

/// Insertable form of [`Member`].
#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::members)]
pub struct NewMember<'a> {
    /// Identifier issued by the identity provider.
    pub id: i32,
    /// Name rendered on leaderboards.
    pub display_name: &'a str,
    /// Registration time.
    pub created_at: NaiveDateTime,
}

/// A discussion category.
#[derive(Queryable, Selectable, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[diesel(table_name = crate::schema::categories)]
pub struct Category {
    /// Row identifier.
    pub id: i32,
    /// Stable client-facing identifier.
    pub slug: String,
    /// Human readable name.
    pub name: String,
    /// Number of live topics filed under this category.
    pub topic_count: i32,
    /// Creation time.
    pub created_at: NaiveDateTime,
}

/// Insertable form of [`Category`]; `topic_count` starts at zero.
#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::categories)]
pub struct NewCategory<'a> {
    /// Stable client-facing identifier.
    pub slug: &'a str,
    /// Human readable name.
    pub name: &'a str,
    /// Creation time.
    pub created_at: NaiveDateTime,
}

/// A stored topic, including soft-deleted ones.
#[derive(Queryable, Selectable, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[diesel(table_name = crate::schema::topics)]
pub struct Topic {
    /// Row identifier.
    pub id: i32,
    /// Opaque tenant attribute.
    pub organization_id: String,
    /// Owning category.
    pub category_id: i32,
    /// Author identifier.
    pub author_id: i32,
    /// Topic title.
    pub title: String,
    /// Topic body.
    pub body: String,
    /// Whether the topic is pinned.
    pub pinned: bool,
    /// Soft-delete marker.
    pub deleted: bool,
    /// Reply accepted by the author.
    pub best_answer_reply_id: Option<i32>,
    /// Stored replies under this topic.
    pub reply_count: i32,
    /// Likes on the topic itself.
    pub like_count: i32,
    /// Recorded views.
    pub view_count: i32,
    /// Creation time.
    pub created_at: NaiveDateTime,
    /// Last edit time.
    pub updated_at: NaiveDateTime,
}

/// Insertable form of [`Topic`]; counters and flags take their defaults.
#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::topics)]
pub struct NewTopic<'a> {
    /// Opaque tenant attribute.
    pub organization_id: &'a str,
    /// Owning category.
    pub category_id: i32,
    /// Author identifier.
    pub author_id: i32,
    /// Topic title.
    pub title: &'a str,
    /// Topic body.
    pub body: &'a str,
    /// Creation time.
    pub created_at: NaiveDateTime,
    /// Last edit time.
    pub updated_at: NaiveDateTime,
}

/// A page entry for topic listings. Bodies are omitted.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TopicSummary {
    /// Topic identifier.
    pub id: i32,
    /// Topic title.
    pub title: String,
    /// Owning category.
    pub category_id: i32,
    /// Author identifier.
    pub author_id: i32,
    /// Whether the topic is pinned.
    pub pinned: bool,
    /// Whether the author accepted an answer.
    pub answered: bool,
    /// Stored replies.
    pub reply_count: i32,
    /// Likes on the topic.
    pub like_count: i32,
    /// Recorded views.
    pub view_count: i32,
    /// Creation time.
    pub created_at: NaiveDateTime,
    /// Last edit time.
    pub updated_at: NaiveDateTime,
}

impl From<Topic> for TopicSummary {
    fn from(topic: Topic) -> Self {
        Self {
            id: topic.id,
            title: topic.title,
            category_id: topic.category_id,
            author_id: topic.author_id,
            pinned: topic.pinned,
            answered: topic.best_answer_reply_id.is_some(),
            reply_count: topic.reply_count,
            like_count: topic.like_count,
            view_count: topic.view_count,
            created_at: topic.created_at,
            updated_at: topic.updated_at,
        }
    }
}

/// A stored reply. Soft-deleted replies carry [`TOMBSTONE_BODY`].
#[derive(Queryable, Selectable, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[diesel(table_name = crate::schema::replies)]
pub struct Reply {
    /// Row identifier.
    pub id: i32,
    /// Opaque tenant attribute.
    pub organization_id: String,
    /// Owning topic.
    pub topic_id: i32,
    /// Parent reply; `None` for top-level replies.
    pub parent_reply_id: Option<i32>,
    /// Author identifier.
    pub author_id: i32,
    /// Reply body.
    pub body: String,
    /// Soft-delete marker.
    pub deleted: bool,
    /// Likes on the reply.
    pub like_count: i32,
    /// Creation time.
    pub created_at: NaiveDateTime,
    /// Last edit time.
    pub updated_at: NaiveDateTime,
}

/// Insertable form of [`Reply`].
#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::replies)]
pub struct NewReply<'a> {
    /// Opaque tenant attribute.
    pub organization_id: &'a str,
    /// Owning topic.
    pub topic_id: i32,
    /// Parent reply; `None` for top-level replies.
    pub parent_reply_id: Option<i32>,
    /// Author identifier.
    pub author_id: i32,
    /// Reply body.
    pub body: &'a str,
    /// Creation time.
    pub created_at: NaiveDateTime,
    /// Last edit time.
    pub updated_at: NaiveDateTime,
}

/// Insertable engagement record. Records are never updated, only inserted
/// and deleted by the toggle.
#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::engagements)]
pub struct NewEngagement<'a> {
    /// Engaging user.
    pub user_id: i32,
    /// Storage form of [`TargetType`].
    pub target_type: &'a str,
    /// Identifier of the topic or reply.
    pub target_id: i32,
    /// Storage form of [`EngagementKind`].
    pub kind: &'a str,
    /// Opaque tenant attribute.
    pub organization_id: &'a str,
    /// Creation time.
    pub created_at: NaiveDateTime,
}

/// Error returned when a stored or submitted vocabulary value is unknown.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognised {kind} '{value}'")]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
}

/// Closed string vocabulary stored as text. Vocabularies with a default
/// take `#[derive(Default)]` on the enum and `#[default]` on one variant.
macro_rules! vocabulary {
    (
        $(#[$meta:meta])*
        $name:ident, $label:literal {
            $($(#[$vmeta:meta])* $variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            /// Storage and wire representation.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(UnknownVariant {
                        kind: $label,
                        value: other.to_owned(),
                    }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
        }
    };
}

vocabulary! {
    /// Kind of entity an engagement record points at.
    #[derive(Default)]
    TargetType, "target type" {
        /// A topic.
        #[default]
        Topic => "topic",
        /// A reply.
        Reply => "reply",
    }
}

vocabulary! {
    /// Kind of engagement a user can toggle.
    EngagementKind, "engagement kind" {
        /// Counted on the target's `like_count`.
        Like => "like",
        /// Private to the user; not counted on the target.
        Bookmark => "bookmark",
    }
}

vocabulary! {
    /// Ordering for topic listings. Ties always fall back to newest first.
    #[derive(Default)]
    TopicSort, "topic sort" {
        /// Most recently created first.
        #[default]
        Newest => "newest",
        /// Highest `view_count` first.
        MostViewed => "most_viewed",
        /// Highest `like_count` first.
        MostLiked => "most_liked",
    }
}

/// A concrete engagement target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    /// Entity kind.
    pub target_type: TargetType,
    /// Entity identifier.
    pub target_id: i32,
}

impl Target {
    /// Target a topic.
    #[must_use]
    pub const fn topic(id: i32) -> Self {
        Self {
            target_type: TargetType::Topic,
            target_id: id,
        }
    }

    /// Target a reply.
    #[must_use]
    pub const fn reply(id: i32) -> Self {
        Self {
            target_type: TargetType::Reply,
            target_id: id,
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("like", EngagementKind::Like)]
    #[case("bookmark", EngagementKind::Bookmark)]
    fn engagement_kind_parses_storage_form(#[case] text: &str, #[case] expected: EngagementKind) {
        assert_eq!(text.parse::<EngagementKind>(), Ok(expected));
        assert_eq!(expected.as_str(), text);
    }

    #[rstest]
    fn unknown_sort_is_rejected() {
        let err = "hottest".parse::<TopicSort>().expect_err("must reject");
        assert_eq!(err.to_string(), "unrecognised topic sort 'hottest'");
    }

    #[rstest]
    fn sort_deserialises_from_snake_case() {
        let sort: TopicSort = serde_json::from_str("\"most_liked\"").expect("parse");
        assert_eq!(sort, TopicSort::MostLiked);
    }

    #[rstest]
    fn defaults_are_newest_first_and_topics() {
        assert_eq!(TopicSort::default(), TopicSort::Newest);
        assert_eq!(TargetType::default(), TargetType::Topic);
    }

    #[rstest]
    fn summary_reports_answered_topics() {
        let now = chrono::DateTime::from_timestamp(1_000, 0)
            .expect("valid timestamp")
            .naive_utc();
        let topic = Topic {
            id: 3,
            organization_id: "org".to_owned(),
            category_id: 1,
            author_id: 9,
            title: "Defect rates".to_owned(),
            body: "body".to_owned(),
            pinned: false,
            deleted: false,
            best_answer_reply_id: Some(12),
            reply_count: 2,
            like_count: 1,
            view_count: 4,
            created_at: now,
            updated_at: now,
        };
        let summary = TopicSummary::from(topic);
        assert!(summary.answered);
        assert_eq!(summary.reply_count, 2);
    }
}
