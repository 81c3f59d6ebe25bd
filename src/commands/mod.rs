//! Decode and execute protocol requests.
//!
//! Each request frame names an operation in its `op` field. This module maps
//! that onto a typed [`Command`], runs it against the [`Forum`] and turns the
//! outcome into either a JSON payload or a [`CommandError`] carrying one of
//! the wire error codes below.

use std::net::SocketAddr;

use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;

mod handlers;

use self::handlers::{Identity, encode};
use crate::{
    db::{TopicDraft, TopicEdit, TopicQuery},
    error::ForumError,
    forum::Forum,
    handler::Session,
    models::{EngagementKind, Target, TargetType},
    privileges::{Actor, Role},
};

/// Error code used when a request arrives before `identify`.
pub const ERR_NOT_AUTHENTICATED: u32 = 1;
/// Error code used when a frame is not valid JSON or names no known operation.
pub const ERR_INVALID_PAYLOAD: u32 = 2;
/// Error code used for unexpected server-side failures.
pub const ERR_INTERNAL_SERVER: u32 = 3;
/// Error code used when the caller lacks the required privilege or ownership.
pub const ERR_INSUFFICIENT_PRIVILEGES: u32 = 4;
/// Error code used when input fails validation.
pub const ERR_VALIDATION: u32 = 5;
/// Error code used for missing or deleted content.
pub const ERR_NOT_FOUND: u32 = 6;
/// Error code used when a request conflicts with stored state.
pub const ERR_CONFLICT: u32 = 7;

const fn default_limit() -> u32 { 10 }

/// High-level request representation decoded from a JSON frame.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    /// Bind the caller identity for the rest of the connection.
    Identify {
        /// Identifier issued by the identity provider.
        user_id: i32,
        /// Asserted role.
        #[serde(default)]
        role: Role,
        /// Tenant attribute copied onto created records.
        #[serde(default)]
        organization_id: String,
        /// Optional name recorded in the member directory.
        #[serde(default)]
        display_name: Option<String>,
    },
    /// Open a new topic.
    CreateTopic {
        /// Topic title.
        title: String,
        /// Topic body.
        body: String,
        /// Category slug.
        category: String,
    },
    /// Page through live topics.
    ListTopics(TopicQuery),
    /// Fetch a topic with its thread, counting one view.
    GetTopic {
        /// Topic identifier.
        topic_id: i32,
    },
    /// Fetch only the reply forest of a topic.
    GetThread {
        /// Topic identifier.
        topic_id: i32,
    },
    /// Change a topic's title, body or category.
    EditTopic {
        /// Topic identifier.
        topic_id: i32,
        /// Replacement title.
        #[serde(default)]
        title: Option<String>,
        /// Replacement body.
        #[serde(default)]
        body: Option<String>,
        /// Replacement category slug.
        #[serde(default)]
        category: Option<String>,
    },
    /// Remove a topic.
    DeleteTopic {
        /// Topic identifier.
        topic_id: i32,
    },
    /// Pin or unpin a topic.
    PinTopic {
        /// Topic identifier.
        topic_id: i32,
        /// Desired state.
        pinned: bool,
    },
    /// Reply to a topic or to another reply.
    AddReply {
        /// Owning topic.
        topic_id: i32,
        /// Reply body.
        body: String,
        /// Parent reply, absent for top-level replies.
        #[serde(default)]
        parent_reply_id: Option<i32>,
    },
    /// Replace a reply's body.
    EditReply {
        /// Reply identifier.
        reply_id: i32,
        /// Replacement body.
        body: String,
    },
    /// Remove a reply.
    DeleteReply {
        /// Reply identifier.
        reply_id: i32,
    },
    /// Flip a like or bookmark.
    Toggle {
        /// Kind of target.
        target_type: TargetType,
        /// Target identifier.
        target_id: i32,
        /// Engagement kind.
        kind: EngagementKind,
    },
    /// Whether the caller holds an engagement record on a target.
    IsActive {
        /// Kind of target.
        target_type: TargetType,
        /// Target identifier.
        target_id: i32,
        /// Engagement kind.
        kind: EngagementKind,
    },
    /// Identifiers the caller has bookmarked.
    ListBookmarks {
        /// Kind of target to list.
        #[serde(default)]
        target_type: TargetType,
    },
    /// Accept a reply as the topic's answer.
    MarkBestAnswer {
        /// Topic identifier.
        topic_id: i32,
        /// Reply identifier.
        reply_id: i32,
    },
    /// All categories with their topic counts.
    ListCategories,
    /// Platform-wide totals.
    PlatformStats,
    /// Contributor leaderboard.
    TopContributors {
        /// Number of rows to return.
        #[serde(default = "default_limit")]
        limit: u32,
    },
    /// Recompute a topic's counters from stored records.
    Recount {
        /// Topic identifier.
        topic_id: i32,
    },
}

/// Failure while executing a [`Command`].
#[derive(Debug, Error)]
pub enum CommandError {
    /// No `identify` frame has been accepted on this connection.
    #[error("identify before issuing requests")]
    NotAuthenticated,
    /// A second `identify` frame arrived.
    #[error("connection is already identified")]
    AlreadyIdentified,
    /// The forum rejected or failed the operation.
    #[error(transparent)]
    Forum(#[from] ForumError),
    /// The result could not be encoded.
    #[error("failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),
}

impl CommandError {
    /// Wire error code for this failure.
    #[must_use]
    pub const fn code(&self) -> u32 {
        match self {
            Self::NotAuthenticated => ERR_NOT_AUTHENTICATED,
            Self::AlreadyIdentified => ERR_CONFLICT,
            Self::Forum(err) => match err {
                ForumError::Validation(_) => ERR_VALIDATION,
                ForumError::NotFound(_) => ERR_NOT_FOUND,
                ForumError::Authorization(_) => ERR_INSUFFICIENT_PRIVILEGES,
                ForumError::Conflict(_) => ERR_CONFLICT,
                ForumError::Storage(_) | ForumError::Pool(_) | ForumError::Interrupted => {
                    ERR_INTERNAL_SERVER
                }
            },
            Self::Encode(_) => ERR_INTERNAL_SERVER,
        }
    }

    /// Whether the failure is the server's fault and must not be described
    /// to the client.
    #[must_use]
    pub const fn is_internal(&self) -> bool { self.code() == ERR_INTERNAL_SERVER }
}

impl Command {
    /// Operation name as it appears in the `op` field.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Identify { .. } => "identify",
            Self::CreateTopic { .. } => "create_topic",
            Self::ListTopics(_) => "list_topics",
            Self::GetTopic { .. } => "get_topic",
            Self::GetThread { .. } => "get_thread",
            Self::EditTopic { .. } => "edit_topic",
            Self::DeleteTopic { .. } => "delete_topic",
            Self::PinTopic { .. } => "pin_topic",
            Self::AddReply { .. } => "add_reply",
            Self::EditReply { .. } => "edit_reply",
            Self::DeleteReply { .. } => "delete_reply",
            Self::Toggle { .. } => "toggle",
            Self::IsActive { .. } => "is_active",
            Self::ListBookmarks { .. } => "list_bookmarks",
            Self::MarkBestAnswer { .. } => "mark_best_answer",
            Self::ListCategories => "list_categories",
            Self::PlatformStats => "platform_stats",
            Self::TopContributors { .. } => "top_contributors",
            Self::Recount { .. } => "recount",
        }
    }

    /// Decode a command from the request object, `op` field included.
    ///
    /// # Errors
    /// Returns the `serde_json` error when the operation is unknown or a field
    /// is missing or mistyped.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Execute the command on behalf of the session's caller.
    ///
    /// # Errors
    /// Returns [`CommandError::NotAuthenticated`] for any command other than
    /// `identify` on an anonymous session, and otherwise propagates the
    /// forum's failure.
    #[must_use = "handle the result"]
    pub async fn process(
        self,
        peer: SocketAddr,
        forum: &Forum,
        session: &mut Session,
    ) -> Result<Value, CommandError> {
        match self {
            Self::Identify {
                user_id,
                role,
                organization_id,
                display_name,
            } => {
                let identity = Identity {
                    actor: Actor::new(user_id, role, organization_id),
                    display_name,
                };
                handlers::identify(peer, forum, session, identity).await
            }
            Self::CreateTopic {
                title,
                body,
                category,
            } => {
                let draft = TopicDraft {
                    title,
                    body,
                    category,
                };
                encode(&forum.create_topic(session.actor()?, draft).await?)
            }
            Self::ListTopics(query) => encode(&forum.list_topics(session.actor()?, query).await?),
            Self::GetTopic { topic_id } => {
                encode(&forum.get_topic(session.actor()?, topic_id).await?)
            }
            Self::GetThread { topic_id } => {
                encode(&forum.get_thread(session.actor()?, topic_id).await?)
            }
            Self::EditTopic {
                topic_id,
                title,
                body,
                category,
            } => {
                let edit = TopicEdit {
                    title,
                    body,
                    category,
                };
                encode(&forum.edit_topic(session.actor()?, topic_id, edit).await?)
            }
            Self::DeleteTopic { topic_id } => {
                handlers::deleted(forum.delete_topic(session.actor()?, topic_id).await?)
            }
            Self::PinTopic { topic_id, pinned } => {
                encode(&forum.pin_topic(session.actor()?, topic_id, pinned).await?)
            }
            Self::AddReply {
                topic_id,
                body,
                parent_reply_id,
            } => encode(
                &forum
                    .add_reply(session.actor()?, topic_id, body, parent_reply_id)
                    .await?,
            ),
            Self::EditReply { reply_id, body } => {
                encode(&forum.edit_reply(session.actor()?, reply_id, body).await?)
            }
            Self::DeleteReply { reply_id } => {
                handlers::deleted(forum.delete_reply(session.actor()?, reply_id).await?)
            }
            Self::Toggle {
                target_type,
                target_id,
                kind,
            } => {
                let target = Target {
                    target_type,
                    target_id,
                };
                encode(&forum.toggle(session.actor()?, target, kind).await?)
            }
            Self::IsActive {
                target_type,
                target_id,
                kind,
            } => {
                let target = Target {
                    target_type,
                    target_id,
                };
                let active = forum.is_active(session.actor()?, target, kind).await?;
                Ok(json!({ "active": active }))
            }
            Self::ListBookmarks { target_type } => {
                handlers::bookmarks(forum, session.actor()?, target_type).await
            }
            Self::MarkBestAnswer { topic_id, reply_id } => encode(
                &forum
                    .mark_best_answer(session.actor()?, topic_id, reply_id)
                    .await?,
            ),
            Self::ListCategories => encode(&forum.list_categories(session.actor()?).await?),
            Self::PlatformStats => encode(&forum.platform_stats(session.actor()?).await?),
            Self::TopContributors { limit } => {
                encode(&forum.top_contributors(session.actor()?, limit).await?)
            }
            Self::Recount { topic_id } => {
                encode(&forum.recount_topic(session.actor()?, topic_id).await?)
            }
        }
    }
}
