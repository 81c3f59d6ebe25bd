//! Roles, privilege bits and the authenticated caller.
//!
//! Identity is asserted upstream; the daemon trusts the `(user_id, role,
//! organization_id)` triple it receives and only decides what that caller
//! may do. Ownership checks (author-only edits, topic-author best answers)
//! live with the operations themselves.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::error::ForumError;

bitflags! {
    /// Operations a caller may perform.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Privileges: u32 {
        /// Browse categories, topics, threads and statistics.
        const READ = 1 << 0;
        /// Start new topics.
        const POST_TOPIC = 1 << 1;
        /// Reply to topics and other replies.
        const POST_REPLY = 1 << 2;
        /// Toggle likes and bookmarks.
        const ENGAGE = 1 << 3;
        /// Delete other members' topics and replies.
        const MODERATE = 1 << 4;
        /// Pin and unpin topics.
        const PIN_TOPIC = 1 << 5;
        /// Trigger a full counter recount.
        const MANAGE_COUNTERS = 1 << 6;
    }
}

impl Privileges {
    /// Privileges granted to ordinary members.
    #[must_use]
    pub const fn member_defaults() -> Self {
        Self::READ
            .union(Self::POST_TOPIC)
            .union(Self::POST_REPLY)
            .union(Self::ENGAGE)
    }
}

/// Role asserted by the identity provider.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Ordinary participant.
    #[default]
    Member,
    /// Administrator with moderation rights.
    Admin,
}

impl Role {
    /// Privileges carried by this role.
    #[must_use]
    pub const fn privileges(self) -> Privileges {
        match self {
            Self::Member => Privileges::member_defaults(),
            Self::Admin => Privileges::all(),
        }
    }
}

/// The caller on whose behalf an operation runs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Identifier issued by the identity provider.
    pub user_id: i32,
    /// Asserted role.
    #[serde(default)]
    pub role: Role,
    /// Tenant attribute copied onto every record the caller creates.
    #[serde(default)]
    pub organization_id: String,
}

impl Actor {
    /// Construct an actor.
    pub fn new(user_id: i32, role: Role, organization_id: impl Into<String>) -> Self {
        Self {
            user_id,
            role,
            organization_id: organization_id.into(),
        }
    }

    /// Return whether the actor holds every bit in `required`.
    #[must_use]
    pub const fn can(&self, required: Privileges) -> bool {
        self.role.privileges().contains(required)
    }

    /// Fail with [`ForumError::Authorization`] unless the actor holds
    /// `required`.
    ///
    /// # Errors
    /// Returns [`ForumError::Authorization`] when the privilege is missing.
    pub const fn require(&self, required: Privileges) -> Result<(), ForumError> {
        if self.can(required) {
            Ok(())
        } else {
            Err(ForumError::Authorization("insufficient privileges"))
        }
    }

    /// Whether the actor may remove content written by `author_id`.
    #[must_use]
    pub const fn may_delete(&self, author_id: i32) -> bool {
        self.user_id == author_id || self.can(Privileges::MODERATE)
    }
}
