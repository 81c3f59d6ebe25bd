//! Command execution helpers that need more than a single forum call.

use std::net::SocketAddr;

use serde::Serialize;
use serde_json::{Value, json};
use tracing::info;

use super::CommandError;
use crate::{
    db::DeleteOutcome,
    error::ForumError,
    forum::Forum,
    handler::Session,
    models::{EngagementKind, TargetType},
    privileges::Actor,
};

/// Identity asserted by an `identify` frame.
pub(super) struct Identity {
    pub(super) actor: Actor,
    pub(super) display_name: Option<String>,
}

/// Serialise a forum result into the response payload.
pub(super) fn encode<T: Serialize>(value: &T) -> Result<Value, CommandError> {
    Ok(serde_json::to_value(value)?)
}

/// Bind `identity` to the session, recording its display name if one was
/// supplied.
pub(super) async fn identify(
    peer: SocketAddr,
    forum: &Forum,
    session: &mut Session,
    identity: Identity,
) -> Result<Value, CommandError> {
    if session.is_identified() {
        return Err(CommandError::AlreadyIdentified);
    }
    let Identity {
        actor,
        display_name,
    } = identity;
    if actor.user_id <= 0 {
        return Err(ForumError::validation("user_id must be positive").into());
    }
    if let Some(name) = display_name {
        forum.upsert_member(actor.user_id, name).await?;
    }
    info!(%peer, user_id = actor.user_id, role = ?actor.role, "connection identified");
    let payload = encode(&actor)?;
    session.actor = Some(actor);
    Ok(payload)
}

pub(super) fn deleted(outcome: DeleteOutcome) -> Result<Value, CommandError> {
    Ok(json!({ "outcome": outcome }))
}

pub(super) async fn bookmarks(
    forum: &Forum,
    actor: &Actor,
    target_type: TargetType,
) -> Result<Value, CommandError> {
    let ids = forum
        .list_active_targets(actor, target_type, EngagementKind::Bookmark)
        .await?;
    Ok(json!({ "target_type": target_type, "target_ids": ids }))
}
