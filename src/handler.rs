//! Connection-level request processing.
//!
//! The handler owns per-client [`Session`] state and turns each incoming
//! frame into exactly one [`Response`]. Each connection runs in its own
//! asynchronous task; nothing here performs network I/O.

use std::net::SocketAddr;

use tracing::{debug, error, warn};

use crate::{
    commands::CommandError,
    forum::Forum,
    privileges::Actor,
    protocol::{Request, Response},
};

/// Message sent in place of the details of an internal failure.
pub const INTERNAL_ERROR_MESSAGE: &str = "internal error";

/// Per-connection context used by [`handle_request`].
#[derive(Clone, Debug)]
pub struct Context {
    /// Remote address, for logs.
    pub peer: SocketAddr,
    /// Shared forum service.
    pub forum: Forum,
}

impl Context {
    /// Bundle a peer address with the forum service.
    #[must_use]
    pub const fn new(peer: SocketAddr, forum: Forum) -> Self { Self { peer, forum } }
}

/// Session state for a single connection.
#[derive(Clone, Debug, Default)]
pub struct Session {
    /// Caller bound by `identify`.
    pub actor: Option<Actor>,
}

impl Session {
    /// Whether an `identify` frame has been accepted.
    #[must_use]
    pub const fn is_identified(&self) -> bool { self.actor.is_some() }

    /// The identified caller.
    ///
    /// # Errors
    /// Returns [`CommandError::NotAuthenticated`] before `identify`.
    pub const fn actor(&self) -> Result<&Actor, CommandError> {
        match &self.actor {
            Some(actor) => Ok(actor),
            None => Err(CommandError::NotAuthenticated),
        }
    }
}

/// Parse and handle a single request frame.
///
/// Failures are reported in the returned [`Response`]; internal ones are
/// logged and replaced by [`INTERNAL_ERROR_MESSAGE`].
pub async fn handle_request(ctx: &Context, session: &mut Session, line: &str) -> Response {
    let request = match Request::parse(line) {
        Ok(request) => request,
        Err(response) => {
            debug!(peer = %ctx.peer, code = response.code, "rejected malformed frame");
            return response;
        }
    };
    let Request { id, command } = request;
    let op = command.name();
    match command.process(ctx.peer, &ctx.forum, session).await {
        Ok(data) => {
            debug!(peer = %ctx.peer, id, op, "request completed");
            Response::success(id, data)
        }
        Err(err) => failure_response(ctx.peer, id, op, &err),
    }
}

fn failure_response(peer: SocketAddr, id: u64, op: &str, err: &CommandError) -> Response {
    let code = err.code();
    if err.is_internal() {
        error!(%peer, id, op, error = %err, "request failed");
        return Response::failure(id, code, INTERNAL_ERROR_MESSAGE);
    }
    if let CommandError::Forum(crate::error::ForumError::NotFound(entity)) = err {
        debug!(%peer, id, op, entity, "target not available");
    } else {
        warn!(%peer, id, op, code, error = %err, "request rejected");
    }
    Response::failure(id, code, err.to_string())
}
