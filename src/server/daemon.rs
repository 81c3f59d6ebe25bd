//! Tokio accept loop speaking the JSON-lines protocol.
//!
//! Each accepted socket is served on its own task. A shutdown request stops
//! the accept loop, tells every connection task to finish, and waits for them
//! before returning.

#![expect(
    clippy::integer_division_remainder_used,
    reason = "tokio::select! macro usage"
)]

use std::{future::Future, io, net::SocketAddr};

use anyhow::Result;
use futures_util::{SinkExt, StreamExt};
use tokio::{
    net::{TcpListener, TcpStream},
    sync::watch,
    task::JoinSet,
};
use tokio_util::codec::{Framed, LinesCodecError};
use tracing::{debug, error, info, warn};

use super::{bootstrap, cli::AppConfig};
use crate::{
    commands::ERR_INVALID_PAYLOAD,
    forum::Forum,
    handler::{Context as HandlerContext, Session, handle_request},
    protocol::{self, Response},
};

/// Run the daemon using the supplied configuration until SIGINT or SIGTERM.
///
/// # Errors
///
/// Returns any failure reported while preparing the database or binding the
/// socket.
pub async fn run_daemon(cfg: AppConfig) -> Result<()> {
    let forum = bootstrap::open_forum(&cfg).await?;
    let listener = TcpListener::bind(&cfg.bind).await?;
    info!(bind = %cfg.bind, "forumd listening");
    serve(listener, forum, shutdown_signal()).await;
    Ok(())
}

/// Accept connections on `listener` until `shutdown` completes, then drain
/// open connections. Accept and connection errors are logged and do not stop
/// the loop.
pub async fn serve<S>(listener: TcpListener, forum: Forum, shutdown: S)
where
    S: Future<Output = ()>,
{
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut join_set = JoinSet::new();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            () = &mut shutdown => {
                info!("shutdown signal received");
                break;
            }
            res = listener.accept() => {
                handle_accept_result(res, &forum, &shutdown_rx, &mut join_set);
            }
        }
    }

    if shutdown_tx.send(true).is_err() {
        debug!("no connection tasks to notify");
    }
    await_spawned_tasks(&mut join_set).await;
    info!("all connections closed");
}

fn handle_accept_result(
    res: io::Result<(TcpStream, SocketAddr)>,
    forum: &Forum,
    shutdown_rx: &watch::Receiver<bool>,
    join_set: &mut JoinSet<()>,
) {
    match res {
        Ok((socket, peer)) => {
            debug!(%peer, "connection accepted");
            let ctx = HandlerContext::new(peer, forum.clone());
            let mut shutdown_rx = shutdown_rx.clone();
            join_set.spawn(async move {
                if let Err(e) = handle_client(socket, ctx, &mut shutdown_rx).await {
                    warn!(%peer, error = %e, "connection error");
                }
            });
        }
        Err(e) => warn!(error = %e, "accept error"),
    }
}

async fn await_spawned_tasks(join_set: &mut JoinSet<()>) {
    while let Some(res) = join_set.join_next().await {
        if let Err(e) = res {
            error!(error = %e, "connection task failed");
        }
    }
}

/// Serve one connection: one response line per request line, in order.
async fn handle_client(
    socket: TcpStream,
    ctx: HandlerContext,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<()> {
    let mut framed = Framed::new(socket, protocol::codec());
    let mut session = Session::default();
    loop {
        tokio::select! {
            frame = framed.next() => match frame {
                Some(Ok(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    let resp = handle_request(&ctx, &mut session, &line).await;
                    framed.send(resp.to_line()).await?;
                }
                Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                    let resp = Response::failure(0, ERR_INVALID_PAYLOAD, "frame too long");
                    framed.send(resp.to_line()).await?;
                }
                Some(Err(LinesCodecError::Io(e))) => return Err(e.into()),
                None => break,
            },
            _ = shutdown.changed() => {
                break;
            }
        }
    }
    debug!(peer = %ctx.peer, "connection closed");
    Ok(())
}

/// Waits for a shutdown signal, completing when termination is requested.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    res = tokio::signal::ctrl_c() => {
                        if let Err(err) = res {
                            error!(error = %err, "failed to listen for Ctrl-C");
                        }
                    },
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                error!(error = %err, "failed to install SIGTERM handler");
                wait_for_ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        wait_for_ctrl_c().await;
    }
}

async fn wait_for_ctrl_c() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for Ctrl-C");
    }
}
