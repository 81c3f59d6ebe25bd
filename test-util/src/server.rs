//! In-process daemon for wire-level tests.

use std::net::SocketAddr;

use forumd::{forum::Forum, server::serve};
use tokio::{net::TcpListener, sync::oneshot, task::JoinHandle};
use tracing::debug;

use crate::AnyError;

/// The accept loop running on an ephemeral loopback port.
///
/// Dropping the server without calling [`TestServer::shutdown`] aborts the
/// loop.
#[derive(Debug)]
pub struct TestServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl TestServer {
    /// Bind `127.0.0.1:0` and serve `forum` on a background task.
    ///
    /// # Errors
    /// Returns an error if the listener cannot be bound.
    pub async fn start(forum: Forum) -> Result<Self, AnyError> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let (tx, rx) = oneshot::channel();
        let task = tokio::spawn(async move {
            serve(listener, forum, async {
                if rx.await.is_err() {
                    debug!("test server handle dropped");
                }
            })
            .await;
        });
        Ok(Self {
            addr,
            shutdown: Some(tx),
            task: Some(task),
        })
    }

    /// Address the server is listening on.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr { self.addr }

    /// Request a graceful shutdown and wait for open connections to drain.
    ///
    /// # Errors
    /// Returns an error if the server task panicked.
    pub async fn shutdown(mut self) -> Result<(), AnyError> {
        if let Some(tx) = self.shutdown.take() {
            if tx.send(()).is_err() {
                debug!("test server already stopped");
            }
        }
        if let Some(task) = self.task.take() {
            task.await?;
        }
        Ok(())
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
