//! TCP chat server.
//!
//! The server:
//! - Listens on a TCP socket for chat clients
//! - Enforces the session cap at accept time
//! - Spawns a ConnectionHandler for each admitted client
//! - Runs the broadcast dispatcher
//! - Announces shutdown and force-closes sessions when cancelled
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   ChatServer    │
//! │                 │
//! │   TcpListener   │
//! └───────┬─────────┘
//!         │ accept() + Admission::try_admit()
//!         ▼
//! ┌─────────────────┐ register/rename ┌─────────────────┐
//! │ConnectionHandler│────────────────▶│  RegistryHandle │
//! │   (per client)  │                 └────────┬────────┘
//! └───────┬─────────┘                          │ snapshot
//!         │ announce                           ▼
//!         │                           ┌─────────────────┐
//!         └──────────────────────────▶│   Dispatcher    │
//!                                     └────────┬────────┘
//!                                              │ per-session queue
//!                                              ▼
//!                                     ┌─────────────────┐
//!                                     │ OutboundWriter  │
//!                                     │  (per client)   │
//!                                     └─────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Session errors are logged and never stop the accept loop

mod connection;
mod writer;

pub use connection::{ConnectionError, ConnectionHandler};
pub use writer::{OutboundWriter, SessionWriter};

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use tcpchat_core::SessionId;
use tcpchat_protocol::{Outbound, Reply};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::context::ServerContext;
use crate::dispatcher::{spawn_dispatcher, Broadcast};
use crate::registry::spawn_registry;
use crate::transcript::Transcript;

/// TCP chat server.
pub struct ChatServer {
    /// Bound listener
    listener: TcpListener,

    /// Shared state handed to every session
    ctx: ServerContext,

    /// Consumer side of the broadcast queue, moved into the dispatcher
    queue: mpsc::UnboundedReceiver<Broadcast>,

    /// Cancellation token for graceful shutdown
    cancel_token: CancellationToken,

    /// Connection counter for generating session ids
    connection_counter: AtomicU64,
}

impl ChatServer {
    /// Binds the listener and builds the server context.
    ///
    /// # Arguments
    ///
    /// * `config` - Server configuration (host and port select the listener)
    /// * `transcript` - Transcript shared by all sessions
    /// * `cancel_token` - Token that triggers shutdown when cancelled
    pub async fn bind(
        config: ServerConfig,
        transcript: Transcript,
        cancel_token: CancellationToken,
    ) -> Result<Self, ServerError> {
        let addr = config.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: addr.clone(),
                error: e.to_string(),
            })?;

        let (ctx, queue) = ServerContext::new(config, spawn_registry(), transcript);

        Ok(Self {
            listener,
            ctx,
            queue,
            cancel_token,
            connection_counter: AtomicU64::new(0),
        })
    }

    /// Returns the address the listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.listener
            .local_addr()
            .map_err(|e| ServerError::Io(e.to_string()))
    }

    /// Returns the shared server state.
    pub fn context(&self) -> &ServerContext {
        &self.ctx
    }

    /// Runs the server.
    ///
    /// Accepts connections until the cancellation token is triggered, then
    /// performs the shutdown sequence and returns. A failing `accept` is
    /// fatal: the server cannot take new clients, so it returns the error.
    pub async fn run(self) -> Result<(), ServerError> {
        let Self {
            listener,
            ctx,
            queue,
            cancel_token,
            connection_counter,
        } = self;

        if let Ok(addr) = listener.local_addr() {
            info!(addr = %addr, max_clients = ctx.config.max_clients, "Chat server listening");
        }

        spawn_dispatcher(queue, ctx.registry.clone(), ctx.config.fanout_policy);

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    info!("Server shutdown requested");
                    break;
                }

                result = listener.accept() => {
                    let (stream, peer) = result.map_err(|e| {
                        error!(error = %e, "Failed to accept connection");
                        ServerError::Accept(e.to_string())
                    })?;
                    let conn_num = connection_counter.fetch_add(1, Ordering::Relaxed);
                    handle_connection(&ctx, stream, peer, SessionId::new(conn_num));
                }
            }
        }

        drop(listener);
        shutdown(&ctx).await;
        Ok(())
    }
}

/// Admits a new connection and spawns its handler, or turns it away.
fn handle_connection(ctx: &ServerContext, stream: TcpStream, peer: SocketAddr, id: SessionId) {
    let Some(permit) = ctx.admission.try_admit() else {
        warn!(peer = %peer, max = ctx.admission.max(), "Server full, rejecting connection");
        tokio::spawn(reject_full(stream));
        return;
    };

    debug!(session = %id, peer = %peer, clients = ctx.admission.count(), "Connection admitted");

    let handler = ConnectionHandler::new(stream, peer, id, ctx.clone(), permit);
    tokio::spawn(handler.run());
}

/// Writes the capacity message and closes the socket.
async fn reject_full(mut stream: TcpStream) {
    if let Err(e) = stream.write_all(Reply::ServerFull.as_str().as_bytes()).await {
        debug!(error = %e, "Failed to send capacity rejection");
    }
    let _ = stream.shutdown().await;
}

/// Announces shutdown, waits the grace period, then force-closes every
/// session. Sessions closed here are removed from the registry in bulk,
/// so they do not announce their own departure.
async fn shutdown(ctx: &ServerContext) {
    info!("Server shutting down");
    ctx.announce(Outbound::Shutdown).await;

    sleep(ctx.config.shutdown_grace()).await;

    let sessions = ctx.registry.drain().await;
    for entry in &sessions {
        debug!(session = %entry.id, name = %entry.name, "Force-closing session");
        entry.closed.cancel();
    }
    ctx.force_close_all();

    info!(closed = sessions.len(), "Server shutdown complete");
}

/// Errors that can occur in server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {error}")]
    Bind { addr: String, error: String },

    #[error("Failed to accept connection: {0}")]
    Accept(String),

    #[error("I/O error: {0}")]
    Io(String),
}
