//! Shared server state, constructed once and handed to every component.

use std::sync::Arc;

use tcpchat_protocol::Outbound;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::admission::Admission;
use crate::config::ServerConfig;
use crate::dispatcher::Broadcast;
use crate::registry::RegistryHandle;
use crate::transcript::Transcript;

/// Handles to everything a connection, the dispatcher or the shutdown
/// path needs. Cheap to clone.
#[derive(Clone)]
pub struct ServerContext {
    /// Immutable configuration
    pub config: Arc<ServerConfig>,

    /// Live session registry
    pub registry: RegistryHandle,

    /// Session count limiter
    pub admission: Arc<Admission>,

    /// Persistent chat history
    pub transcript: Arc<Transcript>,

    /// Producer side of the broadcast queue
    broadcast: mpsc::UnboundedSender<Broadcast>,

    /// Parent of every session's stop signal; cancelled to force-close all
    force_close: CancellationToken,
}

impl ServerContext {
    /// Builds a context and returns the consumer side of the broadcast
    /// queue, which belongs to the dispatcher.
    pub fn new(
        config: ServerConfig,
        registry: RegistryHandle,
        transcript: Transcript,
    ) -> (Self, mpsc::UnboundedReceiver<Broadcast>) {
        let (broadcast, queue) = mpsc::unbounded_channel();
        let admission = Admission::new(config.max_clients);

        let ctx = Self {
            config: Arc::new(config),
            registry,
            admission,
            transcript: Arc::new(transcript),
            broadcast,
            force_close: CancellationToken::new(),
        };

        (ctx, queue)
    }

    /// Records a message in the transcript (if it belongs there) and
    /// queues it for every registered session.
    ///
    /// The transcript lock is held until the message is queued, so the
    /// transcript order matches the broadcast order and a session that
    /// registers under the same lock sees each message exactly once.
    pub async fn announce(&self, message: Outbound) {
        let mut transcript = self.transcript.lock().await;
        let offset = if message.is_persisted() {
            transcript.append(&message.to_string()).await
        } else {
            None
        };

        if self.broadcast.send(Broadcast { message, offset }).is_err() {
            debug!("Broadcast queue closed, message dropped");
        }
    }

    /// A fresh stop signal for one session, cancelled along with all the
    /// others by [`ServerContext::force_close_all`].
    pub fn session_token(&self) -> CancellationToken {
        self.force_close.child_token()
    }

    /// Fires every session's stop signal, including sessions still in
    /// the handshake.
    pub fn force_close_all(&self) {
        self.force_close.cancel();
    }
}
