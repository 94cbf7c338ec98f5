//! Client interface for interacting with the RegistryActor.
//!
//! The `RegistryHandle` provides a cheap-to-clone interface for sending commands
//! to the registry actor.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Channel errors are mapped to `RegistryError::ChannelClosed`

use tcpchat_core::{DisplayName, SessionId};
use tokio::sync::{mpsc, oneshot};

use super::commands::{RegistryCommand, RegistryError, SessionEntry};

// ============================================================================
// Registry Handle
// ============================================================================

/// Handle for interacting with the registry actor.
///
/// This is a cheap-to-clone handle that can be shared across tasks.
/// All methods are async and communicate with the actor via channels.
///
/// # Usage
///
/// ```ignore
/// let handle = registry_handle.clone();
///
/// // Claim a name atomically
/// handle.register(entry).await?;
///
/// // Fan out to a snapshot
/// for entry in handle.snapshot().await {
///     entry.outbound.send(msg.clone()).await?;
/// }
/// ```
#[derive(Clone)]
pub struct RegistryHandle {
    /// Command sender to the actor
    sender: mpsc::Sender<RegistryCommand>,
}

impl RegistryHandle {
    /// Create a new registry handle.
    pub fn new(sender: mpsc::Sender<RegistryCommand>) -> Self {
        Self { sender }
    }

    /// Register a session, claiming its name.
    ///
    /// The name check and the insert happen in one actor step, so two
    /// handshakes racing for the same name cannot both succeed.
    ///
    /// # Errors
    ///
    /// - `RegistryError::NameTaken` if another session holds the name
    /// - `RegistryError::SessionAlreadyExists` if the id is already registered
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn register(&self, entry: SessionEntry) -> Result<(), RegistryError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::Register {
                entry: Box::new(entry),
                respond_to: tx,
            })
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;

        rx.await.map_err(|_| RegistryError::ChannelClosed)?
    }

    /// Rename a registered session. Returns the previous name.
    ///
    /// # Errors
    ///
    /// - `RegistryError::NameTaken` if another session holds the name
    /// - `RegistryError::SessionNotFound` if the session is not registered
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn rename(
        &self,
        session_id: SessionId,
        name: DisplayName,
    ) -> Result<DisplayName, RegistryError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::Rename {
                session_id,
                name,
                respond_to: tx,
            })
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;

        rx.await.map_err(|_| RegistryError::ChannelClosed)?
    }

    /// Remove a session from the registry.
    ///
    /// Returns the removed entry, or `None` if the session was not
    /// registered (already removed, or the actor is gone). Whoever gets
    /// `Some` is the one path that observed the removal.
    pub async fn unregister(&self, session_id: SessionId) -> Option<SessionEntry> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::Unregister {
                session_id,
                respond_to: tx,
            })
            .await
            .ok()?;

        rx.await.ok()?
    }

    /// Check whether any registered session holds `name`.
    ///
    /// Returns `false` if communication with the actor fails.
    pub async fn name_exists(&self, name: DisplayName) -> bool {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::NameExists {
                name,
                respond_to: tx,
            })
            .await
            .is_err()
        {
            return false;
        }

        rx.await.unwrap_or(false)
    }

    /// Copy of every registered entry.
    ///
    /// Returns an empty vector if communication with the actor fails.
    pub async fn snapshot(&self) -> Vec<SessionEntry> {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::Snapshot { respond_to: tx })
            .await
            .is_err()
        {
            return Vec::new();
        }

        rx.await.unwrap_or_default()
    }

    /// Remove and return every registered entry.
    pub async fn drain(&self) -> Vec<SessionEntry> {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::Drain { respond_to: tx })
            .await
            .is_err()
        {
            return Vec::new();
        }

        rx.await.unwrap_or_default()
    }

    /// Number of registered sessions (0 if the actor is gone).
    pub async fn count(&self) -> usize {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::Count { respond_to: tx })
            .await
            .is_err()
        {
            return 0;
        }

        rx.await.unwrap_or(0)
    }

    /// Check if the actor is still running.
    ///
    /// Returns `true` if the command channel is still open.
    pub fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }
}
