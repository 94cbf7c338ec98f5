//! Registry actor commands, errors, and the session entry they carry.
//!
//! This module defines the message types for communicating with the `RegistryActor`:
//! - `RegistryCommand`: Commands sent to the actor
//! - `RegistryError`: Errors that can occur during registry operations
//! - `SessionEntry`: What the registry stores per live session
//!
//! All types are designed for async message passing and follow the panic-free policy.

use std::net::SocketAddr;

use chrono::{DateTime, Utc};
use tcpchat_core::{DisplayName, SessionId};
use tcpchat_protocol::Outbound;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

// ============================================================================
// Session Entry
// ============================================================================

/// Everything the rest of the server needs to reach one live session.
///
/// Cloning is cheap: the queue sender and the stop signal are handles.
#[derive(Debug, Clone)]
pub struct SessionEntry {
    /// Connection identity (registry key)
    pub id: SessionId,

    /// Current display name, unique among registered entries
    pub name: DisplayName,

    /// Remote address of the client
    pub peer: SocketAddr,

    /// When the handshake completed
    pub joined_at: DateTime<Utc>,

    /// Bounded queue drained by the session's writer task
    pub outbound: mpsc::Sender<Outbound>,

    /// Fired once to stop the writer and drop the connection
    pub closed: CancellationToken,

    /// Transcript offset the session's history replay stopped at.
    /// Persisted broadcasts stored before it were already replayed.
    pub history_end: u64,
}

impl SessionEntry {
    /// Creates an entry stamped with the current time.
    pub fn new(
        id: SessionId,
        name: DisplayName,
        peer: SocketAddr,
        outbound: mpsc::Sender<Outbound>,
        closed: CancellationToken,
    ) -> Self {
        Self {
            id,
            name,
            peer,
            joined_at: Utc::now(),
            outbound,
            closed,
            history_end: 0,
        }
    }

    /// Marks the transcript prefix this session replays on join.
    pub fn with_history_end(mut self, end: u64) -> Self {
        self.history_end = end;
        self
    }
}

// ============================================================================
// Registry Commands
// ============================================================================

/// Commands sent to the registry actor.
///
/// Each command uses a oneshot channel for the response, enabling
/// request-response patterns in async code without blocking.
/// Compound operations (name check plus insert or rename) are a single
/// command, which makes them atomic with respect to every other caller.
#[derive(Debug)]
pub enum RegistryCommand {
    /// Register a session if its name is free.
    ///
    /// # Errors
    /// - `RegistryError::NameTaken` if another session holds the name
    /// - `RegistryError::SessionAlreadyExists` if the id is already registered
    Register {
        /// The entry to insert (boxed to keep the enum small)
        entry: Box<SessionEntry>,
        /// Channel to send the result
        respond_to: oneshot::Sender<Result<(), RegistryError>>,
    },

    /// Change a session's name if the new one is free.
    ///
    /// Responds with the previous name.
    ///
    /// # Errors
    /// - `RegistryError::NameTaken` if another session holds the name
    /// - `RegistryError::SessionNotFound` if the session is not registered
    Rename {
        session_id: SessionId,
        name: DisplayName,
        respond_to: oneshot::Sender<Result<DisplayName, RegistryError>>,
    },

    /// Remove a session. Responds with the removed entry, or `None` if it
    /// was already gone.
    Unregister {
        session_id: SessionId,
        respond_to: oneshot::Sender<Option<SessionEntry>>,
    },

    /// Check whether a name is held by any registered session.
    NameExists {
        name: DisplayName,
        respond_to: oneshot::Sender<bool>,
    },

    /// Copy of every registered entry.
    Snapshot {
        respond_to: oneshot::Sender<Vec<SessionEntry>>,
    },

    /// Remove and return every registered entry.
    Drain {
        respond_to: oneshot::Sender<Vec<SessionEntry>>,
    },

    /// Number of registered sessions.
    Count { respond_to: oneshot::Sender<usize> },
}

// ============================================================================
// Registry Errors
// ============================================================================

/// Errors that can occur during registry operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// Another registered session already uses this name.
    #[error("Name already taken: {name}")]
    NameTaken { name: DisplayName },

    /// The session is not registered.
    #[error("Session not found: {session_id}")]
    SessionNotFound { session_id: SessionId },

    /// The session id is already registered.
    #[error("Session already registered: {session_id}")]
    SessionAlreadyExists { session_id: SessionId },

    /// The actor has stopped.
    #[error("Registry channel closed")]
    ChannelClosed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_error_display() {
        let err = RegistryError::NameTaken {
            name: DisplayName::parse("carol").unwrap(),
        };
        assert_eq!(err.to_string(), "Name already taken: carol");

        let err = RegistryError::SessionNotFound {
            session_id: SessionId::new(4),
        };
        assert_eq!(err.to_string(), "Session not found: conn-4");
    }
}
