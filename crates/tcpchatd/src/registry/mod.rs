//! Session registry using Actor pattern.
//!
//! The registry is the live set of chat sessions that finished their name
//! handshake. It receives commands via a tokio mpsc channel and is the
//! single source of truth for which names are in use.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐  RegistryCommand  ┌─────────────────┐
//! │ConnectionHandler │──────────────────▶│  RegistryActor  │
//! │  (per client)    │   (mpsc channel)  │                 │
//! └──────────────────┘                   │ HashMap<SessionId,
//! ┌──────────────────┐     Snapshot      │   SessionEntry> │
//! │   Dispatcher     │──────────────────▶│ HashMap<Name,   │
//! └──────────────────┘                   │   SessionId>    │
//! ┌──────────────────┐      Drain        │                 │
//! │    Shutdown      │──────────────────▶│                 │
//! └──────────────────┘                   └─────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All operations in this module follow the panic-free policy:
//! - No `.unwrap()` or `.expect()` in production code
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

use tokio::sync::mpsc;

mod actor;
mod commands;
mod handle;

pub use actor::RegistryActor;
pub use commands::{RegistryCommand, RegistryError, SessionEntry};
pub use handle::RegistryHandle;

/// Channel buffer size
const COMMAND_BUFFER: usize = 100;

/// Spawn the registry actor and return a handle for interaction.
///
/// The actor stops once every handle has been dropped.
///
/// # Example
///
/// ```no_run
/// use tcpchatd::registry::spawn_registry;
///
/// #[tokio::main]
/// async fn main() {
///     let handle = spawn_registry();
///     let sessions = handle.snapshot().await;
///     assert!(sessions.is_empty());
/// }
/// ```
pub fn spawn_registry() -> RegistryHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);

    let actor = RegistryActor::new(cmd_rx);
    tokio::spawn(actor.run());

    RegistryHandle::new(cmd_tx)
}
