//! Messages sent from the server to clients.
//!
//! Two kinds exist:
//! - [`Reply`]: written directly to one client by its own connection task
//! - [`Outbound`]: broadcast to every registered session via the dispatcher

use std::fmt;

use tcpchat_core::{ChatLine, DisplayName, RESERVED_NAME};

/// Text of the shutdown announcement.
pub const SHUTDOWN_NOTICE: &str = "[Server Shutting Down!]";

/// Prompt redrawn after every delivered line.
const INPUT_PROMPT: &str = "-> ";

// ============================================================================
// Direct Replies
// ============================================================================

/// Fixed replies sent to a single client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// Handshake prompt (no newline, the client types on the same line)
    NamePrompt,

    /// Handshake rejected the name
    InvalidName,

    /// Another registered session holds the name
    NameTaken,

    /// `/change <name>` rejected the name
    InvalidRename,

    /// Instructions sent once the session is registered
    Welcome,

    /// Redraw of the input prompt
    Prompt,

    /// Sent in response to `/exit`
    Farewell,

    /// Capacity rejection at accept time
    ServerFull,
}

impl Reply {
    /// Returns the exact bytes written to the socket.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NamePrompt => "[ENTER YOUR NAME]: ",
            Self::InvalidName => "Invalid name! Please try again...\n",
            Self::NameTaken => "Username already exists! Please try again...\n",
            Self::InvalidRename => "Invalid name. Please try again.\n",
            Self::Welcome => {
                "\nConnected to the server...\nType '/exit' to quit OR '/change <Your New name>' to change name.\n-> "
            }
            Self::Prompt => INPUT_PROMPT,
            Self::Farewell => "Bye Bye! :)\n",
            Self::ServerFull => "Server is full! Please try again later.\n",
        }
    }
}

// ============================================================================
// Broadcast Messages
// ============================================================================

/// A message fanned out to every registered session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Chat text from a session
    Chat(ChatLine),

    /// A session finished its handshake
    Joined(DisplayName),

    /// A session disconnected
    Left(DisplayName),

    /// A session changed its name
    Renamed { old: DisplayName, new: DisplayName },

    /// The server is going down
    Shutdown,
}

impl Outbound {
    /// Returns the framed bytes for the socket.
    ///
    /// Every line is followed by a prompt redraw, except the shutdown
    /// notice, after which the client will not be typing anything.
    pub fn render(&self) -> String {
        match self {
            Self::Shutdown => format!("\n{SHUTDOWN_NOTICE}\n"),
            other => format!("\n{other}\n{INPUT_PROMPT}"),
        }
    }

    /// Whether this message belongs in the transcript.
    ///
    /// Everything but the shutdown notice is recorded, so a replayed
    /// transcript shows joins, leaves and renames alongside chat.
    pub fn is_persisted(&self) -> bool {
        !matches!(self, Self::Shutdown)
    }
}

impl fmt::Display for Outbound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chat(line) => write!(f, "{line}"),
            Self::Joined(name) => write!(f, "[{RESERVED_NAME}]: {name} has joined our chat..."),
            Self::Left(name) => write!(f, "[{RESERVED_NAME}]: {name} has left the chat..."),
            Self::Renamed { old, new } => write!(
                f,
                "[{RESERVED_NAME}]: {old} has changed their name to {new}"
            ),
            Self::Shutdown => f.write_str(SHUTDOWN_NOTICE),
        }
    }
}
