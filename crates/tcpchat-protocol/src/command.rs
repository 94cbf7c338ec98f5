//! Parsing client input lines into commands.

use tcpchat_core::contains_arrow_key;

/// Command that disconnects the client.
pub const EXIT_COMMAND: &str = "/exit";

/// Command that renames the client.
pub const RENAME_COMMAND: &str = "/change";

/// A single line of client input, classified.
///
/// Arguments are kept raw; name validation and text filtering happen
/// where the value is used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    /// Empty, whitespace-only or arrow-key line; only the prompt is redrawn
    Blank,

    /// `/change <name>` with the raw new name
    Rename(String),

    /// `/change` without an argument; the server prompts for the new name
    RenamePrompt,

    /// `/exit`
    Exit,

    /// Anything else is chat text
    Message(String),
}

impl ClientCommand {
    /// Classifies one line (without its line terminator).
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();

        if trimmed.is_empty() || contains_arrow_key(line) {
            return Self::Blank;
        }

        if trimmed == EXIT_COMMAND {
            return Self::Exit;
        }

        if trimmed == RENAME_COMMAND {
            return Self::RenamePrompt;
        }

        if let Some(arg) = trimmed
            .strip_prefix(RENAME_COMMAND)
            .and_then(|rest| rest.strip_prefix(' '))
        {
            return Self::Rename(arg.to_string());
        }

        Self::Message(line.to_string())
    }
}
