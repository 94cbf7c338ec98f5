//! Session identity and display names.

use std::borrow::Borrow;
use std::fmt;

use crate::error::{NameError, NameResult};
use crate::text::{contains_arrow_key, sanitize};

// ============================================================================
// Type-Safe Identifiers
// ============================================================================

/// Identity of one accepted connection.
///
/// Assigned from the server's accept counter, so it is unique for the
/// lifetime of the process and is never reused, unlike display names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    /// Creates a SessionId from a connection number.
    pub const fn new(connection_number: u64) -> Self {
        Self(connection_number)
    }

    /// Returns the underlying connection number.
    pub const fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

// ============================================================================
// Display Names
// ============================================================================

/// Name the server speaks as; clients may not claim it.
pub const RESERVED_NAME: &str = "Server";

/// Placeholder used in logs for a connection that never finished the handshake.
pub const UNKNOWN_NAME: &str = "Unknown!";

/// Prefix of the rename command. Names may not start with it.
const RENAME_PREFIX: &str = "/change";

/// A validated display name.
///
/// Guaranteed non-empty, printable ASCII only, trimmed, not the reserved
/// server name and not starting with the rename command.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DisplayName(String);

impl DisplayName {
    /// Validates raw client input as a display name.
    ///
    /// Escape sequences are checked on the raw input, because filtering
    /// would strip the ESC byte and leave `[A` behind.
    pub fn parse(raw: &str) -> NameResult<Self> {
        if contains_arrow_key(raw) {
            return Err(NameError::EscapeSequence);
        }

        let name = sanitize(raw);
        if name.is_empty() {
            return Err(NameError::Empty);
        }
        if name == RESERVED_NAME {
            return Err(NameError::Reserved(name));
        }
        if name.starts_with(RENAME_PREFIX) {
            return Err(NameError::CommandPrefix(RENAME_PREFIX));
        }

        Ok(Self(name))
    }

    /// Returns the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DisplayName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DisplayName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for DisplayName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for DisplayName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for DisplayName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}
