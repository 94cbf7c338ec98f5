//! Domain-specific error types following panic-free policy.

use thiserror::Error;

/// Reasons a requested display name is refused.
///
/// Uniqueness is not checked here; that needs the live registry and is
/// reported by the daemon instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NameError {
    /// Nothing printable left after filtering
    #[error("name is empty")]
    Empty,

    /// Name collides with the server's own identity
    #[error("name '{0}' is reserved")]
    Reserved(String),

    /// Name would be confused with the rename command
    #[error("name must not start with '{0}'")]
    CommandPrefix(&'static str),

    /// Raw input carried a terminal escape (arrow key) sequence
    #[error("name contains a terminal escape sequence")]
    EscapeSequence,
}

/// Result type for name validation.
pub type NameResult<T> = Result<T, NameError>;
