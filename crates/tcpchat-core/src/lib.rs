//! tcpchat Core - Shared domain types for the chat server
//!
//! This crate provides the domain types shared between the line
//! protocol (`tcpchat-protocol`) and the daemon (`tcpchatd`).
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod chat;
pub mod error;
pub mod session;
pub mod text;

// Re-exports for convenience
pub use chat::{ChatLine, TIMESTAMP_FORMAT};
pub use error::{NameError, NameResult};
pub use session::{DisplayName, SessionId, RESERVED_NAME, UNKNOWN_NAME};
pub use text::{contains_arrow_key, filter_printable, sanitize};
