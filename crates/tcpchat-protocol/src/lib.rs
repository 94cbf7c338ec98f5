//! tcpchat Protocol - Line protocol spoken over the raw TCP socket
//!
//! The protocol is newline-delimited text with no length framing, so that
//! `nc host 8989` is a complete client. This crate covers both directions:
//! - `command` - parsing client lines into commands
//! - `message` - server replies and broadcast messages, with their framing

pub mod command;
pub mod message;

pub use command::{ClientCommand, EXIT_COMMAND, RENAME_COMMAND};
pub use message::{Outbound, Reply, SHUTDOWN_NOTICE};
