//! tcpchat daemon - multi-client TCP chat server
//!
//! This crate provides the core infrastructure for the chat server:
//! - `registry` - Session registry actor owning the name index
//! - `dispatcher` - Single consumer that fans broadcasts out to sessions
//! - `server` - TCP listener, connection handlers and shutdown sequence
//! - `transcript` - Append-only chat history replayed to new clients
//! - `admission` - Session cap enforced at accept time
//! - `config` - Server configuration loaded from TOML
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       tcpchatd                              │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │   ChatServer    │────▶│     RegistryActor           │   │
//! │  │ (TCP listener)  │     │  (sessions + name index)    │   │
//! │  └────────┬────────┘     └──────────────┬──────────────┘   │
//! │           │                             │                   │
//! │           │ connections                 │ snapshot          │
//! │           ▼                             ▼                   │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │ConnectionHandler│────▶│   Dispatcher                │   │
//! │  │  (per client)   │     │   (broadcast fan-out)       │   │
//! │  └────────┬────────┘     └─────────────────────────────┘   │
//! │           │                                                 │
//! │           ▼                                                 │
//! │  ┌─────────────────┐                                        │
//! │  │   Transcript    │                                        │
//! │  └─────────────────┘                                        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

pub mod admission;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod registry;
pub mod server;
pub mod transcript;
