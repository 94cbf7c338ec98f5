//! Connection handler for individual chat clients.
//!
//! Each admitted client gets its own `ConnectionHandler` that:
//! - Negotiates a unique display name
//! - Replays the transcript and announces the join
//! - Spawns the session's outbound writer task
//! - Reads lines, parses commands, and forwards chat to the dispatcher
//! - Cleans up exactly once when the session ends
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Connection errors are logged and result in graceful disconnect

use std::net::SocketAddr;
use std::time::Duration;

use chrono::Utc;
use tcpchat_core::{ChatLine, DisplayName, SessionId, UNKNOWN_NAME};
use tcpchat_protocol::{ClientCommand, Outbound, Reply};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::writer::{session_writer, write_text, OutboundWriter, SessionWriter};
use crate::admission::AdmissionPermit;
use crate::context::ServerContext;
use crate::registry::{RegistryError, SessionEntry};

/// Bound on closing the socket during cleanup
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// How a name is claimed once it passes validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Claim {
    /// First name: insert the session into the registry
    Register,
    /// Later name change: rename the registered session
    Rename,
}

/// Why the read loop ended without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Departure {
    /// Client sent `/exit`
    Exit,
    /// Client closed the socket
    Disconnected,
}

/// Connection handler for a single chat client.
pub struct ConnectionHandler {
    /// Connection identity
    session_id: SessionId,

    /// Remote address
    peer: SocketAddr,

    /// Buffered reader for incoming lines
    reader: BufReader<OwnedReadHalf>,

    /// Shared writer for replies and broadcasts
    writer: SessionWriter,

    /// Sender side of the outbound queue (goes into the registry entry)
    outbound_tx: mpsc::Sender<Outbound>,

    /// Receiver side, handed to the writer task once registered
    outbound_rx: Option<mpsc::Receiver<Outbound>>,

    /// Session stop signal
    closed: CancellationToken,

    /// Transcript offset the history replay stops at, fixed at registration
    history_end: u64,

    /// Shared server state
    ctx: ServerContext,

    /// Admission slot, released when the handler is dropped
    _permit: AdmissionPermit,
}

impl ConnectionHandler {
    /// Creates a new connection handler.
    ///
    /// # Arguments
    ///
    /// * `stream` - The accepted TCP stream
    /// * `peer` - Remote address of the client
    /// * `session_id` - Identity assigned by the accept loop
    /// * `ctx` - Shared server state
    /// * `permit` - Admission slot held for the life of the connection
    pub fn new(
        stream: TcpStream,
        peer: SocketAddr,
        session_id: SessionId,
        ctx: ServerContext,
        permit: AdmissionPermit,
    ) -> Self {
        let (reader, writer) = stream.into_split();
        let (outbound_tx, outbound_rx) = mpsc::channel(ctx.config.queue_capacity);

        Self {
            session_id,
            peer,
            reader: BufReader::new(reader),
            writer: session_writer(writer),
            outbound_tx,
            outbound_rx: Some(outbound_rx),
            closed: ctx.session_token(),
            history_end: 0,
            ctx,
            _permit: permit,
        }
    }

    /// Runs the connection to completion.
    ///
    /// Performs the handshake, then processes lines until the client
    /// exits, disconnects, or the session is force-closed.
    pub async fn run(mut self) {
        debug!(session = %self.session_id, peer = %self.peer, "New client connected");

        let name = match self.negotiate_name(Claim::Register).await {
            Ok((name, _)) => name,
            Err(e) => {
                info!(
                    session = %self.session_id,
                    name = UNKNOWN_NAME,
                    reason = %e,
                    "Client left before choosing a name"
                );
                self.close_socket().await;
                return;
            }
        };

        info!(session = %self.session_id, name = %name, peer = %self.peer, "Client joined");

        let result = match self.start_session(&name).await {
            Ok(()) => self.process_lines(name).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(Departure::Exit) => debug!(session = %self.session_id, "Client sent /exit"),
            Ok(Departure::Disconnected) => debug!(session = %self.session_id, "Client sent EOF"),
            Err(e) => debug!(session = %self.session_id, error = %e, "Connection closed"),
        }

        self.cleanup().await;
    }

    /// Prompts until the client supplies a valid name that can be claimed.
    ///
    /// Returns the new name and, for renames, the previous one.
    async fn negotiate_name(
        &mut self,
        claim: Claim,
    ) -> Result<(DisplayName, Option<DisplayName>), ConnectionError> {
        loop {
            self.reply(Reply::NamePrompt).await?;
            let line = self.read_line().await?;

            let name = match DisplayName::parse(&line) {
                Ok(name) => name,
                Err(e) => {
                    debug!(session = %self.session_id, reason = %e, "Rejected name");
                    self.reply(Reply::InvalidName).await?;
                    continue;
                }
            };

            let claimed = match claim {
                Claim::Register => match self.register(name.clone()).await {
                    Ok(history_end) => {
                        self.history_end = history_end;
                        Ok(None)
                    }
                    Err(e) => Err(e),
                },
                Claim::Rename => self
                    .ctx
                    .registry
                    .rename(self.session_id, name.clone())
                    .await
                    .map(Some),
            };

            match claimed {
                Ok(previous) => return Ok((name, previous)),
                Err(RegistryError::NameTaken { .. }) => {
                    self.reply(Reply::NameTaken).await?;
                }
                Err(e) => return Err(ConnectionError::Registry(e.to_string())),
            }
        }
    }

    /// Inserts this session into the registry under `name`.
    ///
    /// Runs under the transcript lock, so every stored broadcast lands
    /// either before the returned offset (replayed as history) or after
    /// it (queued to this session), never both.
    async fn register(&self, name: DisplayName) -> Result<u64, RegistryError> {
        let transcript = self.ctx.transcript.lock().await;
        let history_end = transcript.end();

        let entry = SessionEntry::new(
            self.session_id,
            name,
            self.peer,
            self.outbound_tx.clone(),
            self.closed.clone(),
        )
        .with_history_end(history_end);
        self.ctx.registry.register(entry).await?;

        Ok(history_end)
    }

    /// Replays history, greets the client, starts the writer task and
    /// announces the join.
    async fn start_session(&mut self, name: &DisplayName) -> Result<(), ConnectionError> {
        for line in self.ctx.transcript.history(self.history_end).await {
            write_text(&self.writer, &format!("{line}\n")).await?;
        }
        self.reply(Reply::Welcome).await?;

        if let Some(queue) = self.outbound_rx.take() {
            let writer = OutboundWriter::new(
                self.session_id,
                self.writer.clone(),
                queue,
                self.closed.clone(),
            );
            tokio::spawn(writer.run());
        }

        self.ctx.announce(Outbound::Joined(name.clone())).await;
        Ok(())
    }

    /// Main line processing loop.
    async fn process_lines(&mut self, mut name: DisplayName) -> Result<Departure, ConnectionError> {
        loop {
            let line = match self.read_line().await {
                Ok(line) => line,
                Err(ConnectionError::Eof) => return Ok(Departure::Disconnected),
                Err(e) => return Err(e),
            };

            match ClientCommand::parse(&line) {
                ClientCommand::Blank => self.reply(Reply::Prompt).await?,

                ClientCommand::Exit => {
                    self.reply(Reply::Farewell).await?;
                    return Ok(Departure::Exit);
                }

                ClientCommand::Rename(raw) => {
                    if let Some(new) = self.rename_inline(&raw).await? {
                        name = new;
                    }
                }

                ClientCommand::RenamePrompt => {
                    let (new, previous) = self.negotiate_name(Claim::Rename).await?;
                    let old = previous.unwrap_or_else(|| name.clone());
                    self.announce_rename(old, new.clone()).await;
                    name = new;
                }

                ClientCommand::Message(text) => match ChatLine::new(name.clone(), &text) {
                    Some(line) => self.ctx.announce(Outbound::Chat(line)).await,
                    None => debug!(session = %self.session_id, "Discarded unprintable message"),
                },
            }
        }
    }

    /// Handles `/change <name>`. Returns the new name if it was applied.
    async fn rename_inline(&mut self, raw: &str) -> Result<Option<DisplayName>, ConnectionError> {
        let new = match DisplayName::parse(raw) {
            Ok(new) => new,
            Err(e) => {
                debug!(session = %self.session_id, reason = %e, "Rejected rename");
                self.reply(Reply::InvalidRename).await?;
                return Ok(None);
            }
        };

        match self.ctx.registry.rename(self.session_id, new.clone()).await {
            Ok(old) => {
                self.announce_rename(old, new.clone()).await;
                Ok(Some(new))
            }
            Err(RegistryError::NameTaken { .. }) => {
                self.reply(Reply::NameTaken).await?;
                Ok(None)
            }
            Err(e) => Err(ConnectionError::Registry(e.to_string())),
        }
    }

    async fn announce_rename(&self, old: DisplayName, new: DisplayName) {
        info!(session = %self.session_id, old = %old, new = %new, "Client renamed");
        self.ctx.announce(Outbound::Renamed { old, new }).await;
    }

    /// Ends the session. Safe to race with shutdown: only the path that
    /// actually removes the registry entry announces the departure.
    async fn cleanup(&mut self) {
        if let Some(entry) = self.ctx.registry.unregister(self.session_id).await {
            let connected_secs = (Utc::now() - entry.joined_at).num_seconds();
            info!(session = %self.session_id, name = %entry.name, connected_secs, "Client left");
            self.ctx.announce(Outbound::Left(entry.name)).await;
        }

        self.closed.cancel();
        self.close_socket().await;
    }

    /// Shuts down the write half; the read half drops with the handler.
    async fn close_socket(&self) {
        let mut writer = self.writer.lock().await;
        if let Ok(Err(e)) = timeout(CLOSE_TIMEOUT, writer.shutdown()).await {
            debug!(session = %self.session_id, error = %e, "Socket shutdown failed");
        }
    }

    /// Reads one line, without its terminator.
    ///
    /// The limit counts the terminator, so with `max_line_bytes = 64` a
    /// line may carry 63 bytes before `\n` or 62 before `\r\n`.
    /// Invalid UTF-8 is replaced rather than rejected; filtering later
    /// drops anything outside printable ASCII anyway.
    async fn read_line(&mut self) -> Result<String, ConnectionError> {
        let limit = self.ctx.config.max_line_bytes;
        let mut buf = Vec::new();
        let mut limited = (&mut self.reader).take((limit as u64).saturating_add(1));

        let bytes_read = tokio::select! {
            _ = self.closed.cancelled() => return Err(ConnectionError::Closed),
            result = limited.read_until(b'\n', &mut buf) => {
                result.map_err(|e| ConnectionError::Io(e.to_string()))?
            }
        };

        if bytes_read == 0 {
            return Err(ConnectionError::Eof);
        }

        if buf.len() > limit {
            warn!(session = %self.session_id, size = buf.len(), "Line too long, disconnecting");
            return Err(ConnectionError::LineTooLong {
                size: buf.len(),
                max: limit,
            });
        }

        while matches!(buf.last(), Some(b'\n' | b'\r')) {
            buf.pop();
        }

        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Sends a fixed reply to this client only.
    async fn reply(&self, reply: Reply) -> Result<(), ConnectionError> {
        write_text(&self.writer, reply.as_str()).await
    }
}

/// Errors that can occur during connection handling.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Connection closed")]
    Eof,

    #[error("Session closed by server")]
    Closed,

    #[error("Write timeout")]
    WriteTimeout,

    #[error("Line too long: {size} bytes (max: {max})")]
    LineTooLong { size: usize, max: usize },

    #[error("Registry error: {0}")]
    Registry(String),
}
