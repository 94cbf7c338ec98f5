//! Socket write side of a session.
//!
//! The write half sits behind an async mutex shared by the connection
//! task (direct replies) and the writer task (broadcasts), so writes to
//! one socket never interleave.

use std::sync::Arc;
use std::time::Duration;

use tcpchat_core::SessionId;
use tcpchat_protocol::Outbound;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::{mpsc, Mutex};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::connection::ConnectionError;

/// Write timeout (10 seconds)
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Type alias for a session's shared writer handle
pub type SessionWriter = Arc<Mutex<BufWriter<OwnedWriteHalf>>>;

/// Wraps a write half for sharing.
pub fn session_writer(writer: OwnedWriteHalf) -> SessionWriter {
    Arc::new(Mutex::new(BufWriter::new(writer)))
}

/// Writes `text` verbatim and flushes.
pub async fn write_text(writer: &SessionWriter, text: &str) -> Result<(), ConnectionError> {
    let mut writer = writer.lock().await;

    match timeout(WRITE_TIMEOUT, async {
        writer.write_all(text.as_bytes()).await?;
        writer.flush().await?;
        Ok::<(), std::io::Error>(())
    })
    .await
    {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(ConnectionError::Io(e.to_string())),
        Err(_) => Err(ConnectionError::WriteTimeout),
    }
}

/// Drains a session's outbound queue to its socket.
pub struct OutboundWriter {
    session_id: SessionId,
    writer: SessionWriter,
    queue: mpsc::Receiver<Outbound>,
    closed: CancellationToken,
}

impl OutboundWriter {
    pub fn new(
        session_id: SessionId,
        writer: SessionWriter,
        queue: mpsc::Receiver<Outbound>,
        closed: CancellationToken,
    ) -> Self {
        Self {
            session_id,
            writer,
            queue,
            closed,
        }
    }

    /// Runs until the stop signal fires or the queue closes.
    ///
    /// Write failures do not end the loop; the connection task notices a
    /// dead socket on its next read and fires the stop signal.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                biased;

                _ = self.closed.cancelled() => break,

                message = self.queue.recv() => {
                    let Some(message) = message else { break };
                    if let Err(e) = write_text(&self.writer, &message.render()).await {
                        debug!(session = %self.session_id, error = %e, "Failed to deliver message");
                    }
                }
            }
        }

        debug!(session = %self.session_id, "Writer stopped");
    }
}
