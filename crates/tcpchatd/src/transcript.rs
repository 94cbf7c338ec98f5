//! Append-only chat transcript.
//!
//! One record per line. The transcript is best-effort: if the file cannot
//! be opened or written, the failure is logged and chat carries on without
//! history.
//!
//! Every appended record has a byte offset. Holding a [`TranscriptGuard`]
//! freezes the end of the file, which lets a joining session replay
//! exactly the records written before it registered.

use std::path::{Path, PathBuf};

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

/// Shared transcript writer.
#[derive(Debug)]
pub struct Transcript {
    /// Backing file path (`None` when disabled)
    path: Option<PathBuf>,

    /// Append handle and current end offset, shared by every session
    state: Mutex<AppendState>,
}

#[derive(Debug)]
struct AppendState {
    file: Option<File>,
    end: u64,
}

impl Transcript {
    /// Opens (creating if needed) the transcript for appending.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, TranscriptError> {
        let path = path.into();
        let open_error = |e: std::io::Error| TranscriptError::Open {
            path: path.clone(),
            error: e.to_string(),
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(open_error)?;
        let end = file.metadata().await.map_err(open_error)?.len();

        debug!(path = %path.display(), end, "Transcript opened");

        Ok(Self {
            path: Some(path),
            state: Mutex::new(AppendState {
                file: Some(file),
                end,
            }),
        })
    }

    /// A transcript that records nothing and replays nothing.
    pub fn disabled() -> Self {
        Self {
            path: None,
            state: Mutex::new(AppendState { file: None, end: 0 }),
        }
    }

    /// Returns the backing path, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Takes exclusive access to the append side. Nothing can be appended
    /// until the guard is dropped.
    pub async fn lock(&self) -> TranscriptGuard<'_> {
        TranscriptGuard {
            state: self.state.lock().await,
        }
    }

    /// Appends one record. See [`TranscriptGuard::append`].
    pub async fn append(&self, line: &str) -> Option<u64> {
        self.lock().await.append(line).await
    }

    /// Reads the records stored before byte offset `end`.
    ///
    /// Uses a separate read handle, so it never blocks appends.
    pub async fn history(&self, end: u64) -> Vec<String> {
        let Some(path) = &self.path else {
            return Vec::new();
        };

        let file = match File::open(path).await {
            Ok(file) => file,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to open transcript for replay");
                return Vec::new();
            }
        };

        let mut lines = BufReader::new(file.take(end)).lines();
        let mut history = Vec::new();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => history.push(line),
                Ok(None) => break,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Transcript replay stopped early");
                    break;
                }
            }
        }
        history
    }
}

/// Exclusive append access, from [`Transcript::lock`].
pub struct TranscriptGuard<'a> {
    state: MutexGuard<'a, AppendState>,
}

impl TranscriptGuard<'_> {
    /// Byte offset just past the last stored record.
    pub fn end(&self) -> u64 {
        self.state.end
    }

    /// Appends one record and returns the offset it starts at.
    ///
    /// Returns `None` when the transcript is disabled or the write failed.
    /// Write failures are logged; the record is lost.
    pub async fn append(&mut self, line: &str) -> Option<u64> {
        let AppendState { file, end } = &mut *self.state;
        let file = file.as_mut()?;

        let result = async {
            file.write_all(line.as_bytes()).await?;
            file.write_all(b"\n").await?;
            file.flush().await
        }
        .await;

        match result {
            Ok(()) => {
                let start = *end;
                *end += line.len() as u64 + 1;
                Some(start)
            }
            Err(e) => {
                warn!(error = %e, "Failed to append to transcript");
                // A partial write may have landed; resync so later offsets stay exact
                if let Ok(metadata) = file.metadata().await {
                    *end = metadata.len();
                }
                None
            }
        }
    }
}

/// Errors that can occur opening the transcript.
#[derive(Debug, thiserror::Error)]
pub enum TranscriptError {
    #[error("Failed to open transcript at {}: {error}", .path.display())]
    Open { path: PathBuf, error: String },
}
