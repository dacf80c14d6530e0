//! Lazy, single-pass progress sequence for long-running jobs (copy, and the
//! cross-backend phase of move), replacing the desktop crate's
//! `tauri::Emitter::emit` calls with a channel the host can await (§9
//! REDESIGN FLAGS: "Callback-style progress ... modeled as a lazy sequence").
//!
//! Rust's async model has no cooperative generator primitive on stable
//! without extra machinery, so the "lazy" property here is approximated:
//! `ProgressStream::spawn` starts the job on a background task immediately,
//! but the consumer still drives it to completion in the sense that matters
//! operationally — dropping the stream before it is drained cancels the job
//! (see `engines::copy`), and the job's outcome is only observable by polling
//! the stream through to its end.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::StoraxError;

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    pub job_id: String,
    pub source: String,
    pub target: String,
    pub copied: u64,
    pub total: u64,
}

impl ProgressEvent {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            (self.copied as f64 / self.total as f64) * 100.0
        }
    }
}

pub struct ProgressStream {
    rx: mpsc::UnboundedReceiver<ProgressEvent>,
    handle: JoinHandle<Result<(), StoraxError>>,
}

impl ProgressStream {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<ProgressEvent>, handle: JoinHandle<Result<(), StoraxError>>) -> Self {
        Self { rx, handle }
    }

    /// Advances the sequence by one step. `None` once the job has finished
    /// emitting events (its outcome may still be pending — call `join` to
    /// observe it).
    pub async fn next(&mut self) -> Option<ProgressEvent> {
        self.rx.recv().await
    }

    /// Drains any remaining events and returns the job's terminal result.
    pub async fn join(mut self) -> Result<(), StoraxError> {
        while self.rx.recv().await.is_some() {}
        match self.handle.await {
            Ok(result) => result,
            Err(join_err) => Err(StoraxError::IoError {
                location: String::new(),
                message: join_err.to_string(),
            }),
        }
    }
}
