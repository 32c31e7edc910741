//! Progress events emitted while a batch runs.

use std::time::Duration;

use tokio::sync::mpsc;

use crate::services::toolchain::ToolStep;

/// Events emitted during a batch run.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// A region is about to be checked.
    ItemStarted {
        index: usize,
        total: usize,
        name: String,
    },
    /// Region output already present.
    ItemSkipped { name: String },
    /// A download attempt is starting.
    AttemptStarted {
        url: String,
        attempt: u32,
        attempts: u32,
    },
    /// Bytes received so far in the current attempt.
    Progress { bytes: u64, total: Option<u64> },
    /// A download attempt failed; `retry_in` is set when another attempt follows.
    AttemptFailed {
        attempt: u32,
        error: String,
        retry_in: Option<Duration>,
    },
    /// Download finished successfully.
    Downloaded { bytes: u64 },
    /// An external toolchain step is starting.
    StepStarted { name: String, step: ToolStep },
    /// Region output moved to the data directory.
    ItemProcessed { name: String, files_moved: usize },
    /// Region failed.
    ItemFailed { name: String, error: String },
}

/// Optional sender shared by the services of one run.
#[derive(Debug, Clone, Default)]
pub struct EventSender {
    tx: Option<mpsc::Sender<PipelineEvent>>,
}

impl EventSender {
    pub fn new(tx: mpsc::Sender<PipelineEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Sender that drops every event.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub async fn send(&self, event: PipelineEvent) {
        if let Some(ref tx) = self.tx {
            let _ = tx.send(event).await;
        }
    }

    /// Send without waiting; the event is dropped when the channel is full.
    pub fn try_send(&self, event: PipelineEvent) {
        if let Some(ref tx) = self.tx {
            let _ = tx.try_send(event);
        }
    }
}
