//! Task records for asynchronous document processing.

use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;
use tessera_chunk::ChunkMetadata;

/// Lifecycle states for a processing task.
///
/// Tasks move `Pending -> Processing -> Completed | Failed`. Cancellation is
/// only possible from `Pending`; once a worker has picked a task up it runs
/// to completion or failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    /// Terminal states never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

/// Output of processing one chunk.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkOutcome {
    /// Position of the chunk within its document, used to restore document
    /// order after parallel processing.
    pub chunk_index: usize,
    pub content: String,
    pub word_count: usize,
    pub char_count: usize,
    pub elapsed_ms: u64,
}

/// Aggregated result of processing one document.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentResult {
    /// Per-chunk outcomes, sorted by `chunk_index`.
    pub chunks: Vec<ChunkOutcome>,
    pub chunk_metadata: ChunkMetadata,
    pub total_chunks: usize,
    pub successful_chunks: usize,
    pub failed_chunks: usize,
    pub processing_time: Duration,
}

/// A document queued for processing, with its live status and progress.
#[derive(Debug, Clone)]
pub struct ProcessingTask {
    pub task_id: String,
    pub content: String,
    pub filename: Option<String>,
    pub metadata: Value,
    pub status: TaskStatus,
    /// Completion percentage in `0.0..=100.0`.
    pub progress: f64,
    pub created_at: Instant,
    pub started_at: Option<Instant>,
    pub completed_at: Option<Instant>,
    pub result: Option<DocumentResult>,
    pub error: Option<String>,
}

impl ProcessingTask {
    pub fn new(task_id: String, content: String, filename: Option<String>, metadata: Value) -> Self {
        Self {
            task_id,
            content,
            filename,
            metadata,
            status: TaskStatus::Pending,
            progress: 0.0,
            created_at: Instant::now(),
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
        }
    }

    /// Age since the task reached a terminal state, if it has.
    pub fn terminal_age(&self, now: Instant) -> Option<Duration> {
        if self.status.is_terminal() {
            self.completed_at.map(|at| now.duration_since(at))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Processing.is_terminal());
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_terminal_age_requires_terminal_state() {
        let mut task = ProcessingTask::new(
            "t".into(),
            "content".into(),
            None,
            Value::Null,
        );
        assert_eq!(task.terminal_age(Instant::now()), None);

        task.status = TaskStatus::Completed;
        task.completed_at = Some(Instant::now());
        assert!(task.terminal_age(Instant::now()).is_some());
    }
}
