//! Queue-backed document processing.

pub mod chunk_processor;
pub mod processor;
pub mod task;

pub use chunk_processor::{ChunkProcessor, TextStatsProcessor};
pub use processor::{
    AsyncDocumentProcessor, IngestOutcome, ProcessingStats, ProcessorConfig, TaskCallback,
};
pub use task::{ChunkOutcome, DocumentResult, ProcessingTask, TaskStatus};
