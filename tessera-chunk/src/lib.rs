//! Document classification and boundary-aware chunking for retrieval
//! pipelines.
//!
//! This crate turns raw prose into retrieval-sized segments. Documents are
//! first classified into a style ([`DocumentType`]) by scoring regex pattern
//! families, then split with a strategy and [`ChunkConfig`] tuned to that
//! style: legal text breaks at article/section markers, structured text
//! follows list and heading markers, and everything else goes through a
//! sliding window that prefers paragraph, sentence, and word boundaries over
//! mid-token cuts.
//!
//! ```
//! use tessera_chunk::OptimizedChunker;
//!
//! let chunker = OptimizedChunker::new();
//! let (chunks, metadata) = chunker.chunk("A short note.", Some("note.txt"), None);
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(metadata.chunk_count, 1);
//! ```

pub mod chunker;
pub mod classifier;
pub mod config;

// Re-export the main chunking types for external use
pub use chunker::{ChunkMetadata, OptimizedChunker};
pub use classifier::{DocumentClassifier, DocumentType};
pub use config::{ChunkConfig, ChunkConfigError};
