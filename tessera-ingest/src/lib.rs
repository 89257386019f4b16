//! Document ingestion and cached retrieval for RAG pipelines.
//!
//! This crate ties the chunking ([`tessera_chunk`]) and caching
//! ([`tessera_cache`]) layers together into two services:
//!
//! - [`processing::AsyncDocumentProcessor`] — a worker pool that chunks
//!   documents and processes their chunks concurrently, with task tracking,
//!   progress reporting, and cancellation
//! - [`retrieval::RetrievalPipeline`] — a query path that consults the
//!   embedding and result caches before touching its providers, with a
//!   [`retrieval::CacheSweeper`] reclaiming expired entries in the background
//!
//! Documents below a size threshold are chunked inline; larger ones go
//! through the queue (see [`processing::AsyncDocumentProcessor::ingest`]).

pub mod processing;
pub mod retrieval;

pub use processing::{
    AsyncDocumentProcessor, ChunkProcessor, DocumentResult, IngestOutcome, ProcessingStats,
    ProcessorConfig, TaskStatus, TextStatsProcessor,
};
pub use retrieval::{
    CacheSweeper, EmbeddingProvider, RetrievalPipeline, SearchFilters, SearchHit,
    VectorSearchProvider,
};
