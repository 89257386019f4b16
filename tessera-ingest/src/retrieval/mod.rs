//! Cached retrieval: provider traits, query pipeline, cache sweeping.

pub mod pipeline;
pub mod provider;
pub mod sweeper;

pub use pipeline::RetrievalPipeline;
pub use provider::{EmbeddingProvider, SearchFilters, SearchHit, VectorSearchProvider};
pub use sweeper::CacheSweeper;
