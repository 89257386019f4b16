//! Bounded caching for retrieval pipelines.
//!
//! This crate provides the caching layer used between query handling and the
//! expensive parts of retrieval (embedding generation and vector search):
//!
//! - [`BoundedCache`] — a generic thread-safe LRU cache with per-entry TTL
//!   and hit/miss/eviction accounting
//! - [`QueryCache`] — a two-tier wrapper holding search results and embedding
//!   vectors under canonical blake3-hashed keys
//!
//! Caches here are advisory: every operation is infallible once a cache is
//! constructed, and a lost entry only costs a recomputation.
//!
//! # Example
//!
//! ```
//! use tessera_cache::{QueryCache, QueryCacheConfig};
//!
//! let cache: QueryCache<Vec<String>> = QueryCache::new(QueryCacheConfig::default()).unwrap();
//! cache.cache_embedding("minilm", "hello world", vec![0.1, 0.2, 0.3], None);
//! assert!(cache.get_embedding("minilm", "hello world").is_some());
//! ```

pub mod bounded;
pub mod error;
pub mod query;

pub use bounded::{BoundedCache, CacheStats};
pub use error::{CacheError, Result};
pub use query::{QueryCache, QueryCacheConfig, QueryCacheStats, SweepStats};
