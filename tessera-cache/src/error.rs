//! Error types for the caching system

/// Result type for cache operations.
///
/// Only construction can fail; all runtime cache operations are total
/// functions over their inputs.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Errors raised when constructing a cache with invalid parameters.
///
/// These fail fast at configuration time. Runtime operations never raise:
/// an entry whose size cannot be computed is stored with size zero, and
/// lookups on malformed keys simply miss.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// A cache must be able to hold at least one entry.
    #[error("cache capacity must be greater than zero")]
    InvalidCapacity,
}
