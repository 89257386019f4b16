//! Chunking configuration types.

use serde::{Deserialize, Serialize};

use crate::classifier::DocumentType;

/// Result type for chunk configuration operations.
pub type Result<T> = std::result::Result<T, ChunkConfigError>;

/// Errors raised when constructing an invalid [`ChunkConfig`].
///
/// These are programmer errors that fail fast at configuration time; the
/// chunker itself never raises once it holds a valid config.
#[derive(Debug, thiserror::Error)]
pub enum ChunkConfigError {
    /// The chunk size must be non-zero.
    #[error("chunk_size must be greater than zero")]
    ZeroChunkSize,

    /// Overlap must be strictly smaller than the chunk size, otherwise the
    /// window could never advance.
    #[error("chunk_overlap ({overlap}) must be smaller than chunk_size ({size})")]
    OverlapTooLarge { overlap: usize, size: usize },
}

/// Configuration for splitting a document into retrieval-sized chunks.
///
/// One default instance exists per [`DocumentType`]; callers may also build a
/// custom config and pass it to
/// [`OptimizedChunker::chunk`](crate::chunker::OptimizedChunker::chunk).
/// Only the `chunk_overlap < chunk_size` invariant is validated — otherwise
/// questionable values get best-effort degraded behavior rather than an error.
///
/// # Example
///
/// ```
/// use tessera_chunk::ChunkConfig;
///
/// let config = ChunkConfig::new(800, 150)
///     .unwrap()
///     .with_min_chunk_size(50);
/// assert_eq!(config.chunk_size, 800);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkConfig {
    /// Target chunk size in characters.
    pub chunk_size: usize,
    /// Number of trailing characters carried over from the previous chunk.
    pub chunk_overlap: usize,
    /// Prefer breaking at sentence terminators.
    pub sentence_boundary: bool,
    /// Prefer breaking at paragraph breaks (`\n\n`).
    pub paragraph_boundary: bool,
    /// Keep list items and section headers at chunk starts where possible.
    pub preserve_structure: bool,
    /// Chunks shorter than this are filtered out (unless the whole input is
    /// shorter, in which case it survives as a single undersized chunk).
    pub min_chunk_size: usize,
    /// Optional hard cap; longer chunks are truncated before overlap is applied.
    pub max_chunk_size: Option<usize>,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            sentence_boundary: true,
            paragraph_boundary: true,
            preserve_structure: false,
            min_chunk_size: 100,
            max_chunk_size: None,
        }
    }
}

impl ChunkConfig {
    /// Create a config with the given size and overlap, validating the
    /// `chunk_overlap < chunk_size` invariant.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(ChunkConfigError::ZeroChunkSize);
        }
        if chunk_overlap >= chunk_size {
            return Err(ChunkConfigError::OverlapTooLarge {
                overlap: chunk_overlap,
                size: chunk_size,
            });
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
            ..Self::default()
        })
    }

    pub fn with_sentence_boundary(mut self, enabled: bool) -> Self {
        self.sentence_boundary = enabled;
        self
    }

    pub fn with_paragraph_boundary(mut self, enabled: bool) -> Self {
        self.paragraph_boundary = enabled;
        self
    }

    pub fn with_preserve_structure(mut self, enabled: bool) -> Self {
        self.preserve_structure = enabled;
        self
    }

    pub fn with_min_chunk_size(mut self, min: usize) -> Self {
        self.min_chunk_size = min;
        self
    }

    pub fn with_max_chunk_size(mut self, max: usize) -> Self {
        self.max_chunk_size = Some(max);
        self
    }

    /// The default chunking configuration for a classified document type.
    ///
    /// Legal documents get small chunks so references stay precise; technical
    /// documents get larger chunks to keep context together; structured
    /// documents get small chunks that follow list items.
    pub fn for_document_type(doc_type: DocumentType) -> Self {
        match doc_type {
            DocumentType::Legal => Self {
                chunk_size: 800,
                chunk_overlap: 150,
                preserve_structure: true,
                ..Self::default()
            },
            DocumentType::Technical => Self {
                chunk_size: 1200,
                chunk_overlap: 200,
                preserve_structure: true,
                ..Self::default()
            },
            DocumentType::Narrative => Self {
                chunk_size: 1000,
                chunk_overlap: 200,
                paragraph_boundary: false,
                ..Self::default()
            },
            DocumentType::Structured => Self {
                chunk_size: 600,
                chunk_overlap: 100,
                sentence_boundary: false,
                preserve_structure: true,
                ..Self::default()
            },
            DocumentType::Mixed => Self {
                chunk_size: 900,
                chunk_overlap: 180,
                preserve_structure: true,
                ..Self::default()
            },
            DocumentType::Unknown => Self::default(),
        }
    }
}
