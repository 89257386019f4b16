//! Pluggable per-chunk processing.

use std::time::Instant;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use super::task::ChunkOutcome;

/// Work applied to each chunk of a document.
///
/// Implementations run concurrently across the chunks of one document, so
/// they must be `Send + Sync`. A failure affects only its own chunk; the
/// surrounding document still completes with the failure counted.
#[async_trait]
pub trait ChunkProcessor: Send + Sync {
    /// Process one chunk. `metadata` is the document-level metadata supplied
    /// at submission.
    async fn process_chunk(
        &self,
        chunk_index: usize,
        content: &str,
        metadata: &Value,
    ) -> Result<ChunkOutcome>;

    /// Short name used in logs.
    fn processor_name(&self) -> &str;
}

/// Default processor: computes basic text statistics for each chunk.
#[derive(Debug, Default)]
pub struct TextStatsProcessor;

#[async_trait]
impl ChunkProcessor for TextStatsProcessor {
    async fn process_chunk(
        &self,
        chunk_index: usize,
        content: &str,
        _metadata: &Value,
    ) -> Result<ChunkOutcome> {
        let start = Instant::now();
        let word_count = content.split_whitespace().count();
        let char_count = content.chars().count();
        Ok(ChunkOutcome {
            chunk_index,
            content: content.to_string(),
            word_count,
            char_count,
            elapsed_ms: start.elapsed().as_millis() as u64,
        })
    }

    fn processor_name(&self) -> &str {
        "text-stats"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_text_stats_processor() {
        let processor = TextStatsProcessor;
        let outcome = processor
            .process_chunk(3, "one two three", &Value::Null)
            .await
            .unwrap();
        assert_eq!(outcome.chunk_index, 3);
        assert_eq!(outcome.word_count, 3);
        assert_eq!(outcome.char_count, 13);
    }
}
