//! Provider traits for the retrieval pipeline.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Optional constraints applied to a search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilters {
    pub category: Option<String>,
    pub tags: Vec<String>,
}

/// One search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub content: String,
    pub score: f32,
    pub metadata: Value,
}

/// Turns text into embedding vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Model identifier, used to scope embedding cache keys.
    fn model_name(&self) -> &str;
}

/// Searches a vector index with a query embedding.
#[async_trait]
pub trait VectorSearchProvider: Send + Sync {
    async fn search(
        &self,
        embedding: &[f32],
        top_k: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<SearchHit>>;
}
