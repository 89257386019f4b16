//! Cached query pipeline: embed, search, remember.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use tessera_cache::{QueryCache, QueryCacheConfig};

use super::provider::{EmbeddingProvider, SearchFilters, SearchHit, VectorSearchProvider};

/// Runs queries through the embedding and search providers, consulting the
/// cache at both tiers. A cached result skips both the embedding and the
/// search; a cached embedding still runs the search but skips the model.
pub struct RetrievalPipeline {
    embedder: Arc<dyn EmbeddingProvider>,
    searcher: Arc<dyn VectorSearchProvider>,
    cache: Arc<QueryCache<Vec<SearchHit>>>,
}

impl RetrievalPipeline {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        searcher: Arc<dyn VectorSearchProvider>,
        cache_config: QueryCacheConfig,
    ) -> Result<Self> {
        Ok(Self {
            embedder,
            searcher,
            cache: Arc::new(QueryCache::new(cache_config)?),
        })
    }

    /// Answer a query, populating both cache tiers on the way out.
    ///
    /// Provider errors propagate to the caller; there are no retries here.
    pub async fn query(
        &self,
        text: &str,
        top_k: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<SearchHit>> {
        let category = filters.category.as_deref();
        if let Some(hits) = self
            .cache
            .get_query_result(text, top_k, category, &filters.tags)
        {
            debug!(top_k, "query answered from result cache");
            return Ok(hits);
        }

        let model = self.embedder.model_name();
        let embedding = match self.cache.get_embedding(model, text) {
            Some(embedding) => embedding,
            None => {
                let embedding = self
                    .embedder
                    .embed(text)
                    .await
                    .context("embedding the query failed")?;
                self.cache.cache_embedding(model, text, embedding.clone(), None);
                embedding
            }
        };

        let hits = self
            .searcher
            .search(&embedding, top_k, filters)
            .await
            .context("vector search failed")?;
        self.cache
            .cache_query_result(text, top_k, category, &filters.tags, hits.clone(), None);
        Ok(hits)
    }

    /// Shared handle to the pipeline's cache, for sweeping or inspection.
    pub fn cache(&self) -> Arc<QueryCache<Vec<SearchHit>>> {
        Arc::clone(&self.cache)
    }
}
