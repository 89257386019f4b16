//! Tests for the cached retrieval pipeline and the background sweeper.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;

use tessera_cache::{QueryCache, QueryCacheConfig};
use tessera_ingest::retrieval::{
    CacheSweeper, EmbeddingProvider, RetrievalPipeline, SearchFilters, SearchHit,
    VectorSearchProvider,
};

#[derive(Default)]
struct CountingEmbedder {
    calls: AtomicUsize,
}

#[async_trait]
impl EmbeddingProvider for CountingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![text.len() as f32, 1.0, 2.0])
    }

    fn model_name(&self) -> &str {
        "counting-embedder"
    }
}

#[derive(Default)]
struct CountingSearcher {
    calls: AtomicUsize,
}

#[async_trait]
impl VectorSearchProvider for CountingSearcher {
    async fn search(
        &self,
        _embedding: &[f32],
        top_k: usize,
        _filters: &SearchFilters,
    ) -> Result<Vec<SearchHit>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![SearchHit {
            id: format!("hit-{call}"),
            content: "matched passage".into(),
            score: 0.9,
            metadata: json!({ "top_k": top_k }),
        }])
    }
}

fn pipeline(
    embedder: Arc<CountingEmbedder>,
    searcher: Arc<CountingSearcher>,
) -> RetrievalPipeline {
    RetrievalPipeline::new(embedder, searcher, QueryCacheConfig::default()).unwrap()
}

#[tokio::test]
async fn repeated_query_hits_the_result_cache() {
    let embedder = Arc::new(CountingEmbedder::default());
    let searcher = Arc::new(CountingSearcher::default());
    let pipeline = pipeline(Arc::clone(&embedder), Arc::clone(&searcher));
    let filters = SearchFilters::default();

    let first = pipeline.query("what is rust", 5, &filters).await.unwrap();
    let second = pipeline.query("What Is Rust  ", 5, &filters).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
    assert_eq!(searcher.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn changed_top_k_reuses_the_embedding_but_searches_again() {
    let embedder = Arc::new(CountingEmbedder::default());
    let searcher = Arc::new(CountingSearcher::default());
    let pipeline = pipeline(Arc::clone(&embedder), Arc::clone(&searcher));
    let filters = SearchFilters::default();

    pipeline.query("what is rust", 5, &filters).await.unwrap();
    pipeline.query("what is rust", 10, &filters).await.unwrap();

    assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
    assert_eq!(searcher.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn filters_are_part_of_the_result_key() {
    let embedder = Arc::new(CountingEmbedder::default());
    let searcher = Arc::new(CountingSearcher::default());
    let pipeline = pipeline(Arc::clone(&embedder), Arc::clone(&searcher));

    let unfiltered = SearchFilters::default();
    let filtered = SearchFilters {
        category: Some("docs".into()),
        tags: vec!["rust".into()],
    };

    pipeline.query("query", 5, &unfiltered).await.unwrap();
    pipeline.query("query", 5, &filtered).await.unwrap();
    pipeline.query("query", 5, &filtered).await.unwrap();

    assert_eq!(searcher.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn sweeper_reclaims_expired_entries_and_stops_cleanly() {
    let config = QueryCacheConfig::default()
        .with_result_ttl(Duration::from_millis(10))
        .with_embedding_ttl(Duration::from_millis(10));
    let cache: Arc<QueryCache<Vec<SearchHit>>> = Arc::new(QueryCache::new(config).unwrap());
    cache.cache_embedding("model", "text", vec![1.0, 2.0], None);

    let sweeper = CacheSweeper::start(Arc::clone(&cache), Duration::from_millis(20));
    tokio::time::sleep(Duration::from_millis(120)).await;

    let stats = cache.stats();
    assert_eq!(stats.embeddings.size, 0);

    sweeper.stop().await;
}
