//! Query and embedding caches for the retrieval path.
//!
//! [`QueryCache`] pairs two [`BoundedCache`] instances: one for search
//! results keyed by the full query shape, one for embedding vectors keyed by
//! model and input text. Keys are blake3 digests of a canonical rendering of
//! the inputs, so logically-identical lookups share entries regardless of
//! tag order, casing, or surrounding whitespace.

use std::borrow::Cow;
use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use crate::bounded::{BoundedCache, CacheStats};
use crate::error::Result;

/// Capacity and TTL settings for the two caches.
#[derive(Debug, Clone)]
pub struct QueryCacheConfig {
    pub result_capacity: usize,
    pub result_ttl: Duration,
    pub embedding_capacity: usize,
    pub embedding_ttl: Duration,
}

impl Default for QueryCacheConfig {
    fn default() -> Self {
        Self {
            result_capacity: 500,
            result_ttl: Duration::from_secs(3600),
            embedding_capacity: 1000,
            embedding_ttl: Duration::from_secs(7200),
        }
    }
}

impl QueryCacheConfig {
    pub fn with_result_capacity(mut self, capacity: usize) -> Self {
        self.result_capacity = capacity;
        self
    }

    pub fn with_result_ttl(mut self, ttl: Duration) -> Self {
        self.result_ttl = ttl;
        self
    }

    pub fn with_embedding_capacity(mut self, capacity: usize) -> Self {
        self.embedding_capacity = capacity;
        self
    }

    pub fn with_embedding_ttl(mut self, ttl: Duration) -> Self {
        self.embedding_ttl = ttl;
        self
    }
}

/// Entry counts removed by a single expiry sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepStats {
    pub results_removed: usize,
    pub embeddings_removed: usize,
}

impl SweepStats {
    pub fn total(&self) -> usize {
        self.results_removed + self.embeddings_removed
    }
}

/// Combined statistics for both underlying caches.
#[derive(Debug, Clone, Serialize)]
pub struct QueryCacheStats {
    pub results: CacheStats,
    pub embeddings: CacheStats,
}

#[derive(Serialize)]
struct ResultKey<'a> {
    query: &'a str,
    top_k: usize,
    category_filter: Option<&'a str>,
    tags: Vec<&'a str>,
}

/// Two-tier cache for search results and embedding vectors.
#[derive(Debug)]
pub struct QueryCache<R> {
    results: BoundedCache<String, R>,
    embeddings: BoundedCache<String, Vec<f32>>,
}

impl<R> QueryCache<R>
where
    R: Clone + Serialize,
{
    pub fn new(config: QueryCacheConfig) -> Result<Self> {
        Ok(Self {
            results: BoundedCache::new(config.result_capacity, Some(config.result_ttl))?,
            embeddings: BoundedCache::new(config.embedding_capacity, Some(config.embedding_ttl))?,
        })
    }

    /// Fetch a cached search result for this query shape, if present.
    pub fn get_query_result(
        &self,
        query: &str,
        top_k: usize,
        category_filter: Option<&str>,
        tags: &[String],
    ) -> Option<R> {
        let key = result_key(query, top_k, category_filter, tags);
        self.results.get(&key)
    }

    /// Store a search result under this query shape. `ttl` overrides the
    /// configured result TTL for this entry only.
    pub fn cache_query_result(
        &self,
        query: &str,
        top_k: usize,
        category_filter: Option<&str>,
        tags: &[String],
        result: R,
        ttl: Option<Duration>,
    ) {
        let key = result_key(query, top_k, category_filter, tags);
        debug!(%key, "caching query result");
        self.results.put(key, result, ttl);
    }

    /// Fetch a cached embedding for `text` under `model`, if present.
    pub fn get_embedding(&self, model: &str, text: &str) -> Option<Vec<f32>> {
        self.embeddings.get(&embedding_key(model, text))
    }

    /// Store an embedding vector for `text` under `model`. `ttl` overrides
    /// the configured embedding TTL for this entry only.
    pub fn cache_embedding(&self, model: &str, text: &str, embedding: Vec<f32>, ttl: Option<Duration>) {
        self.embeddings.put(embedding_key(model, text), embedding, ttl);
    }

    /// Sweep expired entries from both caches.
    pub fn cleanup_expired(&self) -> SweepStats {
        let stats = SweepStats {
            results_removed: self.results.cleanup_expired(),
            embeddings_removed: self.embeddings.cleanup_expired(),
        };
        if stats.total() > 0 {
            debug!(
                results = stats.results_removed,
                embeddings = stats.embeddings_removed,
                "removed expired cache entries"
            );
        }
        stats
    }

    /// Drop everything from both caches and reset their statistics.
    pub fn clear_all(&self) {
        self.results.clear();
        self.embeddings.clear();
    }

    pub fn stats(&self) -> QueryCacheStats {
        QueryCacheStats {
            results: self.results.stats(),
            embeddings: self.embeddings.stats(),
        }
    }
}

/// Canonical key for a search query: normalized text plus sorted parameters,
/// hashed so keys stay fixed-width regardless of query length.
fn result_key(query: &str, top_k: usize, category_filter: Option<&str>, tags: &[String]) -> String {
    let normalized = normalize_query(query);
    let mut sorted_tags: Vec<&str> = tags.iter().map(String::as_str).collect();
    sorted_tags.sort_unstable();

    let key = ResultKey {
        query: &normalized,
        top_k,
        category_filter,
        tags: sorted_tags,
    };
    let canonical = match serde_json::to_string(&key) {
        Ok(json) => json,
        // Serialization of plain strings cannot realistically fail, but a
        // hashable fallback beats a panic on the query path.
        Err(_) => format!(
            "{normalized}|{top_k}|{}|{}",
            category_filter.unwrap_or(""),
            key.tags.join(",")
        ),
    };
    blake3::hash(canonical.as_bytes()).to_hex().to_string()
}

fn embedding_key(model: &str, text: &str) -> String {
    let sanitized = sanitize(text);
    blake3::hash(format!("{model}:{sanitized}").as_bytes())
        .to_hex()
        .to_string()
}

fn normalize_query(query: &str) -> String {
    sanitize(query).trim().to_lowercase()
}

/// Strip replacement characters left behind by lossy decoding of malformed
/// input, so byte-level noise does not fragment the key space.
fn sanitize(text: &str) -> Cow<'_, str> {
    if text.contains(char::REPLACEMENT_CHARACTER) {
        Cow::Owned(text.replace(char::REPLACEMENT_CHARACTER, ""))
    } else {
        Cow::Borrowed(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> QueryCache<Vec<String>> {
        QueryCache::new(QueryCacheConfig::default()).unwrap()
    }

    #[test]
    fn test_result_roundtrip() {
        let cache = cache();
        let tags = vec!["alpha".to_string()];
        cache.cache_query_result("what is rust", 5, None, &tags, vec!["hit".into()], None);
        assert_eq!(
            cache.get_query_result("what is rust", 5, None, &tags),
            Some(vec!["hit".to_string()])
        );
    }

    #[test]
    fn test_key_is_insensitive_to_tag_order_case_and_whitespace() {
        let cache = cache();
        let tags_a = vec!["b".to_string(), "a".to_string()];
        let tags_b = vec!["a".to_string(), "b".to_string()];
        cache.cache_query_result("  What Is RUST  ", 5, Some("docs"), &tags_a, vec!["hit".into()], None);

        assert_eq!(
            cache.get_query_result("what is rust", 5, Some("docs"), &tags_b),
            Some(vec!["hit".to_string()])
        );
    }

    #[test]
    fn test_distinct_parameters_do_not_collide() {
        let cache = cache();
        cache.cache_query_result("q", 5, None, &[], vec!["five".into()], None);
        cache.cache_query_result("q", 10, None, &[], vec!["ten".into()], None);

        assert_eq!(
            cache.get_query_result("q", 5, None, &[]),
            Some(vec!["five".to_string()])
        );
        assert_eq!(
            cache.get_query_result("q", 10, None, &[]),
            Some(vec!["ten".to_string()])
        );
        assert_eq!(cache.get_query_result("q", 7, None, &[]), None);
    }

    #[test]
    fn test_embedding_roundtrip_is_model_scoped() {
        let cache = cache();
        cache.cache_embedding("model-a", "hello", vec![0.1, 0.2], None);

        assert_eq!(cache.get_embedding("model-a", "hello"), Some(vec![0.1, 0.2]));
        assert_eq!(cache.get_embedding("model-b", "hello"), None);
    }

    #[test]
    fn test_cleanup_sweeps_both_caches() {
        let config = QueryCacheConfig::default()
            .with_result_ttl(Duration::from_millis(10))
            .with_embedding_ttl(Duration::from_millis(10));
        let cache: QueryCache<Vec<String>> = QueryCache::new(config).unwrap();
        cache.cache_query_result("q", 5, None, &[], vec!["r".into()], None);
        cache.cache_embedding("m", "t", vec![1.0], None);

        std::thread::sleep(Duration::from_millis(40));
        let swept = cache.cleanup_expired();
        assert_eq!(swept.results_removed, 1);
        assert_eq!(swept.embeddings_removed, 1);
        assert_eq!(swept.total(), 2);
    }

    #[test]
    fn test_per_call_ttl_overrides_the_configured_default() {
        // Default TTLs are an hour or more; the per-call override expires
        // almost immediately.
        let cache = cache();
        let short = Some(Duration::from_millis(10));
        cache.cache_query_result("q", 5, None, &[], vec!["r".into()], short);
        cache.cache_embedding("m", "t", vec![1.0], short);

        assert!(cache.get_query_result("q", 5, None, &[]).is_some());
        std::thread::sleep(Duration::from_millis(40));
        assert!(cache.get_query_result("q", 5, None, &[]).is_none());
        assert!(cache.get_embedding("m", "t").is_none());
    }

    #[test]
    fn test_clear_all() {
        let cache = cache();
        cache.cache_query_result("q", 5, None, &[], vec!["r".into()], None);
        cache.cache_embedding("m", "t", vec![1.0], None);
        cache.clear_all();

        let stats = cache.stats();
        assert_eq!(stats.results.size, 0);
        assert_eq!(stats.embeddings.size, 0);
    }

    #[test]
    fn test_malformed_input_noise_does_not_fragment_keys() {
        let cache = cache();
        let noisy = format!("what is{} rust", char::REPLACEMENT_CHARACTER);
        cache.cache_query_result(&noisy, 5, None, &[], vec!["hit".into()], None);
        assert_eq!(
            cache.get_query_result("what is rust", 5, None, &[]),
            Some(vec!["hit".to_string()])
        );
    }
}
