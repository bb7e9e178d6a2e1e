//! High-level semantic cache service
//!
//! [`SemanticCache`] wraps a shared [`CacheEngine`] with JSON payloads,
//! config-driven defaults and the background reaper. Text can be cached and
//! looked up directly through an [`EmbeddingProvider`]; embedding happens
//! before any engine lock is taken.

use crate::cache::config::CacheConfig;
use crate::cache::engine::{CacheEngine, RebuildToken};
use crate::cache::entry::age_of;
use crate::cache::reaper::{ReaperHandle, TtlReaper};
use crate::cache::types::{EmbeddingVector, EntryId, LookupResult, Payload};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;
use tracing::{debug, info};

/// Source of query embeddings (Ollama, OpenAI, ...)
#[async_trait]
pub trait EmbeddingProvider: Send + Sync + Debug {
    /// Embed a single query text
    async fn embed(&self, text: &str) -> Result<EmbeddingVector>;

    /// Dimension of the vectors this provider produces
    fn dimension(&self) -> usize;

    fn provider_name(&self) -> &'static str;
}

/// Outcome of [`SemanticCache::get_cached_result`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedResult {
    pub found: bool,

    /// Similarity of the hit, or the best similarity seen on a miss
    /// (0.0 when nothing eligible was cached)
    pub similarity_score: f32,

    pub entry_id: Option<EntryId>,
    pub payload: Option<serde_json::Value>,

    /// Seconds since the hit entry was cached
    pub age_seconds: Option<i64>,
}

impl CachedResult {
    fn from_lookup(result: LookupResult) -> Result<Self> {
        match result {
            LookupResult::Hit {
                entry_id,
                similarity,
                payload,
                created_at,
            } => Ok(Self {
                found: true,
                similarity_score: similarity,
                entry_id: Some(entry_id),
                payload: Some(payload.to_json()?),
                age_seconds: Some(age_of(created_at).as_secs() as i64),
            }),
            LookupResult::Miss { best_similarity } => Ok(Self {
                found: false,
                similarity_score: best_similarity.unwrap_or(0.0),
                entry_id: None,
                payload: None,
                age_seconds: None,
            }),
        }
    }
}

/// Statistics report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStatsReport {
    pub total_entries: u64,
    pub total_hits: u64,
    pub total_misses: u64,
    pub total_lookups: u64,
    pub hit_rate_percent: f64,
    pub evictions: u64,
    pub expirations: u64,
    pub dimension: usize,
}

impl std::fmt::Display for CacheStatsReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "entries={} hits={} misses={} hit_rate={:.1}% evictions={} expirations={} dimension={}",
            self.total_entries,
            self.total_hits,
            self.total_misses,
            self.hit_rate_percent,
            self.evictions,
            self.expirations,
            self.dimension
        )
    }
}

/// Semantic cache service
pub struct SemanticCache {
    engine: Arc<CacheEngine>,
    reaper: Option<ReaperHandle>,
}

impl SemanticCache {
    /// Create a cache; the reaper is started when auto cleanup is enabled
    /// and a tokio runtime is available
    pub fn new(config: CacheConfig) -> Result<Self> {
        let engine = Arc::new(CacheEngine::new(config)?);
        Ok(Self::from_engine(engine))
    }

    /// Wrap an existing engine, e.g. one loaded from a snapshot
    pub fn from_engine(engine: Arc<CacheEngine>) -> Self {
        let reaper = if engine.config().enable_auto_cleanup
            && tokio::runtime::Handle::try_current().is_ok()
        {
            Some(TtlReaper::for_engine(&engine).start(&engine))
        } else {
            None
        };

        Self { engine, reaper }
    }

    /// Get the underlying engine
    pub fn engine(&self) -> Arc<CacheEngine> {
        Arc::clone(&self.engine)
    }

    pub fn config(&self) -> &CacheConfig {
        self.engine.config()
    }

    /// Whether the background reaper is running
    pub fn is_reaping(&self) -> bool {
        self.reaper.as_ref().is_some_and(ReaperHandle::is_running)
    }

    /// Cache a JSON result for a query embedding
    ///
    /// `ttl_seconds` of `None` applies the configured default TTL; zero or
    /// below keeps the entry forever.
    pub async fn cache_query(
        &self,
        query_text: &str,
        embedding: &[f32],
        payload: &serde_json::Value,
        ttl_seconds: Option<i64>,
        tags: &[String],
    ) -> Result<EntryId> {
        let payload = Payload::from_json(payload)?;
        let ttl_seconds = ttl_seconds.or_else(|| self.default_ttl_seconds());

        self.engine
            .write(query_text, embedding, payload, ttl_seconds, tags)
            .await
    }

    /// Look up a cached result; `threshold` defaults to the configured one
    pub async fn get_cached_result(
        &self,
        embedding: &[f32],
        threshold: Option<f32>,
        tags: Option<&[String]>,
    ) -> Result<CachedResult> {
        let threshold = threshold.unwrap_or(self.config().similarity_threshold);
        let result = self.engine.lookup(embedding, threshold, tags).await?;
        CachedResult::from_lookup(result)
    }

    /// Embed `text` with `provider` and cache the result under it
    pub async fn cache_text<P>(
        &self,
        provider: &P,
        text: &str,
        payload: &serde_json::Value,
        ttl_seconds: Option<i64>,
        tags: &[String],
    ) -> Result<EntryId>
    where
        P: EmbeddingProvider + ?Sized,
    {
        let embedding = provider.embed(text).await?;
        debug!(
            "Embedded query with {} ({} dimensions)",
            provider.provider_name(),
            embedding.len()
        );
        self.cache_query(text, &embedding, payload, ttl_seconds, tags)
            .await
    }

    /// Embed `text` with `provider` and look it up
    pub async fn lookup_text<P>(
        &self,
        provider: &P,
        text: &str,
        threshold: Option<f32>,
        tags: Option<&[String]>,
    ) -> Result<CachedResult>
    where
        P: EmbeddingProvider + ?Sized,
    {
        let embedding = provider.embed(text).await?;
        self.get_cached_result(&embedding, threshold, tags).await
    }

    pub fn cache_stats(&self) -> CacheStatsReport {
        let stats = self.engine.stats();
        CacheStatsReport {
            total_entries: stats.total_entries,
            total_hits: stats.total_hits,
            total_misses: stats.total_misses,
            total_lookups: stats.total_lookups(),
            hit_rate_percent: stats.hit_rate_percent(),
            evictions: stats.evictions,
            expirations: stats.expirations,
            dimension: self.engine.dimension(),
        }
    }

    /// Remove all entries and reset statistics
    pub async fn clear_cache(&self) -> usize {
        self.engine.clear_all().await
    }

    pub async fn evict_expired(&self) -> usize {
        self.engine.evict_expired().await
    }

    /// Evict least recently used entries until at most `keep` remain
    pub async fn evict_lru(&self, keep: usize) -> usize {
        self.engine.evict_lru(keep).await
    }

    pub async fn invalidate_tag(&self, tag: &str) -> Result<usize> {
        self.engine.invalidate_tag(tag).await
    }

    pub fn vector_dimension(&self) -> usize {
        self.engine.dimension()
    }

    pub fn prepare_rebuild(&self, new_dimension: usize) -> Result<RebuildToken> {
        self.engine.prepare_rebuild(new_dimension)
    }

    pub async fn confirm_rebuild(&self, token: RebuildToken) -> Result<usize> {
        self.engine.confirm_rebuild(token).await
    }

    /// Stop the background reaper
    pub async fn shutdown(&self) {
        if let Some(reaper) = &self.reaper {
            reaper.shutdown().await;
            info!("Semantic cache shut down");
        }
    }

    fn default_ttl_seconds(&self) -> Option<i64> {
        self.config()
            .default_ttl
            .map(|ttl| i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX))
    }
}
