//! # semantic-cache
//!
//! An in-process semantic cache for expensive query results such as LLM
//! completions or RAG retrievals. Results are stored under the embedding of
//! the query that produced them; a later query whose embedding is close
//! enough reuses the stored result instead of recomputing it.
//!
//! ## Components
//!
//! - [`VectorIndex`]: exact cosine nearest-neighbour search
//! - [`EntryStore`]: authoritative entry storage with tag and query-text indexes
//! - [`CacheEngine`]: write, lookup and invalidation over both structures
//! - [`TtlReaper`]: periodic removal of expired entries
//! - [`StatsAccumulator`]: hit, miss and eviction counters
//! - [`SemanticCache`]: JSON-payload service with embedding provider support
//!
//! ## Engine Usage
//!
//! ```no_run
//! use semantic_cache::{CacheConfig, CacheEngine, Payload};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let engine = CacheEngine::new(CacheConfig::builder().dimension(4).build())?;
//!
//!     engine
//!         .write("a", &[1.0, 0.0, 0.0, 0.0], Payload::from("A"), Some(3600), &[])
//!         .await?;
//!
//!     let result = engine.lookup(&[1.0, 0.0, 0.0, 0.0], 0.9, None).await?;
//!     assert!(result.is_hit());
//!     println!("{}", engine.stats());
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod error;

// Re-export main types for convenience
pub use cache::{
    cosine_similarity, CacheConfig, CacheConfigBuilder, CacheEngine, CacheEntry, CacheMetadata,
    CacheSnapshot, CacheStatsReport, CachedResult, EmbeddingProvider, EmbeddingVector, EntryId,
    EntryState, EntryStore, InvalidationEvent, InvalidationReason, LookupResult, Neighbor,
    Payload, RebuildToken, ReaperHandle, SemanticCache, StatsAccumulator, StatsSnapshot,
    TtlReaper, VectorIndex,
};
pub use error::{CacheError, Result};
