//! # Semantic Cache
//!
//! Caches query results keyed by the embedding of the query text. A lookup
//! returns the cached result of the most similar live entry when its cosine
//! similarity meets the caller's threshold.
//!
//! ## Features
//!
//! - **Similarity Lookup**: exact nearest-neighbour search with optional tag filters
//! - **TTL-Based Expiration**: expired entries are invisible immediately and reaped in the background
//! - **LRU Eviction**: capacity is enforced by evicting least recently used entries
//! - **Tag Invalidation**: remove groups of entries by label
//! - **Snapshots**: persist live entries as JSON and restore them on startup
//!
//! ## Example
//!
//! ```rust
//! use semantic_cache::cache::{CacheConfig, SemanticCache};
//! use serde_json::json;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = CacheConfig::builder()
//!     .dimension(3)
//!     .similarity_threshold(0.9)
//!     .build();
//!
//! let cache = SemanticCache::new(config)?;
//!
//! cache
//!     .cache_query("what is rust?", &[0.9, 0.1, 0.0], &json!({"answer": "a language"}), None, &[])
//!     .await?;
//!
//! let result = cache.get_cached_result(&[0.88, 0.12, 0.0], None, None).await?;
//! if result.found {
//!     println!("Cache hit ({:.3}): {:?}", result.similarity_score, result.payload);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod entry;
pub mod index;
pub mod invalidation;
pub mod reaper;
pub mod service;
pub mod snapshot;
pub mod stats;
pub mod store;
pub mod types;

pub use config::{CacheConfig, CacheConfigBuilder};
pub use engine::{CacheEngine, RebuildToken};
pub use entry::{CacheEntry, CacheMetadata};
pub use index::{cosine_similarity, Neighbor, VectorIndex};
pub use invalidation::{InvalidationEvent, InvalidationReason};
pub use reaper::{ReaperHandle, TtlReaper};
pub use service::{CacheStatsReport, CachedResult, EmbeddingProvider, SemanticCache};
pub use snapshot::CacheSnapshot;
pub use stats::StatsAccumulator;
pub use store::{EntryState, EntryStore, PutResult};
pub use types::{EmbeddingVector, EntryId, LookupResult, Payload, StatsSnapshot};
