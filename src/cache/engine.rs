//! Semantic cache engine
//!
//! [`CacheEngine`] composes the [`EntryStore`], the [`VectorIndex`] and the
//! [`StatsAccumulator`] and owns the hit/miss decision.
//!
//! Writes publish store-then-index: an id only becomes reachable through the
//! index once its entry is stored. Removals unpublish index-then-store. Every
//! index candidate is still resolved through the store before it is
//! returned, so ids removed concurrently are skipped rather than surfaced.
//! `clear_all` and `confirm_rebuild` take the write side of an engine-wide
//! fence; everything else shares its read side.

use crate::cache::config::CacheConfig;
use crate::cache::entry::{ttl_from_seconds, CacheEntry};
use crate::cache::index::{Neighbor, VectorIndex};
use crate::cache::invalidation::{InvalidationEvent, InvalidationReason};
use crate::cache::stats::StatsAccumulator;
use crate::cache::store::{EntryState, EntryStore};
use crate::cache::types::{EntryId, LookupResult, Payload, StatsSnapshot};
use crate::error::{CacheError, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Growth factor for the candidate window when top candidates are not live
const CANDIDATE_GROWTH: usize = 5;

/// Confirmation handle for a pending destructive rebuild
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebuildToken {
    dimension: usize,
    nonce: u64,
}

impl RebuildToken {
    pub fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Thread-safe semantic cache
pub struct CacheEngine {
    config: CacheConfig,
    store: EntryStore,
    index: VectorIndex,
    stats: StatsAccumulator,

    /// Shared by regular operations, held exclusively by clear and rebuild
    fence: RwLock<()>,

    pending_rebuild: Mutex<Option<RebuildToken>>,
    rebuild_nonce: AtomicU64,

    #[cfg(test)]
    fail_next_index_insert: std::sync::atomic::AtomicBool,
    #[cfg(test)]
    invalidate_before_index_failure: std::sync::atomic::AtomicBool,
}

impl CacheEngine {
    /// Create an engine for the configured dimension
    pub fn new(config: CacheConfig) -> Result<Self> {
        config.validate()?;
        info!(
            "Initializing semantic cache (dimension: {}, threshold: {})",
            config.dimension, config.similarity_threshold
        );

        Ok(Self {
            index: VectorIndex::new(config.dimension)?,
            store: EntryStore::new(),
            stats: StatsAccumulator::new(),
            fence: RwLock::new(()),
            pending_rebuild: Mutex::new(None),
            rebuild_nonce: AtomicU64::new(1),
            config,
            #[cfg(test)]
            fail_next_index_insert: std::sync::atomic::AtomicBool::new(false),
            #[cfg(test)]
            invalidate_before_index_failure: std::sync::atomic::AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Current vector dimension
    pub fn dimension(&self) -> usize {
        self.index.dimension()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Cache a result under the embedding of `query_text`
    ///
    /// `ttl_seconds` of `None`, zero or below means the entry never expires.
    /// A live entry with the same query text is superseded.
    pub async fn write(
        &self,
        query_text: &str,
        embedding: &[f32],
        payload: Payload,
        ttl_seconds: Option<i64>,
        tags: &[String],
    ) -> Result<EntryId> {
        let _fence = self.fence.read().await;
        self.check_embedding(embedding)?;

        let id = self.store.allocate_id();
        let entry = CacheEntry::new(
            id,
            query_text,
            embedding,
            payload,
            ttl_from_seconds(ttl_seconds),
        )
        .with_tags(tags.iter().cloned());
        let entry_tags = entry.metadata.tags.clone();

        let put = self.store.put(entry);
        self.stats.record_insert();

        if let Err(e) = self.index_insert(id, embedding, &entry_tags) {
            warn!("Index insert failed for entry {}, rolling back: {}", id, e);
            // a racing invalidation may already have removed and counted it
            if self.store.remove(id).is_some() {
                self.stats.record_removed(1);
            }
            if let Some(previous) = put.superseded {
                self.store.restore_query_owner(query_text, previous);
            }
            return Err(CacheError::StorageFailure(format!(
                "index insert failed for entry {}: {}",
                id, e
            )));
        }

        // invalidated between publishing steps
        if !self.store.contains(id) {
            self.index.remove(id);
        }

        if let Some(previous) = put.superseded {
            let removed = self.purge(&[previous]);
            self.stats.record_removed(removed.len());
            if !removed.is_empty() {
                log_event(&InvalidationEvent::new(InvalidationReason::Superseded, removed));
            }
        }

        if let Some(max_entries) = self.config.max_entries {
            self.evict_to(max_entries);
        }

        debug!("Cached entry {} for query {:?}", id, query_text);
        Ok(id)
    }

    /// Find the most similar live entry and decide hit or miss
    ///
    /// The threshold must lie in `[0, 1]`; a hit requires
    /// `similarity >= threshold`. With a tag filter, only entries carrying
    /// every listed tag are candidates.
    pub async fn lookup(
        &self,
        embedding: &[f32],
        threshold: f32,
        tag_filter: Option<&[String]>,
    ) -> Result<LookupResult> {
        let _fence = self.fence.read().await;

        if !(0.0..=1.0).contains(&threshold) {
            return Err(CacheError::InvalidArgument(format!(
                "similarity threshold {} outside [0, 1]",
                threshold
            )));
        }
        let tag_filter = tag_filter.filter(|tags| !tags.is_empty());

        let now = Utc::now();
        let mut k = 1;
        loop {
            let candidates = self.index.nearest(embedding, k, tag_filter)?;
            let exhausted = candidates.len() < k;

            for candidate in candidates {
                if let Some(result) = self.decide(candidate, threshold, now) {
                    return Ok(result);
                }
            }

            if exhausted {
                self.stats.record_miss();
                debug!("Cache miss: no live candidate");
                return Ok(LookupResult::Miss {
                    best_similarity: None,
                });
            }
            k = k.saturating_mul(CANDIDATE_GROWTH);
        }
    }

    /// Resolve a candidate; `None` when it is no longer live
    fn decide(
        &self,
        candidate: Neighbor,
        threshold: f32,
        now: DateTime<Utc>,
    ) -> Option<LookupResult> {
        let entry = match self.store.get_if_live(candidate.id, now) {
            EntryState::Live(entry) => entry,
            EntryState::Expired | EntryState::NotFound => return None,
        };

        if candidate.similarity < threshold {
            self.stats.record_miss();
            debug!(
                "Cache miss: closest {:.4} below threshold {:.4}",
                candidate.similarity, threshold
            );
            return Some(LookupResult::Miss {
                best_similarity: Some(candidate.similarity),
            });
        }

        // removed after it was resolved
        self.store.increment_hit(candidate.id).ok()?;
        self.stats.record_hit();
        debug!(
            "Cache hit: entry {} (similarity {:.4})",
            candidate.id, candidate.similarity
        );

        Some(LookupResult::Hit {
            entry_id: candidate.id,
            similarity: candidate.similarity,
            payload: entry.payload,
            created_at: entry.metadata.created_at,
        })
    }

    /// Fetch an entry by id, expired or not
    pub async fn entry(&self, id: EntryId) -> Result<CacheEntry> {
        let _fence = self.fence.read().await;
        self.store.get(id)
    }

    /// Remove a single entry
    pub async fn remove(&self, id: EntryId) -> Result<()> {
        let _fence = self.fence.read().await;
        if self.purge(&[id]).is_empty() {
            return Err(CacheError::NotFound(id.to_string()));
        }
        self.stats.record_removed(1);
        Ok(())
    }

    /// Remove every entry carrying `tag`; hit/miss history is kept
    pub async fn invalidate_tag(&self, tag: &str) -> Result<usize> {
        let _fence = self.fence.read().await;

        self.index.remove_many(&self.store.ids_with_tag(tag));
        let removed = self.store.remove_by_tag(tag);
        // tagged writes published between the two passes
        self.index.remove_many(&removed);
        self.stats.record_removed(removed.len());

        let event = InvalidationEvent::new(
            InvalidationReason::TagMatch {
                tag: tag.to_string(),
            },
            removed,
        );
        log_event(&event);
        Ok(event.count)
    }

    /// Remove everything and reset all counters
    pub async fn clear_all(&self) -> usize {
        let _fence = self.fence.write().await;

        let removed = self.store.clear();
        self.index.clear();
        self.stats.reset();

        log_event(&InvalidationEvent::bulk(InvalidationReason::Cleared, removed));
        removed
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Remove every entry expired by now
    pub async fn evict_expired(&self) -> usize {
        let _fence = self.fence.read().await;
        self.reap_all_expired(Utc::now())
    }

    /// One bounded reaper pass, taken under the shared fence
    pub(crate) async fn reap_batch(&self) -> InvalidationEvent {
        let _fence = self.fence.read().await;
        let now = Utc::now();
        self.reap_expired(self.store.expired_ids(now, self.config.reap_batch_size), now)
    }

    /// Reap in batches until no entry expired at `now` remains
    fn reap_all_expired(&self, now: DateTime<Utc>) -> usize {
        let mut total = 0;
        loop {
            let expired = self.store.expired_ids(now, self.config.reap_batch_size);
            if expired.is_empty() {
                return total;
            }
            total += self.reap_expired(expired, now).count;
        }
    }

    fn reap_expired(&self, expired: Vec<EntryId>, now: DateTime<Utc>) -> InvalidationEvent {
        self.index.remove_many(&expired);
        let removed: Vec<EntryId> = expired
            .into_iter()
            .filter(|id| self.store.remove_if_expired(*id, now).is_some())
            .collect();
        self.stats.record_expiration(removed.len());

        let event = InvalidationEvent::new(InvalidationReason::Expired, removed);
        log_event(&event);
        event
    }

    /// Evict least recently used live entries until at most `keep` remain
    ///
    /// Expired entries are reaped first and count as expirations.
    pub async fn evict_lru(&self, keep: usize) -> usize {
        let _fence = self.fence.read().await;
        self.evict_to(keep)
    }

    fn evict_to(&self, keep: usize) -> usize {
        if self.store.len() <= keep {
            return 0;
        }

        let now = Utc::now();
        self.reap_all_expired(now);
        let len = self.store.len();
        if len <= keep {
            return 0;
        }

        let victims = self.store.least_recently_used(now, len - keep);
        let removed = self.purge(&victims);
        self.stats.record_eviction(removed.len());

        let event = InvalidationEvent::new(InvalidationReason::LeastRecentlyUsed, removed);
        log_event(&event);
        event.count
    }

    /// Request a dimension change; nothing is removed until confirmed
    pub fn prepare_rebuild(&self, new_dimension: usize) -> Result<RebuildToken> {
        if new_dimension == 0 {
            return Err(CacheError::InvalidArgument(
                "dimension must be greater than 0".to_string(),
            ));
        }

        let token = RebuildToken {
            dimension: new_dimension,
            nonce: self.rebuild_nonce.fetch_add(1, Ordering::Relaxed),
        };
        *self.pending_rebuild.lock() = Some(token);

        warn!(
            "Rebuild to dimension {} requested; confirming clears {} cached entries",
            new_dimension,
            self.store.len()
        );
        Ok(token)
    }

    /// Drop a pending rebuild request; returns whether one existed
    pub fn cancel_rebuild(&self) -> bool {
        self.pending_rebuild.lock().take().is_some()
    }

    /// Clear all data and switch to the dimension of `token`
    ///
    /// Only the most recently prepared token is accepted.
    pub async fn confirm_rebuild(&self, token: RebuildToken) -> Result<usize> {
        let _fence = self.fence.write().await;

        {
            let mut pending = self.pending_rebuild.lock();
            if *pending != Some(token) {
                return Err(CacheError::RebuildRejected(format!(
                    "no pending rebuild matches dimension {}",
                    token.dimension
                )));
            }
            pending.take();
        }

        let removed = self.store.clear();
        self.index.rebuild(token.dimension)?;
        self.stats.reset();

        log_event(&InvalidationEvent::bulk(
            InvalidationReason::Rebuild {
                dimension: token.dimension,
            },
            removed,
        ));
        Ok(removed)
    }

    /// Live entries in id order
    pub(crate) async fn live_entries(&self) -> Vec<CacheEntry> {
        let _fence = self.fence.read().await;
        self.store.live_entries(Utc::now())
    }

    /// Re-insert previously stored entries, skipping expired ones
    pub(crate) async fn restore_entries(&self, entries: Vec<CacheEntry>) -> Result<usize> {
        let _fence = self.fence.read().await;

        let now = Utc::now();
        let mut restored = 0;
        for entry in entries {
            if entry.is_expired_at(now) {
                continue;
            }
            self.check_embedding(&entry.embedding)?;

            let id = entry.id;
            let embedding = entry.embedding.clone();
            let tags = entry.metadata.tags.clone();
            let put = self.store.put(entry);
            if let Err(e) = self.index.insert_with_tags(id, &embedding, &tags) {
                self.store.remove(id);
                return Err(e);
            }
            if let Some(previous) = put.superseded {
                self.purge(&[previous]);
            }
            restored += 1;
        }

        self.stats.set_entries(self.store.len());
        Ok(restored)
    }

    fn check_embedding(&self, embedding: &[f32]) -> Result<()> {
        let expected = self.index.dimension();
        if embedding.len() != expected {
            return Err(CacheError::DimensionMismatch {
                expected,
                got: embedding.len(),
            });
        }
        if embedding.iter().any(|x| !x.is_finite()) {
            return Err(CacheError::InvalidArgument(
                "embedding contains non-finite components".to_string(),
            ));
        }
        Ok(())
    }

    fn index_insert(
        &self,
        id: EntryId,
        embedding: &[f32],
        tags: &std::collections::BTreeSet<String>,
    ) -> Result<()> {
        #[cfg(test)]
        if self.fail_next_index_insert.swap(false, Ordering::SeqCst) {
            if self.invalidate_before_index_failure.swap(false, Ordering::SeqCst)
                && self.store.remove(id).is_some()
            {
                self.stats.record_removed(1);
            }
            return Err(CacheError::StorageFailure("injected index failure".into()));
        }
        self.index.insert_with_tags(id, embedding, tags)
    }

    /// Unpublish and drop entries; returns the ids that were stored
    fn purge(&self, ids: &[EntryId]) -> Vec<EntryId> {
        self.index.remove_many(ids);
        ids.iter()
            .copied()
            .filter(|id| self.store.remove(*id).is_some())
            .collect()
    }
}

fn log_event(event: &InvalidationEvent) {
    match event.reason {
        _ if event.is_empty() => {}
        InvalidationReason::Expired
        | InvalidationReason::Superseded
        | InvalidationReason::LeastRecentlyUsed => {
            debug!("Invalidated {} entries ({})", event.count, event.reason)
        }
        _ => info!("Invalidated {} entries ({})", event.count, event.reason),
    }
}
