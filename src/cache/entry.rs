//! Cache entry management with TTL support

use crate::cache::types::{EntryId, Payload};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

/// A cached query result together with its embedding and metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Unique entry id
    pub id: EntryId,

    /// Query text the result was computed for
    pub query_text: String,

    /// Embedding of the query
    pub embedding: Arc<[f32]>,

    /// The cached result
    pub payload: Payload,

    /// Entry metadata
    pub metadata: CacheMetadata,
}

impl CacheEntry {
    /// Create a new entry; `ttl` of `None` means the entry never expires
    pub fn new(
        id: EntryId,
        query_text: impl Into<String>,
        embedding: impl Into<Arc<[f32]>>,
        payload: Payload,
        ttl: Option<Duration>,
    ) -> Self {
        let now = Utc::now();
        let expires_at = ttl.and_then(|ttl| {
            chrono::Duration::from_std(ttl)
                .ok()
                .and_then(|ttl| now.checked_add_signed(ttl))
        });
        let size_bytes = payload.len();

        Self {
            id,
            query_text: query_text.into(),
            embedding: embedding.into(),
            payload,
            metadata: CacheMetadata {
                created_at: now,
                accessed_at: now,
                expires_at,
                hit_count: 0,
                size_bytes,
                tags: BTreeSet::new(),
            },
        }
    }

    /// Attach tags for group invalidation
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.metadata.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Check expiration against a supplied timestamp
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.metadata.expires_at {
            Some(expires_at) => now >= expires_at,
            None => false,
        }
    }

    /// Check if the entry has expired
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Get the age of the entry
    pub fn age(&self) -> Duration {
        age_of(self.metadata.created_at)
    }

    /// Get time until expiration, `None` if expired or never expiring
    pub fn time_until_expiration(&self) -> Option<Duration> {
        let expires_at = self.metadata.expires_at?;
        (expires_at - Utc::now()).to_std().ok()
    }

    /// Record a cache hit on this entry
    pub fn mark_accessed(&mut self) {
        self.metadata.accessed_at = Utc::now();
        self.metadata.hit_count += 1;
    }

    /// Check if entry has a specific tag
    pub fn has_tag(&self, tag: &str) -> bool {
        self.metadata.tags.contains(tag)
    }

    /// Check that the entry carries every tag in `tags`
    pub fn has_all_tags(&self, tags: &[String]) -> bool {
        tags.iter().all(|t| self.metadata.tags.contains(t))
    }

    pub fn dimension(&self) -> usize {
        self.embedding.len()
    }
}

/// Metadata associated with a cache entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMetadata {
    /// When the entry was created
    pub created_at: DateTime<Utc>,

    /// Last hit time (for LRU tracking)
    pub accessed_at: DateTime<Utc>,

    /// When the entry expires; `None` never expires
    pub expires_at: Option<DateTime<Utc>>,

    /// Number of lookups answered by this entry
    pub hit_count: u64,

    /// Payload size in bytes
    pub size_bytes: usize,

    /// Tags for selective invalidation
    pub tags: BTreeSet<String>,
}

/// Convert caller TTL seconds; zero, negative or absent means never expires
pub fn ttl_from_seconds(ttl_seconds: Option<i64>) -> Option<Duration> {
    match ttl_seconds {
        Some(secs) if secs > 0 => Some(Duration::from_secs(secs as u64)),
        _ => None,
    }
}

/// Time elapsed since `created_at`; zero if it lies in the future
pub fn age_of(created_at: DateTime<Utc>) -> Duration {
    (Utc::now() - created_at).to_std().unwrap_or_default()
}
