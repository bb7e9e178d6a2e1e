//! Invalidation reasons and events
//!
//! Every path that removes entries (TTL reaping, tag invalidation, LRU
//! capacity eviction, supersession, full clears and rebuilds) reports what
//! it removed as an [`InvalidationEvent`].

use crate::cache::types::EntryId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reason for cache invalidation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvalidationReason {
    /// Entry expired based on TTL
    Expired,

    /// Invalidated by tag match
    TagMatch { tag: String },

    /// Evicted by LRU policy to respect capacity
    LeastRecentlyUsed,

    /// Replaced by a newer result for the same query text
    Superseded,

    /// Removed by a full clear
    Cleared,

    /// Removed by a dimension rebuild
    Rebuild { dimension: usize },
}

impl std::fmt::Display for InvalidationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvalidationReason::Expired => write!(f, "TTL expired"),
            InvalidationReason::TagMatch { tag } => write!(f, "tag match: {}", tag),
            InvalidationReason::LeastRecentlyUsed => write!(f, "LRU eviction"),
            InvalidationReason::Superseded => write!(f, "superseded by newer result"),
            InvalidationReason::Cleared => write!(f, "cache cleared"),
            InvalidationReason::Rebuild { dimension } => {
                write!(f, "index rebuilt for dimension {}", dimension)
            }
        }
    }
}

/// Event for cache invalidation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvalidationEvent {
    /// Reason for invalidation
    pub reason: InvalidationReason,

    /// When the invalidation occurred
    pub timestamp: DateTime<Utc>,

    /// Ids that were invalidated; empty for bulk clears
    pub ids: Vec<EntryId>,

    /// Number of entries removed
    pub count: usize,
}

impl InvalidationEvent {
    /// Create an event for a known set of ids
    pub fn new(reason: InvalidationReason, ids: Vec<EntryId>) -> Self {
        Self {
            reason,
            timestamp: Utc::now(),
            count: ids.len(),
            ids,
        }
    }

    /// Create an event for a bulk removal where ids are not tracked
    pub fn bulk(reason: InvalidationReason, count: usize) -> Self {
        Self {
            reason,
            timestamp: Utc::now(),
            ids: Vec::new(),
            count,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}
