//! Core type definitions for the cache system

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;

/// Embedding vector as produced by the external provider
pub type EmbeddingVector = Vec<f32>;

/// Unique identifier of a cache entry
///
/// Ids are allocated from a monotonically increasing counter, so a larger id
/// always belongs to a more recently written entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub u64);

impl EntryId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for EntryId {
    fn from(id: u64) -> Self {
        EntryId(id)
    }
}

/// Opaque cached result
///
/// The engine never inspects payload bytes. JSON conversion helpers exist for
/// the facade boundary only.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Payload(Bytes);

impl Payload {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Payload(bytes.into())
    }

    /// Serialize a JSON value into a payload
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        Ok(Payload(Bytes::from(serde_json::to_vec(value)?)))
    }

    /// Parse the payload back into a JSON value
    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::from_slice(&self.0)?)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for Payload {
    fn from(v: Vec<u8>) -> Self {
        Payload(Bytes::from(v))
    }
}

impl From<&'static str> for Payload {
    fn from(s: &'static str) -> Self {
        Payload(Bytes::from_static(s.as_bytes()))
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Payload(Bytes::from(s))
    }
}

/// Outcome of a similarity lookup
#[derive(Debug, Clone, PartialEq)]
pub enum LookupResult {
    /// Closest live entry met the threshold
    Hit {
        entry_id: EntryId,
        similarity: f32,
        payload: Payload,
        created_at: DateTime<Utc>,
    },

    /// No live entry met the threshold
    ///
    /// `best_similarity` is the closest eligible candidate observed, or `None`
    /// when nothing eligible was stored.
    Miss { best_similarity: Option<f32> },
}

impl LookupResult {
    pub fn is_hit(&self) -> bool {
        matches!(self, LookupResult::Hit { .. })
    }

    /// Similarity of the hit, or the best similarity seen on a miss (0 if none)
    pub fn similarity(&self) -> f32 {
        match self {
            LookupResult::Hit { similarity, .. } => *similarity,
            LookupResult::Miss { best_similarity } => best_similarity.unwrap_or(0.0),
        }
    }

    pub fn entry_id(&self) -> Option<EntryId> {
        match self {
            LookupResult::Hit { entry_id, .. } => Some(*entry_id),
            LookupResult::Miss { .. } => None,
        }
    }

    pub fn payload(&self) -> Option<&Payload> {
        match self {
            LookupResult::Hit { payload, .. } => Some(payload),
            LookupResult::Miss { .. } => None,
        }
    }
}

/// Point-in-time view of the engine counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Entries currently cached
    pub total_entries: u64,

    /// Lookups answered from the cache
    pub total_hits: u64,

    /// Lookups that found no sufficiently similar entry
    pub total_misses: u64,

    /// Entries removed by LRU capacity eviction
    pub evictions: u64,

    /// Entries removed after their TTL elapsed
    pub expirations: u64,
}

impl StatsSnapshot {
    /// Fraction of lookups that were hits (0.0 when no lookups occurred)
    pub fn hit_rate(&self) -> f64 {
        let total = self.total_hits + self.total_misses;
        if total == 0 {
            0.0
        } else {
            self.total_hits as f64 / total as f64
        }
    }

    pub fn hit_rate_percent(&self) -> f64 {
        self.hit_rate() * 100.0
    }

    pub fn total_lookups(&self) -> u64 {
        self.total_hits + self.total_misses
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StatsSnapshot {{ entries: {}, hits: {}, misses: {}, hit_rate: {:.2}%, evictions: {}, expirations: {} }}",
            self.total_entries,
            self.total_hits,
            self.total_misses,
            self.hit_rate_percent(),
            self.evictions,
            self.expirations
        )
    }
}
