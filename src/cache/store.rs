//! Authoritative storage for cache entries
//!
//! [`EntryStore`] owns every [`CacheEntry`]. Two auxiliary maps are kept in
//! step with the primary one: tag → ids for selective invalidation, and
//! query text → id so that re-caching the same query supersedes the older
//! entry. All maps are sharded (`DashMap`), so structural changes lock only
//! the affected entity.

use crate::cache::entry::CacheEntry;
use crate::cache::types::EntryId;
use crate::error::{CacheError, Result};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Liveness of an entry at a given instant
#[derive(Debug, Clone)]
pub enum EntryState {
    Live(CacheEntry),
    Expired,
    NotFound,
}

/// Outcome of [`EntryStore::put`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PutResult {
    pub id: EntryId,
    /// Older entry cached under the same query text, still to be removed
    pub superseded: Option<EntryId>,
}

/// Sharded entry storage with tag and query-text side indexes
pub struct EntryStore {
    entries: DashMap<EntryId, CacheEntry>,
    tags: DashMap<String, HashSet<EntryId>>,
    queries: DashMap<String, EntryId>,
    next_id: AtomicU64,
}

impl EntryStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            tags: DashMap::new(),
            queries: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Allocate a fresh id; ids increase with every call
    pub fn allocate_id(&self) -> EntryId {
        EntryId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Insert an entry and register its tags and query text
    pub fn put(&self, entry: CacheEntry) -> PutResult {
        let id = entry.id;
        self.next_id.fetch_max(id.as_u64() + 1, Ordering::Relaxed);

        for tag in &entry.metadata.tags {
            self.tags.entry(tag.clone()).or_default().insert(id);
        }
        let superseded = self
            .queries
            .insert(entry.query_text.clone(), id)
            .filter(|previous| *previous != id);

        if let Some(replaced) = self.entries.insert(id, entry) {
            debug!("Replaced stored entry {}", replaced.id);
        }

        PutResult { id, superseded }
    }

    /// Get an entry regardless of expiration
    pub fn get(&self, id: EntryId) -> Result<CacheEntry> {
        self.entries
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| CacheError::NotFound(id.to_string()))
    }

    /// Resolve an entry if it is live at `now`
    ///
    /// Never mutates: expired entries stay in place until reaped.
    pub fn get_if_live(&self, id: EntryId, now: DateTime<Utc>) -> EntryState {
        match self.entries.get(&id) {
            Some(entry) if entry.is_expired_at(now) => EntryState::Expired,
            Some(entry) => EntryState::Live(entry.value().clone()),
            None => EntryState::NotFound,
        }
    }

    pub fn contains(&self, id: EntryId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Record a hit; returns the new hit count
    pub fn increment_hit(&self, id: EntryId) -> Result<u64> {
        let mut entry = self
            .entries
            .get_mut(&id)
            .ok_or_else(|| CacheError::NotFound(id.to_string()))?;
        entry.mark_accessed();
        Ok(entry.metadata.hit_count)
    }

    /// Remove an entry and its side-index registrations
    pub fn remove(&self, id: EntryId) -> Option<CacheEntry> {
        let (_, entry) = self.entries.remove(&id)?;
        self.unlink(&entry);
        Some(entry)
    }

    /// Remove an entry only if it has expired at `now`
    pub fn remove_if_expired(&self, id: EntryId, now: DateTime<Utc>) -> Option<CacheEntry> {
        let (_, entry) = self
            .entries
            .remove_if(&id, |_, entry| entry.is_expired_at(now))?;
        self.unlink(&entry);
        Some(entry)
    }

    /// Ids currently registered under `tag`
    pub fn ids_with_tag(&self, tag: &str) -> Vec<EntryId> {
        self.tags
            .get(tag)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Remove every entry carrying `tag`; returns the removed ids
    pub fn remove_by_tag(&self, tag: &str) -> Vec<EntryId> {
        self.ids_with_tag(tag)
            .into_iter()
            .filter(|id| self.remove(*id).is_some())
            .collect()
    }

    /// Point `query_text` back at `id` after a failed supersession
    pub fn restore_query_owner(&self, query_text: &str, id: EntryId) {
        if self.entries.contains_key(&id) {
            self.queries.insert(query_text.to_string(), id);
        }
    }

    /// Drop everything; returns the number of entries removed
    pub fn clear(&self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        self.tags.clear();
        self.queries.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ids of entries expired at `now`, earliest expiration first
    pub fn expired_ids(&self, now: DateTime<Utc>, limit: usize) -> Vec<EntryId> {
        let mut expired: Vec<(DateTime<Utc>, EntryId)> = self
            .entries
            .iter()
            .filter_map(|entry| match entry.metadata.expires_at {
                Some(at) if at <= now => Some((at, entry.id)),
                _ => None,
            })
            .collect();

        expired.sort_unstable();
        expired.truncate(limit);
        expired.into_iter().map(|(_, id)| id).collect()
    }

    /// Ids of the `count` least recently accessed entries live at `now`
    pub fn least_recently_used(&self, now: DateTime<Utc>, count: usize) -> Vec<EntryId> {
        let mut by_access: Vec<(DateTime<Utc>, EntryId)> = self
            .entries
            .iter()
            .filter(|entry| !entry.is_expired_at(now))
            .map(|entry| (entry.metadata.accessed_at, entry.id))
            .collect();

        if by_access.len() > count && count > 0 {
            by_access.select_nth_unstable(count - 1);
        }
        by_access.truncate(count);
        by_access.sort_unstable();
        by_access.into_iter().map(|(_, id)| id).collect()
    }

    /// Clone every entry live at `now`
    pub fn live_entries(&self, now: DateTime<Utc>) -> Vec<CacheEntry> {
        let mut entries: Vec<CacheEntry> = self
            .entries
            .iter()
            .filter(|entry| !entry.is_expired_at(now))
            .map(|entry| entry.value().clone())
            .collect();
        entries.sort_by_key(|entry| entry.id);
        entries
    }

    fn unlink(&self, entry: &CacheEntry) {
        for tag in &entry.metadata.tags {
            if let Some(mut ids) = self.tags.get_mut(tag) {
                ids.remove(&entry.id);
            }
            self.tags.remove_if(tag, |_, ids| ids.is_empty());
        }
        self.queries
            .remove_if(&entry.query_text, |_, owner| *owner == entry.id);
    }
}

impl Default for EntryStore {
    fn default() -> Self {
        Self::new()
    }
}
