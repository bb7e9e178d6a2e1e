//! Exact nearest-neighbor index over cached embeddings
//!
//! The index stores a copy of every vector keyed by [`EntryId`] and answers
//! top-k cosine queries with a full scan. It never owns entries: ids are
//! resolved through the [`EntryStore`](crate::cache::store::EntryStore).
//!
//! Similarities are accumulated in `f64`. For a query identical to a stored
//! vector the dot product and both squared norms are bit-identical, so the
//! self-similarity comes out as exactly `1.0`.

use crate::cache::types::EntryId;
use crate::error::{CacheError, Result};
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::debug;

/// A candidate returned by [`VectorIndex::nearest`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub id: EntryId,
    pub similarity: f32,
}

struct IndexedVector {
    vector: Box<[f32]>,
    norm_sq: f64,
    tags: Arc<BTreeSet<String>>,
}

struct IndexInner {
    dimension: usize,
    vectors: HashMap<EntryId, IndexedVector>,
}

/// Readers-writer protected vector index
///
/// `nearest` calls share the read lock and run in parallel; `insert`,
/// `remove` and `rebuild` take the write lock briefly.
pub struct VectorIndex {
    inner: RwLock<IndexInner>,
}

impl VectorIndex {
    /// Create an empty index for vectors of `dimension` components
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(CacheError::InvalidArgument(
                "index dimension must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            inner: RwLock::new(IndexInner {
                dimension,
                vectors: HashMap::new(),
            }),
        })
    }

    pub fn dimension(&self) -> usize {
        self.inner.read().dimension
    }

    pub fn len(&self) -> usize {
        self.inner.read().vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().vectors.is_empty()
    }

    pub fn contains(&self, id: EntryId) -> bool {
        self.inner.read().vectors.contains_key(&id)
    }

    /// Insert an untagged vector
    pub fn insert(&self, id: EntryId, vector: &[f32]) -> Result<()> {
        self.insert_with_tags(id, vector, &BTreeSet::new())
    }

    /// Insert a vector along with the tag set used for filtered queries
    pub fn insert_with_tags(
        &self,
        id: EntryId,
        vector: &[f32],
        tags: &BTreeSet<String>,
    ) -> Result<()> {
        let mut inner = self.inner.write();
        check_vector(inner.dimension, vector)?;

        let indexed = IndexedVector {
            vector: vector.into(),
            norm_sq: dot(vector, vector),
            tags: Arc::new(tags.clone()),
        };

        if inner.vectors.insert(id, indexed).is_some() {
            debug!("Replaced indexed vector for entry {}", id);
        }
        Ok(())
    }

    /// Remove a vector; returns whether it was present
    pub fn remove(&self, id: EntryId) -> bool {
        self.inner.write().vectors.remove(&id).is_some()
    }

    /// Remove a batch of vectors under a single write lock
    pub fn remove_many(&self, ids: &[EntryId]) -> usize {
        let mut inner = self.inner.write();
        let mut removed = 0;
        for id in ids {
            if inner.vectors.remove(id).is_some() {
                removed += 1;
            }
        }
        removed
    }

    /// Drop every vector, keeping the dimension
    pub fn clear(&self) -> usize {
        let mut inner = self.inner.write();
        let count = inner.vectors.len();
        inner.vectors.clear();
        count
    }

    /// Drop every vector and switch to `new_dimension`
    pub fn rebuild(&self, new_dimension: usize) -> Result<usize> {
        if new_dimension == 0 {
            return Err(CacheError::InvalidArgument(
                "index dimension must be greater than 0".to_string(),
            ));
        }

        let mut inner = self.inner.write();
        let count = inner.vectors.len();
        inner.vectors = HashMap::new();
        inner.dimension = new_dimension;
        Ok(count)
    }

    /// The `k` stored vectors most similar to `query`
    ///
    /// Results are ordered by descending cosine similarity; equal similarities
    /// prefer the more recently written id. When `tag_filter` is given, only
    /// vectors carrying every listed tag are considered. An empty index yields
    /// an empty result.
    pub fn nearest(
        &self,
        query: &[f32],
        k: usize,
        tag_filter: Option<&[String]>,
    ) -> Result<Vec<Neighbor>> {
        if k == 0 {
            return Err(CacheError::InvalidArgument(
                "k must be greater than 0".to_string(),
            ));
        }

        let inner = self.inner.read();
        check_vector(inner.dimension, query)?;

        let query_norm_sq = dot(query, query);
        let mut scored: Vec<Neighbor> = inner
            .vectors
            .iter()
            .filter(|(_, v)| match tag_filter {
                Some(tags) => tags.iter().all(|t| v.tags.contains(t)),
                None => true,
            })
            .map(|(id, v)| Neighbor {
                id: *id,
                similarity: cosine(query, query_norm_sq, &v.vector, v.norm_sq),
            })
            .collect();
        drop(inner);

        if scored.len() > k {
            scored.select_nth_unstable_by(k - 1, rank);
            scored.truncate(k);
        }
        scored.sort_unstable_by(rank);

        Ok(scored)
    }
}

/// Descending similarity, then descending id (fresher first)
fn rank(a: &Neighbor, b: &Neighbor) -> Ordering {
    b.similarity
        .total_cmp(&a.similarity)
        .then_with(|| b.id.cmp(&a.id))
}

fn check_vector(dimension: usize, vector: &[f32]) -> Result<()> {
    if vector.len() != dimension {
        return Err(CacheError::DimensionMismatch {
            expected: dimension,
            got: vector.len(),
        });
    }
    if vector.iter().any(|x| !x.is_finite()) {
        return Err(CacheError::InvalidArgument(
            "embedding contains non-finite components".to_string(),
        ));
    }
    Ok(())
}

fn dot(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| f64::from(*x) * f64::from(*y))
        .sum()
}

fn cosine(a: &[f32], a_norm_sq: f64, b: &[f32], b_norm_sq: f64) -> f32 {
    if a_norm_sq == 0.0 || b_norm_sq == 0.0 {
        return 0.0;
    }
    let similarity = dot(a, b) / (a_norm_sq * b_norm_sq).sqrt();
    similarity.clamp(-1.0, 1.0) as f32
}

/// Cosine similarity of two equal-length vectors (0.0 for zero vectors)
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    cosine(a, dot(a, a), b, dot(b, b))
}
