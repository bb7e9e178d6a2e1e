//! JSON snapshots of live cache entries

use crate::cache::config::CacheConfig;
use crate::cache::engine::CacheEngine;
use crate::cache::entry::CacheEntry;
use crate::error::{CacheError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

const SNAPSHOT_VERSION: u32 = 1;

/// On-disk snapshot format
#[derive(Debug, Serialize, Deserialize)]
pub struct CacheSnapshot {
    pub version: u32,
    pub dimension: usize,
    pub saved_at: DateTime<Utc>,
    pub entries: Vec<CacheEntry>,
}

impl CacheEngine {
    /// Write every live entry to `path`
    ///
    /// The file is written next to `path` and renamed into place, so a failed
    /// save never leaves a truncated snapshot behind.
    pub async fn save_snapshot(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let snapshot = CacheSnapshot {
            version: SNAPSHOT_VERSION,
            dimension: self.dimension(),
            saved_at: Utc::now(),
            entries: self.live_entries().await,
        };
        let count = snapshot.entries.len();

        let bytes = serde_json::to_vec(&snapshot)?;
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, path).await?;

        info!("Saved {} cache entries to {}", count, path.display());
        Ok(count)
    }

    /// Create an engine populated from a snapshot written by [`save_snapshot`]
    ///
    /// Entries that expired since the snapshot was taken are dropped. The
    /// snapshot dimension must match `config.dimension`.
    ///
    /// [`save_snapshot`]: CacheEngine::save_snapshot
    pub async fn load_snapshot(path: impl AsRef<Path>, config: CacheConfig) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let snapshot: CacheSnapshot = serde_json::from_slice(&bytes)?;

        if snapshot.version != SNAPSHOT_VERSION {
            return Err(CacheError::SerializationError(format!(
                "unsupported snapshot version {}",
                snapshot.version
            )));
        }
        if snapshot.dimension != config.dimension {
            return Err(CacheError::DimensionMismatch {
                expected: config.dimension,
                got: snapshot.dimension,
            });
        }

        let engine = CacheEngine::new(config)?;
        let restored = engine.restore_entries(snapshot.entries).await?;

        info!(
            "Loaded {} cache entries from {} (saved {})",
            restored,
            path.display(),
            snapshot.saved_at
        );
        Ok(engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::types::Payload;
    use tempfile::TempDir;

    fn config(dimension: usize) -> CacheConfig {
        CacheConfig::builder()
            .dimension(dimension)
            .enable_auto_cleanup(false)
            .build()
    }

    #[tokio::test]
    async fn test_snapshot_restores_entries() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");

        let engine = CacheEngine::new(config(3)).unwrap();
        let kept = engine
            .write("kept", &[1.0, 0.0, 0.0], Payload::from("k"), None, &["docs".to_string()])
            .await
            .unwrap();
        engine
            .write("other", &[0.0, 1.0, 0.0], Payload::from("o"), Some(3600), &[])
            .await
            .unwrap();

        assert_eq!(engine.save_snapshot(&path).await.unwrap(), 2);

        let restored = CacheEngine::load_snapshot(&path, config(3)).await.unwrap();
        assert_eq!(restored.len(), 2);
        assert_eq!(restored.stats().total_entries, 2);

        let result = restored.lookup(&[1.0, 0.0, 0.0], 0.9, None).await.unwrap();
        assert_eq!(result.entry_id(), Some(kept));
        assert_eq!(result.payload(), Some(&Payload::from("k")));

        // tags survive and fresh ids do not collide with restored ones
        assert_eq!(restored.invalidate_tag("docs").await.unwrap(), 1);
        let fresh = restored
            .write("new", &[0.0, 0.0, 1.0], Payload::from("n"), None, &[])
            .await
            .unwrap();
        assert!(fresh > kept);
    }

    #[tokio::test]
    async fn test_snapshot_dimension_mismatch() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");

        let engine = CacheEngine::new(config(2)).unwrap();
        engine.save_snapshot(&path).await.unwrap();

        let err = CacheEngine::load_snapshot(&path, config(4)).await.err().unwrap();
        assert!(matches!(
            err,
            CacheError::DimensionMismatch {
                expected: 4,
                got: 2
            }
        ));
    }

    #[tokio::test]
    async fn test_snapshot_missing_or_corrupt_file() {
        let dir = TempDir::new().unwrap();

        let err = CacheEngine::load_snapshot(dir.path().join("absent.json"), config(2))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, CacheError::StorageFailure(_)));

        let corrupt = dir.path().join("corrupt.json");
        std::fs::write(&corrupt, b"{ not json").unwrap();
        let err = CacheEngine::load_snapshot(&corrupt, config(2)).await.err().unwrap();
        assert!(matches!(err, CacheError::SerializationError(_)));
    }
}
