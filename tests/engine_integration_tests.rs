//! Integration tests for the cache engine
//!
//! These tests verify the engine through its public API:
//! - Hit/miss decisions and similarity scores
//! - TTL expiration on the read path
//! - Tag invalidation and tag-filtered lookups
//! - Clearing, capacity eviction and rebuilds

use semantic_cache::{
    CacheConfig, CacheEngine, CacheError, EntryId, LookupResult, Payload, StatsSnapshot,
};
use std::time::Duration;

fn engine(dimension: usize) -> CacheEngine {
    CacheEngine::new(
        CacheConfig::builder()
            .dimension(dimension)
            .unbounded()
            .enable_auto_cleanup(false)
            .build(),
    )
    .unwrap()
}

fn tags(list: &[&str]) -> Vec<String> {
    list.iter().map(|t| t.to_string()).collect()
}

#[tokio::test]
async fn test_self_match_is_exact_hit() {
    let engine = engine(8);
    let vector: [f32; 8] = [0.3, -0.2, 0.9, 0.1, 0.0, 0.5, -0.7, 0.25];

    let id = engine
        .write("self", &vector, Payload::from("payload"), None, &[])
        .await
        .unwrap();

    let result = engine.lookup(&vector, 1.0, None).await.unwrap();
    assert_eq!(result.entry_id(), Some(id));
    assert!((result.similarity() - 1.0).abs() < 1e-6);
}

#[tokio::test]
async fn test_two_vector_scenario() {
    let engine = engine(4);
    engine
        .write("a", &[1.0, 0.0, 0.0, 0.0], Payload::from("A"), Some(3600), &[])
        .await
        .unwrap();
    engine
        .write("b", &[0.0, 1.0, 0.0, 0.0], Payload::from("B"), Some(3600), &[])
        .await
        .unwrap();

    match engine.lookup(&[1.0, 0.0, 0.0, 0.0], 0.9, None).await.unwrap() {
        LookupResult::Hit {
            similarity,
            payload,
            ..
        } => {
            assert!((similarity - 1.0).abs() < 1e-6);
            assert_eq!(payload, Payload::from("A"));
        }
        miss => panic!("expected hit, got {:?}", miss),
    }

    let result = engine.lookup(&[0.0, 0.0, 1.0, 0.0], 0.9, None).await.unwrap();
    assert!(!result.is_hit());
    assert_eq!(result.similarity(), 0.0);
}

#[tokio::test]
async fn test_threshold_monotonicity() {
    let engine = engine(3);
    engine
        .write("q", &[1.0, 0.5, 0.0], Payload::from("p"), None, &[])
        .await
        .unwrap();

    let query: [f32; 3] = [1.0, 0.3, 0.2];
    let thresholds = [0.0, 0.25, 0.5, 0.75, 0.9, 0.95, 0.99, 1.0];

    let mut outcomes = Vec::new();
    for threshold in thresholds {
        outcomes.push(engine.lookup(&query, threshold, None).await.unwrap().is_hit());
    }

    // once a threshold misses, every higher one misses too
    let first_miss = outcomes.iter().position(|hit| !hit).unwrap_or(outcomes.len());
    assert!(outcomes[..first_miss].iter().all(|hit| *hit));
    assert!(outcomes[first_miss..].iter().all(|hit| !hit));
    assert!(outcomes[0]);
}

#[tokio::test]
async fn test_clear_all_resets_everything() {
    let engine = engine(2);
    engine
        .write("a", &[1.0, 0.0], Payload::from("a"), None, &tags(&["x"]))
        .await
        .unwrap();
    engine.lookup(&[1.0, 0.0], 0.5, None).await.unwrap();
    engine.lookup(&[-1.0, 0.0], 0.5, None).await.unwrap();

    assert_eq!(engine.clear_all().await, 1);
    assert_eq!(engine.stats(), StatsSnapshot::default());

    let result = engine.lookup(&[1.0, 0.0], 0.0, None).await.unwrap();
    assert_eq!(
        result,
        LookupResult::Miss {
            best_similarity: None
        }
    );
    assert_eq!(engine.invalidate_tag("x").await.unwrap(), 0);
}

#[tokio::test]
async fn test_ttl_expiry_visible_without_reaper() {
    let engine = engine(2);
    engine
        .write("short", &[1.0, 0.0], Payload::from("s"), Some(1), &[])
        .await
        .unwrap();

    assert!(engine.lookup(&[1.0, 0.0], 0.9, None).await.unwrap().is_hit());

    tokio::time::sleep(Duration::from_millis(1100)).await;

    let result = engine.lookup(&[1.0, 0.0], 0.9, None).await.unwrap();
    assert_eq!(
        result,
        LookupResult::Miss {
            best_similarity: None
        }
    );
}

#[tokio::test]
async fn test_non_positive_ttl_never_expires() {
    let engine = engine(2);
    let zero = engine
        .write("zero", &[1.0, 0.0], Payload::from("z"), Some(0), &[])
        .await
        .unwrap();
    let negative = engine
        .write("negative", &[0.0, 1.0], Payload::from("n"), Some(-5), &[])
        .await
        .unwrap();

    for id in [zero, negative] {
        let entry = engine.entry(id).await.unwrap();
        assert!(entry.metadata.expires_at.is_none());
        assert!(!entry.is_expired());
    }
}

#[tokio::test]
async fn test_invalidate_tag_is_selective() {
    let engine = engine(3);
    engine
        .write("x1", &[1.0, 0.0, 0.0], Payload::from("x1"), None, &tags(&["x"]))
        .await
        .unwrap();
    engine
        .write("xy", &[0.0, 1.0, 0.0], Payload::from("xy"), None, &tags(&["x", "y"]))
        .await
        .unwrap();
    let kept = engine
        .write("y", &[0.0, 0.0, 1.0], Payload::from("y"), None, &tags(&["y"]))
        .await
        .unwrap();

    let before = engine.lookup(&[0.0, 0.2, 1.0], 0.5, None).await.unwrap();
    let hits_before = engine.stats().total_hits;

    assert_eq!(engine.invalidate_tag("x").await.unwrap(), 2);

    let stats = engine.stats();
    assert_eq!(stats.total_entries, 1);
    assert_eq!(stats.total_hits, hits_before);

    let after = engine.lookup(&[0.0, 0.2, 1.0], 0.5, None).await.unwrap();
    assert_eq!(after.entry_id(), Some(kept));
    assert_eq!(after.similarity(), before.similarity());

    let miss = engine.lookup(&[1.0, 0.0, 0.0], 0.5, None).await.unwrap();
    assert!(!miss.is_hit());
}

#[tokio::test]
async fn test_tag_filter_requires_every_tag() {
    let engine = engine(2);
    let both = engine
        .write("both", &[0.6, 0.8], Payload::from("both"), None, &tags(&["docs", "v2"]))
        .await
        .unwrap();
    engine
        .write("docs", &[1.0, 0.0], Payload::from("docs"), None, &tags(&["docs"]))
        .await
        .unwrap();

    let filter = tags(&["docs", "v2"]);
    let result = engine.lookup(&[1.0, 0.0], 0.5, Some(filter.as_slice())).await.unwrap();
    assert_eq!(result.entry_id(), Some(both));

    // an empty filter does not restrict candidates
    let empty: Vec<String> = Vec::new();
    let result = engine.lookup(&[1.0, 0.0], 0.5, Some(empty.as_slice())).await.unwrap();
    assert_eq!(result.payload(), Some(&Payload::from("docs")));

    let none = tags(&["missing"]);
    let result = engine.lookup(&[1.0, 0.0], 0.0, Some(none.as_slice())).await.unwrap();
    assert_eq!(result.similarity(), 0.0);
    assert!(!result.is_hit());
}

#[tokio::test]
async fn test_wrong_dimension_is_caller_error() {
    let engine = engine(4);
    engine
        .write("ok", &[1.0, 0.0, 0.0, 0.0], Payload::from("ok"), None, &[])
        .await
        .unwrap();
    let before = engine.stats();

    let err = engine
        .write("bad", &[1.0, 0.0, 0.0], Payload::from("bad"), None, &[])
        .await
        .unwrap_err();
    assert!(err.is_caller_error());
    assert!(matches!(err, CacheError::DimensionMismatch { .. }));

    let err = engine.lookup(&[1.0; 5], 0.5, None).await.unwrap_err();
    assert!(matches!(
        err,
        CacheError::DimensionMismatch {
            expected: 4,
            got: 5
        }
    ));

    assert_eq!(engine.stats(), before);
    assert_eq!(engine.len(), 1);
}

#[tokio::test]
async fn test_non_finite_embedding_rejected() {
    let engine = engine(2);
    let err = engine
        .write("nan", &[f32::NAN, 0.0], Payload::from("n"), None, &[])
        .await
        .unwrap_err();
    assert!(matches!(err, CacheError::InvalidArgument(_)));
    assert!(engine.is_empty());
}

#[tokio::test]
async fn test_zero_vector_never_hits_above_zero() {
    let engine = engine(2);
    engine
        .write("zero", &[0.0, 0.0], Payload::from("z"), None, &[])
        .await
        .unwrap();

    let result = engine.lookup(&[1.0, 0.0], 0.1, None).await.unwrap();
    assert!(!result.is_hit());
    assert_eq!(result.similarity(), 0.0);
}

#[tokio::test]
async fn test_equal_similarity_prefers_newest_entry() {
    let engine = engine(2);
    engine
        .write("first", &[1.0, 1.0], Payload::from("first"), None, &[])
        .await
        .unwrap();
    let second = engine
        .write("second", &[2.0, 2.0], Payload::from("second"), None, &[])
        .await
        .unwrap();

    let result = engine.lookup(&[1.0, 1.0], 0.9, None).await.unwrap();
    assert_eq!(result.entry_id(), Some(second));
}

#[tokio::test]
async fn test_missing_entry_is_not_found() {
    let engine = engine(2);
    assert!(matches!(
        engine.entry(EntryId(404)).await,
        Err(CacheError::NotFound(_))
    ));
    assert!(matches!(
        engine.remove(EntryId(404)).await,
        Err(CacheError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_evict_lru_keeps_recent_entries() {
    let engine = engine(2);
    let mut ids = Vec::new();
    for i in 0..5 {
        let angle = i as f32 * 0.3;
        ids.push(
            engine
                .write(
                    &format!("q{}", i),
                    &[angle.cos(), angle.sin()],
                    Payload::from(format!("p{}", i)),
                    None,
                    &[],
                )
                .await
                .unwrap(),
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    assert_eq!(engine.evict_lru(2).await, 3);
    assert_eq!(engine.evict_lru(2).await, 0);
    assert_eq!(engine.len(), 2);

    for id in &ids[..3] {
        assert!(engine.entry(*id).await.is_err());
    }
    for id in &ids[3..] {
        assert!(engine.entry(*id).await.is_ok());
    }

    let stats = engine.stats();
    assert_eq!(stats.evictions, 3);
    assert_eq!(stats.total_entries, 2);
}

#[tokio::test]
async fn test_rebuild_changes_dimension() {
    let engine = engine(2);
    engine
        .write("q", &[1.0, 0.0], Payload::from("p"), None, &[])
        .await
        .unwrap();

    let token = engine.prepare_rebuild(3).unwrap();
    // nothing changes until confirmed
    assert!(engine.lookup(&[1.0, 0.0], 0.9, None).await.unwrap().is_hit());

    assert_eq!(engine.confirm_rebuild(token).await.unwrap(), 1);
    assert_eq!(engine.dimension(), 3);

    let err = engine.lookup(&[1.0, 0.0], 0.9, None).await.unwrap_err();
    assert!(matches!(err, CacheError::DimensionMismatch { .. }));
}

#[test]
fn test_engine_usable_from_blocking_code() {
    let engine = engine(2);

    let id = tokio_test::block_on(engine.write("q", &[1.0, 0.0], Payload::from("p"), None, &[]))
        .unwrap();
    let result = tokio_test::block_on(engine.lookup(&[1.0, 0.0], 0.9, None)).unwrap();

    assert_eq!(result.entry_id(), Some(id));
}
