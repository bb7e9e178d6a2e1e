//! Demonstrates semantic caching of query results
//!
//! This example shows how to:
//! - Configure the cache from the environment
//! - Cache results through an embedding provider
//! - Hit the cache with a paraphrased query
//! - Invalidate by tag and persist a snapshot
//!
//! The bundled provider hashes words into buckets so the demo runs offline;
//! swap in a real embedding model for meaningful similarity.

use async_trait::async_trait;
use semantic_cache::{
    CacheConfig, CacheEngine, EmbeddingProvider, EmbeddingVector, Result, SemanticCache,
};
use serde_json::json;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Bag-of-words embedding over a fixed number of hash buckets
#[derive(Debug)]
struct HashingEmbedder {
    dimension: usize,
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<EmbeddingVector> {
        let mut vector = vec![0.0_f32; self.dimension];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() > 2)
        {
            let bucket = word
                .to_lowercase()
                .bytes()
                .fold(0usize, |h, b| h.wrapping_mul(31).wrapping_add(b as usize));
            vector[bucket % self.dimension] += 1.0;
        }
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn provider_name(&self) -> &'static str {
        "hashing"
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut config = CacheConfig::from_env()?;
    if std::env::var("SEMANTIC_CACHE_DIMENSION").is_err() {
        config.dimension = 256;
    }
    if std::env::var("SEMANTIC_CACHE_THRESHOLD").is_err() {
        config.similarity_threshold = 0.8;
    }
    let snapshot_path = std::env::var("SEMANTIC_CACHE_SNAPSHOT")
        .unwrap_or_else(|_| "semantic_cache_snapshot.json".to_string());

    let embedder = HashingEmbedder {
        dimension: config.dimension,
    };
    let cache = SemanticCache::new(config.clone())?;

    println!("Semantic cache demo (dimension {})\n", cache.vector_dimension());

    // 1. Cache a few answers
    println!("1. Caching results...");
    let docs = vec!["docs".to_string()];
    cache
        .cache_text(
            &embedder,
            "How do I configure the connection pool size?",
            &json!({"answer": "Set max_connections in the pool builder."}),
            None,
            &docs,
        )
        .await?;
    cache
        .cache_text(
            &embedder,
            "What is the default request timeout?",
            &json!({"answer": "30 seconds."}),
            Some(600),
            &docs,
        )
        .await?;
    cache
        .cache_text(
            &embedder,
            "Which regions are currently available?",
            &json!({"answer": ["eu-west", "us-east"]}),
            Some(60),
            &["status".to_string()],
        )
        .await?;
    println!("   {}\n", cache.cache_stats());

    // 2. Paraphrased lookups
    println!("2. Looking up similar queries...");
    for query in [
        "how do I configure connection pool size",
        "what is the default timeout for a request?",
        "how many replicas does the database run?",
    ] {
        let result = cache.lookup_text(&embedder, query, None, None).await?;
        if result.found {
            println!(
                "   HIT  {:.3} {:?} -> {}",
                result.similarity_score,
                query,
                result.payload.unwrap_or_default()
            );
        } else {
            println!("   MISS {:.3} {:?}", result.similarity_score, query);
        }
    }
    println!("   {}\n", cache.cache_stats());

    // 3. Persist and restore
    println!("3. Saving snapshot to {}...", snapshot_path);
    let engine = cache.engine();
    let saved = engine.save_snapshot(&snapshot_path).await?;
    let restored = CacheEngine::load_snapshot(&snapshot_path, config).await?;
    println!("   Saved {} entries, restored {}\n", saved, restored.len());
    let restored = SemanticCache::from_engine(Arc::new(restored));

    // 4. Tag invalidation
    println!("4. Invalidating tag \"docs\"...");
    let removed = restored.invalidate_tag("docs").await?;
    println!("   Removed {} entries", removed);
    println!("   {}\n", restored.cache_stats());

    restored.shutdown().await;
    cache.shutdown().await;
    std::fs::remove_file(&snapshot_path).ok();

    println!("Done");
    Ok(())
}
