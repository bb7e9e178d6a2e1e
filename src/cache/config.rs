//! Configuration for the semantic cache
//!
//! Dimension, threshold and TTL are deployment parameters that depend on the
//! embedding provider in use; the presets mirror the two demo deployments.

use crate::error::{CacheError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Configuration for a [`CacheEngine`](crate::cache::CacheEngine)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Embedding dimension every stored and queried vector must have
    pub dimension: usize,

    /// Default similarity threshold (0.0 - 1.0) used when the caller gives none
    pub similarity_threshold: f32,

    /// TTL applied when the caller gives none; `None` keeps entries forever
    pub default_ttl: Option<Duration>,

    /// Maximum number of entries; least recently used entries are evicted
    /// beyond it. `None` disables the limit.
    pub max_entries: Option<usize>,

    /// Spawn the background reaper when the engine starts
    pub enable_auto_cleanup: bool,

    /// Interval between reaper sweeps
    pub cleanup_interval: Duration,

    /// Maximum number of expired entries removed per sweep
    pub reap_batch_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dimension: 1536,
            similarity_threshold: 0.95,
            // 1 hour
            default_ttl: Some(Duration::from_secs(3600)),
            max_entries: Some(10_000),
            enable_auto_cleanup: true,
            // 5 minutes
            cleanup_interval: Duration::from_secs(300),
            reap_batch_size: 1_000,
        }
    }
}

impl CacheConfig {
    /// Create a new builder for cache configuration
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.dimension == 0 {
            return Err(CacheError::ConfigError(
                "dimension must be greater than 0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(CacheError::ConfigError(
                "similarity_threshold must be between 0.0 and 1.0".to_string(),
            ));
        }

        if self.max_entries == Some(0) {
            return Err(CacheError::ConfigError(
                "max_entries must be greater than 0".to_string(),
            ));
        }

        if self.cleanup_interval.is_zero() {
            return Err(CacheError::ConfigError(
                "cleanup_interval must be greater than 0".to_string(),
            ));
        }

        if self.reap_batch_size == 0 {
            return Err(CacheError::ConfigError(
                "reap_batch_size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Build a configuration from `SEMANTIC_CACHE_*` environment variables
    ///
    /// Unset variables keep their defaults. Binaries are expected to call
    /// `dotenv::dotenv()` first.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(dimension) = env_var::<usize>("SEMANTIC_CACHE_DIMENSION")? {
            config.dimension = dimension;
        }
        if let Some(threshold) = env_var::<f32>("SEMANTIC_CACHE_THRESHOLD")? {
            config.similarity_threshold = threshold;
        }
        if let Some(ttl) = env_var::<i64>("SEMANTIC_CACHE_TTL_SECS")? {
            config.default_ttl = crate::cache::entry::ttl_from_seconds(Some(ttl));
        }
        if let Some(max) = env_var::<usize>("SEMANTIC_CACHE_MAX_ENTRIES")? {
            config.max_entries = if max == 0 { None } else { Some(max) };
        }
        if let Some(secs) = env_var::<u64>("SEMANTIC_CACHE_CLEANUP_INTERVAL_SECS")? {
            config.cleanup_interval = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }
}

fn env_var<T: FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| CacheError::ConfigError(format!("{} has invalid value {:?}", name, raw))),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(CacheError::ConfigError(format!("{}: {}", name, e))),
    }
}

/// Builder for cache configuration
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    dimension: Option<usize>,
    similarity_threshold: Option<f32>,
    default_ttl: Option<Option<Duration>>,
    max_entries: Option<Option<usize>>,
    enable_auto_cleanup: Option<bool>,
    cleanup_interval: Option<Duration>,
    reap_batch_size: Option<usize>,
}

impl CacheConfigBuilder {
    /// Set the embedding dimension
    pub fn dimension(mut self, dimension: usize) -> Self {
        self.dimension = Some(dimension);
        self
    }

    /// Set the default similarity threshold
    pub fn similarity_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = Some(threshold);
        self
    }

    /// Set default TTL for cache entries
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(Some(ttl));
        self
    }

    /// Keep entries without an explicit TTL forever
    pub fn no_default_ttl(mut self) -> Self {
        self.default_ttl = Some(None);
        self
    }

    /// Set maximum number of cache entries
    pub fn max_entries(mut self, max: usize) -> Self {
        self.max_entries = Some(Some(max));
        self
    }

    /// Disable the entry limit
    pub fn unbounded(mut self) -> Self {
        self.max_entries = Some(None);
        self
    }

    /// Enable or disable the background reaper
    pub fn enable_auto_cleanup(mut self, enable: bool) -> Self {
        self.enable_auto_cleanup = Some(enable);
        self
    }

    /// Set cleanup interval
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = Some(interval);
        self
    }

    /// Set the maximum number of entries removed per sweep
    pub fn reap_batch_size(mut self, size: usize) -> Self {
        self.reap_batch_size = Some(size);
        self
    }

    /// Build the cache configuration
    pub fn build(self) -> CacheConfig {
        let defaults = CacheConfig::default();

        CacheConfig {
            dimension: self.dimension.unwrap_or(defaults.dimension),
            similarity_threshold: self
                .similarity_threshold
                .unwrap_or(defaults.similarity_threshold),
            default_ttl: self.default_ttl.unwrap_or(defaults.default_ttl),
            max_entries: self.max_entries.unwrap_or(defaults.max_entries),
            enable_auto_cleanup: self
                .enable_auto_cleanup
                .unwrap_or(defaults.enable_auto_cleanup),
            cleanup_interval: self.cleanup_interval.unwrap_or(defaults.cleanup_interval),
            reap_batch_size: self.reap_batch_size.unwrap_or(defaults.reap_batch_size),
        }
    }
}

/// Preset configurations for common embedding providers
impl CacheConfig {
    /// Local Ollama deployment with mxbai-embed-large (1024 dimensions)
    pub fn ollama() -> Self {
        Self {
            dimension: 1024,
            similarity_threshold: 0.89,
            ..Default::default()
        }
    }

    /// OpenAI text-embedding-3-small (1536 dimensions)
    pub fn openai() -> Self {
        Self {
            dimension: 1536,
            similarity_threshold: 0.89,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.dimension, 1536);
        assert_eq!(config.default_ttl, Some(Duration::from_secs(3600)));
        assert_eq!(config.max_entries, Some(10_000));
        assert!(config.enable_auto_cleanup);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut invalid = CacheConfig::default();
        invalid.dimension = 0;
        assert!(matches!(invalid.validate(), Err(CacheError::ConfigError(_))));

        let mut invalid = CacheConfig::default();
        invalid.similarity_threshold = 1.5;
        assert!(invalid.validate().is_err());

        let mut invalid = CacheConfig::default();
        invalid.max_entries = Some(0);
        assert!(invalid.validate().is_err());

        let mut invalid = CacheConfig::default();
        invalid.cleanup_interval = Duration::ZERO;
        assert!(invalid.validate().is_err());
    }

    #[test]
    fn test_config_builder() {
        let config = CacheConfig::builder()
            .dimension(4)
            .similarity_threshold(0.9)
            .default_ttl(Duration::from_secs(600))
            .max_entries(5000)
            .enable_auto_cleanup(false)
            .build();

        assert_eq!(config.dimension, 4);
        assert_eq!(config.similarity_threshold, 0.9);
        assert_eq!(config.default_ttl, Some(Duration::from_secs(600)));
        assert_eq!(config.max_entries, Some(5000));
        assert!(!config.enable_auto_cleanup);
    }

    #[test]
    fn test_builder_unbounded_and_no_ttl() {
        let config = CacheConfig::builder().unbounded().no_default_ttl().build();
        assert_eq!(config.max_entries, None);
        assert_eq!(config.default_ttl, None);
    }

    #[test]
    fn test_preset_configs() {
        let ollama = CacheConfig::ollama();
        assert_eq!(ollama.dimension, 1024);
        assert_eq!(ollama.similarity_threshold, 0.89);

        let openai = CacheConfig::openai();
        assert_eq!(openai.dimension, 1536);
        assert!(openai.validate().is_ok());
    }

    #[test]
    fn test_from_env() {
        // single test touching these variables to avoid cross-test races
        std::env::set_var("SEMANTIC_CACHE_DIMENSION", "768");
        std::env::set_var("SEMANTIC_CACHE_THRESHOLD", "0.9");
        std::env::set_var("SEMANTIC_CACHE_TTL_SECS", "0");
        let config = CacheConfig::from_env().unwrap();
        assert_eq!(config.dimension, 768);
        assert_eq!(config.similarity_threshold, 0.9);
        assert_eq!(config.default_ttl, None);

        std::env::set_var("SEMANTIC_CACHE_DIMENSION", "lots");
        assert!(matches!(
            CacheConfig::from_env(),
            Err(CacheError::ConfigError(_))
        ));

        std::env::remove_var("SEMANTIC_CACHE_DIMENSION");
        std::env::remove_var("SEMANTIC_CACHE_THRESHOLD");
        std::env::remove_var("SEMANTIC_CACHE_TTL_SECS");
    }
}
