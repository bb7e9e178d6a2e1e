//! Background removal of expired entries
//!
//! Expiry is already enforced on every lookup; the reaper only reclaims the
//! memory held by expired entries. It runs one bounded sweep per tick and
//! stops when shut down or when the engine is dropped.

use crate::cache::engine::CacheEngine;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

/// Handle to a running reaper task
#[derive(Debug)]
pub struct ReaperHandle {
    shutdown_tx: mpsc::Sender<()>,
    running: Arc<AtomicBool>,
}

impl ReaperHandle {
    /// Signal the reaper to stop after its current sweep
    pub async fn shutdown(&self) {
        // receiver is gone once the task has exited on its own
        self.shutdown_tx.send(()).await.ok();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }
}

/// Periodic TTL sweeper for a [`CacheEngine`]
pub struct TtlReaper {
    interval: Duration,
}

impl TtlReaper {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Reaper using the engine's configured cleanup interval
    pub fn for_engine(engine: &CacheEngine) -> Self {
        Self::new(engine.config().cleanup_interval)
    }

    /// Spawn the sweep loop on the current tokio runtime
    ///
    /// The task holds only a weak reference, so dropping the last strong
    /// reference to the engine ends it.
    pub fn start(&self, engine: &Arc<CacheEngine>) -> ReaperHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let running = Arc::new(AtomicBool::new(true));
        let running_clone = Arc::clone(&running);

        let engine: Weak<CacheEngine> = Arc::downgrade(engine);
        let interval_duration = self.interval;

        info!(
            "Starting cache reaper task (interval: {:?})",
            interval_duration
        );

        tokio::spawn(async move {
            let mut ticker = interval(interval_duration);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let Some(engine) = engine.upgrade() else {
                            debug!("Cache dropped, reaper exiting");
                            break;
                        };
                        let event = engine.reap_batch().await;
                        if !event.is_empty() {
                            debug!("Reaper removed {} expired entries", event.count);
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }

            running_clone.store(false, Ordering::Relaxed);
            info!("Cache reaper stopped");
        });

        ReaperHandle {
            shutdown_tx,
            running,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::config::CacheConfig;
    use crate::cache::types::Payload;

    fn engine() -> Arc<CacheEngine> {
        Arc::new(
            CacheEngine::new(
                CacheConfig::builder()
                    .dimension(2)
                    .enable_auto_cleanup(false)
                    .build(),
            )
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_reaper_removes_expired_entries() {
        let engine = engine();
        engine
            .write("short", &[1.0, 0.0], Payload::from("s"), Some(1), &[])
            .await
            .unwrap();
        engine
            .write("forever", &[0.0, 1.0], Payload::from("f"), None, &[])
            .await
            .unwrap();

        let handle = TtlReaper::new(Duration::from_millis(50)).start(&engine);
        assert!(handle.is_running());

        tokio::time::sleep(Duration::from_millis(1300)).await;

        assert_eq!(engine.len(), 1);
        let stats = engine.stats();
        assert_eq!(stats.expirations, 1);
        assert_eq!(stats.total_entries, 1);

        handle.shutdown().await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!handle.is_running());
    }

    #[tokio::test]
    async fn test_reaper_stops_when_engine_dropped() {
        let engine = engine();
        let handle = TtlReaper::new(Duration::from_millis(10)).start(&engine);

        drop(engine);
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(!handle.is_running());
    }

    #[test]
    fn test_for_engine_uses_config_interval() {
        let engine = CacheEngine::new(
            CacheConfig::builder()
                .dimension(2)
                .cleanup_interval(Duration::from_secs(7))
                .build(),
        )
        .unwrap();
        assert_eq!(TtlReaper::for_engine(&engine).interval, Duration::from_secs(7));
    }
}
