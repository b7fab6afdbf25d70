//! Periodic eviction of idle rate limit buckets.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::observability::metrics;
use crate::security::rate_limit::RateLimiter;

pub struct BucketSweeper {
    limiter: Arc<RateLimiter>,
    interval: Duration,
}

impl BucketSweeper {
    pub fn new(limiter: Arc<RateLimiter>, interval: Duration) -> Self {
        Self { limiter, interval }
    }

    /// Spawn [`run`](Self::run) on the current runtime.
    pub fn spawn(self, shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    /// Sweep on every tick until the shutdown signal fires (or its sender is dropped).
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval_secs = self.interval.as_secs_f64(),
            "Rate limit sweeper starting"
        );

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let evicted = self.limiter.sweep();
                    let remaining = self.limiter.bucket_count();
                    metrics::record_rate_buckets(remaining);
                    if evicted > 0 {
                        tracing::debug!(evicted, remaining, "Evicted idle rate limit buckets");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Rate limit sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
