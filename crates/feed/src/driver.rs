//! Simulation Driver Implementation

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::hub::SubscriptionHub;

/// Configuration for the simulation driver
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Period between simulated sensor ticks (milliseconds)
    pub tick_period_ms: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            tick_period_ms: 2500,
        }
    }
}

impl DriverConfig {
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms.max(1))
    }
}

/// Periodic tick source for the store.
///
/// Started lazily by the first subscription. Once running, the timer task
/// keeps the hub alive and ticks for the remainder of the process, even
/// after every subscriber has gone.
pub struct SimulationDriver {
    config: DriverConfig,
    running: AtomicBool,
    ticks: Arc<AtomicU64>,
}

impl SimulationDriver {
    pub fn new(config: DriverConfig) -> Self {
        Self {
            config,
            running: AtomicBool::new(false),
            ticks: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Start ticking `hub`. No-op if already running; returns whether this
    /// call started the timer.
    pub fn start(&self, hub: Arc<SubscriptionHub>) -> bool {
        if self.running.swap(true, Ordering::AcqRel) {
            return false;
        }

        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                warn!("Simulation driver not started, no async runtime: {}", e);
                self.running.store(false, Ordering::Release);
                return false;
            }
        };

        let period = self.config.tick_period();
        let ticks = Arc::clone(&self.ticks);
        info!("Starting simulation driver ({:?} period)", period);

        handle.spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; subscribers already
            // received the current state on subscribe
            interval.tick().await;

            loop {
                interval.tick().await;
                hub.run_tick();
                ticks.fetch_add(1, Ordering::Relaxed);
            }
        });

        true
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Number of timer-driven ticks so far
    pub fn tick_count(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use telemetry::{default_seeds, seed_bins, ManualClock, TelemetryStore, TickConfig};

    fn hub() -> Arc<SubscriptionHub> {
        let now = Utc.with_ymd_and_hms(2024, 4, 2, 10, 0, 0).unwrap();
        let bins = seed_bins(&default_seeds(), now, &mut StdRng::seed_from_u64(11));
        let store = TelemetryStore::new(
            bins,
            Arc::new(ManualClock::new(now)),
            StdRng::seed_from_u64(12),
            TickConfig::default(),
        );
        SubscriptionHub::new(Arc::new(store), DriverConfig::default())
    }

    #[test]
    fn test_default_period() {
        assert_eq!(DriverConfig::default().tick_period(), Duration::from_millis(2500));
    }

    #[test]
    fn test_start_without_runtime_stays_stopped() {
        let hub = hub();
        assert!(!hub.driver().start(Arc::clone(&hub)));
        assert!(!hub.driver().is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_starts_on_first_subscription() {
        let hub = hub();
        assert!(!hub.driver().is_running());

        let _sub = hub.subscribe();
        assert!(hub.driver().is_running());

        // Idempotent
        let _second = hub.subscribe();
        assert!(!hub.driver().start(Arc::clone(&hub)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_on_period() {
        let hub = hub();
        let mut sub = hub.subscribe();
        let initial = sub.recv().await.unwrap();

        let started = tokio::time::Instant::now();
        let next = sub.recv().await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(2500));
        assert_eq!(next.version(), initial.version() + 1);

        let after = sub.recv().await.unwrap();
        assert_eq!(after.version(), initial.version() + 2);
        assert_eq!(hub.driver().tick_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keeps_running_without_subscribers() {
        let hub = hub();
        let sub = hub.subscribe();
        drop(sub);
        assert_eq!(hub.subscriber_count(), 0);

        tokio::time::sleep(Duration::from_millis(7600)).await;
        assert!(hub.driver().is_running());
        assert_eq!(hub.store().snapshot().version(), 3);
    }
}
