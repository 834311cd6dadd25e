//! Subscription Hub Implementation

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use telemetry::{Snapshot, StoreError, TelemetryStore};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::driver::{DriverConfig, SimulationDriver};

/// Identifier handed out per subscription
pub type SubscriberId = u64;

struct Subscriber {
    id: SubscriberId,
    /// Single slot; an unread snapshot is replaced by a newer one
    tx: watch::Sender<Option<Snapshot>>,
    /// Version of the newest snapshot delivered
    last_version: u64,
}

/// Pub/sub fan-out of store snapshots.
///
/// The first subscription starts the simulation driver, which then runs for
/// the rest of the process.
pub struct SubscriptionHub {
    store: Arc<TelemetryStore>,
    driver: SimulationDriver,
    subscribers: Mutex<Vec<Subscriber>>,
    next_id: AtomicU64,
}

impl SubscriptionHub {
    /// Create a hub over a store
    pub fn new(store: Arc<TelemetryStore>, config: DriverConfig) -> Arc<Self> {
        Arc::new(Self {
            store,
            driver: SimulationDriver::new(config),
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        })
    }

    /// Register a subscriber.
    ///
    /// The current snapshot is queued before this returns, so the subscriber
    /// never waits for the next tick to see state.
    pub fn subscribe(self: &Arc<Self>) -> Subscription {
        let (tx, rx) = watch::channel(None);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let count = {
            let mut subscribers = self.subscribers.lock();
            // Under the lock so no publish can slip in between
            let snapshot = self.store.snapshot();
            let last_version = snapshot.version();
            tx.send_replace(Some(snapshot));
            subscribers.push(Subscriber {
                id,
                tx,
                last_version,
            });
            subscribers.len()
        };

        info!("Subscriber {} registered ({} active)", id, count);
        metrics::gauge!("binwatch_subscribers").set(count as f64);

        self.driver.start(Arc::clone(self));

        Subscription {
            id,
            rx,
            hub: Arc::downgrade(self),
        }
    }

    /// Remove a subscriber. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut subscribers = self.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);
        let removed = subscribers.len() != before;

        if removed {
            debug!("Subscriber {} removed", id);
            metrics::gauge!("binwatch_subscribers").set(subscribers.len() as f64);
        }
        removed
    }

    /// Deliver a snapshot to every subscriber that has not yet seen it or
    /// anything newer. Returns the number of deliveries.
    pub fn publish(&self, snapshot: Snapshot) -> usize {
        let mut subscribers = self.subscribers.lock();
        let mut delivered = 0;

        subscribers.retain_mut(|s| {
            if snapshot.version() <= s.last_version {
                return true;
            }
            if s.tx.is_closed() {
                debug!("Subscriber {} receiver closed", s.id);
                return false;
            }
            s.tx.send_replace(Some(snapshot.clone()));
            s.last_version = snapshot.version();
            delivered += 1;
            true
        });

        delivered
    }

    /// One driver step: advance the store and publish the result
    pub fn run_tick(&self) -> Snapshot {
        let updated = self.store.apply_tick();
        let snapshot = self.store.snapshot();
        let delivered = self.publish(snapshot.clone());

        debug!(
            "Tick {}: {} bins updated, {} deliveries",
            snapshot.version(),
            updated,
            delivered
        );
        metrics::counter!("binwatch_ticks_total").increment(1);
        snapshot
    }

    /// Update a bin's location and push the new state to subscribers
    pub async fn update_bin_location(&self, bin_id: &str, location: &str) -> Result<Snapshot, StoreError> {
        let snapshot = self.store.set_location(bin_id, location).await?;
        self.publish(snapshot.clone());
        Ok(snapshot)
    }

    /// Record a real sensor reading and push the new state to subscribers
    pub fn ingest(&self, bin_id: &str, distance_cm: f64) -> Result<Snapshot, StoreError> {
        let snapshot = self.store.ingest(bin_id, distance_cm)?;
        self.publish(snapshot.clone());
        Ok(snapshot)
    }

    /// Shared store
    pub fn store(&self) -> &Arc<TelemetryStore> {
        &self.store
    }

    /// Simulation driver
    pub fn driver(&self) -> &SimulationDriver {
        &self.driver
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

/// Receiving end of a subscription; unsubscribes on drop
pub struct Subscription {
    id: SubscriberId,
    rx: watch::Receiver<Option<Snapshot>>,
    hub: Weak<SubscriptionHub>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the newest undelivered snapshot. Snapshots published while
    /// the caller was busy collapse into the latest. `None` once unsubscribed.
    pub async fn recv(&mut self) -> Option<Snapshot> {
        self.rx.changed().await.ok()?;
        let snapshot = self.rx.borrow_and_update().clone();
        snapshot
    }

    /// Newest undelivered snapshot, if any
    pub fn try_recv(&mut self) -> Option<Snapshot> {
        match self.rx.has_changed() {
            Ok(true) => self.rx.borrow_and_update().clone(),
            _ => None,
        }
    }

    /// Stop further deliveries. Safe to call repeatedly.
    pub fn unsubscribe(&self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.unsubscribe(self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
