//! Telemetry Store Implementation

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::model::Bin;
use crate::rng::TickRng;
use crate::StoreError;

/// Locations must be shorter than this many characters
pub const MAX_LOCATION_LEN: usize = 50;

/// Parameters of the simulated sensor feed
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TickConfig {
    /// Chance that a given bin reports on a given tick
    pub update_probability: f64,
    /// Largest drop in fill per tick (cm of distance gained)
    pub max_drain_cm: f64,
    /// Largest rise in fill per tick (cm of distance lost)
    pub max_fill_cm: f64,
    /// Chance that a reporting bin was just emptied
    pub reset_probability: f64,
    /// Distance of an emptied bin as a fraction of its height
    pub reset_distance_ratio: f64,
    /// Artificial backend round-trip for metadata writes (milliseconds)
    pub write_latency_ms: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            update_probability: 0.7,
            max_drain_cm: 2.0,
            max_fill_cm: 4.0,
            reset_probability: 0.02,
            reset_distance_ratio: 0.95,
            write_latency_ms: 500,
        }
    }
}

/// Immutable point-in-time copy of every bin
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    version: u64,
    bins: Arc<Vec<Bin>>,
}

impl Snapshot {
    /// Monotonic sequence number; larger is newer
    pub fn version(&self) -> u64 {
        self.version
    }

    /// All bins in seed order
    pub fn bins(&self) -> &[Bin] {
        &self.bins
    }

    /// Look up a bin by id
    pub fn get(&self, bin_id: &str) -> Option<&Bin> {
        self.bins.iter().find(|b| b.id == bin_id)
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }
}

/// Authoritative in-memory set of bins.
///
/// Every mutation clones the bin list, edits the copy and swaps it in while
/// holding the write lock, so a [`Snapshot`] handed out earlier never changes
/// and concurrent writers are serialized.
pub struct TelemetryStore {
    current: RwLock<Snapshot>,
    clock: Arc<dyn Clock>,
    rng: Mutex<Box<dyn TickRng>>,
    config: TickConfig,
}

impl TelemetryStore {
    /// Create a store over an initial bin population
    pub fn new(
        bins: Vec<Bin>,
        clock: Arc<dyn Clock>,
        rng: impl TickRng + 'static,
        config: TickConfig,
    ) -> Self {
        info!("Creating telemetry store with {} bins", bins.len());
        Self {
            current: RwLock::new(Snapshot {
                version: 0,
                bins: Arc::new(bins),
            }),
            clock,
            rng: Mutex::new(Box::new(rng)),
            config,
        }
    }

    /// Current state; safe to retain indefinitely
    pub fn snapshot(&self) -> Snapshot {
        self.current.read().clone()
    }

    /// The injected clock
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Simulated configuration
    pub fn config(&self) -> &TickConfig {
        &self.config
    }

    /// Run one simulated ingestion cycle.
    ///
    /// Each bin independently reports with `update_probability`. A reporting
    /// bin moves by a random delta in `[-max_drain_cm, +max_fill_cm)` of fill
    /// or, with `reset_probability`, jumps to `reset_distance_ratio` of its
    /// height. Bins that do not report are left untouched. Returns the number
    /// of bins that reported.
    pub fn apply_tick(&self) -> usize {
        let mut current = self.current.write();
        let mut rng = self.rng.lock();
        let now = self.clock.now();
        let config = &self.config;

        let mut bins: Vec<Bin> = current.bins.to_vec();
        let mut updated = 0;

        for bin in bins.iter_mut() {
            if rng.next_unit() >= config.update_probability {
                continue;
            }

            let span = config.max_drain_cm + config.max_fill_cm;
            let change = rng.next_unit() * span - config.max_drain_cm;
            // Distance shrinks as the bin fills
            let mut distance = (bin.current_distance_cm - change).clamp(0.0, bin.height_cm.max(0.0));

            if rng.next_unit() < config.reset_probability {
                debug!("Bin {} emptied", bin.id);
                distance = bin.height_cm * config.reset_distance_ratio;
            }

            let reading = bin.record(distance, now).clone();
            debug!(
                "Bin {} reading: {} cm ({}%)",
                bin.id, reading.distance_cm, reading.fill_percentage
            );
            updated += 1;
        }

        *current = Snapshot {
            version: current.version + 1,
            bins: Arc::new(bins),
        };
        updated
    }

    /// Record a reading from a real sensor feed
    pub fn ingest(&self, bin_id: &str, distance_cm: f64) -> Result<Snapshot, StoreError> {
        let now = self.clock.now();
        self.mutate_bin(bin_id, |bin| {
            bin.record(distance_cm, now);
        })
    }

    /// Replace a bin's location after the simulated backend round-trip.
    ///
    /// Only the `location` field changes; `last_updated` and the history are
    /// left as they were.
    pub async fn set_location(&self, bin_id: &str, location: &str) -> Result<Snapshot, StoreError> {
        if location.chars().count() >= MAX_LOCATION_LEN {
            return Err(StoreError::InvalidLocation(format!(
                "must be shorter than {} characters",
                MAX_LOCATION_LEN
            )));
        }

        tokio::time::sleep(Duration::from_millis(self.config.write_latency_ms)).await;

        let result = self.mutate_bin(bin_id, |bin| {
            bin.location = location.to_string();
        });
        match &result {
            Ok(_) => info!("Bin {} moved to {:?}", bin_id, location),
            Err(e) => warn!("Location update rejected: {}", e),
        }
        result
    }

    fn mutate_bin(&self, bin_id: &str, apply: impl FnOnce(&mut Bin)) -> Result<Snapshot, StoreError> {
        let mut current = self.current.write();

        let index = current
            .bins
            .iter()
            .position(|b| b.id == bin_id)
            .ok_or_else(|| StoreError::NotFound(bin_id.to_string()))?;

        let mut bins: Vec<Bin> = current.bins.to_vec();
        apply(&mut bins[index]);

        *current = Snapshot {
            version: current.version + 1,
            bins: Arc::new(bins),
        };
        Ok(current.clone())
    }
}
