//! Initial Bin Population

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::model::{Bin, BinStatus};
use crate::rng::TickRng;

/// Hourly readings generated per bin at startup
pub const SEED_HISTORY_LEN: usize = 25;

/// Upper bound of the random fill used for seeded history (%)
const SEED_MAX_FILL: f64 = 80.0;

/// Static description of a bin to create at startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinSeed {
    pub id: String,
    pub name: String,
    pub location: String,
    pub height_cm: f64,
    /// How long ago the bin last reported (seconds)
    #[serde(default)]
    pub last_seen_secs_ago: i64,
    #[serde(default = "default_status")]
    pub status: BinStatus,
}

fn default_status() -> BinStatus {
    BinStatus::Active
}

impl BinSeed {
    fn new(id: &str, name: &str, location: &str, height_cm: f64, last_seen_secs_ago: i64) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            location: location.to_string(),
            height_cm,
            last_seen_secs_ago,
            status: BinStatus::Active,
        }
    }
}

/// The demo installation
pub fn default_seeds() -> Vec<BinSeed> {
    vec![
        BinSeed::new("bin_001", "Kitchen Main", "Building A, Floor 1", 100.0, 0),
        BinSeed::new("bin_002", "Office Paper", "Building A, Floor 2", 80.0, 3600),
        BinSeed::new("bin_003", "Cafeteria Organic", "Building B, Cafeteria", 120.0, 15),
    ]
}

/// Build bins with [`SEED_HISTORY_LEN`] hourly readings ending at `now`
pub fn seed_bins(seeds: &[BinSeed], now: DateTime<Utc>, rng: &mut impl TickRng) -> Vec<Bin> {
    seeds
        .iter()
        .map(|seed| {
            let mut bin = Bin {
                id: seed.id.clone(),
                name: seed.name.clone(),
                location: seed.location.clone(),
                height_cm: seed.height_cm,
                current_distance_cm: seed.height_cm,
                last_updated: now,
                status: seed.status,
                history: VecDeque::with_capacity(SEED_HISTORY_LEN),
            };

            for hours_ago in (0..SEED_HISTORY_LEN as i64).rev() {
                let fill = rng.next_unit() * SEED_MAX_FILL;
                let distance = seed.height_cm - seed.height_cm * (fill / 100.0);
                bin.record(distance, now - Duration::hours(hours_ago));
            }

            bin.last_updated = now - Duration::seconds(seed.last_seen_secs_ago);
            bin
        })
        .collect()
}
