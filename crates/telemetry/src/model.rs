//! Bin and Reading Types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::fill::fill_level;

/// Maximum number of readings retained per bin
pub const HISTORY_CAPACITY: usize = 50;

/// One distance sample and the fill level derived from it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    pub timestamp: DateTime<Utc>,
    pub distance_cm: f64,
    pub fill_percentage: u8,
}

/// Operational state of a bin's sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BinStatus {
    Active,
    Offline,
    Maintenance,
}

/// A monitored bin with its bounded reading history (oldest first)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bin {
    pub id: String,
    pub name: String,
    pub location: String,
    /// Capacity, fixed at creation
    pub height_cm: f64,
    pub current_distance_cm: f64,
    pub last_updated: DateTime<Utc>,
    pub status: BinStatus,
    pub history: VecDeque<Reading>,
}

impl Bin {
    /// Current fill percentage
    pub fn fill_percentage(&self) -> u8 {
        fill_level(self.height_cm, self.current_distance_cm)
    }

    /// Most recent reading
    pub fn latest(&self) -> Option<&Reading> {
        self.history.back()
    }

    /// The last `count` readings, oldest first
    pub fn recent(&self, count: usize) -> impl Iterator<Item = &Reading> {
        self.history.iter().skip(self.history.len().saturating_sub(count))
    }

    /// Record a distance sample.
    ///
    /// The distance is clamped to `[0, height]` and rounded to whole
    /// centimetres; the fill is derived from the stored distance so every
    /// reading can be reproduced from its own fields. The oldest reading is
    /// evicted once the history exceeds [`HISTORY_CAPACITY`].
    pub fn record(&mut self, distance_cm: f64, at: DateTime<Utc>) -> &Reading {
        let upper = self.height_cm.max(0.0);
        let distance = if distance_cm.is_nan() {
            upper
        } else {
            distance_cm.clamp(0.0, upper).round()
        };

        self.history.push_back(Reading {
            timestamp: at,
            distance_cm: distance,
            fill_percentage: fill_level(self.height_cm, distance),
        });
        while self.history.len() > HISTORY_CAPACITY {
            self.history.pop_front();
        }

        self.current_distance_cm = distance;
        self.last_updated = at;

        // Just pushed
        &self.history[self.history.len() - 1]
    }
}
