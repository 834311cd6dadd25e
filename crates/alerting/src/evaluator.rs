//! Alert Evaluator Implementation

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use telemetry::{fill_level, Clock, Snapshot};
use tracing::{debug, info, warn};

use crate::notification::Notification;
use crate::settings::UserSettings;
use crate::AlertError;

/// Alert configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Cooldown period between repeat alerts for the same bin and threshold (seconds)
    pub cooldown_secs: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: 3600, // 1 hour
        }
    }
}

impl AlertConfig {
    /// Cooldown as a chrono duration. Fails if it exceeds chrono's range.
    pub fn cooldown(&self) -> Result<Duration, AlertError> {
        i64::try_from(self.cooldown_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .ok_or(AlertError::InvalidCooldown(self.cooldown_secs))
    }

    pub fn validate(&self) -> Result<(), AlertError> {
        self.cooldown().map(|_| ())
    }
}

/// Threshold a bin can cross
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdKind {
    Full,
    Empty,
}

/// Turns snapshots into notifications, one cooldown per bin and threshold
pub struct AlertEvaluator {
    config: AlertConfig,
    cooldown: Duration,
    clock: Arc<dyn Clock>,
    /// Last alert instant by (bin id, threshold)
    ledger: HashMap<(String, ThresholdKind), DateTime<Utc>>,
}

impl AlertEvaluator {
    pub fn new(config: AlertConfig, clock: Arc<dyn Clock>) -> Self {
        info!("Creating alert evaluator with config: {:?}", config);
        let cooldown = config.cooldown().unwrap_or_else(|e| {
            warn!("{}; suppressing repeats indefinitely", e);
            Duration::MAX
        });
        Self {
            config,
            cooldown,
            clock,
            ledger: HashMap::new(),
        }
    }

    /// Evaluate every bin in a snapshot against the current settings
    pub fn evaluate(&mut self, snapshot: &Snapshot, settings: &UserSettings) -> Vec<Notification> {
        if !settings.notifications_enabled {
            return Vec::new();
        }

        let now = self.clock.now();
        let mut fired = Vec::new();

        for bin in snapshot.bins() {
            let fill = fill_level(bin.height_cm, bin.current_distance_cm);

            if fill >= settings.full_threshold {
                let key = (bin.id.clone(), ThresholdKind::Full);
                if self.cooled_down(&key, now) {
                    info!("Bin {} at {}% crossed full threshold", bin.id, fill);
                    self.ledger.insert(key, now);
                    fired.push(Notification::bin_almost_full(bin, fill, now));
                } else {
                    debug!("Full alert for {} suppressed: in cooldown period", bin.id);
                }
            }

            // Reserved for a "recently emptied" signal; emits nothing today
            if fill <= settings.empty_threshold {
                debug!("Bin {} at {}% is at or below empty threshold", bin.id, fill);
            }
        }

        if !fired.is_empty() {
            metrics::counter!("binwatch_alerts_total").increment(fired.len() as u64);
        }
        fired
    }

    fn cooled_down(&self, key: &(String, ThresholdKind), now: DateTime<Utc>) -> bool {
        match self.ledger.get(key) {
            Some(last) => now - *last > self.cooldown,
            None => true,
        }
    }

    /// When a bin last alerted for a threshold
    pub fn last_alerted(&self, bin_id: &str, kind: ThresholdKind) -> Option<DateTime<Utc>> {
        self.ledger.get(&(bin_id.to_string(), kind)).copied()
    }

    /// Number of (bin, threshold) pairs that have ever alerted
    pub fn ledger_len(&self) -> usize {
        self.ledger.len()
    }
}
