//! Alerting System
//!
//! Evaluates bin fill levels against user thresholds, suppresses repeats with
//! a per-bin cooldown, and keeps the in-session notification log.

mod evaluator;
mod notification;
mod settings;
mod worker;

pub use evaluator::{AlertConfig, AlertEvaluator, ThresholdKind};
pub use notification::{Notification, NotificationKind, NotificationLog};
pub use settings::{DistanceUnit, UserSettings};
pub use worker::AlertWorker;

use thiserror::Error;

/// Alerting errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AlertError {
    #[error("{field} must be between 0 and 100, got {value}")]
    InvalidThreshold { field: &'static str, value: u8 },
    #[error("cooldown of {0} seconds is out of range")]
    InvalidCooldown(u64),
}
