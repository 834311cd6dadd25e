//! User Settings

use serde::{Deserialize, Serialize};

use crate::AlertError;

/// Unit used when displaying distances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceUnit {
    Cm,
    In,
}

impl DistanceUnit {
    /// Convert a centimetre value for display. Calculations always use cm.
    pub fn display_value(&self, cm: f64) -> f64 {
        match self {
            DistanceUnit::Cm => cm,
            DistanceUnit::In => cm / 2.54,
        }
    }

    pub fn suffix(&self) -> &'static str {
        match self {
            DistanceUnit::Cm => "cm",
            DistanceUnit::In => "in",
        }
    }
}

/// Dashboard preferences, owned by the application and passed to the
/// evaluator read-only on every pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserSettings {
    pub dark_mode: bool,
    pub unit: DistanceUnit,
    pub notifications_enabled: bool,
    /// Fill percentage at or above which a bin is reported full
    pub full_threshold: u8,
    /// Fill percentage at or below which a bin counts as empty
    pub empty_threshold: u8,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            dark_mode: false,
            unit: DistanceUnit::Cm,
            notifications_enabled: true,
            full_threshold: 80,
            empty_threshold: 20,
        }
    }
}

impl UserSettings {
    /// Check thresholds are valid percentages
    pub fn validate(&self) -> Result<(), AlertError> {
        for (field, value) in [
            ("fullThreshold", self.full_threshold),
            ("emptyThreshold", self.empty_threshold),
        ] {
            if value > 100 {
                return Err(AlertError::InvalidThreshold { field, value });
            }
        }
        Ok(())
    }
}
