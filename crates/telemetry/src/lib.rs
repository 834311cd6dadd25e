//! Bin Telemetry
//!
//! Owns the live set of monitored waste bins: fill-level derivation,
//! bounded reading histories, the copy-on-write store, and history export.

mod clock;
mod export;
mod fill;
mod model;
mod rng;
mod seed;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use export::{export_file_name, export_history_csv, CSV_HEADER};
pub use fill::fill_level;
pub use model::{Bin, BinStatus, Reading, HISTORY_CAPACITY};
pub use rng::{ScriptedRng, TickRng};
pub use seed::{default_seeds, seed_bins, BinSeed, SEED_HISTORY_LEN};
pub use store::{Snapshot, TelemetryStore, TickConfig, MAX_LOCATION_LEN};

use thiserror::Error;

/// Store errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Bin not found: {0}")]
    NotFound(String),
    #[error("Invalid location: {0}")]
    InvalidLocation(String),
    #[error("Backend write failed: {0}")]
    Backend(String),
}

/// Export errors
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("CSV writer flush failed: {0}")]
    Flush(String),
    #[error("Encoding error: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}
