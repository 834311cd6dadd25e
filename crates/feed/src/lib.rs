//! Telemetry Feed
//!
//! Fans store snapshots out to subscribers and drives the simulated sensor
//! ticks that stand in for a real ingestion feed.

mod driver;
mod hub;

pub use driver::{DriverConfig, SimulationDriver};
pub use hub::{SubscriberId, Subscription, SubscriptionHub};
