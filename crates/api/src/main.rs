//! Bin Telemetry Dashboard - Main Entry Point

use api::{init_logging, run_server, DashboardConfig};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = std::env::args().nth(1);
    let config = DashboardConfig::load(path.as_deref())?;
    init_logging(&config.server)?;

    info!("=== BinWatch v{} ===", env!("CARGO_PKG_VERSION"));
    info!(
        "Monitoring {} bins, simulation tick every {} ms",
        config.bins.len(),
        config.driver.tick_period_ms
    );

    run_server(config).await
}
