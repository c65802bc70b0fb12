//! Shopfront cache warm-up
//!
//! Connects to PostgreSQL and Redis, brings the schema up to date and scans
//! every cache family once so stale or missing entries are rebuilt before
//! traffic arrives.

use shopfront_db::{init_tracing, warm, ShopfrontConfig, StorefrontServices};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = ShopfrontConfig::from_env();
    init_tracing(&config.telemetry)?;

    let services = StorefrontServices::connect(&config).await?;
    let result = warm(services.storefront()).await;
    services.close();

    let report = result?;
    for (family, count) in &report.entities {
        tracing::info!(family = %family, count, "Warmed family");
    }
    Ok(())
}
