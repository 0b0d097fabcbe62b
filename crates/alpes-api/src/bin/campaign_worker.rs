//! Campaigns worker: consumes influencer events to generate campaigns and
//! affiliate events to release deactivated affiliates.
//!
//! Several workers may run at once; they share one durable subscription.

use std::error::Error;
use std::sync::Arc;

use alpes_core::clock::{Clock, SystemClock};
use tokio::sync::watch;
use tracing::{error, info};

use alpes_api::bootstrap;
use alpes_api::config::AppConfig;
use alpes_api::telemetry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = AppConfig::from_env()?;
    let _telemetry = telemetry::init(&format!("{}-campaign-worker", config.service_name))?;

    let store = bootstrap::connect_store(&config).await?;
    let broker = bootstrap::connect_broker(&config).await?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let state = bootstrap::wire_contexts(store, &broker, &clock, &config.service_name)?;
    let influencer_consumer =
        bootstrap::campaign_consumer(&state, Arc::clone(&broker), config.consumer_retry_delay);
    let affiliate_consumer =
        bootstrap::affiliate_consumer(&state, broker, config.consumer_retry_delay);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for shutdown signal");
        }
        let _ = shutdown_tx.send(true);
    });

    for consumer in [&influencer_consumer, &affiliate_consumer] {
        info!(
            topic = %consumer.settings().topic,
            subscription = %consumer.settings().subscription,
            "campaign worker consuming"
        );
    }
    tokio::try_join!(
        influencer_consumer.run(shutdown_rx.clone()),
        affiliate_consumer.run(shutdown_rx),
    )?;
    info!("campaign worker stopped");

    Ok(())
}
