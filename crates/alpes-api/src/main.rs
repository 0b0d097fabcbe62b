//! Alpes Partners API server entry point.

use std::error::Error;
use std::sync::Arc;

use alpes_core::clock::{Clock, SystemClock};
use tokio::sync::watch;
use tracing::{error, info};

use alpes_api::config::AppConfig;
use alpes_api::{bootstrap, routes, telemetry};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = AppConfig::from_env()?;
    let _telemetry = telemetry::init(&config.service_name)?;

    info!("Starting Alpes Partners API server");

    let store = bootstrap::connect_store(&config).await?;
    let broker = bootstrap::connect_broker(&config).await?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let app_state = bootstrap::wire_contexts(store, &broker, &clock, &config.service_name)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut consumer_tasks = Vec::new();
    if config.run_consumers {
        let consumers = [
            bootstrap::campaign_consumer(
                &app_state,
                Arc::clone(&broker),
                config.consumer_retry_delay,
            ),
            bootstrap::affiliate_consumer(&app_state, broker, config.consumer_retry_delay),
        ];
        for consumer in consumers {
            let shutdown_rx = shutdown_rx.clone();
            consumer_tasks.push(tokio::spawn(async move {
                if let Err(err) = consumer.run(shutdown_rx).await {
                    error!(
                        error = %err,
                        topic = %consumer.settings().topic,
                        "consumer stopped"
                    );
                }
            }));
        }
    }

    let addr = config.bind_addr()?;
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, routes::app(app_state))
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!(error = %err, "failed to listen for shutdown signal");
            }
        })
        .await?;

    info!("Shutting down");
    let _ = shutdown_tx.send(true);
    for task in consumer_tasks {
        task.await?;
    }

    Ok(())
}
