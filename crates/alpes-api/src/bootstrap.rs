//! Builds the adapters, publishers and command buses for one process.

use std::sync::Arc;
use std::time::Duration;

use alpes_affiliates::AFFILIATE_EVENTS_TOPIC;
use alpes_affiliates::application::command_handlers::AffiliateCommandHandlers;
use alpes_affiliates::domain::aggregates::Affiliate;
use alpes_broker::memory::InMemoryBroker;
use alpes_broker::nats::NatsBroker;
use alpes_campaigns::application::command_handlers::CampaignCommandHandlers;
use alpes_campaigns::domain::aggregates::Campaign;
use alpes_campaigns::infrastructure::choreography::{
    AffiliateEventsHandler, InfluencerEventsHandler,
};
use alpes_campaigns::{
    AFFILIATE_EVENTS_SUBSCRIPTION, CAMPAIGN_EVENTS_TOPIC, INFLUENCER_EVENTS_SUBSCRIPTION,
};
use alpes_core::aggregate::AggregateRoot;
use alpes_core::broker::MessageBroker;
use alpes_core::clock::Clock;
use alpes_core::command::CommandBus;
use alpes_core::consumer::{ConsumerSettings, ContextConsumer};
use alpes_core::error::DomainError;
use alpes_core::publisher::{IntegrationEventPublisher, TopicRouter};
use alpes_core::repository::AggregateStore;
use alpes_influencers::INFLUENCER_EVENTS_TOPIC;
use alpes_influencers::application::command_handlers::InfluencerCommandHandlers;
use alpes_influencers::domain::aggregates::Influencer;
use alpes_store::memory::InMemoryStore;
use alpes_store::postgres::PgStore;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::config::{AppConfig, BrokerBackend, StoreBackend};
use crate::error::AppError;
use crate::state::AppState;

/// Opens the configured snapshot store. The `PostgreSQL` store is migrated
/// before it is returned.
///
/// # Errors
///
/// Returns `AppError::Database` if the pool cannot connect and
/// `AppError::Store` if migrations fail.
pub async fn connect_store(config: &AppConfig) -> Result<Arc<dyn AggregateStore>, AppError> {
    match (config.store, config.database_url.as_deref()) {
        (StoreBackend::Memory, _) => {
            info!("using in-memory snapshot store");
            Ok(Arc::new(InMemoryStore::new()))
        }
        (StoreBackend::Postgres, Some(url)) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .connect(url)
                .await?;
            let store = PgStore::new(pool);
            store.run_migrations().await.map_err(AppError::Store)?;
            info!("using PostgreSQL snapshot store");
            Ok(Arc::new(store))
        }
        (StoreBackend::Postgres, None) => Err(AppError::Config(
            "DATABASE_URL must be set when STORE_BACKEND=postgres".into(),
        )),
    }
}

/// Opens the configured broker.
///
/// # Errors
///
/// Returns `AppError::Broker` if the NATS server is unreachable.
pub async fn connect_broker(config: &AppConfig) -> Result<Arc<dyn MessageBroker>, AppError> {
    match config.broker {
        BrokerBackend::Memory => {
            info!("using in-memory broker");
            Ok(Arc::new(InMemoryBroker::with_ack_wait(config.ack_wait)))
        }
        BrokerBackend::Nats => {
            let broker = NatsBroker::connect(&config.broker_url, config.ack_wait)
                .await
                .map_err(AppError::Broker)?;
            info!(url = %config.broker_url, "connected to NATS");
            Ok(Arc::new(broker))
        }
    }
}

/// Builds one publisher and one command bus per context.
///
/// # Errors
///
/// Returns `DomainError::DuplicateHandler` if a command is registered twice.
pub fn wire_contexts(
    store: Arc<dyn AggregateStore>,
    broker: &Arc<dyn MessageBroker>,
    clock: &Arc<dyn Clock>,
    service_name: &str,
) -> Result<AppState, DomainError> {
    let influencer_publisher = Arc::new(IntegrationEventPublisher::new(
        Arc::clone(broker),
        TopicRouter::new().route(Influencer::AGGREGATE_TYPE, INFLUENCER_EVENTS_TOPIC),
        format!("{service_name}-influencers"),
        Arc::clone(clock),
    ));
    let affiliate_publisher = Arc::new(IntegrationEventPublisher::new(
        Arc::clone(broker),
        TopicRouter::new().route(Affiliate::AGGREGATE_TYPE, AFFILIATE_EVENTS_TOPIC),
        format!("{service_name}-affiliates"),
        Arc::clone(clock),
    ));
    let campaign_publisher = Arc::new(IntegrationEventPublisher::new(
        Arc::clone(broker),
        TopicRouter::new().route(Campaign::AGGREGATE_TYPE, CAMPAIGN_EVENTS_TOPIC),
        format!("{service_name}-campaigns"),
        Arc::clone(clock),
    ));

    let influencer_handlers = Arc::new(InfluencerCommandHandlers::new(
        Arc::clone(&store),
        influencer_publisher,
        Arc::clone(clock),
    ));
    let affiliate_handlers = Arc::new(AffiliateCommandHandlers::new(
        Arc::clone(&store),
        affiliate_publisher,
        Arc::clone(clock),
    ));
    let campaign_handlers = Arc::new(CampaignCommandHandlers::new(
        Arc::clone(&store),
        campaign_publisher,
        Arc::clone(clock),
    ));

    let influencer_bus = influencer_handlers
        .register_all(CommandBus::builder())?
        .build();
    let affiliate_bus = affiliate_handlers.register_all(CommandBus::builder())?.build();
    let campaign_bus = campaign_handlers.register_all(CommandBus::builder())?.build();

    Ok(AppState::new(
        store,
        Arc::new(influencer_bus),
        Arc::new(affiliate_bus),
        Arc::new(campaign_bus),
        Arc::clone(clock),
    ))
}

/// Builds the Campaigns consumer of the influencer topic. Every worker
/// shares one subscription, so the broker spreads messages across them.
#[must_use]
pub fn campaign_consumer(
    state: &AppState,
    broker: Arc<dyn MessageBroker>,
    retry_delay: Duration,
) -> ContextConsumer {
    let handler = InfluencerEventsHandler::new(
        Arc::clone(&state.campaign_bus),
        Arc::clone(&state.clock),
    );
    ContextConsumer::new(
        broker,
        Arc::new(handler),
        ConsumerSettings::shared(INFLUENCER_EVENTS_TOPIC, INFLUENCER_EVENTS_SUBSCRIPTION)
            .with_retry_delay(retry_delay),
    )
}

/// Builds the Campaigns consumer of the affiliate topic, which releases
/// deactivated affiliates from running campaigns.
#[must_use]
pub fn affiliate_consumer(
    state: &AppState,
    broker: Arc<dyn MessageBroker>,
    retry_delay: Duration,
) -> ContextConsumer {
    let handler = AffiliateEventsHandler::new(Arc::clone(&state.campaign_bus));
    ContextConsumer::new(
        broker,
        Arc::new(handler),
        ConsumerSettings::shared(AFFILIATE_EVENTS_TOPIC, AFFILIATE_EVENTS_SUBSCRIPTION)
            .with_retry_delay(retry_delay),
    )
}

#[cfg(test)]
mod tests {
    use alpes_affiliates::domain::commands::RegisterAffiliate;
    use alpes_campaigns::domain::commands::{CreateCampaign, ReleaseAffiliate};
    use alpes_influencers::domain::commands::RegisterInfluencer;
    use alpes_test_support::{RecordingBroker, fixed_clock};
    use uuid::Uuid;

    use super::*;

    #[tokio::test]
    async fn test_wired_buses_publish_with_context_source() {
        // Arrange
        let recording = Arc::new(RecordingBroker::new());
        let broker: Arc<dyn MessageBroker> = recording.clone();
        let clock: Arc<dyn Clock> = Arc::new(fixed_clock());
        let state = wire_contexts(Arc::new(InMemoryStore::new()), &broker, &clock, "alpes")
            .unwrap();

        // Act
        state
            .influencer_bus
            .dispatch(RegisterInfluencer {
                correlation_id: Uuid::new_v4(),
                name: "Ana".to_owned(),
                email: "ana@x.com".to_owned(),
                phone: None,
                categories: vec!["fitness".to_owned()],
                description: "Fitness coach".to_owned(),
                bio: String::new(),
                website: None,
            })
            .await
            .unwrap();

        // Assert
        let published = recording.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, INFLUENCER_EVENTS_TOPIC);
        assert_eq!(published[0].1.source_service, "alpes-influencers");
        assert!(state.campaign_bus.is_registered::<CreateCampaign>());
        assert!(!state.influencer_bus.is_registered::<CreateCampaign>());
    }

    #[tokio::test]
    async fn test_affiliate_bus_publishes_to_affiliate_topic() {
        // Arrange
        let recording = Arc::new(RecordingBroker::new());
        let broker: Arc<dyn MessageBroker> = recording.clone();
        let clock: Arc<dyn Clock> = Arc::new(fixed_clock());
        let state = wire_contexts(Arc::new(InMemoryStore::new()), &broker, &clock, "alpes")
            .unwrap();

        // Act
        state
            .affiliate_bus
            .dispatch(RegisterAffiliate {
                correlation_id: Uuid::new_v4(),
                name: "Bob Deals".to_owned(),
                email: "bob@deals.com".to_owned(),
                phone: None,
                affiliate_type: "traditional".to_owned(),
                categories: vec!["cupones".to_owned()],
                description: "Coupon portal".to_owned(),
                website: None,
                social_links: std::collections::BTreeMap::new(),
            })
            .await
            .unwrap();

        // Assert
        let published = recording.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, AFFILIATE_EVENTS_TOPIC);
        assert_eq!(published[0].1.source_service, "alpes-affiliates");
        assert!(state.campaign_bus.is_registered::<ReleaseAffiliate>());
    }

    #[tokio::test]
    async fn test_memory_backends_need_no_external_services() {
        let config = AppConfig::from_lookup(|_| None).unwrap();

        let store = connect_store(&config).await;
        let broker = connect_broker(&config).await;

        assert!(store.is_ok());
        assert!(broker.is_ok());
    }

    #[test]
    fn test_campaign_consumer_shares_one_subscription() {
        let broker: Arc<dyn MessageBroker> = Arc::new(InMemoryBroker::new());
        let clock: Arc<dyn Clock> = Arc::new(fixed_clock());
        let state =
            wire_contexts(Arc::new(InMemoryStore::new()), &broker, &clock, "alpes").unwrap();

        let consumer = campaign_consumer(&state, broker, Duration::from_millis(10));

        let settings = consumer.settings();
        assert_eq!(settings.topic, INFLUENCER_EVENTS_TOPIC);
        assert_eq!(settings.subscription, INFLUENCER_EVENTS_SUBSCRIPTION);
    }

    #[test]
    fn test_affiliate_consumer_reads_affiliate_topic() {
        let broker: Arc<dyn MessageBroker> = Arc::new(InMemoryBroker::new());
        let clock: Arc<dyn Clock> = Arc::new(fixed_clock());
        let state =
            wire_contexts(Arc::new(InMemoryStore::new()), &broker, &clock, "alpes").unwrap();

        let consumer = affiliate_consumer(&state, broker, Duration::from_millis(10));

        assert_eq!(consumer.settings().topic, AFFILIATE_EVENTS_TOPIC);
        assert_eq!(consumer.settings().subscription, AFFILIATE_EVENTS_SUBSCRIPTION);
    }
}
