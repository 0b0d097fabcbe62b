//! Reactions to Influencers and Affiliates events.
//!
//! A registration fans out into one `CreateCampaign` per category, each
//! dispatched through the local command bus on its own. Business
//! rejections are logged and acknowledged; the message is left for
//! redelivery only when a category failed for a reason a retry can fix.
//! Redelivery is safe because campaign names are unique.
//!
//! A deactivated affiliate is released from every running campaign. A
//! redelivered deactivation finds nothing left to release.

use std::sync::Arc;

use alpes_core::broker::IntegrationMessage;
use alpes_core::clock::Clock;
use alpes_core::command::CommandBus;
use alpes_core::consumer::MessageHandler;
use alpes_core::error::DomainError;
use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::affiliate_events::{AffiliateEvent, DeactivatedAffiliate};
use super::influencer_events::{InfluencerEvent, RegisteredInfluencer};
use crate::application::command_handlers::collect_category_result;
use crate::domain::commands::{CampaignBatchOutcome, CreateCampaign, ReleaseAffiliate};
use crate::domain::templates;

/// Consumes the influencer topic on behalf of the Campaigns context.
pub struct InfluencerEventsHandler {
    bus: Arc<CommandBus>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for InfluencerEventsHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InfluencerEventsHandler")
            .field("bus", &self.bus)
            .finish_non_exhaustive()
    }
}

impl InfluencerEventsHandler {
    /// Creates a handler dispatching through `bus`.
    #[must_use]
    pub fn new(bus: Arc<CommandBus>, clock: Arc<dyn Clock>) -> Self {
        Self { bus, clock }
    }

    async fn on_registered(
        &self,
        event_id: Uuid,
        registered: RegisteredInfluencer,
    ) -> Result<(), DomainError> {
        if registered.categories.is_empty() {
            warn!(
                influencer_id = %registered.influencer_id,
                "registered influencer has no categories; no campaigns generated"
            );
            return Ok(());
        }

        let mut outcome = CampaignBatchOutcome::default();
        for parameters in templates::generate_for_influencer(
            registered.influencer_id,
            &registered.name,
            &registered.categories,
            self.clock.now(),
        ) {
            let category = parameters
                .origin
                .as_ref()
                .map(|origin| origin.category.clone())
                .unwrap_or_default();
            let result = self
                .bus
                .dispatch(CreateCampaign {
                    correlation_id: event_id,
                    parameters,
                })
                .await;
            collect_category_result(&mut outcome, category, result);
        }

        info!(
            influencer_id = %registered.influencer_id,
            created = outcome.created.len(),
            rejected = outcome.rejected.len(),
            "campaign generation finished"
        );
        match outcome.into_retryable_error() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl MessageHandler for InfluencerEventsHandler {
    #[instrument(skip(self, message), fields(event_id = %message.id, event_type = %message.event_type))]
    async fn on_message(&self, message: IntegrationMessage) -> Result<(), DomainError> {
        let event = match InfluencerEvent::from_message(&message) {
            Ok(event) => event,
            Err(err) => {
                warn!(error = %err, "discarding influencer event with unreadable payload");
                return Ok(());
            }
        };

        match event {
            InfluencerEvent::Registered(registered) => {
                self.on_registered(message.id, registered).await
            }
            InfluencerEvent::Activated(activated) => {
                info!(
                    influencer_id = %activated.influencer_id,
                    name = %activated.name,
                    "influencer activated"
                );
                Ok(())
            }
            InfluencerEvent::Deactivated(deactivated) => {
                info!(
                    influencer_id = %deactivated.influencer_id,
                    reason = %deactivated.reason,
                    "influencer deactivated"
                );
                Ok(())
            }
            InfluencerEvent::Other(event_type) => {
                debug!(%event_type, "ignoring influencer event");
                Ok(())
            }
        }
    }
}

/// Consumes the affiliate topic on behalf of the Campaigns context.
pub struct AffiliateEventsHandler {
    bus: Arc<CommandBus>,
}

impl std::fmt::Debug for AffiliateEventsHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AffiliateEventsHandler")
            .field("bus", &self.bus)
            .finish()
    }
}

impl AffiliateEventsHandler {
    /// Creates a handler dispatching through `bus`.
    #[must_use]
    pub fn new(bus: Arc<CommandBus>) -> Self {
        Self { bus }
    }

    async fn on_deactivated(
        &self,
        event_id: Uuid,
        deactivated: DeactivatedAffiliate,
    ) -> Result<(), DomainError> {
        let outcome = self
            .bus
            .dispatch(ReleaseAffiliate {
                correlation_id: event_id,
                affiliate_id: deactivated.affiliate_id.to_string(),
                reason: deactivated.reason,
            })
            .await?;

        info!(
            affiliate_id = %deactivated.affiliate_id,
            name = %deactivated.name,
            released = outcome.released.len(),
            "deactivated affiliate released from campaigns"
        );
        match outcome.into_retryable_error() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl MessageHandler for AffiliateEventsHandler {
    #[instrument(skip(self, message), fields(event_id = %message.id, event_type = %message.event_type))]
    async fn on_message(&self, message: IntegrationMessage) -> Result<(), DomainError> {
        match AffiliateEvent::from_message(&message) {
            Ok(AffiliateEvent::Deactivated(deactivated)) => {
                self.on_deactivated(message.id, deactivated).await
            }
            Ok(AffiliateEvent::Other(event_type)) => {
                debug!(%event_type, "ignoring affiliate event");
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "discarding affiliate event with unreadable payload");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use alpes_core::repository::AggregateStore;
    use alpes_store::memory::InMemoryStore;
    use alpes_test_support::{FailingStore, RecordingDispatcher, fixed_clock};
    use serde_json::json;

    use super::*;
    use crate::application::command_handlers::CampaignCommandHandlers;
    use crate::application::query_handlers::get_campaign_by_id;
    use crate::domain::commands::AssignAffiliate;
    use crate::domain::values::{CampaignStatus, CommissionType};
    use crate::infrastructure::affiliate_events::AFFILIATE_DEACTIVATED;
    use crate::infrastructure::influencer_events::{INFLUENCER_ACTIVATED, INFLUENCER_REGISTERED};

    fn bus(store: Arc<dyn AggregateStore>) -> Arc<CommandBus> {
        let handlers = Arc::new(CampaignCommandHandlers::new(
            store,
            Arc::new(RecordingDispatcher::new()),
            Arc::new(fixed_clock()),
        ));
        Arc::new(handlers.register_all(CommandBus::builder()).unwrap().build())
    }

    fn handler(store: Arc<dyn AggregateStore>) -> InfluencerEventsHandler {
        InfluencerEventsHandler::new(bus(store), Arc::new(fixed_clock()))
    }

    fn deactivated(affiliate_id: Uuid) -> IntegrationMessage {
        IntegrationMessage {
            id: Uuid::new_v4(),
            occurred_at_epoch_ms: 1_768_471_200_000,
            ingested_at_epoch_ms: 1_768_471_200_010,
            spec_version: "1.0".to_owned(),
            event_type: AFFILIATE_DEACTIVATED.to_owned(),
            content_type: "application/json".to_owned(),
            source_service: "alpes-partners-affiliates".to_owned(),
            data: json!({
                "affiliate_id": affiliate_id,
                "name": "Bob Deals",
                "reason": "contract ended",
                "deactivated_at": "2026-01-15T10:00:00Z"
            }),
        }
    }

    fn registered(categories: &[&str]) -> IntegrationMessage {
        IntegrationMessage {
            id: Uuid::new_v4(),
            occurred_at_epoch_ms: 1_768_471_200_000,
            ingested_at_epoch_ms: 1_768_471_200_010,
            spec_version: "1.0".to_owned(),
            event_type: INFLUENCER_REGISTERED.to_owned(),
            content_type: "application/json".to_owned(),
            source_service: "alpes-partners-influencers".to_owned(),
            data: json!({
                "influencer_id": Uuid::new_v4(),
                "name": "Ana",
                "email": "ana@x.com",
                "categories": categories,
                "platforms": [],
                "registered_at": "2026-01-15T10:00:00Z"
            }),
        }
    }

    #[tokio::test]
    async fn test_fitness_registration_creates_one_active_campaign() {
        // Arrange
        let store = InMemoryStore::new();
        let handler = handler(Arc::new(store.clone()));

        // Act
        handler.on_message(registered(&["fitness"])).await.unwrap();

        // Assert
        let records = store.records("campaign").unwrap();
        assert_eq!(records.len(), 1);
        let view = get_campaign_by_id(records[0].id, &store).await.unwrap();
        assert_eq!(view.name, "Fitness Revolution - Ana");
        assert_eq!(view.status, CampaignStatus::Active);
        assert_eq!(view.commission_type, CommissionType::Cpa);
        assert!((view.amount - 40.0).abs() < f64::EPSILON);
        assert_eq!(view.currency, "USD");
    }

    #[tokio::test]
    async fn test_redelivered_registration_does_not_duplicate_campaigns() {
        // Arrange
        let store = InMemoryStore::new();
        let handler = handler(Arc::new(store.clone()));
        let message = registered(&["moda", "tecnologia"]);

        // Act
        handler.on_message(message.clone()).await.unwrap();
        let redelivery = handler.on_message(message).await;

        // Assert
        assert!(redelivery.is_ok());
        assert_eq!(store.count("campaign").unwrap(), 2);
    }

    #[tokio::test]
    async fn test_store_outage_leaves_message_for_redelivery() {
        let handler = handler(Arc::new(FailingStore));

        let result = handler.on_message(registered(&["fitness", "moda"])).await;

        assert!(matches!(result, Err(DomainError::Infrastructure(_))));
    }

    #[tokio::test]
    async fn test_missing_handler_is_not_acknowledged() {
        let handler = InfluencerEventsHandler::new(
            Arc::new(CommandBus::builder().build()),
            Arc::new(fixed_clock()),
        );

        let result = handler.on_message(registered(&["fitness"])).await;

        assert!(matches!(result, Err(DomainError::UnregisteredCommand(_))));
    }

    #[tokio::test]
    async fn test_unreadable_and_unrelated_events_are_acknowledged() {
        // Arrange
        let store = InMemoryStore::new();
        let handler = handler(Arc::new(store.clone()));
        let mut unreadable = registered(&["fitness"]);
        unreadable.data = json!({ "influencer_id": "not-a-uuid" });
        let mut activated = registered(&[]);
        activated.event_type = INFLUENCER_ACTIVATED.to_owned();
        let mut unrelated = registered(&["fitness"]);
        unrelated.event_type = "InfluencerAudienceUpdated".to_owned();

        // Act
        let results = [
            handler.on_message(unreadable).await,
            handler.on_message(activated).await,
            handler.on_message(unrelated).await,
            handler.on_message(registered(&[])).await,
        ];

        // Assert
        assert!(results.iter().all(Result::is_ok));
        assert_eq!(store.count("campaign").unwrap(), 0);
    }

    #[tokio::test]
    async fn test_affiliate_deactivation_releases_it_from_active_campaigns() {
        // Arrange
        let store = InMemoryStore::new();
        let bus = bus(Arc::new(store.clone()));
        handler(Arc::new(store.clone()))
            .on_message(registered(&["fitness", "moda"]))
            .await
            .unwrap();
        let affiliate_id = Uuid::new_v4();
        let campaign_ids: Vec<Uuid> = store
            .records("campaign")
            .unwrap()
            .iter()
            .map(|record| record.id)
            .collect();
        for campaign_id in &campaign_ids {
            bus.dispatch(AssignAffiliate {
                correlation_id: Uuid::new_v4(),
                campaign_id: *campaign_id,
                affiliate_id: affiliate_id.to_string(),
                affiliate_name: "Bob Deals".to_owned(),
            })
            .await
            .unwrap();
        }
        let affiliates = AffiliateEventsHandler::new(bus);

        // Act
        affiliates.on_message(deactivated(affiliate_id)).await.unwrap();
        let redelivery = affiliates.on_message(deactivated(affiliate_id)).await;

        // Assert
        assert!(redelivery.is_ok());
        for campaign_id in campaign_ids {
            let view = get_campaign_by_id(campaign_id, &store).await.unwrap();
            assert!(view.affiliates.is_empty());
        }
    }

    #[tokio::test]
    async fn test_affiliate_release_failure_is_left_for_redelivery() {
        let affiliates = AffiliateEventsHandler::new(bus(Arc::new(FailingStore)));

        let result = affiliates.on_message(deactivated(Uuid::new_v4())).await;

        assert!(matches!(result, Err(DomainError::Infrastructure(_))));
    }

    #[tokio::test]
    async fn test_other_affiliate_events_are_acknowledged() {
        // Arrange
        let affiliates = AffiliateEventsHandler::new(bus(Arc::new(FailingStore)));
        let mut registered = deactivated(Uuid::new_v4());
        registered.event_type = "AffiliateRegistered".to_owned();
        let mut unreadable = deactivated(Uuid::new_v4());
        unreadable.data = json!({ "affiliate_id": 7 });

        // Act
        let results = [
            affiliates.on_message(registered).await,
            affiliates.on_message(unreadable).await,
        ];

        // Assert
        assert!(results.iter().all(Result::is_ok));
    }
}
