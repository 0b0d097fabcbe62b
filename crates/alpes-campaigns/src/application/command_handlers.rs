//! Command handlers for the Campaigns context.
//!
//! Same shape as every context: open a unit of work, load or create the
//! campaign, run the domain operation, queue the snapshot and commit.

use std::sync::Arc;

use alpes_core::aggregate::AggregateRoot;
use alpes_core::clock::Clock;
use alpes_core::command::{Command, CommandBusBuilder, CommandHandler, CommandOutcome};
use alpes_core::error::DomainError;
use alpes_core::publisher::EventDispatcher;
use alpes_core::repository::{AggregateRepository, AggregateStore};
use alpes_core::unit_of_work::UnitOfWork;
use async_trait::async_trait;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::aggregates::{Campaign, CampaignDraft};
use crate::domain::commands::{
    ActivateCampaign, AffiliateReleaseOutcome, AssignAffiliate, CampaignBatchOutcome,
    CancelCampaign, CreateCampaign, CreateCampaignByCategory, FinishCampaign, PauseCampaign,
    RecordCampaignPerformance, ReleaseAffiliate, RemoveAffiliate, ResumeCampaign,
    UpdateCampaignTerms,
};
use crate::domain::templates;
use crate::domain::values::{
    AffiliateCriteria, CampaignPeriod, CampaignStatus, CommissionTerms, PromotionalMaterial,
};

async fn commit(
    mut uow: UnitOfWork,
    repo: &AggregateRepository<Campaign>,
    campaign: &mut Campaign,
) -> Result<CommandOutcome, DomainError> {
    if campaign.pending_events().is_empty() {
        uow.rollback().await?;
        return Ok(CommandOutcome {
            aggregate_id: campaign.aggregate_id(),
            events: Vec::new(),
        });
    }

    uow.register_batch(repo.save_operation(campaign)?);
    let receipt = uow.commit().await?;
    campaign.clear_events();

    Ok(CommandOutcome {
        aggregate_id: campaign.aggregate_id(),
        events: receipt.events,
    })
}

async fn mutate<F>(
    campaign_id: Uuid,
    store: &dyn AggregateStore,
    dispatcher: Arc<dyn EventDispatcher>,
    mutation: F,
) -> Result<CommandOutcome, DomainError>
where
    F: FnOnce(&mut Campaign) -> Result<(), DomainError> + Send,
{
    let repo = AggregateRepository::<Campaign>::new();
    let mut uow = UnitOfWork::begin(store, dispatcher).await?;
    let mut campaign = repo.get(uow.session()?, campaign_id).await?;

    mutation(&mut campaign)?;

    commit(uow, &repo, &mut campaign).await
}

/// Handles the `CreateCampaign` command.
///
/// A taken name is rejected with `DomainError::BusinessRule`, which makes
/// redelivered creation requests harmless. With `auto_activate` set, a
/// failed activation is logged and the campaign is stored in `DRAFT`.
///
/// # Errors
///
/// Returns `DomainError::Validation` for malformed terms, period or name,
/// `DomainError::BusinessRule` if the name is already taken.
pub async fn handle_create_campaign(
    command: &CreateCampaign,
    clock: &dyn Clock,
    store: &dyn AggregateStore,
    dispatcher: Arc<dyn EventDispatcher>,
) -> Result<CommandOutcome, DomainError> {
    let params = &command.parameters;
    let terms = CommissionTerms::new(
        params.commission_type,
        params.amount,
        &params.currency,
        params.commission_description.as_deref(),
    )?;
    let period = CampaignPeriod::new(params.start, params.end)?;
    let material_title = if params.material_title.trim().is_empty() {
        format!("Material for {}", params.name.trim())
    } else {
        params.material_title.trim().to_owned()
    };
    let draft = CampaignDraft {
        name: params.name.clone(),
        description: params.description.clone(),
        terms,
        period,
        material: PromotionalMaterial {
            title: material_title,
            description: params.material_description.trim().to_owned(),
            links: params.material_links.clone(),
            images: params.material_images.clone(),
            banners: params.material_banners.clone(),
        },
        criteria: AffiliateCriteria::new(
            &params.allowed_affiliate_types,
            &params.target_categories,
            &params.allowed_countries,
            params.min_followers,
            params.min_engagement_rate,
        ),
        origin: params.origin.clone(),
    };

    let repo = AggregateRepository::<Campaign>::new();
    let mut uow = UnitOfWork::begin(store, dispatcher).await?;
    if repo
        .exists_by_unique_key(uow.session()?, &Campaign::name_key(&params.name))
        .await?
    {
        return Err(DomainError::BusinessRule(format!(
            "a campaign named '{}' already exists",
            params.name.trim()
        )));
    }

    let mut campaign = Campaign::create(Uuid::new_v4(), draft, command.correlation_id, clock)?;
    if params.auto_activate {
        if let Err(err) = campaign.activate(command.correlation_id, clock) {
            warn!(
                campaign_id = %campaign.aggregate_id(),
                error = %err,
                "campaign created but not activated"
            );
        }
    }
    let status = campaign.status();
    let outcome = commit(uow, &repo, &mut campaign).await?;

    info!(
        campaign_id = %outcome.aggregate_id,
        name = campaign.name(),
        %status,
        "campaign created"
    );
    Ok(outcome)
}

/// Folds one category's creation result into `outcome`. Failures are
/// logged and kept so the remaining categories still run.
pub(crate) fn collect_category_result(
    outcome: &mut CampaignBatchOutcome,
    category: String,
    result: Result<CommandOutcome, DomainError>,
) {
    match result {
        Ok(created) => outcome.created.push((category, created)),
        Err(err @ DomainError::BusinessRule(_)) => {
            info!(%category, reason = %err, "campaign not created for category");
            outcome.rejected.push((category, err));
        }
        Err(err) => {
            error!(%category, error = %err, "campaign creation failed for category");
            outcome.rejected.push((category, err));
        }
    }
}

/// Handles the `CreateCampaignByCategory` command: one campaign per
/// category, each created in its own unit of work.
///
/// # Errors
///
/// Never fails as a whole; per-category failures are reported in the
/// returned outcome.
pub async fn handle_create_campaign_by_category(
    command: &CreateCampaignByCategory,
    clock: &dyn Clock,
    store: &dyn AggregateStore,
    dispatcher: Arc<dyn EventDispatcher>,
) -> Result<CampaignBatchOutcome, DomainError> {
    let mut outcome = CampaignBatchOutcome::default();
    for parameters in templates::generate_for_influencer(
        command.influencer_id,
        &command.influencer_name,
        &command.categories,
        clock.now(),
    ) {
        let category = parameters
            .origin
            .as_ref()
            .map(|origin| origin.category.clone())
            .unwrap_or_default();
        let create = CreateCampaign {
            correlation_id: command.correlation_id,
            parameters,
        };
        let result = handle_create_campaign(&create, clock, store, Arc::clone(&dispatcher)).await;
        collect_category_result(&mut outcome, category, result);
    }
    Ok(outcome)
}

/// Handles the `ActivateCampaign` command.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound`, `DomainError::InvalidState` or
/// `DomainError::BusinessRule` (outside the period).
pub async fn handle_activate_campaign(
    command: &ActivateCampaign,
    clock: &dyn Clock,
    store: &dyn AggregateStore,
    dispatcher: Arc<dyn EventDispatcher>,
) -> Result<CommandOutcome, DomainError> {
    mutate(command.campaign_id, store, dispatcher, |campaign| {
        campaign.activate(command.correlation_id, clock)
    })
    .await
}

/// Handles the `PauseCampaign` command.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound`, `DomainError::BusinessRule`
/// (blank reason) or `DomainError::InvalidState`.
pub async fn handle_pause_campaign(
    command: &PauseCampaign,
    clock: &dyn Clock,
    store: &dyn AggregateStore,
    dispatcher: Arc<dyn EventDispatcher>,
) -> Result<CommandOutcome, DomainError> {
    mutate(command.campaign_id, store, dispatcher, |campaign| {
        campaign.pause(&command.reason, command.correlation_id, clock)
    })
    .await
}

/// Handles the `ResumeCampaign` command.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound`, `DomainError::InvalidState` or
/// `DomainError::BusinessRule` (outside the period).
pub async fn handle_resume_campaign(
    command: &ResumeCampaign,
    clock: &dyn Clock,
    store: &dyn AggregateStore,
    dispatcher: Arc<dyn EventDispatcher>,
) -> Result<CommandOutcome, DomainError> {
    mutate(command.campaign_id, store, dispatcher, |campaign| {
        campaign.resume(command.correlation_id, clock)
    })
    .await
}

/// Handles the `FinishCampaign` command.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` or `DomainError::InvalidState`.
pub async fn handle_finish_campaign(
    command: &FinishCampaign,
    clock: &dyn Clock,
    store: &dyn AggregateStore,
    dispatcher: Arc<dyn EventDispatcher>,
) -> Result<CommandOutcome, DomainError> {
    mutate(command.campaign_id, store, dispatcher, |campaign| {
        campaign.finish(command.correlation_id, clock)
    })
    .await
}

/// Handles the `CancelCampaign` command.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound`, `DomainError::BusinessRule`
/// (blank reason) or `DomainError::InvalidState`.
pub async fn handle_cancel_campaign(
    command: &CancelCampaign,
    clock: &dyn Clock,
    store: &dyn AggregateStore,
    dispatcher: Arc<dyn EventDispatcher>,
) -> Result<CommandOutcome, DomainError> {
    mutate(command.campaign_id, store, dispatcher, |campaign| {
        campaign.cancel(&command.reason, command.correlation_id, clock)
    })
    .await
}

/// Handles the `AssignAffiliate` command.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound`, `DomainError::InvalidState`
/// (campaign not active) or `DomainError::BusinessRule` (already assigned).
pub async fn handle_assign_affiliate(
    command: &AssignAffiliate,
    clock: &dyn Clock,
    store: &dyn AggregateStore,
    dispatcher: Arc<dyn EventDispatcher>,
) -> Result<CommandOutcome, DomainError> {
    mutate(command.campaign_id, store, dispatcher, |campaign| {
        campaign.assign_affiliate(
            &command.affiliate_id,
            &command.affiliate_name,
            command.correlation_id,
            clock,
        )
    })
    .await
}

/// Handles the `RemoveAffiliate` command.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` or `DomainError::BusinessRule`
/// (not assigned).
pub async fn handle_remove_affiliate(
    command: &RemoveAffiliate,
    clock: &dyn Clock,
    store: &dyn AggregateStore,
    dispatcher: Arc<dyn EventDispatcher>,
) -> Result<CommandOutcome, DomainError> {
    mutate(command.campaign_id, store, dispatcher, |campaign| {
        campaign.remove_affiliate(&command.affiliate_id, command.correlation_id, clock)
    })
    .await
}

/// Handles the `ReleaseAffiliate` command: the affiliate is removed from
/// every active or paused campaign listing it, each in its own unit of
/// work. Finished, cancelled and draft campaigns keep their history.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if the campaigns cannot be listed.
/// Per-campaign failures are reported in the returned outcome.
pub async fn handle_release_affiliate(
    command: &ReleaseAffiliate,
    clock: &dyn Clock,
    store: &dyn AggregateStore,
    dispatcher: Arc<dyn EventDispatcher>,
) -> Result<AffiliateReleaseOutcome, DomainError> {
    let affiliate_id = command.affiliate_id.trim();
    let mut session = store.begin().await?;
    let campaigns = AggregateRepository::<Campaign>::new()
        .list(session.as_mut())
        .await;
    session.rollback().await?;

    let mut outcome = AffiliateReleaseOutcome::default();
    for campaign in campaigns?.iter().filter(|campaign| {
        matches!(campaign.status(), CampaignStatus::Active | CampaignStatus::Paused)
            && campaign.affiliates().contains(affiliate_id)
    }) {
        let campaign_id = campaign.aggregate_id();
        let remove = RemoveAffiliate {
            correlation_id: command.correlation_id,
            campaign_id,
            affiliate_id: affiliate_id.to_owned(),
        };
        match handle_remove_affiliate(&remove, clock, store, Arc::clone(&dispatcher)).await {
            Ok(removed) => outcome.released.push(removed),
            Err(err) => {
                warn!(%campaign_id, %affiliate_id, error = %err, "affiliate not released from campaign");
                outcome.failed.push((campaign_id, err));
            }
        }
    }

    info!(
        %affiliate_id,
        reason = %command.reason,
        released = outcome.released.len(),
        failed = outcome.failed.len(),
        "affiliate released from campaigns"
    );
    Ok(outcome)
}

/// Handles the `UpdateCampaignTerms` command. Nothing is written when the
/// terms do not change.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound`, `DomainError::InvalidState`
/// (finished) or `DomainError::Validation` (non-positive amount).
pub async fn handle_update_campaign_terms(
    command: &UpdateCampaignTerms,
    clock: &dyn Clock,
    store: &dyn AggregateStore,
    dispatcher: Arc<dyn EventDispatcher>,
) -> Result<CommandOutcome, DomainError> {
    mutate(command.campaign_id, store, dispatcher, |campaign| {
        campaign.update_terms(
            command.amount,
            command.commission_description.as_deref(),
            command.correlation_id,
            clock,
        )
    })
    .await
}

/// Handles the `RecordCampaignPerformance` command.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound`, `DomainError::InvalidState`
/// (cancelled) or `DomainError::Validation` (negative figures).
pub async fn handle_record_campaign_performance(
    command: &RecordCampaignPerformance,
    clock: &dyn Clock,
    store: &dyn AggregateStore,
    dispatcher: Arc<dyn EventDispatcher>,
) -> Result<CommandOutcome, DomainError> {
    mutate(command.campaign_id, store, dispatcher, |campaign| {
        campaign.record_performance(
            command.clicks,
            command.conversions,
            command.spend,
            command.revenue,
            command.correlation_id,
            clock,
        )
    })
    .await
}

/// Dependencies shared by every Campaigns command handler.
#[derive(Clone)]
pub struct CampaignCommandHandlers {
    store: Arc<dyn AggregateStore>,
    dispatcher: Arc<dyn EventDispatcher>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for CampaignCommandHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CampaignCommandHandlers")
            .finish_non_exhaustive()
    }
}

impl CampaignCommandHandlers {
    /// Creates the handler set.
    #[must_use]
    pub fn new(
        store: Arc<dyn AggregateStore>,
        dispatcher: Arc<dyn EventDispatcher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            dispatcher,
            clock,
        }
    }

    fn handler<C: Command>(self: &Arc<Self>) -> Arc<dyn CommandHandler<C>>
    where
        Self: CommandHandler<C>,
    {
        let handler: Arc<Self> = Arc::clone(self);
        handler
    }

    /// Registers a handler for every Campaigns command.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::DuplicateHandler` if a command is already
    /// registered on `builder`.
    pub fn register_all(
        self: &Arc<Self>,
        builder: CommandBusBuilder,
    ) -> Result<CommandBusBuilder, DomainError> {
        builder
            .register::<CreateCampaign>(self.handler())?
            .register::<CreateCampaignByCategory>(self.handler())?
            .register::<ActivateCampaign>(self.handler())?
            .register::<PauseCampaign>(self.handler())?
            .register::<ResumeCampaign>(self.handler())?
            .register::<FinishCampaign>(self.handler())?
            .register::<CancelCampaign>(self.handler())?
            .register::<AssignAffiliate>(self.handler())?
            .register::<RemoveAffiliate>(self.handler())?
            .register::<ReleaseAffiliate>(self.handler())?
            .register::<UpdateCampaignTerms>(self.handler())?
            .register::<RecordCampaignPerformance>(self.handler())
    }
}

macro_rules! delegate_handler {
    ($command:ty, $handler:ident) => {
        #[async_trait]
        impl CommandHandler<$command> for CampaignCommandHandlers {
            async fn handle(
                &self,
                command: $command,
            ) -> Result<<$command as Command>::Output, DomainError> {
                $handler(
                    &command,
                    self.clock.as_ref(),
                    self.store.as_ref(),
                    Arc::clone(&self.dispatcher),
                )
                .await
            }
        }
    };
}

delegate_handler!(CreateCampaign, handle_create_campaign);
delegate_handler!(CreateCampaignByCategory, handle_create_campaign_by_category);
delegate_handler!(ActivateCampaign, handle_activate_campaign);
delegate_handler!(PauseCampaign, handle_pause_campaign);
delegate_handler!(ResumeCampaign, handle_resume_campaign);
delegate_handler!(FinishCampaign, handle_finish_campaign);
delegate_handler!(CancelCampaign, handle_cancel_campaign);
delegate_handler!(AssignAffiliate, handle_assign_affiliate);
delegate_handler!(RemoveAffiliate, handle_remove_affiliate);
delegate_handler!(ReleaseAffiliate, handle_release_affiliate);
delegate_handler!(UpdateCampaignTerms, handle_update_campaign_terms);
delegate_handler!(RecordCampaignPerformance, handle_record_campaign_performance);

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use alpes_core::command::CommandBus;
    use alpes_core::error::DomainError;
    use alpes_core::repository::AggregateStore;
    use alpes_store::memory::InMemoryStore;
    use alpes_test_support::{FailingStore, FixedClock, RecordingDispatcher, fixed_clock};
    use chrono::Duration;
    use uuid::Uuid;

    use super::*;
    use crate::domain::commands::CampaignParameters;
    use crate::domain::events::{
        AFFILIATE_ASSIGNED_EVENT_TYPE, CAMPAIGN_ACTIVATED_EVENT_TYPE, CAMPAIGN_CREATED_EVENT_TYPE,
    };
    use crate::domain::values::{CampaignStatus, CommissionType};

    fn parameters(name: &str, clock: &FixedClock, auto_activate: bool) -> CampaignParameters {
        CampaignParameters {
            name: name.to_owned(),
            description: "Spring promotion".to_owned(),
            commission_type: CommissionType::Cpl,
            amount: 12.5,
            currency: "usd".to_owned(),
            commission_description: None,
            start: clock.0,
            end: Some(clock.0 + Duration::days(30)),
            material_title: String::new(),
            material_description: String::new(),
            material_links: vec![],
            material_images: vec![],
            material_banners: vec![],
            target_categories: vec!["moda".to_owned()],
            allowed_affiliate_types: vec![],
            allowed_countries: vec![],
            min_followers: None,
            min_engagement_rate: None,
            auto_activate,
            origin: None,
        }
    }

    fn create(name: &str, clock: &FixedClock, auto_activate: bool) -> CreateCampaign {
        CreateCampaign {
            correlation_id: Uuid::new_v4(),
            parameters: parameters(name, clock, auto_activate),
        }
    }

    async fn load(store: &InMemoryStore, id: Uuid) -> Campaign {
        let mut session = store.begin().await.unwrap();
        AggregateRepository::<Campaign>::new()
            .get(session.as_mut(), id)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_handle_create_campaign_persists_draft() {
        // Arrange
        let clock = fixed_clock();
        let store = InMemoryStore::new();
        let dispatcher = Arc::new(RecordingDispatcher::new());

        // Act
        let outcome = handle_create_campaign(
            &create("Spring Sale", &clock, false),
            &clock,
            &store,
            dispatcher.clone(),
        )
        .await
        .unwrap();

        // Assert
        assert_eq!(dispatcher.event_types(), vec![CAMPAIGN_CREATED_EVENT_TYPE]);
        let campaign = load(&store, outcome.aggregate_id).await;
        assert_eq!(campaign.status(), CampaignStatus::Draft);
        assert_eq!(campaign.terms().currency(), "USD");
        assert_eq!(campaign.material().title, "Material for Spring Sale");
    }

    #[tokio::test]
    async fn test_handle_create_campaign_auto_activates_within_period() {
        // Arrange
        let clock = fixed_clock();
        let store = InMemoryStore::new();
        let dispatcher = Arc::new(RecordingDispatcher::new());

        // Act
        let outcome = handle_create_campaign(
            &create("Spring Sale", &clock, true),
            &clock,
            &store,
            dispatcher.clone(),
        )
        .await
        .unwrap();

        // Assert
        assert_eq!(
            dispatcher.event_types(),
            vec![CAMPAIGN_CREATED_EVENT_TYPE, CAMPAIGN_ACTIVATED_EVENT_TYPE]
        );
        let campaign = load(&store, outcome.aggregate_id).await;
        assert_eq!(campaign.status(), CampaignStatus::Active);
        assert_eq!(campaign.version(), 2);
    }

    #[tokio::test]
    async fn test_failed_auto_activation_keeps_draft() {
        // Arrange
        let clock = fixed_clock();
        let store = InMemoryStore::new();
        let mut command = create("Summer Sale", &clock, true);
        command.parameters.start = clock.0 + Duration::days(10);
        command.parameters.end = Some(clock.0 + Duration::days(40));

        // Act
        let outcome = handle_create_campaign(
            &command,
            &clock,
            &store,
            Arc::new(RecordingDispatcher::new()),
        )
        .await
        .unwrap();

        // Assert
        let campaign = load(&store, outcome.aggregate_id).await;
        assert_eq!(campaign.status(), CampaignStatus::Draft);
        assert_eq!(outcome.events.len(), 1);
    }

    #[tokio::test]
    async fn test_handle_create_campaign_rejects_taken_name() {
        // Arrange
        let clock = fixed_clock();
        let store = InMemoryStore::new();
        let dispatcher = Arc::new(RecordingDispatcher::new());
        handle_create_campaign(&create("Spring Sale", &clock, false), &clock, &store, dispatcher.clone())
            .await
            .unwrap();

        // Act
        let result = handle_create_campaign(
            &create(" spring sale ", &clock, false),
            &clock,
            &store,
            dispatcher.clone(),
        )
        .await;

        // Assert
        assert!(matches!(result, Err(DomainError::BusinessRule(_))));
        assert_eq!(store.count("campaign").unwrap(), 1);
        assert_eq!(dispatcher.dispatched().len(), 1);
    }

    #[tokio::test]
    async fn test_handle_create_campaign_rejects_bad_amount_before_opening_a_transaction() {
        let clock = fixed_clock();
        let mut command = create("Spring Sale", &clock, false);
        command.parameters.amount = -1.0;

        let result = handle_create_campaign(
            &command,
            &clock,
            &FailingStore,
            Arc::new(RecordingDispatcher::new()),
        )
        .await;

        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn test_create_by_category_isolates_failures() {
        // Arrange
        let clock = fixed_clock();
        let store = InMemoryStore::new();
        let dispatcher = Arc::new(RecordingDispatcher::new());
        let influencer_id = Uuid::new_v4();
        handle_create_campaign(
            &create("Fashion Forward - Ana", &clock, false),
            &clock,
            &store,
            dispatcher.clone(),
        )
        .await
        .unwrap();
        let command = CreateCampaignByCategory {
            correlation_id: Uuid::new_v4(),
            influencer_id,
            influencer_name: "Ana".to_owned(),
            categories: vec!["moda".to_owned(), "tecnologia".to_owned()],
        };

        // Act
        let outcome = handle_create_campaign_by_category(&command, &clock, &store, dispatcher)
            .await
            .unwrap();

        // Assert
        assert_eq!(outcome.created.len(), 1);
        assert_eq!(outcome.created[0].0, "tecnologia");
        assert_eq!(outcome.rejected.len(), 1);
        assert_eq!(outcome.rejected[0].0, "moda");
        assert!(outcome.into_retryable_error().is_none());
        assert_eq!(store.count("campaign").unwrap(), 2);
    }

    #[tokio::test]
    async fn test_create_by_category_reports_retryable_failures() {
        let command = CreateCampaignByCategory {
            correlation_id: Uuid::new_v4(),
            influencer_id: Uuid::new_v4(),
            influencer_name: "Ana".to_owned(),
            categories: vec!["fitness".to_owned()],
        };

        let outcome = handle_create_campaign_by_category(
            &command,
            &fixed_clock(),
            &FailingStore,
            Arc::new(RecordingDispatcher::new()),
        )
        .await
        .unwrap();

        assert!(outcome.created.is_empty());
        assert!(matches!(
            outcome.into_retryable_error(),
            Some(DomainError::Infrastructure(_))
        ));
    }

    #[tokio::test]
    async fn test_each_mutation_bumps_stored_version_by_one() {
        // Arrange
        let clock = fixed_clock();
        let store = InMemoryStore::new();
        let dispatcher = Arc::new(RecordingDispatcher::new());
        let created = handle_create_campaign(&create("Spring Sale", &clock, true), &clock, &store, dispatcher.clone())
            .await
            .unwrap();
        let campaign_id = created.aggregate_id;

        // Act
        handle_assign_affiliate(
            &AssignAffiliate {
                correlation_id: Uuid::new_v4(),
                campaign_id,
                affiliate_id: "aff-1".to_owned(),
                affiliate_name: "Bob".to_owned(),
            },
            &clock,
            &store,
            dispatcher.clone(),
        )
        .await
        .unwrap();
        let after_assign = load(&store, campaign_id).await.version();
        handle_pause_campaign(
            &PauseCampaign {
                correlation_id: Uuid::new_v4(),
                campaign_id,
                reason: "budget review".to_owned(),
            },
            &clock,
            &store,
            dispatcher.clone(),
        )
        .await
        .unwrap();

        // Assert
        assert_eq!(after_assign, 3);
        let campaign = load(&store, campaign_id).await;
        assert_eq!(campaign.version(), 4);
        assert_eq!(campaign.status(), CampaignStatus::Paused);
        assert!(dispatcher.event_types().contains(&AFFILIATE_ASSIGNED_EVENT_TYPE.to_owned()));
    }

    #[tokio::test]
    async fn test_rejected_mutation_writes_nothing() {
        // Arrange
        let clock = fixed_clock();
        let store = InMemoryStore::new();
        let dispatcher = Arc::new(RecordingDispatcher::new());
        let created = handle_create_campaign(&create("Spring Sale", &clock, false), &clock, &store, dispatcher.clone())
            .await
            .unwrap();

        // Act
        let result = handle_pause_campaign(
            &PauseCampaign {
                correlation_id: Uuid::new_v4(),
                campaign_id: created.aggregate_id,
                reason: String::new(),
            },
            &clock,
            &store,
            dispatcher.clone(),
        )
        .await;

        // Assert
        assert!(matches!(result, Err(DomainError::BusinessRule(_))));
        assert_eq!(load(&store, created.aggregate_id).await.version(), 1);
        assert_eq!(dispatcher.dispatched().len(), 1);
    }

    #[tokio::test]
    async fn test_command_bus_routes_every_campaign_command() {
        // Arrange
        let clock = fixed_clock();
        let store: Arc<dyn AggregateStore> = Arc::new(InMemoryStore::new());
        let dispatcher = Arc::new(RecordingDispatcher::new());
        let handlers = Arc::new(CampaignCommandHandlers::new(
            store,
            dispatcher.clone(),
            Arc::new(clock),
        ));
        let bus = handlers.register_all(CommandBus::builder()).unwrap().build();

        // Act
        let campaign_id = bus
            .dispatch(create("Spring Sale", &clock, true))
            .await
            .unwrap()
            .aggregate_id;
        let draft_id = bus
            .dispatch(create("Winter Sale", &clock, false))
            .await
            .unwrap()
            .aggregate_id;
        let batch = bus
            .dispatch(CreateCampaignByCategory {
                correlation_id: Uuid::new_v4(),
                influencer_id: Uuid::new_v4(),
                influencer_name: "Ana".to_owned(),
                categories: vec!["fitness".to_owned()],
            })
            .await
            .unwrap();
        bus.dispatch(AssignAffiliate {
            correlation_id: Uuid::new_v4(),
            campaign_id,
            affiliate_id: "aff-2".to_owned(),
            affiliate_name: "Eve".to_owned(),
        })
        .await
        .unwrap();
        let release = bus
            .dispatch(ReleaseAffiliate {
                correlation_id: Uuid::new_v4(),
                affiliate_id: "aff-2".to_owned(),
                reason: "affiliate deactivated".to_owned(),
            })
            .await
            .unwrap();
        let outcomes = vec![
            bus.dispatch(AssignAffiliate {
                correlation_id: Uuid::new_v4(),
                campaign_id,
                affiliate_id: "aff-1".to_owned(),
                affiliate_name: "Bob".to_owned(),
            })
            .await,
            bus.dispatch(RemoveAffiliate {
                correlation_id: Uuid::new_v4(),
                campaign_id,
                affiliate_id: "aff-1".to_owned(),
            })
            .await,
            bus.dispatch(UpdateCampaignTerms {
                correlation_id: Uuid::new_v4(),
                campaign_id,
                amount: Some(20.0),
                commission_description: None,
            })
            .await,
            bus.dispatch(RecordCampaignPerformance {
                correlation_id: Uuid::new_v4(),
                campaign_id,
                clicks: 100,
                conversions: 3,
                spend: 10.0,
                revenue: 90.0,
            })
            .await,
            bus.dispatch(PauseCampaign {
                correlation_id: Uuid::new_v4(),
                campaign_id,
                reason: "budget review".to_owned(),
            })
            .await,
            bus.dispatch(ResumeCampaign {
                correlation_id: Uuid::new_v4(),
                campaign_id,
            })
            .await,
            bus.dispatch(FinishCampaign {
                correlation_id: Uuid::new_v4(),
                campaign_id,
            })
            .await,
            bus.dispatch(ActivateCampaign {
                correlation_id: Uuid::new_v4(),
                campaign_id: draft_id,
            })
            .await,
            bus.dispatch(CancelCampaign {
                correlation_id: Uuid::new_v4(),
                campaign_id: draft_id,
                reason: "brand withdrew".to_owned(),
            })
            .await,
        ];

        // Assert
        assert_eq!(batch.created.len(), 1);
        assert!(batch.rejected.is_empty());
        assert_eq!(release.campaign_ids(), vec![campaign_id]);
        for outcome in outcomes {
            assert_eq!(outcome.unwrap().events.len(), 1);
        }
        let event_types = dispatcher.event_types();
        assert!(event_types.contains(&AFFILIATE_ASSIGNED_EVENT_TYPE.to_owned()));
        assert_eq!(
            event_types
                .iter()
                .filter(|t| *t == CAMPAIGN_CREATED_EVENT_TYPE)
                .count(),
            3
        );
    }

    async fn assign(store: &InMemoryStore, clock: &FixedClock, campaign_id: Uuid, affiliate_id: &str) {
        handle_assign_affiliate(
            &AssignAffiliate {
                correlation_id: Uuid::new_v4(),
                campaign_id,
                affiliate_id: affiliate_id.to_owned(),
                affiliate_name: affiliate_id.to_owned(),
            },
            clock,
            store,
            Arc::new(RecordingDispatcher::new()),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_handle_release_affiliate_clears_running_campaigns_only() {
        // Arrange
        let clock = fixed_clock();
        let store = InMemoryStore::new();
        let setup = Arc::new(RecordingDispatcher::new());
        let mut ids = Vec::new();
        for name in ["Spring Sale", "Summer Sale", "Autumn Sale"] {
            let outcome =
                handle_create_campaign(&create(name, &clock, true), &clock, &store, setup.clone())
                    .await
                    .unwrap();
            assign(&store, &clock, outcome.aggregate_id, "aff-1").await;
            ids.push(outcome.aggregate_id);
        }
        let (active, paused, finished) = (ids[0], ids[1], ids[2]);
        assign(&store, &clock, active, "aff-2").await;
        handle_pause_campaign(
            &PauseCampaign {
                correlation_id: Uuid::new_v4(),
                campaign_id: paused,
                reason: "budget review".to_owned(),
            },
            &clock,
            &store,
            setup.clone(),
        )
        .await
        .unwrap();
        handle_finish_campaign(
            &FinishCampaign {
                correlation_id: Uuid::new_v4(),
                campaign_id: finished,
            },
            &clock,
            &store,
            setup,
        )
        .await
        .unwrap();
        let dispatcher = Arc::new(RecordingDispatcher::new());
        let command = ReleaseAffiliate {
            correlation_id: Uuid::new_v4(),
            affiliate_id: "aff-1".to_owned(),
            reason: "account closed".to_owned(),
        };

        // Act
        let outcome = handle_release_affiliate(&command, &clock, &store, dispatcher.clone())
            .await
            .unwrap();
        let again = handle_release_affiliate(&command, &clock, &store, dispatcher.clone())
            .await
            .unwrap();

        // Assert
        let mut released = outcome.campaign_ids();
        released.sort();
        let mut expected = vec![active, paused];
        expected.sort();
        assert_eq!(released, expected);
        assert!(outcome.failed.is_empty());
        assert!(again.released.is_empty());
        assert_eq!(dispatcher.dispatched().len(), 2);
        assert!(!load(&store, active).await.affiliates().contains("aff-1"));
        assert!(load(&store, active).await.affiliates().contains("aff-2"));
        assert!(!load(&store, paused).await.affiliates().contains("aff-1"));
        assert!(load(&store, finished).await.affiliates().contains("aff-1"));
    }

    #[tokio::test]
    async fn test_handle_release_affiliate_propagates_store_errors() {
        let command = ReleaseAffiliate {
            correlation_id: Uuid::new_v4(),
            affiliate_id: "aff-1".to_owned(),
            reason: "account closed".to_owned(),
        };

        let result = handle_release_affiliate(
            &command,
            &fixed_clock(),
            &FailingStore,
            Arc::new(RecordingDispatcher::new()),
        )
        .await;

        assert!(matches!(result, Err(DomainError::Infrastructure(_))));
    }
}
