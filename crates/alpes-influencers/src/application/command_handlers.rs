//! Command handlers for the Influencers context.
//!
//! This module contains application-level command handler functions that
//! orchestrate domain logic: open a unit of work, load or create the
//! aggregate, execute the command, queue the snapshot write and commit.
//! Events reach the dispatcher only once the commit is durable.

use std::sync::Arc;

use alpes_core::aggregate::AggregateRoot;
use alpes_core::clock::Clock;
use alpes_core::command::{Command, CommandBusBuilder, CommandHandler, CommandOutcome};
use alpes_core::error::DomainError;
use alpes_core::publisher::EventDispatcher;
use alpes_core::repository::{AggregateRepository, AggregateStore};
use alpes_core::unit_of_work::UnitOfWork;
use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use crate::domain::aggregates::Influencer;
use crate::domain::commands::{
    ActivateInfluencer, AddPlatform, DeactivateInfluencer, RecordInfluencerResults,
    RegisterInfluencer, SuspendInfluencer, UpdateDemographics, UpdateInfluencerProfile,
};
use crate::domain::values::{AudienceData, Demographics, Email, Phone, Platform, Profile};

/// Queues the influencer's snapshot, commits and clears the dispatched
/// events. An aggregate without pending events is not written.
async fn commit(
    mut uow: UnitOfWork,
    repo: &AggregateRepository<Influencer>,
    influencer: &mut Influencer,
) -> Result<CommandOutcome, DomainError> {
    if influencer.pending_events().is_empty() {
        uow.rollback().await?;
        return Ok(CommandOutcome {
            aggregate_id: influencer.aggregate_id(),
            events: Vec::new(),
        });
    }

    uow.register_batch(repo.save_operation(influencer)?);
    let receipt = uow.commit().await?;
    influencer.clear_events();

    Ok(CommandOutcome {
        aggregate_id: influencer.aggregate_id(),
        events: receipt.events,
    })
}

/// Loads an existing influencer, applies `mutation` and commits.
async fn mutate<F>(
    influencer_id: Uuid,
    store: &dyn AggregateStore,
    dispatcher: Arc<dyn EventDispatcher>,
    mutation: F,
) -> Result<CommandOutcome, DomainError>
where
    F: FnOnce(&mut Influencer) -> Result<(), DomainError> + Send,
{
    let repo = AggregateRepository::<Influencer>::new();
    let mut uow = UnitOfWork::begin(store, dispatcher).await?;
    let mut influencer = repo.get(uow.session()?, influencer_id).await?;

    mutation(&mut influencer)?;

    commit(uow, &repo, &mut influencer).await
}

/// Handles the `RegisterInfluencer` command: validates the input, checks
/// that the email is free, creates the aggregate and commits it.
///
/// # Errors
///
/// Returns `DomainError::Validation` for malformed input,
/// `DomainError::BusinessRule` if the email is already registered.
pub async fn handle_register_influencer(
    command: &RegisterInfluencer,
    clock: &dyn Clock,
    store: &dyn AggregateStore,
    dispatcher: Arc<dyn EventDispatcher>,
) -> Result<CommandOutcome, DomainError> {
    let email = Email::parse(&command.email)?;
    let phone = command
        .phone
        .as_deref()
        .map(str::trim)
        .filter(|phone| !phone.is_empty())
        .map(Phone::parse)
        .transpose()?;
    let profile = Profile::new(
        &command.categories,
        &command.description,
        &command.bio,
        command.website.as_deref(),
    )?;

    let repo = AggregateRepository::<Influencer>::new();
    let mut uow = UnitOfWork::begin(store, dispatcher).await?;
    if repo
        .exists_by_unique_key(uow.session()?, email.as_str())
        .await?
    {
        return Err(DomainError::BusinessRule(format!(
            "email '{email}' is already registered"
        )));
    }

    // v7 ids sort by creation, which breaks registration-time ties in listings.
    let mut influencer = Influencer::register(
        Uuid::now_v7(),
        &command.name,
        email,
        phone,
        profile,
        command.correlation_id,
        clock,
    )?;
    let outcome = commit(uow, &repo, &mut influencer).await?;

    info!(
        influencer_id = %outcome.aggregate_id,
        categories = ?influencer.profile().categories(),
        "influencer registered"
    );
    Ok(outcome)
}

/// Handles the `ActivateInfluencer` command.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if the influencer does not exist,
/// `DomainError::InvalidState` if it cannot be activated.
pub async fn handle_activate_influencer(
    command: &ActivateInfluencer,
    clock: &dyn Clock,
    store: &dyn AggregateStore,
    dispatcher: Arc<dyn EventDispatcher>,
) -> Result<CommandOutcome, DomainError> {
    mutate(command.influencer_id, store, dispatcher, |influencer| {
        influencer.activate(command.correlation_id, clock)
    })
    .await
}

/// Handles the `DeactivateInfluencer` command.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound`, `DomainError::InvalidState`
/// or `DomainError::BusinessRule` (blank reason).
pub async fn handle_deactivate_influencer(
    command: &DeactivateInfluencer,
    clock: &dyn Clock,
    store: &dyn AggregateStore,
    dispatcher: Arc<dyn EventDispatcher>,
) -> Result<CommandOutcome, DomainError> {
    mutate(command.influencer_id, store, dispatcher, |influencer| {
        influencer.deactivate(&command.reason, command.correlation_id, clock)
    })
    .await
}

/// Handles the `SuspendInfluencer` command.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound`, `DomainError::InvalidState`
/// or `DomainError::BusinessRule` (blank reason).
pub async fn handle_suspend_influencer(
    command: &SuspendInfluencer,
    clock: &dyn Clock,
    store: &dyn AggregateStore,
    dispatcher: Arc<dyn EventDispatcher>,
) -> Result<CommandOutcome, DomainError> {
    mutate(command.influencer_id, store, dispatcher, |influencer| {
        influencer.suspend(&command.reason, command.correlation_id, clock)
    })
    .await
}

/// Handles the `UpdateInfluencerProfile` command. Nothing is written when
/// no field changes.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` or `DomainError::Validation`.
pub async fn handle_update_influencer_profile(
    command: &UpdateInfluencerProfile,
    clock: &dyn Clock,
    store: &dyn AggregateStore,
    dispatcher: Arc<dyn EventDispatcher>,
) -> Result<CommandOutcome, DomainError> {
    mutate(command.influencer_id, store, dispatcher, |influencer| {
        influencer.update_profile(
            command.description.as_deref(),
            command.bio.as_deref(),
            command.website.as_deref(),
            command.correlation_id,
            clock,
        )
    })
    .await
}

/// Handles the `AddPlatform` command.
///
/// # Errors
///
/// Returns `DomainError::Validation` for an unknown platform, an invalid
/// engagement rate or a shrinking follower count.
pub async fn handle_add_platform(
    command: &AddPlatform,
    clock: &dyn Clock,
    store: &dyn AggregateStore,
    dispatcher: Arc<dyn EventDispatcher>,
) -> Result<CommandOutcome, DomainError> {
    let platform: Platform = command.platform.parse()?;
    let audience = AudienceData::new(
        platform,
        command.followers,
        command.engagement_rate,
        command.average_reach,
    )?;

    mutate(command.influencer_id, store, dispatcher, |influencer| {
        influencer.add_platform(audience, command.correlation_id, clock)
    })
    .await
}

/// Handles the `UpdateDemographics` command.
///
/// # Errors
///
/// Returns `DomainError::Validation` for an invalid distribution.
pub async fn handle_update_demographics(
    command: &UpdateDemographics,
    clock: &dyn Clock,
    store: &dyn AggregateStore,
    dispatcher: Arc<dyn EventDispatcher>,
) -> Result<CommandOutcome, DomainError> {
    let demographics = Demographics::new(
        command.gender_distribution.clone(),
        command.age_distribution.clone(),
        command.top_countries.clone(),
    )?;

    mutate(command.influencer_id, store, dispatcher, |influencer| {
        influencer.update_demographics(demographics, command.correlation_id, clock);
        Ok(())
    })
    .await
}

/// Handles the `RecordInfluencerResults` command.
///
/// # Errors
///
/// Returns `DomainError::Validation` if any figure is negative.
pub async fn handle_record_influencer_results(
    command: &RecordInfluencerResults,
    clock: &dyn Clock,
    store: &dyn AggregateStore,
    dispatcher: Arc<dyn EventDispatcher>,
) -> Result<CommandOutcome, DomainError> {
    mutate(command.influencer_id, store, dispatcher, |influencer| {
        influencer.record_results(
            command.completed_campaigns,
            command.average_engagement,
            command.average_cpm,
            command.revenue,
            command.correlation_id,
            clock,
        )
    })
    .await
}

/// Dependencies shared by every Influencers command handler. Registered on
/// the command bus once per command type.
#[derive(Clone)]
pub struct InfluencerCommandHandlers {
    store: Arc<dyn AggregateStore>,
    dispatcher: Arc<dyn EventDispatcher>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for InfluencerCommandHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InfluencerCommandHandlers")
            .finish_non_exhaustive()
    }
}

impl InfluencerCommandHandlers {
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

    /// Registers a handler for every Influencers command.
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
            .register::<RegisterInfluencer>(self.handler())?
            .register::<ActivateInfluencer>(self.handler())?
            .register::<DeactivateInfluencer>(self.handler())?
            .register::<SuspendInfluencer>(self.handler())?
            .register::<UpdateInfluencerProfile>(self.handler())?
            .register::<AddPlatform>(self.handler())?
            .register::<UpdateDemographics>(self.handler())?
            .register::<RecordInfluencerResults>(self.handler())
    }
}

macro_rules! delegate_handler {
    ($command:ty, $handler:ident) => {
        #[async_trait]
        impl CommandHandler<$command> for InfluencerCommandHandlers {
            async fn handle(&self, command: $command) -> Result<CommandOutcome, DomainError> {
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

delegate_handler!(RegisterInfluencer, handle_register_influencer);
delegate_handler!(ActivateInfluencer, handle_activate_influencer);
delegate_handler!(DeactivateInfluencer, handle_deactivate_influencer);
delegate_handler!(SuspendInfluencer, handle_suspend_influencer);
delegate_handler!(UpdateInfluencerProfile, handle_update_influencer_profile);
delegate_handler!(AddPlatform, handle_add_platform);
delegate_handler!(UpdateDemographics, handle_update_demographics);
delegate_handler!(RecordInfluencerResults, handle_record_influencer_results);
