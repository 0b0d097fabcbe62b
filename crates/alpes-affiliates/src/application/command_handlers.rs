//! Command handlers for the Affiliates context.
//!
//! Same shape as every context: open a unit of work, load or create the
//! affiliate, run the domain operation, queue the snapshot and commit.

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

use crate::domain::aggregates::Affiliate;
use crate::domain::commands::{
    ActivateAffiliate, DeactivateAffiliate, RecordAffiliateMetrics, RegisterAffiliate,
    SuspendAffiliate, UpdateAffiliateProfile,
};
use crate::domain::values::{AffiliateProfile, AffiliateType, Email, Phone};

async fn commit(
    mut uow: UnitOfWork,
    repo: &AggregateRepository<Affiliate>,
    affiliate: &mut Affiliate,
) -> Result<CommandOutcome, DomainError> {
    if affiliate.pending_events().is_empty() {
        uow.rollback().await?;
        return Ok(CommandOutcome {
            aggregate_id: affiliate.aggregate_id(),
            events: Vec::new(),
        });
    }

    uow.register_batch(repo.save_operation(affiliate)?);
    let receipt = uow.commit().await?;
    affiliate.clear_events();

    Ok(CommandOutcome {
        aggregate_id: affiliate.aggregate_id(),
        events: receipt.events,
    })
}

async fn mutate<F>(
    affiliate_id: Uuid,
    store: &dyn AggregateStore,
    dispatcher: Arc<dyn EventDispatcher>,
    mutation: F,
) -> Result<CommandOutcome, DomainError>
where
    F: FnOnce(&mut Affiliate) -> Result<(), DomainError> + Send,
{
    let repo = AggregateRepository::<Affiliate>::new();
    let mut uow = UnitOfWork::begin(store, dispatcher).await?;
    let mut affiliate = repo.get(uow.session()?, affiliate_id).await?;

    mutation(&mut affiliate)?;

    commit(uow, &repo, &mut affiliate).await
}

/// Handles the `RegisterAffiliate` command: validates the input, checks
/// that the email is free, creates the aggregate and commits it.
///
/// # Errors
///
/// Returns `DomainError::Validation` for malformed input or an unknown
/// affiliate type, `DomainError::BusinessRule` if the email is taken.
pub async fn handle_register_affiliate(
    command: &RegisterAffiliate,
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
    let affiliate_type: AffiliateType = command.affiliate_type.parse()?;
    let profile = AffiliateProfile::new(
        affiliate_type,
        &command.categories,
        &command.description,
        command.website.as_deref(),
        &command.social_links,
    )?;

    let repo = AggregateRepository::<Affiliate>::new();
    let mut uow = UnitOfWork::begin(store, dispatcher).await?;
    if repo
        .exists_by_unique_key(uow.session()?, email.as_str())
        .await?
    {
        return Err(DomainError::BusinessRule(format!(
            "email '{email}' is already registered"
        )));
    }

    let mut affiliate = Affiliate::register(
        Uuid::now_v7(),
        &command.name,
        email,
        phone,
        profile,
        command.correlation_id,
        clock,
    )?;
    let outcome = commit(uow, &repo, &mut affiliate).await?;

    info!(
        affiliate_id = %outcome.aggregate_id,
        %affiliate_type,
        "affiliate registered"
    );
    Ok(outcome)
}

/// Handles the `ActivateAffiliate` command.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` or `DomainError::InvalidState`.
pub async fn handle_activate_affiliate(
    command: &ActivateAffiliate,
    clock: &dyn Clock,
    store: &dyn AggregateStore,
    dispatcher: Arc<dyn EventDispatcher>,
) -> Result<CommandOutcome, DomainError> {
    mutate(command.affiliate_id, store, dispatcher, |affiliate| {
        affiliate.activate(command.correlation_id, clock)
    })
    .await
}

/// Handles the `DeactivateAffiliate` command. Campaigns react to the
/// resulting `AffiliateDeactivated` event.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound`, `DomainError::InvalidState`
/// or `DomainError::BusinessRule` (blank reason).
pub async fn handle_deactivate_affiliate(
    command: &DeactivateAffiliate,
    clock: &dyn Clock,
    store: &dyn AggregateStore,
    dispatcher: Arc<dyn EventDispatcher>,
) -> Result<CommandOutcome, DomainError> {
    mutate(command.affiliate_id, store, dispatcher, |affiliate| {
        affiliate.deactivate(&command.reason, command.correlation_id, clock)
    })
    .await
}

/// Handles the `SuspendAffiliate` command.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound`, `DomainError::InvalidState`
/// or `DomainError::BusinessRule` (blank reason).
pub async fn handle_suspend_affiliate(
    command: &SuspendAffiliate,
    clock: &dyn Clock,
    store: &dyn AggregateStore,
    dispatcher: Arc<dyn EventDispatcher>,
) -> Result<CommandOutcome, DomainError> {
    mutate(command.affiliate_id, store, dispatcher, |affiliate| {
        affiliate.suspend(&command.reason, command.correlation_id, clock)
    })
    .await
}

/// Handles the `UpdateAffiliateProfile` command. Nothing is written when
/// no field changes.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` or `DomainError::Validation`.
pub async fn handle_update_affiliate_profile(
    command: &UpdateAffiliateProfile,
    clock: &dyn Clock,
    store: &dyn AggregateStore,
    dispatcher: Arc<dyn EventDispatcher>,
) -> Result<CommandOutcome, DomainError> {
    mutate(command.affiliate_id, store, dispatcher, |affiliate| {
        affiliate.update_profile(
            command.description.as_deref(),
            command.website.as_deref(),
            command.social_links.as_ref(),
            command.correlation_id,
            clock,
        )
    })
    .await
}

/// Handles the `RecordAffiliateMetrics` command.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` or `DomainError::Validation`
/// (negative revenue, totals out of range).
pub async fn handle_record_affiliate_metrics(
    command: &RecordAffiliateMetrics,
    clock: &dyn Clock,
    store: &dyn AggregateStore,
    dispatcher: Arc<dyn EventDispatcher>,
) -> Result<CommandOutcome, DomainError> {
    mutate(command.affiliate_id, store, dispatcher, |affiliate| {
        affiliate.record_metrics(
            command.clicks,
            command.conversions,
            command.revenue,
            command.correlation_id,
            clock,
        )
    })
    .await
}

/// Dependencies shared by every Affiliates command handler.
#[derive(Clone)]
pub struct AffiliateCommandHandlers {
    store: Arc<dyn AggregateStore>,
    dispatcher: Arc<dyn EventDispatcher>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for AffiliateCommandHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AffiliateCommandHandlers")
            .finish_non_exhaustive()
    }
}

impl AffiliateCommandHandlers {
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

    /// Registers a handler for every Affiliates command.
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
            .register::<RegisterAffiliate>(self.handler())?
            .register::<ActivateAffiliate>(self.handler())?
            .register::<DeactivateAffiliate>(self.handler())?
            .register::<SuspendAffiliate>(self.handler())?
            .register::<UpdateAffiliateProfile>(self.handler())?
            .register::<RecordAffiliateMetrics>(self.handler())
    }
}

macro_rules! delegate_handler {
    ($command:ty, $handler:ident) => {
        #[async_trait]
        impl CommandHandler<$command> for AffiliateCommandHandlers {
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

delegate_handler!(RegisterAffiliate, handle_register_affiliate);
delegate_handler!(ActivateAffiliate, handle_activate_affiliate);
delegate_handler!(DeactivateAffiliate, handle_deactivate_affiliate);
delegate_handler!(SuspendAffiliate, handle_suspend_affiliate);
delegate_handler!(UpdateAffiliateProfile, handle_update_affiliate_profile);
delegate_handler!(RecordAffiliateMetrics, handle_record_affiliate_metrics);
