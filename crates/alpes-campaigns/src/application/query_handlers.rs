//! Query handlers for the Campaigns context.

use alpes_core::aggregate::AggregateRoot;
use alpes_core::error::DomainError;
use alpes_core::repository::{AggregateRepository, AggregateStore};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::aggregates::Campaign;
use crate::domain::values::{CampaignMetrics, CampaignStatus, CommissionType, OriginReference};

/// Read-only view of a campaign aggregate.
#[derive(Debug, Serialize)]
pub struct CampaignView {
    pub campaign_id: Uuid,
    pub name: String,
    pub description: String,
    pub status: CampaignStatus,
    pub commission_type: CommissionType,
    pub amount: f64,
    pub currency: String,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub target_categories: Vec<String>,
    pub allowed_affiliate_types: Vec<String>,
    /// Assigned affiliate ids, sorted.
    pub affiliates: Vec<String>,
    pub metrics: CampaignMetrics,
    /// Conversions per click.
    pub conversion_rate: f64,
    pub origin: Option<OriginReference>,
    pub created_at: DateTime<Utc>,
    pub version: i64,
}

/// Retrieves a campaign by its aggregate ID.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if no snapshot exists for the ID.
/// Returns `DomainError::Infrastructure` if the snapshot cannot be read.
pub async fn get_campaign_by_id(
    campaign_id: Uuid,
    store: &dyn AggregateStore,
) -> Result<CampaignView, DomainError> {
    let mut session = store.begin().await?;
    let campaign = AggregateRepository::<Campaign>::new()
        .get(session.as_mut(), campaign_id)
        .await;
    session.rollback().await?;
    let campaign = campaign?;

    Ok(CampaignView {
        campaign_id,
        name: campaign.name().to_owned(),
        description: campaign.description().to_owned(),
        status: campaign.status(),
        commission_type: campaign.terms().commission_type(),
        amount: campaign.terms().amount(),
        currency: campaign.terms().currency().to_owned(),
        start: campaign.period().start(),
        end: campaign.period().end(),
        target_categories: campaign.criteria().required_categories().to_vec(),
        allowed_affiliate_types: campaign.criteria().allowed_types().to_vec(),
        affiliates: campaign.affiliates().iter().cloned().collect(),
        metrics: campaign.metrics().clone(),
        conversion_rate: campaign.metrics().conversion_rate(),
        origin: campaign.origin().cloned(),
        created_at: campaign.created_at(),
        version: campaign.version(),
    })
}
