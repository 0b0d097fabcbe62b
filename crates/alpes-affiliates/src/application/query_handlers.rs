//! Query handlers for the Affiliates context.

use std::collections::BTreeMap;

use alpes_core::aggregate::AggregateRoot;
use alpes_core::error::DomainError;
use alpes_core::query::{Page, Pagination};
use alpes_core::repository::{AggregateRepository, AggregateStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::aggregates::Affiliate;
use crate::domain::values::{AffiliateStatus, AffiliateType, Email};

/// Read-only view of an affiliate aggregate.
#[derive(Debug, Serialize)]
pub struct AffiliateView {
    /// The affiliate identifier.
    pub affiliate_id: Uuid,
    /// Display name.
    pub name: String,
    /// Normalized email.
    pub email: String,
    /// Normalized phone.
    pub phone: Option<String>,
    /// Kind of partner.
    pub affiliate_type: AffiliateType,
    /// Lifecycle status.
    pub status: AffiliateStatus,
    /// Product categories.
    pub categories: Vec<String>,
    /// Short description.
    pub description: String,
    /// Affiliate website.
    pub website: Option<String>,
    /// Social network handles.
    pub social_links: BTreeMap<String, String>,
    /// Total clicks.
    pub clicks: u64,
    /// Total conversions.
    pub conversions: u64,
    /// Conversions per hundred clicks.
    pub conversion_rate: f64,
    /// Total revenue.
    pub revenue: f64,
    /// Registration time.
    pub registered_at: DateTime<Utc>,
    /// Last activation time.
    pub activated_at: Option<DateTime<Utc>>,
    /// Current version.
    pub version: i64,
}

/// Criteria for listing affiliates. Absent fields match everything.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AffiliateFilter {
    /// Lifecycle status.
    pub status: Option<AffiliateStatus>,
    /// Kind of partner.
    pub affiliate_type: Option<AffiliateType>,
    /// Product category, case-insensitive.
    pub category: Option<String>,
}

impl AffiliateFilter {
    fn matches(&self, affiliate: &Affiliate) -> bool {
        self.status.is_none_or(|status| affiliate.status() == status)
            && self
                .affiliate_type
                .is_none_or(|kind| affiliate.profile().affiliate_type() == kind)
            && self
                .category
                .as_deref()
                .is_none_or(|category| affiliate.handles_category(category))
    }
}

fn to_view(affiliate: &Affiliate) -> AffiliateView {
    let profile = affiliate.profile();
    let metrics = affiliate.metrics();
    AffiliateView {
        affiliate_id: affiliate.aggregate_id(),
        name: affiliate.name().to_owned(),
        email: affiliate.email().as_str().to_owned(),
        phone: affiliate.phone().map(|phone| phone.as_str().to_owned()),
        affiliate_type: profile.affiliate_type(),
        status: affiliate.status(),
        categories: profile.categories().to_vec(),
        description: profile.description().to_owned(),
        website: profile.website().map(str::to_owned),
        social_links: profile.social_links().clone(),
        clicks: metrics.clicks,
        conversions: metrics.conversions,
        conversion_rate: metrics.conversion_rate(),
        revenue: metrics.revenue,
        registered_at: affiliate.registered_at(),
        activated_at: affiliate.activated_at(),
        version: affiliate.version(),
    }
}

/// Retrieves an affiliate by its aggregate ID.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if no snapshot exists for the ID.
/// Returns `DomainError::Infrastructure` if the snapshot cannot be read.
pub async fn get_affiliate_by_id(
    affiliate_id: Uuid,
    store: &dyn AggregateStore,
) -> Result<AffiliateView, DomainError> {
    let mut session = store.begin().await?;
    let affiliate = AggregateRepository::<Affiliate>::new()
        .get(session.as_mut(), affiliate_id)
        .await;
    session.rollback().await?;

    Ok(to_view(&affiliate?))
}

/// Retrieves an affiliate by email.
///
/// # Errors
///
/// Returns `DomainError::Validation` if `email` is malformed,
/// `DomainError::KeyNotFound` if nobody registered with it.
pub async fn get_affiliate_by_email(
    email: &str,
    store: &dyn AggregateStore,
) -> Result<AffiliateView, DomainError> {
    let email = Email::parse(email)?;
    let mut session = store.begin().await?;
    let affiliate = AggregateRepository::<Affiliate>::new()
        .find_by_unique_key(session.as_mut(), email.as_str())
        .await;
    session.rollback().await?;

    affiliate?
        .map(|affiliate| to_view(&affiliate))
        .ok_or_else(|| DomainError::KeyNotFound {
            collection: Affiliate::AGGREGATE_TYPE,
            key: email.as_str().to_owned(),
        })
}

/// Lists affiliates matching `filter`, oldest registration first.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if the store cannot be read.
pub async fn list_affiliates(
    filter: &AffiliateFilter,
    pagination: Pagination,
    store: &dyn AggregateStore,
) -> Result<Page<AffiliateView>, DomainError> {
    let mut session = store.begin().await?;
    let affiliates = AggregateRepository::<Affiliate>::new()
        .list(session.as_mut())
        .await;
    session.rollback().await?;

    let mut matching: Vec<Affiliate> = affiliates?
        .into_iter()
        .filter(|affiliate| filter.matches(affiliate))
        .collect();
    matching.sort_by_key(|affiliate| (affiliate.registered_at(), affiliate.aggregate_id()));

    Ok(Page::slice(matching, pagination).map(|affiliate| to_view(&affiliate)))
}

/// Lists active affiliates matching `filter`; its status is ignored.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if the store cannot be read.
pub async fn list_active_affiliates(
    filter: &AffiliateFilter,
    pagination: Pagination,
    store: &dyn AggregateStore,
) -> Result<Page<AffiliateView>, DomainError> {
    let filter = AffiliateFilter {
        status: Some(AffiliateStatus::Active),
        ..filter.clone()
    };
    list_affiliates(&filter, pagination, store).await
}
