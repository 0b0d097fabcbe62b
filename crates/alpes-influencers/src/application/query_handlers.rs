//! Query handlers for the Influencers context.
//!
//! This module contains query handlers that load stored snapshots and
//! return read-only view DTOs: lookups by id or email, and filtered,
//! paginated listings.

use std::collections::BTreeMap;

use alpes_core::aggregate::AggregateRoot;
use alpes_core::error::DomainError;
use alpes_core::query::{Page, Pagination};
use alpes_core::repository::{AggregateRepository, AggregateStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::aggregates::Influencer;
use crate::domain::values::{Email, InfluencerMetrics, InfluencerStatus, InfluencerTier, Platform};

/// Audience figures of one platform.
#[derive(Debug, Serialize)]
pub struct PlatformView {
    /// Follower count.
    pub followers: u64,
    /// Engagement rate in percent.
    pub engagement_rate: f64,
    /// Average reach per post.
    pub average_reach: u64,
}

/// Read-only view of an influencer aggregate.
#[derive(Debug, Serialize)]
pub struct InfluencerView {
    /// The influencer identifier.
    pub influencer_id: Uuid,
    /// Display name.
    pub name: String,
    /// Normalized email.
    pub email: String,
    /// Lifecycle status.
    pub status: InfluencerStatus,
    /// Profile categories.
    pub categories: Vec<String>,
    /// Short description.
    pub description: String,
    /// Audience per platform, keyed by platform name.
    pub platforms: BTreeMap<String, PlatformView>,
    /// Followers across all platforms.
    pub total_followers: u64,
    /// Mean engagement across platforms.
    pub average_engagement: f64,
    /// Tier of the largest platform.
    pub primary_tier: Option<InfluencerTier>,
    /// Whether the influencer can be matched with campaigns.
    pub can_join_campaigns: bool,
    /// Accumulated campaign results.
    pub metrics: InfluencerMetrics,
    /// Registration time.
    pub registered_at: DateTime<Utc>,
    /// Current version.
    pub version: i64,
}

/// Criteria for listing influencers. Absent fields match everything.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InfluencerFilter {
    /// Lifecycle status.
    pub status: Option<InfluencerStatus>,
    /// Tier of the largest platform.
    pub tier: Option<InfluencerTier>,
    /// Profile category, case-insensitive.
    pub category: Option<String>,
    /// Platform the influencer must be present on.
    pub platform: Option<Platform>,
    /// Minimum followers across all platforms.
    pub min_followers: Option<u64>,
    /// Maximum followers across all platforms.
    pub max_followers: Option<u64>,
    /// Minimum mean engagement rate.
    pub min_engagement: Option<f64>,
}

impl InfluencerFilter {
    fn matches(&self, influencer: &Influencer) -> bool {
        let followers = influencer.total_followers();
        self.status.is_none_or(|status| influencer.status() == status)
            && self.tier.is_none_or(|tier| influencer.primary_tier() == Some(tier))
            && self
                .category
                .as_deref()
                .is_none_or(|category| influencer.handles_category(category))
            && self
                .platform
                .is_none_or(|platform| influencer.audience().contains_key(&platform))
            && self.min_followers.is_none_or(|min| followers >= min)
            && self.max_followers.is_none_or(|max| followers <= max)
            && self
                .min_engagement
                .is_none_or(|min| influencer.average_engagement() >= min)
    }
}

fn to_view(influencer: &Influencer) -> InfluencerView {
    InfluencerView {
        influencer_id: influencer.aggregate_id(),
        name: influencer.name().to_owned(),
        email: influencer.email().as_str().to_owned(),
        status: influencer.status(),
        categories: influencer.profile().categories().to_vec(),
        description: influencer.profile().description().to_owned(),
        platforms: influencer
            .audience()
            .iter()
            .map(|(platform, audience)| {
                (
                    platform.as_str().to_owned(),
                    PlatformView {
                        followers: audience.followers(),
                        engagement_rate: audience.engagement_rate(),
                        average_reach: audience.average_reach(),
                    },
                )
            })
            .collect(),
        total_followers: influencer.total_followers(),
        average_engagement: influencer.average_engagement(),
        primary_tier: influencer.primary_tier(),
        can_join_campaigns: influencer.can_join_campaigns(),
        metrics: influencer.metrics().clone(),
        registered_at: influencer.registered_at(),
        version: influencer.version(),
    }
}

/// Retrieves an influencer by its aggregate ID.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if no snapshot exists for the ID.
/// Returns `DomainError::Infrastructure` if the snapshot cannot be read.
pub async fn get_influencer_by_id(
    influencer_id: Uuid,
    store: &dyn AggregateStore,
) -> Result<InfluencerView, DomainError> {
    let mut session = store.begin().await?;
    let influencer = AggregateRepository::<Influencer>::new()
        .get(session.as_mut(), influencer_id)
        .await;
    session.rollback().await?;

    Ok(to_view(&influencer?))
}

/// Retrieves an influencer by email. The email is normalized before lookup.
///
/// # Errors
///
/// Returns `DomainError::Validation` if `email` is malformed.
/// Returns `DomainError::KeyNotFound` if nobody registered with it.
/// Returns `DomainError::Infrastructure` if the store cannot be read.
pub async fn get_influencer_by_email(
    email: &str,
    store: &dyn AggregateStore,
) -> Result<InfluencerView, DomainError> {
    let email = Email::parse(email)?;
    let mut session = store.begin().await?;
    let influencer = AggregateRepository::<Influencer>::new()
        .find_by_unique_key(session.as_mut(), email.as_str())
        .await;
    session.rollback().await?;

    influencer?
        .map(|influencer| to_view(&influencer))
        .ok_or_else(|| DomainError::KeyNotFound {
            collection: Influencer::AGGREGATE_TYPE,
            key: email.as_str().to_owned(),
        })
}

/// Lists influencers matching `filter`, oldest registration first.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if the store cannot be read.
pub async fn list_influencers(
    filter: &InfluencerFilter,
    pagination: Pagination,
    store: &dyn AggregateStore,
) -> Result<Page<InfluencerView>, DomainError> {
    let mut session = store.begin().await?;
    let influencers = AggregateRepository::<Influencer>::new()
        .list(session.as_mut())
        .await;
    session.rollback().await?;

    let mut matching: Vec<Influencer> = influencers?
        .into_iter()
        .filter(|influencer| filter.matches(influencer))
        .collect();
    matching.sort_by_key(|influencer| (influencer.registered_at(), influencer.aggregate_id()));

    Ok(Page::slice(matching, pagination).map(|influencer| to_view(&influencer)))
}

/// Lists active influencers matching `filter`. The filter's status is
/// ignored.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if the store cannot be read.
pub async fn list_active_influencers(
    filter: &InfluencerFilter,
    pagination: Pagination,
    store: &dyn AggregateStore,
) -> Result<Page<InfluencerView>, DomainError> {
    let filter = InfluencerFilter {
        status: Some(InfluencerStatus::Active),
        ..filter.clone()
    };
    list_influencers(&filter, pagination, store).await
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use alpes_core::error::DomainError;
    use alpes_core::query::Pagination;
    use alpes_store::memory::InMemoryStore;
    use alpes_test_support::{FailingStore, FixedClock, RecordingDispatcher, fixed_clock};
    use chrono::Duration;
    use uuid::Uuid;

    use crate::application::command_handlers::{
        handle_activate_influencer, handle_add_platform, handle_register_influencer,
    };
    use crate::application::query_handlers::{
        InfluencerFilter, get_influencer_by_email, get_influencer_by_id, list_active_influencers,
        list_influencers,
    };
    use crate::domain::commands::{ActivateInfluencer, AddPlatform, RegisterInfluencer};
    use crate::domain::values::{InfluencerStatus, InfluencerTier, Platform};

    /// Registers an influencer `minutes` after the fixed clock, with one
    /// platform, optionally activating it.
    #[allow(clippy::too_many_arguments)]
    async fn seed(
        store: &InMemoryStore,
        minutes: i64,
        email: &str,
        category: &str,
        platform: &str,
        followers: u64,
        engagement_rate: f64,
        activate: bool,
    ) -> Uuid {
        let clock = FixedClock(fixed_clock().0 + Duration::minutes(minutes));
        let dispatcher = Arc::new(RecordingDispatcher::new());
        let influencer_id = handle_register_influencer(
            &RegisterInfluencer {
                correlation_id: Uuid::new_v4(),
                name: email.to_owned(),
                email: email.to_owned(),
                phone: None,
                categories: vec![category.to_owned()],
                description: "Creator".to_owned(),
                bio: String::new(),
                website: None,
            },
            &clock,
            store,
            dispatcher.clone(),
        )
        .await
        .unwrap()
        .aggregate_id;
        handle_add_platform(
            &AddPlatform {
                correlation_id: Uuid::new_v4(),
                influencer_id,
                platform: platform.to_owned(),
                followers,
                engagement_rate,
                average_reach: followers / 10,
            },
            &clock,
            store,
            dispatcher.clone(),
        )
        .await
        .unwrap();
        if activate {
            handle_activate_influencer(
                &ActivateInfluencer {
                    correlation_id: Uuid::new_v4(),
                    influencer_id,
                },
                &clock,
                store,
                dispatcher,
            )
            .await
            .unwrap();
        }
        influencer_id
    }

    /// Three influencers registered in order: a micro fitness creator on
    /// Instagram (active), a nano food blogger (pending) and a macro
    /// fitness creator on `TikTok` (active).
    async fn seeded_store() -> (InMemoryStore, [Uuid; 3]) {
        let store = InMemoryStore::new();
        let ana = seed(&store, 0, "ana@x.com", "fitness", "instagram", 45_000, 3.5, true).await;
        let bea = seed(&store, 1, "bea@x.com", "food", "blog", 2_000, 6.0, false).await;
        let carla = seed(&store, 2, "carla@x.com", "Fitness", "tiktok", 250_000, 1.2, true).await;
        (store, [ana, bea, carla])
    }

    fn ids(page: &alpes_core::query::Page<super::InfluencerView>) -> Vec<Uuid> {
        page.items.iter().map(|view| view.influencer_id).collect()
    }

    #[tokio::test]
    async fn test_get_influencer_by_id_returns_view_with_state() {
        // Arrange
        let clock = fixed_clock();
        let store = InMemoryStore::new();
        let dispatcher = Arc::new(RecordingDispatcher::new());
        let registered = handle_register_influencer(
            &RegisterInfluencer {
                correlation_id: Uuid::new_v4(),
                name: "Ana".to_owned(),
                email: "ana@x.com".to_owned(),
                phone: None,
                categories: vec!["fitness".to_owned(), "moda".to_owned()],
                description: "Coach".to_owned(),
                bio: String::new(),
                website: None,
            },
            &clock,
            &store,
            dispatcher.clone(),
        )
        .await
        .unwrap();
        handle_add_platform(
            &AddPlatform {
                correlation_id: Uuid::new_v4(),
                influencer_id: registered.aggregate_id,
                platform: "instagram".to_owned(),
                followers: 45_000,
                engagement_rate: 3.5,
                average_reach: 9_000,
            },
            &clock,
            &store,
            dispatcher,
        )
        .await
        .unwrap();

        // Act
        let view = get_influencer_by_id(registered.aggregate_id, &store)
            .await
            .unwrap();

        // Assert
        assert_eq!(view.influencer_id, registered.aggregate_id);
        assert_eq!(view.status, InfluencerStatus::Pending);
        assert_eq!(view.categories, vec!["fitness", "moda"]);
        assert_eq!(view.platforms["instagram"].followers, 45_000);
        assert_eq!(view.primary_tier, Some(InfluencerTier::Micro));
        assert!(!view.can_join_campaigns);
        assert_eq!(view.registered_at, clock.0);
        assert_eq!(view.version, 2);
    }

    #[tokio::test]
    async fn test_get_influencer_by_id_returns_not_found_for_unknown_id() {
        let influencer_id = Uuid::new_v4();

        let result = get_influencer_by_id(influencer_id, &InMemoryStore::new()).await;

        match result {
            Err(DomainError::AggregateNotFound(id)) => assert_eq!(id, influencer_id),
            other => panic!("expected AggregateNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_get_influencer_by_id_propagates_store_errors() {
        let result = get_influencer_by_id(Uuid::new_v4(), &FailingStore).await;

        assert!(matches!(result, Err(DomainError::Infrastructure(_))));
    }

    #[tokio::test]
    async fn test_list_influencers_without_filter_returns_all_in_registration_order() {
        // Arrange
        let (store, [ana, bea, carla]) = seeded_store().await;

        // Act
        let page = list_influencers(&InfluencerFilter::default(), Pagination::default(), &store)
            .await
            .unwrap();

        // Assert
        assert_eq!(ids(&page), vec![ana, bea, carla]);
        assert_eq!(page.total, 3);
        assert_eq!(page.limit, 100);
    }

    #[tokio::test]
    async fn test_list_influencers_filters_by_status_tier_and_category() {
        let (store, [ana, bea, carla]) = seeded_store().await;

        let pending = InfluencerFilter {
            status: Some(InfluencerStatus::Pending),
            ..InfluencerFilter::default()
        };
        let macro_tier = InfluencerFilter {
            tier: Some(InfluencerTier::Macro),
            ..InfluencerFilter::default()
        };
        let fitness = InfluencerFilter {
            category: Some("FITNESS".to_owned()),
            ..InfluencerFilter::default()
        };

        let by_status = list_influencers(&pending, Pagination::default(), &store).await.unwrap();
        let by_tier = list_influencers(&macro_tier, Pagination::default(), &store).await.unwrap();
        let by_category = list_influencers(&fitness, Pagination::default(), &store).await.unwrap();

        assert_eq!(ids(&by_status), vec![bea]);
        assert_eq!(ids(&by_tier), vec![carla]);
        assert_eq!(ids(&by_category), vec![ana, carla]);
    }

    #[tokio::test]
    async fn test_list_influencers_filters_by_platform_followers_and_engagement() {
        let (store, [ana, bea, carla]) = seeded_store().await;

        let on_tiktok = InfluencerFilter {
            platform: Some(Platform::TikTok),
            ..InfluencerFilter::default()
        };
        let follower_band = InfluencerFilter {
            min_followers: Some(2_000),
            max_followers: Some(45_000),
            ..InfluencerFilter::default()
        };
        let engaged = InfluencerFilter {
            min_engagement: Some(3.5),
            ..InfluencerFilter::default()
        };

        let by_platform = list_influencers(&on_tiktok, Pagination::default(), &store).await.unwrap();
        let by_followers = list_influencers(&follower_band, Pagination::default(), &store)
            .await
            .unwrap();
        let by_engagement = list_influencers(&engaged, Pagination::default(), &store).await.unwrap();

        assert_eq!(ids(&by_platform), vec![carla]);
        assert_eq!(ids(&by_followers), vec![ana, bea]);
        assert_eq!(ids(&by_engagement), vec![ana, bea]);
    }

    #[tokio::test]
    async fn test_list_influencers_pages_after_filtering() {
        let (store, [_, bea, carla]) = seeded_store().await;

        let page = list_influencers(
            &InfluencerFilter::default(),
            Pagination { limit: 2, offset: 1 },
            &store,
        )
        .await
        .unwrap();

        assert_eq!(ids(&page), vec![bea, carla]);
        assert_eq!(page.total, 3);
        assert_eq!(page.offset, 1);
    }

    #[tokio::test]
    async fn test_list_active_influencers_ignores_requested_status() {
        let (store, [ana, _, carla]) = seeded_store().await;
        let filter = InfluencerFilter {
            status: Some(InfluencerStatus::Pending),
            ..InfluencerFilter::default()
        };

        let page = list_active_influencers(&filter, Pagination::default(), &store)
            .await
            .unwrap();

        assert_eq!(ids(&page), vec![ana, carla]);
        assert!(page.items.iter().all(|view| view.can_join_campaigns));
    }

    #[tokio::test]
    async fn test_get_influencer_by_email_normalizes_the_address() {
        let (store, [ana, ..]) = seeded_store().await;

        let view = get_influencer_by_email("  ANA@X.com ", &store).await.unwrap();

        assert_eq!(view.influencer_id, ana);
        assert_eq!(view.email, "ana@x.com");
    }

    #[tokio::test]
    async fn test_get_influencer_by_email_reports_unknown_address() {
        let (store, _) = seeded_store().await;

        let result = get_influencer_by_email("nobody@x.com", &store).await;

        match result {
            Err(DomainError::KeyNotFound { collection, key }) => {
                assert_eq!(collection, "influencer");
                assert_eq!(key, "nobody@x.com");
            }
            other => panic!("expected KeyNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_get_influencer_by_email_rejects_malformed_address() {
        let result = get_influencer_by_email("not-an-email", &InMemoryStore::new()).await;

        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn test_list_influencers_propagates_store_errors() {
        let result =
            list_influencers(&InfluencerFilter::default(), Pagination::default(), &FailingStore).await;

        assert!(matches!(result, Err(DomainError::Infrastructure(_))));
    }
}
