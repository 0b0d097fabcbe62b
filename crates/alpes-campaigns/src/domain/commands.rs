//! Commands for the Campaigns context.

use alpes_core::command::{Command, CommandOutcome};
use alpes_core::error::DomainError;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::values::{CommissionType, OriginReference};

/// Input for a new campaign, as typed by a client or produced by a
/// blueprint.
#[derive(Debug, Clone)]
pub struct CampaignParameters {
    /// Campaign name; must not be taken yet.
    pub name: String,
    /// Campaign description.
    pub description: String,
    /// Commission type.
    pub commission_type: CommissionType,
    /// Commission amount; must be positive.
    pub amount: f64,
    /// ISO currency code.
    pub currency: String,
    /// Free-form terms description.
    pub commission_description: Option<String>,
    /// Period start.
    pub start: DateTime<Utc>,
    /// Period end; `None` runs indefinitely.
    pub end: Option<DateTime<Utc>>,
    /// Material headline. Derived from the name when blank.
    pub material_title: String,
    /// Material body copy.
    pub material_description: String,
    /// Landing page links.
    pub material_links: Vec<String>,
    /// Image URLs.
    pub material_images: Vec<String>,
    /// Banner URLs.
    pub material_banners: Vec<String>,
    /// Categories affiliates must cover.
    pub target_categories: Vec<String>,
    /// Affiliate types allowed to join.
    pub allowed_affiliate_types: Vec<String>,
    /// Countries allowed to join.
    pub allowed_countries: Vec<String>,
    /// Minimum follower count.
    pub min_followers: Option<u64>,
    /// Minimum engagement rate.
    pub min_engagement_rate: Option<f64>,
    /// Activate right after creation. A failed activation leaves the
    /// campaign in `DRAFT`.
    pub auto_activate: bool,
    /// Influencer and category the campaign was generated from.
    pub origin: Option<OriginReference>,
}

/// Command to create a campaign.
#[derive(Debug, Clone)]
pub struct CreateCampaign {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Campaign input.
    pub parameters: CampaignParameters,
}

/// Command to create one campaign per category from the blueprints.
#[derive(Debug, Clone)]
pub struct CreateCampaignByCategory {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Influencer the campaigns are generated for.
    pub influencer_id: Uuid,
    /// Influencer display name, used in campaign names.
    pub influencer_name: String,
    /// Categories to generate campaigns for.
    pub categories: Vec<String>,
}

/// Command to activate a campaign.
#[derive(Debug, Clone)]
pub struct ActivateCampaign {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The campaign identifier.
    pub campaign_id: Uuid,
}

/// Command to pause a campaign.
#[derive(Debug, Clone)]
pub struct PauseCampaign {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The campaign identifier.
    pub campaign_id: Uuid,
    /// Why the campaign is paused.
    pub reason: String,
}

/// Command to resume a paused campaign.
#[derive(Debug, Clone)]
pub struct ResumeCampaign {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The campaign identifier.
    pub campaign_id: Uuid,
}

/// Command to finish a campaign.
#[derive(Debug, Clone)]
pub struct FinishCampaign {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The campaign identifier.
    pub campaign_id: Uuid,
}

/// Command to cancel a campaign.
#[derive(Debug, Clone)]
pub struct CancelCampaign {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The campaign identifier.
    pub campaign_id: Uuid,
    /// Why the campaign is cancelled.
    pub reason: String,
}

/// Command to assign an affiliate to a campaign.
#[derive(Debug, Clone)]
pub struct AssignAffiliate {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The campaign identifier.
    pub campaign_id: Uuid,
    /// The affiliate identifier.
    pub affiliate_id: String,
    /// Affiliate display name.
    pub affiliate_name: String,
}

/// Command to remove an affiliate from a campaign.
#[derive(Debug, Clone)]
pub struct RemoveAffiliate {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The campaign identifier.
    pub campaign_id: Uuid,
    /// The affiliate identifier.
    pub affiliate_id: String,
}

/// Command to take an affiliate off every running (active or paused)
/// campaign it is assigned to.
#[derive(Debug, Clone)]
pub struct ReleaseAffiliate {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The affiliate identifier.
    pub affiliate_id: String,
    /// Why the affiliate is released.
    pub reason: String,
}

/// Command to change commission terms. `None` leaves a field untouched.
#[derive(Debug, Clone)]
pub struct UpdateCampaignTerms {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The campaign identifier.
    pub campaign_id: Uuid,
    /// New commission amount.
    pub amount: Option<f64>,
    /// New terms description; an empty string clears it.
    pub commission_description: Option<String>,
}

/// Command to report campaign performance since the last report.
#[derive(Debug, Clone)]
pub struct RecordCampaignPerformance {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The campaign identifier.
    pub campaign_id: Uuid,
    /// New clicks.
    pub clicks: u64,
    /// New conversions.
    pub conversions: u64,
    /// New spend.
    pub spend: f64,
    /// New revenue.
    pub revenue: f64,
}

/// Result of creating campaigns for several categories. Each category
/// succeeds or fails on its own.
#[derive(Debug, Default)]
pub struct CampaignBatchOutcome {
    /// Created campaigns, with the category each came from.
    pub created: Vec<(String, CommandOutcome)>,
    /// Categories that produced no campaign, with the reason.
    pub rejected: Vec<(String, DomainError)>,
}

impl CampaignBatchOutcome {
    /// Identifiers of the created campaigns.
    #[must_use]
    pub fn campaign_ids(&self) -> Vec<Uuid> {
        self.created.iter().map(|(_, o)| o.aggregate_id).collect()
    }

    /// First rejection worth retrying, if any. Business rejections such as
    /// a name that already exists are final.
    #[must_use]
    pub fn into_retryable_error(self) -> Option<DomainError> {
        self.rejected
            .into_iter()
            .map(|(_, err)| err)
            .find(|err| err.is_retryable() || err.is_configuration())
    }
}

/// Result of releasing an affiliate. Each campaign succeeds or fails on
/// its own.
#[derive(Debug, Default)]
pub struct AffiliateReleaseOutcome {
    /// Campaigns the affiliate was removed from.
    pub released: Vec<CommandOutcome>,
    /// Campaigns that still list the affiliate, with the reason.
    pub failed: Vec<(Uuid, DomainError)>,
}

impl AffiliateReleaseOutcome {
    /// Identifiers of the campaigns the affiliate was removed from.
    #[must_use]
    pub fn campaign_ids(&self) -> Vec<Uuid> {
        self.released.iter().map(|o| o.aggregate_id).collect()
    }

    /// First failure worth retrying, if any.
    #[must_use]
    pub fn into_retryable_error(self) -> Option<DomainError> {
        self.failed
            .into_iter()
            .map(|(_, err)| err)
            .find(|err| err.is_retryable() || err.is_configuration())
    }
}

macro_rules! campaign_command {
    ($command:ident, $output:ty) => {
        impl Command for $command {
            type Output = $output;

            fn command_type(&self) -> &'static str {
                stringify!($command)
            }

            fn correlation_id(&self) -> Uuid {
                self.correlation_id
            }
        }
    };
    ($command:ident) => {
        campaign_command!($command, CommandOutcome);
    };
}

campaign_command!(CreateCampaign);
campaign_command!(CreateCampaignByCategory, CampaignBatchOutcome);
campaign_command!(ActivateCampaign);
campaign_command!(PauseCampaign);
campaign_command!(ResumeCampaign);
campaign_command!(FinishCampaign);
campaign_command!(CancelCampaign);
campaign_command!(AssignAffiliate);
campaign_command!(RemoveAffiliate);
campaign_command!(ReleaseAffiliate, AffiliateReleaseOutcome);
campaign_command!(UpdateCampaignTerms);
campaign_command!(RecordCampaignPerformance);
