//! Commands for the Influencers context.

use std::collections::BTreeMap;

use alpes_core::command::{Command, CommandOutcome};
use uuid::Uuid;

/// Command to register a new influencer.
#[derive(Debug, Clone)]
pub struct RegisterInfluencer {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Display name.
    pub name: String,
    /// Email address; must not be registered yet.
    pub email: String,
    /// Optional phone number.
    pub phone: Option<String>,
    /// Content categories.
    pub categories: Vec<String>,
    /// Short description.
    pub description: String,
    /// Long-form biography.
    pub bio: String,
    /// Personal website.
    pub website: Option<String>,
}

/// Command to activate an influencer.
#[derive(Debug, Clone)]
pub struct ActivateInfluencer {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The influencer identifier.
    pub influencer_id: Uuid,
}

/// Command to deactivate an influencer.
#[derive(Debug, Clone)]
pub struct DeactivateInfluencer {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The influencer identifier.
    pub influencer_id: Uuid,
    /// Why the influencer is deactivated.
    pub reason: String,
}

/// Command to suspend an influencer.
#[derive(Debug, Clone)]
pub struct SuspendInfluencer {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The influencer identifier.
    pub influencer_id: Uuid,
    /// Why the influencer is suspended.
    pub reason: String,
}

/// Command to update profile fields. `None` leaves a field untouched.
#[derive(Debug, Clone)]
pub struct UpdateInfluencerProfile {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The influencer identifier.
    pub influencer_id: Uuid,
    /// New description.
    pub description: Option<String>,
    /// New biography.
    pub bio: Option<String>,
    /// New website; an empty string clears it.
    pub website: Option<String>,
}

/// Command to add or update the audience of one platform.
#[derive(Debug, Clone)]
pub struct AddPlatform {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The influencer identifier.
    pub influencer_id: Uuid,
    /// Platform name (`instagram`, `tiktok`, ...).
    pub platform: String,
    /// Follower count.
    pub followers: u64,
    /// Engagement rate in percent.
    pub engagement_rate: f64,
    /// Average reach per post.
    pub average_reach: u64,
}

/// Command to replace audience demographics.
#[derive(Debug, Clone)]
pub struct UpdateDemographics {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The influencer identifier.
    pub influencer_id: Uuid,
    /// Share of audience per gender.
    pub gender_distribution: BTreeMap<String, f64>,
    /// Share of audience per age bracket.
    pub age_distribution: BTreeMap<String, f64>,
    /// Countries with the largest audience share.
    pub top_countries: Vec<String>,
}

/// Command to record campaign results for an influencer.
#[derive(Debug, Clone)]
pub struct RecordInfluencerResults {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The influencer identifier.
    pub influencer_id: Uuid,
    /// Campaigns completed since the last report.
    pub completed_campaigns: u32,
    /// Average engagement; 0 keeps the previous value.
    pub average_engagement: f64,
    /// Average CPM; 0 keeps the previous value.
    pub average_cpm: f64,
    /// Revenue generated since the last report.
    pub revenue: f64,
}

macro_rules! influencer_command {
    ($command:ident) => {
        impl Command for $command {
            type Output = CommandOutcome;

            fn command_type(&self) -> &'static str {
                stringify!($command)
            }

            fn correlation_id(&self) -> Uuid {
                self.correlation_id
            }
        }
    };
}

influencer_command!(RegisterInfluencer);
influencer_command!(ActivateInfluencer);
influencer_command!(DeactivateInfluencer);
influencer_command!(SuspendInfluencer);
influencer_command!(UpdateInfluencerProfile);
influencer_command!(AddPlatform);
influencer_command!(UpdateDemographics);
influencer_command!(RecordInfluencerResults);
