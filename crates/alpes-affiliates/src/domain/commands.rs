//! Commands for the Affiliates context.

use std::collections::BTreeMap;

use alpes_core::command::{Command, CommandOutcome};
use uuid::Uuid;

/// Command to register a new affiliate.
#[derive(Debug, Clone)]
pub struct RegisterAffiliate {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Display name.
    pub name: String,
    /// Email address; must not be registered yet.
    pub email: String,
    /// Optional phone number.
    pub phone: Option<String>,
    /// Kind of partner (`traditional`, `editorial_media`, ...).
    pub affiliate_type: String,
    /// Product categories covered.
    pub categories: Vec<String>,
    /// Short description; required.
    pub description: String,
    /// Affiliate website.
    pub website: Option<String>,
    /// Social network handles keyed by network name.
    pub social_links: BTreeMap<String, String>,
}

/// Command to activate an affiliate.
#[derive(Debug, Clone)]
pub struct ActivateAffiliate {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The affiliate identifier.
    pub affiliate_id: Uuid,
}

/// Command to deactivate an affiliate.
#[derive(Debug, Clone)]
pub struct DeactivateAffiliate {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The affiliate identifier.
    pub affiliate_id: Uuid,
    /// Why the affiliate is deactivated.
    pub reason: String,
}

/// Command to suspend an affiliate.
#[derive(Debug, Clone)]
pub struct SuspendAffiliate {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The affiliate identifier.
    pub affiliate_id: Uuid,
    /// Why the affiliate is suspended.
    pub reason: String,
}

/// Command to change profile fields. `None` leaves a field untouched.
#[derive(Debug, Clone)]
pub struct UpdateAffiliateProfile {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The affiliate identifier.
    pub affiliate_id: Uuid,
    /// New description; blank is ignored.
    pub description: Option<String>,
    /// New website; an empty string clears it.
    pub website: Option<String>,
    /// Replacement social network handles.
    pub social_links: Option<BTreeMap<String, String>>,
}

/// Command to report affiliate performance since the last report.
#[derive(Debug, Clone)]
pub struct RecordAffiliateMetrics {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The affiliate identifier.
    pub affiliate_id: Uuid,
    /// New clicks.
    pub clicks: u64,
    /// New conversions.
    pub conversions: u64,
    /// New revenue.
    pub revenue: f64,
}

macro_rules! affiliate_command {
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

affiliate_command!(RegisterAffiliate);
affiliate_command!(ActivateAffiliate);
affiliate_command!(DeactivateAffiliate);
affiliate_command!(SuspendAffiliate);
affiliate_command!(UpdateAffiliateProfile);
affiliate_command!(RecordAffiliateMetrics);
