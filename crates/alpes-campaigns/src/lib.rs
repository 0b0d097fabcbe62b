//! Campaigns bounded context.
//!
//! Owns the campaign lifecycle and affiliate assignments. Reacts to
//! `InfluencerRegistered` from the Influencers context by generating one
//! campaign per influencer category, and to `AffiliateDeactivated` from the
//! Affiliates context by taking the affiliate off running campaigns.

pub mod application;
pub mod domain;
pub mod infrastructure;

/// Topic carrying this context's integration events.
pub const CAMPAIGN_EVENTS_TOPIC: &str = "campaign-events";

/// Durable subscription this context uses on the influencer topic.
pub const INFLUENCER_EVENTS_SUBSCRIPTION: &str = "campaigns-influencer-events";

/// Durable subscription this context uses on the affiliate topic.
pub const AFFILIATE_EVENTS_SUBSCRIPTION: &str = "campaigns-affiliate-events";
