//! Influencers bounded context.
//!
//! Registers influencers, tracks their lifecycle and audience, and publishes
//! `InfluencerRegistered`, `InfluencerActivated`, `InfluencerDeactivated` and
//! `InfluencerAudienceUpdated` to other contexts.

pub mod application;
pub mod domain;

/// Topic carrying this context's integration events.
pub const INFLUENCER_EVENTS_TOPIC: &str = "influencer-events";
