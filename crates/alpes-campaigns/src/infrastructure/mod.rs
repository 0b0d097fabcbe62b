//! Adapters between the Campaigns context and the outside world.

pub mod affiliate_events;
pub mod choreography;
pub mod influencer_events;
