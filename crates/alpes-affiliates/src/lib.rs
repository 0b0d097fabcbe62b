//! Affiliates bounded context.
//!
//! Registers affiliates (coupon sites, editorial media, ambassadors, B2B
//! partners...), tracks their lifecycle and performance, and publishes
//! `AffiliateRegistered`, `AffiliateActivated` and `AffiliateDeactivated`
//! to other contexts.

pub mod application;
pub mod domain;

/// Topic carrying this context's integration events.
pub const AFFILIATE_EVENTS_TOPIC: &str = "affiliate-events";
