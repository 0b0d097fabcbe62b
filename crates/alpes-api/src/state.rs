//! Shared application state.

use std::sync::Arc;

use alpes_core::clock::Clock;
use alpes_core::command::CommandBus;
use alpes_core::repository::AggregateStore;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Snapshot store, read by the query routes.
    pub store: Arc<dyn AggregateStore>,
    /// Command bus of the Influencers context.
    pub influencer_bus: Arc<CommandBus>,
    /// Command bus of the Affiliates context.
    pub affiliate_bus: Arc<CommandBus>,
    /// Command bus of the Campaigns context.
    pub campaign_bus: Arc<CommandBus>,
    /// Clock for request defaults.
    pub clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("influencer_bus", &self.influencer_bus)
            .field("affiliate_bus", &self.affiliate_bus)
            .field("campaign_bus", &self.campaign_bus)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(
        store: Arc<dyn AggregateStore>,
        influencer_bus: Arc<CommandBus>,
        affiliate_bus: Arc<CommandBus>,
        campaign_bus: Arc<CommandBus>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            influencer_bus,
            affiliate_bus,
            campaign_bus,
            clock,
        }
    }
}
