//! Routes for the Campaigns bounded context.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use alpes_campaigns::application::query_handlers::{self, CampaignView};
use alpes_campaigns::domain::commands::{self, CampaignParameters};
use alpes_campaigns::domain::values::CommissionType;

use super::CommandResponse;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MaterialRequest {
    pub title: String,
    pub description: String,
    pub links: Vec<String>,
    pub images: Vec<String>,
    pub banners: Vec<String>,
}

/// Request body for POST /.
#[derive(Debug, Deserialize)]
pub struct CreateCampaignRequest {
    pub name: String,
    pub description: String,
    /// `CPA`, `CPL` or `CPC`.
    pub commission_type: CommissionType,
    pub amount: f64,
    pub currency: String,
    pub commission_description: Option<String>,
    /// Defaults to the time of the request.
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub material: MaterialRequest,
    #[serde(default)]
    pub target_categories: Vec<String>,
    #[serde(default)]
    pub allowed_affiliate_types: Vec<String>,
    #[serde(default)]
    pub allowed_countries: Vec<String>,
    pub min_followers: Option<u64>,
    pub min_engagement_rate: Option<f64>,
    #[serde(default)]
    pub auto_activate: bool,
}

/// Request body for POST /{id}/pause.
#[derive(Debug, Deserialize)]
pub struct PauseCampaignRequest {
    pub reason: String,
}

/// Request body for POST /{id}/affiliates.
#[derive(Debug, Deserialize)]
pub struct AssignAffiliateRequest {
    pub affiliate_id: String,
    #[serde(default)]
    pub affiliate_name: String,
}

/// POST /
#[instrument(skip(state, request), fields(name = %request.name))]
async fn create_campaign(
    State(state): State<AppState>,
    Json(request): Json<CreateCampaignRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::CreateCampaign {
        correlation_id: Uuid::new_v4(),
        parameters: CampaignParameters {
            name: request.name,
            description: request.description,
            commission_type: request.commission_type,
            amount: request.amount,
            currency: request.currency,
            commission_description: request.commission_description,
            start: request.start.unwrap_or_else(|| state.clock.now()),
            end: request.end,
            material_title: request.material.title,
            material_description: request.material.description,
            material_links: request.material.links,
            material_images: request.material.images,
            material_banners: request.material.banners,
            target_categories: request.target_categories,
            allowed_affiliate_types: request.allowed_affiliate_types,
            allowed_countries: request.allowed_countries,
            min_followers: request.min_followers,
            min_engagement_rate: request.min_engagement_rate,
            auto_activate: request.auto_activate,
            origin: None,
        },
    };

    info!(correlation_id = %command.correlation_id, "handling create_campaign command");

    let outcome = state.campaign_bus.dispatch(command).await?;
    Ok(Json(outcome.into()))
}

/// POST /{id}/activate
#[instrument(skip(state))]
async fn activate_campaign(
    State(state): State<AppState>,
    Path(campaign_id): Path<Uuid>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::ActivateCampaign {
        correlation_id: Uuid::new_v4(),
        campaign_id,
    };

    info!(correlation_id = %command.correlation_id, "handling activate_campaign command");

    let outcome = state.campaign_bus.dispatch(command).await?;
    Ok(Json(outcome.into()))
}

/// POST /{id}/pause
#[instrument(skip(state, request))]
async fn pause_campaign(
    State(state): State<AppState>,
    Path(campaign_id): Path<Uuid>,
    Json(request): Json<PauseCampaignRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::PauseCampaign {
        correlation_id: Uuid::new_v4(),
        campaign_id,
        reason: request.reason,
    };

    info!(correlation_id = %command.correlation_id, "handling pause_campaign command");

    let outcome = state.campaign_bus.dispatch(command).await?;
    Ok(Json(outcome.into()))
}

/// POST /{id}/affiliates
#[instrument(skip(state, request), fields(affiliate_id = %request.affiliate_id))]
async fn assign_affiliate(
    State(state): State<AppState>,
    Path(campaign_id): Path<Uuid>,
    Json(request): Json<AssignAffiliateRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::AssignAffiliate {
        correlation_id: Uuid::new_v4(),
        campaign_id,
        affiliate_id: request.affiliate_id,
        affiliate_name: request.affiliate_name,
    };

    info!(correlation_id = %command.correlation_id, "handling assign_affiliate command");

    let outcome = state.campaign_bus.dispatch(command).await?;
    Ok(Json(outcome.into()))
}

/// GET /{id}
#[instrument(skip(state))]
async fn get_campaign(
    State(state): State<AppState>,
    Path(campaign_id): Path<Uuid>,
) -> Result<Json<CampaignView>, ApiError> {
    let view = query_handlers::get_campaign_by_id(campaign_id, state.store.as_ref()).await?;
    Ok(Json(view))
}

/// Returns the router for the Campaigns context.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_campaign))
        .route("/{id}", get(get_campaign))
        .route("/{id}/activate", post(activate_campaign))
        .route("/{id}/pause", post(pause_campaign))
        .route("/{id}/affiliates", post(assign_affiliate))
}
