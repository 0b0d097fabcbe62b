//! Routes for the Affiliates bounded context.

use std::collections::BTreeMap;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use alpes_affiliates::application::query_handlers::{self, AffiliateFilter, AffiliateView};
use alpes_affiliates::domain::commands;
use alpes_core::query::{Page, Pagination};

use super::CommandResponse;
use crate::error::ApiError;
use crate::state::AppState;

/// Request body for POST /.
#[derive(Debug, Deserialize)]
pub struct RegisterAffiliateRequest {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    /// Kind of partner (`traditional`, `editorial_media`, ...).
    pub affiliate_type: String,
    pub categories: Vec<String>,
    pub description: String,
    pub website: Option<String>,
    #[serde(default)]
    pub social_links: BTreeMap<String, String>,
}

/// Request body for POST /{id}/deactivate and POST /{id}/suspend.
#[derive(Debug, Deserialize)]
pub struct ReasonRequest {
    pub reason: String,
}

/// Request body for POST /{id}/profile. Absent fields are left as they are.
#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub description: Option<String>,
    pub website: Option<String>,
    pub social_links: Option<BTreeMap<String, String>>,
}

/// Request body for POST /{id}/metrics.
#[derive(Debug, Deserialize)]
pub struct RecordMetricsRequest {
    #[serde(default)]
    pub clicks: u64,
    #[serde(default)]
    pub conversions: u64,
    #[serde(default)]
    pub revenue: f64,
}

/// POST /
#[instrument(skip(state, request), fields(email = %request.email))]
async fn register_affiliate(
    State(state): State<AppState>,
    Json(request): Json<RegisterAffiliateRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::RegisterAffiliate {
        correlation_id: Uuid::new_v4(),
        name: request.name,
        email: request.email,
        phone: request.phone,
        affiliate_type: request.affiliate_type,
        categories: request.categories,
        description: request.description,
        website: request.website,
        social_links: request.social_links,
    };

    info!(correlation_id = %command.correlation_id, "handling register_affiliate command");

    let outcome = state.affiliate_bus.dispatch(command).await?;
    Ok(Json(outcome.into()))
}

/// POST /{id}/activate
#[instrument(skip(state))]
async fn activate_affiliate(
    State(state): State<AppState>,
    Path(affiliate_id): Path<Uuid>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::ActivateAffiliate {
        correlation_id: Uuid::new_v4(),
        affiliate_id,
    };

    info!(correlation_id = %command.correlation_id, "handling activate_affiliate command");

    let outcome = state.affiliate_bus.dispatch(command).await?;
    Ok(Json(outcome.into()))
}

/// POST /{id}/deactivate
#[instrument(skip(state, request))]
async fn deactivate_affiliate(
    State(state): State<AppState>,
    Path(affiliate_id): Path<Uuid>,
    Json(request): Json<ReasonRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::DeactivateAffiliate {
        correlation_id: Uuid::new_v4(),
        affiliate_id,
        reason: request.reason,
    };

    info!(correlation_id = %command.correlation_id, "handling deactivate_affiliate command");

    let outcome = state.affiliate_bus.dispatch(command).await?;
    Ok(Json(outcome.into()))
}

/// POST /{id}/suspend
#[instrument(skip(state, request))]
async fn suspend_affiliate(
    State(state): State<AppState>,
    Path(affiliate_id): Path<Uuid>,
    Json(request): Json<ReasonRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::SuspendAffiliate {
        correlation_id: Uuid::new_v4(),
        affiliate_id,
        reason: request.reason,
    };

    info!(correlation_id = %command.correlation_id, "handling suspend_affiliate command");

    let outcome = state.affiliate_bus.dispatch(command).await?;
    Ok(Json(outcome.into()))
}

/// POST /{id}/profile
#[instrument(skip(state, request))]
async fn update_profile(
    State(state): State<AppState>,
    Path(affiliate_id): Path<Uuid>,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::UpdateAffiliateProfile {
        correlation_id: Uuid::new_v4(),
        affiliate_id,
        description: request.description,
        website: request.website,
        social_links: request.social_links,
    };

    info!(correlation_id = %command.correlation_id, "handling update_affiliate_profile command");

    let outcome = state.affiliate_bus.dispatch(command).await?;
    Ok(Json(outcome.into()))
}

/// POST /{id}/metrics
#[instrument(skip(state, request))]
async fn record_metrics(
    State(state): State<AppState>,
    Path(affiliate_id): Path<Uuid>,
    Json(request): Json<RecordMetricsRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::RecordAffiliateMetrics {
        correlation_id: Uuid::new_v4(),
        affiliate_id,
        clicks: request.clicks,
        conversions: request.conversions,
        revenue: request.revenue,
    };

    info!(correlation_id = %command.correlation_id, "handling record_affiliate_metrics command");

    let outcome = state.affiliate_bus.dispatch(command).await?;
    Ok(Json(outcome.into()))
}

/// GET /{id}
#[instrument(skip(state))]
async fn get_affiliate(
    State(state): State<AppState>,
    Path(affiliate_id): Path<Uuid>,
) -> Result<Json<AffiliateView>, ApiError> {
    let view = query_handlers::get_affiliate_by_id(affiliate_id, state.store.as_ref()).await?;
    Ok(Json(view))
}

/// GET /?status=&affiliate_type=&category=&limit=&offset=
#[instrument(skip(state))]
async fn list_affiliates(
    State(state): State<AppState>,
    Query(filter): Query<AffiliateFilter>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Page<AffiliateView>>, ApiError> {
    let page = query_handlers::list_affiliates(&filter, pagination, state.store.as_ref()).await?;
    Ok(Json(page))
}

/// GET /active
#[instrument(skip(state))]
async fn list_active_affiliates(
    State(state): State<AppState>,
    Query(filter): Query<AffiliateFilter>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Page<AffiliateView>>, ApiError> {
    let page =
        query_handlers::list_active_affiliates(&filter, pagination, state.store.as_ref()).await?;
    Ok(Json(page))
}

/// GET /by-email/{email}
#[instrument(skip(state))]
async fn get_affiliate_by_email(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<AffiliateView>, ApiError> {
    let view = query_handlers::get_affiliate_by_email(&email, state.store.as_ref()).await?;
    Ok(Json(view))
}

/// Returns the router for the Affiliates context.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(register_affiliate).get(list_affiliates))
        .route("/active", get(list_active_affiliates))
        .route("/by-email/{email}", get(get_affiliate_by_email))
        .route("/{id}", get(get_affiliate))
        .route("/{id}/activate", post(activate_affiliate))
        .route("/{id}/deactivate", post(deactivate_affiliate))
        .route("/{id}/suspend", post(suspend_affiliate))
        .route("/{id}/profile", post(update_profile))
        .route("/{id}/metrics", post(record_metrics))
}
