//! Routes for the Influencers bounded context.

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use alpes_core::query::{Page, Pagination};
use alpes_influencers::application::query_handlers::{self, InfluencerFilter, InfluencerView};
use alpes_influencers::domain::commands;

use super::CommandResponse;
use crate::error::ApiError;
use crate::state::AppState;

/// Request body for POST /.
#[derive(Debug, Deserialize)]
pub struct RegisterInfluencerRequest {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub categories: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub bio: String,
    pub website: Option<String>,
}

/// Request body for POST /{id}/deactivate.
#[derive(Debug, Deserialize)]
pub struct DeactivateInfluencerRequest {
    pub reason: String,
}

/// Request body for POST /{id}/platforms.
#[derive(Debug, Deserialize)]
pub struct AddPlatformRequest {
    /// Platform name (`instagram`, `tiktok`, ...).
    pub platform: String,
    pub followers: u64,
    /// Engagement rate in percent.
    pub engagement_rate: f64,
    #[serde(default)]
    pub average_reach: u64,
}

/// POST /
#[instrument(skip(state, request), fields(email = %request.email))]
async fn register_influencer(
    State(state): State<AppState>,
    Json(request): Json<RegisterInfluencerRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::RegisterInfluencer {
        correlation_id: Uuid::new_v4(),
        name: request.name,
        email: request.email,
        phone: request.phone,
        categories: request.categories,
        description: request.description,
        bio: request.bio,
        website: request.website,
    };

    info!(correlation_id = %command.correlation_id, "handling register_influencer command");

    let outcome = state.influencer_bus.dispatch(command).await?;
    Ok(Json(outcome.into()))
}

/// POST /{id}/activate
#[instrument(skip(state))]
async fn activate_influencer(
    State(state): State<AppState>,
    Path(influencer_id): Path<Uuid>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::ActivateInfluencer {
        correlation_id: Uuid::new_v4(),
        influencer_id,
    };

    info!(correlation_id = %command.correlation_id, "handling activate_influencer command");

    let outcome = state.influencer_bus.dispatch(command).await?;
    Ok(Json(outcome.into()))
}

/// POST /{id}/deactivate
#[instrument(skip(state, request))]
async fn deactivate_influencer(
    State(state): State<AppState>,
    Path(influencer_id): Path<Uuid>,
    Json(request): Json<DeactivateInfluencerRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::DeactivateInfluencer {
        correlation_id: Uuid::new_v4(),
        influencer_id,
        reason: request.reason,
    };

    info!(correlation_id = %command.correlation_id, "handling deactivate_influencer command");

    let outcome = state.influencer_bus.dispatch(command).await?;
    Ok(Json(outcome.into()))
}

/// POST /{id}/platforms
#[instrument(skip(state, request), fields(platform = %request.platform))]
async fn add_platform(
    State(state): State<AppState>,
    Path(influencer_id): Path<Uuid>,
    Json(request): Json<AddPlatformRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::AddPlatform {
        correlation_id: Uuid::new_v4(),
        influencer_id,
        platform: request.platform,
        followers: request.followers,
        engagement_rate: request.engagement_rate,
        average_reach: request.average_reach,
    };

    info!(correlation_id = %command.correlation_id, "handling add_platform command");

    let outcome = state.influencer_bus.dispatch(command).await?;
    Ok(Json(outcome.into()))
}

/// GET /{id}
#[instrument(skip(state))]
async fn get_influencer(
    State(state): State<AppState>,
    Path(influencer_id): Path<Uuid>,
) -> Result<Json<InfluencerView>, ApiError> {
    let view = query_handlers::get_influencer_by_id(influencer_id, state.store.as_ref()).await?;
    Ok(Json(view))
}

/// GET /?status=&tier=&category=&platform=&min_followers=&max_followers=&min_engagement=&limit=&offset=
#[instrument(skip(state))]
async fn list_influencers(
    State(state): State<AppState>,
    Query(filter): Query<InfluencerFilter>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Page<InfluencerView>>, ApiError> {
    let page = query_handlers::list_influencers(&filter, pagination, state.store.as_ref()).await?;
    Ok(Json(page))
}

/// GET /active
#[instrument(skip(state))]
async fn list_active_influencers(
    State(state): State<AppState>,
    Query(filter): Query<InfluencerFilter>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Page<InfluencerView>>, ApiError> {
    let page =
        query_handlers::list_active_influencers(&filter, pagination, state.store.as_ref()).await?;
    Ok(Json(page))
}

/// GET /by-email/{email}
#[instrument(skip(state))]
async fn get_influencer_by_email(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<InfluencerView>, ApiError> {
    let view = query_handlers::get_influencer_by_email(&email, state.store.as_ref()).await?;
    Ok(Json(view))
}

/// Returns the router for the Influencers context.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(register_influencer).get(list_influencers))
        .route("/active", get(list_active_influencers))
        .route("/by-email/{email}", get(get_influencer_by_email))
        .route("/{id}", get(get_influencer))
        .route("/{id}/activate", post(activate_influencer))
        .route("/{id}/deactivate", post(deactivate_influencer))
        .route("/{id}/platforms", post(add_platform))
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::routes::test_state;

    async fn send(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(match body {
                Some(body) => Body::from(serde_json::to_vec(&body).unwrap()),
                None => Body::empty(),
            })
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);
        (status, json)
    }

    fn ana() -> Value {
        json!({
            "name": "Ana",
            "email": "ana@x.com",
            "categories": ["fitness"],
            "description": "Fitness coach"
        })
    }

    #[tokio::test]
    async fn test_register_returns_200_with_aggregate_and_event_ids() {
        // Arrange
        let app = router().with_state(test_state::in_memory());

        // Act
        let (status, json) = send(app, "POST", "/", Some(ana())).await;

        // Assert
        assert_eq!(status, StatusCode::OK);
        Uuid::parse_str(json["aggregate_id"].as_str().unwrap()).unwrap();
        assert_eq!(json["event_ids"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_register_returns_409_for_taken_email() {
        // Arrange
        let state = test_state::in_memory();
        send(router().with_state(state.clone()), "POST", "/", Some(ana())).await;

        // Act
        let (status, json) = send(router().with_state(state), "POST", "/", Some(ana())).await;

        // Assert
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["error"], "business_rule_violation");
    }

    #[tokio::test]
    async fn test_register_returns_400_for_malformed_email() {
        let app = router().with_state(test_state::in_memory());
        let mut body = ana();
        body["email"] = json!("not-an-email");

        let (status, json) = send(app, "POST", "/", Some(body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "validation_error");
    }

    #[tokio::test]
    async fn test_register_returns_422_for_missing_fields() {
        let app = router().with_state(test_state::in_memory());

        let (status, _) = send(app, "POST", "/", Some(json!({}))).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_register_returns_503_when_store_fails() {
        let app = router().with_state(test_state::failing());

        let (status, json) = send(app, "POST", "/", Some(ana())).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json["error"], "infrastructure_error");
    }

    #[tokio::test]
    async fn test_lifecycle_routes_update_the_view() {
        // Arrange
        let state = test_state::in_memory();
        let (_, created) = send(router().with_state(state.clone()), "POST", "/", Some(ana())).await;
        let id = created["aggregate_id"].as_str().unwrap().to_owned();

        // Act
        let (platform_status, _) = send(
            router().with_state(state.clone()),
            "POST",
            &format!("/{id}/platforms"),
            Some(json!({ "platform": "instagram", "followers": 25000, "engagement_rate": 4.5 })),
        )
        .await;
        let (activate_status, _) = send(
            router().with_state(state.clone()),
            "POST",
            &format!("/{id}/activate"),
            None,
        )
        .await;
        let (view_status, view) =
            send(router().with_state(state), "GET", &format!("/{id}"), None).await;

        // Assert
        assert_eq!(platform_status, StatusCode::OK);
        assert_eq!(activate_status, StatusCode::OK);
        assert_eq!(view_status, StatusCode::OK);
        assert_eq!(view["status"], "ACTIVE");
        assert_eq!(view["total_followers"], 25000);
    }

    #[tokio::test]
    async fn test_get_returns_404_for_unknown_influencer() {
        let app = router().with_state(test_state::in_memory());

        let (status, json) = send(app, "GET", &format!("/{}", Uuid::new_v4()), None).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "aggregate_not_found");
    }

    #[tokio::test]
    async fn test_deactivate_without_reason_is_rejected() {
        // Arrange
        let state = test_state::in_memory();
        let (_, created) = send(router().with_state(state.clone()), "POST", "/", Some(ana())).await;
        let id = created["aggregate_id"].as_str().unwrap().to_owned();

        // Act
        let (status, json) = send(
            router().with_state(state),
            "POST",
            &format!("/{id}/deactivate"),
            Some(json!({ "reason": "  " })),
        )
        .await;

        // Assert
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["error"], "business_rule_violation");
    }

    async fn register(state: &AppState, email: &str, category: &str) -> String {
        let body = json!({
            "name": email,
            "email": email,
            "categories": [category],
            "description": "Creator"
        });
        let (_, created) = send(router().with_state(state.clone()), "POST", "/", Some(body)).await;
        created["aggregate_id"].as_str().unwrap().to_owned()
    }

    async fn add_instagram(state: &AppState, id: &str, followers: u64) -> (StatusCode, Value) {
        send(
            router().with_state(state.clone()),
            "POST",
            &format!("/{id}/platforms"),
            Some(json!({ "platform": "instagram", "followers": followers, "engagement_rate": 3.0 })),
        )
        .await
    }

    #[tokio::test]
    async fn test_list_applies_query_filters_and_paging() {
        // Arrange
        let state = test_state::in_memory();
        let ana = register(&state, "ana@x.com", "fitness").await;
        register(&state, "bea@x.com", "food").await;
        let carla = register(&state, "carla@x.com", "fitness").await;
        add_instagram(&state, &ana, 45_000).await;
        add_instagram(&state, &carla, 5_000).await;

        // Act
        let (all_status, all) = send(router().with_state(state.clone()), "GET", "/", None).await;
        let (filtered_status, filtered) = send(
            router().with_state(state.clone()),
            "GET",
            "/?category=fitness&platform=instagram&min_followers=10000",
            None,
        )
        .await;
        let (paged_status, paged) =
            send(router().with_state(state), "GET", "/?limit=1&offset=2", None).await;

        // Assert
        assert_eq!(all_status, StatusCode::OK);
        assert_eq!(all["total"], 3);
        assert_eq!(all["limit"], 100);
        assert_eq!(filtered_status, StatusCode::OK);
        assert_eq!(filtered["total"], 1);
        assert_eq!(filtered["items"][0]["influencer_id"], ana.as_str());
        assert_eq!(paged_status, StatusCode::OK);
        assert_eq!(paged["items"].as_array().unwrap().len(), 1);
        assert_eq!(paged["items"][0]["influencer_id"], carla.as_str());
    }

    #[tokio::test]
    async fn test_list_rejects_unknown_status_value() {
        let app = router().with_state(test_state::in_memory());

        let (status, _) = send(app, "GET", "/?status=RETIRED", None).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_active_lists_only_activated_influencers() {
        // Arrange
        let state = test_state::in_memory();
        let ana = register(&state, "ana@x.com", "fitness").await;
        register(&state, "bea@x.com", "fitness").await;
        send(
            router().with_state(state.clone()),
            "POST",
            &format!("/{ana}/activate"),
            None,
        )
        .await;

        // Act
        let (status, page) = send(router().with_state(state), "GET", "/active?status=PENDING", None).await;

        // Assert
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["total"], 1);
        assert_eq!(page["items"][0]["influencer_id"], ana.as_str());
        assert_eq!(page["items"][0]["status"], "ACTIVE");
    }

    #[tokio::test]
    async fn test_by_email_returns_view_or_404() {
        // Arrange
        let state = test_state::in_memory();
        let ana = register(&state, "ana@x.com", "fitness").await;

        // Act
        let (found_status, found) =
            send(router().with_state(state.clone()), "GET", "/by-email/ANA@x.com", None).await;
        let (missing_status, missing) =
            send(router().with_state(state), "GET", "/by-email/zoe@x.com", None).await;

        // Assert
        assert_eq!(found_status, StatusCode::OK);
        assert_eq!(found["influencer_id"], ana.as_str());
        assert_eq!(missing_status, StatusCode::NOT_FOUND);
        assert_eq!(missing["error"], "aggregate_not_found");
    }

    #[tokio::test]
    async fn test_add_platform_returns_400_when_total_followers_overflow() {
        // Arrange
        let state = test_state::in_memory();
        let ana = register(&state, "ana@x.com", "fitness").await;
        add_instagram(&state, &ana, u64::MAX).await;

        // Act
        let (status, json) = send(
            router().with_state(state),
            "POST",
            &format!("/{ana}/platforms"),
            Some(json!({ "platform": "tiktok", "followers": 1, "engagement_rate": 2.0 })),
        )
        .await;

        // Assert
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "validation_error");
    }
}
