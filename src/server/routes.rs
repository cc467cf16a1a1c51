use std::future::Future;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tower::limit::ConcurrencyLimitLayer;
use tracing::error;

use super::config::LimitsConfig;
use crate::service::AnalysisService;
use crate::types::{
    AggregateProfileResponse, ProfileRequest, ProfileResponse, TagsRequest, TagsResponse,
};
use crate::{MuninnError, Result};

/// Body of every error response. Internal details go to the log only.
const GENERIC_DETAIL: &str = "Something went wrong";

#[derive(Clone)]
pub struct AppState {
    pub service: AnalysisService,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(service: AnalysisService, request_timeout: Duration) -> Self {
        Self {
            service,
            request_timeout,
        }
    }

    async fn run<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.request_timeout, fut)
            .await
            .map_err(|_| MuninnError::Timeout(self.request_timeout))?
    }
}

/// Core error mapped to an HTTP response.
pub struct ApiError(pub MuninnError);

impl From<MuninnError> for ApiError {
    fn from(err: MuninnError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!(error = %self.0, "request failed");
        let status = match self.0 {
            MuninnError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "detail": GENERIC_DETAIL }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

/// Build the HTTP router.
pub fn router(service: AnalysisService, limits: &LimitsConfig) -> Router {
    let state = AppState::new(service, limits.request_timeout());

    let emotions = Router::new()
        .route("/profile", post(profile))
        .route("/tags", post(tags))
        .route("/profile/batch", post(profile_batch))
        .route("/tags/batch", post(tags_batch))
        .route("/profile/aggregate", post(profile_aggregate));

    Router::new()
        .route("/", get(health))
        .nest("/emotions", emotions)
        .layer(ConcurrencyLimitLayer::new(limits.max_concurrent_requests))
        .with_state(state)
}

/// GET / - liveness
async fn health() -> impl IntoResponse {
    Json(json!({ "status": "running" }))
}

/// POST /emotions/profile
async fn profile(
    State(state): State<AppState>,
    Json(request): Json<ProfileRequest>,
) -> ApiResult<ProfileResponse> {
    let response = state.run(state.service.emotional_profile(request)).await?;
    Ok(Json(response))
}

/// POST /emotions/tags
async fn tags(
    State(state): State<AppState>,
    Json(request): Json<TagsRequest>,
) -> ApiResult<TagsResponse> {
    let response = state.run(state.service.emotional_tags(request)).await?;
    Ok(Json(response))
}

/// POST /emotions/profile/batch
async fn profile_batch(
    State(state): State<AppState>,
    Json(requests): Json<Vec<ProfileRequest>>,
) -> ApiResult<Vec<ProfileResponse>> {
    let response = state
        .run(state.service.emotional_profiles_batch(requests))
        .await?;
    Ok(Json(response))
}

/// POST /emotions/tags/batch
async fn tags_batch(
    State(state): State<AppState>,
    Json(requests): Json<Vec<TagsRequest>>,
) -> ApiResult<Vec<TagsResponse>> {
    let response = state.run(state.service.emotional_tags_batch(requests)).await?;
    Ok(Json(response))
}

/// POST /emotions/profile/aggregate
async fn profile_aggregate(
    State(state): State<AppState>,
    Json(requests): Json<Vec<ProfileRequest>>,
) -> ApiResult<AggregateProfileResponse> {
    let response = state.run(state.service.aggregate_profile(requests)).await?;
    Ok(Json(response))
}
