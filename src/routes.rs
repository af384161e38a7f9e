use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::assistant::{AssistantService, SendOutcome, SessionView};
use crate::contributions;
use crate::error::ApiError;
use crate::github::GithubSource;
use crate::monitor::{ActivityMonitor, ActivityView, ReposSnapshot};

#[derive(Clone)]
pub struct AppState {
    pub monitor: Arc<ActivityMonitor>,
    pub assistant: Arc<AssistantService>,
    pub source: Arc<dyn GithubSource>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/github/contributions", get(github_contributions))
        .route("/api/github/activity", get(github_activity))
        .route("/api/github/repos", get(github_repos))
        .route("/api/github/repos/retry", post(retry_repos))
        .route("/api/assistant/sessions", post(create_session))
        .route("/api/assistant/sessions/:id", get(get_session).delete(reset_session))
        .route("/api/assistant/sessions/:id/messages", post(send_message))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Live scrape; the upstream status is passed through on failure.
async fn github_contributions(State(state): State<AppState>) -> impl IntoResponse {
    let settings = state.monitor.settings();
    let outcome = contributions::fetch_contributions(
        state.source.as_ref(),
        &settings.username,
        Utc::now().date_naive(),
        settings.lookback_days,
    )
    .await;
    (outcome.status, Json(outcome.body))
}

async fn github_activity(State(state): State<AppState>) -> Json<ActivityView> {
    Json(state.monitor.activity_view().await)
}

async fn github_repos(State(state): State<AppState>) -> Json<ReposSnapshot> {
    Json(state.monitor.repositories().await)
}

async fn retry_repos(State(state): State<AppState>) -> Json<ReposSnapshot> {
    tracing::info!("Repository list retry requested");
    state.monitor.refresh_repositories().await;
    Json(state.monitor.repositories().await)
}

async fn create_session(State(state): State<AppState>) -> (StatusCode, Json<SessionView>) {
    (StatusCode::CREATED, Json(state.assistant.create_session().await))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
    Ok(Json(state.assistant.view(id).await?))
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub message: String,
}

async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<SendMessageRequest>,
) -> Result<Json<SendOutcome>, ApiError> {
    Ok(Json(state.assistant.send(id, &request.message).await?))
}

async fn reset_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
    Ok(Json(state.assistant.reset(id).await?))
}
