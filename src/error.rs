use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// Failure talking to one of the public GitHub sources.
///
/// Never crosses the HTTP boundary as-is: callers turn it into an empty
/// result plus a static message.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("upstream returned {0}")]
    Status(reqwest::StatusCode),

    #[error("unexpected payload: {0}")]
    Payload(String),
}

impl UpstreamError {
    pub fn status(&self) -> Option<reqwest::StatusCode> {
        match self {
            UpstreamError::Status(status) => Some(*status),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error("failed to read knowledge file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid knowledge file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("knowledge base is invalid: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Errors returned by the HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("session not found: {0}")]
    SessionNotFound(uuid::Uuid),

    #[error("a reply is still pending for this session")]
    ReplyPending,

    #[error("message must not be empty")]
    EmptyMessage,

    #[error("the reply was cancelled by a reset")]
    ReplyCancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::ReplyPending | ApiError::ReplyCancelled => StatusCode::CONFLICT,
            ApiError::EmptyMessage => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!("{}", self);
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
