//! API request and response structures

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::SessionError,
    state::{ActivityKind, SessionSnapshot},
};

/// Body of `POST /sessions/:id/activity`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActivityRequest {
    #[serde(default)]
    pub kind: ActivityKind,
}

/// Response for every endpoint that touches a single session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    /// Phase of the session after the request, "active" or "idle"
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// Whether the request changed anything; absent for plain reads
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepted: Option<bool>,
    pub session: SessionSnapshot,
}

impl SessionResponse {
    pub fn new(message: String, session: SessionSnapshot) -> Self {
        Self {
            status: if session.is_idle { "idle" } else { "active" }.to_string(),
            message,
            timestamp: Utc::now(),
            accepted: None,
            session,
        }
    }

    pub fn with_accepted(mut self, accepted: bool) -> Self {
        self.accepted = Some(accepted);
        self
    }
}

/// Response for `GET /sessions`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionSnapshot>,
    pub timestamp: DateTime<Utc>,
}

/// Daemon status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub sessions: usize,
    pub idle_sessions: usize,
    pub default_timeout_ms: u64,
    pub default_warning_ms: u64,
    pub uptime: String,
    pub port: u16,
    pub host: String,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Error body returned for failed requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ErrorResponse {
    pub fn new(message: String) -> Self {
        Self {
            status: "error".to_string(),
            message,
            timestamp: Utc::now(),
        }
    }
}

impl SessionError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            SessionError::NotFound(_) => StatusCode::NOT_FOUND,
            SessionError::AlreadyExists(_) => StatusCode::CONFLICT,
            SessionError::Config(_) | SessionError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            SessionError::Closed(_) => StatusCode::GONE,
            SessionError::Lock(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for SessionError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}
