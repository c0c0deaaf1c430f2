//! HTTP endpoint handlers

use std::{convert::Infallible, sync::Arc};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        Json,
    },
};
use futures::stream::{self, Stream};
use serde::de::DeserializeOwned;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

use crate::{
    error::SessionError,
    state::{AppState, SessionOptions},
};
use super::responses::{
    ActivityRequest, HealthResponse, SessionListResponse, SessionResponse, StatusResponse,
};

/// An empty body means "use defaults"; anything else must be valid JSON
fn parse_optional_body<T>(body: &Bytes) -> Result<T, SessionError>
where
    T: DeserializeOwned + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| {
        warn!("Rejected request body: {}", e);
        SessionError::InvalidBody(e.to_string())
    })
}

/// Handle POST /sessions/:id - Start a session timer
pub async fn create_session_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<(StatusCode, Json<SessionResponse>), SessionError> {
    let options: SessionOptions = parse_optional_body(&body)?;
    let snapshot = state.create_session(&id, &options).map_err(|e| {
        warn!("Failed to create session {}: {}", id, e);
        e
    })?;

    Ok((
        StatusCode::CREATED,
        Json(SessionResponse::new(format!("Session {} started", id), snapshot)),
    ))
}

/// Handle GET /sessions - List every session
pub async fn list_sessions_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SessionListResponse>, SessionError> {
    Ok(Json(SessionListResponse {
        sessions: state.list_sessions()?,
        timestamp: chrono::Utc::now(),
    }))
}

/// Handle GET /sessions/:id - Current phase and countdown
pub async fn get_session_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, SessionError> {
    let snapshot = state.session(&id)?.snapshot();
    let message = match snapshot.countdown_seconds() {
        Some(seconds) => format!("Session {} is idle, {}s left", id, seconds),
        None => format!("Session {} is active", id),
    };
    Ok(Json(SessionResponse::new(message, snapshot)))
}

/// Handle POST /sessions/:id/activity - Forward an activity notification
pub async fn activity_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<SessionResponse>, SessionError> {
    let request: ActivityRequest = parse_optional_body(&body)?;
    let applied = state.session(&id)?.activity(request.kind).await?;

    let message = if applied.accepted {
        "Activity recorded".to_string()
    } else {
        "Activity ignored".to_string()
    };
    Ok(Json(SessionResponse::new(message, applied.snapshot).with_accepted(applied.accepted)))
}

/// Handle POST /sessions/:id/reset - Explicit "still here" acknowledgement
pub async fn reset_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, SessionError> {
    let applied = state.session(&id)?.reset().await?;
    if applied.accepted {
        info!("Session {} reset by client", id);
    }

    let message = if applied.accepted {
        "Session reset".to_string()
    } else {
        "Session is disabled".to_string()
    };
    Ok(Json(SessionResponse::new(message, applied.snapshot).with_accepted(applied.accepted)))
}

/// Handle PATCH /sessions/:id - Change flags or durations
pub async fn update_session_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(options): Json<SessionOptions>,
) -> Result<Json<SessionResponse>, SessionError> {
    let snapshot = state.update_session(&id, &options).await?;
    Ok(Json(SessionResponse::new(format!("Session {} updated", id), snapshot)))
}

/// Handle DELETE /sessions/:id - Tear a session down
pub async fn delete_session_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, SessionError> {
    let snapshot = state.remove_session(&id).await?;
    Ok(Json(SessionResponse::new(format!("Session {} removed", id), snapshot)))
}

/// Handle GET /events - Stream idle/active/closed transitions
pub async fn events_handler(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let events_rx = state.subscribe_events();

    let events = stream::unfold(events_rx, |mut events_rx| async move {
        loop {
            match events_rx.recv().await {
                Ok(event) => match Event::default().event(event.kind.as_str()).json_data(&event) {
                    Ok(sse_event) => return Some((Ok::<_, Infallible>(sse_event), events_rx)),
                    Err(e) => error!("Failed to encode session event: {}", e),
                },
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Event stream lagged, {} session events skipped", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}

/// Handle GET /status - Daemon status
pub async fn status_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatusResponse>, StatusCode> {
    let (sessions, idle_sessions) = match state.session_counts() {
        Ok(counts) => counts,
        Err(e) => {
            error!("Failed to count sessions: {}", e);
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    Ok(Json(StatusResponse {
        sessions,
        idle_sessions,
        default_timeout_ms: state.defaults.timeout_ms,
        default_warning_ms: state.defaults.warning_ms,
        uptime: state.get_uptime(),
        port: state.port,
        host: state.host.clone(),
    }))
}

/// Handle GET /health - Health check endpoint
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}
