//! HTTP handlers for the announcer server.

use crate::AppState;
use announcer_engine::EngineError;
use announcer_flightplan::FlightInfo;
use announcer_session::SessionError;
use announcer_types::{context_from_json, ControlAction, QueueItem, Snapshot};
use axum::{
    extract::{rejection::JsonRejection, Extension, Json, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;

/// Request body for `POST /bind`.
#[derive(Debug, Default, Deserialize)]
pub struct BindRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub secret: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BindResponse {
    pub ok: bool,
    pub token: String,
}

/// Request body for `POST /trigger`.
#[derive(Debug, Deserialize)]
pub struct TriggerRequest {
    #[serde(default)]
    pub trigger: Option<String>,
    /// Arbitrary JSON object; scalar values are stringified.
    #[serde(default)]
    pub context: Value,
}

/// One enqueued item as reported back to the HTTP caller.
#[derive(Debug, Serialize, Deserialize)]
pub struct EnqueuedItem {
    pub id: String,
    pub priority: i64,
    /// Whether the paired audio file exists on disk right now.
    #[serde(rename = "audioExists")]
    pub audio_exists: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TriggerResponse {
    pub triggered: String,
    pub enqueued: Vec<EnqueuedItem>,
}

/// Request body for `POST /control`.
#[derive(Debug, Deserialize)]
pub struct ControlRequest {
    #[serde(default)]
    pub action: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ControlResponse {
    pub ok: bool,
    pub action: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TriggersResponse {
    pub triggers: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct FlightResponse {
    pub ok: bool,
    pub data: FlightInfo,
}

/// API error type mapping to HTTP status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    BadRequest(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("upstream failure: {0}")]
    Upstream(String),
    #[error("internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Upstream(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(json!({
            "ok": false,
            "error": message
        }));

        (status, body).into_response()
    }
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::NoRulesForTrigger(_) => ApiError::NotFound(e.to_string()),
            other => {
                tracing::error!("engine failure: {}", other);
                ApiError::Internal(other.to_string())
            }
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(e: SessionError) -> Self {
        ApiError::Unauthorized(e.to_string())
    }
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

/// Handler for `GET /health`.
pub async fn health_handler(Extension(state): Extension<Arc<AppState>>) -> Json<Value> {
    let controller = state.engine.controller();
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "state": controller.state().as_str(),
        "pending": controller.pending_len(),
        "watchers": state.sessions.watcher_count(),
    }))
}

/// Handler for `POST /bind`.
pub async fn bind_handler(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<BindRequest>, JsonRejection>,
) -> Result<Json<BindResponse>, ApiError> {
    let request = json_body(payload)?;
    let token = state
        .sessions
        .issue(request.name.as_deref(), request.secret.as_deref())?;
    Ok(Json(BindResponse {
        ok: true,
        token: token.id,
    }))
}

async fn audio_exists(item: &QueueItem) -> bool {
    match &item.audio_ref {
        Some(path) => tokio::fs::try_exists(path).await.unwrap_or(false),
        None => false,
    }
}

/// Handler for `POST /trigger`.
pub async fn trigger_handler(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<TriggerRequest>, JsonRejection>,
) -> Result<Json<TriggerResponse>, ApiError> {
    let request = json_body(payload)?;
    let trigger = request
        .trigger
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("trigger required".to_string()))?;

    let context = context_from_json(&request.context);
    let items = state.engine.dispatch(&trigger, &context)?;

    let mut enqueued = Vec::with_capacity(items.len());
    for item in &items {
        enqueued.push(EnqueuedItem {
            id: item.id.clone(),
            priority: item.priority,
            audio_exists: audio_exists(item).await,
        });
    }

    Ok(Json(TriggerResponse {
        triggered: trigger,
        enqueued,
    }))
}

/// Handler for `POST /control`.
pub async fn control_handler(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<ControlRequest>, JsonRejection>,
) -> Result<Json<ControlResponse>, ApiError> {
    let request = json_body(payload)?;
    let raw = request
        .action
        .filter(|a| !a.is_empty())
        .ok_or_else(|| ApiError::BadRequest("action required".to_string()))?;
    let action: ControlAction = raw
        .parse()
        .map_err(|_| ApiError::BadRequest("unknown action".to_string()))?;

    state.engine.controller().apply(action);
    tracing::info!(action = %action, "control action applied");

    Ok(Json(ControlResponse {
        ok: true,
        action: action.as_str().to_string(),
    }))
}

/// Handler for `GET /triggers`.
pub async fn list_triggers_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Json<TriggersResponse> {
    Json(TriggersResponse {
        triggers: state.engine.list_triggers().into_iter().collect(),
    })
}

/// Handler for `GET /flight/{id}`.
///
/// Every upstream or configuration failure is a 500 carrying the error text.
pub async fn flight_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(flight_id): Path<String>,
) -> Result<Json<FlightResponse>, ApiError> {
    let data = state
        .flight_plans
        .fetch(&flight_id)
        .await
        .map_err(|e| ApiError::Upstream(e.to_string()))?;
    Ok(Json(FlightResponse { ok: true, data }))
}

/// Handler for `GET /snapshot`.
pub async fn snapshot_handler(Extension(state): Extension<Arc<AppState>>) -> Json<Snapshot> {
    Json(state.engine.controller().snapshot())
}
