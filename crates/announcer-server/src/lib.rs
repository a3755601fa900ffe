//! Announcer server library logic.
//!
//! HTTP, SSE and WebSocket adapters over one [`AnnouncementEngine`]. All
//! adapters share a single [`AppState`] and funnel every mutation through
//! the engine's playback controller.

pub mod api;
pub mod api_sse;
pub mod api_ws;
pub mod config;

use announcer_engine::AnnouncementEngine;
use announcer_flightplan::FlightPlanClient;
use announcer_session::SessionRegistry;
use announcer_types::EngineEvent;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Extension, Router,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Buffered engine events per SSE subscriber before it starts lagging.
const EVENT_BROADCAST_CAPACITY: usize = 256;

/// Maximum request body size (64 KiB). Trigger contexts are small.
const MAX_REQUEST_BODY_BYTES: usize = 64 * 1024;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Rule catalog plus the playback controller.
    pub engine: Arc<AnnouncementEngine>,
    /// Bind tokens and watcher associations.
    pub sessions: SessionRegistry,
    /// Upstream flight-plan lookups.
    pub flight_plans: Arc<FlightPlanClient>,
    /// Engine events re-published for the SSE stream.
    pub events_tx: broadcast::Sender<EngineEvent>,
}

impl AppState {
    /// Builds the state and subscribes the SSE broadcast channel to the engine.
    pub fn new(
        engine: Arc<AnnouncementEngine>,
        sessions: SessionRegistry,
        flight_plans: FlightPlanClient,
    ) -> Self {
        let (events_tx, _) = broadcast::channel(EVENT_BROADCAST_CAPACITY);
        let tx = events_tx.clone();
        engine
            .controller()
            .subscribe(Arc::new(move |event: &EngineEvent| {
                // Err only means no SSE client is listening right now.
                let _ = tx.send(event.clone());
            }));

        Self {
            engine,
            sessions,
            flight_plans: Arc::new(flight_plans),
            events_tx,
        }
    }
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(api::health_handler))
        .route("/bind", post(api::bind_handler))
        .route("/trigger", post(api::trigger_handler))
        .route("/control", post(api::control_handler))
        .route("/triggers", get(api::list_triggers_handler))
        .route("/flight/{id}", get(api::flight_handler))
        .route("/snapshot", get(api::snapshot_handler))
        .route("/events/stream", get(api_sse::event_stream_handler))
        .route("/ws", get(api_ws::ws_handler))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(Arc::new(state)))
}
