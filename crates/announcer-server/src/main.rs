//! Announcer server binary.
//!
//! Loads the rule catalog, starts playback, and serves the HTTP, SSE and
//! WebSocket adapters with structured logging and graceful shutdown on
//! SIGTERM/SIGINT.

use announcer_engine::{
    run_completions, AnnouncementEngine, NoopPlayer, Player, RuleCatalog, TimedPlayer,
};
use announcer_flightplan::FlightPlanClient;
use announcer_server::{app, config, AppState};
use announcer_session::SessionRegistry;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

fn resolve_config_path() -> (Option<String>, &'static str) {
    if let Some(path) = std::env::args()
        .nth(1)
        .filter(|value| !value.trim().is_empty())
    {
        return (Some(path), "cli-arg");
    }

    if let Ok(path) = std::env::var("ANNOUNCER_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return (Some(path), "env-var");
        }
    }

    (None, "default")
}

#[tokio::main]
async fn main() {
    let (resolved_config_path, config_source) = resolve_config_path();
    let selected_config_path = resolved_config_path.as_deref().or(Some("config.toml"));

    let config = config::load_config(selected_config_path)
        .expect("failed to load configuration: the server cannot start without valid config");

    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!(
        source = config_source,
        path = selected_config_path.unwrap_or("<none>"),
        "resolved startup configuration path"
    );

    let catalog = RuleCatalog::load(&config.catalog.path)
        .expect("failed to load announcement catalog: check catalog.path in config");

    let (player, completions): (Arc<dyn Player>, _) = if config.playback.simulate {
        let (player, completions) = TimedPlayer::new(config.playback.pacing());
        let player: Arc<dyn Player> = Arc::new(player);
        (player, Some(completions))
    } else {
        tracing::info!("playback simulation disabled; items stay current until skipped or stopped");
        let player: Arc<dyn Player> = Arc::new(NoopPlayer);
        (player, None)
    };

    let engine = Arc::new(AnnouncementEngine::new(
        catalog,
        player,
        config.catalog.audio_dir.clone(),
    ));
    if let Some(completions) = completions {
        tokio::spawn(run_completions(engine.controller().clone(), completions));
    }

    let sessions = SessionRegistry::new(config.auth.bind_secret.as_deref());
    if !sessions.requires_secret() {
        tracing::warn!("no bind secret configured; any client may obtain a token");
    }
    if config.flightplan.credentials().is_none() {
        tracing::warn!("flight-plan credentials not configured; /flight lookups will fail");
    }
    let flight_plans = FlightPlanClient::new(config.flightplan.clone());

    let app = app(AppState::new(engine, sessions, flight_plans));
    let addr = SocketAddr::new(config.server.host, config.server.port);

    tracing::info!(%addr, simulate = config.playback.simulate, "starting announcer server");

    let listener = TcpListener::bind(addr)
        .await
        .expect("failed to bind to address: is another process using this port?");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("server error");

    tracing::info!("announcer server shut down");
}

/// Waits for a SIGINT (Ctrl+C) or SIGTERM signal for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { tracing::info!("received SIGINT, initiating graceful shutdown"); }
        () = terminate => { tracing::info!("received SIGTERM, initiating graceful shutdown"); }
    }
}
