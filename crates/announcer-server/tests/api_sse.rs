use announcer_engine::{AnnouncementEngine, NoopPlayer, RuleCatalog};
use announcer_flightplan::{FlightPlanClient, FlightPlanConfig};
use announcer_server::{app, AppState};
use announcer_session::SessionRegistry;
use announcer_types::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::test]
async fn test_sse_engine_event_stream() {
    let catalog = RuleCatalog::from_json(
        r#"{"announcements": [{"id": "gear1", "trigger": "gear_down", "template": "Gear is {state}", "priority": 5}]}"#,
    )
    .unwrap();
    let engine = Arc::new(AnnouncementEngine::new(catalog, Arc::new(NoopPlayer), "audio"));
    let state = AppState::new(
        engine.clone(),
        SessionRegistry::new(None),
        FlightPlanClient::new(FlightPlanConfig::default()),
    );

    let app = app(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server_url = format!("http://{}", addr);

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    let client = reqwest::Client::new();
    let mut response = client
        .get(format!("{}/events/stream", server_url))
        .send()
        .await
        .expect("Failed to connect to SSE stream");
    assert!(response.status().is_success());

    // Wait a bit for the subscription to be established
    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

    let mut context = Context::new();
    context.insert("state".to_string(), "down".to_string());
    engine.dispatch("gear_down", &context).unwrap();

    // We expect "event: queue_change\ndata: {...}\n\n" first
    let chunk = response
        .chunk()
        .await
        .expect("Failed to read chunk")
        .expect("Stream closed");
    let chunk_str = String::from_utf8(chunk.to_vec()).unwrap();

    assert!(chunk_str.contains("event: queue_change"));
    assert!(chunk_str.contains("data:"));
    assert!(chunk_str.contains("gear1"));
}
