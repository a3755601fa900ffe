use announcer_engine::{AnnouncementEngine, NoopPlayer, RuleCatalog};
use announcer_flightplan::{FlightPlanClient, FlightPlanConfig};
use announcer_server::{app, AppState};
use announcer_session::SessionRegistry;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{
    connect_async, tungstenite::protocol::Message, MaybeTlsStream, WebSocketStream,
};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

const CATALOG: &str = r#"{
    "announcements": [
        {"id": "gear1", "trigger": "gear_down", "template": "Gear is {state}", "priority": 5},
        {"id": "evac", "trigger": "evacuate", "template": "Evacuate", "priority": 7}
    ]
}"#;

fn test_state() -> AppState {
    let catalog = RuleCatalog::from_json(CATALOG).unwrap();
    let engine = Arc::new(AnnouncementEngine::new(
        catalog,
        Arc::new(NoopPlayer),
        "/srv/audio",
    ));
    AppState::new(
        engine,
        SessionRegistry::new(None),
        FlightPlanClient::new(FlightPlanConfig::default()),
    )
}

async fn start_server(state: AppState) -> SocketAddr {
    let app = app(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });
    addr
}

async fn connect(addr: SocketAddr) -> Ws {
    let (ws, _) = connect_async(format!("ws://{}/ws", addr))
        .await
        .expect("failed to connect");
    ws
}

async fn send_json(ws: &mut Ws, value: Value) {
    ws.send(Message::Text(value.to_string().into()))
        .await
        .expect("failed to send");
}

async fn next_json(ws: &mut Ws) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("connection closed")
            .expect("websocket error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).expect("frame is not JSON");
        }
    }
}

/// Reads frames up to and including the first one of type `kind`.
async fn frames_until(ws: &mut Ws, kind: &str) -> Vec<Value> {
    let mut frames = Vec::new();
    loop {
        let frame = next_json(ws).await;
        let done = frame["type"] == kind;
        frames.push(frame);
        if done {
            return frames;
        }
    }
}

async fn register(ws: &mut Ws, token: &str) {
    send_json(ws, json!({"type": "register", "token": token})).await;
    let reply = next_json(ws).await;
    assert_eq!(reply, json!({"type": "register_response", "ok": true}));
}

#[tokio::test]
async fn snapshot_does_not_require_registration() {
    let addr = start_server(test_state()).await;
    let mut ws = connect(addr).await;

    send_json(&mut ws, json!({"type": "snapshot"})).await;
    let reply = next_json(&mut ws).await;
    assert_eq!(
        reply,
        json!({"type": "snapshot", "queue": [], "current": null, "paused": false})
    );
}

#[tokio::test]
async fn trigger_and_command_require_registration() {
    let addr = start_server(test_state()).await;
    let mut ws = connect(addr).await;

    send_json(&mut ws, json!({"type": "trigger", "trigger": "gear_down"})).await;
    assert_eq!(
        next_json(&mut ws).await,
        json!({"type": "ack", "ok": false, "error": "not registered"})
    );

    send_json(&mut ws, json!({"type": "command", "action": "pause"})).await;
    assert_eq!(
        next_json(&mut ws).await,
        json!({"type": "ack", "ok": false, "error": "not registered"})
    );
}

#[tokio::test]
async fn invalid_token_closes_connection() {
    let addr = start_server(test_state()).await;
    let mut ws = connect(addr).await;

    send_json(&mut ws, json!({"type": "register", "token": "bogus"})).await;
    assert_eq!(
        next_json(&mut ws).await,
        json!({"type": "register_response", "ok": false, "error": "invalid token"})
    );

    let closed = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match ws.next().await {
                None | Some(Err(_)) | Some(Ok(Message::Close(_))) => return true,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await
    .expect("connection was not closed");
    assert!(closed);
}

#[tokio::test]
async fn registered_trigger_broadcasts_to_every_observer() {
    let state = test_state();
    let token = state.sessions.issue(Some("cockpit"), None).unwrap().id;
    let sessions = state.sessions.clone();
    let addr = start_server(state).await;

    // An unregistered observer. The snapshot round trip guarantees its
    // subscription is live before anything is triggered.
    let mut observer = connect(addr).await;
    send_json(&mut observer, json!({"type": "snapshot"})).await;
    next_json(&mut observer).await;

    let mut ws = connect(addr).await;
    register(&mut ws, &token).await;
    assert!(sessions.watcher(&token).is_some());

    send_json(
        &mut ws,
        json!({"type": "trigger", "trigger": "gear_down", "context": {"state": "down"}}),
    )
    .await;

    let frames = frames_until(&mut ws, "ack").await;
    let kinds: Vec<&str> = frames.iter().map(|f| f["type"].as_str().unwrap()).collect();
    assert_eq!(
        kinds,
        vec!["queue_change", "playback_started", "queue_change", "ack"]
    );
    assert_eq!(frames[0]["snapshot"], json!([{"id": "gear1", "priority": 5}]));
    assert_eq!(frames[1]["item"]["text"], "Gear is down");
    assert_eq!(
        frames[3],
        json!({
            "type": "ack",
            "ok": true,
            "triggered": "gear_down",
            "enqueued": [{"id": "gear1", "priority": 5}]
        })
    );

    let seen = next_json(&mut observer).await;
    assert_eq!(seen["type"], "queue_change");
    assert_eq!(seen["snapshot"], json!([{"id": "gear1", "priority": 5}]));
}

#[tokio::test]
async fn unknown_trigger_acks_without_broadcast() {
    let state = test_state();
    let token = state.sessions.issue(Some("panel"), None).unwrap().id;
    let addr = start_server(state).await;

    let mut ws = connect(addr).await;
    register(&mut ws, &token).await;

    send_json(&mut ws, json!({"type": "trigger", "trigger": "nope"})).await;
    let frames = frames_until(&mut ws, "ack").await;
    assert_eq!(
        frames,
        vec![json!({"type": "ack", "ok": false, "error": "No announcements for trigger nope"})]
    );
}

#[tokio::test]
async fn commands_publish_and_acknowledge() {
    let state = test_state();
    let token = state.sessions.issue(Some("panel"), None).unwrap().id;
    let addr = start_server(state).await;

    let mut ws = connect(addr).await;
    register(&mut ws, &token).await;

    send_json(&mut ws, json!({"type": "command", "action": "Pause"})).await;
    let frames = frames_until(&mut ws, "ack").await;
    assert_eq!(
        frames,
        vec![
            json!({"type": "pause_changed", "paused": true}),
            json!({"type": "ack", "ok": true, "action": "pause"}),
        ]
    );

    send_json(&mut ws, json!({"type": "command", "action": "rewind"})).await;
    assert_eq!(
        next_json(&mut ws).await,
        json!({"type": "ack", "ok": false, "error": "unknown command"})
    );
}

#[tokio::test]
async fn malformed_message_reports_error_and_keeps_connection() {
    let addr = start_server(test_state()).await;
    let mut ws = connect(addr).await;

    ws.send(Message::Text("{not json".into())).await.unwrap();
    let reply = next_json(&mut ws).await;
    assert_eq!(reply["type"], "error");
    assert!(reply["error"].is_string());

    send_json(&mut ws, json!({"type": "snapshot"})).await;
    assert_eq!(next_json(&mut ws).await["type"], "snapshot");
}

#[tokio::test]
async fn closing_connection_detaches_watcher() {
    let state = test_state();
    let token = state.sessions.issue(Some("panel"), None).unwrap().id;
    let sessions = state.sessions.clone();
    let addr = start_server(state).await;

    let mut ws = connect(addr).await;
    register(&mut ws, &token).await;
    assert_eq!(sessions.watcher_count(), 1);

    ws.close(None).await.unwrap();

    for _ in 0..100 {
        if sessions.watcher_count() == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("watcher was not detached after close");
}
