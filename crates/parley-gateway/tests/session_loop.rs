//! Session loop tests against a real WebSocket connection.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
    Router as AxumRouter,
};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message as WsMessage;

use parley_db::Database;
use parley_gateway::registry::Registry;
use parley_gateway::router::Router;
use parley_gateway::session;

#[derive(Clone)]
struct TestState {
    registry: Registry,
    router: Router,
    username: String,
}

async fn ws_handler(State(state): State<TestState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| session::run(socket, state.registry, state.router, state.username))
}

/// Serve one session for `username` on an ephemeral port.
async fn serve_session(registry: Registry, router: Router, username: &str) -> SocketAddr {
    let app = AxumRouter::new().route("/ws", get(ws_handler)).with_state(TestState {
        registry,
        router,
        username: username.to_string(),
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn connect(
    addr: SocketAddr,
) -> tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
> {
    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", addr))
        .await
        .unwrap();

    // First frame is always Ready
    let first = ws.next().await.unwrap().unwrap();
    assert!(first.into_text().unwrap().contains("Ready"));
    ws
}

async fn wait_until<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..100 {
        if condition().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not reached within 2s");
}

#[tokio::test]
async fn valid_frame_is_routed_and_session_stays_open() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let registry = Registry::new();
    let router = Router::new(db.clone(), registry.clone());
    let addr = serve_session(registry.clone(), router, "alice").await;

    let mut ws = connect(addr).await;
    assert!(registry.is_connected("alice").await);

    ws.send(WsMessage::Text(
        r#"{"recipient_id":"bob","content":"hi"}"#.into(),
    ))
    .await
    .unwrap();

    let db_poll = db.clone();
    wait_until(move || {
        let db = db_poll.clone();
        async move { db.messages_between("alice", "bob").unwrap().len() == 1 }
    })
    .await;

    assert!(registry.is_connected("alice").await);
}

#[tokio::test]
async fn decode_error_closes_session_and_unregisters() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let registry = Registry::new();
    let router = Router::new(db.clone(), registry.clone());
    let addr = serve_session(registry.clone(), router, "alice").await;

    let mut ws = connect(addr).await;
    assert!(registry.is_connected("alice").await);

    // Long garbage with a multi-byte character straddling the log-truncation
    // cut; the session must close cleanly, not keep reading.
    let garbage = format!("{}é{}", "x".repeat(199), "x".repeat(120));
    ws.send(WsMessage::Text(garbage.into())).await.unwrap();

    let registry_poll = registry.clone();
    wait_until(move || {
        let registry = registry_poll.clone();
        async move { !registry.is_connected("alice").await }
    })
    .await;

    // Nothing was routed from the bad frame
    assert!(db.messages_between("alice", "bob").unwrap().is_empty());
}
