use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, info, warn};

use parley_types::frames::{ClientFrame, GatewayFrame};

use crate::registry::Registry;
use crate::router::{RouteError, Router};

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Handle one authenticated WebSocket connection. The bearer token was
/// already validated at the HTTP upgrade layer, so the session starts
/// registered and live.
///
/// Every exit path (peer close, read error, decode error, sink error,
/// heartbeat timeout) funnels through the guarded unregister at the
/// bottom, so a dead session never leaves a stale registry entry behind.
pub async fn run(socket: WebSocket, registry: Registry, router: Router, username: String) {
    let (mut sender, mut receiver) = socket.split();

    // Register first: overwrite-on-reconnect means a second login from a
    // new device displaces this user's previous connection.
    let (conn_id, mut frame_rx) = registry.register(&username).await;

    info!("{} connected to gateway", username);

    let ready = GatewayFrame::Ready {
        username: username.clone(),
    };
    if sender
        .send(Message::Text(serde_json::to_string(&ready).unwrap().into()))
        .await
        .is_err()
    {
        registry.unregister(&username, conn_id).await;
        return;
    }

    // Shared flag for heartbeat
    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward routed frames to the socket, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = frame_rx.recv() => {
                    let frame = match result {
                        Some(frame) => frame,
                        // Registry entry displaced by a reconnect
                        None => break,
                    };

                    let text = serde_json::to_string(&frame).unwrap();
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Read inbound frames and hand them to the router
    let username_recv = username.clone();
    let registry_recv = registry.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<ClientFrame>(&text) {
                    Ok(frame) => {
                        handle_frame(&router, &registry_recv, &username_recv, frame).await;
                    }
                    Err(e) => {
                        // An undecodable frame ends the session
                        warn!(
                            "{} bad frame, closing: {} -- raw: {}",
                            username_recv,
                            e,
                            truncate_for_log(&text)
                        );
                        break;
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    registry.unregister(&username, conn_id).await;
    info!("{} disconnected from gateway", username);
}

const MAX_LOGGED_FRAME_BYTES: usize = 200;

/// Cap a logged frame body without splitting a multi-byte character.
fn truncate_for_log(text: &str) -> &str {
    if text.len() <= MAX_LOGGED_FRAME_BYTES {
        return text;
    }
    let mut end = MAX_LOGGED_FRAME_BYTES;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Route one decoded frame. Router failures never kill the session; the
/// policy here is to tell the sender when their message was lost and stay
/// quiet about delivery problems (the message is already durable).
async fn handle_frame(router: &Router, registry: &Registry, username: &str, frame: ClientFrame) {
    if let Some(claimed) = &frame.sender_id {
        if claimed != username {
            debug!(
                "{} sent frame claiming sender '{}', using authenticated identity",
                username, claimed
            );
        }
    }

    match router.route(username, &frame.recipient_id, &frame.content).await {
        Ok(receipt) => {
            debug!(
                "routed message {} from {} to {}: {:?}",
                receipt.message.id, username, frame.recipient_id, receipt.delivery
            );
        }
        Err(RouteError::Store(e)) => {
            warn!("{} message to {} not stored: {}", username, frame.recipient_id, e);
            registry
                .send_to(
                    username,
                    GatewayFrame::Error {
                        reason: "message could not be stored".into(),
                        persisted: false,
                    },
                )
                .await;
        }
    }
}
