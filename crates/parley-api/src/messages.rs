use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use tracing::{debug, error};

use parley_types::api::{Claims, MessageResponse, SendMessageRequest};

use crate::auth::AppState;

/// Persist one message from the authenticated sender and attempt live
/// delivery in the same call. Unlike the WebSocket path, store failures
/// here surface to the client as a 500 — the deliberate asymmetry between
/// the two transports.
pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    if req.recipient_id.is_empty() || req.content.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let receipt = state
        .router
        .route(&claims.sub, &req.recipient_id, &req.content)
        .await
        .map_err(|e| {
            error!("message from {} not stored: {}", claims.sub, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    debug!(
        "http send {} -> {}: {:?}",
        claims.sub, req.recipient_id, receipt.delivery
    );

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::from(receipt.message)),
    ))
}

/// Conversation between two users, chronological (the store's documented
/// order), identical for either ordering of the path parameters.
pub async fn get_messages_between(
    State(state): State<AppState>,
    Path((sender_id, recipient_id)): Path<(String, String)>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    // Run the blocking DB query off the async runtime
    let db = state.db.clone();
    let rows = tokio::task::spawn_blocking(move || db.messages_between(&sender_id, &recipient_id))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let messages: Vec<MessageResponse> = rows
        .into_iter()
        .map(|row| MessageResponse::from(row.into_message()))
        .collect();

    Ok(Json(messages))
}
