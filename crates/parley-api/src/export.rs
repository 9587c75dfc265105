use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Extension,
};
use tracing::error;

use parley_types::api::Claims;
use parley_types::models::Message;

use crate::auth::AppState;

/// Render a conversation as a downloadable CSV.
pub async fn export_messages(
    State(state): State<AppState>,
    Path((sender_id, recipient_id)): Path<(String, String)>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.db.clone();
    let rows = tokio::task::spawn_blocking(move || db.messages_between(&sender_id, &recipient_id))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let messages: Vec<Message> = rows.into_iter().map(|row| row.into_message()).collect();

    let body = messages_to_csv(&messages).map_err(|e| {
        error!("failed to render CSV export: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"messages.csv\"",
            ),
        ],
        body,
    ))
}

fn messages_to_csv(messages: &[Message]) -> anyhow::Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer.write_record(["ID", "SenderID", "RecipientID", "Content", "Timestamp"])?;
    for msg in messages {
        writer.write_record([
            msg.id.to_string().as_str(),
            &msg.sender_id,
            &msg.recipient_id,
            &msg.content,
            &msg.created_at.to_rfc3339(),
        ])?;
    }

    writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("csv flush failed: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn csv_has_header_and_one_row_per_message() {
        let messages = vec![
            Message {
                id: 1,
                sender_id: "alice".into(),
                recipient_id: "bob".into(),
                content: "hi".into(),
                created_at: chrono::Utc.with_ymd_and_hms(2026, 8, 25, 12, 0, 0).unwrap(),
            },
            Message {
                id: 2,
                sender_id: "bob".into(),
                recipient_id: "alice".into(),
                content: "hello, again".into(),
                created_at: chrono::Utc.with_ymd_and_hms(2026, 8, 25, 12, 0, 5).unwrap(),
            },
        ];

        let body = String::from_utf8(messages_to_csv(&messages).unwrap()).unwrap();
        let lines: Vec<&str> = body.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "ID,SenderID,RecipientID,Content,Timestamp");
        assert!(lines[1].starts_with("1,alice,bob,hi,"));
        // Content with a comma is quoted
        assert!(lines[2].contains("\"hello, again\""));
    }

    #[test]
    fn empty_conversation_exports_header_only() {
        let body = String::from_utf8(messages_to_csv(&[]).unwrap()).unwrap();
        assert_eq!(body.trim_end(), "ID,SenderID,RecipientID,Content,Timestamp");
    }
}
