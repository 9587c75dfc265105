use serde::{Deserialize, Serialize};

// -- JWT Claims --

/// JWT claims shared between parley-api (REST middleware) and
/// parley-server (WebSocket upgrade). `sub` is the username — usernames
/// are the primary key throughout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Returned by both register and login. The password hash never leaves
/// the server; the token is ephemeral and never persisted.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub username: String,
    pub language: String,
    pub token: String,
}

// -- Users --

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub username: String,
    pub language: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateUserRequest {
    pub language: String,
}

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub users: Vec<String>,
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub recipient_id: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub id: i64,
    pub sender_id: String,
    pub recipient_id: String,
    pub content: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<crate::models::Message> for MessageResponse {
    fn from(msg: crate::models::Message) -> Self {
        Self {
            id: msg.id,
            sender_id: msg.sender_id,
            recipient_id: msg.recipient_id,
            content: msg.content,
            created_at: msg.created_at,
        }
    }
}
