use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};

use parley_types::api::{Claims, UpdateUserRequest, UserListResponse, UserResponse};

use crate::auth::AppState;

pub async fn get_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let user = state
        .db
        .get_user_by_username(&username)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;

    let user = user.into_user();
    Ok(Json(UserResponse {
        username: user.username,
        language: user.language,
        created_at: user.created_at,
    }))
}

pub async fn list_users(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let users = state
        .db
        .list_usernames()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(UserListResponse { users }))
}

/// Update the language preference. Users may only update themselves.
pub async fn update_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    if claims.sub != username {
        return Err(StatusCode::FORBIDDEN);
    }
    if req.language.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let updated = state
        .db
        .update_user_language(&username, &req.language)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    if !updated {
        return Err(StatusCode::NOT_FOUND);
    }

    let user = state
        .db
        .get_user_by_username(&username)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?
        .into_user();

    Ok(Json(UserResponse {
        username: user.username,
        language: user.language,
        created_at: user.created_at,
    }))
}

/// Delete the user row. Messages are retained as an audit trail; the
/// schema has no cascade.
pub async fn delete_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    if claims.sub != username {
        return Err(StatusCode::FORBIDDEN);
    }

    let deleted = state
        .db
        .delete_user(&username)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    if !deleted {
        return Err(StatusCode::NOT_FOUND);
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Distinct usernames the authenticated user has sent messages to.
pub async fn contacts(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let users = state
        .db
        .contacts_of(&claims.sub)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(UserListResponse { users }))
}
