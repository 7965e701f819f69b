use crate::auth::{AuthUser, hash_password};
use crate::db;
use crate::error::AuthError;
use crate::polls::UserSummary;
use crate::startup::AppState;
use crate::votes;
use axum::{
    extract::{Extension, Json, Path},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

pub async fn get_profile(
    Extension(app_state): Extension<AppState>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, AuthError> {
    let user = db::get_user(&app_state.db, user_id)
        .await?
        .ok_or(AuthError::UserNotFound)?;

    Ok(Json(UserSummary {
        id: user.id,
        username: user.username,
    }))
}

pub async fn me(user: AuthUser) -> impl IntoResponse {
    Json(UserResponse {
        id: user.id,
        username: user.username,
        email: user.email,
    })
}

pub async fn update_me(
    Extension(app_state): Extension<AppState>,
    user: AuthUser,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, AuthError> {
    if payload.username.as_deref().is_some_and(|u| u.trim().is_empty())
        || payload.email.as_deref().is_some_and(|e| !e.contains('@'))
        || payload.password.as_deref().is_some_and(str::is_empty)
    {
        return Err(AuthError::InvalidRequest);
    }

    let hashed_password = match payload.password {
        Some(password) => Some(hash_password(password).await?),
        None => None,
    };

    db::update_user(
        &app_state.db,
        user.id,
        payload.username.as_deref().map(str::trim),
        payload.email.as_deref(),
        hashed_password.as_deref(),
    )
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_me(
    Extension(app_state): Extension<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, AuthError> {
    // tallies are lowered in the same transaction; viewers hear about it after commit
    let withdrawn = db::delete_user(&app_state.db, user.id).await?;
    info!(user_id = user.id, votes = withdrawn.len(), "user deleted");
    votes::announce_withdrawals(&app_state.live, withdrawn, &user).await;
    Ok(StatusCode::NO_CONTENT)
}
