use crate::auth::AuthUser;
use crate::db;
use crate::error::PollError;
use crate::polls::{OptionInput, OptionResponse, owned_poll};
use crate::startup::AppState;
use axum::{
    extract::{Extension, Json, Path},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct UpdateOptionRequest {
    pub title: Option<String>,
    pub description: Option<String>,
}

pub async fn list_options(
    Extension(app_state): Extension<AppState>,
    Path(poll_id): Path<i64>,
) -> Result<impl IntoResponse, PollError> {
    if !db::poll_exists(&app_state.db, poll_id).await? {
        return Err(PollError::PollNotFound);
    }

    let options: Vec<OptionResponse> = db::get_poll_options(&app_state.db, poll_id)
        .await?
        .into_iter()
        .map(OptionResponse::from)
        .collect();

    Ok((StatusCode::OK, Json(options)))
}

pub async fn get_option(
    Extension(app_state): Extension<AppState>,
    Path((poll_id, option_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, PollError> {
    if !db::poll_exists(&app_state.db, poll_id).await? {
        return Err(PollError::PollNotFound);
    }

    let option = db::get_poll_option(&app_state.db, poll_id, option_id)
        .await?
        .ok_or(PollError::OptionNotFound)?;

    Ok((StatusCode::OK, Json(OptionResponse::from(option))))
}

/// Add an option to a poll (poll owner only)
pub async fn create_option(
    Extension(app_state): Extension<AppState>,
    user: AuthUser,
    Path(poll_id): Path<i64>,
    Json(payload): Json<OptionInput>,
) -> Result<impl IntoResponse, PollError> {
    if payload.title.trim().is_empty() {
        return Err(PollError::InvalidRequest);
    }
    owned_poll(&app_state.db, poll_id, &user).await?;

    let option = db::add_poll_option(
        &app_state.db,
        poll_id,
        payload.title.trim(),
        &payload.description,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(OptionResponse::from(option))))
}

pub async fn update_option(
    Extension(app_state): Extension<AppState>,
    user: AuthUser,
    Path((poll_id, option_id)): Path<(i64, i64)>,
    Json(payload): Json<UpdateOptionRequest>,
) -> Result<impl IntoResponse, PollError> {
    if payload.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err(PollError::InvalidRequest);
    }
    owned_poll(&app_state.db, poll_id, &user).await?;
    db::get_poll_option(&app_state.db, poll_id, option_id)
        .await?
        .ok_or(PollError::OptionNotFound)?;

    db::update_poll_option(
        &app_state.db,
        option_id,
        payload.title.as_deref(),
        payload.description.as_deref(),
    )
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_option(
    Extension(app_state): Extension<AppState>,
    user: AuthUser,
    Path((poll_id, option_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, PollError> {
    owned_poll(&app_state.db, poll_id, &user).await?;
    db::get_poll_option(&app_state.db, poll_id, option_id)
        .await?
        .ok_or(PollError::OptionNotFound)?;

    db::delete_poll_option(&app_state.db, option_id).await?;

    Ok(StatusCode::NO_CONTENT)
}
