use crate::auth::AuthUser;
use crate::db::{self, DbPool, Poll, PollOption, Vote};
use crate::error::PollError;
use crate::startup::AppState;
use axum::{
    extract::{Extension, Json, Path},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use tracing::info;

// Request/Response DTOs
#[derive(Debug, Deserialize)]
pub struct OptionInput {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct CreatePollRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub options: Vec<OptionInput>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePollRequest {
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionResponse {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub votes_count: i64,
}

/// Full poll state: the HTTP representation and the live `connect` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollResponse {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub user_id: i64,
    pub options: Vec<OptionResponse>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteResponse {
    pub id: i64,
    pub user_id: i64,
    pub poll_id: i64,
    pub option_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
}

impl From<PollOption> for OptionResponse {
    fn from(option: PollOption) -> Self {
        OptionResponse {
            id: option.id,
            title: option.title,
            description: option.description,
            votes_count: option.votes_count,
        }
    }
}

impl From<Vote> for VoteResponse {
    fn from(vote: Vote) -> Self {
        VoteResponse {
            id: vote.id,
            user_id: vote.user_id,
            poll_id: vote.poll_id,
            option_id: vote.option_id,
        }
    }
}

impl From<&AuthUser> for UserSummary {
    fn from(user: &AuthUser) -> Self {
        UserSummary {
            id: user.id,
            username: user.username.clone(),
        }
    }
}

impl PollResponse {
    pub fn new(poll: Poll, options: Vec<PollOption>) -> Self {
        PollResponse {
            id: poll.id,
            title: poll.title,
            description: poll.description,
            user_id: poll.user_id,
            options: options.into_iter().map(OptionResponse::from).collect(),
        }
    }
}

/// Current state of a poll with every option's tally, or `None` if the
/// poll does not exist.
pub async fn current_poll_snapshot(
    pool: &DbPool,
    poll_id: i64,
) -> Result<Option<PollResponse>, sqlx::Error> {
    let Some(poll) = db::get_poll(pool, poll_id).await? else {
        return Ok(None);
    };
    let options = db::get_poll_options(pool, poll_id).await?;
    Ok(Some(PollResponse::new(poll, options)))
}

/// Loads a poll and checks that `user` created it.
pub async fn owned_poll(pool: &DbPool, poll_id: i64, user: &AuthUser) -> Result<Poll, PollError> {
    let poll = db::get_poll(pool, poll_id)
        .await?
        .ok_or(PollError::PollNotFound)?;

    if poll.user_id != user.id {
        return Err(PollError::Forbidden);
    }
    Ok(poll)
}

fn validate_create(payload: &CreatePollRequest) -> Result<(), PollError> {
    if payload.title.trim().is_empty() {
        return Err(PollError::InvalidRequest);
    }
    if payload.options.iter().any(|o| o.title.trim().is_empty()) {
        return Err(PollError::InvalidRequest);
    }
    Ok(())
}

fn validate_update(title: Option<&str>) -> Result<(), PollError> {
    match title {
        Some(title) if title.trim().is_empty() => Err(PollError::InvalidRequest),
        _ => Ok(()),
    }
}

/// List the current user's polls
pub async fn list_polls(
    Extension(app_state): Extension<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, PollError> {
    let polls = db::get_user_polls(&app_state.db, user.id).await?;

    let mut poll_responses = Vec::with_capacity(polls.len());
    for poll in polls {
        let options = db::get_poll_options(&app_state.db, poll.id).await?;
        poll_responses.push(PollResponse::new(poll, options));
    }

    Ok((StatusCode::OK, Json(poll_responses)))
}

/// Get a specific poll with all its options and vote counts
pub async fn get_poll(
    Extension(app_state): Extension<AppState>,
    Path(poll_id): Path<i64>,
) -> Result<impl IntoResponse, PollError> {
    let poll = current_poll_snapshot(&app_state.db, poll_id)
        .await?
        .ok_or(PollError::PollNotFound)?;

    Ok((StatusCode::OK, Json(poll)))
}

pub async fn create_poll(
    Extension(app_state): Extension<AppState>,
    user: AuthUser,
    Json(payload): Json<CreatePollRequest>,
) -> Result<impl IntoResponse, PollError> {
    validate_create(&payload)?;

    let options: Vec<(String, String)> = payload
        .options
        .into_iter()
        .map(|o| (o.title, o.description))
        .collect();

    let (poll, options) = db::create_poll(
        &app_state.db,
        user.id,
        payload.title.trim(),
        &payload.description,
        &options,
    )
    .await?;

    info!(poll_id = poll.id, user_id = user.id, "poll created");
    Ok((StatusCode::CREATED, Json(PollResponse::new(poll, options))))
}

pub async fn update_poll(
    Extension(app_state): Extension<AppState>,
    user: AuthUser,
    Path(poll_id): Path<i64>,
    Json(payload): Json<UpdatePollRequest>,
) -> Result<impl IntoResponse, PollError> {
    validate_update(payload.title.as_deref())?;
    owned_poll(&app_state.db, poll_id, &user).await?;

    db::update_poll(
        &app_state.db,
        poll_id,
        payload.title.as_deref(),
        payload.description.as_deref(),
    )
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_poll(
    Extension(app_state): Extension<AppState>,
    user: AuthUser,
    Path(poll_id): Path<i64>,
) -> Result<impl IntoResponse, PollError> {
    owned_poll(&app_state.db, poll_id, &user).await?;
    db::delete_poll(&app_state.db, poll_id).await?;

    info!(poll_id, user_id = user.id, "poll deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn poll_response_keeps_option_order_and_counts() {
        let poll = Poll {
            id: 7,
            user_id: 1,
            title: "Lunch".to_string(),
            description: "Where to?".to_string(),
            created_at: Utc::now(),
        };
        let options = vec![
            PollOption {
                id: 1,
                poll_id: 7,
                title: "Tacos".to_string(),
                description: String::new(),
                votes_count: 4,
            },
            PollOption {
                id: 2,
                poll_id: 7,
                title: "Ramen".to_string(),
                description: String::new(),
                votes_count: 0,
            },
        ];

        let response = PollResponse::new(poll, options);

        assert_eq!(response.id, 7);
        assert_eq!(response.options.len(), 2);
        assert_eq!(response.options[0].title, "Tacos");
        assert_eq!(response.options[0].votes_count, 4);
    }

    #[test]
    fn create_requires_titles() {
        let payload = CreatePollRequest {
            title: "  ".to_string(),
            description: String::new(),
            options: vec![],
        };
        assert!(matches!(validate_create(&payload), Err(PollError::InvalidRequest)));

        let payload = CreatePollRequest {
            title: "Lunch".to_string(),
            description: String::new(),
            options: vec![OptionInput {
                title: String::new(),
                description: String::new(),
            }],
        };
        assert!(validate_create(&payload).is_err());
    }

    #[test]
    fn update_allows_missing_title_but_not_blank() {
        assert!(validate_update(None).is_ok());
        assert!(validate_update(Some("New")).is_ok());
        assert!(validate_update(Some("")).is_err());
    }
}
