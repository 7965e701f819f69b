use crate::auth::AuthUser;
use crate::db::{self, VoteChange};
use crate::error::PollError;
use crate::live::{BroadcastEvent, LiveHub, VoteActivity};
use crate::polls::{OptionResponse, UserSummary, VoteResponse};
use crate::startup::AppState;
use axum::{
    extract::{Extension, Json, Path},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;

fn activity(change: VoteChange, user: &AuthUser) -> VoteActivity {
    VoteActivity {
        vote: VoteResponse::from(change.vote),
        option: OptionResponse::from(change.option),
        user: UserSummary::from(user),
    }
}

async fn ensure_option_in_poll(
    app_state: &AppState,
    poll_id: i64,
    option_id: i64,
) -> Result<(), PollError> {
    if !db::poll_exists(&app_state.db, poll_id).await? {
        return Err(PollError::PollNotFound);
    }
    db::get_poll_option(&app_state.db, poll_id, option_id)
        .await?
        .ok_or(PollError::OptionNotFound)?;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteAction {
    Cast,
    Withdrawn,
}

async fn publish(
    live: &LiveHub,
    action: VoteAction,
    change: VoteChange,
    user: &AuthUser,
) -> VoteResponse {
    info!(
        poll_id = change.vote.poll_id,
        option_id = change.vote.option_id,
        user_id = user.id,
        votes_count = change.option.votes_count,
        ?action,
        "vote change committed"
    );

    let poll_id = change.vote.poll_id;
    let activity = activity(change, user);
    let response = activity.vote.clone();
    let event = match action {
        VoteAction::Cast => BroadcastEvent::Vote(activity),
        VoteAction::Withdrawn => BroadcastEvent::Delete(activity),
    };
    live.broadcast(poll_id, &event).await;
    response
}

/// Pushes a committed vote change to the poll's viewers. `None` means the
/// store changed nothing, which is reported as an error with no broadcast.
pub async fn announce(
    live: &LiveHub,
    action: VoteAction,
    change: Option<VoteChange>,
    user: &AuthUser,
) -> Result<VoteResponse, PollError> {
    match (change, action) {
        (Some(change), _) => Ok(publish(live, action, change, user).await),
        (None, VoteAction::Cast) => Err(PollError::AlreadyVoted),
        (None, VoteAction::Withdrawn) => Err(PollError::VoteNotFound),
    }
}

/// One `delete` event per vote removed along with a deleted account.
pub async fn announce_withdrawals(live: &LiveHub, changes: Vec<VoteChange>, user: &AuthUser) {
    for change in changes {
        publish(live, VoteAction::Withdrawn, change, user).await;
    }
}

/// Cast a vote on a poll option (authenticated users only)
pub async fn vote(
    Extension(app_state): Extension<AppState>,
    user: AuthUser,
    Path((poll_id, option_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, PollError> {
    ensure_option_in_poll(&app_state, poll_id, option_id).await?;

    // cast_vote returns only after the transaction committed
    let change = db::cast_vote(&app_state.db, user.id, poll_id, option_id).await?;
    let response = announce(&app_state.live, VoteAction::Cast, change, &user).await?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// Withdraw the caller's vote on an option
pub async fn delete_vote(
    Extension(app_state): Extension<AppState>,
    user: AuthUser,
    Path((poll_id, option_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, PollError> {
    ensure_option_in_poll(&app_state, poll_id, option_id).await?;

    let change = db::withdraw_vote(&app_state.db, user.id, poll_id, option_id).await?;
    announce(&app_state.live, VoteAction::Withdrawn, change, &user).await?;

    Ok(StatusCode::NO_CONTENT)
}
