use crate::auth::AuthUser;
use crate::db;
use crate::error::{AuthError, HandshakeRejected};
use crate::live::PollId;
use crate::live::subscription::serve_subscriber;
use crate::polls::current_poll_snapshot;
use crate::startup::AppState;
use axum::{
    extract::{
        Extension, Path,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code},
    },
    response::IntoResponse,
};
use futures::StreamExt;
use tracing::{error, warn};

/// Upgrades `GET /polls/:poll_id/live` to a WebSocket that receives the
/// poll's events until either side closes it.
pub async fn poll_live(
    ws: WebSocketUpgrade,
    Extension(app_state): Extension<AppState>,
    Path(poll_id): Path<PollId>,
    user: Result<AuthUser, AuthError>,
) -> impl IntoResponse {
    let admission = admit(&app_state, poll_id, &user).await;

    ws.on_upgrade(move |socket| async move {
        match admission {
            Ok(()) => {
                let db = app_state.db.clone();
                let snapshot = async move {
                    current_poll_snapshot(&db, poll_id)
                        .await
                        .unwrap_or_else(|e| {
                            error!(poll_id, "poll snapshot failed after subscribing: {}", e);
                            None
                        })
                };
                let (sink, stream) = socket.split();
                serve_subscriber(&app_state.live, poll_id, snapshot, sink, stream).await;
            }
            Err(rejection) => reject(socket, rejection).await,
        }
    })
}

/// Checks the caller and the poll before anything is subscribed.
async fn admit(
    app_state: &AppState,
    poll_id: PollId,
    user: &Result<AuthUser, AuthError>,
) -> Result<(), HandshakeRejected> {
    match user {
        Ok(_) => {}
        Err(AuthError::DatabaseError(e)) => {
            error!(poll_id, "user lookup failed during handshake: {}", e);
            return Err(HandshakeRejected::Store);
        }
        Err(_) => return Err(HandshakeRejected::Unauthenticated),
    }

    let exists = db::poll_exists(&app_state.db, poll_id).await.map_err(|e| {
        error!(poll_id, "poll lookup failed during handshake: {}", e);
        HandshakeRejected::Store
    })?;
    if !exists {
        return Err(HandshakeRejected::PollNotFound(poll_id));
    }
    Ok(())
}

fn close_frame(rejection: &HandshakeRejected) -> CloseFrame<'static> {
    let code = match rejection {
        HandshakeRejected::Store => close_code::ERROR,
        HandshakeRejected::Unauthenticated | HandshakeRejected::PollNotFound(_) => {
            close_code::POLICY
        }
    };
    CloseFrame {
        code,
        reason: rejection.to_string().into(),
    }
}

async fn reject(mut socket: WebSocket, rejection: HandshakeRejected) {
    warn!("live handshake rejected: {}", rejection);
    let _ = socket
        .send(Message::Close(Some(close_frame(&rejection))))
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::startup::test_state;

    #[test]
    fn client_side_rejections_use_policy_violation() {
        let frame = close_frame(&HandshakeRejected::PollNotFound(7));
        assert_eq!(frame.code, close_code::POLICY);
        assert_eq!(frame.reason, "poll 7 does not exist");

        let frame = close_frame(&HandshakeRejected::Unauthenticated);
        assert_eq!(frame.code, close_code::POLICY);
    }

    #[test]
    fn store_failure_uses_internal_error() {
        assert_eq!(close_frame(&HandshakeRejected::Store).code, close_code::ERROR);
    }

    #[tokio::test]
    async fn anonymous_caller_is_rejected_without_subscribing() {
        let state = test_state();

        let admission = admit(&state, 7, &Err(AuthError::Unauthorized)).await;

        assert_eq!(admission, Err(HandshakeRejected::Unauthenticated));
        assert_eq!(state.live.registry().poll_count(), 0);
    }

    #[tokio::test]
    async fn bad_token_is_rejected_as_unauthenticated() {
        let state = test_state();

        let admission = admit(&state, 7, &Err(AuthError::InvalidToken)).await;

        assert_eq!(admission, Err(HandshakeRejected::Unauthenticated));
        assert_eq!(state.live.registry().connection_count(), 0);
    }

    #[tokio::test]
    async fn user_lookup_outage_closes_as_internal_error() {
        let state = test_state();
        let outage = Err(AuthError::DatabaseError("pool timed out".to_string()));

        let admission = admit(&state, 7, &outage).await;

        assert_eq!(admission, Err(HandshakeRejected::Store));
        assert_eq!(close_frame(&HandshakeRejected::Store).code, close_code::ERROR);
        assert_eq!(state.live.registry().poll_count(), 0);
    }
}
