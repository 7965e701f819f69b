use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token creation error")]
    TokenCreationError,
    #[error("Incorrect credentials")]
    InvalidCredentials,
    #[error("User Not Found")]
    UserNotFound,
    #[error("User already exists")]
    UserAlreadyExists,
    #[error("Password hashing failed")]
    PasswordHash,
    #[error("Invalid request")]
    InvalidRequest,
    #[error("Database error: {0}")]
    DatabaseError(String),
}

#[derive(Error, Debug)]
pub enum PollError {
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Not allowed to modify this resource")]
    Forbidden,
    #[error("Invalid request")]
    InvalidRequest,
    #[error("Poll not found")]
    PollNotFound,
    #[error("Poll option not found")]
    OptionNotFound,
    #[error("Vote not found")]
    VoteNotFound,
    #[error("User already voted for this option")]
    AlreadyVoted,
    #[error("Database error: {0}")]
    DatabaseError(String),
}

/// Reasons a live connection is refused before it is subscribed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandshakeRejected {
    #[error("authentication required")]
    Unauthenticated,
    #[error("poll {0} does not exist")]
    PollNotFound(i64),
    #[error("poll store unavailable")]
    Store,
}

/// A single subscriber could not be reached during a broadcast.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("subscriber connection is closed")]
    Closed,
    #[error("subscriber did not accept the message in time")]
    TimedOut,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AuthError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized"),
            AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "Invalid token"),
            AuthError::TokenCreationError => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to create token")
            }
            AuthError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "Incorrect credentials"),
            AuthError::UserNotFound => (StatusCode::NOT_FOUND, "User not found"),
            AuthError::UserAlreadyExists => (StatusCode::CONFLICT, "User already exists"),
            AuthError::PasswordHash => (StatusCode::INTERNAL_SERVER_ERROR, "Password hashing failed"),
            AuthError::InvalidRequest => (StatusCode::BAD_REQUEST, "Invalid request"),
            AuthError::DatabaseError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Database error"),
        };

        let body = Json(json!({
            "error": error_message,
            "details": self.to_string()
        }));

        (status, body).into_response()
    }
}

impl IntoResponse for PollError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            PollError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized"),
            PollError::Forbidden => (StatusCode::FORBIDDEN, "Forbidden"),
            PollError::InvalidRequest => (StatusCode::BAD_REQUEST, "Invalid request"),
            PollError::PollNotFound => (StatusCode::NOT_FOUND, "Poll not found"),
            PollError::OptionNotFound => (StatusCode::NOT_FOUND, "Poll option not found"),
            PollError::VoteNotFound => (StatusCode::NOT_FOUND, "Vote not found"),
            PollError::AlreadyVoted => (StatusCode::CONFLICT, "User already voted for this option"),
            PollError::DatabaseError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Database error"),
        };

        let body = Json(json!({
            "error": error_message,
            "details": self.to_string()
        }));

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for PollError {
    fn from(error: sqlx::Error) -> Self {
        PollError::DatabaseError(error.to_string())
    }
}

impl From<sqlx::Error> for AuthError {
    fn from(error: sqlx::Error) -> Self {
        match &error {
            sqlx::Error::Database(db) if db.is_unique_violation() => AuthError::UserAlreadyExists,
            _ => AuthError::DatabaseError(error.to_string()),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(_: jsonwebtoken::errors::Error) -> Self {
        AuthError::InvalidToken
    }
}

impl From<bcrypt::BcryptError> for AuthError {
    fn from(_: bcrypt::BcryptError) -> Self {
        AuthError::PasswordHash
    }
}

impl From<AuthError> for PollError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::DatabaseError(msg) => PollError::DatabaseError(msg),
            _ => PollError::Unauthorized,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_errors_map_to_statuses() {
        assert_eq!(
            PollError::PollNotFound.into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            PollError::AlreadyVoted.into_response().status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            PollError::Forbidden.into_response().status(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn auth_errors_map_to_statuses() {
        assert_eq!(
            AuthError::InvalidCredentials.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::UserAlreadyExists.into_response().status(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn row_not_found_is_a_database_error() {
        let err: PollError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, PollError::DatabaseError(_)));
    }
}
