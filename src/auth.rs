use crate::db;
use crate::error::AuthError;
use crate::startup::AppState;
use axum::{
    async_trait,
    extract::{Extension, FromRequestParts, Json, Query},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION, request::Parts},
    response::IntoResponse,
};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: &'static str,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
}

/// The caller behind a valid bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

pub fn create_access_token(
    user_id: i64,
    secret: &str,
    ttl: chrono::Duration,
) -> Result<String, AuthError> {
    let now = chrono::Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        iat: now.timestamp() as usize,
        exp: (now + ttl).timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| AuthError::TokenCreationError)
}

pub fn decode_access_token(token: &str, secret: &str) -> Result<Claims, AuthError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )?;
    Ok(data.claims)
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") || token.trim().is_empty() {
        return None;
    }
    Some(token.trim().to_string())
}

// Browsers cannot attach headers to a WebSocket upgrade, so the live
// endpoint also accepts `?token=`.
fn query_token(parts: &Parts) -> Option<String> {
    Query::<TokenQuery>::try_from_uri(&parts.uri)
        .ok()
        .and_then(|Query(q)| q.token)
        .filter(|token| !token.is_empty())
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .or_else(|| query_token(parts))
            .ok_or(AuthError::Unauthorized)?;

        let app_state = parts
            .extensions
            .get::<AppState>()
            .cloned()
            .ok_or(AuthError::Unauthorized)?;

        let claims = decode_access_token(&token, &app_state.config.jwt_secret)?;
        let user_id: i64 = claims.sub.parse().map_err(|_| AuthError::InvalidToken)?;

        let user = db::get_user(&app_state.db, user_id)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        Ok(AuthUser {
            id: user.id,
            username: user.username,
            email: user.email,
        })
    }
}

pub async fn hash_password(password: String) -> Result<String, AuthError> {
    hash_password_with_cost(password, bcrypt::DEFAULT_COST).await
}

async fn hash_password_with_cost(password: String, cost: u32) -> Result<String, AuthError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|_| AuthError::PasswordHash)?
        .map_err(AuthError::from)
}

pub async fn verify_password(password: String, hashed: String) -> Result<bool, AuthError> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hashed))
        .await
        .map_err(|_| AuthError::PasswordHash)?
        .map_err(AuthError::from)
}

fn validate_new_user(new_user: &NewUser) -> Result<(), AuthError> {
    if new_user.username.trim().is_empty()
        || !new_user.email.contains('@')
        || new_user.password.is_empty()
    {
        return Err(AuthError::InvalidRequest);
    }
    Ok(())
}

pub async fn register(
    Extension(app_state): Extension<AppState>,
    Json(new_user): Json<NewUser>,
) -> Result<impl IntoResponse, AuthError> {
    validate_new_user(&new_user)?;

    let hashed_password = hash_password(new_user.password).await?;
    let user = db::create_user(
        &app_state.db,
        new_user.username.trim(),
        &new_user.email,
        &hashed_password,
    )
    .await?;

    info!(user_id = user.id, "user registered");

    let access_token =
        create_access_token(user.id, &app_state.config.jwt_secret, app_state.config.token_ttl)?;
    Ok((
        StatusCode::CREATED,
        Json(LoginResponse {
            access_token,
            token_type: "bearer",
        }),
    ))
}

pub async fn login(
    Extension(app_state): Extension<AppState>,
    Json(credentials): Json<Credentials>,
) -> Result<impl IntoResponse, AuthError> {
    let user = db::get_user_by_email(&app_state.db, &credentials.email)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

    if !verify_password(credentials.password, user.hashed_password).await? {
        warn!(user_id = user.id, "login with wrong password");
        return Err(AuthError::InvalidCredentials);
    }

    let access_token =
        create_access_token(user.id, &app_state.config.jwt_secret, app_state.config.token_ttl)?;
    Ok((
        StatusCode::OK,
        Json(LoginResponse {
            access_token,
            token_type: "bearer",
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, Request};

    const SECRET: &str = "test-secret";

    #[test]
    fn token_round_trip() {
        let token = create_access_token(42, SECRET, chrono::Duration::hours(1)).unwrap();
        let claims = decode_access_token(&token, SECRET).unwrap();
        assert_eq!(claims.sub, "42");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let token = create_access_token(42, "other", chrono::Duration::hours(1)).unwrap();
        assert!(matches!(
            decode_access_token(&token, SECRET),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = create_access_token(42, SECRET, chrono::Duration::hours(-2)).unwrap();
        assert!(decode_access_token(&token, SECRET).is_err());
    }

    #[test]
    fn parses_bearer_header() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers).as_deref(), Some("abc.def"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn reads_token_from_query() {
        let (parts, _) = Request::builder()
            .uri("/polls/7/live?token=xyz")
            .body(())
            .unwrap()
            .into_parts();
        assert_eq!(query_token(&parts).as_deref(), Some("xyz"));

        let (parts, _) = Request::builder()
            .uri("/polls/7/live")
            .body(())
            .unwrap()
            .into_parts();
        assert_eq!(query_token(&parts), None);
    }

    #[test]
    fn rejects_incomplete_registration() {
        let user = NewUser {
            username: " ".to_string(),
            email: "a@b.c".to_string(),
            password: "pw".to_string(),
        };
        assert!(matches!(validate_new_user(&user), Err(AuthError::InvalidRequest)));

        let user = NewUser {
            username: "ana".to_string(),
            email: "not-an-email".to_string(),
            password: "pw".to_string(),
        };
        assert!(validate_new_user(&user).is_err());
    }

    #[tokio::test]
    async fn password_hash_verifies() {
        let hashed = hash_password_with_cost("hunter2".to_string(), 4).await.unwrap();
        assert!(verify_password("hunter2".to_string(), hashed.clone()).await.unwrap());
        assert!(!verify_password("hunter3".to_string(), hashed).await.unwrap());
    }
}
