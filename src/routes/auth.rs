//! Auth routes — account registration, login, bearer-token extraction.

use axum::extract::{FromRef, State};
use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use axum::response::Json;
use serde::{Deserialize, Serialize};

use crate::services::auth::{self, AuthError, AuthedUser, PublicUser};
use crate::state::AppState;

// =============================================================================
// AUTH EXTRACTOR
// =============================================================================

/// Authenticated user extracted from the `Authorization: Bearer` header.
/// Use as a handler parameter to require authentication.
pub struct AuthUser {
    pub user: AuthedUser,
}

impl<S> axum::extract::FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut axum::http::request::Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(&parts.headers) else {
            return Err(StatusCode::UNAUTHORIZED);
        };

        let app_state = AppState::from_ref(state);
        let user = auth::authenticate_token(&app_state.pool, &app_state.jwt, token)
            .await
            .map_err(auth_error_to_status)?;

        Ok(Self { user })
    }
}

pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

pub(crate) fn auth_error_to_status(err: AuthError) -> StatusCode {
    match err {
        AuthError::MissingToken
        | AuthError::InvalidToken
        | AuthError::ExpiredToken
        | AuthError::UnknownUser
        | AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
        AuthError::UsernameTaken | AuthError::EmailTaken => StatusCode::CONFLICT,
        AuthError::MissingSecret | AuthError::Encode(_) => StatusCode::INTERNAL_SERVER_ERROR,
        AuthError::Db(e) => {
            tracing::error!(error = %e, "auth query failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

#[derive(Deserialize)]
pub struct RegisterBody {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginBody {
    pub email: String,
    pub password: String,
}

/// Register/login response: a bearer token plus the account it names.
#[derive(Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: PublicUser,
}

#[derive(Serialize)]
pub struct MeResponse {
    pub user: PublicUser,
}

/// `POST /api/auth/register` — create an account and mint its first token.
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterBody>,
) -> Result<(StatusCode, Json<AuthResponse>), StatusCode> {
    let username = body.username.trim();
    let email = body.email.trim();
    if username.is_empty() || email.is_empty() || body.password.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let user = auth::register(&state.pool, username, email, &body.password)
        .await
        .map_err(auth_error_to_status)?;
    let token = auth::mint_token(&state.jwt, user.id).map_err(auth_error_to_status)?;

    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}

/// `POST /api/auth/login` — verify credentials and mint a token.
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginBody>,
) -> Result<Json<AuthResponse>, StatusCode> {
    let email = body.email.trim();
    if email.is_empty() || body.password.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let user = auth::login(&state.pool, email, &body.password)
        .await
        .map_err(auth_error_to_status)?;
    let token = auth::mint_token(&state.jwt, user.id).map_err(auth_error_to_status)?;

    Ok(Json(AuthResponse { token, user }))
}

/// `GET /api/auth/me` — return the account behind the bearer token.
pub async fn me(State(state): State<AppState>, auth: AuthUser) -> Result<Json<MeResponse>, StatusCode> {
    let user = auth::fetch_public_user(&state.pool, auth.user.id)
        .await
        .map_err(auth_error_to_status)?;
    Ok(Json(MeResponse { user }))
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
