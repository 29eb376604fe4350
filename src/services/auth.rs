//! JWT issuance, verification, and account management.
//!
//! DESIGN
//! ======
//! Stateless bearer tokens: HS256 JWTs carrying the user id in `sub`.
//! A token is minted at register/login and checked on every authenticated
//! HTTP request and on the WebSocket upgrade. Verification is pure (no I/O);
//! callers that need the account follow up with `resolve_user`, which fails
//! closed when the row no longer exists. `authenticate_token` is the combined
//! path used by both the upgrade gate and the bearer extractor.
//!
//! Passwords are stored as `salt$hex(sha256(salt || password))`; verification
//! re-hashes with the stored salt and compares.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use crate::protocol::ErrorCode;

const DEFAULT_TTL_SECS: u64 = 604_800; // 7 days
const SALT_LEN: usize = 16;
const SALT_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

// =============================================================================
// ERROR TYPE
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("JWT_SECRET is not set")]
    MissingSecret,
    #[error("missing bearer token")]
    MissingToken,
    #[error("invalid token")]
    InvalidToken,
    #[error("expired token")]
    ExpiredToken,
    #[error("unknown user")]
    UnknownUser,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("username already taken")]
    UsernameTaken,
    #[error("email already registered")]
    EmailTaken,
    #[error("token encoding failed: {0}")]
    Encode(jsonwebtoken::errors::Error),
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

impl ErrorCode for AuthError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::MissingSecret => "E_CONFIG",
            Self::MissingToken => "E_MISSING_TOKEN",
            Self::InvalidToken => "E_INVALID_TOKEN",
            Self::ExpiredToken => "E_EXPIRED_TOKEN",
            Self::UnknownUser => "E_UNKNOWN_USER",
            Self::InvalidCredentials => "E_INVALID_CREDENTIALS",
            Self::UsernameTaken => "E_USERNAME_TAKEN",
            Self::EmailTaken => "E_EMAIL_TAKEN",
            Self::Encode(_) => "E_TOKEN_ENCODE",
            Self::Db(_) => "E_DATABASE",
        }
    }
}

// =============================================================================
// CONFIG
// =============================================================================

#[derive(Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub ttl_secs: u64,
}

impl JwtConfig {
    /// Read `JWT_SECRET` (required) and `JWT_TTL_SECS` (default: 7 days).
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MissingSecret`] when `JWT_SECRET` is unset or
    /// blank; the server must not start with signing disabled.
    pub fn from_env() -> Result<Self, AuthError> {
        let secret = std::env::var("JWT_SECRET")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .ok_or(AuthError::MissingSecret)?;
        let ttl_secs = std::env::var("JWT_TTL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_TTL_SECS);
        Ok(Self { secret, ttl_secs })
    }
}

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: u64,
}

/// The identity a verified token resolves to; attached to WebSocket
/// connections and to bearer-authenticated requests.
#[derive(Debug, Clone)]
pub struct AuthedUser {
    pub id: Uuid,
    pub username: String,
}

/// Account shape returned by the auth endpoints.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PublicUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
}

// =============================================================================
// TOKENS
// =============================================================================

/// Mint a signed token for a user id with the configured TTL.
///
/// # Errors
///
/// Returns [`AuthError::Encode`] if signing fails.
pub fn mint_token(config: &JwtConfig, user_id: Uuid) -> Result<String, AuthError> {
    let claims = Claims { sub: user_id, exp: unix_now() + config.ttl_secs };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(config.secret.as_bytes()))
        .map_err(AuthError::Encode)
}

/// Verify signature and expiry, returning the claims. Pure: no I/O.
///
/// # Errors
///
/// [`AuthError::ExpiredToken`] for an out-of-date `exp`; [`AuthError::InvalidToken`]
/// for anything else (bad signature, wrong shape, garbage input).
pub fn verify_token(config: &JwtConfig, token: &str) -> Result<Claims, AuthError> {
    let validation = Validation::new(Algorithm::HS256);
    let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());
    decode::<Claims>(token, &decoding_key, &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
            _ => AuthError::InvalidToken,
        })
}

/// Resolve a verified subject to its account.
///
/// # Errors
///
/// [`AuthError::UnknownUser`] when the row is gone (deleted account with a
/// still-live token).
pub async fn resolve_user(pool: &PgPool, user_id: Uuid) -> Result<AuthedUser, AuthError> {
    let row = sqlx::query_as::<_, (Uuid, String)>("SELECT id, username FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    let Some((id, username)) = row else {
        return Err(AuthError::UnknownUser);
    };
    Ok(AuthedUser { id, username })
}

/// Full token check: verify signature/expiry, then resolve the subject.
/// Used by the WebSocket upgrade gate and the bearer extractor.
///
/// # Errors
///
/// Any failure along the way; all of them map to a 401 at the boundary.
pub async fn authenticate_token(pool: &PgPool, config: &JwtConfig, token: &str) -> Result<AuthedUser, AuthError> {
    let claims = verify_token(config, token)?;
    resolve_user(pool, claims.sub).await
}

// =============================================================================
// PASSWORDS
// =============================================================================

#[must_use]
pub fn hash_password(password: &str) -> String {
    let salt = generate_salt();
    let digest = digest_password(&salt, password);
    format!("{salt}${digest}")
}

#[must_use]
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt, digest)) = stored.split_once('$') else {
        return false;
    };
    digest_password(salt, password) == digest
}

fn generate_salt() -> String {
    let mut rng = rand::rng();
    (0..SALT_LEN)
        .map(|_| {
            let idx = rng.random_range(0..SALT_ALPHABET.len());
            SALT_ALPHABET[idx] as char
        })
        .collect()
}

fn digest_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    let bytes = hasher.finalize();
    bytes.iter().map(|b| format!("{b:02x}")).collect::<String>()
}

// =============================================================================
// ACCOUNTS
// =============================================================================

/// Create an account and return its public shape.
///
/// # Errors
///
/// [`AuthError::UsernameTaken`] / [`AuthError::EmailTaken`] when either
/// unique column is already in use.
pub async fn register(pool: &PgPool, username: &str, email: &str, password: &str) -> Result<PublicUser, AuthError> {
    let (username_taken, email_taken) = sqlx::query_as::<_, (bool, bool)>(
        r"SELECT
              EXISTS(SELECT 1 FROM users WHERE username = $1),
              EXISTS(SELECT 1 FROM users WHERE email = $2)",
    )
    .bind(username)
    .bind(email)
    .fetch_one(pool)
    .await?;

    if username_taken {
        return Err(AuthError::UsernameTaken);
    }
    if email_taken {
        return Err(AuthError::EmailTaken);
    }

    let password_hash = hash_password(password);
    let user = sqlx::query_as::<_, PublicUser>(
        r"INSERT INTO users (username, email, password_hash)
          VALUES ($1, $2, $3)
          RETURNING id, username, email",
    )
    .bind(username)
    .bind(email)
    .bind(password_hash)
    .fetch_one(pool)
    .await?;

    Ok(user)
}

/// Check email + password and return the account.
///
/// # Errors
///
/// [`AuthError::InvalidCredentials`] for an unknown email or a wrong
/// password; callers cannot distinguish the two.
pub async fn login(pool: &PgPool, email: &str, password: &str) -> Result<PublicUser, AuthError> {
    let row = sqlx::query_as::<_, (Uuid, String, String, String)>(
        "SELECT id, username, email, password_hash FROM users WHERE email = $1",
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;

    let Some((id, username, email, password_hash)) = row else {
        return Err(AuthError::InvalidCredentials);
    };
    if !verify_password(password, &password_hash) {
        return Err(AuthError::InvalidCredentials);
    }
    Ok(PublicUser { id, username, email })
}

/// Fetch the public shape of an account by id.
///
/// # Errors
///
/// [`AuthError::UnknownUser`] when the row is absent.
pub async fn fetch_public_user(pool: &PgPool, user_id: Uuid) -> Result<PublicUser, AuthError> {
    let row = sqlx::query_as::<_, PublicUser>("SELECT id, username, email FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    row.ok_or(AuthError::UnknownUser)
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
