use super::*;
use crate::state::test_helpers::test_app_state;

fn headers_with_auth(value: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, value.parse().expect("valid header value"));
    headers
}

// =============================================================================
// BEARER TOKEN PARSING
// =============================================================================

#[test]
fn bearer_token_extracts_value() {
    let headers = headers_with_auth("Bearer abc.def.ghi");
    assert_eq!(bearer_token(&headers), Some("abc.def.ghi"));
}

#[test]
fn bearer_token_trims_whitespace() {
    let headers = headers_with_auth("Bearer   abc.def.ghi  ");
    assert_eq!(bearer_token(&headers), Some("abc.def.ghi"));
}

#[test]
fn bearer_token_missing_header_is_none() {
    assert_eq!(bearer_token(&HeaderMap::new()), None);
}

#[test]
fn bearer_token_rejects_other_schemes() {
    let headers = headers_with_auth("Basic dXNlcjpwYXNz");
    assert_eq!(bearer_token(&headers), None);
}

#[test]
fn bearer_token_rejects_empty_token() {
    let headers = headers_with_auth("Bearer ");
    assert_eq!(bearer_token(&headers), None);
}

#[test]
fn bearer_token_is_case_sensitive_on_scheme() {
    let headers = headers_with_auth("bearer abc");
    assert_eq!(bearer_token(&headers), None);
}

// =============================================================================
// ERROR MAPPING
// =============================================================================

#[test]
fn auth_errors_map_to_statuses() {
    let cases = [
        (AuthError::MissingToken, StatusCode::UNAUTHORIZED),
        (AuthError::InvalidToken, StatusCode::UNAUTHORIZED),
        (AuthError::ExpiredToken, StatusCode::UNAUTHORIZED),
        (AuthError::UnknownUser, StatusCode::UNAUTHORIZED),
        (AuthError::InvalidCredentials, StatusCode::UNAUTHORIZED),
        (AuthError::UsernameTaken, StatusCode::CONFLICT),
        (AuthError::EmailTaken, StatusCode::CONFLICT),
        (AuthError::MissingSecret, StatusCode::INTERNAL_SERVER_ERROR),
        (AuthError::Db(sqlx::Error::RowNotFound), StatusCode::INTERNAL_SERVER_ERROR),
    ];
    for (err, expected) in cases {
        assert_eq!(auth_error_to_status(err), expected);
    }
}

// =============================================================================
// HANDLER VALIDATION
// =============================================================================
// Empty-field checks run before any query, so a lazy (never-connected) pool
// is enough to exercise them.

#[tokio::test]
async fn register_rejects_blank_username() {
    let state = test_app_state();
    let body = RegisterBody { username: "   ".into(), email: "ada@example.com".into(), password: "pw".into() };

    let err = register(State(state), Json(body)).await.err().expect("should reject");
    assert_eq!(err, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn register_rejects_blank_email() {
    let state = test_app_state();
    let body = RegisterBody { username: "ada".into(), email: "".into(), password: "pw".into() };

    let err = register(State(state), Json(body)).await.err().expect("should reject");
    assert_eq!(err, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn register_rejects_empty_password() {
    let state = test_app_state();
    let body = RegisterBody { username: "ada".into(), email: "ada@example.com".into(), password: String::new() };

    let err = register(State(state), Json(body)).await.err().expect("should reject");
    assert_eq!(err, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn login_rejects_blank_fields() {
    let state = test_app_state();
    let body = LoginBody { email: "  ".into(), password: "pw".into() };
    let err = login(State(state.clone()), Json(body)).await.err().expect("should reject");
    assert_eq!(err, StatusCode::BAD_REQUEST);

    let body = LoginBody { email: "ada@example.com".into(), password: String::new() };
    let err = login(State(state), Json(body)).await.err().expect("should reject");
    assert_eq!(err, StatusCode::BAD_REQUEST);
}
