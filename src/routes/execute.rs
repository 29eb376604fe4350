//! Code execution routes — a thin, rate-limited proxy in front of Piston.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use serde_json::json;

use crate::protocol::ErrorCode;
use crate::routes::auth::AuthUser;
use crate::services::execution::{ExecutionError, ExecutionResult, Runtime, filter_supported};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ExecuteBody {
    pub language: String,
    pub code: String,
    #[serde(default)]
    pub stdin: String,
}

/// Structured error body so the client console can show what failed and
/// whether retrying is worthwhile.
fn error_response(status: StatusCode, err: &(impl ErrorCode + ?Sized)) -> Response {
    (
        status,
        Json(json!({
            "error": err.to_string(),
            "code": err.error_code(),
            "retryable": err.retryable(),
        })),
    )
        .into_response()
}

pub(crate) fn execution_error_to_status(err: &ExecutionError) -> StatusCode {
    match err {
        ExecutionError::UnsupportedLanguage(_) => StatusCode::BAD_REQUEST,
        ExecutionError::Timeout => StatusCode::REQUEST_TIMEOUT,
        ExecutionError::Upstream { .. } | ExecutionError::Request(_) | ExecutionError::Parse(_) => {
            StatusCode::BAD_GATEWAY
        }
        ExecutionError::HttpClientBuild(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// `POST /api/execute` — run code remotely and return the normalized result.
pub async fn execute(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<ExecuteBody>,
) -> Result<Json<ExecutionResult>, Response> {
    let language = body.language.trim();
    if language.is_empty() || body.code.is_empty() {
        return Err((StatusCode::BAD_REQUEST, Json(json!({ "error": "language and code are required" })))
            .into_response());
    }

    if let Err(e) = state.rate_limiter.check_and_record(auth.user.id) {
        tracing::warn!(user_id = %auth.user.id, error = %e, "execution rate limited");
        return Err(error_response(StatusCode::TOO_MANY_REQUESTS, &e));
    }

    match state.runner.execute(language, &body.code, &body.stdin).await {
        Ok(result) => Ok(Json(result)),
        Err(e) => {
            tracing::warn!(language, error = %e, "execution failed");
            Err(error_response(execution_error_to_status(&e), &e))
        }
    }
}

/// `GET /api/execute/languages` — supported runtimes, as reported upstream.
/// Unauthenticated: the editor shows the language picker before login.
pub async fn languages(State(state): State<AppState>) -> Result<Json<Vec<Runtime>>, Response> {
    match state.runner.runtimes().await {
        Ok(runtimes) => Ok(Json(filter_supported(runtimes))),
        Err(e) => {
            tracing::warn!(error = %e, "runtime listing failed");
            Err(error_response(execution_error_to_status(&e), &e))
        }
    }
}

#[cfg(test)]
#[path = "execute_test.rs"]
mod tests;
