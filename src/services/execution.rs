//! Piston code-execution proxy.
//!
//! DESIGN
//! ======
//! Thin HTTP wrapper over the public Piston API, with parsing split into pure
//! functions for testability. The [`CodeRunner`] trait is the seam the routes
//! depend on; [`PistonClient`] is the production implementation and tests
//! substitute mocks.
//!
//! One upstream call per run request, never per keystroke. The request
//! ceiling is 15s so a wedged upstream fails fast instead of pinning the
//! handler; Piston itself gets shorter compile/run budgets.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::protocol::ErrorCode;

const DEFAULT_BASE_URL: &str = "https://emkc.org/api/v2/piston";
const REQUEST_TIMEOUT_SECS: u64 = 15;
const CONNECT_TIMEOUT_SECS: u64 = 10;
const COMPILE_TIMEOUT_MS: u64 = 10_000;
const RUN_TIMEOUT_MS: u64 = 3_000;

// =============================================================================
// LANGUAGES
// =============================================================================

/// Version-pinned runtime mapping for one editor language.
#[derive(Debug, Clone, Copy)]
pub struct LanguageSpec {
    pub language: &'static str,
    pub version: &'static str,
    pub file_name: &'static str,
}

pub const SUPPORTED_LANGUAGES: [&str; 5] = ["javascript", "typescript", "python", "cpp", "java"];

/// Look up the pinned Piston runtime for an editor language.
#[must_use]
pub fn language_spec(language: &str) -> Option<LanguageSpec> {
    let (language, version, file_name) = match language {
        "javascript" => ("javascript", "18.15.0", "main.js"),
        "typescript" => ("typescript", "5.0.3", "main.ts"),
        "python" => ("python", "3.10.0", "main.py"),
        "cpp" => ("cpp", "10.2.0", "main.cpp"),
        "java" => ("java", "15.0.2", "Main.java"),
        _ => return None,
    };
    Some(LanguageSpec { language, version, file_name })
}

// =============================================================================
// ERROR TYPE
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),
    #[error("code execution timed out")]
    Timeout,
    #[error("execution service error (status {status})")]
    Upstream { status: u16, body: String },
    #[error("execution request failed: {0}")]
    Request(String),
    #[error("execution response parse failed: {0}")]
    Parse(String),
    #[error("http client build failed: {0}")]
    HttpClientBuild(String),
}

impl ErrorCode for ExecutionError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::UnsupportedLanguage(_) => "E_UNSUPPORTED_LANGUAGE",
            Self::Timeout => "E_EXEC_TIMEOUT",
            Self::Upstream { .. } => "E_EXEC_UPSTREAM",
            Self::Request(_) => "E_EXEC_REQUEST",
            Self::Parse(_) => "E_EXEC_PARSE",
            Self::HttpClientBuild(_) => "E_CONFIG",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Timeout | Self::Upstream { .. } | Self::Request(_))
    }
}

// =============================================================================
// RESULT TYPES
// =============================================================================

/// Normalized outcome of a run, as shown in the client console.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal: Option<String>,
    pub language: String,
    pub version: String,
}

/// One runtime as reported by Piston's `/runtimes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Runtime {
    pub language: String,
    pub version: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// Keep only the runtimes this server has a pinned mapping for.
#[must_use]
pub fn filter_supported(runtimes: Vec<Runtime>) -> Vec<Runtime> {
    runtimes
        .into_iter()
        .filter(|r| language_spec(&r.language).is_some())
        .collect()
}

// =============================================================================
// RUNNER TRAIT
// =============================================================================

/// Abstraction over the execution backend so routes and tests can mock it.
#[async_trait::async_trait]
pub trait CodeRunner: Send + Sync {
    async fn execute(&self, language: &str, code: &str, stdin: &str) -> Result<ExecutionResult, ExecutionError>;

    async fn runtimes(&self) -> Result<Vec<Runtime>, ExecutionError>;
}

// =============================================================================
// PISTON CLIENT
// =============================================================================

pub struct PistonClient {
    http: reqwest::Client,
    base_url: String,
}

impl PistonClient {
    /// # Errors
    ///
    /// Returns [`ExecutionError::HttpClientBuild`] if the HTTP client fails
    /// to construct.
    pub fn new(base_url: String) -> Result<Self, ExecutionError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| ExecutionError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, base_url })
    }

    /// Build from `PISTON_BASE_URL`, defaulting to the public instance.
    ///
    /// # Errors
    ///
    /// Same as [`PistonClient::new`].
    pub fn from_env() -> Result<Self, ExecutionError> {
        let base_url = std::env::var("PISTON_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_owned());
        Self::new(base_url)
    }
}

#[async_trait::async_trait]
impl CodeRunner for PistonClient {
    async fn execute(&self, language: &str, code: &str, stdin: &str) -> Result<ExecutionResult, ExecutionError> {
        let spec = language_spec(language)
            .ok_or_else(|| ExecutionError::UnsupportedLanguage(language.to_owned()))?;

        let body = ExecuteRequest {
            language: spec.language,
            version: spec.version,
            files: vec![ExecuteFile { name: spec.file_name, content: code }],
            stdin,
            args: &[],
            compile_timeout: COMPILE_TIMEOUT_MS,
            run_timeout: RUN_TIMEOUT_MS,
        };

        let response = self
            .http
            .post(format!("{}/execute", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(request_error)?;
        if status != 200 {
            return Err(ExecutionError::Upstream { status, body: text });
        }

        parse_execute_response(&text, language, spec.version)
    }

    async fn runtimes(&self) -> Result<Vec<Runtime>, ExecutionError> {
        let response = self
            .http
            .get(format!("{}/runtimes", self.base_url))
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(request_error)?;
        if status != 200 {
            return Err(ExecutionError::Upstream { status, body: text });
        }

        serde_json::from_str(&text).map_err(|e| ExecutionError::Parse(e.to_string()))
    }
}

fn request_error(e: reqwest::Error) -> ExecutionError {
    if e.is_timeout() {
        ExecutionError::Timeout
    } else {
        ExecutionError::Request(e.to_string())
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Serialize)]
struct ExecuteRequest<'a> {
    language: &'a str,
    version: &'a str,
    files: Vec<ExecuteFile<'a>>,
    stdin: &'a str,
    args: &'a [String],
    compile_timeout: u64,
    run_timeout: u64,
}

#[derive(Serialize)]
struct ExecuteFile<'a> {
    name: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ExecuteResponse {
    run: Option<Stage>,
    compile: Option<Stage>,
}

#[derive(Deserialize, Default)]
struct Stage {
    #[serde(default)]
    stdout: String,
    #[serde(default)]
    stderr: String,
    code: Option<i32>,
    signal: Option<String>,
}

// =============================================================================
// PARSING
// =============================================================================

/// Normalize a Piston `/execute` response. Stderr prefers the run stage and
/// falls back to compile diagnostics; the exit code is the first non-zero
/// stage code, else 0.
fn parse_execute_response(json: &str, language: &str, version: &str) -> Result<ExecutionResult, ExecutionError> {
    let api: ExecuteResponse = serde_json::from_str(json).map_err(|e| ExecutionError::Parse(e.to_string()))?;

    let run = api.run.unwrap_or_default();
    let compile = api.compile.unwrap_or_default();

    let stderr = if run.stderr.is_empty() { compile.stderr } else { run.stderr };
    let exit_code = [run.code, compile.code]
        .into_iter()
        .flatten()
        .find(|c| *c != 0)
        .unwrap_or(0);

    Ok(ExecutionResult {
        stdout: run.stdout,
        stderr,
        exit_code,
        signal: run.signal,
        language: language.to_owned(),
        version: version.to_owned(),
    })
}

#[cfg(test)]
#[path = "execution_test.rs"]
mod tests;
