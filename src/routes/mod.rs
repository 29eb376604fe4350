//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! This module binds the HTTP API and the collaboration websocket under a
//! single Axum router. Browser clients authenticate over `/api/auth`, manage
//! projects over `/api/projects`, run code through `/api/execute`, and hold
//! one live socket to `/api/ws` per editor tab.

pub mod auth;
pub mod execute;
pub mod projects;
pub mod ws;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Full API surface, CORS-open for browser editors on other origins.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/me", get(auth::me))
        .route("/api/projects", get(projects::list_projects).post(projects::create_project))
        .route(
            "/api/projects/{id}",
            get(projects::get_project).delete(projects::delete_project),
        )
        .route("/api/projects/{id}/files", put(projects::update_files))
        .route("/api/projects/{id}/collaborators", post(projects::add_collaborator))
        .route("/api/execute", post(execute::execute))
        .route("/api/execute/languages", get(execute::languages))
        .route("/api/ws", get(ws::handle_ws))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
