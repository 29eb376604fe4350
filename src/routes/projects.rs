//! Project CRUD routes.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::routes::auth::AuthUser;
use crate::services::project::{self, FileNode, ProjectError, ProjectRow};
use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectResponse {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub language: String,
    pub template: String,
    pub owner_id: Uuid,
    pub is_public: bool,
    /// File tree as stored; clients parse it into [`FileNode`]s.
    pub files: serde_json::Value,
}

fn to_response(row: ProjectRow) -> ProjectResponse {
    ProjectResponse {
        id: row.id,
        name: row.name,
        description: row.description,
        language: row.language,
        template: row.template,
        owner_id: row.owner_id,
        is_public: row.is_public,
        files: row.files,
    }
}

#[derive(Deserialize)]
pub struct CreateProjectBody {
    pub name: String,
    pub description: Option<String>,
    pub language: String,
    pub template: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateFilesBody {
    pub files: Vec<FileNode>,
}

#[derive(Deserialize)]
pub struct AddCollaboratorBody {
    pub username: String,
}

/// `GET /api/projects` — list projects owned by or shared with the user.
pub async fn list_projects(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<ProjectResponse>>, StatusCode> {
    let rows = project::list_projects(&state.pool, auth.user.id)
        .await
        .map_err(project_error_to_status)?;
    Ok(Json(rows.into_iter().map(to_response).collect()))
}

/// `POST /api/projects` — create a project seeded from a language template.
pub async fn create_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateProjectBody>,
) -> Result<(StatusCode, Json<ProjectResponse>), StatusCode> {
    let name = body.name.trim();
    let language = body.language.trim();
    if name.is_empty() || language.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    let template = body.template.as_deref().unwrap_or("blank");

    let row = project::create_project(&state.pool, auth.user.id, name, body.description.as_deref(), language, template)
        .await
        .map_err(project_error_to_status)?;
    Ok((StatusCode::CREATED, Json(to_response(row))))
}

/// `GET /api/projects/:id` — fetch one project the user may view.
pub async fn get_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<Uuid>,
) -> Result<Json<ProjectResponse>, StatusCode> {
    let row = project::get_project(&state.pool, project_id, auth.user.id)
        .await
        .map_err(project_error_to_status)?;
    Ok(Json(to_response(row)))
}

/// `PUT /api/projects/:id/files` — replace the file tree.
pub async fn update_files(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<Uuid>,
    Json(body): Json<UpdateFilesBody>,
) -> Result<Json<ProjectResponse>, StatusCode> {
    let row = project::update_files(&state.pool, project_id, auth.user.id, &body.files)
        .await
        .map_err(project_error_to_status)?;
    Ok(Json(to_response(row)))
}

/// `DELETE /api/projects/:id` — owner-only delete.
pub async fn delete_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    project::delete_project(&state.pool, project_id, auth.user.id)
        .await
        .map_err(project_error_to_status)?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

/// `POST /api/projects/:id/collaborators` — owner grants edit access by username.
pub async fn add_collaborator(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<Uuid>,
    Json(body): Json<AddCollaboratorBody>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let username = body.username.trim();
    if username.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    project::add_collaborator(&state.pool, project_id, auth.user.id, username)
        .await
        .map_err(project_error_to_status)?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

pub(crate) fn project_error_to_status(err: ProjectError) -> StatusCode {
    match err {
        ProjectError::NotFound(_) | ProjectError::UnknownUsername(_) => StatusCode::NOT_FOUND,
        ProjectError::Forbidden(_) => StatusCode::FORBIDDEN,
        ProjectError::AlreadyCollaborator(_) => StatusCode::CONFLICT,
        ProjectError::Database(e) => {
            tracing::error!(error = %e, "project query failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

#[cfg(test)]
#[path = "projects_test.rs"]
mod tests;
