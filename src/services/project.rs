//! Project store — CRUD, language templates, and collaborator membership.
//!
//! DESIGN
//! ======
//! A project row carries its whole file tree in one jsonb column. The server
//! treats the tree as opaque once validated at the boundary: templates build
//! it, `update_files` replaces it wholesale, and reads hand it back verbatim.
//! Nothing here touches the live session registry — persisted files and
//! in-flight edits are deliberately separate worlds.
//!
//! Access is checked per operation: `View` admits owner, collaborator, or
//! anyone on a public project; `Edit` drops the public case; `Owner` is the
//! owner alone.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::protocol::ErrorCode;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("project not found: {0}")]
    NotFound(Uuid),
    #[error("not authorized for project {0}")]
    Forbidden(Uuid),
    #[error("no user named {0}")]
    UnknownUsername(String),
    #[error("{0} is already a collaborator")]
    AlreadyCollaborator(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ErrorCode for ProjectError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_PROJECT_NOT_FOUND",
            Self::Forbidden(_) => "E_PROJECT_FORBIDDEN",
            Self::UnknownUsername(_) => "E_UNKNOWN_USER",
            Self::AlreadyCollaborator(_) => "E_ALREADY_COLLABORATOR",
            Self::Database(_) => "E_DATABASE",
        }
    }
}

/// One node of a project file tree, stored verbatim in the `files` jsonb
/// column. Folders carry `children`; files carry `content`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileNode {
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default)]
    pub is_folder: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<FileNode>>,
}

/// Row shape returned by project queries.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProjectRow {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub language: String,
    pub template: String,
    pub owner_id: Uuid,
    pub is_public: bool,
    pub files: serde_json::Value,
}

/// Access level required for an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Owner, collaborator, or anyone when the project is public.
    View,
    /// Owner or collaborator.
    Edit,
    /// Owner only.
    Owner,
}

// =============================================================================
// TEMPLATES
// =============================================================================

const JS_BLANK_INDEX: &str = r#"console.log("Hello, World!");"#;

const NODE_PACKAGE_JSON: &str = r#"{
  "name": "my-project",
  "version": "1.0.0",
  "main": "index.js",
  "scripts": {
    "start": "node index.js"
  }
}"#;

const NODE_INDEX_JS: &str = r"const express = require('express');
const app = express();
const port = 3000;

app.get('/', (req, res) => {
  res.send('Hello World!');
});

app.listen(port, () => {
  console.log(`Server running at http://localhost:${port}`);
});";

const HTML_INDEX: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>My Project</title>
    <link rel="stylesheet" href="style.css">
</head>
<body>
    <h1>Hello, World!</h1>
    <script src="script.js"></script>
</body>
</html>"#;

const HTML_STYLE: &str = r"body {
    font-family: Arial, sans-serif;
    margin: 0;
    padding: 20px;
    background-color: #f0f0f0;
}

h1 {
    color: #333;
    text-align: center;
}";

const HTML_SCRIPT: &str = r#"console.log("Hello from JavaScript!");

// Add your JavaScript code here"#;

fn file(name: &str, path: &str, content: &str, language: &str) -> FileNode {
    FileNode {
        name: name.to_owned(),
        path: path.to_owned(),
        content: content.to_owned(),
        language: Some(language.to_owned()),
        is_folder: false,
        children: None,
    }
}

/// Seed files for a new project. Unknown language/template pairs fall back to
/// the javascript scratch file (which is also what `javascript`/`blank` is).
#[must_use]
pub fn template_files(language: &str, template: &str) -> Vec<FileNode> {
    match (language, template) {
        ("javascript", "node") => vec![
            file("package.json", "/package.json", NODE_PACKAGE_JSON, "json"),
            file("index.js", "/index.js", NODE_INDEX_JS, "javascript"),
        ],
        ("python", "blank") => vec![file("main.py", "/main.py", r#"print("Hello, World!")"#, "python")],
        ("html", "blank") => vec![
            file("index.html", "/index.html", HTML_INDEX, "html"),
            file("style.css", "/style.css", HTML_STYLE, "css"),
            file("script.js", "/script.js", HTML_SCRIPT, "javascript"),
        ],
        _ => vec![file("index.js", "/index.js", JS_BLANK_INDEX, "javascript")],
    }
}

// =============================================================================
// ACCESS
// =============================================================================

/// Check that a user may act on a project at the given level.
///
/// # Errors
///
/// [`ProjectError::NotFound`] when the project does not exist,
/// [`ProjectError::Forbidden`] when it exists but the user lacks the level.
pub async fn ensure_access(pool: &PgPool, project_id: Uuid, user_id: Uuid, access: Access) -> Result<(), ProjectError> {
    let row = sqlx::query_as::<_, (Uuid, bool, bool)>(
        r"SELECT owner_id, is_public,
                 EXISTS(SELECT 1 FROM project_collaborators
                        WHERE project_id = $1 AND user_id = $2)
          FROM projects WHERE id = $1",
    )
    .bind(project_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    let Some((owner_id, is_public, is_collaborator)) = row else {
        return Err(ProjectError::NotFound(project_id));
    };

    let allowed = match access {
        Access::View => owner_id == user_id || is_collaborator || is_public,
        Access::Edit => owner_id == user_id || is_collaborator,
        Access::Owner => owner_id == user_id,
    };
    if allowed {
        Ok(())
    } else {
        Err(ProjectError::Forbidden(project_id))
    }
}

// =============================================================================
// CRUD
// =============================================================================

/// Create a project seeded with template files.
///
/// # Errors
///
/// Returns a database error if the insert fails.
pub async fn create_project(
    pool: &PgPool,
    owner_id: Uuid,
    name: &str,
    description: Option<&str>,
    language: &str,
    template: &str,
) -> Result<ProjectRow, ProjectError> {
    let id = Uuid::new_v4();
    let files = serde_json::to_value(template_files(language, template)).unwrap_or_else(|_| serde_json::json!([]));

    let row = sqlx::query_as::<_, ProjectRow>(
        r"INSERT INTO projects (id, name, description, language, template, owner_id, files)
          VALUES ($1, $2, $3, $4, $5, $6, $7)
          RETURNING id, name, description, language, template, owner_id, is_public, files",
    )
    .bind(id)
    .bind(name)
    .bind(description)
    .bind(language)
    .bind(template)
    .bind(owner_id)
    .bind(files)
    .fetch_one(pool)
    .await?;

    info!(project_id = %row.id, %owner_id, language, "project created");
    Ok(row)
}

/// List projects the user owns or collaborates on, most recently edited
/// first.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_projects(pool: &PgPool, user_id: Uuid) -> Result<Vec<ProjectRow>, ProjectError> {
    let rows = sqlx::query_as::<_, ProjectRow>(
        r"SELECT id, name, description, language, template, owner_id, is_public, files
          FROM projects
          WHERE owner_id = $1
             OR EXISTS(SELECT 1 FROM project_collaborators
                       WHERE project_id = projects.id AND user_id = $1)
          ORDER BY updated_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Fetch one project the user may view.
///
/// # Errors
///
/// Access errors per [`ensure_access`], or a database error.
pub async fn get_project(pool: &PgPool, project_id: Uuid, user_id: Uuid) -> Result<ProjectRow, ProjectError> {
    ensure_access(pool, project_id, user_id, Access::View).await?;

    let row = sqlx::query_as::<_, ProjectRow>(
        "SELECT id, name, description, language, template, owner_id, is_public, files FROM projects WHERE id = $1",
    )
    .bind(project_id)
    .fetch_optional(pool)
    .await?;

    row.ok_or(ProjectError::NotFound(project_id))
}

/// Replace the project's file tree wholesale and bump `updated_at`.
///
/// # Errors
///
/// Access errors per [`ensure_access`] (`Edit` level), or a database error.
pub async fn update_files(
    pool: &PgPool,
    project_id: Uuid,
    user_id: Uuid,
    files: &[FileNode],
) -> Result<ProjectRow, ProjectError> {
    ensure_access(pool, project_id, user_id, Access::Edit).await?;

    let files = serde_json::to_value(files).unwrap_or_else(|_| serde_json::json!([]));
    let row = sqlx::query_as::<_, ProjectRow>(
        r"UPDATE projects SET files = $2, updated_at = now()
          WHERE id = $1
          RETURNING id, name, description, language, template, owner_id, is_public, files",
    )
    .bind(project_id)
    .bind(files)
    .fetch_optional(pool)
    .await?;

    row.ok_or(ProjectError::NotFound(project_id))
}

/// Delete a project. Collaborator rows go with it (FK cascade).
///
/// # Errors
///
/// Access errors per [`ensure_access`] (`Owner` level), or a database error.
pub async fn delete_project(pool: &PgPool, project_id: Uuid, user_id: Uuid) -> Result<(), ProjectError> {
    ensure_access(pool, project_id, user_id, Access::Owner).await?;

    sqlx::query("DELETE FROM projects WHERE id = $1")
        .bind(project_id)
        .execute(pool)
        .await?;

    info!(%project_id, "project deleted");
    Ok(())
}

/// Grant a user edit access by username. Owner-only.
///
/// # Errors
///
/// [`ProjectError::UnknownUsername`] when no such user exists,
/// [`ProjectError::AlreadyCollaborator`] on a repeat grant, plus access and
/// database errors.
pub async fn add_collaborator(
    pool: &PgPool,
    project_id: Uuid,
    owner_id: Uuid,
    username: &str,
) -> Result<(), ProjectError> {
    ensure_access(pool, project_id, owner_id, Access::Owner).await?;

    let row = sqlx::query_as::<_, (Uuid,)>("SELECT id FROM users WHERE username = $1")
        .bind(username)
        .fetch_optional(pool)
        .await?;
    let Some((user_id,)) = row else {
        return Err(ProjectError::UnknownUsername(username.to_owned()));
    };

    let result = sqlx::query(
        "INSERT INTO project_collaborators (project_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(project_id)
    .bind(user_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ProjectError::AlreadyCollaborator(username.to_owned()));
    }

    info!(%project_id, collaborator = %user_id, "collaborator added");
    Ok(())
}

#[cfg(test)]
#[path = "project_test.rs"]
mod tests;
