use super::*;
use crate::state::test_helpers::test_app_state;
use serde_json::json;

fn sample_row() -> ProjectRow {
    ProjectRow {
        id: Uuid::new_v4(),
        name: "algo-scratchpad".into(),
        description: Some("sorting experiments".into()),
        language: "python".into(),
        template: "blank".into(),
        owner_id: Uuid::new_v4(),
        is_public: false,
        files: json!([{ "name": "main.py", "path": "/main.py", "content": "", "isFolder": false }]),
    }
}

#[test]
fn project_errors_map_to_statuses() {
    let id = Uuid::new_v4();
    let cases = [
        (ProjectError::NotFound(id), StatusCode::NOT_FOUND),
        (ProjectError::UnknownUsername("ghost".into()), StatusCode::NOT_FOUND),
        (ProjectError::Forbidden(id), StatusCode::FORBIDDEN),
        (ProjectError::AlreadyCollaborator("ada".into()), StatusCode::CONFLICT),
        (ProjectError::Database(sqlx::Error::RowNotFound), StatusCode::INTERNAL_SERVER_ERROR),
    ];
    for (err, expected) in cases {
        assert_eq!(project_error_to_status(err), expected);
    }
}

#[test]
fn to_response_preserves_row_fields() {
    let row = sample_row();
    let (id, owner_id) = (row.id, row.owner_id);

    let resp = to_response(row);
    assert_eq!(resp.id, id);
    assert_eq!(resp.owner_id, owner_id);
    assert_eq!(resp.name, "algo-scratchpad");
    assert_eq!(resp.language, "python");
    assert!(!resp.is_public);
    assert!(resp.files.is_array());
}

#[test]
fn project_response_serializes_camel_case() {
    let value = serde_json::to_value(to_response(sample_row())).expect("serialize");
    assert!(value.get("ownerId").is_some());
    assert!(value.get("isPublic").is_some());
    assert!(value.get("owner_id").is_none());
}

#[test]
fn create_body_defaults_optional_fields() {
    let body: CreateProjectBody =
        serde_json::from_value(json!({ "name": "p", "language": "javascript" })).expect("deserialize");
    assert!(body.description.is_none());
    assert!(body.template.is_none());
}

// Validation runs before any query, so a lazy (never-connected) pool suffices.

#[tokio::test]
async fn create_rejects_blank_name() {
    let state = test_app_state();
    let auth = AuthUser { user: crate::services::auth::AuthedUser { id: Uuid::new_v4(), username: "ada".into() } };
    let body = CreateProjectBody { name: "  ".into(), description: None, language: "python".into(), template: None };

    let err = create_project(State(state), auth, Json(body)).await.err().expect("should reject");
    assert_eq!(err, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_rejects_blank_language() {
    let state = test_app_state();
    let auth = AuthUser { user: crate::services::auth::AuthedUser { id: Uuid::new_v4(), username: "ada".into() } };
    let body = CreateProjectBody { name: "p".into(), description: None, language: "".into(), template: None };

    let err = create_project(State(state), auth, Json(body)).await.err().expect("should reject");
    assert_eq!(err, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn add_collaborator_rejects_blank_username() {
    let state = test_app_state();
    let auth = AuthUser { user: crate::services::auth::AuthedUser { id: Uuid::new_v4(), username: "ada".into() } };
    let body = AddCollaboratorBody { username: "   ".into() };

    let err = add_collaborator(State(state), auth, Path(Uuid::new_v4()), Json(body))
        .await
        .err()
        .expect("should reject");
    assert_eq!(err, StatusCode::BAD_REQUEST);
}
