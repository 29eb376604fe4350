//! Wire protocol — typed event messages for the collaboration socket.
//!
//! DESIGN
//! ======
//! Every message is `{"event": "<kebab-case name>", "data": {...}}`. Inbound
//! text deserializes into [`ClientEvent`], so required fields and field types
//! are enforced at the boundary; anything that fails to decode is a
//! [`MalformedMessage`] and never reaches a handler. Outbound traffic is
//! [`ServerEvent`], constructed by the dispatch layer only — handlers never
//! serialize messages themselves.
//!
//! Cursor payloads stay free-form (`serde_json::Value`): the server relays
//! them verbatim and never interprets editor-specific shapes.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// ERROR CODES
// =============================================================================

/// Grepable error code and retryable flag for structured error payloads.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

/// Inbound text that failed to decode into a [`ClientEvent`].
#[derive(Debug, thiserror::Error)]
#[error("malformed message: {0}")]
pub struct MalformedMessage(pub String);

impl ErrorCode for MalformedMessage {
    fn error_code(&self) -> &'static str {
        "E_MALFORMED"
    }
}

// =============================================================================
// FILE OPERATIONS
// =============================================================================

/// Advisory file-tree operation kind. The server relays these without
/// validating path legality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileOp {
    Create,
    Delete,
    Rename,
}

// =============================================================================
// CLIENT EVENTS
// =============================================================================

/// Events a client may send. Decoding fails unless the event name is known
/// and every required field is present with the right type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    JoinRoom {
        project_id: Uuid,
    },
    LeaveRoom {
        project_id: Uuid,
    },
    FileChange {
        project_id: Uuid,
        file_path: String,
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cursor: Option<serde_json::Value>,
    },
    CursorChange {
        project_id: Uuid,
        file_path: String,
        cursor: serde_json::Value,
    },
    FileOperation {
        project_id: Uuid,
        operation: FileOp,
        file_path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        new_path: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        is_folder: Option<bool>,
    },
    ExecutionBroadcast {
        project_id: Uuid,
        result: serde_json::Value,
    },
}

impl ClientEvent {
    /// Wire name of the event, for logging.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::JoinRoom { .. } => "join-room",
            Self::LeaveRoom { .. } => "leave-room",
            Self::FileChange { .. } => "file-change",
            Self::CursorChange { .. } => "cursor-change",
            Self::FileOperation { .. } => "file-operation",
            Self::ExecutionBroadcast { .. } => "execution-broadcast",
        }
    }

    /// The room the event targets.
    #[must_use]
    pub fn project_id(&self) -> Uuid {
        match self {
            Self::JoinRoom { project_id }
            | Self::LeaveRoom { project_id }
            | Self::FileChange { project_id, .. }
            | Self::CursorChange { project_id, .. }
            | Self::FileOperation { project_id, .. }
            | Self::ExecutionBroadcast { project_id, .. } => *project_id,
        }
    }
}

/// Decode one inbound text message into a typed event.
///
/// # Errors
///
/// Returns [`MalformedMessage`] for invalid JSON, an unknown event name, a
/// missing required field, or a field of the wrong type.
pub fn decode_client_event(text: &str) -> Result<ClientEvent, MalformedMessage> {
    serde_json::from_str(text).map_err(|e| MalformedMessage(e.to_string()))
}

// =============================================================================
// SERVER EVENTS
// =============================================================================

/// One entry in a room roster snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantInfo {
    pub user_id: Uuid,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<serde_json::Value>,
}

/// Events the server sends. Change broadcasts carry the sender's identity so
/// recipients can attribute edits without a lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    /// Welcome message sent once per connection, after the gate admits it.
    Connected {
        connection_id: Uuid,
        user_id: Uuid,
        display_name: String,
    },
    /// Roster snapshot sent to a joiner; includes the joiner itself.
    RoomParticipants {
        participants: Vec<ParticipantInfo>,
    },
    ParticipantJoined {
        user_id: Uuid,
        display_name: String,
        connection_id: Uuid,
    },
    ParticipantLeft {
        user_id: Uuid,
        display_name: String,
        connection_id: Uuid,
    },
    FileChanged {
        file_path: String,
        content: String,
        user_id: Uuid,
        display_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cursor: Option<serde_json::Value>,
    },
    CursorChanged {
        file_path: String,
        cursor: serde_json::Value,
        user_id: Uuid,
        display_name: String,
    },
    FileOperation {
        project_id: Uuid,
        operation: FileOp,
        file_path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        new_path: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        is_folder: Option<bool>,
        user_id: Uuid,
        display_name: String,
    },
    ExecutionBroadcast {
        result: serde_json::Value,
        user_id: Uuid,
        display_name: String,
    },
    Error {
        code: String,
        message: String,
    },
}

impl ServerEvent {
    /// Wire name of the event, for logging.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::RoomParticipants { .. } => "room-participants",
            Self::ParticipantJoined { .. } => "participant-joined",
            Self::ParticipantLeft { .. } => "participant-left",
            Self::FileChanged { .. } => "file-changed",
            Self::CursorChanged { .. } => "cursor-changed",
            Self::FileOperation { .. } => "file-operation",
            Self::ExecutionBroadcast { .. } => "execution-broadcast",
            Self::Error { .. } => "error",
        }
    }

    /// Build a structured error event from a typed error.
    #[must_use]
    pub fn error_from(err: &(impl ErrorCode + ?Sized)) -> Self {
        Self::Error { code: err.error_code().to_string(), message: err.to_string() }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decode_join_room() {
        let project_id = Uuid::new_v4();
        let text = json!({ "event": "join-room", "data": { "projectId": project_id } }).to_string();

        let event = decode_client_event(&text).expect("decode");
        match event {
            ClientEvent::JoinRoom { project_id: pid } => assert_eq!(pid, project_id),
            other => panic!("expected join-room, got {other:?}"),
        }
    }

    #[test]
    fn decode_rejects_unknown_event() {
        let text = json!({ "event": "take-over-room", "data": { "projectId": Uuid::new_v4() } }).to_string();
        assert!(decode_client_event(&text).is_err());
    }

    #[test]
    fn decode_rejects_missing_required_field() {
        // file-change without content.
        let text = json!({
            "event": "file-change",
            "data": { "projectId": Uuid::new_v4(), "filePath": "/main.py" }
        })
        .to_string();
        assert!(decode_client_event(&text).is_err());
    }

    #[test]
    fn decode_rejects_wrong_field_type() {
        let text = json!({ "event": "join-room", "data": { "projectId": 42 } }).to_string();
        assert!(decode_client_event(&text).is_err());
    }

    #[test]
    fn decode_rejects_invalid_json() {
        let err = decode_client_event("{not json").expect_err("should fail");
        assert_eq!(err.error_code(), "E_MALFORMED");
    }

    #[test]
    fn decode_file_change_cursor_is_optional() {
        let base = json!({
            "event": "file-change",
            "data": {
                "projectId": Uuid::new_v4(),
                "filePath": "/index.js",
                "content": "console.log(1);"
            }
        })
        .to_string();

        let event = decode_client_event(&base).expect("decode");
        match event {
            ClientEvent::FileChange { cursor, .. } => assert!(cursor.is_none()),
            other => panic!("expected file-change, got {other:?}"),
        }
    }

    #[test]
    fn decode_file_operation_kinds() {
        for (raw, expected) in [("create", FileOp::Create), ("delete", FileOp::Delete), ("rename", FileOp::Rename)] {
            let text = json!({
                "event": "file-operation",
                "data": {
                    "projectId": Uuid::new_v4(),
                    "operation": raw,
                    "filePath": "/src",
                    "isFolder": true
                }
            })
            .to_string();
            match decode_client_event(&text).expect("decode") {
                ClientEvent::FileOperation { operation, is_folder, new_path, .. } => {
                    assert_eq!(operation, expected);
                    assert_eq!(is_folder, Some(true));
                    assert!(new_path.is_none());
                }
                other => panic!("expected file-operation, got {other:?}"),
            }
        }
    }

    #[test]
    fn decode_rejects_unknown_file_operation() {
        let text = json!({
            "event": "file-operation",
            "data": { "projectId": Uuid::new_v4(), "operation": "truncate", "filePath": "/a" }
        })
        .to_string();
        assert!(decode_client_event(&text).is_err());
    }

    #[test]
    fn server_event_wire_shape_is_tagged_and_camel_case() {
        let event = ServerEvent::FileChanged {
            file_path: "/main.py".into(),
            content: "print(1)".into(),
            user_id: Uuid::new_v4(),
            display_name: "ada".into(),
            cursor: None,
        };

        let value = serde_json::to_value(&event).expect("serialize");
        assert_eq!(value.get("event").and_then(|v| v.as_str()), Some("file-changed"));
        let data = value.get("data").expect("data object");
        assert!(data.get("filePath").is_some());
        assert!(data.get("displayName").is_some());
        // Absent cursor is omitted, not null.
        assert!(data.get("cursor").is_none());
    }

    #[test]
    fn roster_snapshot_serializes_participants() {
        let event = ServerEvent::RoomParticipants {
            participants: vec![ParticipantInfo {
                user_id: Uuid::new_v4(),
                display_name: "grace".into(),
                cursor: Some(json!({ "line": 3, "column": 14 })),
            }],
        };

        let value = serde_json::to_value(&event).expect("serialize");
        assert_eq!(value.get("event").and_then(|v| v.as_str()), Some("room-participants"));
        let participants = value
            .pointer("/data/participants")
            .and_then(|v| v.as_array())
            .expect("participants array");
        assert_eq!(participants.len(), 1);
        assert_eq!(participants[0].get("displayName").and_then(|v| v.as_str()), Some("grace"));
        assert_eq!(participants[0].pointer("/cursor/line").and_then(serde_json::Value::as_i64), Some(3));
    }

    #[test]
    fn error_from_typed_error() {
        let err = MalformedMessage("data: missing field `projectId`".into());
        let event = ServerEvent::error_from(&err);

        match event {
            ServerEvent::Error { code, message } => {
                assert_eq!(code, "E_MALFORMED");
                assert!(message.contains("projectId"));
            }
            other => panic!("expected error event, got {other:?}"),
        }
    }

    #[test]
    fn client_event_json_round_trip() {
        let original = ClientEvent::CursorChange {
            project_id: Uuid::new_v4(),
            file_path: "/main.rs".into(),
            cursor: json!({ "line": 10, "column": 4 }),
        };

        let text = serde_json::to_string(&original).expect("serialize");
        let restored = decode_client_event(&text).expect("deserialize");
        assert_eq!(restored.name(), "cursor-change");
        assert_eq!(restored.project_id(), original.project_id());
    }
}
