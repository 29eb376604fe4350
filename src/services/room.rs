//! Room membership and fan-out.
//!
//! DESIGN
//! ======
//! Rooms exist only while occupied: the first join creates a room, removal of
//! the last participant (explicit leave or disconnect sweep) deletes it. All
//! mutation happens under a single write guard on the registry; fan-out takes
//! a read guard and uses non-blocking `try_send` so one slow client never
//! stalls a room.
//!
//! Joins are additive — joining a second project does not leave the first.
//! Membership ends only by explicit leave or by the disconnect sweep, which
//! visits every room the connection is in.

use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

use crate::protocol::{ErrorCode, ParticipantInfo, ServerEvent};
use crate::state::{Participant, Room, SessionRegistry};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    #[error("not a member of project {0}")]
    NotMember(Uuid),
}

impl ErrorCode for RoomError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotMember(_) => "E_NOT_MEMBER",
        }
    }
}

// =============================================================================
// JOIN / LEAVE
// =============================================================================

/// Join a project room, creating it if absent. Re-joining a room the
/// connection is already in overwrites the entry in place, so a connection
/// never appears twice. Returns the roster snapshot taken after insertion —
/// it includes the joiner.
pub async fn join_room(
    registry: &SessionRegistry,
    project_id: Uuid,
    conn_id: Uuid,
    user_id: Uuid,
    display_name: &str,
    tx: mpsc::Sender<ServerEvent>,
) -> Vec<ParticipantInfo> {
    let mut rooms = registry.rooms.write().await;
    let room = rooms.entry(project_id).or_insert_with(Room::new);
    room.participants
        .insert(conn_id, Participant { user_id, display_name: display_name.to_owned(), cursor: None, tx });
    let roster = roster_of(room);

    info!(%project_id, %conn_id, participants = room.participants.len(), "participant joined room");
    roster
}

/// Leave a project room. The room is removed from the registry the moment it
/// has no participants left.
///
/// # Errors
///
/// Returns [`RoomError::NotMember`] when the connection is not in the room;
/// callers treat that as a no-op, never as a fatal condition.
pub async fn leave_room(registry: &SessionRegistry, project_id: Uuid, conn_id: Uuid) -> Result<(), RoomError> {
    let mut rooms = registry.rooms.write().await;
    let Some(room) = rooms.get_mut(&project_id) else {
        return Err(RoomError::NotMember(project_id));
    };
    if room.participants.remove(&conn_id).is_none() {
        return Err(RoomError::NotMember(project_id));
    }

    info!(%project_id, %conn_id, remaining = room.participants.len(), "participant left room");
    if room.participants.is_empty() {
        rooms.remove(&project_id);
        info!(%project_id, "evicted empty room");
    }
    Ok(())
}

/// Remove a connection from every room it is currently in, evicting rooms
/// that become empty. Returns the project IDs it was removed from so the
/// caller can announce each departure. Idempotent: a second sweep for the
/// same connection finds nothing.
pub async fn disconnect(registry: &SessionRegistry, conn_id: Uuid) -> Vec<Uuid> {
    let mut rooms = registry.rooms.write().await;
    let mut left = Vec::new();
    rooms.retain(|project_id, room| {
        if room.participants.remove(&conn_id).is_some() {
            left.push(*project_id);
        }
        !room.participants.is_empty()
    });
    drop(rooms);

    for project_id in &left {
        info!(%project_id, %conn_id, "participant removed by disconnect");
    }
    left
}

// =============================================================================
// CURSOR STATE
// =============================================================================

/// Record the sender's latest cursor payload on its participant entry.
/// Returns `false` without writing when the sender is not currently a member
/// (a leave can race the cursor message); the relay still proceeds.
pub async fn update_cursor(
    registry: &SessionRegistry,
    project_id: Uuid,
    conn_id: Uuid,
    cursor: &serde_json::Value,
) -> bool {
    let mut rooms = registry.rooms.write().await;
    let Some(participant) = rooms
        .get_mut(&project_id)
        .and_then(|room| room.participants.get_mut(&conn_id))
    else {
        return false;
    };
    participant.cursor = Some(cursor.clone());
    true
}

// =============================================================================
// BROADCAST
// =============================================================================

/// Broadcast an event to all members of a room, optionally excluding one
/// connection. Best-effort: a member whose channel is full is skipped.
pub async fn broadcast(registry: &SessionRegistry, project_id: Uuid, event: &ServerEvent, exclude: Option<Uuid>) {
    let rooms = registry.rooms.read().await;
    let Some(room) = rooms.get(&project_id) else {
        return;
    };

    for (conn_id, participant) in &room.participants {
        if exclude == Some(*conn_id) {
            continue;
        }
        let _ = participant.tx.try_send(event.clone());
    }
}

// =============================================================================
// HELPERS
// =============================================================================

/// Current roster of a room; empty when the room does not exist.
pub async fn list_participants(registry: &SessionRegistry, project_id: Uuid) -> Vec<ParticipantInfo> {
    let rooms = registry.rooms.read().await;
    rooms.get(&project_id).map_or_else(Vec::new, roster_of)
}

fn roster_of(room: &Room) -> Vec<ParticipantInfo> {
    room.participants
        .values()
        .map(|p| ParticipantInfo { user_id: p.user_id, display_name: p.display_name.clone(), cursor: p.cursor.clone() })
        .collect()
}

#[cfg(test)]
#[path = "room_test.rs"]
mod tests;
