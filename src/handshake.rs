//! Lobby phase of a connection: everything between the upgrade and being
//! seated in a room.

use futures::StreamExt;
use tracing::{debug, info, warn};

use crate::game::PlayerSlot;
use crate::protocol::{ClientMessage, CloseReason, DecodeError, JoinPayload, RoomsPayload, ServerMessage};
use crate::room::{Connection, JoinError, Rejected, RoomManager};

/// A room can close between lookup and join; the next lookup then hands out a
/// fresh one.
const JOIN_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seated {
    pub room_id: String,
    pub slot: PlayerSlot,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    #[error("client went away before joining")]
    Disconnected,
    #[error("connection rejected: {}", .0.reason())]
    Rejected(CloseReason),
}

fn reject(connection: &Connection, reason: CloseReason) -> HandshakeError {
    connection.session.close(reason);
    HandshakeError::Rejected(reason)
}

/// Reads lobby frames until the client joins a room or is turned away.
/// Room listings are answered in place. On success the connection's reader has
/// moved into the room and this function no longer reads from it.
pub async fn run(rooms: &RoomManager, mut connection: Connection) -> Result<Seated, HandshakeError> {
    loop {
        let Some(frame) = connection.inbound.next().await else {
            debug!("connection closed in lobby");
            return Err(HandshakeError::Disconnected);
        };

        match frame {
            Ok(ClientMessage::GetRooms) => {
                let listing = RoomsPayload {
                    rooms: rooms.list_available().into_keys().collect(),
                };
                connection.session.send(ServerMessage::Rooms(listing));
            }
            Ok(ClientMessage::Join(join)) => return join_room(rooms, connection, join),
            Ok(other) => {
                warn!(message = ?other, "expected join");
                return Err(reject(&connection, CloseReason::ExpectedJoin));
            }
            Err(DecodeError::UnknownType(kind)) => {
                warn!(%kind, "expected join");
                return Err(reject(&connection, CloseReason::ExpectedJoin));
            }
            Err(err) => {
                warn!(%err, "invalid payload in lobby");
                return Err(reject(&connection, CloseReason::InvalidPayload));
            }
        }
    }
}

fn join_room(
    rooms: &RoomManager,
    mut connection: Connection,
    join: JoinPayload,
) -> Result<Seated, HandshakeError> {
    if join.room_id.is_empty() {
        warn!("join without room id");
        return Err(reject(&connection, CloseReason::RoomIdRequired));
    }

    for _ in 0..JOIN_ATTEMPTS {
        let room = rooms.create_or_get(&join.room_id, join.is_bot);
        match room.add_player(connection) {
            Ok(slot) => {
                info!(room_id = %join.room_id, is_bot = room.is_bot(), ?slot, "client joined");
                return Ok(Seated {
                    room_id: join.room_id,
                    slot,
                });
            }
            Err(Rejected {
                error: JoinError::RoomClosed,
                connection: returned,
            }) => {
                debug!(room_id = %join.room_id, "room closed during join, retrying");
                connection = returned;
            }
            Err(Rejected {
                error: JoinError::RoomFull,
                connection: returned,
            }) => {
                info!(room_id = %join.room_id, "room is full, rejecting client");
                return Err(reject(&returned, CloseReason::RoomFull));
            }
        }
    }
    warn!(room_id = %join.room_id, "room kept closing under the join");
    Err(reject(&connection, CloseReason::RoomFull))
}
