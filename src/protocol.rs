//! Wire messages exchanged over the websocket.
//!
//! Every frame is a JSON envelope `{"type": ..., "data": ...}`.

use serde::{Deserialize, Serialize};

use crate::game::{Cell, Challenge, GameState, PlayerSlot};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinPayload {
    pub room_id: String,
    #[serde(default)]
    pub is_bot: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickPayload {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerPayload {
    pub answer: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomsPayload {
    pub rooms: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameStartPayload {
    pub you_are: PlayerSlot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatePayload {
    pub board: Vec<Vec<Cell>>,
    pub turn: PlayerSlot,
}

impl From<&GameState> for UpdatePayload {
    fn from(state: &GameState) -> Self {
        Self {
            board: state.rows(),
            turn: state.turn(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengePayload {
    pub question: String,
    pub answers: Vec<String>,
}

impl From<&Challenge> for ChallengePayload {
    fn from(c: &Challenge) -> Self {
        Self {
            question: c.question.clone(),
            answers: c.answers.clone(),
        }
    }
}

/// `winner` is [`Cell::Empty`] for a draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameOverPayload {
    pub winner: Cell,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    Join(JoinPayload),
    GetRooms,
    Click(ClickPayload),
    Answer(AnswerPayload),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    Rooms(RoomsPayload),
    GameStart(GameStartPayload),
    Update(UpdatePayload),
    Challenge(ChallengePayload),
    GameOver(GameOverPayload),
}

#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    #[error("malformed envelope: {0}")]
    Envelope(#[source] serde_json::Error),
    #[error("unknown message type '{0}'")]
    UnknownType(String),
    #[error("invalid '{kind}' payload: {source}")]
    Payload {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

fn payload<T: serde::de::DeserializeOwned>(
    kind: &'static str,
    data: serde_json::Value,
) -> Result<T, DecodeError> {
    serde_json::from_value(data).map_err(|source| DecodeError::Payload { kind, source })
}

impl ClientMessage {
    /// Decodes a client frame, separating envelope, type and payload failures.
    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        let raw: RawEnvelope = serde_json::from_str(text).map_err(DecodeError::Envelope)?;
        match raw.kind.as_str() {
            "join" => payload("join", raw.data).map(ClientMessage::Join),
            "get_rooms" => Ok(ClientMessage::GetRooms),
            "click" => payload("click", raw.data).map(ClientMessage::Click),
            "answer" => payload("answer", raw.data).map(ClientMessage::Answer),
            _ => Err(DecodeError::UnknownType(raw.kind)),
        }
    }
}

/// Why the server is closing a connection. Maps onto a websocket close frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    InvalidPayload,
    ExpectedJoin,
    RoomIdRequired,
    RoomFull,
    Goodbye,
}

impl CloseReason {
    pub fn code(self) -> u16 {
        match self {
            CloseReason::InvalidPayload => 1002,
            CloseReason::ExpectedJoin | CloseReason::RoomIdRequired | CloseReason::RoomFull => 1008,
            CloseReason::Goodbye => 1000,
        }
    }

    pub fn reason(self) -> &'static str {
        match self {
            CloseReason::InvalidPayload => "Invalid Payload",
            CloseReason::ExpectedJoin => "Expected Join Packet",
            CloseReason::RoomIdRequired => "Room ID required",
            CloseReason::RoomFull => "Room is full",
            CloseReason::Goodbye => "Goodbye",
        }
    }
}

/// Anything the server queues for a connection's writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Message(ServerMessage),
    Close(CloseReason),
}
