#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use goonker_server::game::{Cell, ChallengePool, MinimaxBot, PlayerSlot};
use goonker_server::protocol::{
    AnswerPayload, ClickPayload, ClientMessage, GameStartPayload, Outbound, ServerMessage,
    UpdatePayload,
};
use goonker_server::room::{in_memory, RemoteEnd, Room, RoomConfig, RoomManager};

pub const QUESTION: &str = r#"[{"question": "2 + 2?", "answers": ["4", "5", "22"], "answer_key": 0}]"#;
pub const CORRECT: &str = "4";

pub fn config() -> RoomConfig {
    RoomConfig {
        board_size: 3,
        challenge_timeout: Duration::from_secs(8),
        bot_delay: Duration::from_millis(100),
        bot: Arc::new(MinimaxBot::for_board(3, 4)),
        challenges: ChallengePool::from_json(QUESTION).unwrap(),
    }
}

pub fn manager() -> RoomManager {
    RoomManager::new(config())
}

pub async fn next(remote: &mut RemoteEnd) -> Outbound {
    tokio::time::timeout(Duration::from_secs(30), remote.recv())
        .await
        .expect("timed out waiting for the server")
        .expect("server dropped the connection")
}

pub async fn next_message(remote: &mut RemoteEnd) -> ServerMessage {
    match next(remote).await {
        Outbound::Message(msg) => msg,
        other => panic!("expected a message, got {other:?}"),
    }
}

pub async fn next_update(remote: &mut RemoteEnd) -> UpdatePayload {
    match next_message(remote).await {
        ServerMessage::Update(update) => update,
        other => panic!("expected an update, got {other:?}"),
    }
}

/// Lets spawned tasks run, then checks nothing was queued.
pub async fn assert_quiet(remote: &mut RemoteEnd) {
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(remote.try_recv(), None);
}

pub async fn eventually(what: &str, cond: impl Fn() -> bool) {
    for _ in 0..100 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition never held: {what}");
}

pub fn board(rows: [[u8; 3]; 3]) -> Vec<Vec<Cell>> {
    rows.iter()
        .map(|row| row.iter().map(|c| Cell::try_from(*c).unwrap()).collect())
        .collect()
}

pub fn click(remote: &RemoteEnd, x: i32, y: i32) {
    assert!(remote.send(ClientMessage::Click(ClickPayload { x, y })));
}

pub fn answer(remote: &RemoteEnd, answer: i64) {
    assert!(remote.send(ClientMessage::Answer(AnswerPayload { answer })));
}

pub async fn expect_start(remote: &mut RemoteEnd, you_are: PlayerSlot) {
    assert_eq!(
        next_message(remote).await,
        ServerMessage::GameStart(GameStartPayload { you_are })
    );
    let update = next_update(remote).await;
    assert_eq!(update.board, board([[0; 3]; 3]));
    assert_eq!(update.turn, PlayerSlot::A);
}

/// Seats two fresh connections and consumes their start frames.
pub async fn two_player_room(rooms: &RoomManager, id: &str) -> (Arc<Room>, RemoteEnd, RemoteEnd) {
    let room = rooms.create_or_get(id, false);
    let (conn_a, mut a) = in_memory();
    let (conn_b, mut b) = in_memory();
    assert_eq!(room.add_player(conn_a).unwrap(), PlayerSlot::A);
    assert_eq!(room.add_player(conn_b).unwrap(), PlayerSlot::B);
    expect_start(&mut a, PlayerSlot::A).await;
    expect_start(&mut b, PlayerSlot::B).await;
    (room, a, b)
}

/// `mover` clicks `x, y`; returns the update both sides saw.
pub async fn play(
    a: &mut RemoteEnd,
    b: &mut RemoteEnd,
    mover: PlayerSlot,
    x: i32,
    y: i32,
) -> UpdatePayload {
    match mover {
        PlayerSlot::A => click(a, x, y),
        PlayerSlot::B => click(b, x, y),
    }
    let seen_a = next_update(a).await;
    let seen_b = next_update(b).await;
    assert_eq!(seen_a, seen_b);
    seen_a
}
