mod common;

use std::sync::Arc;
use std::time::Duration;

use goonker_server::game::{Cell, PlayerSlot};
use goonker_server::protocol::{
    ClientMessage, CloseReason, GameOverPayload, GameStartPayload, Outbound, ServerMessage,
};
use goonker_server::room::{in_memory, JoinError, Phase, RemoteEnd, RoomConfig, RoomManager};

use common::*;

fn correct_index(msg: &ServerMessage) -> i64 {
    match msg {
        ServerMessage::Challenge(c) => {
            assert_eq!(c.question, "2 + 2?");
            c.answers.iter().position(|a| a == CORRECT).unwrap() as i64
        }
        other => panic!("expected a challenge, got {other:?}"),
    }
}

/// A takes the centre, B clicks it; returns the challenge A received.
async fn contest_centre(a: &mut RemoteEnd, b: &mut RemoteEnd) -> ServerMessage {
    play(a, b, PlayerSlot::A, 1, 1).await;
    click(b, 1, 1);
    let challenge = next_message(a).await;
    assert_quiet(b).await;
    challenge
}

#[tokio::test(start_paused = true)]
async fn seats_fill_in_order_and_overflow_is_rejected() {
    let rooms = manager();
    let (room, _a, _b) = two_player_room(&rooms, "duel").await;
    assert_eq!(room.phase(), Phase::InProgress);

    let (third, _c) = in_memory();
    let rejected = room.add_player(third).unwrap_err();
    assert_eq!(rejected.error, JoinError::RoomFull);
    assert!(room.occupancy().is_full());
}

#[tokio::test(start_paused = true)]
async fn bot_room_seats_one_human() {
    let rooms = manager();
    let room = rooms.create_or_get("solo", true);
    let (conn, mut a) = in_memory();
    assert_eq!(room.add_player(conn).unwrap(), PlayerSlot::A);
    expect_start(&mut a, PlayerSlot::A).await;

    let (second, _b) = in_memory();
    assert_eq!(room.add_player(second).unwrap_err().error, JoinError::RoomFull);
    assert_eq!(room.capacity(), 1);
}

#[tokio::test(start_paused = true)]
async fn bot_answers_a_move() {
    let rooms = manager();
    let room = rooms.create_or_get("solo", true);
    let (conn, mut a) = in_memory();
    room.add_player(conn).unwrap();
    expect_start(&mut a, PlayerSlot::A).await;

    click(&a, 0, 0);
    let mine = next_update(&mut a).await;
    assert_eq!(mine.board, board([[1, 0, 0], [0, 0, 0], [0, 0, 0]]));
    assert_eq!(mine.turn, PlayerSlot::B);

    // the centre is the only reply to a corner opening that does not lose
    let reply = next_update(&mut a).await;
    assert_eq!(reply.board, board([[1, 0, 0], [0, 2, 0], [0, 0, 0]]));
    assert_eq!(reply.turn, PlayerSlot::A);
}

#[tokio::test(start_paused = true)]
async fn bot_defends_its_own_squares() {
    let rooms = manager();
    let room = rooms.create_or_get("solo", true);
    let (conn, mut a) = in_memory();
    room.add_player(conn).unwrap();
    expect_start(&mut a, PlayerSlot::A).await;

    click(&a, 0, 0);
    next_update(&mut a).await;
    next_update(&mut a).await;

    click(&a, 1, 1);
    let resolved = next_update(&mut a).await;
    let centre = resolved.board[1][1];
    match centre {
        // bot answered correctly, the attacker is still on turn
        Cell::PlayerB => assert_eq!(resolved.turn, PlayerSlot::A),
        Cell::PlayerA => assert_eq!(resolved.turn, PlayerSlot::B),
        Cell::Empty => panic!("contested square was cleared"),
    }
}

#[tokio::test(start_paused = true)]
async fn challenge_goes_to_the_defender_only() {
    let rooms = manager();
    let (room, mut a, mut b) = two_player_room(&rooms, "duel").await;

    let challenge = contest_centre(&mut a, &mut b).await;
    assert!(matches!(challenge, ServerMessage::Challenge(_)));
    assert_eq!(room.phase(), Phase::ChallengeActive);

    // no moves while the challenge is open
    click(&b, 0, 0);
    assert_quiet(&mut a).await;
    assert_quiet(&mut b).await;
}

#[tokio::test(start_paused = true)]
async fn correct_answer_keeps_the_square() {
    let rooms = manager();
    let (room, mut a, mut b) = two_player_room(&rooms, "duel").await;

    let challenge = contest_centre(&mut a, &mut b).await;
    answer(&a, correct_index(&challenge));

    let update = next_update(&mut a).await;
    assert_eq!(update, next_update(&mut b).await);
    assert_eq!(update.board, board([[0, 0, 0], [0, 1, 0], [0, 0, 0]]));
    assert_eq!(update.turn, PlayerSlot::B);
    assert_eq!(room.phase(), Phase::InProgress);
    assert_eq!(room.snapshot().move_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn wrong_answer_hands_over_the_square() {
    let rooms = manager();
    let (room, mut a, mut b) = two_player_room(&rooms, "duel").await;

    let challenge = contest_centre(&mut a, &mut b).await;
    let wrong = (correct_index(&challenge) + 1) % 3;
    answer(&a, wrong);

    let update = next_update(&mut a).await;
    assert_eq!(update, next_update(&mut b).await);
    assert_eq!(update.board, board([[0, 0, 0], [0, 2, 0], [0, 0, 0]]));
    assert_eq!(update.turn, PlayerSlot::A);
    assert_eq!(room.snapshot().move_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn negative_answer_counts_as_wrong() {
    let rooms = manager();
    let (_room, mut a, mut b) = two_player_room(&rooms, "duel").await;

    contest_centre(&mut a, &mut b).await;
    answer(&a, -1);

    let update = next_update(&mut a).await;
    assert_eq!(update.board[1][1], Cell::PlayerB);
    next_update(&mut b).await;
}

#[tokio::test(start_paused = true)]
async fn unanswered_challenge_times_out() {
    let rooms = RoomManager::new(RoomConfig {
        challenge_timeout: Duration::from_millis(200),
        ..config()
    });
    let (room, mut a, mut b) = two_player_room(&rooms, "duel").await;

    contest_centre(&mut a, &mut b).await;
    let update = next_update(&mut b).await;
    assert_eq!(update.board[1][1], Cell::PlayerB);
    assert_eq!(update.turn, PlayerSlot::A);
    assert_eq!(next_update(&mut a).await, update);

    // a late answer finds nothing to resolve
    answer(&a, 0);
    assert_quiet(&mut a).await;
    assert_eq!(room.phase(), Phase::InProgress);
}

#[tokio::test(start_paused = true)]
async fn answers_from_the_attacker_are_ignored() {
    let rooms = manager();
    let (room, mut a, mut b) = two_player_room(&rooms, "duel").await;

    let challenge = contest_centre(&mut a, &mut b).await;
    answer(&b, 0);
    assert_quiet(&mut a).await;
    assert_quiet(&mut b).await;
    assert_eq!(room.phase(), Phase::ChallengeActive);

    answer(&a, correct_index(&challenge));
    next_update(&mut a).await;
    next_update(&mut b).await;

    // second answer to the same challenge changes nothing
    answer(&a, 0);
    assert_quiet(&mut a).await;
    assert_quiet(&mut b).await;
    assert_eq!(room.snapshot().cell(1, 1), Some(Cell::PlayerA));
}

#[tokio::test(start_paused = true)]
async fn row_wins_on_the_fifth_move() {
    let rooms = manager();
    let (room, mut a, mut b) = two_player_room(&rooms, "duel").await;

    play(&mut a, &mut b, PlayerSlot::A, 0, 0).await;
    play(&mut a, &mut b, PlayerSlot::B, 1, 0).await;
    play(&mut a, &mut b, PlayerSlot::A, 0, 1).await;
    play(&mut a, &mut b, PlayerSlot::B, 1, 1).await;
    let last = play(&mut a, &mut b, PlayerSlot::A, 0, 2).await;
    assert_eq!(last.board, board([[1, 1, 1], [2, 2, 0], [0, 0, 0]]));

    let over = ServerMessage::GameOver(GameOverPayload {
        winner: Cell::PlayerA,
    });
    assert_eq!(next_message(&mut a).await, over);
    assert_eq!(next_message(&mut b).await, over);
    assert_eq!(room.phase(), Phase::Finished);

    click(&b, 2, 2);
    assert_quiet(&mut a).await;
    assert_quiet(&mut b).await;
}

#[tokio::test(start_paused = true)]
async fn out_of_turn_and_out_of_range_clicks_are_ignored() {
    let rooms = manager();
    let (room, mut a, mut b) = two_player_room(&rooms, "duel").await;

    click(&b, 0, 0);
    click(&a, 3, 0);
    click(&a, -1, 2);
    assert_quiet(&mut a).await;
    assert_quiet(&mut b).await;
    assert_eq!(room.snapshot().move_count(), 0);

    play(&mut a, &mut b, PlayerSlot::A, 2, 2).await;
    click(&b, 2, 1);
    click(&b, 2, 1);
    next_update(&mut a).await;
    assert_quiet(&mut a).await;
}

#[tokio::test(start_paused = true)]
async fn leaving_reopens_the_seat_and_last_one_out_removes_the_room() {
    let rooms = manager();
    let (room, a, mut b) = two_player_room(&rooms, "duel").await;

    let mut gone = a.hang_up();
    let closed = tokio::time::timeout(Duration::from_secs(5), gone.recv()).await.unwrap();
    assert_eq!(closed, Some(Outbound::Close(CloseReason::Goodbye)));
    eventually("seat freed", || room.occupancy().players == 1).await;
    assert_eq!(room.phase(), Phase::WaitingForPlayers);
    assert!(rooms.list_available().contains_key("duel"));

    // a newcomer takes the free seat and a fresh game starts
    let (conn, mut c) = in_memory();
    assert_eq!(room.add_player(conn).unwrap(), PlayerSlot::A);
    expect_start(&mut c, PlayerSlot::A).await;
    assert_eq!(
        next_message(&mut b).await,
        ServerMessage::GameStart(GameStartPayload {
            you_are: PlayerSlot::B
        })
    );

    drop(b);
    drop(c);
    eventually("room removed", || rooms.get("duel").is_none()).await;
    assert!(room.is_closed());

    let (late, _late) = in_memory();
    assert_eq!(room.add_player(late).unwrap_err().error, JoinError::RoomClosed);
}

#[tokio::test(start_paused = true)]
async fn stale_room_does_not_remove_its_replacement() {
    let rooms = manager();
    let old = rooms.create_or_get("reused", false);
    let (conn, a) = in_memory();
    old.add_player(conn).unwrap();

    assert!(rooms.remove("reused", &old));
    let fresh = rooms.create_or_get("reused", false);
    assert!(!Arc::ptr_eq(&old, &fresh));

    drop(a);
    eventually("old room closed", || old.is_closed()).await;
    let current = rooms.get("reused").unwrap();
    assert!(Arc::ptr_eq(&current, &fresh));
}

#[tokio::test(start_paused = true)]
async fn seated_players_can_still_list_rooms() {
    let rooms = manager();
    rooms.create_or_get("waiting", false);
    let (_room, mut a, _b) = two_player_room(&rooms, "duel").await;

    assert!(a.send(ClientMessage::GetRooms));
    match next_message(&mut a).await {
        ServerMessage::Rooms(listing) => assert_eq!(listing.rooms, vec!["waiting".to_string()]),
        other => panic!("expected rooms, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn garbage_in_a_room_closes_the_connection() {
    let rooms = manager();
    let (room, mut a, _b) = two_player_room(&rooms, "duel").await;

    assert!(a.send_text("not json"));
    assert_eq!(next(&mut a).await, Outbound::Close(CloseReason::InvalidPayload));
    eventually("seat freed", || room.occupancy().players == 1).await;
}
