//! A single match: two seats (or one seat and the bot), the board, and the
//! challenge that may be pending on it.
//!
//! Every transition takes the room lock for its read-modify-write and only
//! queues outbound frames while holding it; the socket writes happen on each
//! connection's writer task. The bot and the challenge timer run on their own
//! tasks and come back in through [`Room::dispatch`].

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use rand::Rng;
use serde::Serialize;
use tokio::task::AbortHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::manager::{self, RoomMap};
use super::session::{Connection, Inbound, Session};
use crate::game::bot::DEFAULT_SEARCH_DEPTH;
use crate::game::state::DEFAULT_BOARD_SIZE;
use crate::game::{
    BotStrategy, Cell, Challenge, ChallengeDeck, ChallengePool, GameState, MinimaxBot, PlayerSlot,
    BOT_SLOT,
};
use crate::protocol::{
    ClientMessage, CloseReason, GameOverPayload, GameStartPayload, RoomsPayload, ServerMessage,
    UpdatePayload,
};

pub const DEFAULT_CHALLENGE_TIMEOUT: Duration = Duration::from_secs(8);
pub const DEFAULT_BOT_DELAY: Duration = Duration::from_millis(500);

/// Settings shared by every room the manager creates.
#[derive(Debug, Clone)]
pub struct RoomConfig {
    pub board_size: usize,
    pub challenge_timeout: Duration,
    pub bot_delay: Duration,
    pub bot: Arc<dyn BotStrategy>,
    pub challenges: ChallengePool,
}

impl RoomConfig {
    /// 3x3 board, perfect bot, default timings.
    pub fn new(challenges: ChallengePool) -> Self {
        Self {
            board_size: DEFAULT_BOARD_SIZE,
            challenge_timeout: DEFAULT_CHALLENGE_TIMEOUT,
            bot_delay: DEFAULT_BOT_DELAY,
            bot: Arc::new(MinimaxBot::for_board(DEFAULT_BOARD_SIZE, DEFAULT_SEARCH_DEPTH)),
            challenges,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    WaitingForPlayers,
    InProgress,
    ChallengeActive,
    Finished,
}

/// Everything that can change a room, whoever it comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomEvent {
    Move {
        slot: PlayerSlot,
        x: i32,
        y: i32,
    },
    /// `challenge` pins the answer to one challenge; `None` answers whichever
    /// is pending.
    Answer {
        slot: PlayerSlot,
        answer: i64,
        challenge: Option<u64>,
    },
    ChallengeTimeout {
        challenge: u64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Occupancy {
    pub players: usize,
    pub capacity: usize,
    pub is_bot: bool,
}

impl Occupancy {
    pub fn is_full(&self) -> bool {
        self.players >= self.capacity
    }
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinError {
    #[error("room is full")]
    RoomFull,
    #[error("room has been closed")]
    RoomClosed,
}

/// A refused join hands the connection back to the caller.
#[derive(Debug)]
pub struct Rejected {
    pub error: JoinError,
    pub connection: Connection,
}

struct PendingChallenge {
    id: u64,
    attacker: PlayerSlot,
    x: i32,
    y: i32,
    challenge: Challenge,
    timer: AbortHandle,
}

struct RoomInner {
    phase: Phase,
    seats: [Option<Session>; 2],
    state: GameState,
    deck: ChallengeDeck,
    pending: Option<PendingChallenge>,
    challenge_seq: u64,
    closed: bool,
}

impl RoomInner {
    fn occupied(&self) -> usize {
        self.seats.iter().flatten().count()
    }

    fn send_to(&self, slot: PlayerSlot, msg: ServerMessage) {
        if let Some(session) = &self.seats[slot.index()] {
            if !session.send(msg) {
                warn!(?slot, connection = %session.id(), "failed to queue message");
            }
        }
    }

    fn broadcast(&self, msg: &ServerMessage) {
        for slot in [PlayerSlot::A, PlayerSlot::B] {
            self.send_to(slot, msg.clone());
        }
    }

    fn broadcast_update(&self) {
        self.broadcast(&ServerMessage::Update(UpdatePayload::from(&self.state)));
    }

    fn cancel_challenge(&mut self) -> Option<PendingChallenge> {
        let pending = self.pending.take()?;
        pending.timer.abort();
        Some(pending)
    }
}

pub struct Room {
    id: String,
    is_bot: bool,
    config: Arc<RoomConfig>,
    registry: Weak<RoomMap>,
    inner: Mutex<RoomInner>,
}

impl std::fmt::Debug for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Room")
            .field("id", &self.id)
            .field("is_bot", &self.is_bot)
            .finish_non_exhaustive()
    }
}

impl Room {
    pub(crate) fn new(
        id: String,
        is_bot: bool,
        config: Arc<RoomConfig>,
        registry: Weak<RoomMap>,
    ) -> Self {
        let inner = RoomInner {
            phase: Phase::WaitingForPlayers,
            seats: [None, None],
            state: GameState::new(config.board_size),
            deck: ChallengeDeck::new(config.challenges.clone()),
            pending: None,
            challenge_seq: 0,
            closed: false,
        };
        Self {
            id,
            is_bot,
            config,
            registry,
            inner: Mutex::new(inner),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_bot(&self) -> bool {
        self.is_bot
    }

    pub fn capacity(&self) -> usize {
        if self.is_bot {
            1
        } else {
            2
        }
    }

    pub fn phase(&self) -> Phase {
        self.inner.lock().phase
    }

    /// Copy of the current board.
    pub fn snapshot(&self) -> GameState {
        self.inner.lock().state.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    pub fn occupancy(&self) -> Occupancy {
        Occupancy {
            players: self.inner.lock().occupied(),
            capacity: self.capacity(),
            is_bot: self.is_bot,
        }
    }

    /// Seats the connection in the first free slot and takes over reading it.
    /// Starts the game when the room fills up.
    pub fn add_player(self: &Arc<Self>, connection: Connection) -> Result<PlayerSlot, Rejected> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(Rejected {
                error: JoinError::RoomClosed,
                connection,
            });
        }
        let slot = if inner.seats[0].is_none() {
            PlayerSlot::A
        } else if !self.is_bot && inner.seats[1].is_none() {
            PlayerSlot::B
        } else {
            return Err(Rejected {
                error: JoinError::RoomFull,
                connection,
            });
        };

        let Connection { session, inbound } = connection;
        inner.seats[slot.index()] = Some(session.clone());
        info!(room_id = %self.id, ?slot, connection = %session.id(), "player seated");
        self.spawn_seat(slot, session, inbound);

        if inner.occupied() == self.capacity() {
            self.start_game(&mut inner);
        }
        Ok(slot)
    }

    pub fn dispatch(self: &Arc<Self>, event: RoomEvent) {
        match event {
            RoomEvent::Move { slot, x, y } => self.handle_move(slot, x, y),
            RoomEvent::Answer {
                slot,
                answer,
                challenge,
            } => self.handle_answer(slot, answer, challenge),
            RoomEvent::ChallengeTimeout { challenge } => self.handle_timeout(challenge),
        }
    }

    /// Vacates `slot` if it still belongs to `session_id`. The last player out
    /// closes the room and drops it from the registry.
    pub fn remove_player(self: &Arc<Self>, slot: PlayerSlot, session_id: Uuid) {
        let now_empty = {
            let mut inner = self.inner.lock();
            let seated = inner.seats[slot.index()]
                .as_ref()
                .is_some_and(|s| s.id() == session_id);
            if !seated {
                return;
            }
            if let Some(session) = inner.seats[slot.index()].take() {
                session.close(CloseReason::Goodbye);
            }
            if inner.cancel_challenge().is_some() {
                debug!(room_id = %self.id, "pending challenge dropped");
            }
            inner.phase = Phase::WaitingForPlayers;

            let empty = inner.occupied() == 0;
            inner.closed = empty;
            empty
        };

        if !now_empty {
            info!(room_id = %self.id, ?slot, "player left, waiting for a new opponent");
            return;
        }
        match self.registry.upgrade() {
            Some(rooms) if manager::remove_if_same(&rooms, &self.id, self) => {
                info!(room_id = %self.id, "room empty and removed");
            }
            _ => debug!(room_id = %self.id, "room empty, registry entry already replaced"),
        }
    }

    fn spawn_seat(self: &Arc<Self>, slot: PlayerSlot, session: Session, inbound: Inbound) {
        let span = info_span!("seat", room_id = %self.id, ?slot, connection = %session.id());
        let reader = tokio::spawn(
            receive_loop(Arc::clone(self), slot, session.clone(), inbound).instrument(span),
        );

        let room = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(err) = reader.await {
                if err.is_panic() {
                    error!(room_id = %room.id, ?slot, "seat reader panicked");
                }
            }
            room.remove_player(slot, session.id());
        });
    }

    fn start_game(self: &Arc<Self>, inner: &mut RoomInner) {
        inner.cancel_challenge();
        inner.state = GameState::new(self.config.board_size);
        inner.phase = Phase::InProgress;
        info!(room_id = %self.id, is_bot = self.is_bot, "game started");

        for slot in [PlayerSlot::A, PlayerSlot::B] {
            inner.send_to(slot, ServerMessage::GameStart(GameStartPayload { you_are: slot }));
        }
        inner.broadcast_update();
    }

    fn handle_move(self: &Arc<Self>, slot: PlayerSlot, x: i32, y: i32) {
        let mut inner = self.inner.lock();
        if inner.phase != Phase::InProgress {
            debug!(room_id = %self.id, ?slot, x, y, phase = ?inner.phase, "move ignored");
            return;
        }
        if let Err(err) = inner.state.check_move(slot, x, y) {
            warn!(room_id = %self.id, ?slot, x, y, %err, "invalid move");
            return;
        }
        if inner.state.is_contested_cell(slot, x, y) {
            self.open_challenge(&mut inner, slot, x, y);
            return;
        }
        if let Err(err) = inner.state.apply_move(slot, x, y) {
            warn!(room_id = %self.id, ?slot, x, y, %err, "invalid move");
            return;
        }
        debug!(room_id = %self.id, ?slot, x, y, "move applied");
        self.after_move(&mut inner);
    }

    fn after_move(self: &Arc<Self>, inner: &mut RoomInner) {
        inner.broadcast_update();

        if inner.state.is_over() {
            inner.phase = Phase::Finished;
            let winner = Cell::from(inner.state.winner());
            info!(room_id = %self.id, ?winner, "game over");
            inner.broadcast(&ServerMessage::GameOver(GameOverPayload { winner }));
        } else if self.is_bot && inner.state.turn() == BOT_SLOT {
            self.schedule_bot_move(inner.state.clone());
        }
    }

    /// Computes the bot's reply off the room lock and posts it back as a move.
    fn schedule_bot_move(self: &Arc<Self>, snapshot: GameState) {
        let room = Arc::clone(self);
        let bot = Arc::clone(&self.config.bot);
        let delay = self.config.bot_delay;

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match bot.select_move(&snapshot) {
                Ok((x, y)) => room.dispatch(RoomEvent::Move {
                    slot: BOT_SLOT,
                    x: x as i32,
                    y: y as i32,
                }),
                Err(err) => warn!(room_id = %room.id, %err, "bot has no move"),
            }
        });
    }

    fn open_challenge(self: &Arc<Self>, inner: &mut RoomInner, attacker: PlayerSlot, x: i32, y: i32) {
        let defender = attacker.opponent();
        let mut rng = rand::thread_rng();
        let challenge = inner.deck.draw(&mut rng);
        inner.challenge_seq += 1;
        let id = inner.challenge_seq;

        let room = Arc::clone(self);
        let timeout = self.config.challenge_timeout;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            room.dispatch(RoomEvent::ChallengeTimeout { challenge: id });
        })
        .abort_handle();

        info!(room_id = %self.id, ?attacker, ?defender, x, y, challenge = id, "contested move, challenge sent");
        if self.is_bot && defender == BOT_SLOT {
            let answer = rng.gen_range(0..challenge.answers.len()) as i64;
            self.schedule_bot_answer(id, answer);
        } else {
            inner.send_to(defender, ServerMessage::Challenge((&challenge).into()));
        }

        inner.pending = Some(PendingChallenge {
            id,
            attacker,
            x,
            y,
            challenge,
            timer,
        });
        inner.phase = Phase::ChallengeActive;
    }

    fn schedule_bot_answer(self: &Arc<Self>, challenge: u64, answer: i64) {
        let room = Arc::clone(self);
        let delay = self.config.bot_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            room.dispatch(RoomEvent::Answer {
                slot: BOT_SLOT,
                answer,
                challenge: Some(challenge),
            });
        });
    }

    fn handle_answer(self: &Arc<Self>, slot: PlayerSlot, answer: i64, challenge: Option<u64>) {
        let mut inner = self.inner.lock();
        let Some((id, attacker)) = inner.pending.as_ref().map(|p| (p.id, p.attacker)) else {
            debug!(room_id = %self.id, ?slot, "answer without a pending challenge");
            return;
        };
        if slot != attacker.opponent() {
            warn!(room_id = %self.id, ?slot, "answer from a player who was not challenged");
            return;
        }
        if challenge.is_some_and(|c| c != id) {
            debug!(room_id = %self.id, challenge = id, "stale answer ignored");
            return;
        }
        let Some(pending) = inner.cancel_challenge() else {
            return;
        };

        if pending.challenge.is_correct(answer) {
            info!(room_id = %self.id, defender = ?slot, challenge = id, "challenge defended, move discarded");
            inner.phase = Phase::InProgress;
            inner.broadcast_update();
        } else {
            info!(room_id = %self.id, defender = ?slot, challenge = id, answer, "challenge failed");
            self.take_contested_cell(&mut inner, pending);
        }
    }

    fn handle_timeout(self: &Arc<Self>, challenge: u64) {
        let mut inner = self.inner.lock();
        if inner.pending.as_ref().map(|p| p.id) != Some(challenge) {
            debug!(room_id = %self.id, challenge, "challenge already resolved");
            return;
        }
        let Some(pending) = inner.cancel_challenge() else {
            return;
        };
        info!(room_id = %self.id, challenge, "challenge timed out");
        self.take_contested_cell(&mut inner, pending);
    }

    /// The attacker's move goes through as if it had been uncontested.
    fn take_contested_cell(self: &Arc<Self>, inner: &mut RoomInner, pending: PendingChallenge) {
        inner.phase = Phase::InProgress;
        inner.state.revert_cell(pending.x, pending.y);
        match inner.state.apply_move(pending.attacker, pending.x, pending.y) {
            Ok(()) => self.after_move(inner),
            Err(err) => {
                error!(room_id = %self.id, x = pending.x, y = pending.y, %err, "contested move no longer applies");
                inner.broadcast_update();
            }
        }
    }

    fn open_rooms(&self) -> Vec<String> {
        self.registry
            .upgrade()
            .map(|rooms| manager::available(&rooms).into_keys().collect())
            .unwrap_or_default()
    }
}

async fn receive_loop(room: Arc<Room>, slot: PlayerSlot, session: Session, mut inbound: Inbound) {
    use futures::StreamExt;

    while let Some(frame) = inbound.next().await {
        match frame {
            Ok(ClientMessage::Click(click)) => room.dispatch(RoomEvent::Move {
                slot,
                x: click.x,
                y: click.y,
            }),
            Ok(ClientMessage::Answer(a)) => room.dispatch(RoomEvent::Answer {
                slot,
                answer: a.answer,
                challenge: None,
            }),
            Ok(ClientMessage::GetRooms) => {
                session.send(ServerMessage::Rooms(RoomsPayload {
                    rooms: room.open_rooms(),
                }));
            }
            Ok(ClientMessage::Join(join)) => {
                warn!(requested = %join.room_id, "join from a seated player ignored");
            }
            Err(err) => {
                warn!(%err, "undecodable frame, closing");
                session.close(CloseReason::InvalidPayload);
                break;
            }
        }
    }
    debug!("reader finished");
}
