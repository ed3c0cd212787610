//! Board, turn and terminal-condition rules.

use serde::{Deserialize, Serialize};

/// Default board dimension.
pub const DEFAULT_BOARD_SIZE: usize = 3;

/// One of the two seats at a table. `A` plays X and always opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum PlayerSlot {
    A,
    B,
}

impl PlayerSlot {
    pub fn opponent(self) -> Self {
        match self {
            PlayerSlot::A => PlayerSlot::B,
            PlayerSlot::B => PlayerSlot::A,
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            PlayerSlot::A => 0,
            PlayerSlot::B => 1,
        }
    }
}

impl From<PlayerSlot> for u8 {
    fn from(slot: PlayerSlot) -> u8 {
        match slot {
            PlayerSlot::A => 1,
            PlayerSlot::B => 2,
        }
    }
}

impl TryFrom<u8> for PlayerSlot {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            1 => Ok(PlayerSlot::A),
            2 => Ok(PlayerSlot::B),
            other => Err(format!("invalid player slot {other}")),
        }
    }
}

/// Content of a single board square. Encoded on the wire as 0/1/2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Cell {
    #[default]
    Empty,
    PlayerA,
    PlayerB,
}

impl From<PlayerSlot> for Cell {
    fn from(slot: PlayerSlot) -> Cell {
        match slot {
            PlayerSlot::A => Cell::PlayerA,
            PlayerSlot::B => Cell::PlayerB,
        }
    }
}

impl From<Option<PlayerSlot>> for Cell {
    fn from(slot: Option<PlayerSlot>) -> Cell {
        slot.map(Cell::from).unwrap_or(Cell::Empty)
    }
}

impl From<Cell> for u8 {
    fn from(cell: Cell) -> u8 {
        match cell {
            Cell::Empty => 0,
            Cell::PlayerA => 1,
            Cell::PlayerB => 2,
        }
    }
}

impl TryFrom<u8> for Cell {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Cell::Empty),
            1 => Ok(Cell::PlayerA),
            2 => Ok(Cell::PlayerB),
            other => Err(format!("invalid cell {other}")),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MoveError {
    #[error("game is over")]
    GameAlreadyOver,
    #[error("not {0:?}'s turn")]
    NotPlayersTurn(PlayerSlot),
    #[error("({x}, {y}) is out of bounds")]
    OutOfBounds { x: i32, y: i32 },
    #[error("({x}, {y}) is already taken by the mover")]
    CellOccupied { x: i32, y: i32 },
}

/// Pure game state for one match. Squares are addressed `(x, y)` with `x`
/// selecting the row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameState {
    size: usize,
    board: Vec<Cell>,
    turn: PlayerSlot,
    move_count: usize,
    winner: Option<PlayerSlot>,
    is_over: bool,
}

impl Default for GameState {
    fn default() -> Self {
        Self::new(DEFAULT_BOARD_SIZE)
    }
}

impl GameState {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            board: vec![Cell::Empty; size * size],
            turn: PlayerSlot::A,
            move_count: 0,
            winner: None,
            is_over: false,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn turn(&self) -> PlayerSlot {
        self.turn
    }

    pub fn move_count(&self) -> usize {
        self.move_count
    }

    pub fn winner(&self) -> Option<PlayerSlot> {
        self.winner
    }

    pub fn is_over(&self) -> bool {
        self.is_over
    }

    pub fn cell(&self, x: i32, y: i32) -> Option<Cell> {
        self.index(x, y).map(|i| self.board[i])
    }

    /// Board as rows, `rows()[x][y]`.
    pub fn rows(&self) -> Vec<Vec<Cell>> {
        self.board.chunks(self.size).map(<[Cell]>::to_vec).collect()
    }

    pub fn empty_cells(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.board
            .iter()
            .enumerate()
            .filter(|(_, c)| **c == Cell::Empty)
            .map(move |(i, _)| (i / self.size, i % self.size))
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        let (x, y) = (usize::try_from(x).ok()?, usize::try_from(y).ok()?);
        (x < self.size && y < self.size).then_some(x * self.size + y)
    }

    /// Validates a move without applying it and returns the board index.
    /// Opponent-held squares pass; deciding what to do with them is up to the
    /// caller.
    pub fn check_move(&self, player: PlayerSlot, x: i32, y: i32) -> Result<usize, MoveError> {
        if self.is_over {
            return Err(MoveError::GameAlreadyOver);
        }
        if player != self.turn {
            return Err(MoveError::NotPlayersTurn(player));
        }
        let idx = self.index(x, y).ok_or(MoveError::OutOfBounds { x, y })?;
        if self.board[idx] == Cell::from(player) {
            return Err(MoveError::CellOccupied { x, y });
        }
        Ok(idx)
    }

    pub fn apply_move(&mut self, player: PlayerSlot, x: i32, y: i32) -> Result<(), MoveError> {
        let idx = self.check_move(player, x, y)?;

        // move_count tracks filled squares; overwriting an opponent does not add one
        if self.board[idx] == Cell::Empty {
            self.move_count += 1;
        }
        self.board[idx] = player.into();

        if self.check_win(player) {
            self.winner = Some(player);
            self.is_over = true;
        } else if self.move_count >= self.size * self.size {
            self.is_over = true;
        } else {
            self.turn = player.opponent();
        }
        Ok(())
    }

    /// True when `(x, y)` holds the opponent's mark.
    pub fn is_contested_cell(&self, player: PlayerSlot, x: i32, y: i32) -> bool {
        match self.cell(x, y) {
            Some(Cell::Empty) | None => false,
            Some(cell) => cell != Cell::from(player),
        }
    }

    /// Clears a square. Out-of-range or already empty squares are left alone.
    pub fn revert_cell(&mut self, x: i32, y: i32) {
        if let Some(idx) = self.index(x, y) {
            if self.board[idx] != Cell::Empty {
                self.board[idx] = Cell::Empty;
                self.move_count -= 1;
            }
        }
    }

    pub fn check_win(&self, player: PlayerSlot) -> bool {
        has_line(&self.board, self.size, player.into())
    }
}

/// Scans every row, column and both diagonals for a complete line of `mark`.
pub(crate) fn has_line(board: &[Cell], size: usize, mark: Cell) -> bool {
    if size == 0 || mark == Cell::Empty {
        return false;
    }
    let at = |x: usize, y: usize| board[x * size + y] == mark;

    let mut found = false;
    for i in 0..size {
        found |= (0..size).all(|j| at(i, j));
        found |= (0..size).all(|j| at(j, i));
    }
    found |= (0..size).all(|i| at(i, i));
    found |= (0..size).all(|i| at(i, size - 1 - i));
    found
}
