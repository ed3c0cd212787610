//! Move selection for the single-player seat.

use std::fmt;
use std::str::FromStr;

use rand::seq::IteratorRandom;

use super::state::{has_line, Cell, GameState, PlayerSlot};

/// Default ply limit for boards larger than 3x3.
pub const DEFAULT_SEARCH_DEPTH: usize = 4;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BotError {
    #[error("no empty cell left to play")]
    NoMoveAvailable,
}

/// Picks a move for whichever player is on turn in `state`.
pub trait BotStrategy: Send + Sync + fmt::Debug {
    fn select_move(&self, state: &GameState) -> Result<(usize, usize), BotError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotKind {
    Random,
    Minimax,
}

impl FromStr for BotKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "random" => Ok(BotKind::Random),
            "minimax" | "optimal" => Ok(BotKind::Minimax),
            other => Err(format!("unknown bot strategy '{other}'")),
        }
    }
}

/// Uniform choice among the empty squares.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomBot;

impl BotStrategy for RandomBot {
    fn select_move(&self, state: &GameState) -> Result<(usize, usize), BotError> {
        state
            .empty_cells()
            .choose(&mut rand::thread_rng())
            .ok_or(BotError::NoMoveAvailable)
    }
}

/// Game-tree search with alpha-beta pruning.
///
/// Terminal positions score `max_depth - depth` for a bot win and
/// `depth - max_depth` for a loss, where `max_depth = N*N + 1`, so quicker wins
/// and slower losses are preferred. `ply_limit` bounds the search on boards
/// too large to solve; positions at the cutoff score as a draw.
#[derive(Debug, Clone, Copy)]
pub struct MinimaxBot {
    ply_limit: usize,
}

impl MinimaxBot {
    /// Exhaustive for boards up to 3x3, bounded by `search_depth` above that.
    pub fn for_board(size: usize, search_depth: usize) -> Self {
        let ply_limit = if size <= 3 {
            size * size
        } else {
            search_depth.max(1)
        };
        Self { ply_limit }
    }
}

struct Search {
    size: usize,
    max_depth: i32,
    ply_limit: usize,
    bot: Cell,
    human: Cell,
}

impl Search {
    fn score(&self, board: &mut [Cell], depth: usize, maximizing: bool, mut alpha: i32, mut beta: i32) -> i32 {
        let d = depth as i32;
        if has_line(board, self.size, self.bot) {
            return self.max_depth - d;
        }
        if has_line(board, self.size, self.human) {
            return d - self.max_depth;
        }
        if depth >= self.ply_limit || !board.contains(&Cell::Empty) {
            return 0;
        }

        let mark = if maximizing { self.bot } else { self.human };
        let mut best = if maximizing { i32::MIN } else { i32::MAX };
        for i in 0..board.len() {
            if board[i] != Cell::Empty {
                continue;
            }
            board[i] = mark;
            let eval = self.score(board, depth + 1, !maximizing, alpha, beta);
            board[i] = Cell::Empty;

            if maximizing {
                best = best.max(eval);
                alpha = alpha.max(best);
            } else {
                best = best.min(eval);
                beta = beta.min(best);
            }
            if beta <= alpha {
                break;
            }
        }
        best
    }
}

impl BotStrategy for MinimaxBot {
    fn select_move(&self, state: &GameState) -> Result<(usize, usize), BotError> {
        let size = state.size();
        let me = state.turn();
        let search = Search {
            size,
            max_depth: (size * size + 1) as i32,
            ply_limit: self.ply_limit,
            bot: me.into(),
            human: me.opponent().into(),
        };
        let mut board: Vec<Cell> = state.rows().into_iter().flatten().collect();

        let mut best: Option<(i32, usize)> = None;
        let mut alpha = i32::MIN;
        for i in 0..board.len() {
            if board[i] != Cell::Empty {
                continue;
            }
            board[i] = search.bot;
            let eval = search.score(&mut board, 0, false, alpha, i32::MAX);
            board[i] = Cell::Empty;

            if best.map_or(true, |(score, _)| eval > score) {
                best = Some((eval, i));
                alpha = eval;
            }
        }

        best.map(|(_, i)| (i / size, i % size))
            .ok_or(BotError::NoMoveAvailable)
    }
}

/// Slot the bot occupies in single-player rooms.
pub const BOT_SLOT: PlayerSlot = PlayerSlot::B;
