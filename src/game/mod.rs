//! Pure game rules, the bot player and the challenge pool.

pub mod bot;
pub mod challenge;
pub mod state;

pub use bot::{BotKind, BotStrategy, MinimaxBot, RandomBot, BOT_SLOT};
pub use challenge::{Challenge, ChallengeDeck, ChallengePool};
pub use state::{Cell, GameState, MoveError, PlayerSlot};
