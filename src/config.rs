//! Configuration utilities (port, game tuning, env vars)

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::game::bot::DEFAULT_SEARCH_DEPTH;
use crate::game::state::DEFAULT_BOARD_SIZE;
use crate::game::challenge::ChallengeError;
use crate::game::{BotKind, BotStrategy, ChallengePool, MinimaxBot, RandomBot};
use crate::room::instance::{DEFAULT_BOT_DELAY, DEFAULT_CHALLENGE_TIMEOUT};
use crate::room::RoomConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub addr: SocketAddr,
    pub board_size: usize,
    pub bot: BotKind,
    pub bot_search_depth: usize,
    pub bot_delay: Duration,
    pub challenge_timeout: Duration,
    pub write_timeout: Duration,
    pub challenges_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8080)),
            board_size: DEFAULT_BOARD_SIZE,
            bot: BotKind::Minimax,
            bot_search_depth: DEFAULT_SEARCH_DEPTH,
            bot_delay: DEFAULT_BOT_DELAY,
            challenge_timeout: DEFAULT_CHALLENGE_TIMEOUT,
            write_timeout: Duration::from_secs(5),
            challenges_path: None,
        }
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "ignoring unparseable setting");
            default
        }),
    }
}

impl Settings {
    /// Reads settings from the process environment.
    ///
    /// `PORT` (Fly.io style) picks the port, bound on 0.0.0.0. Game tuning
    /// lives under `GOONKER_*`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let d = Self::default();
        let port = parse_or(&lookup, "PORT", d.addr.port());
        let board_size =
            parse_or(&lookup, "GOONKER_BOARD_SIZE", d.board_size).max(DEFAULT_BOARD_SIZE);
        Self {
            addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)),
            board_size,
            bot: parse_or(&lookup, "GOONKER_BOT", d.bot),
            bot_search_depth: parse_or(&lookup, "GOONKER_BOT_DEPTH", d.bot_search_depth),
            bot_delay: Duration::from_millis(parse_or(
                &lookup,
                "GOONKER_BOT_DELAY_MS",
                d.bot_delay.as_millis() as u64,
            )),
            challenge_timeout: Duration::from_secs(parse_or(
                &lookup,
                "GOONKER_CHALLENGE_SECS",
                d.challenge_timeout.as_secs(),
            )),
            write_timeout: Duration::from_secs(parse_or(
                &lookup,
                "GOONKER_WRITE_TIMEOUT_SECS",
                d.write_timeout.as_secs(),
            )),
            challenges_path: lookup("GOONKER_CHALLENGES").map(PathBuf::from),
        }
    }

    pub fn bot_strategy(&self) -> Arc<dyn BotStrategy> {
        match self.bot {
            BotKind::Random => Arc::new(RandomBot),
            BotKind::Minimax => Arc::new(MinimaxBot::for_board(self.board_size, self.bot_search_depth)),
        }
    }

    /// Loads the challenge pool and assembles the per-room settings.
    pub fn room_config(&self) -> Result<RoomConfig, ChallengeError> {
        let challenges = match &self.challenges_path {
            Some(path) => ChallengePool::from_file(path)?,
            None => ChallengePool::builtin()?,
        };
        Ok(RoomConfig {
            board_size: self.board_size,
            challenge_timeout: self.challenge_timeout,
            bot_delay: self.bot_delay,
            bot: self.bot_strategy(),
            challenges,
        })
    }
}
