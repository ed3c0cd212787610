//! Session server for two-player tic-tac-toe over websockets, with a
//! single-player bot mode and quiz challenges on contested squares.

pub mod config;
pub mod game;
pub mod handshake;
pub mod http;
pub mod protocol;
pub mod room;
pub mod telemetry;
pub mod util;
pub mod ws;
