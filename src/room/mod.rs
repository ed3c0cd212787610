//! Rooms, the sessions seated in them and the registry that owns them.

pub mod instance;
pub mod manager;
pub mod session;

pub use instance::{JoinError, Occupancy, Phase, Rejected, Room, RoomConfig, RoomEvent};
pub use manager::RoomManager;
pub use session::{in_memory, Connection, Inbound, RemoteEnd, Session};
