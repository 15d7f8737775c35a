//! Core types: room identifiers, player profiles, tracing setup

pub mod player;
pub mod room;
pub mod tracing;

pub use player::{PlayerKind, PlayerProfile};
pub use room::{RoomId, RoomIdError};
pub use self::tracing::{LogFormat, TracingConfig, TracingError, init_tracing};
