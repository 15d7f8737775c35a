//! Client dispatcher and the `scaffolding` command-line tool.
//!
//! [`ScaffoldingClient`] issues typed requests against a room host, one at a
//! time per stream. The `scaffolding` binary wraps it together with the room
//! host from `scaffolding-server`.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod socket;

pub use cli::Cli;
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use socket::{ClientState, ScaffoldingClient};
