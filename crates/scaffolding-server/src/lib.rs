//! Room host: TCP listener, per-session request loop, request handlers.
//!
//! This crate provides the host side of a scaffolding room:
//! - A TCP listener that hands each peer its own session
//! - A registry routing request frames to handlers by type tag
//! - The shared room context (metadata, protocols, game port, roster)
//!
//! # Example
//!
//! ```rust,no_run
//! use scaffolding_core::RoomId;
//! use scaffolding_server::{
//!     RequestHandler, ServerConfig, ServerContext, SocketServer, make_connection_handler,
//! };
//! use tokio::net::TcpStream;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let context = ServerContext::builder(RoomId::generate())
//!         .host_name("Alex")
//!         .server_port(25565)
//!         .shared();
//!     let server = SocketServer::new(ServerConfig::default()).await?;
//!     let handler = make_connection_handler::<TcpStream>(RequestHandler::new(context));
//!     server.run(handler, CancellationToken::new()).await?;
//!     Ok(())
//! }
//! ```

mod config;
mod context;
mod error;
mod handler;
mod socket;

pub use config::{DEFAULT_PORT, ServerConfig, default_bind_addr};
pub use context::{ContextBuilder, RoomInfo, Roster, ServerContext, SessionId, SharedContext};
pub use error::{ServerError, ServerResult};
pub use handler::{
    Handler, HandlerError, HandlerFuture, HandlerRegistry, HandlerRequest, HandlerResponse,
    HandlerResult, PingHandler, PlayerPingHandler, PlayerProfileListHandler, ProtocolsHandler,
    RequestHandler, ServerPortHandler, make_connection_handler,
};
pub use socket::{Connection, SocketServer};
