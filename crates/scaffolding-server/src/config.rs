//! Server configuration.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use scaffolding_protocol::MAX_BODY_LEN;

use crate::error::{ServerError, ServerResult};

/// Default port the room host listens on.
pub const DEFAULT_PORT: u16 = 13448;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on.
    pub bind_addr: SocketAddr,

    /// How long a session may stay silent between requests.
    ///
    /// `None` keeps idle sessions open until the peer disconnects.
    pub idle_timeout: Option<Duration>,

    /// Maximum concurrent sessions.
    pub max_sessions: usize,

    /// Largest request body accepted from a peer.
    pub max_body_len: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            idle_timeout: Some(Duration::from_secs(120)),
            max_sessions: 64,
            max_body_len: MAX_BODY_LEN,
        }
    }
}

impl ServerConfig {
    /// Creates a new server configuration listening on `bind_addr`.
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Default::default()
        }
    }

    /// Builder: set the idle timeout.
    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Builder: set max concurrent sessions.
    pub fn with_max_sessions(mut self, max: usize) -> Self {
        self.max_sessions = max;
        self
    }

    /// Builder: set the largest accepted request body.
    pub fn with_max_body_len(mut self, max: usize) -> Self {
        self.max_body_len = max;
        self
    }

    /// Checks the configuration before binding.
    pub fn validate(&self) -> ServerResult<()> {
        if self.max_sessions == 0 {
            return Err(ServerError::config("max_sessions must be at least 1"));
        }
        if self.idle_timeout.is_some_and(|t| t.is_zero()) {
            return Err(ServerError::config(
                "idle_timeout must be positive; use None to disable it",
            ));
        }
        Ok(())
    }
}

/// Returns the default listen address, every interface on [`DEFAULT_PORT`].
pub fn default_bind_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT))
}
