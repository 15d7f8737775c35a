//! Client error types.

use std::io;

use scaffolding_core::RoomIdError;
use scaffolding_protocol::{ErrorCategory, ProtocolError, Status};
use scaffolding_server::ServerError;
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// A join code did not parse.
    #[error("invalid room code: {0}")]
    RoomCode(#[from] RoomIdError),

    /// Hosting a room failed.
    #[error("room host error: {0}")]
    Server(#[from] ServerError),

    /// Connecting to the room host failed.
    #[error("failed to connect to {addr}: {source}")]
    Connection {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// An operation did not finish in time.
    #[error("timeout: {0}")]
    Timeout(String),

    /// The stream is unusable after an earlier transport failure.
    #[error("connection is closed")]
    Closed,

    /// Protocol, framing or request failure.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl ClientError {
    /// Returns the status of a failed request, if this is one.
    pub fn status(&self) -> Option<Status> {
        match self {
            Self::Protocol(e) => e.status(),
            _ => None,
        }
    }

    /// Returns the failure class.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Config(_) | Self::RoomCode(_) => ErrorCategory::Local,
            Self::Server(ServerError::Config { .. }) => ErrorCategory::Local,
            Self::Server(_) => ErrorCategory::Connection,
            Self::Connection { .. } | Self::Timeout(_) | Self::Closed => ErrorCategory::Connection,
            Self::Protocol(e) => e.category(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_failures_expose_status() {
        let err = ClientError::from(ProtocolError::RequestFailed {
            status: Status(40),
            message: None,
        });
        assert_eq!(err.status(), Some(Status(40)));
        assert_eq!(err.category(), ErrorCategory::Protocol);
        assert_eq!(ClientError::Closed.status(), None);
    }

    #[test]
    fn transport_failures_are_connection_errors() {
        let err = ClientError::Connection {
            addr: "127.0.0.1:1".to_string(),
            source: io::Error::from(io::ErrorKind::ConnectionRefused),
        };
        assert_eq!(err.category(), ErrorCategory::Connection);
        assert_eq!(ClientError::Closed.category(), ErrorCategory::Connection);
        assert_eq!(
            ClientError::Config("bad".into()).category(),
            ErrorCategory::Local
        );
    }
}
