//! Protocol error types.

use thiserror::Error;

use crate::status::Status;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Local input that cannot be put on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    /// Request type tags must not be empty.
    #[error("request type tag is empty")]
    EmptyTypeTag,

    /// Request type tags are limited to 255 bytes.
    #[error("request type tag too long: {len} bytes (max: 255)")]
    TypeTagTooLong { len: usize },

    /// Request type tags must be printable ASCII.
    #[error("request type tag {tag:?} contains non-ASCII or control characters")]
    InvalidTypeTag { tag: String },

    /// Frame bodies are limited to `u32::MAX` bytes.
    #[error("frame body too large: {len} bytes (max: {})", u32::MAX)]
    BodyTooLarge { len: usize },
}

/// Bytes on the wire that can never form a valid frame.
///
/// Short input is not an error; see [`crate::Decode::Incomplete`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// A request frame declared a zero-length type tag.
    #[error("request frame has an empty type tag")]
    EmptyTypeTag,

    /// A request frame's type tag holds non-ASCII or control bytes.
    #[error("request frame type tag is not printable ASCII")]
    InvalidTypeTag,

    /// The declared body length does not fit in this platform's `usize`.
    #[error("declared body length {declared} is not addressable")]
    LengthOverflow { declared: u32 },
}

/// Broad class of a [`ProtocolError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Rejected locally before any I/O took place.
    Local,
    /// The stream failed, closed early, or carried garbage.
    Connection,
    /// The peer answered with a non-zero status or an unusable body.
    Protocol,
    /// The operation was cancelled.
    Cancelled,
}

/// Errors that can occur during protocol operations.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Local input rejected by the frame encoder.
    #[error("encoding failed: {0}")]
    Encoding(#[from] EncodingError),

    /// Local request argument rejected before sending.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Malformed frame received from the peer.
    #[error("malformed frame: {0}")]
    Frame(#[from] FrameError),

    /// Peer declared a body larger than this reader accepts.
    #[error("frame too large: {size} bytes (max: {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// The stream ended before a complete frame arrived.
    #[error("connection closed unexpectedly ({buffered} bytes of a partial frame buffered)")]
    ConnectionClosedUnexpectedly { buffered: usize },

    /// IO error during read/write.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer answered with a non-zero status.
    #[error("request failed with status {status}: {}", failure_detail(.status, .message))]
    RequestFailed {
        status: Status,
        message: Option<String>,
    },

    /// The peer answered with status 0 but the body could not be parsed.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Failed to serialize a request body to JSON.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The operation was cancelled.
    #[error("operation cancelled")]
    Cancelled,
}

fn failure_detail<'a>(status: &Status, message: &'a Option<String>) -> &'a str {
    message.as_deref().unwrap_or(status.description())
}

impl ProtocolError {
    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Creates an invalid response error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse(message.into())
    }

    /// Returns the broad class of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Encoding(_) | Self::InvalidArgument(_) | Self::Serialization(_) => {
                ErrorCategory::Local
            }
            Self::Frame(_)
            | Self::FrameTooLarge { .. }
            | Self::ConnectionClosedUnexpectedly { .. }
            | Self::Io(_) => ErrorCategory::Connection,
            Self::RequestFailed { .. } | Self::InvalidResponse(_) => ErrorCategory::Protocol,
            Self::Cancelled => ErrorCategory::Cancelled,
        }
    }

    /// Returns true if the stream can no longer be used after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Connection | ErrorCategory::Cancelled
        )
    }

    /// Returns the status of a [`ProtocolError::RequestFailed`].
    pub fn status(&self) -> Option<Status> {
        match self {
            Self::RequestFailed { status, .. } => Some(*status),
            _ => None,
        }
    }
}
