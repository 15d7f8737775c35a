//! Wire framing, status codes and typed requests for the scaffolding protocol.
//!
//! The scaffolding protocol runs over any ordered, reliable byte stream
//! between a room host and its guests. Every exchange is one request frame
//! followed by one response frame; there is no pipelining.
//!
//! # Frames
//!
//! - Request: tag length (u8), ASCII type tag, body length (u32, big-endian),
//!   body
//! - Response: status (u8), body length (u32, big-endian), body
//!
//! Status 0 means success. Status 255 carries a UTF-8 error message in its
//! body; other non-zero statuses carry no message.
//!
//! # Example
//!
//! ```rust
//! use scaffolding_protocol::{Decode, Status, decode_response, encode_response};
//!
//! let bytes = encode_response(Status::SUCCESS, b"pong").unwrap();
//! let Decode::Complete { value, consumed } = decode_response(&bytes).unwrap() else {
//!     unreachable!()
//! };
//! assert_eq!(value.body.as_ref(), b"pong");
//! assert_eq!(consumed, bytes.len());
//! ```

mod error;
mod framing;
mod status;
mod stream;
mod types;

pub use error::{EncodingError, ErrorCategory, FrameError, ProtocolError, ProtocolResult};
pub use framing::{
    Decode, MAX_TYPE_TAG_LEN, Needed, RESPONSE_HEADER_LEN, RequestFrame, RequestHeader,
    ResponseFrame, ResponseHeader, decode_request, decode_request_header, decode_response,
    decode_response_header, encode_request, encode_request_into, encode_response,
    encode_response_into, validate_type_tag,
};
pub use status::{Status, StatusClass};
pub use stream::{FrameReader, FrameWriter, into_result};
pub use types::{
    MAX_PING_PAYLOAD, Ping, PlayerPing, PlayerProfileList, Protocols, Request, RequestKind,
    ServerPort, decode_protocol_list, encode_protocol_list,
};

/// Default limit on the body length a [`FrameReader`] accepts (1 MiB).
pub const MAX_BODY_LEN: usize = 1024 * 1024;
