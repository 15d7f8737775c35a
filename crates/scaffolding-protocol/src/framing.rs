//! Byte layout of request and response frames.
//!
//! All integers are big-endian regardless of host byte order.
//!
//! ```text
//! Request:  +-------------+----------------+---------------+-----------+
//!           | tag len (1) | tag (tag len)  | body len (4)  | body      |
//!           +-------------+----------------+---------------+-----------+
//!
//! Response: +------------+---------------+-----------+
//!           | status (1) | body len (4)  | body      |
//!           +------------+---------------+-----------+
//! ```
//!
//! Decoders never fail on short input. They return [`Decode::Incomplete`]
//! and the caller reads more bytes before trying again.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{EncodingError, FrameError};
use crate::status::Status;

/// Longest request type tag the one-byte length prefix can describe.
pub const MAX_TYPE_TAG_LEN: usize = u8::MAX as usize;

/// Size of the fixed response header (status + body length).
pub const RESPONSE_HEADER_LEN: usize = 5;

/// Size of the body length prefix.
const BODY_LEN_SIZE: usize = 4;

/// What a decoder is still waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Needed {
    /// The fixed part of the header is not complete yet.
    Header { available: usize },
    /// The header is complete but the declared body has not fully arrived.
    Body { declared: usize, available: usize },
}

/// Outcome of feeding a buffer to a decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decode<T> {
    /// A value was decoded from the first `consumed` bytes of the buffer.
    Complete { value: T, consumed: usize },
    /// More bytes are required.
    Incomplete(Needed),
}

impl<T> Decode<T> {
    /// Returns the decoded value, discarding the consumed length.
    pub fn complete(self) -> Option<T> {
        match self {
            Self::Complete { value, .. } => Some(value),
            Self::Incomplete(_) => None,
        }
    }

    /// Returns true if more bytes are required.
    pub fn is_incomplete(&self) -> bool {
        matches!(self, Self::Incomplete(_))
    }
}

/// A decoded request frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFrame {
    /// Request type tag, e.g. `ping`.
    pub type_tag: String,
    /// Raw request body.
    pub body: Bytes,
}

impl RequestFrame {
    /// Creates a request frame.
    pub fn new(type_tag: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            type_tag: type_tag.into(),
            body: body.into(),
        }
    }
}

/// A decoded response frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseFrame {
    /// Status byte.
    pub status: Status,
    /// Raw response body.
    pub body: Bytes,
}

impl ResponseFrame {
    /// Creates a response frame.
    pub fn new(status: Status, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Creates a successful response frame.
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self::new(Status::SUCCESS, body)
    }

    /// Creates a response frame with an empty body.
    pub fn empty(status: Status) -> Self {
        Self::new(status, Bytes::new())
    }
}

/// Header of a request frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHeader {
    /// Request type tag.
    pub type_tag: String,
    /// Declared body length.
    pub body_len: usize,
}

impl RequestHeader {
    /// Length of the encoded header (tag length, tag, body length).
    pub fn header_len(&self) -> usize {
        1 + self.type_tag.len() + BODY_LEN_SIZE
    }

    /// Length of the whole frame.
    pub fn frame_len(&self) -> usize {
        self.header_len() + self.body_len
    }

    /// Bytes still missing when `available` bytes of the frame are buffered.
    pub fn awaiting(&self, available: usize) -> usize {
        self.frame_len().saturating_sub(available)
    }
}

/// Header of a response frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHeader {
    /// Status byte.
    pub status: Status,
    /// Declared body length.
    pub body_len: usize,
}

impl ResponseHeader {
    /// Length of the whole frame.
    pub fn frame_len(&self) -> usize {
        RESPONSE_HEADER_LEN + self.body_len
    }
}

fn is_tag_byte(b: u8) -> bool {
    b.is_ascii() && !b.is_ascii_control()
}

/// Checks that a request type tag can be encoded.
pub fn validate_type_tag(type_tag: &str) -> Result<(), EncodingError> {
    if type_tag.is_empty() {
        return Err(EncodingError::EmptyTypeTag);
    }
    if type_tag.len() > MAX_TYPE_TAG_LEN {
        return Err(EncodingError::TypeTagTooLong {
            len: type_tag.len(),
        });
    }
    if !type_tag.bytes().all(is_tag_byte) {
        return Err(EncodingError::InvalidTypeTag {
            tag: type_tag.to_string(),
        });
    }
    Ok(())
}

fn body_len_prefix(body: &[u8]) -> Result<u32, EncodingError> {
    u32::try_from(body.len()).map_err(|_| EncodingError::BodyTooLarge { len: body.len() })
}

fn read_body_len(bytes: &[u8]) -> Result<usize, FrameError> {
    let declared = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    usize::try_from(declared).map_err(|_| FrameError::LengthOverflow { declared })
}

/// Appends an encoded request frame to `dst`.
pub fn encode_request_into(
    type_tag: &str,
    body: &[u8],
    dst: &mut BytesMut,
) -> Result<(), EncodingError> {
    validate_type_tag(type_tag)?;
    let body_len = body_len_prefix(body)?;

    dst.reserve(1 + type_tag.len() + BODY_LEN_SIZE + body.len());
    dst.put_u8(type_tag.len() as u8);
    dst.put_slice(type_tag.as_bytes());
    dst.put_u32(body_len);
    dst.put_slice(body);
    Ok(())
}

/// Encodes a request frame.
pub fn encode_request(type_tag: &str, body: &[u8]) -> Result<Bytes, EncodingError> {
    let mut dst = BytesMut::new();
    encode_request_into(type_tag, body, &mut dst)?;
    Ok(dst.freeze())
}

/// Appends an encoded response frame to `dst`.
pub fn encode_response_into(
    status: Status,
    body: &[u8],
    dst: &mut BytesMut,
) -> Result<(), EncodingError> {
    let body_len = body_len_prefix(body)?;

    dst.reserve(RESPONSE_HEADER_LEN + body.len());
    dst.put_u8(status.code());
    dst.put_u32(body_len);
    dst.put_slice(body);
    Ok(())
}

/// Encodes a response frame.
pub fn encode_response(status: Status, body: &[u8]) -> Result<Bytes, EncodingError> {
    let mut dst = BytesMut::new();
    encode_response_into(status, body, &mut dst)?;
    Ok(dst.freeze())
}

/// Decodes the header of a request frame.
///
/// `consumed` in the result is the header length; the body follows it.
pub fn decode_request_header(buf: &[u8]) -> Result<Decode<RequestHeader>, FrameError> {
    let Some(&tag_len) = buf.first() else {
        return Ok(Decode::Incomplete(Needed::Header { available: 0 }));
    };
    let tag_len = tag_len as usize;
    if tag_len == 0 {
        return Err(FrameError::EmptyTypeTag);
    }

    let header_len = 1 + tag_len + BODY_LEN_SIZE;
    if buf.len() < header_len {
        // Reject a bad tag as soon as its bytes are visible.
        let visible = &buf[1..buf.len().min(1 + tag_len)];
        if !visible.iter().copied().all(is_tag_byte) {
            return Err(FrameError::InvalidTypeTag);
        }
        return Ok(Decode::Incomplete(Needed::Header {
            available: buf.len(),
        }));
    }

    let tag_bytes = &buf[1..1 + tag_len];
    if !tag_bytes.iter().copied().all(is_tag_byte) {
        return Err(FrameError::InvalidTypeTag);
    }
    // Printable ASCII is always valid UTF-8.
    let type_tag = String::from_utf8_lossy(tag_bytes).into_owned();
    let body_len = read_body_len(&buf[1 + tag_len..header_len])?;

    Ok(Decode::Complete {
        value: RequestHeader { type_tag, body_len },
        consumed: header_len,
    })
}

/// Decodes a complete request frame from the front of `buf`.
pub fn decode_request(buf: &[u8]) -> Result<Decode<RequestFrame>, FrameError> {
    let header = match decode_request_header(buf)? {
        Decode::Complete { value, .. } => value,
        Decode::Incomplete(needed) => return Ok(Decode::Incomplete(needed)),
    };

    let header_len = header.header_len();
    let frame_len = header.frame_len();
    if buf.len() < frame_len {
        return Ok(Decode::Incomplete(Needed::Body {
            declared: header.body_len,
            available: buf.len() - header_len,
        }));
    }

    Ok(Decode::Complete {
        value: RequestFrame {
            type_tag: header.type_tag,
            body: Bytes::copy_from_slice(&buf[header_len..frame_len]),
        },
        consumed: frame_len,
    })
}

/// Decodes the fixed header of a response frame.
pub fn decode_response_header(buf: &[u8]) -> Result<Decode<ResponseHeader>, FrameError> {
    if buf.len() < RESPONSE_HEADER_LEN {
        return Ok(Decode::Incomplete(Needed::Header {
            available: buf.len(),
        }));
    }

    Ok(Decode::Complete {
        value: ResponseHeader {
            status: Status(buf[0]),
            body_len: read_body_len(&buf[1..RESPONSE_HEADER_LEN])?,
        },
        consumed: RESPONSE_HEADER_LEN,
    })
}

/// Decodes a complete response frame from the front of `buf`.
pub fn decode_response(buf: &[u8]) -> Result<Decode<ResponseFrame>, FrameError> {
    let header = match decode_response_header(buf)? {
        Decode::Complete { value, .. } => value,
        Decode::Incomplete(needed) => return Ok(Decode::Incomplete(needed)),
    };

    let frame_len = header.frame_len();
    if buf.len() < frame_len {
        return Ok(Decode::Incomplete(Needed::Body {
            declared: header.body_len,
            available: buf.len() - RESPONSE_HEADER_LEN,
        }));
    }

    Ok(Decode::Complete {
        value: ResponseFrame {
            status: header.status,
            body: Bytes::copy_from_slice(&buf[RESPONSE_HEADER_LEN..frame_len]),
        },
        consumed: frame_len,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_layout() {
        let bytes = encode_request("ping", b"hi").unwrap();
        assert_eq!(
            bytes.as_ref(),
            &[4, b'p', b'i', b'n', b'g', 0, 0, 0, 2, b'h', b'i']
        );
    }

    #[test]
    fn response_layout_is_big_endian() {
        let body = vec![7u8; 0x0102];
        let bytes = encode_response(Status(32), &body).unwrap();
        assert_eq!(&bytes[..5], &[32, 0, 0, 0x01, 0x02]);
        assert_eq!(bytes.len(), 5 + 0x0102);
    }

    #[test]
    fn request_roundtrip() {
        let bytes = encode_request("player_ping", b"{}").unwrap();
        let decoded = decode_request(&bytes).unwrap();
        assert_eq!(
            decoded,
            Decode::Complete {
                value: RequestFrame::new("player_ping", &b"{}"[..]),
                consumed: bytes.len(),
            }
        );
    }

    #[test]
    fn response_roundtrip_with_trailing_bytes() {
        let mut bytes = BytesMut::new();
        encode_response_into(Status::SUCCESS, b"abc", &mut bytes).unwrap();
        encode_response_into(Status::FAILURE, b"next", &mut bytes).unwrap();

        let Decode::Complete { value, consumed } = decode_response(&bytes).unwrap() else {
            panic!("expected a complete frame");
        };
        assert_eq!(value, ResponseFrame::ok(&b"abc"[..]));
        assert_eq!(consumed, 8);
    }

    #[test]
    fn encode_rejects_bad_tags() {
        assert_eq!(
            encode_request("", b"").unwrap_err(),
            EncodingError::EmptyTypeTag
        );
        let long = "x".repeat(256);
        assert_eq!(
            encode_request(&long, b"").unwrap_err(),
            EncodingError::TypeTagTooLong { len: 256 }
        );
        assert!(matches!(
            encode_request("pi\nng", b""),
            Err(EncodingError::InvalidTypeTag { .. })
        ));
        assert!(matches!(
            encode_request("pïng", b""),
            Err(EncodingError::InvalidTypeTag { .. })
        ));
    }

    #[test]
    fn encode_accepts_255_byte_tag() {
        let tag = "t".repeat(255);
        let bytes = encode_request(&tag, b"").unwrap();
        assert_eq!(bytes[0], 255);
        let header = decode_request_header(&bytes).unwrap().complete().unwrap();
        assert_eq!(header.type_tag, tag);
    }

    #[test]
    fn short_response_header_is_incomplete() {
        for len in 0..RESPONSE_HEADER_LEN {
            let buf = vec![0u8; len];
            assert_eq!(
                decode_response(&buf).unwrap(),
                Decode::Incomplete(Needed::Header { available: len })
            );
        }
    }

    #[test]
    fn short_response_body_is_incomplete() {
        let bytes = encode_response(Status::SUCCESS, b"hello").unwrap();
        assert_eq!(
            decode_response(&bytes[..7]).unwrap(),
            Decode::Incomplete(Needed::Body {
                declared: 5,
                available: 2
            })
        );
    }

    #[test]
    fn request_header_reports_awaiting_bytes() {
        let bytes = encode_request("ping", b"0123456789").unwrap();
        let header = decode_request_header(&bytes[..9]).unwrap().complete().unwrap();
        assert_eq!(header.type_tag, "ping");
        assert_eq!(header.body_len, 10);
        assert_eq!(header.awaiting(9), 10);
        assert_eq!(header.awaiting(bytes.len()), 0);
    }

    #[test]
    fn partial_request_header_is_incomplete() {
        let bytes = encode_request("protocols", b"").unwrap();
        for len in 0..bytes.len() {
            assert!(
                decode_request(&bytes[..len]).unwrap().is_incomplete(),
                "decoded from {len} bytes"
            );
        }
    }

    #[test]
    fn zero_length_tag_is_a_frame_error() {
        assert_eq!(
            decode_request_header(&[0, 0, 0, 0, 0]).unwrap_err(),
            FrameError::EmptyTypeTag
        );
    }

    #[test]
    fn control_characters_in_tag_are_a_frame_error() {
        let buf = [3, b'a', 0x07, b'c', 0, 0, 0, 0];
        assert_eq!(
            decode_request_header(&buf).unwrap_err(),
            FrameError::InvalidTypeTag
        );
        // Detected before the header is complete.
        assert_eq!(
            decode_request_header(&buf[..3]).unwrap_err(),
            FrameError::InvalidTypeTag
        );
    }
}
