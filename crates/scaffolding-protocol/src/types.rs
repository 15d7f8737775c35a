//! Typed requests for the scaffolding protocol.
//!
//! Each request type knows its wire tag, how to write its body, and how to
//! parse the body of a successful response. Callers never touch tags or byte
//! layouts directly.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use scaffolding_core::PlayerProfile;

use crate::error::{ProtocolError, ProtocolResult};

/// Ping payloads must be shorter than this many bytes.
pub const MAX_PING_PAYLOAD: usize = 32;

/// Separator between entries of a protocol list.
const PROTOCOL_SEPARATOR: u8 = 0;

/// The closed set of request types this crate knows how to issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    /// Echo a short payload.
    Ping,
    /// Exchange supported request tags.
    Protocols,
    /// Fetch the host's game-server port.
    ServerPort,
    /// Announce or refresh the caller's player profile.
    PlayerPing,
    /// Fetch the room roster.
    PlayerProfileList,
}

impl RequestKind {
    /// Every request kind, in declaration order.
    pub const ALL: [RequestKind; 5] = [
        RequestKind::Ping,
        RequestKind::Protocols,
        RequestKind::ServerPort,
        RequestKind::PlayerPing,
        RequestKind::PlayerProfileList,
    ];

    /// Returns the wire type tag.
    pub fn as_tag(self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::Protocols => "protocols",
            Self::ServerPort => "server_port",
            Self::PlayerPing => "player_ping",
            Self::PlayerProfileList => "player_profile_list",
        }
    }

    /// Looks up a request kind by its exact wire tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_tag() == tag)
    }

    /// Returns the tags of every request kind.
    pub fn all_tags() -> Vec<String> {
        Self::ALL.iter().map(|kind| kind.as_tag().to_string()).collect()
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

/// A request that can be sent with a [`crate::FrameWriter`] and whose
/// successful response parses into [`Request::Output`].
pub trait Request {
    /// Typed result of a successful response.
    type Output;

    /// Which request this is.
    const KIND: RequestKind;

    /// Returns the wire type tag.
    fn type_tag(&self) -> &'static str {
        Self::KIND.as_tag()
    }

    /// Appends the request body to `body`.
    fn write_body(&self, body: &mut BytesMut) -> ProtocolResult<()>;

    /// Parses the body of a status-0 response.
    fn parse_response(&self, body: Bytes) -> ProtocolResult<Self::Output>;
}

/// Echo request. The response body must equal the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ping {
    payload: Bytes,
}

impl Ping {
    /// Creates a ping request, rejecting payloads of 32 bytes or more.
    pub fn new(payload: impl Into<Bytes>) -> ProtocolResult<Self> {
        let payload = payload.into();
        if payload.len() >= MAX_PING_PAYLOAD {
            return Err(ProtocolError::invalid_argument(format!(
                "ping payload must be shorter than {MAX_PING_PAYLOAD} bytes, got {}",
                payload.len()
            )));
        }
        Ok(Self { payload })
    }

    /// Returns the payload.
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }
}

impl Request for Ping {
    type Output = Bytes;
    const KIND: RequestKind = RequestKind::Ping;

    fn write_body(&self, body: &mut BytesMut) -> ProtocolResult<()> {
        body.put_slice(&self.payload);
        Ok(())
    }

    fn parse_response(&self, body: Bytes) -> ProtocolResult<Bytes> {
        Ok(body)
    }
}

/// Encodes a protocol list as NUL-separated ASCII.
pub fn encode_protocol_list<S: AsRef<str>>(tags: &[S]) -> Vec<u8> {
    let mut body = Vec::new();
    for (i, tag) in tags.iter().enumerate() {
        if i > 0 {
            body.push(PROTOCOL_SEPARATOR);
        }
        body.extend_from_slice(tag.as_ref().as_bytes());
    }
    body
}

/// Decodes a NUL-separated protocol list, dropping empty entries.
pub fn decode_protocol_list(body: &[u8]) -> Vec<String> {
    body.split(|b| *b == PROTOCOL_SEPARATOR)
        .filter(|segment| !segment.is_empty())
        .map(|segment| String::from_utf8_lossy(segment).into_owned())
        .collect()
}

/// Protocol negotiation request.
///
/// The body lists the tags the caller supports; the response lists the tags
/// the peer supports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Protocols {
    supported: Vec<String>,
}

impl Protocols {
    /// Creates a negotiation request advertising `supported`.
    ///
    /// Tags must be non-empty ASCII without NUL bytes.
    pub fn new<I, S>(supported: I) -> ProtocolResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let supported: Vec<String> = supported.into_iter().map(Into::into).collect();
        for tag in &supported {
            if tag.is_empty() || !tag.is_ascii() || tag.bytes().any(|b| b == PROTOCOL_SEPARATOR) {
                return Err(ProtocolError::invalid_argument(format!(
                    "invalid protocol tag {tag:?}"
                )));
            }
        }
        Ok(Self { supported })
    }

    /// Advertises every request kind this crate implements.
    pub fn all() -> Self {
        Self {
            supported: RequestKind::all_tags(),
        }
    }

    /// Returns the advertised tags.
    pub fn supported(&self) -> &[String] {
        &self.supported
    }
}

impl Request for Protocols {
    type Output = Vec<String>;
    const KIND: RequestKind = RequestKind::Protocols;

    fn write_body(&self, body: &mut BytesMut) -> ProtocolResult<()> {
        body.put_slice(&encode_protocol_list(&self.supported));
        Ok(())
    }

    fn parse_response(&self, body: Bytes) -> ProtocolResult<Vec<String>> {
        Ok(decode_protocol_list(&body))
    }
}

/// Fetches the host's game-server port.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerPort;

impl Request for ServerPort {
    type Output = u16;
    const KIND: RequestKind = RequestKind::ServerPort;

    fn write_body(&self, _body: &mut BytesMut) -> ProtocolResult<()> {
        Ok(())
    }

    fn parse_response(&self, body: Bytes) -> ProtocolResult<u16> {
        let bytes = <[u8; 2]>::try_from(&body[..]).map_err(|_| {
            ProtocolError::invalid_response(format!(
                "server port must be 2 bytes, got {}",
                body.len()
            ))
        })?;
        Ok(u16::from_be_bytes(bytes))
    }
}

/// Announces the caller's player profile to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerPing {
    profile: PlayerProfile,
}

impl PlayerPing {
    /// Creates a player ping for `profile`.
    pub fn new(profile: PlayerProfile) -> Self {
        Self { profile }
    }

    /// Returns the announced profile.
    pub fn profile(&self) -> &PlayerProfile {
        &self.profile
    }
}

impl Request for PlayerPing {
    type Output = ();
    const KIND: RequestKind = RequestKind::PlayerPing;

    fn write_body(&self, body: &mut BytesMut) -> ProtocolResult<()> {
        serde_json::to_writer(body.writer(), &self.profile)?;
        Ok(())
    }

    fn parse_response(&self, body: Bytes) -> ProtocolResult<()> {
        if !body.is_empty() {
            return Err(ProtocolError::invalid_response(format!(
                "player_ping expects an empty body, got {} bytes",
                body.len()
            )));
        }
        Ok(())
    }
}

/// Fetches the room roster.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayerProfileList;

impl Request for PlayerProfileList {
    type Output = Vec<PlayerProfile>;
    const KIND: RequestKind = RequestKind::PlayerProfileList;

    fn write_body(&self, _body: &mut BytesMut) -> ProtocolResult<()> {
        Ok(())
    }

    fn parse_response(&self, body: Bytes) -> ProtocolResult<Vec<PlayerProfile>> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        serde_json::from_slice(&body)
            .map_err(|e| ProtocolError::invalid_response(format!("invalid roster JSON: {e}")))
    }
}
