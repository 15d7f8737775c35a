//! Room identifiers and their human-typable join codes.
//!
//! A room is identified by two 8-character strings, a *name* and a *secret*,
//! drawn from a 34-symbol alphabet (digits plus uppercase letters without `I`
//! and `O`). The canonical join code looks like:
//!
//! ```text
//! U/NNNN-NNNN-SSSS-SSSS
//! ```
//!
//! The transport layer consumes a derived pair instead:
//! `scaffolding-mc-NNNN-NNNN` as the network name and `SSSS-SSSS` as the
//! network secret.
//!
//! # Example
//!
//! ```rust
//! use scaffolding_core::RoomId;
//!
//! let room: RoomId = "U/YNZE-U61D-2206-HXRG".parse().unwrap();
//! assert_eq!(room.name(), "YNZEU61D");
//! assert_eq!(room.network_name(), "scaffolding-mc-YNZE-U61D");
//! assert_eq!(room.to_string(), "U/YNZE-U61D-2206-HXRG");
//! ```

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use thiserror::Error;

/// Symbols allowed in room names and secrets.
pub const ALPHABET: &[u8; 34] = b"0123456789ABCDEFGHJKLMNPQRSTUVWXYZ";

/// Length of a room name or secret.
pub const SEGMENT_LEN: usize = 8;

/// Length of a canonical join code.
pub const CODE_LEN: usize = 21;

/// Prefix of the derived transport network name.
pub const NETWORK_NAME_PREFIX: &str = "scaffolding-mc-";

const CODE_PREFIX: &str = "U/";
const HYPHEN_POSITIONS: [usize; 3] = [6, 11, 16];

/// Errors produced while parsing or constructing a room identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomIdError {
    /// The input does not follow the join-code or segment format.
    #[error("invalid room code format: {reason}")]
    InvalidFormat { reason: String },
}

impl RoomIdError {
    fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidFormat {
            reason: reason.into(),
        }
    }
}

/// Returns true if `c` belongs to the room identifier alphabet.
pub fn is_valid_symbol(c: u8) -> bool {
    ALPHABET.contains(&c)
}

fn validate_segment(label: &str, segment: &str) -> Result<(), RoomIdError> {
    if segment.len() != SEGMENT_LEN {
        return Err(RoomIdError::invalid(format!(
            "{label} must be {SEGMENT_LEN} characters, got {}",
            segment.chars().count()
        )));
    }
    if let Some(bad) = segment.bytes().find(|c| !is_valid_symbol(*c)) {
        return Err(RoomIdError::invalid(format!(
            "{label} contains invalid character {:?}",
            bad as char
        )));
    }
    Ok(())
}

/// Inserts a hyphen after the first four characters of a segment.
fn hyphenate(segment: &str) -> String {
    let (head, tail) = segment.split_at(SEGMENT_LEN / 2);
    format!("{head}-{tail}")
}

/// Removes the hyphen inserted by [`hyphenate`], if it is where expected.
fn unhyphenate(label: &str, value: &str) -> Result<String, RoomIdError> {
    let bytes = value.as_bytes();
    if bytes.len() != SEGMENT_LEN + 1 || bytes[SEGMENT_LEN / 2] != b'-' {
        return Err(RoomIdError::invalid(format!(
            "{label} must look like XXXX-XXXX"
        )));
    }
    let joined = format!("{}{}", &value[..SEGMENT_LEN / 2], &value[SEGMENT_LEN / 2 + 1..]);
    validate_segment(label, &joined)?;
    Ok(joined)
}

/// An immutable (name, secret) pair identifying a hosted room.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomId {
    name: String,
    secret: String,
}

impl RoomId {
    /// Builds a room identifier from an explicit name and secret.
    ///
    /// Both must be exactly 8 characters from [`ALPHABET`].
    pub fn new(name: impl Into<String>, secret: impl Into<String>) -> Result<Self, RoomIdError> {
        let name = name.into();
        let secret = secret.into();
        validate_segment("name", &name)?;
        validate_segment("secret", &secret)?;
        Ok(Self { name, secret })
    }

    /// Generates a random room identifier using the thread-local RNG.
    pub fn generate() -> Self {
        Self::generate_with(&mut rand::rng())
    }

    /// Generates a random room identifier from the given RNG.
    ///
    /// Each of the 16 symbols is drawn independently and uniformly.
    pub fn generate_with<R: Rng>(rng: &mut R) -> Self {
        let mut segment = || -> String {
            (0..SEGMENT_LEN)
                .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
                .collect()
        };
        let name = segment();
        let secret = segment();
        Self { name, secret }
    }

    /// Parses a canonical join code (`U/XXXX-XXXX-YYYY-YYYY`).
    pub fn parse(code: &str) -> Result<Self, RoomIdError> {
        if !code.is_ascii() {
            return Err(RoomIdError::invalid("join code must be ASCII"));
        }
        let bytes = code.as_bytes();
        if bytes.len() != CODE_LEN {
            return Err(RoomIdError::invalid(format!(
                "join code must be {CODE_LEN} characters, got {}",
                bytes.len()
            )));
        }
        if !code.starts_with(CODE_PREFIX) {
            return Err(RoomIdError::invalid("join code must start with \"U/\""));
        }
        for pos in HYPHEN_POSITIONS {
            if bytes[pos] != b'-' {
                return Err(RoomIdError::invalid(format!(
                    "expected '-' at position {pos}"
                )));
            }
        }

        // A group holding multi-byte characters yields an empty slice here and
        // fails the segment check below.
        let group = |start: usize| code.get(start..start + 4).unwrap_or_default();
        let name = format!("{}{}", group(2), group(7));
        let secret = format!("{}{}", group(12), group(17));
        Self::new(name, secret)
    }

    /// Rebuilds a room identifier from the derived transport pair.
    ///
    /// This is the inverse of [`RoomId::network_name`] and
    /// [`RoomId::network_secret`].
    pub fn from_network(network_name: &str, network_secret: &str) -> Result<Self, RoomIdError> {
        let name = network_name
            .strip_prefix(NETWORK_NAME_PREFIX)
            .ok_or_else(|| {
                RoomIdError::invalid(format!(
                    "network name must start with {NETWORK_NAME_PREFIX:?}"
                ))
            })?;
        let name = unhyphenate("network name", name)?;
        let secret = unhyphenate("network secret", network_secret)?;
        Ok(Self { name, secret })
    }

    /// The 8-character room name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The 8-character room secret.
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// The join code shown to users.
    pub fn code(&self) -> String {
        format!(
            "{CODE_PREFIX}{}-{}",
            hyphenate(&self.name),
            hyphenate(&self.secret)
        )
    }

    /// Network name handed to the tunnel transport.
    pub fn network_name(&self) -> String {
        format!("{NETWORK_NAME_PREFIX}{}", hyphenate(&self.name))
    }

    /// Network secret handed to the tunnel transport.
    pub fn network_secret(&self) -> String {
        hyphenate(&self.secret)
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code())
    }
}

impl FromStr for RoomId {
    type Err = RoomIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
