//! Response status codes.
//!
//! A response frame starts with a single status byte. Zero is success; the
//! remaining values are grouped into ranges rather than a closed set, so new
//! codes can be introduced without breaking older peers.

use std::fmt;

/// Range a non-zero status falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusClass {
    /// Status 0.
    Success,
    /// Statuses 1 to 31, reserved for generic errors.
    Generic,
    /// Statuses 32 to 63, defined by individual handlers.
    ProtocolDefined,
    /// Everything else, including 255.
    Unknown,
}

/// Status byte carried by a response frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Status(pub u8);

impl Status {
    /// The request succeeded.
    pub const SUCCESS: Status = Status(0);
    /// The handler rejected the request body, or the requested resource is
    /// not available.
    pub const REJECTED: Status = Status(32);
    /// No handler is registered for the request type.
    pub const UNKNOWN_REQUEST: Status = Status(33);
    /// Unclassified failure; the body may hold a UTF-8 message.
    pub const FAILURE: Status = Status(255);

    /// Returns the raw status byte.
    pub fn code(self) -> u8 {
        self.0
    }

    /// Returns true for status 0.
    pub fn is_success(self) -> bool {
        self.0 == 0
    }

    /// Returns true if a response with this status carries a message body.
    pub fn carries_message(self) -> bool {
        self == Self::FAILURE
    }

    /// Classifies the status by range.
    pub fn class(self) -> StatusClass {
        match self.0 {
            0 => StatusClass::Success,
            1..=31 => StatusClass::Generic,
            32..=63 => StatusClass::ProtocolDefined,
            _ => StatusClass::Unknown,
        }
    }

    /// Returns a human-readable description of the status range.
    pub fn description(self) -> &'static str {
        match self.class() {
            StatusClass::Success => "Success",
            StatusClass::Generic => "Generic error",
            StatusClass::ProtocolDefined => "Protocol-defined error",
            StatusClass::Unknown => "Unknown error",
        }
    }
}

impl From<u8> for Status {
    fn from(code: u8) -> Self {
        Self(code)
    }
}

impl From<Status> for u8 {
    fn from(status: Status) -> Self {
        status.0
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_ranges() {
        assert_eq!(Status(0).class(), StatusClass::Success);
        assert_eq!(Status(1).class(), StatusClass::Generic);
        assert_eq!(Status(31).class(), StatusClass::Generic);
        assert_eq!(Status(32).class(), StatusClass::ProtocolDefined);
        assert_eq!(Status(63).class(), StatusClass::ProtocolDefined);
        assert_eq!(Status(64).class(), StatusClass::Unknown);
        assert_eq!(Status(255).class(), StatusClass::Unknown);
    }

    #[test]
    fn descriptions() {
        assert_eq!(Status(7).description(), "Generic error");
        assert_eq!(Status(40).description(), "Protocol-defined error");
        assert_eq!(Status(200).description(), "Unknown error");
    }

    #[test]
    fn only_failure_carries_message() {
        assert!(Status::FAILURE.carries_message());
        assert!(!Status(40).carries_message());
        assert!(!Status::SUCCESS.carries_message());
    }

    #[test]
    fn named_codes_fall_in_expected_ranges() {
        assert!(Status::SUCCESS.is_success());
        assert_eq!(Status::REJECTED.class(), StatusClass::ProtocolDefined);
        assert_eq!(Status::UNKNOWN_REQUEST.class(), StatusClass::ProtocolDefined);
    }
}
