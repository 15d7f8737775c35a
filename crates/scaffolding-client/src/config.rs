//! Client configuration.

use std::time::Duration;

use scaffolding_protocol::MAX_BODY_LEN;

/// Configuration for talking to a room host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// How long to wait for the TCP connection.
    pub connect_timeout: Duration,

    /// How long to wait for each response. `None` waits forever.
    pub request_timeout: Option<Duration>,

    /// Largest response body accepted from the host.
    pub max_body_len: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            request_timeout: Some(Duration::from_secs(10)),
            max_body_len: MAX_BODY_LEN,
        }
    }
}

impl ClientConfig {
    /// Builder: set the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Builder: set the per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Builder: set the largest accepted response body.
    pub fn with_max_body_len(mut self, max: usize) -> Self {
        self.max_body_len = max;
        self
    }
}
