//! Client for talking to a room host over one stream.
//!
//! A [`ScaffoldingClient`] keeps at most one request in flight. Each call
//! writes a request frame, waits for the next response frame and hands the
//! body to the typed request for parsing.

use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use scaffolding_core::PlayerProfile;
use scaffolding_protocol::{
    ErrorCategory, FrameReader, FrameWriter, Ping, PlayerPing, PlayerProfileList, Protocols,
    Request, ServerPort, into_result,
};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Where a stream is in its request/response cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// Ready to send a request.
    Idle,
    /// A request was written and its response has not been read.
    AwaitingResponse,
    /// The stream failed or was cancelled mid-exchange; it cannot be reused.
    Closed,
}

/// Issues typed requests over a single stream, one at a time.
pub struct ScaffoldingClient<S = TcpStream> {
    reader: FrameReader<ReadHalf<S>>,
    writer: FrameWriter<WriteHalf<S>>,
    state: ClientState,
    request_timeout: Option<Duration>,
}

impl ScaffoldingClient<TcpStream> {
    /// Connects to a room host.
    pub async fn connect(addr: &str, config: &ClientConfig) -> ClientResult<Self> {
        debug!(addr, "connecting to room host");

        let stream = tokio::time::timeout(config.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| {
                ClientError::Timeout(format!(
                    "connecting to {addr} took longer than {}ms",
                    config.connect_timeout.as_millis()
                ))
            })?
            .map_err(|source| ClientError::Connection {
                addr: addr.to_string(),
                source,
            })?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "failed to disable Nagle");
        }

        Ok(Self::with_config(stream, config))
    }
}

impl<S: AsyncRead + AsyncWrite> ScaffoldingClient<S> {
    /// Wraps an already connected stream with default settings.
    pub fn new(stream: S) -> Self {
        Self::with_config(stream, &ClientConfig::default())
    }

    /// Wraps an already connected stream.
    pub fn with_config(stream: S, config: &ClientConfig) -> Self {
        let (read, write) = tokio::io::split(stream);
        Self {
            reader: FrameReader::new(read).with_max_body_len(config.max_body_len),
            writer: FrameWriter::new(write),
            state: ClientState::Idle,
            request_timeout: config.request_timeout,
        }
    }

    /// Returns the current state.
    pub fn state(&self) -> ClientState {
        self.state
    }

    /// Sends `request` and waits for its typed result.
    ///
    /// A non-zero status comes back as `ProtocolError::RequestFailed` and
    /// leaves the client usable. Transport failures, timeouts and
    /// cancellation close it.
    #[tracing::instrument(skip_all, fields(type_tag = request.type_tag()))]
    pub async fn send<R: Request>(
        &mut self,
        request: &R,
        cancel: &CancellationToken,
    ) -> ClientResult<R::Output> {
        match self.state {
            ClientState::Idle => {}
            ClientState::Closed => return Err(ClientError::Closed),
            ClientState::AwaitingResponse => {
                // An earlier call was dropped mid-exchange; the stream is out
                // of step with its responses.
                warn!("previous request never completed, closing client");
                self.state = ClientState::Closed;
                return Err(ClientError::Closed);
            }
        }

        let body = match self.request_timeout {
            Some(limit) => {
                let outcome = tokio::time::timeout(limit, self.exchange(request, cancel)).await;
                match outcome {
                    Ok(result) => result?,
                    Err(_) => {
                        self.state = ClientState::Closed;
                        return Err(ClientError::Timeout(format!(
                            "no response to {} within {}ms",
                            request.type_tag(),
                            limit.as_millis()
                        )));
                    }
                }
            }
            None => self.exchange(request, cancel).await?,
        };

        Ok(request.parse_response(body)?)
    }

    async fn exchange<R: Request>(
        &mut self,
        request: &R,
        cancel: &CancellationToken,
    ) -> ClientResult<Bytes> {
        self.state = ClientState::AwaitingResponse;

        if let Err(e) = self.writer.write_request(request, cancel).await {
            // Local validation fails before anything reaches the stream.
            self.state = if e.category() == ErrorCategory::Local {
                ClientState::Idle
            } else {
                ClientState::Closed
            };
            return Err(e.into());
        }

        match self.reader.read_response_frame(cancel).await {
            Ok(frame) => {
                self.state = ClientState::Idle;
                Ok(into_result(frame)?)
            }
            Err(e) => {
                self.state = ClientState::Closed;
                Err(e.into())
            }
        }
    }

    /// Sends a `ping` and returns the echoed payload.
    pub async fn ping(
        &mut self,
        payload: impl Into<Bytes>,
        cancel: &CancellationToken,
    ) -> ClientResult<Bytes> {
        let request = Ping::new(payload)?;
        self.send(&request, cancel).await
    }

    /// Returns the host's supported protocol tags, advertising every built-in one.
    pub async fn protocols(&mut self, cancel: &CancellationToken) -> ClientResult<Vec<String>> {
        self.send(&Protocols::all(), cancel).await
    }

    /// Returns the `required` tags the host does not support.
    pub async fn negotiate<I, T>(
        &mut self,
        required: I,
        cancel: &CancellationToken,
    ) -> ClientResult<Vec<String>>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let request = Protocols::new(required)?;
        let supported = self.send(&request, cancel).await?;
        let missing: Vec<String> = request
            .supported()
            .iter()
            .filter(|tag| !supported.contains(tag))
            .cloned()
            .collect();
        if !missing.is_empty() {
            debug!(?missing, "host lacks required protocols");
        }
        Ok(missing)
    }

    /// Returns the host's game-server port.
    pub async fn server_port(&mut self, cancel: &CancellationToken) -> ClientResult<u16> {
        self.send(&ServerPort, cancel).await
    }

    /// Announces `profile` to the host.
    pub async fn player_ping(
        &mut self,
        profile: PlayerProfile,
        cancel: &CancellationToken,
    ) -> ClientResult<()> {
        self.send(&PlayerPing::new(profile), cancel).await
    }

    /// Returns every player in the room.
    pub async fn player_profiles(
        &mut self,
        cancel: &CancellationToken,
    ) -> ClientResult<Vec<PlayerProfile>> {
        self.send(&PlayerProfileList, cancel).await
    }
}
