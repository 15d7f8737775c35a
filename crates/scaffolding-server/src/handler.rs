//! Request/response dispatch handler.
//!
//! This module provides the handler registry that routes incoming request
//! frames by type tag, the built-in handlers, and the per-session loop that
//! drives a [`Connection`].

use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use std::{future::Future, pin::Pin};

use bytes::Bytes;
use futures_util::FutureExt;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use scaffolding_core::{PlayerKind, PlayerProfile};
use scaffolding_protocol::{
    ProtocolError, RequestFrame, RequestKind, ResponseFrame, Status, decode_protocol_list,
    encode_protocol_list, validate_type_tag,
};

use crate::context::{ServerContext, SessionId, SharedContext};
use crate::error::{ServerError, ServerResult};
use crate::socket::Connection;

/// Everything a handler sees about one request.
#[derive(Debug, Clone, Copy)]
pub struct HandlerRequest<'a> {
    /// Raw request body.
    pub body: &'a Bytes,
    /// Room state shared with every other session.
    pub context: &'a ServerContext,
    /// Session the request arrived on.
    pub session: SessionId,
    /// Fires when the session or the server is shutting down.
    pub cancel: &'a CancellationToken,
}

/// A handler's reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerResponse {
    /// Status byte sent to the peer.
    pub status: Status,
    /// Response body.
    pub body: Bytes,
}

impl HandlerResponse {
    /// A success response carrying `body`.
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self {
            status: Status::SUCCESS,
            body: body.into(),
        }
    }

    /// A success response with no body.
    pub fn empty() -> Self {
        Self::with_status(Status::SUCCESS)
    }

    /// A bodiless response with the given status.
    pub fn with_status(status: Status) -> Self {
        Self {
            status,
            body: Bytes::new(),
        }
    }
}

impl From<HandlerResponse> for ResponseFrame {
    fn from(response: HandlerResponse) -> Self {
        ResponseFrame::new(response.status, response.body)
    }
}

/// Ways a handler can fail.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The request was understood but refused. Answered with status 32.
    #[error("request rejected: {0}")]
    Rejected(String),

    /// Something broke on this side. Answered with status 255 and the
    /// message as body.
    #[error("{0}")]
    Internal(String),

    /// The session is being torn down; no response is sent.
    #[error("handler cancelled")]
    Cancelled,
}

/// Result of a single handler invocation.
pub type HandlerResult = Result<HandlerResponse, HandlerError>;

/// Boxed future returned by [`Handler::handle`].
pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = HandlerResult> + Send + 'a>>;

/// Serves one request type.
pub trait Handler: Send + Sync {
    /// Handles a single request.
    fn handle<'a>(&'a self, request: HandlerRequest<'a>) -> HandlerFuture<'a>;
}

/// Echoes the request body.
#[derive(Debug, Default, Clone, Copy)]
pub struct PingHandler;

impl Handler for PingHandler {
    fn handle<'a>(&'a self, request: HandlerRequest<'a>) -> HandlerFuture<'a> {
        Box::pin(async move { Ok(HandlerResponse::ok(request.body.clone())) })
    }
}

/// Answers with the host's supported protocol tags.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProtocolsHandler;

impl Handler for ProtocolsHandler {
    fn handle<'a>(&'a self, request: HandlerRequest<'a>) -> HandlerFuture<'a> {
        Box::pin(async move {
            let offered = decode_protocol_list(request.body);
            debug!(offered = ?offered, "Peer protocol list");
            let supported = encode_protocol_list(request.context.protocols());
            Ok(HandlerResponse::ok(supported))
        })
    }
}

/// Answers with the game-server port, or status 32 when none is bound.
#[derive(Debug, Default, Clone, Copy)]
pub struct ServerPortHandler;

impl Handler for ServerPortHandler {
    fn handle<'a>(&'a self, request: HandlerRequest<'a>) -> HandlerFuture<'a> {
        Box::pin(async move {
            match request.context.server_port() {
                Some(port) => Ok(HandlerResponse::ok(Bytes::copy_from_slice(
                    &port.to_be_bytes(),
                ))),
                None => {
                    debug!("No game server bound");
                    Ok(HandlerResponse::with_status(Status::REJECTED))
                }
            }
        })
    }
}

/// Records the caller's profile in the roster as a guest.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlayerPingHandler;

impl Handler for PlayerPingHandler {
    fn handle<'a>(&'a self, request: HandlerRequest<'a>) -> HandlerFuture<'a> {
        Box::pin(async move {
            let mut profile: PlayerProfile = serde_json::from_slice(request.body)
                .map_err(|e| HandlerError::Rejected(format!("malformed player profile: {e}")))?;
            if !profile.has_machine_id() {
                return Err(HandlerError::Rejected(
                    "player profile has no machine_id".to_string(),
                ));
            }
            // Peers never get to claim the host role.
            profile.kind = Some(PlayerKind::Guest);
            let name = profile.name.clone();
            let previous = request
                .context
                .roster()
                .upsert(request.session, profile)
                .await;
            if previous.is_none() {
                info!(session = %request.session, name = %name, "Player joined the room");
            }
            Ok(HandlerResponse::empty())
        })
    }
}

/// Answers with the roster as a JSON array.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlayerProfileListHandler;

impl Handler for PlayerProfileListHandler {
    fn handle<'a>(&'a self, request: HandlerRequest<'a>) -> HandlerFuture<'a> {
        Box::pin(async move {
            let profiles = request.context.roster().profiles().await;
            let body = serde_json::to_vec(&profiles)
                .map_err(|e| HandlerError::Internal(format!("failed to encode roster: {e}")))?;
            Ok(HandlerResponse::ok(body))
        })
    }
}

/// Maps type tags to handlers.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("tags", &self.tags())
            .finish()
    }
}

impl HandlerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry serving every built-in request type.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.insert(RequestKind::Ping, PingHandler);
        registry.insert(RequestKind::Protocols, ProtocolsHandler);
        registry.insert(RequestKind::ServerPort, ServerPortHandler);
        registry.insert(RequestKind::PlayerPing, PlayerPingHandler);
        registry.insert(RequestKind::PlayerProfileList, PlayerProfileListHandler);
        registry
    }

    fn insert(&mut self, kind: RequestKind, handler: impl Handler + 'static) {
        self.handlers
            .insert(kind.as_tag().to_string(), Arc::new(handler));
    }

    /// Registers `handler` for `type_tag`, replacing any previous one.
    ///
    /// Returns the handler that was replaced.
    pub fn register(
        &mut self,
        type_tag: impl Into<String>,
        handler: impl Handler + 'static,
    ) -> ServerResult<Option<Arc<dyn Handler>>> {
        let type_tag = type_tag.into();
        validate_type_tag(&type_tag).map_err(ProtocolError::from)?;
        Ok(self.handlers.insert(type_tag, Arc::new(handler)))
    }

    /// Returns true if a handler serves `type_tag`.
    pub fn contains(&self, type_tag: &str) -> bool {
        self.handlers.contains_key(type_tag)
    }

    /// Returns the served type tags, sorted.
    pub fn tags(&self) -> Vec<String> {
        let mut tags: Vec<_> = self.handlers.keys().cloned().collect();
        tags.sort();
        tags
    }

    /// Returns the number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Routes one request frame to its handler and builds the response.
    ///
    /// Handler failures, including panics, become error responses so the
    /// session keeps going. Only cancellation is reported as an error.
    pub async fn dispatch(
        &self,
        frame: &RequestFrame,
        context: &ServerContext,
        session: SessionId,
        cancel: &CancellationToken,
    ) -> ServerResult<ResponseFrame> {
        let Some(handler) = self.handlers.get(&frame.type_tag) else {
            warn!(type_tag = %frame.type_tag, "Unknown request type");
            return Ok(ResponseFrame::empty(Status::UNKNOWN_REQUEST));
        };

        let request = HandlerRequest {
            body: &frame.body,
            context,
            session,
            cancel,
        };
        match AssertUnwindSafe(handler.handle(request))
            .catch_unwind()
            .await
        {
            Ok(Ok(response)) => Ok(response.into()),
            Ok(Err(HandlerError::Rejected(reason))) => {
                debug!(type_tag = %frame.type_tag, reason = %reason, "Request rejected");
                Ok(ResponseFrame::empty(Status::REJECTED))
            }
            Ok(Err(HandlerError::Internal(message))) => {
                warn!(type_tag = %frame.type_tag, error = %message, "Handler failed");
                Ok(ResponseFrame::new(Status::FAILURE, message))
            }
            Ok(Err(HandlerError::Cancelled)) => Err(ServerError::Shutdown),
            Err(_) => {
                error!(type_tag = %frame.type_tag, "Handler panicked");
                Ok(ResponseFrame::new(Status::FAILURE, "internal handler error"))
            }
        }
    }
}

/// Serves the requests of every session of one room.
#[derive(Debug, Clone)]
pub struct RequestHandler {
    registry: Arc<HandlerRegistry>,
    context: SharedContext,
}

impl RequestHandler {
    /// Creates a handler serving the built-in request types.
    pub fn new(context: SharedContext) -> Self {
        Self::with_registry(context, Arc::new(HandlerRegistry::with_defaults()))
    }

    /// Creates a handler with a custom registry.
    pub fn with_registry(context: SharedContext, registry: Arc<HandlerRegistry>) -> Self {
        Self { registry, context }
    }

    /// Returns the shared room context.
    pub fn context(&self) -> &SharedContext {
        &self.context
    }

    /// Handles a single request and returns the response.
    #[tracing::instrument(
        skip_all,
        fields(session = %session, type_tag = %frame.type_tag, status, duration_ms)
    )]
    pub async fn handle(
        &self,
        frame: &RequestFrame,
        session: SessionId,
        cancel: &CancellationToken,
    ) -> ServerResult<ResponseFrame> {
        use tracing::Span;

        let start = Instant::now();
        let response = self
            .registry
            .dispatch(frame, &self.context, session, cancel)
            .await?;

        let span = Span::current();
        span.record("status", response.status.code());
        // Record timing metrics at DEBUG level
        let duration = start.elapsed();
        if tracing::enabled!(tracing::Level::DEBUG) {
            span.record("duration_ms", duration.as_millis());
            debug!(
                status = %response.status,
                duration_ms = duration.as_millis(),
                "Request handled"
            );
        }

        Ok(response)
    }

    /// Handles a connection, answering requests in order until it closes.
    pub async fn handle_connection<S>(
        &self,
        mut conn: Connection<S>,
        cancel: CancellationToken,
    ) -> ServerResult<()>
    where
        S: AsyncRead + AsyncWrite + Send,
    {
        let session = conn.session();
        loop {
            match conn.read_request(&cancel).await {
                Ok(Some(frame)) => {
                    let response = self.handle(&frame, session, &cancel).await?;
                    conn.write_response(&response, &cancel).await?;
                }
                Ok(None) => {
                    // Peer disconnected cleanly
                    debug!(session = %session, "Peer disconnected");
                    return Ok(());
                }
                Err(e) => {
                    if !e.is_shutdown() {
                        warn!(session = %session, error = %e, "Error reading request");
                    }
                    return Err(e);
                }
            }
        }
    }
}

/// Creates a connection handler function for use with `SocketServer::run`.
///
/// Each session is served by `handler`; when the session ends its roster
/// entry is dropped.
pub fn make_connection_handler<S>(
    handler: RequestHandler,
) -> impl Fn(Connection<S>, CancellationToken) -> Pin<Box<dyn Future<Output = ()> + Send>>
+ Send
+ Sync
+ 'static
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    move |conn, cancel| {
        let handler = handler.clone();
        Box::pin(async move {
            let session = conn.session();
            if let Err(e) = handler.handle_connection(conn, cancel).await
                && !e.is_shutdown()
            {
                warn!(session = %session, error = %e, "Session ended with error");
            }
            if let Some(profile) = handler.context().roster().remove(session).await {
                info!(session = %session, name = %profile.name, "Player left the room");
            }
        })
    }
}
