//! TCP listener for room peers.
//!
//! Each accepted stream becomes a [`Connection`] with its own session id.
//! Requests on one connection are answered strictly in order.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use scaffolding_protocol::{FrameReader, FrameWriter, RequestFrame, ResponseFrame};

use crate::config::ServerConfig;
use crate::context::SessionId;
use crate::error::{ServerError, ServerResult};

/// TCP server accepting room peers.
pub struct SocketServer {
    /// Server configuration.
    config: ServerConfig,
    /// TCP listener.
    listener: TcpListener,
    /// Semaphore for limiting concurrent sessions.
    connection_semaphore: Arc<Semaphore>,
    /// Next session id to hand out.
    next_session: AtomicU64,
}

impl SocketServer {
    /// Creates a new server bound to `config.bind_addr`.
    pub async fn new(config: ServerConfig) -> ServerResult<Self> {
        config.validate()?;

        let listener =
            TcpListener::bind(config.bind_addr)
                .await
                .map_err(|source| ServerError::Bind {
                    addr: config.bind_addr,
                    source,
                })?;
        info!(
            addr = %listener.local_addr()?,
            max_sessions = config.max_sessions,
            "Room host listening"
        );

        let connection_semaphore = Arc::new(Semaphore::new(config.max_sessions));

        Ok(Self {
            config,
            listener,
            connection_semaphore,
            next_session: AtomicU64::new(1),
        })
    }

    /// Returns the address actually bound, useful with port 0.
    pub fn local_addr(&self) -> ServerResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Returns the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Accepts a single connection.
    ///
    /// Waits for a free session slot first.
    pub async fn accept(&self) -> ServerResult<Connection<TcpStream>> {
        let permit = self
            .connection_semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ServerError::Shutdown)?;

        let (stream, peer) = self.listener.accept().await?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "Failed to disable Nagle on session stream");
        }
        let session = SessionId::new(self.next_session.fetch_add(1, Ordering::Relaxed));
        debug!(session = %session, peer = %peer, "Accepted new connection");

        let mut conn = Connection::new(stream, session)
            .with_peer(peer)
            .with_idle_timeout(self.config.idle_timeout)
            .with_max_body_len(self.config.max_body_len);
        conn._permit = Some(permit);
        Ok(conn)
    }

    /// Runs the accept loop until `cancel` fires.
    ///
    /// Each session is spawned with a child token of `cancel`, so cancelling
    /// stops the listener and every live session.
    pub async fn run<F, Fut>(&self, handler: F, cancel: CancellationToken) -> ServerResult<()>
    where
        F: Fn(Connection<TcpStream>, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Shutdown signal received");
                    return Ok(());
                }
                accepted = self.accept() => match accepted {
                    Ok(connection) => {
                        let fut = handler(connection, cancel.child_token());
                        tokio::spawn(fut);
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to accept connection");
                        // Continue accepting despite errors
                    }
                },
            }
        }
    }
}

/// One peer's stream, split into a frame reader and writer.
pub struct Connection<S> {
    session: SessionId,
    peer: Option<SocketAddr>,
    reader: FrameReader<ReadHalf<S>>,
    writer: FrameWriter<WriteHalf<S>>,
    idle_timeout: Option<Duration>,
    _permit: Option<OwnedSemaphorePermit>,
}

impl<S: AsyncRead + AsyncWrite> Connection<S> {
    /// Wraps `stream` as session `session`, with no idle timeout.
    pub fn new(stream: S, session: SessionId) -> Self {
        let (read, write) = tokio::io::split(stream);
        Self {
            session,
            peer: None,
            reader: FrameReader::new(read),
            writer: FrameWriter::new(write),
            idle_timeout: None,
            _permit: None,
        }
    }

    /// Builder: close the session if no request arrives within `timeout`.
    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Builder: set the largest accepted request body.
    pub fn with_max_body_len(mut self, max: usize) -> Self {
        self.reader = self.reader.with_max_body_len(max);
        self
    }

    /// Builder: record the remote address.
    pub fn with_peer(mut self, peer: SocketAddr) -> Self {
        self.peer = Some(peer);
        self
    }

    /// Returns the session id.
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Returns the remote address, if known.
    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Reads the next request frame.
    ///
    /// Returns `Ok(None)` if the connection was closed cleanly.
    pub async fn read_request(
        &mut self,
        cancel: &CancellationToken,
    ) -> ServerResult<Option<RequestFrame>> {
        let read = self.reader.read_request(cancel);
        let frame = match self.idle_timeout {
            Some(limit) => tokio::time::timeout(limit, read)
                .await
                .map_err(|_| ServerError::timeout("read request"))??,
            None => read.await?,
        };
        Ok(frame)
    }

    /// Writes a response frame.
    pub async fn write_response(
        &mut self,
        frame: &ResponseFrame,
        cancel: &CancellationToken,
    ) -> ServerResult<()> {
        self.writer
            .write_response(frame.status, &frame.body, cancel)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scaffolding_protocol::{ProtocolError, Status};

    fn loopback() -> ServerConfig {
        ServerConfig::new("127.0.0.1:0".parse().unwrap())
    }

    #[tokio::test]
    async fn socket_server_binds_ephemeral_port() {
        let server = SocketServer::new(loopback()).await.unwrap();
        let addr = server.local_addr().unwrap();
        assert!(addr.ip().is_loopback());
        assert_ne!(addr.port(), 0);
    }

    #[tokio::test]
    async fn socket_server_rejects_taken_address() {
        let first = SocketServer::new(loopback()).await.unwrap();
        let taken = first.local_addr().unwrap();

        let result = SocketServer::new(ServerConfig::new(taken)).await;
        assert!(matches!(result, Err(ServerError::Bind { addr, .. }) if addr == taken));
    }

    #[tokio::test]
    async fn socket_server_rejects_invalid_config() {
        let result = SocketServer::new(loopback().with_max_sessions(0)).await;
        assert!(matches!(result, Err(ServerError::Config { .. })));
    }

    #[tokio::test]
    async fn connection_roundtrip() {
        let server = SocketServer::new(loopback()).await.unwrap();
        let addr = server.local_addr().unwrap();

        let client_task = tokio::spawn(async move {
            let cancel = CancellationToken::new();
            let stream = TcpStream::connect(addr).await.unwrap();
            let (read, write) = stream.into_split();
            let mut writer = FrameWriter::new(write);
            writer
                .write_request_frame("ping", b"abc", &cancel)
                .await
                .unwrap();
            let mut reader = FrameReader::new(read);
            reader.read_response(&cancel).await.unwrap()
        });

        let cancel = CancellationToken::new();
        let mut conn = server.accept().await.unwrap();
        assert_eq!(conn.session(), SessionId::new(1));
        assert!(conn.peer().is_some());

        let request = conn.read_request(&cancel).await.unwrap().unwrap();
        assert_eq!(request, RequestFrame::new("ping", &b"abc"[..]));
        conn.write_response(&ResponseFrame::ok(request.body), &cancel)
            .await
            .unwrap();

        assert_eq!(client_task.await.unwrap().as_ref(), b"abc");
    }

    #[tokio::test]
    async fn sessions_get_increasing_ids() {
        let server = SocketServer::new(loopback()).await.unwrap();
        let addr = server.local_addr().unwrap();

        let _a = TcpStream::connect(addr).await.unwrap();
        let first = server.accept().await.unwrap();
        let _b = TcpStream::connect(addr).await.unwrap();
        let second = server.accept().await.unwrap();

        assert_eq!(first.session(), SessionId::new(1));
        assert_eq!(second.session(), SessionId::new(2));
    }

    #[tokio::test]
    async fn connection_handles_client_disconnect() {
        let server = SocketServer::new(loopback()).await.unwrap();
        let addr = server.local_addr().unwrap();

        // Connect and immediately disconnect
        let handle = tokio::spawn(async move {
            let _stream = TcpStream::connect(addr).await.unwrap();
        });

        let mut conn = server.accept().await.unwrap();
        handle.await.unwrap();

        // Read should return None (clean EOF)
        let result = conn
            .read_request(&CancellationToken::new())
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn connection_idle_timeout() {
        let (_client, server) = tokio::io::duplex(64);
        let mut conn = Connection::new(server, SessionId::new(1))
            .with_idle_timeout(Some(Duration::from_secs(5)));

        let err = conn
            .read_request(&CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::Timeout { .. }));
    }

    #[tokio::test]
    async fn connection_rejects_oversized_body() {
        let (client, server) = tokio::io::duplex(256);
        let mut conn = Connection::new(server, SessionId::new(1)).with_max_body_len(4);

        let cancel = CancellationToken::new();
        let mut writer = FrameWriter::new(client);
        writer
            .write_request_frame("ping", b"too long", &cancel)
            .await
            .unwrap();

        let err = conn.read_request(&cancel).await.unwrap_err();
        assert!(matches!(
            err,
            ServerError::Protocol(ProtocolError::FrameTooLarge { size: 8, max: 4 })
        ));
    }

    #[tokio::test]
    async fn run_stops_when_cancelled() {
        let server = SocketServer::new(loopback()).await.unwrap();
        let addr = server.local_addr().unwrap();
        let cancel = CancellationToken::new();

        let accept_loop = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                server
                    .run(
                        |mut conn: Connection<TcpStream>, cancel: CancellationToken| async move {
                            while let Ok(Some(frame)) = conn.read_request(&cancel).await {
                                let response = ResponseFrame::new(Status(7), frame.body);
                                if conn.write_response(&response, &cancel).await.is_err() {
                                    break;
                                }
                            }
                        },
                        cancel,
                    )
                    .await
            }
        });

        let stream = TcpStream::connect(addr).await.unwrap();
        let (read, write) = stream.into_split();
        let client_cancel = CancellationToken::new();
        let mut writer = FrameWriter::new(write);
        let mut reader = FrameReader::new(read);
        writer
            .write_request_frame("echo", b"x", &client_cancel)
            .await
            .unwrap();
        let frame = reader.read_response_frame(&client_cancel).await.unwrap();
        assert_eq!(frame, ResponseFrame::new(Status(7), &b"x"[..]));

        cancel.cancel();
        accept_loop.await.unwrap().unwrap();

        // The session saw the child token fire and closed its end.
        let eof = reader.read_response_frame(&client_cancel).await;
        assert!(eof.is_err());
    }
}
