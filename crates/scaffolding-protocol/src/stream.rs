//! Frame I/O over an ordered, reliable byte stream.
//!
//! [`FrameReader`] accumulates bytes until a whole frame is buffered and
//! leaves any following bytes for the next call. [`FrameWriter`] encodes a
//! whole frame into memory before writing it in one go. Both take a
//! [`CancellationToken`]. A reader stops at the next suspension point once it
//! fires; a writer stops only if no byte of the frame has gone out yet.

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::MAX_BODY_LEN;
use crate::error::{ProtocolError, ProtocolResult};
use crate::framing::{
    Decode, RESPONSE_HEADER_LEN, RequestFrame, ResponseFrame, decode_request_header,
    decode_response_header, encode_request_into, encode_response_into,
};
use crate::status::Status;
use crate::types::Request;

const READ_CHUNK: usize = 8 * 1024;

/// Reads frames from a byte stream.
pub struct FrameReader<R> {
    reader: R,
    buffer: BytesMut,
    max_body_len: usize,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Creates a new FrameReader wrapping the given reader.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: BytesMut::with_capacity(READ_CHUNK),
            max_body_len: MAX_BODY_LEN,
        }
    }

    /// Builder: set the largest body this reader accepts.
    pub fn with_max_body_len(mut self, max: usize) -> Self {
        self.max_body_len = max;
        self
    }

    /// Returns the bytes read from the stream but not yet consumed.
    pub fn buffered(&self) -> &[u8] {
        &self.buffer
    }

    /// Reads more bytes into the buffer. Returns 0 at end of stream.
    async fn fill(&mut self, cancel: &CancellationToken) -> ProtocolResult<usize> {
        if cancel.is_cancelled() {
            return Err(ProtocolError::Cancelled);
        }
        self.buffer.reserve(READ_CHUNK);
        let read = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ProtocolError::Cancelled),
            read = self.reader.read_buf(&mut self.buffer) => read?,
        };
        trace!(bytes = read, buffered = self.buffer.len(), "read from stream");
        Ok(read)
    }

    fn check_body_len(&self, body_len: usize) -> ProtocolResult<()> {
        if body_len > self.max_body_len {
            return Err(ProtocolError::FrameTooLarge {
                size: body_len,
                max: self.max_body_len,
            });
        }
        Ok(())
    }

    fn closed_mid_frame(&self) -> ProtocolError {
        ProtocolError::ConnectionClosedUnexpectedly {
            buffered: self.buffer.len(),
        }
    }

    /// Reads a single request frame.
    ///
    /// Returns `Ok(None)` if the stream ends cleanly between frames.
    pub async fn read_request(
        &mut self,
        cancel: &CancellationToken,
    ) -> ProtocolResult<Option<RequestFrame>> {
        loop {
            if let Decode::Complete { value: header, .. } = decode_request_header(&self.buffer)? {
                self.check_body_len(header.body_len)?;
                if self.buffer.len() >= header.frame_len() {
                    let mut frame = self.buffer.split_to(header.frame_len());
                    let body = frame.split_off(header.header_len()).freeze();
                    debug!(
                        type_tag = %header.type_tag,
                        body_len = body.len(),
                        "request frame received"
                    );
                    return Ok(Some(RequestFrame {
                        type_tag: header.type_tag,
                        body,
                    }));
                }
            }

            if self.fill(cancel).await? == 0 {
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                return Err(self.closed_mid_frame());
            }
        }
    }

    /// Reads a single response frame, whatever its status.
    pub async fn read_response_frame(
        &mut self,
        cancel: &CancellationToken,
    ) -> ProtocolResult<ResponseFrame> {
        loop {
            if let Decode::Complete { value: header, .. } = decode_response_header(&self.buffer)? {
                self.check_body_len(header.body_len)?;
                if self.buffer.len() >= header.frame_len() {
                    let mut frame = self.buffer.split_to(header.frame_len());
                    let body = frame.split_off(RESPONSE_HEADER_LEN).freeze();
                    debug!(
                        status = %header.status,
                        body_len = body.len(),
                        "response frame received"
                    );
                    return Ok(ResponseFrame {
                        status: header.status,
                        body,
                    });
                }
            }

            if self.fill(cancel).await? == 0 {
                return Err(self.closed_mid_frame());
            }
        }
    }

    /// Reads a single response and returns its body if the status is 0.
    ///
    /// A non-zero status becomes [`ProtocolError::RequestFailed`]; only
    /// status 255 carries a message, taken from the body.
    pub async fn read_response(&mut self, cancel: &CancellationToken) -> ProtocolResult<Bytes> {
        let frame = self.read_response_frame(cancel).await?;
        into_result(frame)
    }

    /// Returns a reference to the underlying reader.
    pub fn get_ref(&self) -> &R {
        &self.reader
    }

    /// Unwraps this FrameReader, returning the underlying reader.
    ///
    /// Buffered bytes that were not consumed are lost.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

/// Converts a response frame into its body or a [`ProtocolError::RequestFailed`].
pub fn into_result(frame: ResponseFrame) -> ProtocolResult<Bytes> {
    if frame.status.is_success() {
        return Ok(frame.body);
    }
    let message = if frame.status.carries_message() && !frame.body.is_empty() {
        Some(String::from_utf8_lossy(&frame.body).into_owned())
    } else {
        None
    };
    Err(ProtocolError::RequestFailed {
        status: frame.status,
        message,
    })
}

/// Writes frames to a byte stream.
pub struct FrameWriter<W> {
    writer: W,
    scratch: BytesMut,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    /// Creates a new FrameWriter wrapping the given writer.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            scratch: BytesMut::new(),
        }
    }

    /// Writes a typed request.
    pub async fn write_request<Q: Request>(
        &mut self,
        request: &Q,
        cancel: &CancellationToken,
    ) -> ProtocolResult<()> {
        let mut body = BytesMut::new();
        request.write_body(&mut body)?;
        self.write_request_frame(request.type_tag(), &body, cancel)
            .await
    }

    /// Writes a request frame with a raw body.
    pub async fn write_request_frame(
        &mut self,
        type_tag: &str,
        body: &[u8],
        cancel: &CancellationToken,
    ) -> ProtocolResult<()> {
        self.scratch.clear();
        encode_request_into(type_tag, body, &mut self.scratch)?;
        debug!(type_tag, body_len = body.len(), "sending request frame");
        self.send(cancel).await
    }

    /// Writes a response frame.
    pub async fn write_response(
        &mut self,
        status: Status,
        body: &[u8],
        cancel: &CancellationToken,
    ) -> ProtocolResult<()> {
        self.scratch.clear();
        encode_response_into(status, body, &mut self.scratch)?;
        debug!(status = %status, body_len = body.len(), "sending response frame");
        self.send(cancel).await
    }

    /// Sends the encoded frame in `scratch`.
    ///
    /// `cancel` is honoured only until the stream accepts the first byte.
    /// After that the rest of the frame is written regardless, so a peer
    /// never sees a torn frame.
    async fn send(&mut self, cancel: &CancellationToken) -> ProtocolResult<()> {
        if cancel.is_cancelled() {
            return Err(ProtocolError::Cancelled);
        }
        let frame = self.scratch.split().freeze();
        let writer = &mut self.writer;
        // A write that is still pending has accepted nothing.
        let accepted = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ProtocolError::Cancelled),
            written = writer.write(&frame) => written?,
        };
        if accepted == 0 {
            return Err(std::io::Error::from(std::io::ErrorKind::WriteZero).into());
        }
        writer.write_all(&frame[accepted..]).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Returns a reference to the underlying writer.
    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    /// Returns a mutable reference to the underlying writer.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    /// Unwraps this FrameWriter, returning the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framing::{encode_request, encode_response};
    use crate::types::{Ping, ServerPort};
    use std::collections::VecDeque;
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::ReadBuf;

    /// Yields the given chunks one read at a time, then end of stream.
    struct Chunked {
        chunks: VecDeque<Vec<u8>>,
    }

    impl Chunked {
        fn new(chunks: Vec<Vec<u8>>) -> Self {
            Self {
                chunks: chunks.into(),
            }
        }
    }

    impl AsyncRead for Chunked {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            if let Some(mut chunk) = self.chunks.pop_front() {
                let n = chunk.len().min(buf.remaining());
                buf.put_slice(&chunk[..n]);
                if n < chunk.len() {
                    self.chunks.push_front(chunk.split_off(n));
                }
            }
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn read_request_from_single_chunk() {
        let bytes = encode_request("ping", b"abc").unwrap().to_vec();
        let mut reader = FrameReader::new(Chunked::new(vec![bytes]));
        let cancel = CancellationToken::new();

        let frame = reader.read_request(&cancel).await.unwrap().unwrap();
        assert_eq!(frame, RequestFrame::new("ping", &b"abc"[..]));
        assert!(reader.read_request(&cancel).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn read_request_split_at_every_boundary() {
        let bytes = encode_request("player_ping", b"{\"name\":\"x\"}").unwrap().to_vec();
        let cancel = CancellationToken::new();
        for split in 1..bytes.len() {
            let chunks = vec![bytes[..split].to_vec(), bytes[split..].to_vec()];
            let mut reader = FrameReader::new(Chunked::new(chunks));
            let frame = reader.read_request(&cancel).await.unwrap().unwrap();
            assert_eq!(frame.type_tag, "player_ping");
            assert_eq!(frame.body.as_ref(), b"{\"name\":\"x\"}");
        }
    }

    #[tokio::test]
    async fn read_request_byte_by_byte() {
        let bytes = encode_request("protocols", b"ping\0protocols").unwrap();
        let chunks = bytes.iter().map(|b| vec![*b]).collect();
        let mut reader = FrameReader::new(Chunked::new(chunks));
        let frame = reader
            .read_request(&CancellationToken::new())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(frame.body.as_ref(), b"ping\0protocols");
    }

    #[tokio::test]
    async fn leftover_bytes_stay_buffered() {
        let mut bytes = encode_response(Status::SUCCESS, b"one").unwrap().to_vec();
        bytes.extend_from_slice(&encode_response(Status::SUCCESS, b"two").unwrap());
        let mut reader = FrameReader::new(Chunked::new(vec![bytes]));
        let cancel = CancellationToken::new();

        assert_eq!(reader.read_response(&cancel).await.unwrap().as_ref(), b"one");
        assert_eq!(reader.buffered().len(), 8);
        assert_eq!(reader.read_response(&cancel).await.unwrap().as_ref(), b"two");
        assert!(reader.buffered().is_empty());
    }

    #[tokio::test]
    async fn eof_mid_request_is_unexpected_close() {
        let bytes = encode_request("ping", b"abcdef").unwrap();
        let mut reader = FrameReader::new(Chunked::new(vec![bytes[..7].to_vec()]));
        let err = reader
            .read_request(&CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::ConnectionClosedUnexpectedly { buffered: 7 }
        ));
    }

    #[tokio::test]
    async fn eof_before_response_is_unexpected_close() {
        let mut reader = FrameReader::new(Chunked::new(vec![]));
        let err = reader
            .read_response(&CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::ConnectionClosedUnexpectedly { buffered: 0 }
        ));
    }

    #[tokio::test]
    async fn failure_status_carries_message() {
        let bytes = encode_response(Status::FAILURE, b"disk full").unwrap().to_vec();
        let mut reader = FrameReader::new(Chunked::new(vec![bytes]));
        let err = reader
            .read_response(&CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            ProtocolError::RequestFailed { status, message } => {
                assert_eq!(status, Status(255));
                assert_eq!(message.as_deref(), Some("disk full"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn other_statuses_never_carry_message() {
        let bytes = encode_response(Status(40), b"ignored").unwrap().to_vec();
        let mut reader = FrameReader::new(Chunked::new(vec![bytes]));
        let err = reader
            .read_response(&CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::RequestFailed {
                status: Status(40),
                message: None
            }
        ));
    }

    #[tokio::test]
    async fn oversized_body_is_refused() {
        let bytes = encode_response(Status::SUCCESS, &[0u8; 64]).unwrap().to_vec();
        let mut reader = FrameReader::new(Chunked::new(vec![bytes[..5].to_vec()]))
            .with_max_body_len(16);
        let err = reader
            .read_response(&CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::FrameTooLarge { size: 64, max: 16 }
        ));
    }

    #[tokio::test]
    async fn cancelled_read_returns_cancelled() {
        let (_client, server) = tokio::io::duplex(64);
        let mut reader = FrameReader::new(server);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            trigger.cancel();
        });
        let err = reader.read_request(&cancel).await.unwrap_err();
        assert!(matches!(err, ProtocolError::Cancelled));
    }

    #[tokio::test]
    async fn writer_emits_whole_frames() {
        let mut writer = FrameWriter::new(Vec::new());
        let cancel = CancellationToken::new();
        writer
            .write_request(&Ping::new(&b"hi"[..]).unwrap(), &cancel)
            .await
            .unwrap();
        writer.write_request(&ServerPort, &cancel).await.unwrap();

        let mut expected = encode_request("ping", b"hi").unwrap().to_vec();
        expected.extend_from_slice(&encode_request("server_port", b"").unwrap());
        assert_eq!(writer.get_ref(), &expected);
    }

    #[tokio::test]
    async fn cancelled_writer_writes_nothing() {
        let mut writer = FrameWriter::new(Vec::new());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = writer
            .write_response(Status::SUCCESS, b"late", &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, ProtocolError::Cancelled));
        assert!(writer.get_ref().is_empty());
    }

    #[tokio::test]
    async fn cancel_after_first_byte_finishes_the_frame() {
        let (server, mut client) = tokio::io::duplex(8);
        let mut writer = FrameWriter::new(server);
        let cancel = CancellationToken::new();
        let body = [7u8; 64];

        // The first poll fills the pipe, so the frame is already partly out
        // when the token fires.
        let (written, received) = tokio::join!(
            writer.write_response(Status::SUCCESS, &body, &cancel),
            async {
                cancel.cancel();
                let mut buf = vec![0u8; RESPONSE_HEADER_LEN + body.len()];
                client.read_exact(&mut buf).await.unwrap();
                buf
            }
        );

        written.unwrap();
        assert_eq!(received, encode_response(Status::SUCCESS, &body).unwrap());
    }

    #[tokio::test]
    async fn cancel_while_stream_is_full_writes_nothing() {
        let (server, mut client) = tokio::io::duplex(8);
        let mut writer = FrameWriter::new(server);
        writer.get_mut().write_all(&[0xAA; 8]).await.unwrap();
        let cancel = CancellationToken::new();

        let (written, ()) = tokio::join!(
            writer.write_response(Status::SUCCESS, &[7u8; 64], &cancel),
            async { cancel.cancel() }
        );
        assert!(matches!(written, Err(ProtocolError::Cancelled)));

        drop(writer);
        let mut seen = Vec::new();
        client.read_to_end(&mut seen).await.unwrap();
        assert_eq!(seen, [0xAA; 8]);
    }

    #[tokio::test]
    async fn writer_rejects_bad_tag_before_io() {
        let mut writer = FrameWriter::new(Vec::new());
        let err = writer
            .write_request_frame("", b"", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ProtocolError::Encoding(_)));
        assert!(writer.get_ref().is_empty());
    }
}
