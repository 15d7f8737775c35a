//! Property tests for the frame codec and the stream reader.

#![allow(clippy::unwrap_used)]

use std::pin::Pin;
use std::task::{Context, Poll};

use proptest::prelude::*;
use scaffolding_protocol::{
    Decode, FrameReader, RequestFrame, ResponseFrame, Status, decode_request, decode_response,
    encode_request, encode_response,
};
use tokio::io::{AsyncRead, ReadBuf};
use tokio_util::sync::CancellationToken;

/// Serves a byte slice in reads of the given sizes, cycling through them.
struct Splitter {
    data: Vec<u8>,
    pos: usize,
    sizes: Vec<usize>,
    next: usize,
}

impl AsyncRead for Splitter {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let size = self.sizes[self.next % self.sizes.len()];
        self.next += 1;
        let end = (self.pos + size).min(self.data.len());
        let n = (end - self.pos).min(buf.remaining());
        let start = self.pos;
        buf.put_slice(&self.data[start..start + n]);
        self.pos += n;
        Poll::Ready(Ok(()))
    }
}

fn type_tag() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[ -~]{1,255}").unwrap()
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
}

proptest! {
    #[test]
    fn request_roundtrip(tag in type_tag(), body in prop::collection::vec(any::<u8>(), 0..2048)) {
        let bytes = encode_request(&tag, &body).unwrap();
        let decoded = decode_request(&bytes).unwrap();
        prop_assert_eq!(
            decoded,
            Decode::Complete { value: RequestFrame::new(tag, body), consumed: bytes.len() }
        );
    }

    #[test]
    fn response_roundtrip(status in any::<u8>(), body in prop::collection::vec(any::<u8>(), 0..2048)) {
        let bytes = encode_response(Status(status), &body).unwrap();
        let decoded = decode_response(&bytes).unwrap();
        prop_assert_eq!(
            decoded,
            Decode::Complete { value: ResponseFrame::new(Status(status), body), consumed: bytes.len() }
        );
    }

    #[test]
    fn truncated_frames_are_incomplete(
        tag in type_tag(),
        body in prop::collection::vec(any::<u8>(), 0..256),
        cut in any::<prop::sample::Index>(),
    ) {
        let bytes = encode_request(&tag, &body).unwrap();
        let len = cut.index(bytes.len());
        prop_assert!(decode_request(&bytes[..len]).unwrap().is_incomplete());
    }

    #[test]
    fn split_reads_yield_the_same_request(
        tag in type_tag(),
        body in prop::collection::vec(any::<u8>(), 0..512),
        sizes in prop::collection::vec(1usize..64, 1..8),
    ) {
        let bytes = encode_request(&tag, &body).unwrap().to_vec();
        let splitter = Splitter { data: bytes, pos: 0, sizes, next: 0 };
        let frame = runtime().block_on(async move {
            let mut reader = FrameReader::new(splitter);
            reader.read_request(&CancellationToken::new()).await.unwrap().unwrap()
        });
        prop_assert_eq!(frame, RequestFrame::new(tag, body));
    }

    #[test]
    fn split_reads_yield_the_same_responses(
        first in prop::collection::vec(any::<u8>(), 0..256),
        second in prop::collection::vec(any::<u8>(), 0..256),
        sizes in prop::collection::vec(1usize..32, 1..8),
    ) {
        let mut bytes = encode_response(Status::SUCCESS, &first).unwrap().to_vec();
        bytes.extend_from_slice(&encode_response(Status(7), &second).unwrap());
        let splitter = Splitter { data: bytes, pos: 0, sizes, next: 0 };
        let (a, b) = runtime().block_on(async move {
            let mut reader = FrameReader::new(splitter);
            let cancel = CancellationToken::new();
            let a = reader.read_response_frame(&cancel).await.unwrap();
            let b = reader.read_response_frame(&cancel).await.unwrap();
            (a, b)
        });
        prop_assert_eq!(a, ResponseFrame::new(Status::SUCCESS, first));
        prop_assert_eq!(b, ResponseFrame::new(Status(7), second));
    }
}
