//! Request bodies that report upload progress
//!
//! The SDK pulls the body frame by frame while the request is written to
//! the socket, so advancing the tracker per frame follows the bytes that
//! actually leave the process.

use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};

use aws_sdk_s3::primitives::ByteStream;
use aws_smithy_types::body::SdkBody;
use bytes::Bytes;
use http_body::{Body, Frame, SizeHint};

use r2up_core::ProgressTracker;

/// Frame size handed to the SDK
pub const PROGRESS_CHUNK_SIZE: usize = 64 * 1024;

/// Build a retryable body that advances `tracker` as it is read.
///
/// A retried request replays the body from the start; only bytes beyond
/// the furthest point already reported are counted again.
pub fn progress_stream(data: Vec<u8>, tracker: Arc<dyn ProgressTracker>) -> ByteStream {
    let data = Bytes::from(data);
    let reported = Arc::new(AtomicU64::new(0));
    let body = SdkBody::retryable(move || {
        SdkBody::from_body_1_x(ProgressBody::new(
            data.clone(),
            tracker.clone(),
            reported.clone(),
        ))
    });
    ByteStream::new(body)
}

/// In-memory body yielding fixed-size frames
pub struct ProgressBody {
    data: Bytes,
    offset: usize,
    tracker: Arc<dyn ProgressTracker>,
    reported: Arc<AtomicU64>,
}

impl ProgressBody {
    fn new(data: Bytes, tracker: Arc<dyn ProgressTracker>, reported: Arc<AtomicU64>) -> Self {
        Self {
            data,
            offset: 0,
            tracker,
            reported,
        }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }
}

impl Body for ProgressBody {
    type Data = Bytes;
    type Error = Infallible;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, Infallible>>> {
        if self.remaining() == 0 {
            return Poll::Ready(None);
        }
        let start = self.offset;
        let end = (start + PROGRESS_CHUNK_SIZE).min(self.data.len());
        let chunk = self.data.slice(start..end);
        self.offset = end;

        let previous = self.reported.fetch_max(end as u64, Ordering::Relaxed);
        if (end as u64) > previous {
            self.tracker.advance(end as u64 - previous);
        }
        Poll::Ready(Some(Ok(Frame::data(chunk))))
    }

    fn is_end_stream(&self) -> bool {
        self.remaining() == 0
    }

    fn size_hint(&self) -> SizeHint {
        SizeHint::with_exact(self.remaining() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        deltas: Mutex<Vec<u64>>,
    }

    impl ProgressTracker for Recorder {
        fn advance(&self, delta: u64) {
            self.deltas.lock().unwrap().push(delta);
        }
    }

    async fn drain(body: &mut ProgressBody) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(frame) = std::future::poll_fn(|cx| Pin::new(&mut *body).poll_frame(cx)).await
        {
            let data = frame.unwrap().into_data().unwrap();
            out.extend_from_slice(&data);
        }
        out
    }

    #[tokio::test]
    async fn test_body_reports_progress_per_frame() {
        let data: Vec<u8> = (0..(PROGRESS_CHUNK_SIZE * 3 + 100)).map(|i| i as u8).collect();
        let recorder = Arc::new(Recorder::default());
        let mut body = ProgressBody::new(
            Bytes::from(data.clone()),
            recorder.clone(),
            Arc::new(AtomicU64::new(0)),
        );
        assert_eq!(body.size_hint().exact(), Some(data.len() as u64));

        let read = drain(&mut body).await;
        assert_eq!(read, data);
        assert!(body.is_end_stream());
        let chunk = PROGRESS_CHUNK_SIZE as u64;
        assert_eq!(*recorder.deltas.lock().unwrap(), vec![chunk, chunk, chunk, 100]);
    }

    #[tokio::test]
    async fn test_replayed_body_does_not_double_count() {
        let data = Bytes::from(vec![7u8; PROGRESS_CHUNK_SIZE * 2]);
        let recorder = Arc::new(Recorder::default());
        let reported = Arc::new(AtomicU64::new(0));

        let mut first = ProgressBody::new(data.clone(), recorder.clone(), reported.clone());
        std::future::poll_fn(|cx| Pin::new(&mut first).poll_frame(cx))
            .await
            .unwrap()
            .unwrap();

        let mut retry = ProgressBody::new(data.clone(), recorder.clone(), reported.clone());
        drain(&mut retry).await;

        let total: u64 = recorder.deltas.lock().unwrap().iter().sum();
        assert_eq!(total, data.len() as u64);
        assert_eq!(recorder.deltas.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_empty_body_ends_immediately() {
        let body = ProgressBody::new(
            Bytes::new(),
            Arc::new(Recorder::default()),
            Arc::new(AtomicU64::new(0)),
        );
        assert!(body.is_end_stream());
        assert_eq!(body.size_hint().exact(), Some(0));
    }
}
