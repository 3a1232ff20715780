//! Byte-counting response body.
//!
//! Wraps a response body, forwards every frame untouched and keeps a running
//! total of data bytes. The completion callback runs exactly once, when the
//! transport drops the body, which happens only after it stopped streaming.

use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::{Body, Bytes};
use http_body::{Body as HttpBody, Frame, SizeHint};

/// How the body stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyOutcome {
    /// The inner body reached end of stream.
    Complete,
    /// The body was dropped or failed before end of stream.
    Aborted,
}

type OnComplete = Box<dyn FnOnce(BodyOutcome, Option<u64>) + Send + 'static>;

/// Response body decorator that counts bytes written through it.
pub struct CountingBody {
    inner: Body,
    total: u64,
    ended: bool,
    on_complete: Option<OnComplete>,
}

impl CountingBody {
    /// Wrap `inner`. `on_complete` receives the outcome and the captured
    /// byte count (`None` when no bytes were written).
    pub fn new<F>(inner: Body, on_complete: F) -> Self
    where
        F: FnOnce(BodyOutcome, Option<u64>) + Send + 'static,
    {
        Self {
            inner,
            total: 0,
            ended: false,
            on_complete: Some(Box::new(on_complete)),
        }
    }

    /// Bytes counted so far.
    pub fn bytes_counted(&self) -> u64 {
        self.total
    }
}

/// Zero bytes is reported as "nothing captured".
pub fn captured(total: u64) -> Option<u64> {
    (total > 0).then_some(total)
}

impl HttpBody for CountingBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        if this.ended {
            return Poll::Ready(None);
        }

        match Pin::new(&mut this.inner).poll_frame(cx) {
            Poll::Ready(Some(Ok(frame))) => {
                if let Some(data) = frame.data_ref() {
                    this.total += data.len() as u64;
                }
                if this.inner.is_end_stream() {
                    this.ended = true;
                }
                Poll::Ready(Some(Ok(frame)))
            }
            Poll::Ready(None) => {
                this.ended = true;
                Poll::Ready(None)
            }
            other => other,
        }
    }

    fn is_end_stream(&self) -> bool {
        self.ended || self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        if self.ended {
            SizeHint::with_exact(0)
        } else {
            self.inner.size_hint()
        }
    }
}

impl Drop for CountingBody {
    fn drop(&mut self) {
        if let Some(on_complete) = self.on_complete.take() {
            let outcome = if self.ended || self.inner.is_end_stream() {
                BodyOutcome::Complete
            } else {
                BodyOutcome::Aborted
            };
            on_complete(outcome, captured(self.total));
        }
    }
}
