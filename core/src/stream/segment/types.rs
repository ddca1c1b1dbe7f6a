use std::convert::Infallible;
use std::io;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::channel::mpsc::{Receiver, UnboundedReceiver};
use futures::StreamExt;

use crate::types::StreamError;

/// Outcome of a non-blocking dequeue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TryRecv {
    Segment(Bytes),
    /// Nothing queued right now; the producer is still live.
    Empty,
    /// The producer signalled completion and the queue is drained.
    Completed,
}

/// The receiving end of a segment queue.
///
/// Implemented for the `futures` mpsc receivers; hosts with their own queue
/// implement it to feed a [`SegmentChannelStream`](super::SegmentChannelStream).
pub trait SegmentReceiver: Send {
    fn try_recv_segment(&mut self) -> Result<TryRecv, StreamError>;

    /// `Ready(Ok(None))` once the queue is completed and drained.
    fn poll_recv_segment(&mut self, cx: &mut Context<'_>) -> Poll<Result<Option<Bytes>, StreamError>>;

    /// Stop accepting segments. Already queued segments may still be received.
    fn close_receiver(&mut self) {}
}

impl SegmentReceiver for Receiver<Bytes> {
    fn try_recv_segment(&mut self) -> Result<TryRecv, StreamError> {
        #[allow(deprecated)]
        let next = self.try_next();
        Ok(match next {
            Ok(Some(segment)) => TryRecv::Segment(segment),
            Ok(None) => TryRecv::Completed,
            Err(_) => TryRecv::Empty,
        })
    }

    fn poll_recv_segment(&mut self, cx: &mut Context<'_>) -> Poll<Result<Option<Bytes>, StreamError>> {
        self.poll_next_unpin(cx).map(Ok)
    }

    fn close_receiver(&mut self) {
        self.close();
    }
}

impl SegmentReceiver for UnboundedReceiver<Bytes> {
    fn try_recv_segment(&mut self) -> Result<TryRecv, StreamError> {
        #[allow(deprecated)]
        let next = self.try_next();
        Ok(match next {
            Ok(Some(segment)) => TryRecv::Segment(segment),
            Ok(None) => TryRecv::Completed,
            Err(_) => TryRecv::Empty,
        })
    }

    fn poll_recv_segment(&mut self, cx: &mut Context<'_>) -> Poll<Result<Option<Bytes>, StreamError>> {
        self.poll_next_unpin(cx).map(Ok)
    }

    fn close_receiver(&mut self) {
        self.close();
    }
}

/// Distinguishes the "no more chunks" signal from a real producer failure.
///
/// A chunk iterator may end either by returning `None` or by yielding an
/// error for which `is_completion` holds; both read as end of stream.
pub trait ChunkCompletion {
    fn is_completion(&self) -> bool;
}

impl ChunkCompletion for io::Error {
    fn is_completion(&self) -> bool {
        self.kind() == io::ErrorKind::UnexpectedEof
    }
}

impl ChunkCompletion for StreamError {
    fn is_completion(&self) -> bool {
        matches!(self, StreamError::Closed(_))
    }
}

impl ChunkCompletion for Infallible {
    fn is_completion(&self) -> bool {
        match *self {}
    }
}
