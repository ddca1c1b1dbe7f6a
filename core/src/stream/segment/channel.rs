//! Queued segments exposed as one contiguous stream.
//!
//! A producer enqueues `Bytes` segments and eventually signals completion;
//! the reader sees their concatenation. Segments taken off the queue are
//! staged on the stream before any bytes are copied out, so a read dropped
//! at its suspension point loses nothing.

use std::collections::VecDeque;
use std::io;
use std::time::Instant;

use bytes::Bytes;
use futures::channel::mpsc::{self, Receiver, Sender};
use futures::future::poll_fn;
use futures::SinkExt;
use tracing::{debug, trace, warn};

use crate::constants::DEFAULT_SEGMENT_QUEUE_BOUND;
use crate::stream::cancel::{CancelToken, with_cancel};
use crate::stream::segment::types::{SegmentReceiver, TryRecv};
use crate::stream::{ByteStream, StreamCapabilities};
use crate::telemetry::{Stage, StreamCounters, StreamSnapshot, StreamTimer};
use crate::types::StreamError;
use crate::utils::drain_chunks;

/// Bounded segment queue: a [`SegmentSender`] for the producer and a
/// [`SegmentChannelStream`] for the reader.
///
/// `bound` is how many segments may be queued before `send` waits. Cloned
/// senders each add one slot of slack.
pub fn segment_channel(bound: usize) -> Result<(SegmentSender, SegmentChannelStream<Receiver<Bytes>>), StreamError> {
    if bound == 0 {
        return Err(StreamError::Validation("segment queue bound must be non-zero".into()));
    }
    // mpsc reserves one extra slot per sender.
    let (tx, rx) = mpsc::channel(bound - 1);
    Ok((SegmentSender { inner: tx }, SegmentChannelStream::new(rx)))
}

/// [`segment_channel`] with [`DEFAULT_SEGMENT_QUEUE_BOUND`].
pub fn default_segment_channel() -> (SegmentSender, SegmentChannelStream<Receiver<Bytes>>) {
    let (tx, rx) = mpsc::channel(DEFAULT_SEGMENT_QUEUE_BOUND - 1);
    (SegmentSender { inner: tx }, SegmentChannelStream::new(rx))
}

/// Producer half of [`segment_channel`]. Dropping every sender, or calling
/// [`complete`](Self::complete), ends the stream once queued segments are read.
#[derive(Debug, Clone)]
pub struct SegmentSender {
    inner: Sender<Bytes>,
}

impl SegmentSender {
    pub async fn send_async(&mut self, segment: Bytes) -> Result<(), StreamError> {
        self.inner
            .send(segment)
            .await
            .map_err(|_| StreamError::Closed("segment stream closed"))
    }

    pub fn send(&mut self, segment: Bytes) -> Result<(), StreamError> {
        pollster::block_on(self.send_async(segment))
    }

    /// Signal completion for every sender of this queue.
    pub fn complete(mut self) {
        self.inner.close_channel();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

/// Reads the concatenation of the segments delivered by `R`, in FIFO order.
///
/// A read fills the caller's buffer completely unless the queue completes
/// first; `0` means end of stream.
#[derive(Debug)]
pub struct SegmentChannelStream<R> {
    receiver: R,
    ready: VecDeque<Bytes>,
    ready_len: usize,
    completed: bool,
    closed: bool,
    counters: StreamCounters,
    timer: StreamTimer,
}

impl<R: SegmentReceiver> SegmentChannelStream<R> {
    pub fn new(receiver: R) -> Self {
        Self {
            receiver,
            ready: VecDeque::new(),
            ready_len: 0,
            completed: false,
            closed: false,
            counters: StreamCounters::default(),
            timer: StreamTimer::new(),
        }
    }

    /// Bytes received from the queue but not yet read.
    pub fn buffered_len(&self) -> usize {
        self.ready_len
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn counters(&self) -> &StreamCounters {
        &self.counters
    }

    pub fn snapshot(&self) -> StreamSnapshot {
        StreamSnapshot::from(&self.counters, &self.timer)
    }

    pub async fn read_async(&mut self, buf: &mut [u8]) -> Result<usize, StreamError> {
        if buf.is_empty() || self.closed {
            return Ok(0);
        }

        while self.ready_len < buf.len() && !self.completed {
            match self.receiver.try_recv_segment()? {
                TryRecv::Segment(segment) => {
                    self.stage(segment);
                    continue;
                }
                TryRecv::Completed => {
                    self.mark_completed();
                    continue;
                }
                TryRecv::Empty => {}
            }

            let t = Instant::now();
            let receiver = &mut self.receiver;
            let next = poll_fn(|cx| receiver.poll_recv_segment(cx)).await;
            self.timer.add_stage_time(Stage::Wait, t.elapsed());

            match next? {
                Some(segment) => self.stage(segment),
                None => self.mark_completed(),
            }
        }

        let t = Instant::now();
        let n = drain_chunks(&mut self.ready, buf);
        self.ready_len -= n;
        self.counters.add_read(n, 0);
        self.timer.add_stage_time(Stage::Read, t.elapsed());
        trace!(n, buffered = self.ready_len, "segment stream read");
        Ok(n)
    }

    pub async fn read_async_cancellable(
        &mut self,
        buf: &mut [u8],
        token: &CancelToken,
    ) -> Result<usize, StreamError> {
        with_cancel(token, self.read_async(buf)).await
    }

    pub async fn read_byte_async(&mut self) -> Result<Option<u8>, StreamError> {
        let mut one = [0u8; 1];
        match self.read_async(&mut one).await? {
            0 => Ok(None),
            _ => Ok(Some(one[0])),
        }
    }

    pub fn read_into(&mut self, buf: &mut [u8]) -> Result<usize, StreamError> {
        pollster::block_on(self.read_async(buf))
    }

    pub fn read_cancellable(&mut self, buf: &mut [u8], token: &CancelToken) -> Result<usize, StreamError> {
        pollster::block_on(self.read_async_cancellable(buf, token))
    }

    /// Stop reading: staged bytes are discarded and the queue is closed to
    /// further sends. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.receiver.close_receiver();

        if self.ready_len > 0 {
            warn!(dropped = self.ready_len, "segment stream closed with unread bytes");
            self.counters.add_discarded(self.ready_len);
        }
        self.ready.clear();
        self.ready_len = 0;
        self.timer.finish();
        debug!(read = self.counters.bytes_read, "segment stream closed");
    }

    fn stage(&mut self, segment: Bytes) {
        self.counters.add_chunk_in(segment.len());
        if segment.is_empty() {
            return;
        }
        trace!(len = segment.len(), "segment staged");
        self.ready_len += segment.len();
        self.ready.push_back(segment);
    }

    fn mark_completed(&mut self) {
        if !self.completed {
            debug!(segments = self.counters.chunks_in, "segment queue completed");
            self.completed = true;
        }
    }
}

impl<R: SegmentReceiver> io::Read for SegmentChannelStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_into(buf).map_err(io::Error::from)
    }
}

impl<R: SegmentReceiver> ByteStream for SegmentChannelStream<R> {
    fn capabilities(&self) -> StreamCapabilities {
        StreamCapabilities::READ | StreamCapabilities::ASYNC
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize, StreamError> {
        self.read_into(buf)
    }

    fn close(&mut self) -> Result<(), StreamError> {
        SegmentChannelStream::close(self);
        Ok(())
    }
}
