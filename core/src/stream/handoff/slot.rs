//! The handoff state machine, free of any synchronization.
//!
//! `Empty → Filled → Empty → … → Closed`. Callers hold the stream's lock
//! around every transition.

use bytes::Bytes;
use tracing::{debug, warn};

use crate::stream::handoff::types::SlotState;
use crate::telemetry::{StreamCounters, StreamTimer};
use crate::types::StreamError;

/// Sequence number of a deposited chunk, starting at 1.
pub type ChunkSeq = u64;

#[derive(Debug, Default)]
pub struct HandoffSlot {
    /// Undelivered remainder of the pending chunk. Never empty when `Some`.
    pending: Option<Bytes>,
    closed: bool,
    deposited: ChunkSeq,
    /// Chunks fully drained or discarded.
    completed: ChunkSeq,
    discarded: Option<ChunkSeq>,
    pub counters: StreamCounters,
    pub timer: StreamTimer,
}

impl HandoffSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SlotState {
        if self.closed {
            SlotState::Closed
        } else if self.pending.is_some() {
            SlotState::Filled
        } else {
            SlotState::Empty
        }
    }

    /// Bytes of the pending chunk not yet read.
    pub fn pending_len(&self) -> usize {
        self.pending.as_ref().map_or(0, Bytes::len)
    }

    /// A reader can make progress: data pending or end of stream.
    pub fn is_readable(&self) -> bool {
        self.closed || self.pending.is_some()
    }

    /// A writer can make progress: slot empty or the stream closed.
    pub fn is_writable(&self) -> bool {
        self.closed || self.pending.is_none()
    }

    /// `Empty → Filled`. Rejects a deposit into a filled or closed slot.
    ///
    /// An empty chunk is accepted but deposits nothing; it returns the
    /// sequence of the last deposit so a drain wait on it completes at once.
    pub fn deposit(&mut self, chunk: Bytes) -> Result<ChunkSeq, StreamError> {
        match self.state() {
            SlotState::Closed => return Err(StreamError::Closed("write after close")),
            SlotState::Filled => {
                return Err(StreamError::Protocol("write while the previous chunk is still pending"))
            }
            SlotState::Empty => {}
        }
        if chunk.is_empty() {
            return Ok(self.deposited);
        }

        self.deposited += 1;
        self.counters.add_chunk_in(chunk.len());
        debug!(seq = self.deposited, len = chunk.len(), "handoff chunk deposited");
        self.pending = Some(chunk);
        Ok(self.deposited)
    }

    /// Copy from the pending chunk into `out`; `Filled → Empty` once drained.
    pub fn take_into(&mut self, out: &mut [u8]) -> usize {
        let Some(chunk) = self.pending.as_mut() else {
            return 0;
        };

        let n = chunk.len().min(out.len());
        let part = chunk.split_to(n);
        out[..n].copy_from_slice(&part);
        self.counters.add_read(n, 0);

        if chunk.is_empty() {
            self.pending = None;
            self.completed = self.deposited;
            debug!(seq = self.completed, "handoff chunk drained");
        }
        n
    }

    /// Whether chunk `seq` has left the slot, and how.
    pub fn outcome(&self, seq: ChunkSeq) -> Option<Result<(), StreamError>> {
        if self.completed < seq {
            return None;
        }
        if self.discarded == Some(seq) {
            return Some(Err(StreamError::Closed("chunk discarded by forced close")));
        }
        Some(Ok(()))
    }

    /// Close if nothing is pending. Returns `false` when the caller must wait
    /// for a drain first.
    pub fn close_graceful(&mut self) -> bool {
        if self.closed {
            return true;
        }
        if self.pending.is_some() {
            return false;
        }
        self.mark_closed();
        true
    }

    /// Close immediately, discarding any undelivered bytes. Returns bytes discarded.
    pub fn close_forced(&mut self) -> usize {
        if self.closed {
            return 0;
        }
        let dropped = self.pending.take().map_or(0, |chunk| chunk.len());
        if dropped > 0 {
            self.completed = self.deposited;
            self.discarded = Some(self.deposited);
            self.counters.add_discarded(dropped);
            warn!(seq = self.deposited, dropped, "forced close discarded pending bytes");
        }
        self.mark_closed();
        dropped
    }

    fn mark_closed(&mut self) {
        self.closed = true;
        self.timer.finish();
        debug!(
            written = self.counters.bytes_written,
            read = self.counters.bytes_read,
            "handoff closed"
        );
    }
}
