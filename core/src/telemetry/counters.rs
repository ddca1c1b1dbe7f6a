//! telemetry/counters.rs
//! Mutable counters updated as bytes move through an adapter.
//!
//! Summary: Collects byte and seek counts for one stream instance.
//! Converted into an immutable StreamSnapshot on demand.
use bincode::{Encode, Decode};
use std::ops::AddAssign;

/// Deterministic counters collected during stream processing
#[derive(Default, Clone, Debug, Encode, Decode, PartialEq)]
pub struct StreamCounters {
    /// Bytes handed to readers.
    pub bytes_read: u64,
    /// Bytes accepted from writers or producers.
    pub bytes_written: u64,
    /// Bytes dropped without ever reaching a reader (forced close).
    pub bytes_discarded: u64,
    /// Bytes served again from the backtrack window.
    pub bytes_replayed: u64,
    /// Bytes read from the source and skipped by forward seeks.
    pub bytes_skipped: u64,
    /// Chunks or segments received from the producer side.
    pub chunks_in: u64,
    pub seeks_forward: u64,
    pub seeks_backward: u64,
    pub seek_failures: u64,
}

impl StreamCounters {
    /// Record bytes delivered to a reader.
    ///
    /// - `fresh`: bytes pulled from the producer/source for this read
    /// - `replayed`: bytes served from already-buffered history
    pub fn add_read(&mut self, fresh: usize, replayed: usize) {
        self.bytes_read += (fresh + replayed) as u64;
        self.bytes_replayed += replayed as u64;
    }

    /// Record one chunk accepted from a writer or producer.
    pub fn add_chunk_in(&mut self, len: usize) {
        self.chunks_in += 1;
        self.bytes_written += len as u64;
    }

    pub fn add_discarded(&mut self, len: usize) {
        self.bytes_discarded += len as u64;
    }

    pub fn add_skipped(&mut self, len: usize) {
        self.bytes_skipped += len as u64;
    }

    pub fn add_seek(&mut self, forward: bool) {
        if forward {
            self.seeks_forward += 1;
        } else {
            self.seeks_backward += 1;
        }
    }

    pub fn add_seek_failure(&mut self) {
        self.seek_failures += 1;
    }

    /// Written bytes are either read, discarded, or still pending in the slot.
    pub fn in_flight(&self) -> u64 {
        self.bytes_written
            .saturating_sub(self.bytes_read + self.bytes_discarded)
    }

    pub fn merge(&mut self, other: &StreamCounters) {
        self.bytes_read += other.bytes_read;
        self.bytes_written += other.bytes_written;
        self.bytes_discarded += other.bytes_discarded;
        self.bytes_replayed += other.bytes_replayed;
        self.bytes_skipped += other.bytes_skipped;
        self.chunks_in += other.chunks_in;
        self.seeks_forward += other.seeks_forward;
        self.seeks_backward += other.seeks_backward;
        self.seek_failures += other.seek_failures;
    }
}

impl AddAssign for StreamCounters {
    fn add_assign(&mut self, rhs: Self) {
        self.merge(&rhs);
    }
}
