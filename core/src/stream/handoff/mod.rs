//! Single-slot handoff between one writer and one reader.
//!
//! At most one chunk is in flight. A writer waits for the slot to be empty,
//! deposits, and (with `auto_flush`) waits again until the reader drained
//! that exact chunk, which bounds memory to one chunk and gives the writer
//! true backpressure.
//!
//! Gates:
//! - `slot` mutex: guards the state machine; never held across a suspension point
//! - `readable` event: set iff a chunk is pending or the stream is closed
//! - `writable` event: set iff the slot is empty or the stream is closed
//!
//! Events are updated under the slot lock on every transition, so a waiter
//! that saw the wrong state and then waits on the event cannot miss a wakeup.

pub mod types;
pub mod slot;

use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use bytes::Bytes;
use futures_intrusive::sync::ManualResetEvent;
use tracing::trace;

use crate::stream::cancel::{CancelToken, with_cancel};
use crate::stream::{ByteStream, StreamCapabilities};
use crate::telemetry::{Stage, StreamCounters, StreamSnapshot};
use crate::types::StreamError;

pub use slot::{ChunkSeq, HandoffSlot};
pub use types::{CloseMode, HandoffConfig, SlotState};

struct Shared {
    slot: Mutex<HandoffSlot>,
    readable: ManualResetEvent,
    writable: ManualResetEvent,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, HandoffSlot> {
        // Every transition is applied whole under the lock, so a poisoned
        // slot is still consistent.
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mirror the slot state onto the gates. Call with the lock held.
    fn publish(&self, slot: &HandoffSlot) {
        if slot.is_readable() {
            self.readable.set();
        } else {
            self.readable.reset();
        }
        if slot.is_writable() {
            self.writable.set();
        } else {
            self.writable.reset();
        }
    }

    async fn wait(&self, event: &ManualResetEvent) {
        let t = Instant::now();
        event.wait().await;
        self.lock().timer.add_stage_time(Stage::Wait, t.elapsed());
    }
}

/// Cloneable handle to a handoff stream; clones share the same slot.
///
/// Give one clone to the writer and one to the reader. Blocking methods
/// drive their `*_async` twins with `pollster::block_on`, so both calling
/// conventions run the same code and can be mixed freely across threads.
#[derive(Clone)]
pub struct HandoffStream {
    shared: Arc<Shared>,
    config: HandoffConfig,
}

impl std::fmt::Debug for HandoffStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slot = self.shared.lock();
        f.debug_struct("HandoffStream")
            .field("state", &slot.state())
            .field("pending_len", &slot.pending_len())
            .field("config", &self.config)
            .finish()
    }
}

impl Default for HandoffStream {
    fn default() -> Self {
        Self::new()
    }
}

impl HandoffStream {
    pub fn new() -> Self {
        Self::with_config(HandoffConfig::default())
    }

    pub fn with_config(config: HandoffConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                slot: Mutex::new(HandoffSlot::new()),
                readable: ManualResetEvent::new(false),
                writable: ManualResetEvent::new(true),
            }),
            config,
        }
    }

    pub fn config(&self) -> HandoffConfig {
        self.config
    }

    pub fn state(&self) -> SlotState {
        self.shared.lock().state()
    }

    pub fn pending_len(&self) -> usize {
        self.shared.lock().pending_len()
    }

    pub fn is_closed(&self) -> bool {
        self.state() == SlotState::Closed
    }

    pub fn counters(&self) -> StreamCounters {
        self.shared.lock().counters.clone()
    }

    pub fn snapshot(&self) -> StreamSnapshot {
        let slot = self.shared.lock();
        StreamSnapshot::from(&slot.counters, &slot.timer)
    }

    // ------------------------------------------------------------
    // Write side
    // ------------------------------------------------------------

    /// Deposit without waiting. Fails with a protocol violation if a chunk is
    /// still pending, and never waits for the drain.
    pub fn try_write_chunk(&self, chunk: Bytes) -> Result<(), StreamError> {
        let mut slot = self.shared.lock();
        let result = slot.deposit(chunk).map(|_| ());
        self.shared.publish(&slot);
        result
    }

    /// Wait for an empty slot, deposit `chunk`, then (with `auto_flush`) wait
    /// until the reader has drained it.
    pub async fn write_chunk_async(&self, chunk: Bytes) -> Result<(), StreamError> {
        let t = Instant::now();
        let seq = loop {
            {
                let mut slot = self.shared.lock();
                if slot.state() != SlotState::Filled {
                    let seq = slot.deposit(chunk)?;
                    self.shared.publish(&slot);
                    slot.timer.add_stage_time(Stage::Write, t.elapsed());
                    break seq;
                }
            }
            self.shared.wait(&self.shared.writable).await;
        };

        if self.config.auto_flush {
            self.wait_drained(seq).await?;
        }
        Ok(())
    }

    /// Copying variant of [`write_chunk_async`](Self::write_chunk_async).
    pub async fn write_async(&self, buf: &[u8]) -> Result<(), StreamError> {
        self.write_chunk_async(Bytes::copy_from_slice(buf)).await
    }

    pub async fn write_chunk_async_cancellable(
        &self,
        chunk: Bytes,
        token: &CancelToken,
    ) -> Result<(), StreamError> {
        with_cancel(token, self.write_chunk_async(chunk)).await
    }

    pub fn write_chunk(&self, chunk: Bytes) -> Result<(), StreamError> {
        pollster::block_on(self.write_chunk_async(chunk))
    }

    pub fn write_slice(&self, buf: &[u8]) -> Result<(), StreamError> {
        pollster::block_on(self.write_async(buf))
    }

    pub fn write_chunk_cancellable(&self, chunk: Bytes, token: &CancelToken) -> Result<(), StreamError> {
        pollster::block_on(self.write_chunk_async_cancellable(chunk, token))
    }

    /// Wait until no chunk is pending (or the stream closed).
    pub async fn flush_async(&self) -> Result<(), StreamError> {
        loop {
            if self.shared.lock().is_writable() {
                return Ok(());
            }
            self.shared.wait(&self.shared.writable).await;
        }
    }

    pub fn flush_pending(&self) -> Result<(), StreamError> {
        pollster::block_on(self.flush_async())
    }

    async fn wait_drained(&self, seq: ChunkSeq) -> Result<(), StreamError> {
        loop {
            let outcome = self.shared.lock().outcome(seq);
            if let Some(outcome) = outcome {
                return outcome;
            }
            self.shared.wait(&self.shared.writable).await;
        }
    }

    // ------------------------------------------------------------
    // Read side
    // ------------------------------------------------------------

    /// Wait for a pending chunk and copy up to `buf.len()` bytes out of it.
    ///
    /// Returns fewer bytes than requested when the chunk is smaller; returns
    /// `0` only once the stream is closed and drained (or for an empty `buf`).
    pub async fn read_async(&self, buf: &mut [u8]) -> Result<usize, StreamError> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            {
                let mut slot = self.shared.lock();
                match slot.state() {
                    SlotState::Filled => {
                        let t = Instant::now();
                        let n = slot.take_into(buf);
                        self.shared.publish(&slot);
                        slot.timer.add_stage_time(Stage::Read, t.elapsed());
                        trace!(n, remaining = slot.pending_len(), "handoff read");
                        return Ok(n);
                    }
                    SlotState::Closed => return Ok(0),
                    SlotState::Empty => {}
                }
            }
            self.shared.wait(&self.shared.readable).await;
        }
    }

    pub async fn read_async_cancellable(
        &self,
        buf: &mut [u8],
        token: &CancelToken,
    ) -> Result<usize, StreamError> {
        with_cancel(token, self.read_async(buf)).await
    }

    /// Wait for one byte; `None` at end of stream.
    pub async fn read_byte_async(&self) -> Result<Option<u8>, StreamError> {
        let mut one = [0u8; 1];
        match self.read_async(&mut one).await? {
            0 => Ok(None),
            _ => Ok(Some(one[0])),
        }
    }

    pub fn read_into(&self, buf: &mut [u8]) -> Result<usize, StreamError> {
        pollster::block_on(self.read_async(buf))
    }

    pub fn read_cancellable(&self, buf: &mut [u8], token: &CancelToken) -> Result<usize, StreamError> {
        pollster::block_on(self.read_async_cancellable(buf, token))
    }

    pub fn read_byte(&self) -> Result<Option<u8>, StreamError> {
        pollster::block_on(self.read_byte_async())
    }

    // ------------------------------------------------------------
    // Close
    // ------------------------------------------------------------

    /// Close with the given discipline. Idempotent.
    pub async fn close_async(&self, mode: CloseMode) -> Result<(), StreamError> {
        loop {
            {
                let mut slot = self.shared.lock();
                let done = match mode {
                    CloseMode::Forced => {
                        slot.close_forced();
                        true
                    }
                    CloseMode::Graceful => slot.close_graceful(),
                };
                if done {
                    self.shared.publish(&slot);
                    return Ok(());
                }
            }
            self.shared.wait(&self.shared.writable).await;
        }
    }

    pub async fn close_async_cancellable(&self, mode: CloseMode, token: &CancelToken) -> Result<(), StreamError> {
        with_cancel(token, self.close_async(mode)).await
    }

    pub fn close_with(&self, mode: CloseMode) -> Result<(), StreamError> {
        pollster::block_on(self.close_async(mode))
    }

    pub fn close_cancellable(&self, mode: CloseMode, token: &CancelToken) -> Result<(), StreamError> {
        pollster::block_on(self.close_async_cancellable(mode, token))
    }
}

impl io::Read for HandoffStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_into(buf).map_err(io::Error::from)
    }
}

impl io::Write for HandoffStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_slice(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_pending().map_err(io::Error::from)
    }
}

impl ByteStream for HandoffStream {
    fn capabilities(&self) -> StreamCapabilities {
        StreamCapabilities::READ | StreamCapabilities::WRITE | StreamCapabilities::ASYNC
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize, StreamError> {
        self.read_into(buf)
    }

    fn write_bytes(&mut self, buf: &[u8]) -> Result<(), StreamError> {
        self.write_slice(buf)
    }

    fn read_byte(&mut self) -> Result<Option<u8>, StreamError> {
        HandoffStream::read_byte(self)
    }

    fn close(&mut self) -> Result<(), StreamError> {
        self.close_with(CloseMode::Graceful)
    }
}
