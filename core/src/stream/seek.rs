//! Seek emulation over a forward-only, single-pass source.
//!
//! Responsibilities:
//! - Remember the last `backtrack_capacity` bytes pulled from the source
//! - Serve backward seeks from that window without touching the source
//! - Serve forward and end-relative seeks by reading ahead
//!
//! Invariant: `position == underlying_pos - window.unread()`.

use std::io::{self, Read, Seek, SeekFrom};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::constants::{DEFAULT_BACKTRACK_CAPACITY, DEFAULT_SKIP_CHUNK_SIZE, MAX_BACKTRACK_CAPACITY};
use crate::stream::buffer::BacktrackBuffer;
use crate::stream::{ByteStream, StreamCapabilities};
use crate::telemetry::{Stage, StreamCounters, StreamSnapshot, StreamTimer};
use crate::types::StreamError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeekConfig {
    /// Bytes of history kept for backward seeks.
    pub backtrack_capacity: usize,
    /// Scratch size for read-and-discard during forward seeks.
    pub skip_chunk_size: usize,
}

impl Default for SeekConfig {
    fn default() -> Self {
        Self {
            backtrack_capacity: DEFAULT_BACKTRACK_CAPACITY,
            skip_chunk_size: DEFAULT_SKIP_CHUNK_SIZE,
        }
    }
}

impl SeekConfig {
    pub fn with_capacity(backtrack_capacity: usize) -> Result<Self, StreamError> {
        let config = Self {
            backtrack_capacity,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), StreamError> {
        if self.backtrack_capacity == 0 || self.backtrack_capacity > MAX_BACKTRACK_CAPACITY {
            return Err(StreamError::Validation(format!(
                "backtrack capacity {} outside 1..={}",
                self.backtrack_capacity, MAX_BACKTRACK_CAPACITY
            )));
        }
        if self.skip_chunk_size == 0 {
            return Err(StreamError::Validation("skip chunk size must be non-zero".into()));
        }
        Ok(())
    }
}

/// Wraps a forward-only `Read` and emulates `Seek` within a bounded window.
///
/// Backward seeks succeed while the target is still buffered; forward seeks
/// read ahead as far as needed. Both failure modes are reported, never
/// clamped: [`StreamError::BacktrackExhausted`] when history is missing,
/// [`StreamError::PastEndOfSource`] when the source ends first.
///
/// Not meant for concurrent use; callers serialize access.
#[derive(Debug)]
pub struct SeekEmulatingStream<R> {
    inner: R,
    window: BacktrackBuffer,
    underlying_pos: u64,
    skip_chunk_size: usize,
    /// Source error hit after window bytes were already handed out.
    deferred: Option<io::Error>,
    closed: bool,
    counters: StreamCounters,
    timer: StreamTimer,
}

impl<R: Read> SeekEmulatingStream<R> {
    pub fn new(inner: R, backtrack_capacity: usize) -> Result<Self, StreamError> {
        Self::with_config(inner, SeekConfig::with_capacity(backtrack_capacity)?)
    }

    pub fn with_config(inner: R, config: SeekConfig) -> Result<Self, StreamError> {
        config.validate()?;
        Ok(Self {
            inner,
            window: BacktrackBuffer::with_capacity(config.backtrack_capacity)?,
            underlying_pos: 0,
            skip_chunk_size: config.skip_chunk_size,
            deferred: None,
            closed: false,
            counters: StreamCounters::default(),
            timer: StreamTimer::new(),
        })
    }

    /// Logical position of the next byte a read returns.
    pub fn position(&self) -> u64 {
        self.underlying_pos - self.window.unread() as u64
    }

    /// Bytes consumed from the wrapped source so far.
    pub fn underlying_position(&self) -> u64 {
        self.underlying_pos
    }

    /// How far back a seek can currently reach.
    pub fn backtrack_available(&self) -> usize {
        self.window.read_cursor()
    }

    pub fn window_len(&self) -> usize {
        self.window.stored()
    }

    pub fn capacity(&self) -> usize {
        self.window.capacity()
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    pub fn counters(&self) -> &StreamCounters {
        &self.counters
    }

    pub fn snapshot(&self) -> StreamSnapshot {
        StreamSnapshot::from(&self.counters, &self.timer)
    }

    pub fn try_read(&mut self, buf: &mut [u8]) -> Result<usize, StreamError> {
        if buf.is_empty() || self.closed {
            return Ok(0);
        }
        if let Some(e) = self.deferred.take() {
            return Err(e.into());
        }
        let t = Instant::now();

        let replayed = self.window.read_unread(buf);
        let mut fresh = 0;
        if replayed < buf.len() {
            match self.fetch(&mut buf[replayed..]) {
                Ok(n) => fresh = n,
                // Hand back what the window already produced; the next
                // call reports the error.
                Err(e) if replayed > 0 => {
                    trace!("source error deferred: {e}");
                    self.deferred = Some(e);
                }
                Err(e) => return Err(e.into()),
            }
        }

        self.counters.add_read(fresh, replayed);
        self.timer.add_stage_time(Stage::Read, t.elapsed());
        trace!(replayed, fresh, position = self.position(), "seek stream read");
        Ok(replayed + fresh)
    }

    /// Async twin of [`try_read`](Self::try_read). The source is synchronous,
    /// so this completes without suspending.
    pub async fn read_async(&mut self, buf: &mut [u8]) -> Result<usize, StreamError> {
        self.try_read(buf)
    }

    pub fn try_seek(&mut self, pos: SeekFrom) -> Result<u64, StreamError> {
        if self.closed {
            return Err(StreamError::Closed("seek after close"));
        }
        let t = Instant::now();
        let current = self.position();

        let result = match pos {
            SeekFrom::Start(target) => self.seek_absolute(current, target),
            SeekFrom::Current(delta) => match current.checked_add_signed(delta) {
                Some(target) => self.seek_absolute(current, target),
                None => Err(StreamError::InvalidSeek),
            },
            SeekFrom::End(offset) => self.seek_from_end(current, offset),
        };

        if result.is_err() {
            self.counters.add_seek_failure();
        }
        self.timer.add_stage_time(Stage::Seek, t.elapsed());
        result
    }

    pub async fn seek_async(&mut self, pos: SeekFrom) -> Result<u64, StreamError> {
        self.try_seek(pos)
    }

    pub fn close(&mut self) {
        if !self.closed {
            debug!(position = self.position(), "seek stream closed");
            self.closed = true;
            self.deferred = None;
            self.window.clear();
            self.timer.finish();
        }
    }

    pub async fn close_async(&mut self) {
        self.close()
    }

    fn seek_absolute(&mut self, current: u64, target: u64) -> Result<u64, StreamError> {
        if target == current {
            return Ok(current);
        }

        if target < current {
            let distance = current - target;
            let available = self.window.read_cursor() as u64;
            if distance > available || !self.window.rewind(distance as usize) {
                debug!(distance, available, "backward seek outside window");
                return Err(StreamError::BacktrackExhausted {
                    requested: distance,
                    available,
                });
            }
            self.counters.add_seek(false);
            debug!(from = current, to = target, "backward seek within window");
            return Ok(target);
        }

        let mut remaining = target - current;
        remaining -= self.window.advance(usize::try_from(remaining).unwrap_or(usize::MAX)) as u64;

        let mut scratch = vec![0u8; usize::try_from(remaining).unwrap_or(usize::MAX).min(self.skip_chunk_size)];
        while remaining > 0 {
            let want = usize::try_from(remaining).unwrap_or(usize::MAX).min(scratch.len());
            let n = self.fetch(&mut scratch[..want])?;
            if n == 0 {
                debug!(target, end = self.underlying_pos, "forward seek hit end of source");
                return Err(StreamError::PastEndOfSource {
                    target,
                    end: self.underlying_pos,
                });
            }
            self.counters.add_skipped(n);
            remaining -= n as u64;
        }

        self.counters.add_seek(true);
        debug!(from = current, to = target, "forward seek");
        Ok(target)
    }

    fn seek_from_end(&mut self, current: u64, offset: i64) -> Result<u64, StreamError> {
        // The end is unknown until the source is drained; keep the last
        // `capacity` bytes of it.
        let mut scratch = vec![0u8; self.skip_chunk_size];
        loop {
            match self.pull(&mut scratch) {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    self.restore_or_park(current);
                    debug!(offset, consumed = self.underlying_pos, "seek from end aborted: {e}");
                    return Err(e.into());
                }
            }
        }

        let end = self.underlying_pos;
        let window_start = end - self.window.stored() as u64;

        let outcome = match end.checked_add_signed(offset) {
            None => Err(StreamError::InvalidSeek),
            Some(target) if target > end => Err(StreamError::PastEndOfSource { target, end }),
            Some(target) if target < window_start => Err(StreamError::BacktrackExhausted {
                requested: offset.unsigned_abs(),
                available: self.window.stored() as u64,
            }),
            Some(target) => Ok(target),
        };

        match outcome {
            Ok(target) => {
                self.window.set_cursor((target - window_start) as usize);
                self.counters.add_seek(target >= current);
                debug!(from = current, to = target, end, "seek from end");
                Ok(target)
            }
            Err(e) => {
                self.restore_or_park(current);
                debug!(offset, end, "seek from end outside window: {e}");
                Err(e)
            }
        }
    }

    /// After a failed read-ahead: stay at `current` if that byte survived
    /// eviction, otherwise park at the end of what was consumed.
    fn restore_or_park(&mut self, current: u64) {
        let window_start = self.underlying_pos - self.window.stored() as u64;
        if current >= window_start {
            self.window.set_cursor((current - window_start) as usize);
        } else {
            self.window.mark_all_read();
        }
    }

    /// Read fresh bytes from the source and hand them out immediately.
    fn fetch(&mut self, out: &mut [u8]) -> io::Result<usize> {
        let n = self.pull(out)?;
        self.window.mark_all_read();
        Ok(n)
    }

    /// Read fresh bytes from the source into the window without delivering them.
    fn pull(&mut self, out: &mut [u8]) -> io::Result<usize> {
        let n = loop {
            match self.inner.read(out) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        };
        self.window.push(&out[..n]);
        self.underlying_pos += n as u64;
        Ok(n)
    }
}

impl<R: Read> Read for SeekEmulatingStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.try_read(buf).map_err(io::Error::from)
    }
}

impl<R: Read> Seek for SeekEmulatingStream<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.try_seek(pos).map_err(io::Error::from)
    }

    fn stream_position(&mut self) -> io::Result<u64> {
        Ok(self.position())
    }
}

impl<R: Read> ByteStream for SeekEmulatingStream<R> {
    fn capabilities(&self) -> StreamCapabilities {
        StreamCapabilities::READ | StreamCapabilities::SEEK | StreamCapabilities::ASYNC
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize, StreamError> {
        self.try_read(buf)
    }

    fn seek_to(&mut self, pos: SeekFrom) -> Result<u64, StreamError> {
        self.try_seek(pos)
    }

    fn close(&mut self) -> Result<(), StreamError> {
        SeekEmulatingStream::close(self);
        Ok(())
    }
}
