//! Pull-based stream over a synchronous iterator of chunks.

use std::error::Error;
use std::io;
use std::time::Instant;

use bytes::{Buf, Bytes};
use tracing::{debug, trace, warn};

use crate::stream::segment::types::ChunkCompletion;
use crate::stream::{ByteStream, StreamCapabilities};
use crate::telemetry::{Stage, StreamCounters, StreamSnapshot, StreamTimer};
use crate::types::StreamError;

type BoxError = Box<dyn Error + Send + Sync>;

/// Reads the concatenation of the chunks yielded by `I`.
///
/// The iterator ends the stream by returning `None` or by yielding an error
/// whose [`ChunkCompletion::is_completion`] holds. Any other error is fatal:
/// bytes already copied by the failing read are returned first and the error
/// surfaces on the next call. Every read after that fails with
/// [`StreamError::Closed`].
#[derive(Debug)]
pub struct ChunkIterStream<I> {
    chunks: I,
    current: Bytes,
    finished: bool,
    failed: bool,
    deferred: Option<StreamError>,
    counters: StreamCounters,
    timer: StreamTimer,
}

impl<I, B, E> ChunkIterStream<I>
where
    I: Iterator<Item = Result<B, E>>,
    B: Into<Bytes>,
    E: ChunkCompletion + Into<BoxError>,
{
    pub fn new(chunks: I) -> Self {
        Self {
            chunks,
            current: Bytes::new(),
            finished: false,
            failed: false,
            deferred: None,
            counters: StreamCounters::default(),
            timer: StreamTimer::new(),
        }
    }

    pub fn counters(&self) -> &StreamCounters {
        &self.counters
    }

    pub fn snapshot(&self) -> StreamSnapshot {
        StreamSnapshot::from(&self.counters, &self.timer)
    }

    pub fn try_read(&mut self, buf: &mut [u8]) -> Result<usize, StreamError> {
        if let Some(e) = self.deferred.take() {
            return Err(e);
        }
        if self.failed {
            return Err(StreamError::Closed("chunk producer failed"));
        }
        if buf.is_empty() {
            return Ok(0);
        }

        let t = Instant::now();
        let mut copied = 0;
        while copied < buf.len() {
            if self.current.is_empty() {
                match self.next_chunk() {
                    Ok(true) => continue,
                    Ok(false) => break,
                    Err(e) if copied > 0 => {
                        self.deferred = Some(e);
                        break;
                    }
                    Err(e) => return Err(e),
                }
            }

            let n = self.current.len().min(buf.len() - copied);
            buf[copied..copied + n].copy_from_slice(&self.current[..n]);
            self.current.advance(n);
            copied += n;
        }

        self.counters.add_read(copied, 0);
        self.timer.add_stage_time(Stage::Read, t.elapsed());
        trace!(copied, "chunk stream read");
        Ok(copied)
    }

    /// The iterator is synchronous, so this completes without suspending.
    pub async fn read_async(&mut self, buf: &mut [u8]) -> Result<usize, StreamError> {
        self.try_read(buf)
    }

    /// Pull the next non-empty chunk. `Ok(false)` at end of stream.
    fn next_chunk(&mut self) -> Result<bool, StreamError> {
        if self.finished {
            return Ok(false);
        }
        match self.chunks.next() {
            Some(Ok(chunk)) => {
                let chunk: Bytes = chunk.into();
                self.counters.add_chunk_in(chunk.len());
                self.current = chunk;
                Ok(true)
            }
            Some(Err(e)) if e.is_completion() => {
                debug!(chunks = self.counters.chunks_in, "chunk producer signalled completion");
                self.finish();
                Ok(false)
            }
            Some(Err(e)) => {
                let e: BoxError = e.into();
                warn!("chunk producer failed: {e}");
                self.failed = true;
                self.finish();
                Err(StreamError::Producer(e))
            }
            None => {
                debug!(chunks = self.counters.chunks_in, "chunk producer exhausted");
                self.finish();
                Ok(false)
            }
        }
    }

    fn finish(&mut self) {
        self.finished = true;
        self.timer.finish();
    }
}

impl<I, B, E> io::Read for ChunkIterStream<I>
where
    I: Iterator<Item = Result<B, E>>,
    B: Into<Bytes>,
    E: ChunkCompletion + Into<BoxError>,
{
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.try_read(buf).map_err(io::Error::from)
    }
}

impl<I, B, E> ByteStream for ChunkIterStream<I>
where
    I: Iterator<Item = Result<B, E>>,
    B: Into<Bytes>,
    E: ChunkCompletion + Into<BoxError>,
{
    fn capabilities(&self) -> StreamCapabilities {
        StreamCapabilities::READ | StreamCapabilities::ASYNC
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize, StreamError> {
        self.try_read(buf)
    }

    fn close(&mut self) -> Result<(), StreamError> {
        self.counters.add_discarded(self.current.len());
        self.current = Bytes::new();
        if !self.finished {
            self.finish();
        }
        Ok(())
    }
}
