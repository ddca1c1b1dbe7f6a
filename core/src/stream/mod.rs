//! stream: pull-based byte streams over forward-only, push and async sources.
//!
//! Every adapter implements [`ByteStream`] and the matching `std::io` traits,
//! so a parser can be handed one without knowing what feeds it.
//!
//! Layering (leaves first):
//! - `buffer`:  circular backtrack window
//! - `seek`:    seek emulation over a forward-only `Read`
//! - `handoff`: single-slot writer/reader rendezvous
//! - `segment`: queued segments (channel or iterator) as one stream
//!
//! Suspending adapters expose `*_async` methods; their blocking methods drive
//! the same futures with `pollster::block_on`, so both paths share one state
//! machine.

pub mod buffer;
pub mod cancel;
pub mod seek;
pub mod handoff;
pub mod segment;

use std::io::SeekFrom;

use crate::types::StreamError;

pub use buffer::BacktrackBuffer;
pub use cancel::{CancelToken, with_cancel};
pub use seek::{SeekConfig, SeekEmulatingStream};
pub use handoff::{CloseMode, HandoffConfig, HandoffStream, SlotState};
pub use segment::{
    ChunkCompletion,
    ChunkIterStream,
    SegmentChannelStream,
    SegmentReceiver,
    SegmentSender,
    TryRecv,
    default_segment_channel,
    segment_channel,
};

bitflags::bitflags! {
    /// What a stream instance supports.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StreamCapabilities: u8 {
        const READ  = 0b0000_0001;
        const WRITE = 0b0000_0010;
        const SEEK  = 0b0000_0100;
        /// Has `*_async` entry points that suspend instead of block.
        const ASYNC = 0b0000_1000;
    }
}

/// The contract shared by every adapter in this crate.
///
/// - `read_bytes` returns `0` only at end of stream (or for an empty buffer).
/// - Unsupported operations fail with [`StreamError::Unsupported`].
/// - `close` is idempotent.
pub trait ByteStream {
    fn capabilities(&self) -> StreamCapabilities;

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize, StreamError>;

    fn write_bytes(&mut self, _buf: &[u8]) -> Result<(), StreamError> {
        Err(StreamError::Unsupported("write on a read-only stream"))
    }

    fn seek_to(&mut self, _pos: SeekFrom) -> Result<u64, StreamError> {
        Err(StreamError::Unsupported("seek on a forward-only stream"))
    }

    /// Wait for one byte; `None` at end of stream.
    fn read_byte(&mut self) -> Result<Option<u8>, StreamError> {
        let mut one = [0u8; 1];
        match self.read_bytes(&mut one)? {
            0 => Ok(None),
            _ => Ok(Some(one[0])),
        }
    }

    fn close(&mut self) -> Result<(), StreamError>;
}
