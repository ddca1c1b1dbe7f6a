//! Segment queues read as one stream.
//!
//! - `channel`: segments pushed through a bounded queue by a producer
//! - `iter`:    segments pulled from a synchronous iterator

pub mod types;
pub mod channel;
pub mod iter;

pub use types::{ChunkCompletion, SegmentReceiver, TryRecv};
pub use channel::{SegmentChannelStream, SegmentSender, default_segment_channel, segment_channel};
pub use iter::ChunkIterStream;
