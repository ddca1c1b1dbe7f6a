//! bytestream-core
//!
//! Pull-based byte streams over forward-only, push and async sources.
//! Blocking and async callers share one state machine per adapter.

#![forbid(unsafe_code)]

// Shared and top level
pub mod constants;
pub mod types;
pub mod utils;

pub mod telemetry;

// Stream adapters
pub mod stream;

// -----------------------------------------------------------------------------
// Prelude (Rust users)
// -----------------------------------------------------------------------------
pub mod prelude {
    pub use crate::stream::{
        ByteStream,
        CancelToken,
        ChunkCompletion,
        ChunkIterStream,
        CloseMode,
        HandoffConfig,
        HandoffStream,
        SeekConfig,
        SeekEmulatingStream,
        SegmentChannelStream,
        SegmentSender,
        SlotState,
        StreamCapabilities,
        segment_channel,
    };
    pub use crate::telemetry::{StreamCounters, StreamSnapshot};
    pub use crate::types::{ErrorClass, StreamError};
}
