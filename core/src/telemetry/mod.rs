//! telemetry/mod.rs
//! Per-stream telemetry: byte counters, stage timers, and immutable snapshots.
//!
//! Notes:
//! - Counters are plain values owned by one adapter; shared adapters keep them
//!   behind the same lock as the state they describe.
//! - Snapshots are immutable and serializable for reporting.

pub mod counters;
pub mod timers;
pub mod snapshot;

pub use counters::*;
pub use timers::*;
pub use snapshot::*;
