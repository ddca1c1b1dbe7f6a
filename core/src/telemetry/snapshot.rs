//! telemetry/snapshot.rs
//!
//! Immutable view of a stream's counters and timings.

use std::time::Duration;
use serde::{Serialize, Deserialize};

use crate::telemetry::counters::StreamCounters;
use crate::telemetry::timers::{StreamTimer, StageTimes};

/// Captures counters, throughput, stage timings, and elapsed duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamSnapshot {
    pub bytes_read: u64,
    pub bytes_written: u64,
    pub bytes_discarded: u64,
    pub bytes_replayed: u64,
    pub bytes_skipped: u64,
    pub chunks_in: u64,
    pub seeks_forward: u64,
    pub seeks_backward: u64,
    pub seek_failures: u64,
    pub throughput_read_bytes_per_sec: f64,
    pub elapsed: Duration,
    pub stage_times: StageTimes,
}

impl StreamSnapshot {
    pub fn from(counters: &StreamCounters, timer: &StreamTimer) -> Self {
        let elapsed = timer.elapsed();

        let throughput = if elapsed.as_secs_f64() > 0.0 {
            counters.bytes_read as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };

        Self {
            bytes_read: counters.bytes_read,
            bytes_written: counters.bytes_written,
            bytes_discarded: counters.bytes_discarded,
            bytes_replayed: counters.bytes_replayed,
            bytes_skipped: counters.bytes_skipped,
            chunks_in: counters.chunks_in,
            seeks_forward: counters.seeks_forward,
            seeks_backward: counters.seeks_backward,
            seek_failures: counters.seek_failures,
            throughput_read_bytes_per_sec: throughput,
            elapsed,
            stage_times: timer.stage_times.clone(),
        }
    }

    /// Every written byte was either read or discarded, none duplicated.
    pub fn conservation_holds(&self) -> bool {
        self.bytes_written == self.bytes_read + self.bytes_discarded
    }

    pub fn total_stage_time(&self) -> Duration {
        self.stage_times.total()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
