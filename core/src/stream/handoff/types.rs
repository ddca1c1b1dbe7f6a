use std::fmt;

use serde::{Deserialize, Serialize};

/// Observable state of the single handoff slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// No chunk pending; a writer may deposit.
    Empty,
    /// A chunk is pending; readers drain it, writers wait.
    Filled,
    /// Terminal. Reads return end of stream, writes fail.
    Closed,
}

impl fmt::Display for SlotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SlotState::Empty  => "empty",
            SlotState::Filled => "filled",
            SlotState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Close discipline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseMode {
    /// Wait until the pending chunk has been drained, then close.
    Graceful,
    /// Drop any undelivered bytes and close immediately.
    Forced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandoffConfig {
    /// `true`: a write returns only after the reader drained that chunk.
    /// `false`: fire-and-forget; the write returns right after the deposit.
    pub auto_flush: bool,
}

impl Default for HandoffConfig {
    fn default() -> Self {
        Self { auto_flush: true }
    }
}

impl HandoffConfig {
    pub fn fire_and_forget() -> Self {
        Self { auto_flush: false }
    }
}
