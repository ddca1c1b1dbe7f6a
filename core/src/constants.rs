/// Defaults when no explicit config is given.
pub const DEFAULT_BACKTRACK_CAPACITY: usize = 64 * 1024; // 64 KiB

/// Backtrack window sanity bound (32 MiB).
pub const MAX_BACKTRACK_CAPACITY: usize = 32 * 1024 * 1024;

/// Scratch size used when a forward seek has to read and discard.
pub const DEFAULT_SKIP_CHUNK_SIZE: usize = 8 * 1024; // 8 KiB

/// Segments a producer may queue ahead of the reader before `send` waits.
pub const DEFAULT_SEGMENT_QUEUE_BOUND: usize = 16;

