//! Fixed-capacity circular window over the most recent bytes of a stream.
//!
//! Layout: `stored` valid bytes end just before `head` (wrapping). Window
//! index 0 is the oldest stored byte; `read_cursor` is the window index of
//! the next byte to hand out. Bytes in `read_cursor..stored` were fetched
//! but not yet delivered (after a backward seek or a read-ahead).

use crate::types::StreamError;

/// Sliding backtrack window used by [`SeekEmulatingStream`](super::SeekEmulatingStream).
#[derive(Debug, Clone)]
pub struct BacktrackBuffer {
    data: Vec<u8>,
    head: usize,
    stored: usize,
    read_cursor: usize,
}

impl BacktrackBuffer {
    pub fn with_capacity(capacity: usize) -> Result<Self, StreamError> {
        if capacity == 0 {
            return Err(StreamError::Validation("backtrack capacity must be non-zero".into()));
        }
        Ok(Self {
            data: vec![0u8; capacity],
            head: 0,
            stored: 0,
            read_cursor: 0,
        })
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Valid bytes currently held (≤ capacity).
    pub fn stored(&self) -> usize {
        self.stored
    }

    pub fn read_cursor(&self) -> usize {
        self.read_cursor
    }

    /// Buffered bytes not yet handed out.
    pub fn unread(&self) -> usize {
        self.stored - self.read_cursor
    }

    pub fn is_full(&self) -> bool {
        self.stored == self.data.len()
    }

    /// Physical index of window index 0.
    fn start(&self) -> usize {
        let cap = self.data.len();
        (self.head + cap - self.stored) % cap
    }

    /// Copy unread bytes into `out`, advancing the cursor. Returns bytes copied.
    pub fn read_unread(&mut self, out: &mut [u8]) -> usize {
        let n = out.len().min(self.unread());
        if n == 0 {
            return 0;
        }

        let cap = self.data.len();
        let from = (self.start() + self.read_cursor) % cap;
        let first = n.min(cap - from);
        out[..first].copy_from_slice(&self.data[from..from + first]);
        out[first..n].copy_from_slice(&self.data[..n - first]);

        self.read_cursor += n;
        n
    }

    /// Append bytes at the newest end, evicting the oldest once full.
    ///
    /// The cursor keeps pointing at the same logical byte; if that byte was
    /// evicted it clamps to the oldest retained byte. Returns bytes evicted.
    pub fn push(&mut self, bytes: &[u8]) -> usize {
        let cap = self.data.len();
        let total = self.stored + bytes.len();
        let evicted = total.saturating_sub(cap);

        if bytes.len() >= cap {
            // Only the tail survives; lay it out from index 0.
            self.data.copy_from_slice(&bytes[bytes.len() - cap..]);
            self.head = 0;
        } else {
            let first = bytes.len().min(cap - self.head);
            self.data[self.head..self.head + first].copy_from_slice(&bytes[..first]);
            self.data[..bytes.len() - first].copy_from_slice(&bytes[first..]);
            self.head = (self.head + bytes.len()) % cap;
        }

        self.stored = total.min(cap);
        self.read_cursor = self.read_cursor.saturating_sub(evicted);
        evicted
    }

    /// Move the cursor back `distance` bytes. Fails without moving if the
    /// history does not reach that far.
    pub fn rewind(&mut self, distance: usize) -> bool {
        if distance > self.read_cursor {
            return false;
        }
        self.read_cursor -= distance;
        true
    }

    /// Skip up to `distance` unread bytes; returns how many were skipped.
    pub fn advance(&mut self, distance: usize) -> usize {
        let n = distance.min(self.unread());
        self.read_cursor += n;
        n
    }

    /// Place the cursor at window index `index` (≤ stored).
    pub fn set_cursor(&mut self, index: usize) -> bool {
        if index > self.stored {
            return false;
        }
        self.read_cursor = index;
        true
    }

    /// Treat everything stored as delivered.
    pub fn mark_all_read(&mut self) {
        self.read_cursor = self.stored;
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.stored = 0;
        self.read_cursor = 0;
    }
}
