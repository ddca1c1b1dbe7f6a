use std::collections::VecDeque;
use bytes::{Buf, Bytes};

/// Copy as many queued bytes as fit into `out`, front to back.
///
/// Fully consumed chunks are popped; a partially consumed chunk stays at the
/// front with its cursor advanced. Returns the number of bytes copied.
pub fn drain_chunks(queue: &mut VecDeque<Bytes>, out: &mut [u8]) -> usize {
    let mut copied = 0;

    while copied < out.len() {
        let Some(front) = queue.front_mut() else {
            break;
        };
        let n = front.len().min(out.len() - copied);
        out[copied..copied + n].copy_from_slice(&front[..n]);
        front.advance(n);
        copied += n;

        if front.is_empty() {
            queue.pop_front();
        }
    }

    copied
}

