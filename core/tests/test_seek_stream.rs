#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::io::{self, Cursor, Read, Seek, SeekFrom};

    use proptest::prelude::*;
    use bytestream_core::{
        constants::MAX_BACKTRACK_CAPACITY,
        stream::{ByteStream, SeekConfig, SeekEmulatingStream, StreamCapabilities},
        types::{ErrorClass, StreamError},
    };

    // ------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------

    fn digits(capacity: usize) -> SeekEmulatingStream<Cursor<Vec<u8>>> {
        SeekEmulatingStream::new(Cursor::new(b"0123456789".to_vec()), capacity).unwrap()
    }

    fn read_to_vec<R: Read>(r: &mut R) -> Vec<u8> {
        let mut out = Vec::new();
        r.read_to_end(&mut out).unwrap();
        out
    }

    /// Hands out at most `step` bytes per read.
    struct Trickle {
        data: Vec<u8>,
        pos: usize,
        step: usize,
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = buf.len().min(self.step).min(self.data.len() - self.pos);
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    /// Yields `prefix`, then fails every read.
    struct FailsAfter {
        prefix: Cursor<Vec<u8>>,
    }

    impl Read for FailsAfter {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.prefix.read(buf)? {
                0 => Err(io::Error::new(io::ErrorKind::ConnectionReset, "source went away")),
                n => Ok(n),
            }
        }
    }

    /// Plays back a fixed script of reads, then reports end of source.
    struct Scripted {
        steps: VecDeque<io::Result<Vec<u8>>>,
    }

    impl Scripted {
        fn new(steps: Vec<io::Result<Vec<u8>>>) -> Self {
            Self { steps: steps.into() }
        }
    }

    impl Read for Scripted {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.steps.pop_front() {
                None => Ok(0),
                Some(Err(e)) => Err(e),
                Some(Ok(mut chunk)) => {
                    let n = buf.len().min(chunk.len());
                    buf[..n].copy_from_slice(&chunk[..n]);
                    if n < chunk.len() {
                        self.steps.push_front(Ok(chunk.split_off(n)));
                    }
                    Ok(n)
                }
            }
        }
    }

    // ------------------------------------------------------------
    // Scenarios
    // ------------------------------------------------------------

    #[test]
    fn digits_capacity_four_backtrack_scenario() {
        let mut s = digits(4);
        assert_eq!(read_to_vec(&mut s), b"0123456789");
        assert_eq!(s.position(), 10);

        assert_eq!(s.try_seek(SeekFrom::Current(-4)).unwrap(), 6);
        let mut out = [0u8; 4];
        s.read_exact(&mut out).unwrap();
        assert_eq!(&out, b"6789");

        let err = s.try_seek(SeekFrom::Current(-5)).unwrap_err();
        assert!(matches!(err, StreamError::BacktrackExhausted { requested: 5, available: 4 }));
        assert_eq!(err.class(), ErrorClass::UnsupportedCapability);
        // A failed backward seek does not move the stream.
        assert_eq!(s.position(), 10);

        let c = s.counters();
        assert_eq!(c.bytes_read, 14);
        assert_eq!(c.bytes_replayed, 4);
        assert_eq!(c.seeks_backward, 1);
        assert_eq!(c.seek_failures, 1);
    }

    #[test]
    fn forward_seek_reads_ahead_and_discards() {
        let mut s = digits(4);
        assert_eq!(s.try_seek(SeekFrom::Start(5)).unwrap(), 5);
        assert_eq!(read_to_vec(&mut s), b"56789");
        assert_eq!(s.counters().bytes_skipped, 5);
        assert_eq!(s.counters().seeks_forward, 1);
    }

    #[test]
    fn forward_seek_consumes_replay_window_first() {
        let mut s = digits(8);
        let mut head = [0u8; 6];
        s.read_exact(&mut head).unwrap();
        s.try_seek(SeekFrom::Start(1)).unwrap();

        // 1..6 is buffered; only 6..8 has to come from the source.
        assert_eq!(s.try_seek(SeekFrom::Start(8)).unwrap(), 8);
        assert_eq!(s.counters().bytes_skipped, 2);
        assert_eq!(read_to_vec(&mut s), b"89");
    }

    #[test]
    fn forward_seek_past_end_is_distinct_failure() {
        let mut s = digits(4);
        let err = s.try_seek(SeekFrom::Start(20)).unwrap_err();
        assert!(matches!(err, StreamError::PastEndOfSource { target: 20, end: 10 }));
        assert_eq!(s.position(), 10);

        // The window still holds the tail of the source.
        assert_eq!(s.try_seek(SeekFrom::Start(7)).unwrap(), 7);
        assert_eq!(read_to_vec(&mut s), b"789");
    }

    #[test]
    fn seek_from_end_within_window() {
        let mut s = digits(4);
        assert_eq!(s.try_seek(SeekFrom::End(-3)).unwrap(), 7);
        assert_eq!(read_to_vec(&mut s), b"789");
        assert_eq!(s.try_seek(SeekFrom::End(0)).unwrap(), 10);
    }

    #[test]
    fn seek_from_end_outside_window_fails() {
        let mut s = digits(4);
        let err = s.try_seek(SeekFrom::End(-5)).unwrap_err();
        assert!(matches!(err, StreamError::BacktrackExhausted { .. }));
        // Position 0 was evicted while reading ahead; the stream parks at the end.
        assert_eq!(s.position(), 10);

        let err = s.try_seek(SeekFrom::End(1)).unwrap_err();
        assert!(matches!(err, StreamError::PastEndOfSource { target: 11, end: 10 }));
    }

    #[test]
    fn seek_from_end_failure_keeps_position_still_in_window() {
        let mut s = SeekEmulatingStream::new(Cursor::new(b"abcdef".to_vec()), 16).unwrap();
        let mut two = [0u8; 2];
        s.read_exact(&mut two).unwrap();

        assert!(s.try_seek(SeekFrom::End(3)).is_err());
        assert_eq!(s.position(), 2);
        assert_eq!(read_to_vec(&mut s), b"cdef");
    }

    #[test]
    fn negative_target_is_invalid() {
        let mut s = digits(4);
        let err = s.try_seek(SeekFrom::Current(-1)).unwrap_err();
        assert!(matches!(err, StreamError::InvalidSeek));
        assert_eq!(err.class(), ErrorClass::Invalid);
    }

    #[test]
    fn zero_length_read_returns_zero() {
        let mut s = digits(4);
        assert_eq!(s.try_read(&mut []).unwrap(), 0);
        assert_eq!(s.position(), 0);
    }

    #[test]
    fn std_seek_surfaces_typed_error() {
        let mut s = digits(2);
        read_to_vec(&mut s);

        let err = Seek::seek(&mut s, SeekFrom::Current(-3)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
        assert!(matches!(
            StreamError::from_io(err),
            StreamError::BacktrackExhausted { requested: 3, available: 2 }
        ));
        assert_eq!(s.stream_position().unwrap(), 10);
    }

    #[test]
    fn trickling_source_is_reassembled() {
        let data: Vec<u8> = (0..100u8).collect();
        let src = Trickle { data: data.clone(), pos: 0, step: 3 };
        let mut s = SeekEmulatingStream::new(src, 16).unwrap();

        s.try_seek(SeekFrom::Start(40)).unwrap();
        let mut ten = [0u8; 10];
        s.read_exact(&mut ten).unwrap();
        assert_eq!(&ten[..], &data[40..50]);

        s.try_seek(SeekFrom::Current(-16)).unwrap();
        assert_eq!(read_to_vec(&mut s), &data[34..]);
    }

    #[test]
    fn source_error_is_deferred_behind_replayed_bytes() {
        let src = FailsAfter { prefix: Cursor::new(b"abc".to_vec()) };
        let mut s = SeekEmulatingStream::new(src, 8).unwrap();

        let mut three = [0u8; 3];
        s.read_exact(&mut three).unwrap();
        s.try_seek(SeekFrom::Start(0)).unwrap();

        let mut buf = [0u8; 10];
        assert_eq!(s.try_read(&mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], b"abc");

        let err = s.try_read(&mut buf).unwrap_err();
        assert_eq!(err.class(), ErrorClass::Source);
    }

    #[test]
    fn transient_source_error_is_reported_once() {
        let src = Scripted::new(vec![
            Ok(b"abc".to_vec()),
            Err(io::Error::new(io::ErrorKind::TimedOut, "slow source")),
            Ok(b"def".to_vec()),
        ]);
        let mut s = SeekEmulatingStream::new(src, 8).unwrap();

        let mut three = [0u8; 3];
        s.read_exact(&mut three).unwrap();
        s.try_seek(SeekFrom::Start(0)).unwrap();

        let mut buf = [0u8; 10];
        assert_eq!(s.try_read(&mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], b"abc");

        match s.try_read(&mut buf) {
            Err(StreamError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::TimedOut),
            other => panic!("expected the deferred timeout, got {other:?}"),
        }
        assert_eq!(s.position(), 3);

        assert_eq!(s.try_read(&mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], b"def");
        assert_eq!(s.try_read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn failed_read_ahead_for_end_seek_does_not_skip_bytes() {
        let src = Scripted::new(vec![
            Ok(b"01234567".to_vec()),
            Ok(b"89".to_vec()),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "gone")),
        ]);
        let mut s = SeekEmulatingStream::new(src, 4).unwrap();

        let mut eight = [0u8; 8];
        s.read_exact(&mut eight).unwrap();
        assert_eq!(s.try_seek(SeekFrom::Start(4)).unwrap(), 4);

        let err = s.try_seek(SeekFrom::End(0)).unwrap_err();
        assert_eq!(err.class(), ErrorClass::Source);
        assert_eq!(s.counters().seek_failures, 1);

        // Byte 4 was evicted by the read-ahead, so the stream parks at the
        // end of what it consumed instead of resuming mid-window.
        assert_eq!(s.position(), 10);
        assert_eq!(s.underlying_position(), 10);
        assert_eq!(read_to_vec(&mut s), b"");
    }

    #[test]
    fn failed_read_ahead_for_end_seek_keeps_surviving_position() {
        let src = Scripted::new(vec![
            Ok(b"abcd".to_vec()),
            Ok(b"ef".to_vec()),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "gone")),
        ]);
        let mut s = SeekEmulatingStream::new(src, 16).unwrap();

        let mut two = [0u8; 2];
        s.read_exact(&mut two).unwrap();

        assert!(s.try_seek(SeekFrom::End(0)).is_err());
        assert_eq!(s.position(), 2);
        let mut rest = [0u8; 4];
        s.read_exact(&mut rest).unwrap();
        assert_eq!(&rest, b"cdef");
    }

    #[test]
    fn close_clears_window_and_rejects_seek() {
        let mut s = digits(4);
        let mut two = [0u8; 2];
        s.read_exact(&mut two).unwrap();

        ByteStream::close(&mut s).unwrap();
        ByteStream::close(&mut s).unwrap();
        assert_eq!(s.window_len(), 0);
        assert_eq!(s.try_read(&mut two).unwrap(), 0);
        assert!(matches!(s.try_seek(SeekFrom::Start(0)), Err(StreamError::Closed(_))));
    }

    #[test]
    fn byte_stream_contract() {
        let mut s = digits(4);
        assert_eq!(
            s.capabilities(),
            StreamCapabilities::READ | StreamCapabilities::SEEK | StreamCapabilities::ASYNC
        );
        assert!(!s.capabilities().contains(StreamCapabilities::WRITE));

        let err = s.write_bytes(b"x").unwrap_err();
        assert_eq!(err.class(), ErrorClass::UnsupportedCapability);

        assert_eq!(s.read_byte().unwrap(), Some(b'0'));
        assert_eq!(s.seek_to(SeekFrom::Start(9)).unwrap(), 9);
        assert_eq!(s.read_byte().unwrap(), Some(b'9'));
        assert_eq!(s.read_byte().unwrap(), None);
    }

    #[test]
    fn async_twins_match_blocking_calls() {
        let mut s = digits(4);
        let mut buf = [0u8; 10];
        let n = pollster::block_on(s.read_async(&mut buf)).unwrap();
        assert_eq!(n, 10);
        assert_eq!(pollster::block_on(s.seek_async(SeekFrom::End(-2))).unwrap(), 8);
        pollster::block_on(s.close_async());
        assert_eq!(s.try_read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn capacity_is_validated() {
        let src = || Cursor::new(Vec::<u8>::new());
        assert!(matches!(SeekEmulatingStream::new(src(), 0), Err(StreamError::Validation(_))));
        assert!(matches!(
            SeekEmulatingStream::new(src(), MAX_BACKTRACK_CAPACITY + 1),
            Err(StreamError::Validation(_))
        ));

        let bad = SeekConfig { backtrack_capacity: 8, skip_chunk_size: 0 };
        assert!(SeekEmulatingStream::with_config(src(), bad).is_err());
        assert!(SeekEmulatingStream::with_config(src(), SeekConfig::default()).is_ok());
    }

    #[test]
    fn into_inner_returns_source_at_underlying_position() {
        let mut s = digits(4);
        let mut three = [0u8; 3];
        s.read_exact(&mut three).unwrap();
        assert_eq!(s.get_ref().position(), 3);
        assert_eq!(s.underlying_position(), 3);
        assert_eq!(s.backtrack_available(), 3);
        assert_eq!(s.capacity(), 4);
        let inner = s.into_inner();
        assert_eq!(inner.into_inner(), b"0123456789");
    }

    // ------------------------------------------------------------
    // Properties
    // ------------------------------------------------------------

    proptest! {
        #[test]
        fn prop_backtrack_bound(
            data in proptest::collection::vec(any::<u8>(), 1..256),
            capacity in 1usize..64,
            k_frac in 0.0f64..=1.0,
            d in 0usize..80,
        ) {
            let k = ((data.len() as f64) * k_frac) as usize;
            let mut s = SeekEmulatingStream::new(Cursor::new(data.clone()), capacity).unwrap();
            let mut head = vec![0u8; k];
            s.read_exact(&mut head).unwrap();

            let result = s.try_seek(SeekFrom::Current(-(d as i64)));
            if d <= k.min(capacity) {
                prop_assert_eq!(result.unwrap(), (k - d) as u64);
                let mut again = vec![0u8; d];
                s.read_exact(&mut again).unwrap();
                prop_assert_eq!(&again[..], &data[k - d..k]);
            } else if d > k {
                prop_assert!(matches!(result, Err(StreamError::InvalidSeek)));
            } else {
                let is_exhausted = matches!(result, Err(StreamError::BacktrackExhausted { .. }));
                prop_assert!(is_exhausted);
                prop_assert_eq!(s.position(), k as u64);
            }
        }

        #[test]
        fn prop_forward_seek_matches_uninterrupted_read(
            data in proptest::collection::vec(any::<u8>(), 0..512),
            capacity in 1usize..32,
            skip_frac in 0.0f64..=1.0,
            step in 1usize..17,
        ) {
            let skip = ((data.len() as f64) * skip_frac) as usize;
            let src = Trickle { data: data.clone(), pos: 0, step };
            let config = SeekConfig { backtrack_capacity: capacity, skip_chunk_size: 7 };
            let mut s = SeekEmulatingStream::with_config(src, config).unwrap();

            prop_assert_eq!(s.try_seek(SeekFrom::Start(skip as u64)).unwrap(), skip as u64);
            prop_assert_eq!(read_to_vec(&mut s), data[skip..].to_vec());
        }
    }
}
