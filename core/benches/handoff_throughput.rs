use std::io::{Cursor, Read, Seek, SeekFrom};
use std::thread;

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use bytestream_core::stream::{
    CloseMode, HandoffConfig, HandoffStream, SeekEmulatingStream, segment_channel,
};

const TOTAL: usize = 4 * 1024 * 1024;

fn handoff_pipe(c: &mut Criterion) {
    let inputs = [("chunk_4k", 4 * 1024), ("chunk_64k", 64 * 1024)];

    for (name, chunk_size) in inputs.iter() {
        let chunk = Bytes::from(vec![0xA5u8; *chunk_size]);
        let mut group = c.benchmark_group(format!("handoff/{name}"));
        group.throughput(Throughput::Bytes(TOTAL as u64));

        for (label, config) in [
            ("auto_flush", HandoffConfig::default()),
            ("fire_and_forget", HandoffConfig::fire_and_forget()),
        ] {
            let chunk = chunk.clone();
            group.bench_function(label, move |b| {
                b.iter(|| {
                    let h = HandoffStream::with_config(config);
                    thread::scope(|s| {
                        let writer = h.clone();
                        let chunk = chunk.clone();
                        s.spawn(move || {
                            for _ in 0..TOTAL / chunk.len() {
                                writer.write_chunk(chunk.clone()).expect("write");
                            }
                            writer.close_with(CloseMode::Graceful).expect("close");
                        });

                        let mut buf = vec![0u8; 16 * 1024];
                        let mut seen = 0usize;
                        while let Ok(n) = h.read_into(&mut buf) {
                            if n == 0 {
                                break;
                            }
                            seen += n;
                        }
                        black_box(seen)
                    })
                });
            });
        }

        group.finish();
    }
}

fn segment_channel_pipe(c: &mut Criterion) {
    let mut group = c.benchmark_group("segment_channel");
    group.throughput(Throughput::Bytes(TOTAL as u64));

    group.bench_function("segments_16k", |b| {
        let segment = Bytes::from(vec![0x5Au8; 16 * 1024]);
        b.iter(|| {
            let (mut tx, mut stream) = segment_channel(8).expect("channel");
            thread::scope(|s| {
                let segment = segment.clone();
                s.spawn(move || {
                    for _ in 0..TOTAL / segment.len() {
                        tx.send(segment.clone()).expect("send");
                    }
                });

                let mut out = Vec::with_capacity(TOTAL);
                stream.read_to_end(&mut out).expect("read");
                black_box(out.len())
            })
        });
    });

    group.finish();
}

fn seek_replay(c: &mut Criterion) {
    let data: Vec<u8> = (0..TOTAL).map(|i| i as u8).collect();
    let mut group = c.benchmark_group("seek_emulation");
    group.throughput(Throughput::Bytes(TOTAL as u64));

    group.bench_function("read_rewind_reread", |b| {
        b.iter(|| {
            let mut s = SeekEmulatingStream::new(Cursor::new(&data[..]), 64 * 1024).expect("stream");
            let mut buf = vec![0u8; 32 * 1024];
            loop {
                let n = s.read(&mut buf).expect("read");
                if n == 0 {
                    break;
                }
                if n == buf.len() {
                    s.seek(SeekFrom::Current(-(n as i64) / 2)).expect("seek");
                    s.read_exact(&mut buf[..n / 2]).expect("reread");
                }
            }
            black_box(s.position())
        });
    });

    group.finish();
}

criterion_group!(benches, handoff_pipe, segment_channel_pipe, seek_replay);
criterion_main!(benches);
