//! # Event Channel Benchmark
//!
//! Push/read throughput with several readers draining every frame.

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ember_core::{EventChannel, RingBuffer};

const EVENTS_PER_FRAME: u64 = 1_000;

fn bench_ring_buffer(c: &mut Criterion) {
    c.bench_function("ring_buffer_push_pop_1K", |b| {
        let mut ring = RingBuffer::with_capacity(64);
        b.iter(|| {
            for i in 0..EVENTS_PER_FRAME {
                ring.push(i);
            }
            let mut sum = 0u64;
            while let Some(v) = ring.pop() {
                sum += v;
            }
            black_box(sum)
        });
    });
}

fn bench_broadcast(c: &mut Criterion) {
    c.bench_function("channel_4_readers_1K_per_frame", |b| {
        let mut channel = EventChannel::new();
        let mut readers: Vec<_> = (0..4).map(|_| channel.create_reader()).collect();
        b.iter(|| {
            for i in 0..EVENTS_PER_FRAME {
                channel.push(i);
            }
            let mut seen = 0usize;
            for reader in &mut readers {
                seen += channel.read(reader).count();
            }
            black_box(seen)
        });
    });
}

criterion_group!(benches, bench_ring_buffer, bench_broadcast);
criterion_main!(benches);
