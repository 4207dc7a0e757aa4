/*!
 * Hand-off Benchmarks
 *
 * Whole-buffer channel copies, from a warm private buffer and from one that
 * was just given an eviction hint
 */

use anti_lru::memory::{EvictionHint, PrivateBuffer};
use anti_lru::stage::{Doubling, Transform};
use anti_lru::SharedChannel;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

const SIZES: [usize; 3] = [64 * 1024, 1024 * 1024, 10 * 1024 * 1024];

fn bench_publish(c: &mut Criterion) {
    let mut group = c.benchmark_group("publish");

    for bytes in SIZES {
        group.throughput(Throughput::Bytes(bytes as u64));
        let mut channel = SharedChannel::map(0, bytes).unwrap();
        let message = PrivateBuffer::filled(bytes, 1).unwrap();

        group.bench_with_input(BenchmarkId::new("warm", bytes), &bytes, |b, _| {
            b.iter(|| channel.write(black_box(&message)).unwrap());
        });

        for hint in [EvictionHint::Cold, EvictionHint::Pageout] {
            group.bench_with_input(BenchmarkId::new(hint.as_str(), bytes), &bytes, |b, _| {
                b.iter(|| {
                    // Kernels without the advice fall back to a warm copy.
                    let _ = message.advise(hint);
                    channel.write(black_box(&message)).unwrap();
                });
            });
        }
    }

    group.finish();
}

fn bench_receive_and_transform(c: &mut Criterion) {
    let mut group = c.benchmark_group("receive_transform");

    for bytes in SIZES {
        group.throughput(Throughput::Bytes(bytes as u64));
        let mut channel = SharedChannel::map(0, bytes).unwrap();
        channel.write(&vec![1; channel.words()]).unwrap();
        let mut buffer = PrivateBuffer::zeroed(bytes).unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(bytes), &bytes, |b, _| {
            b.iter(|| {
                channel.read_into(&mut buffer).unwrap();
                Doubling.apply(black_box(&mut buffer));
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_publish, bench_receive_and_transform);
criterion_main!(benches);
