use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use std::time::Duration;
use uart_engine::port::{default_config, MockDevice, MockHandle};
use uart_engine::{PortEngine, Readiness};

fn mock_engine() -> (PortEngine, MockHandle) {
    let device = MockDevice::new("BENCH0");
    let handle = device.handle();
    let mut engine = PortEngine::new(
        |done| {
            black_box(done);
        },
        |done| {
            black_box(done);
        },
    );
    engine
        .open_device(Box::new(device), &default_config().with_active(false))
        .unwrap();
    (engine, handle)
}

pub fn bench_write_path(c: &mut Criterion) {
    let mut group = c.benchmark_group("write");
    for size in [16usize, 256, 4096] {
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_with_input(BenchmarkId::new("immediate", size), &size, |b, &size| {
            let (mut engine, handle) = mock_engine();
            b.iter(|| {
                engine.write(vec![b'a'; size], None);
                black_box(handle.take_written());
            });
        });

        group.bench_with_input(BenchmarkId::new("throttled", size), &size, |b, &size| {
            let (mut engine, handle) = mock_engine();
            b.iter(|| {
                handle.set_write_capacity(Some(8));
                engine.write(vec![b'a'; size], None);
                while engine.has_pending_write() {
                    handle.grant_write_capacity(8);
                    engine.process(Readiness::writable());
                }
                black_box(handle.take_written());
            });
        });
    }
    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .warm_up_time(Duration::from_millis(300))
        .measurement_time(Duration::from_secs(2));
    targets = bench_write_path
}
criterion_main!(benches);
