//! Throughput benchmarks

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use serialbridge_core::core::reader::{share, LineReader, ReaderConfig};
use serialbridge_core::core::simulator::SimulatedDevices;
use serialbridge_core::{DeviceProvider, MessageTag, OutputSink};
use std::sync::mpsc;
use std::time::Duration;

fn output_benchmark(c: &mut Criterion) {
    let line = "temperature=21.5 humidity=40 pressure=1013";

    let mut group = c.benchmark_group("output");
    group.throughput(Throughput::Elements(1000));

    group.bench_function("append_1000", |b| {
        b.iter(|| {
            let sink = OutputSink::new();
            for _ in 0..1000 {
                sink.append(black_box(line), MessageTag::Received);
            }
            black_box(sink.len())
        })
    });

    group.bench_function("render_1000", |b| {
        let sink = OutputSink::new();
        for _ in 0..1000 {
            sink.append(line, MessageTag::Received);
        }
        b.iter(|| black_box(sink.text()))
    });

    group.finish();
}

fn reader_benchmark(c: &mut Criterion) {
    const LINES: usize = 1000;
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let config = ReaderConfig {
        read_timeout: Duration::from_millis(5),
        poll_interval: Duration::ZERO,
    };

    let mut group = c.benchmark_group("reader");
    group.throughput(Throughput::Elements(LINES as u64));

    group.bench_function("simulated_1000_lines", |b| {
        b.to_async(&runtime).iter(|| async {
            let devices = SimulatedDevices::new();
            let state = devices.device("bench0");
            for n in 0..LINES {
                state.push_line(&format!("line {}", n));
            }
            let device = devices.open("bench0", 115200, config.read_timeout).unwrap();

            let (tx, rx) = mpsc::channel();
            let reader = LineReader::start(1, share(device), config, move |line| {
                let _ = tx.send(line);
            }, |_| {});
            for _ in 0..LINES {
                black_box(rx.recv_timeout(Duration::from_secs(5)).unwrap());
            }
            reader.join().await.unwrap();
        })
    });

    group.finish();
}

criterion_group!(benches, output_benchmark, reader_benchmark);
criterion_main!(benches);
