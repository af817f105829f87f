//! Throughput benchmarks for the linefold pipeline.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use linefold::channel::BoundedChannel;
use linefold::config::PipelineConfig;
use linefold::error::Result;
use linefold::pipeline::Pipeline;
use linefold::stage::{IterSource, LineSink, fold_markers};
use std::hint::black_box;
use std::thread;

/// A sink that just counts lines.
struct CountSink {
    lines: u64,
}

impl LineSink for CountSink {
    fn write_line(&mut self, line: &str) -> Result<()> {
        black_box(line);
        self.lines += 1;
        Ok(())
    }
}

fn input(lines: usize) -> Vec<String> {
    (0..lines)
        .map(|i| format!("line {} has a few ++ markers +++ in it\n", i))
        .collect()
}

fn bench_channel(c: &mut Criterion) {
    let mut group = c.benchmark_group("channel");
    const ITEMS: u64 = 10_000;
    group.throughput(Throughput::Elements(ITEMS));

    for capacity in [1usize, 8, 50, 512] {
        group.bench_with_input(
            BenchmarkId::new("push_pop", capacity),
            &capacity,
            |b, &capacity| {
                b.iter(|| {
                    let channel = BoundedChannel::new(capacity);
                    thread::scope(|s| {
                        s.spawn(|| {
                            for i in 0..ITEMS {
                                channel.push(i).unwrap();
                            }
                            channel.close();
                        });
                        let mut sum = 0u64;
                        while let Some(i) = channel.pop().unwrap() {
                            sum += i;
                        }
                        black_box(sum)
                    })
                });
            },
        );
    }
    group.finish();
}

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");
    let lines = input(5_000);
    group.throughput(Throughput::Elements(lines.len() as u64));

    for capacity in [1usize, 50] {
        group.bench_with_input(
            BenchmarkId::new("end_to_end", capacity),
            &capacity,
            |b, &capacity| {
                b.iter(|| {
                    let config = PipelineConfig::default()
                        .with_capacity(capacity)
                        .without_stop_sentinel();
                    let report = Pipeline::new(config)
                        .unwrap()
                        .run(IterSource::new(lines.clone()), CountSink { lines: 0 })
                        .unwrap();
                    black_box(report.lines_written())
                });
            },
        );
    }
    group.finish();
}

fn bench_fold(c: &mut Criterion) {
    let line = "a++b+++c++++d".repeat(64);
    c.bench_function("fold_markers", |b| {
        b.iter(|| fold_markers(black_box(&line), '+', '^'))
    });
}

criterion_group!(benches, bench_channel, bench_pipeline, bench_fold);
criterion_main!(benches);
