use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use encoding_filter::{ConvertEncodingFilter, EncodingRsBackend, FeedOutcome};
use encoding_rs::SHIFT_JIS;
use std::hint::black_box;
use std::sync::Arc;

const LINE: &str = "2024-01-05,東京都千代田区,ソース（濃口）,3,1980\n";
const LINES: usize = 20_000;

fn sjis_input() -> Vec<u8> {
    let text = LINE.repeat(LINES);
    SHIFT_JIS.encode(&text).0.into_owned()
}

fn run(input: &[u8], chunk_size: usize, from: &str) -> usize {
    let mut filter =
        ConvertEncodingFilter::new(from, "UTF-8", Arc::new(EncodingRsBackend::new()));
    let mut produced = 0;
    for chunk in input.chunks(chunk_size) {
        if let FeedOutcome::Produced(bytes) = filter.feed(chunk).unwrap() {
            produced += bytes.len();
        }
    }
    produced
}

fn chunk_size_benchmark(c: &mut Criterion) {
    let input = sjis_input();
    let mut group = c.benchmark_group("sjis_to_utf8");
    group.throughput(Throughput::Bytes(input.len() as u64));

    for chunk_size in [7, 512, 8192] {
        group.bench_function(format!("chunk_{chunk_size}"), |b| {
            b.iter(|| black_box(run(black_box(&input), chunk_size, "Shift_JIS")))
        });
    }
    group.finish();
}

fn auto_detect_benchmark(c: &mut Criterion) {
    let input = sjis_input();
    c.bench_function("auto_detect_8192", |b| {
        b.iter(|| black_box(run(black_box(&input), 8192, "auto")))
    });
}

criterion_group!(benches, chunk_size_benchmark, auto_detect_benchmark);
criterion_main!(benches);
