//! Microbenchmarks for latest-value extraction.
//!
//! Measures the streaming scan over archives of realistic sizes, from memory
//! and from disk, and compares it with the mapped reader.
//!
//! Run with: `cargo bench -p whisper-latest -- latest`

#![allow(missing_docs, clippy::cast_possible_truncation)]

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use tempfile::tempdir;
use whisper_latest::latest::extract_latest;
use whisper_latest::reader::BinaryReader;
use whisper_latest::{MappedWhisper, latest_in_file};

/// Encodes one archive of `points` slots at 60s resolution, wrapped so the
/// newest sample sits in the middle of the buffer.
fn encode_file(points: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(28 + points as usize * 12);
    for word in [1u32, 60 * points, 0.5f32.to_bits(), 1, 28, 60, points] {
        out.extend_from_slice(&word.to_be_bytes());
    }
    let base = 1_700_000_000u32;
    let newest_slot = points / 2;
    for slot in 0..points {
        let age = (newest_slot + points - slot) % points;
        let interval = base - age * 60;
        out.extend_from_slice(&interval.to_be_bytes());
        out.extend_from_slice(&f64::from(slot).to_bits().to_be_bytes());
    }
    out
}

fn bench_extract_in_memory(c: &mut Criterion) {
    let mut group = c.benchmark_group("latest/in_memory");

    // 1 day, 1 week, and 1 year of minutely points.
    for points in [1_440u32, 10_080, 525_600] {
        let bytes = encode_file(points);
        let slots = &bytes[28..];

        group.throughput(Throughput::Bytes(slots.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(points), &points, |b, &points| {
            b.iter(|| {
                let mut reader = BinaryReader::new(black_box(slots));
                extract_latest(&mut reader, points).unwrap()
            });
        });
    }

    group.finish();
}

fn bench_latest_from_disk(c: &mut Criterion) {
    let mut group = c.benchmark_group("latest/file");
    let dir = tempdir().unwrap();

    for points in [1_440u32, 525_600] {
        let path = dir.path().join(format!("m{points}.wsp"));
        std::fs::write(&path, encode_file(points)).unwrap();

        group.bench_with_input(BenchmarkId::new("buffered", points), &path, |b, path| {
            b.iter(|| latest_in_file(black_box(path)).unwrap());
        });

        group.bench_with_input(BenchmarkId::new("mapped", points), &path, |b, path| {
            b.iter(|| {
                let mapped = MappedWhisper::open(black_box(path)).unwrap();
                mapped.latest(0).unwrap()
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_extract_in_memory, bench_latest_from_disk);
criterion_main!(benches);
