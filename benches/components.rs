//! Component-level microbenchmarks: DEFLATE, checksums, and the full
//! PNG encode/decode pipelines.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pngine::compress::{adler32, crc32, deflate, zlib_compress, CompressSettings};
use pngine::decode::inflate;
use pngine::{decode32, encode32};

fn make_pattern(len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(len);
    let pattern = b"The quick brown fox jumps over the lazy dog. ";
    while out.len() < len {
        out.extend_from_slice(pattern);
    }
    out.truncate(len);
    out
}

fn make_random(len: usize, mut seed: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(len);
    while out.len() < len {
        seed = seed.wrapping_mul(1664525).wrapping_add(1013904223);
        out.push((seed >> 16) as u8);
    }
    out
}

fn make_gradient_rgba(w: u32, h: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity((w * h * 4) as usize);
    for y in 0..h {
        for x in 0..w {
            out.push((x & 0xFF) as u8);
            out.push((y & 0xFF) as u8);
            out.push(((x + y) & 0xFF) as u8);
            out.push(255);
        }
    }
    out
}

fn bench_checksums(c: &mut Criterion) {
    let data = make_random(1 << 20, 1);

    let mut group = c.benchmark_group("checksums");
    group.throughput(Throughput::Bytes(data.len() as u64));
    group.bench_function("adler32_1mb", |b| b.iter(|| adler32(black_box(&data))));
    group.bench_function("crc32_1mb", |b| b.iter(|| crc32(black_box(&data))));
    group.finish();
}

fn bench_deflate(c: &mut Criterion) {
    let settings = CompressSettings::default();
    let mut group = c.benchmark_group("deflate");

    for (name, data) in [
        ("text_256k", make_pattern(256 * 1024)),
        ("random_256k", make_random(256 * 1024, 7)),
        ("zeros_256k", vec![0u8; 256 * 1024]),
    ] {
        group.throughput(Throughput::Bytes(data.len() as u64));
        group.bench_with_input(BenchmarkId::new("deflate", name), &data, |b, data| {
            b.iter(|| deflate(black_box(data), &settings).unwrap())
        });

        let compressed = zlib_compress(&data, &settings).unwrap();
        group.bench_with_input(
            BenchmarkId::new("inflate", name),
            &compressed[2..compressed.len() - 4].to_vec(),
            |b, data| b.iter(|| inflate(black_box(data)).unwrap()),
        );
    }
    group.finish();
}

fn bench_png_pipeline(c: &mut Criterion) {
    let (w, h) = (512u32, 512u32);
    let pixels = make_gradient_rgba(w, h);
    let png = encode32(&pixels, w, h).unwrap();

    let mut group = c.benchmark_group("png");
    group.throughput(Throughput::Bytes(pixels.len() as u64));
    group.bench_function("encode_512x512", |b| {
        b.iter(|| encode32(black_box(&pixels), w, h).unwrap())
    });
    group.bench_function("decode_512x512", |b| {
        b.iter(|| decode32(black_box(&png)).unwrap())
    });
    group.finish();
}

criterion_group!(benches, bench_checksums, bench_deflate, bench_png_pipeline);
criterion_main!(benches);
