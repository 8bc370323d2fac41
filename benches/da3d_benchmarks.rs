//! Criterion benchmarks for the DA3D hot kernels.
//!
//! Run with: cargo bench
//! Run specific: cargo bench -- bench_dft_patch

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ndarray::Array3;
use rand::prelude::*;
use rustfft::num_complex::Complex;

use da3d::{da3d_block, denoise, BlockParams, Da3dConfig, Da3dFloat, DftPatch};

// =============================================================================
// Helper Functions for Test Data Generation
// =============================================================================

fn random_image(rows: usize, cols: usize, channels: usize, seed: u64) -> Array3<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    Array3::from_shape_fn((rows, cols, channels), |_| rng.gen())
}

// =============================================================================
// Fast Exponential Benchmarks
// =============================================================================

fn bench_fast_exp(c: &mut Criterion) {
    let mut group = c.benchmark_group("fast_exp");
    let mut rng = StdRng::seed_from_u64(7);
    let inputs: Vec<f32> = (0..1024).map(|_| rng.gen::<f32>() * -40.0).collect();

    group.throughput(Throughput::Elements(inputs.len() as u64));
    group.bench_function("approx", |b| {
        b.iter(|| {
            let mut acc = 0.0f32;
            for &x in &inputs {
                acc += black_box(x).fast_exp();
            }
            acc
        })
    });
    group.bench_function("libm", |b| {
        b.iter(|| {
            let mut acc = 0.0f32;
            for &x in &inputs {
                acc += black_box(x).exp();
            }
            acc
        })
    });
    group.finish();
}

// =============================================================================
// DFT Patch Benchmarks
// =============================================================================

fn bench_dft_patch(c: &mut Criterion) {
    let mut group = c.benchmark_group("dft_patch");

    for size in [16usize, 32, 64] {
        let mut rng = StdRng::seed_from_u64(size as u64);
        let mut patch = DftPatch::<f32>::new(size, 1);
        for row in 0..size {
            for col in 0..size {
                patch.space_mut()[[row, col, 0]] = Complex::new(rng.gen::<f32>(), 0.0);
            }
        }

        group.throughput(Throughput::Elements((size * size) as u64));
        group.bench_with_input(BenchmarkId::new("roundtrip", size), &size, |b, _| {
            b.iter(|| {
                patch.to_freq();
                patch.to_space();
            })
        });
    }

    group.finish();
}

// =============================================================================
// Block Driver Benchmark
// =============================================================================

fn bench_block(c: &mut Criterion) {
    let mut group = c.benchmark_group("da3d_block");
    group.sample_size(10);

    let guide = random_image(64, 64, 1, 42);
    let noisy = &guide + &random_image(64, 64, 1, 43).mapv(|v| (v - 0.5) * 0.1);
    let params = BlockParams {
        sigma: 0.05f32,
        radius: 4,
        sigma_s: 2.0,
        gamma_r: 0.4,
        gamma_f: 0.4,
        threshold: 1.0,
    };

    group.throughput(Throughput::Elements(64 * 64));
    group.bench_function("tile_64x64", |b| {
        b.iter(|| da3d_block(black_box(&noisy), black_box(&guide), &params))
    });
    group.finish();
}

// =============================================================================
// End-to-End Benchmark
// =============================================================================

fn bench_denoise(c: &mut Criterion) {
    let mut group = c.benchmark_group("denoise");
    group.sample_size(10);

    let guide = random_image(96, 96, 3, 11);
    let noisy = &guide + &random_image(96, 96, 3, 12).mapv(|v| (v - 0.5) * 0.1);
    let config = Da3dConfig::<f32> {
        threads: 1,
        radius: 4,
        sigma_s: 2.0,
        ..Da3dConfig::default()
    };

    group.throughput(Throughput::Elements(96 * 96 * 3));
    group.bench_function("96x96x3", |b| {
        b.iter(|| denoise(black_box(noisy.view()), black_box(guide.view()), 0.05, &config))
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_fast_exp,
    bench_dft_patch,
    bench_block,
    bench_denoise
);
criterion_main!(benches);
