//! Benchmarks for PDF function evaluation.
//!
//! Functions run once per pixel while sampling shadings and once per color
//! operator in Separation/DeviceN spaces, so `evaluate_into` is hot.
//!
//! Benchmark groups:
//! - `function_eval`: one evaluation of each function type
//! - `function_sweep`: a full 0..1 sweep at shading resolution

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use ductus_core::PDFFunction;
use ductus_core::model::FunctionOutput;

// =============================================================================
// Fixtures
// =============================================================================

fn sampled_rgb(samples: usize) -> PDFFunction {
    let data: Vec<u8> = (0..samples * 3).map(|i| (i * 7 % 256) as u8).collect();
    PDFFunction::sampled(
        vec![0.0, 1.0],
        vec![0.0, 1.0, 0.0, 1.0, 0.0, 1.0],
        vec![samples],
        8,
        None,
        None,
        &data,
    )
    .unwrap()
}

fn sampled_2d() -> PDFFunction {
    let data: Vec<u8> = (0..16 * 16).map(|i| (i % 256) as u8).collect();
    PDFFunction::sampled(
        vec![0.0, 1.0, 0.0, 1.0],
        vec![0.0, 1.0],
        vec![16, 16],
        8,
        None,
        None,
        &data,
    )
    .unwrap()
}

fn exponential() -> PDFFunction {
    PDFFunction::exponential(
        vec![0.0, 1.0],
        None,
        vec![0.0, 0.2, 0.4],
        vec![1.0, 0.8, 0.6],
        2.2,
    )
    .unwrap()
}

fn stitching(parts: usize) -> PDFFunction {
    let functions: Vec<PDFFunction> = (0..parts)
        .map(|i| {
            let v = i as f64 / parts as f64;
            PDFFunction::exponential(vec![0.0, 1.0], None, vec![v], vec![v + 0.1], 1.0).unwrap()
        })
        .collect();
    let bounds: Vec<f64> = (1..parts).map(|i| i as f64 / parts as f64).collect();
    let encode: Vec<f64> = (0..parts).flat_map(|_| [0.0, 1.0]).collect();
    PDFFunction::stitching(vec![0.0, 1.0], None, functions, bounds, encode).unwrap()
}

// =============================================================================
// Benchmarks
// =============================================================================

fn bench_eval(c: &mut Criterion) {
    let mut group = c.benchmark_group("function_eval");
    let cases = [
        ("sampled_rgb_256", sampled_rgb(256), vec![0.37]),
        ("sampled_2d_16x16", sampled_2d(), vec![0.37, 0.61]),
        ("exponential", exponential(), vec![0.37]),
        ("stitching_8", stitching(8), vec![0.37]),
    ];
    for (name, function, input) in &cases {
        let mut out = FunctionOutput::new();
        group.bench_function(*name, |b| {
            b.iter(|| {
                function.evaluate_into(black_box(input), &mut out);
                black_box(&out);
            })
        });
    }
    group.finish();
}

fn bench_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("function_sweep");
    for steps in [256usize, 4096] {
        let function = stitching(4);
        group.bench_with_input(BenchmarkId::new("stitching_4", steps), &steps, |b, &steps| {
            let mut out = FunctionOutput::new();
            b.iter(|| {
                let mut acc = 0.0;
                for i in 0..steps {
                    function.evaluate_into(&[i as f64 / steps as f64], &mut out);
                    acc += out[0];
                }
                black_box(acc)
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_eval, bench_sweep);
criterion_main!(benches);
