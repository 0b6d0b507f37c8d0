//! Benchmarks for shading rasterization and content-stream interpretation.
//!
//! Benchmark groups:
//! - `shading_fill`: `ShadingContext::fill` over a device-space block
//! - `interpret`: rendering synthetic content streams to a recording surface

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::Arc;

use ductus_core::model::objects::dict_from;
use ductus_core::shading::PixelRect;
use ductus_core::{
    ColorSpace, MATRIX_IDENTITY, ObjectStore, PDFDict, PDFFunction, PDFObject, PageInterpreter,
    RecordingSurface, RenderOptions, ResourceManager, Shading,
};

// =============================================================================
// Fixtures
// =============================================================================

fn nums(values: &[f64]) -> PDFObject {
    PDFObject::Array(values.iter().map(|v| PDFObject::Real(*v)).collect())
}

fn rgb_ramp() -> Arc<PDFFunction> {
    Arc::new(
        PDFFunction::exponential(
            vec![0.0, 1.0],
            None,
            vec![1.0, 0.0, 0.0],
            vec![0.0, 0.0, 1.0],
            1.0,
        )
        .unwrap(),
    )
}

fn shading(shading_type: i64, coords: &[f64]) -> Arc<Shading> {
    let store = ObjectStore::new();
    let dict = dict_from([
        ("ShadingType", PDFObject::Int(shading_type)),
        ("Coords", nums(coords)),
        (
            "Extend",
            PDFObject::Array(vec![PDFObject::Bool(true), PDFObject::Bool(true)]),
        ),
    ]);
    Arc::new(Shading::from_dict(&dict, &store, ColorSpace::device_rgb(), Some(rgb_ramp())).unwrap())
}

/// Rectangles and text-free paths at a mix of colors and transforms.
fn generate_content(ops: usize) -> Vec<u8> {
    let templates: &[&[u8]] = &[
        b"q 1 0 0 1 10 10 cm ",
        b"0.2 0.4 0.6 rg ",
        b"10 10 50 20 re f ",
        b"0 0 m 100 0 l 100 100 l h S ",
        b"0 0 0 1 K 2 w ",
        b"5 5 m 10 20 30 40 50 5 c B ",
        b"0 0 200 200 re W n ",
        b"Q ",
    ];
    let mut data = Vec::with_capacity(ops * 24);
    for i in 0..ops {
        data.extend_from_slice(templates[i % templates.len()]);
    }
    data
}

// =============================================================================
// Benchmarks
// =============================================================================

fn bench_shading_fill(c: &mut Criterion) {
    let mut group = c.benchmark_group("shading_fill");
    let cases = [
        ("axial", shading(2, &[0.0, 0.0, 256.0, 0.0])),
        ("radial", shading(3, &[128.0, 128.0, 0.0, 128.0, 128.0, 128.0])),
    ];
    let rect = PixelRect {
        x: 0,
        y: 0,
        width: 256,
        height: 256,
    };
    group.throughput(Throughput::Elements(u64::from(rect.width * rect.height)));
    for (name, shading) in &cases {
        let ctx = shading.paint_context(MATRIX_IDENTITY, false).unwrap();
        let mut out = vec![0u32; (rect.width * rect.height) as usize];
        group.bench_function(*name, |b| {
            b.iter(|| {
                ctx.fill(black_box(rect), &mut out);
                black_box(&out);
            })
        });
    }
    group.finish();
}

fn bench_interpret(c: &mut Criterion) {
    let mut group = c.benchmark_group("interpret");
    let store = ObjectStore::new();
    let options = RenderOptions::default();
    for ops in [1_000usize, 10_000] {
        let content = generate_content(ops);
        group.throughput(Throughput::Bytes(content.len() as u64));
        group.bench_with_input(BenchmarkId::new("paths", ops), &content, |b, content| {
            b.iter(|| {
                let mut resources = ResourceManager::new();
                let mut surface = RecordingSurface::new();
                PageInterpreter::new(&store, &mut resources, &mut surface, &options)
                    .render_page(black_box(content), PDFDict::new(), MATRIX_IDENTITY)
                    .unwrap();
                black_box(surface.calls().len())
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_shading_fill, bench_interpret);
criterion_main!(benches);
