use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use glazier_bgremove::{
    processing::{self, metrics},
    Compositor, CompositorOptions, Kernel, MaskProcessor, PixelBuffer, PixelLayout,
    ProcessingMode,
};
use ndarray::Array4;

fn gradient(width: u32, height: u32, layout: PixelLayout) -> PixelBuffer {
    let mut buffer = PixelBuffer::new(width, height, layout);
    for y in 0..height {
        for x in 0..width {
            let pixel = buffer.pixel_mut(x, y);
            pixel[0] = (x % 256) as u8;
            pixel[1] = (y % 256) as u8;
            pixel[2] = ((x + y) % 256) as u8;
            if layout.has_alpha() {
                pixel[3] = 255;
            }
        }
    }
    buffer
}

fn bench_gaussian_blur(c: &mut Criterion) {
    let image = gradient(1024, 768, PixelLayout::Rgba8);
    let mut group = c.benchmark_group("gaussian_blur");

    for amount in [3u32, 7, 15] {
        group.bench_with_input(BenchmarkId::from_parameter(amount), &amount, |b, &amount| {
            b.iter(|| processing::gaussian_blur(black_box(&image), amount));
        });
    }
    group.finish();
}

fn bench_sharpen(c: &mut Criterion) {
    let image = gradient(1024, 768, PixelLayout::Rgba8);
    let kernel = Kernel::sharpen(1.5);

    c.bench_function("convolve_sharpen_3x3", |b| {
        b.iter(|| processing::convolve(black_box(&image), &kernel));
    });
}

fn bench_metrics(c: &mut Criterion) {
    let image = gradient(1920, 1080, PixelLayout::Rgb8);
    let mut group = c.benchmark_group("metrics");

    group.bench_function("brightness", |b| b.iter(|| metrics::brightness(black_box(&image))));
    group.bench_function("contrast", |b| b.iter(|| metrics::contrast(black_box(&image))));
    group.bench_function("complexity", |b| {
        b.iter(|| metrics::complexity(black_box(&image), ProcessingMode::None));
    });
    group.finish();
}

fn bench_mask_and_composite(c: &mut Criterion) {
    let tensor = Array4::from_shape_fn((1, 1, 320, 320), |(_, _, y, x)| {
        ((x + y) % 320) as f32 / 320.0
    });
    let size = glazier_bgremove::ImageSize::new(320, 320);
    let original = gradient(320, 320, PixelLayout::Rgb8);

    c.bench_function("process_output_320", |b| {
        b.iter(|| MaskProcessor::process_output(black_box(&tensor), size, 50, 3, None));
    });

    let mask = MaskProcessor::process_output(&tensor, size, 50, 3, None)
        .unwrap_or_else(|_| PixelBuffer::new(320, 320, PixelLayout::Rgb8));
    let options = CompositorOptions::default();
    c.bench_function("apply_mask_320", |b| {
        b.iter(|| Compositor::apply_mask(black_box(&original), &mask, 50, &options, None));
    });
}

criterion_group!(
    benches,
    bench_gaussian_blur,
    bench_sharpen,
    bench_metrics,
    bench_mask_and_composite
);
criterion_main!(benches);
