use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use inpaint_dataset as id;

fn canny(c: &mut Criterion) {
    static DIM: usize = 64;

    let mut group = c.benchmark_group("canny");
    group.sample_size(10);

    for dim in [DIM, 2 * DIM, 4 * DIM, 8 * DIM].iter() {
        let img = id::ndarray::Array2::from_shape_fn((*dim, *dim), |(y, x)| {
            (((x / 7) ^ (y / 11)) % 5) as f32 / 4.0
        });

        group.bench_with_input(BenchmarkId::from_parameter(dim), &img, |b, img| {
            let detector = id::canny::Canny::new(2.0);
            b.iter(|| black_box(detector.detect(img, None)));
        });
    }
    group.finish();
}

fn masks(c: &mut Criterion) {
    let mut group = c.benchmark_group("masks");

    let mut rng = id::seeded_rng(3);
    let synth = id::MaskSynthesizer::new(id::MaskStrategy::RandomBlock, &[]).unwrap();
    group.bench_function("random_block", |b| {
        b.iter(|| black_box(synth.synthesize(id::Dims::square(256), 0, &mut rng).unwrap()))
    });

    let blobs = id::image::GrayImage::from_fn(256, 256, |x, y| {
        id::image::Luma([if (x / 32 + y / 32) % 3 == 0 { 255 } else { 0 }])
    });
    group.bench_function("noise_fill", |b| {
        b.iter(|| black_box(id::mask::fill_regions_with_noise(&blobs, &mut rng)))
    });

    group.finish();
}

fn resize_crop(c: &mut Criterion) {
    let img = id::image::Rgb32FImage::from_fn(640, 480, |x, y| {
        id::image::Rgb([x as f32 / 640.0, y as f32 / 480.0, 0.5])
    });

    let mut group = c.benchmark_group("resize_crop");
    group.sample_size(10);

    for dim in [128, 256, 512].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(dim), dim, |b, &dim| {
            b.iter(|| black_box(id::resize_crop(&img, id::Dims::square(dim), true)))
        });
    }
    group.finish();
}

criterion_group!(benches, canny, masks, resize_crop);
criterion_main!(benches);
