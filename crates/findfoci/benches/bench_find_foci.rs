use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use findfoci::batch::find_foci_batch;
use findfoci::cancel::CancelToken;
use findfoci::config::{BackgroundMethod, CentroidMethod, FindFociConfig};
use findfoci::pipeline::FindFoci;
use findfoci_volume::{Volume, VolumeSize};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Noise with a number of Gaussian spots of random position and height.
fn create_test_volume(size: VolumeSize, spots: usize) -> Volume<u16> {
    let mut rng = StdRng::seed_from_u64(42);
    let mut data: Vec<f64> = (0..size.len()).map(|_| rng.random_range(0.0..20.0)).collect();
    for _ in 0..spots {
        let cx = rng.random_range(0.0..size.width as f64);
        let cy = rng.random_range(0.0..size.height as f64);
        let cz = rng.random_range(0.0..size.depth as f64);
        let amplitude = rng.random_range(100.0..1000.0);
        for (i, v) in data.iter_mut().enumerate() {
            let (x, y, z) = size.coords(i);
            let d2 = (x as f64 - cx).powi(2) + (y as f64 - cy).powi(2) + (z as f64 - cz).powi(2);
            *v += amplitude * (-d2 / 8.0).exp();
        }
    }
    let data = data.into_iter().map(|v| v.round() as u16).collect();
    Volume::new(size, data).unwrap()
}

fn bench_find_foci(c: &mut Criterion) {
    let mut group = c.benchmark_group("FindFoci");

    for (width, height, depth) in [(256, 256, 1), (512, 512, 1), (128, 128, 16)].iter() {
        let size = VolumeSize {
            width: *width,
            height: *height,
            depth: *depth,
        };
        let volume = create_test_volume(size, 40);
        let parameter_string = format!("{width}x{height}x{depth}");

        let finder = FindFoci::new(FindFociConfig::default()).unwrap();
        group.bench_with_input(
            BenchmarkId::new("otsu_search", &parameter_string),
            &volume,
            |b, v| b.iter(|| std::hint::black_box(finder.run(v, None, None).unwrap())),
        );

        let finder = FindFoci::new(FindFociConfig {
            background_method: BackgroundMethod::StdDevAboveMean,
            centroid_method: CentroidMethod::CentreOfMassOriginal,
            gaussian_blur: Some(1.0),
            ..Default::default()
        })
        .unwrap();
        group.bench_with_input(
            BenchmarkId::new("blur_centre_of_mass", &parameter_string),
            &volume,
            |b, v| b.iter(|| std::hint::black_box(finder.run(v, None, None).unwrap())),
        );
    }

    let size = VolumeSize::new_2d(256, 256);
    let volumes: Vec<Volume<u16>> = (0..8).map(|_| create_test_volume(size, 20)).collect();
    let finder = FindFoci::new(FindFociConfig::default()).unwrap();
    let cancel = CancelToken::new();
    group.bench_function("batch_8x256x256", |b| {
        b.iter(|| std::hint::black_box(find_foci_batch(&finder, &volumes, &cancel)))
    });

    group.finish();
}

criterion_group!(benches, bench_find_foci);
criterion_main!(benches);
