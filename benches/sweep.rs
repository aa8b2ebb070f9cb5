use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ims_expander::config::ExpanderConfig;
use ims_expander::expander::{ImsExpander, InputFeature};
use ims_expander::job::{CancellationToken, FeatureList};
use ims_expander::source::{DataMode, Frame, MobilityScan, MobilityScanDataAccess, PeakArrays};
use ims_expander::sweep::sweep;

/// Frames whose scans all hold the same evenly spaced peaks
fn create_frames(num_frames: usize, scans_per_frame: usize, peaks_per_scan: usize) -> Vec<Frame> {
    (0..num_frames)
        .map(|f| {
            let scans = (0..scans_per_frame)
                .map(|s| {
                    let mz: Vec<f64> = (0..peaks_per_scan).map(|j| 100.0 + j as f64 * 0.7).collect();
                    let intensity = vec![1000.0; peaks_per_scan];
                    MobilityScan::new(s, 1.6 - s as f64 * 0.001, PeakArrays::new(mz, intensity))
                })
                .collect();
            Frame::new(f, f as f64, scans)
        })
        .collect()
}

fn create_features(num_features: usize) -> Vec<InputFeature> {
    (0..num_features)
        .map(|i| InputFeature::new(i as u64, 100.0 + i as f64 * 1.3))
        .collect()
}

/// Benchmark a single-threaded sweep over all frames
fn bench_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("sweep");
    let frames = create_frames(20, 200, 200);
    let points: usize = frames.iter().map(Frame::peak_count).sum();
    group.throughput(Throughput::Elements(points as u64));

    for num_features in [100, 1000, 5000] {
        let expander = ImsExpander::new(ExpanderConfig::default()).unwrap();
        let features = create_features(num_features);
        group.bench_with_input(
            BenchmarkId::from_parameter(num_features),
            &num_features,
            |b, _| {
                b.iter(|| {
                    let mut arena = expander.build_traces(&features).unwrap();
                    let mut access = MobilityScanDataAccess::new(&frames, DataMode::Centroid, 0.0);
                    sweep(&mut access, &mut arena, &CancellationToken::new(), |_, _| {}).unwrap();
                    black_box(arena)
                })
            },
        );
    }

    group.finish();
}

/// Benchmark full expansion with parallel jobs
fn bench_expansion_jobs(c: &mut Criterion) {
    let mut group = c.benchmark_group("expansion_jobs");
    let raw = ims_expander::source::RawDataFile::new("bench.d", create_frames(20, 200, 200));
    let features = create_features(2000);

    for num_jobs in [1, 2, 4, 8] {
        let expander = ImsExpander::new(ExpanderConfig {
            num_jobs,
            ..Default::default()
        })
        .unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(num_jobs), &num_jobs, |b, _| {
            b.iter(|| {
                let output = FeatureList::new("bench");
                let task = expander
                    .prepare("bench", &raw, &features, &CancellationToken::new())
                    .unwrap();
                black_box(task.run(&output));
                output.len()
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_sweep, bench_expansion_jobs);
criterion_main!(benches);
