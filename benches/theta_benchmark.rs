//! Performance benchmarks for Thetagen
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::path::Path;
use tempfile::TempDir;
use thetagen::config::{GridConfig, ThetaConfig};
use thetagen::engine::{compute_phase_theta, PhaseRegistry, ThetaEngine};
use thetagen::profile::{layout, AllocPoint, Workload};

/// Write a synthetic phase table: `phases` contiguous spans of 1000
/// instructions each, with rates growing with the allocation point.
fn write_profile(root: &Path, point: AllocPoint, phases: usize) {
    let dir = layout::point_dir(root, Workload::Fft.as_str(), point);
    std::fs::create_dir_all(&dir).unwrap();

    let mut lines = String::new();
    for idx in 0..phases {
        let start = idx as u64 * 1000;
        let rate = 100 + 10 * u64::from(point.cache) + 5 * u64::from(point.membw);
        lines.push_str(&format!("{idx},{start},{},{rate}\n", start + 999));
    }
    std::fs::write(dir.join(layout::PHASES_FILE), lines).unwrap();
}

fn populate_grid(root: &Path, grid: GridConfig, phases: usize) {
    for point in grid.points() {
        write_profile(root, point, phases);
    }
}

fn bench_phase_locator(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let grid = GridConfig::new(1, 1).unwrap();
    write_profile(dir.path(), AllocPoint::new(0, 0), 512);

    let engine = ThetaEngine::new(ThetaConfig {
        root: dir.path().to_path_buf(),
        grid,
        threads: 1,
        reuse_existing: false,
        load_timeout: None,
    });
    let seq = engine
        .get_phase_entries(Workload::Fft, AllocPoint::new(0, 0))
        .unwrap()
        .unwrap();

    c.bench_function("locate_phase_512", |b| {
        b.iter(|| {
            // probe near the end, the worst case for the linear scan
            black_box(seq.find(black_box(511_500)));
        });
    });
}

fn bench_phase_theta(c: &mut Criterion) {
    let mut group = c.benchmark_group("phase_theta");

    for levels in [4u32, 8, 12] {
        let dir = TempDir::new().unwrap();
        let grid = GridConfig::new(levels, levels).unwrap();
        populate_grid(dir.path(), grid, 8);

        let engine = ThetaEngine::new(ThetaConfig {
            root: dir.path().to_path_buf(),
            grid,
            threads: 1,
            reuse_existing: false,
            load_timeout: None,
        });

        let registry = PhaseRegistry::new(grid);
        for point in grid.points() {
            let seq = engine.get_phase_entries(Workload::Fft, point).unwrap().unwrap();
            registry.insert(Workload::Fft, seq);
        }
        let snapshot = registry.snapshot(Workload::Fft);
        let base = snapshot
            .get(AllocPoint::new(0, 0))
            .unwrap()
            .records()[0]
            .clone();

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{levels}x{levels}")),
            &levels,
            |b, _| {
                b.iter(|| {
                    black_box(compute_phase_theta(&snapshot, &base).unwrap());
                });
            },
        );
    }

    group.finish();
}

fn bench_precompute_grid(c: &mut Criterion) {
    c.bench_function("precompute_4x4_grid", |b| {
        b.iter_with_setup(
            || {
                let dir = TempDir::new().unwrap();
                let grid = GridConfig::new(4, 4).unwrap();
                populate_grid(dir.path(), grid, 4);
                let engine = ThetaEngine::new(ThetaConfig {
                    root: dir.path().to_path_buf(),
                    grid,
                    threads: 4,
                    reuse_existing: false,
                    load_timeout: None,
                });
                (dir, engine)
            },
            |(_dir, engine)| {
                black_box(engine.precompute(Workload::Fft).unwrap());
            },
        );
    });
}

criterion_group!(
    benches,
    bench_phase_locator,
    bench_phase_theta,
    bench_precompute_grid
);
criterion_main!(benches);
