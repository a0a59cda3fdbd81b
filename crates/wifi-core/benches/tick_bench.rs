//! Criterion benchmarks for [`CodeManager`] critical path operations.
//!
//! `tick` runs once per interval while holding the manager lock, so its cost
//! directly bounds how long registrations can be delayed.
//!
//! Run with:
//! ```bash
//! cargo bench --package wifi-core --bench tick_bench
//! ```

use std::collections::HashSet;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use wifi_core::{CodeId, CodeManager, DeviceId, DeviceSnapshot};

// ── Fixture builders ──────────────────────────────────────────────────────────

/// Creates a manager with `codes` codes, each shared by `per_code` devices.
///
/// TTLs are large so no code expires during a benchmark run.
fn build_manager(codes: usize, per_code: usize) -> CodeManager {
    let manager = CodeManager::new();
    for c in 0..codes {
        for d in 0..per_code {
            manager.bind(
                CodeId::from(format!("CODE{c:07}")),
                DeviceId::from(format!("02:00:00:00:{c:02x}:{d:02x}")),
                u32::MAX,
            );
        }
    }
    manager
}

/// `bound` bound devices plus `foreign` devices nobody registered.
fn snapshot(codes: usize, per_code: usize, foreign: usize) -> HashSet<DeviceId> {
    let mut devices = HashSet::new();
    for c in 0..codes {
        for d in 0..per_code {
            devices.insert(DeviceId::from(format!("02:00:00:00:{c:02x}:{d:02x}")));
        }
    }
    for f in 0..foreign {
        devices.insert(DeviceId::from(format!("06:00:00:00:00:{f:02x}")));
    }
    devices
}

// ── Benchmarks ────────────────────────────────────────────────────────────────

fn bench_tick_known_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick/known");
    for &codes in &[1usize, 10, 50] {
        let manager = build_manager(codes, 4);
        let devices = snapshot(codes, 4, 8);
        group.bench_with_input(BenchmarkId::new("codes", codes), &codes, |b, _| {
            b.iter(|| manager.tick(black_box(DeviceSnapshot::Known(devices.clone()))))
        });
    }
    group.finish();
}

fn bench_tick_unknown_snapshot(c: &mut Criterion) {
    let manager = build_manager(50, 4);
    c.bench_function("tick/unknown", |b| {
        b.iter(|| manager.tick(black_box(DeviceSnapshot::Unknown)))
    });
}

fn bench_bind(c: &mut Criterion) {
    let manager = build_manager(50, 4);
    let code = CodeId::from("CODE0000001");
    let device = DeviceId::from("0A:00:00:00:00:01");
    c.bench_function("bind/existing_code", |b| {
        b.iter(|| manager.bind(black_box(code.clone()), black_box(device.clone()), 60))
    });
}

criterion_group!(
    benches,
    bench_tick_known_snapshot,
    bench_tick_unknown_snapshot,
    bench_bind,
);
criterion_main!(benches);
