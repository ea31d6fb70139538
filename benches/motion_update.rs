//! Per-tick motion cost: pose update with and without a pointer.
//! Run: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use glam::Vec2;

use amv::motion::{MotionConfig, MotionController};

fn bench_motion_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("motion_update");
    group.sample_size(200);

    group.bench_function("animated_with_pointer", |b| {
        let mut motion = MotionController::new(MotionConfig::default());
        let mut tick = 0u32;
        b.iter(|| {
            tick = tick.wrapping_add(1);
            let pointer = Vec2::new((tick % 100) as f32 / 100.0, 0.5);
            black_box(motion.update(tick as f32 * 0.016, Some(pointer)))
        });
    });

    group.bench_function("idle_without_pointer", |b| {
        let mut motion = MotionController::new(MotionConfig {
            animate: false,
            ..MotionConfig::default()
        });
        let mut tick = 0u32;
        b.iter(|| {
            tick = tick.wrapping_add(1);
            black_box(motion.update(tick as f32 * 0.016, None))
        });
    });

    group.finish();
}

criterion_group!(benches, bench_motion_update);
criterion_main!(benches);
