//! Crowd tick benchmarks over the humanoid fixtures.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use horde_animation_core::builder::{ClipAuthoring, ControllerAuthoring, MaskAuthoring, SkeletonAuthoring};
use horde_animation_core::{
    ClipBuilder, Config, ControllerAsset, ControllerBuilder, Engine, SkeletonBuilder,
    SkeletonDefinition, SkeletonMaskBuilder,
};
use horde_test_fixtures::{clips, controllers, masks, skeletons};

const DT: f32 = 1.0 / 60.0;

fn humanoid() -> (Arc<SkeletonDefinition>, Arc<ControllerAsset>) {
    let skeleton: SkeletonAuthoring = skeletons::load("humanoid").unwrap();
    let skeleton = SkeletonBuilder::from_authoring(&skeleton).build().unwrap();

    let authoring: ControllerAuthoring = controllers::load("humanoid").unwrap();
    let mut builder = ControllerBuilder::new(authoring);
    for name in controllers::clips("humanoid").unwrap() {
        let clip: ClipAuthoring = clips::load(&name).unwrap();
        let clip = ClipBuilder::from_authoring(&clip).unwrap().build().unwrap();
        builder = builder.clip(name, Arc::new(clip));
    }
    for name in controllers::masks("humanoid").unwrap() {
        let mask: MaskAuthoring = masks::load(&name).unwrap();
        builder = builder.mask(name, Arc::new(SkeletonMaskBuilder::from_authoring(&mask).build()));
    }
    (Arc::new(skeleton), Arc::new(builder.build().unwrap()))
}

/// A crowd with varied speeds so instances spread over idle and locomotion.
fn crowd(count: usize, worker_threads: usize) -> Engine {
    let (skeleton, asset) = humanoid();
    let mut engine = Engine::new(Config {
        worker_threads,
        instance_capacity_hint: count,
        ..Config::default()
    });
    for i in 0..count {
        let id = engine.spawn();
        engine.attach_skeleton(id, skeleton.clone()).unwrap();
        engine.attach_animator(id, asset.clone()).unwrap();
        let mut params = engine.parameters_mut(id).unwrap();
        params.set_float("speed", (i % 4) as f32).unwrap();
        params.set_bool("wave", i % 3 == 0).unwrap();
    }
    engine
}

fn bench_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("crowd_tick");

    for count in [100, 1000, 10000].iter() {
        group.bench_with_input(BenchmarkId::new("sequential", count), count, |b, &count| {
            let mut engine = crowd(count, 1);
            b.iter(|| {
                let out = engine.update(DT).unwrap();
                black_box(out.command_count())
            });
        });
        group.bench_with_input(BenchmarkId::new("parallel", count), count, |b, &count| {
            let mut engine = crowd(count, 4);
            b.iter(|| {
                let out = engine.update(DT).unwrap();
                black_box(out.command_count())
            });
        });
    }

    group.finish();
}

fn bench_attach(c: &mut Criterion) {
    let (skeleton, asset) = humanoid();
    c.bench_function("attach_detach_animator", |b| {
        let mut engine = Engine::default();
        let id = engine.spawn();
        engine.attach_skeleton(id, skeleton.clone()).unwrap();
        b.iter(|| {
            engine.attach_animator(id, asset.clone()).unwrap();
            engine.detach_animator(id).unwrap();
        });
    });
}

criterion_group!(benches, bench_tick, bench_attach);
criterion_main!(benches);
