use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use secs::ecs::Ecs;
use secs::registry::Registry;
use secs_macros::Component;

#[derive(Clone, Copy, Default, Component)]
struct Position {
    x: f32,
    y: f32,
}

#[derive(Clone, Copy, Default, Component)]
struct Velocity {
    x: f32,
    y: f32,
}

#[derive(Clone, Copy, Component)]
struct Frozen;

fn populated() -> Registry {
    let mut registry = Registry::new();
    for i in 0..10_000u32 {
        let e = registry.create();
        if i >= 150 {
            registry.add(e, Position { x: 0.0, y: 0.0 });
        }
        registry.add(e, Velocity { x: 1.0, y: 2.0 });
        if i >= 500 {
            registry.add(e, Frozen);
        }
    }
    registry
}

fn bench_create(c: &mut Criterion) {
    Ecs::register::<Position>();
    Ecs::register::<Velocity>();

    c.bench_function("registry_create_bundle_10k", |b| {
        b.iter_batched(
            Registry::new,
            |mut registry| {
                for _ in 0..10_000 {
                    let e = registry.create();
                    registry.add_bundle(e, (Position::default(), Velocity::default()));
                }
                registry
            },
            BatchSize::SmallInput,
        );
    });

    c.bench_function("registry_destroy_10k", |b| {
        b.iter_batched(
            populated,
            |mut registry| {
                let ids: Vec<_> = registry.entities().collect();
                registry.destroy_many(&ids);
                registry
            },
            BatchSize::SmallInput,
        );
    });
}

fn bench_views(c: &mut Criterion) {
    Ecs::register::<Position>();
    Ecs::register::<Velocity>();
    Ecs::register::<Frozen>();
    let registry = populated();

    let view = registry.view::<(Velocity,)>().exclude::<(Frozen,)>();
    println!("view_10k_skip_9500 matched {}", view.count());
    c.bench_function("view_10k_skip_9500", |b| {
        b.iter(|| {
            let mut sum = 0.0f32;
            view.each(|id| sum += registry.get::<Velocity>(id).x);
            black_box(sum)
        });
    });

    let view = registry.view::<(Velocity,)>().exclude::<(Position,)>();
    println!("view_10k_skip_9850 matched {}", view.count());
    c.bench_function("view_10k_skip_9850", |b| {
        b.iter(|| black_box(view.count()));
    });

    c.bench_function("view_two_includes_10k", |b| {
        b.iter(|| black_box(registry.view::<(Position, Velocity)>().count()));
    });
}

criterion_group!(benches, bench_create, bench_views);
criterion_main!(benches);
