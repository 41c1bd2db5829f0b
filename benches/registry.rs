//! View registry and resolver benchmarks
//!
//! Measures a full frame at various population sizes, with and without
//! animated borders, to check the redraw throttle keeps frames cheap.
//!
//! Run with: cargo bench --bench registry

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use orbwars_client::net::protocol::{AuraSnapshot, GameStateData, PelletSnapshot, PlayerSnapshot};
use orbwars_client::render::effects::EffectLayerResolver;
use orbwars_client::render::registry::EntityViewRegistry;
use rand::Rng;

const TAG_POOL: [&str; 8] = [
    "Fireball",
    "Frost Armor",
    "Storm Caller",
    "Berserker's Rage I",
    "Guardian's Shield I",
    "Toxic Touch I",
    "Swift Step I",
    "Iron Hide",
];

/// Snapshot with `count` players carrying random card tags
fn create_state(count: usize) -> GameStateData {
    let mut rng = rand::thread_rng();
    let players = (0..count)
        .map(|i| {
            let tags = (0..rng.gen_range(0..4))
                .map(|_| TAG_POOL[rng.gen_range(0..TAG_POOL.len())].to_string())
                .collect();
            PlayerSnapshot {
                id: format!("p{}", i),
                x: rng.gen_range(-3900.0..3900.0),
                y: rng.gen_range(-3900.0..3900.0),
                size: rng.gen_range(30.0..80.0),
                health: 100.0,
                max_health: 100.0,
                applied_cards: tags,
                auras: if i % 5 == 0 {
                    vec![AuraSnapshot {
                        kind: "poison".to_string(),
                        radius: 60.0,
                        strength: 1.0,
                    }]
                } else {
                    Vec::new()
                },
                ..Default::default()
            }
        })
        .collect();
    let pellets = (0..count * 2)
        .map(|i| PelletSnapshot {
            id: format!("f{}", i),
            x: rng.gen_range(-3900.0..3900.0),
            y: rng.gen_range(-3900.0..3900.0),
            size: 8.0,
        })
        .collect();
    GameStateData { players, pellets }
}

/// Steady-state frames: same population, moving positions
fn bench_render_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("render_frame");
    group.sample_size(50);

    for count in [10, 50, 200, 500] {
        let mut state = create_state(count);
        let mut registry = EntityViewRegistry::new();
        let mut resolver = EffectLayerResolver::new();
        registry.render_frame(&state, None, 0, &mut resolver);

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            let mut now = 0u64;
            b.iter(|| {
                now += 16;
                for player in &mut state.players {
                    player.x += 1.0;
                }
                black_box(registry.render_frame(&state, None, now, &mut resolver))
            });
        });
    }

    group.finish();
}

/// Population churn: every frame replaces half the players
fn bench_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("churn");
    group.sample_size(30);

    for count in [50, 200] {
        let a = create_state(count);
        let b_state = create_state(count);
        let mut mixed = a.clone();
        for (i, player) in b_state.players.iter().enumerate().filter(|(i, _)| i % 2 == 0) {
            mixed.players[i] = PlayerSnapshot {
                id: format!("q{}", i),
                ..player.clone()
            };
        }

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |bench, _| {
            let mut registry = EntityViewRegistry::new();
            let mut resolver = EffectLayerResolver::new();
            let mut now = 0u64;
            bench.iter(|| {
                now += 16;
                let state = if (now / 16) % 2 == 0 { &a } else { &mixed };
                black_box(registry.render_frame(state, None, now, &mut resolver))
            });
        });
    }

    group.finish();
}

/// Resolver with a warm cache vs recomputing every call
fn bench_resolver(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolver");
    let tags: Vec<String> = TAG_POOL.iter().take(4).map(|t| t.to_string()).collect();

    group.bench_function("cached", |b| {
        let mut resolver = EffectLayerResolver::new();
        b.iter(|| black_box(resolver.resolve(black_box(tags.as_slice()))))
    });
    group.bench_function("uncached", |b| {
        b.iter(|| black_box(orbwars_client::render::effects::resolve_layers(black_box(tags.as_slice()))))
    });

    group.finish();
}

criterion_group!(benches, bench_render_frame, bench_churn, bench_resolver);
criterion_main!(benches);
