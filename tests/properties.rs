//! Property tests for the sync and render core

use std::collections::BTreeSet;

use proptest::prelude::*;

use orbwars_client::game::constants::{input_interval_ms, reconcile_factor};
use orbwars_client::game::speed::speed_for_tags;
use orbwars_client::game::sync::{SnapshotOutcome, SyncState};
use orbwars_client::net::protocol::{GameStateData, PlayerSnapshot};
use orbwars_client::render::effects::{resolve_layers, EffectLayerResolver};
use orbwars_client::render::registry::{EntityViewRegistry, LocalView};
use orbwars_client::util::vec2::Vec2;

const TAGS: [&str; 12] = [
    "Fireball",
    "Frost Armor",
    "Storm Caller",
    "Berserker's Rage I",
    "Berserker's Rage II",
    "Guardian's Shield I",
    "Toxic Touch I",
    "Blood Hunger I",
    "Swift Step I",
    "Iron Hide",
    "Arcane Surge",
    "Nature's Gift",
];

fn tag_sequence() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(
        prop_oneof![
            prop::sample::select(TAGS.to_vec()).prop_map(str::to_string),
            "[a-zA-Z ']{0,16}",
        ],
        0..6,
    )
}

fn player(id: &str, x: f64, y: f64) -> PlayerSnapshot {
    PlayerSnapshot {
        id: id.to_string(),
        x,
        y,
        size: 40.0,
        health: 100.0,
        max_health: 100.0,
        ..Default::default()
    }
}

proptest! {
    #[test]
    fn resolver_is_deterministic(tags in tag_sequence()) {
        let mut resolver = EffectLayerResolver::new();
        let first = resolver.resolve(&tags);
        let second = resolver.resolve(&tags);
        let uncached = resolve_layers(&tags);

        prop_assert_eq!(&*first, &*second);
        prop_assert_eq!(&*first, &uncached);
        prop_assert_eq!(resolver.misses(), 1);
        prop_assert_eq!(resolver.hits(), 1);
    }

    #[test]
    fn resolver_emits_one_fill_and_border_per_tag(tags in tag_sequence()) {
        let set = resolve_layers(&tags);
        prop_assert_eq!(set.fills.len(), tags.len());
        prop_assert_eq!(set.borders.len(), tags.len());
        prop_assert!(set.auras.len() <= tags.len());
        prop_assert_eq!(set.is_empty(), tags.is_empty());
    }

    #[test]
    fn registry_tracks_population(
        frames in prop::collection::vec(prop::collection::btree_set(0u8..20, 0..12), 1..8),
        local in prop::option::of(0u8..20),
    ) {
        let mut registry = EntityViewRegistry::new();
        let mut resolver = EffectLayerResolver::new();
        let local_id = local.map(|n| format!("e{}", n));

        for (frame, ids) in frames.iter().enumerate() {
            let state = GameStateData {
                players: ids
                    .iter()
                    .map(|n| player(&format!("e{}", n), *n as f64 * 10.0, 0.0))
                    .collect(),
                pellets: Vec::new(),
            };
            let view = local_id.as_deref().map(|id| LocalView {
                id,
                position: Vec2::ZERO,
                size: 40.0,
            });
            let report = registry.render_frame(&state, view, frame as u64 * 16, &mut resolver);

            let expected: BTreeSet<String> = ids
                .iter()
                .map(|n| format!("e{}", n))
                .filter(|id| Some(id) != local_id.as_ref())
                .collect();
            let live: BTreeSet<String> = registry.ids().map(str::to_string).collect();
            prop_assert_eq!(&live, &expected);
            prop_assert_eq!(report.live, expected.len());
        }
    }

    #[test]
    fn reconcile_factor_is_bounded(distance in 0.0f64..10_000.0) {
        let factor = reconcile_factor(distance);
        prop_assert!((0.2..=0.5).contains(&factor));
    }

    #[test]
    fn reconciliation_never_increases_error(
        start in (-3000.0f64..3000.0, -3000.0f64..3000.0),
        target in (-3000.0f64..3000.0, -3000.0f64..3000.0),
        gap in 0u64..=100,
    ) {
        let mut sync = SyncState::new();
        sync.set_identity("me".to_string());

        let first = GameStateData { players: vec![player("me", start.0, start.1)], pellets: Vec::new() };
        prop_assert_eq!(sync.apply_snapshot(&first, 1_000), SnapshotOutcome::Initialized);

        let server = Vec2::new(target.0, target.1);
        let before = sync.predicted().position.distance_to(server);
        let second = GameStateData { players: vec![player("me", target.0, target.1)], pellets: Vec::new() };
        let outcome = sync.apply_snapshot(&second, 1_000 + gap);

        let after = sync.predicted().position.distance_to(server);
        let reconciled = matches!(outcome, SnapshotOutcome::Reconciled { .. });
        prop_assert!(reconciled);
        prop_assert!(after <= before + 1e-9);
    }

    #[test]
    fn input_interval_is_bounded(speed in 0.0f64..1_000.0) {
        let interval = input_interval_ms(speed);
        prop_assert!((16.0..=50.0).contains(&interval));
    }

    #[test]
    fn unmatched_tags_keep_base_speed(tags in prop::collection::vec("[0-9 ]{0,12}", 0..6)) {
        prop_assert_eq!(speed_for_tags(&tags), 5);
    }

    #[test]
    fn swift_step_never_slows(tags in tag_sequence()) {
        let base = speed_for_tags(&tags);
        let mut faster = tags.clone();
        faster.push("Swift Step".to_string());
        prop_assert!(speed_for_tags(&faster) >= base);
    }
}
