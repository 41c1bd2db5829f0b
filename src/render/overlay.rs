//! Secondary per-entity drawables: health bar and the cheap overlays
//! (server auras, barrier ring, active-effect particles)

use std::f64::consts::TAU;

use smallvec::SmallVec;

use crate::game::constants::render::{
    HEALTH_BAR_GAP, HEALTH_BAR_HEIGHT, HEALTH_BAR_WIDTH_RATIO, HP_PER_TIER,
};
use crate::net::protocol::PlayerSnapshot;
use crate::render::canvas::{Color, DrawList, WHITE};
use crate::util::vec2::Vec2;

const BAR_BACKGROUND: Color = 0xcc7777;
const BAR_FILL: Color = 0x77cc77;
const BAR_TIER: Color = 0x333333;

/// Tier marks closer than this are not drawn at all
const MIN_TIER_SPACING: f64 = 2.0;

const BARRIER_HEXES: usize = 8;
const BARRIER_GAP: f64 = 12.0;
const BARRIER_HEX_RADIUS: f64 = 6.0;

const EFFECT_PARTICLES: usize = 3;

/// Health bar layout relative to the entity centre
#[derive(Debug, Clone, PartialEq)]
pub struct HealthBarGeometry {
    /// Top-left corner
    pub origin: Vec2,
    pub width: f64,
    pub height: f64,
    pub fill_width: f64,
    /// X offsets (from `origin`) of the tier tick marks
    pub tiers: SmallVec<[f64; 8]>,
}

impl HealthBarGeometry {
    /// Lay out the bar; `None` hides it when the maximum is non-positive
    pub fn layout(size: f64, health: f64, max_health: f64) -> Option<Self> {
        if max_health <= 0.0 {
            return None;
        }

        let width = size * HEALTH_BAR_WIDTH_RATIO;
        let ratio = (health / max_health).clamp(0.0, 1.0);
        // Huge maxima would produce unreadable (and unbounded) tick runs
        let tier_count = (max_health / HP_PER_TIER).floor();
        let tiers = if tier_count.is_finite() && tier_count * MIN_TIER_SPACING <= width {
            (1..=tier_count as usize)
                .map(|i| width * (i as f64 * HP_PER_TIER / max_health))
                .collect()
        } else {
            SmallVec::new()
        };

        Some(Self {
            origin: Vec2::new(-width / 2.0, -size - HEALTH_BAR_GAP),
            width,
            height: HEALTH_BAR_HEIGHT,
            fill_width: width * ratio,
            tiers,
        })
    }

    pub fn paint(&self, out: &mut DrawList) {
        out.fill_rect(self.origin, self.width, self.height, BAR_BACKGROUND, 1.0);
        out.fill_rect(self.origin, self.fill_width, self.height, BAR_FILL, 1.0);

        let ticks = self
            .tiers
            .iter()
            .map(|&x| {
                vec![
                    self.origin + Vec2::new(x, 0.0),
                    self.origin + Vec2::new(x, self.height),
                ]
            })
            .collect();
        out.stroke_paths(ticks, 2.0, BAR_TIER, 0.6);
    }
}

fn aura_color(kind: &str) -> Color {
    match kind {
        "damage" => 0x000000,
        "slow" => 0x4444ff,
        "poison" => 0x44ff44,
        "lifesteal" => 0xff0000,
        _ => WHITE,
    }
}

fn effect_color(kind: &str) -> Color {
    match kind {
        "poison" => 0x44ff44,
        "burn" => 0xff4444,
        "regen" => 0x44ffff,
        _ => WHITE,
    }
}

/// Paint server auras, the barrier ring and active-effect particles
pub fn paint_overlays(out: &mut DrawList, player: &PlayerSnapshot, size: f64, time_ms: f64) {
    let center = Vec2::ZERO;

    // Auras pulse together
    let pulse = 0.12 + (time_ms * 0.003).sin() * 0.04;
    let ring_offset = (time_ms * 0.005).sin() * 2.0;
    for aura in &player.auras {
        let color = aura_color(&aura.kind);
        out.fill_circle(center, aura.radius, color, pulse);
        out.stroke_circle(center, aura.radius - 3.0 + ring_offset, 2.0, color, pulse * 2.5);
    }

    if player.barrier > 0.0 && player.max_barrier > 0.0 {
        let ratio = (player.barrier / player.max_barrier).clamp(0.0, 1.0);
        let phase = time_ms * 0.001;
        for i in 0..BARRIER_HEXES {
            let angle = i as f64 * TAU / BARRIER_HEXES as f64 + phase;
            let hex = center.on_circle(angle, size + BARRIER_GAP);
            out.fill_circle(hex, BARRIER_HEX_RADIUS, 0x4488ff, ratio * 0.6);
            out.stroke_circle(hex, BARRIER_HEX_RADIUS, 2.0, 0x88bbff, ratio * 0.8);
        }
    }

    let phase = time_ms * 0.002;
    for effect in &player.active_effects {
        let color = effect_color(&effect.kind);
        for i in 0..EFFECT_PARTICLES {
            let angle = (phase + i as f64 * TAU / EFFECT_PARTICLES as f64) % TAU;
            out.fill_circle(center.on_circle(angle, size * 0.6), 3.0, color, 0.6);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::protocol::{ActiveEffectSnapshot, AuraSnapshot};

    #[test]
    fn test_health_bar_layout() {
        let bar = HealthBarGeometry::layout(40.0, 250.0, 300.0).unwrap();
        assert_eq!(bar.width, 60.0);
        assert_eq!(bar.height, 6.0);
        assert_eq!(bar.origin, Vec2::new(-30.0, -55.0));
        assert!((bar.fill_width - 50.0).abs() < 1e-9);
        assert_eq!(bar.tiers.len(), 3);
        assert!((bar.tiers[0] - 20.0).abs() < 1e-9);
        assert!((bar.tiers[2] - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_health_bar_hidden_without_max() {
        assert!(HealthBarGeometry::layout(40.0, 10.0, 0.0).is_none());
        assert!(HealthBarGeometry::layout(40.0, 10.0, -5.0).is_none());
    }

    #[test]
    fn test_health_bar_extreme_max() {
        let bar = HealthBarGeometry::layout(40.0, 1.0, 1e300).unwrap();
        assert!(bar.tiers.is_empty());
        assert_eq!(bar.width, 60.0);

        let bar = HealthBarGeometry::layout(40.0, 1.0, 1e8).unwrap();
        assert!(bar.tiers.is_empty());

        let bar = HealthBarGeometry::layout(40.0, 1.0, f64::INFINITY).unwrap();
        assert!(bar.tiers.is_empty());
        assert_eq!(bar.fill_width, 0.0);

        // 60 wide fits 30 marks at the minimum spacing
        assert_eq!(HealthBarGeometry::layout(40.0, 1.0, 3000.0).unwrap().tiers.len(), 30);
        assert!(HealthBarGeometry::layout(40.0, 1.0, 3100.0).unwrap().tiers.is_empty());
    }

    #[test]
    fn test_health_ratio_clamped() {
        let over = HealthBarGeometry::layout(40.0, 500.0, 100.0).unwrap();
        assert_eq!(over.fill_width, over.width);
        let under = HealthBarGeometry::layout(40.0, -20.0, 100.0).unwrap();
        assert_eq!(under.fill_width, 0.0);
    }

    #[test]
    fn test_health_bar_paint() {
        let mut out = DrawList::new();
        HealthBarGeometry::layout(40.0, 50.0, 99.0).unwrap().paint(&mut out);
        // No tiers below 100 hp, so background + fill only
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_overlays_empty_player() {
        let mut out = DrawList::new();
        paint_overlays(&mut out, &PlayerSnapshot::default(), 40.0, 0.0);
        assert!(out.is_empty());
    }

    #[test]
    fn test_barrier_hidden_without_max() {
        let player = PlayerSnapshot {
            barrier: 30.0,
            max_barrier: 0.0,
            ..Default::default()
        };
        let mut out = DrawList::new();
        paint_overlays(&mut out, &player, 40.0, 0.0);
        assert!(out.is_empty());
    }

    #[test]
    fn test_overlay_counts() {
        let player = PlayerSnapshot {
            barrier: 25.0,
            max_barrier: 50.0,
            auras: vec![AuraSnapshot {
                kind: "poison".to_string(),
                radius: 60.0,
                strength: 3.0,
            }],
            active_effects: vec![
                ActiveEffectSnapshot {
                    kind: "burn".to_string(),
                    remaining: 1.0,
                },
                ActiveEffectSnapshot {
                    kind: "regen".to_string(),
                    remaining: 2.0,
                },
            ],
            ..Default::default()
        };
        let mut out = DrawList::new();
        paint_overlays(&mut out, &player, 40.0, 500.0);
        // aura fill + ring, 8 hexes x 2, 2 effects x 3 particles
        assert_eq!(out.len(), 2 + 16 + 6);
    }
}
