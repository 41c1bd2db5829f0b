//! Procedural border strokes
//!
//! One `StrokeStyle` implementation per named style. Each is a pure function of
//! the `Stroke` parameters; styles whose geometry depends on time report
//! themselves as animated so the registry can throttle their redraws.

use std::f64::consts::TAU;

use crate::render::canvas::{Color, DrawList, WHITE};
use crate::util::vec2::Vec2;

/// Points used for ring-shaped styles
const SEGMENTS: usize = 32;

/// Inputs shared by every style
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stroke {
    pub center: Vec2,
    pub radius: f64,
    /// Animation time in milliseconds
    pub time_ms: f64,
    pub width: f64,
    pub color: Color,
}

pub trait StrokeStyle: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the output changes with `Stroke::time_ms`
    fn is_animated(&self) -> bool;

    fn draw(&self, out: &mut DrawList, stroke: &Stroke);
}

/// Closed ring whose radius is perturbed by `offset(angle, index)`
fn ring(stroke: &Stroke, base_radius: f64, phase: f64, offset: impl Fn(f64, usize) -> f64) -> Vec<Vec2> {
    (0..=SEGMENTS)
        .map(|i| {
            let angle = i as f64 * TAU / SEGMENTS as f64 + phase;
            stroke.center.on_circle(angle, base_radius + offset(angle, i))
        })
        .collect()
}

/// Radial segments from `inner` to `inner + length(i)` at `count` evenly spaced angles
fn spokes(
    stroke: &Stroke,
    count: usize,
    phase: impl Fn(usize) -> f64,
    inner: f64,
    length: impl Fn(usize) -> f64,
) -> Vec<Vec<Vec2>> {
    (0..count)
        .map(|i| {
            let angle = i as f64 / count as f64 * TAU + phase(i);
            vec![
                stroke.center.on_circle(angle, inner),
                stroke.center.on_circle(angle, inner + length(i)),
            ]
        })
        .collect()
}

pub struct Solid;

impl StrokeStyle for Solid {
    fn name(&self) -> &'static str {
        "solid"
    }
    fn is_animated(&self) -> bool {
        false
    }
    fn draw(&self, out: &mut DrawList, s: &Stroke) {
        out.stroke_circle(s.center, s.radius, s.width, s.color, 1.0);
    }
}

pub struct Dashed;

impl StrokeStyle for Dashed {
    fn name(&self) -> &'static str {
        "dashed"
    }
    fn is_animated(&self) -> bool {
        false
    }
    fn draw(&self, out: &mut DrawList, s: &Stroke) {
        const DASH: f64 = 8.0;
        const GAP: f64 = 6.0;

        let circumference = TAU * s.radius;
        let dashes = (circumference / (DASH + GAP)).floor().max(0.0) as usize;
        let paths = (0..dashes)
            .map(|i| {
                let start = i as f64 * (DASH + GAP) / circumference * TAU;
                let end = start + DASH / circumference * TAU;
                vec![
                    s.center.on_circle(start, s.radius),
                    s.center.on_circle(end, s.radius),
                ]
            })
            .collect();
        out.stroke_paths(paths, s.width, s.color, 1.0);
    }
}

pub struct Wavy;

impl StrokeStyle for Wavy {
    fn name(&self) -> &'static str {
        "wavy"
    }
    fn is_animated(&self) -> bool {
        true
    }
    fn draw(&self, out: &mut DrawList, s: &Stroke) {
        let shift = s.time_ms * 0.002;
        let path = ring(s, s.radius, 0.0, |angle, _| (angle * 8.0 + shift).sin() * 3.0);
        out.stroke_paths(vec![path], s.width, s.color, 1.0);
    }
}

pub struct Zigzag;

impl StrokeStyle for Zigzag {
    fn name(&self) -> &'static str {
        "zigzag"
    }
    fn is_animated(&self) -> bool {
        false
    }
    fn draw(&self, out: &mut DrawList, s: &Stroke) {
        const POINTS: usize = 12;
        const TOOTH: f64 = 4.0;

        let step = TAU / POINTS as f64;
        let paths = (0..POINTS)
            .map(|i| {
                let angle = i as f64 * step;
                vec![
                    s.center.on_circle(angle, s.radius + TOOTH),
                    s.center.on_circle(angle + step / 2.0, s.radius),
                ]
            })
            .collect();
        out.stroke_paths(paths, s.width, s.color, 1.0);
    }
}

pub struct Chaotic;

impl Chaotic {
    /// Deterministic jitter in [0, 1), reseeded every 100ms
    fn jitter(seed: f64, i: usize) -> f64 {
        let v = ((seed + i as f64) * 12.9898).sin() * 43758.5453;
        v - v.floor()
    }
}

impl StrokeStyle for Chaotic {
    fn name(&self) -> &'static str {
        "chaotic"
    }
    fn is_animated(&self) -> bool {
        true
    }
    fn draw(&self, out: &mut DrawList, s: &Stroke) {
        let seed = (s.time_ms / 100.0).floor();
        let path = ring(s, s.radius, 0.0, |_, i| (Self::jitter(seed, i) - 0.5) * 6.0);
        out.stroke_paths(vec![path], s.width, s.color, 1.0);
    }
}

pub struct Dripping;

impl StrokeStyle for Dripping {
    fn name(&self) -> &'static str {
        "dripping"
    }
    fn is_animated(&self) -> bool {
        true
    }
    fn draw(&self, out: &mut DrawList, s: &Stroke) {
        out.stroke_circle(s.center, s.radius, s.width, s.color, 1.0);

        let t = s.time_ms;
        let drips = spokes(
            s,
            6,
            |i| (t * 0.001 + i as f64).sin() * 0.2,
            s.radius,
            |i| 5.0 + (t * 0.002 + i as f64 * 2.0).sin() * 3.0,
        );
        out.stroke_paths(drips, (s.width - 1.0).max(1.0), s.color, 1.0);
    }
}

pub struct Smoky;

impl StrokeStyle for Smoky {
    fn name(&self) -> &'static str {
        "smoky"
    }
    fn is_animated(&self) -> bool {
        true
    }
    fn draw(&self, out: &mut DrawList, s: &Stroke) {
        for layer in 0..3 {
            let layer_f = layer as f64;
            let drift = s.time_ms * 0.001 + layer_f;
            let path = ring(s, s.radius + layer_f * 2.0, 0.0, |angle, _| {
                (angle * 5.0 + drift).sin() * 2.0
            });
            out.stroke_paths(vec![path], s.width, s.color, 0.3 - layer_f * 0.08);
        }
    }
}

pub struct Glowing;

impl StrokeStyle for Glowing {
    fn name(&self) -> &'static str {
        "glowing"
    }
    fn is_animated(&self) -> bool {
        false
    }
    fn draw(&self, out: &mut DrawList, s: &Stroke) {
        for i in 0..3 {
            let i = i as f64;
            out.stroke_circle(s.center, s.radius + i * 2.0, s.width + i, s.color, 0.4 / (i + 1.0));
        }
    }
}

pub struct Rocky;

impl StrokeStyle for Rocky {
    fn name(&self) -> &'static str {
        "rocky"
    }
    fn is_animated(&self) -> bool {
        false
    }
    fn draw(&self, out: &mut DrawList, s: &Stroke) {
        const ROCKS: usize = 16;

        let paths = (0..ROCKS)
            .map(|i| {
                let angle = i as f64 / ROCKS as f64 * TAU;
                let next = (i + 1) as f64 / ROCKS as f64 * TAU;
                let rock = 3.0 + (i % 3) as f64;
                let r = if i % 2 == 0 { s.radius + rock } else { s.radius - rock };
                vec![s.center.on_circle(angle, r), s.center.on_circle(next, r)]
            })
            .collect();
        out.stroke_paths(paths, s.width, s.color, 1.0);
    }
}

pub struct Swirling;

impl StrokeStyle for Swirling {
    fn name(&self) -> &'static str {
        "swirling"
    }
    fn is_animated(&self) -> bool {
        true
    }
    fn draw(&self, out: &mut DrawList, s: &Stroke) {
        let paths = (0..3)
            .map(|swirl| {
                let phase = swirl as f64 / 3.0 * TAU + s.time_ms * 0.001;
                ring(s, s.radius, phase, |angle, _| (angle * 3.0).sin() * 2.0)
            })
            .collect();
        out.stroke_paths(paths, s.width, s.color, 0.6);
    }
}

pub struct Mystical;

impl StrokeStyle for Mystical {
    fn name(&self) -> &'static str {
        "mystical"
    }
    fn is_animated(&self) -> bool {
        true
    }
    fn draw(&self, out: &mut DrawList, s: &Stroke) {
        const STARS: usize = 8;
        const STAR_SIZE: f64 = 5.0;

        out.stroke_circle(s.center, s.radius, s.width, s.color, 1.0);

        let mut rays = Vec::with_capacity(STARS * 4);
        for i in 0..STARS {
            let angle = i as f64 / STARS as f64 * TAU + s.time_ms * 0.002;
            let star = s.center.on_circle(angle, s.radius);
            for j in 0..4 {
                let ray = angle + j as f64 / 4.0 * TAU;
                rays.push(vec![star, star.on_circle(ray, STAR_SIZE)]);
            }
        }
        out.stroke_paths(rays, 1.0, s.color, 1.0);
    }
}

pub struct Flowing;

impl StrokeStyle for Flowing {
    fn name(&self) -> &'static str {
        "flowing"
    }
    fn is_animated(&self) -> bool {
        true
    }
    fn draw(&self, out: &mut DrawList, s: &Stroke) {
        let flow = s.time_ms * 0.003;
        let path = ring(s, s.radius, 0.0, |angle, _| {
            (angle * 4.0 + flow).sin() * 2.0 + (angle * 2.0 - flow).cos()
        });
        out.stroke_paths(vec![path], s.width, s.color, 1.0);
    }
}

pub struct Metallic;

impl StrokeStyle for Metallic {
    fn name(&self) -> &'static str {
        "metallic"
    }
    fn is_animated(&self) -> bool {
        true
    }
    fn draw(&self, out: &mut DrawList, s: &Stroke) {
        out.stroke_circle(s.center, s.radius, s.width, s.color, 1.0);

        let t = s.time_ms;
        let shines = spokes(s, 4, |_| t * 0.0005, s.radius - 2.0, |_| 8.0);
        out.stroke_paths(shines, 2.0, WHITE, 0.6);
    }
}

pub struct Organic;

impl StrokeStyle for Organic {
    fn name(&self) -> &'static str {
        "organic"
    }
    fn is_animated(&self) -> bool {
        true
    }
    fn draw(&self, out: &mut DrawList, s: &Stroke) {
        let t = s.time_ms * 0.001;
        let path = ring(s, s.radius, 0.0, |angle, _| {
            (angle * 7.0).sin() * 2.0 + (angle * 3.0 + t).sin() * 1.5
        });
        out.stroke_paths(vec![path], s.width, s.color, 1.0);
    }
}

pub struct Aggressive;

impl StrokeStyle for Aggressive {
    fn name(&self) -> &'static str {
        "aggressive"
    }
    fn is_animated(&self) -> bool {
        true
    }
    fn draw(&self, out: &mut DrawList, s: &Stroke) {
        let t = s.time_ms;
        let spikes = spokes(s, 12, |_| 0.0, s.radius, |i| 6.0 + (t * 0.005 + i as f64).sin() * 2.0);
        out.stroke_paths(spikes, s.width, s.color, 1.0);
        out.stroke_circle(s.center, s.radius, (s.width - 1.0).max(1.0), s.color, 1.0);
    }
}

pub struct Shield;

impl StrokeStyle for Shield {
    fn name(&self) -> &'static str {
        "shield"
    }
    fn is_animated(&self) -> bool {
        false
    }
    fn draw(&self, out: &mut DrawList, s: &Stroke) {
        const PANELS: usize = 8;

        let paths = (0..PANELS)
            .map(|i| {
                let angle = i as f64 / PANELS as f64 * TAU;
                let next = (i + 1) as f64 / PANELS as f64 * TAU;
                vec![
                    s.center.on_circle(angle, s.radius),
                    s.center.on_circle((angle + next) / 2.0, s.radius + 3.0),
                    s.center.on_circle(next, s.radius),
                ]
            })
            .collect();
        out.stroke_paths(paths, s.width, s.color, 1.0);
    }
}

/// Named border styles referenced by effect definitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BorderStyle {
    Solid,
    Dashed,
    Wavy,
    Zigzag,
    Chaotic,
    Dripping,
    Smoky,
    Glowing,
    Rocky,
    Swirling,
    Mystical,
    Flowing,
    Metallic,
    Organic,
    Aggressive,
    Shield,
}

impl BorderStyle {
    pub const ALL: [BorderStyle; 16] = [
        BorderStyle::Solid,
        BorderStyle::Dashed,
        BorderStyle::Wavy,
        BorderStyle::Zigzag,
        BorderStyle::Chaotic,
        BorderStyle::Dripping,
        BorderStyle::Smoky,
        BorderStyle::Glowing,
        BorderStyle::Rocky,
        BorderStyle::Swirling,
        BorderStyle::Mystical,
        BorderStyle::Flowing,
        BorderStyle::Metallic,
        BorderStyle::Organic,
        BorderStyle::Aggressive,
        BorderStyle::Shield,
    ];

    /// Generator implementing this style
    pub fn stroke(self) -> &'static dyn StrokeStyle {
        match self {
            BorderStyle::Solid => &Solid,
            BorderStyle::Dashed => &Dashed,
            BorderStyle::Wavy => &Wavy,
            BorderStyle::Zigzag => &Zigzag,
            BorderStyle::Chaotic => &Chaotic,
            BorderStyle::Dripping => &Dripping,
            BorderStyle::Smoky => &Smoky,
            BorderStyle::Glowing => &Glowing,
            BorderStyle::Rocky => &Rocky,
            BorderStyle::Swirling => &Swirling,
            BorderStyle::Mystical => &Mystical,
            BorderStyle::Flowing => &Flowing,
            BorderStyle::Metallic => &Metallic,
            BorderStyle::Organic => &Organic,
            BorderStyle::Aggressive => &Aggressive,
            BorderStyle::Shield => &Shield,
        }
    }

    /// Look up a style by keyword; unknown names fall back to solid
    pub fn from_keyword(keyword: &str) -> BorderStyle {
        Self::ALL
            .iter()
            .copied()
            .find(|style| style.name().eq_ignore_ascii_case(keyword))
            .unwrap_or(BorderStyle::Solid)
    }

    #[inline]
    pub fn name(self) -> &'static str {
        self.stroke().name()
    }

    #[inline]
    pub fn is_animated(self) -> bool {
        self.stroke().is_animated()
    }
}
