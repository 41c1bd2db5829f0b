//! Card tag -> visual layer resolution
//!
//! Each tag is matched against an ordered definition table (first keyword
//! contained in the lower-cased tag wins). The matched entries are then
//! stable-sorted by definition priority, so ties keep tag order. Results are
//! cached by the exact tag sequence.

use std::sync::Arc;

use hashbrown::HashMap;
use smallvec::SmallVec;
use tracing::debug;

use crate::game::constants::render::HIGHLIGHT_RATIO;
use crate::render::canvas::{Color, DrawList, WHITE};
use crate::render::stroke::{BorderStyle, Stroke};
use crate::util::vec2::Vec2;

/// Cached layer sets before the cache is flushed
const MAX_CACHED: usize = 1024;

/// Outline used when an entity has no layers at all
const PLAIN_OUTLINE: Color = 0x777777;
const PLAIN_OUTLINE_WIDTH: f64 = 2.0;
const HIGHLIGHT_ALPHA: f64 = 0.12;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FillLayer {
    pub color: Color,
    pub alpha: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BorderLayer {
    pub color: Color,
    pub width: f64,
    pub style: BorderStyle,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AuraLayer {
    pub color: Color,
    /// Extent beyond the entity's body
    pub radius: f64,
    pub alpha: f64,
}

/// Ordered visual layers for one tag sequence
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EffectLayerSet {
    pub fills: SmallVec<[FillLayer; 4]>,
    pub borders: SmallVec<[BorderLayer; 4]>,
    pub auras: SmallVec<[AuraLayer; 4]>,
}

impl EffectLayerSet {
    pub fn is_empty(&self) -> bool {
        self.fills.is_empty() && self.borders.is_empty() && self.auras.is_empty()
    }

    /// True if any border's geometry varies with time
    pub fn is_animated(&self) -> bool {
        self.borders.iter().any(|b| b.style.is_animated())
    }

    /// Paint a body of radius `size` centred on the origin
    ///
    /// Order: auras (largest first), fills, borders stacked outward, highlight.
    pub fn paint(&self, out: &mut DrawList, size: f64, time_ms: f64) {
        let center = Vec2::ZERO;

        if self.is_empty() {
            out.stroke_circle(center, size, PLAIN_OUTLINE_WIDTH, PLAIN_OUTLINE, 1.0);
            return;
        }

        let mut auras: SmallVec<[&AuraLayer; 4]> = self.auras.iter().collect();
        auras.sort_by(|a, b| b.radius.total_cmp(&a.radius));
        for aura in auras {
            out.fill_circle(center, size + aura.radius, aura.color, aura.alpha);
        }

        for fill in &self.fills {
            out.fill_circle(center, size, fill.color, fill.alpha);
        }

        let mut offset = 0.0;
        for border in &self.borders {
            border.style.stroke().draw(
                out,
                &Stroke {
                    center,
                    radius: size + offset,
                    time_ms,
                    width: border.width,
                    color: border.color,
                },
            );
            offset += border.width + 1.0;
        }

        out.fill_circle(center, size * HIGHLIGHT_RATIO, WHITE, HIGHLIGHT_ALPHA);
    }
}

struct EffectDefinition {
    keywords: &'static [&'static str],
    /// Lower draws first
    priority: u8,
    fill: FillLayer,
    border: BorderLayer,
    aura: AuraLayer,
}

const fn def(
    keywords: &'static [&'static str],
    priority: u8,
    fill: (Color, f64),
    border: (Color, f64, BorderStyle),
    aura: (f64, f64),
) -> EffectDefinition {
    EffectDefinition {
        keywords,
        priority,
        fill: FillLayer {
            color: fill.0,
            alpha: fill.1,
        },
        border: BorderLayer {
            color: border.0,
            width: border.1,
            style: border.2,
        },
        aura: AuraLayer {
            color: fill.0,
            radius: aura.0,
            alpha: aura.1,
        },
    }
}

/// Scanned in order; the first definition with a keyword contained in the tag wins
static DEFINITIONS: &[EffectDefinition] = &[
    def(&["poison", "toxic"], 2, (0x77ff77, 0.45), (0x44dd44, 2.0, BorderStyle::Dashed), (6.0, 0.15)),
    def(&["fire", "flame"], 2, (0xff7733, 0.5), (0xff4400, 2.0, BorderStyle::Wavy), (8.0, 0.2)),
    def(&["ice", "frost"], 2, (0x77ddff, 0.4), (0x4499ff, 2.0, BorderStyle::Zigzag), (7.0, 0.18)),
    def(&["lightning", "storm"], 2, (0xffff44, 0.35), (0xffdd00, 3.0, BorderStyle::Chaotic), (10.0, 0.12)),
    def(&["blood", "vampire"], 2, (0xcc3333, 0.55), (0xaa0000, 2.0, BorderStyle::Dripping), (5.0, 0.2)),
    def(&["shadow", "dark"], 1, (0x554477, 0.6), (0x332255, 3.0, BorderStyle::Smoky), (12.0, 0.25)),
    def(&["holy", "divine"], 1, (0xffffaa, 0.42), (0xffff66, 3.0, BorderStyle::Glowing), (15.0, 0.15)),
    def(&["earth", "stone"], 4, (0x996633, 0.48), (0x774422, 3.0, BorderStyle::Rocky), (6.0, 0.22)),
    def(&["wind", "air"], 3, (0xaaffee, 0.35), (0x77ddcc, 2.0, BorderStyle::Swirling), (14.0, 0.12)),
    def(&["arcane", "magic"], 3, (0xff66ff, 0.4), (0xdd44dd, 2.0, BorderStyle::Mystical), (10.0, 0.18)),
    def(&["ocean", "water"], 3, (0x3377ff, 0.45), (0x2255dd, 2.0, BorderStyle::Flowing), (9.0, 0.16)),
    def(&["metal", "steel"], 4, (0xcccccc, 0.5), (0x999999, 3.0, BorderStyle::Metallic), (5.0, 0.2)),
    def(&["nature", "life"], 4, (0x66dd66, 0.43), (0x44bb44, 2.0, BorderStyle::Organic), (11.0, 0.17)),
    def(&["berserker", "rage"], 1, (0xff4444, 0.55), (0xdd2222, 3.0, BorderStyle::Aggressive), (8.0, 0.22)),
    def(&["guardian", "shield"], 1, (0x4488ff, 0.48), (0x2266dd, 4.0, BorderStyle::Shield), (6.0, 0.2)),
];

/// Unmatched tags draw after every themed layer
const NEUTRAL_PRIORITY: u8 = 9;
const NEUTRAL_FILL: FillLayer = FillLayer {
    color: 0x7777cc,
    alpha: 0.6,
};
const NEUTRAL_BORDER: BorderLayer = BorderLayer {
    color: 0x5555aa,
    width: 2.0,
    style: BorderStyle::Solid,
};

fn match_definition(tag_lower: &str) -> Option<&'static EffectDefinition> {
    DEFINITIONS
        .iter()
        .find(|d| d.keywords.iter().any(|k| tag_lower.contains(k)))
}

/// Resolve a tag sequence without caching
pub fn resolve_layers<S: AsRef<str>>(tags: &[S]) -> EffectLayerSet {
    let mut entries: SmallVec<[(u8, FillLayer, BorderLayer, Option<AuraLayer>); 8]> = tags
        .iter()
        .map(|tag| match match_definition(&tag.as_ref().to_lowercase()) {
            Some(d) => (d.priority, d.fill, d.border, Some(d.aura)),
            None => (NEUTRAL_PRIORITY, NEUTRAL_FILL, NEUTRAL_BORDER, None),
        })
        .collect();

    // Stable: equal priorities keep tag order
    entries.sort_by_key(|entry| entry.0);

    let mut set = EffectLayerSet::default();
    for (_, fill, border, aura) in entries {
        set.fills.push(fill);
        set.borders.push(border);
        if let Some(aura) = aura {
            set.auras.push(aura);
        }
    }
    set
}

/// Caching resolver keyed by the exact tag sequence
#[derive(Debug, Default)]
pub struct EffectLayerResolver {
    cache: HashMap<Arc<[String]>, Arc<EffectLayerSet>>,
    hits: u64,
    misses: u64,
}

impl EffectLayerResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(&mut self, tags: &[String]) -> Arc<EffectLayerSet> {
        if let Some(set) = self.cache.get(tags) {
            self.hits += 1;
            return set.clone();
        }

        self.misses += 1;
        if self.cache.len() >= MAX_CACHED {
            debug!("Effect cache full ({} entries), flushing", self.cache.len());
            self.cache.clear();
        }

        let set = Arc::new(resolve_layers(tags));
        self.cache.insert(Arc::from(tags), set.clone());
        set
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::canvas::DrawCommand;

    fn tags(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_tags() {
        let set = resolve_layers::<&str>(&[]);
        assert!(set.is_empty());
        assert!(!set.is_animated());
    }

    #[test]
    fn test_single_match() {
        let set = resolve_layers(&["Fireball II"]);
        assert_eq!(set.fills.len(), 1);
        assert_eq!(set.borders[0].style, BorderStyle::Wavy);
        assert_eq!(set.auras.len(), 1);
        assert!(set.is_animated());
    }

    #[test]
    fn test_first_keyword_wins() {
        // Contains both "poison" and "fire"; poison comes first in the table
        let set = resolve_layers(&["Poison Fire"]);
        assert_eq!(set.borders.len(), 1);
        assert_eq!(set.borders[0].style, BorderStyle::Dashed);
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(resolve_layers(&["FROST NOVA"]), resolve_layers(&["frost nova"]));
    }

    #[test]
    fn test_unmatched_tag_is_neutral() {
        let set = resolve_layers(&["Mystery Box"]);
        assert_eq!(set.fills[0], NEUTRAL_FILL);
        assert_eq!(set.borders[0], NEUTRAL_BORDER);
        assert!(set.auras.is_empty());
        assert!(!set.is_animated());
    }

    #[test]
    fn test_priority_sort_is_stable() {
        // earth (4), guardian (1), unmatched (9), holy (1), poison (2)
        let set = resolve_layers(&[
            "Stone Skin",
            "Guardian's Shield I",
            "Lucky Charm",
            "Holy Light",
            "Toxic Touch I",
        ]);
        let styles: Vec<_> = set.borders.iter().map(|b| b.style).collect();
        assert_eq!(
            styles,
            vec![
                BorderStyle::Shield,
                BorderStyle::Glowing,
                BorderStyle::Dashed,
                BorderStyle::Rocky,
                BorderStyle::Solid,
            ]
        );
        // Neutral tag contributes no aura
        assert_eq!(set.auras.len(), 4);
    }

    #[test]
    fn test_duplicate_tags_stack() {
        let set = resolve_layers(&["Ice Shard", "Ice Shard"]);
        assert_eq!(set.fills.len(), 2);
        assert_eq!(set.borders.len(), 2);
    }

    #[test]
    fn test_static_definitions() {
        for name in ["Ice", "Holy", "Earth", "Guardian", "Poison"] {
            assert!(!resolve_layers(&[name]).is_animated(), "{}", name);
        }
        for name in ["Fire", "Storm", "Blood", "Shadow", "Wind", "Magic", "Water", "Steel", "Life", "Rage"] {
            assert!(resolve_layers(&[name]).is_animated(), "{}", name);
        }
    }

    #[test]
    fn test_cache_hits_and_exact_keys() {
        let mut resolver = EffectLayerResolver::new();
        let a = resolver.resolve(&tags(&["Fire I", "Ice I"]));
        let b = resolver.resolve(&tags(&["Fire I", "Ice I"]));
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(resolver.hits(), 1);
        assert_eq!(resolver.misses(), 1);

        // Same characters, different split: must be a separate entry
        resolver.resolve(&tags(&["Fire IIce I"]));
        assert_eq!(resolver.misses(), 2);
        assert_eq!(resolver.cached(), 2);

        // Order matters
        resolver.resolve(&tags(&["Ice I", "Fire I"]));
        assert_eq!(resolver.misses(), 3);
    }

    #[test]
    fn test_cache_matches_pure_resolve() {
        let mut resolver = EffectLayerResolver::new();
        let input = tags(&["Dark Pact", "Vampire Fang", "Steel Plating"]);
        assert_eq!(*resolver.resolve(&input), resolve_layers(&input));
    }

    #[test]
    fn test_paint_plain_outline() {
        let mut out = DrawList::new();
        EffectLayerSet::default().paint(&mut out, 30.0, 0.0);
        assert_eq!(out.len(), 1);
        assert!(matches!(
            out.commands()[0],
            DrawCommand::StrokeCircle { radius, .. } if radius == 30.0
        ));
    }

    #[test]
    fn test_paint_order() {
        // Two auras (radius 6 then 15), two fills, two solid-ish borders
        let set = resolve_layers(&["Guardian I", "Holy I"]);
        let mut out = DrawList::new();
        set.paint(&mut out, 40.0, 0.0);
        let cmds = out.commands();

        // Auras first, largest first
        assert_eq!(cmds[0].radius(), Some(40.0 + 15.0));
        assert_eq!(cmds[1].radius(), Some(40.0 + 6.0));
        // Fills at body radius
        assert!(matches!(cmds[2], DrawCommand::FillCircle { radius, .. } if radius == 40.0));
        assert!(matches!(cmds[3], DrawCommand::FillCircle { radius, .. } if radius == 40.0));
        // Shield border at offset 0 (paths), glowing border offset by 4 + 1
        assert!(matches!(cmds[4], DrawCommand::StrokePaths { .. }));
        assert_eq!(cmds[5].radius(), Some(45.0));
        // Highlight last
        let last = cmds.last().unwrap();
        assert!(matches!(
            last,
            DrawCommand::FillCircle { radius, color: WHITE, .. } if (*radius - 14.0).abs() < 1e-9
        ));
    }
}
