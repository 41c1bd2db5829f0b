//! Derived values the HUD panels consume
//!
//! Nothing here draws; the layout layer reads a `HudSnapshot` each frame.

use std::cmp::Ordering;

use crate::net::protocol::{GameStateData, PlayerSnapshot};
use crate::util::vec2::Vec2;

/// Rows shown on the leaderboard
pub const LEADERBOARD_SIZE: usize = 10;

/// Card sets and their parts, as named by the server
pub const CARD_SETS: [(&str, [&str; 3]); 4] = [
    (
        "Berserker",
        ["Berserker's Rage I", "Berserker's Rage II", "Berserker's Rage III"],
    ),
    (
        "Guardian",
        ["Guardian's Shield I", "Guardian's Shield II", "Guardian's Shield III"],
    ),
    ("Toxic", ["Toxic Touch I", "Toxic Touch II", "Toxic Touch III"]),
    ("Vampire", ["Blood Hunger I", "Blood Hunger II", "Blood Hunger III"]),
];

#[derive(Debug, Clone, PartialEq)]
pub struct RankEntry {
    pub rank: usize,
    pub id: String,
    pub score: i64,
    pub is_local: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetProgress {
    pub name: &'static str,
    pub owned: usize,
    pub total: usize,
}

impl SetProgress {
    pub fn is_complete(&self) -> bool {
        self.owned >= self.total
    }
}

/// Direction and distance from the local entity to the leader
#[derive(Debug, Clone, PartialEq)]
pub struct Bearing {
    pub target: String,
    /// Radians, `atan2(dy, dx)`
    pub angle: f64,
    pub distance: f64,
}

/// `value / max`, clamped to [0, 1]; `None` hides the gauge
pub fn ratio(value: f64, max: f64) -> Option<f64> {
    (max > 0.0).then(|| (value / max).clamp(0.0, 1.0))
}

fn by_rank(a: &PlayerSnapshot, b: &PlayerSnapshot) -> Ordering {
    b.score.cmp(&a.score).then_with(|| a.id.cmp(&b.id))
}

/// Full ranking: score descending, ties by id ascending
pub fn ranking(players: &[PlayerSnapshot], local_id: Option<&str>) -> Vec<RankEntry> {
    let mut sorted: Vec<&PlayerSnapshot> = players.iter().collect();
    sorted.sort_by(|a, b| by_rank(a, b));
    sorted
        .into_iter()
        .enumerate()
        .map(|(i, p)| RankEntry {
            rank: i + 1,
            id: p.id.clone(),
            score: p.score,
            is_local: Some(p.id.as_str()) == local_id,
        })
        .collect()
}

/// Parts owned per card set
pub fn set_progress<S: AsRef<str>>(applied_cards: &[S]) -> [SetProgress; 4] {
    CARD_SETS.map(|(name, parts)| SetProgress {
        name,
        owned: parts
            .iter()
            .filter(|part| applied_cards.iter().any(|c| c.as_ref() == **part))
            .count(),
        total: parts.len(),
    })
}

/// Bearing to the top-ranked entity other than the local one
pub fn leader_bearing(from: Vec2, players: &[PlayerSnapshot], local_id: Option<&str>) -> Option<Bearing> {
    let leader = players
        .iter()
        .filter(|p| Some(p.id.as_str()) != local_id)
        .min_by(|a, b| by_rank(a, b))?;
    let delta = leader.position() - from;
    Some(Bearing {
        target: leader.id.clone(),
        angle: delta.angle(),
        distance: delta.length(),
    })
}

/// Everything the HUD shows for one frame
#[derive(Debug, Clone, PartialEq)]
pub struct HudSnapshot {
    pub leaderboard: Vec<RankEntry>,
    /// Local rank when it falls outside the leaderboard rows
    pub local_rank: Option<RankEntry>,
    pub health_ratio: Option<f64>,
    pub barrier_ratio: Option<f64>,
    pub card_progress: Option<f64>,
    pub score: i64,
    pub sets: [SetProgress; 4],
    pub leader: Option<Bearing>,
}

impl HudSnapshot {
    /// Derive HUD values from the latest snapshot and the local prediction
    ///
    /// `local` is the local player's authoritative record; `position` its
    /// predicted position.
    pub fn derive(
        state: &GameStateData,
        local: Option<&PlayerSnapshot>,
        position: Vec2,
    ) -> Self {
        let local_id = local.map(|p| p.id.as_str());
        let mut full = ranking(&state.players, local_id);
        let local_rank = full
            .iter()
            .skip(LEADERBOARD_SIZE)
            .find(|e| e.is_local)
            .cloned();
        full.truncate(LEADERBOARD_SIZE);

        let applied: &[String] = local.map(|p| p.applied_cards.as_slice()).unwrap_or(&[]);

        Self {
            leaderboard: full,
            local_rank,
            health_ratio: local.and_then(|p| ratio(p.health, p.max_health)),
            barrier_ratio: local.and_then(|p| ratio(p.barrier, p.max_barrier)),
            card_progress: local.and_then(|p| ratio(p.score as f64, p.next_card_score as f64)),
            score: local.map_or(0, |p| p.score),
            sets: set_progress(applied),
            leader: leader_bearing(position, &state.players, local_id),
        }
    }
}
