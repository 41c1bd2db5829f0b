//! Deterministic speed mapping from a card tag sequence

use crate::game::constants::movement::BASE_SPEED;

/// Ordered keyword table; the first keyword contained in a tag wins
const SPEED_KEYWORDS: &[(&str, f64)] = &[
    ("swift step", 1.2),
    ("quick", 1.1),
    ("haste", 1.15),
    ("fleet", 1.1),
    ("berserker", 1.05),
    ("heavy", 0.9),
    ("guardian", 0.95),
];

/// Tags belonging to the speed set family
const SET_FAMILY: &str = "berserker's rage";

/// Set bonus tiers (pieces owned, multiplier), highest first
const SET_TIERS: &[(usize, f64)] = &[(3, 1.5), (2, 1.1)];

/// Multiplier of the first keyword the lower-cased tag contains
fn tag_multiplier(tag_lower: &str) -> Option<f64> {
    SPEED_KEYWORDS
        .iter()
        .find(|(keyword, _)| tag_lower.contains(keyword))
        .map(|&(_, multiplier)| multiplier)
}

/// Map a tag sequence to the integer speed the server will settle on
pub fn speed_for_tags<S: AsRef<str>>(tags: &[S]) -> u32 {
    let mut speed = BASE_SPEED;
    let mut set_pieces = 0usize;

    for tag in tags {
        let lower = tag.as_ref().to_lowercase();
        if let Some(multiplier) = tag_multiplier(&lower) {
            speed *= multiplier;
        }
        if lower.contains(SET_FAMILY) {
            set_pieces += 1;
        }
    }

    if let Some(&(_, bonus)) = SET_TIERS.iter().find(|(pieces, _)| set_pieces >= *pieces) {
        speed *= bonus;
    }

    speed.round().max(0.0) as u32
}
