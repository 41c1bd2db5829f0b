//! Headless steering for the binary
//!
//! Stands in for keyboard input: chase the leader when one exists, otherwise
//! wander. Also answers card offers, preferring sets already in progress.

use rand::Rng;

use crate::catalog::CardCatalog;
use crate::hud::{Bearing, CARD_SETS};
use crate::net::protocol::{CardDef, CardId, InputState};

/// How long a wander heading is held (ms)
const WANDER_HOLD_MS: u64 = 2_000;
/// Closer than this the leader is considered reached
const ARRIVE_DISTANCE: f64 = 30.0;
/// sin(22.5 deg); axis components below this are not pressed
const AXIS_THRESHOLD: f64 = 0.382_683_432;

/// Keys approximating a heading in radians (screen coordinates, +y down)
pub fn keys_for_angle(angle: f64) -> InputState {
    let (dy, dx) = angle.sin_cos();
    InputState {
        w: dy < -AXIS_THRESHOLD,
        s: dy > AXIS_THRESHOLD,
        a: dx < -AXIS_THRESHOLD,
        d: dx > AXIS_THRESHOLD,
    }
}

pub struct Autopilot<R: Rng> {
    rng: R,
    heading: f64,
    next_turn_ms: u64,
}

impl<R: Rng> Autopilot<R> {
    pub fn new(rng: R) -> Self {
        Self {
            rng,
            heading: 0.0,
            next_turn_ms: 0,
        }
    }

    /// Input for this frame
    pub fn steer(&mut self, leader: Option<&Bearing>, now_ms: u64) -> InputState {
        match leader {
            Some(bearing) if bearing.distance > ARRIVE_DISTANCE => keys_for_angle(bearing.angle),
            Some(_) => InputState::default(),
            None => {
                if now_ms >= self.next_turn_ms {
                    self.heading = self.rng.gen_range(-std::f64::consts::PI..std::f64::consts::PI);
                    self.next_turn_ms = now_ms + WANDER_HOLD_MS;
                }
                keys_for_angle(self.heading)
            }
        }
    }
}

/// Pick a card from an offer
///
/// Cards completing the most advanced set win; otherwise the first card.
/// Offer entries without a name are looked up in the catalog.
pub fn pick_card<S: AsRef<str>>(
    offer: &[CardDef],
    applied_cards: &[S],
    catalog: &CardCatalog,
) -> Option<CardId> {
    let owned = |name: &str| applied_cards.iter().any(|c| c.as_ref() == name);

    offer
        .iter()
        .enumerate()
        .max_by_key(|(index, card)| {
            let name = if card.name.is_empty() {
                catalog.get(card.id).map(|c| c.name.as_str()).unwrap_or("")
            } else {
                card.name.as_str()
            };
            let progress = CARD_SETS
                .iter()
                .find(|(_, parts)| parts.contains(&name))
                .map(|(_, parts)| parts.iter().filter(|p| owned(**p)).count() + 1)
                .filter(|_| !owned(name))
                .unwrap_or(0);
            // Earlier offers win ties
            (progress, std::cmp::Reverse(*index))
        })
        .map(|(_, card)| card.id)
}
