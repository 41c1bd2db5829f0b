//! Local prediction and reconciliation
//!
//! The local entity is simulated every tick with the same movement model the
//! server runs, then nudged toward each authoritative snapshot. A snapshot
//! never replaces the predicted state wholesale.

use tracing::{debug, info};

use crate::game::constants::{
    acceleration_factor, input_interval_ms, movement, reconcile, reconcile_factor, world,
};
use crate::game::speed::speed_for_tags;
use crate::net::protocol::{EntityId, GameStateData, InputState, PlayerSnapshot};
use crate::util::vec2::Vec2;

/// Size of a freshly spawned player
const DEFAULT_SIZE: f64 = 40.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// No snapshot has contained the local identity yet
    Unidentified,
    /// Prediction active
    Tracking,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocalPredictedState {
    pub position: Vec2,
    pub velocity: Vec2,
    pub current_speed: f64,
    pub target_speed: f64,
    pub base_speed: f64,
    pub size: f64,
    /// Fraction of speed removed by slowing effects, in [0, 1]
    pub slow_effect: f64,
}

impl Default for LocalPredictedState {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            velocity: Vec2::ZERO,
            current_speed: movement::BASE_SPEED,
            target_speed: movement::BASE_SPEED,
            base_speed: movement::BASE_SPEED,
            size: DEFAULT_SIZE,
            slow_effect: 0.0,
        }
    }
}

impl LocalPredictedState {
    /// One step of the shared movement model
    fn step(&mut self, input: &InputState) {
        // Speed glide toward the card-derived target
        let delta = self.target_speed - self.current_speed;
        if delta.abs() > movement::SPEED_SNAP_EPSILON {
            self.current_speed += delta * movement::SPEED_GLIDE;
        } else {
            self.current_speed = self.target_speed;
        }

        let mut direction = Vec2::ZERO;
        if input.w {
            direction.y -= 1.0;
        }
        if input.s {
            direction.y += 1.0;
        }
        if input.a {
            direction.x -= 1.0;
        }
        if input.d {
            direction.x += 1.0;
        }
        let desired = direction * (self.current_speed * (1.0 - self.slow_effect));

        let accel = acceleration_factor(self.current_speed);
        self.velocity += (desired - self.velocity) * accel;

        self.position += self.velocity;
        self.velocity = self.velocity.round_to(movement::VELOCITY_DECIMALS);
        self.position = self.position.round_to(movement::POSITION_DECIMALS);

        self.clamp_to_world();
    }

    fn clamp_to_world(&mut self) {
        let limit = (world::HALF_EXTENT - self.size).max(0.0);
        self.position = self.position.clamp(-limit, limit);
    }
}

/// What applying a snapshot did to the prediction
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SnapshotOutcome {
    /// First sighting of the local entity; prediction seeded from it
    Initialized,
    /// Position blended toward the server; `error` is the divergence before blending
    Reconciled { error: f64 },
    /// Snapshot gap exceeded the stall threshold; extrapolated instead
    DeadReckoned,
    /// No identity yet, or the snapshot does not contain the local entity
    Absent,
}

#[derive(Debug)]
pub struct SyncState {
    local_id: Option<EntityId>,
    phase: SyncPhase,
    predicted: LocalPredictedState,
    /// Latest authoritative record of the local entity
    authoritative: Option<PlayerSnapshot>,
    last_snapshot_at: Option<u64>,
    last_input_at: Option<u64>,
}

impl Default for SyncState {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncState {
    pub fn new() -> Self {
        Self {
            local_id: None,
            phase: SyncPhase::Unidentified,
            predicted: LocalPredictedState::default(),
            authoritative: None,
            last_snapshot_at: None,
            last_input_at: None,
        }
    }

    /// Adopt the identity assigned by `welcome`
    pub fn set_identity(&mut self, id: EntityId) {
        if self.local_id.as_deref() != Some(id.as_str()) {
            self.reset();
            self.local_id = Some(id);
        }
    }

    /// Forget the identity and prediction; back to `Unidentified`
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn local_id(&self) -> Option<&str> {
        self.local_id.as_deref()
    }

    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    pub fn predicted(&self) -> &LocalPredictedState {
        &self.predicted
    }

    pub fn authoritative(&self) -> Option<&PlayerSnapshot> {
        self.authoritative.as_ref()
    }

    pub fn set_slow_effect(&mut self, fraction: f64) {
        self.predicted.slow_effect = fraction.clamp(0.0, 1.0);
    }

    /// Fold an authoritative snapshot into the prediction
    pub fn apply_snapshot(&mut self, state: &GameStateData, received_at_ms: u64) -> SnapshotOutcome {
        let Some(id) = self.local_id.as_deref() else {
            return SnapshotOutcome::Absent;
        };
        let Some(server) = state.player(id) else {
            return SnapshotOutcome::Absent;
        };
        let server_pos = server.position();

        let outcome = match (self.phase, self.last_snapshot_at) {
            (SyncPhase::Tracking, Some(last)) => {
                let elapsed = received_at_ms.saturating_sub(last);
                if elapsed > reconcile::STALL_THRESHOLD_MS {
                    debug!("Snapshot gap {}ms, dead reckoning", elapsed);
                    self.predicted.position += self.predicted.velocity;
                    SnapshotOutcome::DeadReckoned
                } else {
                    let error = self.predicted.position.distance_to(server_pos);
                    let factor = reconcile_factor(error);
                    self.predicted.position = self.predicted.position.lerp(server_pos, factor);
                    SnapshotOutcome::Reconciled { error }
                }
            }
            _ => {
                self.predicted.position = server_pos;
                self.predicted.velocity = Vec2::ZERO;
                self.phase = SyncPhase::Tracking;
                info!("Tracking local player {} at ({:.1}, {:.1})", id, server_pos.x, server_pos.y);
                SnapshotOutcome::Initialized
            }
        };

        if server.size > 0.0 {
            self.predicted.size = server.size;
        }
        self.predicted.clamp_to_world();

        let mapped = speed_for_tags(&server.applied_cards) as f64;
        if mapped != self.predicted.target_speed {
            debug!(
                "Target speed {} -> {} ({} cards)",
                self.predicted.target_speed,
                mapped,
                server.applied_cards.len()
            );
            self.predicted.target_speed = mapped;
        }

        self.authoritative = Some(server.clone());
        self.last_snapshot_at = Some(received_at_ms);
        outcome
    }

    /// Advance the prediction by one tick
    pub fn tick(&mut self, input: &InputState) {
        if self.phase == SyncPhase::Tracking {
            self.predicted.step(input);
        }
    }

    /// Whether enough time has passed since the last input send
    pub fn should_send_input(&self, now_ms: u64) -> bool {
        match self.last_input_at {
            None => true,
            Some(last) => {
                now_ms.saturating_sub(last) as f64 >= input_interval_ms(self.predicted.current_speed)
            }
        }
    }

    pub fn record_input_sent(&mut self, now_ms: u64) {
        self.last_input_at = Some(now_ms);
    }
}
