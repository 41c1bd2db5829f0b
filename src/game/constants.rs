/// Local movement model - mirrors the server's per-tick player update
pub mod movement {
    /// Base speed every player starts with (units per tick)
    pub const BASE_SPEED: f64 = 5.0;
    /// Fraction of the remaining speed delta closed each tick
    pub const SPEED_GLIDE: f64 = 0.15;
    /// Below this remaining delta the current speed snaps to the target
    pub const SPEED_SNAP_EPSILON: f64 = 0.1;
    /// Acceleration factor at zero speed
    pub const ACCEL_BASE: f64 = 0.2;
    /// Acceleration gained per BASE_SPEED of current speed
    pub const ACCEL_PER_BASE_SPEED: f64 = 0.05;
    /// Acceleration factor cap
    pub const ACCEL_MAX: f64 = 0.5;
    /// Velocity is rounded to this many decimals after integration
    pub const VELOCITY_DECIMALS: i32 = 2;
    /// Position is rounded to this many decimals after integration
    pub const POSITION_DECIMALS: i32 = 1;
}

/// Snapshot reconciliation
pub mod reconcile {
    /// Gap between snapshots (ms) above which we dead-reckon instead of lerping
    pub const STALL_THRESHOLD_MS: u64 = 100;
    /// Lerp factor at zero divergence
    pub const LERP_MIN: f64 = 0.2;
    /// Lerp factor at full divergence
    pub const LERP_MAX: f64 = 0.5;
    /// Divergence (world units) at which the lerp factor saturates
    pub const FULL_CORRECTION_DISTANCE: f64 = 50.0;
}

/// Input send cadence
pub mod cadence {
    /// Send interval at zero speed (ms)
    pub const BASE_INTERVAL_MS: f64 = 50.0;
    /// Interval reduction per BASE_SPEED of current speed (ms)
    pub const INTERVAL_STEP_MS: f64 = 15.0;
    /// Floor (~60 Hz)
    pub const MIN_INTERVAL_MS: f64 = 16.0;
}

/// World geometry shared with the server
pub mod world {
    /// Full side length of the square world
    pub const SIZE: f64 = 8000.0;
    /// Half extent; positions live in [-HALF_EXTENT, HALF_EXTENT]
    pub const HALF_EXTENT: f64 = SIZE / 2.0;
}

/// View caching and overlay cadence
pub mod render {
    /// Minimum gap between redraws of an animated body (ms)
    pub const ANIMATED_REDRAW_MS: u64 = 300;
    /// Overlays (auras, barrier, active effects) refresh every N frames
    pub const OVERLAY_FRAME_INTERVAL: u64 = 2;
    /// Hit points represented by one tick mark on the health bar
    pub const HP_PER_TIER: f64 = 100.0;
    /// Health bar width as a multiple of entity size
    pub const HEALTH_BAR_WIDTH_RATIO: f64 = 1.5;
    /// Health bar height in world units
    pub const HEALTH_BAR_HEIGHT: f64 = 6.0;
    /// Gap between the top of the entity and the health bar
    pub const HEALTH_BAR_GAP: f64 = 15.0;
    /// Inner highlight radius as a fraction of size
    pub const HIGHLIGHT_RATIO: f64 = 0.35;
}

/// Networking constants
pub mod net {
    /// Delay before reconnecting after any close (ms)
    pub const RECONNECT_DELAY_MS: u64 = 3000;
    /// WebSocket port used when the page is served from a local dev host
    pub const DEV_WS_PORT: u16 = 6767;
    /// Fallback port when the page URL has none
    pub const DEFAULT_PORT: u16 = 443;
    /// WebSocket path on the game server
    pub const WS_PATH: &str = "/ws";
}

/// Blend factor from current toward desired velocity for a given speed
pub fn acceleration_factor(current_speed: f64) -> f64 {
    let factor = movement::ACCEL_BASE
        + (current_speed / movement::BASE_SPEED) * movement::ACCEL_PER_BASE_SPEED;
    factor.min(movement::ACCEL_MAX)
}

/// Lerp factor toward the server position for a divergence of `distance`
pub fn reconcile_factor(distance: f64) -> f64 {
    let t = (distance / reconcile::FULL_CORRECTION_DISTANCE).min(1.0);
    (reconcile::LERP_MIN + t * (reconcile::LERP_MAX - reconcile::LERP_MIN))
        .clamp(reconcile::LERP_MIN, reconcile::LERP_MAX)
}

/// Minimum time between input sends for a given speed (ms)
pub fn input_interval_ms(current_speed: f64) -> f64 {
    let interval = cadence::BASE_INTERVAL_MS
        - (current_speed / movement::BASE_SPEED) * cadence::INTERVAL_STEP_MS;
    interval.max(cadence::MIN_INTERVAL_MS)
}
