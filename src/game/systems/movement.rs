//! Movement integrator
//!
//! Advances one body by one time step. The step order is fixed for
//! reproducibility:
//!
//! 1. global forces, scaled by `dt / 1000`
//! 2. pending acceleration, scaled by `dt / 1000`, then zeroed
//! 3. drag, `velocity *= drag ^ (dt / 16.667)`
//! 4. clamp to the effective max speed
//! 5. snap speeds below 1 to zero
//! 6. `position += velocity * dt / 1000`
//! 7. arena boundary enforcement

use tracing::{debug, warn};

use crate::config::SimConfig;
use crate::game::constants::{drag_factor, physics};
use crate::game::entity::{Entity, MovementProfile};
use crate::game::state::StatBlock;
use crate::game::systems::arena::{ArenaBounds, WallImpact};
use crate::util::vec2::Vec2;

/// Physical constants for one integration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovementParams {
    pub max_speed: f32,
    /// Per canonical frame
    pub drag: f32,
}

impl MovementParams {
    /// Effective constants of the controlled body, scaled by its size
    pub fn controlled(stats: &StatBlock) -> Self {
        Self {
            max_speed: stats.effective_max_speed(),
            drag: stats.drag,
        }
    }

    pub fn drifting(config: &SimConfig) -> Self {
        Self {
            max_speed: config.drift_max_speed,
            drag: config.drift_drag,
        }
    }

    pub fn for_profile(profile: MovementProfile, stats: &StatBlock, config: &SimConfig) -> Self {
        match profile {
            MovementProfile::Controlled => Self::controlled(stats),
            MovementProfile::Drifting => Self::drifting(config),
        }
    }
}

/// Clamp a tick duration to a usable value
///
/// Negative and non-finite durations become 0.
pub fn sanitize_dt(dt_ms: f32) -> f32 {
    if dt_ms.is_finite() && dt_ms >= 0.0 {
        dt_ms
    } else {
        warn!(dt_ms, "invalid tick duration clamped to 0");
        0.0
    }
}

/// Integrate one body for `dt_ms` milliseconds
///
/// Returns the wall impact raised by boundary enforcement, if any. With
/// `dt_ms == 0` only the pending acceleration is consumed.
pub fn integrate(
    entity: &mut Entity,
    global_force: Vec2,
    params: MovementParams,
    bounds: &ArenaBounds,
    dt_ms: f32,
) -> Option<WallImpact> {
    if !entity.alive {
        debug!(entity = entity.id, "integrate on retired entity ignored");
        return None;
    }

    let dt_ms = sanitize_dt(dt_ms);
    let scale = dt_ms / physics::MS_PER_SECOND;

    entity.velocity += global_force * scale;
    entity.velocity += entity.pending_acceleration * scale;
    entity.pending_acceleration = Vec2::ZERO;

    if dt_ms == 0.0 {
        return None;
    }

    entity.velocity *= drag_factor(params.drag, dt_ms);
    entity.velocity = entity.velocity.clamp_length(params.max_speed);

    if entity.velocity.length_sq() < physics::MIN_SPEED * physics::MIN_SPEED {
        entity.velocity = Vec2::ZERO;
    }

    entity.position += entity.velocity * scale;

    let radius = entity.radius();
    bounds.enforce(&mut entity.position, &mut entity.velocity, radius)
}

/// Deposit thrust along `direction`, whose length is capped at 1
///
/// Returns the acceleration added.
pub fn thrust(entity: &mut Entity, direction: Vec2, stats: &StatBlock) -> Vec2 {
    if !direction.is_finite() {
        warn!(entity = entity.id, "rejected non-finite thrust direction");
        return Vec2::ZERO;
    }
    let acceleration = direction.clamp_length(1.0) * stats.effective_acceleration();
    entity.accelerate(acceleration);
    acceleration
}

/// Deposit acceleration steering the body toward `target`
///
/// Inside the dead zone nothing is applied. Otherwise the thrust direction
/// turns from the current heading toward the target by at most
/// `effective_turn_rate * dt` radians, so large bodies turn slowly.
/// Returns the acceleration added.
pub fn steer_toward(
    entity: &mut Entity,
    target: Vec2,
    stats: &StatBlock,
    dead_zone_radius: f32,
    dt_ms: f32,
) -> Vec2 {
    if !entity.alive || !target.is_finite() {
        return Vec2::ZERO;
    }

    let (desired, distance) = (target - entity.position).normalize_with_length();
    if distance <= dead_zone_radius {
        return Vec2::ZERO;
    }

    let speed = entity.speed();
    let direction = if speed < physics::MIN_SPEED {
        desired
    } else {
        let heading = entity.velocity * (1.0 / speed);
        let max_turn = stats.effective_turn_rate() * sanitize_dt(dt_ms) / physics::MS_PER_SECOND;
        let angle = heading.angle_to(desired).clamp(-max_turn, max_turn);
        heading.rotate(angle)
    };

    let acceleration = direction * stats.effective_acceleration();
    entity.accelerate(acceleration);
    acceleration
}
