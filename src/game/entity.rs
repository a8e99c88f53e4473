//! Simulated bodies
//!
//! One data representation for every body in the arena. Behavior differences
//! (how a body moves, how contacts resolve) are selected by `EntityKind`
//! rather than by type.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::util::vec2::Vec2;

/// Entity identifier, unique within a `Simulation`
pub type EntityId = u64;

/// Capability tag selecting movement and contact behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// The player-controlled body; reads its physics from `SimulationState`
    Parasite,
    /// Hostile body that damages the parasite on contact
    Cell,
    /// Pickup that is collected on contact
    Nutrient,
}

impl EntityKind {
    pub fn movement_profile(&self) -> MovementProfile {
        match self {
            EntityKind::Parasite => MovementProfile::Controlled,
            EntityKind::Cell | EntityKind::Nutrient => MovementProfile::Drifting,
        }
    }
}

/// How a body's physical constants are derived
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovementProfile {
    /// Effective stats from the run's stat block, scaled by size
    Controlled,
    /// Fixed drift constants from `SimConfig`
    Drifting,
}

/// Rejected spawn parameters
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum SpawnError {
    #[error("spawn position must be finite, got ({0}, {1})")]
    NonFinitePosition(f32, f32),
    #[error("base radius must be a finite number greater than 0, got {0}")]
    InvalidRadius(f32),
    #[error("max health must not be NaN")]
    InvalidHealth,
}

/// Validate spawn parameters: a finite position, a finite positive radius and a non-NaN health
pub fn check_spawn(position: Vec2, base_radius: f32, max_health: f32) -> Result<(), SpawnError> {
    if !position.is_finite() {
        return Err(SpawnError::NonFinitePosition(position.x, position.y));
    }
    if !(base_radius.is_finite() && base_radius > 0.0) {
        return Err(SpawnError::InvalidRadius(base_radius));
    }
    if max_health.is_nan() {
        return Err(SpawnError::InvalidHealth);
    }
    Ok(())
}

/// A simulated body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    // === Integrated every tick ===
    pub position: Vec2,
    pub velocity: Vec2,
    /// Acceleration deposited by input and environment, consumed by the next integration
    pub pending_acceleration: Vec2,
    pub alive: bool,

    // === Shape and health ===
    pub base_radius: f32,
    pub size_multiplier: f32,
    pub health: f32,
    /// `<= 0` marks a body without a health system (invulnerable)
    pub max_health: f32,
    pub age_ms: f32,

    pub id: EntityId,
    pub kind: EntityKind,
}

impl Entity {
    /// Create a body from parameters the caller has already checked
    ///
    /// A non-positive `max_health` makes it invulnerable.
    pub fn new(id: EntityId, kind: EntityKind, position: Vec2, base_radius: f32, max_health: f32) -> Self {
        let max_health = if max_health > 0.0 { max_health } else { 0.0 };
        Self {
            position,
            velocity: Vec2::ZERO,
            pending_acceleration: Vec2::ZERO,
            alive: true,
            base_radius,
            size_multiplier: 1.0,
            health: max_health,
            max_health,
            age_ms: 0.0,
            id,
            kind,
        }
    }

    /// Create a body, rejecting parameters `check_spawn` refuses
    pub fn try_new(
        id: EntityId,
        kind: EntityKind,
        position: Vec2,
        base_radius: f32,
        max_health: f32,
    ) -> Result<Self, SpawnError> {
        check_spawn(position, base_radius, max_health)?;
        Ok(Self::new(id, kind, position, base_radius, max_health))
    }

    /// Effective collision radius
    #[inline]
    pub fn radius(&self) -> f32 {
        self.base_radius * self.size_multiplier
    }

    #[inline]
    pub fn speed(&self) -> f32 {
        self.velocity.length()
    }

    pub fn has_health(&self) -> bool {
        self.max_health > 0.0
    }

    /// Health as a fraction of max, 1.0 for invulnerable bodies
    pub fn health_fraction(&self) -> f32 {
        if self.has_health() {
            (self.health / self.max_health).clamp(0.0, 1.0)
        } else {
            1.0
        }
    }

    /// Add to the pending acceleration for the next integration
    pub fn accelerate(&mut self, acceleration: Vec2) {
        if !self.alive {
            debug!(entity = self.id, "accelerate on retired entity ignored");
            return;
        }
        self.pending_acceleration += acceleration;
    }

    /// Subtract health; returns true when this call killed the body
    pub fn apply_damage(&mut self, amount: f32) -> bool {
        if !self.alive {
            debug!(entity = self.id, "damage on retired entity ignored");
            return false;
        }
        if !self.has_health() || amount <= 0.0 {
            return false;
        }

        self.health = (self.health - amount).clamp(0.0, self.max_health);
        if self.health <= 0.0 {
            self.alive = false;
            return true;
        }
        false
    }

    /// Take the body out of play; the slot may be recycled by the owner
    pub fn retire(&mut self) {
        if !self.alive {
            debug!(entity = self.id, "retire on retired entity ignored");
            return;
        }
        self.alive = false;
        self.velocity = Vec2::ZERO;
        self.pending_acceleration = Vec2::ZERO;
    }
}
