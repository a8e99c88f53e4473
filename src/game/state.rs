//! Simulation state manager
//!
//! Authoritative record of the parasite's tunable stats, the active run's
//! progress and the persistent meta-progression. Every field is private and
//! every mutator publishes its event, so subscribers never miss a change.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::SimConfig;
use crate::game::constants::{level_threshold, physics, progression};
use crate::game::entity::EntityId;
use crate::game::events::{Event, EventBus};
use crate::persistence::PersistentData;
use crate::util::vec2::Vec2;

/// Tunable stat identifiers, for upgrade content layered on top
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stat {
    MaxHealth,
    Acceleration,
    MaxSpeed,
    Drag,
    TurnRate,
    BaseSize,
}

/// Why a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndReason {
    /// Parasite health reached zero
    Died,
    /// Player abandoned the run
    Quit,
    /// Host shut down mid-run
    Shutdown,
}

/// Movement and health stats of the controlled entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatBlock {
    pub max_health: f32,
    pub health: f32,
    pub base_size: f32,
    pub size_multiplier: f32,
    pub acceleration: f32,
    pub max_speed: f32,
    /// Per canonical frame, kept in (0, 1)
    pub drag: f32,
    pub turn_rate: f32,
}

impl StatBlock {
    pub fn from_config(config: &SimConfig) -> Self {
        Self {
            max_health: config.base_max_health,
            health: config.base_max_health,
            base_size: config.base_radius,
            size_multiplier: 1.0,
            acceleration: config.base_acceleration,
            max_speed: config.base_max_speed,
            drag: config.base_drag.clamp(physics::MIN_DRAG, physics::MAX_DRAG),
            turn_rate: config.base_turn_rate,
        }
    }

    /// `max_speed / sqrt(size)` - larger bodies top out slower
    pub fn effective_max_speed(&self) -> f32 {
        self.max_speed / self.size_multiplier.sqrt()
    }

    /// `acceleration / size` - larger bodies carry more momentum
    pub fn effective_acceleration(&self) -> f32 {
        self.acceleration / self.size_multiplier
    }

    /// `turn_rate / sqrt(size)`
    pub fn effective_turn_rate(&self) -> f32 {
        self.turn_rate / self.size_multiplier.sqrt()
    }

    pub fn radius(&self) -> f32 {
        self.base_size * self.size_multiplier
    }

    pub fn get(&self, stat: Stat) -> f32 {
        match stat {
            Stat::MaxHealth => self.max_health,
            Stat::Acceleration => self.acceleration,
            Stat::MaxSpeed => self.max_speed,
            Stat::Drag => self.drag,
            Stat::TurnRate => self.turn_rate,
            Stat::BaseSize => self.base_size,
        }
    }
}

/// Counters of the active run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunProgress {
    pub active: bool,
    /// Biomass collected toward the next level
    pub biomass: f32,
    /// Biomass collected over the whole run
    pub total_biomass: f32,
    pub level: u32,
    pub cells_cleared: u32,
    pub elapsed_ms: f64,
}

impl Default for RunProgress {
    fn default() -> Self {
        Self {
            active: false,
            biomass: 0.0,
            total_biomass: 0.0,
            level: 1,
            cells_cleared: 0,
            elapsed_ms: 0.0,
        }
    }
}

impl RunProgress {
    /// Currency granted when this run ends
    pub fn currency_reward(&self) -> u64 {
        let from_biomass = (self.total_biomass.max(0.0) * progression::CURRENCY_PER_BIOMASS).floor() as u64;
        let from_levels = self.level.saturating_sub(1) as u64 * progression::CURRENCY_PER_LEVEL;
        let from_cells = self.cells_cleared as u64 * progression::CURRENCY_PER_CELL;
        from_biomass + from_levels + from_cells
    }

    /// Biomass needed to leave the current level
    pub fn next_threshold(&self) -> f32 {
        level_threshold(self.level)
    }
}

/// Errors from state mutators that can be refused
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    #[error("Unlock '{0}' is already owned")]
    AlreadyUnlocked(String),
    #[error("Insufficient currency: need {needed}, have {available}")]
    InsufficientCurrency { needed: u64, available: u64 },
}

/// Process-wide authoritative simulation record
pub struct SimulationState {
    defaults: StatBlock,
    min_size_multiplier: f32,
    stats: StatBlock,
    forces: HashMap<String, Vec2>,
    run: RunProgress,
    persistent: PersistentData,
    paused: bool,
    bus: EventBus,
}

impl SimulationState {
    pub fn new(config: &SimConfig, bus: EventBus) -> Self {
        Self::with_persistent(config, bus, PersistentData::default())
    }

    /// Create with persistent progress handed back by the persistence collaborator
    pub fn with_persistent(config: &SimConfig, bus: EventBus, persistent: PersistentData) -> Self {
        let defaults = StatBlock::from_config(config);
        Self {
            stats: defaults.clone(),
            defaults,
            min_size_multiplier: config.min_size_multiplier,
            forces: HashMap::new(),
            run: RunProgress::default(),
            persistent,
            paused: false,
            bus,
        }
    }

    // ========================================================================
    // Read-only views
    // ========================================================================

    pub fn stats(&self) -> &StatBlock {
        &self.stats
    }

    pub fn stat(&self, stat: Stat) -> f32 {
        self.stats.get(stat)
    }

    pub fn run(&self) -> &RunProgress {
        &self.run
    }

    pub fn persistent(&self) -> &PersistentData {
        &self.persistent
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_run_active(&self) -> bool {
        self.run.active
    }

    pub fn min_size_multiplier(&self) -> f32 {
        self.min_size_multiplier
    }

    pub fn global_force(&self, id: &str) -> Option<Vec2> {
        self.forces.get(id).copied()
    }

    pub fn global_forces(&self) -> impl Iterator<Item = (&str, Vec2)> + '_ {
        self.forces.iter().map(|(id, force)| (id.as_str(), *force))
    }

    /// Sum of all active global forces
    pub fn total_global_force(&self) -> Vec2 {
        self.forces.values().copied().sum()
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    // ========================================================================
    // Run lifecycle
    // ========================================================================

    /// Reset run counters and stats to defaults and mark the run active
    pub fn start_run(&mut self) {
        self.stats = self.defaults.clone();
        self.run = RunProgress {
            active: true,
            ..RunProgress::default()
        };
        self.forces.clear();
        self.paused = false;

        info!(
            runs_played = self.persistent.runs_played,
            currency = self.persistent.currency,
            "Run started"
        );
        self.bus.publish(Event::RunStarted);
    }

    /// End the active run, folding its reward into persistent progress
    ///
    /// Returns the updated persistent record for storage, or `None` when no
    /// run was active.
    pub fn end_run(&mut self, reason: EndReason) -> Option<PersistentData> {
        if !self.run.active {
            warn!(?reason, "end_run called without an active run");
            return None;
        }

        let reward = self.run.currency_reward();
        self.run.active = false;
        self.paused = false;

        self.persistent.currency = self.persistent.currency.saturating_add(reward);
        self.persistent.high_level = self.persistent.high_level.max(self.run.level);
        self.persistent.runs_played += 1;

        info!(
            ?reason,
            level = self.run.level,
            total_biomass = self.run.total_biomass,
            cells_cleared = self.run.cells_cleared,
            reward,
            "Run ended"
        );
        self.bus.publish(Event::GameOver {
            reason,
            level: self.run.level,
            currency_earned: reward,
        });

        Some(self.persistent.clone())
    }

    /// Accumulate run time; no event
    pub fn advance_time(&mut self, dt_ms: f32) {
        if self.run.active && dt_ms > 0.0 {
            self.run.elapsed_ms += dt_ms as f64;
        }
    }

    // ========================================================================
    // Progression
    // ========================================================================

    /// Add biomass, levelling up each time the current threshold is crossed
    ///
    /// Returns the number of levels gained.
    pub fn add_biomass(&mut self, amount: f32) -> u32 {
        if !self.run.active {
            debug!(amount, "biomass outside an active run ignored");
            return 0;
        }
        if !(amount.is_finite() && amount > 0.0) {
            warn!(amount, "rejected non-positive biomass");
            return 0;
        }

        self.run.biomass += amount;
        self.run.total_biomass += amount;
        self.bus.publish(Event::BiomassGained {
            amount,
            total: self.run.total_biomass,
        });

        let mut gained = 0;
        loop {
            let threshold = self.run.next_threshold();
            if self.run.biomass < threshold {
                break;
            }
            self.run.biomass -= threshold;
            self.run.level += 1;
            gained += 1;

            debug!(level = self.run.level, "Level up");
            self.bus.publish(Event::LevelUp {
                level: self.run.level,
            });
        }
        gained
    }

    pub fn record_cell_cleared(&mut self) {
        if !self.run.active {
            return;
        }
        self.run.cells_cleared += 1;
        self.bus.publish(Event::CellCleared {
            total: self.run.cells_cleared,
        });
    }

    // ========================================================================
    // Size
    // ========================================================================

    pub fn grow(&mut self, amount: f32) -> f32 {
        if !(amount.is_finite() && amount > 0.0) {
            warn!(amount, "rejected non-positive growth");
            return self.stats.size_multiplier;
        }
        self.set_size(self.stats.size_multiplier + amount)
    }

    /// Shrink, never below the configured floor
    pub fn shrink(&mut self, amount: f32) -> f32 {
        if !(amount.is_finite() && amount > 0.0) {
            warn!(amount, "rejected non-positive shrink");
            return self.stats.size_multiplier;
        }
        self.set_size(self.stats.size_multiplier - amount)
    }

    fn set_size(&mut self, requested: f32) -> f32 {
        let old = self.stats.size_multiplier;
        let new = requested.max(self.min_size_multiplier);
        if new == old {
            return old;
        }

        self.stats.size_multiplier = new;
        debug!(old, new, "Size changed");
        self.bus.publish(Event::SizeChanged { old, new });
        new
    }

    // ========================================================================
    // Stats and health
    // ========================================================================

    /// Multiply a stat by `factor`; drag stays strictly inside (0, 1)
    pub fn scale_stat(&mut self, stat: Stat, factor: f32) -> f32 {
        if !(factor.is_finite() && factor > 0.0) {
            warn!(?stat, factor, "rejected non-positive stat factor");
            return self.stats.get(stat);
        }

        let value = match stat {
            Stat::MaxHealth => {
                self.stats.max_health *= factor;
                self.stats.health = self.stats.health.min(self.stats.max_health);
                self.stats.max_health
            }
            Stat::Acceleration => {
                self.stats.acceleration *= factor;
                self.stats.acceleration
            }
            Stat::MaxSpeed => {
                self.stats.max_speed *= factor;
                self.stats.max_speed
            }
            Stat::Drag => {
                self.stats.drag = (self.stats.drag * factor).clamp(physics::MIN_DRAG, physics::MAX_DRAG);
                self.stats.drag
            }
            Stat::TurnRate => {
                self.stats.turn_rate *= factor;
                self.stats.turn_rate
            }
            Stat::BaseSize => {
                self.stats.base_size *= factor;
                self.stats.base_size
            }
        };

        self.bus.publish(Event::StatChanged { stat, value });
        value
    }

    /// Damage the controlled entity; returns true when health reached zero
    pub fn damage(&mut self, entity: EntityId, amount: f32) -> bool {
        if !self.run.active || self.stats.max_health <= 0.0 {
            return false;
        }
        if !(amount.is_finite() && amount > 0.0) || self.stats.health <= 0.0 {
            return false;
        }

        self.stats.health = (self.stats.health - amount).max(0.0);
        self.bus.publish(Event::Damaged {
            entity,
            amount,
            health: self.stats.health,
        });
        self.stats.health <= 0.0
    }

    pub fn heal(&mut self, amount: f32) {
        if !self.run.active || !(amount.is_finite() && amount > 0.0) {
            return;
        }
        let before = self.stats.health;
        self.stats.health = (self.stats.health + amount).min(self.stats.max_health);
        let healed = self.stats.health - before;
        if healed > 0.0 {
            self.bus.publish(Event::Healed {
                amount: healed,
                health: self.stats.health,
            });
        }
    }

    // ========================================================================
    // Pause and global forces
    // ========================================================================

    /// Returns true when the pause state actually changed
    pub fn set_paused(&mut self, paused: bool) -> bool {
        if self.paused == paused {
            return false;
        }
        self.paused = paused;
        debug!(paused, "Pause state changed");
        self.bus
            .publish(if paused { Event::Paused } else { Event::Resumed });
        true
    }

    /// Register a force (units/s²) applied to every body; replaces an existing id
    pub fn add_global_force(&mut self, id: &str, x: f32, y: f32) {
        let force = Vec2::new(x, y);
        if !force.is_finite() {
            warn!(id, x, y, "rejected non-finite global force");
            return;
        }
        self.forces.insert(id.to_string(), force);
        self.bus.publish(Event::GlobalForceChanged {
            id: id.to_string(),
            force: Some(force),
        });
    }

    pub fn remove_global_force(&mut self, id: &str) -> bool {
        if self.forces.remove(id).is_none() {
            return false;
        }
        self.bus.publish(Event::GlobalForceChanged {
            id: id.to_string(),
            force: None,
        });
        true
    }

    // ========================================================================
    // Persistent progress
    // ========================================================================

    /// Spend currency on an unlock; returns the remaining currency
    pub fn purchase_unlock(&mut self, id: &str, cost: u64) -> Result<u64, StateError> {
        if self.persistent.unlocks.contains(id) {
            return Err(StateError::AlreadyUnlocked(id.to_string()));
        }
        if self.persistent.currency < cost {
            return Err(StateError::InsufficientCurrency {
                needed: cost,
                available: self.persistent.currency,
            });
        }

        self.persistent.currency -= cost;
        self.persistent.unlocks.insert(id.to_string());
        self.bus.publish(Event::UnlockPurchased {
            id: id.to_string(),
            remaining_currency: self.persistent.currency,
        });
        Ok(self.persistent.currency)
    }
}
