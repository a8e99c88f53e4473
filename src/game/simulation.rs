//! Simulation context
//!
//! Owns every piece of mutable simulation data: configuration, the state
//! manager, the event bus, the entity pool and the broad-phase grid. One
//! `tick` runs integration, partition rebuild, narrow phase and event drain
//! to completion. Several simulations can coexist in one process.

use rustc_hash::FxHashMap;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, SimConfig};
use crate::game::entity::{check_spawn, Entity, EntityId, EntityKind, SpawnError};
use crate::game::events::{Event, EventBus};
use crate::game::input_buffer::{InputBuffer, InputCommand};
use crate::game::spatial::{SpatialEntity, SpatialGrid};
use crate::game::state::{EndReason, SimulationState};
use crate::game::systems::arena::ArenaBounds;
use crate::game::systems::collision::{self, ContactContext};
use crate::game::systems::movement::{self, MovementParams};
use crate::persistence::{save_or_warn, PersistenceBackend, PersistentData};
use crate::util::vec2::Vec2;

/// What one tick did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// Sanitized tick duration
    pub dt_ms: f32,
    /// The tick was skipped because the run is paused
    pub skipped: bool,
    pub integrated: usize,
    pub wall_hits: usize,
    pub candidate_pairs: usize,
    pub contacts: usize,
    pub pickups: u32,
    pub cells_killed: u32,
    /// The run ended this tick because the parasite died
    pub parasite_died: bool,
}

pub struct Simulation {
    config: SimConfig,
    bounds: ArenaBounds,
    state: SimulationState,
    bus: EventBus,
    /// Entity pool; retired slots are reused by `spawn`
    entities: Vec<Entity>,
    /// Live entity id -> slot
    index: FxHashMap<EntityId, usize>,
    grid: SpatialGrid,
    next_id: EntityId,
    parasite: Option<EntityId>,
    /// Steering target held across ticks
    target: Option<Vec2>,
    backend: Option<Box<dyn PersistenceBackend>>,
    tick_count: u64,
}

impl Simulation {
    /// Validate `config` and build an idle simulation
    pub fn new(config: SimConfig, persistent: PersistentData) -> Result<Self, ConfigError> {
        config.validate()?;

        let bus = EventBus::new();
        let state = SimulationState::with_persistent(&config, bus.clone(), persistent);

        Ok(Self {
            bounds: ArenaBounds::from_config(&config),
            grid: SpatialGrid::new(config.spatial_cell_size),
            config,
            state,
            bus,
            entities: Vec::new(),
            index: FxHashMap::default(),
            next_id: 1,
            parasite: None,
            target: None,
            backend: None,
            tick_count: 0,
        })
    }

    /// Hand persistent progress to `backend` whenever a run ends
    pub fn with_backend(mut self, backend: Box<dyn PersistenceBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    // ========================================================================
    // Views
    // ========================================================================

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn bounds(&self) -> &ArenaBounds {
        &self.bounds
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    /// State mutators (upgrades, forces, unlocks)
    pub fn state_mut(&mut self) -> &mut SimulationState {
        &mut self.state
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.index.get(&id).and_then(|&slot| self.entities.get(slot))
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        let slot = *self.index.get(&id)?;
        self.entities.get_mut(slot)
    }

    /// Live bodies
    pub fn entities(&self) -> impl Iterator<Item = &Entity> + '_ {
        self.entities.iter().filter(|e| e.alive)
    }

    pub fn alive_count(&self) -> usize {
        self.entities.iter().filter(|e| e.alive).count()
    }

    /// Pool size, live and retired
    pub fn pool_len(&self) -> usize {
        self.entities.len()
    }

    pub fn parasite_id(&self) -> Option<EntityId> {
        self.parasite
    }

    pub fn parasite(&self) -> Option<&Entity> {
        self.parasite.and_then(|id| self.entity(id)).filter(|e| e.alive)
    }

    pub fn target(&self) -> Option<Vec2> {
        self.target
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    // ========================================================================
    // Entity pool
    // ========================================================================

    /// Spawn a body, reusing a retired slot when one exists
    ///
    /// The position is clamped inside the arena. A non-finite position or a
    /// radius that is not finite and positive is refused without consuming an id.
    pub fn spawn(
        &mut self,
        kind: EntityKind,
        position: Vec2,
        base_radius: f32,
        max_health: f32,
    ) -> Result<EntityId, SpawnError> {
        let mut entity = match Entity::try_new(self.next_id, kind, position, base_radius, max_health) {
            Ok(entity) => entity,
            Err(e) => {
                warn!(?kind, "Spawn refused: {}", e);
                return Err(e);
            }
        };
        let id = self.next_id;
        self.next_id += 1;
        entity.position = self.bounds.clamp_position(position, entity.radius());

        let reusable = self
            .entities
            .iter()
            .position(|e| !e.alive && Some(e.id) != self.parasite);
        let slot = match reusable {
            Some(slot) => {
                self.index.remove(&self.entities[slot].id);
                self.entities[slot] = entity;
                slot
            }
            None => {
                self.entities.push(entity);
                self.entities.len() - 1
            }
        };
        self.index.insert(id, slot);
        Ok(id)
    }

    /// Spawn the controlled body, retiring any previous one
    ///
    /// On error the previous parasite is left in place.
    pub fn spawn_parasite(&mut self, position: Vec2) -> Result<EntityId, SpawnError> {
        let stats = self.state.stats().clone();
        check_spawn(position, stats.base_size, stats.max_health)?;
        if let Some(old) = self.parasite.take() {
            self.retire(old);
        }
        let id = self.spawn(EntityKind::Parasite, position, stats.base_size, stats.max_health)?;
        if let Some(parasite) = self.entity_mut(id) {
            parasite.size_multiplier = stats.size_multiplier;
            parasite.health = stats.health;
        }
        self.parasite = Some(id);
        Ok(id)
    }

    /// Take a body out of play; returns false for unknown or already retired ids
    pub fn retire(&mut self, id: EntityId) -> bool {
        match self.entity_mut(id) {
            Some(entity) if entity.alive => {
                entity.retire();
                true
            }
            _ => {
                debug!(entity = id, "retire on unknown or retired entity ignored");
                false
            }
        }
    }

    // ========================================================================
    // Run lifecycle
    // ========================================================================

    /// Start a run with the parasite at the arena center
    pub fn start_run(&mut self) -> Result<EntityId, SpawnError> {
        self.state.start_run();
        self.target = None;
        let center = self.bounds.center();
        self.spawn_parasite(center)
    }

    /// End the active run and hand the updated record to the backend
    pub fn end_run(&mut self, reason: EndReason) -> Option<PersistentData> {
        let saved = self.state.end_run(reason)?;
        if let Some(backend) = &self.backend {
            if save_or_warn(backend.as_ref(), &saved) {
                debug!("Persistent progress saved");
            }
        }
        Some(saved)
    }

    /// Drop every body, subscriber and pending event
    pub fn reset(&mut self) {
        self.bus.clear();
        self.entities.clear();
        self.index.clear();
        self.grid.clear();
        self.parasite = None;
        self.target = None;
        info!("Simulation reset");
    }

    // ========================================================================
    // Input
    // ========================================================================

    pub fn apply_input(&mut self, command: InputCommand) {
        match command {
            InputCommand::Accelerate(direction) => {
                let Some(id) = self.parasite else {
                    debug!("thrust without a parasite ignored");
                    return;
                };
                let stats = self.state.stats().clone();
                if let Some(parasite) = self.entity_mut(id) {
                    movement::thrust(parasite, direction, &stats);
                }
            }
            InputCommand::SteerToward(point) => {
                if point.is_finite() {
                    self.target = Some(point);
                } else {
                    warn!("rejected non-finite steering target");
                }
            }
            InputCommand::ClearTarget => self.target = None,
            InputCommand::SetPaused(paused) => {
                self.state.set_paused(paused);
            }
        }
    }

    /// Apply every pending command; returns how many were applied
    pub fn drain_input(&mut self, buffer: &InputBuffer) -> usize {
        let commands = buffer.drain();
        let count = commands.len();
        for command in commands {
            self.apply_input(command);
        }
        count
    }

    // ========================================================================
    // Tick
    // ========================================================================

    /// Advance the simulation by `dt_ms` milliseconds
    ///
    /// A paused run skips the tick entirely. Events raised during the tick
    /// are delivered in order before this returns.
    pub fn tick(&mut self, dt_ms: f32) -> TickReport {
        let dt_ms = movement::sanitize_dt(dt_ms);
        if self.state.is_paused() {
            return TickReport {
                dt_ms,
                skipped: true,
                ..TickReport::default()
            };
        }

        let _hold = self.bus.hold();
        let mut report = TickReport {
            dt_ms,
            ..TickReport::default()
        };

        self.sync_parasite(dt_ms);

        // Integrate
        let global_force = self.state.total_global_force();
        for entity in self.entities.iter_mut().filter(|e| e.alive) {
            let params = MovementParams::for_profile(entity.kind.movement_profile(), self.state.stats(), &self.config);
            report.integrated += 1;
            if let Some(impact) = movement::integrate(entity, global_force, params, &self.bounds, dt_ms) {
                report.wall_hits += 1;
                self.bus.publish(Event::WallHit {
                    entity: entity.id,
                    point: impact.point,
                    speed: impact.speed,
                });
            }
        }

        // Broad phase
        self.grid.rebuild(self.entities.iter().filter(|e| e.alive).map(|e| SpatialEntity {
            id: e.id,
            position: e.position,
            radius: e.radius(),
        }));
        let candidates = self.grid.candidate_pairs();
        report.candidate_pairs = candidates.len();

        // Narrow phase and contact effects
        let contacts = collision::narrow_phase(&candidates);
        let summary = collision::resolve_contacts(
            &mut self.entities,
            &self.index,
            &contacts,
            &mut self.state,
            ContactContext {
                bounds: &self.bounds,
                push_ratio: self.config.push_ratio,
                dt_ms,
            },
        );
        report.contacts = summary.resolved;
        report.pickups = summary.pickups;
        report.cells_killed = summary.cells_killed;

        for entity in self.entities.iter_mut().filter(|e| e.alive) {
            entity.age_ms += dt_ms;
        }
        self.state.advance_time(dt_ms);
        self.tick_count += 1;

        if summary.parasite_died {
            report.parasite_died = true;
            self.target = None;
            self.end_run(EndReason::Died);
        }

        report
    }

    /// Copy size and health from the stat block and apply steering
    fn sync_parasite(&mut self, dt_ms: f32) {
        let Some(id) = self.parasite else {
            return;
        };
        let Some(&slot) = self.index.get(&id) else {
            return;
        };
        let stats = self.state.stats();
        let parasite = &mut self.entities[slot];
        if !parasite.alive {
            return;
        }

        parasite.base_radius = stats.base_size;
        parasite.size_multiplier = stats.size_multiplier;
        parasite.max_health = stats.max_health;
        parasite.health = stats.health;

        if let Some(target) = self.target {
            movement::steer_toward(parasite, target, stats, self.config.dead_zone_radius, dt_ms);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::events::EventKind;
    use crate::game::state::Stat;
    use crate::persistence::MemoryStore;
    use rand::Rng;
    use std::cell::RefCell;
    use std::rc::Rc;

    const FRAME: f32 = 16.667;

    fn create_test_sim() -> Simulation {
        Simulation::new(SimConfig::default(), PersistentData::default()).unwrap()
    }

    fn record_kinds(sim: &Simulation, kinds: &[EventKind]) -> Rc<RefCell<Vec<EventKind>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        for &kind in kinds {
            let seen = seen.clone();
            sim.bus().subscribe(kind, move |e| seen.borrow_mut().push(e.kind()));
        }
        seen
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = SimConfig {
            base_drag: 1.5,
            ..SimConfig::default()
        };
        assert!(Simulation::new(config, PersistentData::default()).is_err());
    }

    #[test]
    fn test_start_run_spawns_parasite_at_center() {
        let mut sim = create_test_sim();
        let id = sim.start_run().unwrap();

        let parasite = sim.parasite().unwrap();
        assert_eq!(parasite.id, id);
        assert_eq!(parasite.position, Vec2::new(1500.0, 1500.0));
        assert_eq!(parasite.radius(), 20.0);
        assert!(sim.state().is_run_active());
    }

    #[test]
    fn test_golden_tick() {
        let mut sim = create_test_sim();
        let id = sim.start_run().unwrap();
        sim.state_mut().scale_stat(Stat::MaxSpeed, 100.0);
        sim.entity_mut(id).unwrap().accelerate(Vec2::new(800.0, 0.0));

        let report = sim.tick(FRAME);

        let parasite = sim.parasite().unwrap();
        assert_eq!(report.integrated, 1);
        assert!((parasite.velocity.x - 12.53).abs() < 0.01);
        assert!((parasite.position.x - (1500.0 + parasite.velocity.x * FRAME / 1000.0)).abs() < 1e-3);
        assert_eq!(parasite.age_ms, FRAME);
    }

    #[test]
    fn test_paused_tick_is_skipped() {
        let mut sim = create_test_sim();
        let id = sim.start_run().unwrap();
        sim.entity_mut(id).unwrap().velocity = Vec2::new(100.0, 0.0);
        sim.apply_input(InputCommand::SetPaused(true));

        let report = sim.tick(FRAME);

        assert!(report.skipped);
        assert_eq!(sim.parasite().unwrap().position, Vec2::new(1500.0, 1500.0));
        assert_eq!(sim.state().run().elapsed_ms, 0.0);
        assert_eq!(sim.tick_count(), 0);

        sim.apply_input(InputCommand::SetPaused(false));
        assert!(!sim.tick(FRAME).skipped);
        assert!(sim.parasite().unwrap().position.x > 1500.0);
    }

    #[test]
    fn test_spawn_reuses_retired_slot() {
        let mut sim = create_test_sim();
        let a = sim.spawn(EntityKind::Nutrient, Vec2::new(100.0, 100.0), 5.0, 0.0).unwrap();
        let b = sim.spawn(EntityKind::Cell, Vec2::new(200.0, 200.0), 10.0, 40.0).unwrap();
        assert_eq!(sim.pool_len(), 2);

        assert!(sim.retire(a));
        assert!(!sim.retire(a));
        let c = sim.spawn(EntityKind::Cell, Vec2::new(300.0, 300.0), 10.0, 40.0).unwrap();

        assert_ne!(c, a);
        assert_eq!(sim.pool_len(), 2);
        assert!(sim.entity(a).is_none());
        assert_eq!(sim.entity(b).unwrap().kind, EntityKind::Cell);
        assert_eq!(sim.entity(c).unwrap().position, Vec2::new(300.0, 300.0));
    }

    #[test]
    fn test_spawn_clamps_into_arena() {
        let mut sim = create_test_sim();
        let id = sim.spawn(EntityKind::Cell, Vec2::new(-100.0, 5000.0), 10.0, 40.0).unwrap();
        let entity = sim.entity(id).unwrap();
        assert!(sim.bounds().contains(entity.position, entity.radius()));
    }

    #[test]
    fn test_spawn_rejects_non_finite_position() {
        let mut sim = create_test_sim();
        let before = sim.spawn(EntityKind::Cell, Vec2::new(100.0, 100.0), 10.0, 40.0).unwrap();

        let nan = sim.spawn(EntityKind::Cell, Vec2::new(f32::NAN, 100.0), 10.0, 40.0);
        let inf = sim.spawn(EntityKind::Nutrient, Vec2::new(100.0, f32::NEG_INFINITY), 5.0, 0.0);

        assert!(matches!(nan, Err(SpawnError::NonFinitePosition(_, _))));
        assert!(matches!(inf, Err(SpawnError::NonFinitePosition(_, _))));
        assert_eq!(sim.pool_len(), 1);
        // Refused spawns do not consume ids
        let after = sim.spawn(EntityKind::Cell, Vec2::new(200.0, 100.0), 10.0, 40.0).unwrap();
        assert_eq!(after, before + 1);
    }

    #[test]
    fn test_spawn_rejects_bad_radius() {
        let mut sim = create_test_sim();
        for radius in [-5.0, 0.0, f32::NAN, f32::INFINITY] {
            let result = sim.spawn(EntityKind::Cell, Vec2::new(100.0, 100.0), radius, 40.0);
            assert!(matches!(result, Err(SpawnError::InvalidRadius(_))), "radius {}", radius);
        }
        assert_eq!(sim.pool_len(), 0);
    }

    #[test]
    fn test_rejected_spawns_keep_world_contained() {
        let mut sim = create_test_sim();
        sim.start_run().unwrap();
        let cell = sim.spawn(EntityKind::Cell, Vec2::new(800.0, 800.0), 12.0, 40.0).unwrap();
        sim.entity_mut(cell).unwrap().velocity = Vec2::new(120.0, -80.0);
        assert!(sim.spawn(EntityKind::Cell, Vec2::new(f32::NAN, f32::NAN), 12.0, 40.0).is_err());
        assert!(sim.spawn(EntityKind::Nutrient, Vec2::new(900.0, 900.0), -3.0, 0.0).is_err());

        for _ in 0..60 {
            sim.tick(FRAME);
        }

        assert_eq!(sim.alive_count(), 2);
        for entity in sim.entities() {
            assert!(entity.position.is_finite());
            assert!(sim.bounds().contains(entity.position, entity.radius()));
        }
    }

    #[test]
    fn test_failed_parasite_spawn_keeps_previous() {
        let mut sim = create_test_sim();
        let id = sim.start_run().unwrap();

        let result = sim.spawn_parasite(Vec2::new(f32::NAN, 0.0));

        assert!(matches!(result, Err(SpawnError::NonFinitePosition(_, _))));
        assert_eq!(sim.parasite_id(), Some(id));
        assert!(sim.parasite().is_some());
    }

    #[test]
    fn test_nutrient_pickup_during_tick() {
        let mut sim = create_test_sim();
        sim.start_run().unwrap();
        let nutrient = sim.spawn(EntityKind::Nutrient, Vec2::new(1510.0, 1500.0), 6.0, 0.0).unwrap();
        let seen = record_kinds(&sim, &[EventKind::PickupCollected, EventKind::BiomassGained]);

        let report = sim.tick(FRAME);

        assert_eq!(report.pickups, 1);
        assert!(sim.entity(nutrient).map_or(true, |e| !e.alive));
        assert_eq!(
            *seen.borrow(),
            vec![EventKind::PickupCollected, EventKind::BiomassGained]
        );
        assert_eq!(sim.state().run().total_biomass, 10.0);
    }

    #[test]
    fn test_events_delivered_at_end_of_tick_in_order() {
        let mut sim = create_test_sim();
        sim.start_run().unwrap();
        // Parked against the right wall, moving into it
        let cell = sim.spawn(EntityKind::Cell, Vec2::new(2970.0, 800.0), 10.0, 40.0).unwrap();
        sim.entity_mut(cell).unwrap().velocity = Vec2::new(150.0, 0.0);
        sim.spawn(EntityKind::Nutrient, Vec2::new(1505.0, 1500.0), 6.0, 0.0).unwrap();

        let seen = record_kinds(&sim, &[EventKind::WallHit, EventKind::PickupCollected]);
        let pending_during_tick = Rc::new(RefCell::new(None));
        {
            let bus = sim.bus().clone();
            let pending = pending_during_tick.clone();
            sim.bus().subscribe(EventKind::WallHit, move |_| {
                *pending.borrow_mut() = Some(bus.pending());
            });
        }

        let report = sim.tick(FRAME);

        assert_eq!(report.wall_hits, 1);
        // Wall hits are raised during integration, before contacts
        assert_eq!(*seen.borrow(), vec![EventKind::WallHit, EventKind::PickupCollected]);
        // Both were queued when delivery started
        assert_eq!(*pending_during_tick.borrow(), Some(2));
        assert_eq!(sim.bus().pending(), 0);
    }

    #[test]
    fn test_parasite_death_ends_run_and_saves() {
        let store = Rc::new(MemoryStore::new());
        let mut sim = create_test_sim().with_backend(Box::new(SharedStore(store.clone())));
        sim.start_run().unwrap();
        let cell = sim.spawn(EntityKind::Cell, Vec2::new(1520.0, 1500.0), 15.0, 1.0e6).unwrap();
        let over = record_kinds(&sim, &[EventKind::GameOver]);

        let mut died = false;
        for _ in 0..2000 {
            // Hold the cell in place against the parasite
            if let Some(c) = sim.entity_mut(cell) {
                c.position = Vec2::new(1520.0, 1500.0);
            }
            if let Some(p) = sim.parasite_id().and_then(|id| sim.entity_mut(id)) {
                p.position = Vec2::new(1500.0, 1500.0);
            }
            if sim.tick(100.0).parasite_died {
                died = true;
                break;
            }
        }

        assert!(died);
        assert!(!sim.state().is_run_active());
        assert!(sim.parasite().is_none());
        assert_eq!(*over.borrow(), vec![EventKind::GameOver]);
        assert_eq!(store.load().unwrap().runs_played, 1);
    }

    #[test]
    fn test_steering_moves_toward_target() {
        let mut sim = create_test_sim();
        sim.start_run().unwrap();
        sim.apply_input(InputCommand::SteerToward(Vec2::new(1500.0, 2500.0)));

        for _ in 0..30 {
            sim.tick(FRAME);
        }
        let parasite = sim.parasite().unwrap();
        assert!(parasite.position.y > 1500.0);
        assert!((parasite.position.x - 1500.0).abs() < 1.0);

        sim.apply_input(InputCommand::ClearTarget);
        assert!(sim.target().is_none());
    }

    #[test]
    fn test_drain_input_applies_in_order() {
        let mut sim = create_test_sim();
        sim.start_run().unwrap();
        let buffer = InputBuffer::new(8);
        buffer.try_submit(InputCommand::SteerToward(Vec2::new(10.0, 10.0)));
        buffer.try_submit(InputCommand::SetPaused(true));
        buffer.try_submit(InputCommand::SetPaused(false));
        buffer.try_submit(InputCommand::Accelerate(Vec2::new(0.0, 1.0)));

        assert_eq!(sim.drain_input(&buffer), 4);
        assert!(!sim.state().is_paused());
        assert_eq!(sim.target(), Some(Vec2::new(10.0, 10.0)));
        assert!(sim.parasite().unwrap().pending_acceleration.y > 0.0);
    }

    #[test]
    fn test_global_force_moves_every_body() {
        let mut sim = create_test_sim();
        let a = sim.spawn(EntityKind::Cell, Vec2::new(500.0, 500.0), 10.0, 40.0).unwrap();
        let b = sim.spawn(EntityKind::Nutrient, Vec2::new(900.0, 500.0), 5.0, 0.0).unwrap();
        sim.state_mut().add_global_force("current", 300.0, 0.0);

        sim.tick(FRAME);

        assert!(sim.entity(a).unwrap().velocity.x > 0.0);
        assert!(sim.entity(b).unwrap().velocity.x > 0.0);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut sim = create_test_sim();
        sim.start_run().unwrap();
        sim.spawn(EntityKind::Cell, Vec2::new(500.0, 500.0), 10.0, 40.0).unwrap();
        sim.bus().subscribe(EventKind::Paused, |_| {});

        sim.reset();

        assert_eq!(sim.pool_len(), 0);
        assert!(sim.parasite().is_none());
        assert_eq!(sim.bus().subscriber_count(EventKind::Paused), 0);
        assert_eq!(sim.tick(FRAME).integrated, 0);
    }

    #[test]
    fn test_independent_simulations() {
        let mut first = create_test_sim();
        let mut second = create_test_sim();
        first.start_run().unwrap();
        first.state_mut().grow(1.0);

        assert_eq!(second.state().stats().size_multiplier, 1.0);
        second.start_run().unwrap();
        assert_eq!(second.parasite().unwrap().radius(), 20.0);
    }

    #[test]
    fn test_random_crowd_stays_in_arena() {
        let mut sim = create_test_sim();
        sim.start_run().unwrap();
        let mut rng = rand::thread_rng();
        for i in 0..150 {
            let kind = if i % 3 == 0 { EntityKind::Nutrient } else { EntityKind::Cell };
            let pos = Vec2::new(rng.gen_range(0.0..3000.0), rng.gen_range(0.0..3000.0));
            let id = sim.spawn(kind, pos, rng.gen_range(4.0..30.0), 40.0).unwrap();
            sim.entity_mut(id).unwrap().velocity = Vec2::new(rng.gen_range(-150.0..150.0), rng.gen_range(-150.0..150.0));
        }

        for _ in 0..120 {
            sim.tick(FRAME);
        }

        for entity in sim.entities() {
            assert!(
                sim.bounds().contains(entity.position, entity.radius()),
                "entity {} escaped at {:?}",
                entity.id,
                entity.position
            );
        }
    }

    /// Lets a test keep a handle to the store it hands to the simulation
    struct SharedStore(Rc<MemoryStore>);

    impl PersistenceBackend for SharedStore {
        fn load(&self) -> Result<PersistentData, crate::persistence::PersistenceError> {
            self.0.load()
        }

        fn save(&self, data: &PersistentData) -> Result<(), crate::persistence::PersistenceError> {
            self.0.save(data)
        }
    }
}
