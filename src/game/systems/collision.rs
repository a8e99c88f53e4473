//! Narrow-phase collision and contact resolution
//!
//! Candidate pairs from the spatial grid are re-checked with an exact
//! circle-circle test. Contacts are then resolved by entity kind: hostile
//! cells trade damage with the parasite, nutrients are collected, and solid
//! bodies are pushed apart.

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::game::constants::{contact, physics};
use crate::game::entity::{Entity, EntityId, EntityKind};
use crate::game::events::Event;
use crate::game::spatial::SpatialEntity;
use crate::game::state::SimulationState;
use crate::game::systems::arena::ArenaBounds;
use crate::util::geometry::{circle_circle, separate, Contact};

/// An exact overlap between two bodies
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionResult {
    /// Lower id of the pair
    pub a: EntityId,
    pub b: EntityId,
    /// Normal points from `a` toward `b`
    pub contact: Contact,
}

/// Exact test over broad-phase candidates, preserving their order
pub fn narrow_phase(candidates: &[(SpatialEntity, SpatialEntity)]) -> Vec<CollisionResult> {
    candidates
        .iter()
        .filter_map(|(a, b)| {
            circle_circle(a.position, a.radius, b.position, b.radius).map(|contact| CollisionResult {
                a: a.id,
                b: b.id,
                contact,
            })
        })
        .collect()
}

/// What contact resolution did during one tick
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContactSummary {
    /// Contacts acted upon (separated, damaged or collected)
    pub resolved: usize,
    pub pickups: u32,
    pub cells_killed: u32,
    /// The controlled body reached zero health
    pub parasite_died: bool,
}

/// Settings shared by every contact in a tick
#[derive(Debug, Clone, Copy)]
pub struct ContactContext<'a> {
    pub bounds: &'a ArenaBounds,
    /// Share of the separation applied to the lower-id body
    pub push_ratio: f32,
    pub dt_ms: f32,
}

/// Apply gameplay effects and positional correction for each contact
///
/// `index` maps live entity ids to slots in `entities`. Contacts involving a
/// body retired earlier in the same pass are skipped.
pub fn resolve_contacts(
    entities: &mut [Entity],
    index: &FxHashMap<EntityId, usize>,
    contacts: &[CollisionResult],
    state: &mut SimulationState,
    ctx: ContactContext<'_>,
) -> ContactSummary {
    let mut summary = ContactSummary::default();
    let seconds = ctx.dt_ms / physics::MS_PER_SECOND;

    for hit in contacts {
        let (Some(&ia), Some(&ib)) = (index.get(&hit.a), index.get(&hit.b)) else {
            continue;
        };
        let Some((a, b)) = pair_mut(entities, ia, ib) else {
            continue;
        };
        if !a.alive || !b.alive {
            continue;
        }

        match (a.kind, b.kind) {
            (EntityKind::Parasite, EntityKind::Cell) => {
                push_apart(a, b, &hit.contact, ctx);
                fight(a, b, state, seconds, &mut summary);
            }
            (EntityKind::Cell, EntityKind::Parasite) => {
                push_apart(a, b, &hit.contact, ctx);
                fight(b, a, state, seconds, &mut summary);
            }
            (EntityKind::Parasite, EntityKind::Nutrient) => collect(b, state, &mut summary),
            (EntityKind::Nutrient, EntityKind::Parasite) => collect(a, state, &mut summary),
            (EntityKind::Cell, EntityKind::Cell) => push_apart(a, b, &hit.contact, ctx),
            _ => continue,
        }
        summary.resolved += 1;
    }

    summary
}

/// Add biomass and grow once per level gained
pub fn gain_biomass(state: &mut SimulationState, amount: f32) -> u32 {
    let levels = state.add_biomass(amount);
    if levels > 0 {
        state.grow(contact::GROWTH_PER_LEVEL * levels as f32);
    }
    levels
}

/// Two distinct mutable slots of one slice
fn pair_mut(entities: &mut [Entity], i: usize, j: usize) -> Option<(&mut Entity, &mut Entity)> {
    if i == j || i >= entities.len() || j >= entities.len() {
        return None;
    }
    if i < j {
        let (lo, hi) = entities.split_at_mut(j);
        Some((&mut lo[i], &mut hi[0]))
    } else {
        let (lo, hi) = entities.split_at_mut(i);
        Some((&mut hi[0], &mut lo[j]))
    }
}

fn push_apart(a: &mut Entity, b: &mut Entity, contact: &Contact, ctx: ContactContext<'_>) {
    separate(&mut a.position, &mut b.position, contact, ctx.push_ratio);
    a.position = ctx.bounds.clamp_position(a.position, a.radius());
    b.position = ctx.bounds.clamp_position(b.position, b.radius());
}

fn fight(
    parasite: &mut Entity,
    cell: &mut Entity,
    state: &mut SimulationState,
    seconds: f32,
    summary: &mut ContactSummary,
) {
    if cell.apply_damage(contact::PARASITE_DAMAGE_PER_SECOND * seconds) {
        summary.cells_killed += 1;
        debug!(cell = cell.id, "Cell destroyed");
        state.bus().publish(Event::EntityDied {
            entity: cell.id,
            kind: cell.kind,
        });
        state.record_cell_cleared();
        gain_biomass(state, contact::CELL_BIOMASS);
    }

    let died = state.damage(parasite.id, contact::CELL_DAMAGE_PER_SECOND * seconds);
    parasite.health = state.stats().health;
    if died {
        parasite.retire();
        summary.parasite_died = true;
        state.bus().publish(Event::EntityDied {
            entity: parasite.id,
            kind: parasite.kind,
        });
    }
}

fn collect(nutrient: &mut Entity, state: &mut SimulationState, summary: &mut ContactSummary) {
    nutrient.retire();
    summary.pickups += 1;
    state.bus().publish(Event::PickupCollected {
        entity: nutrient.id,
        biomass: contact::NUTRIENT_BIOMASS,
    });
    gain_biomass(state, contact::NUTRIENT_BIOMASS);
}
