//! Spatial hash grid broad phase
//!
//! Divides the arena into square cells. A body is stored in every cell its
//! bounding square overlaps, so any two overlapping bodies always share at
//! least one cell. Candidate pairs are sound (no true contact is missed) but
//! not tight: the narrow phase re-checks every pair.

use hashbrown::HashMap;
use rustc_hash::FxHashSet;
use tracing::warn;

use crate::game::entity::EntityId;
use crate::util::vec2::Vec2;

/// Default cell size for the entity grid (world units)
/// Typical body diameters (20-60) span one or two cells
pub const ENTITY_GRID_CELL_SIZE: f32 = 64.0;

/// Bodies spanning more cells than this are kept in a side list instead
const MAX_CELLS_PER_ENTITY: i64 = 256;

/// Initial capacity for entity grid cells (number of expected non-empty cells)
const ENTITY_GRID_INITIAL_CAPACITY: usize = 256;

/// Initial capacity for entity vectors within cells
const ENTITY_CELL_INITIAL_CAPACITY: usize = 8;

/// Grid cell key - (x, y) cell coordinates
pub type CellKey = (i32, i32);

/// Body data stored in the spatial grid
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialEntity {
    pub id: EntityId,
    pub position: Vec2,
    pub radius: f32,
}

/// Inclusive range of cells covered by a square
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CellSpan {
    min: CellKey,
    max: CellKey,
}

impl CellSpan {
    fn cell_count(&self) -> i64 {
        let w = (self.max.0 as i64 - self.min.0 as i64) + 1;
        let h = (self.max.1 as i64 - self.min.1 as i64) + 1;
        w * h
    }

    fn contains(&self, key: CellKey) -> bool {
        key.0 >= self.min.0 && key.0 <= self.max.0 && key.1 >= self.min.1 && key.1 <= self.max.1
    }

    fn keys(&self) -> impl Iterator<Item = CellKey> {
        let span = *self;
        (span.min.0..=span.max.0).flat_map(move |cx| (span.min.1..=span.max.1).map(move |cy| (cx, cy)))
    }
}

/// Uniform grid broad phase, rebuilt every tick
pub struct SpatialGrid {
    /// Cell size in world units
    cell_size: f32,
    /// Inverse cell size for fast position-to-cell conversion
    inv_cell_size: f32,
    /// Map from cell key to bodies overlapping that cell
    cells: HashMap<CellKey, Vec<SpatialEntity>>,
    /// Bodies too large for per-cell storage; candidates for everything
    oversized: Vec<SpatialEntity>,
    /// Number of distinct bodies inserted since the last clear
    entity_count: usize,
}

impl SpatialGrid {
    /// Create a grid; a non-positive cell size falls back to the default
    pub fn new(cell_size: f32) -> Self {
        let cell_size = if cell_size.is_finite() && cell_size > 0.0 {
            cell_size
        } else {
            warn!(cell_size, "invalid grid cell size, using default");
            ENTITY_GRID_CELL_SIZE
        };

        Self {
            cell_size,
            inv_cell_size: 1.0 / cell_size,
            cells: HashMap::with_capacity(ENTITY_GRID_INITIAL_CAPACITY),
            oversized: Vec::new(),
            entity_count: 0,
        }
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Remove every body; cell allocations are kept for reuse
    #[inline]
    pub fn clear(&mut self) {
        for cell in self.cells.values_mut() {
            cell.clear();
        }
        self.oversized.clear();
        self.entity_count = 0;
    }

    /// Number of bodies inserted since the last clear
    pub fn len(&self) -> usize {
        self.entity_count
    }

    pub fn is_empty(&self) -> bool {
        self.entity_count == 0
    }

    /// Convert world position to cell key
    #[inline]
    fn position_to_cell(&self, position: Vec2) -> CellKey {
        (
            (position.x * self.inv_cell_size).floor() as i32,
            (position.y * self.inv_cell_size).floor() as i32,
        )
    }

    /// Cells overlapped by the square of half-size `radius` around `center`
    fn span(&self, center: Vec2, radius: f32) -> CellSpan {
        let r = radius.max(0.0);
        CellSpan {
            min: self.position_to_cell(Vec2::new(center.x - r, center.y - r)),
            max: self.position_to_cell(Vec2::new(center.x + r, center.y + r)),
        }
    }

    /// Insert a body into every cell its bounding square overlaps
    pub fn insert(&mut self, entity: SpatialEntity) {
        self.entity_count += 1;

        let span = self.span(entity.position, entity.radius);
        if span.cell_count() > MAX_CELLS_PER_ENTITY {
            self.oversized.push(entity);
            return;
        }

        for key in span.keys() {
            self.cells
                .entry(key)
                .or_insert_with(|| Vec::with_capacity(ENTITY_CELL_INITIAL_CAPACITY))
                .push(entity);
        }
    }

    /// Clear and insert every body from `entities`
    pub fn rebuild(&mut self, entities: impl IntoIterator<Item = SpatialEntity>) {
        self.clear();
        for entity in entities {
            self.insert(entity);
        }
    }

    /// Visit every non-empty cell overlapping `span`
    fn for_each_cell_in<F>(&self, span: CellSpan, mut visit: F)
    where
        F: FnMut(&[SpatialEntity]),
    {
        // Huge spans: walking the occupied cells is cheaper than walking the span
        if span.cell_count() > self.cells.len() as i64 {
            for (key, cell) in &self.cells {
                if !cell.is_empty() && span.contains(*key) {
                    visit(cell.as_slice());
                }
            }
            return;
        }

        for key in span.keys() {
            if let Some(cell) = self.cells.get(&key) {
                if !cell.is_empty() {
                    visit(cell.as_slice());
                }
            }
        }
    }

    /// Bodies stored in any cell overlapping the disk at `(x, y)` with radius `r`
    ///
    /// Each body appears once. Results may include bodies that do not touch
    /// the disk; callers re-check exactly.
    pub fn query_radius(&self, x: f32, y: f32, r: f32) -> Vec<SpatialEntity> {
        let mut seen: FxHashSet<EntityId> = FxHashSet::default();
        let mut found = Vec::new();

        self.for_each_cell_in(self.span(Vec2::new(x, y), r), |cell| {
            for entity in cell {
                if seen.insert(entity.id) {
                    found.push(*entity);
                }
            }
        });

        for entity in &self.oversized {
            if seen.insert(entity.id) {
                found.push(*entity);
            }
        }

        found
    }

    /// Process each unordered candidate pair exactly once
    ///
    /// Pairs are visited with the lower id first.
    pub fn for_each_candidate_pair<F>(&self, mut callback: F)
    where
        F: FnMut(SpatialEntity, SpatialEntity),
    {
        let mut seen: FxHashSet<(EntityId, EntityId)> = FxHashSet::default();
        let mut emit = |a: SpatialEntity, b: SpatialEntity| {
            if a.id == b.id {
                return;
            }
            let (first, second) = if a.id < b.id { (a, b) } else { (b, a) };
            if seen.insert((first.id, second.id)) {
                callback(first, second);
            }
        };

        for entities in self.cells.values() {
            for i in 0..entities.len() {
                for j in (i + 1)..entities.len() {
                    emit(entities[i], entities[j]);
                }
            }
        }

        for (i, big) in self.oversized.iter().enumerate() {
            for other in &self.oversized[i + 1..] {
                emit(*big, *other);
            }
            for cell in self.cells.values() {
                for other in cell {
                    emit(*big, *other);
                }
            }
        }
    }

    /// Every unordered pair of distinct bodies sharing at least one cell
    ///
    /// Sorted by id so iteration order is reproducible.
    pub fn candidate_pairs(&self) -> Vec<(SpatialEntity, SpatialEntity)> {
        let mut pairs = Vec::new();
        self.for_each_candidate_pair(|a, b| pairs.push((a, b)));
        pairs.sort_unstable_by_key(|(a, b)| (a.id, b.id));
        pairs
    }

    /// Get statistics about the grid
    pub fn stats(&self) -> SpatialGridStats {
        let non_empty_cells = self.cells.values().filter(|c| !c.is_empty()).count();
        let total_entries: usize = self.cells.values().map(|c| c.len()).sum();
        let max_per_cell = self.cells.values().map(|c| c.len()).max().unwrap_or(0);

        SpatialGridStats {
            entities: self.entity_count,
            non_empty_cells,
            total_entries,
            max_per_cell,
            oversized: self.oversized.len(),
        }
    }
}

impl Default for SpatialGrid {
    fn default() -> Self {
        Self::new(ENTITY_GRID_CELL_SIZE)
    }
}

/// Statistics about the spatial grid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpatialGridStats {
    pub entities: usize,
    pub non_empty_cells: usize,
    /// Cell entries, counting multi-cell bodies once per cell
    pub total_entries: usize,
    pub max_per_cell: usize,
    pub oversized: usize,
}
