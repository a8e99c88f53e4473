/// Physics constants - drag is defined per canonical frame, NOT per tick
pub mod physics {
    /// Canonical frame duration in milliseconds that `drag` is defined against
    /// Applied as: velocity *= drag ^ (dt_ms / CANONICAL_FRAME_MS)
    pub const CANONICAL_FRAME_MS: f32 = 16.667;
    /// Speeds below this snap to zero (world units per second)
    pub const MIN_SPEED: f32 = 1.0;
    /// Milliseconds per second, for scaling per-second rates by dt
    pub const MS_PER_SECOND: f32 = 1000.0;
    /// Hard ceiling for drag so decay is always strict
    pub const MAX_DRAG: f32 = 0.999;
    /// Hard floor for drag
    pub const MIN_DRAG: f32 = 0.01;
    /// Headless runner tick rate in Hz
    pub const TICK_RATE: u32 = 60;
    /// Tick duration in milliseconds
    pub const TICK_DURATION_MS: f32 = 1000.0 / TICK_RATE as f32;
}

/// Run progression constants
pub mod progression {
    /// Biomass needed to leave level 1
    pub const BASE_LEVEL_THRESHOLD: f32 = 100.0;
    /// Threshold growth per level
    pub const LEVEL_THRESHOLD_GROWTH: f32 = 1.5;
    /// Currency earned per unit of total biomass
    pub const CURRENCY_PER_BIOMASS: f32 = 0.1;
    /// Currency earned per level reached beyond 1
    pub const CURRENCY_PER_LEVEL: u64 = 5;
    /// Currency earned per hostile cell cleared
    pub const CURRENCY_PER_CELL: u64 = 2;
}

/// Contact gameplay between entity kinds
pub mod contact {
    /// Damage per second a hostile cell deals to the parasite while touching
    pub const CELL_DAMAGE_PER_SECOND: f32 = 20.0;
    /// Damage per second the parasite deals to a touching hostile cell
    pub const PARASITE_DAMAGE_PER_SECOND: f32 = 35.0;
    /// Biomass gained per nutrient collected
    pub const NUTRIENT_BIOMASS: f32 = 10.0;
    /// Biomass gained per hostile cell destroyed
    pub const CELL_BIOMASS: f32 = 25.0;
    /// Size multiplier added per level-up
    pub const GROWTH_PER_LEVEL: f32 = 0.1;
}

/// Threshold of biomass needed to advance from `level`
///
/// `floor(100 * 1.5^(level - 1))`
#[inline]
pub fn level_threshold(level: u32) -> f32 {
    let exponent = level.saturating_sub(1) as i32;
    (progression::BASE_LEVEL_THRESHOLD * progression::LEVEL_THRESHOLD_GROWTH.powi(exponent)).floor()
}

/// Drag factor for an elapsed time, re-normalized to the canonical frame
#[inline]
pub fn drag_factor(drag: f32, dt_ms: f32) -> f32 {
    drag.powf(dt_ms / physics::CANONICAL_FRAME_MS)
}
