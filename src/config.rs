use tracing::warn;

/// Simulation configuration
///
/// Supplied once at initialization and treated as immutable for the
/// lifetime of a `Simulation`.
#[derive(Debug, Clone, PartialEq)]
pub struct SimConfig {
    /// Arena width in world units
    pub world_width: f32,
    /// Arena height in world units
    pub world_height: f32,
    /// Wall thickness kept clear on every side
    pub wall_margin: f32,
    /// Radius of a freshly spawned parasite at size 1.0
    pub base_radius: f32,
    /// Starting max health of the parasite
    pub base_max_health: f32,
    /// Parasite acceleration at size 1.0 (units/s²)
    pub base_acceleration: f32,
    /// Parasite drag per canonical frame, in (0, 1)
    pub base_drag: f32,
    /// Parasite max speed at size 1.0 (units/s)
    pub base_max_speed: f32,
    /// Parasite turn rate at size 1.0 (rad/s)
    pub base_turn_rate: f32,
    /// Fraction of perpendicular speed kept after a wall bounce, in (0, 1)
    pub bounce_factor: f32,
    /// Post-bounce perpendicular speed above which a wall hit is reported
    pub wall_hit_threshold: f32,
    /// Steering targets closer than this produce no acceleration
    pub dead_zone_radius: f32,
    /// Broad-phase grid cell size
    pub spatial_cell_size: f32,
    /// Floor for the parasite size multiplier
    pub min_size_multiplier: f32,
    /// Share of penetration depth applied to the first body of a pair
    pub push_ratio: f32,
    /// Drag for non-controlled drifting bodies
    pub drift_drag: f32,
    /// Max speed for non-controlled drifting bodies
    pub drift_max_speed: f32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            world_width: 3000.0,
            world_height: 3000.0,
            wall_margin: 20.0,
            base_radius: 20.0,
            base_max_health: 100.0,
            base_acceleration: 800.0,
            base_drag: 0.94,
            base_max_speed: 400.0,
            base_turn_rate: 6.0,
            bounce_factor: 0.5,
            wall_hit_threshold: 60.0,
            dead_zone_radius: 10.0,
            spatial_cell_size: 64.0,
            min_size_multiplier: 0.25,
            push_ratio: 0.5,
            drift_drag: 0.98,
            drift_max_speed: 150.0,
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be a finite number greater than 0, got {1}")]
    NotPositive(&'static str, f32),
    #[error("{0} must be strictly between 0 and 1, got {1}")]
    NotUnitOpen(&'static str, f32),
    #[error("{0} must be within [0, 1], got {1}")]
    NotUnitClosed(&'static str, f32),
    #[error("{0} must be a finite number >= 0, got {1}")]
    Negative(&'static str, f32),
    #[error("wall margin {margin} leaves no room in a {width}x{height} arena")]
    ArenaTooSmall { width: f32, height: f32, margin: f32 },
}

/// Read an f32 override from the environment, keeping `current` on parse failure
fn env_f32(key: &str, current: &mut f32) {
    if let Ok(raw) = std::env::var(key) {
        match raw.parse::<f32>() {
            Ok(parsed) if parsed.is_finite() => *current = parsed,
            _ => warn!("Invalid {} '{}', using default {}", key, raw, current),
        }
    }
}

impl SimConfig {
    /// Load config from environment (`SIM_*` variables) or use defaults
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        env_f32("SIM_WORLD_WIDTH", &mut config.world_width);
        env_f32("SIM_WORLD_HEIGHT", &mut config.world_height);
        env_f32("SIM_WALL_MARGIN", &mut config.wall_margin);
        env_f32("SIM_BASE_RADIUS", &mut config.base_radius);
        env_f32("SIM_BASE_MAX_HEALTH", &mut config.base_max_health);
        env_f32("SIM_BASE_ACCELERATION", &mut config.base_acceleration);
        env_f32("SIM_BASE_DRAG", &mut config.base_drag);
        env_f32("SIM_BASE_MAX_SPEED", &mut config.base_max_speed);
        env_f32("SIM_BASE_TURN_RATE", &mut config.base_turn_rate);
        env_f32("SIM_BOUNCE_FACTOR", &mut config.bounce_factor);
        env_f32("SIM_WALL_HIT_THRESHOLD", &mut config.wall_hit_threshold);
        env_f32("SIM_DEAD_ZONE_RADIUS", &mut config.dead_zone_radius);
        env_f32("SIM_SPATIAL_CELL_SIZE", &mut config.spatial_cell_size);
        env_f32("SIM_MIN_SIZE_MULTIPLIER", &mut config.min_size_multiplier);
        env_f32("SIM_PUSH_RATIO", &mut config.push_ratio);
        env_f32("SIM_DRIFT_DRAG", &mut config.drift_drag);
        env_f32("SIM_DRIFT_MAX_SPEED", &mut config.drift_max_speed);

        config
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("world_width", self.world_width),
            ("world_height", self.world_height),
            ("base_radius", self.base_radius),
            ("base_acceleration", self.base_acceleration),
            ("base_max_speed", self.base_max_speed),
            ("base_turn_rate", self.base_turn_rate),
            ("spatial_cell_size", self.spatial_cell_size),
            ("min_size_multiplier", self.min_size_multiplier),
            ("drift_max_speed", self.drift_max_speed),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::NotPositive(name, value));
            }
        }

        let non_negative = [
            ("wall_margin", self.wall_margin),
            ("base_max_health", self.base_max_health),
            ("wall_hit_threshold", self.wall_hit_threshold),
            ("dead_zone_radius", self.dead_zone_radius),
        ];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::Negative(name, value));
            }
        }

        let open_unit = [
            ("base_drag", self.base_drag),
            ("drift_drag", self.drift_drag),
            ("bounce_factor", self.bounce_factor),
        ];
        for (name, value) in open_unit {
            if !(value > 0.0 && value < 1.0) {
                return Err(ConfigError::NotUnitOpen(name, value));
            }
        }

        if !(0.0..=1.0).contains(&self.push_ratio) {
            return Err(ConfigError::NotUnitClosed("push_ratio", self.push_ratio));
        }

        if self.wall_margin * 2.0 >= self.world_width.min(self.world_height) {
            return Err(ConfigError::ArenaTooSmall {
                width: self.world_width,
                height: self.world_height,
                margin: self.wall_margin,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = SimConfig::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.world_width, 3000.0);
        assert_eq!(config.base_drag, 0.94);
    }

    #[test]
    fn test_rejects_drag_outside_open_unit() {
        let mut config = SimConfig::default();
        config.base_drag = 1.0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::NotUnitOpen("base_drag", 1.0))
        );

        config.base_drag = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_bounce() {
        let mut config = SimConfig::default();
        config.bounce_factor = 1.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NotUnitOpen("bounce_factor", _))
        ));
    }

    #[test]
    fn test_rejects_non_positive_cell_size() {
        let mut config = SimConfig::default();
        config.spatial_cell_size = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NotPositive("spatial_cell_size", _))
        ));
    }

    #[test]
    fn test_rejects_zero_size_floor() {
        let mut config = SimConfig::default();
        config.min_size_multiplier = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_margin_swallowing_arena() {
        let mut config = SimConfig::default();
        config.wall_margin = 1500.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ArenaTooSmall { .. })
        ));
    }

    #[test]
    fn test_rejects_nan() {
        let mut config = SimConfig::default();
        config.base_max_speed = f32::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_or_default() {
        let config = SimConfig::load_or_default();
        assert!(config.world_width > 0.0);
    }
}
