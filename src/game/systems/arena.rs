//! Arena boundary system
//!
//! Axis-aligned rectangular arena with a wall margin. Bodies that cross a wall
//! are clamped back inside and bounce off with an energy-absorbing factor.

use serde::{Deserialize, Serialize};

use crate::config::SimConfig;
use crate::util::vec2::Vec2;

/// Arena walls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Wall {
    Left,
    Right,
    Top,
    Bottom,
}

/// A bounce strong enough to report
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WallImpact {
    pub wall: Wall,
    /// Point on the wall touched by the body's edge
    pub point: Vec2,
    /// Speed along the wall normal after the bounce, not `|velocity|`
    pub speed: f32,
}

/// Arena extent and wall response
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArenaBounds {
    pub width: f32,
    pub height: f32,
    /// Wall thickness on every side
    pub margin: f32,
    /// Fraction of perpendicular speed kept on a bounce, in (0, 1)
    pub bounce_factor: f32,
    /// Post-bounce perpendicular speed above which an impact is reported
    pub wall_hit_threshold: f32,
}

impl ArenaBounds {
    pub fn from_config(config: &SimConfig) -> Self {
        Self {
            width: config.world_width,
            height: config.world_height,
            margin: config.wall_margin,
            bounce_factor: config.bounce_factor,
            wall_hit_threshold: config.wall_hit_threshold,
        }
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.width * 0.5, self.height * 0.5)
    }

    /// Legal range for the center of a body of `radius`, per axis
    ///
    /// A body wider than the arena is pinned to the midpoint of that axis.
    pub fn legal_range(&self, radius: f32) -> (Vec2, Vec2) {
        let r = radius.max(0.0);
        let (min_x, max_x) = axis_range(self.margin + r, self.width - self.margin - r);
        let (min_y, max_y) = axis_range(self.margin + r, self.height - self.margin - r);
        (Vec2::new(min_x, min_y), Vec2::new(max_x, max_y))
    }

    /// Whether a body of `radius` at `position` is fully inside the walls
    pub fn contains(&self, position: Vec2, radius: f32) -> bool {
        let (min, max) = self.legal_range(radius);
        position.x >= min.x && position.x <= max.x && position.y >= min.y && position.y <= max.y
    }

    /// Clamp a center position into the legal range without touching velocity
    pub fn clamp_position(&self, position: Vec2, radius: f32) -> Vec2 {
        let (min, max) = self.legal_range(radius);
        Vec2::new(position.x.clamp(min.x, max.x), position.y.clamp(min.y, max.y))
    }

    /// Clamp a body inside the walls and bounce it off any wall it crossed
    ///
    /// Only a velocity component pointing into the crossed wall is reflected
    /// (`v = -v * bounce_factor`). Returns the strongest impact whose
    /// post-bounce perpendicular speed exceeds the threshold.
    pub fn enforce(&self, position: &mut Vec2, velocity: &mut Vec2, radius: f32) -> Option<WallImpact> {
        let (min, max) = self.legal_range(radius);
        let mut strongest: Option<WallImpact> = None;

        let mut report = |wall: Wall, point: Vec2, speed: f32| {
            if speed > self.wall_hit_threshold && strongest.map_or(true, |s| speed > s.speed) {
                strongest = Some(WallImpact { wall, point, speed });
            }
        };

        if position.x < min.x {
            position.x = min.x;
            if velocity.x < 0.0 {
                velocity.x = -velocity.x * self.bounce_factor;
                report(Wall::Left, Vec2::new(self.margin, position.y), velocity.x.abs());
            }
        } else if position.x > max.x {
            position.x = max.x;
            if velocity.x > 0.0 {
                velocity.x = -velocity.x * self.bounce_factor;
                report(Wall::Right, Vec2::new(self.width - self.margin, position.y), velocity.x.abs());
            }
        }

        if position.y < min.y {
            position.y = min.y;
            if velocity.y < 0.0 {
                velocity.y = -velocity.y * self.bounce_factor;
                report(Wall::Top, Vec2::new(position.x, self.margin), velocity.y.abs());
            }
        } else if position.y > max.y {
            position.y = max.y;
            if velocity.y > 0.0 {
                velocity.y = -velocity.y * self.bounce_factor;
                report(Wall::Bottom, Vec2::new(position.x, self.height - self.margin), velocity.y.abs());
            }
        }

        strongest
    }
}

impl Default for ArenaBounds {
    fn default() -> Self {
        Self::from_config(&SimConfig::default())
    }
}

#[inline]
fn axis_range(lo: f32, hi: f32) -> (f32, f32) {
    if lo <= hi {
        (lo, hi)
    } else {
        let mid = (lo + hi) * 0.5;
        (mid, mid)
    }
}
