//! Overlap tests and penetration resolution for circles and axis-aligned rectangles
//!
//! All functions are pure. Contacts carry a unit normal pointing from the first
//! shape toward the second and a positive penetration depth.

use crate::util::vec2::Vec2;

/// Fallback normal for coincident centers
pub const DEGENERATE_NORMAL: Vec2 = Vec2::RIGHT;

/// Axis-aligned rectangle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub min: Vec2,
    pub max: Vec2,
}

impl Rect {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self {
            min: Vec2::new(min.x.min(max.x), min.y.min(max.y)),
            max: Vec2::new(min.x.max(max.x), min.y.max(max.y)),
        }
    }

    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.min.x && point.x <= self.max.x && point.y >= self.min.y && point.y <= self.max.y
    }

    pub fn overlaps(&self, other: &Rect) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    /// Closest point on or inside the rectangle
    pub fn clamp_point(&self, point: Vec2) -> Vec2 {
        Vec2::new(
            point.x.clamp(self.min.x, self.max.x),
            point.y.clamp(self.min.y, self.max.y),
        )
    }
}

/// Result of an exact overlap test
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    /// Unit normal from the first shape toward the second
    pub normal: Vec2,
    /// Penetration depth (> 0)
    pub depth: f32,
}

impl Contact {
    /// Penetration vector (normal scaled by depth)
    pub fn penetration(&self) -> Vec2 {
        self.normal * self.depth
    }
}

#[inline]
pub fn point_in_circle(point: Vec2, center: Vec2, radius: f32) -> bool {
    point.distance_sq_to(center) <= radius * radius
}

#[inline]
pub fn circles_overlap(a: Vec2, ra: f32, b: Vec2, rb: f32) -> bool {
    let reach = ra + rb;
    a.distance_sq_to(b) < reach * reach
}

/// Exact circle-circle test
///
/// Touching circles (distance == ra + rb) do not overlap.
pub fn circle_circle(a: Vec2, ra: f32, b: Vec2, rb: f32) -> Option<Contact> {
    if !circles_overlap(a, ra, b, rb) {
        return None;
    }

    let (normal, dist) = (b - a).normalize_with_length();
    let normal = if dist > 0.0 { normal } else { DEGENERATE_NORMAL };

    Some(Contact {
        normal,
        depth: (ra + rb) - dist,
    })
}

/// Exact circle-rectangle test
///
/// The normal points from the circle toward the rectangle, so pushing the
/// circle by `-penetration()` separates it. A center inside the rectangle is
/// pushed out through the nearest edge.
pub fn circle_rect(center: Vec2, radius: f32, rect: &Rect) -> Option<Contact> {
    if rect.contains(center) {
        let to_left = center.x - rect.min.x;
        let to_right = rect.max.x - center.x;
        let to_top = center.y - rect.min.y;
        let to_bottom = rect.max.y - center.y;

        // Normal points into the rectangle, away from the nearest edge
        let (normal, edge_dist) = [
            (Vec2::new(1.0, 0.0), to_left),
            (Vec2::new(-1.0, 0.0), to_right),
            (Vec2::new(0.0, 1.0), to_top),
            (Vec2::new(0.0, -1.0), to_bottom),
        ]
        .into_iter()
        .fold((Vec2::new(1.0, 0.0), f32::MAX), |best, candidate| {
            if candidate.1 < best.1 {
                candidate
            } else {
                best
            }
        });

        return Some(Contact {
            normal,
            depth: edge_dist + radius,
        });
    }

    let closest = rect.clamp_point(center);
    let offset = closest - center;
    if offset.length_sq() >= radius * radius {
        return None;
    }

    let (normal, dist) = offset.normalize_with_length();
    Some(Contact {
        normal,
        depth: radius - dist,
    })
}

/// Positional correction along a contact normal
///
/// `push_ratio` is the share of the depth applied to `a` (0.5 splits evenly,
/// 0.0 moves only `b`, 1.0 moves only `a`). Velocities and health are untouched.
pub fn separate(a: &mut Vec2, b: &mut Vec2, contact: &Contact, push_ratio: f32) {
    let ratio = push_ratio.clamp(0.0, 1.0);
    *a -= contact.normal * (contact.depth * ratio);
    *b += contact.normal * (contact.depth * (1.0 - ratio));
}
