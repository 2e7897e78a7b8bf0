//! 2D primitives and the intersection tests used by frustum culling.
//!
//! The culling pass approximates the camera frustum with a ground-plane
//! triangle plus a near-region box; submesh bounds are tested against both.

use glam::Vec2;

use super::aabb::Aabb2;

/// Line segment in the ground plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line2 {
    pub a: Vec2,
    pub b: Vec2,
}

impl Line2 {
    pub fn new(a: Vec2, b: Vec2) -> Self {
        Self { a, b }
    }

    /// Segment-vs-segment intersection (touching endpoints count).
    pub fn intersects_line(&self, other: &Line2) -> bool {
        let d1 = self.b - self.a;
        let d2 = other.b - other.a;
        let denom = d1.perp_dot(d2);
        let delta = other.a - self.a;
        if denom.abs() < f32::EPSILON {
            // Parallel: overlapping only when collinear and ranges touch.
            if delta.perp_dot(d1).abs() > f32::EPSILON {
                return false;
            }
            let len2 = d1.length_squared();
            if len2 < f32::EPSILON {
                return other.aabb().contains_point(self.a);
            }
            let t0 = delta.dot(d1) / len2;
            let t1 = (other.b - self.a).dot(d1) / len2;
            let (lo, hi) = if t0 <= t1 { (t0, t1) } else { (t1, t0) };
            return lo <= 1.0 && hi >= 0.0;
        }
        let t = delta.perp_dot(d2) / denom;
        let u = delta.perp_dot(d1) / denom;
        (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u)
    }

    pub fn aabb(&self) -> Aabb2 {
        Aabb2::from_points(&[self.a, self.b])
    }
}

/// Triangle in the ground plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle2 {
    pub a: Vec2,
    pub b: Vec2,
    pub c: Vec2,
}

impl Triangle2 {
    pub fn new(a: Vec2, b: Vec2, c: Vec2) -> Self {
        Self { a, b, c }
    }

    pub fn aabb(&self) -> Aabb2 {
        Aabb2::from_points(&[self.a, self.b, self.c])
    }

    /// Same-side sign test; points on an edge count as inside.
    pub fn contains_point(&self, p: Vec2) -> bool {
        let s0 = (self.b - self.a).perp_dot(p - self.a);
        let s1 = (self.c - self.b).perp_dot(p - self.b);
        let s2 = (self.a - self.c).perp_dot(p - self.c);
        let has_neg = s0 < 0.0 || s1 < 0.0 || s2 < 0.0;
        let has_pos = s0 > 0.0 || s1 > 0.0 || s2 > 0.0;
        !(has_neg && has_pos)
    }

    pub fn edges(&self) -> [Line2; 3] {
        [
            Line2::new(self.a, self.b),
            Line2::new(self.b, self.c),
            Line2::new(self.c, self.a),
        ]
    }
}

/// Box-vs-box overlap.
pub fn aabb_intersects_aabb(a: &Aabb2, b: &Aabb2) -> bool {
    a.intersects(b)
}

/// Box-vs-segment: either an endpoint is inside or the segment crosses an edge.
pub fn aabb_intersects_line(aabb: &Aabb2, line: &Line2) -> bool {
    if aabb.contains_point(line.a) || aabb.contains_point(line.b) {
        return true;
    }
    let c = aabb.corners();
    for i in 0..4 {
        let edge = Line2::new(c[i], c[(i + 1) % 4]);
        if line.intersects_line(&edge) {
            return true;
        }
    }
    false
}

/// Box-vs-triangle: corner containment both ways, then edge crossings.
pub fn aabb_intersects_triangle(aabb: &Aabb2, tri: &Triangle2) -> bool {
    // Cheap reject on bounds first.
    if !aabb.intersects(&tri.aabb()) {
        return false;
    }
    for corner in aabb.corners() {
        if tri.contains_point(corner) {
            return true;
        }
    }
    if aabb.contains_point(tri.a) || aabb.contains_point(tri.b) || aabb.contains_point(tri.c) {
        return true;
    }
    for edge in tri.edges() {
        if aabb_intersects_line(aabb, &edge) {
            return true;
        }
    }
    false
}
