//! Axis-aligned bounding boxes, 3D and 2D.
//!
//! Both variants use the same empty-box convention: `min = +INF`,
//! `max = -INF`, so that a union starting from `empty()` is the identity.

use glam::{Mat4, Vec2, Vec3};
use std::ops::{Add, AddAssign};

/// 3D axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Inverted bounds, neutral element for unions.
    pub fn empty() -> Self {
        Self {
            min: Vec3::splat(f32::INFINITY),
            max: Vec3::splat(f32::NEG_INFINITY),
        }
    }

    pub fn from_points(points: &[Vec3]) -> Self {
        let mut aabb = Self::empty();
        for &p in points {
            aabb.add_point(p);
        }
        aabb
    }

    /// Expand to include a point.
    pub fn add_point(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn contains_point(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// True when `min <= max` on every axis. An `empty()` box is not valid.
    pub fn is_valid(&self) -> bool {
        self.min.cmple(self.max).all()
    }

    /// Bounding box of this box transformed by `m` (all 8 corners re-wrapped).
    pub fn transformed(&self, m: Mat4) -> Self {
        let mut out = Self::empty();
        for i in 0..8 {
            let corner = Vec3::new(
                if i & 1 == 0 { self.min.x } else { self.max.x },
                if i & 2 == 0 { self.min.y } else { self.max.y },
                if i & 4 == 0 { self.min.z } else { self.max.z },
            );
            out.add_point(m.transform_point3(corner));
        }
        out
    }
}

impl Add for Aabb {
    type Output = Aabb;

    fn add(self, rhs: Aabb) -> Aabb {
        Aabb {
            min: self.min.min(rhs.min),
            max: self.max.max(rhs.max),
        }
    }
}

impl AddAssign for Aabb {
    fn add_assign(&mut self, rhs: Aabb) {
        *self = *self + rhs;
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::empty()
    }
}

/// 2D axis-aligned bounding box over the ground plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb2 {
    pub min: Vec2,
    pub max: Vec2,
}

impl Aabb2 {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    pub fn empty() -> Self {
        Self {
            min: Vec2::splat(f32::INFINITY),
            max: Vec2::splat(f32::NEG_INFINITY),
        }
    }

    pub fn from_points(points: &[Vec2]) -> Self {
        let mut aabb = Self::empty();
        for &p in points {
            aabb.add_point(p);
        }
        aabb
    }

    pub fn add_point(&mut self, point: Vec2) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn contains_point(&self, point: Vec2) -> bool {
        point.x >= self.min.x && point.x <= self.max.x && point.y >= self.min.y && point.y <= self.max.y
    }

    pub fn intersects(&self, other: &Aabb2) -> bool {
        self.max.x >= other.min.x
            && self.min.x <= other.max.x
            && self.max.y >= other.min.y
            && self.min.y <= other.max.y
    }

    /// Split point used by the quadtree.
    pub fn middle(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec2 {
        self.max - self.min
    }

    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y
    }

    /// Corners in order bottom-left, bottom-right, top-right, top-left.
    pub fn corners(&self) -> [Vec2; 4] {
        [
            self.min,
            Vec2::new(self.max.x, self.min.y),
            self.max,
            Vec2::new(self.min.x, self.max.y),
        ]
    }
}

impl Add for Aabb2 {
    type Output = Aabb2;

    fn add(self, rhs: Aabb2) -> Aabb2 {
        Aabb2 {
            min: self.min.min(rhs.min),
            max: self.max.max(rhs.max),
        }
    }
}

impl AddAssign for Aabb2 {
    fn add_assign(&mut self, rhs: Aabb2) {
        *self = *self + rhs;
    }
}

impl Default for Aabb2 {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_picks_componentwise_extremes() {
        let a = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let b = Aabb::new(Vec3::splat(-1.0), Vec3::splat(0.5));
        let u = a + b;
        assert_eq!(u.min, Vec3::splat(-1.0));
        assert_eq!(u.max, Vec3::ONE);
    }

    #[test]
    fn union_commutes() {
        let a = Aabb::new(Vec3::new(-2.0, 0.0, 1.0), Vec3::new(3.0, 4.0, 5.0));
        let b = Aabb::new(Vec3::new(0.0, -1.0, 2.0), Vec3::new(1.0, 9.0, 3.0));
        assert_eq!(a + b, b + a);
    }

    #[test]
    fn empty_is_union_identity() {
        let b = Aabb2::new(Vec2::new(1.0, 2.0), Vec2::new(3.0, 4.0));
        assert_eq!(Aabb2::empty() + b, b);
        assert!(!Aabb2::empty().is_valid());
    }

    #[test]
    fn add_point_grows_bounds() {
        let mut a = Aabb2::empty();
        a.add_point(Vec2::new(1.0, 1.0));
        a.add_point(Vec2::new(-1.0, 3.0));
        assert_eq!(a.min, Vec2::new(-1.0, 1.0));
        assert_eq!(a.max, Vec2::new(1.0, 3.0));
    }

    #[test]
    fn corners_order() {
        let a = Aabb2::new(Vec2::ZERO, Vec2::new(2.0, 4.0));
        let c = a.corners();
        assert_eq!(c[0], Vec2::ZERO);
        assert_eq!(c[1], Vec2::new(2.0, 0.0));
        assert_eq!(c[2], Vec2::new(2.0, 4.0));
        assert_eq!(c[3], Vec2::new(0.0, 4.0));
    }

    #[test]
    fn transformed_rewraps_corners() {
        let a = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let m = Mat4::from_translation(Vec3::new(5.0, 0.0, 0.0));
        let t = a.transformed(m);
        assert_eq!(t.min, Vec3::new(5.0, 0.0, 0.0));
        assert_eq!(t.max, Vec3::new(6.0, 1.0, 1.0));
    }
}
