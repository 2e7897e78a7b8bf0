//! Geometric primitives shared by the terrain and culling code.

pub mod aabb;
pub mod shapes;

pub use aabb::{Aabb, Aabb2};
pub use shapes::{
    aabb_intersects_aabb, aabb_intersects_line, aabb_intersects_triangle, Line2, Triangle2,
};
