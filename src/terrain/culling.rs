//! Frustum-vs-quadtree culling and LOD selection.
//!
//! The camera frustum is flattened to a ground-plane footprint: a triangle
//! from the far plane (apex pulled slightly behind the camera) plus a
//! near-region box that stays meaningful when the camera sits inside the
//! terrain, where the triangle approximation breaks down. Submesh nodes are
//! tested against both, and survivors pick a LOD from the squared-distance
//! table.

use std::ops::Range;

use glam::{Vec2, Vec3};

use crate::geom::{aabb_intersects_triangle, Aabb2, Triangle2};
use crate::quadtree::QuadTree;
use crate::terrain::mesh::TERRAIN_LOD_LEVELS;
use crate::terrain::submesh::{Prop, SubMesh};

/// Distance the footprint apex sits behind the camera, in world units.
const APEX_PADDING: f32 = 2.0;
/// Expansion of the near-region box around the near-plane corners.
const NEAR_PADDING: f32 = 1.0;

/// Camera frustum parameters, as the culling pass consumes them.
#[derive(Debug, Clone)]
pub struct Frustum {
    pub position: Vec3,
    pub direction: Vec3,
    pub fov_y: f32,
    pub aspect_ratio: f32,
    pub near: f32,
    pub far: f32,
}

impl Frustum {
    pub fn new(
        position: Vec3,
        direction: Vec3,
        fov_y: f32,
        aspect_ratio: f32,
        near: f32,
        far: f32,
    ) -> Self {
        Self {
            position,
            direction,
            fov_y,
            aspect_ratio,
            near,
            far,
        }
    }
}

/// Ground-plane projection of a frustum, rebuilt once per cull pass.
#[derive(Debug, Clone)]
pub struct FrustumFootprint {
    pub triangle: Triangle2,
    pub near_box: Aabb2,
    /// Union of the triangle's bounds and the near box; everything outside
    /// is culled without finer tests.
    pub limit: Aabb2,
    pub apex: Vec2,
}

impl FrustumFootprint {
    pub fn from_frustum(frustum: &Frustum) -> Self {
        let forward = frustum.direction.normalize();
        let ground_forward = Vec2::new(forward.x, forward.z);
        // Looking straight up or down leaves no ground heading; any fixed
        // direction works, the near box carries the visibility then.
        let heading = if ground_forward.length_squared() > 1e-8 {
            ground_forward.normalize()
        } else {
            Vec2::Y
        };

        let mut right = forward.cross(Vec3::Y);
        if right.length_squared() < 1e-8 {
            right = Vec3::X;
        }
        let right = right.normalize();
        let up = right.cross(forward);

        let half_h = frustum.far * (frustum.fov_y * 0.5).tan();
        let half_w = half_h * frustum.aspect_ratio;
        let far_center = frustum.position + forward * frustum.far;
        let far_center_2d = Vec2::new(far_center.x, far_center.z);

        // Lateral spread of the four far corners on the ground plane.
        let perp = heading.perp();
        let mut half_width = 0.0f32;
        for (sw, sh) in [(1.0, 1.0), (1.0, -1.0), (-1.0, 1.0), (-1.0, -1.0)] {
            let corner = far_center + right * (half_w * sw) + up * (half_h * sh);
            let lateral = (Vec2::new(corner.x, corner.z) - far_center_2d).dot(perp);
            half_width = half_width.max(lateral.abs());
        }

        let camera_2d = Vec2::new(frustum.position.x, frustum.position.z);
        let apex = camera_2d - heading * APEX_PADDING;
        let triangle = Triangle2::new(
            apex,
            far_center_2d + perp * half_width,
            far_center_2d - perp * half_width,
        );

        // Near-plane corners projected to the ground, padded; keeps close
        // terrain visible when the camera is at or below the surface.
        let near_half_h = frustum.near * (frustum.fov_y * 0.5).tan();
        let near_half_w = near_half_h * frustum.aspect_ratio;
        let near_center = frustum.position + forward * frustum.near;
        let mut near_box = Aabb2::from_points(&[camera_2d]);
        for (sw, sh) in [(1.0, 1.0), (1.0, -1.0), (-1.0, 1.0), (-1.0, -1.0)] {
            let corner = near_center + right * (near_half_w * sw) + up * (near_half_h * sh);
            near_box.add_point(Vec2::new(corner.x, corner.z));
        }
        near_box.min -= Vec2::splat(NEAR_PADDING);
        near_box.max += Vec2::splat(NEAR_PADDING);

        let limit = triangle.aabb() + near_box;

        Self {
            triangle,
            near_box,
            limit,
            apex,
        }
    }

    /// Visibility test for a submesh region.
    pub fn intersects(&self, aabb: &Aabb2) -> bool {
        if !aabb.intersects(&self.limit) {
            return false;
        }
        aabb.intersects(&self.near_box) || aabb_intersects_triangle(aabb, &self.triangle)
    }
}

/// Squared-distance LOD table: level `n` is selected out to `base * 4^n`.
pub fn lod_distance_table(base_step: f32) -> [f32; TERRAIN_LOD_LEVELS as usize] {
    let mut table = [0.0; TERRAIN_LOD_LEVELS as usize];
    for (level, slot) in table.iter_mut().enumerate() {
        *slot = base_step * 4f32.powi(level as i32);
    }
    table
}

/// First level whose threshold covers `dist_sq`; coarsest when none does.
pub fn select_lod(dist_sq: f32, table: &[f32; TERRAIN_LOD_LEVELS as usize]) -> u32 {
    for (level, &threshold) in table.iter().enumerate() {
        if dist_sq <= threshold {
            return level as u32;
        }
    }
    TERRAIN_LOD_LEVELS - 1
}

/// One submesh selected for rasterization this frame.
pub struct DrawCommand<'a> {
    pub index_range: Range<u32>,
    pub skirt_range: Range<u32>,
    pub lod: u32,
    pub node_aabb: Aabb2,
    pub props: Vec<&'a Prop>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CullStats {
    pub nodes_visited: u32,
    pub nodes_culled: u32,
    pub nodes_drawn: u32,
    pub triangles: u32,
}

/// Output of one cull pass: CPU-decided, GPU-agnostic.
pub struct DrawList<'a> {
    pub commands: Vec<DrawCommand<'a>>,
    pub stats: CullStats,
}

/// Walk the submesh tree, pruning invisible branches and terminating descent
/// at the first node whose level satisfies the distance-selected LOD. A node
/// emitted covers all its descendants, so nothing is drawn twice.
pub fn render_cull<'a>(
    tree: &'a QuadTree<SubMesh>,
    footprint: &FrustumFootprint,
    lod_distances: &[f32; TERRAIN_LOD_LEVELS as usize],
    prop_render_distance: f32,
) -> DrawList<'a> {
    let mut commands = Vec::new();
    let mut stats = CullStats::default();
    let prop_dist_sq = prop_render_distance * prop_render_distance;

    tree.traverse(&mut |node| {
        stats.nodes_visited += 1;
        let aabb = node.aabb();
        if !footprint.intersects(&aabb) {
            stats.nodes_culled += 1;
            return false;
        }

        let dist_sq = (aabb.middle() - footprint.apex).length_squared();
        let lod = select_lod(dist_sq, lod_distances);
        if node.level() > lod {
            // Too coarse for this distance: descend to finer nodes.
            return true;
        }

        if let Some(submesh) = &node.data {
            let props = submesh
                .props
                .iter()
                .filter(|p| {
                    let ground = Vec2::new(p.position.x, p.position.z);
                    (ground - footprint.apex).length_squared() <= prop_dist_sq
                })
                .collect();
            stats.nodes_drawn += 1;
            stats.triangles += submesh.triangle_count();
            commands.push(DrawCommand {
                index_range: submesh.index_range.clone(),
                skirt_range: submesh.skirt_range.clone(),
                lod: submesh.lod,
                node_aabb: aabb,
                props,
            });
        }
        false
    });

    DrawList { commands, stats }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forward_frustum() -> Frustum {
        Frustum::new(
            Vec3::new(0.0, 10.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
            60f32.to_radians(),
            16.0 / 9.0,
            0.1,
            200.0,
        )
    }

    #[test]
    fn lod_selection_is_monotonic_in_distance() {
        let table = lod_distance_table(100.0);
        let mut last = 0;
        for step in 0..200 {
            let dist_sq = step as f32 * 40.0;
            let lod = select_lod(dist_sq, &table);
            assert!(lod >= last, "lod regressed at dist_sq={dist_sq}");
            last = lod;
        }
        assert_eq!(select_lod(0.0, &table), 0);
        assert_eq!(select_lod(1e12, &table), TERRAIN_LOD_LEVELS - 1);
    }

    #[test]
    fn footprint_culls_terrain_behind_camera() {
        let footprint = FrustumFootprint::from_frustum(&forward_frustum());
        // Region well behind the camera.
        let behind = Aabb2::new(Vec2::new(-10.0, -100.0), Vec2::new(10.0, -50.0));
        assert!(!footprint.intersects(&behind));
        // Region straight ahead.
        let ahead = Aabb2::new(Vec2::new(-10.0, 50.0), Vec2::new(10.0, 80.0));
        assert!(footprint.intersects(&ahead));
    }

    #[test]
    fn near_box_keeps_camera_cell_visible() {
        let footprint = FrustumFootprint::from_frustum(&forward_frustum());
        // A small region under the camera, outside the forward triangle.
        let under = Aabb2::new(Vec2::new(-0.5, -1.5), Vec2::new(0.5, -0.5));
        assert!(footprint.intersects(&under));
    }

    #[test]
    fn straight_down_view_still_sees_ground_below() {
        let frustum = Frustum::new(
            Vec3::new(5.0, 50.0, 5.0),
            Vec3::new(0.0, -1.0, 0.0),
            60f32.to_radians(),
            1.0,
            0.1,
            100.0,
        );
        let footprint = FrustumFootprint::from_frustum(&frustum);
        let below = Aabb2::new(Vec2::new(4.0, 4.0), Vec2::new(6.0, 6.0));
        assert!(footprint.intersects(&below));
    }

    #[test]
    fn lod_table_scales_by_four() {
        let table = lod_distance_table(100.0);
        assert_eq!(table, [100.0, 400.0, 1600.0, 6400.0]);
    }
}
