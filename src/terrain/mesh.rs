//! Terrain vertex/index generation: the shared vertex buffer, per-LOD index
//! buffers over grid sub-rectangles, and seam-hiding skirt geometry.
//!
//! Indices form two CCW triangles per cell. Every LOD level indexes the same
//! vertex set with a doubled stride; rows and columns not divisible by the
//! stride clamp to the rectangle edge so coarse buffers still reach it.

use std::collections::HashMap;

use bytemuck::{Pod, Zeroable};
use glam::Vec2;

use crate::terrain::heightfield::Heightfield;

/// Number of precomputed terrain LOD levels. Level 0 is full resolution;
/// each further level doubles the index stride.
pub const TERRAIN_LOD_LEVELS: u32 = 4;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct TerrainVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

/// Inclusive span of grid vertices `[x0, x1] x [y0, y1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridRect {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl GridRect {
    pub fn new(x0: u32, y0: u32, x1: u32, y1: u32) -> Self {
        debug_assert!(x0 <= x1 && y0 <= y1);
        Self { x0, y0, x1, y1 }
    }

    pub fn intersect(&self, other: &GridRect) -> Option<GridRect> {
        let x0 = self.x0.max(other.x0);
        let y0 = self.y0.max(other.y0);
        let x1 = self.x1.min(other.x1);
        let y1 = self.y1.min(other.y1);
        (x0 <= x1 && y0 <= y1).then(|| GridRect::new(x0, y0, x1, y1))
    }
}

/// Shared vertex buffer plus one concatenated index buffer; submeshes hold
/// ranges into the latter.
pub struct TerrainMesh {
    pub vertices: Vec<TerrainVertex>,
    pub indices: Vec<u32>,
}

/// One vertex per heightfield grid node, centered UVs scaled by `uv_repeat`.
pub fn build_vertices(field: &Heightfield, uv_repeat: f32) -> Vec<TerrainVertex> {
    let (w, h) = field.size();
    let hs = field.horizontal_scale();
    let mut vertices = Vec::with_capacity((w * h) as usize);
    for y in 0..h {
        for x in 0..w {
            let height = field.height_at_grid(x as i64, y as i64);
            let normal = field.normal_at_grid(x as i64, y as i64);
            vertices.push(TerrainVertex {
                position: [x as f32 * hs, height, y as f32 * hs],
                normal: normal.to_array(),
                uv: [
                    x as f32 / (w - 1) as f32 * uv_repeat,
                    y as f32 / (h - 1) as f32 * uv_repeat,
                ],
            });
        }
    }
    vertices
}

/// Index buffer for `rect` at `level` (stride `1 << level`), appended to
/// `out`. One parametrized walk serves every LOD level.
pub fn build_lod_indices(rect: GridRect, level: u32, grid_width: u32, out: &mut Vec<u32>) {
    let stride = 1u32 << level;
    let mut y = rect.y0;
    while y < rect.y1 {
        let y_next = (y + stride).min(rect.y1);
        let mut x = rect.x0;
        while x < rect.x1 {
            let x_next = (x + stride).min(rect.x1);
            let i0 = y * grid_width + x;
            let i1 = y * grid_width + x_next;
            let i2 = y_next * grid_width + x;
            let i3 = y_next * grid_width + x_next;
            // CCW when viewed from +Y: (i0, i2, i1) and (i1, i2, i3).
            out.extend_from_slice(&[i0, i2, i1, i1, i2, i3]);
            x = x_next;
        }
        y = y_next;
    }
}

/// Cache of lowered skirt vertices keyed by integer grid coordinate, shared
/// across all submeshes so touching edges reuse the same generated geometry.
pub struct SkirtCache {
    lowered: HashMap<(u32, u32), u32>,
}

impl SkirtCache {
    pub fn new() -> Self {
        Self {
            lowered: HashMap::new(),
        }
    }

    fn lowered_vertex(
        &mut self,
        x: u32,
        y: u32,
        grid_width: u32,
        depth: f32,
        vertices: &mut Vec<TerrainVertex>,
    ) -> u32 {
        *self.lowered.entry((x, y)).or_insert_with(|| {
            let mut v = vertices[(y * grid_width + x) as usize];
            v.position[1] -= depth;
            let index = vertices.len() as u32;
            vertices.push(v);
            index
        })
    }

    pub fn unique_lowered(&self) -> usize {
        self.lowered.len()
    }
}

impl Default for SkirtCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Vertical wall along the portions of `rect`'s boundary that lie on the
/// terrain's outer edge, at the stride of `level`. Walls are emitted for
/// outer edges only; interior seams between siblings are hidden by the
/// skirt of whichever coarse neighbor reaches the perimeter.
#[allow(clippy::too_many_arguments)]
pub fn build_skirt(
    rect: GridRect,
    level: u32,
    grid_size: (u32, u32),
    depth: f32,
    cache: &mut SkirtCache,
    vertices: &mut Vec<TerrainVertex>,
    out: &mut Vec<u32>,
) {
    let (w, h) = grid_size;
    let stride = 1u32 << level;

    // Each closure maps a step along the edge to a grid vertex.
    let mut emit_edge = |along: (u32, u32), fixed: u32, horizontal: bool| {
        let (start, end) = along;
        let mut a = start;
        while a < end {
            let b = (a + stride).min(end);
            let (ax, ay, bx, by) = if horizontal {
                (a, fixed, b, fixed)
            } else {
                (fixed, a, fixed, b)
            };
            let surf_a = ay * w + ax;
            let surf_b = by * w + bx;
            let low_a = cache.lowered_vertex(ax, ay, w, depth, vertices);
            let low_b = cache.lowered_vertex(bx, by, w, depth, vertices);
            out.extend_from_slice(&[surf_a, low_a, surf_b, surf_b, low_a, low_b]);
            a = b;
        }
    };

    if rect.y0 == 0 {
        emit_edge((rect.x0, rect.x1), 0, true);
    }
    if rect.y1 == h - 1 {
        emit_edge((rect.x0, rect.x1), h - 1, true);
    }
    if rect.x0 == 0 {
        emit_edge((rect.y0, rect.y1), 0, false);
    }
    if rect.x1 == w - 1 {
        emit_edge((rect.y0, rect.y1), w - 1, false);
    }
}

/// World-space ground-plane extent of a grid rectangle.
pub fn rect_world_min_max(rect: GridRect, horizontal_scale: f32) -> (Vec2, Vec2) {
    (
        Vec2::new(rect.x0 as f32, rect.y0 as f32) * horizontal_scale,
        Vec2::new(rect.x1 as f32, rect.y1 as f32) * horizontal_scale,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TerrainParams;

    fn flat_field(w: u32, h: u32) -> Heightfield {
        Heightfield::from_heights((w, h), 1.0, vec![1.0; (w * h) as usize])
    }

    #[test]
    fn vertex_grid_positions_and_uv() {
        let field = flat_field(3, 3);
        let verts = build_vertices(&field, 2.0);
        assert_eq!(verts.len(), 9);
        assert_eq!(verts[0].position, [0.0, 1.0, 0.0]);
        assert_eq!(verts[8].position, [2.0, 1.0, 2.0]);
        assert_eq!(verts[0].uv, [0.0, 0.0]);
        assert_eq!(verts[8].uv, [2.0, 2.0]);
    }

    #[test]
    fn lod_zero_covers_every_cell() {
        let rect = GridRect::new(0, 0, 4, 4);
        let mut indices = Vec::new();
        build_lod_indices(rect, 0, 5, &mut indices);
        assert_eq!(indices.len(), 4 * 4 * 6);
    }

    #[test]
    fn each_lod_level_quarters_triangle_count() {
        let rect = GridRect::new(0, 0, 8, 8);
        let mut lod0 = Vec::new();
        let mut lod1 = Vec::new();
        let mut lod2 = Vec::new();
        build_lod_indices(rect, 0, 9, &mut lod0);
        build_lod_indices(rect, 1, 9, &mut lod1);
        build_lod_indices(rect, 2, 9, &mut lod2);
        assert_eq!(lod0.len(), 8 * 8 * 6);
        assert_eq!(lod1.len(), 4 * 4 * 6);
        assert_eq!(lod2.len(), 2 * 2 * 6);
    }

    #[test]
    fn odd_rect_clamps_to_edge() {
        // 5 cells at stride 2: 2 full steps and a clamped final one.
        let rect = GridRect::new(0, 0, 5, 2);
        let mut indices = Vec::new();
        build_lod_indices(rect, 1, 6, &mut indices);
        assert_eq!(indices.len(), 3 * 1 * 6);
        // Last pushed index is the quad's far corner, clamped to the rect
        // edge: vertex (x=5, y=2) in a width-6 grid.
        assert_eq!(indices[indices.len() - 1], 2 * 6 + 5);
    }

    #[test]
    fn skirt_dedups_shared_corner_vertices() {
        let field = flat_field(5, 5);
        let params = TerrainParams::default();
        let mut vertices = build_vertices(&field, params.uv_repeat);
        let base_len = vertices.len();
        let mut cache = SkirtCache::new();
        let mut indices = Vec::new();

        // Two horizontally adjacent perimeter rects share the corner (2, 0).
        build_skirt(
            GridRect::new(0, 0, 2, 2),
            0,
            (5, 5),
            2.0,
            &mut cache,
            &mut vertices,
            &mut indices,
        );
        build_skirt(
            GridRect::new(2, 0, 4, 2),
            0,
            (5, 5),
            2.0,
            &mut cache,
            &mut vertices,
            &mut indices,
        );

        // Left rect touches west+south (+ its south-east corner), right rect
        // south+east; the shared (2,0) lowered vertex is emitted once.
        assert_eq!(vertices.len() - base_len, cache.unique_lowered());
        let lowered: Vec<_> = vertices[base_len..].iter().collect();
        for v in &lowered {
            assert_eq!(v.position[1], -1.0); // surface 1.0 dropped by 2.0
        }
    }

    #[test]
    fn interior_rect_emits_no_skirt() {
        let field = flat_field(9, 9);
        let mut vertices = build_vertices(&field, 1.0);
        let mut cache = SkirtCache::new();
        let mut indices = Vec::new();
        build_skirt(
            GridRect::new(2, 2, 6, 6),
            0,
            (9, 9),
            1.0,
            &mut cache,
            &mut vertices,
            &mut indices,
        );
        assert!(indices.is_empty());
        assert_eq!(cache.unique_lowered(), 0);
    }
}
