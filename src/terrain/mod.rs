//! Procedural terrain: heightfield, LOD submesh quadtree, culling, rendering.
//!
//! Built once from [`TerrainParams`]; immutable afterwards except for the
//! per-frame submesh selection, which only reads the tree. The renderer and
//! physics collaborators consume it through [`Terrain::render_cull`] and the
//! `height_at`/`normal_at` queries.

pub mod culling;
pub mod heightfield;
pub mod mesh;
pub mod renderer;
pub mod submesh;

pub use culling::{CullStats, DrawCommand, DrawList, Frustum, FrustumFootprint};
pub use heightfield::Heightfield;
pub use mesh::{GridRect, TerrainMesh, TerrainVertex, TERRAIN_LOD_LEVELS};
pub use renderer::TerrainRenderer;
pub use submesh::{Prop, SubMesh};

use glam::{Vec2, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::TerrainParams;
use crate::geom::Aabb2;
use crate::quadtree::QuadTree;

pub struct Terrain {
    params: TerrainParams,
    field: Heightfield,
    mesh: TerrainMesh,
    tree: Box<QuadTree<SubMesh>>,
    lod_distances: [f32; TERRAIN_LOD_LEVELS as usize],
}

impl Terrain {
    /// Generate the heightfield from the params and build the full terrain.
    pub fn build(params: TerrainParams) -> Self {
        let field = Heightfield::generate(&params);
        Self::from_heightfield(params, field)
    }

    /// Build over an existing heightfield (tests, imported DEMs).
    pub fn from_heightfield(params: TerrainParams, field: Heightfield) -> Self {
        let (w, h) = field.size();
        let cells = (w - 1, h - 1);
        let hs = field.horizontal_scale();

        // Degenerate partition config collapses to one partition.
        let max_cells = cells.0.max(cells.1);
        let submesh_cells = if params.submesh_size <= 0 || params.submesh_size as u32 >= max_cells {
            log::warn!(
                "submesh_size {} unusable for a {}x{} cell grid; terrain is a single partition",
                params.submesh_size,
                cells.0,
                cells.1
            );
            max_cells
        } else {
            params.submesh_size as u32
        };

        let px = cells.0.div_ceil(submesh_cells);
        let py = cells.1.div_ceil(submesh_cells);
        let partitions = px.max(py).next_power_of_two();
        let depth = partitions.trailing_zeros();
        let root_extent = (partitions * submesh_cells) as f32 * hs;
        let mut tree: Box<QuadTree<SubMesh>> = Box::new(QuadTree::new(
            Aabb2::new(Vec2::ZERO, Vec2::splat(root_extent)),
            depth,
        ));

        let mut vertices = mesh::build_vertices(&field, params.uv_repeat);
        let mut indices: Vec<u32> = Vec::new();
        let mut skirts = mesh::SkirtCache::new();

        // Leaf partitions carry full-resolution geometry.
        for j in 0..py {
            for i in 0..px {
                let rect = GridRect::new(
                    i * submesh_cells,
                    j * submesh_cells,
                    ((i + 1) * submesh_cells).min(cells.0),
                    ((j + 1) * submesh_cells).min(cells.1),
                );
                let submesh = build_node_geometry(
                    rect,
                    0,
                    (w, h),
                    &params,
                    &mut skirts,
                    &mut vertices,
                    &mut indices,
                );
                let (rect_min, rect_max) = mesh::rect_world_min_max(rect, hs);
                let center = (rect_min + rect_max) * 0.5;
                let leaf = tree
                    .child_at(center)
                    .expect("partition center escaped the quadtree root");
                leaf.data = Some(submesh);
            }
        }

        // Every allocated interior node (an ancestor of some leaf) gets a
        // merged buffer at its level's LOD over its whole grid extent.
        let full_rect = GridRect::new(0, 0, cells.0, cells.1);
        tree.traverse_mut(&mut |node| {
            if node.level() == 0 {
                return true;
            }
            let aabb = node.aabb();
            let node_rect = GridRect::new(
                ((aabb.min.x / hs).round().max(0.0)) as u32,
                ((aabb.min.y / hs).round().max(0.0)) as u32,
                ((aabb.max.x / hs).round().max(0.0)) as u32,
                ((aabb.max.y / hs).round().max(0.0)) as u32,
            );
            if let Some(rect) = node_rect.intersect(&full_rect) {
                let lod = node.level().min(TERRAIN_LOD_LEVELS - 1);
                node.data = Some(build_node_geometry(
                    rect,
                    lod,
                    (w, h),
                    &params,
                    &mut skirts,
                    &mut vertices,
                    &mut indices,
                ));
            }
            true
        });
        log::info!(
            "terrain built: {}x{} grid, {}x{} partitions of {} cells, depth {}, {} skirt vertices",
            w,
            h,
            px,
            py,
            submesh_cells,
            depth,
            skirts.unique_lowered()
        );

        let mut terrain = Self {
            lod_distances: culling::lod_distance_table(params.lod_base_step),
            params,
            field,
            mesh: TerrainMesh { vertices, indices },
            tree,
        };
        terrain.scatter_props();
        terrain
    }

    /// Probabilistic prop placement, rejecting slopes outside the acceptance
    /// cone around up. Accepted props attach to the leaf containing them.
    fn scatter_props(&mut self) {
        let (w, h) = self.field.size();
        let cells = (w - 1, h - 1);
        let hs = self.field.horizontal_scale();
        let mut rng = StdRng::seed_from_u64(self.params.seed as u64 ^ 0x9e37_79b9_7f4a_7c15);
        let slope_cos = self.params.prop_slope_max_deg.to_radians().cos();
        let mut placed = 0u32;

        for j in 0..cells.1 {
            for i in 0..cells.0 {
                if rng.gen::<f32>() >= self.params.prop_density {
                    continue;
                }
                let x = (i as f32 + rng.gen::<f32>()) * hs;
                let y = (j as f32 + rng.gen::<f32>()) * hs;
                if self.field.normal_at(x, y).dot(Vec3::Y) < slope_cos {
                    continue;
                }
                let prop = Prop {
                    position: Vec3::new(x, self.field.height_at(x, y), y),
                    rotation: rng.gen_range(0.0..std::f32::consts::TAU),
                    scale: rng.gen_range(0.8..1.3),
                };
                if let Some(leaf) = self.tree.child_at(Vec2::new(x, y)) {
                    if let Some(submesh) = &mut leaf.data {
                        submesh.props.push(prop);
                        placed += 1;
                    }
                }
            }
        }
        log::info!("scattered {placed} terrain props");
    }

    /// Select visible submeshes for this frame's camera. CPU decision only;
    /// the caller feeds the list to a renderer.
    pub fn render_cull(&self, frustum: &Frustum) -> DrawList<'_> {
        let footprint = FrustumFootprint::from_frustum(frustum);
        culling::render_cull(
            &self.tree,
            &footprint,
            &self.lod_distances,
            self.params.prop_render_distance,
        )
    }

    /// World-space height; `0.0` outside the terrain.
    pub fn height_at(&self, x: f32, y: f32) -> f32 {
        self.field.height_at(x, y)
    }

    /// World-space surface normal; up outside the terrain.
    pub fn normal_at(&self, x: f32, y: f32) -> Vec3 {
        self.field.normal_at(x, y)
    }

    pub fn params(&self) -> &TerrainParams {
        &self.params
    }

    pub fn heightfield(&self) -> &Heightfield {
        &self.field
    }

    pub fn mesh(&self) -> &TerrainMesh {
        &self.mesh
    }

    pub fn tree(&self) -> &QuadTree<SubMesh> {
        &self.tree
    }

    pub fn lod_distances(&self) -> &[f32; TERRAIN_LOD_LEVELS as usize] {
        &self.lod_distances
    }
}

fn build_node_geometry(
    rect: GridRect,
    lod: u32,
    grid_size: (u32, u32),
    params: &TerrainParams,
    skirts: &mut mesh::SkirtCache,
    vertices: &mut Vec<TerrainVertex>,
    indices: &mut Vec<u32>,
) -> SubMesh {
    let start = indices.len() as u32;
    mesh::build_lod_indices(rect, lod, grid_size.0, indices);
    let mid = indices.len() as u32;
    mesh::build_skirt(
        rect,
        lod,
        grid_size,
        params.skirt_depth,
        skirts,
        vertices,
        indices,
    );
    let end = indices.len() as u32;
    SubMesh::new(rect, lod, start..mid, mid..end)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_params() -> TerrainParams {
        TerrainParams {
            size: (65, 65),
            submesh_size: 16,
            seed: 5,
            prop_density: 0.05,
            ..Default::default()
        }
    }

    #[test]
    fn every_allocated_node_has_geometry() {
        let terrain = Terrain::build(test_params());
        let mut missing = 0;
        terrain.tree().traverse(&mut |node| {
            if node.data.is_none() {
                missing += 1;
            }
            true
        });
        assert_eq!(missing, 0);
    }

    #[test]
    fn leaves_hold_full_resolution_and_interiors_coarser() {
        let terrain = Terrain::build(test_params());
        terrain.tree().traverse(&mut |node| {
            if let Some(submesh) = &node.data {
                assert_eq!(submesh.lod, node.level().min(TERRAIN_LOD_LEVELS - 1));
                assert!(!submesh.index_range.is_empty());
            }
            true
        });
    }

    #[test]
    fn degenerate_submesh_size_collapses_to_one_partition() {
        let params = TerrainParams {
            submesh_size: -3,
            size: (33, 33),
            ..test_params()
        };
        let terrain = Terrain::build(params);
        // Root is the single leaf.
        assert_eq!(terrain.tree().level(), 0);
        assert!(terrain.tree().data.is_some());
    }

    #[test]
    fn props_land_in_their_leaf_partition() {
        let terrain = Terrain::build(test_params());
        let mut total = 0;
        terrain.tree().traverse(&mut |node| {
            if let Some(submesh) = &node.data {
                for prop in &submesh.props {
                    assert!(node
                        .aabb()
                        .contains_point(Vec2::new(prop.position.x, prop.position.z)));
                    total += 1;
                }
            }
            true
        });
        assert!(total > 0, "expected the 5% density to place props");
    }

    #[test]
    fn props_respect_slope_cone() {
        let terrain = Terrain::build(test_params());
        let slope_cos = terrain.params().prop_slope_max_deg.to_radians().cos();
        terrain.tree().traverse(&mut |node| {
            if let Some(submesh) = &node.data {
                for prop in &submesh.props {
                    let n = terrain.normal_at(prop.position.x, prop.position.z);
                    assert!(n.dot(Vec3::Y) >= slope_cos - 1e-4);
                }
            }
            true
        });
    }

    #[test]
    fn indices_stay_within_vertex_buffer() {
        let terrain = Terrain::build(test_params());
        let limit = terrain.mesh().vertices.len() as u32;
        assert!(terrain.mesh().indices.iter().all(|&i| i < limit));
    }
}
