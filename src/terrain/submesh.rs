//! Quadtree payloads: the per-node submesh and its decorative props.

use std::ops::Range;

use glam::Vec3;

use crate::terrain::mesh::GridRect;

/// A decorative prop (e.g. a scattered tree) attached to the submesh whose
/// partition contains it.
#[derive(Debug, Clone, PartialEq)]
pub struct Prop {
    pub position: Vec3,
    /// Rotation around +Y, radians.
    pub rotation: f32,
    pub scale: f32,
}

/// Geometry owned by one quadtree node: a range into the terrain's shared
/// index buffer at this node's LOD, the matching perimeter skirt (empty for
/// interior nodes), and the props scattered over the partition.
///
/// Leaves carry LOD 0; a node `n` levels above the leaves carries the merged
/// buffer for LOD `min(n, TERRAIN_LOD_LEVELS - 1)` over its whole extent.
pub struct SubMesh {
    pub grid: GridRect,
    pub lod: u32,
    pub index_range: Range<u32>,
    pub skirt_range: Range<u32>,
    pub props: Vec<Prop>,
}

impl SubMesh {
    pub fn new(grid: GridRect, lod: u32, index_range: Range<u32>, skirt_range: Range<u32>) -> Self {
        Self {
            grid,
            lod,
            index_range,
            skirt_range,
            props: Vec::new(),
        }
    }

    /// Triangles drawn when this submesh is selected, skirt included.
    pub fn triangle_count(&self) -> u32 {
        (self.index_range.len() as u32 + self.skirt_range.len() as u32) / 3
    }
}
