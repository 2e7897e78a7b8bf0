//! Procedural heightfield generation and clamped height/normal queries.
//!
//! The generator layers deterministic value noise: a radial island falloff
//! shaping a ridged multifractal base, a smaller ridge band, and a fine
//! detail band. Any deterministic generator would satisfy the terrain
//! contract; this one is seeded from the config and allocation-stable.
//!
//! Ground-plane coordinates `(x, y)` map to world `(x, z)`; heights are
//! world Y. Queries outside the grid return `0.0` height and an up normal:
//! a defined boundary clamp, not an error.

use glam::{Vec2, Vec3};

use crate::config::TerrainParams;

// Integer lattice hash, minetest lineage. Returns -1..1.
const NOISE_MAGIC_X: i64 = 1619;
const NOISE_MAGIC_Y: i64 = 31337;
const NOISE_MAGIC_SEED: i64 = 1013;

fn hash_noise(x: i64, y: i64, seed: i64) -> f32 {
    let n = (NOISE_MAGIC_X * x + NOISE_MAGIC_Y * y + NOISE_MAGIC_SEED * seed) & 0x7fff_ffff;
    let n = (n >> 13) ^ n;
    let n = (n.wrapping_mul(n.wrapping_mul(n).wrapping_mul(60493).wrapping_add(19_990_303))
        .wrapping_add(1_376_312_589))
        & 0x7fff_ffff;
    1.0 - n as f32 / 0x4000_0000 as f32
}

fn smoothstep(t: f32) -> f32 {
    t * t * (3.0 - 2.0 * t)
}

/// Bilinear value noise over the integer lattice.
fn value_noise(p: Vec2, seed: i64) -> f32 {
    let x0 = p.x.floor();
    let y0 = p.y.floor();
    let tx = smoothstep(p.x - x0);
    let ty = smoothstep(p.y - y0);
    let (ix, iy) = (x0 as i64, y0 as i64);

    let v00 = hash_noise(ix, iy, seed);
    let v10 = hash_noise(ix + 1, iy, seed);
    let v01 = hash_noise(ix, iy + 1, seed);
    let v11 = hash_noise(ix + 1, iy + 1, seed);

    let a = v00 + (v10 - v00) * tx;
    let b = v01 + (v11 - v01) * tx;
    a + (b - a) * ty
}

/// Fractional Brownian motion, -1..1 normalized by total amplitude.
fn fbm(p: Vec2, octaves: u32, lacunarity: f32, gain: f32, seed: i64) -> f32 {
    let mut sum = 0.0;
    let mut amp = 1.0;
    let mut freq = 1.0;
    let mut norm = 0.0;
    for octave in 0..octaves {
        sum += value_noise(p * freq, seed + octave as i64) * amp;
        norm += amp;
        amp *= gain;
        freq *= lacunarity;
    }
    sum / norm
}

/// Ridged multifractal: inverted absolute noise, sharpened.
fn ridged(p: Vec2, octaves: u32, seed: i64) -> f32 {
    let mut sum = 0.0;
    let mut amp = 0.5;
    let mut freq = 1.0;
    let mut norm = 0.0;
    for octave in 0..octaves {
        let n = 1.0 - value_noise(p * freq, seed + 31 + octave as i64).abs();
        sum += n * n * amp;
        norm += amp;
        amp *= 0.5;
        freq *= 2.1;
    }
    sum / norm
}

/// Row-major heightfield with precomputed normals.
pub struct Heightfield {
    size: (u32, u32),
    horizontal_scale: f32,
    heights: Vec<f32>,
    normals: Vec<Vec3>,
}

impl Heightfield {
    /// Generate from terrain parameters. Deterministic for a given seed.
    pub fn generate(params: &TerrainParams) -> Self {
        let (w, h) = params.size;
        assert!(w >= 2 && h >= 2, "heightfield must be at least 2x2");

        let seed = params.seed;
        let mut heights = Vec::with_capacity((w * h) as usize);
        let center = Vec2::new((w - 1) as f32, (h - 1) as f32) * 0.5;
        let radius = center.min_element().max(1.0);

        for y in 0..h {
            for x in 0..w {
                let gp = Vec2::new(x as f32, y as f32);
                // Large-scale island shape.
                let falloff = 1.0 - ((gp - center).length() / radius).powi(2);
                let falloff = falloff.max(0.0);
                // Ridged base with two finer bands on top.
                let base = ridged(gp * 0.01, 5, seed);
                let ridge = ridged(gp * 0.05, 3, seed + 97) * 0.15;
                let detail = fbm(gp * 0.25, 3, 2.0, 0.5, seed + 193) * 0.03;
                let height = (base * falloff + ridge + detail) * params.vertical_scale;
                heights.push(height);
            }
        }

        let mut field = Self {
            size: (w, h),
            horizontal_scale: params.horizontal_scale,
            heights,
            normals: Vec::new(),
        };
        field.normals = field.compute_normals();
        field
    }

    /// Wrap existing height data (tests, external DEM import).
    pub fn from_heights(size: (u32, u32), horizontal_scale: f32, heights: Vec<f32>) -> Self {
        assert_eq!(
            heights.len(),
            (size.0 * size.1) as usize,
            "height data does not match dimensions"
        );
        let mut field = Self {
            size,
            horizontal_scale,
            heights,
            normals: Vec::new(),
        };
        field.normals = field.compute_normals();
        field
    }

    fn compute_normals(&self) -> Vec<Vec3> {
        let (w, h) = self.size;
        let mut normals = Vec::with_capacity((w * h) as usize);
        let step = 2.0 * self.horizontal_scale;
        for y in 0..h as i64 {
            for x in 0..w as i64 {
                let dx = self.height_at_grid(x + 1, y) - self.height_at_grid(x - 1, y);
                let dy = self.height_at_grid(x, y + 1) - self.height_at_grid(x, y - 1);
                normals.push(Vec3::new(-dx / step, 1.0, -dy / step).normalize());
            }
        }
        normals
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn horizontal_scale(&self) -> f32 {
        self.horizontal_scale
    }

    /// World extent of the grid in the ground plane.
    pub fn world_size(&self) -> Vec2 {
        Vec2::new(
            (self.size.0 - 1) as f32 * self.horizontal_scale,
            (self.size.1 - 1) as f32 * self.horizontal_scale,
        )
    }

    fn in_grid(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && x < self.size.0 as i64 && y < self.size.1 as i64
    }

    /// Height at a grid vertex; `0.0` outside the grid.
    pub fn height_at_grid(&self, x: i64, y: i64) -> f32 {
        if !self.in_grid(x, y) {
            return 0.0;
        }
        self.heights[(y * self.size.0 as i64 + x) as usize]
    }

    /// Normal at a grid vertex; up outside the grid.
    pub fn normal_at_grid(&self, x: i64, y: i64) -> Vec3 {
        if !self.in_grid(x, y) {
            return Vec3::Y;
        }
        self.normals[(y * self.size.0 as i64 + x) as usize]
    }

    /// Bilinear height at world ground-plane coordinates; `0.0` outside.
    pub fn height_at(&self, x: f32, y: f32) -> f32 {
        let gx = x / self.horizontal_scale;
        let gy = y / self.horizontal_scale;
        if gx < 0.0 || gy < 0.0 || gx > (self.size.0 - 1) as f32 || gy > (self.size.1 - 1) as f32 {
            return 0.0;
        }
        let x0 = (gx.floor() as i64).min(self.size.0 as i64 - 2).max(0);
        let y0 = (gy.floor() as i64).min(self.size.1 as i64 - 2).max(0);
        let tx = gx - x0 as f32;
        let ty = gy - y0 as f32;
        let h00 = self.height_at_grid(x0, y0);
        let h10 = self.height_at_grid(x0 + 1, y0);
        let h01 = self.height_at_grid(x0, y0 + 1);
        let h11 = self.height_at_grid(x0 + 1, y0 + 1);
        let a = h00 + (h10 - h00) * tx;
        let b = h01 + (h11 - h01) * tx;
        a + (b - a) * ty
    }

    /// Interpolated normal at world ground-plane coordinates; up outside.
    pub fn normal_at(&self, x: f32, y: f32) -> Vec3 {
        let gx = x / self.horizontal_scale;
        let gy = y / self.horizontal_scale;
        if gx < 0.0 || gy < 0.0 || gx > (self.size.0 - 1) as f32 || gy > (self.size.1 - 1) as f32 {
            return Vec3::Y;
        }
        let x0 = (gx.floor() as i64).min(self.size.0 as i64 - 2).max(0);
        let y0 = (gy.floor() as i64).min(self.size.1 as i64 - 2).max(0);
        let tx = gx - x0 as f32;
        let ty = gy - y0 as f32;
        let n00 = self.normal_at_grid(x0, y0);
        let n10 = self.normal_at_grid(x0 + 1, y0);
        let n01 = self.normal_at_grid(x0, y0 + 1);
        let n11 = self.normal_at_grid(x0 + 1, y0 + 1);
        (n00.lerp(n10, tx).lerp(n01.lerp(n11, tx), ty)).normalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_params() -> TerrainParams {
        TerrainParams {
            size: (33, 33),
            seed: 11,
            ..Default::default()
        }
    }

    #[test]
    fn generation_is_deterministic() {
        let a = Heightfield::generate(&small_params());
        let b = Heightfield::generate(&small_params());
        assert_eq!(a.heights, b.heights);

        let c = Heightfield::generate(&TerrainParams {
            seed: 12,
            ..small_params()
        });
        assert_ne!(a.heights, c.heights);
    }

    #[test]
    fn out_of_bounds_queries_clamp() {
        let field = Heightfield::generate(&small_params());
        assert_eq!(field.height_at(-5.0, 3.0), 0.0);
        assert_eq!(field.height_at(3.0, 1e6), 0.0);
        assert_eq!(field.normal_at(-5.0, 3.0), Vec3::Y);
        assert_eq!(field.height_at_grid(-1, 0), 0.0);
        assert_eq!(field.normal_at_grid(0, 999), Vec3::Y);
    }

    #[test]
    fn world_query_matches_grid_on_lattice() {
        let field = Heightfield::from_heights((3, 3), 2.0, vec![
            0.0, 1.0, 2.0, //
            3.0, 4.0, 5.0, //
            6.0, 7.0, 8.0,
        ]);
        assert_eq!(field.height_at(2.0, 0.0), 1.0);
        assert_eq!(field.height_at(2.0, 2.0), 4.0);
        // Bilinear midpoint of the first cell.
        assert!((field.height_at(1.0, 1.0) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn normals_are_unit_and_upward_for_flat_ground() {
        let field = Heightfield::from_heights((4, 4), 1.0, vec![0.5; 16]);
        for y in 1..3 {
            for x in 1..3 {
                let n = field.normal_at_grid(x, y);
                assert!((n.length() - 1.0).abs() < 1e-5);
                assert_eq!(n, Vec3::Y);
            }
        }
    }
}
