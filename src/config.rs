//! Engine configuration structures.
//!
//! Key/value parameter blocks consumed by the terrain builder and the
//! particle system. The embedding application produces these from JSON
//! files; every field has a default so partial files are fine.

use std::path::Path;

use serde::Deserialize;

use crate::error::{EngineError, EngineResult};

/// One of the two terrain surface materials (flat ground / steep rock).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TerrainMaterial {
    pub texture: String,
    pub shininess: f32,
    pub specular: [f32; 3],
}

impl Default for TerrainMaterial {
    fn default() -> Self {
        Self {
            texture: String::new(),
            shininess: 16.0,
            specular: [0.2, 0.2, 0.2],
        }
    }
}

/// Build parameters for [`crate::terrain::Terrain`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TerrainParams {
    /// Heightfield dimensions in grid vertices (columns, rows).
    pub size: (u32, u32),
    /// World-units per grid cell in the ground plane.
    pub horizontal_scale: f32,
    /// Multiplier applied to generated heights.
    pub vertical_scale: f32,
    /// Texture repeats across the whole terrain.
    pub uv_repeat: f32,
    /// Base squared-distance step of the LOD table; level `n` switches at
    /// `lod_base_step * 4^n`.
    pub lod_base_step: f32,
    /// Grid cells per submesh partition edge. Non-positive or oversized
    /// values degenerate to a single partition.
    pub submesh_size: i32,
    /// Drop of the seam-hiding skirt below the surface, in world units.
    pub skirt_depth: f32,
    /// Heightfield generator seed.
    pub seed: i64,
    /// Scatter probability per grid cell for decorative props.
    pub prop_density: f32,
    /// Maximum surface slope accepted for prop placement, degrees from up.
    pub prop_slope_max_deg: f32,
    /// Props are drawn only within this distance of the camera.
    pub prop_render_distance: f32,
    pub flat_material: TerrainMaterial,
    pub steep_material: TerrainMaterial,
    /// Surface-angle range (degrees) blending flat into steep material.
    pub blend_angle_deg: (f32, f32),
}

impl Default for TerrainParams {
    fn default() -> Self {
        Self {
            size: (257, 257),
            horizontal_scale: 1.0,
            vertical_scale: 24.0,
            uv_repeat: 32.0,
            lod_base_step: 2500.0,
            submesh_size: 32,
            skirt_depth: 4.0,
            seed: 0,
            prop_density: 0.002,
            prop_slope_max_deg: 30.0,
            prop_render_distance: 160.0,
            flat_material: TerrainMaterial::default(),
            steep_material: TerrainMaterial::default(),
            blend_angle_deg: (25.0, 45.0),
        }
    }
}

impl TerrainParams {
    pub fn from_json_str(text: &str) -> EngineResult<Self> {
        serde_json::from_str(text).map_err(|e| EngineError::config(format!("terrain params: {e}")))
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Blend range converted to radians, as the renderer consumes it.
    pub fn blend_angle_rad(&self) -> (f32, f32) {
        (
            self.blend_angle_deg.0.to_radians(),
            self.blend_angle_deg.1.to_radians(),
        )
    }
}

/// Live parameters of a [`crate::particles::ParticleSystem`].
///
/// `spawn()` snapshots the whole struct per burst, so edits here never race
/// an in-flight spawn.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ParticleParams {
    pub spawn_position: [f32; 3],
    /// Half-extent of the uniform spawn region around `spawn_position`.
    pub spawn_area: [f32; 3],
    pub birth_color: [f32; 4],
    pub death_color: [f32; 4],
    /// Magnitude of per-particle direction noise.
    pub motion_noise: f32,
    pub velocity_min: f32,
    pub velocity_max: f32,
    pub wind: [f32; 3],
    pub wind_influence: f32,
    pub gravity: [f32; 3],
    pub gravity_influence: f32,
    pub ttl_min: f32,
    pub ttl_max: f32,
    pub scale_min: f32,
    pub scale_max: f32,
    pub final_scale: f32,
    /// Fraction of the scale gap closed per second.
    pub scale_rate: f32,
    pub rotation_min: f32,
    pub rotation_max: f32,
    /// Mean particles spawned per second when auto-spawn is on.
    pub avg_spawn_rate: f32,
    /// Uniform jitter applied to the per-frame spawn rate.
    pub spawn_rate_var: f32,
    pub auto_spawn: bool,
    /// Fixed capacity of the GPU particle buffer. Never resized.
    pub max_num_particles: u32,
    pub first_texture: u32,
    pub num_textures: u32,
}

impl Default for ParticleParams {
    fn default() -> Self {
        Self {
            spawn_position: [0.0, 0.0, 0.0],
            spawn_area: [1.0, 0.0, 1.0],
            birth_color: [1.0, 1.0, 1.0, 1.0],
            death_color: [1.0, 1.0, 1.0, 0.0],
            motion_noise: 0.1,
            velocity_min: 0.5,
            velocity_max: 2.0,
            wind: [0.0, 0.0, 0.0],
            wind_influence: 0.0,
            gravity: [0.0, -9.81, 0.0],
            gravity_influence: 0.0,
            ttl_min: 1.0,
            ttl_max: 3.0,
            scale_min: 0.5,
            scale_max: 1.5,
            final_scale: 0.0,
            scale_rate: 0.5,
            rotation_min: -1.0,
            rotation_max: 1.0,
            avg_spawn_rate: 100.0,
            spawn_rate_var: 10.0,
            auto_spawn: true,
            max_num_particles: 4096,
            first_texture: 0,
            num_textures: 1,
        }
    }
}

impl ParticleParams {
    pub fn from_json_str(text: &str) -> EngineResult<Self> {
        serde_json::from_str(text).map_err(|e| EngineError::config(format!("particle params: {e}")))
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_fills_defaults() {
        let params = TerrainParams::from_json_str(r#"{ "size": [65, 65], "seed": 7 }"#).unwrap();
        assert_eq!(params.size, (65, 65));
        assert_eq!(params.seed, 7);
        assert_eq!(params.submesh_size, TerrainParams::default().submesh_size);
    }

    #[test]
    fn bad_json_is_config_error() {
        let err = ParticleParams::from_json_str("{ nope").unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn blend_angles_convert_to_radians() {
        let params = TerrainParams {
            blend_angle_deg: (90.0, 180.0),
            ..Default::default()
        };
        let (lo, hi) = params.blend_angle_rad();
        assert!((lo - std::f32::consts::FRAC_PI_2).abs() < 1e-6);
        assert!((hi - std::f32::consts::PI).abs() < 1e-6);
    }

    #[test]
    fn particle_json_roundtrip() {
        let params =
            ParticleParams::from_json_str(r#"{ "max_num_particles": 100, "auto_spawn": false }"#)
                .unwrap();
        assert_eq!(params.max_num_particles, 100);
        assert!(!params.auto_spawn);
    }
}
