//! GPU-resident particle records and the device config block.
//!
//! Layouts are `#[repr(C)]` and 16-byte aligned to match the WGSL structs in
//! `shaders/particle_spawn.wgsl` / `particle_update.wgsl`. The CPU never
//! touches individual particles in normal operation; these types exist for
//! buffer sizing, the reference backend, and diagnostic readback.

use bytemuck::{Pod, Zeroable};

use crate::config::ParticleParams;

/// Simulation state of one particle lane. 48 bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Particle {
    pub direction: [f32; 3],
    pub speed: f32,
    pub ttl: f32,
    pub ttl_original: f32,
    pub scale: f32,
    pub final_scale: f32,
    pub rotation: f32,
    pub rotation_speed: f32,
    /// Non-zero while the lane is alive.
    pub alive: u32,
    pub _pad: f32,
}

impl Particle {
    pub fn is_alive(&self) -> bool {
        self.alive != 0
    }
}

/// Render state of one lane, consumed directly by the point-sprite draw.
/// Dead lanes carry zero scale and alpha instead of being compacted out.
/// 48 bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ParticleVertex {
    pub position: [f32; 3],
    pub scale: f32,
    pub color: [f32; 4],
    pub texture_index: u32,
    pub _pad: [u32; 3],
}

/// Whole-config snapshot pushed wholesale to the device, plus the
/// per-dispatch fields the backend patches in (`spawn_count`, `frame_seed`,
/// `dt`). 160 bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ParticleUniforms {
    pub spawn_position: [f32; 3],
    pub motion_noise: f32,
    pub spawn_area: [f32; 3],
    pub velocity_min: f32,
    pub birth_color: [f32; 4],
    pub death_color: [f32; 4],
    pub wind: [f32; 3],
    pub velocity_max: f32,
    pub gravity: [f32; 3],
    pub wind_influence: f32,
    pub gravity_influence: f32,
    pub ttl_min: f32,
    pub ttl_max: f32,
    pub scale_min: f32,
    pub scale_max: f32,
    pub final_scale: f32,
    pub scale_rate: f32,
    pub rotation_min: f32,
    pub rotation_max: f32,
    pub max_num_particles: u32,
    pub first_texture: u32,
    pub num_textures: u32,
    pub spawn_count: u32,
    pub frame_seed: u32,
    pub dt: f32,
    pub _pad: f32,
}

impl ParticleUniforms {
    /// Snapshot the live params. Dispatch fields start zeroed.
    pub fn from_params(params: &ParticleParams) -> Self {
        Self {
            spawn_position: params.spawn_position,
            motion_noise: params.motion_noise,
            spawn_area: params.spawn_area,
            velocity_min: params.velocity_min,
            birth_color: params.birth_color,
            death_color: params.death_color,
            wind: params.wind,
            velocity_max: params.velocity_max,
            gravity: params.gravity,
            wind_influence: params.wind_influence,
            gravity_influence: params.gravity_influence,
            ttl_min: params.ttl_min,
            ttl_max: params.ttl_max,
            scale_min: params.scale_min,
            scale_max: params.scale_max,
            final_scale: params.final_scale,
            scale_rate: params.scale_rate,
            rotation_min: params.rotation_min,
            rotation_max: params.rotation_max,
            max_num_particles: params.max_num_particles,
            first_texture: params.first_texture,
            num_textures: params.num_textures.max(1),
            spawn_count: 0,
            frame_seed: 0,
            dt: 0.0,
            _pad: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gpu_layouts_are_16_byte_aligned() {
        assert_eq!(std::mem::size_of::<Particle>(), 48);
        assert_eq!(std::mem::size_of::<ParticleVertex>(), 48);
        assert_eq!(std::mem::size_of::<ParticleUniforms>(), 160);
        assert_eq!(std::mem::size_of::<Particle>() % 16, 0);
        assert_eq!(std::mem::size_of::<ParticleVertex>() % 16, 0);
        assert_eq!(std::mem::size_of::<ParticleUniforms>() % 16, 0);
    }

    #[test]
    fn snapshot_copies_params_and_zeroes_dispatch_fields() {
        let params = ParticleParams {
            spawn_position: [1.0, 2.0, 3.0],
            max_num_particles: 256,
            ..Default::default()
        };
        let uniforms = ParticleUniforms::from_params(&params);
        assert_eq!(uniforms.spawn_position, [1.0, 2.0, 3.0]);
        assert_eq!(uniforms.max_num_particles, 256);
        assert_eq!(uniforms.spawn_count, 0);
        assert_eq!(uniforms.dt, 0.0);
    }

    #[test]
    fn zero_texture_count_clamps_to_one() {
        let params = ParticleParams {
            num_textures: 0,
            ..Default::default()
        };
        assert_eq!(ParticleUniforms::from_params(&params).num_textures, 1);
    }
}
