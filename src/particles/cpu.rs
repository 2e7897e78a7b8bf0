//! CPU reference backend.
//!
//! Mirrors the WGSL kernels lane for lane so headless runs and tests observe
//! the same protocol the GPU backend drives: full-capacity spawn dispatches
//! with dead-lane slot claiming, unconditional vertex writes, blocking
//! completion. It also records every uniform write and dispatch, which is
//! what the protocol tests assert against.

use bytemuck::Zeroable;
use glam::Vec3;

use crate::error::{EngineError, EngineResult};
use crate::particles::backend::{BufferOwner, ParticleBackend};
use crate::particles::types::{Particle, ParticleUniforms, ParticleVertex};

/// Integer hash shared with the WGSL kernels (PCG output permutation).
pub(crate) fn pcg_hash(input: u32) -> u32 {
    let state = input.wrapping_mul(747_796_405).wrapping_add(2_891_336_453);
    let word = ((state >> ((state >> 28) + 4)) ^ state).wrapping_mul(277_803_737);
    (word >> 22) ^ word
}

/// Per-lane deterministic RNG, identical to the kernel-side sequence.
struct LaneRng {
    state: u32,
}

impl LaneRng {
    fn new(frame_seed: u32, lane: u32) -> Self {
        Self {
            state: frame_seed ^ pcg_hash(lane + 1),
        }
    }

    fn next01(&mut self) -> f32 {
        self.state = pcg_hash(self.state);
        (self.state >> 8) as f32 / 16_777_216.0
    }

    fn range(&mut self, lo: f32, hi: f32) -> f32 {
        lo + (hi - lo) * self.next01()
    }

    fn signed(&mut self) -> f32 {
        self.next01() * 2.0 - 1.0
    }
}

/// One recorded spawn dispatch: the count handed to the device and the
/// uniforms that were resident when it ran.
#[derive(Debug, Clone)]
pub struct SpawnDispatch {
    pub count: u32,
    pub uniforms: ParticleUniforms,
}

pub struct CpuParticleBackend {
    capacity: u32,
    owner: BufferOwner,
    uniforms: ParticleUniforms,
    particles: Vec<Particle>,
    vertices: Vec<ParticleVertex>,
    /// Every uniform snapshot written to the "device", in order.
    pub uniform_writes: Vec<ParticleUniforms>,
    /// Every spawn dispatch, in order.
    pub spawn_dispatches: Vec<SpawnDispatch>,
    pub update_dispatches: u32,
    pub graphics_syncs: u32,
}

impl CpuParticleBackend {
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity,
            owner: BufferOwner::Graphics,
            uniforms: ParticleUniforms::zeroed_with_capacity(capacity),
            particles: vec![Particle::zeroed(); capacity as usize],
            vertices: vec![ParticleVertex::zeroed(); capacity as usize],
            uniform_writes: Vec::new(),
            spawn_dispatches: Vec::new(),
            update_dispatches: 0,
            graphics_syncs: 0,
        }
    }

    /// Currently-resident uniforms (what the next dispatch would use).
    pub fn resident_uniforms(&self) -> &ParticleUniforms {
        &self.uniforms
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn alive_count(&self) -> u32 {
        self.particles.iter().filter(|p| p.is_alive()).count() as u32
    }

    fn spawn_lane(&mut self, lane: usize, rng: &mut LaneRng) {
        let u = &self.uniforms;
        let direction = Vec3::new(
            rng.signed() * u.motion_noise.max(0.05),
            1.0,
            rng.signed() * u.motion_noise.max(0.05),
        )
        .normalize();
        let ttl = rng.range(u.ttl_min, u.ttl_max).max(1e-3);
        let scale = rng.range(u.scale_min, u.scale_max);
        self.particles[lane] = Particle {
            direction: direction.to_array(),
            speed: rng.range(u.velocity_min, u.velocity_max),
            ttl,
            ttl_original: ttl,
            scale,
            final_scale: u.final_scale,
            rotation: 0.0,
            rotation_speed: rng.range(u.rotation_min, u.rotation_max),
            alive: 1,
            _pad: 0.0,
        };
        let position = [
            u.spawn_position[0] + u.spawn_area[0] * rng.signed(),
            u.spawn_position[1] + u.spawn_area[1] * rng.signed(),
            u.spawn_position[2] + u.spawn_area[2] * rng.signed(),
        ];
        self.vertices[lane] = ParticleVertex {
            position,
            scale,
            color: u.birth_color,
            texture_index: u.first_texture + pcg_hash(lane as u32) % u.num_textures.max(1),
            _pad: [0; 3],
        };
    }

    fn update_lane(&mut self, lane: usize, dt: f32, rng: &mut LaneRng) {
        let u = self.uniforms;
        let particle = &mut self.particles[lane];
        if particle.alive == 0 {
            // Dead lanes still write their vertex: invisible, never compacted.
            self.vertices[lane].scale = 0.0;
            self.vertices[lane].color = [0.0; 4];
            return;
        }

        particle.ttl -= dt;
        if particle.ttl <= 0.0 {
            particle.alive = 0;
            self.vertices[lane].scale = 0.0;
            self.vertices[lane].color = [0.0; 4];
            return;
        }

        let age = 1.0 - particle.ttl / particle.ttl_original;
        let mut direction = Vec3::from_array(particle.direction);
        direction = (direction
            + Vec3::new(rng.signed(), rng.signed(), rng.signed()) * (u.motion_noise * dt))
            .normalize();
        particle.direction = direction.to_array();

        let velocity = direction * particle.speed
            + Vec3::from_array(u.wind) * u.wind_influence
            + Vec3::from_array(u.gravity) * (u.gravity_influence * age);
        particle.scale += (particle.final_scale - particle.scale) * (u.scale_rate * dt).min(1.0);
        particle.rotation += particle.rotation_speed * dt;

        let vertex = &mut self.vertices[lane];
        for axis in 0..3 {
            vertex.position[axis] += velocity[axis] * dt;
        }
        vertex.scale = particle.scale;
        for channel in 0..4 {
            vertex.color[channel] =
                u.birth_color[channel] + (u.death_color[channel] - u.birth_color[channel]) * age;
        }
    }
}

impl ParticleUniforms {
    fn zeroed_with_capacity(capacity: u32) -> Self {
        Self {
            max_num_particles: capacity,
            num_textures: 1,
            ..bytemuck::Zeroable::zeroed()
        }
    }
}

impl ParticleBackend for CpuParticleBackend {
    fn capacity(&self) -> u32 {
        self.capacity
    }

    fn owner(&self) -> BufferOwner {
        self.owner
    }

    fn sync_graphics(&mut self) -> EngineResult<()> {
        // Nothing in flight on the CPU path; counted for protocol tests.
        self.graphics_syncs += 1;
        Ok(())
    }

    fn acquire_vertices(&mut self) -> EngineResult<()> {
        self.owner = self.owner.transition(BufferOwner::Compute);
        Ok(())
    }

    fn write_uniforms(&mut self, uniforms: &ParticleUniforms) -> EngineResult<()> {
        self.uniforms = *uniforms;
        self.uniform_writes.push(*uniforms);
        Ok(())
    }

    fn dispatch_spawn(&mut self, count: u32, seed: u32) -> EngineResult<()> {
        assert_eq!(
            self.owner,
            BufferOwner::Compute,
            "spawn dispatched without compute ownership"
        );
        self.uniforms.spawn_count = count;
        self.uniforms.frame_seed = seed;
        self.spawn_dispatches.push(SpawnDispatch {
            count,
            uniforms: self.uniforms,
        });

        // Scatter-via-filter over the whole index space: every lane runs,
        // dead lanes claim slots until `count` are taken.
        let mut claimed = 0u32;
        for lane in 0..self.capacity as usize {
            if self.particles[lane].alive != 0 {
                continue;
            }
            if claimed >= count {
                break;
            }
            let mut rng = LaneRng::new(seed, lane as u32);
            self.spawn_lane(lane, &mut rng);
            claimed += 1;
        }
        Ok(())
    }

    fn dispatch_update(&mut self, dt: f32, seed: u32) -> EngineResult<()> {
        assert_eq!(
            self.owner,
            BufferOwner::Compute,
            "update dispatched without compute ownership"
        );
        self.uniforms.dt = dt;
        self.uniforms.frame_seed = seed;
        self.update_dispatches += 1;
        for lane in 0..self.capacity as usize {
            let mut rng = LaneRng::new(seed, lane as u32);
            self.update_lane(lane, dt, &mut rng);
        }
        Ok(())
    }

    fn release_vertices(&mut self) -> EngineResult<()> {
        self.owner = self.owner.transition(BufferOwner::Graphics);
        Ok(())
    }

    fn read_vertices(&mut self) -> EngineResult<Vec<ParticleVertex>> {
        if self.owner != BufferOwner::Graphics {
            return Err(EngineError::readback(
                "vertex readback requires graphics ownership",
            ));
        }
        Ok(self.vertices.clone())
    }
}
