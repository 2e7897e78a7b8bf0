//! GPU particle system: fixed-capacity shared buffer, queued spawn bursts
//! with config snapshots, and the per-frame compute/graphics hand-off.
//!
//! All config mutation and kernel dispatch happens in one place,
//! [`ParticleSystem::update`], once per frame. `spawn()` only enqueues; the
//! queued snapshot is applied at the start of the next update, so a burst
//! can use different settings than the steady-state config without racing
//! the live config buffer.

pub mod backend;
pub mod cpu;
pub mod gpu;
pub mod renderer;
pub mod types;

pub use backend::{BufferOwner, ParticleBackend};
pub use cpu::CpuParticleBackend;
pub use gpu::GpuParticleBackend;
pub use renderer::ParticleRenderer;
pub use types::{Particle, ParticleUniforms, ParticleVertex};

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::ParticleParams;
use crate::error::EngineResult;
use crate::gpu::GpuContext;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ParticleStats {
    pub capacity: u32,
    /// Spawn requests sitting in the queue right now.
    pub queued_spawns: usize,
    /// Particles requested (queued bursts + auto-spawn) last update.
    pub spawned_last_frame: u32,
    pub frames: u64,
}

pub struct ParticleSystem<B: ParticleBackend> {
    /// Live config, edited directly by the caller; call [`Self::update_config`]
    /// to apply edits.
    pub params: ParticleParams,
    backend: B,
    steady_uniforms: ParticleUniforms,
    steady_dirty: bool,
    spawn_list: VecDeque<(ParticleUniforms, u32)>,
    config_stack: Vec<ParticleParams>,
    rng: StdRng,
    stats: ParticleStats,
}

impl ParticleSystem<GpuParticleBackend> {
    /// GPU-backed system with the capacity fixed from the params.
    pub fn new_gpu(ctx: &GpuContext, params: ParticleParams) -> EngineResult<Self> {
        let backend = GpuParticleBackend::new(ctx, params.max_num_particles)?;
        Ok(Self::with_backend(backend, params))
    }
}

impl ParticleSystem<CpuParticleBackend> {
    /// Headless reference system (tests, CI without an adapter).
    pub fn new_cpu(params: ParticleParams) -> Self {
        let backend = CpuParticleBackend::new(params.max_num_particles);
        Self::with_backend(backend, params)
    }
}

impl<B: ParticleBackend> ParticleSystem<B> {
    pub fn with_backend(backend: B, params: ParticleParams) -> Self {
        assert_eq!(
            backend.capacity(),
            params.max_num_particles,
            "backend capacity must match max_num_particles"
        );
        let steady_uniforms = ParticleUniforms::from_params(&params);
        let stats = ParticleStats {
            capacity: params.max_num_particles,
            ..Default::default()
        };
        Self {
            rng: StdRng::seed_from_u64(params.max_num_particles as u64 ^ 0x5851_f42d_4c95_7f2d),
            params,
            backend,
            steady_uniforms,
            steady_dirty: true,
            spawn_list: VecDeque::new(),
            config_stack: Vec::new(),
            stats,
        }
    }

    /// Seed the per-frame kernel randomness; useful for deterministic replays.
    pub fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// Enqueue a one-shot burst using the config as it is right now. Applied
    /// at the start of the next [`Self::update`].
    pub fn spawn(&mut self, count: u32) {
        let snapshot = ParticleUniforms::from_params(&self.params);
        self.spawn_list.push_back((snapshot, count));
    }

    /// Apply caller edits of [`Self::params`] to the steady-state config.
    pub fn update_config(&mut self) {
        self.steady_uniforms = ParticleUniforms::from_params(&self.params);
        self.steady_dirty = true;
    }

    /// Save the live config for a temporary override.
    pub fn push_config(&mut self) {
        self.config_stack.push(self.params.clone());
    }

    /// Restore the most recently pushed config and apply it. Popping an
    /// empty stack is a caller bug and panics.
    pub fn pop_config(&mut self) {
        self.params = self
            .config_stack
            .pop()
            .expect("pop_config called with no pushed config");
        self.update_config();
    }

    /// One simulation step. Suspends the calling thread at every device
    /// sync point; nothing here overlaps with the next frame's graphics.
    pub fn update(&mut self, dt: f32) -> EngineResult<()> {
        // 1. No in-flight draw may still read the shared buffer.
        self.backend.sync_graphics()?;
        // 2. Compute takes ownership for the rest of the step.
        self.backend.acquire_vertices()?;

        let mut spawned = 0u32;

        // 3. Drain queued bursts in FIFO order, each snapshot fully applied
        //    and its dispatch completed before the next begins.
        let drained = !self.spawn_list.is_empty();
        while let Some((snapshot, count)) = self.spawn_list.pop_front() {
            self.backend.write_uniforms(&snapshot)?;
            self.backend.dispatch_spawn(count, self.rng.gen())?;
            spawned += count;
        }
        // Queued snapshots overwrote the device config; restore steady state.
        if drained || self.steady_dirty {
            self.backend.write_uniforms(&self.steady_uniforms)?;
            self.steady_dirty = false;
        }

        // 4. Continuous emission.
        if self.params.auto_spawn {
            let variance = self.params.spawn_rate_var.abs();
            let rate = self.params.avg_spawn_rate + self.rng.gen_range(-variance..=variance);
            let count = (rate * dt).round().max(0.0) as u32;
            if count > 0 {
                self.backend.dispatch_spawn(count, self.rng.gen())?;
                spawned += count;
            }
        }

        // 5. Simulate every lane; dead lanes write invisible vertices.
        self.backend.dispatch_update(dt, self.rng.gen())?;

        // 6. Hand the buffer back and flush.
        self.backend.release_vertices()?;

        self.stats.spawned_last_frame = spawned;
        self.stats.queued_spawns = self.spawn_list.len();
        self.stats.frames += 1;
        Ok(())
    }

    pub fn stats(&self) -> ParticleStats {
        self.stats
    }

    pub fn capacity(&self) -> u32 {
        self.backend.capacity()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn system(capacity: u32) -> ParticleSystem<CpuParticleBackend> {
        let params = ParticleParams {
            max_num_particles: capacity,
            auto_spawn: false,
            ..Default::default()
        };
        ParticleSystem::new_cpu(params)
    }

    #[test]
    fn vertex_buffer_length_never_changes() {
        let mut system = system(100);
        for _ in 0..5 {
            system.update(0.016).unwrap();
        }
        system.spawn(30);
        system.update(0.016).unwrap();
        let vertices = system.backend_mut().read_vertices().unwrap();
        assert_eq!(vertices.len(), 100);
    }

    #[test]
    fn spawn_is_deferred_to_next_update() {
        let mut system = system(64);
        system.spawn(16);
        assert_eq!(system.backend().alive_count(), 0);
        system.update(0.016).unwrap();
        assert_eq!(system.backend().alive_count(), 16);
    }

    #[test]
    fn queued_bursts_apply_their_own_snapshots_in_order() {
        let mut system = system(64);

        system.params.ttl_min = 5.0;
        system.params.ttl_max = 5.0;
        system.spawn(5);
        system.params.ttl_min = 9.0;
        system.params.ttl_max = 9.0;
        system.spawn(3);

        system.update(0.016).unwrap();

        let dispatches = &system.backend().spawn_dispatches;
        assert_eq!(dispatches.len(), 2);
        assert_eq!(dispatches[0].count, 5);
        assert_eq!(dispatches[0].uniforms.ttl_min, 5.0);
        assert_eq!(dispatches[1].count, 3);
        assert_eq!(dispatches[1].uniforms.ttl_min, 9.0);
    }

    #[test]
    fn steady_config_is_restored_after_drain() {
        let mut system = system(64);
        system.update(0.016).unwrap(); // flush initial steady write

        let steady = ParticleUniforms::from_params(&system.params);
        system.params.ttl_min = 99.0; // burst-only override
        system.spawn(50);
        system.params.ttl_min = steady.ttl_min; // caller restores, no update_config
        system.update(0.016).unwrap();

        let resident = system.backend().resident_uniforms();
        // Dispatch bookkeeping aside, the resident config matches steady state.
        assert_eq!(resident.ttl_min, steady.ttl_min);
        assert_eq!(resident.spawn_position, steady.spawn_position);
        // The burst itself used its snapshot.
        let last = system.backend().spawn_dispatches.last().unwrap();
        assert_eq!(last.count, 50);
        assert_eq!(last.uniforms.ttl_min, 99.0);
    }

    #[test]
    fn pop_config_restores_previous_params() {
        let mut system = system(32);
        let original_rate = system.params.avg_spawn_rate;
        system.push_config();
        system.params.avg_spawn_rate = 999.0;
        system.update_config();
        system.pop_config();
        assert_eq!(system.params.avg_spawn_rate, original_rate);
    }

    #[test]
    #[should_panic(expected = "no pushed config")]
    fn pop_without_push_panics() {
        let mut system = system(32);
        system.pop_config();
    }

    #[test]
    fn auto_spawn_scales_with_dt() {
        let params = ParticleParams {
            max_num_particles: 4096,
            auto_spawn: true,
            avg_spawn_rate: 1000.0,
            spawn_rate_var: 0.0,
            ..Default::default()
        };
        let mut system = ParticleSystem::new_cpu(params);
        system.update(0.5).unwrap();
        assert_eq!(system.stats().spawned_last_frame, 500);
    }

    #[test]
    fn ownership_returns_to_graphics_after_update() {
        let mut system = system(16);
        system.update(0.016).unwrap();
        assert_eq!(system.backend().owner(), BufferOwner::Graphics);
    }
}
