//! wgpu compute backend for the particle system.
//!
//! Two WGSL kernels share one bind group: `particle_spawn.wgsl` (dead lanes
//! claim up to `spawn_count` slots through an atomic counter) and
//! `particle_update.wgsl` (every lane advances and writes its vertex). Each
//! dispatch is submitted alone and waited on via its submission index, so
//! queued spawn bursts with different config snapshots can never overlap.

use std::sync::Arc;

use bytemuck::Zeroable;
use wgpu::util::DeviceExt;

use crate::error::{EngineError, EngineResult};
use crate::gpu::GpuContext;
use crate::particles::backend::{BufferOwner, ParticleBackend};
use crate::particles::types::{Particle, ParticleUniforms, ParticleVertex};

const WORKGROUP_SIZE: u32 = 64;

pub struct GpuParticleBackend {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    capacity: u32,
    owner: BufferOwner,
    uniforms: ParticleUniforms,
    uniform_buffer: wgpu::Buffer,
    #[allow(dead_code)]
    particle_buffer: wgpu::Buffer,
    vertex_buffer: wgpu::Buffer,
    counter_buffer: wgpu::Buffer,
    spawn_pipeline: wgpu::ComputePipeline,
    update_pipeline: wgpu::ComputePipeline,
    bind_group: wgpu::BindGroup,
}

impl GpuParticleBackend {
    pub fn new(ctx: &GpuContext, capacity: u32) -> EngineResult<Self> {
        assert!(capacity > 0, "particle capacity must be non-zero");
        let device = ctx.device.clone();
        let queue = ctx.queue.clone();

        let spawn_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("particle-spawn"),
            source: wgpu::ShaderSource::Wgsl(
                include_str!("../shaders/particle_spawn.wgsl").into(),
            ),
        });
        let update_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("particle-update"),
            source: wgpu::ShaderSource::Wgsl(
                include_str!("../shaders/particle_update.wgsl").into(),
            ),
        });

        // All lanes start dead; zeroed vertices render invisible.
        let particle_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("particle-state"),
            contents: bytemuck::cast_slice(&vec![Particle::zeroed(); capacity as usize]),
            usage: wgpu::BufferUsages::STORAGE,
        });
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("particle-vertices"),
            contents: bytemuck::cast_slice(&vec![ParticleVertex::zeroed(); capacity as usize]),
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::VERTEX
                | wgpu::BufferUsages::COPY_SRC,
        });
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("particle-uniforms"),
            size: std::mem::size_of::<ParticleUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let counter_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("particle-spawn-counter"),
            size: std::mem::size_of::<u32>() as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let storage_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: false },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("particle-bind-layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                storage_entry(1),
                storage_entry(2),
                storage_entry(3),
            ],
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("particle-bind-group"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: particle_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: vertex_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: counter_buffer.as_entire_binding(),
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("particle-pipeline-layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });
        let spawn_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("particle-spawn-pipeline"),
            layout: Some(&pipeline_layout),
            module: &spawn_shader,
            entry_point: "main",
        });
        let update_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("particle-update-pipeline"),
            layout: Some(&pipeline_layout),
            module: &update_shader,
            entry_point: "main",
        });

        log::info!("gpu particle backend ready, capacity {capacity}");

        Ok(Self {
            device,
            queue,
            capacity,
            owner: BufferOwner::Graphics,
            uniforms: ParticleUniforms {
                max_num_particles: capacity,
                num_textures: 1,
                ..bytemuck::Zeroable::zeroed()
            },
            uniform_buffer,
            particle_buffer,
            vertex_buffer,
            counter_buffer,
            spawn_pipeline,
            update_pipeline,
            bind_group,
        })
    }

    /// The shared vertex buffer, for the point-sprite renderer.
    pub fn vertex_buffer(&self) -> &wgpu::Buffer {
        &self.vertex_buffer
    }

    fn upload_uniforms(&self) {
        self.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&self.uniforms));
    }

    /// Submit one kernel over the full capacity index space and block until
    /// the device signals completion.
    fn run_kernel(&self, pipeline: &wgpu::ComputePipeline, label: &str) {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(label),
                timestamp_writes: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &self.bind_group, &[]);
            pass.dispatch_workgroups(self.capacity.div_ceil(WORKGROUP_SIZE), 1, 1);
        }
        let submission = self.queue.submit(Some(encoder.finish()));
        self.device
            .poll(wgpu::Maintain::WaitForSubmissionIndex(submission));
    }
}

impl ParticleBackend for GpuParticleBackend {
    fn capacity(&self) -> u32 {
        self.capacity
    }

    fn owner(&self) -> BufferOwner {
        self.owner
    }

    fn sync_graphics(&mut self) -> EngineResult<()> {
        // Full sync point: no draw that might read the shared buffer is
        // allowed to still be in flight when compute takes over.
        self.device.poll(wgpu::Maintain::Wait);
        Ok(())
    }

    fn acquire_vertices(&mut self) -> EngineResult<()> {
        self.owner = self.owner.transition(BufferOwner::Compute);
        Ok(())
    }

    fn write_uniforms(&mut self, uniforms: &ParticleUniforms) -> EngineResult<()> {
        let mut uniforms = *uniforms;
        uniforms.max_num_particles = self.capacity;
        self.uniforms = uniforms;
        self.upload_uniforms();
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
        self.upload_uniforms();
        self.queue
            .write_buffer(&self.counter_buffer, 0, bytemuck::bytes_of(&0u32));
        self.run_kernel(&self.spawn_pipeline, "particle-spawn-dispatch");
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
        self.upload_uniforms();
        self.run_kernel(&self.update_pipeline, "particle-update-dispatch");
        Ok(())
    }

    fn release_vertices(&mut self) -> EngineResult<()> {
        self.owner = self.owner.transition(BufferOwner::Graphics);
        // Full finish so the hand-off is visible before the next draw reads
        // the buffer.
        self.device.poll(wgpu::Maintain::Wait);
        Ok(())
    }

    fn read_vertices(&mut self) -> EngineResult<Vec<ParticleVertex>> {
        if self.owner != BufferOwner::Graphics {
            return Err(EngineError::readback(
                "vertex readback requires graphics ownership",
            ));
        }
        let size = (self.capacity as usize * std::mem::size_of::<ParticleVertex>()) as u64;
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("particle-readback"),
            size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("particle-readback-copy"),
            });
        encoder.copy_buffer_to_buffer(&self.vertex_buffer, 0, &staging, 0, size);
        self.queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (sender, receiver) = futures_intrusive::channel::shared::oneshot_channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);
        pollster::block_on(receiver.receive())
            .ok_or_else(|| EngineError::readback("map_async callback dropped"))?
            .map_err(|e| EngineError::readback(format!("vertex buffer map failed: {e:?}")))?;

        let vertices = bytemuck::cast_slice(&slice.get_mapped_range()).to_vec();
        staging.unmap();
        Ok(vertices)
    }
}
