//! GPU upload and indexed draws for a culled terrain frame.
//!
//! All selection happens in [`super::culling`]; this type only owns the
//! static buffers and replays a [`DrawList`]'s index ranges. Prop meshes are
//! application assets and are drawn by the embedding scene, not here.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use wgpu::util::DeviceExt;

use crate::gpu::GpuContext;
use crate::terrain::culling::DrawList;
use crate::terrain::{Terrain, TerrainVertex};

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct TerrainUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub sun_direction: [f32; 4],
    pub flat_specular: [f32; 4],
    pub steep_specular: [f32; 4],
    pub camera_pos: [f32; 4],
    pub blend_angles: [f32; 4],
}

impl TerrainUniforms {
    pub fn new(terrain: &Terrain, view_proj: Mat4, camera_pos: Vec3, sun_direction: Vec3) -> Self {
        let params = terrain.params();
        let (blend_lo, blend_hi) = params.blend_angle_rad();
        let flat = &params.flat_material;
        let steep = &params.steep_material;
        Self {
            view_proj: view_proj.to_cols_array_2d(),
            sun_direction: sun_direction.extend(0.0).to_array(),
            flat_specular: [
                flat.specular[0],
                flat.specular[1],
                flat.specular[2],
                flat.shininess,
            ],
            steep_specular: [
                steep.specular[0],
                steep.specular[1],
                steep.specular[2],
                steep.shininess,
            ],
            camera_pos: camera_pos.extend(1.0).to_array(),
            blend_angles: [blend_lo, blend_hi, 0.0, 0.0],
        }
    }
}

pub struct TerrainRenderer {
    pipeline: wgpu::RenderPipeline,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl TerrainRenderer {
    pub fn new(
        ctx: &GpuContext,
        terrain: &Terrain,
        color_format: wgpu::TextureFormat,
        depth_format: Option<wgpu::TextureFormat>,
    ) -> Self {
        let device = &ctx.device;
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("terrain-shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/terrain.wgsl").into()),
        });

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("terrain-vertices"),
            contents: bytemuck::cast_slice(&terrain.mesh().vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("terrain-indices"),
            contents: bytemuck::cast_slice(&terrain.mesh().indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("terrain-uniforms"),
            size: std::mem::size_of::<TerrainUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("terrain-bind-layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("terrain-bind-group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("terrain-pipeline-layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let vertex_layout = wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<TerrainVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2],
        };

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("terrain-pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[vertex_layout],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: color_format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                // Skirt walls are visible from both sides.
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: depth_format.map(|format| wgpu::DepthStencilState {
                format,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        Self {
            pipeline,
            vertex_buffer,
            index_buffer,
            uniform_buffer,
            bind_group,
        }
    }

    /// Upload this frame's uniforms.
    pub fn prepare(&self, ctx: &GpuContext, uniforms: &TerrainUniforms) {
        ctx.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(uniforms));
    }

    /// Replay a cull pass into an open render pass.
    pub fn render<'a>(&'a self, pass: &mut wgpu::RenderPass<'a>, draw_list: &DrawList<'_>) {
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        for command in &draw_list.commands {
            if !command.index_range.is_empty() {
                pass.draw_indexed(command.index_range.clone(), 0, 0..1);
            }
            if !command.skirt_range.is_empty() {
                pass.draw_indexed(command.skirt_range.clone(), 0, 0..1);
            }
        }
    }
}
