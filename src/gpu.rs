//! GPU device bootstrap.
//!
//! An explicit context handle owning the wgpu device and its two command
//! queues' entry point. Constructed once by the embedding application and
//! passed into whatever needs it; there is no global singleton.

use std::sync::Arc;

use crate::error::{EngineError, EngineResult};

/// Shared handle to the wgpu device and queue.
#[derive(Clone)]
pub struct GpuContext {
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
}

impl GpuContext {
    /// Request a high-performance adapter and create a device with default
    /// features. Returns a `Device` error when no adapter is available
    /// (e.g. headless CI without a GPU).
    pub fn new() -> EngineResult<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            dx12_shader_compiler: Default::default(),
            flags: wgpu::InstanceFlags::default(),
            gles_minor_version: wgpu::Gles3MinorVersion::Automatic,
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| EngineError::device("no suitable GPU adapter"))?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("ember3d-device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults(),
            },
            None,
        ))
        .map_err(|e| EngineError::device(format!("request_device failed: {e}")))?;

        log::info!("gpu context ready: {:?}", adapter.get_info().backend);

        Ok(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
        })
    }

    /// Block until every submitted command on the queue has completed.
    pub fn wait_idle(&self) {
        self.device.poll(wgpu::Maintain::Wait);
    }
}
