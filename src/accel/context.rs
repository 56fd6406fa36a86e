use anyhow::{Context, Result};

/// Headless compute device for the accelerated FFT. No surface is ever
/// attached.
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter_name: String,
    /// Largest storage buffer the device accepts in one binding.
    pub max_binding_bytes: u64,
}

impl GpuContext {
    pub fn new() -> Result<Self> {
        pollster::block_on(Self::request())
    }

    async fn request() -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .context("No compute adapter available")?;

        let info = adapter.get_info();
        // A software adapter is slower than the rustfft path.
        if info.device_type == wgpu::DeviceType::Cpu {
            anyhow::bail!("adapter {} is a software implementation", info.name);
        }
        if !adapter
            .get_downlevel_capabilities()
            .flags
            .contains(wgpu::DownlevelFlags::COMPUTE_SHADERS)
        {
            anyhow::bail!("adapter {} has no compute shader support", info.name);
        }

        let available = adapter.limits();
        let required_limits = wgpu::Limits {
            max_storage_buffer_binding_size: available.max_storage_buffer_binding_size,
            max_buffer_size: available.max_buffer_size,
            ..wgpu::Limits::downlevel_defaults()
        };
        let max_binding_bytes =
            (required_limits.max_storage_buffer_binding_size as u64).min(required_limits.max_buffer_size);

        log::info!(
            "Compute adapter: {} ({:?}, {:?}), max binding {} MB",
            info.name,
            info.device_type,
            info.backend,
            max_binding_bytes / (1024 * 1024)
        );

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("specgram_compute"),
                    required_features: wgpu::Features::empty(),
                    required_limits,
                    ..Default::default()
                },
                None,
            )
            .await
            .context("Failed to open compute device")?;

        // Errors outside a batch's scopes would otherwise panic the worker.
        device.on_uncaptured_error(Box::new(|e: wgpu::Error| {
            log::error!("Uncaptured GPU error: {}", e);
        }));

        Ok(Self {
            device,
            queue,
            adapter_name: info.name,
            max_binding_bytes,
        })
    }
}
