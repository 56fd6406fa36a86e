use anyhow::{Context, Result};
use bytemuck::{Pod, Zeroable};
use std::sync::Mutex;
use wgpu::util::DeviceExt;

use super::context::GpuContext;
use crate::error::SpectrogramError;
use crate::spectrum::transform::{fill_frame, frame_count, hann_window};

const WORKGROUP_SIZE: u32 = 256;
const MAX_WORKGROUPS_PER_DIM: u32 = 65535;
/// Upper bound on the complex frame buffer uploaded per batch.
const MAX_BATCH_BYTES: usize = 64 * 1024 * 1024;

const FFT_SHADER: &str = r#"
struct Params {
    n: u32,
    half: u32,
    total: u32,
    row_stride: u32,
};

@group(0) @binding(0) var<uniform> params: Params;
@group(0) @binding(1) var<storage, read_write> data: array<vec2<f32>>;
@group(0) @binding(2) var<storage, read_write> magnitudes: array<f32>;

const TAU: f32 = 6.283185307179586;

// One radix-2 decimation-in-time stage over every frame in the batch.
@compute @workgroup_size(256)
fn butterfly(@builtin(global_invocation_id) gid: vec3<u32>) {
    let idx = gid.x + gid.y * params.row_stride;
    if (idx >= params.total) {
        return;
    }
    let per_frame = params.n / 2u;
    let frame = idx / per_frame;
    let j = idx % per_frame;
    let group = j / params.half;
    let k = j % params.half;

    let a = frame * params.n + group * 2u * params.half + k;
    let b = a + params.half;

    let angle = -TAU * f32(k) / f32(2u * params.half);
    let w = vec2<f32>(cos(angle), sin(angle));
    let x = data[a];
    let y = data[b];
    let t = vec2<f32>(w.x * y.x - w.y * y.y, w.x * y.y + w.y * y.x);
    data[a] = x + t;
    data[b] = x - t;
}

@compute @workgroup_size(256)
fn magnitude(@builtin(global_invocation_id) gid: vec3<u32>) {
    let idx = gid.x + gid.y * params.row_stride;
    if (idx >= params.total) {
        return;
    }
    let bins = params.n / 2u + 1u;
    let frame = idx / bins;
    let bin = idx % bins;
    magnitudes[idx] = length(data[frame * params.n + bin]);
}
"#;

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct FftParams {
    n: u32,
    half: u32,
    total: u32,
    row_stride: u32,
}

/// Batched STFT on a compute device: frames are windowed and bit-reverse
/// ordered on the host, transformed in `log2(n)` butterfly passes, and only
/// the magnitudes are read back.
pub struct GpuFft {
    gpu: GpuContext,
    /// Error scopes are per device, so batches from concurrent tasks take
    /// turns.
    batch_lock: Mutex<()>,
    bind_group_layout: wgpu::BindGroupLayout,
    butterfly: wgpu::ComputePipeline,
    magnitude: wgpu::ComputePipeline,
}

impl GpuFft {
    pub fn new(gpu: GpuContext) -> Result<Self> {
        let device = &gpu.device;
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("stft_shader"),
            source: wgpu::ShaderSource::Wgsl(FFT_SHADER.into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("stft_bind_group_layout"),
            entries: &[
                // @binding(0): stage parameters
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
                // @binding(1): complex frames, transformed in place
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: false },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                // @binding(2): magnitudes out
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: false },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("stft_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let make_pipeline = |entry: &str| {
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(entry),
                layout: Some(&pipeline_layout),
                module: &shader,
                entry_point: Some(entry),
                compilation_options: Default::default(),
                cache: None,
            })
        };

        let butterfly = make_pipeline("butterfly");
        let magnitude = make_pipeline("magnitude");

        Ok(Self {
            gpu,
            batch_lock: Mutex::new(()),
            bind_group_layout,
            butterfly,
            magnitude,
        })
    }

    pub fn adapter_name(&self) -> &str {
        &self.gpu.adapter_name
    }

    /// Frame-major magnitudes with `n_fft/2 + 1` bins per frame, framed the
    /// same way as the scalar path.
    pub fn stft_magnitudes(
        &self,
        samples: &[f32],
        n_fft: usize,
        hop_length: usize,
    ) -> Result<Vec<Vec<f32>>, SpectrogramError> {
        self.run(samples, n_fft, hop_length)
            .map_err(|e| SpectrogramError::Accelerator(format!("{:#}", e)))
    }

    fn run(&self, samples: &[f32], n_fft: usize, hop_length: usize) -> Result<Vec<Vec<f32>>> {
        if !n_fft.is_power_of_two() || n_fft < 2 {
            anyhow::bail!("FFT size {} is not a power of two", n_fft);
        }

        let total_frames = frame_count(samples.len(), n_fft, hop_length);
        let frame_bytes = n_fft * std::mem::size_of::<[f32; 2]>();
        let batch_bytes = MAX_BATCH_BYTES.min(self.gpu.max_binding_bytes as usize);
        let batch_frames = (batch_bytes / frame_bytes).max(1);
        let window = hann_window(n_fft);
        let bits = n_fft.trailing_zeros();
        let reversed: Vec<usize> = (0..n_fft)
            .map(|i| i.reverse_bits() >> (usize::BITS - bits))
            .collect();

        log::debug!(
            "GPU STFT: {} frames in batches of {}, n_fft={}, hop={}",
            total_frames, batch_frames, n_fft, hop_length
        );

        let mut output = Vec::with_capacity(total_frames);
        let mut frame = vec![0.0f32; n_fft];
        let mut start = 0;
        while start < total_frames {
            let count = batch_frames.min(total_frames - start);
            let mut input = vec![[0.0f32; 2]; count * n_fft];
            for f in 0..count {
                fill_frame(samples, start + f, hop_length, &mut frame);
                let dst = &mut input[f * n_fft..(f + 1) * n_fft];
                for (i, (&s, &w)) in frame.iter().zip(window.iter()).enumerate() {
                    dst[reversed[i]] = [s * w, 0.0];
                }
            }
            output.extend(self.run_batch(&input, n_fft, count)?);
            start += count;
        }
        Ok(output)
    }

    fn run_batch(&self, input: &[[f32; 2]], n_fft: usize, frames: usize) -> Result<Vec<Vec<f32>>> {
        let _turn = self.batch_lock.lock().unwrap_or_else(|e| e.into_inner());
        let device = &self.gpu.device;
        let bins = n_fft / 2 + 1;

        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let (readback, mag_size) = self.dispatch_batch(input, n_fft, frames);
        let validation = pollster::block_on(device.pop_error_scope());
        let out_of_memory = pollster::block_on(device.pop_error_scope());
        check_scopes(out_of_memory, validation)?;

        // Read back
        let buffer_slice = readback.slice(..mag_size);
        let (sender, receiver) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        device.poll(wgpu::Maintain::Wait);
        receiver
            .recv()
            .context("GPU readback channel closed")?
            .context("Failed to map GPU readback buffer")?;

        let data = buffer_slice.get_mapped_range();
        let magnitudes: &[f32] = bytemuck::cast_slice(&data);
        let frames_out = magnitudes.chunks(bins).map(|c| c.to_vec()).collect();
        drop(data);
        readback.unmap();

        Ok(frames_out)
    }

    /// Upload one batch, record every pass and submit. Device errors raised
    /// here land in the caller's error scopes.
    fn dispatch_batch(&self, input: &[[f32; 2]], n_fft: usize, frames: usize) -> (wgpu::Buffer, u64) {
        let device = &self.gpu.device;
        let bins = n_fft / 2 + 1;
        let mag_size = (frames * bins * std::mem::size_of::<f32>()) as u64;

        let data_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("stft_frames"),
            contents: bytemuck::cast_slice(input),
            usage: wgpu::BufferUsages::STORAGE,
        });
        let mag_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("stft_magnitudes"),
            size: mag_size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let readback = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("stft_readback"),
            size: mag_size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("stft_encoder"),
        });

        let butterflies = (frames * n_fft / 2) as u32;
        let mut half = 1usize;
        while half < n_fft {
            let (groups, row_stride) = dispatch_size(butterflies);
            let bind_group = self.bind_group(
                FftParams {
                    n: n_fft as u32,
                    half: half as u32,
                    total: butterflies,
                    row_stride,
                },
                &data_buffer,
                &mag_buffer,
            );
            {
                let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some("stft_butterfly_pass"),
                    timestamp_writes: None,
                });
                pass.set_pipeline(&self.butterfly);
                pass.set_bind_group(0, &bind_group, &[]);
                pass.dispatch_workgroups(groups.0, groups.1, 1);
            }
            half *= 2;
        }

        let outputs = (frames * bins) as u32;
        let (groups, row_stride) = dispatch_size(outputs);
        let bind_group = self.bind_group(
            FftParams {
                n: n_fft as u32,
                half: 0,
                total: outputs,
                row_stride,
            },
            &data_buffer,
            &mag_buffer,
        );
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("stft_magnitude_pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.magnitude);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(groups.0, groups.1, 1);
        }

        encoder.copy_buffer_to_buffer(&mag_buffer, 0, &readback, 0, mag_size);
        self.gpu.queue.submit(std::iter::once(encoder.finish()));

        (readback, mag_size)
    }

    fn bind_group(
        &self,
        params: FftParams,
        data: &wgpu::Buffer,
        magnitudes: &wgpu::Buffer,
    ) -> wgpu::BindGroup {
        let device = &self.gpu.device;
        let uniform = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("stft_params"),
            contents: bytemuck::bytes_of(&params),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("stft_bind_group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: data.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: magnitudes.as_entire_binding(),
                },
            ],
        })
    }
}

/// Turn the errors captured while dispatching a batch into a failure the
/// transform engine can fall back from.
fn check_scopes(out_of_memory: Option<wgpu::Error>, validation: Option<wgpu::Error>) -> Result<()> {
    if let Some(e) = out_of_memory {
        anyhow::bail!("GPU out of memory: {}", e);
    }
    if let Some(e) = validation {
        anyhow::bail!("GPU rejected the STFT batch: {}", e);
    }
    Ok(())
}

/// Workgroup grid for `invocations` threads, folded into two dimensions when
/// it would exceed the per-dimension limit. Returns the grid and the number
/// of invocations per grid row.
fn dispatch_size(invocations: u32) -> ((u32, u32), u32) {
    let workgroups = invocations.div_ceil(WORKGROUP_SIZE).max(1);
    let x = workgroups.min(MAX_WORKGROUPS_PER_DIM);
    let y = workgroups.div_ceil(x);
    ((x, y), x * WORKGROUP_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectrum::transform::stft_magnitudes;

    #[test]
    fn dispatch_folds_large_grids() {
        assert_eq!(dispatch_size(10), ((1, 1), 256));
        let ((x, y), stride) = dispatch_size(40_000_000);
        assert_eq!(x, MAX_WORKGROUPS_PER_DIM);
        assert!(x as u64 * y as u64 * WORKGROUP_SIZE as u64 >= 40_000_000);
        assert_eq!(stride, x * WORKGROUP_SIZE);
    }

    #[test]
    fn captured_device_errors_become_failures() {
        assert!(check_scopes(None, None).is_ok());

        let oom = wgpu::Error::OutOfMemory {
            source: Box::new(std::io::Error::other("no room")),
        };
        let err = check_scopes(Some(oom), None).unwrap_err();
        assert!(err.to_string().contains("out of memory"));

        let invalid = wgpu::Error::Validation {
            source: Box::new(std::io::Error::other("bad binding")),
            description: "bad binding".into(),
        };
        let err = check_scopes(None, Some(invalid)).unwrap_err();
        assert!(err.to_string().contains("rejected"));
    }

    #[test]
    fn gpu_matches_scalar_when_available() {
        let Ok(gpu) = GpuContext::new() else {
            return;
        };
        let fft = GpuFft::new(gpu).unwrap();
        let samples: Vec<f32> = (0..6000)
            .map(|i| (i as f32 * 0.05).sin() + 0.25 * (i as f32 * 0.31).cos())
            .collect();
        let gpu_frames = fft.stft_magnitudes(&samples, 1024, 256).unwrap();
        let cpu_frames = stft_magnitudes(&samples, 1024, 256);
        assert_eq!(gpu_frames.len(), cpu_frames.len());
        let peak = cpu_frames.iter().flatten().copied().fold(0.0f32, f32::max);
        for (g, c) in gpu_frames.iter().zip(cpu_frames.iter()) {
            for (a, b) in g.iter().zip(c.iter()) {
                assert!((a - b).abs() <= peak * 1e-3);
            }
        }
    }
}
