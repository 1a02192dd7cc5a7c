//! wgpu compute backend for WGSL kernels.
//!
//! This backend maps to Metal on macOS and Vulkan/DX12 elsewhere. Buffer
//! arguments are staged as storage buffers bound in argument order at
//! `@group(0) @binding(i)`; scalar arguments become single-value uniform
//! buffers at their argument's binding. Work-group dimensions are
//! compile-time constants in WGSL, so kernels spell
//! `@workgroup_size(block_size_x, ...)` with the injected constants and the
//! `threads` launch argument is informational here.

use crate::args::{DeviceArg, KernelArg, KernelHandle};
use crate::device::DeviceBackend;
use crate::dims::{BlockDim, GridDim};
use crate::error::BackendError;
use bytemuck::cast_slice;
use pollster::block_on;
use std::sync::mpsc;
use std::time::Instant;
use tracing::{debug, info};
use wgpu::util::DeviceExt;

/// Information about the opened adapter.
#[derive(Debug, Clone)]
pub struct WgslDeviceInfo {
    pub name: String,
    pub backend: String,
    pub supports_timestamps: bool,
}

pub struct WgslBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    device_info: WgslDeviceInfo,
    max_threads: usize,
    buffers: Vec<wgpu::Buffer>,
    pipelines: Vec<wgpu::ComputePipeline>,
    timestamp_query_set: Option<wgpu::QuerySet>,
    timestamp_period: f32,
}

impl WgslBackend {
    /// Open the adapter at `device_index` and create a device context.
    pub fn new(device_index: usize) -> Result<Self, BackendError> {
        let instance = wgpu::Instance::default();
        let adapter = if device_index == 0 {
            block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            }))
            .ok_or_else(|| BackendError::Device("no suitable GPU adapter found".into()))?
        } else {
            instance
                .enumerate_adapters(wgpu::Backends::all())
                .into_iter()
                .nth(device_index)
                .ok_or_else(|| {
                    BackendError::Device(format!("no GPU adapter at index {device_index}"))
                })?
        };

        let adapter_info = adapter.get_info();
        let supports_timestamps = adapter.features().contains(wgpu::Features::TIMESTAMP_QUERY);
        let required_features = if supports_timestamps {
            wgpu::Features::TIMESTAMP_QUERY
        } else {
            wgpu::Features::empty()
        };

        let (device, queue) = block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("gridtune device"),
                required_features,
                required_limits: wgpu::Limits::default(),
            },
            None,
        ))
        .map_err(|err| BackendError::Device(err.to_string()))?;

        let timestamp_query_set = if supports_timestamps {
            Some(device.create_query_set(&wgpu::QuerySetDescriptor {
                label: Some("timestamp_queries"),
                ty: wgpu::QueryType::Timestamp,
                count: 2,
            }))
        } else {
            None
        };
        let timestamp_period = if supports_timestamps {
            queue.get_timestamp_period()
        } else {
            0.0
        };

        let max_threads = device.limits().max_compute_invocations_per_workgroup as usize;
        let device_info = WgslDeviceInfo {
            name: adapter_info.name.clone(),
            backend: format!("{:?}", adapter_info.backend),
            supports_timestamps,
        };
        info!(
            device = %device_info.name,
            backend = %device_info.backend,
            max_threads,
            "opened wgpu device"
        );

        Ok(Self {
            device,
            queue,
            device_info,
            max_threads,
            buffers: Vec::new(),
            pipelines: Vec::new(),
            timestamp_query_set,
            timestamp_period,
        })
    }

    pub fn device_info(&self) -> &WgslDeviceInfo {
        &self.device_info
    }

    fn pipeline(&self, kernel: KernelHandle) -> Result<&wgpu::ComputePipeline, BackendError> {
        self.pipelines.get(kernel.0).ok_or_else(|| {
            BackendError::InvalidArgument(format!("unknown kernel handle {}", kernel.0))
        })
    }

    fn buffer(&self, slot: usize) -> Result<&wgpu::Buffer, BackendError> {
        self.buffers
            .get(slot)
            .ok_or_else(|| BackendError::InvalidArgument(format!("unknown buffer slot {slot}")))
    }

    fn scalar_uniform(&self, value: &KernelArg) -> Result<wgpu::Buffer, BackendError> {
        let bytes: [u8; 4] = match value {
            KernelArg::Float32(v) => v.to_le_bytes(),
            KernelArg::Int32(v) => v.to_le_bytes(),
            KernelArg::Uint32(v) => v.to_le_bytes(),
            other => {
                return Err(BackendError::InvalidArgument(format!(
                    "buffer argument staged as scalar: {other:?}"
                )))
            }
        };
        Ok(self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("scalar_arg"),
                contents: &bytes,
                usage: wgpu::BufferUsages::UNIFORM,
            }))
    }

    fn build_bind_group(
        &self,
        pipeline: &wgpu::ComputePipeline,
        args: &[DeviceArg],
    ) -> Result<wgpu::BindGroup, BackendError> {
        let mut scalar_uniforms: Vec<Option<wgpu::Buffer>> = Vec::with_capacity(args.len());
        for arg in args {
            match arg {
                DeviceArg::Scalar(value) => scalar_uniforms.push(Some(self.scalar_uniform(value)?)),
                DeviceArg::Buffer { .. } => scalar_uniforms.push(None),
            }
        }

        let mut entries = Vec::with_capacity(args.len());
        for (binding, arg) in args.iter().enumerate() {
            let resource = match arg {
                DeviceArg::Buffer { slot, .. } => self.buffer(*slot)?.as_entire_binding(),
                DeviceArg::Scalar(_) => scalar_uniforms[binding]
                    .as_ref()
                    .ok_or_else(|| {
                        BackendError::InvalidArgument("scalar uniform was not staged".into())
                    })?
                    .as_entire_binding(),
            };
            entries.push(wgpu::BindGroupEntry {
                binding: binding as u32,
                resource,
            });
        }

        let layout = pipeline.get_bind_group_layout(0);
        Ok(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("kernel_args"),
            layout: &layout,
            entries: &entries,
        }))
    }

    fn read_mapped(&self, staging: &wgpu::Buffer) -> Result<Vec<u8>, BackendError> {
        let slice = staging.slice(..);
        let (sender, receiver) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |res| {
            let _ = sender.send(res);
        });
        self.device.poll(wgpu::Maintain::Wait);
        let mapped = receiver
            .recv()
            .map_err(|_| BackendError::Device("lost GPU map signal".into()))?;
        mapped.map_err(|err| BackendError::Device(format!("failed to map buffer: {err}")))?;
        let data = slice.get_mapped_range();
        let bytes = data.to_vec();
        drop(data);
        staging.unmap();
        Ok(bytes)
    }
}

impl DeviceBackend for WgslBackend {
    fn name(&self) -> &'static str {
        "wgsl"
    }

    fn max_threads(&self) -> usize {
        self.max_threads
    }

    fn ready_argument_list(&mut self, args: &[KernelArg]) -> Result<Vec<DeviceArg>, BackendError> {
        let mut staged = Vec::with_capacity(args.len());
        for arg in args {
            let contents: &[u8] = match arg {
                KernelArg::Float32Buffer(v) => cast_slice(v),
                KernelArg::Int32Buffer(v) => cast_slice(v),
                KernelArg::Uint32Buffer(v) => cast_slice(v),
                scalar => {
                    staged.push(DeviceArg::Scalar(scalar.clone()));
                    continue;
                }
            };
            let buffer = self
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("kernel_arg"),
                    contents,
                    usage: wgpu::BufferUsages::STORAGE
                        | wgpu::BufferUsages::COPY_SRC
                        | wgpu::BufferUsages::COPY_DST,
                });
            self.buffers.push(buffer);
            staged.push(DeviceArg::Buffer {
                slot: self.buffers.len() - 1,
                size_bytes: arg.size_bytes(),
            });
        }
        Ok(staged)
    }

    fn compile(&mut self, kernel_name: &str, source: &str) -> Result<KernelHandle, BackendError> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(kernel_name),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });
        if let Some(err) = block_on(self.device.pop_error_scope()) {
            return Err(BackendError::Compile(err.to_string()));
        }

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = self
            .device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(kernel_name),
                layout: None,
                module: &module,
                entry_point: kernel_name,
            });
        if let Some(err) = block_on(self.device.pop_error_scope()) {
            return Err(BackendError::Compile(err.to_string()));
        }

        self.pipelines.push(pipeline);
        Ok(KernelHandle(self.pipelines.len() - 1))
    }

    fn run_kernel(
        &mut self,
        kernel: KernelHandle,
        args: &[DeviceArg],
        threads: BlockDim,
        grid: GridDim,
    ) -> Result<(), BackendError> {
        let pipeline = self.pipeline(kernel)?;
        let bind_group = self.build_bind_group(pipeline, args)?;
        debug!(%threads, %grid, "launching kernel");

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("kernel_launch"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("kernel_pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(grid.x.max(1) as u32, grid.y.max(1) as u32, 1);
        }
        self.queue.submit(Some(encoder.finish()));
        self.device.poll(wgpu::Maintain::Wait);
        if let Some(err) = block_on(self.device.pop_error_scope()) {
            return Err(BackendError::Launch(err.to_string()));
        }
        Ok(())
    }

    fn benchmark(
        &mut self,
        kernel: KernelHandle,
        args: &[DeviceArg],
        threads: BlockDim,
        grid: GridDim,
        iterations: usize,
    ) -> Result<Vec<f64>, BackendError> {
        let pipeline = self.pipeline(kernel)?;
        let bind_group = self.build_bind_group(pipeline, args)?;
        debug!(%threads, %grid, iterations, "benchmarking kernel");

        let timestamp_buffers = self.timestamp_query_set.as_ref().map(|_| {
            let resolve = self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("timestamp_resolve"),
                size: 2 * std::mem::size_of::<u64>() as u64,
                usage: wgpu::BufferUsages::QUERY_RESOLVE | wgpu::BufferUsages::COPY_SRC,
                mapped_at_creation: false,
            });
            let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("timestamp_staging"),
                size: 2 * std::mem::size_of::<u64>() as u64,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            (resolve, staging)
        });

        let mut times = Vec::with_capacity(iterations);
        for _ in 0..iterations {
            let start = Instant::now();
            self.device.push_error_scope(wgpu::ErrorFilter::Validation);
            let mut encoder = self
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("benchmark_iteration"),
                });
            let timestamp_writes =
                self.timestamp_query_set
                    .as_ref()
                    .map(|qs| wgpu::ComputePassTimestampWrites {
                        query_set: qs,
                        beginning_of_pass_write_index: Some(0),
                        end_of_pass_write_index: Some(1),
                    });
            {
                let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some("benchmark_pass"),
                    timestamp_writes,
                });
                pass.set_pipeline(pipeline);
                pass.set_bind_group(0, &bind_group, &[]);
                pass.dispatch_workgroups(grid.x.max(1) as u32, grid.y.max(1) as u32, 1);
            }
            if let (Some(qs), Some((resolve, staging))) =
                (&self.timestamp_query_set, &timestamp_buffers)
            {
                encoder.resolve_query_set(qs, 0..2, resolve, 0);
                encoder.copy_buffer_to_buffer(
                    resolve,
                    0,
                    staging,
                    0,
                    2 * std::mem::size_of::<u64>() as u64,
                );
            }
            self.queue.submit(Some(encoder.finish()));
            self.device.poll(wgpu::Maintain::Wait);
            if let Some(err) = block_on(self.device.pop_error_scope()) {
                return Err(BackendError::Launch(err.to_string()));
            }
            let cpu_ms = start.elapsed().as_secs_f64() * 1000.0;

            let sample_ms = match &timestamp_buffers {
                Some((_, staging)) => {
                    let bytes = self.read_mapped(staging)?;
                    let stamps: Vec<u64> = bytemuck::pod_collect_to_vec(&bytes);
                    let delta_ns = stamps[1].wrapping_sub(stamps[0]) as f64
                        * self.timestamp_period as f64;
                    delta_ns / 1_000_000.0
                }
                // No timestamp support: CPU dispatch time approximates.
                None => cpu_ms,
            };
            times.push(sample_ms);
        }
        Ok(times)
    }

    fn memset_zero(&mut self, arg: &DeviceArg) -> Result<(), BackendError> {
        let DeviceArg::Buffer { slot, .. } = arg else {
            return Ok(());
        };
        let buffer = self.buffer(*slot)?;
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("memset_zero"),
            });
        encoder.clear_buffer(buffer, 0, None);
        self.queue.submit(Some(encoder.finish()));
        self.device.poll(wgpu::Maintain::Wait);
        Ok(())
    }

    fn memcpy_dtoh(&mut self, dest: &mut KernelArg, src: &DeviceArg) -> Result<(), BackendError> {
        let (slot, size_bytes) = match src {
            DeviceArg::Buffer { slot, size_bytes } => (*slot, *size_bytes),
            DeviceArg::Scalar(value) => {
                *dest = value.clone();
                return Ok(());
            }
        };
        let buffer = self.buffer(slot)?;
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("readback_staging"),
            size: size_bytes as u64,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("readback"),
            });
        encoder.copy_buffer_to_buffer(buffer, 0, &staging, 0, size_bytes as u64);
        self.queue.submit(Some(encoder.finish()));
        self.device.poll(wgpu::Maintain::Wait);

        let bytes = self.read_mapped(&staging)?;
        if bytes.len() != dest.size_bytes() {
            return Err(BackendError::InvalidArgument(format!(
                "destination expects {} bytes, device buffer holds {}",
                dest.size_bytes(),
                bytes.len()
            )));
        }
        match dest {
            KernelArg::Float32Buffer(v) => *v = bytemuck::pod_collect_to_vec(&bytes),
            KernelArg::Int32Buffer(v) => *v = bytemuck::pod_collect_to_vec(&bytes),
            KernelArg::Uint32Buffer(v) => *v = bytemuck::pod_collect_to_vec(&bytes),
            scalar => {
                return Err(BackendError::InvalidArgument(format!(
                    "cannot copy a device buffer into scalar destination {scalar:?}"
                )))
            }
        }
        Ok(())
    }
}
