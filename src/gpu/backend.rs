//! wgpu compute backend
//!
//! Positions live in two storage buffers used ping-pong: each dispatch reads
//! one and writes the other, and the roles swap only once the dispatch has
//! been accepted. The flat edge arrays and the uniforms are uploaded once in
//! `prepare`.

use tracing::{debug, info};
use wgpu::util::DeviceExt;

use super::shaders::{FORCE_KERNEL, FORCE_KERNEL_ENTRY};
use super::types::{GpuPosition, KernelUniforms, WORKGROUP_SIZE};
use crate::backend::ComputeBackend;
use crate::error::{DispatchError, DispatchResult};
use crate::kernel::ForceParams;
use crate::layout::FlatLayout;
use crate::types::Vec3;

/// Storage buffers must not be empty
const MIN_BUFFER_SIZE: u64 = 16;

/// Per-run GPU resources
struct RunBuffers {
    node_count: u32,
    positions: [wgpu::Buffer; 2],
    bind_groups: [wgpu::BindGroup; 2],
    /// Index into `positions` of the buffer holding the current snapshot
    current: usize,
    staging: wgpu::Buffer,
    // Kept alive for the bind groups
    _edges: [wgpu::Buffer; 4],
    _uniforms: wgpu::Buffer,
}

/// Force kernel on a wgpu compute pipeline
pub struct GpuBackend {
    name: String,
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    run: Option<RunBuffers>,
}

impl GpuBackend {
    /// Acquire the default high-performance adapter and build the pipeline
    pub fn new() -> DispatchResult<Self> {
        let (name, device, queue) = pollster::block_on(Self::create_device())?;

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Force Kernel Shader"),
            source: wgpu::ShaderSource::Wgsl(FORCE_KERNEL.into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Force Kernel Bind Group Layout"),
            entries: &[
                storage_entry(0, true),
                storage_entry(1, false),
                storage_entry(2, true),
                storage_entry(3, true),
                storage_entry(4, true),
                storage_entry(5, true),
                wgpu::BindGroupLayoutEntry {
                    binding: 6,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Force Kernel Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Force Kernel Pipeline"),
            layout: Some(&pipeline_layout),
            module: &module,
            entry_point: Some(FORCE_KERNEL_ENTRY),
            compilation_options: Default::default(),
            cache: None,
        });

        info!(backend = %name, "gpu backend ready");
        Ok(Self {
            name,
            device,
            queue,
            pipeline,
            bind_group_layout,
            run: None,
        })
    }

    async fn create_device() -> DispatchResult<(String, wgpu::Device, wgpu::Queue)> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| DispatchError::Unavailable("no suitable GPU adapter".into()))?;

        let info = adapter.get_info();
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Force Kernel Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await
            .map_err(|e| DispatchError::Unavailable(e.to_string()))?;

        debug!(adapter = %info.name, "acquired GPU device");
        Ok((format!("wgpu:{:?}", info.backend), device, queue))
    }

    fn storage_buffer(&self, label: &str, contents: &[u8], usage: wgpu::BufferUsages) -> wgpu::Buffer {
        if contents.is_empty() {
            self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: MIN_BUFFER_SIZE,
                usage,
                mapped_at_creation: false,
            })
        } else {
            self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents,
                usage,
            })
        }
    }

    /// Run `f` inside a validation error scope and report what it raised
    fn scoped<T>(&self, f: impl FnOnce() -> T) -> DispatchResult<T> {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = f();
        let validation = pollster::block_on(self.device.pop_error_scope());
        let oom = pollster::block_on(self.device.pop_error_scope());
        match validation.or(oom) {
            Some(err) => Err(DispatchError::Rejected(err.to_string())),
            None => Ok(value),
        }
    }
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

impl ComputeBackend for GpuBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn prepare(&mut self, layout: &FlatLayout, params: &ForceParams) -> DispatchResult<()> {
        let node_count = u32::try_from(layout.node_count())
            .map_err(|_| DispatchError::Unavailable("graph too large for GPU dispatch".into()))?;
        let positions: Vec<GpuPosition> = layout.positions.iter().copied().map(GpuPosition::from).collect();

        let run = self.scoped(|| {
            let position_usage =
                wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::COPY_SRC;
            let positions = [
                self.storage_buffer("Positions A", bytemuck::cast_slice(positions.as_slice()), position_usage),
                self.storage_buffer("Positions B", bytemuck::cast_slice(positions.as_slice()), position_usage),
            ];

            let edge_usage = wgpu::BufferUsages::STORAGE;
            let edges = [
                self.storage_buffer("Edge Block Start", bytemuck::cast_slice(layout.edge_block_start.as_slice()), edge_usage),
                self.storage_buffer("Edge Block Length", bytemuck::cast_slice(layout.edge_block_length.as_slice()), edge_usage),
                self.storage_buffer("Edge Indices", bytemuck::cast_slice(layout.edge_indices.as_slice()), edge_usage),
                self.storage_buffer("Edge Weights", bytemuck::cast_slice(layout.edge_weights.as_slice()), edge_usage),
            ];

            let uniforms = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Kernel Uniforms"),
                contents: bytemuck::bytes_of(&KernelUniforms::new(node_count, params)),
                usage: wgpu::BufferUsages::UNIFORM,
            });

            let bind_group = |input: &wgpu::Buffer, output: &wgpu::Buffer| {
                self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("Force Kernel Bind Group"),
                    layout: &self.bind_group_layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: input.as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: output.as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 2,
                            resource: edges[0].as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 3,
                            resource: edges[1].as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 4,
                            resource: edges[2].as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 5,
                            resource: edges[3].as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 6,
                            resource: uniforms.as_entire_binding(),
                        },
                    ],
                })
            };
            let bind_groups = [
                bind_group(&positions[0], &positions[1]),
                bind_group(&positions[1], &positions[0]),
            ];

            let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Positions Staging"),
                size: positions[0].size(),
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });

            RunBuffers {
                node_count,
                positions,
                bind_groups,
                current: 0,
                staging,
                _edges: edges,
                _uniforms: uniforms,
            }
        })?;

        debug!(nodes = node_count, edge_entries = layout.edge_entry_count(), "prepared gpu backend");
        self.run = Some(run);
        Ok(())
    }

    fn step(&mut self, _layout: &FlatLayout) -> DispatchResult<()> {
        let run = self.run.as_ref().ok_or(DispatchError::NotPrepared)?;
        if run.node_count == 0 {
            return Ok(());
        }

        self.scoped(|| {
            let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Force Kernel Encoder"),
            });
            {
                let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some("Force Kernel Pass"),
                    timestamp_writes: None,
                });
                pass.set_pipeline(&self.pipeline);
                pass.set_bind_group(0, &run.bind_groups[run.current], &[]);
                pass.dispatch_workgroups(run.node_count.div_ceil(WORKGROUP_SIZE), 1, 1);
            }
            self.queue.submit(std::iter::once(encoder.finish()));
        })?;

        // The output buffer becomes the next iteration's snapshot
        if let Some(run) = self.run.as_mut() {
            run.current ^= 1;
        }
        Ok(())
    }

    fn read_positions(&mut self) -> DispatchResult<Vec<Vec3>> {
        let run = self.run.as_ref().ok_or(DispatchError::NotPrepared)?;
        if run.node_count == 0 {
            return Ok(Vec::new());
        }

        let size = u64::from(run.node_count) * std::mem::size_of::<GpuPosition>() as u64;
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Read Positions Encoder"),
        });
        encoder.copy_buffer_to_buffer(&run.positions[run.current], 0, &run.staging, 0, size);
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = run.staging.slice(..size);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = self.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|e| DispatchError::Readback(e.to_string()))?
            .map_err(|e| DispatchError::Readback(e.to_string()))?;

        let data = slice.get_mapped_range();
        let positions = bytemuck::cast_slice::<u8, GpuPosition>(&data)
            .iter()
            .map(|&p| Vec3::from(p))
            .collect();
        drop(data);
        run.staging.unmap();

        Ok(positions)
    }
}
