//! Simulation and display stages.
//!
//! Each stage owns its pipeline, its pass timer and the bind group built
//! from the buffers it is handed at construction. A stage records its pass
//! into its own encoder and submits it immediately, so passes execute in
//! the order the orchestrator calls them.

pub mod diffusion;
pub mod freezing;
pub mod initialise;
pub mod post_render;
pub mod present;
pub mod raster;

pub use diffusion::DiffusionStage;
pub use freezing::FreezingStage;
pub use initialise::InitialiseStage;
pub use post_render::PostRenderStage;
pub use present::PresentStage;
pub use raster::{RasterBindings, RasterSettings, RasterStage, RasterTarget};

use rime_common::ProgramError;
use tracing::info;
use wgpu::{BindGroup, BindGroupLayout, Buffer, ComputePipeline, Device, Queue};

use crate::program::{load_program, ProgramSource};
use crate::timer::PassTimer;

/// Entry point shared by every compute program.
pub const COMPUTE_ENTRY_POINT: &str = "main";

/// Storage buffer binding visible to compute programs.
#[must_use]
pub const fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
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

/// Uniform buffer binding visible to compute programs.
#[must_use]
pub const fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

/// Binds `buffers` in order, starting at binding 0.
#[must_use]
pub fn buffer_bind_group(
    device: &Device,
    layout: &BindGroupLayout,
    label: &str,
    buffers: &[&Buffer],
) -> BindGroup {
    let entries: Vec<wgpu::BindGroupEntry<'_>> = buffers
        .iter()
        .zip(0u32..)
        .map(|(buffer, binding)| wgpu::BindGroupEntry {
            binding,
            resource: buffer.as_entire_binding(),
        })
        .collect();

    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &entries,
    })
}

/// A compute pipeline together with its layout and pass timer.
pub struct ComputeProgram {
    label: String,
    pipeline: ComputePipeline,
    bind_group_layout: BindGroupLayout,
    timer: PassTimer,
}

impl ComputeProgram {
    /// Loads the program at `path` and builds its pipeline over `entries`.
    pub fn new(
        device: &Device,
        queue: &Queue,
        source: &dyn ProgramSource,
        path: &str,
        label: &str,
        entries: &[wgpu::BindGroupLayoutEntry],
    ) -> Result<Self, ProgramError> {
        let shader = load_program(device, source, path)?;

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(&format!("{label} Bind Group Layout")),
            entries,
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&format!("{label} Pipeline Layout")),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(&format!("{label} Pipeline")),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some(COMPUTE_ENTRY_POINT),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            cache: None,
        });

        info!("{label} pipeline created");

        Ok(Self {
            label: label.to_string(),
            pipeline,
            bind_group_layout,
            timer: PassTimer::new(device, queue, label),
        })
    }

    /// Layout the stage's bind group must follow.
    #[must_use]
    pub fn bind_group_layout(&self) -> &BindGroupLayout {
        &self.bind_group_layout
    }

    /// Pass timer of this program.
    #[must_use]
    pub fn timer(&self) -> &PassTimer {
        &self.timer
    }

    /// Mutable pass timer of this program.
    pub fn timer_mut(&mut self) -> &mut PassTimer {
        &mut self.timer
    }

    /// Records one timed dispatch and submits it.
    pub fn run(
        &mut self,
        device: &Device,
        queue: &Queue,
        bind_group: &BindGroup,
        (x, y, z): (u32, u32, u32),
    ) {
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some(&self.label),
        });

        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(&self.label),
                timestamp_writes: self.timer.begin_compute(),
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, bind_group, &[]);
            pass.dispatch_workgroups(x, y, z);
        }

        self.timer.end(&mut encoder);
        queue.submit(Some(encoder.finish()));
        self.timer.submitted();
    }
}
