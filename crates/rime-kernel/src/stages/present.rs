//! Present stage: draws the raster target onto the window surface.

use rime_common::ProgramError;
use tracing::info;
use wgpu::{BindGroup, BindGroupLayout, Device, Queue, RenderPipeline, Sampler, TextureView};

use crate::program::{load_program, ProgramSource, PRESENT_PROGRAM};
use crate::timer::PassTimer;

/// Full-screen triangle sampling the raster target.
///
/// Its pass timer measures the frame duration reported to the timing sinks.
pub struct PresentStage {
    pipeline: RenderPipeline,
    bind_group_layout: BindGroupLayout,
    sampler: Sampler,
    bind_group: Option<BindGroup>,
    timer: PassTimer,
}

impl PresentStage {
    /// Builds the render pipeline for a surface of `format`.
    pub fn new(
        device: &Device,
        queue: &Queue,
        source: &dyn ProgramSource,
        format: wgpu::TextureFormat,
    ) -> Result<Self, ProgramError> {
        let shader = load_program(device, source, PRESENT_PROGRAM)?;

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Present Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Present Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Present Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Raster Sampler"),
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        info!("Present pipeline created ({format:?})");

        Ok(Self {
            pipeline,
            bind_group_layout,
            sampler,
            bind_group: None,
            timer: PassTimer::new(device, queue, "Present"),
        })
    }

    /// Rebinds the raster target view.
    pub fn rebuild_bindings(&mut self, device: &Device, raster_view: &TextureView) {
        self.bind_group = Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Present Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(raster_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        }));
    }

    /// Draws into `surface_view` with a timed render pass and submits.
    pub fn draw(&mut self, device: &Device, queue: &Queue, surface_view: &TextureView) {
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Present Encoder"),
        });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Present Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: surface_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: self.timer.begin_render(),
                occlusion_query_set: None,
            });

            if let Some(bind_group) = &self.bind_group {
                pass.set_pipeline(&self.pipeline);
                pass.set_bind_group(0, bind_group, &[]);
                pass.draw(0..3, 0..1);
            }
        }

        self.timer.end(&mut encoder);
        queue.submit(Some(encoder.finish()));
        self.timer.submitted();
    }

    /// Pass timer of this stage.
    #[must_use]
    pub fn timer(&self) -> &PassTimer {
        &self.timer
    }

    /// Mutable pass timer of this stage.
    pub fn timer_mut(&mut self) -> &mut PassTimer {
        &mut self.timer
    }
}
