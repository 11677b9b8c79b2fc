//! Raster stage.
//!
//! Maps the current generation onto a viewport-sized `rgba8unorm` storage
//! texture. The target is rebuilt on resize; the settings buffer carries the
//! viewport size and the externally visible copy of the finished flag. The
//! finished tint follows the persistent flag, so paused redraws keep it.

use bytemuck::{Pod, Zeroable};
use rime_common::ProgramError;
use tracing::debug;
use wgpu::{util::DeviceExt, BindGroup, Buffer, BufferUsages, Device, Queue};

use super::{storage_entry, ComputeProgram};
use crate::domain::WORKGROUP_SIZE;
use crate::program::{ProgramSource, RASTER_PROGRAM};
use crate::timer::PassTimer;

/// Pixel format of the raster target.
pub const RASTER_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Byte offset of the finished copy in [`RasterSettings`].
pub const RASTER_FINISHED_OFFSET: u64 = 8;

/// Settings block shared by the raster, freezing and post-render programs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
#[repr(C)]
pub struct RasterSettings {
    /// Viewport width in pixels
    pub width: u32,
    /// Viewport height in pixels
    pub height: u32,
    /// Externally visible finished flag
    pub finished: u32,
    /// Pads the block to 16 bytes (must be public for bytemuck)
    pub _padding: u32,
}

/// Viewport-sized storage texture.
pub struct RasterTarget {
    /// Texture written by the raster program
    pub texture: wgpu::Texture,
    /// Full view of the texture
    pub view: wgpu::TextureView,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl RasterTarget {
    fn new(device: &Device, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Raster Target"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: RASTER_FORMAT,
            usage: wgpu::TextureUsages::STORAGE_BINDING
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            width,
            height,
        }
    }

    /// Size as `(width, height)`.
    #[must_use]
    pub const fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Bind group of the raster program, rebuilt whenever the target changes.
pub struct RasterBindings {
    /// Domain (0), settings (1), target (2), persistent finished flag (3)
    pub bind_group: BindGroup,
}

/// Cell state into pixels.
pub struct RasterStage {
    program: ComputeProgram,
    settings_buffer: Buffer,
    target: Option<RasterTarget>,
    bindings: Option<RasterBindings>,
    targets_created: u64,
}

impl RasterStage {
    /// Creates the program and the settings buffer; no target exists until
    /// the first [`RasterStage::resize`].
    pub fn new(
        device: &Device,
        queue: &Queue,
        source: &dyn ProgramSource,
    ) -> Result<Self, ProgramError> {
        let program = ComputeProgram::new(
            device,
            queue,
            source,
            RASTER_PROGRAM,
            "Raster",
            &[
                storage_entry(0, true),
                storage_entry(1, true),
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::StorageTexture {
                        access: wgpu::StorageTextureAccess::WriteOnly,
                        format: RASTER_FORMAT,
                        view_dimension: wgpu::TextureViewDimension::D2,
                    },
                    count: None,
                },
                storage_entry(3, true),
            ],
        )?;

        let settings_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Raster Settings Buffer"),
            contents: bytemuck::bytes_of(&RasterSettings::default()),
            usage: BufferUsages::STORAGE | BufferUsages::COPY_DST | BufferUsages::COPY_SRC,
        });

        Ok(Self {
            program,
            settings_buffer,
            target: None,
            bindings: None,
            targets_created: 0,
        })
    }

    /// Settings buffer, bound by the freezing and post-render stages.
    #[must_use]
    pub fn settings_buffer(&self) -> &Buffer {
        &self.settings_buffer
    }

    /// Current target, if one was created.
    #[must_use]
    pub fn target(&self) -> Option<&RasterTarget> {
        self.target.as_ref()
    }

    /// Number of targets created over the stage's lifetime.
    #[must_use]
    pub const fn targets_created(&self) -> u64 {
        self.targets_created
    }

    /// Rebuilds the target for a new viewport size.
    ///
    /// Returns `false` without touching anything when either dimension is
    /// zero or the size is unchanged. The previous texture is destroyed
    /// before its replacement is created and the bindings are dropped until
    /// [`RasterStage::rebuild_bindings`] runs.
    pub fn resize(&mut self, device: &Device, queue: &Queue, width: u32, height: u32) -> bool {
        if width == 0 || height == 0 {
            debug!("Ignoring zero-sized raster resize ({width}x{height})");
            return false;
        }
        if self.target.as_ref().map(RasterTarget::size) == Some((width, height)) {
            return false;
        }

        self.bindings = None;
        if let Some(old) = self.target.take() {
            old.texture.destroy();
        }
        self.target = Some(RasterTarget::new(device, width, height));
        self.targets_created += 1;

        // Width and height only; the finished copy belongs to the programs.
        queue.write_buffer(&self.settings_buffer, 0, bytemuck::cast_slice(&[width, height]));
        debug!("Raster target resized to {width}x{height}");
        true
    }

    /// Rebuilds the bind group against the current target.
    pub fn rebuild_bindings(
        &mut self,
        device: &Device,
        domain_buffer: &Buffer,
        finished_buffer: &Buffer,
    ) {
        let Some(target) = &self.target else {
            self.bindings = None;
            return;
        };
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Raster Bind Group"),
            layout: self.program.bind_group_layout(),
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: domain_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: self.settings_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&target.view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: finished_buffer.as_entire_binding(),
                },
            ],
        });
        self.bindings = Some(RasterBindings { bind_group });
    }

    /// Clears the externally visible finished copy.
    pub fn clear_finished(&self, queue: &Queue) {
        queue.write_buffer(
            &self.settings_buffer,
            RASTER_FINISHED_OFFSET,
            bytemuck::bytes_of(&0u32),
        );
    }

    /// Rasterises the current generation. Does nothing without bindings.
    pub fn run(&mut self, device: &Device, queue: &Queue) {
        let (Some(target), Some(bindings)) = (&self.target, &self.bindings) else {
            return;
        };
        let groups = (
            target.width.div_ceil(WORKGROUP_SIZE),
            target.height.div_ceil(WORKGROUP_SIZE),
            1,
        );
        self.program.run(device, queue, &bindings.bind_group, groups);
    }

    /// Pass timer of this stage.
    #[must_use]
    pub fn timer(&self) -> &PassTimer {
        self.program.timer()
    }

    /// Mutable pass timer of this stage.
    pub fn timer_mut(&mut self) -> &mut PassTimer {
        self.program.timer_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_layout() {
        assert_eq!(std::mem::size_of::<RasterSettings>(), 16);
        let settings = RasterSettings {
            finished: 1,
            ..RasterSettings::default()
        };
        let bytes = bytemuck::bytes_of(&settings);
        let offset = RASTER_FINISHED_OFFSET as usize;
        assert_eq!(&bytes[offset..offset + 4], &1u32.to_ne_bytes());
    }
}
