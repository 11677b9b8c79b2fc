//! Post-render stage: clears the externally visible finished flag.

use rime_common::ProgramError;
use wgpu::{BindGroup, Buffer, Device, Queue};

use super::{buffer_bind_group, storage_entry, ComputeProgram};
use crate::program::{ProgramSource, POST_RENDER_PROGRAM};
use crate::timer::PassTimer;

/// Single-invocation pass run after every raster.
pub struct PostRenderStage {
    program: ComputeProgram,
    bind_group: BindGroup,
}

impl PostRenderStage {
    /// Binds the raster settings buffer (0).
    pub fn new(
        device: &Device,
        queue: &Queue,
        source: &dyn ProgramSource,
        raster_settings: &Buffer,
    ) -> Result<Self, ProgramError> {
        let program = ComputeProgram::new(
            device,
            queue,
            source,
            POST_RENDER_PROGRAM,
            "Post Render",
            &[storage_entry(0, false)],
        )?;
        let bind_group = buffer_bind_group(
            device,
            program.bind_group_layout(),
            "Post Render Bind Group",
            &[raster_settings],
        );
        Ok(Self { program, bind_group })
    }

    /// Dispatches the clear.
    pub fn run(&mut self, device: &Device, queue: &Queue) {
        self.program.run(device, queue, &self.bind_group, (1, 1, 1));
    }

    /// Mutable pass timer of this stage.
    pub fn timer_mut(&mut self) -> &mut PassTimer {
        self.program.timer_mut()
    }
}
