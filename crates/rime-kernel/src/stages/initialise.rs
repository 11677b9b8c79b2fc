//! Initializer: seeds the domain on the device.

use rime_common::ProgramError;
use tracing::info;
use wgpu::{BindGroup, Buffer, Device, Queue};

use super::{buffer_bind_group, storage_entry, uniform_entry, ComputeProgram};
use crate::domain::cell_workgroups;
use crate::program::{ProgramSource, INITIALISE_PROGRAM};
use crate::timer::PassTimer;

/// Writes the ring-classified starting state for the header's radius.
pub struct InitialiseStage {
    program: ComputeProgram,
    bind_group: BindGroup,
}

impl InitialiseStage {
    /// Binds the parameter uniform (0) and the domain buffer (1).
    pub fn new(
        device: &Device,
        queue: &Queue,
        source: &dyn ProgramSource,
        params_buffer: &Buffer,
        domain_buffer: &Buffer,
    ) -> Result<Self, ProgramError> {
        let program = ComputeProgram::new(
            device,
            queue,
            source,
            INITIALISE_PROGRAM,
            "Initialise",
            &[uniform_entry(0), storage_entry(1, false)],
        )?;
        let bind_group = buffer_bind_group(
            device,
            program.bind_group_layout(),
            "Initialise Bind Group",
            &[params_buffer, domain_buffer],
        );
        Ok(Self { program, bind_group })
    }

    /// Seeds every window cell of a domain with the given radius.
    pub fn run(&mut self, device: &Device, queue: &Queue, radius: u32) {
        info!("Seeding crystal domain (radius {radius})");
        let groups = cell_workgroups(radius);
        self.program
            .run(device, queue, &self.bind_group, (groups, groups, 1));
    }

    /// Pass timer of this stage.
    pub fn timer_mut(&mut self) -> &mut PassTimer {
        self.program.timer_mut()
    }
}
