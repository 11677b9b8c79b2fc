//! Diffusion stage.
//!
//! Every in-domain cell reads its own and its neighbours' diffusion channel
//! from slot `g` and writes slot `1 - g`, so the whole pass sees one
//! consistent snapshot. Neighbours outside the domain act as an endless
//! reservoir at the background level. Receptive cells absorb their
//! neighbours' vapour plus `gamma`, clamped at the freezing threshold.
//! Once the crystal is finished the stage copies slot `g` over unchanged.

use rime_common::ProgramError;
use wgpu::{BindGroup, Buffer, Device, Queue};

use super::{buffer_bind_group, storage_entry, uniform_entry, ComputeProgram};
use crate::domain::cell_workgroups;
use crate::program::{ProgramSource, DIFFUSION_PROGRAM};
use crate::timer::PassTimer;

/// Vapour diffusion over the hex grid.
pub struct DiffusionStage {
    program: ComputeProgram,
    bind_group: BindGroup,
}

impl DiffusionStage {
    /// Binds the parameter uniform (0), the domain (1) and the finished
    /// flag (2, read-only).
    pub fn new(
        device: &Device,
        queue: &Queue,
        source: &dyn ProgramSource,
        params_buffer: &Buffer,
        domain_buffer: &Buffer,
        finished_buffer: &Buffer,
    ) -> Result<Self, ProgramError> {
        let program = ComputeProgram::new(
            device,
            queue,
            source,
            DIFFUSION_PROGRAM,
            "Diffusion",
            &[uniform_entry(0), storage_entry(1, false), storage_entry(2, true)],
        )?;
        let bind_group = buffer_bind_group(
            device,
            program.bind_group_layout(),
            "Diffusion Bind Group",
            &[params_buffer, domain_buffer, finished_buffer],
        );
        Ok(Self { program, bind_group })
    }

    /// Dispatches one diffusion step.
    pub fn run(&mut self, device: &Device, queue: &Queue, radius: u32) {
        let groups = cell_workgroups(radius);
        self.program
            .run(device, queue, &self.bind_group, (groups, groups, 1));
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
