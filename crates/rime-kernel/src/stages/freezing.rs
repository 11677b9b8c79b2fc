//! Freezing and attachment stage.
//!
//! Reads the diffused values in slot `1 - g`. A cell whose value reached the
//! freezing threshold is frozen; every cell that is frozen or touches a
//! frozen neighbour becomes receptive for good and stops diffusing. When a
//! receptive cell appears on the outermost ring the crystal is finished.
//!
//! The stage owns the parameter uniform shared with the diffusion and
//! initialise programs, and the authoritative finished flag.

use rime_common::ProgramError;
use tracing::debug;
use wgpu::{util::DeviceExt, BindGroup, Buffer, BufferUsages, Device, Queue};

use super::{buffer_bind_group, storage_entry, uniform_entry, ComputeProgram};
use crate::domain::{cell_workgroups, CrystalDomain};
use crate::params::SimulationParameters;
use crate::program::{ProgramSource, FREEZING_PROGRAM};
use crate::timer::PassTimer;

/// Byte length of the finished flag.
pub const FINISHED_BYTE_LENGTH: u64 = 4;

/// Attachment pass and owner of the simulation parameters.
pub struct FreezingStage {
    program: ComputeProgram,
    bind_group: BindGroup,
    parameters: SimulationParameters,
    params_buffer: Buffer,
    finished_buffer: Buffer,
}

impl FreezingStage {
    /// Creates the parameter and finished buffers and binds them with the
    /// domain and the raster settings.
    ///
    /// Bindings: parameters (0), domain (1), raster settings (2),
    /// finished flag (3).
    pub fn new(
        device: &Device,
        queue: &Queue,
        source: &dyn ProgramSource,
        parameters: SimulationParameters,
        domain_buffer: &Buffer,
        raster_settings: &Buffer,
    ) -> Result<Self, ProgramError> {
        let program = ComputeProgram::new(
            device,
            queue,
            source,
            FREEZING_PROGRAM,
            "Freezing",
            &[
                uniform_entry(0),
                storage_entry(1, false),
                storage_entry(2, false),
                storage_entry(3, false),
            ],
        )?;

        let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Simulation Params Buffer"),
            contents: bytemuck::bytes_of(&parameters.to_gpu()),
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
        });

        let finished_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Finished Flag Buffer"),
            contents: bytemuck::bytes_of(&0u32),
            usage: BufferUsages::STORAGE | BufferUsages::COPY_DST | BufferUsages::COPY_SRC,
        });

        let bind_group = buffer_bind_group(
            device,
            program.bind_group_layout(),
            "Freezing Bind Group",
            &[&params_buffer, domain_buffer, raster_settings, &finished_buffer],
        );

        Ok(Self {
            program,
            bind_group,
            parameters,
            params_buffer,
            finished_buffer,
        })
    }

    /// Dispatches one attachment step.
    pub fn run(&mut self, device: &Device, queue: &Queue, radius: u32) {
        let groups = cell_workgroups(radius);
        self.program
            .run(device, queue, &self.bind_group, (groups, groups, 1));
    }

    /// Current parameters.
    #[must_use]
    pub const fn parameters(&self) -> &SimulationParameters {
        &self.parameters
    }

    /// Parameter uniform shared with the other simulation programs.
    #[must_use]
    pub fn params_buffer(&self) -> &Buffer {
        &self.params_buffer
    }

    /// Authoritative finished flag.
    #[must_use]
    pub fn finished_buffer(&self) -> &Buffer {
        &self.finished_buffer
    }

    /// Sets alpha; see [`FreezingStage::apply`].
    pub fn set_alpha(&mut self, queue: &Queue, domain: &mut CrystalDomain, alpha: f32) {
        self.parameters.set_alpha(alpha);
        self.apply(queue, domain);
    }

    /// Sets beta; see [`FreezingStage::apply`].
    pub fn set_beta(&mut self, queue: &Queue, domain: &mut CrystalDomain, beta: f32) {
        self.parameters.set_beta(beta);
        self.apply(queue, domain);
    }

    /// Sets gamma; see [`FreezingStage::apply`].
    pub fn set_gamma(&mut self, queue: &Queue, domain: &mut CrystalDomain, gamma: f32) {
        self.parameters.set_gamma(gamma);
        self.apply(queue, domain);
    }

    /// Uploads the parameters, clears the finished flag and re-serialises
    /// the domain with the new coefficients.
    fn apply(&mut self, queue: &Queue, domain: &mut CrystalDomain) {
        debug!("Uploading simulation parameters: {:?}", self.parameters);
        queue.write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(&self.parameters.to_gpu()));
        self.reset(queue);
        domain.apply_parameters(queue, &self.parameters);
    }

    /// Clears the finished flag.
    pub fn reset(&self, queue: &Queue) {
        queue.write_buffer(&self.finished_buffer, 0, bytemuck::bytes_of(&0u32));
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
