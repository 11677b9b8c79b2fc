//! Frame orchestration.
//!
//! The orchestrator owns the device, the window surface, the crystal domain
//! and every stage. Each visual frame it walks a [`FramePlan`]: `speed`
//! simulation sub-steps (diffusion, freezing, generation flip) followed by
//! raster, post-render and present.

use std::time::Duration;

use rime_common::{InitializationError, RimeError, RimeResult};
use tracing::{debug, info, warn};
use wgpu::{Device, Queue, SurfaceTarget};

use crate::curve::{invert_response, response};
use crate::domain::{CrystalDomain, DEFAULT_RADIUS};
use crate::params::SimulationParameters;
use crate::program::{EmbeddedPrograms, ProgramSource};
use crate::schedule::{FramePlan, PassKind};
use crate::stages::{
    DiffusionStage, FreezingStage, InitialiseStage, PostRenderStage, PresentStage, RasterStage,
};
use crate::timing::TimingSettings;
use crate::validation::{create_validated_instance, handle_device_error, requested_features};

/// Construction settings of an [`Orchestrator`].
pub struct RendererSettings {
    /// Sinks fed by the present pass timer
    pub timing: TimingSettings,
    /// Simulation sub-steps per visual frame (at least one)
    pub speed: u32,
    /// Initial domain radius
    pub radius: u32,
    /// Initial simulation parameters
    pub parameters: SimulationParameters,
    /// Enable GPU validation in release builds
    pub gpu_validation: bool,
    /// Synchronise presentation with the display
    pub vsync: bool,
    /// Program source; the embedded programs when `None`
    pub programs: Option<Box<dyn ProgramSource>>,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            timing: TimingSettings::default(),
            speed: 1,
            radius: DEFAULT_RADIUS,
            parameters: SimulationParameters::default(),
            gpu_validation: false,
            vsync: true,
            programs: None,
        }
    }
}

/// Latest rolling-average durations per pass; `None` until measured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageTimings {
    /// Diffusion pass
    pub diffusion: Option<Duration>,
    /// Freezing pass
    pub freezing: Option<Duration>,
    /// Raster pass
    pub raster: Option<Duration>,
    /// Present pass
    pub present: Option<Duration>,
}

/// Owns all GPU state and drives the per-frame pass order.
pub struct Orchestrator {
    surface: wgpu::Surface<'static>,
    device: Device,
    queue: Queue,
    config: wgpu::SurfaceConfiguration,
    domain: CrystalDomain,
    raster: RasterStage,
    freezing: FreezingStage,
    diffusion: DiffusionStage,
    initialise: InitialiseStage,
    post_render: PostRenderStage,
    present: PresentStage,
    speed: u32,
    frame_count: u64,
}

impl Orchestrator {
    /// Acquires a device for `target` and builds every stage.
    ///
    /// # Errors
    /// Returns [`InitializationError`] when no adapter, device or surface
    /// can be acquired, and a program error when a program fails to
    /// resolve.
    pub async fn new(
        target: impl Into<SurfaceTarget<'static>>,
        width: u32,
        height: u32,
        settings: RendererSettings,
    ) -> RimeResult<Self> {
        let RendererSettings {
            mut timing,
            speed,
            radius,
            parameters,
            gpu_validation,
            vsync,
            programs,
        } = settings;
        let programs = programs.unwrap_or_else(|| Box::new(EmbeddedPrograms::default()));

        let instance = create_validated_instance(gpu_validation);
        let surface = instance
            .create_surface(target)
            .map_err(|e| InitializationError::CreateSurface(e.to_string()))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(InitializationError::NoAdapter)?;

        info!("Using GPU adapter: {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Rime Device"),
                    required_features: requested_features(adapter.features()),
                    required_limits: wgpu::Limits::default().using_resolution(adapter.limits()),
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await
            .map_err(|e| InitializationError::RequestDevice(e.to_string()))?;
        device.on_uncaptured_error(Box::new(|error| handle_device_error(&error)));

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .find(|f| !f.is_srgb())
            .or_else(|| caps.formats.first())
            .copied()
            .ok_or(InitializationError::UnsupportedSurface)?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: width.max(1),
            height: height.max(1),
            present_mode: if vsync {
                wgpu::PresentMode::AutoVsync
            } else {
                wgpu::PresentMode::AutoNoVsync
            },
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let mut domain = CrystalDomain::new(radius, &parameters);
        let domain_buffer = domain.initialise(&device, &queue);
        let source = &*programs;

        let raster = RasterStage::new(&device, &queue, source)?;
        let freezing = FreezingStage::new(
            &device,
            &queue,
            source,
            parameters,
            domain_buffer,
            raster.settings_buffer(),
        )?;
        let diffusion = DiffusionStage::new(
            &device,
            &queue,
            source,
            freezing.params_buffer(),
            domain_buffer,
            freezing.finished_buffer(),
        )?;
        let initialise = InitialiseStage::new(
            &device,
            &queue,
            source,
            freezing.params_buffer(),
            domain_buffer,
        )?;
        let post_render = PostRenderStage::new(&device, &queue, source, raster.settings_buffer())?;
        let mut present = PresentStage::new(&device, &queue, source, format)?;
        present
            .timer_mut()
            .set_observer(move |frame| timing.publish(frame));

        let mut orchestrator = Self {
            surface,
            device,
            queue,
            config,
            domain,
            raster,
            freezing,
            diffusion,
            initialise,
            post_render,
            present,
            speed: speed.max(1),
            frame_count: 0,
        };
        orchestrator.rebuild_targets(width, height);

        info!(
            "Orchestrator ready: radius {}, speed {}, {}x{}",
            orchestrator.domain.radius(),
            orchestrator.speed,
            width,
            height
        );

        Ok(orchestrator)
    }

    /// Runs one visual frame and polls the pass timers.
    ///
    /// # Errors
    /// Returns [`RimeError::Surface`] when the surface cannot be recovered.
    pub fn render(&mut self) -> RimeResult<()> {
        self.execute(&FramePlan::tick(self.speed))?;
        self.poll();
        Ok(())
    }

    /// Raster, post-render and present without advancing the simulation.
    ///
    /// # Errors
    /// Returns [`RimeError::Surface`] when the surface cannot be recovered.
    pub fn redraw(&mut self) -> RimeResult<()> {
        self.execute(&FramePlan::redraw())
    }

    fn execute(&mut self, plan: &FramePlan) -> RimeResult<()> {
        let radius = self.domain.radius();
        for pass in plan {
            match pass {
                PassKind::Diffusion => self.diffusion.run(&self.device, &self.queue, radius),
                PassKind::Freezing => self.freezing.run(&self.device, &self.queue, radius),
                PassKind::AdvanceGeneration => self.domain.advance_generation(&self.queue),
                PassKind::Raster => self.raster.run(&self.device, &self.queue),
                PassKind::PostRender => self.post_render.run(&self.device, &self.queue),
                PassKind::Present => self.present_frame()?,
            }
        }
        self.frame_count += 1;
        Ok(())
    }

    fn present_frame(&mut self) -> RimeResult<()> {
        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                warn!("Surface lost or outdated, reconfiguring");
                self.surface.configure(&self.device, &self.config);
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                debug!("Surface timeout, skipping frame");
                return Ok(());
            }
            Err(err) => return Err(RimeError::Surface(err.to_string())),
        };

        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        self.present.draw(&self.device, &self.queue, &view);
        frame.present();
        Ok(())
    }

    /// Advances pending map callbacks and consumes resolved timings.
    pub fn poll(&mut self) {
        let _ = self.device.poll(wgpu::Maintain::Poll);
        self.diffusion.timer_mut().poll();
        self.freezing.timer_mut().poll();
        self.initialise.timer_mut().poll();
        self.raster.timer_mut().poll();
        self.post_render.timer_mut().poll();
        self.present.timer_mut().poll();
    }

    /// Reconfigures the surface, rebuilds the raster target and redraws.
    ///
    /// Zero-sized requests are ignored. Domain state and parameters are
    /// untouched.
    ///
    /// # Errors
    /// Returns [`RimeError::Surface`] when the redraw cannot present.
    pub fn resize(&mut self, width: u32, height: u32) -> RimeResult<()> {
        if width == 0 || height == 0 {
            debug!("Ignoring resize to {width}x{height}");
            return Ok(());
        }

        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);

        if self.rebuild_targets(width, height) {
            self.present.timer_mut().reset();
        }
        self.redraw()
    }

    fn rebuild_targets(&mut self, width: u32, height: u32) -> bool {
        if !self.raster.resize(&self.device, &self.queue, width, height) {
            return false;
        }
        if let Some(domain_buffer) = self.domain.buffer() {
            self.raster
                .rebuild_bindings(&self.device, domain_buffer, self.freezing.finished_buffer());
        }
        if let Some(target) = self.raster.target() {
            self.present.rebuild_bindings(&self.device, &target.view);
        }
        true
    }

    /// Clears the finished flag and re-seeds the domain.
    pub fn restart(&mut self) {
        info!("Restarting crystal (radius {})", self.domain.radius());
        self.reset_finished();
        self.domain.initialise(&self.device, &self.queue);
        self.initialise
            .run(&self.device, &self.queue, self.domain.radius());
    }

    fn reset_finished(&self) {
        self.freezing.reset(&self.queue);
        self.raster.clear_finished(&self.queue);
    }

    /// Sets the diffusion gain (clamped to `>= 0`).
    pub fn set_alpha(&mut self, alpha: f32) {
        self.freezing.set_alpha(&self.queue, &mut self.domain, alpha);
        self.raster.clear_finished(&self.queue);
    }

    /// Sets the background level (clamped to `[0, 1]`).
    pub fn set_beta(&mut self, beta: f32) {
        self.freezing.set_beta(&self.queue, &mut self.domain, beta);
        self.raster.clear_finished(&self.queue);
    }

    /// Sets the attachment rate (clamped to `[0, 1]`).
    pub fn set_gamma(&mut self, gamma: f32) {
        self.freezing.set_gamma(&self.queue, &mut self.domain, gamma);
        self.raster.clear_finished(&self.queue);
    }

    /// Sets gamma from a response-curve position in `[0, 1]`.
    pub fn set_gamma_normalised(&mut self, position: f64) {
        let position = if position.is_nan() {
            0.0
        } else {
            position.clamp(0.0, 1.0)
        };
        self.set_gamma(response(position) as f32);
    }

    /// Response-curve position that yields the current gamma.
    #[must_use]
    pub fn gamma_normalised(&self) -> f64 {
        invert_response(f64::from(self.parameters().gamma()))
    }

    /// Sets the radius (clamped to `[1, MAX_RADIUS]`) and re-seeds the
    /// domain.
    pub fn set_radius(&mut self, radius: u32) {
        self.domain.set_radius(&self.queue, radius);
        self.reset_finished();
        debug!("Radius set to {}", self.domain.radius());
    }

    /// Sets the sub-steps per frame (at least one).
    pub fn set_speed(&mut self, speed: u32) {
        self.speed = speed.max(1);
    }

    /// Current simulation parameters.
    #[must_use]
    pub const fn parameters(&self) -> &SimulationParameters {
        self.freezing.parameters()
    }

    /// Current radius.
    #[must_use]
    pub const fn radius(&self) -> u32 {
        self.domain.radius()
    }

    /// Current speed.
    #[must_use]
    pub const fn speed(&self) -> u32 {
        self.speed
    }

    /// Visual frames executed so far.
    #[must_use]
    pub const fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Surface size as `(width, height)`.
    #[must_use]
    pub const fn surface_size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    /// Whether the device supports pass timing.
    #[must_use]
    pub fn can_timestamp(&self) -> bool {
        self.present.timer().can_timestamp()
    }

    /// Latest averaged pass durations.
    #[must_use]
    pub fn stage_timings(&self) -> StageTimings {
        StageTimings {
            diffusion: self.diffusion.timer().average(),
            freezing: self.freezing.timer().average(),
            raster: self.raster.timer().average(),
            present: self.present.timer().average(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = RendererSettings::default();
        assert_eq!(settings.speed, 1);
        assert_eq!(settings.radius, DEFAULT_RADIUS);
        assert!(settings.vsync);
        assert!(settings.programs.is_none());
        assert!(settings.timing.frame_time.is_none());
    }

    #[test]
    fn test_stage_timings_start_empty() {
        let timings = StageTimings::default();
        assert!(timings.present.is_none());
        assert!(timings.diffusion.is_none());
    }
}
