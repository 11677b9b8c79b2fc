//! Application lifecycle management.
//!
//! Owns the window, the orchestrator and the frame loop, and routes winit
//! events between them.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tracing::{debug, error, info, warn};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

use rime_common::{HexLayout, MissingResourceError};
use rime_kernel::{Orchestrator, RendererSettings, TimingSettings};

use crate::config::{RimeConfig, MAX_SPEED};
use crate::frame_loop::{
    FrameData, FrameId, FrameLoop, FrameScheduler, LoopCallback, LoopSettings,
};
use crate::input::{step_u32, Action, InputHandler};
use crate::title::{title_sinks, SharedTitle, APP_TITLE};

/// Schedules frames by asking the window for a redraw.
///
/// A redraw request cannot be withdrawn; a cancelled frame still arrives and
/// is ignored by the stopped loop.
struct RedrawScheduler {
    window: Arc<Window>,
    next_id: FrameId,
}

impl RedrawScheduler {
    fn new(window: Arc<Window>) -> Self {
        Self { window, next_id: 0 }
    }
}

impl FrameScheduler for RedrawScheduler {
    fn request_frame(&mut self) -> FrameId {
        self.next_id += 1;
        self.window.request_redraw();
        self.next_id
    }

    fn cancel_frame(&mut self, id: FrameId) {
        debug!("Frame {id} cancelled");
    }
}

/// Crystal operations driven by the frame loop.
trait Simulation {
    /// Re-seeds the crystal.
    fn reseed(&mut self);

    /// Draws the current state without advancing it.
    fn redraw(&mut self) -> Result<()>;

    /// Advances and draws one visual frame.
    fn advance(&mut self) -> Result<()>;
}

impl Simulation for Orchestrator {
    fn reseed(&mut self) {
        self.restart();
    }

    fn redraw(&mut self) -> Result<()> {
        Ok(Orchestrator::redraw(self)?)
    }

    fn advance(&mut self) -> Result<()> {
        Ok(self.render()?)
    }
}

/// Builds a stopped loop that draws on start and advances on every tick.
///
/// Starting draws the current state only, so a resumed loop continues the
/// crystal; [`restart_simulation`] is the one path that re-seeds.
fn simulation_loop<S: Simulation + 'static>(
    settings: LoopSettings,
    scheduler: Box<dyn FrameScheduler>,
) -> FrameLoop<S> {
    let mut frame_loop = FrameLoop::new(settings, scheduler);
    frame_loop.add_callback(LoopCallback::OnStart(Box::new(|sim: &mut S| sim.redraw())));
    frame_loop.add_callback(LoopCallback::OnTick(Box::new(
        |sim: &mut S, _frame: FrameData| sim.advance(),
    )));
    frame_loop
}

/// Re-seeds the crystal and restarts the loop from a zero clock.
fn restart_simulation<S: Simulation>(frame_loop: &mut FrameLoop<S>, sim: &mut S) -> Result<()> {
    sim.reseed();
    frame_loop.restart(sim)
}

/// Application state machine.
struct RimeApp {
    /// Simulator configuration
    config: RimeConfig,
    /// Window handle (created after resume)
    window: Option<Arc<Window>>,
    /// Orchestrator (initialized after window creation)
    orchestrator: Option<Orchestrator>,
    /// Frame loop driving the orchestrator
    frame_loop: Option<FrameLoop<Orchestrator>>,
    /// Keyboard and cursor input
    input: InputHandler,
    /// Values shown in the window title
    title: SharedTitle,
    /// Last title written to the window
    shown_title: String,
}

impl RimeApp {
    /// Creates a new application instance.
    fn new(config: RimeConfig) -> Self {
        Self {
            config,
            window: None,
            orchestrator: None,
            frame_loop: None,
            input: InputHandler::new(),
            title: SharedTitle::default(),
            shown_title: APP_TITLE.to_string(),
        }
    }

    fn window(&self) -> Result<&Arc<Window>, MissingResourceError> {
        self.window
            .as_ref()
            .ok_or_else(|| MissingResourceError("window".to_string()))
    }

    /// Builds the orchestrator and frame loop for a freshly created window.
    fn initialise(&mut self, window: Arc<Window>) -> Result<()> {
        let size = window.inner_size();
        let timing = if self.config.show_timing {
            title_sinks(&self.title, self.config.timing_decimals)
        } else {
            TimingSettings::default()
        };

        let settings = RendererSettings {
            timing,
            speed: self.config.speed,
            radius: self.config.radius,
            parameters: self.config.parameters(),
            gpu_validation: self.config.gpu_validation,
            vsync: self.config.vsync,
            programs: None,
        };
        let mut orchestrator = pollster::block_on(Orchestrator::new(
            Arc::clone(&window),
            size.width,
            size.height,
            settings,
        ))?;

        if !orchestrator.can_timestamp() {
            info!("Timestamp queries unavailable, frame timing disabled");
        }

        let mut frame_loop: FrameLoop<Orchestrator> = simulation_loop(
            LoopSettings {
                wormhole_threshold: self.config.wormhole_threshold(),
            },
            Box::new(RedrawScheduler::new(Arc::clone(&window))),
        );
        restart_simulation(&mut frame_loop, &mut orchestrator)?;

        self.window = Some(window);
        self.orchestrator = Some(orchestrator);
        self.frame_loop = Some(frame_loop);
        Ok(())
    }

    /// Applies pending input, then ticks the loop or redraws a paused frame.
    fn frame(&mut self) -> Result<()> {
        let (Some(orchestrator), Some(frame_loop)) =
            (self.orchestrator.as_mut(), self.frame_loop.as_mut())
        else {
            return Ok(());
        };

        for action in self.input.drain_actions() {
            apply_action(action, orchestrator, frame_loop)?;
        }

        if frame_loop.is_running() {
            frame_loop.tick(orchestrator, Instant::now())?;
        } else {
            orchestrator.redraw()?;
            orchestrator.poll();
        }

        self.title.lock().paused = !frame_loop.is_running();
        self.refresh_title()?;
        Ok(())
    }

    /// Resolves the hex under the cursor, if it lies inside the domain.
    fn update_hovered(&self) {
        let Some(orchestrator) = &self.orchestrator else {
            return;
        };
        let hovered = self.input.cursor_position().and_then(|cursor| {
            let (width, height) = orchestrator.surface_size();
            let layout = HexLayout::fit(width, height, orchestrator.radius());
            let cell = layout.pixel_to_axial(cursor);
            (cell.ring() <= orchestrator.radius()).then_some(cell)
        });
        self.title.lock().hovered = hovered;
    }

    fn refresh_title(&mut self) -> Result<()> {
        let title = self.title.lock().render();
        if title != self.shown_title {
            self.window()?.set_title(&title);
            self.shown_title = title;
        }
        Ok(())
    }

    /// Writes the configuration. Simulation settings keep their loaded
    /// values; only the window size changes during a session.
    fn save_config(&self) {
        if let Some(orchestrator) = &self.orchestrator {
            info!("Session ran {} frames", orchestrator.frame_count());
            debug!("Stage timings: {:?}", orchestrator.stage_timings());
        }
        if let Err(e) = self.config.save() {
            warn!("Failed to save config: {e}");
        }
    }

    fn request_redraw(&self) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

/// Applies one input action.
fn apply_action(
    action: Action,
    orchestrator: &mut Orchestrator,
    frame_loop: &mut FrameLoop<Orchestrator>,
) -> Result<()> {
    match action {
        Action::ToggleLoop => {
            frame_loop.toggle(orchestrator)?;
            if frame_loop.is_running() {
                info!("Simulation resumed");
            } else {
                info!(
                    "Simulation paused after {:?} (frame {})",
                    frame_loop.total_time(),
                    orchestrator.frame_count()
                );
            }
        },
        Action::Restart => restart_simulation(frame_loop, orchestrator)?,
        Action::Radius(delta) => {
            orchestrator.set_radius(step_u32(orchestrator.radius(), delta));
            info!("Radius: {}", orchestrator.radius());
        },
        Action::Speed(delta) => {
            orchestrator.set_speed(step_u32(orchestrator.speed(), delta).min(MAX_SPEED));
            info!("Speed: {}", orchestrator.speed());
        },
        Action::GammaCurve(delta) => {
            orchestrator.set_gamma_normalised(orchestrator.gamma_normalised() + delta);
            info!("Gamma: {:.5}", orchestrator.parameters().gamma());
        },
        Action::Alpha(delta) => {
            orchestrator.set_alpha(orchestrator.parameters().alpha() + delta);
            info!("Alpha: {:.3}", orchestrator.parameters().alpha());
        },
        Action::Beta(delta) => {
            orchestrator.set_beta(orchestrator.parameters().beta() + delta);
            info!("Beta: {:.3}", orchestrator.parameters().beta());
        },
    }
    Ok(())
}

impl ApplicationHandler for RimeApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        info!("Application resumed, creating window...");

        let window_attrs = Window::default_attributes()
            .with_title(APP_TITLE)
            .with_inner_size(PhysicalSize::new(
                self.config.window_width,
                self.config.window_height,
            ));

        match event_loop.create_window(window_attrs) {
            Ok(window) => {
                info!("Window created successfully");
                if let Err(e) = self.initialise(Arc::new(window)) {
                    error!("Failed to initialize simulator: {e:#}");
                    event_loop.exit();
                }
            },
            Err(e) => {
                warn!("Failed to create window: {e}");
                event_loop.exit();
            },
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        if self.input.handle_event(&event) {
            match event {
                WindowEvent::KeyboardInput { .. } => self.request_redraw(),
                WindowEvent::CursorMoved { .. } | WindowEvent::CursorLeft { .. } => {
                    self.update_hovered();
                    if let Err(e) = self.refresh_title() {
                        debug!("Title not updated: {e}");
                    }
                },
                _ => {},
            }
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down...");
                self.save_config();
                event_loop.exit();
            },
            WindowEvent::Resized(new_size) => {
                if let Some(orchestrator) = &mut self.orchestrator {
                    if let Err(e) = orchestrator.resize(new_size.width, new_size.height) {
                        error!("Resize failed: {e}");
                        event_loop.exit();
                        return;
                    }
                }
                self.config.remember_window(new_size.width, new_size.height);
                self.update_hovered();
            },
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.frame() {
                    error!("Frame failed: {e:#}");
                    self.save_config();
                    event_loop.exit();
                }
            },
            _ => {},
        }
    }
}

/// Runs the main application loop.
pub fn run() -> Result<()> {
    // Load configuration
    let mut config = RimeConfig::load();
    config.validate();

    info!("Configuration loaded:");
    info!("  Window: {}x{}", config.window_width, config.window_height);
    info!("  VSync: {}", config.vsync);
    info!("  Radius: {}, speed: {}", config.radius, config.speed);

    info!("Creating event loop...");
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = RimeApp::new(config);

    info!("Starting event loop...");
    event_loop.run_app(&mut app)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Crystal {
        reseeds: u32,
        redraws: u32,
        advances: u32,
    }

    impl Simulation for Crystal {
        fn reseed(&mut self) {
            self.reseeds += 1;
        }

        fn redraw(&mut self) -> Result<()> {
            self.redraws += 1;
            Ok(())
        }

        fn advance(&mut self) -> Result<()> {
            self.advances += 1;
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingScheduler(FrameId);

    impl FrameScheduler for CountingScheduler {
        fn request_frame(&mut self) -> FrameId {
            self.0 += 1;
            self.0
        }

        fn cancel_frame(&mut self, _id: FrameId) {}
    }

    fn crystal_loop() -> FrameLoop<Crystal> {
        simulation_loop(LoopSettings::default(), Box::new(CountingScheduler::default()))
    }

    #[test]
    fn test_startup_reseeds_then_draws() {
        let mut frame_loop = crystal_loop();
        let mut crystal = Crystal::default();

        restart_simulation(&mut frame_loop, &mut crystal).expect("restart");

        assert!(frame_loop.is_running());
        assert_eq!(crystal.reseeds, 1);
        assert_eq!(crystal.redraws, 1);
        assert_eq!(crystal.advances, 0);

        frame_loop.tick(&mut crystal, Instant::now()).expect("tick");
        assert_eq!(crystal.advances, 1);
    }

    #[test]
    fn test_resume_does_not_reseed() {
        let mut frame_loop = crystal_loop();
        let mut crystal = Crystal::default();
        restart_simulation(&mut frame_loop, &mut crystal).expect("restart");

        frame_loop.toggle(&mut crystal).expect("pause");
        frame_loop.toggle(&mut crystal).expect("resume");

        assert!(frame_loop.is_running());
        assert_eq!(crystal.reseeds, 1);
        assert_eq!(crystal.redraws, 2);
    }

    #[test]
    fn test_restart_reseeds_a_running_loop() {
        let mut frame_loop = crystal_loop();
        let mut crystal = Crystal::default();
        restart_simulation(&mut frame_loop, &mut crystal).expect("restart");
        frame_loop.tick(&mut crystal, Instant::now()).expect("tick");

        restart_simulation(&mut frame_loop, &mut crystal).expect("restart");

        assert!(frame_loop.is_running());
        assert_eq!(crystal.reseeds, 2);
        assert_eq!(frame_loop.total_time(), std::time::Duration::ZERO);
    }
}
