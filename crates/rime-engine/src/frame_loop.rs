//! Frame loop.
//!
//! Schedules repeated ticks through a [`FrameScheduler`], tracks elapsed
//! time and drops anomalously long gaps (a suspended window, a debugger
//! break) instead of feeding them to the simulation.

use std::time::{Duration, Instant};

use anyhow::Result;
use tracing::debug;

/// Handle of a scheduled frame.
pub type FrameId = u64;

/// Default gap at or above which a tick is discarded.
pub const DEFAULT_WORMHOLE_THRESHOLD: Duration = Duration::from_millis(500);

/// Platform hook that delivers the next tick.
pub trait FrameScheduler {
    /// Requests one more tick and returns its handle.
    fn request_frame(&mut self) -> FrameId;

    /// Withdraws a pending request.
    fn cancel_frame(&mut self, id: FrameId);
}

/// Loop settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSettings {
    /// Ticks arriving this long or longer after the previous one are skipped
    pub wormhole_threshold: Duration,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            wormhole_threshold: DEFAULT_WORMHOLE_THRESHOLD,
        }
    }
}

/// Timing handed to tick callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameData {
    /// Time since the previous tick
    pub delta_time: Duration,
    /// Accumulated time since start, including this tick
    pub total_time: Duration,
}

/// Callback run once per start.
pub type StartCallback<C> = Box<dyn FnMut(&mut C) -> Result<()>>;

/// Callback run once per accepted tick.
pub type TickCallback<C> = Box<dyn FnMut(&mut C, FrameData) -> Result<()>>;

/// A registered loop callback.
pub enum LoopCallback<C> {
    /// Runs on every `start`
    OnStart(StartCallback<C>),
    /// Runs on every tick below the wormhole threshold
    OnTick(TickCallback<C>),
}

/// Tick scheduler over a context `C` shared with the callbacks.
pub struct FrameLoop<C> {
    settings: LoopSettings,
    scheduler: Box<dyn FrameScheduler>,
    on_start: Vec<StartCallback<C>>,
    on_tick: Vec<TickCallback<C>>,
    pending: Option<FrameId>,
    last_tick: Option<Instant>,
    total_time: Duration,
}

impl<C> FrameLoop<C> {
    /// Creates a stopped loop.
    pub fn new(settings: LoopSettings, scheduler: Box<dyn FrameScheduler>) -> Self {
        Self {
            settings,
            scheduler,
            on_start: Vec::new(),
            on_tick: Vec::new(),
            pending: None,
            last_tick: None,
            total_time: Duration::ZERO,
        }
    }

    /// Whether a tick is scheduled.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.pending.is_some()
    }

    /// Accumulated time of accepted ticks since the last start.
    #[must_use]
    pub const fn total_time(&self) -> Duration {
        self.total_time
    }

    /// Registers a callback.
    pub fn add_callback(&mut self, callback: LoopCallback<C>) {
        match callback {
            LoopCallback::OnStart(callback) => self.on_start.push(callback),
            LoopCallback::OnTick(callback) => self.on_tick.push(callback),
        }
    }

    /// Resets the clock, runs the start callbacks and schedules a tick.
    ///
    /// Does nothing while running.
    pub fn start(&mut self, ctx: &mut C) -> Result<()> {
        if self.is_running() {
            return Ok(());
        }

        self.total_time = Duration::ZERO;
        self.last_tick = None;

        for callback in &mut self.on_start {
            callback(ctx)?;
        }

        self.pending = Some(self.scheduler.request_frame());
        debug!("Frame loop started");
        Ok(())
    }

    /// Cancels the pending tick. Does nothing while stopped.
    pub fn stop(&mut self) {
        if let Some(id) = self.pending.take() {
            self.scheduler.cancel_frame(id);
            debug!("Frame loop stopped");
        }
    }

    /// Starts a stopped loop or stops a running one.
    pub fn toggle(&mut self, ctx: &mut C) -> Result<()> {
        if self.is_running() {
            self.stop();
            Ok(())
        } else {
            self.start(ctx)
        }
    }

    /// Stops if running, then starts.
    pub fn restart(&mut self, ctx: &mut C) -> Result<()> {
        self.stop();
        self.start(ctx)
    }

    /// Delivers a tick observed at `now`.
    ///
    /// The first tick after a start becomes the time baseline. A gap at or
    /// above the wormhole threshold skips the callbacks; either way the
    /// baseline moves to `now` and the next tick is scheduled. Ticks arriving
    /// while stopped are ignored.
    pub fn tick(&mut self, ctx: &mut C, now: Instant) -> Result<()> {
        if !self.is_running() {
            return Ok(());
        }

        let last = *self.last_tick.get_or_insert(now);
        let delta_time = now.saturating_duration_since(last);

        if delta_time < self.settings.wormhole_threshold {
            let total_time = self.total_time + delta_time;
            let frame = FrameData {
                delta_time,
                total_time,
            };
            self.last_tick = Some(now);
            self.pending = Some(self.scheduler.request_frame());
            for callback in &mut self.on_tick {
                callback(ctx, frame)?;
            }
            self.total_time = total_time;
        } else {
            debug!("Skipping tick after {delta_time:?} gap");
            self.last_tick = Some(now);
            self.pending = Some(self.scheduler.request_frame());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Debug, Default)]
    struct SchedulerLog {
        requested: u64,
        cancelled: Vec<FrameId>,
    }

    struct RecordingScheduler(Arc<Mutex<SchedulerLog>>);

    impl FrameScheduler for RecordingScheduler {
        fn request_frame(&mut self) -> FrameId {
            let mut log = self.0.lock();
            log.requested += 1;
            log.requested
        }

        fn cancel_frame(&mut self, id: FrameId) {
            self.0.lock().cancelled.push(id);
        }
    }

    #[derive(Debug, Default)]
    struct Counters {
        starts: u32,
        ticks: Vec<FrameData>,
    }

    fn frame_loop() -> (FrameLoop<Counters>, Arc<Mutex<SchedulerLog>>) {
        let log = Arc::new(Mutex::new(SchedulerLog::default()));
        let mut frame_loop: FrameLoop<Counters> = FrameLoop::new(
            LoopSettings::default(),
            Box::new(RecordingScheduler(Arc::clone(&log))),
        );
        frame_loop.add_callback(LoopCallback::OnStart(Box::new(|c: &mut Counters| {
            c.starts += 1;
            Ok(())
        })));
        frame_loop.add_callback(LoopCallback::OnTick(Box::new(
            |c: &mut Counters, frame: FrameData| {
                c.ticks.push(frame);
                Ok(())
            },
        )));
        (frame_loop, log)
    }

    #[test]
    fn test_start_runs_start_callbacks_once() {
        let (mut frame_loop, log) = frame_loop();
        let mut counters = Counters::default();

        frame_loop.start(&mut counters).expect("start");
        frame_loop.start(&mut counters).expect("start");

        assert!(frame_loop.is_running());
        assert_eq!(counters.starts, 1);
        assert_eq!(log.lock().requested, 1);
    }

    #[test]
    fn test_ticks_accumulate_time() {
        let (mut frame_loop, _log) = frame_loop();
        let mut counters = Counters::default();
        let t0 = Instant::now();

        frame_loop.start(&mut counters).expect("start");
        frame_loop.tick(&mut counters, t0).expect("tick");
        frame_loop
            .tick(&mut counters, t0 + Duration::from_millis(16))
            .expect("tick");
        frame_loop
            .tick(&mut counters, t0 + Duration::from_millis(33))
            .expect("tick");

        assert_eq!(counters.ticks.len(), 3);
        assert_eq!(counters.ticks[0].delta_time, Duration::ZERO);
        assert_eq!(counters.ticks[2].delta_time, Duration::from_millis(17));
        assert_eq!(counters.ticks[2].total_time, Duration::from_millis(33));
        assert_eq!(frame_loop.total_time(), Duration::from_millis(33));
    }

    #[test]
    fn test_wormhole_tick_is_skipped_but_rescheduled() {
        let (mut frame_loop, log) = frame_loop();
        let mut counters = Counters::default();
        let t0 = Instant::now();

        frame_loop.start(&mut counters).expect("start");
        frame_loop.tick(&mut counters, t0).expect("tick");
        let requested_before = log.lock().requested;

        let gap = t0 + Duration::from_millis(750);
        frame_loop.tick(&mut counters, gap).expect("tick");

        assert_eq!(counters.ticks.len(), 1);
        assert_eq!(log.lock().requested, requested_before + 1);
        assert!(frame_loop.is_running());

        // The skipped tick still moved the baseline
        frame_loop
            .tick(&mut counters, gap + Duration::from_millis(10))
            .expect("tick");
        assert_eq!(counters.ticks.len(), 2);
        assert_eq!(counters.ticks[1].delta_time, Duration::from_millis(10));
        assert_eq!(counters.ticks[1].total_time, Duration::from_millis(10));
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let (mut frame_loop, _log) = frame_loop();
        let mut counters = Counters::default();
        let t0 = Instant::now();

        frame_loop.start(&mut counters).expect("start");
        frame_loop.tick(&mut counters, t0).expect("tick");
        frame_loop
            .tick(&mut counters, t0 + DEFAULT_WORMHOLE_THRESHOLD)
            .expect("tick");
        assert_eq!(counters.ticks.len(), 1);
    }

    #[test]
    fn test_stop_cancels_and_ignores_ticks() {
        let (mut frame_loop, log) = frame_loop();
        let mut counters = Counters::default();

        frame_loop.start(&mut counters).expect("start");
        frame_loop.stop();
        frame_loop.stop();

        assert!(!frame_loop.is_running());
        assert_eq!(log.lock().cancelled, vec![1]);

        frame_loop.tick(&mut counters, Instant::now()).expect("tick");
        assert!(counters.ticks.is_empty());
    }

    #[test]
    fn test_toggle_and_restart() {
        let (mut frame_loop, _log) = frame_loop();
        let mut counters = Counters::default();

        frame_loop.toggle(&mut counters).expect("toggle");
        assert!(frame_loop.is_running());
        frame_loop.toggle(&mut counters).expect("toggle");
        assert!(!frame_loop.is_running());

        frame_loop.restart(&mut counters).expect("restart");
        frame_loop.restart(&mut counters).expect("restart");
        assert!(frame_loop.is_running());
        assert_eq!(counters.starts, 3);
    }

    #[test]
    fn test_resume_discards_old_baseline() {
        let (mut frame_loop, _log) = frame_loop();
        let mut counters = Counters::default();
        let t0 = Instant::now();

        frame_loop.start(&mut counters).expect("start");
        frame_loop.tick(&mut counters, t0).expect("tick");
        frame_loop
            .tick(&mut counters, t0 + Duration::from_millis(20))
            .expect("tick");
        frame_loop.stop();

        frame_loop.start(&mut counters).expect("start");
        frame_loop
            .tick(&mut counters, t0 + Duration::from_millis(300))
            .expect("tick");

        let last = counters.ticks.last().expect("tick recorded");
        assert_eq!(last.delta_time, Duration::ZERO);
        assert_eq!(last.total_time, Duration::ZERO);
    }

    #[test]
    fn test_callback_error_propagates() {
        let log = Arc::new(Mutex::new(SchedulerLog::default()));
        let mut frame_loop: FrameLoop<()> = FrameLoop::new(
            LoopSettings::default(),
            Box::new(RecordingScheduler(Arc::clone(&log))),
        );
        frame_loop.add_callback(LoopCallback::OnTick(Box::new(|_: &mut (), _: FrameData| {
            anyhow::bail!("surface gone")
        })));

        frame_loop.start(&mut ()).expect("start");
        assert!(frame_loop.tick(&mut (), Instant::now()).is_err());
    }
}
