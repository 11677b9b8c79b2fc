//! GPU pass timer.
//!
//! Wraps one compute or render pass with a pair of timestamp queries and
//! reads the elapsed device time back without stalling submission:
//!
//! 1. `begin_compute` / `begin_render` hand out the timestamp writes for the
//!    pass descriptor (or `None` while a previous read-back is in flight)
//! 2. `end` resolves the queries into a mappable buffer
//! 3. `submitted` starts the asynchronous map once the encoder is submitted
//! 4. `poll` consumes a completed map, updates the rolling average and
//!    notifies the observer
//!
//! Adapters without `TIMESTAMP_QUERY` get a pass-through timer that never
//! reports.

use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use tracing::{debug, warn};
use wgpu::{BufferAsyncError, Device, Queue};

/// Samples covered by the rolling average.
pub const ROLLING_AVERAGE_WINDOW: u32 = 50;

/// Byte length of the two resolved `u64` timestamps.
const TIMESTAMP_BYTES: u64 = 16;

/// Exponentially-windowed mean over recent samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RollingAverage {
    window: u32,
    samples: u32,
    average: f64,
}

impl Default for RollingAverage {
    fn default() -> Self {
        Self::new(ROLLING_AVERAGE_WINDOW)
    }
}

impl RollingAverage {
    /// Creates an empty average over `window` samples (at least one).
    #[must_use]
    pub fn new(window: u32) -> Self {
        Self {
            window: window.max(1),
            samples: 0,
            average: 0.0,
        }
    }

    /// Adds a sample and returns the new average.
    pub fn push(&mut self, sample: f64) -> f64 {
        self.samples = (self.samples + 1).min(self.window);
        self.average += (sample - self.average) / f64::from(self.samples);
        self.average
    }

    /// Current average; zero before the first sample.
    #[must_use]
    pub const fn value(&self) -> f64 {
        self.average
    }

    /// Number of samples currently weighted.
    #[must_use]
    pub const fn samples(&self) -> u32 {
        self.samples
    }

    /// Forgets every sample.
    pub fn reset(&mut self) {
        self.samples = 0;
        self.average = 0.0;
    }
}

/// Converts a pair of raw timestamps into a duration.
///
/// `period` is the queue's nanoseconds per tick. Out-of-order stamps yield
/// zero.
#[must_use]
pub fn ticks_to_duration(start: u64, end: u64, period: f32) -> Duration {
    let nanos = end.saturating_sub(start) as f64 * f64::from(period);
    Duration::from_nanos(nanos.round() as u64)
}

/// Read-back progress of a timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerState {
    /// Ready to arm for the next pass
    Idle,
    /// Timestamp writes were handed out for a pass being recorded
    Armed,
    /// Waiting on the result buffer map
    Mapping,
}

/// Query resources of a timestamp-capable timer.
struct TimerQueries {
    query_set: wgpu::QuerySet,
    resolve_buffer: wgpu::Buffer,
    result_buffer: wgpu::Buffer,
    sender: Sender<Result<(), BufferAsyncError>>,
    receiver: Receiver<Result<(), BufferAsyncError>>,
}

/// Callback invoked with the rolling-average pass duration.
pub type TimerObserver = Box<dyn FnMut(Duration) + Send>;

/// Measures the device-side duration of one pass.
pub struct PassTimer {
    label: String,
    queries: Option<TimerQueries>,
    state: TimerState,
    period: f32,
    average: RollingAverage,
    observer: Option<TimerObserver>,
}

impl PassTimer {
    /// Creates a timer for the pass named `label`.
    pub fn new(device: &Device, queue: &Queue, label: &str) -> Self {
        let queries = device
            .features()
            .contains(wgpu::Features::TIMESTAMP_QUERY)
            .then(|| {
                let query_set = device.create_query_set(&wgpu::QuerySetDescriptor {
                    label: Some(&format!("{label} Timestamps")),
                    ty: wgpu::QueryType::Timestamp,
                    count: 2,
                });
                let resolve_buffer = device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(&format!("{label} Timestamp Resolve")),
                    size: TIMESTAMP_BYTES,
                    usage: wgpu::BufferUsages::QUERY_RESOLVE | wgpu::BufferUsages::COPY_SRC,
                    mapped_at_creation: false,
                });
                let result_buffer = device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(&format!("{label} Timestamp Result")),
                    size: TIMESTAMP_BYTES,
                    usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                });
                let (sender, receiver) = crossbeam_channel::bounded(1);
                TimerQueries {
                    query_set,
                    resolve_buffer,
                    result_buffer,
                    sender,
                    receiver,
                }
            });

        if queries.is_none() {
            debug!("{label}: timestamp queries unavailable, timer is pass-through");
        }

        Self {
            label: label.to_string(),
            queries,
            state: TimerState::Idle,
            period: queue.get_timestamp_period(),
            average: RollingAverage::default(),
            observer: None,
        }
    }

    /// Whether this timer can measure anything.
    #[must_use]
    pub const fn can_timestamp(&self) -> bool {
        self.queries.is_some()
    }

    /// Rolling-average duration, `None` before the first sample.
    #[must_use]
    pub fn average(&self) -> Option<Duration> {
        (self.average.samples() > 0).then(|| Duration::from_secs_f64(self.average.value()))
    }

    /// Installs the callback fed with every new average.
    pub fn set_observer(&mut self, observer: impl FnMut(Duration) + Send + 'static) {
        self.observer = Some(Box::new(observer));
    }

    fn arm(&mut self) -> Option<&wgpu::QuerySet> {
        if self.state != TimerState::Idle {
            return None;
        }
        let queries = self.queries.as_ref()?;
        self.state = TimerState::Armed;
        Some(&queries.query_set)
    }

    /// Timestamp writes for a compute pass descriptor.
    pub fn begin_compute(&mut self) -> Option<wgpu::ComputePassTimestampWrites<'_>> {
        self.arm().map(|query_set| wgpu::ComputePassTimestampWrites {
            query_set,
            beginning_of_pass_write_index: Some(0),
            end_of_pass_write_index: Some(1),
        })
    }

    /// Timestamp writes for a render pass descriptor.
    pub fn begin_render(&mut self) -> Option<wgpu::RenderPassTimestampWrites<'_>> {
        self.arm().map(|query_set| wgpu::RenderPassTimestampWrites {
            query_set,
            beginning_of_pass_write_index: Some(0),
            end_of_pass_write_index: Some(1),
        })
    }

    /// Resolves the queries of an armed timer. Call after the pass ends.
    pub fn end(&self, encoder: &mut wgpu::CommandEncoder) {
        let (TimerState::Armed, Some(queries)) = (self.state, &self.queries) else {
            return;
        };
        encoder.resolve_query_set(&queries.query_set, 0..2, &queries.resolve_buffer, 0);
        encoder.copy_buffer_to_buffer(
            &queries.resolve_buffer,
            0,
            &queries.result_buffer,
            0,
            TIMESTAMP_BYTES,
        );
    }

    /// Starts the result map. Call after the encoder has been submitted.
    pub fn submitted(&mut self) {
        let (TimerState::Armed, Some(queries)) = (self.state, &self.queries) else {
            return;
        };
        let sender = queries.sender.clone();
        queries
            .result_buffer
            .slice(..)
            .map_async(wgpu::MapMode::Read, move |result| {
                let _ = sender.try_send(result);
            });
        self.state = TimerState::Mapping;
    }

    /// Consumes a completed map without blocking.
    ///
    /// Returns the new rolling average when a sample resolved.
    pub fn poll(&mut self) -> Option<Duration> {
        if self.state != TimerState::Mapping {
            return None;
        }
        let queries = self.queries.as_ref()?;

        let sample = match queries.receiver.try_recv() {
            Ok(Ok(())) => {
                let (start, end) = {
                    let data = queries.result_buffer.slice(..).get_mapped_range();
                    let stamps: &[u64] = bytemuck::cast_slice(&data);
                    (stamps[0], stamps[1])
                };
                queries.result_buffer.unmap();
                ticks_to_duration(start, end, self.period)
            }
            Ok(Err(err)) => {
                warn!("{}: timestamp read-back failed: {err}", self.label);
                self.state = TimerState::Idle;
                return None;
            }
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => {
                self.state = TimerState::Idle;
                return None;
            }
        };

        self.state = TimerState::Idle;
        let average = Duration::from_secs_f64(self.average.push(sample.as_secs_f64()));
        debug!("{}: {:?} (avg {:?})", self.label, sample, average);
        if let Some(observer) = &mut self.observer {
            observer(average);
        }
        Some(average)
    }

    /// Clears the rolling average.
    pub fn reset(&mut self) {
        self.average.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rolling_average_warms_up() {
        let mut avg = RollingAverage::new(50);
        assert_eq!(avg.push(10.0), 10.0);
        assert_eq!(avg.push(20.0), 15.0);
        assert_eq!(avg.push(30.0), 20.0);
        assert_eq!(avg.samples(), 3);
    }

    #[test]
    fn test_rolling_average_window_caps_weight() {
        let mut avg = RollingAverage::new(4);
        for _ in 0..10 {
            avg.push(1.0);
        }
        assert_eq!(avg.samples(), 4);
        // New sample carries a quarter of the weight
        assert!((avg.push(5.0) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_rolling_average_reset() {
        let mut avg = RollingAverage::default();
        avg.push(3.0);
        avg.reset();
        assert_eq!(avg.samples(), 0);
        assert_eq!(avg.value(), 0.0);
        assert_eq!(avg.push(7.0), 7.0);
    }

    #[test]
    fn test_ticks_to_duration() {
        assert_eq!(ticks_to_duration(100, 1100, 1.0), Duration::from_micros(1));
        assert_eq!(ticks_to_duration(0, 1000, 2.5), Duration::from_nanos(2500));
        assert_eq!(ticks_to_duration(500, 100, 1.0), Duration::ZERO);
    }
}
