//! Frame timing sinks.
//!
//! The present pass timer reports a rolling-average duration. That duration
//! is turned into a frame-time string and an FPS string and handed to
//! caller-supplied sinks (a window title, a log line, a HUD).

use std::fmt;
use std::time::Duration;

/// How a timing value is turned into text.
pub enum DisplayFormat {
    /// Fixed number of decimals
    Fixed(usize),
    /// Caller-supplied formatter
    Custom(Box<dyn Fn(f64) -> String + Send>),
}

impl Default for DisplayFormat {
    fn default() -> Self {
        Self::Fixed(2)
    }
}

impl fmt::Debug for DisplayFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(decimals) => f.debug_tuple("Fixed").field(decimals).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl DisplayFormat {
    /// Formats a value.
    #[must_use]
    pub fn format(&self, value: f64) -> String {
        match self {
            Self::Fixed(decimals) => format!("{value:.decimals$}"),
            Self::Custom(formatter) => formatter(value),
        }
    }
}

/// Destination for one formatted timing value.
pub struct TimingSink {
    /// Formatter applied before the value reaches the sink
    pub format: DisplayFormat,
    sink: Box<dyn FnMut(String) + Send>,
}

impl TimingSink {
    /// Creates a sink with the default format.
    pub fn new(sink: impl FnMut(String) + Send + 'static) -> Self {
        Self {
            format: DisplayFormat::default(),
            sink: Box::new(sink),
        }
    }

    /// Replaces the format.
    #[must_use]
    pub fn with_format(mut self, format: DisplayFormat) -> Self {
        self.format = format;
        self
    }

    fn emit(&mut self, text: String) {
        (self.sink)(text);
    }
}

impl fmt::Debug for TimingSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimingSink")
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

/// Sinks that receive frame timing. Either may be absent.
#[derive(Debug, Default)]
pub struct TimingSettings {
    /// Receives the frame time with its unit
    pub frame_time: Option<TimingSink>,
    /// Receives frames per second
    pub fps: Option<TimingSink>,
}

impl TimingSettings {
    /// Pushes one averaged frame duration to every sink.
    pub fn publish(&mut self, frame: Duration) {
        if let Some(sink) = &mut self.frame_time {
            let text = frame_time_text(frame, &sink.format);
            sink.emit(text);
        }
        if let Some(sink) = &mut self.fps {
            if let Some(fps) = fps_value(frame) {
                let text = sink.format.format(fps);
                sink.emit(text);
            }
        }
    }
}

/// Frame time in µs when at most one millisecond, otherwise in ms.
#[must_use]
pub fn frame_time_text(frame: Duration, format: &DisplayFormat) -> String {
    let seconds = frame.as_secs_f64();
    if seconds <= 1e-3 {
        format!("{}µs", format.format(seconds * 1e6))
    } else {
        format!("{}ms", format.format(seconds * 1e3))
    }
}

/// Frames per second for a frame duration; `None` for a zero duration.
#[must_use]
pub fn fps_value(frame: Duration) -> Option<f64> {
    let seconds = frame.as_secs_f64();
    (seconds > 0.0).then(|| 1.0 / seconds)
}
