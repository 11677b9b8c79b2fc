//! Window title readout.
//!
//! The timing sinks and the cursor handler write into a shared
//! [`TitleState`]; the app renders it into the window title after each
//! frame.

use std::fmt::Write;
use std::sync::Arc;

use parking_lot::Mutex;
use rime_common::Axial;
use rime_kernel::{DisplayFormat, TimingSettings, TimingSink};

/// Base window title.
pub const APP_TITLE: &str = "Rime";

/// Values shown in the window title.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TitleState {
    /// Formatted frame time, once measured
    pub frame_time: Option<String>,
    /// Formatted frames per second, once measured
    pub fps: Option<String>,
    /// Cell under the cursor
    pub hovered: Option<Axial>,
    /// Whether the frame loop is paused
    pub paused: bool,
}

impl TitleState {
    /// Renders the title text.
    #[must_use]
    pub fn render(&self) -> String {
        let mut title = String::from(APP_TITLE);
        if self.paused {
            title.push_str(" (paused)");
        }
        if let Some(frame_time) = &self.frame_time {
            let _ = write!(title, " | {frame_time}");
        }
        if let Some(fps) = &self.fps {
            let _ = write!(title, " | {fps} fps");
        }
        if let Some(cell) = self.hovered {
            let _ = write!(title, " | q {} r {} ring {}", cell.q, cell.r, cell.ring());
        }
        title
    }
}

/// Shared title state.
pub type SharedTitle = Arc<Mutex<TitleState>>;

/// Timing sinks that write into `title` with `decimals` decimals.
#[must_use]
pub fn title_sinks(title: &SharedTitle, decimals: usize) -> TimingSettings {
    let frame_title = Arc::clone(title);
    let fps_title = Arc::clone(title);

    TimingSettings {
        frame_time: Some(
            TimingSink::new(move |text| frame_title.lock().frame_time = Some(text))
                .with_format(DisplayFormat::Fixed(decimals)),
        ),
        fps: Some(
            TimingSink::new(move |text| fps_title.lock().fps = Some(text))
                .with_format(DisplayFormat::Fixed(decimals)),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_bare_title() {
        assert_eq!(TitleState::default().render(), "Rime");
    }

    #[test]
    fn test_full_title() {
        let state = TitleState {
            frame_time: Some("4.20ms".to_string()),
            fps: Some("238.10".to_string()),
            hovered: Some(Axial::new(2, -3)),
            paused: true,
        };
        assert_eq!(
            state.render(),
            "Rime (paused) | 4.20ms | 238.10 fps | q 2 r -3 ring 3"
        );
    }

    #[test]
    fn test_sinks_write_title() {
        let title = SharedTitle::default();
        let mut timing = title_sinks(&title, 1);

        timing.publish(Duration::from_millis(20));

        let state = title.lock();
        assert_eq!(state.frame_time.as_deref(), Some("20.0ms"));
        assert_eq!(state.fps.as_deref(), Some("50.0"));
    }
}
