//! Input handling for the simulator.
//!
//! Turns winit keyboard and cursor events into [`Action`]s and tracks the
//! cursor for the hovered-cell readout.

use glam::Vec2;
use winit::event::{ElementState, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

/// Radius change per Up/Down press.
pub const RADIUS_STEP: i32 = 5;
/// Speed change per `+`/`-` press.
pub const SPEED_STEP: i32 = 1;
/// Response-curve position change per `[`/`]` press.
pub const GAMMA_CURVE_STEP: f64 = 0.05;
/// Alpha change per A/Z press.
pub const ALPHA_STEP: f32 = 0.1;
/// Beta change per B/V press.
pub const BETA_STEP: f32 = 0.05;

/// A user command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    /// Pause or resume the frame loop
    ToggleLoop,
    /// Re-seed the crystal and restart the loop
    Restart,
    /// Grow or shrink the domain radius
    Radius(i32),
    /// Change simulation sub-steps per frame
    Speed(i32),
    /// Move along the gamma response curve
    GammaCurve(f64),
    /// Change the diffusion gain
    Alpha(f32),
    /// Change the background level
    Beta(f32),
}

impl Action {
    /// Whether holding the key should repeat the action.
    #[must_use]
    pub const fn repeats(self) -> bool {
        !matches!(self, Self::ToggleLoop | Self::Restart)
    }
}

/// Maps a physical key to its action.
#[must_use]
pub fn action_for_key(key: KeyCode) -> Option<Action> {
    Some(match key {
        KeyCode::Space => Action::ToggleLoop,
        KeyCode::KeyR => Action::Restart,
        KeyCode::ArrowUp => Action::Radius(RADIUS_STEP),
        KeyCode::ArrowDown => Action::Radius(-RADIUS_STEP),
        KeyCode::Equal | KeyCode::NumpadAdd => Action::Speed(SPEED_STEP),
        KeyCode::Minus | KeyCode::NumpadSubtract => Action::Speed(-SPEED_STEP),
        KeyCode::BracketRight => Action::GammaCurve(GAMMA_CURVE_STEP),
        KeyCode::BracketLeft => Action::GammaCurve(-GAMMA_CURVE_STEP),
        KeyCode::KeyA => Action::Alpha(ALPHA_STEP),
        KeyCode::KeyZ => Action::Alpha(-ALPHA_STEP),
        KeyCode::KeyB => Action::Beta(BETA_STEP),
        KeyCode::KeyV => Action::Beta(-BETA_STEP),
        _ => return None,
    })
}

/// Applies a signed step to an unsigned setting, saturating at zero.
#[must_use]
pub fn step_u32(value: u32, delta: i32) -> u32 {
    value.saturating_add_signed(delta)
}

/// Collects actions between frames.
#[derive(Debug, Default)]
pub struct InputHandler {
    /// Actions not yet applied
    pending: Vec<Action>,
    /// Cursor position in physical pixels, `None` outside the window
    cursor: Option<Vec2>,
}

impl InputHandler {
    /// Create a new input handler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle a winit window event. Returns true if the event was handled.
    pub fn handle_event(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state != ElementState::Pressed {
                    return false;
                }
                let PhysicalKey::Code(key) = event.physical_key else {
                    return false;
                };
                self.press(key, event.repeat)
            },
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = Some(Vec2::new(position.x as f32, position.y as f32));
                true
            },
            WindowEvent::CursorLeft { .. } => {
                self.cursor = None;
                true
            },
            _ => false,
        }
    }

    /// Records a key press. Returns true if the key is bound.
    pub fn press(&mut self, key: KeyCode, repeat: bool) -> bool {
        match action_for_key(key) {
            Some(action) if !repeat || action.repeats() => {
                self.pending.push(action);
                true
            },
            Some(_) => true,
            None => false,
        }
    }

    /// Takes the actions collected since the last call.
    pub fn drain_actions(&mut self) -> Vec<Action> {
        std::mem::take(&mut self.pending)
    }

    /// Cursor position in physical pixels.
    #[must_use]
    pub const fn cursor_position(&self) -> Option<Vec2> {
        self.cursor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_bindings() {
        assert_eq!(action_for_key(KeyCode::Space), Some(Action::ToggleLoop));
        assert_eq!(action_for_key(KeyCode::KeyR), Some(Action::Restart));
        assert_eq!(action_for_key(KeyCode::ArrowDown), Some(Action::Radius(-5)));
        assert_eq!(action_for_key(KeyCode::NumpadAdd), Some(Action::Speed(1)));
        assert_eq!(
            action_for_key(KeyCode::BracketLeft),
            Some(Action::GammaCurve(-0.05))
        );
        assert_eq!(action_for_key(KeyCode::KeyZ), Some(Action::Alpha(-0.1)));
        assert_eq!(action_for_key(KeyCode::KeyB), Some(Action::Beta(0.05)));
        assert_eq!(action_for_key(KeyCode::KeyQ), None);
    }

    #[test]
    fn test_repeat_skips_one_shot_actions() {
        let mut handler = InputHandler::new();

        assert!(handler.press(KeyCode::Space, true));
        assert!(handler.press(KeyCode::ArrowUp, true));
        assert!(handler.press(KeyCode::KeyR, false));
        assert!(!handler.press(KeyCode::KeyQ, false));

        assert_eq!(
            handler.drain_actions(),
            vec![Action::Radius(5), Action::Restart]
        );
        assert!(handler.drain_actions().is_empty());
    }

    #[test]
    fn test_step_u32_saturates() {
        assert_eq!(step_u32(3, -5), 0);
        assert_eq!(step_u32(50, 5), 55);
        assert_eq!(step_u32(u32::MAX, 1), u32::MAX);
    }

    #[test]
    fn test_cursor_starts_outside() {
        assert!(InputHandler::new().cursor_position().is_none());
    }
}
