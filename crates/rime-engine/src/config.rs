//! Simulator configuration.
//!
//! Window, presentation, simulation and timing settings. Loaded from
//! `rime.toml` in the platform config directory. Only the window size is
//! written back on exit; simulation settings are starting values and never
//! record a session.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use rime_kernel::{SimulationParameters, DEFAULT_ALPHA, DEFAULT_BETA, DEFAULT_GAMMA, DEFAULT_RADIUS, MAX_RADIUS};

/// Configuration file name.
const CONFIG_FILE: &str = "rime.toml";

/// Largest accepted sub-step count per frame.
pub const MAX_SPEED: u32 = 64;

/// Simulator configuration parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RimeConfig {
    // === Window Settings ===
    /// Window width in pixels
    pub window_width: u32,
    /// Window height in pixels
    pub window_height: u32,
    /// Enable VSync
    pub vsync: bool,
    /// Enable GPU validation layers
    pub gpu_validation: bool,

    // === Simulation Settings ===
    /// Domain radius in rings
    pub radius: u32,
    /// Diffusion gain
    pub alpha: f32,
    /// Background vapour level
    pub beta: f32,
    /// Vapour added to receptive cells per step
    pub gamma: f32,
    /// Simulation sub-steps per frame
    pub speed: u32,

    // === Timing Settings ===
    /// Frame gaps at or above this many milliseconds are discarded
    pub wormhole_threshold_ms: u64,
    /// Decimals shown for frame time and FPS
    pub timing_decimals: usize,
    /// Show timing in the window title
    pub show_timing: bool,
}

impl Default for RimeConfig {
    fn default() -> Self {
        Self {
            // Window
            window_width: 1024,
            window_height: 1024,
            vsync: true,
            gpu_validation: cfg!(debug_assertions),

            // Simulation
            radius: DEFAULT_RADIUS,
            alpha: DEFAULT_ALPHA,
            beta: DEFAULT_BETA,
            gamma: DEFAULT_GAMMA,
            speed: 1,

            // Timing
            wormhole_threshold_ms: 500,
            timing_decimals: 2,
            show_timing: true,
        }
    }
}

impl RimeConfig {
    /// Load configuration from the default file location.
    /// Returns default config if file doesn't exist.
    pub fn load() -> Self {
        Self::load_from(Self::config_path())
    }

    /// Load configuration from a specific path.
    /// Returns default config if file doesn't exist or is invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Config file not found, using defaults");
            return Self::default();
        }

        match fs::File::open(path) {
            Ok(mut file) => {
                let mut contents = String::new();
                if let Err(e) = file.read_to_string(&mut contents) {
                    warn!("Failed to read config file: {e}");
                    return Self::default();
                }

                match toml::from_str(&contents) {
                    Ok(config) => {
                        info!("Loaded config from {}", path.display());
                        config
                    },
                    Err(e) => {
                        warn!("Failed to parse config file: {e}");
                        Self::default()
                    },
                }
            },
            Err(e) => {
                warn!("Failed to open config file: {e}");
                Self::default()
            },
        }
    }

    /// Save configuration to the default file location.
    pub fn save(&self) -> io::Result<()> {
        self.save_to(Self::config_path())
    }

    /// Save configuration to a specific path.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let mut file = fs::File::create(path)?;
        file.write_all(contents.as_bytes())?;

        info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Get the default configuration file path.
    fn config_path() -> PathBuf {
        if let Some(config_dir) = dirs_config_path() {
            config_dir.join("rime").join(CONFIG_FILE)
        } else {
            PathBuf::from(CONFIG_FILE)
        }
    }

    /// Validate and clamp configuration values to sensible ranges.
    pub fn validate(&mut self) {
        // Window size
        self.window_width = self.window_width.clamp(320, 7680);
        self.window_height = self.window_height.clamp(240, 4320);

        // Simulation
        self.radius = self.radius.clamp(1, MAX_RADIUS);
        let params = self.parameters();
        self.alpha = params.alpha();
        self.beta = params.beta();
        self.gamma = params.gamma();
        self.speed = self.speed.clamp(1, MAX_SPEED);

        // Timing
        self.wormhole_threshold_ms = self.wormhole_threshold_ms.clamp(16, 10_000);
        self.timing_decimals = self.timing_decimals.min(6);
    }

    /// Simulation parameters, clamped into their legal ranges.
    #[must_use]
    pub fn parameters(&self) -> SimulationParameters {
        SimulationParameters::new(self.alpha, self.beta, self.gamma)
    }

    /// Records a window size for the next launch. Zero sizes (a minimised
    /// window) are ignored.
    pub fn remember_window(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.window_width = width;
            self.window_height = height;
        }
    }

    /// Frame gap above which a tick is discarded.
    #[must_use]
    pub fn wormhole_threshold(&self) -> Duration {
        Duration::from_millis(self.wormhole_threshold_ms)
    }
}

/// Get platform-specific config directory.
fn dirs_config_path() -> Option<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        std::env::var("HOME")
            .ok()
            .map(|home| PathBuf::from(home).join("Library/Application Support"))
    }

    #[cfg(target_os = "windows")]
    {
        std::env::var("APPDATA").ok().map(PathBuf::from)
    }

    #[cfg(target_os = "linux")]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var("HOME")
                    .ok()
                    .map(|h| PathBuf::from(h).join(".config"))
            })
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
    {
        None
    }
}
