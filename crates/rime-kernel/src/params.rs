//! Simulation parameters and their device layout.

use bytemuck::{Pod, Zeroable};

/// Default diffusion gain.
pub const DEFAULT_ALPHA: f32 = 1.592;
/// Default background vapour level.
pub const DEFAULT_BETA: f32 = 0.3;
/// Default vapour addition on receptive cells.
pub const DEFAULT_GAMMA: f32 = 0.001;

/// User-facing rates of the crystal automaton.
///
/// Every setter clamps instead of failing so the visualisation keeps running
/// on out-of-range input:
/// - `alpha >= 0` (diffusion gain)
/// - `beta` in `[0, 1]` (background level, also the freezing baseline)
/// - `gamma` in `[0, 1]` (attachment rate)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationParameters {
    alpha: f32,
    beta: f32,
    gamma: f32,
}

impl Default for SimulationParameters {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
            beta: DEFAULT_BETA,
            gamma: DEFAULT_GAMMA,
        }
    }
}

impl SimulationParameters {
    /// Creates parameters, clamping each into its legal range.
    #[must_use]
    pub fn new(alpha: f32, beta: f32, gamma: f32) -> Self {
        let mut params = Self::default();
        params.set_alpha(alpha);
        params.set_beta(beta);
        params.set_gamma(gamma);
        params
    }

    /// Diffusion gain.
    #[must_use]
    pub const fn alpha(&self) -> f32 {
        self.alpha
    }

    /// Background level.
    #[must_use]
    pub const fn beta(&self) -> f32 {
        self.beta
    }

    /// Attachment rate.
    #[must_use]
    pub const fn gamma(&self) -> f32 {
        self.gamma
    }

    /// Sets alpha, clamping negative (and NaN) input to zero.
    pub fn set_alpha(&mut self, alpha: f32) {
        self.alpha = alpha.max(0.0);
    }

    /// Sets beta, clamped to `[0, 1]`.
    pub fn set_beta(&mut self, beta: f32) {
        self.beta = clamp_unit(beta);
    }

    /// Sets gamma, clamped to `[0, 1]`.
    pub fn set_gamma(&mut self, gamma: f32) {
        self.gamma = clamp_unit(gamma);
    }

    /// Device layout of these parameters.
    #[must_use]
    pub const fn to_gpu(&self) -> GpuSimulationParams {
        GpuSimulationParams {
            alpha: self.alpha,
            beta: self.beta,
            gamma: self.gamma,
            _padding: 0.0,
        }
    }
}

fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Uniform block read by the initialise, diffusion and freezing programs.
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct GpuSimulationParams {
    /// Diffusion gain
    pub alpha: f32,
    /// Background level
    pub beta: f32,
    /// Attachment rate
    pub gamma: f32,
    /// Pads the block to 16 bytes (must be public for bytemuck)
    pub _padding: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let params = SimulationParameters::default();
        assert!((params.alpha() - 1.592).abs() < f32::EPSILON);
        assert!((params.beta() - 0.3).abs() < f32::EPSILON);
        assert!((params.gamma() - 0.001).abs() < f32::EPSILON);
    }

    #[test]
    fn test_setters_clamp() {
        let mut params = SimulationParameters::default();
        params.set_alpha(-3.0);
        params.set_beta(1.5);
        params.set_gamma(-0.2);
        assert_eq!(params.alpha(), 0.0);
        assert_eq!(params.beta(), 1.0);
        assert_eq!(params.gamma(), 0.0);
    }

    #[test]
    fn test_alpha_has_no_upper_bound() {
        let params = SimulationParameters::new(7.5, 0.4, 0.01);
        assert_eq!(params.alpha(), 7.5);
    }

    #[test]
    fn test_nan_is_clamped() {
        let params = SimulationParameters::new(f32::NAN, f32::NAN, f32::NAN);
        assert_eq!(params.alpha(), 0.0);
        assert_eq!(params.beta(), 0.0);
        assert_eq!(params.gamma(), 0.0);
    }

    #[test]
    fn test_gpu_layout_is_16_bytes() {
        assert_eq!(std::mem::size_of::<GpuSimulationParams>(), 16);
        let gpu = SimulationParameters::new(1.0, 0.5, 0.25).to_gpu();
        assert_eq!(gpu.alpha, 1.0);
        assert_eq!(gpu.beta, 0.5);
        assert_eq!(gpu.gamma, 0.25);
    }
}
