//! Per-frame pass ordering.
//!
//! A [`FramePlan`] lists the passes one visual frame executes. The
//! orchestrator walks the plan in order, so every ordering rule lives here
//! and can be checked without a device.

/// One step of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    /// Vapour diffusion, slot `g` into slot `1 - g`
    Diffusion,
    /// Attachment and receptive-flag update on slot `1 - g`
    Freezing,
    /// Host-side flip of the ping-pong index
    AdvanceGeneration,
    /// Cell state into the raster target
    Raster,
    /// Clears the externally visible finished flag
    PostRender,
    /// Raster target onto the window surface
    Present,
}

impl PassKind {
    /// Whether this step advances the simulation.
    #[must_use]
    pub const fn is_simulation(self) -> bool {
        matches!(self, Self::Diffusion | Self::Freezing | Self::AdvanceGeneration)
    }
}

/// Sequence of passes for one visual frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramePlan {
    passes: Vec<PassKind>,
}

impl FramePlan {
    const SUB_STEP: [PassKind; 3] = [
        PassKind::Diffusion,
        PassKind::Freezing,
        PassKind::AdvanceGeneration,
    ];

    const DISPLAY: [PassKind; 3] = [PassKind::Raster, PassKind::PostRender, PassKind::Present];

    /// A regular frame: `speed` simulation sub-steps, then display.
    ///
    /// A speed of zero is treated as one.
    #[must_use]
    pub fn tick(speed: u32) -> Self {
        let speed = speed.max(1) as usize;
        let mut passes = Vec::with_capacity(speed * Self::SUB_STEP.len() + Self::DISPLAY.len());
        for _ in 0..speed {
            passes.extend_from_slice(&Self::SUB_STEP);
        }
        passes.extend_from_slice(&Self::DISPLAY);
        Self { passes }
    }

    /// An out-of-band frame that only redraws the current state.
    #[must_use]
    pub fn redraw() -> Self {
        Self {
            passes: Self::DISPLAY.to_vec(),
        }
    }

    /// Passes in execution order.
    #[must_use]
    pub fn passes(&self) -> &[PassKind] {
        &self.passes
    }

    /// Number of complete simulation sub-steps.
    #[must_use]
    pub fn sub_steps(&self) -> usize {
        self.passes
            .iter()
            .filter(|pass| **pass == PassKind::AdvanceGeneration)
            .count()
    }
}

impl<'a> IntoIterator for &'a FramePlan {
    type Item = &'a PassKind;
    type IntoIter = std::slice::Iter<'a, PassKind>;

    fn into_iter(self) -> Self::IntoIter {
        self.passes.iter()
    }
}
