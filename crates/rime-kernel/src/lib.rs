//! # Rime Kernel
//!
//! GPU compute kernel for hexagonal snow-crystal growth.
//!
//! This crate provides the device-side simulation and its orchestration:
//! - Crystal domain state: the hex-grid cell buffer and its serialisation
//! - Simulation stages: diffusion, freezing, initialisation, raster and
//!   post-render compute passes plus the final present
//! - Pass timer for asynchronous timestamp read-back
//! - Program loading through a pluggable source resolver
//! - The orchestrator that runs N sub-steps per visual frame
//!
//! ## Ping-Pong State
//!
//! Every cell carries two slots for its value and diffusion channels. The
//! header's generation index names the slot holding the latest state:
//! - Diffusion reads slot `g` and writes slot `1 - g`
//! - Freezing reads the diffused values in slot `1 - g`
//! - The host then flips the generation index with a 4-byte write
//!
//! ## Validation
//!
//! In debug builds, wgpu validation is enabled to catch GPU errors early.
//! Use `create_validated_instance()` to create a wgpu instance with appropriate settings.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod curve;
pub mod domain;
pub mod orchestrator;
pub mod params;
pub mod program;
pub mod schedule;
pub mod stages;
pub mod timer;
pub mod timing;
pub mod validation;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::curve::*;
    pub use crate::domain::*;
    pub use crate::orchestrator::*;
    pub use crate::params::*;
    pub use crate::program::*;
    pub use crate::schedule::*;
    pub use crate::timer::*;
    pub use crate::timing::*;
    pub use crate::validation::*;
}

pub use prelude::*;
