//! # Rime Common
//!
//! Common types and shared abstractions for the Rime snow-crystal simulator.
//!
//! This crate provides foundational types used across all Rime crates:
//! - Axial hex coordinates and the pixel layout used to draw them
//! - The error taxonomy shared by the kernel and the engine
//! - Prelude for convenient imports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod error;
pub mod hex;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::*;
    pub use crate::hex::*;
}

pub use prelude::*;
