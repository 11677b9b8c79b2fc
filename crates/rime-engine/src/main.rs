//! # Rime
//!
//! Windowed hexagonal snow-crystal simulator.
//!
//! This crate ties together:
//! - Kernel: GPU compute stages and the per-frame orchestrator
//! - Frame loop: tick scheduling with long-gap rejection
//! - Configuration, keyboard controls and the window-title readout

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

mod app;
mod config;
mod frame_loop;
mod input;
mod title;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Main entry point.
fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::from_default_env()
                .add_directive("rime=info".parse()?)
                .add_directive("rime_kernel=info".parse()?),
        )
        .init();

    info!("Rime starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    app::run()?;

    info!("Rime shutdown complete");
    Ok(())
}
