//! Error types for Rime.

use thiserror::Error;

/// Top-level error type for Rime operations.
#[derive(Debug, Error)]
pub enum RimeError {
    /// No usable GPU could be acquired
    #[error("Initialization error: {0}")]
    Initialization(#[from] InitializationError),

    /// A host resource expected at setup is absent
    #[error("Missing resource: {0}")]
    MissingResource(#[from] MissingResourceError),

    /// Program source could not be resolved
    #[error("Program error: {0}")]
    Program(#[from] ProgramError),

    /// The presentation surface failed in a way that cannot be recovered
    #[error("Surface error: {0}")]
    Surface(String),
}

/// Failures while acquiring a compute-capable device.
///
/// These are fatal: the renderer cannot be constructed and no retry is made.
#[derive(Debug, Error)]
pub enum InitializationError {
    /// No adapter matched the request
    #[error("Could not find a suitable GPU adapter")]
    NoAdapter,

    /// The adapter refused to create a device
    #[error("Could not create GPU device: {0}")]
    RequestDevice(String),

    /// The drawable surface could not be created
    #[error("Could not create surface: {0}")]
    CreateSurface(String),

    /// The surface reports no usable format for this adapter
    #[error("Surface is not supported by the selected adapter")]
    UnsupportedSurface,
}

/// A host-side resource (window, display element) was not available.
#[derive(Debug, Error)]
#[error("Could not find {0}")]
pub struct MissingResourceError(pub String);

/// Program source resolution errors.
#[derive(Debug, Error)]
pub enum ProgramError {
    /// No program is registered under the logical path
    #[error("Program not found: {0}")]
    NotFound(String),

    /// An import chain refers back to a program still being resolved
    #[error("Import cycle through: {0}")]
    ImportCycle(String),
}

/// Result type alias for Rime operations.
pub type RimeResult<T> = Result<T, RimeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_program_error_message() {
        let err = ProgramError::NotFound("shaders/missing.wgsl".to_string());
        assert_eq!(err.to_string(), "Program not found: shaders/missing.wgsl");
    }

    #[test]
    fn test_missing_resource_converts() {
        let err: RimeError = MissingResourceError("window".to_string()).into();
        assert_eq!(err.to_string(), "Missing resource: Could not find window");
    }
}
