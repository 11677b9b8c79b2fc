//! GPU validation setup.
//!
//! This module provides validation infrastructure for the GPU device:
//! - wgpu validation layer integration (debug builds, or on request)
//! - Error callback handling and logging

use tracing::{error, info};

/// Returns wgpu instance flags with validation enabled for debug builds.
///
/// `force` enables validation in release builds as well.
#[must_use]
pub fn gpu_instance_flags(force: bool) -> wgpu::InstanceFlags {
    if force || cfg!(debug_assertions) {
        info!("GPU validation layer enabled");
        wgpu::InstanceFlags::VALIDATION | wgpu::InstanceFlags::DEBUG
    } else {
        info!("GPU validation layer disabled");
        wgpu::InstanceFlags::empty()
    }
}

/// Creates a wgpu instance with appropriate validation settings.
#[must_use]
pub fn create_validated_instance(force_validation: bool) -> wgpu::Instance {
    wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        flags: gpu_instance_flags(force_validation),
        ..Default::default()
    })
}

/// Handles wgpu device errors by logging them.
///
/// Use this with `device.on_uncaptured_error()`.
pub fn handle_device_error(error: &wgpu::Error) {
    error!("GPU device error: {error}");
}

/// Features to request from an adapter.
///
/// Timestamp queries are optional: pass timers degrade to pass-through when
/// the adapter cannot provide them.
#[must_use]
pub fn requested_features(available: wgpu::Features) -> wgpu::Features {
    available & wgpu::Features::TIMESTAMP_QUERY
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forced_validation_flags() {
        let flags = gpu_instance_flags(true);
        assert!(flags.contains(wgpu::InstanceFlags::VALIDATION));
    }

    #[test]
    fn test_requested_features_only_timestamps() {
        let available = wgpu::Features::TIMESTAMP_QUERY | wgpu::Features::DEPTH_CLIP_CONTROL;
        assert_eq!(requested_features(available), wgpu::Features::TIMESTAMP_QUERY);
        assert!(requested_features(wgpu::Features::empty()).is_empty());
    }
}
