//! Unit tests for config.rs

use crate::config::{ContextConfig, DeviceFeatures};
use crate::graphics_device::{PresentMode, QueueFlags};

// ============================================================================
// DEVICE FEATURES
// ============================================================================

#[test]
fn test_device_features_none_by_default() {
    let features = DeviceFeatures::default();
    assert_eq!(features, DeviceFeatures::none());
    assert!(!features.bindless_indexing);
    assert!(!features.buffer_device_address);
}

#[test]
fn test_device_features_toggles_are_independent() {
    let features = DeviceFeatures::none().enable_indirect_rendering();
    assert!(features.indirect_rendering);
    assert!(!features.bindless_indexing);
    assert!(!features.synchronization2);
    assert!(!features.buffer_device_address);
}

#[test]
fn test_device_features_all() {
    let features = DeviceFeatures::all();
    assert!(features.bindless_indexing);
    assert!(features.indirect_rendering);
    assert!(features.synchronization2);
    assert!(features.buffer_device_address);
}

#[test]
fn test_missing_features_listed() {
    let requested = DeviceFeatures::all();
    let available = DeviceFeatures::none().enable_synchronization();
    let missing = requested.missing_from(&available);
    assert_eq!(missing, vec!["bindless_indexing", "indirect_rendering", "buffer_device_address"]);

    assert!(DeviceFeatures::none().missing_from(&available).is_empty());
}

// ============================================================================
// CONTEXT CONFIG
// ============================================================================

#[test]
fn test_context_config_defaults() {
    let config = ContextConfig::default();
    assert_eq!(config.requested_queues, QueueFlags::GRAPHICS | QueueFlags::COMPUTE | QueueFlags::TRANSFER);
    assert_eq!(config.preferred_present_mode, PresentMode::Fifo);
    assert_eq!(config.frames_in_flight, 2);
    assert!(config.command_buffer_count >= config.frames_in_flight);
    assert_eq!(config.features, DeviceFeatures::all());
    assert_eq!(config.enable_validation, cfg!(debug_assertions));
}

// ============================================================================
// VALIDATION
// ============================================================================

#[test]
fn test_default_config_is_valid() {
    ContextConfig::default().validate().unwrap();
}

#[test]
fn test_zero_frames_in_flight_rejected() {
    let config = ContextConfig { frames_in_flight: 0, ..Default::default() };
    assert!(config.validate().is_err());
}

#[test]
fn test_fewer_command_buffers_than_frames_rejected() {
    let config = ContextConfig { frames_in_flight: 3, command_buffer_count: 2, ..Default::default() };
    assert!(config.validate().is_err());
}

#[test]
fn test_shader_path_joins_directory() {
    let config = ContextConfig::default();
    assert_eq!(config.shader_path("mesh.vert"), std::path::PathBuf::from("shaders").join("mesh.vert"));
    let absolute = std::env::temp_dir().join("lit.frag");
    assert_eq!(config.shader_path(&absolute), absolute);
}
