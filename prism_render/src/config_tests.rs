//! Unit tests for config.rs

use crate::config::{DescriptorPoolSizes, RenderConfig};
use crate::log::LogSeverity;

#[test]
fn test_default_config_waits_forever() {
    let config = RenderConfig::default();
    assert_eq!(config.fence_timeout_ns, u64::MAX);
    assert!(!config.has_fence_watchdog());
    assert_eq!(config.log_severity, LogSeverity::Info);
    assert_eq!(config.descriptor_pool, DescriptorPoolSizes::default());
}

#[test]
fn test_with_render_area() {
    let config = RenderConfig::default().with_render_area(640, 480);
    assert_eq!((config.render_width, config.render_height), (640, 480));
}

#[test]
fn test_watchdog_enabled_with_finite_timeout() {
    let config = RenderConfig {
        fence_timeout_ns: 2_000_000_000,
        ..Default::default()
    };
    assert!(config.has_fence_watchdog());
    assert_eq!(config.fence_timeout(), Some(std::time::Duration::from_secs(2)));
    assert_eq!(RenderConfig::default().fence_timeout(), None);
}

#[test]
fn test_default_pool_has_no_acceleration_structures() {
    let sizes = DescriptorPoolSizes::default();
    assert_eq!(sizes.acceleration_structures, 0);
    assert_eq!(sizes.max_sets, 1024);
}
