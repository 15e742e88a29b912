//! Render configuration
//!
//! Plain data consumed by the backend at device creation and by the
//! `RenderPassManager` at run time.

use std::time::Duration;
use crate::log::LogSeverity;

/// Descriptor pool sizing used when the backend creates (or grows) a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorPoolSizes {
    pub max_sets: u32,
    pub uniform_buffers: u32,
    pub storage_buffers: u32,
    pub combined_image_samplers: u32,
    pub storage_images: u32,
    pub acceleration_structures: u32,
}

impl Default for DescriptorPoolSizes {
    fn default() -> Self {
        Self {
            max_sets: 1024,
            uniform_buffers: 1024,
            storage_buffers: 512,
            combined_image_samplers: 2048,
            storage_images: 256,
            acceleration_structures: 0,
        }
    }
}

/// Configuration for a render context
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Application name reported to the driver
    pub app_name: String,
    /// Application version (major, minor, patch)
    pub app_version: (u32, u32, u32),
    /// Enable backend validation (Vulkan validation layers)
    pub enable_validation: bool,
    /// Initial render area width in pixels
    pub render_width: u32,
    /// Initial render area height in pixels
    pub render_height: u32,
    /// Fence wait timeout in nanoseconds. `u64::MAX` waits forever.
    pub fence_timeout_ns: u64,
    /// Use a dedicated compute queue for async compute when the device has one
    pub use_async_compute_queue: bool,
    /// Descriptor pool sizing
    pub descriptor_pool: DescriptorPoolSizes,
    /// Entries below this severity are dropped
    pub log_severity: LogSeverity,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            app_name: "Prism Application".to_string(),
            app_version: (0, 1, 0),
            enable_validation: cfg!(debug_assertions),
            render_width: 1280,
            render_height: 720,
            fence_timeout_ns: u64::MAX,
            use_async_compute_queue: true,
            descriptor_pool: DescriptorPoolSizes::default(),
            log_severity: LogSeverity::Info,
        }
    }
}

impl RenderConfig {
    /// Same configuration with another initial render area
    pub fn with_render_area(mut self, width: u32, height: u32) -> Self {
        self.render_width = width;
        self.render_height = height;
        self
    }

    /// Whether fence waits are bounded
    pub fn has_fence_watchdog(&self) -> bool {
        self.fence_timeout_ns != u64::MAX
    }

    /// Fence wait bound, `None` when waits are unbounded
    pub fn fence_timeout(&self) -> Option<Duration> {
        self.has_fence_watchdog().then(|| Duration::from_nanos(self.fence_timeout_ns))
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
