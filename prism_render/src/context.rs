/// Explicit render context handed to passes and the pass manager

use std::sync::{Arc, Mutex, MutexGuard};
use crate::config::RenderConfig;
use crate::error::{Error, Result};
use crate::render::{DeviceProperties, GraphicsDevice};
use crate::resource::RenderResourceManager;

/// Device, shared resource table and configuration
///
/// Created once by the application and shared (`Arc`) with the
/// `RenderPassManager`. The resource table is the only mutable shared state
/// and sits behind a `Mutex`.
pub struct RenderContext {
    device: Arc<dyn GraphicsDevice>,
    resources: Mutex<RenderResourceManager>,
    config: RenderConfig,
}

impl RenderContext {
    pub fn new(device: Arc<dyn GraphicsDevice>, config: RenderConfig) -> Self {
        let resources = RenderResourceManager::new(Arc::clone(&device), config.render_width, config.render_height);
        Self {
            device,
            resources: Mutex::new(resources),
            config,
        }
    }

    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        &self.device
    }

    pub fn properties(&self) -> &DeviceProperties {
        self.device.properties()
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Lock the named resource table
    pub fn resources(&self) -> Result<MutexGuard<'_, RenderResourceManager>> {
        self.resources
            .lock()
            .map_err(|_| Error::BackendError("Resource table lock poisoned".to_string()))
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
