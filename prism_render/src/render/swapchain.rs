/// Swapchain trait - presentation surface owned by the window layer

use std::sync::Arc;
use crate::error::Result;
use crate::render::{Semaphore, Texture, TextureFormat};

/// Swapchain for presenting rendered images to a window
pub trait Swapchain: Send + Sync {
    /// Acquire the next image; `signal` is signaled when the image is usable
    ///
    /// Returns `Error::SwapchainOutOfDate` when the surface changed.
    fn acquire_next_image(&mut self, signal: &Arc<dyn Semaphore>) -> Result<u32>;

    /// Present `image_index` once `wait` is signaled
    fn present(&mut self, image_index: u32, wait: &Arc<dyn Semaphore>) -> Result<()>;

    /// Recreate for a new surface size
    fn recreate(&mut self, width: u32, height: u32) -> Result<()>;

    fn image_count(&self) -> usize;

    fn width(&self) -> u32;

    fn height(&self) -> u32;

    fn format(&self) -> TextureFormat;

    /// Swapchain image as a texture (color attachment of the final passes)
    fn image(&self, index: usize) -> Arc<dyn Texture>;
}
