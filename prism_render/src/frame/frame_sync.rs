/// Semaphores and fences of the frame loop.
///
/// - one fence per swapchain image, created signaled, gating CPU reuse of
///   that image's command lists and uniform buffers
/// - one `renderFinished` semaphore per image (present waits on it)
/// - `imageAvailable` semaphores: one per image plus a spare handed to the
///   next acquire. Once the acquired image's fence has been waited on, the
///   spare and the image's slot are swapped, so a semaphore is only reused
///   after the submission that consumed it completed.
/// - `depthReady` (group A to group B) and `computeFinished` (group B to C)

use std::sync::Arc;
use crate::error::Result;
use crate::render::{Fence, GraphicsDevice, Semaphore};

pub struct FrameSync {
    image_available: Vec<Arc<dyn Semaphore>>,
    spare_image_available: Arc<dyn Semaphore>,
    render_finished: Vec<Arc<dyn Semaphore>>,
    in_flight: Vec<Arc<dyn Fence>>,
    depth_ready: Arc<dyn Semaphore>,
    compute_finished: Arc<dyn Semaphore>,
}

impl FrameSync {
    pub fn new(device: &dyn GraphicsDevice, image_count: usize) -> Result<Self> {
        assert!(image_count > 0, "FrameSync needs at least one swapchain image");
        let mut image_available = Vec::with_capacity(image_count);
        let mut render_finished = Vec::with_capacity(image_count);
        let mut in_flight = Vec::with_capacity(image_count);
        for _ in 0..image_count {
            image_available.push(device.create_semaphore()?);
            render_finished.push(device.create_semaphore()?);
            in_flight.push(device.create_fence(true)?);
        }
        Ok(Self {
            image_available,
            spare_image_available: device.create_semaphore()?,
            render_finished,
            in_flight,
            depth_ready: device.create_semaphore()?,
            compute_finished: device.create_semaphore()?,
        })
    }

    pub fn image_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Semaphore to signal from the next acquire
    pub fn acquire_semaphore(&self) -> &Arc<dyn Semaphore> {
        &self.spare_image_available
    }

    /// Make the semaphore of the last acquire the one of `image_index`
    ///
    /// Call once `fence(image_index)` has been waited on.
    pub fn commit_acquire(&mut self, image_index: u32) {
        std::mem::swap(&mut self.spare_image_available, &mut self.image_available[image_index as usize]);
    }

    /// Semaphore signaled when `image_index` is ready to be rendered to
    pub fn image_available(&self, image_index: u32) -> &Arc<dyn Semaphore> {
        &self.image_available[image_index as usize]
    }

    pub fn render_finished(&self, image_index: u32) -> &Arc<dyn Semaphore> {
        &self.render_finished[image_index as usize]
    }

    pub fn fence(&self, image_index: u32) -> &Arc<dyn Fence> {
        &self.in_flight[image_index as usize]
    }

    pub fn depth_ready(&self) -> &Arc<dyn Semaphore> {
        &self.depth_ready
    }

    pub fn compute_finished(&self) -> &Arc<dyn Semaphore> {
        &self.compute_finished
    }
}

#[cfg(test)]
#[path = "frame_sync_tests.rs"]
mod tests;
