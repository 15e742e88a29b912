/// Semaphores and fences

use ash::vk;
use prism_render::engine_err;
use prism_render::prism::Result;
use prism_render::prism::render::{Fence, Semaphore};
use std::any::Any;
use std::sync::Arc;

use crate::vulkan_context::VulkanContext;

/// Binary semaphore
pub struct VulkanSemaphore {
    ctx: Arc<VulkanContext>,
    pub(crate) semaphore: vk::Semaphore,
}

impl VulkanSemaphore {
    pub(crate) fn new(ctx: Arc<VulkanContext>) -> Result<Self> {
        let semaphore = unsafe {
            ctx.device.create_semaphore(&vk::SemaphoreCreateInfo::default(), None)
                .map_err(|e| engine_err!("prism::vulkan", "Failed to create semaphore: {:?}", e))?
        };
        Ok(Self { ctx, semaphore })
    }
}

impl Semaphore for VulkanSemaphore {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanSemaphore {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_semaphore(self.semaphore, None);
        }
    }
}

/// Fence
pub struct VulkanFence {
    ctx: Arc<VulkanContext>,
    pub(crate) fence: vk::Fence,
}

impl VulkanFence {
    pub(crate) fn new(ctx: Arc<VulkanContext>, signaled: bool) -> Result<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let fence = unsafe {
            ctx.device.create_fence(&vk::FenceCreateInfo::default().flags(flags), None)
                .map_err(|e| engine_err!("prism::vulkan", "Failed to create fence: {:?}", e))?
        };
        Ok(Self { ctx, fence })
    }
}

impl Fence for VulkanFence {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanFence {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_fence(self.fence, None);
        }
    }
}
