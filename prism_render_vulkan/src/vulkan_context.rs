/// VulkanContext - Shared Vulkan objects for every backend resource
///
/// Each resource keeps an `Arc<VulkanContext>`, so the device and the
/// instance are destroyed only after the last resource created from them.

use ash::vk;
use gpu_allocator::vulkan::Allocator;
use prism_render::prism::{Error, Result};
use prism_render::prism::render::QueueKind;
use std::any::Any;
use std::mem::ManuallyDrop;
use std::sync::{Mutex, MutexGuard};

/// Queue handle with the lock Vulkan requires around submission
pub struct VulkanQueue {
    pub queue: vk::Queue,
    pub family: u32,
    lock: Mutex<()>,
}

impl VulkanQueue {
    pub(crate) fn new(queue: vk::Queue, family: u32) -> Self {
        Self {
            queue,
            family,
            lock: Mutex::new(()),
        }
    }

    /// Exclusive access for `vkQueueSubmit` / `vkQueuePresentKHR`
    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, ()>> {
        self.lock
            .lock()
            .map_err(|_| Error::BackendError("Queue lock poisoned".to_string()))
    }
}

/// Shared Vulkan context
pub struct VulkanContext {
    /// Loader entry (must outlive the instance)
    entry: ash::Entry,

    pub instance: ash::Instance,
    pub physical_device: vk::PhysicalDevice,
    pub device: ash::Device,

    /// Dropped before the device is destroyed
    allocator: ManuallyDrop<Mutex<Allocator>>,

    pub graphics_queue: VulkanQueue,
    /// Dedicated compute queue (async compute)
    pub compute_queue: Option<VulkanQueue>,

    /// Debug utils loader and messenger (validation enabled)
    debug_utils: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
}

impl VulkanContext {
    pub(crate) fn new(
        entry: ash::Entry,
        instance: ash::Instance,
        physical_device: vk::PhysicalDevice,
        device: ash::Device,
        allocator: Allocator,
        graphics_queue: VulkanQueue,
        compute_queue: Option<VulkanQueue>,
        debug_utils: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
    ) -> Self {
        Self {
            entry,
            instance,
            physical_device,
            device,
            allocator: ManuallyDrop::new(Mutex::new(allocator)),
            graphics_queue,
            compute_queue,
            debug_utils,
        }
    }

    pub fn entry(&self) -> &ash::Entry {
        &self.entry
    }

    /// Lock the GPU memory allocator
    pub(crate) fn allocator(&self) -> Result<MutexGuard<'_, Allocator>> {
        self.allocator
            .lock()
            .map_err(|_| Error::BackendError("GPU allocator lock poisoned".to_string()))
    }

    /// Queue that executes work submitted for `kind`
    ///
    /// Compute work falls back to the graphics queue without a dedicated queue.
    pub fn queue(&self, kind: QueueKind) -> &VulkanQueue {
        match (kind, &self.compute_queue) {
            (QueueKind::Compute, Some(compute)) => compute,
            _ => &self.graphics_queue,
        }
    }

    /// Queue families that access shared resources
    ///
    /// More than one family means buffers and images use concurrent sharing.
    pub fn queue_families(&self) -> Vec<u32> {
        let mut families = vec![self.graphics_queue.family];
        if let Some(compute) = &self.compute_queue {
            if compute.family != self.graphics_queue.family {
                families.push(compute.family);
            }
        }
        families
    }
}

impl Drop for VulkanContext {
    fn drop(&mut self) {
        unsafe {
            self.device.device_wait_idle().ok();

            // Allocations are freed by their owners, release the allocator first
            ManuallyDrop::drop(&mut self.allocator);

            self.device.destroy_device(None);

            if let Some((loader, messenger)) = self.debug_utils.take() {
                loader.destroy_debug_utils_messenger(messenger, None);
            }

            self.instance.destroy_instance(None);
        }
    }
}

/// Downcast a render-core object to the backend type that created it
pub(crate) fn downcast<'a, T: 'static>(object: &'a dyn Any, what: &str) -> Result<&'a T> {
    object
        .downcast_ref::<T>()
        .ok_or_else(|| Error::InvalidResource(format!("{} was not created by the Vulkan backend", what)))
}
