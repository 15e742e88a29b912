/// VulkanBuffer - Vulkan implementation of the Buffer trait

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;
use prism_render::prism::{Error, Result};
use prism_render::prism::render::{Buffer, BufferDesc, BufferUsage};
use prism_render::{engine_err, engine_error};
use std::any::Any;
use std::sync::Arc;

use crate::vulkan_context::VulkanContext;
use crate::vulkan_format::buffer_usage_to_vk;

/// Vulkan buffer
pub struct VulkanBuffer {
    ctx: Arc<VulkanContext>,
    pub(crate) buffer: vk::Buffer,
    allocation: Option<Allocation>,
    size: u64,
    usage: BufferUsage,
}

impl VulkanBuffer {
    pub(crate) fn new(ctx: Arc<VulkanContext>, desc: &BufferDesc) -> Result<Self> {
        unsafe {
            let families = ctx.queue_families();
            let mut create_info = vk::BufferCreateInfo::default()
                .size(desc.size.max(1))
                .usage(buffer_usage_to_vk(desc.usage) | vk::BufferUsageFlags::TRANSFER_DST);
            create_info = if families.len() > 1 {
                create_info
                    .sharing_mode(vk::SharingMode::CONCURRENT)
                    .queue_family_indices(&families)
            } else {
                create_info.sharing_mode(vk::SharingMode::EXCLUSIVE)
            };

            let buffer = ctx.device.create_buffer(&create_info, None)
                .map_err(|e| engine_err!("prism::vulkan", "Failed to create buffer of size {} bytes: {:?}", desc.size, e))?;

            let requirements = ctx.device.get_buffer_memory_requirements(buffer);
            let location = if desc.host_visible {
                MemoryLocation::CpuToGpu
            } else {
                MemoryLocation::GpuOnly
            };

            let allocation = ctx.allocator()
                .and_then(|mut allocator| {
                    allocator
                        .allocate(&AllocationCreateDesc {
                            name: "buffer",
                            requirements,
                            location,
                            linear: true,
                            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                        })
                        .map_err(|_| {
                            let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                            engine_error!("prism::vulkan", "Out of GPU memory for buffer (required: {:.2} MB)", size_mb);
                            Error::OutOfMemory
                        })
                });
            let allocation = match allocation {
                Ok(allocation) => allocation,
                Err(e) => {
                    ctx.device.destroy_buffer(buffer, None);
                    return Err(e);
                }
            };

            if let Err(e) = ctx.device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset()) {
                if let Ok(mut allocator) = ctx.allocator() {
                    allocator.free(allocation).ok();
                }
                ctx.device.destroy_buffer(buffer, None);
                return Err(engine_err!("prism::vulkan", "Failed to bind buffer memory: {:?}", e));
            }

            Ok(Self {
                ctx,
                buffer,
                allocation: Some(allocation),
                size: desc.size,
                usage: desc.usage,
            })
        }
    }
}

impl Buffer for VulkanBuffer {
    fn size(&self) -> u64 {
        self.size
    }

    fn usage(&self) -> BufferUsage {
        self.usage
    }

    fn update(&self, offset: u64, data: &[u8]) -> Result<()> {
        let end = offset.checked_add(data.len() as u64);
        if end.map_or(true, |end| end > self.size) {
            return Err(engine_err!("prism::vulkan",
                "Buffer update out of range (offset {} + {} bytes > size {})", offset, data.len(), self.size));
        }

        let allocation = self.allocation.as_ref()
            .ok_or_else(|| engine_err!("prism::vulkan", "Buffer update failed: no GPU allocation"))?;
        let mapped_ptr = allocation
            .mapped_ptr()
            .ok_or_else(|| Error::BackendError("Buffer is not CPU-accessible".to_string()))?
            .as_ptr() as *mut u8;

        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), mapped_ptr.add(offset as usize), data.len());
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanBuffer {
    fn drop(&mut self) {
        unsafe {
            if let Some(allocation) = self.allocation.take() {
                // Still destroy the buffer if the allocator lock is poisoned
                if let Ok(mut allocator) = self.ctx.allocator() {
                    allocator.free(allocation).ok();
                }
            }
            self.ctx.device.destroy_buffer(self.buffer, None);
        }
    }
}
