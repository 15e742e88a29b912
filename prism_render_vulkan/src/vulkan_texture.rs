/// VulkanTexture - Vulkan implementation of the Texture trait

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;
use prism_render::prism::{Error, Result};
use prism_render::prism::render::{Texture, TextureDesc, TextureInfo};
use prism_render::{engine_err, engine_error};
use std::any::Any;
use std::sync::Arc;

use crate::vulkan_context::VulkanContext;
use crate::vulkan_format::{aspect_mask, texture_format_to_vk, texture_usage_to_vk};

/// Vulkan texture
///
/// Swapchain images are wrapped without an allocation: only the view is
/// owned, the image belongs to the swapchain.
pub struct VulkanTexture {
    ctx: Arc<VulkanContext>,
    pub(crate) image: vk::Image,
    pub(crate) view: vk::ImageView,
    allocation: Option<Allocation>,
    owns_image: bool,
    info: TextureInfo,
}

impl VulkanTexture {
    pub(crate) fn new(ctx: Arc<VulkanContext>, desc: &TextureDesc) -> Result<Self> {
        unsafe {
            let format = texture_format_to_vk(desc.format);
            let mip_levels = desc.mip_levels.max(1);
            let array_layers = desc.array_layers.max(1);

            let families = ctx.queue_families();
            let mut image_create_info = vk::ImageCreateInfo::default()
                .image_type(vk::ImageType::TYPE_2D)
                .format(format)
                .extent(vk::Extent3D {
                    width: desc.width.max(1),
                    height: desc.height.max(1),
                    depth: 1,
                })
                .mip_levels(mip_levels)
                .array_layers(array_layers)
                .samples(vk::SampleCountFlags::TYPE_1)
                .tiling(vk::ImageTiling::OPTIMAL)
                .usage(texture_usage_to_vk(desc.usage))
                .initial_layout(vk::ImageLayout::UNDEFINED);
            if desc.cube_compatible {
                image_create_info = image_create_info.flags(vk::ImageCreateFlags::CUBE_COMPATIBLE);
            }
            image_create_info = if families.len() > 1 {
                image_create_info
                    .sharing_mode(vk::SharingMode::CONCURRENT)
                    .queue_family_indices(&families)
            } else {
                image_create_info.sharing_mode(vk::SharingMode::EXCLUSIVE)
            };

            let image = ctx.device.create_image(&image_create_info, None)
                .map_err(|e| engine_err!("prism::vulkan", "Failed to create texture image: {:?}", e))?;

            let requirements = ctx.device.get_image_memory_requirements(image);
            let allocation = ctx.allocator()
                .and_then(|mut allocator| {
                    allocator
                        .allocate(&AllocationCreateDesc {
                            name: "texture",
                            requirements,
                            location: MemoryLocation::GpuOnly,
                            linear: false,
                            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                        })
                        .map_err(|_| {
                            let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                            engine_error!("prism::vulkan", "Out of GPU memory for texture (size: {}x{}, layers: {}, {:.2} MB)",
                                desc.width, desc.height, array_layers, size_mb);
                            Error::OutOfMemory
                        })
                });
            let allocation = match allocation {
                Ok(allocation) => allocation,
                Err(e) => {
                    ctx.device.destroy_image(image, None);
                    return Err(e);
                }
            };

            let bound = ctx.device
                .bind_image_memory(image, allocation.memory(), allocation.offset())
                .map_err(|e| engine_err!("prism::vulkan", "Failed to bind texture image memory: {:?}", e));
            let view_type = if desc.cube_compatible && array_layers == 6 {
                vk::ImageViewType::CUBE
            } else if array_layers > 1 {
                vk::ImageViewType::TYPE_2D_ARRAY
            } else {
                vk::ImageViewType::TYPE_2D
            };
            let view = bound.and_then(|_| {
                create_view(&ctx.device, image, format, view_type, aspect_mask(desc.format), mip_levels, array_layers)
            });

            match view {
                Ok(view) => Ok(Self {
                    ctx,
                    image,
                    view,
                    allocation: Some(allocation),
                    owns_image: true,
                    info: TextureInfo::from(desc),
                }),
                Err(e) => {
                    if let Ok(mut allocator) = ctx.allocator() {
                        allocator.free(allocation).ok();
                    }
                    ctx.device.destroy_image(image, None);
                    Err(e)
                }
            }
        }
    }

    /// Wrap a swapchain image
    pub(crate) fn from_swapchain_image(ctx: Arc<VulkanContext>, image: vk::Image, info: TextureInfo) -> Result<Self> {
        let format = texture_format_to_vk(info.format);
        let view = create_view(&ctx.device, image, format, vk::ImageViewType::TYPE_2D, vk::ImageAspectFlags::COLOR, 1, 1)?;
        Ok(Self {
            ctx,
            image,
            view,
            allocation: None,
            owns_image: false,
            info,
        })
    }

    pub(crate) fn aspect_mask(&self) -> vk::ImageAspectFlags {
        aspect_mask(self.info.format)
    }
}

fn create_view(
    device: &ash::Device,
    image: vk::Image,
    format: vk::Format,
    view_type: vk::ImageViewType,
    aspect_mask: vk::ImageAspectFlags,
    level_count: u32,
    layer_count: u32,
) -> Result<vk::ImageView> {
    let view_create_info = vk::ImageViewCreateInfo::default()
        .image(image)
        .view_type(view_type)
        .format(format)
        .components(vk::ComponentMapping {
            r: vk::ComponentSwizzle::IDENTITY,
            g: vk::ComponentSwizzle::IDENTITY,
            b: vk::ComponentSwizzle::IDENTITY,
            a: vk::ComponentSwizzle::IDENTITY,
        })
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask,
            base_mip_level: 0,
            level_count,
            base_array_layer: 0,
            layer_count,
        });

    unsafe {
        device.create_image_view(&view_create_info, None)
            .map_err(|e| engine_err!("prism::vulkan", "Failed to create image view: {:?}", e))
    }
}

impl Texture for VulkanTexture {
    fn info(&self) -> &TextureInfo {
        &self.info
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanTexture {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_image_view(self.view, None);

            if !self.owns_image {
                return;
            }
            if let Some(allocation) = self.allocation.take() {
                if let Ok(mut allocator) = self.ctx.allocator() {
                    allocator.free(allocation).ok();
                }
            }
            self.ctx.device.destroy_image(self.image, None);
        }
    }
}
