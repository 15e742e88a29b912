/// VulkanSwapchain - Vulkan implementation of the Swapchain trait
///
/// Presents on the graphics queue. Acquire and present report an
/// out-of-date surface as `Error::SwapchainOutOfDate` so the caller can
/// resize.

use ash::vk;
use prism_render::prism::{Error, Result};
use prism_render::prism::render::{Semaphore, Swapchain, Texture, TextureFormat, TextureInfo, TextureUsage};
use prism_render::{engine_debug, engine_err, engine_error};
use std::sync::Arc;

use crate::vulkan_context::{downcast, VulkanContext};
use crate::vulkan_format::texture_format_from_vk;
use crate::vulkan_sync::VulkanSemaphore;
use crate::vulkan_texture::VulkanTexture;

pub struct VulkanSwapchain {
    ctx: Arc<VulkanContext>,
    surface_loader: ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
    swapchain_loader: ash::khr::swapchain::Device,
    swapchain: vk::SwapchainKHR,
    images: Vec<Arc<dyn Texture>>,
    surface_format: vk::SurfaceFormatKHR,
    format: TextureFormat,
    extent: vk::Extent2D,
}

impl VulkanSwapchain {
    /// Take ownership of `surface` and build a swapchain for it
    pub(crate) fn new(ctx: Arc<VulkanContext>, surface: vk::SurfaceKHR, width: u32, height: u32) -> Result<Self> {
        let surface_loader = ash::khr::surface::Instance::new(ctx.entry(), &ctx.instance);
        let swapchain_loader = ash::khr::swapchain::Device::new(&ctx.instance, &ctx.device);

        let chosen = Self::choose_surface_format(&ctx, &surface_loader, surface);
        let (surface_format, format) = match chosen {
            Ok(chosen) => chosen,
            Err(e) => {
                unsafe { surface_loader.destroy_surface(surface, None) };
                return Err(e);
            }
        };

        let mut swapchain = Self {
            ctx,
            surface_loader,
            surface,
            swapchain_loader,
            swapchain: vk::SwapchainKHR::null(),
            images: Vec::new(),
            surface_format,
            format,
            extent: vk::Extent2D { width, height },
        };
        // Drop destroys the surface if the first build fails
        swapchain.build(width, height)?;
        Ok(swapchain)
    }

    fn choose_surface_format(
        ctx: &VulkanContext,
        surface_loader: &ash::khr::surface::Instance,
        surface: vk::SurfaceKHR,
    ) -> Result<(vk::SurfaceFormatKHR, TextureFormat)> {
        let supported = unsafe {
            surface_loader.get_physical_device_surface_support(ctx.physical_device, ctx.graphics_queue.family, surface)
                .map_err(|e| Error::InitializationFailed(format!("Failed to query present support: {:?}", e)))?
        };
        if !supported {
            engine_error!("prism::vulkan", "Graphics queue family cannot present to this surface");
            return Err(Error::InitializationFailed("Surface not presentable from the graphics queue".to_string()));
        }

        let surface_formats = unsafe {
            surface_loader.get_physical_device_surface_formats(ctx.physical_device, surface)
                .map_err(|e| {
                    engine_error!("prism::vulkan", "Failed to query surface formats: {:?}", e);
                    Error::InitializationFailed(format!("Failed to get surface formats: {:?}", e))
                })?
        };

        let preferred = surface_formats
            .iter()
            .find(|f| f.format == vk::Format::B8G8R8A8_SRGB || f.format == vk::Format::R8G8B8A8_SRGB)
            .or_else(|| surface_formats.iter().find(|f| texture_format_from_vk(f.format).is_some()));

        preferred
            .and_then(|f| texture_format_from_vk(f.format).map(|format| (*f, format)))
            .ok_or_else(|| {
                engine_error!("prism::vulkan", "No supported surface format among {:?}", surface_formats);
                Error::InitializationFailed("No supported surface format".to_string())
            })
    }

    /// Create (or recreate) the swapchain and wrap its images
    fn build(&mut self, width: u32, height: u32) -> Result<()> {
        unsafe {
            let caps = self.surface_loader
                .get_physical_device_surface_capabilities(self.ctx.physical_device, self.surface)
                .map_err(|e| engine_err!("prism::vulkan", "Failed to get surface capabilities: {:?}", e))?;

            let extent = if caps.current_extent.width != u32::MAX {
                caps.current_extent
            } else {
                vk::Extent2D {
                    width: width.clamp(caps.min_image_extent.width, caps.max_image_extent.width),
                    height: height.clamp(caps.min_image_extent.height, caps.max_image_extent.height),
                }
            };
            // Minimized window
            if extent.width == 0 || extent.height == 0 {
                return Err(Error::SwapchainOutOfDate);
            }

            let mut min_image_count = caps.min_image_count + 1;
            if caps.max_image_count > 0 {
                min_image_count = min_image_count.min(caps.max_image_count);
            }

            let old_swapchain = self.swapchain;
            let create_info = vk::SwapchainCreateInfoKHR::default()
                .surface(self.surface)
                .min_image_count(min_image_count)
                .image_format(self.surface_format.format)
                .image_color_space(self.surface_format.color_space)
                .image_extent(extent)
                .image_array_layers(1)
                .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST)
                .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
                .pre_transform(caps.current_transform)
                .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
                .present_mode(vk::PresentModeKHR::FIFO)
                .clipped(true)
                .old_swapchain(old_swapchain);

            let swapchain = self.swapchain_loader.create_swapchain(&create_info, None)
                .map_err(|e| engine_err!("prism::vulkan", "Failed to create swapchain: {:?}", e))?;

            self.images.clear();
            if old_swapchain != vk::SwapchainKHR::null() {
                self.swapchain_loader.destroy_swapchain(old_swapchain, None);
            }
            self.swapchain = swapchain;
            self.extent = extent;

            let vk_images = self.swapchain_loader.get_swapchain_images(swapchain)
                .map_err(|e| engine_err!("prism::vulkan", "Failed to get swapchain images: {:?}", e))?;

            for image in vk_images {
                let info = TextureInfo {
                    width: extent.width,
                    height: extent.height,
                    format: self.format,
                    usage: TextureUsage::COLOR_ATTACHMENT | TextureUsage::TRANSFER_DST,
                    mip_levels: 1,
                    array_layers: 1,
                };
                let texture = VulkanTexture::from_swapchain_image(Arc::clone(&self.ctx), image, info)?;
                self.images.push(Arc::new(texture));
            }

            engine_debug!("prism::vulkan", "Swapchain built: {}x{}, {} images, {:?}",
                extent.width, extent.height, self.images.len(), self.format);
            Ok(())
        }
    }
}

impl Swapchain for VulkanSwapchain {
    fn acquire_next_image(&mut self, signal: &Arc<dyn Semaphore>) -> Result<u32> {
        let semaphore = downcast::<VulkanSemaphore>(signal.as_any(), "Acquire semaphore")?;
        let acquired = unsafe {
            self.swapchain_loader.acquire_next_image(self.swapchain, u64::MAX, semaphore.semaphore, vk::Fence::null())
        };
        match acquired {
            Ok((image_index, _suboptimal)) => Ok(image_index),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Err(Error::SwapchainOutOfDate),
            Err(e) => Err(engine_err!("prism::vulkan", "Failed to acquire next swapchain image: {:?}", e)),
        }
    }

    fn present(&mut self, image_index: u32, wait: &Arc<dyn Semaphore>) -> Result<()> {
        let semaphore = downcast::<VulkanSemaphore>(wait.as_any(), "Present semaphore")?;
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let wait_semaphores = [semaphore.semaphore];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let queue = &self.ctx.graphics_queue;
        let _guard = queue.lock()?;
        match unsafe { self.swapchain_loader.queue_present(queue.queue, &present_info) } {
            Ok(_suboptimal) => Ok(()),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Err(Error::SwapchainOutOfDate),
            Err(e) => Err(engine_err!("prism::vulkan", "Failed to present swapchain image: {:?}", e)),
        }
    }

    fn recreate(&mut self, width: u32, height: u32) -> Result<()> {
        unsafe {
            self.ctx.device.device_wait_idle()
                .map_err(|e| engine_err!("prism::vulkan", "Failed to wait idle before swapchain recreation: {:?}", e))?;
        }
        self.build(width, height)
    }

    fn image_count(&self) -> usize {
        self.images.len()
    }

    fn width(&self) -> u32 {
        self.extent.width
    }

    fn height(&self) -> u32 {
        self.extent.height
    }

    fn format(&self) -> TextureFormat {
        self.format
    }

    fn image(&self, index: usize) -> Arc<dyn Texture> {
        Arc::clone(&self.images[index])
    }
}

impl Drop for VulkanSwapchain {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.device_wait_idle().ok();
            self.images.clear();
            if self.swapchain != vk::SwapchainKHR::null() {
                self.swapchain_loader.destroy_swapchain(self.swapchain, None);
            }
            self.surface_loader.destroy_surface(self.surface, None);
        }
    }
}
