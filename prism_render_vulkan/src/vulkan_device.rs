/// VulkanGraphicsDevice - Vulkan implementation of the GraphicsDevice trait

use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use gpu_allocator::AllocationSizes;
use prism_render::prism::{Error, RenderConfig, Result};
use prism_render::prism::render::{
    Buffer, BufferDesc, CommandBufferUsage, CommandList, ComputePipelineDesc, DescriptorSet,
    DescriptorSetLayout, DescriptorSetLayoutDesc, DescriptorWrite, DeviceProperties, Fence,
    Framebuffer, FramebufferDesc, GraphicsDevice, GraphicsPipelineDesc, Pipeline, PipelineLayout,
    PipelineLayoutDesc, PipelineStageFlags, QueueKind, RenderPass, RenderPassDesc, Semaphore,
    SubmitInfo, Texture, TextureDesc,
};
use prism_render::{engine_bail, engine_err, engine_error, engine_info};
#[cfg(feature = "vulkan-validation")]
use prism_render::engine_warn;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle, RawWindowHandle};
use std::any::Any;
use std::ffi::{c_char, CString};
use std::sync::{Arc, Mutex};
use winit::window::Window;

use crate::vulkan_buffer::VulkanBuffer;
use crate::vulkan_command_list::VulkanCommandList;
use crate::vulkan_context::{downcast, VulkanContext, VulkanQueue};
use crate::vulkan_descriptor::{DescriptorAllocator, VulkanDescriptorSet, VulkanDescriptorSetLayout};
use crate::vulkan_format::pipeline_stages_to_vk;
use crate::vulkan_pipeline::{VulkanPipeline, VulkanPipelineLayout};
use crate::vulkan_render_pass::{VulkanFramebuffer, VulkanRenderPass};
use crate::vulkan_sampler::SamplerCache;
use crate::vulkan_swapchain::VulkanSwapchain;
use crate::vulkan_sync::{VulkanFence, VulkanSemaphore};
use crate::vulkan_texture::VulkanTexture;

/// Physical device and the queue families chosen on it
struct DeviceSelection {
    physical_device: vk::PhysicalDevice,
    graphics_family: u32,
    compute_family: Option<u32>,
}

/// Vulkan graphics device
pub struct VulkanGraphicsDevice {
    ctx: Arc<VulkanContext>,
    properties: DeviceProperties,
    descriptors: Arc<DescriptorAllocator>,
    samplers: Mutex<SamplerCache>,
}

fn window_handles(window: &Window) -> Result<(RawDisplayHandle, RawWindowHandle)> {
    let display = window.display_handle()
        .map_err(|e| Error::InitializationFailed(format!("Window has no display handle: {}", e)))?;
    let handle = window.window_handle()
        .map_err(|e| Error::InitializationFailed(format!("Window has no window handle: {}", e)))?;
    Ok((display.as_raw(), handle.as_raw()))
}

impl VulkanGraphicsDevice {
    /// Create the instance, pick a device that can present to `window`,
    /// and create the logical device with its queues and allocator
    pub fn new(window: &Window, config: &RenderConfig) -> Result<Self> {
        unsafe {
            let entry = ash::Entry::load()
                .map_err(|e| {
                    engine_error!("prism::vulkan", "Failed to load Vulkan library: {:?}", e);
                    Error::InitializationFailed(format!("Failed to load Vulkan: {:?}", e))
                })?;

            let (display_handle, window_handle) = window_handles(window)?;

            let app_name = CString::new(config.app_name.as_str())
                .map_err(|_| Error::InitializationFailed("Application name contains a NUL byte".to_string()))?;
            let (major, minor, patch) = config.app_version;
            let app_info = vk::ApplicationInfo::default()
                .application_name(&app_name)
                .application_version(vk::make_api_version(0, major, minor, patch))
                .engine_name(c"Prism")
                .engine_version(vk::make_api_version(0, 0, 1, 0))
                .api_version(vk::API_VERSION_1_3);

            #[cfg_attr(not(feature = "vulkan-validation"), allow(unused_mut))]
            let mut extension_names: Vec<*const c_char> = ash_window::enumerate_required_extensions(display_handle)
                .map_err(|e| {
                    engine_error!("prism::vulkan", "Failed to enumerate required surface extensions: {:?}", e);
                    Error::InitializationFailed(format!("Failed to get required extensions: {:?}", e))
                })?
                .to_vec();

            let validation = Self::validation_requested(&entry, config);
            #[cfg_attr(not(feature = "vulkan-validation"), allow(unused_mut))]
            let mut layer_names: Vec<*const c_char> = Vec::new();
            #[cfg(feature = "vulkan-validation")]
            if validation {
                extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
                layer_names.push(crate::vulkan_debug::VALIDATION_LAYER.as_ptr());
            }

            let instance_create_info = vk::InstanceCreateInfo::default()
                .application_info(&app_info)
                .enabled_extension_names(&extension_names)
                .enabled_layer_names(&layer_names);

            let instance = entry.create_instance(&instance_create_info, None)
                .map_err(|e| {
                    engine_error!("prism::vulkan", "Failed to create Vulkan instance: {:?}", e);
                    Error::InitializationFailed(format!("Failed to create instance: {:?}", e))
                })?;

            #[cfg(feature = "vulkan-validation")]
            let debug_utils = if validation {
                Some(crate::vulkan_debug::create_debug_messenger(&entry, &instance)?)
            } else {
                None
            };
            #[cfg(not(feature = "vulkan-validation"))]
            let debug_utils = {
                let _ = validation;
                None
            };

            // Temporary surface, only to check present support
            let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);
            let surface = ash_window::create_surface(&entry, &instance, display_handle, window_handle, None)
                .map_err(|e| {
                    engine_error!("prism::vulkan", "Failed to create window surface: {:?}", e);
                    Error::InitializationFailed(format!("Failed to create surface: {:?}", e))
                })?;
            let selection = Self::select_device(&instance, &surface_loader, surface, config.use_async_compute_queue);
            surface_loader.destroy_surface(surface, None);
            let selection = selection?;

            let vk_properties = instance.get_physical_device_properties(selection.physical_device);
            let features = instance.get_physical_device_features(selection.physical_device);
            let anisotropy = features.sampler_anisotropy == vk::TRUE;

            let priorities = [1.0f32];
            let mut queue_infos = vec![vk::DeviceQueueCreateInfo::default()
                .queue_family_index(selection.graphics_family)
                .queue_priorities(&priorities)];
            if let Some(compute_family) = selection.compute_family {
                queue_infos.push(
                    vk::DeviceQueueCreateInfo::default()
                        .queue_family_index(compute_family)
                        .queue_priorities(&priorities),
                );
            }

            let device_extensions = [ash::khr::swapchain::NAME.as_ptr()];
            let enabled_features = vk::PhysicalDeviceFeatures::default().sampler_anisotropy(anisotropy);
            let device_create_info = vk::DeviceCreateInfo::default()
                .queue_create_infos(&queue_infos)
                .enabled_extension_names(&device_extensions)
                .enabled_features(&enabled_features);

            let device = instance.create_device(selection.physical_device, &device_create_info, None)
                .map_err(|e| {
                    engine_error!("prism::vulkan", "Failed to create logical device: {:?}", e);
                    Error::InitializationFailed(format!("Failed to create device: {:?}", e))
                })?;

            let graphics_queue = VulkanQueue::new(device.get_device_queue(selection.graphics_family, 0), selection.graphics_family);
            let compute_queue = selection.compute_family
                .map(|family| VulkanQueue::new(device.get_device_queue(family, 0), family));

            let allocator = Allocator::new(&AllocatorCreateDesc {
                instance: instance.clone(),
                device: device.clone(),
                physical_device: selection.physical_device,
                debug_settings: Default::default(),
                buffer_device_address: false,
                allocation_sizes: AllocationSizes::default(),
            })
            .map_err(|e| {
                engine_error!("prism::vulkan", "Failed to create GPU allocator: {:?}", e);
                Error::InitializationFailed(format!("Failed to create allocator: {:?}", e))
            })?;

            let properties = DeviceProperties {
                device_name: vk_properties
                    .device_name_as_c_str()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                vendor_id: vk_properties.vendor_id,
                api_version: (
                    vk::api_version_major(vk_properties.api_version),
                    vk::api_version_minor(vk_properties.api_version),
                    vk::api_version_patch(vk_properties.api_version),
                ),
                has_dedicated_compute_queue: compute_queue.is_some(),
                max_push_constant_size: vk_properties.limits.max_push_constants_size,
                max_bound_descriptor_sets: vk_properties.limits.max_bound_descriptor_sets,
                min_uniform_buffer_offset_alignment: vk_properties.limits.min_uniform_buffer_offset_alignment,
            };

            let ctx = Arc::new(VulkanContext::new(
                entry,
                instance,
                selection.physical_device,
                device,
                allocator,
                graphics_queue,
                compute_queue,
                debug_utils,
            ));

            let descriptors = Arc::new(DescriptorAllocator::new(Arc::clone(&ctx), config.descriptor_pool)?);
            let samplers = Mutex::new(SamplerCache::new(Arc::clone(&ctx), anisotropy));

            engine_info!("prism::vulkan", "Device '{}' (Vulkan {}.{}.{}), async compute: {}, validation: {}",
                properties.device_name,
                properties.api_version.0, properties.api_version.1, properties.api_version.2,
                properties.has_dedicated_compute_queue,
                validation);

            Ok(Self {
                ctx,
                properties,
                descriptors,
                samplers,
            })
        }
    }

    /// Validation is on when compiled in and enabled in the configuration
    fn validation_requested(entry: &ash::Entry, config: &RenderConfig) -> bool {
        if !cfg!(feature = "vulkan-validation") || !config.enable_validation {
            return false;
        }
        #[cfg(feature = "vulkan-validation")]
        {
            let available = unsafe { entry.enumerate_instance_layer_properties() }
                .map(|layers| {
                    layers.iter().any(|layer| {
                        layer.layer_name_as_c_str().ok() == Some(crate::vulkan_debug::VALIDATION_LAYER)
                    })
                })
                .unwrap_or(false);
            if !available {
                engine_warn!("prism::vulkan", "Validation requested but VK_LAYER_KHRONOS_validation is not installed");
            }
            available
        }
        #[cfg(not(feature = "vulkan-validation"))]
        {
            let _ = entry;
            false
        }
    }

    /// Pick a device whose graphics family can present to `surface`
    ///
    /// Discrete GPUs are preferred. With `async_compute`, a compute-only
    /// family becomes the dedicated compute queue.
    fn select_device(
        instance: &ash::Instance,
        surface_loader: &ash::khr::surface::Instance,
        surface: vk::SurfaceKHR,
        async_compute: bool,
    ) -> Result<DeviceSelection> {
        let physical_devices = unsafe {
            instance.enumerate_physical_devices()
                .map_err(|e| Error::InitializationFailed(format!("Failed to enumerate physical devices: {:?}", e)))?
        };

        let mut best: Option<(u32, DeviceSelection)> = None;
        for physical_device in physical_devices {
            let families = unsafe { instance.get_physical_device_queue_family_properties(physical_device) };

            let graphics_family = families.iter().enumerate().find_map(|(index, family)| {
                let index = index as u32;
                let present = unsafe {
                    surface_loader
                        .get_physical_device_surface_support(physical_device, index, surface)
                        .unwrap_or(false)
                };
                (family.queue_flags.contains(vk::QueueFlags::GRAPHICS) && present).then_some(index)
            });
            let Some(graphics_family) = graphics_family else {
                continue;
            };

            let compute_family = if async_compute {
                families.iter().enumerate().find_map(|(index, family)| {
                    (family.queue_flags.contains(vk::QueueFlags::COMPUTE)
                        && !family.queue_flags.contains(vk::QueueFlags::GRAPHICS))
                    .then_some(index as u32)
                })
            } else {
                None
            };

            let device_type = unsafe { instance.get_physical_device_properties(physical_device) }.device_type;
            let score = match device_type {
                vk::PhysicalDeviceType::DISCRETE_GPU => 3,
                vk::PhysicalDeviceType::INTEGRATED_GPU => 2,
                vk::PhysicalDeviceType::VIRTUAL_GPU => 1,
                _ => 0,
            };
            if best.as_ref().map_or(true, |(best_score, _)| score > *best_score) {
                best = Some((score, DeviceSelection { physical_device, graphics_family, compute_family }));
            }
        }

        best.map(|(_, selection)| selection).ok_or_else(|| {
            engine_error!("prism::vulkan", "No Vulkan device can render and present to the window");
            Error::InitializationFailed("No suitable physical device".to_string())
        })
    }

    /// Create a surface for `window` and a swapchain on it
    pub fn create_swapchain(&self, window: &Window, width: u32, height: u32) -> Result<VulkanSwapchain> {
        let (display_handle, window_handle) = window_handles(window)?;
        let surface = unsafe {
            ash_window::create_surface(self.ctx.entry(), &self.ctx.instance, display_handle, window_handle, None)
                .map_err(|e| {
                    engine_error!("prism::vulkan", "Failed to create window surface: {:?}", e);
                    Error::InitializationFailed(format!("Failed to create surface: {:?}", e))
                })?
        };
        VulkanSwapchain::new(Arc::clone(&self.ctx), surface, width, height)
    }

    /// Shared Vulkan context
    pub fn context(&self) -> &Arc<VulkanContext> {
        &self.ctx
    }
}

impl GraphicsDevice for VulkanGraphicsDevice {
    fn properties(&self) -> &DeviceProperties {
        &self.properties
    }

    // ===== RESOURCES =====

    fn create_buffer(&self, desc: &BufferDesc) -> Result<Arc<dyn Buffer>> {
        Ok(Arc::new(VulkanBuffer::new(Arc::clone(&self.ctx), desc)?))
    }

    fn create_texture(&self, desc: &TextureDesc) -> Result<Arc<dyn Texture>> {
        Ok(Arc::new(VulkanTexture::new(Arc::clone(&self.ctx), desc)?))
    }

    // ===== LAYOUTS AND PIPELINES =====

    fn create_descriptor_set_layout(&self, desc: &DescriptorSetLayoutDesc) -> Result<Arc<dyn DescriptorSetLayout>> {
        Ok(Arc::new(VulkanDescriptorSetLayout::new(Arc::clone(&self.ctx), desc)?))
    }

    fn create_pipeline_layout(&self, desc: &PipelineLayoutDesc) -> Result<Arc<dyn PipelineLayout>> {
        Ok(Arc::new(VulkanPipelineLayout::new(Arc::clone(&self.ctx), desc)?))
    }

    fn create_render_pass(&self, desc: &RenderPassDesc) -> Result<Arc<dyn RenderPass>> {
        Ok(Arc::new(VulkanRenderPass::new(Arc::clone(&self.ctx), desc)?))
    }

    fn create_framebuffer(&self, desc: &FramebufferDesc) -> Result<Arc<dyn Framebuffer>> {
        Ok(Arc::new(VulkanFramebuffer::new(Arc::clone(&self.ctx), desc)?))
    }

    fn create_graphics_pipeline(&self, desc: &GraphicsPipelineDesc) -> Result<Arc<dyn Pipeline>> {
        Ok(Arc::new(VulkanPipeline::new_graphics(Arc::clone(&self.ctx), desc)?))
    }

    fn create_compute_pipeline(&self, desc: &ComputePipelineDesc) -> Result<Arc<dyn Pipeline>> {
        Ok(Arc::new(VulkanPipeline::new_compute(Arc::clone(&self.ctx), desc)?))
    }

    // ===== DESCRIPTORS =====

    fn allocate_descriptor_set(&self, layout: &Arc<dyn DescriptorSetLayout>, set_index: u32) -> Result<Arc<dyn DescriptorSet>> {
        let layout = downcast::<VulkanDescriptorSetLayout>(layout.as_any(), "Descriptor set layout")?;
        Ok(Arc::new(self.descriptors.allocate(layout, set_index)?))
    }

    fn update_descriptor_set(&self, descriptor_set: &Arc<dyn DescriptorSet>, writes: &[DescriptorWrite]) -> Result<()> {
        let set = downcast::<VulkanDescriptorSet>(descriptor_set.as_any(), "Descriptor set")?;
        let mut samplers = self.samplers
            .lock()
            .map_err(|_| Error::BackendError("Sampler cache lock poisoned".to_string()))?;
        self.descriptors.update(&mut samplers, set, writes)
    }

    // ===== COMMANDS AND SYNCHRONIZATION =====

    fn allocate_command_list(&self, queue: QueueKind, usage: CommandBufferUsage) -> Result<Box<dyn CommandList>> {
        Ok(Box::new(VulkanCommandList::new(Arc::clone(&self.ctx), queue, usage)?))
    }

    fn create_semaphore(&self) -> Result<Arc<dyn Semaphore>> {
        Ok(Arc::new(VulkanSemaphore::new(Arc::clone(&self.ctx))?))
    }

    fn create_fence(&self, signaled: bool) -> Result<Arc<dyn Fence>> {
        Ok(Arc::new(VulkanFence::new(Arc::clone(&self.ctx), signaled)?))
    }

    fn wait_for_fence(&self, fence: &Arc<dyn Fence>, timeout_ns: u64) -> Result<()> {
        let fence = downcast::<VulkanFence>(fence.as_any(), "Fence")?;
        match unsafe { self.ctx.device.wait_for_fences(&[fence.fence], true, timeout_ns) } {
            Ok(()) => Ok(()),
            Err(vk::Result::TIMEOUT) => Err(Error::Timeout(format!("Fence not signaled after {} ns", timeout_ns))),
            Err(e) => Err(engine_err!("prism::vulkan", "Failed to wait for fence: {:?}", e)),
        }
    }

    fn reset_fence(&self, fence: &Arc<dyn Fence>) -> Result<()> {
        let fence = downcast::<VulkanFence>(fence.as_any(), "Fence")?;
        unsafe {
            self.ctx.device.reset_fences(&[fence.fence])
                .map_err(|e| engine_err!("prism::vulkan", "Failed to reset fence: {:?}", e))
        }
    }

    fn submit(&self, submit: &SubmitInfo) -> Result<()> {
        let mut command_buffers = Vec::with_capacity(submit.command_lists.len());
        for list in &submit.command_lists {
            if list.queue() != submit.queue {
                engine_bail!("prism::vulkan",
                    "Command list allocated for {:?} submitted to {:?}", list.queue(), submit.queue);
            }
            command_buffers.push(downcast::<VulkanCommandList>(list.as_any(), "Command list")?.command_buffer());
        }

        let mut wait_semaphores = Vec::with_capacity(submit.waits.len());
        let mut wait_stages = Vec::with_capacity(submit.waits.len());
        for wait in &submit.waits {
            wait_semaphores.push(downcast::<VulkanSemaphore>(wait.semaphore.as_any(), "Wait semaphore")?.semaphore);
            let stage = pipeline_stages_to_vk(wait.stage);
            wait_stages.push(if stage.is_empty() {
                pipeline_stages_to_vk(PipelineStageFlags::ALL_COMMANDS)
            } else {
                stage
            });
        }

        let signal_semaphores = submit.signals
            .iter()
            .map(|semaphore| Ok(downcast::<VulkanSemaphore>(semaphore.as_any(), "Signal semaphore")?.semaphore))
            .collect::<Result<Vec<_>>>()?;

        let fence = match &submit.fence {
            Some(fence) => downcast::<VulkanFence>(fence.as_any(), "Submit fence")?.fence,
            None => vk::Fence::null(),
        };

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        let queue = self.ctx.queue(submit.queue);
        let _guard = queue.lock()?;
        unsafe {
            self.ctx.device.queue_submit(queue.queue, &[submit_info], fence)
                .map_err(|e| engine_err!("prism::vulkan", "Failed to submit to the {:?} queue: {:?}", submit.queue, e))
        }
    }

    fn wait_idle(&self) -> Result<()> {
        unsafe {
            self.ctx.device.device_wait_idle()
                .map_err(|e| engine_err!("prism::vulkan", "Failed to wait for device idle: {:?}", e))
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanGraphicsDevice {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.device_wait_idle().ok();
        }
    }
}
