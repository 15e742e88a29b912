/*!
# Prism Render - Vulkan Backend

Vulkan implementation of the `prism_render` device boundary, using ash for
the Vulkan bindings and gpu-allocator for memory management.

```no_run
use std::sync::Arc;
use prism_render::prism::{RenderConfig, RenderContext, RenderPassManager};
use prism_render_vulkan::VulkanGraphicsDevice;

# fn run(window: &winit::window::Window) -> prism_render::prism::Result<()> {
let config = RenderConfig::default();
let device = Arc::new(VulkanGraphicsDevice::new(window, &config)?);
let swapchain = device.create_swapchain(window, 1280, 720)?;
let context = Arc::new(RenderContext::new(device, config));
let _manager = RenderPassManager::new(context, Box::new(swapchain))?;
# Ok(())
# }
```

The `vulkan-validation` feature compiles in the Khronos validation layer
and a debug messenger that forwards its messages to the Prism logger.
*/

mod vulkan_buffer;
mod vulkan_command_list;
mod vulkan_context;
mod vulkan_debug;
mod vulkan_descriptor;
mod vulkan_device;
mod vulkan_format;
mod vulkan_pipeline;
mod vulkan_render_pass;
mod vulkan_sampler;
mod vulkan_swapchain;
mod vulkan_sync;
mod vulkan_texture;

pub use vulkan_buffer::VulkanBuffer;
pub use vulkan_command_list::VulkanCommandList;
pub use vulkan_context::{VulkanContext, VulkanQueue};
pub use vulkan_descriptor::{VulkanDescriptorSet, VulkanDescriptorSetLayout};
pub use vulkan_device::VulkanGraphicsDevice;
pub use vulkan_pipeline::{VulkanPipeline, VulkanPipelineLayout};
pub use vulkan_render_pass::{VulkanFramebuffer, VulkanRenderPass};
pub use vulkan_swapchain::VulkanSwapchain;
pub use vulkan_sync::{VulkanFence, VulkanSemaphore};
pub use vulkan_texture::VulkanTexture;

pub use vulkan_debug::{get_validation_stats, print_validation_stats_report, ValidationStats};
