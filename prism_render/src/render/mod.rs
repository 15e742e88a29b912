/// Render module - resource handles and the device/queue boundary

pub mod graphics_device;
pub mod texture;
pub mod buffer;
pub mod descriptor;
pub mod pipeline;
pub mod render_pass;
pub mod command_list;
pub mod sync;
pub mod swapchain;

pub use graphics_device::*;
pub use texture::*;
pub use buffer::*;
pub use descriptor::*;
pub use pipeline::*;
pub use render_pass::*;
pub use command_list::*;
pub use sync::*;
pub use swapchain::*;

// Mock graphics device for tests (no GPU required)
#[cfg(test)]
pub mod mock_graphics_device;
