/*!
# Prism Render

Render-pass orchestration core of the Prism renderer.

This crate binds GPU resources to shader interfaces, builds render pass,
framebuffer and pipeline objects for each pass, and schedules per-frame
command list submission across the graphics and async compute queues. It is
backend-agnostic: the GPU is reached through the `GraphicsDevice` and
`Swapchain` traits, implemented for Vulkan by `prism_render_vulkan`.

## Architecture

- **RenderPassParameters**: declares descriptor bindings, attachments and
  push constants, then creates layouts, render pass and framebuffers
- **RenderPass / StandardPass**: pass lifecycle (prepare, pipeline, record)
- **RenderPassManager**: owns the passes and drives the frame loop
  (acquire, fence wait, record, three-group submit, present)
- **RenderContext**: device, named resource table and configuration,
  passed explicitly to everything that needs them
- **SceneDrawLists**: per-frame draw lists consumed by scene passes
*/

// Internal modules
mod error;
pub mod config;
pub mod context;
pub mod log;
pub mod render;
pub mod resource;
pub mod parameters;
pub mod pass;
pub mod frame;
pub mod scene;
pub mod utils;

// Main prism namespace module
pub mod prism {
    // Error types
    pub use crate::error::{Error, Result};

    // Explicit render context and its configuration
    pub use crate::context::RenderContext;
    pub use crate::config::{DescriptorPoolSizes, RenderConfig};

    // Frame loop
    pub use crate::frame::{FrameStats, FrameSync, PassHandle, PassKey, RenderPassManager, ViewUniforms};

    // Logging sub-module (types only, macros are exported at the crate root)
    pub mod log {
        pub use crate::log::{reset_logger, set_logger, set_min_severity, DefaultLogger, LogEntry, LogSeverity, Logger};
    }

    // Render sub-module with the device/queue boundary and resource handles
    pub mod render {
        pub use crate::render::*;
    }

    // Resource sub-module
    pub mod resource {
        pub use crate::resource::*;
    }

    // Parameter builder sub-module
    pub mod parameters {
        pub use crate::parameters::*;
    }

    // Pass sub-module
    pub mod pass {
        pub use crate::pass::*;
    }

    // Scene collaborator sub-module
    pub mod scene {
        pub use crate::scene::*;
    }
}

// Re-export math library at crate root
pub use glam;
