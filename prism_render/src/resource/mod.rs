pub mod render_resource_manager;

pub use render_resource_manager::{RenderResourceManager, TargetSize};
