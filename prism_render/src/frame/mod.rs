//! Frame scheduling
//!
//! The `RenderPassManager` owns the passes and drives every frame:
//! acquire, fence wait, record, submit in three groups, present.
//! `FrameSync` holds the semaphores and fences wiring the groups together.

pub mod frame_sync;
pub mod view_uniforms;
pub mod render_pass_manager;

pub use frame_sync::FrameSync;
pub use view_uniforms::ViewUniforms;
pub use render_pass_manager::{FrameStats, PassHandle, PassKey, RenderPassManager};
