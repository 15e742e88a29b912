//! Pass objects
//!
//! A pass owns a `RenderPassParameters` builder, an optional pipeline and
//! the command lists it records. The `RenderPassManager` drives passes
//! through the `RenderPass` trait and submits their lists per group.

pub mod render_pass;
pub mod pass_action;
pub mod standard_pass;

pub use render_pass::{
    FrameInfo, PassKind, PassState, PrepareInfo, RecordMode, RenderPass, SubmitGroup,
};
pub use pass_action::{CustomAction, DispatchAction, FullscreenAction, PassAction, RecordContext};
pub use standard_pass::{PassDesc, PipelineContext, StandardPass};
