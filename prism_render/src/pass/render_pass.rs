/// Render pass node driven by the `RenderPassManager`.
///
/// High-level rendering step (shadow pass, GBuffer, composite, ...). Not to
/// be confused with `render::RenderPass`, the low-level GPU render pass
/// object a pass creates through its parameters.
///
/// Lifecycle:
///
/// ```text
/// Uninitialized -> Prepared -> PipelineCreated -> Recorded (re-recorded) -> Destroyed
///                     ^                                 |
///                     +------- prepare_render_pass -----+   (resize, invalidate)
/// ```

use std::any::Any;
use std::sync::Arc;
use crate::context::RenderContext;
use crate::error::Result;
use crate::parameters::RenderPassParameters;
use crate::render::{Buffer, CommandList, QueueKind, Texture, TextureFormat};
use crate::scene::SceneDrawLists;

/// Lifecycle state of a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassState {
    Uninitialized,
    /// Parameters finalized, command lists allocated
    Prepared,
    PipelineCreated,
    /// At least one command list holds commands
    Recorded,
    /// GPU objects released; `prepare_render_pass` may bring it back
    Destroyed,
}

/// Submission group of a pass within a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SubmitGroup {
    /// Group A, graphics queue: precompute, shadows, GBuffer, lighting.
    /// Signals `depthReady` when group B has work.
    Graphics,
    /// Group B, compute queue: work reading GBuffer depth.
    /// Waits on `depthReady` at the compute shader stage.
    AsyncCompute,
    /// Group C, graphics queue: UI and final composite to the swapchain.
    /// Waits on the acquired image, signals `renderFinished` and the image fence.
    Present,
}

/// What a pass is
///
/// The tag decides the submit group and whether the pass runs once. Code
/// that needs a concrete pass type goes through a typed `PassHandle`
/// instead of inspecting the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassKind {
    /// Environment map / IBL cubemap generation (once)
    EnvironmentPrecompute,
    /// Mesh shader precomputation (once)
    MeshPrecompute,
    Shadow,
    GBuffer,
    OpaqueLighting,
    Skybox,
    /// Compute work reading GBuffer depth (AO, depth linearization)
    DepthCompute,
    Ui,
    Composite,
}

impl PassKind {
    pub fn submit_group(self) -> SubmitGroup {
        match self {
            PassKind::EnvironmentPrecompute
            | PassKind::MeshPrecompute
            | PassKind::Shadow
            | PassKind::GBuffer
            | PassKind::OpaqueLighting
            | PassKind::Skybox => SubmitGroup::Graphics,
            PassKind::DepthCompute => SubmitGroup::AsyncCompute,
            PassKind::Ui | PassKind::Composite => SubmitGroup::Present,
        }
    }

    /// Runs in the first submitted frame only
    pub fn is_one_time(self) -> bool {
        matches!(self, PassKind::EnvironmentPrecompute | PassKind::MeshPrecompute)
    }

    /// Passes consuming the scene draw lists change every frame
    pub fn default_record_mode(self) -> RecordMode {
        match self {
            PassKind::Shadow | PassKind::GBuffer | PassKind::Ui => RecordMode::Dynamic,
            _ => RecordMode::Static,
        }
    }
}

/// When a pass records its command lists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordMode {
    /// Recorded once after preparation, resubmitted every frame
    Static,
    /// Re-recorded every frame into the list of the acquired image
    Dynamic,
}

/// Frame-independent inputs of `prepare_render_pass`
pub struct PrepareInfo<'a> {
    pub render_width: u32,
    pub render_height: u32,
    /// Swapchain images, in image index order (empty when headless)
    pub swapchain_images: &'a [Arc<dyn Texture>],
    pub swapchain_format: TextureFormat,
    /// Per-image view uniform buffers, in image index order
    pub view_uniforms: &'a [Arc<dyn Buffer>],
    /// Queue used by `SubmitGroup::AsyncCompute` passes
    pub compute_queue: QueueKind,
}

impl PrepareInfo<'_> {
    /// Number of frames that can be in flight (at least 1)
    pub fn image_count(&self) -> usize {
        self.swapchain_images.len().max(1)
    }
}

/// Per-frame inputs of `record_command_buffers`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    pub frame_number: u64,
    pub image_index: u32,
}

/// Pass driven by the `RenderPassManager`
pub trait RenderPass: Send + Sync {
    fn name(&self) -> &str;

    fn kind(&self) -> PassKind;

    fn state(&self) -> PassState;

    fn record_mode(&self) -> RecordMode;

    fn submit_group(&self) -> SubmitGroup {
        self.kind().submit_group()
    }

    /// Whether the pass renders into the swapchain image
    fn touches_swapchain(&self) -> bool;

    /// Declare and finalize the parameters, allocate command lists
    ///
    /// Calling it again first releases every GPU object of the previous
    /// preparation.
    fn prepare_render_pass(&mut self, context: &RenderContext, info: &PrepareInfo) -> Result<()>;

    fn create_pipeline(&mut self, context: &RenderContext) -> Result<()>;

    /// Record the command lists
    ///
    /// Static passes record every list; dynamic passes record the list of
    /// `frame.image_index` only. The caller guarantees the GPU is done with
    /// the lists being recorded.
    fn record_command_buffers(&mut self, context: &RenderContext, frame: &FrameInfo, scene: &dyn SceneDrawLists) -> Result<()>;

    /// Recorded list to submit for `image_index`, if any
    fn command_list(&self, image_index: u32) -> Option<&dyn CommandList>;

    fn parameters(&self) -> &RenderPassParameters;

    /// Release every GPU object of the pass
    fn destroy(&mut self);

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

#[cfg(test)]
#[path = "render_pass_tests.rs"]
mod tests;
