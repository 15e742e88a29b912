/// Pass action trait and implementations.
///
/// Defines what a pass records inside its command list. When the pass has
/// a render pass, the action runs between begin_render_pass() and
/// end_render_pass(); compute passes run it directly.

use std::sync::Arc;
use bytemuck::Pod;
use crate::error::Result;
use crate::parameters::{BindingResource, RenderPassParameters};
use crate::pass::FrameInfo;
use crate::render::{
    Buffer, CommandList, DescriptorSet, GraphicsDevice, Pipeline, PipelineLayout, Rect2D,
    ShaderStageFlags,
};
use crate::scene::SceneDrawLists;
use crate::{engine_bail, engine_trace};

/// Everything an action may use while recording
///
/// Descriptor sets allocated here are retained together with the command
/// list being recorded, and released when that list is recorded again.
pub struct RecordContext<'a> {
    device: &'a dyn GraphicsDevice,
    parameters: &'a RenderPassParameters,
    pipeline: Option<&'a Arc<dyn Pipeline>>,
    frame: FrameInfo,
    render_area: Rect2D,
    scene: &'a dyn SceneDrawLists,
    view_uniforms: Option<&'a Arc<dyn Buffer>>,
    retained: &'a mut Vec<Arc<dyn DescriptorSet>>,
    skipped: usize,
}

impl<'a> RecordContext<'a> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        device: &'a dyn GraphicsDevice,
        parameters: &'a RenderPassParameters,
        pipeline: Option<&'a Arc<dyn Pipeline>>,
        frame: FrameInfo,
        render_area: Rect2D,
        scene: &'a dyn SceneDrawLists,
        view_uniforms: Option<&'a Arc<dyn Buffer>>,
        retained: &'a mut Vec<Arc<dyn DescriptorSet>>,
    ) -> Self {
        Self {
            device,
            parameters,
            pipeline,
            frame,
            render_area,
            scene,
            view_uniforms,
            retained,
            skipped: 0,
        }
    }

    pub fn device(&self) -> &'a dyn GraphicsDevice {
        self.device
    }

    pub fn parameters(&self) -> &'a RenderPassParameters {
        self.parameters
    }

    pub fn pipeline(&self) -> Option<&'a Arc<dyn Pipeline>> {
        self.pipeline
    }

    pub fn pipeline_layout(&self) -> Option<&'a Arc<dyn PipelineLayout>> {
        self.parameters.pipeline_layout()
    }

    pub fn frame(&self) -> FrameInfo {
        self.frame
    }

    pub fn image_index(&self) -> u32 {
        self.frame.image_index
    }

    pub fn render_area(&self) -> Rect2D {
        self.render_area
    }

    pub fn scene(&self) -> &'a dyn SceneDrawLists {
        self.scene
    }

    /// View uniform buffer of the image being recorded
    pub fn view_uniforms(&self) -> Option<&'a Arc<dyn Buffer>> {
        self.view_uniforms
    }

    /// Allocations that came back not updated so far
    pub fn skipped_allocations(&self) -> usize {
        self.skipped
    }

    /// Allocate `set_index` with the stored resources
    ///
    /// Returns `None` when a resource is still pending: the caller skips the
    /// draw that needed it.
    pub fn allocate_descriptor_set(&mut self, set_index: u32) -> Result<Option<Arc<dyn DescriptorSet>>> {
        let allocation = self.parameters.allocate_descriptor_set(self.device, set_index)?;
        Ok(self.keep(allocation.descriptor_set, allocation.updated, set_index))
    }

    /// Allocate `set_index` with `resources` supplied in declaration order
    pub fn allocate_descriptor_set_with(
        &mut self,
        resources: &[BindingResource],
        set_index: u32,
    ) -> Result<Option<Arc<dyn DescriptorSet>>> {
        let allocation = self.parameters.allocate_descriptor_set_with(self.device, resources, set_index)?;
        Ok(self.keep(allocation.descriptor_set, allocation.updated, set_index))
    }

    fn keep(&mut self, descriptor_set: Arc<dyn DescriptorSet>, updated: bool, set_index: u32) -> Option<Arc<dyn DescriptorSet>> {
        if !updated {
            self.skipped += 1;
            engine_trace!(
                "prism::RecordContext",
                "'{}': set {} has pending resources, draw skipped",
                self.parameters.name(),
                set_index
            );
            return None;
        }
        self.retained.push(Arc::clone(&descriptor_set));
        Some(descriptor_set)
    }

    /// Allocate and bind every set of the pass with the stored resources
    ///
    /// Returns `false` (nothing bound past the first pending set) when any
    /// set could not be written.
    pub fn bind_descriptor_sets(&mut self, cmd: &mut dyn CommandList) -> Result<bool> {
        let Some(pipeline) = self.pipeline else {
            engine_bail!("prism::RecordContext", "'{}' binds descriptor sets without a pipeline", self.parameters.name());
        };
        let Some(layout) = self.parameters.pipeline_layout() else {
            engine_bail!("prism::RecordContext", "'{}' is not finalized", self.parameters.name());
        };
        for set_index in 0..self.parameters.set_count() as u32 {
            let Some(descriptor_set) = self.allocate_descriptor_set(set_index)? else {
                return Ok(false);
            };
            cmd.bind_descriptor_set(layout, pipeline.bind_point(), set_index, &descriptor_set)?;
        }
        Ok(true)
    }
}

/// Action executed by a pass
///
/// Determines what commands are recorded into the pass's command list.
pub trait PassAction: Send + Sync {
    /// Record commands into the command list
    fn execute(&mut self, ctx: &mut RecordContext, cmd: &mut dyn CommandList) -> Result<()>;
}

/// Push constant block recorded before a draw or dispatch
struct PushConstantBlock {
    stages: ShaderStageFlags,
    offset: u32,
    data: Vec<u8>,
}

impl PushConstantBlock {
    fn record(&self, ctx: &RecordContext, cmd: &mut dyn CommandList) -> Result<()> {
        let Some(layout) = ctx.pipeline_layout() else {
            engine_bail!("prism::PassAction", "'{}' pushes constants before finalize", ctx.parameters().name());
        };
        cmd.push_constants(layout, self.stages, self.offset, &self.data)
    }
}

fn bound_pipeline<'a>(ctx: &RecordContext<'a>, action: &str) -> Result<&'a Arc<dyn Pipeline>> {
    match ctx.pipeline() {
        Some(pipeline) => Ok(pipeline),
        None => engine_bail!("prism::PassAction", "{} in '{}' has no pipeline", action, ctx.parameters().name()),
    }
}

/// Fullscreen pass action (data-driven, no closure)
///
/// Binds the pass pipeline and every descriptor set, then draws a
/// fullscreen triangle (3 vertices). Used for lighting, composite and
/// post-processing passes. The draw is skipped while a set is pending.
pub struct FullscreenAction {
    push_constants: Option<PushConstantBlock>,
}

impl FullscreenAction {
    pub fn new() -> Self {
        Self { push_constants: None }
    }

    /// Push `value` at `offset` before drawing
    pub fn with_push_constants<T: Pod>(mut self, stages: ShaderStageFlags, offset: u32, value: &T) -> Self {
        self.push_constants = Some(PushConstantBlock {
            stages,
            offset,
            data: bytemuck::bytes_of(value).to_vec(),
        });
        self
    }
}

impl Default for FullscreenAction {
    fn default() -> Self {
        Self::new()
    }
}

impl PassAction for FullscreenAction {
    fn execute(&mut self, ctx: &mut RecordContext, cmd: &mut dyn CommandList) -> Result<()> {
        let pipeline = bound_pipeline(ctx, "FullscreenAction")?;
        cmd.bind_pipeline(pipeline)?;
        if !ctx.bind_descriptor_sets(cmd)? {
            return Ok(());
        }
        if let Some(block) = &self.push_constants {
            block.record(ctx, cmd)?;
        }
        cmd.draw(3, 1, 0, 0)
    }
}

enum DispatchSize {
    Groups(u32, u32, u32),
    /// One invocation per pixel of the render area
    PerPixel { local_x: u32, local_y: u32 },
}

/// Compute dispatch action
///
/// Binds the compute pipeline and every descriptor set, then dispatches
/// either a fixed group count or enough groups to cover the render area.
pub struct DispatchAction {
    size: DispatchSize,
    push_constants: Option<PushConstantBlock>,
}

impl DispatchAction {
    pub fn new(group_count_x: u32, group_count_y: u32, group_count_z: u32) -> Self {
        Self {
            size: DispatchSize::Groups(group_count_x, group_count_y, group_count_z),
            push_constants: None,
        }
    }

    /// Cover the render area with `local_x` x `local_y` workgroups
    pub fn per_pixel(local_x: u32, local_y: u32) -> Self {
        assert!(local_x > 0 && local_y > 0, "workgroup size must be non-zero");
        Self {
            size: DispatchSize::PerPixel { local_x, local_y },
            push_constants: None,
        }
    }

    pub fn with_push_constants<T: Pod>(mut self, stages: ShaderStageFlags, offset: u32, value: &T) -> Self {
        self.push_constants = Some(PushConstantBlock {
            stages,
            offset,
            data: bytemuck::bytes_of(value).to_vec(),
        });
        self
    }

    fn group_counts(&self, area: Rect2D) -> (u32, u32, u32) {
        match self.size {
            DispatchSize::Groups(x, y, z) => (x, y, z),
            DispatchSize::PerPixel { local_x, local_y } => (
                area.width.div_ceil(local_x),
                area.height.div_ceil(local_y),
                1,
            ),
        }
    }
}

impl PassAction for DispatchAction {
    fn execute(&mut self, ctx: &mut RecordContext, cmd: &mut dyn CommandList) -> Result<()> {
        let pipeline = bound_pipeline(ctx, "DispatchAction")?;
        cmd.bind_pipeline(pipeline)?;
        if !ctx.bind_descriptor_sets(cmd)? {
            return Ok(());
        }
        if let Some(block) = &self.push_constants {
            block.record(ctx, cmd)?;
        }
        let (x, y, z) = self.group_counts(ctx.render_area());
        if x == 0 || y == 0 || z == 0 {
            return Ok(());
        }
        cmd.dispatch(x, y, z)
    }
}

/// Custom pass action (closure-based)
///
/// Executes a user-provided closure for full control over command
/// recording. Used for scene passes (GBuffer, shadows) walking the draw
/// lists, and for clear-only passes with an empty closure.
pub struct CustomAction {
    callback: Box<dyn FnMut(&mut RecordContext, &mut dyn CommandList) -> Result<()> + Send + Sync>,
}

impl CustomAction {
    pub fn new<F>(callback: F) -> Self
    where
        F: FnMut(&mut RecordContext, &mut dyn CommandList) -> Result<()> + Send + Sync + 'static,
    {
        Self { callback: Box::new(callback) }
    }

    /// Action recording nothing (the render pass load/store ops do the work)
    pub fn empty() -> Self {
        Self::new(|_, _| Ok(()))
    }
}

impl PassAction for CustomAction {
    fn execute(&mut self, ctx: &mut RecordContext, cmd: &mut dyn CommandList) -> Result<()> {
        (self.callback)(ctx, cmd)
    }
}

#[cfg(test)]
#[path = "pass_action_tests.rs"]
mod tests;
