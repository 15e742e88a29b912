/// Data-driven pass built from a description, a setup closure, an optional
/// pipeline factory and a `PassAction`.
///
/// The setup closure declares the pass parameters against the current
/// render context (render targets, swapchain images, view uniforms). It
/// runs on every `prepare_render_pass`, so a resize re-declares everything
/// against the recreated targets.

use std::any::Any;
use std::sync::Arc;
use crate::context::RenderContext;
use crate::error::Result;
use crate::parameters::RenderPassParameters;
use crate::pass::{
    FrameInfo, PassAction, PassKind, PassState, PrepareInfo, RecordContext, RecordMode,
    RenderPass, SubmitGroup,
};
use crate::render::{
    self, Buffer, CommandBufferUsage, CommandList, DescriptorSet, GraphicsDevice, Pipeline,
    PipelineLayout, QueueKind, Rect2D, Viewport,
};
use crate::scene::SceneDrawLists;
use crate::{engine_bail, engine_debug, engine_trace};

/// Name, kind and record mode of a pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassDesc {
    pub name: String,
    pub kind: PassKind,
    pub record_mode: RecordMode,
}

impl PassDesc {
    /// Description using the kind's default record mode
    pub fn new(name: &str, kind: PassKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            record_mode: kind.default_record_mode(),
        }
    }

    pub fn with_record_mode(mut self, record_mode: RecordMode) -> Self {
        self.record_mode = record_mode;
        self
    }
}

/// Inputs of a pipeline factory
pub struct PipelineContext<'a> {
    pub device: &'a dyn GraphicsDevice,
    pub pass_name: &'a str,
    pub layout: &'a Arc<dyn PipelineLayout>,
    /// `None` for compute passes
    pub render_pass: Option<&'a Arc<dyn render::RenderPass>>,
}

type SetupFn = Box<dyn FnMut(&mut RenderPassParameters, &RenderContext, &PrepareInfo) -> Result<()> + Send + Sync>;
type PipelineFactory = Box<dyn Fn(&PipelineContext) -> Result<Arc<dyn Pipeline>> + Send + Sync>;

pub struct StandardPass {
    desc: PassDesc,
    state: PassState,
    parameters: RenderPassParameters,
    setup: SetupFn,
    pipeline_factory: Option<PipelineFactory>,
    pipeline: Option<Arc<dyn Pipeline>>,
    action: Box<dyn PassAction>,
    queue: QueueKind,
    render_extent: (u32, u32),
    view_uniforms: Vec<Arc<dyn Buffer>>,
    command_lists: Vec<Box<dyn CommandList>>,
    /// Descriptor sets referenced by each command list
    retained_sets: Vec<Vec<Arc<dyn DescriptorSet>>>,
    recorded: Vec<bool>,
    record_count: u64,
}

impl StandardPass {
    pub fn new<S, A>(desc: PassDesc, setup: S, action: A) -> Self
    where
        S: FnMut(&mut RenderPassParameters, &RenderContext, &PrepareInfo) -> Result<()> + Send + Sync + 'static,
        A: PassAction + 'static,
    {
        let parameters = RenderPassParameters::new(&desc.name);
        Self {
            desc,
            state: PassState::Uninitialized,
            parameters,
            setup: Box::new(setup),
            pipeline_factory: None,
            pipeline: None,
            action: Box::new(action),
            queue: QueueKind::Graphics,
            render_extent: (0, 0),
            view_uniforms: Vec::new(),
            command_lists: Vec::new(),
            retained_sets: Vec::new(),
            recorded: Vec::new(),
            record_count: 0,
        }
    }

    /// Create the pass pipeline with `factory` in `create_pipeline`
    pub fn with_pipeline<F>(mut self, factory: F) -> Self
    where
        F: Fn(&PipelineContext) -> Result<Arc<dyn Pipeline>> + Send + Sync + 'static,
    {
        self.pipeline_factory = Some(Box::new(factory));
        self
    }

    pub fn desc(&self) -> &PassDesc {
        &self.desc
    }

    pub fn pipeline(&self) -> Option<&Arc<dyn Pipeline>> {
        self.pipeline.as_ref()
    }

    /// Queue the pass lists are allocated for
    pub fn queue(&self) -> QueueKind {
        self.queue
    }

    pub fn command_list_count(&self) -> usize {
        self.command_lists.len()
    }

    /// Descriptor sets held by the list of `image_index`
    pub fn retained_set_count(&self, image_index: u32) -> usize {
        self.slot(image_index).map(|slot| self.retained_sets[slot].len()).unwrap_or(0)
    }

    /// Number of list recordings since creation
    pub fn record_count(&self) -> u64 {
        self.record_count
    }

    /// Replace the action; the pass must be recorded again to see it
    pub fn set_action<A: PassAction + 'static>(&mut self, action: A) {
        self.action = Box::new(action);
    }

    fn slot(&self, image_index: u32) -> Option<usize> {
        match self.command_lists.len() {
            0 => None,
            1 => Some(0),
            count => Some(image_index as usize).filter(|&slot| slot < count),
        }
    }

    fn release_gpu_objects(&mut self) {
        self.command_lists.clear();
        self.retained_sets.clear();
        self.recorded.clear();
        self.pipeline = None;
        self.parameters.destroy();
    }

    fn record_slot(&mut self, device: &dyn GraphicsDevice, slot: usize, frame: FrameInfo, scene: &dyn SceneDrawLists) -> Result<()> {
        let render_area = {
            let area = self.parameters.render_area();
            if area.width > 0 && area.height > 0 {
                area
            } else {
                Rect2D::from_extent(self.render_extent.0, self.render_extent.1)
            }
        };
        let frame = FrameInfo { image_index: slot as u32, ..frame };

        // Sets of the previous recording are no longer referenced once the
        // list is reset
        self.retained_sets[slot].clear();
        self.recorded[slot] = false;

        let cmd = self.command_lists[slot].as_mut();
        cmd.begin()?;

        let render_pass = self.parameters.render_pass();
        if let Some(render_pass) = render_pass {
            let Some(framebuffer) = self.parameters.framebuffer(slot as u32) else {
                engine_bail!("prism::StandardPass", "'{}' has no framebuffer for image {}", self.desc.name, slot);
            };
            cmd.begin_render_pass(render_pass, framebuffer, render_area, &self.parameters.clear_values())?;
            cmd.set_viewport(Viewport::from_rect(render_area))?;
            cmd.set_scissor(render_area)?;
        }

        let mut ctx = RecordContext::new(
            device,
            &self.parameters,
            self.pipeline.as_ref(),
            frame,
            render_area,
            scene,
            self.view_uniforms.get(slot),
            &mut self.retained_sets[slot],
        );
        self.action.execute(&mut ctx, cmd)?;
        let skipped = ctx.skipped_allocations();

        if render_pass.is_some() {
            cmd.end_render_pass()?;
        }
        cmd.end()?;

        self.recorded[slot] = true;
        self.record_count += 1;
        engine_trace!(
            "prism::StandardPass",
            "Recorded '{}' list {} (frame {}, {} skipped allocation(s))",
            self.desc.name,
            slot,
            frame.frame_number,
            skipped
        );
        Ok(())
    }
}

impl RenderPass for StandardPass {
    fn name(&self) -> &str {
        &self.desc.name
    }

    fn kind(&self) -> PassKind {
        self.desc.kind
    }

    fn state(&self) -> PassState {
        self.state
    }

    fn record_mode(&self) -> RecordMode {
        self.desc.record_mode
    }

    fn touches_swapchain(&self) -> bool {
        self.parameters.renders_to_swapchain()
    }

    fn prepare_render_pass(&mut self, context: &RenderContext, info: &PrepareInfo) -> Result<()> {
        if matches!(self.state, PassState::Prepared | PassState::PipelineCreated | PassState::Recorded) {
            engine_debug!("prism::StandardPass", "Re-preparing '{}', releasing previous GPU objects", self.desc.name);
            self.release_gpu_objects();
        }
        self.state = PassState::Uninitialized;

        let device = context.device();
        let mut parameters = RenderPassParameters::new(&self.desc.name);
        (self.setup)(&mut parameters, context, info)?;
        parameters.finalize(device.as_ref())?;
        self.parameters = parameters;

        self.queue = match self.desc.kind.submit_group() {
            SubmitGroup::AsyncCompute => info.compute_queue,
            SubmitGroup::Graphics | SubmitGroup::Present => QueueKind::Graphics,
        };
        self.render_extent = (info.render_width, info.render_height);
        self.view_uniforms = info.view_uniforms.to_vec();

        let list_count = if self.desc.record_mode == RecordMode::Dynamic || self.parameters.renders_to_swapchain() {
            info.image_count()
        } else {
            1
        };
        let usage = if self.desc.kind.is_one_time() {
            CommandBufferUsage::Immediate
        } else {
            match self.desc.record_mode {
                RecordMode::Static => CommandBufferUsage::Static,
                RecordMode::Dynamic => CommandBufferUsage::Reusable,
            }
        };
        for _ in 0..list_count {
            self.command_lists.push(device.allocate_command_list(self.queue, usage)?);
        }
        self.retained_sets = vec![Vec::new(); list_count];
        self.recorded = vec![false; list_count];

        self.state = PassState::Prepared;
        engine_debug!(
            "prism::StandardPass",
            "Prepared '{}' ({:?}, {} command list(s) on {:?})",
            self.desc.name,
            self.desc.kind,
            list_count,
            self.queue
        );
        Ok(())
    }

    fn create_pipeline(&mut self, context: &RenderContext) -> Result<()> {
        assert_eq!(
            self.state,
            PassState::Prepared,
            "'{}': create_pipeline requires a prepared pass",
            self.desc.name
        );
        if let Some(factory) = &self.pipeline_factory {
            let Some(layout) = self.parameters.pipeline_layout() else {
                engine_bail!("prism::StandardPass", "'{}' has no pipeline layout", self.desc.name);
            };
            let pipeline = factory(&PipelineContext {
                device: context.device().as_ref(),
                pass_name: &self.desc.name,
                layout,
                render_pass: self.parameters.render_pass(),
            })?;
            self.pipeline = Some(pipeline);
        }
        self.state = PassState::PipelineCreated;
        Ok(())
    }

    fn record_command_buffers(&mut self, context: &RenderContext, frame: &FrameInfo, scene: &dyn SceneDrawLists) -> Result<()> {
        assert!(
            matches!(self.state, PassState::PipelineCreated | PassState::Recorded),
            "'{}': record_command_buffers in state {:?}",
            self.desc.name,
            self.state
        );
        let device = Arc::clone(context.device());
        match self.desc.record_mode {
            RecordMode::Static => {
                for slot in 0..self.command_lists.len() {
                    self.record_slot(device.as_ref(), slot, *frame, scene)?;
                }
            }
            RecordMode::Dynamic => {
                let Some(slot) = self.slot(frame.image_index) else {
                    engine_bail!(
                        "prism::StandardPass",
                        "'{}' has no command list for image {}",
                        self.desc.name,
                        frame.image_index
                    );
                };
                self.record_slot(device.as_ref(), slot, *frame, scene)?;
            }
        }
        self.state = PassState::Recorded;
        Ok(())
    }

    fn command_list(&self, image_index: u32) -> Option<&dyn CommandList> {
        let slot = self.slot(image_index)?;
        if !self.recorded[slot] {
            return None;
        }
        Some(self.command_lists[slot].as_ref())
    }

    fn parameters(&self) -> &RenderPassParameters {
        &self.parameters
    }

    fn destroy(&mut self) {
        if self.state == PassState::Destroyed {
            return;
        }
        self.release_gpu_objects();
        self.state = PassState::Destroyed;
        engine_debug!("prism::StandardPass", "Destroyed '{}'", self.desc.name);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
#[path = "standard_pass_tests.rs"]
mod tests;
