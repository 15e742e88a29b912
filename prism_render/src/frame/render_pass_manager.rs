/// Render pass manager - owns the passes and drives the frame loop.
///
/// A frame is:
///
/// 1. `begin_frame`: acquire a swapchain image, wait on its fence, release
///    retired resources, (re)prepare invalidated passes and write the view
///    uniforms of that image
/// 2. `record_dynamic_cmd_buffers`: re-record the dynamic passes for the
///    acquired image
/// 3. `submit_command_buffers`: three submissions in group order
///    - A (graphics): signals `depthReady` when group B has work
///    - B (async compute): waits on `depthReady`, signals `computeFinished`
///    - C (present): waits on `imageAvailable` and `computeFinished`,
///      signals `renderFinished` and the image fence
/// 4. `present`
///
/// `render_frame` runs the four steps in order.

use std::marker::PhantomData;
use std::sync::Arc;
use slotmap::{new_key_type, SecondaryMap, SlotMap};
use crate::context::RenderContext;
use crate::error::Result;
use crate::frame::{FrameSync, ViewUniforms};
use crate::pass::{FrameInfo, PassKind, PassState, PrepareInfo, RecordMode, RenderPass, SubmitGroup};
use crate::render::{
    Buffer, CommandList, PipelineStageFlags, QueueKind, SemaphoreWait, SubmitInfo, Swapchain,
    Texture,
};
use crate::scene::{FrameDrawLists, SceneDrawLists};
use crate::{engine_bail, engine_debug, engine_error, engine_info, engine_trace, engine_warn};

new_key_type! {
    /// Key of a pass registered in a `RenderPassManager`
    pub struct PassKey;
}

/// Typed key of a registered pass
///
/// Gives back the concrete pass type through `RenderPassManager::pass`.
pub struct PassHandle<P> {
    key: PassKey,
    _marker: PhantomData<fn() -> P>,
}

impl<P> PassHandle<P> {
    pub fn key(&self) -> PassKey {
        self.key
    }
}

impl<P> Clone for PassHandle<P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<P> Copy for PassHandle<P> {}

impl<P> std::fmt::Debug for PassHandle<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PassHandle").field(&self.key).finish()
    }
}

impl<P> From<PassHandle<P>> for PassKey {
    fn from(handle: PassHandle<P>) -> Self {
        handle.key
    }
}

struct PassEntry {
    pass: Box<dyn RenderPass>,
    needs_prepare: bool,
    /// One-time pass already submitted
    one_time_done: bool,
}

/// What the last frame did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub frame_number: u64,
    pub image_index: u32,
    /// Queue submissions (present excluded)
    pub submissions: usize,
    pub command_lists: usize,
}

/// Progress of the current frame through begin, submit and present
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameState {
    Idle,
    /// Image acquired into the spare semaphore, its fence not waited on yet
    Acquired(u32),
    /// Fence waited on, `imageAvailable` of the image signaled
    Ready(u32),
    /// Present group submitted, `renderFinished` of the image signaled
    Submitted(u32),
}

#[derive(Clone, Copy)]
enum Mark {
    Visiting,
    Done,
}

pub struct RenderPassManager {
    context: Arc<RenderContext>,
    swapchain: Box<dyn Swapchain>,
    swapchain_images: Vec<Arc<dyn Texture>>,
    sync: FrameSync,
    view_buffers: Vec<Arc<dyn Buffer>>,
    passes: SlotMap<PassKey, PassEntry>,
    /// Registration order, the tie-breaker of the execution order
    insertion: Vec<PassKey>,
    /// (before, after)
    dependencies: Vec<(PassKey, PassKey)>,
    order: Vec<PassKey>,
    compute_queue: QueueKind,
    render_area: (u32, u32),
    frame_number: u64,
    frame_state: FrameState,
    stats: FrameStats,
    destroyed: bool,
}

fn view_buffer_name(image_index: usize) -> String {
    format!("prism.view.{}", image_index)
}

impl RenderPassManager {
    pub fn new(context: Arc<RenderContext>, swapchain: Box<dyn Swapchain>) -> Result<Self> {
        let image_count = swapchain.image_count();
        if image_count == 0 {
            engine_bail!("prism::RenderPassManager", "Swapchain has no images");
        }
        let sync = FrameSync::new(context.device().as_ref(), image_count)?;
        let view_buffers = Self::create_view_buffers(&context, image_count, 0)?;
        let swapchain_images = (0..image_count).map(|i| swapchain.image(i)).collect();

        let compute_queue = if context.config().use_async_compute_queue && context.properties().has_dedicated_compute_queue {
            QueueKind::Compute
        } else {
            QueueKind::Graphics
        };
        let render_area = (context.config().render_width, context.config().render_height);

        engine_info!(
            "prism::RenderPassManager",
            "Created with {} swapchain image(s), async compute on {:?}",
            image_count,
            compute_queue
        );

        Ok(Self {
            context,
            swapchain,
            swapchain_images,
            sync,
            view_buffers,
            passes: SlotMap::with_key(),
            insertion: Vec::new(),
            dependencies: Vec::new(),
            order: Vec::new(),
            compute_queue,
            render_area,
            frame_number: 0,
            frame_state: FrameState::Idle,
            stats: FrameStats::default(),
            destroyed: false,
        })
    }

    fn create_view_buffers(context: &RenderContext, image_count: usize, previous_count: usize) -> Result<Vec<Arc<dyn Buffer>>> {
        let mut resources = context.resources()?;
        for stale in image_count..previous_count {
            resources.remove(&view_buffer_name(stale));
        }
        (0..image_count)
            .map(|i| resources.get_or_create_uniform_buffer(&view_buffer_name(i), ViewUniforms::SIZE))
            .collect()
    }

    // ===== PASSES =====

    /// Register a pass; it is prepared at the next `begin_frame`
    pub fn add_pass<P: RenderPass + 'static>(&mut self, pass: P) -> PassHandle<P> {
        let name = pass.name().to_string();
        let key = self.passes.insert(PassEntry {
            pass: Box::new(pass),
            needs_prepare: true,
            one_time_done: false,
        });
        self.insertion.push(key);
        self.order.push(key);
        engine_debug!("prism::RenderPassManager", "Added pass '{}'", name);
        PassHandle { key, _marker: PhantomData }
    }

    pub fn pass<P: RenderPass + 'static>(&self, handle: PassHandle<P>) -> Option<&P> {
        self.passes.get(handle.key)?.pass.as_any().downcast_ref::<P>()
    }

    pub fn pass_mut<P: RenderPass + 'static>(&mut self, handle: PassHandle<P>) -> Option<&mut P> {
        self.passes.get_mut(handle.key)?.pass.as_any_mut().downcast_mut::<P>()
    }

    /// Untyped access
    pub fn pass_dyn(&self, key: PassKey) -> Option<&dyn RenderPass> {
        self.passes.get(key).map(|entry| entry.pass.as_ref())
    }

    /// Destroy and unregister a pass. Waits for the device to be idle.
    ///
    /// Returns `false` for an unknown key.
    pub fn remove_pass(&mut self, key: impl Into<PassKey>) -> Result<bool> {
        let key = key.into();
        if !self.passes.contains_key(key) {
            return Ok(false);
        }
        self.context.device().wait_idle()?;
        let Some(mut entry) = self.passes.remove(key) else {
            return Ok(false);
        };
        entry.pass.destroy();
        self.insertion.retain(|k| *k != key);
        self.order.retain(|k| *k != key);
        self.dependencies.retain(|(before, after)| *before != key && *after != key);
        engine_debug!("prism::RenderPassManager", "Removed pass '{}'", entry.pass.name());
        Ok(true)
    }

    /// Make `before` record and submit ahead of `after`
    ///
    /// Fails for unknown keys, for a dependency against the submit group
    /// order and for a cycle. On failure the execution order is unchanged.
    pub fn add_dependency(&mut self, before: impl Into<PassKey>, after: impl Into<PassKey>) -> Result<()> {
        let (before, after) = (before.into(), after.into());
        let (Some(first), Some(second)) = (self.passes.get(before), self.passes.get(after)) else {
            engine_bail!("prism::RenderPassManager", "Dependency between unknown passes");
        };
        let (first_group, second_group) = (first.pass.submit_group(), second.pass.submit_group());
        if first_group > second_group {
            engine_bail!(
                "prism::RenderPassManager",
                "'{}' ({:?}) cannot run before '{}' ({:?})",
                first.pass.name(),
                first_group,
                second.pass.name(),
                second_group
            );
        }

        self.dependencies.push((before, after));
        match self.sorted_order() {
            Ok(order) => {
                self.order = order;
                Ok(())
            }
            Err(err) => {
                self.dependencies.pop();
                Err(err)
            }
        }
    }

    /// Registration order with every pass moved after its dependencies
    fn sorted_order(&self) -> Result<Vec<PassKey>> {
        let mut marks = SecondaryMap::new();
        let mut order = Vec::with_capacity(self.insertion.len());
        for key in &self.insertion {
            self.visit(*key, &mut marks, &mut order)?;
        }
        Ok(order)
    }

    fn visit(&self, key: PassKey, marks: &mut SecondaryMap<PassKey, Mark>, order: &mut Vec<PassKey>) -> Result<()> {
        match marks.get(key) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                let name = self.passes.get(key).map(|e| e.pass.name()).unwrap_or("?");
                engine_bail!("prism::RenderPassManager", "Dependency cycle through '{}'", name);
            }
            None => {}
        }
        marks.insert(key, Mark::Visiting);
        for (before, _) in self.dependencies.iter().filter(|(_, after)| *after == key) {
            self.visit(*before, marks, order)?;
        }
        marks.insert(key, Mark::Done);
        order.push(key);
        Ok(())
    }

    /// Pass keys in record and submit order
    pub fn execution_order(&self) -> &[PassKey] {
        &self.order
    }

    /// Re-prepare the pass at the next `begin_frame`
    ///
    /// A one-time pass invalidated this way runs once more.
    pub fn invalidate(&mut self, key: impl Into<PassKey>) -> bool {
        let Some(entry) = self.passes.get_mut(key.into()) else {
            return false;
        };
        entry.needs_prepare = true;
        entry.one_time_done = false;
        true
    }

    /// Prepare every pass not prepared yet
    ///
    /// Called by the first `begin_frame`; call it earlier to move pipeline
    /// creation out of the first frame.
    pub fn initialize(&mut self) -> Result<()> {
        self.prepare_pending_passes(0)
    }

    fn prepare_pending_passes(&mut self, image_index: u32) -> Result<()> {
        let pending: Vec<PassKey> = self
            .order
            .iter()
            .copied()
            .filter(|key| self.passes.get(*key).is_some_and(|e| e.needs_prepare))
            .collect();
        if pending.is_empty() {
            return Ok(());
        }

        // Prepared passes may still have lists in flight on other images
        let in_use = pending
            .iter()
            .any(|key| self.passes.get(*key).is_some_and(|e| e.pass.state() != PassState::Uninitialized));
        if in_use {
            self.context.device().wait_idle()?;
        }

        let info = PrepareInfo {
            render_width: self.render_area.0,
            render_height: self.render_area.1,
            swapchain_images: &self.swapchain_images,
            swapchain_format: self.swapchain.format(),
            view_uniforms: &self.view_buffers,
            compute_queue: self.compute_queue,
        };
        let frame = FrameInfo { frame_number: self.frame_number, image_index };
        let empty_scene = FrameDrawLists::new();

        for key in pending {
            let Some(entry) = self.passes.get_mut(key) else { continue };
            let pass = entry.pass.as_mut();
            pass.prepare_render_pass(&self.context, &info)?;
            pass.create_pipeline(&self.context)?;
            if pass.record_mode() == RecordMode::Static {
                pass.record_command_buffers(&self.context, &frame, &empty_scene)?;
            }
            entry.needs_prepare = false;
            engine_trace!("prism::RenderPassManager", "Prepared '{}'", entry.pass.name());
        }
        Ok(())
    }

    // ===== FRAME =====

    /// Acquire the next image and get its per-image objects ready for reuse
    ///
    /// Returns the acquired image index. `Error::SwapchainOutOfDate` means
    /// `resize` must be called before the next frame. An image left
    /// acquired by a failed or unfinished frame is resumed rather than
    /// acquired again; a submitted but unpresented frame is presented first.
    pub fn begin_frame(&mut self, view: &ViewUniforms) -> Result<u32> {
        let image_index = match self.frame_state {
            FrameState::Idle => self.acquire_image()?,
            FrameState::Acquired(image_index) => self.wait_for_image(image_index)?,
            FrameState::Ready(image_index) => {
                engine_warn!("prism::RenderPassManager", "Frame for image {} was never submitted, restarting it", image_index);
                image_index
            }
            FrameState::Submitted(image_index) => {
                engine_warn!("prism::RenderPassManager", "Frame for image {} was never presented, presenting it", image_index);
                self.present()?;
                self.acquire_image()?
            }
        };

        {
            let mut resources = self.context.resources()?;
            resources.begin_frame(self.frame_number);
            let released = resources.collect_retired(self.frame_number, self.sync.image_count() as u64);
            if released > 0 {
                engine_trace!("prism::RenderPassManager", "Released {} retired resource(s)", released);
            }
        }

        self.prepare_pending_passes(image_index)?;
        self.view_buffers[image_index as usize].update(0, view.as_bytes())?;

        self.stats = FrameStats {
            frame_number: self.frame_number,
            image_index,
            submissions: 0,
            command_lists: 0,
        };
        Ok(image_index)
    }

    /// Acquire the next image and wait until its previous frame completed
    fn acquire_image(&mut self) -> Result<u32> {
        let image_index = self.swapchain.acquire_next_image(self.sync.acquire_semaphore())?;
        self.frame_state = FrameState::Acquired(image_index);
        self.wait_for_image(image_index)
    }

    /// Wait on the fence of an acquired image, then give the image the
    /// semaphore its acquire signaled
    ///
    /// On failure the image stays acquired and the next `begin_frame` waits
    /// on the same fence again.
    fn wait_for_image(&mut self, image_index: u32) -> Result<u32> {
        let fence = Arc::clone(self.sync.fence(image_index));
        if let Err(err) = self.context.device().wait_for_fence(&fence, self.context.config().fence_timeout_ns) {
            engine_error!(
                "prism::RenderPassManager",
                "Frame {}: fence of image {} not signaled: {}",
                self.frame_number,
                image_index,
                err
            );
            return Err(err);
        }
        self.sync.commit_acquire(image_index);
        self.frame_state = FrameState::Ready(image_index);
        Ok(image_index)
    }

    fn frame_image(&self, operation: &str) -> Result<u32> {
        match self.frame_state {
            FrameState::Ready(image_index) => Ok(image_index),
            _ => engine_bail!("prism::RenderPassManager", "{} outside begin_frame/submit", operation),
        }
    }

    /// Give back the semaphores of a frame that will not be rendered
    ///
    /// A submitted frame is presented. An acquired one gets an empty
    /// submission that waits on its `imageAvailable` and signals its fence.
    fn release_frame(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.frame_state, FrameState::Idle) {
            FrameState::Idle => {}
            FrameState::Submitted(image_index) => {
                self.frame_state = FrameState::Submitted(image_index);
                if let Err(err) = self.present() {
                    engine_debug!("prism::RenderPassManager", "Present of abandoned image {} failed: {}", image_index, err);
                }
            }
            FrameState::Acquired(image_index) => {
                self.frame_state = FrameState::Acquired(image_index);
                self.wait_for_image(image_index)?;
                self.frame_state = FrameState::Idle;
                self.consume_image_available(image_index)?;
            }
            FrameState::Ready(image_index) => self.consume_image_available(image_index)?,
        }
        Ok(())
    }

    fn consume_image_available(&self, image_index: u32) -> Result<()> {
        let device = self.context.device();
        let fence = Arc::clone(self.sync.fence(image_index));
        device.reset_fence(&fence)?;
        device.submit(&SubmitInfo {
            queue: QueueKind::Graphics,
            command_lists: Vec::new(),
            waits: vec![SemaphoreWait {
                semaphore: Arc::clone(self.sync.image_available(image_index)),
                stage: PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            }],
            signals: Vec::new(),
            fence: Some(fence),
        })
    }

    /// Re-record every dynamic pass for the acquired image
    pub fn record_dynamic_cmd_buffers(&mut self, scene: &dyn SceneDrawLists) -> Result<()> {
        let image_index = self.frame_image("record_dynamic_cmd_buffers")?;
        let frame = FrameInfo { frame_number: self.frame_number, image_index };
        for key in &self.order {
            let Some(entry) = self.passes.get_mut(*key) else { continue };
            if entry.one_time_done || entry.pass.record_mode() != RecordMode::Dynamic {
                continue;
            }
            entry.pass.record_command_buffers(&self.context, &frame, scene)?;
        }
        Ok(())
    }

    /// Submit the recorded lists of the acquired image in three groups
    pub fn submit_command_buffers(&mut self) -> Result<()> {
        let image_index = self.frame_image("submit_command_buffers")?;
        let device = Arc::clone(self.context.device());

        let mut graphics: Vec<&dyn CommandList> = Vec::new();
        let mut compute: Vec<&dyn CommandList> = Vec::new();
        let mut present: Vec<&dyn CommandList> = Vec::new();
        let mut one_time = Vec::new();
        for key in &self.order {
            let Some(entry) = self.passes.get(*key) else { continue };
            if entry.one_time_done {
                continue;
            }
            let Some(list) = entry.pass.command_list(image_index) else {
                continue;
            };
            match entry.pass.submit_group() {
                SubmitGroup::Graphics => graphics.push(list),
                SubmitGroup::AsyncCompute => compute.push(list),
                SubmitGroup::Present => present.push(list),
            }
            if entry.pass.kind().is_one_time() {
                one_time.push(*key);
            }
        }

        let list_count = graphics.len() + compute.len() + present.len();
        let has_compute = !compute.is_empty();
        let graphics_submitted = !graphics.is_empty();
        let mut submissions = 0;

        if graphics_submitted {
            let signals = if has_compute { vec![Arc::clone(self.sync.depth_ready())] } else { Vec::new() };
            device.submit(&SubmitInfo {
                queue: QueueKind::Graphics,
                command_lists: graphics,
                waits: Vec::new(),
                signals,
                fence: None,
            })?;
            submissions += 1;
        }

        if has_compute {
            let waits = if graphics_submitted {
                vec![SemaphoreWait {
                    semaphore: Arc::clone(self.sync.depth_ready()),
                    stage: PipelineStageFlags::COMPUTE_SHADER,
                }]
            } else {
                Vec::new()
            };
            device.submit(&SubmitInfo {
                queue: self.compute_queue,
                command_lists: compute,
                waits,
                signals: vec![Arc::clone(self.sync.compute_finished())],
                fence: None,
            })?;
            submissions += 1;
        }

        // Group C always goes out: it consumes imageAvailable and signals
        // the fence the next use of this image waits on
        let mut waits = vec![SemaphoreWait {
            semaphore: Arc::clone(self.sync.image_available(image_index)),
            stage: PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
        }];
        if has_compute {
            waits.push(SemaphoreWait {
                semaphore: Arc::clone(self.sync.compute_finished()),
                stage: PipelineStageFlags::FRAGMENT_SHADER,
            });
        }
        let fence = Arc::clone(self.sync.fence(image_index));
        device.reset_fence(&fence)?;
        device.submit(&SubmitInfo {
            queue: QueueKind::Graphics,
            command_lists: present,
            waits,
            signals: vec![Arc::clone(self.sync.render_finished(image_index))],
            fence: Some(fence),
        })?;
        submissions += 1;

        for key in one_time {
            if let Some(entry) = self.passes.get_mut(key) {
                entry.one_time_done = true;
                engine_debug!("prism::RenderPassManager", "One-time pass '{}' submitted", entry.pass.name());
            }
        }

        self.frame_state = FrameState::Submitted(image_index);
        self.stats.submissions = submissions;
        self.stats.command_lists = list_count;
        Ok(())
    }

    /// Present the acquired image. The frame counter advances even when
    /// presentation fails.
    pub fn present(&mut self) -> Result<()> {
        let FrameState::Submitted(image_index) = self.frame_state else {
            engine_bail!("prism::RenderPassManager", "present without a submitted frame");
        };
        self.frame_state = FrameState::Idle;
        let result = self.swapchain.present(image_index, self.sync.render_finished(image_index));
        self.frame_number += 1;
        result
    }

    /// One whole frame
    pub fn render_frame(&mut self, view: &ViewUniforms, scene: &dyn SceneDrawLists) -> Result<FrameStats> {
        self.begin_frame(view)?;
        self.record_dynamic_cmd_buffers(scene)?;
        self.submit_command_buffers()?;
        let stats = self.stats;
        self.present()?;
        Ok(stats)
    }

    /// Recreate the swapchain and everything sized by it
    ///
    /// A zero-sized surface (minimized window) is ignored.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            engine_debug!("prism::RenderPassManager", "Ignoring resize to {}x{}", width, height);
            return Ok(());
        }
        self.release_frame()?;
        let device = Arc::clone(self.context.device());
        device.wait_idle()?;

        let previous_count = self.sync.image_count();
        self.swapchain.recreate(width, height)?;
        let image_count = self.swapchain.image_count();
        self.swapchain_images = (0..image_count).map(|i| self.swapchain.image(i)).collect();

        let recreated = self.context.resources()?.resize_render_targets(width, height)?;
        self.render_area = (width, height);

        if image_count != previous_count {
            self.sync = FrameSync::new(device.as_ref(), image_count)?;
            self.view_buffers = Self::create_view_buffers(&self.context, image_count, previous_count)?;
        }

        for entry in self.passes.values_mut() {
            if !entry.one_time_done {
                entry.needs_prepare = true;
            }
        }

        engine_info!(
            "prism::RenderPassManager",
            "Resized to {}x{} ({} image(s), {} render target(s) recreated)",
            width,
            height,
            image_count,
            recreated
        );
        Ok(())
    }

    /// Wait for the device and destroy every pass
    pub fn destroy(&mut self) -> Result<()> {
        if self.destroyed {
            return Ok(());
        }
        self.context.device().wait_idle()?;
        for entry in self.passes.values_mut() {
            entry.pass.destroy();
        }
        self.passes.clear();
        self.insertion.clear();
        self.order.clear();
        self.dependencies.clear();
        self.frame_state = FrameState::Idle;
        self.context.resources()?.release_all_retired();
        self.destroyed = true;
        engine_info!("prism::RenderPassManager", "Destroyed after {} frame(s)", self.frame_number);
        Ok(())
    }

    // ===== ACCESSORS =====

    pub fn context(&self) -> &Arc<RenderContext> {
        &self.context
    }

    pub fn frame_sync(&self) -> &FrameSync {
        &self.sync
    }

    pub fn swapchain(&self) -> &dyn Swapchain {
        self.swapchain.as_ref()
    }

    /// Stats of the last submitted frame
    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    pub fn image_count(&self) -> usize {
        self.sync.image_count()
    }

    /// Number of the next frame to begin
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    /// View uniform buffer of `image_index`
    pub fn view_buffer(&self, image_index: u32) -> Option<&Arc<dyn Buffer>> {
        self.view_buffers.get(image_index as usize)
    }

    /// Passes of `kind`, in execution order
    pub fn passes_of_kind(&self, kind: PassKind) -> Vec<PassKey> {
        self.order
            .iter()
            .copied()
            .filter(|key| self.passes.get(*key).is_some_and(|e| e.pass.kind() == kind))
            .collect()
    }
}

impl Drop for RenderPassManager {
    fn drop(&mut self) {
        if let Err(err) = self.destroy() {
            engine_error!("prism::RenderPassManager", "Destroy on drop failed: {}", err);
        }
    }
}

#[cfg(test)]
#[path = "render_pass_manager_tests.rs"]
mod tests;
