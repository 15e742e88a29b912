/// Mock graphics device for unit tests (no GPU required)
///
/// Every object created through `MockGraphicsDevice` is counted while alive.
/// Submissions are executed by a simulated GPU: each queue runs its
/// submissions in order, a submission starts only once all of its wait
/// semaphores are signaled, and binary semaphores are consumed by the wait.
/// In manual mode nothing executes until a fence wait (or `run_gpu`) drives
/// the simulation.

use std::any::Any;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::engine_bail;
use crate::render::{
    Buffer, BufferDesc, BufferUsage, CommandBufferUsage, CommandList, ComputePipelineDesc,
    DescriptorBinding, DescriptorSet, DescriptorSetLayout, DescriptorSetLayoutDesc,
    DescriptorType, DescriptorWrite, DeviceProperties, Fence, Framebuffer, FramebufferDesc,
    GraphicsDevice, GraphicsPipelineDesc, ImageBarrier, IndexType, Pipeline, PipelineBindPoint,
    PipelineLayout, PipelineLayoutDesc, PipelineStageFlags, PushConstantRange, QueueKind,
    Rect2D, RenderPass, RenderPassDesc, Semaphore, ShaderStageFlags, SubmitInfo, Swapchain,
    Texture, TextureDesc, TextureFormat, TextureInfo, TextureUsage, Viewport, AccelerationStructure,
    ClearValue,
};

// ============================================================================
// Simulated GPU state
// ============================================================================

/// Queue of a recorded submission (presentation has its own queue)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockQueue {
    Graphics,
    Compute,
    Present,
}

impl From<QueueKind> for MockQueue {
    fn from(queue: QueueKind) -> Self {
        match queue {
            QueueKind::Graphics => MockQueue::Graphics,
            QueueKind::Compute => MockQueue::Compute,
        }
    }
}

/// A recorded submission
#[derive(Debug, Clone)]
pub struct MockSubmit {
    pub queue: MockQueue,
    /// Commands of every submitted list, in order
    pub command_lists: Vec<Vec<String>>,
    pub waits: Vec<(u64, PipelineStageFlags)>,
    pub signals: Vec<u64>,
    pub fence: Option<u64>,
    pub executed: bool,
}

/// A recorded descriptor set update
#[derive(Debug, Clone)]
pub struct MockDescriptorUpdate {
    pub set_index: u32,
    /// (binding, type, descriptor count)
    pub writes: Vec<(u32, DescriptorType, usize)>,
}

/// Observable event, in the order it happened
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEvent {
    Submitted(usize),
    Executed(usize),
    FenceWaited(u64),
    FenceReset(u64),
    Acquired(u32),
    Presented(u32),
}

#[derive(Default)]
pub struct MockGpuState {
    pub live: FxHashMap<&'static str, i64>,
    pub created: FxHashMap<&'static str, usize>,
    pub descriptor_updates: Vec<MockDescriptorUpdate>,
    pub submits: Vec<MockSubmit>,
    pub events: Vec<MockEvent>,
    pub auto_execute: bool,
    /// The simulated GPU makes no progress at all
    pub stalled: bool,
    /// Next acquire reports an out-of-date swapchain
    pub swapchain_out_of_date: bool,
    semaphores: FxHashMap<u64, bool>,
    fences: FxHashMap<u64, bool>,
    pending: Vec<usize>,
    next_id: u64,
}

impl MockGpuState {
    fn register(&mut self, kind: &'static str) -> u64 {
        self.next_id += 1;
        *self.live.entry(kind).or_insert(0) += 1;
        *self.created.entry(kind).or_insert(0) += 1;
        self.next_id
    }

    fn signal_semaphore(&mut self, id: u64) {
        let signaled = self.semaphores.entry(id).or_insert(false);
        assert!(!*signaled, "binary semaphore {} signaled while already signaled", id);
        *signaled = true;
    }

    pub fn semaphore_signaled(&self, id: u64) -> bool {
        self.semaphores.get(&id).copied().unwrap_or(false)
    }

    pub fn fence_signaled(&self, id: u64) -> bool {
        self.fences.get(&id).copied().unwrap_or(false)
    }

    fn push_submit(&mut self, submit: MockSubmit) {
        let index = self.submits.len();
        self.submits.push(submit);
        self.pending.push(index);
        self.events.push(MockEvent::Submitted(index));
        if self.auto_execute {
            self.execute_ready();
        }
    }

    /// Execute every submission whose waits are satisfied, queue by queue
    pub fn execute_ready(&mut self) {
        if self.stalled {
            return;
        }
        loop {
            let mut progressed = false;
            for queue in [MockQueue::Graphics, MockQueue::Compute, MockQueue::Present] {
                let Some(position) = self.pending.iter().position(|&i| self.submits[i].queue == queue) else {
                    continue;
                };
                let index = self.pending[position];
                let ready = self.submits[index].waits.iter().all(|(id, _)| self.semaphore_signaled(*id));
                if !ready {
                    continue;
                }

                self.pending.remove(position);
                let waits = self.submits[index].waits.clone();
                let signals = self.submits[index].signals.clone();
                for (id, _) in waits {
                    self.semaphores.insert(id, false);
                }
                for id in signals {
                    self.signal_semaphore(id);
                }
                if let Some(fence) = self.submits[index].fence {
                    self.fences.insert(fence, true);
                }
                self.submits[index].executed = true;
                self.events.push(MockEvent::Executed(index));
                progressed = true;
            }
            if !progressed {
                break;
            }
        }
    }

    /// Position of an event in the log
    pub fn event_position(&self, event: &MockEvent) -> Option<usize> {
        self.events.iter().position(|e| e == event)
    }
}

/// Live-object tracker embedded in every mock object
pub struct MockHandle {
    pub kind: &'static str,
    pub id: u64,
    state: Arc<Mutex<MockGpuState>>,
}

impl MockHandle {
    fn new(state: &Arc<Mutex<MockGpuState>>, kind: &'static str) -> Self {
        let id = state.lock().unwrap_or_else(PoisonError::into_inner).register(kind);
        Self { kind, id, state: Arc::clone(state) }
    }
}

impl Drop for MockHandle {
    fn drop(&mut self) {
        // A panicking test may have poisoned the state; the counts stay valid
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        *state.live.entry(self.kind).or_insert(0) -= 1;
    }
}

// ============================================================================
// Mock resources
// ============================================================================

pub struct MockBuffer {
    pub handle: MockHandle,
    pub desc: BufferDesc,
    pub contents: Mutex<Vec<u8>>,
}

impl Buffer for MockBuffer {
    fn size(&self) -> u64 {
        self.desc.size
    }

    fn usage(&self) -> BufferUsage {
        self.desc.usage
    }

    fn update(&self, offset: u64, data: &[u8]) -> Result<()> {
        if !self.desc.host_visible {
            engine_bail!("prism::mock", "update on a buffer that is not host visible");
        }
        let end = offset as usize + data.len();
        if end as u64 > self.desc.size {
            engine_bail!("prism::mock", "update out of bounds: {} > {}", end, self.desc.size);
        }
        self.contents.lock().unwrap_or_else(PoisonError::into_inner)[offset as usize..end].copy_from_slice(data);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct MockTexture {
    pub handle: MockHandle,
    pub info: TextureInfo,
}

impl Texture for MockTexture {
    fn info(&self) -> &TextureInfo {
        &self.info
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct MockAccelerationStructure {
    pub handle: MockHandle,
}

impl AccelerationStructure for MockAccelerationStructure {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Mock layouts, passes and pipelines
// ============================================================================

pub struct MockDescriptorSetLayout {
    pub handle: MockHandle,
    pub set_index: u32,
    pub bindings: Vec<DescriptorBinding>,
}

impl DescriptorSetLayout for MockDescriptorSetLayout {
    fn bindings(&self) -> &[DescriptorBinding] {
        &self.bindings
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct MockDescriptorSet {
    pub handle: MockHandle,
    pub set_index: u32,
}

impl DescriptorSet for MockDescriptorSet {
    fn set_index(&self) -> u32 {
        self.set_index
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct MockPipelineLayout {
    pub handle: MockHandle,
    pub set_layout_count: usize,
    pub push_constant_ranges: Vec<PushConstantRange>,
}

impl PipelineLayout for MockPipelineLayout {
    fn set_layout_count(&self) -> usize {
        self.set_layout_count
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct MockRenderPass {
    pub handle: MockHandle,
    pub desc: RenderPassDesc,
}

impl RenderPass for MockRenderPass {
    fn color_attachment_count(&self) -> u32 {
        self.desc.color_attachments.len() as u32
    }

    fn has_depth_attachment(&self) -> bool {
        self.desc.depth_attachment.is_some()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct MockFramebuffer {
    pub handle: MockHandle,
    pub width: u32,
    pub height: u32,
    pub attachment_formats: Vec<TextureFormat>,
}

impl Framebuffer for MockFramebuffer {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct MockPipeline {
    pub handle: MockHandle,
    pub name: String,
    pub bind_point: PipelineBindPoint,
}

impl Pipeline for MockPipeline {
    fn bind_point(&self) -> PipelineBindPoint {
        self.bind_point
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Mock synchronization
// ============================================================================

pub struct MockSemaphore {
    pub handle: MockHandle,
}

impl Semaphore for MockSemaphore {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct MockFence {
    pub handle: MockHandle,
}

impl Fence for MockFence {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Id of a semaphore created by the mock device
pub fn semaphore_id(semaphore: &Arc<dyn Semaphore>) -> u64 {
    semaphore
        .as_any()
        .downcast_ref::<MockSemaphore>()
        .map(|s| s.handle.id)
        .unwrap_or(0)
}

/// Id of a fence created by the mock device
pub fn fence_id(fence: &Arc<dyn Fence>) -> u64 {
    fence
        .as_any()
        .downcast_ref::<MockFence>()
        .map(|f| f.handle.id)
        .unwrap_or(0)
}

// ============================================================================
// Mock command list
// ============================================================================

pub struct MockCommandList {
    pub handle: MockHandle,
    pub queue: QueueKind,
    pub usage: CommandBufferUsage,
    pub commands: Vec<String>,
    pub recording: bool,
}

impl MockCommandList {
    fn push(&mut self, command: String) -> Result<()> {
        if !self.recording {
            engine_bail!("prism::mock", "'{}' recorded outside begin/end", command);
        }
        self.commands.push(command);
        Ok(())
    }
}

impl CommandList for MockCommandList {
    fn begin(&mut self) -> Result<()> {
        self.commands.clear();
        self.recording = true;
        self.commands.push("begin".to_string());
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        self.push("end".to_string())?;
        self.recording = false;
        Ok(())
    }

    fn begin_render_pass(
        &mut self,
        _render_pass: &Arc<dyn RenderPass>,
        framebuffer: &Arc<dyn Framebuffer>,
        render_area: Rect2D,
        clear_values: &[ClearValue],
    ) -> Result<()> {
        let fb_id = framebuffer
            .as_any()
            .downcast_ref::<MockFramebuffer>()
            .map(|f| f.handle.id)
            .unwrap_or(0);
        self.push(format!(
            "begin_render_pass(fb={}, {}x{}, clears={})",
            fb_id, render_area.width, render_area.height, clear_values.len()
        ))
    }

    fn end_render_pass(&mut self) -> Result<()> {
        self.push("end_render_pass".to_string())
    }

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        self.push(format!("set_viewport({}x{})", viewport.width, viewport.height))
    }

    fn set_scissor(&mut self, scissor: Rect2D) -> Result<()> {
        self.push(format!("set_scissor({}x{})", scissor.width, scissor.height))
    }

    fn bind_pipeline(&mut self, pipeline: &Arc<dyn Pipeline>) -> Result<()> {
        let name = pipeline
            .as_any()
            .downcast_ref::<MockPipeline>()
            .map(|p| p.name.clone())
            .unwrap_or_default();
        self.push(format!("bind_pipeline({})", name))
    }

    fn bind_descriptor_set(
        &mut self,
        _layout: &Arc<dyn PipelineLayout>,
        _bind_point: PipelineBindPoint,
        set_index: u32,
        descriptor_set: &Arc<dyn DescriptorSet>,
    ) -> Result<()> {
        assert_eq!(descriptor_set.set_index(), set_index, "descriptor set bound at the wrong index");
        self.push(format!("bind_descriptor_set({})", set_index))
    }

    fn push_constants(
        &mut self,
        _layout: &Arc<dyn PipelineLayout>,
        _stages: ShaderStageFlags,
        offset: u32,
        data: &[u8],
    ) -> Result<()> {
        self.push(format!("push_constants(offset={}, size={})", offset, data.len()))
    }

    fn bind_vertex_buffer(&mut self, _buffer: &Arc<dyn Buffer>, offset: u64) -> Result<()> {
        self.push(format!("bind_vertex_buffer({})", offset))
    }

    fn bind_index_buffer(&mut self, _buffer: &Arc<dyn Buffer>, offset: u64, _index_type: IndexType) -> Result<()> {
        self.push(format!("bind_index_buffer({})", offset))
    }

    fn draw(&mut self, vertex_count: u32, instance_count: u32, _first_vertex: u32, _first_instance: u32) -> Result<()> {
        self.push(format!("draw({}, {})", vertex_count, instance_count))
    }

    fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        _first_index: u32,
        _vertex_offset: i32,
        _first_instance: u32,
    ) -> Result<()> {
        self.push(format!("draw_indexed({}, {})", index_count, instance_count))
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) -> Result<()> {
        self.push(format!("dispatch({}, {}, {})", x, y, z))
    }

    fn image_barrier(&mut self, barrier: &ImageBarrier) -> Result<()> {
        self.push(format!("image_barrier({:?} -> {:?})", barrier.old_layout, barrier.new_layout))
    }

    fn queue(&self) -> QueueKind {
        self.queue
    }

    fn usage(&self) -> CommandBufferUsage {
        self.usage
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Mock graphics device
// ============================================================================

pub struct MockGraphicsDevice {
    state: Arc<Mutex<MockGpuState>>,
    properties: DeviceProperties,
}

impl MockGraphicsDevice {
    /// Device whose GPU executes submissions as soon as they are ready
    pub fn new() -> Self {
        Self::with_auto_execute(true)
    }

    /// Device whose GPU only runs when a fence wait or `run_gpu` drives it
    pub fn new_manual() -> Self {
        Self::with_auto_execute(false)
    }

    fn with_auto_execute(auto_execute: bool) -> Self {
        let state = MockGpuState { auto_execute, ..Default::default() };
        Self {
            state: Arc::new(Mutex::new(state)),
            properties: DeviceProperties {
                device_name: "Mock GPU".to_string(),
                has_dedicated_compute_queue: true,
                ..Default::default()
            },
        }
    }

    pub fn state(&self) -> MutexGuard<'_, MockGpuState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn shared_state(&self) -> Arc<Mutex<MockGpuState>> {
        Arc::clone(&self.state)
    }

    /// Number of live objects of `kind` ("render_pass", "framebuffer", ...)
    pub fn live_count(&self, kind: &str) -> i64 {
        self.state().live.get(kind).copied().unwrap_or(0)
    }

    pub fn created_count(&self, kind: &str) -> usize {
        self.state().created.get(kind).copied().unwrap_or(0)
    }

    pub fn descriptor_update_count(&self) -> usize {
        self.state().descriptor_updates.len()
    }

    pub fn set_stalled(&self, stalled: bool) {
        self.state().stalled = stalled;
    }

    /// Let the simulated GPU execute everything it can
    pub fn run_gpu(&self) {
        self.state().execute_ready();
    }

    pub fn create_acceleration_structure(&self) -> Arc<dyn AccelerationStructure> {
        Arc::new(MockAccelerationStructure {
            handle: MockHandle::new(&self.state, "acceleration_structure"),
        })
    }

    pub fn create_swapchain(&self, image_count: usize, width: u32, height: u32) -> MockSwapchain {
        MockSwapchain::new(Arc::clone(&self.state), image_count, width, height)
    }
}

impl Default for MockGraphicsDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphicsDevice for MockGraphicsDevice {
    fn properties(&self) -> &DeviceProperties {
        &self.properties
    }

    fn create_buffer(&self, desc: &BufferDesc) -> Result<Arc<dyn Buffer>> {
        if desc.size == 0 {
            engine_bail!("prism::mock", "zero-sized buffer");
        }
        Ok(Arc::new(MockBuffer {
            handle: MockHandle::new(&self.state, "buffer"),
            desc: *desc,
            contents: Mutex::new(vec![0; desc.size as usize]),
        }))
    }

    fn create_texture(&self, desc: &TextureDesc) -> Result<Arc<dyn Texture>> {
        if desc.width == 0 || desc.height == 0 {
            engine_bail!("prism::mock", "zero-sized texture");
        }
        Ok(Arc::new(MockTexture {
            handle: MockHandle::new(&self.state, "texture"),
            info: TextureInfo::from(desc),
        }))
    }

    fn create_descriptor_set_layout(&self, desc: &DescriptorSetLayoutDesc) -> Result<Arc<dyn DescriptorSetLayout>> {
        Ok(Arc::new(MockDescriptorSetLayout {
            handle: MockHandle::new(&self.state, "descriptor_set_layout"),
            set_index: desc.set_index,
            bindings: desc.bindings.clone(),
        }))
    }

    fn create_pipeline_layout(&self, desc: &PipelineLayoutDesc) -> Result<Arc<dyn PipelineLayout>> {
        let total: u32 = desc.push_constant_ranges.iter().map(|r| r.offset + r.size).max().unwrap_or(0);
        if total > self.properties.max_push_constant_size {
            engine_bail!("prism::mock", "push constants exceed {} bytes", self.properties.max_push_constant_size);
        }
        Ok(Arc::new(MockPipelineLayout {
            handle: MockHandle::new(&self.state, "pipeline_layout"),
            set_layout_count: desc.set_layouts.len(),
            push_constant_ranges: desc.push_constant_ranges.clone(),
        }))
    }

    fn create_render_pass(&self, desc: &RenderPassDesc) -> Result<Arc<dyn RenderPass>> {
        Ok(Arc::new(MockRenderPass {
            handle: MockHandle::new(&self.state, "render_pass"),
            desc: desc.clone(),
        }))
    }

    fn create_framebuffer(&self, desc: &FramebufferDesc) -> Result<Arc<dyn Framebuffer>> {
        let expected = desc.render_pass.color_attachment_count() as usize
            + usize::from(desc.render_pass.has_depth_attachment());
        if desc.attachments.len() != expected {
            engine_bail!(
                "prism::mock",
                "framebuffer has {} attachments, render pass expects {}",
                desc.attachments.len(),
                expected
            );
        }
        Ok(Arc::new(MockFramebuffer {
            handle: MockHandle::new(&self.state, "framebuffer"),
            width: desc.width,
            height: desc.height,
            attachment_formats: desc.attachments.iter().map(|t| t.info().format).collect(),
        }))
    }

    fn create_graphics_pipeline(&self, desc: &GraphicsPipelineDesc) -> Result<Arc<dyn Pipeline>> {
        Ok(Arc::new(MockPipeline {
            handle: MockHandle::new(&self.state, "pipeline"),
            name: desc.name.clone(),
            bind_point: PipelineBindPoint::Graphics,
        }))
    }

    fn create_compute_pipeline(&self, desc: &ComputePipelineDesc) -> Result<Arc<dyn Pipeline>> {
        Ok(Arc::new(MockPipeline {
            handle: MockHandle::new(&self.state, "pipeline"),
            name: desc.name.clone(),
            bind_point: PipelineBindPoint::Compute,
        }))
    }

    fn allocate_descriptor_set(&self, layout: &Arc<dyn DescriptorSetLayout>, set_index: u32) -> Result<Arc<dyn DescriptorSet>> {
        if layout.as_any().downcast_ref::<MockDescriptorSetLayout>().is_none() {
            return Err(Error::InvalidResource("layout was not created by the mock device".to_string()));
        }
        Ok(Arc::new(MockDescriptorSet {
            handle: MockHandle::new(&self.state, "descriptor_set"),
            set_index,
        }))
    }

    fn update_descriptor_set(&self, descriptor_set: &Arc<dyn DescriptorSet>, writes: &[DescriptorWrite]) -> Result<()> {
        let update = MockDescriptorUpdate {
            set_index: descriptor_set.set_index(),
            writes: writes.iter().map(|w| (w.binding, w.descriptor_type, w.resources.len())).collect(),
        };
        self.state().descriptor_updates.push(update);
        Ok(())
    }

    fn allocate_command_list(&self, queue: QueueKind, usage: CommandBufferUsage) -> Result<Box<dyn CommandList>> {
        Ok(Box::new(MockCommandList {
            handle: MockHandle::new(&self.state, "command_list"),
            queue,
            usage,
            commands: Vec::new(),
            recording: false,
        }))
    }

    fn create_semaphore(&self) -> Result<Arc<dyn Semaphore>> {
        let handle = MockHandle::new(&self.state, "semaphore");
        self.state().semaphores.insert(handle.id, false);
        Ok(Arc::new(MockSemaphore { handle }))
    }

    fn create_fence(&self, signaled: bool) -> Result<Arc<dyn Fence>> {
        let handle = MockHandle::new(&self.state, "fence");
        self.state().fences.insert(handle.id, signaled);
        Ok(Arc::new(MockFence { handle }))
    }

    fn wait_for_fence(&self, fence: &Arc<dyn Fence>, _timeout_ns: u64) -> Result<()> {
        let id = fence_id(fence);
        let mut state = self.state();
        if !state.fence_signaled(id) {
            state.execute_ready();
        }
        if !state.fence_signaled(id) {
            return Err(Error::Timeout(format!("fence {} never signaled", id)));
        }
        state.events.push(MockEvent::FenceWaited(id));
        Ok(())
    }

    fn reset_fence(&self, fence: &Arc<dyn Fence>) -> Result<()> {
        let id = fence_id(fence);
        let mut state = self.state();
        state.fences.insert(id, false);
        state.events.push(MockEvent::FenceReset(id));
        Ok(())
    }

    fn submit(&self, submit: &SubmitInfo) -> Result<()> {
        let mut command_lists = Vec::with_capacity(submit.command_lists.len());
        for list in &submit.command_lists {
            let Some(mock) = list.as_any().downcast_ref::<MockCommandList>() else {
                return Err(Error::InvalidResource("command list was not created by the mock device".to_string()));
            };
            if mock.recording {
                engine_bail!("prism::mock", "submitted a command list that is still recording");
            }
            if mock.queue != submit.queue {
                engine_bail!("prism::mock", "command list for {:?} submitted to {:?}", mock.queue, submit.queue);
            }
            command_lists.push(mock.commands.clone());
        }

        let record = MockSubmit {
            queue: submit.queue.into(),
            command_lists,
            waits: submit.waits.iter().map(|w| (semaphore_id(&w.semaphore), w.stage)).collect(),
            signals: submit.signals.iter().map(semaphore_id).collect(),
            fence: submit.fence.as_ref().map(fence_id),
            executed: false,
        };
        self.state().push_submit(record);
        Ok(())
    }

    fn wait_idle(&self) -> Result<()> {
        let mut state = self.state();
        state.execute_ready();
        if !state.pending.is_empty() {
            return Err(Error::Timeout("device never became idle".to_string()));
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Mock swapchain
// ============================================================================

pub struct MockSwapchain {
    state: Arc<Mutex<MockGpuState>>,
    images: Vec<Arc<dyn Texture>>,
    next_image: u32,
    width: u32,
    height: u32,
    pub recreate_count: usize,
}

impl MockSwapchain {
    fn new(state: Arc<Mutex<MockGpuState>>, image_count: usize, width: u32, height: u32) -> Self {
        let mut swapchain = Self {
            state,
            images: Vec::new(),
            next_image: 0,
            width,
            height,
            recreate_count: 0,
        };
        swapchain.create_images(image_count);
        swapchain
    }

    fn create_images(&mut self, image_count: usize) {
        self.images = (0..image_count)
            .map(|_| {
                Arc::new(MockTexture {
                    handle: MockHandle::new(&self.state, "swapchain_image"),
                    info: TextureInfo {
                        width: self.width,
                        height: self.height,
                        format: TextureFormat::B8G8R8A8_SRGB,
                        usage: TextureUsage::COLOR_ATTACHMENT,
                        mip_levels: 1,
                        array_layers: 1,
                    },
                }) as Arc<dyn Texture>
            })
            .collect();
        self.next_image = 0;
    }
}

impl Swapchain for MockSwapchain {
    fn acquire_next_image(&mut self, signal: &Arc<dyn Semaphore>) -> Result<u32> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.swapchain_out_of_date {
            return Err(Error::SwapchainOutOfDate);
        }
        let index = self.next_image;
        self.next_image = (self.next_image + 1) % self.images.len() as u32;
        state.signal_semaphore(semaphore_id(signal));
        state.events.push(MockEvent::Acquired(index));
        Ok(index)
    }

    fn present(&mut self, image_index: u32, wait: &Arc<dyn Semaphore>) -> Result<()> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.events.push(MockEvent::Presented(image_index));
        state.push_submit(MockSubmit {
            queue: MockQueue::Present,
            command_lists: Vec::new(),
            waits: vec![(semaphore_id(wait), PipelineStageFlags::BOTTOM_OF_PIPE)],
            signals: Vec::new(),
            fence: None,
            executed: false,
        });
        Ok(())
    }

    fn recreate(&mut self, width: u32, height: u32) -> Result<()> {
        let image_count = self.images.len();
        self.width = width;
        self.height = height;
        self.images.clear();
        self.create_images(image_count);
        self.recreate_count += 1;
        self.state.lock().unwrap_or_else(PoisonError::into_inner).swapchain_out_of_date = false;
        Ok(())
    }

    fn image_count(&self) -> usize {
        self.images.len()
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn format(&self) -> TextureFormat {
        TextureFormat::B8G8R8A8_SRGB
    }

    fn image(&self, index: usize) -> Arc<dyn Texture> {
        Arc::clone(&self.images[index])
    }
}

#[cfg(test)]
#[path = "mock_graphics_device_tests.rs"]
mod tests;
