/// GraphicsDevice trait - the device/queue boundary

use std::any::Any;
use std::sync::Arc;
use crate::error::Result;
use crate::render::{
    Buffer, BufferDesc, CommandBufferUsage, CommandList, ComputePipelineDesc,
    DescriptorSet, DescriptorSetLayout, DescriptorSetLayoutDesc, DescriptorWrite,
    Fence, Framebuffer, FramebufferDesc, GraphicsPipelineDesc, Pipeline,
    PipelineLayout, PipelineLayoutDesc, RenderPass, RenderPassDesc, Semaphore,
    SubmitInfo, Texture, TextureDesc,
};

/// Queue a submission goes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueKind {
    /// Graphics (also used for presentation and for compute when the
    /// device has no dedicated compute queue)
    Graphics,
    /// Asynchronous compute
    Compute,
}

/// Device properties and limits the render core relies on
#[derive(Debug, Clone)]
pub struct DeviceProperties {
    pub device_name: String,
    pub vendor_id: u32,
    pub api_version: (u32, u32, u32),
    /// `QueueKind::Compute` runs on its own queue family
    pub has_dedicated_compute_queue: bool,
    pub max_push_constant_size: u32,
    pub max_bound_descriptor_sets: u32,
    pub min_uniform_buffer_offset_alignment: u64,
}

impl Default for DeviceProperties {
    fn default() -> Self {
        Self {
            device_name: String::new(),
            vendor_id: 0,
            api_version: (1, 2, 0),
            has_dedicated_compute_queue: false,
            max_push_constant_size: 128,
            max_bound_descriptor_sets: 4,
            min_uniform_buffer_offset_alignment: 256,
        }
    }
}

/// Graphics device: creates GPU objects and submits work to queues
///
/// Every creation call is fatal on failure from the render core's point of
/// view: errors are returned to the caller and never retried.
pub trait GraphicsDevice: Send + Sync {
    fn properties(&self) -> &DeviceProperties;

    // ===== RESOURCES =====

    fn create_buffer(&self, desc: &BufferDesc) -> Result<Arc<dyn Buffer>>;

    fn create_texture(&self, desc: &TextureDesc) -> Result<Arc<dyn Texture>>;

    // ===== LAYOUTS AND PIPELINES =====

    fn create_descriptor_set_layout(&self, desc: &DescriptorSetLayoutDesc) -> Result<Arc<dyn DescriptorSetLayout>>;

    fn create_pipeline_layout(&self, desc: &PipelineLayoutDesc) -> Result<Arc<dyn PipelineLayout>>;

    fn create_render_pass(&self, desc: &RenderPassDesc) -> Result<Arc<dyn RenderPass>>;

    fn create_framebuffer(&self, desc: &FramebufferDesc) -> Result<Arc<dyn Framebuffer>>;

    fn create_graphics_pipeline(&self, desc: &GraphicsPipelineDesc) -> Result<Arc<dyn Pipeline>>;

    fn create_compute_pipeline(&self, desc: &ComputePipelineDesc) -> Result<Arc<dyn Pipeline>>;

    // ===== DESCRIPTORS =====

    /// Allocate a set from the device's pools (pools grow when exhausted)
    fn allocate_descriptor_set(&self, layout: &Arc<dyn DescriptorSetLayout>, set_index: u32) -> Result<Arc<dyn DescriptorSet>>;

    /// Write resources into a set
    fn update_descriptor_set(&self, descriptor_set: &Arc<dyn DescriptorSet>, writes: &[DescriptorWrite]) -> Result<()>;

    // ===== COMMANDS AND SYNCHRONIZATION =====

    fn allocate_command_list(&self, queue: QueueKind, usage: CommandBufferUsage) -> Result<Box<dyn CommandList>>;

    fn create_semaphore(&self) -> Result<Arc<dyn Semaphore>>;

    fn create_fence(&self, signaled: bool) -> Result<Arc<dyn Fence>>;

    /// Block until `fence` is signaled or `timeout_ns` elapses (`Error::Timeout`)
    fn wait_for_fence(&self, fence: &Arc<dyn Fence>, timeout_ns: u64) -> Result<()>;

    fn reset_fence(&self, fence: &Arc<dyn Fence>) -> Result<()>;

    fn submit(&self, submit: &SubmitInfo) -> Result<()>;

    /// Block until every queue is idle
    fn wait_idle(&self) -> Result<()>;

    fn as_any(&self) -> &dyn Any;
}
