/// CommandList trait - for recording GPU commands

use std::any::Any;
use std::sync::Arc;
use crate::error::Result;
use crate::render::{
    Buffer, DescriptorSet, Framebuffer, ImageLayout, IndexType, Pipeline,
    PipelineBindPoint, PipelineLayout, PipelineStageFlags, QueueKind, RenderPass,
    ShaderStageFlags, Texture,
};

/// How a command list is recorded and submitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandBufferUsage {
    /// Recorded once, resubmitted every frame
    Static,
    /// Re-recorded every frame
    Reusable,
    /// Recorded and submitted a single time
    Immediate,
}

/// Clear value for an attachment
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    Color([f32; 4]),
    DepthStencil { depth: f32, stencil: u32 },
}

/// Viewport dimensions and depth range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

/// Integer rectangle (render area, scissor)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect2D {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect2D {
    /// Rectangle at the origin
    pub fn from_extent(width: u32, height: u32) -> Self {
        Self { x: 0, y: 0, width, height }
    }
}

impl Viewport {
    /// Viewport covering `rect` with the [0, 1] depth range
    pub fn from_rect(rect: Rect2D) -> Self {
        Self {
            x: rect.x as f32,
            y: rect.y as f32,
            width: rect.width as f32,
            height: rect.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

/// Layout transition of a whole image
#[derive(Clone)]
pub struct ImageBarrier {
    pub texture: Arc<dyn Texture>,
    pub old_layout: ImageLayout,
    pub new_layout: ImageLayout,
    pub src_stage: PipelineStageFlags,
    pub dst_stage: PipelineStageFlags,
}

/// Command list for recording GPU commands
///
/// Allocated for a queue by `GraphicsDevice::allocate_command_list` and
/// submitted with `GraphicsDevice::submit`. `begin` resets previous contents.
pub trait CommandList: Send + Sync {
    fn begin(&mut self) -> Result<()>;

    fn end(&mut self) -> Result<()>;

    /// Begin a render pass over `render_area`
    fn begin_render_pass(
        &mut self,
        render_pass: &Arc<dyn RenderPass>,
        framebuffer: &Arc<dyn Framebuffer>,
        render_area: Rect2D,
        clear_values: &[ClearValue],
    ) -> Result<()>;

    fn end_render_pass(&mut self) -> Result<()>;

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()>;

    fn set_scissor(&mut self, scissor: Rect2D) -> Result<()>;

    fn bind_pipeline(&mut self, pipeline: &Arc<dyn Pipeline>) -> Result<()>;

    /// Bind a descriptor set at `set_index` of `layout`
    fn bind_descriptor_set(
        &mut self,
        layout: &Arc<dyn PipelineLayout>,
        bind_point: PipelineBindPoint,
        set_index: u32,
        descriptor_set: &Arc<dyn DescriptorSet>,
    ) -> Result<()>;

    fn push_constants(
        &mut self,
        layout: &Arc<dyn PipelineLayout>,
        stages: ShaderStageFlags,
        offset: u32,
        data: &[u8],
    ) -> Result<()>;

    fn bind_vertex_buffer(&mut self, buffer: &Arc<dyn Buffer>, offset: u64) -> Result<()>;

    fn bind_index_buffer(&mut self, buffer: &Arc<dyn Buffer>, offset: u64, index_type: IndexType) -> Result<()>;

    fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) -> Result<()>;

    fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) -> Result<()>;

    fn dispatch(&mut self, group_count_x: u32, group_count_y: u32, group_count_z: u32) -> Result<()>;

    fn image_barrier(&mut self, barrier: &ImageBarrier) -> Result<()>;

    /// Queue this list was allocated for
    fn queue(&self) -> QueueKind;

    fn usage(&self) -> CommandBufferUsage;

    fn as_any(&self) -> &dyn Any;
}
