/// Pipeline layouts and graphics/compute pipelines

use std::any::Any;
use std::sync::Arc;
use crate::render::{DescriptorSetLayout, RenderPass, ShaderStageFlags};

/// Push constant range of a pipeline layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushConstantRange {
    pub stages: ShaderStageFlags,
    pub offset: u32,
    pub size: u32,
}

/// Descriptor for creating a pipeline layout
///
/// `set_layouts[i]` is the layout of set index `i`.
#[derive(Clone, Default)]
pub struct PipelineLayoutDesc {
    pub set_layouts: Vec<Arc<dyn DescriptorSetLayout>>,
    pub push_constant_ranges: Vec<PushConstantRange>,
}

/// Pipeline layout trait
pub trait PipelineLayout: Send + Sync {
    fn set_layout_count(&self) -> usize;

    fn as_any(&self) -> &dyn Any;
}

/// Where a pipeline binds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineBindPoint {
    Graphics,
    Compute,
}

/// Shader stage of a module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Compute,
    Task,
    Mesh,
}

/// Compiled shader module (SPIR-V words)
#[derive(Debug, Clone)]
pub struct ShaderModuleDesc {
    pub stage: ShaderStage,
    pub code: Vec<u32>,
    pub entry_point: String,
}

/// Vertex attribute format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexFormat {
    Float32,
    Float32x2,
    Float32x3,
    Float32x4,
    Uint32,
}

/// Vertex attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    pub location: u32,
    pub format: VertexFormat,
    pub offset: u32,
}

/// Single interleaved vertex buffer layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexLayout {
    pub stride: u32,
    pub attributes: Vec<VertexAttribute>,
}

/// Primitive topology
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveTopology {
    TriangleList,
    TriangleStrip,
    LineList,
}

/// Face culling mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullMode {
    None,
    Front,
    Back,
}

/// Descriptor for creating a graphics pipeline
///
/// Viewport and scissor are dynamic state.
#[derive(Clone)]
pub struct GraphicsPipelineDesc {
    pub name: String,
    pub layout: Arc<dyn PipelineLayout>,
    pub render_pass: Arc<dyn RenderPass>,
    pub shaders: Vec<ShaderModuleDesc>,
    /// `None` for vertex-pulling or fullscreen shaders
    pub vertex_layout: Option<VertexLayout>,
    pub topology: PrimitiveTopology,
    pub cull_mode: CullMode,
    pub depth_test: bool,
    pub depth_write: bool,
    pub alpha_blend: bool,
}

impl ShaderModuleDesc {
    /// SPIR-V module with the `main` entry point
    pub fn new(stage: ShaderStage, code: Vec<u32>) -> Self {
        Self { stage, code, entry_point: "main".to_string() }
    }
}

impl GraphicsPipelineDesc {
    /// Fullscreen triangle pipeline: no vertex input, no culling, no depth
    pub fn fullscreen(
        name: &str,
        layout: Arc<dyn PipelineLayout>,
        render_pass: Arc<dyn RenderPass>,
        vertex: ShaderModuleDesc,
        fragment: ShaderModuleDesc,
    ) -> Self {
        Self {
            name: name.to_string(),
            layout,
            render_pass,
            shaders: vec![vertex, fragment],
            vertex_layout: None,
            topology: PrimitiveTopology::TriangleList,
            cull_mode: CullMode::None,
            depth_test: false,
            depth_write: false,
            alpha_blend: false,
        }
    }
}

/// Descriptor for creating a compute pipeline
#[derive(Clone)]
pub struct ComputePipelineDesc {
    pub name: String,
    pub layout: Arc<dyn PipelineLayout>,
    pub shader: ShaderModuleDesc,
}

/// Pipeline trait
pub trait Pipeline: Send + Sync {
    fn bind_point(&self) -> PipelineBindPoint;

    fn as_any(&self) -> &dyn Any;
}
