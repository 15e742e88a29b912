/// Descriptor set layouts, descriptor sets and descriptor writes

use std::any::Any;
use std::sync::Arc;
use bitflags::bitflags;
use crate::render::{AccelerationStructure, Buffer, ImageLayout, SamplerType, Texture};

/// Kind of resource a binding slot expects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorType {
    UniformBuffer,
    StorageBuffer,
    CombinedImageSampler,
    StorageImage,
    AccelerationStructure,
}

impl DescriptorType {
    /// Slot is filled from the buffer info array
    pub fn is_buffer(&self) -> bool {
        matches!(self, DescriptorType::UniformBuffer | DescriptorType::StorageBuffer)
    }

    /// Slot is filled from the image info array
    pub fn is_image(&self) -> bool {
        matches!(self, DescriptorType::CombinedImageSampler | DescriptorType::StorageImage)
    }
}

bitflags! {
    /// Shader stages that can access a binding or push constant range
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStageFlags: u32 {
        const VERTEX = 1 << 0;
        const FRAGMENT = 1 << 1;
        const COMPUTE = 1 << 2;
        const TASK = 1 << 3;
        const MESH = 1 << 4;
        const ALL_GRAPHICS = Self::VERTEX.bits() | Self::FRAGMENT.bits();
    }
}

/// One binding of a descriptor set layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorBinding {
    pub binding: u32,
    pub descriptor_type: DescriptorType,
    /// Array length (1 for a single resource)
    pub count: u32,
    pub stages: ShaderStageFlags,
}

/// Descriptor for creating a descriptor set layout
///
/// An empty binding list is valid (fills gaps in set indices).
#[derive(Debug, Clone, Default)]
pub struct DescriptorSetLayoutDesc {
    pub set_index: u32,
    pub bindings: Vec<DescriptorBinding>,
}

/// Descriptor set layout trait
pub trait DescriptorSetLayout: Send + Sync {
    /// Bindings this layout was created with
    fn bindings(&self) -> &[DescriptorBinding];

    fn as_any(&self) -> &dyn Any;
}

/// Allocated descriptor set
///
/// Returned to its pool when the last reference is dropped.
pub trait DescriptorSet: Send + Sync {
    fn set_index(&self) -> u32;

    fn as_any(&self) -> &dyn Any;
}

/// Buffer entry of a descriptor write
#[derive(Clone)]
pub struct DescriptorBufferInfo {
    pub buffer: Arc<dyn Buffer>,
    pub offset: u64,
    /// `None` binds up to the end of the buffer
    pub range: Option<u64>,
}

/// Image entry of a descriptor write
#[derive(Clone)]
pub struct DescriptorImageInfo {
    pub texture: Arc<dyn Texture>,
    pub layout: ImageLayout,
    /// Required for combined image samplers
    pub sampler: Option<SamplerType>,
}

/// Resources of one descriptor write, borrowed from fully built info arrays
#[derive(Clone, Copy)]
pub enum WriteResources<'a> {
    Buffers(&'a [DescriptorBufferInfo]),
    Images(&'a [DescriptorImageInfo]),
    AccelerationStructures(&'a [Arc<dyn AccelerationStructure>]),
}

impl WriteResources<'_> {
    /// Number of descriptors written
    pub fn len(&self) -> usize {
        match self {
            WriteResources::Buffers(infos) => infos.len(),
            WriteResources::Images(infos) => infos.len(),
            WriteResources::AccelerationStructures(infos) => infos.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One binding update passed to `GraphicsDevice::update_descriptor_set`
#[derive(Clone, Copy)]
pub struct DescriptorWrite<'a> {
    pub binding: u32,
    pub descriptor_type: DescriptorType,
    pub resources: WriteResources<'a>,
}
