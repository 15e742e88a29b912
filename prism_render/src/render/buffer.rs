/// Buffer trait and buffer descriptor

use std::any::Any;
use bitflags::bitflags;
use crate::error::Result;

bitflags! {
    /// How a buffer may be used
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        const UNIFORM = 1 << 0;
        const STORAGE = 1 << 1;
        const VERTEX = 1 << 2;
        const INDEX = 1 << 3;
        const INDIRECT = 1 << 4;
        const TRANSFER_SRC = 1 << 5;
        const TRANSFER_DST = 1 << 6;
    }
}

/// Descriptor for creating a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferDesc {
    /// Size in bytes
    pub size: u64,
    pub usage: BufferUsage,
    /// Mapped and writable from the CPU through `Buffer::update`
    pub host_visible: bool,
}

/// Index element type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexType {
    U16,
    U32,
}

/// Buffer resource trait
pub trait Buffer: Send + Sync {
    /// Size in bytes
    fn size(&self) -> u64;

    fn usage(&self) -> BufferUsage;

    /// Write `data` at `offset` (host-visible buffers only)
    fn update(&self, offset: u64, data: &[u8]) -> Result<()>;

    /// Backend downcasting
    fn as_any(&self) -> &dyn Any;
}

/// Acceleration structure handle (ray queries)
///
/// Built outside the render core; passes only bind it.
pub trait AccelerationStructure: Send + Sync {
    fn as_any(&self) -> &dyn Any;
}
