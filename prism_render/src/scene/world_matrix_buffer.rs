/// World matrices of the scene, stored in a named storage buffer.
///
/// Each transform owns one 64-byte slot; the `TransformHandle` value is the
/// slot index, so shaders read `matrices[handle]` directly. Slots are
/// recycled through a `SlotAllocator`.

use std::sync::Arc;
use glam::Mat4;
use crate::error::Result;
use crate::resource::RenderResourceManager;
use crate::render::Buffer;
use crate::scene::TransformHandle;
use crate::utils::SlotAllocator;
use crate::engine_bail;

pub struct WorldMatrixBuffer {
    name: String,
    buffer: Arc<dyn Buffer>,
    slots: SlotAllocator,
    capacity: u32,
}

impl WorldMatrixBuffer {
    /// Bytes per matrix (column-major `mat4`)
    pub const MATRIX_SIZE: u64 = std::mem::size_of::<Mat4>() as u64;

    /// Get or create the storage buffer `name` sized for `capacity` matrices
    pub fn new(resources: &mut RenderResourceManager, name: &str, capacity: u32) -> Result<Self> {
        if capacity == 0 {
            engine_bail!("prism::WorldMatrixBuffer", "'{}': capacity must be at least 1", name);
        }
        let buffer = resources.get_or_create_storage_buffer(name, capacity as u64 * Self::MATRIX_SIZE, true)?;
        Ok(Self {
            name: name.to_string(),
            buffer,
            slots: SlotAllocator::new(),
            capacity,
        })
    }

    /// Allocate a slot and write its initial matrix
    pub fn allocate(&mut self, matrix: Mat4) -> Result<TransformHandle> {
        if self.slots.len() >= self.capacity {
            engine_bail!(
                "prism::WorldMatrixBuffer",
                "'{}' is full ({} matrices)",
                self.name,
                self.capacity
            );
        }
        let handle = TransformHandle(self.slots.alloc());
        self.write(handle, &matrix)?;
        Ok(handle)
    }

    /// Overwrite the matrix of a live slot
    pub fn update(&self, handle: TransformHandle, matrix: Mat4) -> Result<()> {
        if !self.slots.is_allocated(handle.0) {
            engine_bail!("prism::WorldMatrixBuffer", "'{}': transform {} is not allocated", self.name, handle.0);
        }
        self.write(handle, &matrix)
    }

    /// Release a slot. Returns `false` if it was not allocated.
    pub fn free(&mut self, handle: TransformHandle) -> bool {
        self.slots.free(handle.0)
    }

    fn write(&self, handle: TransformHandle, matrix: &Mat4) -> Result<()> {
        self.buffer.update(handle.0 as u64 * Self::MATRIX_SIZE, bytemuck::bytes_of(matrix))
    }

    pub fn is_allocated(&self, handle: TransformHandle) -> bool {
        self.slots.is_allocated(handle.0)
    }

    pub fn buffer(&self) -> &Arc<dyn Buffer> {
        &self.buffer
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Number of live transforms
    pub fn len(&self) -> u32 {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
#[path = "world_matrix_buffer_tests.rs"]
mod tests;
