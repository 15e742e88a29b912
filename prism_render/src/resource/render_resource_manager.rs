/// Named resource table shared by every pass.
///
/// Passes look resources up by name with get-or-create semantics: the first
/// request creates the GPU object, later requests with the same name return
/// the same handle. Replaced or removed handles are retired rather than
/// dropped, and released only once no in-flight frame can reference them.

use std::sync::Arc;
use rustc_hash::FxHashMap;
use crate::error::{Error, Result};
use crate::{engine_debug, engine_error, engine_trace};
use crate::render::{
    Buffer, BufferDesc, BufferUsage, GraphicsDevice, Texture, TextureDesc, TextureFormat,
    TextureUsage,
};

/// Size of a render target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetSize {
    /// Follows the render area (recreated by `resize_render_targets`)
    RenderArea,
    Fixed(u32, u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BufferKind {
    Uniform,
    Storage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextureKind {
    ColorTarget,
    DepthTarget,
    Texture,
    External,
}

struct BufferEntry {
    buffer: Arc<dyn Buffer>,
    kind: BufferKind,
}

struct TextureEntry {
    texture: Arc<dyn Texture>,
    kind: TextureKind,
    desc: Option<TextureDesc>,
    size: TargetSize,
}

/// Kept only to be dropped once no frame in flight can use it
#[allow(dead_code)]
enum RetiredHandle {
    Buffer(Arc<dyn Buffer>),
    Texture(Arc<dyn Texture>),
}

struct RetiredResource {
    retired_at: u64,
    _handle: RetiredHandle,
}

pub struct RenderResourceManager {
    device: Arc<dyn GraphicsDevice>,
    buffers: FxHashMap<String, BufferEntry>,
    textures: FxHashMap<String, TextureEntry>,
    retired: Vec<RetiredResource>,
    render_area: (u32, u32),
    current_frame: u64,
}

fn invalid(message: String) -> Error {
    engine_error!("prism::RenderResourceManager", "{}", message);
    Error::InvalidResource(message)
}

impl RenderResourceManager {
    pub fn new(device: Arc<dyn GraphicsDevice>, render_width: u32, render_height: u32) -> Self {
        Self {
            device,
            buffers: FxHashMap::default(),
            textures: FxHashMap::default(),
            retired: Vec::new(),
            render_area: (render_width, render_height),
            current_frame: 0,
        }
    }

    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        &self.device
    }

    pub fn render_area(&self) -> (u32, u32) {
        self.render_area
    }

    // ===== BUFFERS =====

    /// Host-visible uniform buffer of at least `size` bytes
    pub fn get_or_create_uniform_buffer(&mut self, name: &str, size: u64) -> Result<Arc<dyn Buffer>> {
        self.get_or_create_buffer(name, BufferKind::Uniform, size, true)
    }

    /// Storage buffer of at least `size` bytes
    pub fn get_or_create_storage_buffer(&mut self, name: &str, size: u64, host_visible: bool) -> Result<Arc<dyn Buffer>> {
        self.get_or_create_buffer(name, BufferKind::Storage, size, host_visible)
    }

    fn get_or_create_buffer(&mut self, name: &str, kind: BufferKind, size: u64, host_visible: bool) -> Result<Arc<dyn Buffer>> {
        if let Some(entry) = self.buffers.get(name) {
            if entry.kind != kind {
                return Err(invalid(format!("Buffer '{}' exists as {:?}, requested {:?}", name, entry.kind, kind)));
            }
            if entry.buffer.size() < size {
                return Err(invalid(format!(
                    "Buffer '{}' holds {} bytes, requested {}",
                    name,
                    entry.buffer.size(),
                    size
                )));
            }
            return Ok(Arc::clone(&entry.buffer));
        }

        let usage = match kind {
            BufferKind::Uniform => BufferUsage::UNIFORM,
            BufferKind::Storage => BufferUsage::STORAGE | BufferUsage::TRANSFER_DST,
        };
        let buffer = self.device.create_buffer(&BufferDesc { size, usage, host_visible })?;
        engine_debug!("prism::RenderResourceManager", "Created {:?} buffer '{}' ({} bytes)", kind, name, size);
        self.buffers.insert(name.to_string(), BufferEntry { buffer: Arc::clone(&buffer), kind });
        Ok(buffer)
    }

    pub fn buffer(&self, name: &str) -> Option<Arc<dyn Buffer>> {
        self.buffers.get(name).map(|entry| Arc::clone(&entry.buffer))
    }

    /// Replace a buffer; the previous one is retired
    pub fn swap_buffer(&mut self, name: &str, buffer: Arc<dyn Buffer>) -> Result<()> {
        let Some(entry) = self.buffers.get_mut(name) else {
            return Err(invalid(format!("Buffer '{}' not found", name)));
        };
        let previous = std::mem::replace(&mut entry.buffer, buffer);
        self.retire(RetiredHandle::Buffer(previous));
        Ok(())
    }

    // ===== TEXTURES AND RENDER TARGETS =====

    /// Color render target (sampled + color attachment)
    pub fn get_or_create_color_target(&mut self, name: &str, size: TargetSize, format: TextureFormat) -> Result<Arc<dyn Texture>> {
        if format.is_depth() {
            return Err(invalid(format!("Color target '{}' requested with depth format {:?}", name, format)));
        }
        let usage = TextureUsage::COLOR_ATTACHMENT | TextureUsage::SAMPLED | TextureUsage::STORAGE;
        self.get_or_create_target(name, TextureKind::ColorTarget, size, format, usage)
    }

    /// Depth render target (sampled + depth attachment)
    pub fn get_or_create_depth_target(&mut self, name: &str, size: TargetSize, format: TextureFormat) -> Result<Arc<dyn Texture>> {
        if !format.is_depth() {
            return Err(invalid(format!("Depth target '{}' requested with color format {:?}", name, format)));
        }
        let usage = TextureUsage::DEPTH_STENCIL_ATTACHMENT | TextureUsage::SAMPLED;
        self.get_or_create_target(name, TextureKind::DepthTarget, size, format, usage)
    }

    fn get_or_create_target(
        &mut self,
        name: &str,
        kind: TextureKind,
        size: TargetSize,
        format: TextureFormat,
        usage: TextureUsage,
    ) -> Result<Arc<dyn Texture>> {
        if let Some(entry) = self.textures.get(name) {
            if entry.kind != kind {
                return Err(invalid(format!("Texture '{}' exists as {:?}, requested {:?}", name, entry.kind, kind)));
            }
            if entry.texture.info().format != format {
                return Err(invalid(format!(
                    "Render target '{}' has format {:?}, requested {:?}",
                    name,
                    entry.texture.info().format,
                    format
                )));
            }
            return Ok(Arc::clone(&entry.texture));
        }

        let (width, height) = self.resolve_size(size);
        let desc = TextureDesc::new_2d(width, height, format, usage);
        let texture = self.device.create_texture(&desc)?;
        engine_debug!("prism::RenderResourceManager", "Created {:?} '{}' {}x{} {:?}", kind, name, width, height, format);
        self.textures.insert(name.to_string(), TextureEntry {
            texture: Arc::clone(&texture),
            kind,
            desc: Some(desc),
            size,
        });
        Ok(texture)
    }

    /// Texture created from `desc` (contents are uploaded by the caller)
    pub fn get_or_create_texture(&mut self, name: &str, desc: &TextureDesc) -> Result<Arc<dyn Texture>> {
        if let Some(entry) = self.textures.get(name) {
            if entry.kind != TextureKind::Texture && entry.kind != TextureKind::External {
                return Err(invalid(format!("Texture '{}' is a render target", name)));
            }
            return Ok(Arc::clone(&entry.texture));
        }

        let texture = self.device.create_texture(desc)?;
        self.textures.insert(name.to_string(), TextureEntry {
            texture: Arc::clone(&texture),
            kind: TextureKind::Texture,
            desc: Some(desc.clone()),
            size: TargetSize::Fixed(desc.width, desc.height),
        });
        Ok(texture)
    }

    /// Register a texture produced outside the render core (loaders, IBL bakers)
    pub fn register_texture(&mut self, name: &str, texture: Arc<dyn Texture>) -> Result<()> {
        if self.textures.contains_key(name) {
            return Err(invalid(format!("Texture '{}' already exists", name)));
        }
        let size = TargetSize::Fixed(texture.info().width, texture.info().height);
        self.textures.insert(name.to_string(), TextureEntry {
            texture,
            kind: TextureKind::External,
            desc: None,
            size,
        });
        Ok(())
    }

    pub fn texture(&self, name: &str) -> Option<Arc<dyn Texture>> {
        self.textures.get(name).map(|entry| Arc::clone(&entry.texture))
    }

    /// Replace a texture; the previous one is retired
    pub fn swap_texture(&mut self, name: &str, texture: Arc<dyn Texture>) -> Result<()> {
        let Some(entry) = self.textures.get_mut(name) else {
            return Err(invalid(format!("Texture '{}' not found", name)));
        };
        let previous = std::mem::replace(&mut entry.texture, texture);
        self.retire(RetiredHandle::Texture(previous));
        Ok(())
    }

    /// Recreate every render target that follows the render area
    ///
    /// Returns the number of targets recreated.
    pub fn resize_render_targets(&mut self, width: u32, height: u32) -> Result<usize> {
        self.render_area = (width, height);
        let mut recreated = 0;
        let mut replaced = Vec::new();
        for (name, entry) in self.textures.iter_mut() {
            if entry.size != TargetSize::RenderArea {
                continue;
            }
            let Some(desc) = entry.desc.as_mut() else { continue };
            desc.width = width;
            desc.height = height;
            let texture = self.device.create_texture(desc)?;
            replaced.push(std::mem::replace(&mut entry.texture, texture));
            engine_trace!("prism::RenderResourceManager", "Resized '{}' to {}x{}", name, width, height);
            recreated += 1;
        }
        for previous in replaced {
            self.retire(RetiredHandle::Texture(previous));
        }
        Ok(recreated)
    }

    fn resolve_size(&self, size: TargetSize) -> (u32, u32) {
        match size {
            TargetSize::RenderArea => self.render_area,
            TargetSize::Fixed(width, height) => (width, height),
        }
    }

    // ===== LIFETIME =====

    /// Remove a named resource (retired, not dropped). Returns `false` if unknown.
    pub fn remove(&mut self, name: &str) -> bool {
        if let Some(entry) = self.buffers.remove(name) {
            self.retire(RetiredHandle::Buffer(entry.buffer));
            true
        } else if let Some(entry) = self.textures.remove(name) {
            self.retire(RetiredHandle::Texture(entry.texture));
            true
        } else {
            false
        }
    }

    fn retire(&mut self, handle: RetiredHandle) {
        self.retired.push(RetiredResource { retired_at: self.current_frame, _handle: handle });
    }

    /// Mark the start of frame `frame_number`
    pub fn begin_frame(&mut self, frame_number: u64) {
        self.current_frame = frame_number;
    }

    /// Release retired handles no in-flight frame can still reference
    ///
    /// Once the fence of frame `frame_number - frames_in_flight` has been
    /// waited, everything retired during or before that frame is unused.
    pub fn collect_retired(&mut self, frame_number: u64, frames_in_flight: u64) -> usize {
        let before = self.retired.len();
        self.retired.retain(|r| r.retired_at + frames_in_flight > frame_number);
        before - self.retired.len()
    }

    /// Release every retired handle (device known to be idle)
    pub fn release_all_retired(&mut self) -> usize {
        let count = self.retired.len();
        self.retired.clear();
        count
    }

    pub fn retired_count(&self) -> usize {
        self.retired.len()
    }

    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn names(&self) -> Vec<&str> {
        self.buffers.keys().chain(self.textures.keys()).map(|k| k.as_str()).collect()
    }

    /// Retire every resource
    pub fn clear(&mut self) {
        let buffers: Vec<_> = self.buffers.drain().map(|(_, e)| e.buffer).collect();
        let textures: Vec<_> = self.textures.drain().map(|(_, e)| e.texture).collect();
        for buffer in buffers {
            self.retire(RetiredHandle::Buffer(buffer));
        }
        for texture in textures {
            self.retire(RetiredHandle::Texture(texture));
        }
    }
}

#[cfg(test)]
#[path = "render_resource_manager_tests.rs"]
mod tests;
