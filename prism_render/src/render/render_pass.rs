/// Render pass and framebuffer objects

use std::any::Any;
use std::sync::Arc;
use crate::render::{ImageLayout, Texture, TextureFormat};

/// Load operation for an attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOp {
    /// Keep the existing contents
    Load,
    /// Clear to the clear value
    Clear,
    /// Contents undefined
    DontCare,
}

/// Store operation for an attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Store,
    DontCare,
}

/// Attachment description for a render pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachmentDesc {
    pub format: TextureFormat,
    pub samples: u32,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
    pub initial_layout: ImageLayout,
    pub final_layout: ImageLayout,
}

/// Descriptor for creating a render pass (single subpass)
#[derive(Debug, Clone, Default)]
pub struct RenderPassDesc {
    pub color_attachments: Vec<AttachmentDesc>,
    pub depth_attachment: Option<AttachmentDesc>,
}

/// Render pass object
pub trait RenderPass: Send + Sync {
    fn color_attachment_count(&self) -> u32;

    fn has_depth_attachment(&self) -> bool;

    fn as_any(&self) -> &dyn Any;
}

/// Descriptor for creating a framebuffer
///
/// `attachments` holds the color attachments in order, then the depth attachment.
pub struct FramebufferDesc<'a> {
    pub render_pass: &'a Arc<dyn RenderPass>,
    pub attachments: Vec<Arc<dyn Texture>>,
    pub width: u32,
    pub height: u32,
}

/// Framebuffer object
pub trait Framebuffer: Send + Sync {
    fn width(&self) -> u32;

    fn height(&self) -> u32;

    fn as_any(&self) -> &dyn Any;
}
