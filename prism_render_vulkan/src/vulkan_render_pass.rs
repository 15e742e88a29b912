/// Render passes and framebuffers

use ash::vk;
use prism_render::engine_err;
use prism_render::prism::Result;
use prism_render::prism::render::{
    AttachmentDesc, Framebuffer, FramebufferDesc, RenderPass, RenderPassDesc, Texture,
};
use std::any::Any;
use std::sync::Arc;

use crate::vulkan_context::{downcast, VulkanContext};
use crate::vulkan_format::{image_layout_to_vk, load_op_to_vk, sample_count_to_vk, store_op_to_vk, texture_format_to_vk};
use crate::vulkan_texture::VulkanTexture;

fn attachment_to_vk(attachment: &AttachmentDesc) -> vk::AttachmentDescription {
    vk::AttachmentDescription::default()
        .format(texture_format_to_vk(attachment.format))
        .samples(sample_count_to_vk(attachment.samples))
        .load_op(load_op_to_vk(attachment.load_op))
        .store_op(store_op_to_vk(attachment.store_op))
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(image_layout_to_vk(attachment.initial_layout))
        .final_layout(image_layout_to_vk(attachment.final_layout))
}

/// Single-subpass render pass
pub struct VulkanRenderPass {
    ctx: Arc<VulkanContext>,
    pub(crate) render_pass: vk::RenderPass,
    pub(crate) color_count: u32,
    has_depth: bool,
}

impl VulkanRenderPass {
    pub(crate) fn new(ctx: Arc<VulkanContext>, desc: &RenderPassDesc) -> Result<Self> {
        let mut attachments: Vec<vk::AttachmentDescription> = desc.color_attachments
            .iter()
            .map(attachment_to_vk)
            .collect();

        let color_refs: Vec<vk::AttachmentReference> = (0..desc.color_attachments.len() as u32)
            .map(|index| vk::AttachmentReference {
                attachment: index,
                layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            })
            .collect();

        let depth_ref = desc.depth_attachment.as_ref().map(|depth| {
            attachments.push(attachment_to_vk(depth));
            vk::AttachmentReference {
                attachment: color_refs.len() as u32,
                layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            }
        });

        let mut subpass = vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs);
        if let Some(depth_ref) = depth_ref.as_ref() {
            subpass = subpass.depth_stencil_attachment(depth_ref);
        }

        let (stages, access) = if depth_ref.is_some() {
            (
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
                vk::AccessFlags::COLOR_ATTACHMENT_WRITE | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            )
        } else {
            (vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT, vk::AccessFlags::COLOR_ATTACHMENT_WRITE)
        };

        let dependency = vk::SubpassDependency::default()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(stages)
            .src_access_mask(vk::AccessFlags::empty())
            .dst_stage_mask(stages)
            .dst_access_mask(access);

        let create_info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(std::slice::from_ref(&subpass))
            .dependencies(std::slice::from_ref(&dependency));

        let render_pass = unsafe {
            ctx.device.create_render_pass(&create_info, None)
                .map_err(|e| engine_err!("prism::vulkan", "Failed to create render pass: {:?}", e))?
        };

        Ok(Self {
            ctx,
            render_pass,
            color_count: desc.color_attachments.len() as u32,
            has_depth: desc.depth_attachment.is_some(),
        })
    }
}

impl RenderPass for VulkanRenderPass {
    fn color_attachment_count(&self) -> u32 {
        self.color_count
    }

    fn has_depth_attachment(&self) -> bool {
        self.has_depth
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanRenderPass {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_render_pass(self.render_pass, None);
        }
    }
}

/// Framebuffer over texture views
pub struct VulkanFramebuffer {
    ctx: Arc<VulkanContext>,
    pub(crate) framebuffer: vk::Framebuffer,
    width: u32,
    height: u32,
    /// Views stay valid while the framebuffer exists
    _attachments: Vec<Arc<dyn Texture>>,
}

impl VulkanFramebuffer {
    pub(crate) fn new(ctx: Arc<VulkanContext>, desc: &FramebufferDesc) -> Result<Self> {
        let render_pass = downcast::<VulkanRenderPass>(desc.render_pass.as_any(), "Render pass")?;
        let views = desc.attachments
            .iter()
            .map(|texture| Ok(downcast::<VulkanTexture>(texture.as_any(), "Framebuffer attachment")?.view))
            .collect::<Result<Vec<_>>>()?;

        let create_info = vk::FramebufferCreateInfo::default()
            .render_pass(render_pass.render_pass)
            .attachments(&views)
            .width(desc.width.max(1))
            .height(desc.height.max(1))
            .layers(1);

        let framebuffer = unsafe {
            ctx.device.create_framebuffer(&create_info, None)
                .map_err(|e| engine_err!("prism::vulkan", "Failed to create framebuffer ({}x{}): {:?}", desc.width, desc.height, e))?
        };

        Ok(Self {
            ctx,
            framebuffer,
            width: desc.width,
            height: desc.height,
            _attachments: desc.attachments.clone(),
        })
    }
}

impl Framebuffer for VulkanFramebuffer {
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

impl Drop for VulkanFramebuffer {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_framebuffer(self.framebuffer, None);
        }
    }
}
