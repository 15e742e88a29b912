/// VulkanCommandList - Vulkan implementation of the CommandList trait

use ash::vk;
use prism_render::prism::{Error, Result};
use prism_render::prism::render::{
    Buffer, ClearValue, CommandBufferUsage, CommandList, DescriptorSet, Framebuffer, ImageBarrier,
    IndexType, Pipeline, PipelineBindPoint, PipelineLayout, QueueKind, Rect2D, RenderPass,
    ShaderStageFlags, Viewport,
};
use prism_render::{engine_bail, engine_err};
use std::any::Any;
use std::sync::Arc;

use crate::vulkan_buffer::VulkanBuffer;
use crate::vulkan_context::{downcast, VulkanContext};
use crate::vulkan_descriptor::VulkanDescriptorSet;
use crate::vulkan_format::{
    access_mask_for_layout, bind_point_to_vk, clear_value_to_vk, image_layout_to_vk,
    index_type_to_vk, pipeline_stages_to_vk, shader_stages_to_vk,
};
use crate::vulkan_pipeline::{VulkanPipeline, VulkanPipelineLayout};
use crate::vulkan_render_pass::{VulkanFramebuffer, VulkanRenderPass};
use crate::vulkan_texture::VulkanTexture;

/// Command list backed by its own command pool
pub struct VulkanCommandList {
    ctx: Arc<VulkanContext>,
    command_pool: vk::CommandPool,
    command_buffer: vk::CommandBuffer,
    queue: QueueKind,
    usage: CommandBufferUsage,
    is_recording: bool,
    in_render_pass: bool,
}

impl VulkanCommandList {
    pub(crate) fn new(ctx: Arc<VulkanContext>, queue: QueueKind, usage: CommandBufferUsage) -> Result<Self> {
        unsafe {
            let family = ctx.queue(queue).family;
            let pool_flags = match usage {
                CommandBufferUsage::Immediate => {
                    vk::CommandPoolCreateFlags::TRANSIENT | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER
                }
                _ => vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
            };
            let pool_create_info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(family)
                .flags(pool_flags);

            let command_pool = ctx.device.create_command_pool(&pool_create_info, None)
                .map_err(|e| engine_err!("prism::vulkan", "Failed to create command pool: {:?}", e))?;

            let allocate_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(command_pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);

            let command_buffers = match ctx.device.allocate_command_buffers(&allocate_info) {
                Ok(buffers) => buffers,
                Err(e) => {
                    ctx.device.destroy_command_pool(command_pool, None);
                    return Err(engine_err!("prism::vulkan", "Failed to allocate command buffer: {:?}", e));
                }
            };

            Ok(Self {
                ctx,
                command_pool,
                command_buffer: command_buffers[0],
                queue,
                usage,
                is_recording: false,
                in_render_pass: false,
            })
        }
    }

    pub fn command_buffer(&self) -> vk::CommandBuffer {
        self.command_buffer
    }

    fn ensure_recording(&self, what: &str) -> Result<()> {
        if !self.is_recording {
            engine_bail!("prism::vulkan", "{}: command list not recording", what);
        }
        Ok(())
    }
}

impl CommandList for VulkanCommandList {
    fn begin(&mut self) -> Result<()> {
        // Resetting also discards a recording abandoned after an error
        let flags = match self.usage {
            CommandBufferUsage::Static => vk::CommandBufferUsageFlags::SIMULTANEOUS_USE,
            CommandBufferUsage::Reusable => vk::CommandBufferUsageFlags::empty(),
            CommandBufferUsage::Immediate => vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT,
        };
        let begin_info = vk::CommandBufferBeginInfo::default().flags(flags);

        unsafe {
            self.ctx.device
                .reset_command_buffer(self.command_buffer, vk::CommandBufferResetFlags::empty())
                .map_err(|e| engine_err!("prism::vulkan", "Failed to reset command buffer: {:?}", e))?;
            self.ctx.device.begin_command_buffer(self.command_buffer, &begin_info)
                .map_err(|e| engine_err!("prism::vulkan", "Failed to begin command buffer: {:?}", e))?;
        }
        self.is_recording = true;
        self.in_render_pass = false;
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        self.ensure_recording("end")?;
        if self.in_render_pass {
            engine_bail!("prism::vulkan", "end: render pass still open");
        }

        unsafe {
            self.ctx.device.end_command_buffer(self.command_buffer)
                .map_err(|e| engine_err!("prism::vulkan", "Failed to end command buffer: {:?}", e))?;
        }
        self.is_recording = false;
        Ok(())
    }

    fn begin_render_pass(
        &mut self,
        render_pass: &Arc<dyn RenderPass>,
        framebuffer: &Arc<dyn Framebuffer>,
        render_area: Rect2D,
        clear_values: &[ClearValue],
    ) -> Result<()> {
        self.ensure_recording("begin_render_pass")?;
        let render_pass = downcast::<VulkanRenderPass>(render_pass.as_any(), "Render pass")?;
        let framebuffer = downcast::<VulkanFramebuffer>(framebuffer.as_any(), "Framebuffer")?;
        let vk_clear_values: Vec<vk::ClearValue> = clear_values.iter().copied().map(clear_value_to_vk).collect();

        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(render_pass.render_pass)
            .framebuffer(framebuffer.framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: render_area.x, y: render_area.y },
                extent: vk::Extent2D { width: render_area.width, height: render_area.height },
            })
            .clear_values(&vk_clear_values);

        unsafe {
            self.ctx.device.cmd_begin_render_pass(self.command_buffer, &begin_info, vk::SubpassContents::INLINE);
        }
        self.in_render_pass = true;
        Ok(())
    }

    fn end_render_pass(&mut self) -> Result<()> {
        self.ensure_recording("end_render_pass")?;
        if !self.in_render_pass {
            engine_bail!("prism::vulkan", "end_render_pass: no render pass open");
        }
        unsafe {
            self.ctx.device.cmd_end_render_pass(self.command_buffer);
        }
        self.in_render_pass = false;
        Ok(())
    }

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        self.ensure_recording("set_viewport")?;
        let vk_viewport = vk::Viewport {
            x: viewport.x,
            y: viewport.y,
            width: viewport.width,
            height: viewport.height,
            min_depth: viewport.min_depth,
            max_depth: viewport.max_depth,
        };
        unsafe {
            self.ctx.device.cmd_set_viewport(self.command_buffer, 0, &[vk_viewport]);
        }
        Ok(())
    }

    fn set_scissor(&mut self, scissor: Rect2D) -> Result<()> {
        self.ensure_recording("set_scissor")?;
        let vk_scissor = vk::Rect2D {
            offset: vk::Offset2D { x: scissor.x, y: scissor.y },
            extent: vk::Extent2D { width: scissor.width, height: scissor.height },
        };
        unsafe {
            self.ctx.device.cmd_set_scissor(self.command_buffer, 0, &[vk_scissor]);
        }
        Ok(())
    }

    fn bind_pipeline(&mut self, pipeline: &Arc<dyn Pipeline>) -> Result<()> {
        self.ensure_recording("bind_pipeline")?;
        let vk_pipeline = downcast::<VulkanPipeline>(pipeline.as_any(), "Pipeline")?;
        unsafe {
            self.ctx.device.cmd_bind_pipeline(
                self.command_buffer,
                bind_point_to_vk(pipeline.bind_point()),
                vk_pipeline.pipeline,
            );
        }
        Ok(())
    }

    fn bind_descriptor_set(
        &mut self,
        layout: &Arc<dyn PipelineLayout>,
        bind_point: PipelineBindPoint,
        set_index: u32,
        descriptor_set: &Arc<dyn DescriptorSet>,
    ) -> Result<()> {
        self.ensure_recording("bind_descriptor_set")?;
        let layout = downcast::<VulkanPipelineLayout>(layout.as_any(), "Pipeline layout")?;
        let set = downcast::<VulkanDescriptorSet>(descriptor_set.as_any(), "Descriptor set")?;
        unsafe {
            self.ctx.device.cmd_bind_descriptor_sets(
                self.command_buffer,
                bind_point_to_vk(bind_point),
                layout.layout,
                set_index,
                &[set.set],
                &[],
            );
        }
        Ok(())
    }

    fn push_constants(
        &mut self,
        layout: &Arc<dyn PipelineLayout>,
        stages: ShaderStageFlags,
        offset: u32,
        data: &[u8],
    ) -> Result<()> {
        self.ensure_recording("push_constants")?;
        let layout = downcast::<VulkanPipelineLayout>(layout.as_any(), "Pipeline layout")?;
        unsafe {
            self.ctx.device.cmd_push_constants(
                self.command_buffer,
                layout.layout,
                shader_stages_to_vk(stages),
                offset,
                data,
            );
        }
        Ok(())
    }

    fn bind_vertex_buffer(&mut self, buffer: &Arc<dyn Buffer>, offset: u64) -> Result<()> {
        self.ensure_recording("bind_vertex_buffer")?;
        let buffer = downcast::<VulkanBuffer>(buffer.as_any(), "Vertex buffer")?;
        unsafe {
            self.ctx.device.cmd_bind_vertex_buffers(self.command_buffer, 0, &[buffer.buffer], &[offset]);
        }
        Ok(())
    }

    fn bind_index_buffer(&mut self, buffer: &Arc<dyn Buffer>, offset: u64, index_type: IndexType) -> Result<()> {
        self.ensure_recording("bind_index_buffer")?;
        let buffer = downcast::<VulkanBuffer>(buffer.as_any(), "Index buffer")?;
        unsafe {
            self.ctx.device.cmd_bind_index_buffer(self.command_buffer, buffer.buffer, offset, index_type_to_vk(index_type));
        }
        Ok(())
    }

    fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) -> Result<()> {
        self.ensure_recording("draw")?;
        unsafe {
            self.ctx.device.cmd_draw(self.command_buffer, vertex_count, instance_count, first_vertex, first_instance);
        }
        Ok(())
    }

    fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) -> Result<()> {
        self.ensure_recording("draw_indexed")?;
        unsafe {
            self.ctx.device.cmd_draw_indexed(
                self.command_buffer,
                index_count,
                instance_count,
                first_index,
                vertex_offset,
                first_instance,
            );
        }
        Ok(())
    }

    fn dispatch(&mut self, group_count_x: u32, group_count_y: u32, group_count_z: u32) -> Result<()> {
        self.ensure_recording("dispatch")?;
        if self.in_render_pass {
            return Err(Error::BackendError("dispatch inside a render pass".to_string()));
        }
        unsafe {
            self.ctx.device.cmd_dispatch(self.command_buffer, group_count_x, group_count_y, group_count_z);
        }
        Ok(())
    }

    fn image_barrier(&mut self, barrier: &ImageBarrier) -> Result<()> {
        self.ensure_recording("image_barrier")?;
        let texture = downcast::<VulkanTexture>(barrier.texture.as_any(), "Barrier texture")?;
        let info = barrier.texture.info();

        let vk_barrier = vk::ImageMemoryBarrier::default()
            .old_layout(image_layout_to_vk(barrier.old_layout))
            .new_layout(image_layout_to_vk(barrier.new_layout))
            .src_access_mask(access_mask_for_layout(barrier.old_layout))
            .dst_access_mask(access_mask_for_layout(barrier.new_layout))
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(texture.image)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: texture.aspect_mask(),
                base_mip_level: 0,
                level_count: info.mip_levels.max(1),
                base_array_layer: 0,
                layer_count: info.array_layers.max(1),
            });

        let mut src_stage = pipeline_stages_to_vk(barrier.src_stage);
        if src_stage.is_empty() {
            src_stage = vk::PipelineStageFlags::TOP_OF_PIPE;
        }
        let mut dst_stage = pipeline_stages_to_vk(barrier.dst_stage);
        if dst_stage.is_empty() {
            dst_stage = vk::PipelineStageFlags::BOTTOM_OF_PIPE;
        }

        unsafe {
            self.ctx.device.cmd_pipeline_barrier(
                self.command_buffer,
                src_stage,
                dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[vk_barrier],
            );
        }
        Ok(())
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

impl Drop for VulkanCommandList {
    fn drop(&mut self) {
        unsafe {
            // Freeing the pool frees its command buffer
            self.ctx.device.destroy_command_pool(self.command_pool, None);
        }
    }
}
