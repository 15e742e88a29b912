/// Pipeline layouts, graphics pipelines and compute pipelines

use ash::vk;
use prism_render::prism::{Error, Result};
use prism_render::prism::render::{
    ComputePipelineDesc, DescriptorSetLayout, GraphicsPipelineDesc, Pipeline, PipelineBindPoint,
    PipelineLayout, PipelineLayoutDesc, ShaderModuleDesc,
};
use prism_render::{engine_bail, engine_err};
use std::any::Any;
use std::ffi::CString;
use std::sync::Arc;

use crate::vulkan_context::{downcast, VulkanContext};
use crate::vulkan_descriptor::VulkanDescriptorSetLayout;
use crate::vulkan_format::{
    cull_mode_to_vk, shader_stage_to_vk, shader_stages_to_vk, topology_to_vk, vertex_format_to_vk,
};
use crate::vulkan_render_pass::VulkanRenderPass;

// ===== PIPELINE LAYOUT =====

pub struct VulkanPipelineLayout {
    ctx: Arc<VulkanContext>,
    pub(crate) layout: vk::PipelineLayout,
    /// Kept alive as long as pipelines use this layout
    set_layouts: Vec<Arc<dyn DescriptorSetLayout>>,
}

impl VulkanPipelineLayout {
    pub(crate) fn new(ctx: Arc<VulkanContext>, desc: &PipelineLayoutDesc) -> Result<Self> {
        let set_layouts = desc.set_layouts
            .iter()
            .map(|layout| Ok(downcast::<VulkanDescriptorSetLayout>(layout.as_any(), "Descriptor set layout")?.layout))
            .collect::<Result<Vec<_>>>()?;

        let push_constant_ranges: Vec<vk::PushConstantRange> = desc.push_constant_ranges
            .iter()
            .map(|range| vk::PushConstantRange {
                stage_flags: shader_stages_to_vk(range.stages),
                offset: range.offset,
                size: range.size,
            })
            .collect();

        let create_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(&set_layouts)
            .push_constant_ranges(&push_constant_ranges);

        let layout = unsafe {
            ctx.device.create_pipeline_layout(&create_info, None)
                .map_err(|e| engine_err!("prism::vulkan", "Failed to create pipeline layout: {:?}", e))?
        };

        Ok(Self {
            ctx,
            layout,
            set_layouts: desc.set_layouts.clone(),
        })
    }
}

impl PipelineLayout for VulkanPipelineLayout {
    fn set_layout_count(&self) -> usize {
        self.set_layouts.len()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanPipelineLayout {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_pipeline_layout(self.layout, None);
        }
    }
}

// ===== SHADER MODULES =====

/// Shader modules live only for the pipeline creation call
struct ShaderModules<'a> {
    device: &'a ash::Device,
    modules: Vec<(vk::ShaderStageFlags, vk::ShaderModule, CString)>,
}

impl<'a> ShaderModules<'a> {
    fn new(device: &'a ash::Device, shaders: &[ShaderModuleDesc]) -> Result<Self> {
        let mut modules = ShaderModules { device, modules: Vec::with_capacity(shaders.len()) };
        for shader in shaders {
            if shader.code.is_empty() {
                engine_bail!("prism::vulkan", "{:?} shader has no SPIR-V code", shader.stage);
            }
            let entry_point = CString::new(shader.entry_point.as_str())
                .map_err(|_| Error::InvalidResource(format!("Invalid entry point '{}'", shader.entry_point)))?;
            let create_info = vk::ShaderModuleCreateInfo::default().code(&shader.code);
            let module = unsafe {
                device.create_shader_module(&create_info, None)
                    .map_err(|e| engine_err!("prism::vulkan", "Failed to create {:?} shader module: {:?}", shader.stage, e))?
            };
            modules.modules.push((shader_stage_to_vk(shader.stage), module, entry_point));
        }
        Ok(modules)
    }

    fn stages(&self) -> Vec<vk::PipelineShaderStageCreateInfo<'_>> {
        self.modules
            .iter()
            .map(|(stage, module, entry_point)| {
                vk::PipelineShaderStageCreateInfo::default()
                    .stage(*stage)
                    .module(*module)
                    .name(entry_point)
            })
            .collect()
    }
}

impl Drop for ShaderModules<'_> {
    fn drop(&mut self) {
        for (_, module, _) in self.modules.drain(..) {
            unsafe {
                self.device.destroy_shader_module(module, None);
            }
        }
    }
}

// ===== PIPELINES =====

pub struct VulkanPipeline {
    ctx: Arc<VulkanContext>,
    pub(crate) pipeline: vk::Pipeline,
    bind_point: PipelineBindPoint,
    /// Layout outlives the pipeline
    _layout: Arc<dyn PipelineLayout>,
}

impl VulkanPipeline {
    pub(crate) fn new_graphics(ctx: Arc<VulkanContext>, desc: &GraphicsPipelineDesc) -> Result<Self> {
        let layout = downcast::<VulkanPipelineLayout>(desc.layout.as_any(), "Pipeline layout")?;
        let render_pass = downcast::<VulkanRenderPass>(desc.render_pass.as_any(), "Render pass")?;
        let modules = ShaderModules::new(&ctx.device, &desc.shaders)?;
        let stages = modules.stages();

        let (vertex_bindings, vertex_attributes) = match &desc.vertex_layout {
            Some(vertex_layout) => (
                vec![vk::VertexInputBindingDescription {
                    binding: 0,
                    stride: vertex_layout.stride,
                    input_rate: vk::VertexInputRate::VERTEX,
                }],
                vertex_layout.attributes
                    .iter()
                    .map(|attribute| vk::VertexInputAttributeDescription {
                        location: attribute.location,
                        binding: 0,
                        format: vertex_format_to_vk(attribute.format),
                        offset: attribute.offset,
                    })
                    .collect(),
            ),
            None => (Vec::new(), Vec::new()),
        };
        let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&vertex_bindings)
            .vertex_attribute_descriptions(&vertex_attributes);

        let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(topology_to_vk(desc.topology))
            .primitive_restart_enable(false);

        // Viewport and scissor are dynamic
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);

        let rasterization_state = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(cull_mode_to_vk(desc.cull_mode))
            .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
            .depth_bias_enable(false);

        let depth_stencil_state = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(desc.depth_test)
            .depth_write_enable(desc.depth_write)
            .depth_compare_op(vk::CompareOp::LESS_OR_EQUAL)
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false);

        let multisample_state = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1)
            .sample_shading_enable(false);

        // One blend state per color attachment of the render pass
        let blend_attachment = if desc.alpha_blend {
            vk::PipelineColorBlendAttachmentState::default()
                .color_write_mask(vk::ColorComponentFlags::RGBA)
                .blend_enable(true)
                .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
                .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
                .color_blend_op(vk::BlendOp::ADD)
                .src_alpha_blend_factor(vk::BlendFactor::ONE)
                .dst_alpha_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
                .alpha_blend_op(vk::BlendOp::ADD)
        } else {
            vk::PipelineColorBlendAttachmentState::default()
                .color_write_mask(vk::ColorComponentFlags::RGBA)
                .blend_enable(false)
        };
        let blend_attachments = vec![blend_attachment; render_pass.color_count as usize];
        let color_blend_state = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .attachments(&blend_attachments);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let create_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stages)
            .vertex_input_state(&vertex_input_state)
            .input_assembly_state(&input_assembly_state)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization_state)
            .depth_stencil_state(&depth_stencil_state)
            .multisample_state(&multisample_state)
            .color_blend_state(&color_blend_state)
            .dynamic_state(&dynamic_state)
            .layout(layout.layout)
            .render_pass(render_pass.render_pass)
            .subpass(0);

        let pipelines = unsafe {
            ctx.device
                .create_graphics_pipelines(vk::PipelineCache::null(), &[create_info], None)
                .map_err(|(_, e)| engine_err!("prism::vulkan", "Failed to create graphics pipeline '{}': {:?}", desc.name, e))?
        };
        drop(stages);
        drop(modules);

        Ok(Self {
            ctx,
            pipeline: pipelines[0],
            bind_point: PipelineBindPoint::Graphics,
            _layout: Arc::clone(&desc.layout),
        })
    }

    pub(crate) fn new_compute(ctx: Arc<VulkanContext>, desc: &ComputePipelineDesc) -> Result<Self> {
        let layout = downcast::<VulkanPipelineLayout>(desc.layout.as_any(), "Pipeline layout")?;
        let modules = ShaderModules::new(&ctx.device, std::slice::from_ref(&desc.shader))?;
        let stages = modules.stages();

        let create_info = vk::ComputePipelineCreateInfo::default()
            .stage(stages[0])
            .layout(layout.layout);

        let pipelines = unsafe {
            ctx.device
                .create_compute_pipelines(vk::PipelineCache::null(), &[create_info], None)
                .map_err(|(_, e)| engine_err!("prism::vulkan", "Failed to create compute pipeline '{}': {:?}", desc.name, e))?
        };
        drop(stages);
        drop(modules);

        Ok(Self {
            ctx,
            pipeline: pipelines[0],
            bind_point: PipelineBindPoint::Compute,
            _layout: Arc::clone(&desc.layout),
        })
    }
}

impl Pipeline for VulkanPipeline {
    fn bind_point(&self) -> PipelineBindPoint {
        self.bind_point
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanPipeline {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_pipeline(self.pipeline, None);
        }
    }
}
