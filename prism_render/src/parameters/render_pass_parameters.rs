/// Declarative builder for everything a pass binds.
///
/// A pass declares its shader parameters (buffers, images, image arrays,
/// acceleration structures), its attachments and its push constants, then
/// calls `finalize` once to create the descriptor set layouts, the pipeline
/// layout and, when attachments were declared, the render pass and its
/// framebuffer(s). Descriptor sets are then allocated and written on demand.
///
/// Binding indices are assigned in declaration order within each set.
/// Writes reference ranges of per-set info arrays by index: the arrays are
/// fully built before any `DescriptorWrite` borrows from them.

use std::collections::BTreeMap;
use std::mem::size_of;
use std::sync::Arc;

use crate::error::Result;
use crate::{engine_bail, engine_debug, engine_trace};
use crate::parameters::{BindingHandle, BindingResource, ResourceSlot};
use crate::render::{
    AccelerationStructure, AttachmentDesc, Buffer, ClearValue, DescriptorBinding,
    DescriptorBufferInfo, DescriptorImageInfo, DescriptorSet, DescriptorSetLayout,
    DescriptorSetLayoutDesc, DescriptorType, DescriptorWrite, Framebuffer, FramebufferDesc,
    GraphicsDevice, ImageLayout, LoadOp, PipelineLayout, PipelineLayoutDesc, PushConstantRange,
    Rect2D, RenderPass, RenderPassDesc, SamplerType, ShaderStageFlags, StoreOp, Texture,
    WriteResources,
};

/// Result of a descriptor set allocation
///
/// `updated` is `false` when at least one declared resource was still
/// pending: the set exists but was not written and must not be bound.
pub struct DescriptorSetAllocation {
    pub descriptor_set: Arc<dyn DescriptorSet>,
    pub updated: bool,
}

// ===== INTERNAL STORAGE =====

struct BufferEntry {
    buffer: ResourceSlot<Arc<dyn Buffer>>,
    offset: u64,
    range: Option<u64>,
}

struct ImageEntry {
    texture: ResourceSlot<Arc<dyn Texture>>,
    layout: ImageLayout,
    sampler: Option<SamplerType>,
}

/// Range of one of the per-set info arrays
#[derive(Debug, Clone, Copy)]
enum InfoRange {
    Buffers { start: usize, count: usize },
    Images { start: usize, count: usize },
    AccelerationStructures { start: usize, count: usize },
}

struct PendingWrite {
    binding: u32,
    descriptor_type: DescriptorType,
    infos: InfoRange,
}

#[derive(Default)]
struct BindingSet {
    bindings: Vec<DescriptorBinding>,
    writes: Vec<PendingWrite>,
    buffer_infos: Vec<BufferEntry>,
    image_infos: Vec<ImageEntry>,
    accel_infos: Vec<ResourceSlot<Arc<dyn AccelerationStructure>>>,
}

impl BindingSet {
    fn next_binding(&self) -> u32 {
        self.bindings.len() as u32
    }
}

/// Info arrays of one set with every resource known
#[derive(Default)]
struct ResolvedInfos {
    buffers: Vec<DescriptorBufferInfo>,
    images: Vec<DescriptorImageInfo>,
    accels: Vec<Arc<dyn AccelerationStructure>>,
}

enum AttachmentSource {
    Texture(Arc<dyn Texture>),
    /// One image per swapchain index (one framebuffer each)
    Swapchain(Vec<Arc<dyn Texture>>),
}

impl AttachmentSource {
    fn texture(&self, image_index: usize) -> Arc<dyn Texture> {
        match self {
            AttachmentSource::Texture(texture) => Arc::clone(texture),
            AttachmentSource::Swapchain(images) => Arc::clone(&images[image_index]),
        }
    }

    fn first(&self) -> &Arc<dyn Texture> {
        match self {
            AttachmentSource::Texture(texture) => texture,
            AttachmentSource::Swapchain(images) => &images[0],
        }
    }
}

struct Attachment {
    source: AttachmentSource,
    desc: AttachmentDesc,
    clear: ClearValue,
}

// ===== BUILDER =====

pub struct RenderPassParameters {
    name: String,
    sets: BTreeMap<u32, BindingSet>,
    color_attachments: Vec<Attachment>,
    depth_attachment: Option<Attachment>,
    push_constant_ranges: Vec<PushConstantRange>,
    render_area: Option<Rect2D>,
    finalized: bool,
    set_layouts: Vec<Arc<dyn DescriptorSetLayout>>,
    pipeline_layout: Option<Arc<dyn PipelineLayout>>,
    render_pass: Option<Arc<dyn RenderPass>>,
    framebuffers: Vec<Arc<dyn Framebuffer>>,
}

impl RenderPassParameters {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            sets: BTreeMap::new(),
            color_attachments: Vec::new(),
            depth_attachment: None,
            push_constant_ranges: Vec::new(),
            render_area: None,
            finalized: false,
            set_layouts: Vec::new(),
            pipeline_layout: None,
            render_pass: None,
            framebuffers: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn assert_declaring(&self) {
        assert!(
            !self.finalized,
            "RenderPassParameters '{}': declarations are closed after finalize",
            self.name
        );
    }

    fn push_binding(
        &mut self,
        set_index: u32,
        descriptor_type: DescriptorType,
        count: u32,
        stages: ShaderStageFlags,
        infos: InfoRange,
    ) -> BindingHandle {
        let set = self.sets.entry(set_index).or_default();
        let binding = set.next_binding();
        set.bindings.push(DescriptorBinding { binding, descriptor_type, count, stages });
        set.writes.push(PendingWrite { binding, descriptor_type, infos });
        BindingHandle { set: set_index, binding }
    }

    // ===== SHADER PARAMETERS =====

    /// Declare a uniform or storage buffer parameter
    ///
    /// Pass `ResourceSlot::Pending` to bind the buffer later with `bind_buffer`.
    pub fn add_parameter(
        &mut self,
        buffer: impl Into<ResourceSlot<Arc<dyn Buffer>>>,
        descriptor_type: DescriptorType,
        stages: ShaderStageFlags,
        set_index: u32,
    ) -> BindingHandle {
        self.assert_declaring();
        assert!(
            descriptor_type.is_buffer(),
            "add_parameter expects a buffer descriptor type, got {:?}",
            descriptor_type
        );
        let set = self.sets.entry(set_index).or_default();
        let start = set.buffer_infos.len();
        set.buffer_infos.push(BufferEntry { buffer: buffer.into(), offset: 0, range: None });
        self.push_binding(set_index, descriptor_type, 1, stages, InfoRange::Buffers { start, count: 1 })
    }

    /// Declare a single image parameter (combined image sampler or storage image)
    pub fn add_image_parameter(
        &mut self,
        texture: impl Into<ResourceSlot<Arc<dyn Texture>>>,
        descriptor_type: DescriptorType,
        stages: ShaderStageFlags,
        layout: ImageLayout,
        sampler: Option<SamplerType>,
        set_index: u32,
    ) -> BindingHandle {
        self.add_image_array_parameter(vec![texture.into()], descriptor_type, stages, layout, sampler, set_index)
    }

    /// Declare an image array parameter; the array length is `textures.len()`
    pub fn add_image_array_parameter(
        &mut self,
        textures: Vec<ResourceSlot<Arc<dyn Texture>>>,
        descriptor_type: DescriptorType,
        stages: ShaderStageFlags,
        layout: ImageLayout,
        sampler: Option<SamplerType>,
        set_index: u32,
    ) -> BindingHandle {
        self.assert_declaring();
        assert!(
            descriptor_type.is_image(),
            "image parameter expects an image descriptor type, got {:?}",
            descriptor_type
        );
        assert!(!textures.is_empty(), "image parameter needs at least one element");
        if descriptor_type == DescriptorType::CombinedImageSampler {
            assert!(sampler.is_some(), "combined image sampler declared without a sampler");
        }

        let count = textures.len();
        let set = self.sets.entry(set_index).or_default();
        let start = set.image_infos.len();
        set.image_infos.extend(textures.into_iter().map(|texture| ImageEntry { texture, layout, sampler }));
        self.push_binding(set_index, descriptor_type, count as u32, stages, InfoRange::Images { start, count })
    }

    /// Declare a top-level acceleration structure parameter (ray queries)
    pub fn add_acceleration_structure_parameter(
        &mut self,
        acceleration_structure: impl Into<ResourceSlot<Arc<dyn AccelerationStructure>>>,
        stages: ShaderStageFlags,
        set_index: u32,
    ) -> BindingHandle {
        self.assert_declaring();
        let set = self.sets.entry(set_index).or_default();
        let start = set.accel_infos.len();
        set.accel_infos.push(acceleration_structure.into());
        self.push_binding(
            set_index,
            DescriptorType::AccelerationStructure,
            1,
            stages,
            InfoRange::AccelerationStructures { start, count: 1 },
        )
    }

    fn write_for(&self, handle: BindingHandle) -> InfoRange {
        let set = self
            .sets
            .get(&handle.set)
            .unwrap_or_else(|| panic!("'{}': no parameters declared in set {}", self.name, handle.set));
        set.writes
            .get(handle.binding as usize)
            .unwrap_or_else(|| panic!("'{}': no binding {} in set {}", self.name, handle.binding, handle.set))
            .infos
    }

    /// Provide the buffer of a pending (or bound) buffer parameter
    pub fn bind_buffer(&mut self, handle: BindingHandle, buffer: Arc<dyn Buffer>) {
        let InfoRange::Buffers { start, .. } = self.write_for(handle) else {
            panic!("'{}': binding {:?} is not a buffer parameter", self.name, handle);
        };
        if let Some(set) = self.sets.get_mut(&handle.set) {
            set.buffer_infos[start].buffer = ResourceSlot::Bound(buffer);
        }
    }

    /// Restrict a buffer parameter to `range` bytes starting at `offset`
    pub fn set_buffer_range(&mut self, handle: BindingHandle, offset: u64, range: Option<u64>) {
        let InfoRange::Buffers { start, .. } = self.write_for(handle) else {
            panic!("'{}': binding {:?} is not a buffer parameter", self.name, handle);
        };
        if let Some(set) = self.sets.get_mut(&handle.set) {
            let entry = &mut set.buffer_infos[start];
            entry.offset = offset;
            entry.range = range;
        }
    }

    /// Provide element `array_index` of an image parameter
    pub fn bind_image(&mut self, handle: BindingHandle, array_index: usize, texture: Arc<dyn Texture>) {
        let InfoRange::Images { start, count } = self.write_for(handle) else {
            panic!("'{}': binding {:?} is not an image parameter", self.name, handle);
        };
        assert!(array_index < count, "'{}': image index {} out of {} elements", self.name, array_index, count);
        if let Some(set) = self.sets.get_mut(&handle.set) {
            set.image_infos[start + array_index].texture = ResourceSlot::Bound(texture);
        }
    }

    /// Provide the acceleration structure of a pending parameter
    pub fn bind_acceleration_structure(&mut self, handle: BindingHandle, acceleration_structure: Arc<dyn AccelerationStructure>) {
        let InfoRange::AccelerationStructures { start, .. } = self.write_for(handle) else {
            panic!("'{}': binding {:?} is not an acceleration structure parameter", self.name, handle);
        };
        if let Some(set) = self.sets.get_mut(&handle.set) {
            set.accel_infos[start] = ResourceSlot::Bound(acceleration_structure);
        }
    }

    // ===== ATTACHMENTS =====

    fn attachment_desc(format: crate::render::TextureFormat, initial_layout: ImageLayout, final_layout: ImageLayout, clear: bool) -> AttachmentDesc {
        let load_op = if clear {
            LoadOp::Clear
        } else if initial_layout == ImageLayout::Undefined {
            LoadOp::DontCare
        } else {
            LoadOp::Load
        };
        AttachmentDesc {
            format,
            samples: 1,
            load_op,
            store_op: StoreOp::Store,
            initial_layout,
            final_layout,
        }
    }

    /// Declare a render target; the attachment format is the texture's format
    ///
    /// Depth formats go to the single depth slot, everything else is appended
    /// to the color attachments.
    pub fn add_attachment(&mut self, texture: &Arc<dyn Texture>, initial_layout: ImageLayout, final_layout: ImageLayout, clear: bool) {
        self.assert_declaring();
        let format = texture.info().format;
        let desc = Self::attachment_desc(format, initial_layout, final_layout, clear);
        let source = AttachmentSource::Texture(Arc::clone(texture));

        if format.is_depth() {
            assert!(
                self.depth_attachment.is_none(),
                "'{}': a render pass has at most one depth attachment",
                self.name
            );
            self.depth_attachment = Some(Attachment {
                source,
                desc,
                clear: ClearValue::DepthStencil { depth: 1.0, stencil: 0 },
            });
        } else {
            self.color_attachments.push(Attachment {
                source,
                desc,
                clear: ClearValue::Color([0.0, 0.0, 0.0, 1.0]),
            });
        }
    }

    /// Declare the swapchain images as a color attachment (one framebuffer per image)
    pub fn add_swapchain_attachment(&mut self, images: Vec<Arc<dyn Texture>>, initial_layout: ImageLayout, final_layout: ImageLayout, clear: bool) {
        self.assert_declaring();
        assert!(!images.is_empty(), "'{}': swapchain attachment without images", self.name);
        assert!(
            !self.color_attachments.iter().any(|a| matches!(a.source, AttachmentSource::Swapchain(_))),
            "'{}': swapchain attachment declared twice",
            self.name
        );
        let format = images[0].info().format;
        let desc = Self::attachment_desc(format, initial_layout, final_layout, clear);
        self.color_attachments.push(Attachment {
            source: AttachmentSource::Swapchain(images),
            desc,
            clear: ClearValue::Color([0.0, 0.0, 0.0, 1.0]),
        });
    }

    pub fn set_clear_color(&mut self, attachment_index: usize, color: [f32; 4]) {
        self.color_attachments[attachment_index].clear = ClearValue::Color(color);
    }

    pub fn set_clear_depth(&mut self, depth: f32, stencil: u32) {
        if let Some(depth_attachment) = self.depth_attachment.as_mut() {
            depth_attachment.clear = ClearValue::DepthStencil { depth, stencil };
        }
    }

    // ===== PUSH CONSTANTS =====

    /// Declare a push constant block of type `T`; returns its byte offset
    ///
    /// Ranges are packed one after the other (4-byte aligned).
    pub fn add_push_constant_parameter<T>(&mut self, stages: ShaderStageFlags) -> u32 {
        self.assert_declaring();
        let size = size_of::<T>() as u32;
        assert!(size > 0 && size % 4 == 0, "push constant size must be a non-zero multiple of 4, got {}", size);

        let end = self.push_constant_ranges.iter().map(|r| r.offset + r.size).max().unwrap_or(0);
        let offset = (end + 3) & !3;
        self.push_constant_ranges.push(PushConstantRange { stages, offset, size });
        offset
    }

    pub fn push_constant_ranges(&self) -> &[PushConstantRange] {
        &self.push_constant_ranges
    }

    // ===== RENDER AREA =====

    pub fn set_render_area(&mut self, width: u32, height: u32) {
        self.render_area = Some(Rect2D::from_extent(width, height));
    }

    /// Explicit render area, or the size of the first attachment
    pub fn render_area(&self) -> Rect2D {
        if let Some(area) = self.render_area {
            return area;
        }
        self.color_attachments
            .first()
            .or(self.depth_attachment.as_ref())
            .map(|a| {
                let info = a.source.first().info();
                Rect2D::from_extent(info.width, info.height)
            })
            .unwrap_or(Rect2D::from_extent(0, 0))
    }

    // ===== FINALIZE =====

    /// Create layouts, the pipeline layout, and the render pass with its
    /// framebuffer(s) when attachments were declared
    ///
    /// Set indices without parameters get an empty layout.
    pub fn finalize(&mut self, device: &dyn GraphicsDevice) -> Result<()> {
        assert!(!self.finalized, "RenderPassParameters '{}' finalized twice", self.name);

        let limits = device.properties();
        let push_constant_size = self.push_constant_ranges.iter().map(|r| r.offset + r.size).max().unwrap_or(0);
        assert!(
            push_constant_size <= limits.max_push_constant_size,
            "'{}': {} bytes of push constants exceed the device limit of {}",
            self.name,
            push_constant_size,
            limits.max_push_constant_size
        );

        let set_count = self.sets.keys().next_back().map(|max| max + 1).unwrap_or(0);
        if set_count > limits.max_bound_descriptor_sets {
            engine_bail!(
                "prism::RenderPassParameters",
                "'{}' uses {} descriptor sets, device supports {}",
                self.name,
                set_count,
                limits.max_bound_descriptor_sets
            );
        }

        self.set_layouts.clear();
        for set_index in 0..set_count {
            let bindings = self.sets.get(&set_index).map(|s| s.bindings.clone()).unwrap_or_default();
            let layout = device.create_descriptor_set_layout(&DescriptorSetLayoutDesc { set_index, bindings })?;
            self.set_layouts.push(layout);
        }

        self.pipeline_layout = Some(device.create_pipeline_layout(&PipelineLayoutDesc {
            set_layouts: self.set_layouts.clone(),
            push_constant_ranges: self.push_constant_ranges.clone(),
        })?);

        if !self.color_attachments.is_empty() || self.depth_attachment.is_some() {
            self.create_render_pass(device)?;
        }

        self.finalized = true;
        engine_debug!(
            "prism::RenderPassParameters",
            "Finalized '{}': {} set(s), {} color attachment(s), depth: {}, {} framebuffer(s)",
            self.name,
            set_count,
            self.color_attachments.len(),
            self.depth_attachment.is_some(),
            self.framebuffers.len()
        );
        Ok(())
    }

    fn create_render_pass(&mut self, device: &dyn GraphicsDevice) -> Result<()> {
        let render_pass = device.create_render_pass(&RenderPassDesc {
            color_attachments: self.color_attachments.iter().map(|a| a.desc).collect(),
            depth_attachment: self.depth_attachment.as_ref().map(|a| a.desc),
        })?;

        let framebuffer_count = self
            .color_attachments
            .iter()
            .find_map(|a| match &a.source {
                AttachmentSource::Swapchain(images) => Some(images.len()),
                AttachmentSource::Texture(_) => None,
            })
            .unwrap_or(1);

        let area = self.render_area();
        self.framebuffers.clear();
        for image_index in 0..framebuffer_count {
            let attachments = self
                .color_attachments
                .iter()
                .chain(self.depth_attachment.iter())
                .map(|a| a.source.texture(image_index))
                .collect();
            let framebuffer = device.create_framebuffer(&FramebufferDesc {
                render_pass: &render_pass,
                attachments,
                width: area.width,
                height: area.height,
            })?;
            self.framebuffers.push(framebuffer);
        }
        self.render_pass = Some(render_pass);
        Ok(())
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    // ===== DESCRIPTOR SETS =====

    fn binding_set(&self, set_index: u32) -> Option<&BindingSet> {
        assert!(self.finalized, "'{}': allocate_descriptor_set before finalize", self.name);
        assert!(
            (set_index as usize) < self.set_layouts.len(),
            "'{}': set {} was never declared",
            self.name,
            set_index
        );
        self.sets.get(&set_index)
    }

    /// Allocate a set and write the stored resources into it
    ///
    /// If any resource of the set is still pending, the set is returned
    /// unwritten with `updated == false`.
    pub fn allocate_descriptor_set(&self, device: &dyn GraphicsDevice, set_index: u32) -> Result<DescriptorSetAllocation> {
        let set = self.binding_set(set_index);
        let resolved = match set {
            Some(set) => Self::resolve_stored(set),
            None => Some(ResolvedInfos::default()),
        };
        self.allocate_and_write(device, set_index, set, resolved)
    }

    /// Allocate a set and write `resources` (one per declared binding, in
    /// declaration order) instead of the stored ones
    pub fn allocate_descriptor_set_with(
        &self,
        device: &dyn GraphicsDevice,
        resources: &[BindingResource],
        set_index: u32,
    ) -> Result<DescriptorSetAllocation> {
        let set = self.binding_set(set_index);
        let declared = set.map(|s| s.writes.len()).unwrap_or(0);
        assert_eq!(
            resources.len(),
            declared,
            "'{}': {} resources supplied for set {} with {} bindings",
            self.name,
            resources.len(),
            set_index,
            declared
        );
        let resolved = match set {
            Some(set) => Some(self.resolve_supplied(set, resources)),
            None => Some(ResolvedInfos::default()),
        };
        self.allocate_and_write(device, set_index, set, resolved)
    }

    fn allocate_and_write(
        &self,
        device: &dyn GraphicsDevice,
        set_index: u32,
        set: Option<&BindingSet>,
        resolved: Option<ResolvedInfos>,
    ) -> Result<DescriptorSetAllocation> {
        let layout = &self.set_layouts[set_index as usize];
        let descriptor_set = device.allocate_descriptor_set(layout, set_index)?;

        let (Some(set), Some(resolved)) = (set, resolved) else {
            let updated = set.is_none();
            if !updated {
                engine_trace!(
                    "prism::RenderPassParameters",
                    "'{}': set {} has pending resources, left unwritten",
                    self.name,
                    set_index
                );
            }
            return Ok(DescriptorSetAllocation { descriptor_set, updated });
        };

        let writes: Vec<DescriptorWrite> = set
            .writes
            .iter()
            .map(|write| DescriptorWrite {
                binding: write.binding,
                descriptor_type: write.descriptor_type,
                resources: match write.infos {
                    InfoRange::Buffers { start, count } => WriteResources::Buffers(&resolved.buffers[start..start + count]),
                    InfoRange::Images { start, count } => WriteResources::Images(&resolved.images[start..start + count]),
                    InfoRange::AccelerationStructures { start, count } => {
                        WriteResources::AccelerationStructures(&resolved.accels[start..start + count])
                    }
                },
            })
            .collect();

        if !writes.is_empty() {
            device.update_descriptor_set(&descriptor_set, &writes)?;
        }
        Ok(DescriptorSetAllocation { descriptor_set, updated: true })
    }

    /// Info arrays from the stored slots; `None` if any slot is pending
    fn resolve_stored(set: &BindingSet) -> Option<ResolvedInfos> {
        let mut resolved = ResolvedInfos::default();
        for entry in &set.buffer_infos {
            resolved.buffers.push(DescriptorBufferInfo {
                buffer: Arc::clone(entry.buffer.bound()?),
                offset: entry.offset,
                range: entry.range,
            });
        }
        for entry in &set.image_infos {
            resolved.images.push(DescriptorImageInfo {
                texture: Arc::clone(entry.texture.bound()?),
                layout: entry.layout,
                sampler: entry.sampler,
            });
        }
        for entry in &set.accel_infos {
            resolved.accels.push(Arc::clone(entry.bound()?));
        }
        Some(resolved)
    }

    /// Info arrays from caller-supplied resources, in the stored layout
    fn resolve_supplied(&self, set: &BindingSet, resources: &[BindingResource]) -> ResolvedInfos {
        let mut resolved = ResolvedInfos::default();
        for (write, resource) in set.writes.iter().zip(resources) {
            match (write.infos, resource) {
                (InfoRange::Buffers { start, .. }, BindingResource::Buffer(buffer)) => {
                    let declared = &set.buffer_infos[start];
                    resolved.buffers.push(DescriptorBufferInfo {
                        buffer: Arc::clone(buffer),
                        offset: declared.offset,
                        range: declared.range,
                    });
                }
                (InfoRange::Images { start, count: 1 }, BindingResource::Image(texture)) => {
                    let declared = &set.image_infos[start];
                    resolved.images.push(DescriptorImageInfo {
                        texture: Arc::clone(texture),
                        layout: declared.layout,
                        sampler: declared.sampler,
                    });
                }
                (InfoRange::Images { start, count }, BindingResource::ImageArray(textures)) => {
                    assert_eq!(
                        textures.len(),
                        count,
                        "'{}': binding {} declares {} images, {} supplied",
                        self.name,
                        write.binding,
                        count,
                        textures.len()
                    );
                    for (i, texture) in textures.iter().enumerate() {
                        let declared = &set.image_infos[start + i];
                        resolved.images.push(DescriptorImageInfo {
                            texture: Arc::clone(texture),
                            layout: declared.layout,
                            sampler: declared.sampler,
                        });
                    }
                }
                (InfoRange::AccelerationStructures { .. }, BindingResource::AccelerationStructure(accel)) => {
                    resolved.accels.push(Arc::clone(accel));
                }
                (infos, resource) => panic!(
                    "'{}': binding {} ({:?}) cannot take a resource of kind {}",
                    self.name,
                    write.binding,
                    infos,
                    resource.kind_name()
                ),
            }
        }
        resolved
    }

    // ===== ACCESSORS =====

    pub fn set_count(&self) -> usize {
        self.set_layouts.len()
    }

    pub fn set_layout(&self, set_index: u32) -> Option<&Arc<dyn DescriptorSetLayout>> {
        self.set_layouts.get(set_index as usize)
    }

    /// Declared bindings of a set (empty for gaps)
    pub fn bindings(&self, set_index: u32) -> &[DescriptorBinding] {
        self.sets.get(&set_index).map(|s| s.bindings.as_slice()).unwrap_or(&[])
    }

    pub fn pipeline_layout(&self) -> Option<&Arc<dyn PipelineLayout>> {
        self.pipeline_layout.as_ref()
    }

    pub fn render_pass(&self) -> Option<&Arc<dyn RenderPass>> {
        self.render_pass.as_ref()
    }

    /// Framebuffer for `image_index` (the single framebuffer when the pass
    /// does not render to the swapchain)
    pub fn framebuffer(&self, image_index: u32) -> Option<&Arc<dyn Framebuffer>> {
        match self.framebuffers.len() {
            0 => None,
            1 => self.framebuffers.first(),
            _ => self.framebuffers.get(image_index as usize),
        }
    }

    pub fn framebuffer_count(&self) -> usize {
        self.framebuffers.len()
    }

    pub fn color_attachment_descs(&self) -> Vec<AttachmentDesc> {
        self.color_attachments.iter().map(|a| a.desc).collect()
    }

    pub fn depth_attachment_desc(&self) -> Option<AttachmentDesc> {
        self.depth_attachment.as_ref().map(|a| a.desc)
    }

    pub fn renders_to_swapchain(&self) -> bool {
        self.color_attachments.iter().any(|a| matches!(a.source, AttachmentSource::Swapchain(_)))
    }

    /// Clear values in attachment order (colors, then depth)
    pub fn clear_values(&self) -> Vec<ClearValue> {
        self.color_attachments
            .iter()
            .chain(self.depth_attachment.iter())
            .map(|a| a.clear)
            .collect()
    }

    // ===== DESTROY =====

    /// Release every GPU object created by `finalize`
    ///
    /// Declarations are kept, so the builder can be finalized again.
    pub fn destroy(&mut self) {
        self.framebuffers.clear();
        self.render_pass = None;
        self.pipeline_layout = None;
        self.set_layouts.clear();
        self.finalized = false;
    }
}

#[cfg(test)]
#[path = "render_pass_parameters_tests.rs"]
mod tests;
