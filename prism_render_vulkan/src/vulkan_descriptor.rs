/// Descriptor set layouts, descriptor sets and the growable pool allocator

use ash::vk;
use prism_render::prism::{DescriptorPoolSizes, Error, Result};
use prism_render::prism::render::{
    DescriptorBinding, DescriptorSet, DescriptorSetLayout, DescriptorSetLayoutDesc,
    DescriptorType, DescriptorWrite, WriteResources,
};
use prism_render::{engine_bail, engine_err, engine_info};
use std::any::Any;
use std::sync::{Arc, Mutex};

use crate::vulkan_buffer::VulkanBuffer;
use crate::vulkan_context::{downcast, VulkanContext};
use crate::vulkan_format::{descriptor_type_to_vk, image_layout_to_vk, shader_stages_to_vk};
use crate::vulkan_sampler::SamplerCache;
use crate::vulkan_texture::VulkanTexture;

// ===== LAYOUT =====

pub struct VulkanDescriptorSetLayout {
    ctx: Arc<VulkanContext>,
    pub(crate) layout: vk::DescriptorSetLayout,
    bindings: Vec<DescriptorBinding>,
}

impl VulkanDescriptorSetLayout {
    pub(crate) fn new(ctx: Arc<VulkanContext>, desc: &DescriptorSetLayoutDesc) -> Result<Self> {
        if desc.bindings.iter().any(|b| b.descriptor_type == DescriptorType::AccelerationStructure) {
            engine_bail!("prism::vulkan",
                "Set {} declares an acceleration structure, the Vulkan device was created without ray queries", desc.set_index);
        }

        let bindings: Vec<vk::DescriptorSetLayoutBinding> = desc.bindings
            .iter()
            .map(|binding| {
                vk::DescriptorSetLayoutBinding::default()
                    .binding(binding.binding)
                    .descriptor_type(descriptor_type_to_vk(binding.descriptor_type))
                    .descriptor_count(binding.count)
                    .stage_flags(shader_stages_to_vk(binding.stages))
            })
            .collect();

        let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);
        let layout = unsafe {
            ctx.device.create_descriptor_set_layout(&create_info, None)
                .map_err(|e| engine_err!("prism::vulkan", "Failed to create descriptor set layout for set {}: {:?}", desc.set_index, e))?
        };

        Ok(Self {
            ctx,
            layout,
            bindings: desc.bindings.clone(),
        })
    }
}

impl DescriptorSetLayout for VulkanDescriptorSetLayout {
    fn bindings(&self) -> &[DescriptorBinding] {
        &self.bindings
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanDescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

// ===== POOLS =====

/// Descriptor pools sized from the render configuration
///
/// A new pool is created when every existing pool is exhausted.
pub(crate) struct DescriptorAllocator {
    ctx: Arc<VulkanContext>,
    sizes: DescriptorPoolSizes,
    pools: Mutex<Vec<vk::DescriptorPool>>,
}

impl DescriptorAllocator {
    pub(crate) fn new(ctx: Arc<VulkanContext>, sizes: DescriptorPoolSizes) -> Result<Self> {
        let allocator = Self {
            ctx,
            sizes,
            pools: Mutex::new(Vec::new()),
        };
        let pool = allocator.create_pool()?;
        allocator.lock_pools()?.push(pool);
        Ok(allocator)
    }

    fn lock_pools(&self) -> Result<std::sync::MutexGuard<'_, Vec<vk::DescriptorPool>>> {
        self.pools
            .lock()
            .map_err(|_| Error::BackendError("Descriptor pool lock poisoned".to_string()))
    }

    fn create_pool(&self) -> Result<vk::DescriptorPool> {
        // Acceleration structures are rejected at layout creation, no pool space for them
        let pool_sizes: Vec<vk::DescriptorPoolSize> = [
            (vk::DescriptorType::UNIFORM_BUFFER, self.sizes.uniform_buffers),
            (vk::DescriptorType::STORAGE_BUFFER, self.sizes.storage_buffers),
            (vk::DescriptorType::COMBINED_IMAGE_SAMPLER, self.sizes.combined_image_samplers),
            (vk::DescriptorType::STORAGE_IMAGE, self.sizes.storage_images),
        ]
        .into_iter()
        .filter(|&(_, count)| count > 0)
        .map(|(ty, descriptor_count)| vk::DescriptorPoolSize { ty, descriptor_count })
        .collect();

        let create_info = vk::DescriptorPoolCreateInfo::default()
            .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET)
            .max_sets(self.sizes.max_sets.max(1))
            .pool_sizes(&pool_sizes);

        unsafe {
            self.ctx.device.create_descriptor_pool(&create_info, None)
                .map_err(|e| engine_err!("prism::vulkan", "Failed to create descriptor pool: {:?}", e))
        }
    }

    /// Allocate a set, growing the pool list when every pool is full
    pub(crate) fn allocate(
        self: &Arc<Self>,
        layout: &VulkanDescriptorSetLayout,
        set_index: u32,
    ) -> Result<VulkanDescriptorSet> {
        let mut pools = self.lock_pools()?;
        let set_layouts = [layout.layout];

        // Freed sets make room in older pools, newest first
        for &pool in pools.iter().rev() {
            let allocate_info = vk::DescriptorSetAllocateInfo::default()
                .descriptor_pool(pool)
                .set_layouts(&set_layouts);
            match unsafe { self.ctx.device.allocate_descriptor_sets(&allocate_info) } {
                Ok(sets) => return Ok(self.wrap(pool, sets[0], set_index)),
                Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY) | Err(vk::Result::ERROR_FRAGMENTED_POOL) => continue,
                Err(e) => return Err(engine_err!("prism::vulkan", "Failed to allocate descriptor set: {:?}", e)),
            }
        }

        let pool = self.create_pool()?;
        pools.push(pool);
        engine_info!("prism::vulkan", "Descriptor pools exhausted, created pool #{}", pools.len());

        let allocate_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(pool)
            .set_layouts(&set_layouts);
        let sets = unsafe {
            self.ctx.device.allocate_descriptor_sets(&allocate_info)
                .map_err(|e| engine_err!("prism::vulkan", "Failed to allocate descriptor set from a new pool: {:?}", e))?
        };
        Ok(self.wrap(pool, sets[0], set_index))
    }

    fn wrap(self: &Arc<Self>, pool: vk::DescriptorPool, set: vk::DescriptorSet, set_index: u32) -> VulkanDescriptorSet {
        VulkanDescriptorSet {
            allocator: Arc::clone(self),
            pool,
            set,
            set_index,
        }
    }

    fn free(&self, pool: vk::DescriptorPool, set: vk::DescriptorSet) {
        if let Ok(_pools) = self.lock_pools() {
            unsafe {
                self.ctx.device.free_descriptor_sets(pool, &[set]).ok();
            }
        }
    }

    /// Write resources into `descriptor_set`
    ///
    /// Every info array is built before the first `vk::WriteDescriptorSet`
    /// borrows from it.
    pub(crate) fn update(
        &self,
        samplers: &mut SamplerCache,
        descriptor_set: &VulkanDescriptorSet,
        writes: &[DescriptorWrite],
    ) -> Result<()> {
        let mut buffer_infos: Vec<Vec<vk::DescriptorBufferInfo>> = Vec::with_capacity(writes.len());
        let mut image_infos: Vec<Vec<vk::DescriptorImageInfo>> = Vec::with_capacity(writes.len());

        for write in writes {
            match write.resources {
                WriteResources::Buffers(infos) => {
                    let infos = infos
                        .iter()
                        .map(|info| {
                            let buffer = downcast::<VulkanBuffer>(info.buffer.as_any(), "Buffer")?;
                            Ok(vk::DescriptorBufferInfo {
                                buffer: buffer.buffer,
                                offset: info.offset,
                                range: info.range.unwrap_or(vk::WHOLE_SIZE),
                            })
                        })
                        .collect::<Result<Vec<_>>>()?;
                    buffer_infos.push(infos);
                }
                WriteResources::Images(infos) => {
                    let infos = infos
                        .iter()
                        .map(|info| {
                            let texture = downcast::<VulkanTexture>(info.texture.as_any(), "Texture")?;
                            let sampler = match info.sampler {
                                Some(sampler_type) => samplers.get(sampler_type)?,
                                None => vk::Sampler::null(),
                            };
                            Ok(vk::DescriptorImageInfo {
                                sampler,
                                image_view: texture.view,
                                image_layout: image_layout_to_vk(info.layout),
                            })
                        })
                        .collect::<Result<Vec<_>>>()?;
                    image_infos.push(infos);
                }
                WriteResources::AccelerationStructures(_) => {
                    engine_bail!("prism::vulkan",
                        "Binding {} writes acceleration structures, unsupported by this device", write.binding);
                }
            }
        }

        let mut next_buffers = buffer_infos.iter();
        let mut next_images = image_infos.iter();
        let mut vk_writes = Vec::with_capacity(writes.len());
        for write in writes {
            let base = vk::WriteDescriptorSet::default()
                .dst_set(descriptor_set.set)
                .dst_binding(write.binding)
                .dst_array_element(0)
                .descriptor_type(descriptor_type_to_vk(write.descriptor_type));
            let vk_write = match write.resources {
                WriteResources::Buffers(_) => next_buffers.next().map(|infos| base.buffer_info(infos)),
                WriteResources::Images(_) => next_images.next().map(|infos| base.image_info(infos)),
                WriteResources::AccelerationStructures(_) => None,
            };
            if let Some(vk_write) = vk_write.filter(|w| w.descriptor_count > 0) {
                vk_writes.push(vk_write);
            }
        }

        unsafe {
            self.ctx.device.update_descriptor_sets(&vk_writes, &[]);
        }
        Ok(())
    }
}

impl Drop for DescriptorAllocator {
    fn drop(&mut self) {
        if let Ok(pools) = self.pools.get_mut() {
            for pool in pools.drain(..) {
                unsafe {
                    self.ctx.device.destroy_descriptor_pool(pool, None);
                }
            }
        }
    }
}

// ===== SETS =====

/// Descriptor set, freed back to its pool on drop
pub struct VulkanDescriptorSet {
    allocator: Arc<DescriptorAllocator>,
    pool: vk::DescriptorPool,
    pub(crate) set: vk::DescriptorSet,
    set_index: u32,
}

impl DescriptorSet for VulkanDescriptorSet {
    fn set_index(&self) -> u32 {
        self.set_index
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanDescriptorSet {
    fn drop(&mut self) {
        self.allocator.free(self.pool, self.set);
    }
}
