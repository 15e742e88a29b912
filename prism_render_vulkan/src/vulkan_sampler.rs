/// SamplerCache - VkSampler objects created on first use
///
/// Engines only need a handful of samplers, one per `SamplerType`.

use ash::vk;
use prism_render::engine_err;
use prism_render::prism::Result;
use prism_render::prism::render::SamplerType;
use rustc_hash::FxHashMap;
use std::sync::Arc;

use crate::vulkan_context::VulkanContext;

pub(crate) struct SamplerCache {
    ctx: Arc<VulkanContext>,
    anisotropy: bool,
    cache: FxHashMap<SamplerType, vk::Sampler>,
}

impl SamplerCache {
    pub(crate) fn new(ctx: Arc<VulkanContext>, anisotropy: bool) -> Self {
        Self {
            ctx,
            anisotropy,
            cache: FxHashMap::default(),
        }
    }

    /// Get or create the sampler for `sampler_type`
    pub(crate) fn get(&mut self, sampler_type: SamplerType) -> Result<vk::Sampler> {
        if let Some(&sampler) = self.cache.get(&sampler_type) {
            return Ok(sampler);
        }

        let sampler = self.create_sampler(sampler_type)?;
        self.cache.insert(sampler_type, sampler);
        Ok(sampler)
    }

    fn create_sampler(&self, sampler_type: SamplerType) -> Result<vk::Sampler> {
        let (filter, mipmap, address, anisotropy, border, compare) = match sampler_type {
            SamplerType::LinearRepeat => (
                vk::Filter::LINEAR,
                vk::SamplerMipmapMode::LINEAR,
                vk::SamplerAddressMode::REPEAT,
                None,
                vk::BorderColor::FLOAT_OPAQUE_BLACK,
                false,
            ),
            SamplerType::LinearClamp => (
                vk::Filter::LINEAR,
                vk::SamplerMipmapMode::LINEAR,
                vk::SamplerAddressMode::CLAMP_TO_EDGE,
                None,
                vk::BorderColor::FLOAT_OPAQUE_BLACK,
                false,
            ),
            SamplerType::NearestRepeat => (
                vk::Filter::NEAREST,
                vk::SamplerMipmapMode::NEAREST,
                vk::SamplerAddressMode::REPEAT,
                None,
                vk::BorderColor::FLOAT_OPAQUE_BLACK,
                false,
            ),
            SamplerType::NearestClamp => (
                vk::Filter::NEAREST,
                vk::SamplerMipmapMode::NEAREST,
                vk::SamplerAddressMode::CLAMP_TO_EDGE,
                None,
                vk::BorderColor::FLOAT_OPAQUE_BLACK,
                false,
            ),
            SamplerType::Shadow => (
                vk::Filter::LINEAR,
                vk::SamplerMipmapMode::NEAREST,
                vk::SamplerAddressMode::CLAMP_TO_BORDER,
                None,
                vk::BorderColor::FLOAT_OPAQUE_WHITE,
                true,
            ),
            SamplerType::Anisotropic => (
                vk::Filter::LINEAR,
                vk::SamplerMipmapMode::LINEAR,
                vk::SamplerAddressMode::REPEAT,
                Some(16.0),
                vk::BorderColor::FLOAT_OPAQUE_BLACK,
                false,
            ),
        };

        let mut create_info = vk::SamplerCreateInfo::default()
            .mag_filter(filter)
            .min_filter(filter)
            .mipmap_mode(mipmap)
            .address_mode_u(address)
            .address_mode_v(address)
            .address_mode_w(address)
            .min_lod(0.0)
            .max_lod(vk::LOD_CLAMP_NONE)
            .border_color(border)
            .unnormalized_coordinates(false);

        if compare {
            create_info = create_info
                .compare_enable(true)
                .compare_op(vk::CompareOp::LESS_OR_EQUAL);
        }
        // Falls back to plain trilinear without the device feature
        if let (Some(max), true) = (anisotropy, self.anisotropy) {
            create_info = create_info.anisotropy_enable(true).max_anisotropy(max);
        }

        unsafe {
            self.ctx.device.create_sampler(&create_info, None)
                .map_err(|e| engine_err!("prism::vulkan", "Failed to create {:?} sampler: {:?}", sampler_type, e))
        }
    }
}

impl Drop for SamplerCache {
    fn drop(&mut self) {
        for (_, sampler) in self.cache.drain() {
            unsafe {
                self.ctx.device.destroy_sampler(sampler, None);
            }
        }
    }
}
