/// Sampler - VkSampler built from a SamplerDesc

use ash::vk;
use blur_engine::blur::render::{Filter, SamplerDesc};
use blur_engine::blur::{Error, Result};
use blur_engine::engine_error;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{address_mode_to_vk, compare_op_to_vk, filter_to_vk, mipmap_mode_to_vk};

const LOG_SOURCE: &str = "blur::vulkan::Sampler";

/// Upper bound for anisotropic filtering on linear samplers
const MAX_ANISOTROPY: f32 = 16.0;

/// Vulkan sampler
pub struct Sampler {
    ctx: Arc<GpuContext>,
    pub(crate) sampler: vk::Sampler,
    desc: SamplerDesc,
}

impl Sampler {
    pub(crate) fn create(ctx: &Arc<GpuContext>, desc: &SamplerDesc) -> Result<Self> {
        // Anisotropy only makes sense when both filters are linear
        let anisotropy = desc.min_filter == Filter::Linear && desc.mag_filter == Filter::Linear;
        let max_anisotropy = MAX_ANISOTROPY.min(ctx.physical_device().limits().max_sampler_anisotropy);

        let create_info = vk::SamplerCreateInfo::default()
            .mag_filter(filter_to_vk(desc.mag_filter))
            .min_filter(filter_to_vk(desc.min_filter))
            .mipmap_mode(mipmap_mode_to_vk(desc.mipmap_mode()))
            .address_mode_u(address_mode_to_vk(desc.address_u))
            .address_mode_v(address_mode_to_vk(desc.address_v))
            .address_mode_w(address_mode_to_vk(desc.address_w))
            .mip_lod_bias(0.0)
            .anisotropy_enable(anisotropy)
            .max_anisotropy(if anisotropy { max_anisotropy } else { 1.0 })
            .compare_enable(desc.compare.is_some())
            .compare_op(compare_op_to_vk(desc.compare_op()))
            .min_lod(0.0)
            .max_lod(desc.max_lod)
            .border_color(vk::BorderColor::FLOAT_OPAQUE_BLACK)
            .unnormalized_coordinates(false);

        let sampler = unsafe { ctx.device.create_sampler(&create_info, None) }.map_err(|e| {
            engine_error!(LOG_SOURCE, "Failed to create sampler '{}': {:?}", desc.name, e);
            Error::BackendError(format!("Failed to create sampler: {:?}", e))
        })?;

        Ok(Self { ctx: Arc::clone(ctx), sampler, desc: desc.clone() })
    }

    pub fn handle(&self) -> vk::Sampler {
        self.sampler
    }

    pub fn desc(&self) -> &SamplerDesc {
        &self.desc
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        unsafe { self.ctx.device.destroy_sampler(self.sampler, None) };
    }
}
