/// Texture - Vulkan image with its default view and a per-mip view cache
///
/// Owned textures allocate their memory through gpu-allocator. Swapchain
/// textures wrap an image owned by the swapchain and only destroy their views.
/// Depth/stencil classification always comes from the format table, never from
/// state stored on the texture.

use ash::vk;
use blur_engine::blur::render::{
    AttachmentInfo, BufferDesc, BufferUsage, Extent2D, Extent3D, ImageLayout, ImageTiling, LoadOp,
    MemoryUsage, SampleCount, StoreOp, TextureDesc, TextureFormat, TextureUsage,
};
use blur_engine::blur::{Error, Result};
use blur_engine::{engine_debug, engine_err, engine_error, engine_precondition};
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;
use rustc_hash::FxHashMap;
use std::sync::{Arc, Mutex};

use crate::vulkan_buffer::Buffer;
use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{
    extent_3d_to_vk, format_to_vk, full_aspect_mask, image_layout_to_vk, sample_count_to_vk,
    texture_flags_to_vk, texture_type_to_vk, texture_usage_to_vk, tiling_to_vk, view_aspect_to_vk,
    view_type_to_vk,
};

const LOG_SOURCE: &str = "blur::vulkan::Texture";

/// Vulkan texture
pub struct Texture {
    /// Shared GPU context (device, allocator, queues)
    ctx: Arc<GpuContext>,
    pub(crate) image: vk::Image,
    /// View over every mip and layer
    pub(crate) view: vk::ImageView,
    /// None for swapchain images (owned by the swapchain)
    allocation: Option<Allocation>,
    desc: TextureDesc,
    mip_levels: u32,
    /// Single-mip views, created on first request
    mip_views: Mutex<FxHashMap<u32, vk::ImageView>>,
}

impl Texture {
    /// Create an image, allocate its memory and build the default view
    pub(crate) fn create(ctx: &Arc<GpuContext>, desc: &TextureDesc) -> Result<Self> {
        let mip_levels = desc.validate().map_err(|e| {
            engine_error!(LOG_SOURCE, "{}", e);
            e
        })?;
        let max_dimension = ctx.physical_device().limits().max_image_dimension2_d;
        engine_precondition!(
            desc.extent.width <= max_dimension && desc.extent.height <= max_dimension,
            LOG_SOURCE,
            "Texture '{}' ({}x{}) exceeds the device limit of {}",
            desc.name,
            desc.extent.width,
            desc.extent.height,
            max_dimension
        );

        let mut usage = desc.usage;
        if mip_levels > 1 && desc.generate_mips {
            usage |= TextureUsage::TRANSFER_SRC | TextureUsage::TRANSFER_DST;
        }

        let image_info = vk::ImageCreateInfo::default()
            .image_type(texture_type_to_vk(desc.texture_type))
            .format(format_to_vk(desc.format))
            .extent(extent_3d_to_vk(desc.extent))
            .mip_levels(mip_levels)
            .array_layers(desc.layer_count)
            .samples(sample_count_to_vk(desc.samples))
            .tiling(tiling_to_vk(desc.tiling))
            .usage(texture_usage_to_vk(usage))
            .flags(texture_flags_to_vk(desc.flags))
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        unsafe {
            let image = ctx.device.create_image(&image_info, None).map_err(|e| {
                engine_error!(LOG_SOURCE, "Failed to create image '{}': {:?}", desc.name, e);
                Error::BackendError(format!("Failed to create image: {:?}", e))
            })?;

            let allocation = match allocate_image_memory(ctx, image, desc) {
                Ok(allocation) => allocation,
                Err(e) => {
                    ctx.device.destroy_image(image, None);
                    return Err(e);
                }
            };

            let view = match create_view(&ctx.device, image, desc, 0, mip_levels) {
                Ok(view) => view,
                Err(e) => {
                    if let Ok(mut allocator) = ctx.allocator() {
                        allocator.free(allocation).ok();
                    }
                    ctx.device.destroy_image(image, None);
                    return Err(e);
                }
            };

            engine_debug!(
                LOG_SOURCE,
                "Created texture '{}' {}x{}x{} ({:?}, {} mips, {} layers)",
                desc.name,
                desc.extent.width,
                desc.extent.height,
                desc.extent.depth,
                desc.format,
                mip_levels,
                desc.layer_count
            );

            Ok(Self {
                ctx: Arc::clone(ctx),
                image,
                view,
                allocation: Some(allocation),
                desc: TextureDesc { mip_levels, ..desc.clone() },
                mip_levels,
                mip_views: Mutex::new(FxHashMap::default()),
            })
        }
    }

    /// Wrap a presentable image; only the view is owned
    pub(crate) fn from_swapchain_image(
        ctx: &Arc<GpuContext>,
        image: vk::Image,
        format: TextureFormat,
        extent: Extent2D,
        index: usize,
    ) -> Result<Self> {
        let desc = TextureDesc::new_2d(
            format,
            extent.width,
            extent.height,
            TextureUsage::COLOR_ATTACHMENT,
            format!("Swapchain Image {}", index),
        );
        let view = create_view(&ctx.device, image, &desc, 0, 1)?;
        Ok(Self {
            ctx: Arc::clone(ctx),
            image,
            view,
            allocation: None,
            desc,
            mip_levels: 1,
            mip_views: Mutex::new(FxHashMap::default()),
        })
    }

    pub fn handle(&self) -> vk::Image {
        self.image
    }

    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    pub fn desc(&self) -> &TextureDesc {
        &self.desc
    }

    pub fn name(&self) -> &str {
        &self.desc.name
    }

    pub fn format(&self) -> TextureFormat {
        self.desc.format
    }

    pub fn extent(&self) -> Extent3D {
        self.desc.extent
    }

    pub fn extent_2d(&self) -> Extent2D {
        Extent2D::new(self.desc.extent.width, self.desc.extent.height)
    }

    pub fn mip_levels(&self) -> u32 {
        self.mip_levels
    }

    pub fn samples(&self) -> SampleCount {
        self.desc.samples
    }

    pub fn is_swapchain_image(&self) -> bool {
        self.allocation.is_none()
    }

    pub fn is_depth(&self) -> bool {
        self.desc.format.is_depth()
    }

    pub fn is_stencil(&self) -> bool {
        self.desc.format.is_stencil()
    }

    pub fn aspect_mask(&self) -> vk::ImageAspectFlags {
        full_aspect_mask(self.desc.format)
    }

    /// View of a single mip level, cached
    pub fn mip_view(&self, mip_level: u32) -> Result<vk::ImageView> {
        engine_precondition!(
            mip_level < self.mip_levels,
            LOG_SOURCE,
            "Mip level {} out of range for '{}' ({} levels)",
            mip_level,
            self.desc.name,
            self.mip_levels
        );
        if mip_level == 0 && self.mip_levels == 1 {
            return Ok(self.view);
        }

        let mut views = self
            .mip_views
            .lock()
            .map_err(|_| engine_err!(LOG_SOURCE, "Mip view cache mutex poisoned"))?;
        if let Some(view) = views.get(&mip_level) {
            return Ok(*view);
        }
        let view = create_view(&self.ctx.device, self.image, &self.desc, mip_level, 1)?;
        views.insert(mip_level, view);
        Ok(view)
    }

    /// Attachment description for a render pass using this texture
    pub fn attachment_info(&self, load_op: LoadOp, store_op: StoreOp, final_layout: ImageLayout) -> AttachmentInfo {
        AttachmentInfo {
            format: self.desc.format,
            samples: self.desc.samples,
            load_op,
            store_op,
            initial_layout: ImageLayout::Undefined,
            final_layout,
        }
    }

    /// Record a layout transition covering every mip and layer
    pub fn record_transition(&self, cmd: vk::CommandBuffer, old: ImageLayout, new: ImageLayout) {
        let range = vk::ImageSubresourceRange {
            aspect_mask: self.aspect_mask(),
            base_mip_level: 0,
            level_count: self.mip_levels,
            base_array_layer: 0,
            layer_count: self.desc.layer_count,
        };
        record_image_barrier(&self.ctx.device, cmd, self.image, range, image_layout_to_vk(old), image_layout_to_vk(new));
    }

    /// Fill mips 1.. by blitting down from mip 0
    ///
    /// Expects every mip in TRANSFER_DST layout; leaves every mip in
    /// SHADER_READ_ONLY layout.
    pub fn record_generate_mipmaps(&self, cmd: vk::CommandBuffer) -> Result<()> {
        let format_properties = unsafe {
            self.ctx
                .instance
                .get_physical_device_format_properties(self.ctx.physical_device().handle, format_to_vk(self.desc.format))
        };
        engine_precondition!(
            format_properties
                .optimal_tiling_features
                .contains(vk::FormatFeatureFlags::SAMPLED_IMAGE_FILTER_LINEAR),
            LOG_SOURCE,
            "Format {:?} of '{}' does not support linear blitting",
            self.desc.format,
            self.desc.name
        );

        let device = &self.ctx.device;
        let aspect_mask = self.aspect_mask();
        let layer_count = self.desc.layer_count;
        let mip_range = |level: u32| vk::ImageSubresourceRange {
            aspect_mask,
            base_mip_level: level,
            level_count: 1,
            base_array_layer: 0,
            layer_count,
        };

        let mut width = self.desc.extent.width as i32;
        let mut height = self.desc.extent.height as i32;
        for level in 1..self.mip_levels {
            record_image_barrier(
                device,
                cmd,
                self.image,
                mip_range(level - 1),
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            );

            let next_width = (width / 2).max(1);
            let next_height = (height / 2).max(1);
            let blit = vk::ImageBlit {
                src_subresource: vk::ImageSubresourceLayers {
                    aspect_mask,
                    mip_level: level - 1,
                    base_array_layer: 0,
                    layer_count,
                },
                src_offsets: [vk::Offset3D::default(), vk::Offset3D { x: width, y: height, z: 1 }],
                dst_subresource: vk::ImageSubresourceLayers {
                    aspect_mask,
                    mip_level: level,
                    base_array_layer: 0,
                    layer_count,
                },
                dst_offsets: [vk::Offset3D::default(), vk::Offset3D { x: next_width, y: next_height, z: 1 }],
            };
            unsafe {
                device.cmd_blit_image(
                    cmd,
                    self.image,
                    vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                    self.image,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &[blit],
                    vk::Filter::LINEAR,
                );
            }

            record_image_barrier(
                device,
                cmd,
                self.image,
                mip_range(level - 1),
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            );
            width = next_width;
            height = next_height;
        }

        record_image_barrier(
            device,
            cmd,
            self.image,
            mip_range(self.mip_levels - 1),
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        );
        Ok(())
    }

    /// Upload `data` into mip 0 through a temporary staging buffer and leave
    /// the texture ready for sampling (mips generated when requested)
    ///
    /// Blocks until the copy has completed on the GPU.
    pub fn upload(&self, data: &[u8]) -> Result<()> {
        engine_precondition!(!data.is_empty(), LOG_SOURCE, "No data to upload into '{}'", self.desc.name);
        engine_precondition!(
            !self.is_swapchain_image(),
            LOG_SOURCE,
            "Cannot upload into swapchain image '{}'",
            self.desc.name
        );

        let staging = Buffer::create(
            &self.ctx,
            &BufferDesc::new(
                data.len() as u64,
                BufferUsage::TRANSFER_SRC,
                MemoryUsage::CpuOnly,
                format!("Texture Staging: {}", self.desc.name),
            ),
        )?;
        staging.copy_to_buffer(data)?;

        let generate = self.desc.generate_mips && self.mip_levels > 1;
        self.ctx.immediate_submit(|cmd| {
            self.record_transition(cmd, ImageLayout::Undefined, ImageLayout::TransferDst);

            let region = vk::BufferImageCopy {
                buffer_offset: 0,
                buffer_row_length: 0,
                buffer_image_height: 0,
                image_subresource: vk::ImageSubresourceLayers {
                    aspect_mask: view_aspect_to_vk(self.desc.format.view_aspect()),
                    mip_level: 0,
                    base_array_layer: 0,
                    layer_count: self.desc.layer_count,
                },
                image_offset: vk::Offset3D::default(),
                image_extent: extent_3d_to_vk(self.desc.extent),
            };
            unsafe {
                self.ctx.device.cmd_copy_buffer_to_image(
                    cmd,
                    staging.handle(),
                    self.image,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &[region],
                );
            }

            if generate {
                self.record_generate_mipmaps(cmd)
            } else {
                self.record_transition(cmd, ImageLayout::TransferDst, ImageLayout::ShaderReadOnly);
                Ok(())
            }
        })
    }
}

/// Access masks and pipeline stages a layout is produced or consumed in
fn layout_access(layout: vk::ImageLayout) -> (vk::AccessFlags, vk::PipelineStageFlags) {
    match layout {
        vk::ImageLayout::UNDEFINED => (vk::AccessFlags::empty(), vk::PipelineStageFlags::TOP_OF_PIPE),
        vk::ImageLayout::TRANSFER_DST_OPTIMAL => (vk::AccessFlags::TRANSFER_WRITE, vk::PipelineStageFlags::TRANSFER),
        vk::ImageLayout::TRANSFER_SRC_OPTIMAL => (vk::AccessFlags::TRANSFER_READ, vk::PipelineStageFlags::TRANSFER),
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL => (
            vk::AccessFlags::SHADER_READ,
            vk::PipelineStageFlags::FRAGMENT_SHADER | vk::PipelineStageFlags::COMPUTE_SHADER,
        ),
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL => (
            vk::AccessFlags::COLOR_ATTACHMENT_READ | vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
        ),
        vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL => (
            vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS,
        ),
        vk::ImageLayout::PRESENT_SRC_KHR => (vk::AccessFlags::empty(), vk::PipelineStageFlags::BOTTOM_OF_PIPE),
        _ => (
            vk::AccessFlags::MEMORY_READ | vk::AccessFlags::MEMORY_WRITE,
            vk::PipelineStageFlags::ALL_COMMANDS,
        ),
    }
}

pub(crate) fn record_image_barrier(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    image: vk::Image,
    range: vk::ImageSubresourceRange,
    old_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
) {
    let (src_access, src_stage) = layout_access(old_layout);
    let (dst_access, dst_stage) = layout_access(new_layout);
    let barrier = vk::ImageMemoryBarrier::default()
        .old_layout(old_layout)
        .new_layout(new_layout)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(range)
        .src_access_mask(src_access)
        .dst_access_mask(dst_access);

    unsafe {
        device.cmd_pipeline_barrier(
            cmd,
            src_stage,
            dst_stage,
            vk::DependencyFlags::empty(),
            &[],
            &[],
            &[barrier],
        );
    }
}

fn allocate_image_memory(ctx: &GpuContext, image: vk::Image, desc: &TextureDesc) -> Result<Allocation> {
    let requirements = unsafe { ctx.device.get_image_memory_requirements(image) };
    let location = if desc.host_visible {
        MemoryLocation::CpuToGpu
    } else {
        MemoryLocation::GpuOnly
    };

    let allocation = ctx.allocator()?.allocate(&AllocationCreateDesc {
        name: &desc.name,
        requirements,
        location,
        linear: desc.tiling == ImageTiling::Linear,
        allocation_scheme: AllocationScheme::GpuAllocatorManaged,
    });
    let allocation = allocation.map_err(|e| {
        engine_error!(LOG_SOURCE, "Failed to allocate image memory for '{}': {:?}", desc.name, e);
        Error::OutOfMemory
    })?;

    if let Err(e) = unsafe { ctx.device.bind_image_memory(image, allocation.memory(), allocation.offset()) } {
        engine_error!(LOG_SOURCE, "Failed to bind image memory of '{}': {:?}", desc.name, e);
        if let Ok(mut allocator) = ctx.allocator() {
            allocator.free(allocation).ok();
        }
        return Err(Error::BackendError(format!("Failed to bind image memory: {:?}", e)));
    }
    Ok(allocation)
}

fn create_view(
    device: &ash::Device,
    image: vk::Image,
    desc: &TextureDesc,
    base_mip_level: u32,
    level_count: u32,
) -> Result<vk::ImageView> {
    let view_info = vk::ImageViewCreateInfo::default()
        .image(image)
        .view_type(view_type_to_vk(desc.view_type()))
        .format(format_to_vk(desc.format))
        .components(vk::ComponentMapping {
            r: vk::ComponentSwizzle::IDENTITY,
            g: vk::ComponentSwizzle::IDENTITY,
            b: vk::ComponentSwizzle::IDENTITY,
            a: vk::ComponentSwizzle::IDENTITY,
        })
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: view_aspect_to_vk(desc.format.view_aspect()),
            base_mip_level,
            level_count,
            base_array_layer: 0,
            layer_count: desc.layer_count,
        });

    unsafe { device.create_image_view(&view_info, None) }.map_err(|e| {
        engine_error!(LOG_SOURCE, "Failed to create image view for '{}': {:?}", desc.name, e);
        Error::BackendError(format!("Failed to create image view: {:?}", e))
    })
}

impl Drop for Texture {
    fn drop(&mut self) {
        unsafe {
            if let Ok(views) = self.mip_views.get_mut() {
                for (_, view) in views.drain() {
                    self.ctx.device.destroy_image_view(view, None);
                }
            }
            self.ctx.device.destroy_image_view(self.view, None);

            // Swapchain images are destroyed with their swapchain
            if let Some(allocation) = self.allocation.take() {
                if let Ok(mut allocator) = self.ctx.allocator() {
                    allocator.free(allocation).ok();
                }
                self.ctx.device.destroy_image(self.image, None);
            }
        }
    }
}
