/// Conversions between engine enums and their Vulkan counterparts
///
/// Pure functions only, so every mapping is testable without a device.

use ash::vk;
use blur_engine::blur::render::{
    AddressMode, BlendFactor, BlendOp, BufferUsage, ColorSpace, ColorWriteMask, CompareOp,
    CullMode, DescriptorType, DeviceType, DynamicState, Extent2D, Extent3D, Filter, FrontFace,
    ImageLayout, ImageTiling, ImageViewType, LoadOp, MemoryUsage, MipmapMode, PresentMode,
    PrimitiveTopology, QueueFlags, SampleCount, ShaderStage, ShaderStageFlags, SharingMode,
    StoreOp, SurfaceCapabilities, SurfaceFormat, TextureFlags, TextureFormat, TextureType,
    TextureUsage, VertexFormat, ViewAspect,
};
use gpu_allocator::MemoryLocation;

// ===== FORMATS =====

pub fn format_to_vk(format: TextureFormat) -> vk::Format {
    match format {
        TextureFormat::Undefined => vk::Format::UNDEFINED,
        TextureFormat::R8_UNORM => vk::Format::R8_UNORM,
        TextureFormat::R8G8_UNORM => vk::Format::R8G8_UNORM,
        TextureFormat::R8G8B8A8_UNORM => vk::Format::R8G8B8A8_UNORM,
        TextureFormat::R8G8B8A8_SRGB => vk::Format::R8G8B8A8_SRGB,
        TextureFormat::B8G8R8A8_UNORM => vk::Format::B8G8R8A8_UNORM,
        TextureFormat::B8G8R8A8_SRGB => vk::Format::B8G8R8A8_SRGB,
        TextureFormat::A2B10G10R10_UNORM_PACK32 => vk::Format::A2B10G10R10_UNORM_PACK32,
        TextureFormat::R16G16B16A16_SFLOAT => vk::Format::R16G16B16A16_SFLOAT,
        TextureFormat::R32_UINT => vk::Format::R32_UINT,
        TextureFormat::R32_SFLOAT => vk::Format::R32_SFLOAT,
        TextureFormat::R32G32_SFLOAT => vk::Format::R32G32_SFLOAT,
        TextureFormat::R32G32B32A32_SFLOAT => vk::Format::R32G32B32A32_SFLOAT,
        TextureFormat::D16_UNORM => vk::Format::D16_UNORM,
        TextureFormat::X8_D24_UNORM_PACK32 => vk::Format::X8_D24_UNORM_PACK32,
        TextureFormat::D32_SFLOAT => vk::Format::D32_SFLOAT,
        TextureFormat::S8_UINT => vk::Format::S8_UINT,
        TextureFormat::D16_UNORM_S8_UINT => vk::Format::D16_UNORM_S8_UINT,
        TextureFormat::D24_UNORM_S8_UINT => vk::Format::D24_UNORM_S8_UINT,
        TextureFormat::D32_SFLOAT_S8_UINT => vk::Format::D32_SFLOAT_S8_UINT,
    }
}

/// Formats the engine has no name for map to `Undefined`
pub fn vk_format_to_format(format: vk::Format) -> TextureFormat {
    TextureFormat::ALL
        .into_iter()
        .find(|&f| format_to_vk(f) == format)
        .unwrap_or(TextureFormat::Undefined)
}

pub fn vertex_format_to_vk(format: VertexFormat) -> vk::Format {
    match format {
        VertexFormat::R32_SFLOAT => vk::Format::R32_SFLOAT,
        VertexFormat::R32G32_SFLOAT => vk::Format::R32G32_SFLOAT,
        VertexFormat::R32G32B32_SFLOAT => vk::Format::R32G32B32_SFLOAT,
        VertexFormat::R32G32B32A32_SFLOAT => vk::Format::R32G32B32A32_SFLOAT,
        VertexFormat::R32_UINT => vk::Format::R32_UINT,
        VertexFormat::R32G32_UINT => vk::Format::R32G32_UINT,
        VertexFormat::R32G32B32A32_UINT => vk::Format::R32G32B32A32_UINT,
        VertexFormat::R8G8B8A8_UNORM => vk::Format::R8G8B8A8_UNORM,
    }
}

/// Aspect bits of the default view (depth wins over stencil)
pub fn view_aspect_to_vk(aspect: ViewAspect) -> vk::ImageAspectFlags {
    match aspect {
        ViewAspect::Color => vk::ImageAspectFlags::COLOR,
        ViewAspect::Depth => vk::ImageAspectFlags::DEPTH,
        ViewAspect::Stencil => vk::ImageAspectFlags::STENCIL,
    }
}

/// Every aspect a format carries (barriers on depth-stencil images need both)
pub fn full_aspect_mask(format: TextureFormat) -> vk::ImageAspectFlags {
    let mut mask = vk::ImageAspectFlags::empty();
    if format.is_depth() {
        mask |= vk::ImageAspectFlags::DEPTH;
    }
    if format.is_stencil() {
        mask |= vk::ImageAspectFlags::STENCIL;
    }
    if mask.is_empty() {
        mask = vk::ImageAspectFlags::COLOR;
    }
    mask
}

// ===== SURFACE =====

pub fn color_space_to_vk(color_space: ColorSpace) -> vk::ColorSpaceKHR {
    match color_space {
        ColorSpace::SrgbNonlinear => vk::ColorSpaceKHR::SRGB_NONLINEAR,
        ColorSpace::Other(raw) => vk::ColorSpaceKHR::from_raw(raw),
    }
}

pub fn vk_color_space_to_color_space(color_space: vk::ColorSpaceKHR) -> ColorSpace {
    if color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR {
        ColorSpace::SrgbNonlinear
    } else {
        ColorSpace::Other(color_space.as_raw())
    }
}

pub fn vk_surface_format_to_surface_format(format: &vk::SurfaceFormatKHR) -> SurfaceFormat {
    SurfaceFormat {
        format: vk_format_to_format(format.format),
        color_space: vk_color_space_to_color_space(format.color_space),
    }
}

pub fn surface_format_to_vk(format: SurfaceFormat) -> vk::SurfaceFormatKHR {
    vk::SurfaceFormatKHR {
        format: format_to_vk(format.format),
        color_space: color_space_to_vk(format.color_space),
    }
}

pub fn present_mode_to_vk(mode: PresentMode) -> vk::PresentModeKHR {
    match mode {
        PresentMode::Immediate => vk::PresentModeKHR::IMMEDIATE,
        PresentMode::Mailbox => vk::PresentModeKHR::MAILBOX,
        PresentMode::Fifo => vk::PresentModeKHR::FIFO,
        PresentMode::FifoRelaxed => vk::PresentModeKHR::FIFO_RELAXED,
    }
}

/// Shared-image present modes have no engine counterpart and are dropped
pub fn vk_present_mode_to_present_mode(mode: vk::PresentModeKHR) -> Option<PresentMode> {
    match mode {
        vk::PresentModeKHR::IMMEDIATE => Some(PresentMode::Immediate),
        vk::PresentModeKHR::MAILBOX => Some(PresentMode::Mailbox),
        vk::PresentModeKHR::FIFO => Some(PresentMode::Fifo),
        vk::PresentModeKHR::FIFO_RELAXED => Some(PresentMode::FifoRelaxed),
        _ => None,
    }
}

pub fn sharing_mode_to_vk(mode: SharingMode) -> vk::SharingMode {
    match mode {
        SharingMode::Exclusive => vk::SharingMode::EXCLUSIVE,
        SharingMode::Concurrent => vk::SharingMode::CONCURRENT,
    }
}

pub fn extent_to_vk(extent: Extent2D) -> vk::Extent2D {
    vk::Extent2D { width: extent.width, height: extent.height }
}

pub fn vk_extent_to_extent(extent: vk::Extent2D) -> Extent2D {
    Extent2D::new(extent.width, extent.height)
}

pub fn extent_3d_to_vk(extent: Extent3D) -> vk::Extent3D {
    vk::Extent3D { width: extent.width, height: extent.height, depth: extent.depth }
}

pub fn vk_surface_capabilities(caps: &vk::SurfaceCapabilitiesKHR) -> SurfaceCapabilities {
    SurfaceCapabilities {
        min_image_count: caps.min_image_count,
        max_image_count: caps.max_image_count,
        current_extent: vk_extent_to_extent(caps.current_extent),
        min_image_extent: vk_extent_to_extent(caps.min_image_extent),
        max_image_extent: vk_extent_to_extent(caps.max_image_extent),
    }
}

// ===== DEVICE =====

pub fn vk_queue_flags_to_queue_flags(flags: vk::QueueFlags) -> QueueFlags {
    let mut out = QueueFlags::empty();
    if flags.contains(vk::QueueFlags::GRAPHICS) {
        out |= QueueFlags::GRAPHICS;
    }
    if flags.contains(vk::QueueFlags::COMPUTE) {
        out |= QueueFlags::COMPUTE;
    }
    if flags.contains(vk::QueueFlags::TRANSFER) {
        out |= QueueFlags::TRANSFER;
    }
    if flags.contains(vk::QueueFlags::SPARSE_BINDING) {
        out |= QueueFlags::SPARSE;
    }
    out
}

pub fn vk_device_type_to_device_type(device_type: vk::PhysicalDeviceType) -> DeviceType {
    match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => DeviceType::Discrete,
        vk::PhysicalDeviceType::INTEGRATED_GPU => DeviceType::Integrated,
        vk::PhysicalDeviceType::VIRTUAL_GPU => DeviceType::Virtual,
        vk::PhysicalDeviceType::CPU => DeviceType::Cpu,
        _ => DeviceType::Other,
    }
}

// ===== RESOURCES =====

pub fn buffer_usage_to_vk(usage: BufferUsage) -> vk::BufferUsageFlags {
    vk::BufferUsageFlags::from_raw(usage.bits())
}

pub fn memory_usage_to_location(memory: MemoryUsage) -> MemoryLocation {
    match memory {
        MemoryUsage::GpuOnly => MemoryLocation::GpuOnly,
        MemoryUsage::CpuOnly | MemoryUsage::CpuToGpu => MemoryLocation::CpuToGpu,
        MemoryUsage::GpuToCpu => MemoryLocation::GpuToCpu,
    }
}

pub fn texture_usage_to_vk(usage: TextureUsage) -> vk::ImageUsageFlags {
    vk::ImageUsageFlags::from_raw(usage.bits())
}

pub fn texture_flags_to_vk(flags: TextureFlags) -> vk::ImageCreateFlags {
    vk::ImageCreateFlags::from_raw(flags.bits())
}

pub fn texture_type_to_vk(texture_type: TextureType) -> vk::ImageType {
    match texture_type {
        TextureType::Tex1D => vk::ImageType::TYPE_1D,
        TextureType::Tex2D => vk::ImageType::TYPE_2D,
        TextureType::Tex3D => vk::ImageType::TYPE_3D,
    }
}

pub fn view_type_to_vk(view_type: ImageViewType) -> vk::ImageViewType {
    match view_type {
        ImageViewType::View1D => vk::ImageViewType::TYPE_1D,
        ImageViewType::View1DArray => vk::ImageViewType::TYPE_1D_ARRAY,
        ImageViewType::View2D => vk::ImageViewType::TYPE_2D,
        ImageViewType::View2DArray => vk::ImageViewType::TYPE_2D_ARRAY,
        ImageViewType::Cube => vk::ImageViewType::CUBE,
        ImageViewType::View3D => vk::ImageViewType::TYPE_3D,
    }
}

pub fn sample_count_to_vk(samples: SampleCount) -> vk::SampleCountFlags {
    vk::SampleCountFlags::from_raw(samples.count())
}

pub fn tiling_to_vk(tiling: ImageTiling) -> vk::ImageTiling {
    match tiling {
        ImageTiling::Optimal => vk::ImageTiling::OPTIMAL,
        ImageTiling::Linear => vk::ImageTiling::LINEAR,
    }
}

// ===== SAMPLER =====

pub fn filter_to_vk(filter: Filter) -> vk::Filter {
    match filter {
        Filter::Nearest => vk::Filter::NEAREST,
        Filter::Linear => vk::Filter::LINEAR,
    }
}

pub fn mipmap_mode_to_vk(mode: MipmapMode) -> vk::SamplerMipmapMode {
    match mode {
        MipmapMode::Nearest => vk::SamplerMipmapMode::NEAREST,
        MipmapMode::Linear => vk::SamplerMipmapMode::LINEAR,
    }
}

pub fn address_mode_to_vk(mode: AddressMode) -> vk::SamplerAddressMode {
    match mode {
        AddressMode::Repeat => vk::SamplerAddressMode::REPEAT,
        AddressMode::MirroredRepeat => vk::SamplerAddressMode::MIRRORED_REPEAT,
        AddressMode::ClampToEdge => vk::SamplerAddressMode::CLAMP_TO_EDGE,
        AddressMode::ClampToBorder => vk::SamplerAddressMode::CLAMP_TO_BORDER,
    }
}

pub fn compare_op_to_vk(op: CompareOp) -> vk::CompareOp {
    match op {
        CompareOp::Never => vk::CompareOp::NEVER,
        CompareOp::Less => vk::CompareOp::LESS,
        CompareOp::Equal => vk::CompareOp::EQUAL,
        CompareOp::LessOrEqual => vk::CompareOp::LESS_OR_EQUAL,
        CompareOp::Greater => vk::CompareOp::GREATER,
        CompareOp::NotEqual => vk::CompareOp::NOT_EQUAL,
        CompareOp::GreaterOrEqual => vk::CompareOp::GREATER_OR_EQUAL,
        CompareOp::Always => vk::CompareOp::ALWAYS,
    }
}

// ===== PIPELINE STATE =====

pub fn topology_to_vk(topology: PrimitiveTopology) -> vk::PrimitiveTopology {
    match topology {
        PrimitiveTopology::PointList => vk::PrimitiveTopology::POINT_LIST,
        PrimitiveTopology::LineList => vk::PrimitiveTopology::LINE_LIST,
        PrimitiveTopology::LineStrip => vk::PrimitiveTopology::LINE_STRIP,
        PrimitiveTopology::TriangleList => vk::PrimitiveTopology::TRIANGLE_LIST,
        PrimitiveTopology::TriangleStrip => vk::PrimitiveTopology::TRIANGLE_STRIP,
        PrimitiveTopology::TriangleFan => vk::PrimitiveTopology::TRIANGLE_FAN,
    }
}

pub fn cull_mode_to_vk(mode: CullMode) -> vk::CullModeFlags {
    match mode {
        CullMode::None => vk::CullModeFlags::NONE,
        CullMode::Front => vk::CullModeFlags::FRONT,
        CullMode::Back => vk::CullModeFlags::BACK,
        CullMode::FrontAndBack => vk::CullModeFlags::FRONT_AND_BACK,
    }
}

pub fn front_face_to_vk(face: FrontFace) -> vk::FrontFace {
    match face {
        FrontFace::CounterClockwise => vk::FrontFace::COUNTER_CLOCKWISE,
        FrontFace::Clockwise => vk::FrontFace::CLOCKWISE,
    }
}

pub fn dynamic_state_to_vk(state: DynamicState) -> vk::DynamicState {
    match state {
        DynamicState::Viewport => vk::DynamicState::VIEWPORT,
        DynamicState::Scissor => vk::DynamicState::SCISSOR,
        DynamicState::LineWidth => vk::DynamicState::LINE_WIDTH,
        DynamicState::DepthBias => vk::DynamicState::DEPTH_BIAS,
        DynamicState::StencilReference => vk::DynamicState::STENCIL_REFERENCE,
    }
}

pub fn blend_factor_to_vk(factor: BlendFactor) -> vk::BlendFactor {
    match factor {
        BlendFactor::Zero => vk::BlendFactor::ZERO,
        BlendFactor::One => vk::BlendFactor::ONE,
        BlendFactor::SrcAlpha => vk::BlendFactor::SRC_ALPHA,
        BlendFactor::OneMinusSrcAlpha => vk::BlendFactor::ONE_MINUS_SRC_ALPHA,
        BlendFactor::DstAlpha => vk::BlendFactor::DST_ALPHA,
        BlendFactor::OneMinusDstAlpha => vk::BlendFactor::ONE_MINUS_DST_ALPHA,
        BlendFactor::SrcColor => vk::BlendFactor::SRC_COLOR,
        BlendFactor::OneMinusSrcColor => vk::BlendFactor::ONE_MINUS_SRC_COLOR,
    }
}

pub fn blend_op_to_vk(op: BlendOp) -> vk::BlendOp {
    match op {
        BlendOp::Add => vk::BlendOp::ADD,
        BlendOp::Subtract => vk::BlendOp::SUBTRACT,
        BlendOp::ReverseSubtract => vk::BlendOp::REVERSE_SUBTRACT,
        BlendOp::Min => vk::BlendOp::MIN,
        BlendOp::Max => vk::BlendOp::MAX,
    }
}

pub fn color_write_mask_to_vk(mask: ColorWriteMask) -> vk::ColorComponentFlags {
    vk::ColorComponentFlags::from_raw(mask.bits())
}

// ===== RENDER PASS =====

pub fn load_op_to_vk(op: LoadOp) -> vk::AttachmentLoadOp {
    match op {
        LoadOp::Load => vk::AttachmentLoadOp::LOAD,
        LoadOp::Clear => vk::AttachmentLoadOp::CLEAR,
        LoadOp::DontCare => vk::AttachmentLoadOp::DONT_CARE,
    }
}

pub fn store_op_to_vk(op: StoreOp) -> vk::AttachmentStoreOp {
    match op {
        StoreOp::Store => vk::AttachmentStoreOp::STORE,
        StoreOp::DontCare => vk::AttachmentStoreOp::DONT_CARE,
    }
}

pub fn image_layout_to_vk(layout: ImageLayout) -> vk::ImageLayout {
    match layout {
        ImageLayout::Undefined => vk::ImageLayout::UNDEFINED,
        ImageLayout::General => vk::ImageLayout::GENERAL,
        ImageLayout::ColorAttachment => vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        ImageLayout::DepthStencilAttachment => vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        ImageLayout::ShaderReadOnly => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        ImageLayout::TransferSrc => vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
        ImageLayout::TransferDst => vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        ImageLayout::PresentSrc => vk::ImageLayout::PRESENT_SRC_KHR,
    }
}

// ===== DESCRIPTORS AND STAGES =====

pub fn descriptor_type_to_vk(descriptor_type: DescriptorType) -> vk::DescriptorType {
    match descriptor_type {
        DescriptorType::Sampler => vk::DescriptorType::SAMPLER,
        DescriptorType::CombinedImageSampler => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
        DescriptorType::SampledImage => vk::DescriptorType::SAMPLED_IMAGE,
        DescriptorType::StorageImage => vk::DescriptorType::STORAGE_IMAGE,
        DescriptorType::UniformTexelBuffer => vk::DescriptorType::UNIFORM_TEXEL_BUFFER,
        DescriptorType::StorageTexelBuffer => vk::DescriptorType::STORAGE_TEXEL_BUFFER,
        DescriptorType::UniformBuffer => vk::DescriptorType::UNIFORM_BUFFER,
        DescriptorType::StorageBuffer => vk::DescriptorType::STORAGE_BUFFER,
        DescriptorType::UniformBufferDynamic => vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
        DescriptorType::StorageBufferDynamic => vk::DescriptorType::STORAGE_BUFFER_DYNAMIC,
        DescriptorType::InputAttachment => vk::DescriptorType::INPUT_ATTACHMENT,
    }
}

pub fn stage_flags_to_vk(flags: ShaderStageFlags) -> vk::ShaderStageFlags {
    vk::ShaderStageFlags::from_raw(flags.bits())
}

pub fn shader_stage_to_vk(stage: ShaderStage) -> vk::ShaderStageFlags {
    stage_flags_to_vk(stage.flags())
}

#[cfg(test)]
#[path = "vulkan_format_tests.rs"]
mod tests;
