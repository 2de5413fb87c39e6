/// Graphics and compute pipeline descriptors, descriptor pools and allocated sets
///
/// Descriptors hold their shaders by `Arc`, so a shader lives at least as long
/// as every pipeline description that references it.

use std::sync::Arc;
use bitflags::bitflags;
use rustc_hash::FxHashMap;
use crate::error::{Error, Result};
use crate::graphics_device::format::TextureFormat;
use crate::graphics_device::sampler::CompareOp;
use crate::graphics_device::shader::{DescriptorType, PushConstantRange, SetLayoutDesc};
use crate::graphics_device::swapchain::Extent2D;
use crate::graphics_device::texture::SampleCount;

// ===== FIXED-FUNCTION STATE =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveTopology {
    PointList,
    LineList,
    LineStrip,
    TriangleList,
    TriangleStrip,
    TriangleFan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CullMode {
    None,
    Front,
    Back,
    FrontAndBack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrontFace {
    CounterClockwise,
    Clockwise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DynamicState {
    Viewport,
    Scissor,
    LineWidth,
    DepthBias,
    StencilReference,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
    SrcColor,
    OneMinusSrcColor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendOp {
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ColorWriteMask: u32 {
        const R = 0b0001;
        const G = 0b0010;
        const B = 0b0100;
        const A = 0b1000;
    }
}

/// Blend state of one color attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendState {
    pub enable: bool,
    pub src_color: BlendFactor,
    pub dst_color: BlendFactor,
    pub color_op: BlendOp,
    pub src_alpha: BlendFactor,
    pub dst_alpha: BlendFactor,
    pub alpha_op: BlendOp,
    pub write_mask: ColorWriteMask,
}

impl BlendState {
    /// Standard alpha blending with blending toggled by `enable`
    pub fn alpha(enable: bool) -> Self {
        Self {
            enable,
            src_color: BlendFactor::SrcAlpha,
            dst_color: BlendFactor::OneMinusSrcAlpha,
            color_op: BlendOp::Add,
            src_alpha: BlendFactor::SrcAlpha,
            dst_alpha: BlendFactor::DstAlpha,
            alpha_op: BlendOp::Add,
            write_mask: ColorWriteMask::all(),
        }
    }
}

impl Default for BlendState {
    fn default() -> Self {
        Self::alpha(false)
    }
}

/// Data format of a vertex attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum VertexFormat {
    R32_SFLOAT,
    R32G32_SFLOAT,
    R32G32B32_SFLOAT,
    R32G32B32A32_SFLOAT,
    R32_UINT,
    R32G32_UINT,
    R32G32B32A32_UINT,
    R8G8B8A8_UNORM,
}

impl VertexFormat {
    pub const fn size_bytes(self) -> u32 {
        match self {
            VertexFormat::R32_SFLOAT | VertexFormat::R32_UINT | VertexFormat::R8G8B8A8_UNORM => 4,
            VertexFormat::R32G32_SFLOAT | VertexFormat::R32G32_UINT => 8,
            VertexFormat::R32G32B32_SFLOAT => 12,
            VertexFormat::R32G32B32A32_SFLOAT | VertexFormat::R32G32B32A32_UINT => 16,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexBinding {
    pub binding: u32,
    pub stride: u32,
    /// Advance per instance instead of per vertex
    pub per_instance: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    pub location: u32,
    pub binding: u32,
    pub format: VertexFormat,
    pub offset: u32,
}

/// Vertex input layout; empty for pipelines that pull vertices themselves
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VertexInputDesc {
    pub bindings: Vec<VertexBinding>,
    pub attributes: Vec<VertexAttribute>,
}

impl VertexInputDesc {
    pub fn validate(&self) -> Result<()> {
        for attr in &self.attributes {
            let binding = self
                .bindings
                .iter()
                .find(|b| b.binding == attr.binding)
                .ok_or_else(|| Error::PreconditionFailed(format!(
                    "Vertex attribute at location {} references unknown binding {}",
                    attr.location, attr.binding
                )))?;
            if attr.offset + attr.format.size_bytes() > binding.stride {
                return Err(Error::PreconditionFailed(format!(
                    "Vertex attribute at location {} overruns the stride of binding {} ({} > {})",
                    attr.location,
                    attr.binding,
                    attr.offset + attr.format.size_bytes(),
                    binding.stride
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpecializationEntry {
    pub constant_id: u32,
    pub offset: u32,
    pub size: u32,
}

/// Specialization constants of one shader stage
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecializationConstants {
    pub entries: Vec<SpecializationEntry>,
    pub data: Vec<u8>,
}

impl SpecializationConstants {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Byte size read by the driver: end of the last entry
    pub fn data_size(&self) -> usize {
        self.entries.last().map_or(0, |e| (e.offset + e.size) as usize)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(entry) = self.entries.iter().find(|e| (e.offset + e.size) as usize > self.data.len()) {
            return Err(Error::PreconditionFailed(format!(
                "Specialization constant {} reads past the end of its data ({} bytes)",
                entry.constant_id,
                self.data.len()
            )));
        }
        Ok(())
    }
}

/// Viewport rectangle and depth range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    pub fn from_extent(extent: Extent2D) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }

    /// Scissor covering the viewport (negative heights flip Y, hence `abs`)
    pub fn scissor_extent(&self) -> Extent2D {
        Extent2D::new(self.width.abs() as u32, self.height.abs() as u32)
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::from_extent(Extent2D::default())
    }
}

// ===== PIPELINE DESCRIPTORS =====

/// Descriptor for a graphics pipeline, generic over the backend's shader module
#[derive(Debug, Clone)]
pub struct GraphicsPipelineDesc<S> {
    pub vertex_shader: Arc<S>,
    pub fragment_shader: Arc<S>,
    /// Explicit set layouts; derived from shader reflection when empty
    pub set_layouts: Vec<SetLayoutDesc>,
    /// Explicit push constants; derived from shader reflection when empty
    pub push_constants: Vec<PushConstantRange>,
    pub dynamic_states: Vec<DynamicState>,
    pub color_formats: Vec<TextureFormat>,
    pub depth_format: TextureFormat,
    pub stencil_format: TextureFormat,
    /// Build for dynamic rendering instead of a render pass
    pub use_dynamic_rendering: bool,
    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_compare: CompareOp,
    /// Used for every color attachment when `blend_states` is empty
    pub blend_enable: bool,
    /// One per color attachment, or empty
    pub blend_states: Vec<BlendState>,
    pub topology: PrimitiveTopology,
    pub samples: SampleCount,
    pub cull_mode: CullMode,
    pub front_face: FrontFace,
    pub viewport: Viewport,
    pub vertex_input: VertexInputDesc,
    pub vertex_specialization: SpecializationConstants,
    pub fragment_specialization: SpecializationConstants,
    pub name: String,
}

impl<S> GraphicsPipelineDesc<S> {
    pub fn new(vertex_shader: Arc<S>, fragment_shader: Arc<S>) -> Self {
        Self {
            vertex_shader,
            fragment_shader,
            set_layouts: Vec::new(),
            push_constants: Vec::new(),
            dynamic_states: Vec::new(),
            color_formats: Vec::new(),
            depth_format: TextureFormat::Undefined,
            stencil_format: TextureFormat::Undefined,
            use_dynamic_rendering: false,
            depth_test: true,
            depth_write: true,
            depth_compare: CompareOp::Less,
            blend_enable: false,
            blend_states: Vec::new(),
            topology: PrimitiveTopology::TriangleList,
            samples: SampleCount::S1,
            cull_mode: CullMode::Back,
            front_face: FrontFace::CounterClockwise,
            viewport: Viewport::default(),
            vertex_input: VertexInputDesc::default(),
            vertex_specialization: SpecializationConstants::default(),
            fragment_specialization: SpecializationConstants::default(),
            name: String::new(),
        }
    }

    /// One blend state per color attachment
    pub fn resolved_blend_states(&self) -> Result<Vec<BlendState>> {
        if self.blend_states.is_empty() {
            return Ok(vec![BlendState::alpha(self.blend_enable); self.color_formats.len()]);
        }
        if self.blend_states.len() != self.color_formats.len() {
            return Err(Error::PreconditionFailed(format!(
                "Pipeline '{}': blend states need to be provided for all color textures ({} states, {} textures)",
                self.name,
                self.blend_states.len(),
                self.color_formats.len()
            )));
        }
        Ok(self.blend_states.clone())
    }

    /// Check everything that can be checked before touching the API
    pub fn validate(&self) -> Result<()> {
        self.resolved_blend_states()?;
        self.vertex_input.validate()?;
        self.vertex_specialization.validate()?;
        self.fragment_specialization.validate()?;
        crate::graphics_device::shader::validate_set_layouts(&self.set_layouts)?;
        if self.use_dynamic_rendering && self.color_formats.is_empty() && self.depth_format == TextureFormat::Undefined {
            return Err(Error::PreconditionFailed(format!(
                "Pipeline '{}' uses dynamic rendering but declares no attachment formats",
                self.name
            )));
        }
        Ok(())
    }
}

/// Descriptor for a compute pipeline
#[derive(Debug, Clone)]
pub struct ComputePipelineDesc<S> {
    pub compute_shader: Arc<S>,
    pub set_layouts: Vec<SetLayoutDesc>,
    pub push_constants: Vec<PushConstantRange>,
    pub specialization: SpecializationConstants,
    pub name: String,
}

impl<S> ComputePipelineDesc<S> {
    pub fn new(compute_shader: Arc<S>) -> Self {
        Self {
            compute_shader,
            set_layouts: Vec::new(),
            push_constants: Vec::new(),
            specialization: SpecializationConstants::default(),
            name: String::new(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.specialization.validate()?;
        crate::graphics_device::shader::validate_set_layouts(&self.set_layouts)
    }
}

// ===== DESCRIPTOR POOL AND SETS =====

/// Pool capacity for a set of layouts, each allocated `count` times
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DescriptorPoolSizes {
    pub max_sets: u32,
    /// Descriptors per type, sorted by type
    pub sizes: Vec<(DescriptorType, u32)>,
    /// At least one set is bindless (pool needs update-after-bind)
    pub update_after_bind: bool,
}

impl DescriptorPoolSizes {
    /// Pool sizes for allocating `counts` (set index, number of sets)
    pub fn for_sets(layouts: &[SetLayoutDesc], counts: &[(u32, u32)]) -> Result<Self> {
        if counts.is_empty() {
            return Err(Error::PreconditionFailed("No descriptor sets requested".to_string()));
        }

        let mut per_type: FxHashMap<DescriptorType, u32> = FxHashMap::default();
        let mut pool = DescriptorPoolSizes::default();

        for (i, &(set_index, count)) in counts.iter().enumerate() {
            if count == 0 {
                return Err(Error::PreconditionFailed(format!(
                    "Zero descriptor sets requested for set {}",
                    set_index
                )));
            }
            if counts[..i].iter().any(|&(earlier, _)| earlier == set_index) {
                return Err(Error::PreconditionFailed(format!(
                    "Descriptor set {} requested more than once",
                    set_index
                )));
            }
            let layout = layouts.iter().find(|l| l.set_index == set_index).ok_or_else(|| {
                Error::PreconditionFailed(format!("Pipeline has no descriptor set {}", set_index))
            })?;
            pool.max_sets += count;
            pool.update_after_bind |= layout.bindless;
            for binding in &layout.bindings {
                *per_type.entry(binding.descriptor_type).or_insert(0) += binding.count * count;
            }
        }

        pool.sizes = per_type.into_iter().collect();
        pool.sizes.sort_unstable();
        Ok(pool)
    }
}

/// Allocated descriptor sets per set index
///
/// Empty until descriptors are allocated; every lookup before that is a
/// precondition failure rather than a silent no-op.
#[derive(Debug)]
pub struct DescriptorSets<H> {
    sets: FxHashMap<u32, Vec<H>>,
}

impl<H> Default for DescriptorSets<H> {
    fn default() -> Self {
        Self { sets: FxHashMap::default() }
    }
}

impl<H> DescriptorSets<H> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_allocated(&self) -> bool {
        !self.sets.is_empty()
    }

    /// Record the sets allocated for `set_index`
    pub fn insert(&mut self, set_index: u32, handles: Vec<H>) -> Result<()> {
        if self.sets.contains_key(&set_index) {
            return Err(Error::PreconditionFailed(format!(
                "Descriptor set {} is already allocated",
                set_index
            )));
        }
        self.sets.insert(set_index, handles);
        Ok(())
    }

    /// The `index`-th allocated set for `set_index`
    pub fn get(&self, set_index: u32, index: usize) -> Result<&H> {
        if !self.is_allocated() {
            return Err(Error::PreconditionFailed(
                "Descriptors must be allocated before resources are bound".to_string(),
            ));
        }
        self.sets
            .get(&set_index)
            .and_then(|sets| sets.get(index))
            .ok_or_else(|| Error::PreconditionFailed(format!(
                "Descriptor set {}[{}] was not allocated",
                set_index, index
            )))
    }

    pub fn count(&self, set_index: u32) -> usize {
        self.sets.get(&set_index).map_or(0, Vec::len)
    }

    /// Drain every handle (for freeing back to the pool)
    pub fn drain(&mut self) -> impl Iterator<Item = H> + '_ {
        self.sets.drain().flat_map(|(_, handles)| handles)
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
