/// Shader stages, source kinds and reflected resource layouts
///
/// The backend compiles and reflects; this module decides what a file is and
/// how reflected bindings from several stages combine into set layouts.

use std::collections::BTreeMap;
use std::path::Path;
use bitflags::bitflags;
use crate::error::{Error, Result};

/// Entry point used when a shader is created without an explicit one
pub const DEFAULT_ENTRY_POINT: &str = "main";

/// Array capacity of a bindless (runtime-sized) descriptor binding
pub const MAX_DESC_BINDLESS: u32 = 1000;

bitflags! {
    /// Shader stage mask (bit-compatible with the API's stage bits)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStageFlags: u32 {
        const VERTEX      = 0x0001;
        const FRAGMENT    = 0x0010;
        const COMPUTE     = 0x0020;
        const RAYGEN      = 0x0100;
        const ANY_HIT     = 0x0200;
        const CLOSEST_HIT = 0x0400;
        const MISS        = 0x0800;
    }
}

/// Single shader stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Compute,
    RayGen,
    Miss,
    ClosestHit,
    AnyHit,
}

impl ShaderStage {
    /// Stage from a file name: `.vert`, `.frag`, `.comp`, `.rgen`, `.rmiss`,
    /// `.rchit`, `.rahit`, optionally followed by `.spv`
    pub fn from_path(path: &Path) -> Result<Self> {
        let stem_path = if Self::is_spirv_path(path) {
            Path::new(path.file_stem().unwrap_or_default())
        } else {
            path
        };

        let extension = stem_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();

        match extension {
            "vert" => Ok(ShaderStage::Vertex),
            "frag" => Ok(ShaderStage::Fragment),
            "comp" => Ok(ShaderStage::Compute),
            "rgen" => Ok(ShaderStage::RayGen),
            "rmiss" => Ok(ShaderStage::Miss),
            "rchit" => Ok(ShaderStage::ClosestHit),
            "rahit" => Ok(ShaderStage::AnyHit),
            _ => Err(Error::ShaderCompilationFailed(format!(
                "Cannot infer shader stage from '{}'",
                path.display()
            ))),
        }
    }

    fn is_spirv_path(path: &Path) -> bool {
        path.extension().is_some_and(|e| e == "spv")
    }

    pub const fn flags(self) -> ShaderStageFlags {
        match self {
            ShaderStage::Vertex => ShaderStageFlags::VERTEX,
            ShaderStage::Fragment => ShaderStageFlags::FRAGMENT,
            ShaderStage::Compute => ShaderStageFlags::COMPUTE,
            ShaderStage::RayGen => ShaderStageFlags::RAYGEN,
            ShaderStage::Miss => ShaderStageFlags::MISS,
            ShaderStage::ClosestHit => ShaderStageFlags::CLOSEST_HIT,
            ShaderStage::AnyHit => ShaderStageFlags::ANY_HIT,
        }
    }

    /// Ray tracing stages need SPIR-V 1.4
    pub const fn is_ray_tracing(self) -> bool {
        matches!(
            self,
            ShaderStage::RayGen | ShaderStage::Miss | ShaderStage::ClosestHit | ShaderStage::AnyHit
        )
    }
}

/// How a shader file is turned into SPIR-V
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderSourceKind {
    /// Pre-compiled, loaded as-is
    SpirV,
    /// Compiled at load time
    Glsl,
}

impl ShaderSourceKind {
    pub fn from_path(path: &Path) -> Self {
        if ShaderStage::is_spirv_path(path) {
            ShaderSourceKind::SpirV
        } else {
            ShaderSourceKind::Glsl
        }
    }
}

/// Resolve a local `#include` against the directory of the including file
pub fn resolve_include(including_file: &Path, requested: &str) -> std::path::PathBuf {
    including_file
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join(requested)
}

/// Kinds of descriptors a set layout can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DescriptorType {
    Sampler,
    CombinedImageSampler,
    SampledImage,
    StorageImage,
    UniformTexelBuffer,
    StorageTexelBuffer,
    UniformBuffer,
    StorageBuffer,
    UniformBufferDynamic,
    StorageBufferDynamic,
    InputAttachment,
}

impl DescriptorType {
    /// Whether a bindless binding of this type may be updated after bind
    ///
    /// Dynamic buffers, input attachments and texel buffers stay
    /// partially-bound only.
    pub fn supports_update_after_bind(self) -> bool {
        matches!(
            self,
            DescriptorType::Sampler
                | DescriptorType::CombinedImageSampler
                | DescriptorType::SampledImage
                | DescriptorType::StorageImage
                | DescriptorType::UniformBuffer
                | DescriptorType::StorageBuffer
        )
    }
}

/// One binding inside a descriptor set layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorBinding {
    pub binding: u32,
    pub descriptor_type: DescriptorType,
    /// Array size
    pub count: u32,
    pub stages: ShaderStageFlags,
}

/// Layout of one descriptor set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetLayoutDesc {
    /// Application-defined set index (0 = per-frame, 1 = textures, ...)
    pub set_index: u32,
    pub bindings: Vec<DescriptorBinding>,
    /// Partially bound + update-after-bind; large arrays need not be fully written
    pub bindless: bool,
}

impl SetLayoutDesc {
    pub fn new(set_index: u32, bindings: Vec<DescriptorBinding>) -> Self {
        Self { set_index, bindings, bindless: false }
    }

    /// Set with one bindless array of [`MAX_DESC_BINDLESS`] descriptors at binding 0
    pub fn bindless(set_index: u32, descriptor_type: DescriptorType, stages: ShaderStageFlags) -> Self {
        Self {
            set_index,
            bindings: vec![DescriptorBinding {
                binding: 0,
                descriptor_type,
                count: MAX_DESC_BINDLESS,
                stages,
            }],
            bindless: true,
        }
    }

    pub fn binding(&self, binding: u32) -> Option<&DescriptorBinding> {
        self.bindings.iter().find(|b| b.binding == binding)
    }

    /// Check that a descriptor write targets an existing binding and array slot
    pub fn check_write(&self, binding: u32, array_index: u32, descriptor_type: DescriptorType) -> Result<()> {
        let layout = self.binding(binding).ok_or_else(|| {
            Error::PreconditionFailed(format!("Set {} has no binding {}", self.set_index, binding))
        })?;
        if layout.descriptor_type != descriptor_type {
            return Err(Error::PreconditionFailed(format!(
                "Set {} binding {} holds {:?}, not {:?}",
                self.set_index, binding, layout.descriptor_type, descriptor_type
            )));
        }
        if array_index >= layout.count {
            return Err(Error::PreconditionFailed(format!(
                "Array index {} out of range for set {} binding {} (count {})",
                array_index, self.set_index, binding, layout.count
            )));
        }
        Ok(())
    }
}

/// Check that set indices are unique and contiguous from 0
///
/// The pipeline layout lists set layouts by position, so a gap would shift
/// every following set.
pub fn validate_set_layouts(sets: &[SetLayoutDesc]) -> Result<()> {
    let mut indices: Vec<u32> = sets.iter().map(|s| s.set_index).collect();
    indices.sort_unstable();
    for (expected, &actual) in indices.iter().enumerate() {
        if actual != expected as u32 {
            return Err(Error::PreconditionFailed(format!(
                "Descriptor set indices must be unique and contiguous from 0 (got {:?})",
                indices
            )));
        }
    }
    Ok(())
}

/// Push constant range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushConstantRange {
    pub stages: ShaderStageFlags,
    pub offset: u32,
    pub size: u32,
}

/// A resource binding found by SPIR-V reflection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflectedBinding {
    pub name: Option<String>,
    pub set: u32,
    pub binding: u32,
    pub descriptor_type: DescriptorType,
    /// 0 for runtime-sized arrays
    pub count: u32,
}

/// Everything reflection extracts from one module
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShaderReflection {
    pub bindings: Vec<ReflectedBinding>,
    /// Push constant block size in bytes, if the stage declares one
    pub push_constant_size: Option<u32>,
}

/// Combine the reflected resources of several stages into set layouts
///
/// Bindings seen in more than one stage get the union of the stage masks.
/// Runtime-sized arrays become bindless bindings of [`MAX_DESC_BINDLESS`].
pub fn merge_reflected_layouts(stages: &[(ShaderStage, &ShaderReflection)]) -> Result<Vec<SetLayoutDesc>> {
    let mut sets: BTreeMap<u32, BTreeMap<u32, DescriptorBinding>> = BTreeMap::new();
    let mut bindless_sets: Vec<u32> = Vec::new();

    for (stage, reflection) in stages {
        for rb in &reflection.bindings {
            let count = if rb.count == 0 {
                bindless_sets.push(rb.set);
                MAX_DESC_BINDLESS
            } else {
                rb.count
            };

            let set = sets.entry(rb.set).or_default();
            match set.get_mut(&rb.binding) {
                Some(existing) => {
                    if existing.descriptor_type != rb.descriptor_type {
                        return Err(Error::ShaderCompilationFailed(format!(
                            "Set {} binding {} is {:?} in one stage and {:?} in {:?}",
                            rb.set, rb.binding, existing.descriptor_type, rb.descriptor_type, stage
                        )));
                    }
                    existing.stages |= stage.flags();
                    existing.count = existing.count.max(count);
                }
                None => {
                    set.insert(rb.binding, DescriptorBinding {
                        binding: rb.binding,
                        descriptor_type: rb.descriptor_type,
                        count,
                        stages: stage.flags(),
                    });
                }
            }
        }
    }

    // Fill gaps so the pipeline layout can list sets by position
    let max_set = sets.keys().next_back().copied();
    let mut layouts = Vec::new();
    if let Some(max_set) = max_set {
        for set_index in 0..=max_set {
            let bindings = sets.remove(&set_index).map(|b| b.into_values().collect()).unwrap_or_default();
            layouts.push(SetLayoutDesc {
                set_index,
                bindings,
                bindless: bindless_sets.contains(&set_index),
            });
        }
    }
    Ok(layouts)
}

/// One push constant range covering every stage that declares a block
pub fn merge_push_constants(stages: &[(ShaderStage, &ShaderReflection)]) -> Option<PushConstantRange> {
    stages
        .iter()
        .filter_map(|(stage, r)| r.push_constant_size.map(|size| (stage.flags(), size)))
        .fold(None, |acc: Option<PushConstantRange>, (flags, size)| {
            Some(match acc {
                Some(range) => PushConstantRange {
                    stages: range.stages | flags,
                    offset: 0,
                    size: range.size.max(size),
                },
                None => PushConstantRange { stages: flags, offset: 0, size },
            })
        })
}

#[cfg(test)]
#[path = "shader_tests.rs"]
mod tests;
