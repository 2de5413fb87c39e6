/// ShaderModule - SPIR-V module with its stage, entry point and reflection
///
/// `.spv` files are loaded as-is; anything else is GLSL compiled at load time
/// with shaderc, resolving `#include "..."` relative to the including file.
/// Every module is reflected with spirq so pipelines can derive their set
/// layouts and push constant ranges when none are given.

use ash::vk;
use blur_engine::blur::render::{
    resolve_include, DescriptorType, ReflectedBinding, ShaderReflection, ShaderSourceKind, ShaderStage,
    DEFAULT_ENTRY_POINT,
};
use blur_engine::blur::{Error, Result};
use blur_engine::{engine_debug, engine_error, engine_warn};
use std::ffi::{CStr, CString};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::shader_stage_to_vk;

const LOG_SOURCE: &str = "blur::vulkan::Shader";

/// Vulkan shader module
pub struct ShaderModule {
    ctx: Arc<GpuContext>,
    pub(crate) module: vk::ShaderModule,
    stage: ShaderStage,
    entry_point: CString,
    reflection: ShaderReflection,
    /// Source file, when loaded from disk
    path: Option<PathBuf>,
}

impl ShaderModule {
    /// Load (and compile when needed) the shader at `path`
    pub(crate) fn from_file(ctx: &Arc<GpuContext>, path: &Path, entry_point: Option<&str>) -> Result<Self> {
        let stage = ShaderStage::from_path(path).map_err(|e| {
            engine_error!(LOG_SOURCE, "{}", e);
            e
        })?;
        let entry_point = entry_point.unwrap_or(DEFAULT_ENTRY_POINT);

        let code = match ShaderSourceKind::from_path(path) {
            ShaderSourceKind::SpirV => load_spirv(path)?,
            ShaderSourceKind::Glsl => {
                let source = std::fs::read_to_string(path).map_err(|e| {
                    engine_error!(LOG_SOURCE, "Failed to read shader '{}': {}", path.display(), e);
                    Error::ShaderCompilationFailed(format!("Failed to read '{}': {}", path.display(), e))
                })?;
                compile_glsl(&source, path, stage, entry_point)?
            }
        };

        let mut module = Self::from_spirv(ctx, &code, stage, Some(entry_point))?;
        module.path = Some(path.to_path_buf());
        engine_debug!(
            LOG_SOURCE,
            "Loaded {:?} shader '{}' ({} bindings)",
            stage,
            path.display(),
            module.reflection.bindings.len()
        );
        Ok(module)
    }

    /// Wrap already compiled SPIR-V words
    pub(crate) fn from_spirv(
        ctx: &Arc<GpuContext>,
        code: &[u32],
        stage: ShaderStage,
        entry_point: Option<&str>,
    ) -> Result<Self> {
        let entry_point = CString::new(entry_point.unwrap_or(DEFAULT_ENTRY_POINT)).map_err(|_| {
            Error::ShaderCompilationFailed("Entry point name contains a NUL byte".to_string())
        })?;
        let reflection = reflect_spirv(code)?;

        let create_info = vk::ShaderModuleCreateInfo::default().code(code);
        let module = unsafe { ctx.device.create_shader_module(&create_info, None) }.map_err(|e| {
            engine_error!(LOG_SOURCE, "Failed to create shader module: {:?}", e);
            Error::BackendError(format!("Failed to create shader module: {:?}", e))
        })?;

        Ok(Self {
            ctx: Arc::clone(ctx),
            module,
            stage,
            entry_point,
            reflection,
            path: None,
        })
    }

    pub fn handle(&self) -> vk::ShaderModule {
        self.module
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn entry_point(&self) -> &CStr {
        &self.entry_point
    }

    pub fn reflection(&self) -> &ShaderReflection {
        &self.reflection
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Stage description for pipeline creation
    pub(crate) fn stage_info<'a>(
        &'a self,
        specialization: Option<&'a vk::SpecializationInfo<'a>>,
    ) -> vk::PipelineShaderStageCreateInfo<'a> {
        let info = vk::PipelineShaderStageCreateInfo::default()
            .stage(shader_stage_to_vk(self.stage))
            .module(self.module)
            .name(&self.entry_point);
        match specialization {
            Some(spec) => info.specialization_info(spec),
            None => info,
        }
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe { self.ctx.device.destroy_shader_module(self.module, None) };
    }
}

// ===== LOADING AND COMPILATION =====

/// Read a `.spv` file into SPIR-V words
pub fn load_spirv(path: &Path) -> Result<Vec<u32>> {
    let mut file = std::fs::File::open(path).map_err(|e| {
        engine_error!(LOG_SOURCE, "Failed to open shader '{}': {}", path.display(), e);
        Error::ShaderCompilationFailed(format!("Failed to open '{}': {}", path.display(), e))
    })?;
    ash::util::read_spv(&mut file).map_err(|e| {
        engine_error!(LOG_SOURCE, "Invalid SPIR-V in '{}': {}", path.display(), e);
        Error::ShaderCompilationFailed(format!("Invalid SPIR-V in '{}': {}", path.display(), e))
    })
}

fn shader_kind(stage: ShaderStage) -> shaderc::ShaderKind {
    match stage {
        ShaderStage::Vertex => shaderc::ShaderKind::Vertex,
        ShaderStage::Fragment => shaderc::ShaderKind::Fragment,
        ShaderStage::Compute => shaderc::ShaderKind::Compute,
        ShaderStage::RayGen => shaderc::ShaderKind::RayGeneration,
        ShaderStage::Miss => shaderc::ShaderKind::Miss,
        ShaderStage::ClosestHit => shaderc::ShaderKind::ClosestHit,
        ShaderStage::AnyHit => shaderc::ShaderKind::AnyHit,
    }
}

/// Compile GLSL `source` (read from `path`) to SPIR-V
///
/// Local includes resolve against the directory of the file that includes them.
pub fn compile_glsl(source: &str, path: &Path, stage: ShaderStage, entry_point: &str) -> Result<Vec<u32>> {
    let compiler = shaderc::Compiler::new().map_err(|e| {
        engine_error!(LOG_SOURCE, "Failed to create shader compiler: {}", e);
        Error::ShaderCompilationFailed(format!("Failed to create shader compiler: {}", e))
    })?;
    let mut options = shaderc::CompileOptions::new().map_err(|e| {
        Error::ShaderCompilationFailed(format!("Failed to create compile options: {}", e))
    })?;

    options.set_target_env(shaderc::TargetEnv::Vulkan, shaderc::EnvVersion::Vulkan1_3 as u32);
    if stage.is_ray_tracing() {
        options.set_target_spirv(shaderc::SpirvVersion::V1_4);
    }
    if cfg!(debug_assertions) {
        options.set_generate_debug_info();
    } else {
        options.set_optimization_level(shaderc::OptimizationLevel::Performance);
    }
    options.set_include_callback(|requested, _include_type, including, _depth| {
        let resolved = resolve_include(Path::new(including), requested);
        std::fs::read_to_string(&resolved)
            .map(|content| shaderc::ResolvedInclude {
                resolved_name: resolved.to_string_lossy().into_owned(),
                content,
            })
            .map_err(|e| format!("Cannot include '{}': {}", resolved.display(), e))
    });

    let file_name = path.to_string_lossy();
    let artifact = compiler
        .compile_into_spirv(source, shader_kind(stage), &file_name, entry_point, Some(&options))
        .map_err(|e| {
            engine_error!(LOG_SOURCE, "Failed to compile '{}':\n{}", file_name, e);
            Error::ShaderCompilationFailed(format!("{}: {}", file_name, e))
        })?;

    if artifact.get_num_warnings() > 0 {
        engine_warn!(LOG_SOURCE, "'{}': {}", file_name, artifact.get_warning_messages());
    }
    Ok(artifact.as_binary().to_vec())
}

// ===== REFLECTION =====

fn reflected_descriptor_type(desc_ty: &spirq::ty::DescriptorType) -> Result<DescriptorType> {
    use spirq::ty::DescriptorType as Spv;
    match desc_ty {
        Spv::Sampler(..) => Ok(DescriptorType::Sampler),
        Spv::CombinedImageSampler(..) => Ok(DescriptorType::CombinedImageSampler),
        Spv::SampledImage(..) => Ok(DescriptorType::SampledImage),
        Spv::StorageImage(..) => Ok(DescriptorType::StorageImage),
        Spv::UniformTexelBuffer(..) => Ok(DescriptorType::UniformTexelBuffer),
        Spv::StorageTexelBuffer(..) => Ok(DescriptorType::StorageTexelBuffer),
        Spv::UniformBuffer(..) => Ok(DescriptorType::UniformBuffer),
        Spv::StorageBuffer(..) => Ok(DescriptorType::StorageBuffer),
        Spv::InputAttachment(..) => Ok(DescriptorType::InputAttachment),
        other => {
            engine_error!(LOG_SOURCE, "Unsupported SPIR-V descriptor type: {:?}", other);
            Err(Error::ShaderCompilationFailed(format!(
                "Unsupported SPIR-V descriptor type: {:?}",
                other
            )))
        }
    }
}

/// Descriptor bindings and push constant size declared by a SPIR-V module
pub fn reflect_spirv(code: &[u32]) -> Result<ShaderReflection> {
    let entry_points = spirq::ReflectConfig::new()
        .spv(code)
        .ref_all_rscs(true)
        .reflect()
        .map_err(|e| {
            engine_error!(LOG_SOURCE, "SPIR-V reflection failed: {:?}", e);
            Error::ShaderCompilationFailed(format!("SPIR-V reflection failed: {:?}", e))
        })?;

    let mut reflection = ShaderReflection::default();
    for entry_point in &entry_points {
        for var in entry_point.vars.iter() {
            match var {
                spirq::var::Variable::Descriptor { name, desc_bind, desc_ty, nbind, .. } => {
                    let binding = ReflectedBinding {
                        name: name.clone(),
                        set: desc_bind.set(),
                        binding: desc_bind.bind(),
                        descriptor_type: reflected_descriptor_type(desc_ty)?,
                        count: *nbind,
                    };
                    if !reflection.bindings.contains(&binding) {
                        reflection.bindings.push(binding);
                    }
                }
                spirq::var::Variable::PushConstant { ty, .. } => {
                    if let Some(size) = ty.nbyte() {
                        let size = size as u32;
                        reflection.push_constant_size =
                            Some(reflection.push_constant_size.map_or(size, |s| s.max(size)));
                    }
                }
                _ => {}
            }
        }
    }

    reflection.bindings.sort_by_key(|b| (b.set, b.binding));
    Ok(reflection)
}

#[cfg(test)]
#[path = "vulkan_shader_tests.rs"]
mod tests;
