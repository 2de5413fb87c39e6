/// Pipeline - Graphics or compute pipeline with its descriptor sets
///
/// Usage order:
/// 1. `allocate_descriptors` once, right after creation
/// 2. `bind_resource` from any thread; writes are staged, not applied
/// 3. `bind` on the recording thread binds the pipeline and applies every
///    staged write in a single `vkUpdateDescriptorSets` call
/// 4. `bind_descriptor_sets` to bind the sets for the draw or dispatch

use ash::vk;
use blur_engine::blur::render::{
    merge_push_constants, merge_reflected_layouts, ComputePipelineDesc, DescriptorPoolSizes,
    DescriptorSets, DescriptorType, DescriptorWriteBatch, GraphicsPipelineDesc, PushConstantRange,
    SetLayoutDesc, ShaderStage, ShaderStageFlags, SpecializationConstants, TextureFormat,
};
use blur_engine::blur::{Error, Result};
use blur_engine::{engine_debug, engine_err, engine_error, engine_precondition};
use std::sync::{Arc, Mutex};

use crate::vulkan_buffer::Buffer;
use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{
    blend_factor_to_vk, blend_op_to_vk, color_write_mask_to_vk, compare_op_to_vk, cull_mode_to_vk,
    descriptor_type_to_vk, dynamic_state_to_vk, extent_to_vk, format_to_vk, front_face_to_vk,
    sample_count_to_vk, stage_flags_to_vk, topology_to_vk, vertex_format_to_vk,
};
use crate::vulkan_render_pass::RenderPass;
use crate::vulkan_sampler::Sampler;
use crate::vulkan_shader::ShaderModule;
use crate::vulkan_texture::Texture;

const LOG_SOURCE: &str = "blur::vulkan::Pipeline";

/// Resource written into a descriptor slot
///
/// Holds raw handles so staged writes can be pushed from any thread; the
/// caller keeps the resources alive until the descriptor is no longer used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorResource {
    Buffer { buffer: vk::Buffer, offset: u64, range: u64 },
    Image { view: vk::ImageView, sampler: vk::Sampler, layout: vk::ImageLayout },
    TexelBuffer(vk::BufferView),
}

impl DescriptorResource {
    /// Whole buffer (uniform or storage)
    pub fn buffer(buffer: &Buffer) -> Self {
        Self::Buffer { buffer: buffer.handle(), offset: 0, range: vk::WHOLE_SIZE }
    }

    pub fn buffer_range(buffer: &Buffer, offset: u64, range: u64) -> Self {
        Self::Buffer { buffer: buffer.handle(), offset, range }
    }

    /// Sampled texture, combined with `sampler` when given
    pub fn texture(texture: &Texture, sampler: Option<&Sampler>) -> Self {
        Self::Image {
            view: texture.view(),
            sampler: sampler.map_or(vk::Sampler::null(), Sampler::handle),
            layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        }
    }

    /// Storage image in GENERAL layout
    pub fn storage_image(texture: &Texture) -> Self {
        Self::Image {
            view: texture.view(),
            sampler: vk::Sampler::null(),
            layout: vk::ImageLayout::GENERAL,
        }
    }

    pub fn sampler(sampler: &Sampler) -> Self {
        Self::Image {
            view: vk::ImageView::null(),
            sampler: sampler.handle(),
            layout: vk::ImageLayout::UNDEFINED,
        }
    }

    /// Whether this resource can fill a slot of `descriptor_type`
    pub fn fits(&self, descriptor_type: DescriptorType) -> bool {
        match self {
            Self::Buffer { .. } => matches!(
                descriptor_type,
                DescriptorType::UniformBuffer
                    | DescriptorType::StorageBuffer
                    | DescriptorType::UniformBufferDynamic
                    | DescriptorType::StorageBufferDynamic
            ),
            Self::Image { view, sampler, .. } => match descriptor_type {
                DescriptorType::Sampler => *sampler != vk::Sampler::null(),
                DescriptorType::CombinedImageSampler => {
                    *view != vk::ImageView::null() && *sampler != vk::Sampler::null()
                }
                DescriptorType::SampledImage | DescriptorType::StorageImage | DescriptorType::InputAttachment => {
                    *view != vk::ImageView::null()
                }
                _ => false,
            },
            Self::TexelBuffer(_) => matches!(
                descriptor_type,
                DescriptorType::UniformTexelBuffer | DescriptorType::StorageTexelBuffer
            ),
        }
    }
}

/// One staged descriptor write
#[derive(Debug, Clone, Copy)]
pub(crate) struct PendingWrite {
    set: vk::DescriptorSet,
    binding: u32,
    array_index: u32,
    descriptor_type: vk::DescriptorType,
    resource: DescriptorResource,
}

struct DescriptorState {
    pool: vk::DescriptorPool,
    sets: DescriptorSets<vk::DescriptorSet>,
}

/// Vulkan pipeline (graphics or compute)
pub struct Pipeline {
    ctx: Arc<GpuContext>,
    pub(crate) pipeline: vk::Pipeline,
    pub(crate) layout: vk::PipelineLayout,
    bind_point: vk::PipelineBindPoint,
    set_layouts: Vec<vk::DescriptorSetLayout>,
    set_layout_descs: Vec<SetLayoutDesc>,
    push_constants: Vec<PushConstantRange>,
    descriptors: Mutex<DescriptorState>,
    pending_writes: DescriptorWriteBatch<PendingWrite>,
    /// Shared ownership keeps every module alive as long as the pipeline
    shaders: Vec<Arc<ShaderModule>>,
    name: String,
}

impl Pipeline {
    pub(crate) fn create_graphics(
        ctx: &Arc<GpuContext>,
        desc: GraphicsPipelineDesc<ShaderModule>,
        render_pass: Option<&RenderPass>,
    ) -> Result<Self> {
        desc.validate().map_err(|e| {
            engine_error!(LOG_SOURCE, "{}", e);
            e
        })?;
        engine_precondition!(
            desc.vertex_shader.stage() == ShaderStage::Vertex && desc.fragment_shader.stage() == ShaderStage::Fragment,
            LOG_SOURCE,
            "Pipeline '{}' needs a vertex and a fragment shader (got {:?} and {:?})",
            desc.name,
            desc.vertex_shader.stage(),
            desc.fragment_shader.stage()
        );
        engine_precondition!(
            desc.use_dynamic_rendering || render_pass.is_some(),
            LOG_SOURCE,
            "Pipeline '{}' needs a render pass unless it uses dynamic rendering",
            desc.name
        );

        let shaders = vec![Arc::clone(&desc.vertex_shader), Arc::clone(&desc.fragment_shader)];
        let (set_layout_descs, push_constants) = resolve_layouts(&shaders, &desc.set_layouts, &desc.push_constants)?;
        let (set_layouts, layout) = create_pipeline_layout(ctx, &set_layout_descs, &push_constants, &desc.name)?;

        let vertex_spec = SpecializationData::new(&desc.vertex_specialization);
        let fragment_spec = SpecializationData::new(&desc.fragment_specialization);
        let vertex_spec_info = vertex_spec.info();
        let fragment_spec_info = fragment_spec.info();
        let stages = [
            desc.vertex_shader.stage_info(vertex_spec_info.as_ref()),
            desc.fragment_shader.stage_info(fragment_spec_info.as_ref()),
        ];

        let vertex_bindings: Vec<vk::VertexInputBindingDescription> = desc
            .vertex_input
            .bindings
            .iter()
            .map(|b| vk::VertexInputBindingDescription {
                binding: b.binding,
                stride: b.stride,
                input_rate: if b.per_instance {
                    vk::VertexInputRate::INSTANCE
                } else {
                    vk::VertexInputRate::VERTEX
                },
            })
            .collect();
        let vertex_attributes: Vec<vk::VertexInputAttributeDescription> = desc
            .vertex_input
            .attributes
            .iter()
            .map(|a| vk::VertexInputAttributeDescription {
                location: a.location,
                binding: a.binding,
                format: vertex_format_to_vk(a.format),
                offset: a.offset,
            })
            .collect();
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&vertex_bindings)
            .vertex_attribute_descriptions(&vertex_attributes);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(topology_to_vk(desc.topology))
            .primitive_restart_enable(false);

        let viewports = [vk::Viewport {
            x: desc.viewport.x,
            y: desc.viewport.y,
            width: desc.viewport.width,
            height: desc.viewport.height,
            min_depth: desc.viewport.min_depth,
            max_depth: desc.viewport.max_depth,
        }];
        let scissors = [vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: extent_to_vk(desc.viewport.scissor_extent()),
        }];
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewports(&viewports)
            .scissors(&scissors);

        let rasterizer = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(cull_mode_to_vk(desc.cull_mode))
            .front_face(front_face_to_vk(desc.front_face))
            .depth_bias_enable(false);

        let multisampling = vk::PipelineMultisampleStateCreateInfo::default()
            .sample_shading_enable(false)
            .rasterization_samples(sample_count_to_vk(desc.samples));

        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(desc.depth_test)
            .depth_write_enable(desc.depth_write)
            .depth_compare_op(compare_op_to_vk(desc.depth_compare))
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false);

        let blend_attachments: Vec<vk::PipelineColorBlendAttachmentState> = desc
            .resolved_blend_states()?
            .iter()
            .map(|b| vk::PipelineColorBlendAttachmentState {
                blend_enable: b.enable.into(),
                src_color_blend_factor: blend_factor_to_vk(b.src_color),
                dst_color_blend_factor: blend_factor_to_vk(b.dst_color),
                color_blend_op: blend_op_to_vk(b.color_op),
                src_alpha_blend_factor: blend_factor_to_vk(b.src_alpha),
                dst_alpha_blend_factor: blend_factor_to_vk(b.dst_alpha),
                alpha_blend_op: blend_op_to_vk(b.alpha_op),
                color_write_mask: color_write_mask_to_vk(b.write_mask),
            })
            .collect();
        let color_blending = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .attachments(&blend_attachments);

        let dynamic_states: Vec<vk::DynamicState> = desc.dynamic_states.iter().copied().map(dynamic_state_to_vk).collect();
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let color_formats: Vec<vk::Format> = desc.color_formats.iter().copied().map(format_to_vk).collect();
        let mut rendering_info = vk::PipelineRenderingCreateInfo::default()
            .color_attachment_formats(&color_formats)
            .depth_attachment_format(format_to_vk(desc.depth_format))
            .stencil_attachment_format(stencil_format(&desc));

        let mut pipeline_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterizer)
            .multisample_state(&multisampling)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blending)
            .dynamic_state(&dynamic_state)
            .layout(layout);
        pipeline_info = match render_pass {
            Some(render_pass) if !desc.use_dynamic_rendering => {
                pipeline_info.render_pass(render_pass.handle()).subpass(0)
            }
            _ => pipeline_info.push_next(&mut rendering_info),
        };

        let pipeline = unsafe {
            ctx.device
                .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
        };
        let pipeline = match pipeline {
            Ok(pipelines) => pipelines[0],
            Err((_, e)) => {
                destroy_layouts(ctx, &set_layouts, layout);
                engine_error!(LOG_SOURCE, "Failed to create graphics pipeline '{}': {:?}", desc.name, e);
                return Err(Error::BackendError(format!("Failed to create graphics pipeline: {:?}", e)));
            }
        };

        engine_debug!(
            LOG_SOURCE,
            "Created graphics pipeline '{}' ({} set layouts, {} push constant ranges)",
            desc.name,
            set_layout_descs.len(),
            push_constants.len()
        );

        Ok(Self::from_parts(
            ctx,
            pipeline,
            layout,
            vk::PipelineBindPoint::GRAPHICS,
            set_layouts,
            set_layout_descs,
            push_constants,
            shaders,
            desc.name,
        ))
    }

    pub(crate) fn create_compute(ctx: &Arc<GpuContext>, desc: ComputePipelineDesc<ShaderModule>) -> Result<Self> {
        desc.validate().map_err(|e| {
            engine_error!(LOG_SOURCE, "{}", e);
            e
        })?;
        engine_precondition!(
            desc.compute_shader.stage() == ShaderStage::Compute,
            LOG_SOURCE,
            "Compute pipeline '{}' got a {:?} shader",
            desc.name,
            desc.compute_shader.stage()
        );

        let shaders = vec![Arc::clone(&desc.compute_shader)];
        let (set_layout_descs, push_constants) = resolve_layouts(&shaders, &desc.set_layouts, &desc.push_constants)?;
        let (set_layouts, layout) = create_pipeline_layout(ctx, &set_layout_descs, &push_constants, &desc.name)?;

        let spec = SpecializationData::new(&desc.specialization);
        let spec_info = spec.info();
        let pipeline_info = vk::ComputePipelineCreateInfo::default()
            .stage(desc.compute_shader.stage_info(spec_info.as_ref()))
            .layout(layout);

        let pipeline = unsafe {
            ctx.device
                .create_compute_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
        };
        let pipeline = match pipeline {
            Ok(pipelines) => pipelines[0],
            Err((_, e)) => {
                destroy_layouts(ctx, &set_layouts, layout);
                engine_error!(LOG_SOURCE, "Failed to create compute pipeline '{}': {:?}", desc.name, e);
                return Err(Error::BackendError(format!("Failed to create compute pipeline: {:?}", e)));
            }
        };

        Ok(Self::from_parts(
            ctx,
            pipeline,
            layout,
            vk::PipelineBindPoint::COMPUTE,
            set_layouts,
            set_layout_descs,
            push_constants,
            shaders,
            desc.name,
        ))
    }

    #[allow(clippy::too_many_arguments)]
    fn from_parts(
        ctx: &Arc<GpuContext>,
        pipeline: vk::Pipeline,
        layout: vk::PipelineLayout,
        bind_point: vk::PipelineBindPoint,
        set_layouts: Vec<vk::DescriptorSetLayout>,
        set_layout_descs: Vec<SetLayoutDesc>,
        push_constants: Vec<PushConstantRange>,
        shaders: Vec<Arc<ShaderModule>>,
        name: String,
    ) -> Self {
        Self {
            ctx: Arc::clone(ctx),
            pipeline,
            layout,
            bind_point,
            set_layouts,
            set_layout_descs,
            push_constants,
            descriptors: Mutex::new(DescriptorState {
                pool: vk::DescriptorPool::null(),
                sets: DescriptorSets::new(),
            }),
            pending_writes: DescriptorWriteBatch::new(),
            shaders,
            name,
        }
    }

    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }

    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_layouts(&self) -> &[SetLayoutDesc] {
        &self.set_layout_descs
    }

    pub fn push_constant_ranges(&self) -> &[PushConstantRange] {
        &self.push_constants
    }

    pub fn shaders(&self) -> &[Arc<ShaderModule>] {
        &self.shaders
    }

    /// Number of staged descriptor writes not yet applied
    pub fn pending_write_count(&self) -> usize {
        self.pending_writes.len()
    }

    // ===== DESCRIPTORS =====

    /// Create the descriptor pool and allocate `count` sets per set index
    ///
    /// Must be called once, before any `bind_resource`.
    pub fn allocate_descriptors(&self, counts: &[(u32, u32)]) -> Result<()> {
        let mut state = self.lock_descriptors()?;
        engine_precondition!(
            !state.sets.is_allocated(),
            LOG_SOURCE,
            "Descriptors of pipeline '{}' are already allocated",
            self.name
        );

        let sizes = DescriptorPoolSizes::for_sets(&self.set_layout_descs, counts).map_err(|e| {
            engine_error!(LOG_SOURCE, "Pipeline '{}': {}", self.name, e);
            e
        })?;
        let pool_sizes: Vec<vk::DescriptorPoolSize> = sizes
            .sizes
            .iter()
            .filter(|(_, count)| *count > 0)
            .map(|&(ty, descriptor_count)| vk::DescriptorPoolSize {
                ty: descriptor_type_to_vk(ty),
                descriptor_count,
            })
            .collect();

        let mut flags = vk::DescriptorPoolCreateFlags::empty();
        if sizes.update_after_bind {
            flags |= vk::DescriptorPoolCreateFlags::UPDATE_AFTER_BIND;
        }
        let pool_info = vk::DescriptorPoolCreateInfo::default()
            .flags(flags)
            .max_sets(sizes.max_sets)
            .pool_sizes(&pool_sizes);
        let pool = unsafe { self.ctx.device.create_descriptor_pool(&pool_info, None) }
            .map_err(|e| engine_err!(LOG_SOURCE, "Failed to create descriptor pool for '{}': {:?}", self.name, e))?;
        match self.allocate_from_pool(pool, counts) {
            Ok(sets) => {
                state.pool = pool;
                state.sets = sets;
                Ok(())
            }
            Err(e) => {
                // Destroying the pool frees whatever was allocated before the failure
                unsafe { self.ctx.device.destroy_descriptor_pool(pool, None) };
                Err(e)
            }
        }
    }

    fn allocate_from_pool(
        &self,
        pool: vk::DescriptorPool,
        counts: &[(u32, u32)],
    ) -> Result<DescriptorSets<vk::DescriptorSet>> {
        let mut sets = DescriptorSets::new();
        for &(set_index, count) in counts {
            let layout = self.set_layouts[set_index as usize];
            let layouts = vec![layout; count as usize];
            let alloc_info = vk::DescriptorSetAllocateInfo::default()
                .descriptor_pool(pool)
                .set_layouts(&layouts);
            let handles = unsafe { self.ctx.device.allocate_descriptor_sets(&alloc_info) }.map_err(|e| {
                engine_err!(
                    LOG_SOURCE,
                    "Failed to allocate {} descriptor sets for set {} of '{}': {:?}",
                    count,
                    set_index,
                    self.name,
                    e
                )
            })?;
            sets.insert(set_index, handles)?;
        }
        Ok(sets)
    }

    /// Allocated descriptor set `index` of `set_index`
    pub fn descriptor_set(&self, set_index: u32, index: usize) -> Result<vk::DescriptorSet> {
        self.lock_descriptors()?.sets.get(set_index, index).copied()
    }

    /// Stage a write into the first allocated set of `set_index`
    pub fn bind_resource(&self, set_index: u32, binding: u32, array_index: u32, resource: DescriptorResource) -> Result<()> {
        self.bind_resource_in(set_index, 0, binding, array_index, resource)
    }

    /// Stage a write into allocated set `set_instance` of `set_index`
    ///
    /// Safe to call from any thread. The write is applied at the next `bind`
    /// or `update_descriptor_sets`.
    pub fn bind_resource_in(
        &self,
        set_index: u32,
        set_instance: usize,
        binding: u32,
        array_index: u32,
        resource: DescriptorResource,
    ) -> Result<()> {
        let layout = self.set_layout_descs.get(set_index as usize).ok_or_else(|| {
            Error::PreconditionFailed(format!("Pipeline '{}' has no descriptor set {}", self.name, set_index))
        })?;
        let descriptor_type = layout
            .binding(binding)
            .map(|b| b.descriptor_type)
            .ok_or_else(|| {
                Error::PreconditionFailed(format!("Set {} of '{}' has no binding {}", set_index, self.name, binding))
            })?;
        layout.check_write(binding, array_index, descriptor_type)?;
        engine_precondition!(
            resource.fits(descriptor_type),
            LOG_SOURCE,
            "Resource {:?} cannot fill {:?} slot (set {}, binding {}) of '{}'",
            resource,
            descriptor_type,
            set_index,
            binding,
            self.name
        );

        let set = self.descriptor_set(set_index, set_instance).map_err(|e| {
            engine_error!(LOG_SOURCE, "Pipeline '{}': {}", self.name, e);
            e
        })?;
        self.pending_writes.push(PendingWrite {
            set,
            binding,
            array_index,
            descriptor_type: descriptor_type_to_vk(descriptor_type),
            resource,
        })
    }

    /// Apply every staged write in one API call; returns the number applied
    pub fn update_descriptor_sets(&self) -> Result<usize> {
        let device = &self.ctx.device;
        self.pending_writes.flush(|writes| {
            apply_writes(device, writes);
            Ok(())
        })
    }

    /// Bind the pipeline, then apply staged descriptor writes
    pub fn bind(&self, cmd: vk::CommandBuffer) -> Result<()> {
        unsafe { self.ctx.device.cmd_bind_pipeline(cmd, self.bind_point, self.pipeline) };
        self.update_descriptor_sets()?;
        Ok(())
    }

    /// Bind consecutive sets starting at `first_set`; `instances[i]` picks the
    /// allocated copy of set `first_set + i`
    pub fn bind_descriptor_sets(&self, cmd: vk::CommandBuffer, first_set: u32, instances: &[usize]) -> Result<()> {
        let sets = {
            let state = self.lock_descriptors()?;
            instances
                .iter()
                .enumerate()
                .map(|(i, &instance)| state.sets.get(first_set + i as u32, instance).copied())
                .collect::<Result<Vec<_>>>()?
        };
        unsafe {
            self.ctx
                .device
                .cmd_bind_descriptor_sets(cmd, self.bind_point, self.layout, first_set, &sets, &[]);
        }
        Ok(())
    }

    /// Record a push constant update
    pub fn push_constants(&self, cmd: vk::CommandBuffer, stages: ShaderStageFlags, offset: u32, data: &[u8]) -> Result<()> {
        let end = offset as usize + data.len();
        engine_precondition!(
            self.push_constants
                .iter()
                .any(|r| r.stages.contains(stages) && r.offset <= offset && (r.offset + r.size) as usize >= end),
            LOG_SOURCE,
            "Push constant update {}..{} for {:?} is outside the ranges of '{}'",
            offset,
            end,
            stages,
            self.name
        );
        unsafe {
            self.ctx
                .device
                .cmd_push_constants(cmd, self.layout, stage_flags_to_vk(stages), offset, data);
        }
        Ok(())
    }

    fn lock_descriptors(&self) -> Result<std::sync::MutexGuard<'_, DescriptorState>> {
        self.descriptors
            .lock()
            .map_err(|_| engine_err!(LOG_SOURCE, "Descriptor state mutex poisoned"))
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        unsafe {
            if let Ok(state) = self.descriptors.get_mut() {
                if state.pool != vk::DescriptorPool::null() {
                    // Destroying the pool frees every set allocated from it
                    self.ctx.device.destroy_descriptor_pool(state.pool, None);
                }
            }
            self.ctx.device.destroy_pipeline(self.pipeline, None);
        }
        destroy_layouts(&self.ctx, &self.set_layouts, self.layout);
    }
}

// ===== HELPERS =====

/// Explicit layouts win; otherwise merge the shaders' reflection
fn resolve_layouts(
    shaders: &[Arc<ShaderModule>],
    set_layouts: &[SetLayoutDesc],
    push_constants: &[PushConstantRange],
) -> Result<(Vec<SetLayoutDesc>, Vec<PushConstantRange>)> {
    let reflected: Vec<(ShaderStage, &_)> = shaders.iter().map(|s| (s.stage(), s.reflection())).collect();

    let mut layouts = if set_layouts.is_empty() {
        merge_reflected_layouts(&reflected)?
    } else {
        set_layouts.to_vec()
    };
    layouts.sort_by_key(|l| l.set_index);

    let ranges = if push_constants.is_empty() {
        merge_push_constants(&reflected).into_iter().collect()
    } else {
        push_constants.to_vec()
    };
    Ok((layouts, ranges))
}

fn create_pipeline_layout(
    ctx: &GpuContext,
    set_layout_descs: &[SetLayoutDesc],
    push_constants: &[PushConstantRange],
    name: &str,
) -> Result<(Vec<vk::DescriptorSetLayout>, vk::PipelineLayout)> {
    let mut set_layouts = Vec::with_capacity(set_layout_descs.len());
    for desc in set_layout_descs {
        match create_set_layout(ctx, desc) {
            Ok(layout) => set_layouts.push(layout),
            Err(e) => {
                destroy_layouts(ctx, &set_layouts, vk::PipelineLayout::null());
                engine_error!(LOG_SOURCE, "Pipeline '{}': {}", name, e);
                return Err(e);
            }
        }
    }

    let ranges: Vec<vk::PushConstantRange> = push_constants
        .iter()
        .map(|r| vk::PushConstantRange {
            stage_flags: stage_flags_to_vk(r.stages),
            offset: r.offset,
            size: r.size,
        })
        .collect();
    let layout_info = vk::PipelineLayoutCreateInfo::default()
        .set_layouts(&set_layouts)
        .push_constant_ranges(&ranges);

    match unsafe { ctx.device.create_pipeline_layout(&layout_info, None) } {
        Ok(layout) => Ok((set_layouts, layout)),
        Err(e) => {
            destroy_layouts(ctx, &set_layouts, vk::PipelineLayout::null());
            engine_error!(LOG_SOURCE, "Failed to create pipeline layout for '{}': {:?}", name, e);
            Err(Error::BackendError(format!("Failed to create pipeline layout: {:?}", e)))
        }
    }
}

fn create_set_layout(ctx: &GpuContext, desc: &SetLayoutDesc) -> Result<vk::DescriptorSetLayout> {
    if desc.bindless && !ctx.enabled_features.bindless_indexing {
        return Err(Error::PreconditionFailed(format!(
            "Set {} is bindless but bindless indexing is not enabled",
            desc.set_index
        )));
    }

    let bindings: Vec<vk::DescriptorSetLayoutBinding> = desc
        .bindings
        .iter()
        .map(|b| {
            vk::DescriptorSetLayoutBinding::default()
                .binding(b.binding)
                .descriptor_type(descriptor_type_to_vk(b.descriptor_type))
                .descriptor_count(b.count)
                .stage_flags(stage_flags_to_vk(b.stages))
        })
        .collect();

    let binding_flags: Vec<vk::DescriptorBindingFlags> = desc
        .bindings
        .iter()
        .map(|b| {
            if b.descriptor_type.supports_update_after_bind() {
                vk::DescriptorBindingFlags::PARTIALLY_BOUND | vk::DescriptorBindingFlags::UPDATE_AFTER_BIND
            } else {
                vk::DescriptorBindingFlags::PARTIALLY_BOUND
            }
        })
        .collect();
    let mut flags_info = vk::DescriptorSetLayoutBindingFlagsCreateInfo::default().binding_flags(&binding_flags);

    let mut create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);
    if desc.bindless {
        create_info = create_info
            .flags(vk::DescriptorSetLayoutCreateFlags::UPDATE_AFTER_BIND_POOL)
            .push_next(&mut flags_info);
    }

    unsafe { ctx.device.create_descriptor_set_layout(&create_info, None) }.map_err(|e| {
        Error::BackendError(format!("Failed to create descriptor set layout {}: {:?}", desc.set_index, e))
    })
}

fn destroy_layouts(ctx: &GpuContext, set_layouts: &[vk::DescriptorSetLayout], layout: vk::PipelineLayout) {
    unsafe {
        if layout != vk::PipelineLayout::null() {
            ctx.device.destroy_pipeline_layout(layout, None);
        }
        for &set_layout in set_layouts {
            ctx.device.destroy_descriptor_set_layout(set_layout, None);
        }
    }
}

/// Stencil attachment format for dynamic rendering: explicit, else the depth
/// format when it carries stencil
fn stencil_format(desc: &GraphicsPipelineDesc<ShaderModule>) -> vk::Format {
    if desc.stencil_format != TextureFormat::Undefined {
        format_to_vk(desc.stencil_format)
    } else if desc.depth_format.is_stencil() {
        format_to_vk(desc.depth_format)
    } else {
        vk::Format::UNDEFINED
    }
}

/// Owned map entries for one stage's specialization info
struct SpecializationData<'a> {
    entries: Vec<vk::SpecializationMapEntry>,
    data: &'a [u8],
}

impl<'a> SpecializationData<'a> {
    fn new(constants: &'a SpecializationConstants) -> Self {
        Self {
            entries: constants
                .entries
                .iter()
                .map(|e| vk::SpecializationMapEntry {
                    constant_id: e.constant_id,
                    offset: e.offset,
                    size: e.size as usize,
                })
                .collect(),
            data: &constants.data[..constants.data_size()],
        }
    }

    fn info(&self) -> Option<vk::SpecializationInfo<'_>> {
        if self.entries.is_empty() {
            return None;
        }
        Some(
            vk::SpecializationInfo::default()
                .map_entries(&self.entries)
                .data(self.data),
        )
    }
}

/// Turn staged writes into `VkWriteDescriptorSet`s and apply them in one call
fn apply_writes(device: &ash::Device, writes: &[PendingWrite]) {
    let mut buffer_infos = Vec::with_capacity(writes.len());
    let mut image_infos = Vec::with_capacity(writes.len());
    let mut texel_views = Vec::with_capacity(writes.len());

    // Every info lives at a fixed index before any write borrows it
    let slots: Vec<usize> = writes
        .iter()
        .map(|w| match w.resource {
            DescriptorResource::Buffer { buffer, offset, range } => {
                buffer_infos.push(vk::DescriptorBufferInfo { buffer, offset, range });
                buffer_infos.len() - 1
            }
            DescriptorResource::Image { view, sampler, layout } => {
                image_infos.push(vk::DescriptorImageInfo {
                    sampler,
                    image_view: view,
                    image_layout: layout,
                });
                image_infos.len() - 1
            }
            DescriptorResource::TexelBuffer(view) => {
                texel_views.push(view);
                texel_views.len() - 1
            }
        })
        .collect();

    let vk_writes: Vec<vk::WriteDescriptorSet> = writes
        .iter()
        .zip(&slots)
        .map(|(w, &slot)| {
            let write = vk::WriteDescriptorSet::default()
                .dst_set(w.set)
                .dst_binding(w.binding)
                .dst_array_element(w.array_index)
                .descriptor_type(w.descriptor_type);
            match w.resource {
                DescriptorResource::Buffer { .. } => write.buffer_info(std::slice::from_ref(&buffer_infos[slot])),
                DescriptorResource::Image { .. } => write.image_info(std::slice::from_ref(&image_infos[slot])),
                DescriptorResource::TexelBuffer(_) => {
                    write.texel_buffer_view(std::slice::from_ref(&texel_views[slot]))
                }
            }
        })
        .collect();

    unsafe { device.update_descriptor_sets(&vk_writes, &[]) };
}
