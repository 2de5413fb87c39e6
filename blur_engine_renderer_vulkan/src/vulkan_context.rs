/// GpuContext - Shared GPU state for all Vulkan objects
/// VulkanContext - Factory for every GPU resource
///
/// Every resource holds an `Arc<GpuContext>`, so the instance, device and
/// allocator are torn down only after the last buffer, texture, pipeline or
/// swapchain has been dropped.

use ash::vk;
use blur_engine::blur::render::{
    recreate_swapchain, AttachmentInfo, BufferDesc, ComputePipelineDesc, Extent2D,
    FramebufferDesc, GraphicsPipelineDesc, QueueFamilySlot, SamplerDesc, SurfaceCapabilities,
    SwapchainDesc, SwapchainHost, TextureDesc, WindowSurface,
};
use blur_engine::blur::{ContextConfig, DeviceFeatures, Error, Result};
use blur_engine::{engine_debug, engine_err, engine_error, engine_info, engine_precondition, engine_warn};
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle, RawWindowHandle};
use std::ffi::{c_char, CString};
use std::mem::ManuallyDrop;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::vulkan_buffer::Buffer;
use crate::vulkan_command_queue::CommandQueue;
use crate::vulkan_debug::VALIDATION_LAYER_NAME;
use crate::vulkan_framebuffer::Framebuffer;
use crate::vulkan_physical_device::{required_device_extensions, PhysicalDevice, SurfaceQuery};
use crate::vulkan_pipeline::Pipeline;
use crate::vulkan_render_pass::RenderPass;
use crate::vulkan_ring_buffer::UniformRingBuffer;
use crate::vulkan_sampler::Sampler;
use crate::vulkan_shader::ShaderModule;
use crate::vulkan_swapchain::Swapchain;
use crate::vulkan_texture::Texture;

const LOG_SOURCE: &str = "blur::vulkan::Context";

/// A queue together with the family it was taken from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueHandle {
    pub family: u32,
    pub queue: vk::Queue,
}

/// Queues per role (roles may share a queue)
#[derive(Debug, Clone, Copy, Default)]
pub struct Queues {
    pub graphics: Option<QueueHandle>,
    pub compute: Option<QueueHandle>,
    pub transfer: Option<QueueHandle>,
    pub present: Option<QueueHandle>,
}

/// Command pool and fence for blocking one-shot submissions
pub(crate) struct UploadContext {
    pool: vk::CommandPool,
    fence: vk::Fence,
}

/// Shared GPU context for all Vulkan resources.
///
/// This struct is shared (via `Arc`) by all GPU resources (textures, buffers, etc.)
/// to avoid duplicating device/allocator/queue references in each resource.
pub struct GpuContext {
    /// Vulkan entry (kept loaded for the lifetime of the instance)
    _entry: ash::Entry,
    pub(crate) instance: ash::Instance,
    pub(crate) physical_device: PhysicalDevice,
    /// Vulkan logical device
    pub device: ash::Device,

    /// GPU memory allocator
    /// Wrapped in ManuallyDrop to ensure it's dropped BEFORE the device is destroyed
    pub(crate) allocator: ManuallyDrop<Mutex<Allocator>>,

    pub(crate) surface_loader: ash::khr::surface::Instance,
    /// Window surface (None for a headless context)
    pub(crate) surface: Option<vk::SurfaceKHR>,
    pub(crate) swapchain_loader: ash::khr::swapchain::Device,

    pub queues: Queues,
    /// Features enabled on the logical device
    pub enabled_features: DeviceFeatures,

    upload: Mutex<UploadContext>,

    #[cfg(feature = "vulkan-validation")]
    debug_messenger: Option<crate::vulkan_debug::DebugMessenger>,
}

impl GpuContext {
    pub fn physical_device(&self) -> &PhysicalDevice {
        &self.physical_device
    }

    pub(crate) fn allocator(&self) -> Result<MutexGuard<'_, Allocator>> {
        self.allocator
            .lock()
            .map_err(|_| engine_err!(LOG_SOURCE, "GPU allocator mutex poisoned"))
    }

    pub fn graphics_queue(&self) -> Result<QueueHandle> {
        self.queues.graphics.ok_or_else(|| {
            Error::PreconditionFailed("No graphics queue was reserved for this context".to_string())
        })
    }

    pub fn present_queue(&self) -> Result<QueueHandle> {
        self.queues.present.ok_or_else(|| {
            Error::PreconditionFailed("No present queue was reserved for this context".to_string())
        })
    }

    pub(crate) fn surface_query(&self) -> Option<SurfaceQuery<'_>> {
        self.surface.map(|surface| SurfaceQuery { loader: &self.surface_loader, surface })
    }

    pub fn wait_idle(&self) -> Result<()> {
        unsafe { self.device.device_wait_idle() }
            .map_err(|e| engine_err!(LOG_SOURCE, "Failed to wait for device idle: {:?}", e))
    }

    /// Record with `record` and run the commands on the graphics queue,
    /// blocking until they complete
    pub fn immediate_submit(&self, record: impl FnOnce(vk::CommandBuffer) -> Result<()>) -> Result<()> {
        let queue = self.graphics_queue()?;
        let upload = self
            .upload
            .lock()
            .map_err(|_| engine_err!(LOG_SOURCE, "Upload context mutex poisoned"))?;

        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(upload.pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        unsafe {
            let cmd = self
                .device
                .allocate_command_buffers(&alloc_info)
                .map_err(|e| engine_err!(LOG_SOURCE, "Failed to allocate upload command buffer: {:?}", e))?[0];

            let result = (|| {
                let begin_info = vk::CommandBufferBeginInfo::default()
                    .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
                self.device
                    .begin_command_buffer(cmd, &begin_info)
                    .map_err(|e| engine_err!(LOG_SOURCE, "Failed to begin upload command buffer: {:?}", e))?;

                record(cmd)?;

                self.device
                    .end_command_buffer(cmd)
                    .map_err(|e| engine_err!(LOG_SOURCE, "Failed to end upload command buffer: {:?}", e))?;

                let command_buffers = [cmd];
                let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);
                self.device
                    .queue_submit(queue.queue, &[submit_info], upload.fence)
                    .map_err(|e| engine_err!(LOG_SOURCE, "Failed to submit upload commands: {:?}", e))?;
                self.device
                    .wait_for_fences(&[upload.fence], true, u64::MAX)
                    .map_err(|e| engine_err!(LOG_SOURCE, "Failed to wait for upload fence: {:?}", e))?;
                self.device
                    .reset_fences(&[upload.fence])
                    .map_err(|e| engine_err!(LOG_SOURCE, "Failed to reset upload fence: {:?}", e))
            })();

            self.device.free_command_buffers(upload.pool, &[cmd]);
            result
        }
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        unsafe {
            // Wait for device to finish
            self.device.device_wait_idle().ok();

            // 1. Context-owned Vulkan objects
            if let Ok(upload) = self.upload.get_mut() {
                self.device.destroy_fence(upload.fence, None);
                self.device.destroy_command_pool(upload.pool, None);
            }

            // 2. Allocator: free VkDeviceMemory pages BEFORE destroying device
            ManuallyDrop::drop(&mut self.allocator);

            // 3. Device, then instance-level objects
            self.device.destroy_device(None);
            if let Some(surface) = self.surface.take() {
                self.surface_loader.destroy_surface(surface, None);
            }
            #[cfg(feature = "vulkan-validation")]
            if let Some(messenger) = self.debug_messenger.take() {
                messenger.destroy();
            }
            self.instance.destroy_instance(None);
        }
    }
}

/// Vulkan device context
///
/// Central object for creating resources. Built once per application run from a
/// [`ContextConfig`]; the requested features are read here and nowhere else.
pub struct VulkanContext {
    gpu: Arc<GpuContext>,
    config: ContextConfig,
}

impl VulkanContext {
    /// Create a context presenting to `window`
    ///
    /// # Arguments
    ///
    /// * `window` - Window for surface creation
    /// * `config` - Context configuration (features, queues, validation)
    pub fn new<W: HasDisplayHandle + HasWindowHandle>(window: &W, config: ContextConfig) -> Result<Self> {
        let display_handle = window.display_handle().map_err(|e| {
            engine_error!(LOG_SOURCE, "Failed to get display handle: {}", e);
            Error::InitializationFailed(format!("Failed to get display handle: {}", e))
        })?;
        let window_handle = window.window_handle().map_err(|e| {
            engine_error!(LOG_SOURCE, "Failed to get window handle: {}", e);
            Error::InitializationFailed(format!("Failed to get window handle: {}", e))
        })?;
        Self::build(Some((display_handle.as_raw(), window_handle.as_raw())), config)
    }

    /// Create a context without a surface (compute, offscreen rendering, tests)
    pub fn new_headless(config: ContextConfig) -> Result<Self> {
        Self::build(None, config)
    }

    fn build(handles: Option<(RawDisplayHandle, RawWindowHandle)>, config: ContextConfig) -> Result<Self> {
        config.validate()?;

        unsafe {
            let entry = ash::Entry::load().map_err(|e| {
                engine_error!(LOG_SOURCE, "Failed to load Vulkan library: {:?}", e);
                Error::InitializationFailed(format!("Failed to load Vulkan library: {:?}", e))
            })?;

            let validation = validation_requested(&entry, &config)?;
            let instance = create_instance(&entry, &config, handles.map(|(display, _)| display), validation)?;
            let mut guard = InitGuard::new(&instance);

            #[cfg(feature = "vulkan-validation")]
            if validation {
                guard.debug_messenger = Some(crate::vulkan_debug::DebugMessenger::new(&entry, &instance)?);
            }

            let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);
            let surface = match handles {
                Some((display, window)) => Some(
                    ash_window::create_surface(&entry, &instance, display, window, None).map_err(|e| {
                        engine_error!(LOG_SOURCE, "Failed to create surface: {:?}", e);
                        Error::InitializationFailed(format!("Failed to create surface: {:?}", e))
                    })?,
                ),
                None => None,
            };
            if let Some(surface) = surface {
                guard.surface = Some((surface_loader.clone(), surface));
            }

            let surface_query = surface.map(|surface| SurfaceQuery { loader: &surface_loader, surface });
            let physical_device = PhysicalDevice::pick(
                &instance,
                surface_query,
                &config.features,
                config.requested_queues,
            )?;

            let device = create_logical_device(&instance, &physical_device, &config.features, surface.is_some())?;
            guard.device = Some(device.clone());

            let queue_of = |slot: Option<QueueFamilySlot>| {
                slot.map(|s| QueueHandle { family: s.index, queue: device.get_device_queue(s.index, 0) })
            };
            let reservation = physical_device.reservation();
            let queues = Queues {
                graphics: queue_of(reservation.graphics),
                compute: queue_of(reservation.compute),
                transfer: queue_of(reservation.transfer),
                present: queue_of(reservation.present),
            };

            let allocator = Allocator::new(&AllocatorCreateDesc {
                instance: instance.clone(),
                device: device.clone(),
                physical_device: physical_device.handle,
                debug_settings: Default::default(),
                buffer_device_address: config.features.buffer_device_address,
                allocation_sizes: Default::default(),
            })
            .map_err(|e| {
                engine_error!(LOG_SOURCE, "Failed to create GPU allocator: {:?}", e);
                Error::InitializationFailed(format!("Failed to create allocator: {:?}", e))
            })?;

            let upload_family = queues
                .graphics
                .or(queues.compute)
                .or(queues.transfer)
                .map(|q| q.family)
                .unwrap_or(0);
            let upload = create_upload_context(&device, upload_family)?;

            let swapchain_loader = ash::khr::swapchain::Device::new(&instance, &device);

            // Everything below is owned by the GpuContext from here on
            #[cfg(feature = "vulkan-validation")]
            let debug_messenger = guard.debug_messenger.take();
            guard.disarm();

            engine_info!(
                LOG_SOURCE,
                "Vulkan context created on '{}' (validation: {}, surface: {})",
                physical_device.name(),
                validation,
                surface.is_some()
            );

            let gpu = GpuContext {
                _entry: entry,
                instance,
                physical_device,
                device,
                allocator: ManuallyDrop::new(Mutex::new(allocator)),
                surface_loader,
                surface,
                swapchain_loader,
                queues,
                enabled_features: config.features,
                upload: Mutex::new(upload),
                #[cfg(feature = "vulkan-validation")]
                debug_messenger,
            };

            Ok(Self { gpu: Arc::new(gpu), config })
        }
    }

    pub fn gpu(&self) -> &Arc<GpuContext> {
        &self.gpu
    }

    pub fn device(&self) -> &ash::Device {
        &self.gpu.device
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    pub fn physical_device(&self) -> &PhysicalDevice {
        &self.gpu.physical_device
    }

    pub fn has_surface(&self) -> bool {
        self.gpu.surface.is_some()
    }

    pub fn wait_idle(&self) -> Result<()> {
        self.gpu.wait_idle()
    }

    /// Run one-shot commands on the graphics queue and wait for them
    pub fn immediate_submit(&self, record: impl FnOnce(vk::CommandBuffer) -> Result<()>) -> Result<()> {
        self.gpu.immediate_submit(record)
    }

    // ===== RESOURCES =====

    pub fn create_buffer(&self, desc: &BufferDesc) -> Result<Arc<Buffer>> {
        Buffer::create(&self.gpu, desc).map(Arc::new)
    }

    /// Host-visible buffer whose contents are copied into `destination` by
    /// [`Buffer::upload_staging_buffer`]
    pub fn create_staging_buffer(&self, destination: &Arc<Buffer>) -> Result<Arc<Buffer>> {
        Buffer::create_staging(&self.gpu, Arc::clone(destination)).map(Arc::new)
    }

    pub fn create_texture(&self, desc: &TextureDesc) -> Result<Arc<Texture>> {
        Texture::create(&self.gpu, desc).map(Arc::new)
    }

    pub fn create_sampler(&self, desc: &SamplerDesc) -> Result<Arc<Sampler>> {
        Sampler::create(&self.gpu, desc).map(Arc::new)
    }

    /// Load a shader relative to the configured shader directory
    ///
    /// `.spv` files are loaded as-is, anything else is compiled from GLSL. The
    /// stage comes from the extension; `entry_point` defaults to `main`.
    pub fn create_shader_module(&self, path: impl AsRef<Path>, entry_point: Option<&str>) -> Result<Arc<ShaderModule>> {
        let path = self.config.shader_path(path);
        ShaderModule::from_file(&self.gpu, &path, entry_point).map(Arc::new)
    }

    pub fn create_render_pass(
        &self,
        attachments: &[AttachmentInfo],
        resolves: &[AttachmentInfo],
        name: &str,
    ) -> Result<Arc<RenderPass>> {
        RenderPass::create(&self.gpu, attachments, resolves, name).map(Arc::new)
    }

    /// Build a graphics pipeline; `render_pass` is required unless the
    /// descriptor asks for dynamic rendering
    pub fn create_graphics_pipeline(
        &self,
        desc: GraphicsPipelineDesc<ShaderModule>,
        render_pass: Option<&RenderPass>,
    ) -> Result<Arc<Pipeline>> {
        Pipeline::create_graphics(&self.gpu, desc, render_pass).map(Arc::new)
    }

    pub fn create_compute_pipeline(&self, desc: ComputePipelineDesc<ShaderModule>) -> Result<Arc<Pipeline>> {
        Pipeline::create_compute(&self.gpu, desc).map(Arc::new)
    }

    /// Command queue on the graphics family with the configured ring sizes
    pub fn create_graphics_command_queue(&self) -> Result<CommandQueue> {
        let queue = self.gpu.graphics_queue()?;
        CommandQueue::create(
            &self.gpu,
            queue,
            self.config.command_buffer_count,
            self.config.frames_in_flight,
            "Graphics Command Queue",
        )
    }

    /// One uniform buffer of `size` bytes per frame in flight
    pub fn create_uniform_ring_buffer(&self, size: u64, name: &str) -> Result<UniformRingBuffer> {
        UniformRingBuffer::create(&self.gpu, size, self.config.frames_in_flight, name)
    }

    pub fn create_framebuffer(&self, render_pass: &Arc<RenderPass>, desc: FramebufferDesc<Texture>) -> Result<Arc<Framebuffer>> {
        Framebuffer::create(&self.gpu, Arc::clone(render_pass), desc).map(Arc::new)
    }

    // ===== SWAPCHAIN =====

    /// Negotiate and create a swapchain for a window of `window_extent`
    pub fn create_swapchain(&self, window_extent: Extent2D) -> Result<Swapchain> {
        engine_precondition!(
            self.has_surface(),
            LOG_SOURCE,
            "A surface is required to create a swapchain (context is headless)"
        );
        let query = self
            .gpu
            .surface_query()
            .ok_or_else(|| Error::InvalidResource("surface".to_string()))?;

        let physical_device = &self.gpu.physical_device;
        let caps = physical_device.surface_capabilities(query)?;
        let formats = physical_device.surface_formats(query)?;
        let present_modes = physical_device.present_modes(query)?;

        let desc = SwapchainDesc::negotiate(
            &caps,
            &formats,
            &present_modes,
            window_extent,
            self.config.preferred_present_mode,
            None,
        )?;
        if desc.present_mode != self.config.preferred_present_mode {
            engine_warn!(
                LOG_SOURCE,
                "Present mode '{}' unsupported, using '{}'",
                self.config.preferred_present_mode,
                desc.present_mode
            );
        }

        Swapchain::create(&self.gpu, &desc, None)
    }

    /// Replace `old` with a swapchain sized for the window's drawable extent
    ///
    /// Waits for a non-zero extent (minimized window), then for device idle,
    /// and keeps the old surface format and present mode.
    pub fn recreate_swapchain<W: WindowSurface>(&mut self, window: &mut W, old: Swapchain) -> Result<Swapchain> {
        recreate_swapchain(self, window, old)
    }
}

impl SwapchainHost for VulkanContext {
    type Swapchain = Swapchain;

    fn wait_idle(&self) -> Result<()> {
        self.gpu.wait_idle()
    }

    fn surface_capabilities(&self) -> Result<SurfaceCapabilities> {
        let query = self.gpu.surface_query().ok_or_else(|| {
            Error::PreconditionFailed("A surface is required to recreate a swapchain".to_string())
        })?;
        self.gpu.physical_device.surface_capabilities(query)
    }

    fn swapchain_desc(&self, swapchain: &Swapchain) -> SwapchainDesc {
        *swapchain.desc()
    }

    fn rebuild_swapchain(&mut self, desc: &SwapchainDesc, old: Swapchain) -> Result<Swapchain> {
        engine_debug!(
            LOG_SOURCE,
            "Rebuilding swapchain at {}x{} ({} images)",
            desc.extent.width,
            desc.extent.height,
            desc.image_count
        );
        Swapchain::create(&self.gpu, desc, Some(old))
    }
}

// ===== CONSTRUCTION HELPERS =====

/// Objects created so far by `VulkanContext::build`
///
/// Destroyed in reverse creation order if construction fails before the
/// `GpuContext` takes ownership.
struct InitGuard {
    instance: ash::Instance,
    #[cfg(feature = "vulkan-validation")]
    debug_messenger: Option<crate::vulkan_debug::DebugMessenger>,
    surface: Option<(ash::khr::surface::Instance, vk::SurfaceKHR)>,
    device: Option<ash::Device>,
    armed: bool,
}

impl InitGuard {
    fn new(instance: &ash::Instance) -> Self {
        Self {
            instance: instance.clone(),
            #[cfg(feature = "vulkan-validation")]
            debug_messenger: None,
            surface: None,
            device: None,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for InitGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        engine_warn!(LOG_SOURCE, "Context creation failed, releasing partially created objects");
        unsafe {
            if let Some(device) = self.device.take() {
                device.destroy_device(None);
            }
            if let Some((loader, surface)) = self.surface.take() {
                loader.destroy_surface(surface, None);
            }
            #[cfg(feature = "vulkan-validation")]
            if let Some(messenger) = self.debug_messenger.take() {
                messenger.destroy();
            }
            self.instance.destroy_instance(None);
        }
    }
}

/// Validation is used only when requested and compiled in; a requested but
/// missing layer is an initialization failure
fn validation_requested(entry: &ash::Entry, config: &ContextConfig) -> Result<bool> {
    if !config.enable_validation {
        return Ok(false);
    }
    if !cfg!(feature = "vulkan-validation") {
        engine_warn!(
            LOG_SOURCE,
            "Validation requested but the backend was built without the 'vulkan-validation' feature"
        );
        return Ok(false);
    }

    let layers = unsafe { entry.enumerate_instance_layer_properties() }.map_err(|e| {
        engine_error!(LOG_SOURCE, "Failed to enumerate instance layers: {:?}", e);
        Error::InitializationFailed(format!("Failed to enumerate instance layers: {:?}", e))
    })?;
    let available = layers.iter().any(|layer| {
        layer
            .layer_name_as_c_str()
            .is_ok_and(|name| name == VALIDATION_LAYER_NAME)
    });
    if !available {
        engine_error!(LOG_SOURCE, "Validation layers requested, but not available");
        return Err(Error::InitializationFailed(
            "Validation layers requested, but not available".to_string(),
        ));
    }
    Ok(true)
}

unsafe fn create_instance(
    entry: &ash::Entry,
    config: &ContextConfig,
    display: Option<RawDisplayHandle>,
    validation: bool,
) -> Result<ash::Instance> {
    let app_name = CString::new(config.app_name.as_str()).map_err(|_| {
        Error::PreconditionFailed(format!("Application name '{}' contains a NUL byte", config.app_name))
    })?;
    let (major, minor, patch) = config.app_version;

    let app_info = vk::ApplicationInfo::default()
        .application_name(&app_name)
        .application_version(vk::make_api_version(0, major, minor, patch))
        .engine_name(c"BlurEngine")
        .engine_version(vk::make_api_version(0, 0, 1, 0))
        .api_version(vk::API_VERSION_1_3);

    let mut extension_names: Vec<*const c_char> = match display {
        Some(display) => ash_window::enumerate_required_extensions(display)
            .map_err(|e| {
                engine_error!(LOG_SOURCE, "Failed to get required extensions: {}", e);
                Error::InitializationFailed(format!("Failed to get required extensions: {}", e))
            })?
            .to_vec(),
        None => Vec::new(),
    };
    if validation {
        extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
    }

    let layer_names = if validation {
        vec![VALIDATION_LAYER_NAME.as_ptr()]
    } else {
        vec![]
    };

    let create_info = vk::InstanceCreateInfo::default()
        .application_info(&app_info)
        .enabled_layer_names(&layer_names)
        .enabled_extension_names(&extension_names);

    entry.create_instance(&create_info, None).map_err(|e| {
        engine_error!(LOG_SOURCE, "Failed to create Vulkan instance: {:?}", e);
        Error::InitializationFailed(format!("Failed to create instance: {:?}", e))
    })
}

/// Logical device with one queue per reserved family and the requested features
unsafe fn create_logical_device(
    instance: &ash::Instance,
    physical_device: &PhysicalDevice,
    features: &DeviceFeatures,
    has_surface: bool,
) -> Result<ash::Device> {
    let queue_priorities = [1.0];
    let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = physical_device
        .reservation()
        .unique_families()
        .iter()
        .map(|slot| {
            vk::DeviceQueueCreateInfo::default()
                .queue_family_index(slot.index)
                .queue_priorities(&queue_priorities)
        })
        .collect();

    let extension_names: Vec<*const c_char> = required_device_extensions(has_surface)
        .iter()
        .map(|name| name.as_ptr())
        .collect();

    let core_features = vk::PhysicalDeviceFeatures::default()
        .sampler_anisotropy(true)
        .multi_draw_indirect(features.indirect_rendering)
        .draw_indirect_first_instance(features.indirect_rendering);

    let mut v11 = vk::PhysicalDeviceVulkan11Features::default()
        .shader_draw_parameters(features.indirect_rendering);

    let mut v12 = vk::PhysicalDeviceVulkan12Features::default()
        .draw_indirect_count(features.indirect_rendering)
        .buffer_device_address(features.buffer_device_address)
        .buffer_device_address_capture_replay(false);
    if features.bindless_indexing {
        v12 = v12
            .descriptor_indexing(true)
            .runtime_descriptor_array(true)
            .descriptor_binding_partially_bound(true)
            .descriptor_binding_variable_descriptor_count(true)
            .shader_sampled_image_array_non_uniform_indexing(true)
            .shader_storage_buffer_array_non_uniform_indexing(true)
            .descriptor_binding_sampled_image_update_after_bind(true)
            .descriptor_binding_storage_image_update_after_bind(true)
            .descriptor_binding_storage_buffer_update_after_bind(true)
            .descriptor_binding_uniform_buffer_update_after_bind(true);
    }

    let mut v13 = vk::PhysicalDeviceVulkan13Features::default()
        .synchronization2(features.synchronization2)
        .dynamic_rendering(true);

    let mut features2 = vk::PhysicalDeviceFeatures2::default()
        .features(core_features)
        .push_next(&mut v11)
        .push_next(&mut v12)
        .push_next(&mut v13);

    let device_create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(&queue_create_infos)
        .enabled_extension_names(&extension_names)
        .push_next(&mut features2);

    instance
        .create_device(physical_device.handle, &device_create_info, None)
        .map_err(|e| {
            engine_error!(LOG_SOURCE, "Failed to create logical device: {:?}", e);
            Error::InitializationFailed(format!("Failed to create device: {:?}", e))
        })
}

unsafe fn create_upload_context(device: &ash::Device, family: u32) -> Result<UploadContext> {
    let pool_info = vk::CommandPoolCreateInfo::default()
        .queue_family_index(family)
        .flags(vk::CommandPoolCreateFlags::TRANSIENT | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
    let pool = device.create_command_pool(&pool_info, None).map_err(|e| {
        engine_error!(LOG_SOURCE, "Failed to create upload command pool: {:?}", e);
        Error::InitializationFailed(format!("Failed to create upload command pool: {:?}", e))
    })?;

    let fence = device
        .create_fence(&vk::FenceCreateInfo::default(), None)
        .map_err(|e| {
            device.destroy_command_pool(pool, None);
            engine_error!(LOG_SOURCE, "Failed to create upload fence: {:?}", e);
            Error::InitializationFailed(format!("Failed to create upload fence: {:?}", e))
        })?;

    Ok(UploadContext { pool, fence })
}
