/// PhysicalDevice - GPU enumeration, scoring and queue-family reservation
///
/// Queries every physical device, turns it into a [`DeviceCandidate`] and lets
/// the engine's scoring pick one. The chosen device keeps its reservation and
/// surface details for the lifetime of the context.

use ash::vk;
use blur_engine::blur::render::{
    select_device, DeviceCandidate, PresentMode, QueueFamilyInfo, QueueFlags, QueueReservation,
    SurfaceCapabilities, SurfaceFormat,
};
use blur_engine::blur::{DeviceFeatures, Error, Result};
use blur_engine::{engine_error, engine_info};
use std::ffi::CStr;

use crate::vulkan_format::{
    vk_device_type_to_device_type, vk_present_mode_to_present_mode, vk_queue_flags_to_queue_flags,
    vk_surface_capabilities, vk_surface_format_to_surface_format,
};

const LOG_SOURCE: &str = "blur::vulkan::PhysicalDevice";

/// Surface the device must be able to present to
#[derive(Clone, Copy)]
pub(crate) struct SurfaceQuery<'a> {
    pub loader: &'a ash::khr::surface::Instance,
    pub surface: vk::SurfaceKHR,
}

/// The selected GPU
#[derive(Debug, Clone)]
pub struct PhysicalDevice {
    pub(crate) handle: vk::PhysicalDevice,
    name: String,
    properties: vk::PhysicalDeviceProperties,
    available_features: DeviceFeatures,
    queue_families: Vec<QueueFamilyInfo>,
    reservation: QueueReservation,
}

impl PhysicalDevice {
    /// Enumerate, score and select a GPU, then reserve its queue families
    pub(crate) fn pick(
        instance: &ash::Instance,
        surface: Option<SurfaceQuery<'_>>,
        requested_features: &DeviceFeatures,
        requested_queues: QueueFlags,
    ) -> Result<Self> {
        let handles = unsafe { instance.enumerate_physical_devices() }.map_err(|e| {
            engine_error!(LOG_SOURCE, "Failed to enumerate physical devices: {:?}", e);
            Error::InitializationFailed(format!("Failed to enumerate physical devices: {:?}", e))
        })?;

        let mut candidates = Vec::with_capacity(handles.len());
        for &handle in &handles {
            candidates.push(query_candidate(instance, handle, surface)?);
        }

        let index = select_device(&candidates, requested_features, surface.is_some()).map_err(|e| {
            engine_error!(LOG_SOURCE, "{}", e);
            e
        })?;
        let handle = handles[index];
        let candidate = &candidates[index];

        let queue_families = query_queue_families(instance, handle, surface)?;
        let reservation = QueueReservation::reserve(&queue_families, requested_queues, surface.is_some())?;
        let properties = unsafe { instance.get_physical_device_properties(handle) };

        engine_info!(
            LOG_SOURCE,
            "Selected GPU '{}' ({:?}) out of {} device(s)",
            candidate.name,
            candidate.device_type,
            candidates.len()
        );

        Ok(Self {
            handle,
            name: candidate.name.clone(),
            properties,
            available_features: candidate.features,
            queue_families,
            reservation,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn properties(&self) -> &vk::PhysicalDeviceProperties {
        &self.properties
    }

    pub fn limits(&self) -> &vk::PhysicalDeviceLimits {
        &self.properties.limits
    }

    pub fn available_features(&self) -> DeviceFeatures {
        self.available_features
    }

    pub fn queue_families(&self) -> &[QueueFamilyInfo] {
        &self.queue_families
    }

    pub fn reservation(&self) -> &QueueReservation {
        &self.reservation
    }

    /// Surface capabilities for `surface`, queried fresh (they change on resize)
    pub(crate) fn surface_capabilities(&self, query: SurfaceQuery<'_>) -> Result<SurfaceCapabilities> {
        let caps = unsafe {
            query
                .loader
                .get_physical_device_surface_capabilities(self.handle, query.surface)
        }
        .map_err(|e| {
            engine_error!(LOG_SOURCE, "Failed to get surface capabilities: {:?}", e);
            Error::InitializationFailed(format!("Failed to get surface capabilities: {:?}", e))
        })?;
        Ok(vk_surface_capabilities(&caps))
    }

    pub(crate) fn surface_formats(&self, query: SurfaceQuery<'_>) -> Result<Vec<SurfaceFormat>> {
        let formats = unsafe {
            query
                .loader
                .get_physical_device_surface_formats(self.handle, query.surface)
        }
        .map_err(|e| {
            engine_error!(LOG_SOURCE, "Failed to query surface formats: {:?}", e);
            Error::InitializationFailed(format!("Failed to query surface formats: {:?}", e))
        })?;
        Ok(formats.iter().map(vk_surface_format_to_surface_format).collect())
    }

    pub(crate) fn present_modes(&self, query: SurfaceQuery<'_>) -> Result<Vec<PresentMode>> {
        let modes = unsafe {
            query
                .loader
                .get_physical_device_surface_present_modes(self.handle, query.surface)
        }
        .map_err(|e| {
            engine_error!(LOG_SOURCE, "Failed to query present modes: {:?}", e);
            Error::InitializationFailed(format!("Failed to query present modes: {:?}", e))
        })?;
        Ok(modes.into_iter().filter_map(vk_present_mode_to_present_mode).collect())
    }
}

/// Everything scoring needs to know about one device
fn query_candidate(
    instance: &ash::Instance,
    handle: vk::PhysicalDevice,
    surface: Option<SurfaceQuery<'_>>,
) -> Result<DeviceCandidate> {
    let properties = unsafe { instance.get_physical_device_properties(handle) };
    let name = properties
        .device_name_as_c_str()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "Unknown GPU".to_string());

    let extensions = unsafe { instance.enumerate_device_extension_properties(handle) }.map_err(|e| {
        engine_error!(LOG_SOURCE, "Failed to enumerate extensions of '{}': {:?}", name, e);
        Error::InitializationFailed(format!("Failed to enumerate device extensions: {:?}", e))
    })?;
    let supports_swapchain = extensions.iter().any(|ext| {
        ext.extension_name_as_c_str()
            .is_ok_and(|n| n == ash::khr::swapchain::NAME)
    });

    let (surface_format_count, present_mode_count) = match surface {
        Some(query) => unsafe {
            (
                query
                    .loader
                    .get_physical_device_surface_formats(handle, query.surface)
                    .map(|f| f.len())
                    .unwrap_or(0),
                query
                    .loader
                    .get_physical_device_surface_present_modes(handle, query.surface)
                    .map(|m| m.len())
                    .unwrap_or(0),
            )
        },
        None => (0, 0),
    };

    let (features, sampler_anisotropy, dynamic_rendering) = query_features(instance, handle);

    Ok(DeviceCandidate {
        name,
        device_type: vk_device_type_to_device_type(properties.device_type),
        api_version: (
            vk::api_version_major(properties.api_version),
            vk::api_version_minor(properties.api_version),
        ),
        max_image_dimension_2d: properties.limits.max_image_dimension2_d,
        supports_swapchain,
        surface_format_count,
        present_mode_count,
        sampler_anisotropy,
        dynamic_rendering,
        features,
    })
}

/// Optional feature groups the device supports in full, plus the baseline
/// anisotropy and dynamic rendering support
fn query_features(instance: &ash::Instance, handle: vk::PhysicalDevice) -> (DeviceFeatures, bool, bool) {
    let mut v11 = vk::PhysicalDeviceVulkan11Features::default();
    let mut v12 = vk::PhysicalDeviceVulkan12Features::default();
    let mut v13 = vk::PhysicalDeviceVulkan13Features::default();
    let mut features2 = vk::PhysicalDeviceFeatures2::default()
        .push_next(&mut v11)
        .push_next(&mut v12)
        .push_next(&mut v13);
    unsafe { instance.get_physical_device_features2(handle, &mut features2) };
    let core = features2.features;

    let optional = DeviceFeatures {
        bindless_indexing: v12.descriptor_indexing == vk::TRUE
            && v12.runtime_descriptor_array == vk::TRUE
            && v12.descriptor_binding_partially_bound == vk::TRUE
            && v12.descriptor_binding_variable_descriptor_count == vk::TRUE
            && v12.shader_sampled_image_array_non_uniform_indexing == vk::TRUE
            && v12.shader_storage_buffer_array_non_uniform_indexing == vk::TRUE
            && v12.descriptor_binding_sampled_image_update_after_bind == vk::TRUE
            && v12.descriptor_binding_storage_image_update_after_bind == vk::TRUE
            && v12.descriptor_binding_storage_buffer_update_after_bind == vk::TRUE
            && v12.descriptor_binding_uniform_buffer_update_after_bind == vk::TRUE,
        indirect_rendering: core.multi_draw_indirect == vk::TRUE
            && core.draw_indirect_first_instance == vk::TRUE
            && v12.draw_indirect_count == vk::TRUE
            && v11.shader_draw_parameters == vk::TRUE,
        synchronization2: v13.synchronization2 == vk::TRUE,
        buffer_device_address: v12.buffer_device_address == vk::TRUE,
    };
    (optional, core.sampler_anisotropy == vk::TRUE, v13.dynamic_rendering == vk::TRUE)
}

fn query_queue_families(
    instance: &ash::Instance,
    handle: vk::PhysicalDevice,
    surface: Option<SurfaceQuery<'_>>,
) -> Result<Vec<QueueFamilyInfo>> {
    let properties = unsafe { instance.get_physical_device_queue_family_properties(handle) };

    let mut families = Vec::with_capacity(properties.len());
    for (index, family) in properties.iter().enumerate() {
        let supports_present = match surface {
            Some(query) => unsafe {
                query
                    .loader
                    .get_physical_device_surface_support(handle, index as u32, query.surface)
            }
            .map_err(|e| {
                engine_error!(LOG_SOURCE, "Failed to query present support of family {}: {:?}", index, e);
                Error::InitializationFailed(format!("Failed to query present support: {:?}", e))
            })?,
            None => false,
        };
        families.push(QueueFamilyInfo {
            flags: vk_queue_flags_to_queue_flags(family.queue_flags),
            queue_count: family.queue_count,
            supports_present,
        });
    }
    Ok(families)
}

/// Device extensions enabled on the logical device
pub(crate) fn required_device_extensions(has_surface: bool) -> Vec<&'static CStr> {
    let mut extensions = Vec::new();
    if has_surface {
        extensions.push(ash::khr::swapchain::NAME);
    }
    extensions
}
