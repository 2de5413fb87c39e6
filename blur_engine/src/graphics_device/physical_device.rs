/// Physical device selection and queue-family reservation
///
/// The backend describes each candidate GPU with a [`DeviceCandidate`] and each
/// queue family with a [`QueueFamilyInfo`]; the decisions are made here.

use bitflags::bitflags;
use crate::error::{Error, Result};
use crate::config::DeviceFeatures;

bitflags! {
    /// Queue capabilities (mirrors the API's queue flag bits)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct QueueFlags: u32 {
        const GRAPHICS = 0b0001;
        const COMPUTE  = 0b0010;
        const TRANSFER = 0b0100;
        const SPARSE   = 0b1000;
    }
}

/// One queue family as reported by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilyInfo {
    pub flags: QueueFlags,
    pub queue_count: u32,
    /// Family can present to the context's surface
    pub supports_present: bool,
}

/// A reserved family: index plus how many queues it exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QueueFamilySlot {
    pub index: u32,
    pub queue_count: u32,
}

/// Families reserved for each role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueReservation {
    pub graphics: Option<QueueFamilySlot>,
    pub compute: Option<QueueFamilySlot>,
    pub transfer: Option<QueueFamilySlot>,
    pub present: Option<QueueFamilySlot>,
}

impl QueueReservation {
    /// Reserve one family per requested role
    ///
    /// Present takes the first family that can present (it may alias another
    /// role). Graphics, compute and transfer, in that priority, each take the first
    /// family not already claimed by one of them that supports a still-requested
    /// flag, so a family serving graphics is never handed out again as compute.
    pub fn reserve(
        families: &[QueueFamilyInfo],
        requested: QueueFlags,
        has_surface: bool,
    ) -> Result<Self> {
        if requested.is_empty() {
            return Err(Error::PreconditionFailed("Requested queue types cannot be empty".to_string()));
        }

        let mut remaining = requested;
        let mut reservation = QueueReservation::default();

        for (index, family) in families.iter().enumerate() {
            let slot = QueueFamilySlot { index: index as u32, queue_count: family.queue_count };

            if has_surface && reservation.present.is_none() && family.supports_present {
                reservation.present = Some(slot);
            }

            let offered = remaining & family.flags;
            if reservation.graphics.is_none() && offered.contains(QueueFlags::GRAPHICS) {
                reservation.graphics = Some(slot);
                remaining.remove(QueueFlags::GRAPHICS);
                continue;
            }
            if reservation.compute.is_none() && offered.contains(QueueFlags::COMPUTE) {
                reservation.compute = Some(slot);
                remaining.remove(QueueFlags::COMPUTE);
                continue;
            }
            if reservation.transfer.is_none() && offered.contains(QueueFlags::TRANSFER) {
                reservation.transfer = Some(slot);
                remaining.remove(QueueFlags::TRANSFER);
                continue;
            }
        }

        if reservation.graphics.is_none() && reservation.compute.is_none() && reservation.transfer.is_none() {
            return Err(Error::InitializationFailed("No suitable queue(s) found".to_string()));
        }
        if has_surface && reservation.present.is_none() {
            return Err(Error::InitializationFailed("No queues with presentation capabilities found".to_string()));
        }

        Ok(reservation)
    }

    /// Deduplicated families to create queues on, sorted by index
    pub fn unique_families(&self) -> Vec<QueueFamilySlot> {
        let mut slots: Vec<QueueFamilySlot> = [self.graphics, self.compute, self.transfer, self.present]
            .into_iter()
            .flatten()
            .collect();
        slots.sort();
        slots.dedup();
        slots
    }

    /// Graphics and present share a family (swapchain images need no sharing)
    pub fn present_shares_graphics(&self) -> bool {
        match (self.graphics, self.present) {
            (Some(g), Some(p)) => g.index == p.index,
            _ => true,
        }
    }
}

/// Kind of GPU, in descending preference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceType {
    Discrete,
    Integrated,
    Virtual,
    Cpu,
    Other,
}

impl DeviceType {
    fn base_score(self) -> u64 {
        match self {
            DeviceType::Discrete => 10_000,
            DeviceType::Integrated => 1_000,
            DeviceType::Virtual => 100,
            DeviceType::Cpu => 10,
            DeviceType::Other => 1,
        }
    }
}

/// Lowest API version (major, minor) the engine creates devices for
pub const REQUIRED_API_VERSION: (u32, u32) = (1, 3);

/// What the selector needs to know about one GPU
#[derive(Debug, Clone)]
pub struct DeviceCandidate {
    pub name: String,
    pub device_type: DeviceType,
    /// (major, minor) reported by the driver
    pub api_version: (u32, u32),
    pub max_image_dimension_2d: u32,
    pub supports_swapchain: bool,
    pub surface_format_count: usize,
    pub present_mode_count: usize,
    /// Baseline features every device is created with
    pub sampler_anisotropy: bool,
    pub dynamic_rendering: bool,
    pub features: DeviceFeatures,
}

impl DeviceCandidate {
    /// API version and baseline features are present
    pub fn meets_baseline(&self) -> bool {
        self.api_version >= REQUIRED_API_VERSION && self.sampler_anisotropy && self.dynamic_rendering
    }
}

/// Score a candidate; `None` when it cannot run the engine at all
pub fn score_device(candidate: &DeviceCandidate, requested: &DeviceFeatures, needs_surface: bool) -> Option<u64> {
    if !candidate.meets_baseline() {
        return None;
    }
    if needs_surface {
        if !candidate.supports_swapchain
            || candidate.surface_format_count == 0
            || candidate.present_mode_count == 0
        {
            return None;
        }
    }
    if !requested.missing_from(&candidate.features).is_empty() {
        return None;
    }
    Some(candidate.device_type.base_score() + u64::from(candidate.max_image_dimension_2d) / 16)
}

/// Index of the best candidate
pub fn select_device(candidates: &[DeviceCandidate], requested: &DeviceFeatures, needs_surface: bool) -> Result<usize> {
    candidates
        .iter()
        .enumerate()
        .filter_map(|(i, c)| score_device(c, requested, needs_surface).map(|s| (i, s)))
        // max_by_key keeps the last maximum; iterate reversed so ties go to the first device
        .rev()
        .max_by_key(|&(_, score)| score)
        .map(|(i, _)| i)
        .ok_or_else(|| {
            let names: Vec<&str> = candidates.iter().map(|c| c.name.as_str()).collect();
            Error::InitializationFailed(format!(
                "No GPU supports Vulkan 1.3 with the required extensions, features and surface formats (candidates: {:?})",
                names
            ))
        })
}

#[cfg(test)]
#[path = "physical_device_tests.rs"]
mod tests;
