/// Texture descriptors, validation and view-type derivation

use bitflags::bitflags;
use crate::error::{Error, Result};
use crate::graphics_device::format::{mip_level_count, TextureFormat};

/// Dimensionality of the image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureType {
    Tex1D,
    Tex2D,
    Tex3D,
}

/// Type of image view created for a texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageViewType {
    View1D,
    View1DArray,
    View2D,
    View2DArray,
    Cube,
    View3D,
}

bitflags! {
    /// Image creation flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureFlags: u32 {
        const CUBE_COMPATIBLE = 0x0010;
    }
}

bitflags! {
    /// Image usage flags (bit-compatible with the API's image usage bits)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        const TRANSFER_SRC             = 0x0001;
        const TRANSFER_DST             = 0x0002;
        const SAMPLED                  = 0x0004;
        const STORAGE                  = 0x0008;
        const COLOR_ATTACHMENT         = 0x0010;
        const DEPTH_STENCIL_ATTACHMENT = 0x0020;
        const TRANSIENT_ATTACHMENT     = 0x0040;
        const INPUT_ATTACHMENT         = 0x0080;
    }
}

/// Multisample count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SampleCount {
    #[default]
    S1,
    S2,
    S4,
    S8,
    S16,
    S32,
    S64,
}

impl SampleCount {
    pub const fn count(self) -> u32 {
        match self {
            SampleCount::S1 => 1,
            SampleCount::S2 => 2,
            SampleCount::S4 => 4,
            SampleCount::S8 => 8,
            SampleCount::S16 => 16,
            SampleCount::S32 => 32,
            SampleCount::S64 => 64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ImageTiling {
    #[default]
    Optimal,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent3D {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

impl Extent3D {
    pub const fn new(width: u32, height: u32, depth: u32) -> Self {
        Self { width, height, depth }
    }
}

/// Descriptor for creating an application-owned texture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureDesc {
    pub texture_type: TextureType,
    pub format: TextureFormat,
    pub flags: TextureFlags,
    pub usage: TextureUsage,
    pub extent: Extent3D,
    /// Explicit mip count (ignored when `generate_mips` is set)
    pub mip_levels: u32,
    /// Compute the full mip chain from the extent
    pub generate_mips: bool,
    pub layer_count: u32,
    pub samples: SampleCount,
    /// One image viewed as a layered 2D array (multiview rendering)
    pub multiview: bool,
    pub tiling: ImageTiling,
    /// Place the image in host-visible memory instead of device-local
    pub host_visible: bool,
    pub name: String,
}

impl TextureDesc {
    /// Single-mip, single-layer 2D texture
    pub fn new_2d(format: TextureFormat, width: u32, height: u32, usage: TextureUsage, name: impl Into<String>) -> Self {
        Self {
            texture_type: TextureType::Tex2D,
            format,
            flags: TextureFlags::empty(),
            usage,
            extent: Extent3D::new(width, height, 1),
            mip_levels: 1,
            generate_mips: false,
            layer_count: 1,
            samples: SampleCount::S1,
            multiview: false,
            tiling: ImageTiling::Optimal,
            host_visible: false,
            name: name.into(),
        }
    }

    /// Mip count the image is created with
    pub fn resolved_mip_levels(&self) -> u32 {
        if self.generate_mips {
            mip_level_count(self.extent.width, self.extent.height)
        } else {
            self.mip_levels
        }
    }

    /// Check the descriptor and return the mip count to create
    pub fn validate(&self) -> Result<u32> {
        if self.extent.width == 0 || self.extent.height == 0 {
            return Err(Error::PreconditionFailed(format!(
                "Texture '{}' cannot have dimensions equal to 0 ({}x{})",
                self.name, self.extent.width, self.extent.height
            )));
        }
        if !self.generate_mips && self.mip_levels == 0 {
            return Err(Error::PreconditionFailed(format!(
                "Texture '{}' must have at least one mip level",
                self.name
            )));
        }
        if self.layer_count == 0 {
            return Err(Error::PreconditionFailed(format!(
                "Texture '{}' must have at least one layer",
                self.name
            )));
        }

        let mips = self.resolved_mip_levels();
        if mips > 1 && self.samples != SampleCount::S1 {
            return Err(Error::PreconditionFailed(format!(
                "Multisampled texture '{}' cannot have more than 1 mip level",
                self.name
            )));
        }
        Ok(mips)
    }

    pub fn view_type(&self) -> ImageViewType {
        view_type_for(self.texture_type, self.flags, self.multiview)
    }
}

/// View type for an image: cube when 2D and cube-compatible, arrays for multiview
pub fn view_type_for(texture_type: TextureType, flags: TextureFlags, multiview: bool) -> ImageViewType {
    match texture_type {
        TextureType::Tex1D if multiview => ImageViewType::View1DArray,
        TextureType::Tex1D => ImageViewType::View1D,
        TextureType::Tex2D if flags.contains(TextureFlags::CUBE_COMPATIBLE) => ImageViewType::Cube,
        TextureType::Tex2D if multiview => ImageViewType::View2DArray,
        TextureType::Tex2D => ImageViewType::View2D,
        TextureType::Tex3D => ImageViewType::View3D,
    }
}

#[cfg(test)]
#[path = "texture_tests.rs"]
mod tests;
