/// Texture formats and their capability classification
///
/// Classification (color / depth / stencil / depth-stencil) is a lookup into a
/// table indexed by the format's discriminant, so every call site reads the same
/// answer and nothing is cached on the texture.

/// Pixel formats understood by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
#[repr(u8)]
pub enum TextureFormat {
    /// Format reported by the API that the engine has no name for
    Undefined,
    R8_UNORM,
    R8G8_UNORM,
    R8G8B8A8_UNORM,
    R8G8B8A8_SRGB,
    B8G8R8A8_UNORM,
    B8G8R8A8_SRGB,
    A2B10G10R10_UNORM_PACK32,
    R16G16B16A16_SFLOAT,
    R32_UINT,
    R32_SFLOAT,
    R32G32_SFLOAT,
    R32G32B32A32_SFLOAT,
    D16_UNORM,
    X8_D24_UNORM_PACK32,
    D32_SFLOAT,
    S8_UINT,
    D16_UNORM_S8_UINT,
    D24_UNORM_S8_UINT,
    D32_SFLOAT_S8_UINT,
}

/// What kind of data a format stores
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatClass {
    Color,
    Depth,
    Stencil,
    DepthStencil,
}

/// Aspect used for the default image view of a format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewAspect {
    Color,
    Depth,
    Stencil,
}

/// Static properties of one format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatInfo {
    pub class: FormatClass,
    /// Size of one texel in bytes (0 for Undefined)
    pub texel_size: u32,
}

const fn fi(class: FormatClass, texel_size: u32) -> FormatInfo {
    FormatInfo { class, texel_size }
}

// Order must match the declaration order of `TextureFormat`.
const FORMAT_TABLE: [FormatInfo; TextureFormat::COUNT] = [
    fi(FormatClass::Color, 0),          // Undefined
    fi(FormatClass::Color, 1),          // R8_UNORM
    fi(FormatClass::Color, 2),          // R8G8_UNORM
    fi(FormatClass::Color, 4),          // R8G8B8A8_UNORM
    fi(FormatClass::Color, 4),          // R8G8B8A8_SRGB
    fi(FormatClass::Color, 4),          // B8G8R8A8_UNORM
    fi(FormatClass::Color, 4),          // B8G8R8A8_SRGB
    fi(FormatClass::Color, 4),          // A2B10G10R10_UNORM_PACK32
    fi(FormatClass::Color, 8),          // R16G16B16A16_SFLOAT
    fi(FormatClass::Color, 4),          // R32_UINT
    fi(FormatClass::Color, 4),          // R32_SFLOAT
    fi(FormatClass::Color, 8),          // R32G32_SFLOAT
    fi(FormatClass::Color, 16),         // R32G32B32A32_SFLOAT
    fi(FormatClass::Depth, 2),          // D16_UNORM
    fi(FormatClass::Depth, 4),          // X8_D24_UNORM_PACK32
    fi(FormatClass::Depth, 4),          // D32_SFLOAT
    fi(FormatClass::Stencil, 1),        // S8_UINT
    fi(FormatClass::DepthStencil, 3),   // D16_UNORM_S8_UINT
    fi(FormatClass::DepthStencil, 4),   // D24_UNORM_S8_UINT
    fi(FormatClass::DepthStencil, 5),   // D32_SFLOAT_S8_UINT
];

impl TextureFormat {
    pub const COUNT: usize = 20;

    pub const ALL: [TextureFormat; TextureFormat::COUNT] = [
        TextureFormat::Undefined,
        TextureFormat::R8_UNORM,
        TextureFormat::R8G8_UNORM,
        TextureFormat::R8G8B8A8_UNORM,
        TextureFormat::R8G8B8A8_SRGB,
        TextureFormat::B8G8R8A8_UNORM,
        TextureFormat::B8G8R8A8_SRGB,
        TextureFormat::A2B10G10R10_UNORM_PACK32,
        TextureFormat::R16G16B16A16_SFLOAT,
        TextureFormat::R32_UINT,
        TextureFormat::R32_SFLOAT,
        TextureFormat::R32G32_SFLOAT,
        TextureFormat::R32G32B32A32_SFLOAT,
        TextureFormat::D16_UNORM,
        TextureFormat::X8_D24_UNORM_PACK32,
        TextureFormat::D32_SFLOAT,
        TextureFormat::S8_UINT,
        TextureFormat::D16_UNORM_S8_UINT,
        TextureFormat::D24_UNORM_S8_UINT,
        TextureFormat::D32_SFLOAT_S8_UINT,
    ];

    pub const fn info(self) -> FormatInfo {
        FORMAT_TABLE[self as usize]
    }

    pub const fn class(self) -> FormatClass {
        self.info().class
    }

    /// Format carries a depth component (depth or depth-stencil)
    pub const fn is_depth(self) -> bool {
        matches!(self.class(), FormatClass::Depth | FormatClass::DepthStencil)
    }

    /// Format carries a stencil component (stencil or depth-stencil)
    pub const fn is_stencil(self) -> bool {
        matches!(self.class(), FormatClass::Stencil | FormatClass::DepthStencil)
    }

    pub const fn is_color(self) -> bool {
        matches!(self.class(), FormatClass::Color)
    }

    /// Aspect of the default view: depth wins over stencil, color otherwise
    pub const fn view_aspect(self) -> ViewAspect {
        if self.is_depth() {
            ViewAspect::Depth
        } else if self.is_stencil() {
            ViewAspect::Stencil
        } else {
            ViewAspect::Color
        }
    }
}

/// Number of mip levels generated for a `width` x `height` texture
///
/// floor(log2(max(width, height))), never less than one level.
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    let largest = width.max(height);
    if largest == 0 {
        return 1;
    }
    (31 - largest.leading_zeros()).max(1)
}

#[cfg(test)]
#[path = "format_tests.rs"]
mod tests;
