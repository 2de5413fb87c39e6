/// Sampler descriptor

/// Texel filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Filter {
    Nearest,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MipmapMode {
    Nearest,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressMode {
    Repeat,
    MirroredRepeat,
    ClampToEdge,
    ClampToBorder,
}

/// Comparison operator (depth tests and shadow samplers)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Never,
    Less,
    Equal,
    LessOrEqual,
    Greater,
    NotEqual,
    GreaterOrEqual,
    Always,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SamplerDesc {
    pub min_filter: Filter,
    pub mag_filter: Filter,
    pub address_u: AddressMode,
    pub address_v: AddressMode,
    pub address_w: AddressMode,
    pub max_lod: f32,
    /// Comparison sampler when set
    pub compare: Option<CompareOp>,
    pub name: String,
}

impl Default for SamplerDesc {
    fn default() -> Self {
        Self {
            min_filter: Filter::Linear,
            mag_filter: Filter::Linear,
            address_u: AddressMode::Repeat,
            address_v: AddressMode::Repeat,
            address_w: AddressMode::Repeat,
            max_lod: 0.0,
            compare: None,
            name: String::new(),
        }
    }
}

impl SamplerDesc {
    /// Linear between mips only when there is more than the base level to sample
    pub fn mipmap_mode(&self) -> MipmapMode {
        if self.max_lod > 0.0 {
            MipmapMode::Linear
        } else {
            MipmapMode::Nearest
        }
    }

    /// Compare op handed to the API (NEVER when comparison is disabled)
    pub fn compare_op(&self) -> CompareOp {
        self.compare.unwrap_or(CompareOp::Never)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mipmap_mode_follows_max_lod() {
        let mut desc = SamplerDesc::default();
        assert_eq!(desc.mipmap_mode(), MipmapMode::Nearest);
        desc.max_lod = 9.0;
        assert_eq!(desc.mipmap_mode(), MipmapMode::Linear);
    }

    #[test]
    fn test_compare_disabled_by_default() {
        let mut desc = SamplerDesc::default();
        assert_eq!(desc.compare_op(), CompareOp::Never);
        desc.compare = Some(CompareOp::LessOrEqual);
        assert_eq!(desc.compare_op(), CompareOp::LessOrEqual);
    }
}
