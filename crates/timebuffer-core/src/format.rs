//! Pixel format tags

use std::fmt;
use std::str::FromStr;

/// Channel layout of a payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum ChannelLayout {
    Alpha = 0,
    Rgb = 1,
    #[default]
    Rgba = 2,
}

impl ChannelLayout {
    /// Number of components per pixel
    pub const fn components(&self) -> usize {
        match self {
            ChannelLayout::Alpha => 1,
            ChannelLayout::Rgb => 3,
            ChannelLayout::Rgba => 4,
        }
    }

    /// Convert from u8
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(ChannelLayout::Alpha),
            1 => Some(ChannelLayout::Rgb),
            2 => Some(ChannelLayout::Rgba),
            _ => None,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            ChannelLayout::Alpha => "alpha",
            ChannelLayout::Rgb => "rgb",
            ChannelLayout::Rgba => "rgba",
        }
    }
}

/// Numeric precision of each component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Precision {
    #[default]
    UInt8 = 0,
    UInt16 = 1,
    Half = 2,
    Float = 3,
}

impl Precision {
    /// Size in bytes
    pub const fn size(&self) -> usize {
        match self {
            Precision::UInt8 => 1,
            Precision::UInt16 | Precision::Half => 2,
            Precision::Float => 4,
        }
    }

    /// Convert from u8
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Precision::UInt8),
            1 => Some(Precision::UInt16),
            2 => Some(Precision::Half),
            3 => Some(Precision::Float),
            _ => None,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Precision::UInt8 => "u8",
            Precision::UInt16 => "u16",
            Precision::Half => "f16",
            Precision::Float => "f32",
        }
    }
}

impl fmt::Display for ChannelLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChannelLayout {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "alpha" => Ok(ChannelLayout::Alpha),
            "rgb" => Ok(ChannelLayout::Rgb),
            "rgba" => Ok(ChannelLayout::Rgba),
            other => Err(crate::Error::Config(format!("unknown channel layout '{}'", other))),
        }
    }
}

impl FromStr for Precision {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "u8" => Ok(Precision::UInt8),
            "u16" => Ok(Precision::UInt16),
            "f16" => Ok(Precision::Half),
            "f32" => Ok(Precision::Float),
            other => Err(crate::Error::Config(format!("unknown precision '{}'", other))),
        }
    }
}
