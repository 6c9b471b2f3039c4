use bitflags::bitflags;
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Read;

use crate::buffer::Record;
use crate::error::Result;

bitflags! {
    /// Render flags as defined in the M2 format
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct RenderFlags: u16 {
        /// No lighting
        const UNLIT = 0x01;
        /// No fog
        const UNFOGGED = 0x02;
        /// No backface culling
        const TWO_SIDED = 0x04;
        /// No depth writes
        const NO_ZBUFFER = 0x08;
    }
}

/// Blend mode of a render flag entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub enum BlendMode {
    #[default]
    Opaque,
    AlphaKey,
    Alpha,
    NoAlphaAdd,
    Add,
    Mod,
    Mod2x,
    BlendAdd,
}

impl BlendMode {
    /// Convert from the raw value, unknown values are opaque
    pub fn from_raw(value: u16) -> Self {
        match value {
            1 => Self::AlphaKey,
            2 => Self::Alpha,
            3 => Self::NoAlphaAdd,
            4 => Self::Add,
            5 => Self::Mod,
            6 => Self::Mod2x,
            7 => Self::BlendAdd,
            _ => Self::Opaque,
        }
    }

    /// Raw blend value
    pub fn raw(self) -> u16 {
        self as u16
    }

    /// Anything but opaque counts as alpha blended for shader derivation
    pub fn is_blended(self) -> bool {
        self != Self::Opaque
    }
}

/// Render flag entry as stored in the model (4 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderFlagRecord {
    pub flags: RenderFlags,
    pub blend: BlendMode,
}

impl Record for RenderFlagRecord {
    const SIZE: usize = 4;

    fn parse<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(Self {
            flags: RenderFlags::from_bits_retain(reader.read_u16::<LittleEndian>()?),
            blend: BlendMode::from_raw(reader.read_u16::<LittleEndian>()?),
        })
    }
}
