use bitflags::bitflags;
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Read;

use crate::buffer::{ByteBufferView, Record};
use crate::error::Result;

/// Filename bound to non-inline (replaceable) textures
pub const SPECIAL_TEXTURE_PLACEHOLDER: &str = "tileset/generic/black.blp";

/// Fallback filename for the weapon reflection slot (type 3)
pub const WEAPON_REFLECT_TEXTURE: &str = "Item\\ObjectComponents\\Weapon\\ArmorReflect4.BLP";

/// Texture type as stored in the model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureType {
    /// Filename stored inline in the model
    Inline,
    /// Character skin
    Skin,
    /// Object skin
    ObjectSkin,
    /// Weapon blade / environment reflection
    WeaponBlade,
    /// Any other replaceable slot
    Replaceable(u32),
}

impl TextureType {
    /// Convert from the raw value
    pub fn from_raw(value: u32) -> Self {
        match value {
            0 => Self::Inline,
            1 => Self::Skin,
            2 => Self::ObjectSkin,
            3 => Self::WeaponBlade,
            other => Self::Replaceable(other),
        }
    }

    /// Raw type value
    pub fn raw(self) -> u32 {
        match self {
            Self::Inline => 0,
            Self::Skin => 1,
            Self::ObjectSkin => 2,
            Self::WeaponBlade => 3,
            Self::Replaceable(v) => v,
        }
    }
}

bitflags! {
    /// Texture flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TextureFlags: u32 {
        /// Wrap horizontally
        const WRAP_X = 0x01;
        /// Wrap vertically
        const WRAP_Y = 0x02;
    }
}

/// Texture definition as stored in the model (16 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextureRecord {
    pub texture_type: u32,
    pub flags: TextureFlags,
    pub name_len: u32,
    pub name_offset: u32,
}

impl Record for TextureRecord {
    const SIZE: usize = 16;

    fn parse<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(Self {
            texture_type: reader.read_u32::<LittleEndian>()?,
            flags: TextureFlags::from_bits_retain(reader.read_u32::<LittleEndian>()?),
            name_len: reader.read_u32::<LittleEndian>()?,
            name_offset: reader.read_u32::<LittleEndian>()?,
        })
    }
}

/// A decoded texture definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelTexture {
    pub texture_type: TextureType,
    pub flags: TextureFlags,
    /// Filename to request from the texture provider
    pub filename: String,
}

impl ModelTexture {
    /// Resolve the filename of a texture definition
    ///
    /// Inline names may or may not include their terminator in `name_len`.
    pub fn decode(record: &TextureRecord, buffer: &ByteBufferView<'_>) -> Self {
        let texture_type = TextureType::from_raw(record.texture_type);
        let filename = match texture_type {
            TextureType::Inline => read_inline_name(record, buffer),
            TextureType::WeaponBlade => WEAPON_REFLECT_TEXTURE.to_string(),
            _ => SPECIAL_TEXTURE_PLACEHOLDER.to_string(),
        };

        Self {
            texture_type,
            flags: record.flags,
            filename,
        }
    }

    /// Check if the texture is bound through a replaceable slot
    pub fn is_special(&self) -> bool {
        self.texture_type != TextureType::Inline
    }
}

fn read_inline_name(record: &TextureRecord, buffer: &ByteBufferView<'_>) -> String {
    let Some(bytes) = buffer.slice(record.name_offset as usize, record.name_len as usize) else {
        log::warn!(
            "Texture name at {} ({} bytes) is outside the model",
            record.name_offset,
            record.name_len
        );
        return String::new();
    };
    let end = memchr::memchr(0, bytes).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
