//! Skin profile: submeshes, texture units and index buffers of one level of detail

use byteorder::{LittleEndian, ReadBytesExt};
use glam::Vec3;
use std::io::{Read, Seek};

use crate::buffer::{ByteBufferView, Record, TableArray, read_table, read_vec3};
use crate::coordinate::fix_coord_system;
use crate::error::{M2Error, Result};
use crate::provider::strip_extension;

/// Magic signature for skin files ("SKIN")
pub const SKIN_MAGIC: [u8; 4] = *b"SKIN";

/// Skin header (48 bytes)
#[derive(Debug, Clone, Default)]
pub struct SkinHeader {
    /// Indices into the model's vertex table
    pub vertex_lookup: TableArray<u16>,
    /// Triangles, as indices into `vertex_lookup`
    pub triangles: TableArray<u16>,
    /// Per-vertex bone lookups (4 bytes per vertex)
    pub properties: TableArray<[u8; 4]>,
    pub submeshes: TableArray<SkinSubmesh>,
    pub texture_units: TableArray<TextureUnit>,
    pub bone_count_max: u32,
}

impl SkinHeader {
    pub fn parse<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;

        if magic != SKIN_MAGIC {
            return Err(M2Error::InvalidMagic {
                expected: String::from_utf8_lossy(&SKIN_MAGIC).to_string(),
                actual: String::from_utf8_lossy(&magic).to_string(),
            });
        }

        Ok(Self {
            vertex_lookup: TableArray::parse(reader)?,
            triangles: TableArray::parse(reader)?,
            properties: TableArray::parse(reader)?,
            submeshes: TableArray::parse(reader)?,
            texture_units: TableArray::parse(reader)?,
            bone_count_max: reader.read_u32::<LittleEndian>()?,
        })
    }
}

/// Submesh (geoset) record (48 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SkinSubmesh {
    pub id: u16,
    /// High 16 bits of the index start
    pub level: u16,
    pub vertex_start: u16,
    pub vertex_count: u16,
    pub index_start: u16,
    pub index_count: u16,
    pub bone_count: u16,
    pub bone_combo_index: u16,
    pub bone_influences: u16,
    pub center_bone_index: u16,
    pub center_position: Vec3,
    pub sort_center_position: Vec3,
    pub sort_radius: f32,
}

impl Record for SkinSubmesh {
    const SIZE: usize = 48;

    fn parse<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(Self {
            id: reader.read_u16::<LittleEndian>()?,
            level: reader.read_u16::<LittleEndian>()?,
            vertex_start: reader.read_u16::<LittleEndian>()?,
            vertex_count: reader.read_u16::<LittleEndian>()?,
            index_start: reader.read_u16::<LittleEndian>()?,
            index_count: reader.read_u16::<LittleEndian>()?,
            bone_count: reader.read_u16::<LittleEndian>()?,
            bone_combo_index: reader.read_u16::<LittleEndian>()?,
            bone_influences: reader.read_u16::<LittleEndian>()?,
            center_bone_index: reader.read_u16::<LittleEndian>()?,
            center_position: fix_coord_system(read_vec3(reader)?),
            sort_center_position: fix_coord_system(read_vec3(reader)?),
            sort_radius: reader.read_f32::<LittleEndian>()?,
        })
    }
}

impl SkinSubmesh {
    /// First index of this submesh in the model index buffer
    pub fn first_index(&self) -> u32 {
        u32::from(self.index_start) + (u32::from(self.level) << 16)
    }
}

/// Texture unit (batch) record (24 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextureUnit {
    pub flags: u8,
    pub priority_plane: i8,
    pub shader_id: u16,
    pub submesh: u16,
    pub geoset_index: u16,
    /// Index into the color table, -1 for none
    pub color_index: i16,
    pub renderflag_index: u16,
    pub material_layer: u16,
    pub texture_count: u16,
    pub texture_combo_index: u16,
    pub texture_coord_combo_index: u16,
    pub transparency_combo_index: u16,
    pub animation_combo_index: u16,
}

impl Record for TextureUnit {
    const SIZE: usize = 24;

    fn parse<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(Self {
            flags: reader.read_u8()?,
            priority_plane: reader.read_i8()?,
            shader_id: reader.read_u16::<LittleEndian>()?,
            submesh: reader.read_u16::<LittleEndian>()?,
            geoset_index: reader.read_u16::<LittleEndian>()?,
            color_index: reader.read_i16::<LittleEndian>()?,
            renderflag_index: reader.read_u16::<LittleEndian>()?,
            material_layer: reader.read_u16::<LittleEndian>()?,
            texture_count: reader.read_u16::<LittleEndian>()?,
            texture_combo_index: reader.read_u16::<LittleEndian>()?,
            texture_coord_combo_index: reader.read_u16::<LittleEndian>()?,
            transparency_combo_index: reader.read_u16::<LittleEndian>()?,
            animation_combo_index: reader.read_u16::<LittleEndian>()?,
        })
    }
}

/// Decoded skin profile
#[derive(Debug, Clone, Default)]
pub struct Skin {
    /// Triangle list resolved to model vertex indices
    pub indices: Vec<u16>,
    pub submeshes: Vec<SkinSubmesh>,
    pub texture_units: Vec<TextureUnit>,
    pub bone_count_max: u32,
}

impl Skin {
    /// Decode a skin buffer
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut view = ByteBufferView::new(data);
        let header = SkinHeader::parse(&mut view)?;

        let vertex_lookup = read_table(&view, &header.vertex_lookup, "skin vertex lookup")?;
        let triangles = read_table(&view, &header.triangles, "skin triangles")?;
        let submeshes = read_table(&view, &header.submeshes, "skin submeshes")?;
        let texture_units = read_table(&view, &header.texture_units, "skin texture units")?;

        let mut indices = Vec::with_capacity(triangles.len());
        for &t in &triangles {
            match vertex_lookup.get(usize::from(t)) {
                Some(&v) => indices.push(v),
                None => {
                    return Err(M2Error::ReferenceError(format!(
                        "skin triangle index {} outside vertex lookup of {}",
                        t,
                        vertex_lookup.len()
                    )));
                }
            }
        }

        Ok(Self {
            indices,
            submeshes,
            texture_units,
            bone_count_max: header.bone_count_max,
        })
    }

    /// File name of the first skin profile for a model at `model_path`
    pub fn file_name(model_path: &str) -> String {
        format!("{}00.skin", strip_extension(model_path))
    }
}
