use bitflags::bitflags;
use byteorder::{LittleEndian, ReadBytesExt};
use glam::Vec3;
use std::io::{Read, Seek, SeekFrom};

use crate::animation::sequence::SequenceRecord;
use crate::buffer::{TableArray, read_vec3};
use crate::chunks::color::ColorRecord;
use crate::chunks::light::LightRecord;
use crate::chunks::material::RenderFlagRecord;
use crate::chunks::texture::TextureRecord;
use crate::chunks::texture_animation::TextureAnimationRecord;
use crate::chunks::transparency::TransparencyRecord;
use crate::chunks::vertex::ModelVertex;
use crate::coordinate::fix_coord_system;
use crate::error::{M2Error, Result};
use crate::particles::definition::ParticleEmitterRecord;
use crate::ribbon::RibbonEmitterRecord;
use crate::skeleton::bone::BoneRecord;

/// Magic signature for M2 files ("MD20")
pub const M2_MAGIC: [u8; 4] = *b"MD20";

/// The only header layout this runtime decodes
pub const SUPPORTED_VERSION: u32 = 264;

/// Size of the fixed header record
pub const HEADER_SIZE: usize = 0x130;

bitflags! {
    /// Model flags as defined in the M2 format
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ModelFlags: u32 {
        /// Tilt on X axis
        const TILT_X = 0x0001;
        /// Tilt on Y axis
        const TILT_Y = 0x0002;
        /// A blend-mode override table follows the header
        const BLEND_MODE_OVERRIDES = 0x0008;
        /// Load phys data
        const LOAD_PHYS_DATA = 0x0020;
    }
}

/// Fixed header of a version 264 model
#[derive(Debug, Clone, Default)]
pub struct ModelHeader {
    pub version: u32,
    pub name: TableArray<u8>,
    pub flags: ModelFlags,
    pub global_sequences: TableArray<u32>,
    pub sequences: TableArray<SequenceRecord>,
    pub sequence_lookup: TableArray<i16>,
    pub bones: TableArray<BoneRecord>,
    pub key_bone_lookup: TableArray<i16>,
    pub vertices: TableArray<ModelVertex>,
    /// Number of skin profiles (LODs)
    pub num_skin_profiles: u32,
    pub colors: TableArray<ColorRecord>,
    pub textures: TableArray<TextureRecord>,
    pub transparency: TableArray<TransparencyRecord>,
    pub texture_animations: TableArray<TextureAnimationRecord>,
    pub replaceable_texture_lookup: TableArray<i16>,
    pub render_flags: TableArray<RenderFlagRecord>,
    pub bone_lookup: TableArray<i16>,
    pub texture_lookup: TableArray<i16>,
    pub texture_unit_lookup: TableArray<i16>,
    pub transparency_lookup: TableArray<i16>,
    pub texture_animation_lookup: TableArray<i16>,
    /// Bounding box, already moved into runtime space
    pub bounding_box: [Vec3; 2],
    pub bounding_sphere_radius: f32,
    pub collision_box: [Vec3; 2],
    pub collision_sphere_radius: f32,
    pub collision_indices: TableArray<u16>,
    pub collision_vertices: TableArray<Vec3>,
    pub collision_normals: TableArray<Vec3>,
    pub attachments: TableArray<u8>,
    pub attachment_lookup: TableArray<i16>,
    pub events: TableArray<u8>,
    pub lights: TableArray<LightRecord>,
    pub cameras: TableArray<u8>,
    pub camera_lookup: TableArray<i16>,
    pub ribbon_emitters: TableArray<RibbonEmitterRecord>,
    pub particle_emitters: TableArray<ParticleEmitterRecord>,
    /// Present only when [`ModelFlags::BLEND_MODE_OVERRIDES`] is set
    pub blend_mode_overrides: Option<TableArray<u16>>,
}

impl ModelHeader {
    /// Parse the header from the start of a reader
    pub fn parse<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        reader.seek(SeekFrom::Start(0))?;

        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;

        if magic != M2_MAGIC {
            return Err(M2Error::InvalidMagic {
                expected: String::from_utf8_lossy(&M2_MAGIC).to_string(),
                actual: String::from_utf8_lossy(&magic).to_string(),
            });
        }

        let version = reader.read_u32::<LittleEndian>()?;
        if version != SUPPORTED_VERSION {
            return Err(M2Error::UnsupportedVersion(version));
        }

        let name = TableArray::parse(reader)?;
        let flags = ModelFlags::from_bits_retain(reader.read_u32::<LittleEndian>()?);
        let global_sequences = TableArray::parse(reader)?;
        let sequences = TableArray::parse(reader)?;
        let sequence_lookup = TableArray::parse(reader)?;
        let bones = TableArray::parse(reader)?;
        let key_bone_lookup = TableArray::parse(reader)?;
        let vertices = TableArray::parse(reader)?;
        let num_skin_profiles = reader.read_u32::<LittleEndian>()?;
        let colors = TableArray::parse(reader)?;
        let textures = TableArray::parse(reader)?;
        let transparency = TableArray::parse(reader)?;
        let texture_animations = TableArray::parse(reader)?;
        let replaceable_texture_lookup = TableArray::parse(reader)?;
        let render_flags = TableArray::parse(reader)?;
        let bone_lookup = TableArray::parse(reader)?;
        let texture_lookup = TableArray::parse(reader)?;
        let texture_unit_lookup = TableArray::parse(reader)?;
        let transparency_lookup = TableArray::parse(reader)?;
        let texture_animation_lookup = TableArray::parse(reader)?;

        let bounding_box = read_box(reader)?;
        let bounding_sphere_radius = reader.read_f32::<LittleEndian>()?;
        let collision_box = read_box(reader)?;
        let collision_sphere_radius = reader.read_f32::<LittleEndian>()?;

        let collision_indices = TableArray::parse(reader)?;
        let collision_vertices = TableArray::parse(reader)?;
        let collision_normals = TableArray::parse(reader)?;
        let attachments = TableArray::parse(reader)?;
        let attachment_lookup = TableArray::parse(reader)?;
        let events = TableArray::parse(reader)?;
        let lights = TableArray::parse(reader)?;
        let cameras = TableArray::parse(reader)?;
        let camera_lookup = TableArray::parse(reader)?;
        let ribbon_emitters = TableArray::parse(reader)?;
        let particle_emitters = TableArray::parse(reader)?;

        let blend_mode_overrides = if flags.contains(ModelFlags::BLEND_MODE_OVERRIDES) {
            Some(TableArray::parse(reader)?)
        } else {
            None
        };

        Ok(Self {
            version,
            name,
            flags,
            global_sequences,
            sequences,
            sequence_lookup,
            bones,
            key_bone_lookup,
            vertices,
            num_skin_profiles,
            colors,
            textures,
            transparency,
            texture_animations,
            replaceable_texture_lookup,
            render_flags,
            bone_lookup,
            texture_lookup,
            texture_unit_lookup,
            transparency_lookup,
            texture_animation_lookup,
            bounding_box,
            bounding_sphere_radius,
            collision_box,
            collision_sphere_radius,
            collision_indices,
            collision_vertices,
            collision_normals,
            attachments,
            attachment_lookup,
            events,
            lights,
            cameras,
            camera_lookup,
            ribbon_emitters,
            particle_emitters,
            blend_mode_overrides,
        })
    }

    /// Check if the header declares a blend-mode override table
    pub fn has_blend_mode_overrides(&self) -> bool {
        self.blend_mode_overrides.is_some()
    }
}

/// Read a min/max box and move it into runtime space, keeping min <= max
fn read_box<R: Read>(reader: &mut R) -> Result<[Vec3; 2]> {
    let a = fix_coord_system(read_vec3(reader)?);
    let b = fix_coord_system(read_vec3(reader)?);
    Ok([a.min(b), a.max(b)])
}
