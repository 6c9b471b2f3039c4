use bitflags::bitflags;
use byteorder::{LittleEndian, ReadBytesExt};
use glam::{Mat4, Quat, Vec3};
use std::io::Read;

use crate::animation::{AnimatedTrack, AnimationBlock, TrackContext};
use crate::buffer::{PackedQuat, Record, read_vec3};
use crate::coordinate::{fix_coord_system, fix_coord_system_scale, unpack_quat};
use crate::error::Result;

bitflags! {
    /// Bone flags as defined in the M2 format
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct BoneFlags: u32 {
        /// Spherical billboard
        const SPHERICAL_BILLBOARD = 0x8;
        /// Cylindrical billboard lock X
        const CYLINDRICAL_BILLBOARD_LOCK_X = 0x10;
        /// Cylindrical billboard lock Y
        const CYLINDRICAL_BILLBOARD_LOCK_Y = 0x20;
        /// Cylindrical billboard lock Z
        const CYLINDRICAL_BILLBOARD_LOCK_Z = 0x40;
        /// Transformed
        const TRANSFORMED = 0x200;
        /// Kinematic bone (requires physics)
        const KINEMATIC_BONE = 0x400;
        /// Helper bone
        const HELPER_BONE = 0x1000;
    }
}

impl BoneFlags {
    /// The billboard bit-group (value `0x78`)
    pub const BILLBOARD_GROUP: Self = Self::SPHERICAL_BILLBOARD
        .union(Self::CYLINDRICAL_BILLBOARD_LOCK_X)
        .union(Self::CYLINDRICAL_BILLBOARD_LOCK_Y)
        .union(Self::CYLINDRICAL_BILLBOARD_LOCK_Z);

    /// Any flag that makes the bone build its own local matrix
    pub fn is_transformed(self) -> bool {
        self.intersects(Self::BILLBOARD_GROUP | Self::TRANSFORMED)
    }

    /// Full spherical billboarding
    pub fn is_billboard(self) -> bool {
        self.contains(Self::SPHERICAL_BILLBOARD)
    }
}

/// Bone record as stored in the model (88 bytes)
#[derive(Debug, Clone, Copy, Default)]
pub struct BoneRecord {
    pub key_bone_id: i32,
    pub flags: BoneFlags,
    pub parent: i16,
    pub submesh_id: u16,
    pub name_crc: u32,
    pub translation: AnimationBlock<Vec3>,
    pub rotation: AnimationBlock<PackedQuat>,
    pub scale: AnimationBlock<Vec3>,
    pub pivot: Vec3,
}

impl Record for BoneRecord {
    const SIZE: usize = 88;

    fn parse<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(Self {
            key_bone_id: reader.read_i32::<LittleEndian>()?,
            flags: BoneFlags::from_bits_retain(reader.read_u32::<LittleEndian>()?),
            parent: reader.read_i16::<LittleEndian>()?,
            submesh_id: reader.read_u16::<LittleEndian>()?,
            name_crc: reader.read_u32::<LittleEndian>()?,
            translation: AnimationBlock::parse(reader)?,
            rotation: AnimationBlock::parse(reader)?,
            scale: AnimationBlock::parse(reader)?,
            pivot: read_vec3(reader)?,
        })
    }
}

/// A bone with its animated tracks and the matrices of the current pass
#[derive(Debug, Clone)]
pub struct Bone {
    pub key_bone_id: i32,
    pub flags: BoneFlags,
    /// Raw parent index, -1 for roots
    pub parent: i16,
    pub submesh_id: u16,
    /// Pivot point in runtime space
    pub pivot: Vec3,
    pub translation: AnimatedTrack<Vec3>,
    pub rotation: AnimatedTrack<Quat>,
    pub scale: AnimatedTrack<Vec3>,
    /// World transform
    pub mat: Mat4,
    /// Transform applied to normals
    pub mrot: Mat4,
    /// Computed during the current pass
    pub calc: bool,
}

impl Default for Bone {
    fn default() -> Self {
        Self {
            key_bone_id: -1,
            flags: BoneFlags::empty(),
            parent: -1,
            submesh_id: 0,
            pivot: Vec3::ZERO,
            translation: AnimatedTrack::default(),
            rotation: AnimatedTrack::default(),
            scale: AnimatedTrack::default(),
            mat: Mat4::IDENTITY,
            mrot: Mat4::IDENTITY,
            calc: false,
        }
    }
}

impl Bone {
    /// Decode a bone and its tracks
    pub fn decode(record: &BoneRecord, ctx: &TrackContext<'_>) -> Result<Self> {
        Ok(Self {
            key_bone_id: record.key_bone_id,
            flags: record.flags,
            parent: record.parent,
            submesh_id: record.submesh_id,
            pivot: fix_coord_system(record.pivot),
            translation: AnimatedTrack::decode(&record.translation, ctx, fix_coord_system)?,
            rotation: AnimatedTrack::decode(&record.rotation, ctx, unpack_quat)?,
            scale: AnimatedTrack::decode(&record.scale, ctx, fix_coord_system_scale)?,
            ..Self::default()
        })
    }

    /// Parent index, `None` for roots
    pub fn parent_index(&self) -> Option<usize> {
        usize::try_from(self.parent).ok()
    }

    /// Check if any of the bone's tracks is animated
    pub fn has_animated_tracks(&self) -> bool {
        self.translation.is_animated() || self.rotation.is_animated() || self.scale.is_animated()
    }

    /// Pivot transformed by the current world matrix
    pub fn transformed_pivot(&self) -> Vec3 {
        self.mat.transform_point3(self.pivot)
    }
}

/// Rotation matrix of a bone rotation keyframe
///
/// Keyframes are already in runtime space (see [`unpack_quat`]), where the
/// engine's Euler reordering reduces to the quaternion's own rotation.
pub fn rotation_matrix(q: Quat) -> Mat4 {
    Mat4::from_quat(q)
}
