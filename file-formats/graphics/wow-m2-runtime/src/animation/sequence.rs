//! Animation sequences and their companion `.anim` files

use bitflags::bitflags;
use byteorder::{LittleEndian, ReadBytesExt};
use glam::Vec3;
use std::io::Read;

use crate::buffer::{Record, read_vec3};
use crate::error::Result;
use crate::provider::strip_extension;

bitflags! {
    /// Sequence flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SequenceFlags: u32 {
        /// Blended animation
        const BLENDED = 0x0004;
        /// Keyframe data lives in the model file, not in a `.anim` file
        const EMBEDDED_DATA = 0x0020;
        /// Alias of the next sequence
        const ALIAS = 0x0040;
    }
}

/// Sequence record as stored in the model (64 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SequenceRecord {
    pub id: u16,
    pub sub_id: u16,
    /// Length in milliseconds
    pub length: u32,
    pub move_speed: f32,
    pub flags: SequenceFlags,
    pub probability: i16,
    pub replay_min: u32,
    pub replay_max: u32,
    pub blend_time: u32,
    pub bounds: [Vec3; 2],
    pub radius: f32,
    pub next_animation: i16,
    pub alias_next: u16,
}

impl Record for SequenceRecord {
    const SIZE: usize = 64;

    fn parse<R: Read>(reader: &mut R) -> Result<Self> {
        let id = reader.read_u16::<LittleEndian>()?;
        let sub_id = reader.read_u16::<LittleEndian>()?;
        let length = reader.read_u32::<LittleEndian>()?;
        let move_speed = reader.read_f32::<LittleEndian>()?;
        let flags = SequenceFlags::from_bits_retain(reader.read_u32::<LittleEndian>()?);
        let probability = reader.read_i16::<LittleEndian>()?;
        let _padding = reader.read_u16::<LittleEndian>()?;
        let replay_min = reader.read_u32::<LittleEndian>()?;
        let replay_max = reader.read_u32::<LittleEndian>()?;
        let blend_time = reader.read_u32::<LittleEndian>()?;
        let bounds = [read_vec3(reader)?, read_vec3(reader)?];
        let radius = reader.read_f32::<LittleEndian>()?;
        let next_animation = reader.read_i16::<LittleEndian>()?;
        let alias_next = reader.read_u16::<LittleEndian>()?;

        Ok(Self {
            id,
            sub_id,
            length,
            move_speed,
            flags,
            probability,
            replay_min,
            replay_max,
            blend_time,
            bounds,
            radius,
            next_animation,
            alias_next,
        })
    }
}

/// A playable animation sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimationSequence {
    /// Animation id (0 = Stand, 4 = Walk, ...)
    pub id: u16,
    /// Variation of the animation id
    pub sub_id: u16,
    /// Position in the model's sequence table, used to index track data
    pub index: usize,
    /// Length in milliseconds, never 0
    pub length: u32,
    pub flags: SequenceFlags,
}

impl AnimationSequence {
    /// Build from a raw record, coercing a zero length to 1
    pub fn from_record(index: usize, record: &SequenceRecord) -> Self {
        Self {
            id: record.id,
            sub_id: record.sub_id,
            index,
            length: record.length.max(1),
            flags: record.flags,
        }
    }

    /// Check if keyframes for this sequence live in a `.anim` file
    pub fn needs_external_file(&self) -> bool {
        !self.flags.contains(SequenceFlags::EMBEDDED_DATA)
    }

    /// Path of the companion `.anim` file for a model at `model_path`
    ///
    /// `Creature\Bear\Bear.m2` with id 4, sub id 1 gives `Creature\Bear\Bear0004-01.anim`.
    pub fn external_file_name(&self, model_path: &str) -> String {
        format!(
            "{}{:04}-{:02}.anim",
            strip_extension(model_path),
            self.id,
            self.sub_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::ByteBufferView;
    use test_case::test_case;

    #[test]
    fn test_zero_length_coerced() {
        let record = SequenceRecord {
            id: 4,
            length: 0,
            ..SequenceRecord::default()
        };
        let seq = AnimationSequence::from_record(3, &record);
        assert_eq!(seq.length, 1);
        assert_eq!(seq.index, 3);
    }

    #[test_case("Creature\\Bear\\Bear.m2", 4, 1, "Creature\\Bear\\Bear0004-01.anim" ; "windows path")]
    #[test_case("world/foo.mdx", 0, 0, "world/foo0000-00.anim" ; "mdx extension")]
    #[test_case("noext", 12, 3, "noext0012-03.anim" ; "no extension")]
    #[test_case("dir.v2/model", 1, 0, "dir.v2/model0001-00.anim" ; "dot in directory")]
    fn test_external_file_name(path: &str, id: u16, sub_id: u16, expected: &str) {
        let seq = AnimationSequence {
            id,
            sub_id,
            index: 0,
            length: 1,
            flags: SequenceFlags::empty(),
        };
        assert_eq!(seq.external_file_name(path), expected);
    }

    #[test]
    fn test_embedded_flag() {
        let mut seq = AnimationSequence::from_record(0, &SequenceRecord::default());
        assert!(seq.needs_external_file());
        seq.flags = SequenceFlags::EMBEDDED_DATA;
        assert!(!seq.needs_external_file());
    }

    #[test]
    fn test_parse_record() {
        let mut data = Vec::new();
        data.extend_from_slice(&5u16.to_le_bytes());
        data.extend_from_slice(&2u16.to_le_bytes());
        data.extend_from_slice(&1500u32.to_le_bytes());
        data.resize(64, 0);
        let record = SequenceRecord::parse(&mut ByteBufferView::new(&data)).unwrap();
        assert_eq!(record.id, 5);
        assert_eq!(record.sub_id, 2);
        assert_eq!(record.length, 1500);
    }
}
