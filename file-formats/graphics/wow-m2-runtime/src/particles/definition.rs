//! Particle emitter definition as stored in the model

use bitflags::bitflags;
use byteorder::{LittleEndian, ReadBytesExt};
use glam::{Vec2, Vec3};
use std::io::Read;

use crate::animation::{AnimationBlock, FakeAnimationBlock};
use crate::buffer::{Record, TableArray, read_vec2, read_vec3};
use crate::error::Result;

bitflags! {
    /// Particle emitter flags
    ///
    /// A handful of exact flag values select legacy spawn formulas, so the raw
    /// word is kept alongside these bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ParticleFlags: u32 {
        /// Particles are affected by lighting
        const LIT = 0x1;
        /// Particles move with the emitter after spawning
        const FOLLOW_EMITTER = 0x10;
        /// Sphere emitters shoot along the bone's up axis
        const SPHERE_AS_SOURCE = 0x100;
        /// Particles are not billboarded
        const NO_BILLBOARD = 0x1000;
    }
}

/// Emitter shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub enum EmitterShape {
    Plane,
    Sphere,
}

impl EmitterShape {
    /// Convert from the raw emitter type, `None` for unsupported shapes
    pub fn from_raw(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Plane),
            2 => Some(Self::Sphere),
            _ => None,
        }
    }
}

/// Particle emitter record (476 bytes)
#[derive(Debug, Clone, Copy, Default)]
pub struct ParticleEmitterRecord {
    pub id: i32,
    pub flags: u32,
    pub position: Vec3,
    pub bone: u16,
    pub texture: u16,
    pub geometry_model: TableArray<u8>,
    pub recursion_model: TableArray<u8>,
    pub blend: u8,
    pub emitter_type: u8,
    pub color_index: u16,
    pub particle_type: u8,
    pub head_or_tail: u8,
    pub tile_rotation: i16,
    pub rows: u16,
    pub cols: u16,
    pub speed: AnimationBlock<f32>,
    pub variation: AnimationBlock<f32>,
    /// Spread around the emitter's vertical axis
    pub vertical_range: AnimationBlock<f32>,
    /// Spread around the emitter's horizontal axis
    pub horizontal_range: AnimationBlock<f32>,
    pub gravity: AnimationBlock<f32>,
    pub lifespan: AnimationBlock<f32>,
    pub lifespan_vary: f32,
    pub rate: AnimationBlock<f32>,
    pub rate_vary: f32,
    pub area_length: AnimationBlock<f32>,
    pub area_width: AnimationBlock<f32>,
    /// Deceleration along the spawn direction
    pub z_source: AnimationBlock<f32>,
    pub color: FakeAnimationBlock<Vec3>,
    pub alpha: FakeAnimationBlock<i16>,
    pub scale: FakeAnimationBlock<Vec2>,
    pub scale_vary: Vec2,
    pub head_cell: FakeAnimationBlock<u16>,
    pub tail_cell: FakeAnimationBlock<u16>,
    pub tail_length: f32,
    pub twinkle_speed: f32,
    pub twinkle_percent: f32,
    pub twinkle_scale: [f32; 2],
    pub burst_multiplier: f32,
    pub drag: f32,
    pub base_spin: f32,
    pub base_spin_vary: f32,
    pub spin: f32,
    pub spin_vary: f32,
    pub tumble: [Vec3; 2],
    pub wind: Vec3,
    pub wind_time: f32,
    pub follow: [f32; 4],
    pub spline_points: TableArray<Vec3>,
    pub enabled: AnimationBlock<u8>,
}

impl Record for ParticleEmitterRecord {
    const SIZE: usize = 476;

    fn parse<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(Self {
            id: reader.read_i32::<LittleEndian>()?,
            flags: reader.read_u32::<LittleEndian>()?,
            position: read_vec3(reader)?,
            bone: reader.read_u16::<LittleEndian>()?,
            texture: reader.read_u16::<LittleEndian>()?,
            geometry_model: TableArray::parse(reader)?,
            recursion_model: TableArray::parse(reader)?,
            blend: reader.read_u8()?,
            emitter_type: reader.read_u8()?,
            color_index: reader.read_u16::<LittleEndian>()?,
            particle_type: reader.read_u8()?,
            head_or_tail: reader.read_u8()?,
            tile_rotation: reader.read_i16::<LittleEndian>()?,
            rows: reader.read_u16::<LittleEndian>()?,
            cols: reader.read_u16::<LittleEndian>()?,
            speed: AnimationBlock::parse(reader)?,
            variation: AnimationBlock::parse(reader)?,
            vertical_range: AnimationBlock::parse(reader)?,
            horizontal_range: AnimationBlock::parse(reader)?,
            gravity: AnimationBlock::parse(reader)?,
            lifespan: AnimationBlock::parse(reader)?,
            lifespan_vary: reader.read_f32::<LittleEndian>()?,
            rate: AnimationBlock::parse(reader)?,
            rate_vary: reader.read_f32::<LittleEndian>()?,
            area_length: AnimationBlock::parse(reader)?,
            area_width: AnimationBlock::parse(reader)?,
            z_source: AnimationBlock::parse(reader)?,
            color: FakeAnimationBlock::parse(reader)?,
            alpha: FakeAnimationBlock::parse(reader)?,
            scale: FakeAnimationBlock::parse(reader)?,
            scale_vary: read_vec2(reader)?,
            head_cell: FakeAnimationBlock::parse(reader)?,
            tail_cell: FakeAnimationBlock::parse(reader)?,
            tail_length: reader.read_f32::<LittleEndian>()?,
            twinkle_speed: reader.read_f32::<LittleEndian>()?,
            twinkle_percent: reader.read_f32::<LittleEndian>()?,
            twinkle_scale: [
                reader.read_f32::<LittleEndian>()?,
                reader.read_f32::<LittleEndian>()?,
            ],
            burst_multiplier: reader.read_f32::<LittleEndian>()?,
            drag: reader.read_f32::<LittleEndian>()?,
            base_spin: reader.read_f32::<LittleEndian>()?,
            base_spin_vary: reader.read_f32::<LittleEndian>()?,
            spin: reader.read_f32::<LittleEndian>()?,
            spin_vary: reader.read_f32::<LittleEndian>()?,
            tumble: [read_vec3(reader)?, read_vec3(reader)?],
            wind: read_vec3(reader)?,
            wind_time: reader.read_f32::<LittleEndian>()?,
            follow: [
                reader.read_f32::<LittleEndian>()?,
                reader.read_f32::<LittleEndian>()?,
                reader.read_f32::<LittleEndian>()?,
                reader.read_f32::<LittleEndian>()?,
            ],
            spline_points: TableArray::parse(reader)?,
            enabled: AnimationBlock::parse(reader)?,
        })
    }
}

impl ParticleEmitterRecord {
    /// The three size multipliers applied to the scale keys
    pub fn size_scales(&self) -> [f32; 3] {
        [self.twinkle_scale[0], self.twinkle_scale[1], self.burst_multiplier]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::ByteBufferView;

    #[test]
    fn test_record_layout() {
        let mut data = vec![0u8; ParticleEmitterRecord::SIZE];
        data[4..8].copy_from_slice(&1041u32.to_le_bytes());
        data[20..22].copy_from_slice(&7u16.to_le_bytes());
        data[41] = 2; // emitter type
        data[48..50].copy_from_slice(&4u16.to_le_bytes());
        data[50..52].copy_from_slice(&2u16.to_le_bytes());
        data[372..376].copy_from_slice(&0.25f32.to_le_bytes());
        // enabled block interpolation, last 20 bytes
        data[456..458].copy_from_slice(&1u16.to_le_bytes());

        let mut view = ByteBufferView::new(&data);
        let record = ParticleEmitterRecord::parse(&mut view).unwrap();
        assert_eq!(view.position(), 476);
        assert_eq!(record.flags, 1041);
        assert_eq!(record.bone, 7);
        assert_eq!(record.emitter_type, 2);
        assert_eq!((record.rows, record.cols), (4, 2));
        assert_eq!(record.drag, 0.25);
        assert_eq!(record.enabled.interpolation, 1);
    }

    #[test]
    fn test_emitter_shape() {
        assert_eq!(EmitterShape::from_raw(1), Some(EmitterShape::Plane));
        assert_eq!(EmitterShape::from_raw(2), Some(EmitterShape::Sphere));
        assert_eq!(EmitterShape::from_raw(3), None);
    }
}
