use glam::Vec3;
use std::io::Read;

use crate::animation::{AnimatedTrack, AnimationBlock, TrackContext};
use crate::buffer::Record;
use crate::coordinate::fixed16_to_float;
use crate::error::Result;

/// Color definition as stored in the model (40 bytes)
#[derive(Debug, Clone, Copy, Default)]
pub struct ColorRecord {
    pub color: AnimationBlock<Vec3>,
    pub opacity: AnimationBlock<i16>,
}

impl Record for ColorRecord {
    const SIZE: usize = 40;

    fn parse<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(Self {
            color: AnimationBlock::parse(reader)?,
            opacity: AnimationBlock::parse(reader)?,
        })
    }
}

/// Animated mesh color and opacity
#[derive(Debug, Clone, Default)]
pub struct ModelColor {
    pub color: AnimatedTrack<Vec3>,
    pub opacity: AnimatedTrack<f32>,
}

impl ModelColor {
    pub fn decode(record: &ColorRecord, ctx: &TrackContext<'_>) -> Result<Self> {
        Ok(Self {
            color: AnimatedTrack::decode(&record.color, ctx, |c: Vec3| c)?,
            opacity: AnimatedTrack::decode(&record.opacity, ctx, fixed16_to_float)?,
        })
    }

    /// Check if either curve is animated
    pub fn is_animated(&self) -> bool {
        self.color.is_animated() || self.opacity.is_animated()
    }
}
