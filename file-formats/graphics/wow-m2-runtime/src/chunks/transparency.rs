use std::io::Read;

use crate::animation::{AnimatedTrack, AnimationBlock, TrackContext};
use crate::buffer::Record;
use crate::coordinate::fixed16_to_float;
use crate::error::Result;

/// Transparency (texture weight) curve as stored in the model (20 bytes)
#[derive(Debug, Clone, Copy, Default)]
pub struct TransparencyRecord {
    pub weight: AnimationBlock<i16>,
}

impl Record for TransparencyRecord {
    const SIZE: usize = 20;

    fn parse<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(Self {
            weight: AnimationBlock::parse(reader)?,
        })
    }
}

/// Animated transparency multiplier
#[derive(Debug, Clone, Default)]
pub struct ModelTransparency {
    pub trans: AnimatedTrack<f32>,
}

impl ModelTransparency {
    pub fn decode(record: &TransparencyRecord, ctx: &TrackContext<'_>) -> Result<Self> {
        Ok(Self {
            trans: AnimatedTrack::decode(&record.weight, ctx, fixed16_to_float)?,
        })
    }
}
