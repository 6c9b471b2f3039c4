use glam::{Mat4, Quat, Vec3};
use std::io::Read;

use crate::animation::{AnimatedTrack, AnimationBlock, TrackContext};
use crate::buffer::Record;
use crate::error::Result;

/// Texture-coordinate animation as stored in the model (60 bytes)
#[derive(Debug, Clone, Copy, Default)]
pub struct TextureAnimationRecord {
    pub translation: AnimationBlock<Vec3>,
    pub rotation: AnimationBlock<Quat>,
    pub scale: AnimationBlock<Vec3>,
}

impl Record for TextureAnimationRecord {
    const SIZE: usize = 60;

    fn parse<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(Self {
            translation: AnimationBlock::parse(reader)?,
            rotation: AnimationBlock::parse(reader)?,
            scale: AnimationBlock::parse(reader)?,
        })
    }
}

/// Animated UV transform
///
/// Values stay in texture space, no coordinate correction applies.
#[derive(Debug, Clone, Default)]
pub struct TextureAnimation {
    pub translation: AnimatedTrack<Vec3>,
    pub rotation: AnimatedTrack<Quat>,
    pub scale: AnimatedTrack<Vec3>,
}

impl TextureAnimation {
    pub fn decode(record: &TextureAnimationRecord, ctx: &TrackContext<'_>) -> Result<Self> {
        Ok(Self {
            translation: AnimatedTrack::decode(&record.translation, ctx, |v: Vec3| v)?,
            rotation: AnimatedTrack::decode(&record.rotation, ctx, |q: Quat| q)?,
            scale: AnimatedTrack::decode(&record.scale, ctx, |v: Vec3| v)?,
        })
    }

    /// UV matrix `T * R * S` for the given animation and time
    pub fn matrix(&self, anim: usize, time: u32, global_time: u32) -> Mat4 {
        let mut m = Mat4::IDENTITY;
        if self.translation.uses(anim) {
            m *= Mat4::from_translation(self.translation.get_value(anim, time, global_time));
        }
        if self.rotation.uses(anim) {
            m *= Mat4::from_quat(self.rotation.get_value(anim, time, global_time));
        }
        if self.scale.uses(anim) {
            m *= Mat4::from_scale(self.scale.get_value(anim, time, global_time));
        }
        m
    }
}
