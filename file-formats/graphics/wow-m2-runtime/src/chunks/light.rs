use byteorder::{LittleEndian, ReadBytesExt};
use glam::{Vec3, Vec4};
use std::io::Read;

use crate::animation::{AnimatedTrack, AnimationBlock, TrackContext};
use crate::buffer::{Record, read_vec3};
use crate::coordinate::fix_coord_system;
use crate::error::Result;
use crate::skeleton::Skeleton;

/// Light kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightType {
    Directional,
    Point,
}

/// Light definition as stored in the model (156 bytes)
#[derive(Debug, Clone, Copy, Default)]
pub struct LightRecord {
    pub light_type: i16,
    pub bone: i16,
    pub position: Vec3,
    pub ambient_color: AnimationBlock<Vec3>,
    pub ambient_intensity: AnimationBlock<f32>,
    pub diffuse_color: AnimationBlock<Vec3>,
    pub diffuse_intensity: AnimationBlock<f32>,
    pub attenuation_start: AnimationBlock<f32>,
    pub attenuation_end: AnimationBlock<f32>,
    pub visibility: AnimationBlock<u8>,
}

impl Record for LightRecord {
    const SIZE: usize = 156;

    fn parse<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(Self {
            light_type: reader.read_i16::<LittleEndian>()?,
            bone: reader.read_i16::<LittleEndian>()?,
            position: read_vec3(reader)?,
            ambient_color: AnimationBlock::parse(reader)?,
            ambient_intensity: AnimationBlock::parse(reader)?,
            diffuse_color: AnimationBlock::parse(reader)?,
            diffuse_intensity: AnimationBlock::parse(reader)?,
            attenuation_start: AnimationBlock::parse(reader)?,
            attenuation_end: AnimationBlock::parse(reader)?,
            visibility: AnimationBlock::parse(reader)?,
        })
    }
}

/// A light attached to a bone
#[derive(Debug, Clone)]
pub struct ModelLight {
    pub light_type: LightType,
    pub bone: i16,
    pub position: Vec3,
    pub ambient_color: AnimatedTrack<Vec3>,
    pub ambient_intensity: AnimatedTrack<f32>,
    pub diffuse_color: AnimatedTrack<Vec3>,
    pub diffuse_intensity: AnimatedTrack<f32>,
    pub attenuation_start: AnimatedTrack<f32>,
    pub attenuation_end: AnimatedTrack<f32>,
    pub visibility: AnimatedTrack<u8>,
}

/// Light values for one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightState {
    pub light_type: LightType,
    pub position: Vec3,
    /// Direction for directional lights
    pub direction: Vec3,
    pub ambient: Vec4,
    pub diffuse: Vec4,
    pub attenuation: (f32, f32),
    pub visible: bool,
}

impl ModelLight {
    pub fn decode(record: &LightRecord, ctx: &TrackContext<'_>) -> Result<Self> {
        Ok(Self {
            light_type: if record.light_type == 0 {
                LightType::Directional
            } else {
                LightType::Point
            },
            bone: record.bone,
            position: fix_coord_system(record.position),
            ambient_color: AnimatedTrack::decode(&record.ambient_color, ctx, |c: Vec3| c)?,
            ambient_intensity: AnimatedTrack::decode(&record.ambient_intensity, ctx, |v: f32| v)?,
            diffuse_color: AnimatedTrack::decode(&record.diffuse_color, ctx, |c: Vec3| c)?,
            diffuse_intensity: AnimatedTrack::decode(&record.diffuse_intensity, ctx, |v: f32| v)?,
            attenuation_start: AnimatedTrack::decode(&record.attenuation_start, ctx, |v: f32| v)?,
            attenuation_end: AnimatedTrack::decode(&record.attenuation_end, ctx, |v: f32| v)?,
            visibility: AnimatedTrack::decode(&record.visibility, ctx, |v: u8| v)?,
        })
    }

    /// Evaluate the light against the current pose
    pub fn evaluate(
        &self,
        skeleton: &Skeleton,
        anim: usize,
        time: u32,
        global_time: u32,
    ) -> LightState {
        let bone = usize::try_from(self.bone).ok().and_then(|b| skeleton.bone(b));
        let (position, direction) = match bone {
            Some(bone) => (
                bone.mat.transform_point3(self.position),
                bone.mrot.transform_vector3(Vec3::Y),
            ),
            None => (self.position, Vec3::Y),
        };

        let ambient = self.ambient_color.get_value(anim, time, global_time)
            * self.ambient_intensity.get_value(anim, time, global_time);
        let diffuse = self.diffuse_color.get_value(anim, time, global_time)
            * self.diffuse_intensity.get_value(anim, time, global_time);
        let visible =
            !self.visibility.uses(anim) || self.visibility.get_value(anim, time, global_time) != 0;

        LightState {
            light_type: self.light_type,
            position,
            direction,
            ambient: ambient.extend(1.0),
            diffuse: diffuse.extend(1.0),
            attenuation: (
                self.attenuation_start.get_value(anim, time, global_time),
                self.attenuation_end.get_value(anim, time, global_time),
            ),
            visible,
        }
    }
}
