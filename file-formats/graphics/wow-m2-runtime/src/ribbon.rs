//! Ribbon emitters: trails of segments anchored to a bone

use byteorder::{LittleEndian, ReadBytesExt};
use glam::{Vec2, Vec3, Vec4};
use std::collections::VecDeque;
use std::io::Read;

use crate::animation::{AnimatedTrack, AnimationBlock, TrackContext};
use crate::buffer::{Record, TableArray, read_table, read_vec3};
use crate::coordinate::{fix_coord_system, fixed16_to_float};
use crate::error::{M2Error, Result};
use crate::particles::EmitterFrame;
use crate::skeleton::Skeleton;

/// Ribbon emitter record (176 bytes)
#[derive(Debug, Clone, Copy, Default)]
pub struct RibbonEmitterRecord {
    pub id: i32,
    pub bone: u32,
    pub position: Vec3,
    pub textures: TableArray<u16>,
    pub materials: TableArray<u16>,
    pub color: AnimationBlock<Vec3>,
    pub alpha: AnimationBlock<i16>,
    pub height_above: AnimationBlock<f32>,
    pub height_below: AnimationBlock<f32>,
    pub edges_per_second: f32,
    pub edge_lifetime: f32,
    pub gravity: f32,
    pub rows: u16,
    pub cols: u16,
    pub texture_slot: AnimationBlock<u16>,
    pub visibility: AnimationBlock<u8>,
    pub priority_plane: i16,
    pub color_index: u8,
    pub texture_transform_lookup: u8,
}

impl Record for RibbonEmitterRecord {
    const SIZE: usize = 176;

    fn parse<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(Self {
            id: reader.read_i32::<LittleEndian>()?,
            bone: reader.read_u32::<LittleEndian>()?,
            position: read_vec3(reader)?,
            textures: TableArray::parse(reader)?,
            materials: TableArray::parse(reader)?,
            color: AnimationBlock::parse(reader)?,
            alpha: AnimationBlock::parse(reader)?,
            height_above: AnimationBlock::parse(reader)?,
            height_below: AnimationBlock::parse(reader)?,
            edges_per_second: reader.read_f32::<LittleEndian>()?,
            edge_lifetime: reader.read_f32::<LittleEndian>()?,
            gravity: reader.read_f32::<LittleEndian>()?,
            rows: reader.read_u16::<LittleEndian>()?,
            cols: reader.read_u16::<LittleEndian>()?,
            texture_slot: AnimationBlock::parse(reader)?,
            visibility: AnimationBlock::parse(reader)?,
            priority_plane: reader.read_i16::<LittleEndian>()?,
            color_index: reader.read_u8()?,
            texture_transform_lookup: reader.read_u8()?,
        })
    }
}

/// One piece of a ribbon trail
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RibbonSegment {
    pub pos: Vec3,
    pub up: Vec3,
    /// Direction towards the next older segment
    pub back: Vec3,
    pub len: f32,
    /// Length when the segment stopped growing
    pub len0: f32,
}

/// Vertex of the triangle strip built from a ribbon
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RibbonVertex {
    pub position: Vec3,
    pub tex_coord: Vec2,
}

/// A ribbon trail following a bone
#[derive(Debug, Clone)]
pub struct RibbonEmitter {
    /// Bone the ribbon is anchored to
    pub parent: usize,
    /// Anchor relative to the bone
    pub pos: Vec3,
    pub textures: Vec<u16>,
    pub materials: Vec<u16>,
    pub color: AnimatedTrack<Vec3>,
    pub opacity: AnimatedTrack<f32>,
    pub above: AnimatedTrack<f32>,
    pub below: AnimatedTrack<f32>,
    pub texture_slot: AnimatedTrack<u16>,
    pub visibility: AnimatedTrack<u8>,
    /// Length at which a new segment starts
    pub seglen: f32,
    /// Total trail length
    pub length: f32,
    pub gravity: f32,
    pub priority_plane: i16,
    segments: VecDeque<RibbonSegment>,
    tpos: Vec3,
    tcolor: Vec4,
    tabove: f32,
    tbelow: f32,
}

impl RibbonEmitter {
    /// Build a ribbon from its record
    pub fn decode(
        index: usize,
        record: &RibbonEmitterRecord,
        ctx: &TrackContext<'_>,
    ) -> Result<Self> {
        let parent = usize::try_from(record.bone).map_err(|_| M2Error::InvalidEmitter {
            index,
            reason: format!("bone index {} out of range", record.bone),
        })?;
        let seglen = record.edge_lifetime;
        let length = record.edges_per_second * seglen;

        let mut ribbon = Self::new(parent, fix_coord_system(record.position), seglen, length);
        ribbon
            .decode_tables(record, ctx)
            .map_err(|err| M2Error::InvalidEmitter {
                index,
                reason: err.to_string(),
            })?;
        ribbon.gravity = record.gravity;
        ribbon.priority_plane = record.priority_plane;
        Ok(ribbon)
    }

    fn decode_tables(
        &mut self,
        record: &RibbonEmitterRecord,
        ctx: &TrackContext<'_>,
    ) -> Result<()> {
        self.textures = read_table(&ctx.main, &record.textures, "ribbon textures")?;
        self.materials = read_table(&ctx.main, &record.materials, "ribbon materials")?;
        self.color = AnimatedTrack::decode(&record.color, ctx, |v: Vec3| v)?;
        self.opacity = AnimatedTrack::decode(&record.alpha, ctx, fixed16_to_float)?;
        self.above = AnimatedTrack::decode(&record.height_above, ctx, |v: f32| v)?;
        self.below = AnimatedTrack::decode(&record.height_below, ctx, |v: f32| v)?;
        self.texture_slot = AnimatedTrack::decode(&record.texture_slot, ctx, |v: u16| v)?;
        self.visibility = AnimatedTrack::decode(&record.visibility, ctx, |v: u8| v)?;
        Ok(())
    }

    /// A ribbon with one empty segment at `pos`
    pub fn new(parent: usize, pos: Vec3, seglen: f32, length: f32) -> Self {
        let mut segments = VecDeque::new();
        segments.push_back(RibbonSegment {
            pos,
            ..RibbonSegment::default()
        });

        Self {
            parent,
            pos,
            textures: Vec::new(),
            materials: Vec::new(),
            color: AnimatedTrack::default(),
            opacity: AnimatedTrack::default(),
            above: AnimatedTrack::default(),
            below: AnimatedTrack::default(),
            texture_slot: AnimatedTrack::default(),
            visibility: AnimatedTrack::default(),
            seglen,
            length,
            gravity: 0.0,
            priority_plane: 0,
            segments,
            tpos: pos,
            tcolor: Vec4::ONE,
            tabove: 0.0,
            tbelow: 0.0,
        }
    }

    /// Segments from newest to oldest
    pub fn segments(&self) -> &VecDeque<RibbonSegment> {
        &self.segments
    }

    /// Sum of all segment lengths
    pub fn total_length(&self) -> f32 {
        self.segments.iter().map(|s| s.len).sum()
    }

    /// Color and opacity sampled by the last setup
    pub fn color_value(&self) -> Vec4 {
        self.tcolor
    }

    /// Move the anchor to the bone's current position and age the trail
    pub fn setup(&mut self, skeleton: &Skeleton, frame: EmitterFrame) {
        let Some(bone) = skeleton.bone(self.parent) else {
            log::debug!("Ribbon bone {} is missing", self.parent);
            return;
        };
        let EmitterFrame {
            animation: anim,
            time,
            global_time: gt,
        } = frame;

        let ntpos = bone.mat.transform_point3(self.pos);
        let ntup = (bone.mat.transform_point3(self.pos + Vec3::Z) - ntpos).normalize_or_zero();
        let dlen = (ntpos - self.tpos).length();

        if let Some(front) = self.segments.front_mut() {
            if front.len >= self.seglen {
                front.back = (self.tpos - ntpos).normalize_or_zero();
                front.len0 = front.len;
                self.segments.push_front(RibbonSegment {
                    pos: ntpos,
                    up: ntup,
                    len: dlen,
                    ..RibbonSegment::default()
                });
            } else {
                front.up = ntup;
                front.pos = ntpos;
                front.len += dlen;
            }
        }

        self.trim();

        self.tpos = ntpos;
        self.tcolor = self
            .color
            .get_value(anim, time, gt)
            .extend(self.opacity.get_value(anim, time, gt));
        self.tabove = self.above.get_value(anim, time, gt);
        self.tbelow = self.below.get_value(anim, time, gt);
    }

    /// Cut the trail at `length`, shortening the boundary segment
    fn trim(&mut self) {
        let mut l = 0.0;
        let mut keep = self.segments.len();
        for (i, seg) in self.segments.iter_mut().enumerate() {
            l += seg.len;
            if l > self.length {
                seg.len = self.length - (l - seg.len);
                keep = i + 1;
                break;
            }
        }
        self.segments.truncate(keep);
    }

    /// Triangle strip along the trail
    ///
    /// Two vertices per segment, offset above and below along `up`, with the
    /// texture `u` coordinate running from 0 at the anchor to 1 at the tail.
    pub fn strip(&self) -> Vec<RibbonVertex> {
        let mut vertices = Vec::with_capacity(self.segments.len() * 2 + 2);
        let mut l = 0.0;
        for seg in &self.segments {
            let u = if self.length > 0.0 { l / self.length } else { 0.0 };
            vertices.push(RibbonVertex {
                position: seg.pos + seg.up * self.tabove,
                tex_coord: Vec2::new(u, 0.0),
            });
            vertices.push(RibbonVertex {
                position: seg.pos - seg.up * self.tbelow,
                tex_coord: Vec2::new(u, 1.0),
            });
            l += seg.len;
        }

        if self.segments.len() > 1 {
            if let Some(last) = self.segments.back() {
                let tail = if last.len0 > 0.0 {
                    last.back * (last.len / last.len0)
                } else {
                    Vec3::ZERO
                };
                vertices.push(RibbonVertex {
                    position: last.pos + last.up * self.tabove + tail,
                    tex_coord: Vec2::new(1.0, 0.0),
                });
                vertices.push(RibbonVertex {
                    position: last.pos - last.up * self.tbelow + tail,
                    tex_coord: Vec2::new(1.0, 1.0),
                });
            }
        }
        vertices
    }
}
