//! Animated tracks: raw animation blocks and their decoded, sampleable form

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Read;

use super::types::{Interpolate, InterpolationType};
use crate::buffer::{ByteBufferView, Record, TableArray, read_table};
use crate::error::Result;

/// Raw animation block as stored in the model (20 bytes)
///
/// `times` and `values` each reference one nested array per animation sequence.
#[derive(Debug, PartialEq, Eq)]
pub struct AnimationBlock<S> {
    pub interpolation: u16,
    pub global_sequence: i16,
    pub times: TableArray<TableArray<u32>>,
    pub values: TableArray<TableArray<S>>,
}

impl<S> Clone for AnimationBlock<S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S> Copy for AnimationBlock<S> {}

impl<S> Default for AnimationBlock<S> {
    fn default() -> Self {
        Self {
            interpolation: 0,
            global_sequence: -1,
            times: TableArray::default(),
            values: TableArray::default(),
        }
    }
}

impl<S> Record for AnimationBlock<S> {
    const SIZE: usize = 20;

    fn parse<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(Self {
            interpolation: reader.read_u16::<LittleEndian>()?,
            global_sequence: reader.read_i16::<LittleEndian>()?,
            times: TableArray::parse(reader)?,
            values: TableArray::parse(reader)?,
        })
    }
}

/// Timestamp-less key list used by particle color/opacity/size ramps (16 bytes)
#[derive(Debug, PartialEq, Eq)]
pub struct FakeAnimationBlock<S> {
    pub times: TableArray<u16>,
    pub values: TableArray<S>,
}

impl<S> Clone for FakeAnimationBlock<S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S> Copy for FakeAnimationBlock<S> {}

impl<S> Default for FakeAnimationBlock<S> {
    fn default() -> Self {
        Self {
            times: TableArray::default(),
            values: TableArray::default(),
        }
    }
}

impl<S> Record for FakeAnimationBlock<S> {
    const SIZE: usize = 16;

    fn parse<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(Self {
            times: TableArray::parse(reader)?,
            values: TableArray::parse(reader)?,
        })
    }
}

impl<S: Record> FakeAnimationBlock<S> {
    /// Read the key values
    pub fn read_values(&self, buffer: &ByteBufferView<'_>) -> Result<Vec<S>> {
        read_table(buffer, &self.values, "fake animation block")
    }
}

/// Where keyframe payloads are read from
#[derive(Debug, Clone)]
pub struct TrackContext<'a> {
    /// Primary model buffer
    pub main: ByteBufferView<'a>,
    /// Keyframe location per sequence, missing entries are embedded
    pub external: Vec<KeyframeSource<'a>>,
    /// Global sequence lengths in milliseconds
    pub global_sequences: &'a [u32],
}

impl<'a> TrackContext<'a> {
    /// Context that reads everything from the primary buffer
    pub fn new(main: &'a [u8], global_sequences: &'a [u32]) -> Self {
        Self {
            main: ByteBufferView::new(main),
            external: Vec::new(),
            global_sequences,
        }
    }

    fn payload_buffer(&self, anim: usize) -> Option<ByteBufferView<'a>> {
        match self.external.get(anim) {
            Some(KeyframeSource::External(data)) => Some(ByteBufferView::new(data)),
            Some(KeyframeSource::Missing) => None,
            _ => Some(self.main.clone()),
        }
    }
}

/// Where the keyframes of one sequence are stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyframeSource<'a> {
    /// In the primary model buffer
    #[default]
    Embedded,
    /// In a companion `.anim` buffer
    External(&'a [u8]),
    /// In a companion file that could not be loaded
    Missing,
}

/// A decoded animated value
#[derive(Debug, Clone, Default)]
pub struct AnimatedTrack<T> {
    pub interpolation: InterpolationType,
    /// Raw interpolation value, non-zero marks an animated curve
    pub raw_interpolation: u16,
    /// Global sequence index, if the curve loops on its own clock
    pub global_sequence: Option<usize>,
    global_length: Option<u32>,
    /// Timestamps per animation
    pub times: Vec<Vec<u32>>,
    /// Values per animation
    pub values: Vec<Vec<T>>,
    in_tangents: Vec<Vec<T>>,
    out_tangents: Vec<Vec<T>>,
}

impl<T: Interpolate> AnimatedTrack<T> {
    /// Decode a block, converting every stored value with `convert`
    pub fn decode<S, F>(
        block: &AnimationBlock<S>,
        ctx: &TrackContext<'_>,
        convert: F,
    ) -> Result<Self>
    where
        S: Record,
        F: Fn(S) -> T,
    {
        let interpolation = InterpolationType::from_raw(block.interpolation);
        let global_sequence = usize::try_from(block.global_sequence).ok();
        let global_length = global_sequence.and_then(|gs| ctx.global_sequences.get(gs).copied());

        let time_headers = read_table(&ctx.main, &block.times, "track timestamps")?;
        let value_headers = read_table(&ctx.main, &block.values, "track values")?;

        let mut track = Self {
            interpolation,
            raw_interpolation: block.interpolation,
            global_sequence,
            global_length,
            times: Vec::with_capacity(time_headers.len()),
            values: Vec::with_capacity(value_headers.len()),
            in_tangents: Vec::new(),
            out_tangents: Vec::new(),
        };

        for (anim, (times_array, values_array)) in
            time_headers.iter().zip(value_headers.iter()).enumerate()
        {
            let Some(source) = track_source(ctx, anim, global_sequence) else {
                track.times.push(Vec::new());
                track.values.push(Vec::new());
                if interpolation.has_tangents() {
                    track.in_tangents.push(Vec::new());
                    track.out_tangents.push(Vec::new());
                }
                continue;
            };
            let mut times = read_table(&source, times_array, "keyframe timestamps")?;

            let (values, ins, outs) = if interpolation.has_tangents() {
                let spline =
                    TableArray::<S>::new(values_array.count.saturating_mul(3), values_array.offset);
                let raw = read_table(&source, &spline, "keyframe splines")?;
                let mut values = Vec::with_capacity(raw.len() / 3);
                let mut ins = Vec::with_capacity(raw.len() / 3);
                let mut outs = Vec::with_capacity(raw.len() / 3);
                let mut raw = raw.into_iter();
                while let (Some(v), Some(i), Some(o)) = (raw.next(), raw.next(), raw.next()) {
                    values.push(convert(v));
                    ins.push(convert(i));
                    outs.push(convert(o));
                }
                (values, ins, outs)
            } else {
                let raw = read_table(&source, values_array, "keyframe values")?;
                (raw.into_iter().map(&convert).collect(), Vec::new(), Vec::new())
            };

            if times.len() != values.len() {
                log::debug!(
                    "Keyframe count mismatch in animation {}: {} timestamps, {} values",
                    anim,
                    times.len(),
                    values.len()
                );
                times.truncate(values.len());
            }

            track.times.push(times);
            track.values.push(values);
            if interpolation.has_tangents() {
                track.in_tangents.push(ins);
                track.out_tangents.push(outs);
            }
        }

        Ok(track)
    }

    /// Build a track from explicit keyframes, one entry per animation
    pub fn from_keyframes(interpolation: InterpolationType, keys: Vec<Vec<(u32, T)>>) -> Self {
        let mut times = Vec::with_capacity(keys.len());
        let mut values = Vec::with_capacity(keys.len());
        for anim in keys {
            let (t, v): (Vec<u32>, Vec<T>) = anim.into_iter().unzip();
            times.push(t);
            values.push(v);
        }
        Self {
            interpolation,
            raw_interpolation: match interpolation {
                InterpolationType::None => 0,
                InterpolationType::Linear => 1,
                InterpolationType::Bezier => 2,
                InterpolationType::Hermite => 3,
            },
            times,
            values,
            ..Self::default()
        }
    }

    /// Loop this track on a global sequence of `length` milliseconds
    pub fn with_global_sequence(mut self, index: usize, length: u32) -> Self {
        self.global_sequence = Some(index);
        self.global_length = Some(length);
        self
    }

    /// Check if the track has keyframes for `anim`
    pub fn uses(&self, anim: usize) -> bool {
        let anim = if self.global_sequence.is_some() { 0 } else { anim };
        self.values.get(anim).is_some_and(|v| !v.is_empty())
    }

    /// Check if the track is animated at all
    pub fn is_animated(&self) -> bool {
        self.raw_interpolation != 0
    }

    /// Sample the track
    ///
    /// `time` is the local time inside animation `anim`, `global_time` drives
    /// tracks bound to a global sequence. Missing data yields `T::default()`.
    pub fn get_value(&self, anim: usize, time: u32, global_time: u32) -> T {
        let (anim, time) = match (self.global_sequence, self.global_length) {
            (Some(_), Some(0)) => (0, 0),
            (Some(_), Some(length)) => (0, global_time % length),
            _ => (anim, time),
        };

        let Some(values) = self.values.get(anim) else {
            return T::default();
        };
        let times = &self.times[anim];

        match values.len() {
            0 => return T::default(),
            1 => return values[0],
            _ => {}
        }
        if times.len() < 2 {
            return values[0];
        }

        let max_time = times[times.len() - 1];
        let time = if max_time > 0 { time % max_time } else { 0 };

        let pos = times
            .partition_point(|&key| key <= time)
            .saturating_sub(1)
            .min(times.len() - 2);
        let (t1, t2) = (times[pos], times[pos + 1]);
        let r = if t2 > t1 {
            (time.saturating_sub(t1)) as f32 / (t2 - t1) as f32
        } else {
            0.0
        };

        match self.interpolation {
            InterpolationType::None => values[pos],
            InterpolationType::Linear => values[pos].interpolate(&values[pos + 1], r),
            InterpolationType::Bezier | InterpolationType::Hermite => {
                match (self.in_tangents.get(anim), self.out_tangents.get(anim)) {
                    (Some(ins), Some(outs)) if pos < ins.len() && pos < outs.len() => {
                        values[pos].hermite(&values[pos + 1], &ins[pos], &outs[pos], r)
                    }
                    _ => values[pos].interpolate(&values[pos + 1], r),
                }
            }
        }
    }
}

fn track_source<'a>(
    ctx: &TrackContext<'a>,
    anim: usize,
    global_sequence: Option<usize>,
) -> Option<ByteBufferView<'a>> {
    // Global sequence data always lives in the primary buffer.
    if global_sequence.is_some() {
        Some(ctx.main.clone())
    } else {
        ctx.payload_buffer(anim)
    }
}
