//! Particle system: spawning, integration and lifetime ramps

use glam::{Vec2, Vec3, Vec4};
use rand::SeedableRng;
use rand::rngs::StdRng;

use super::definition::{EmitterShape, ParticleEmitterRecord, ParticleFlags};
use super::emitter::{Emitter, SpawnParams, SpawnSource};
use super::particle::Particle;
use crate::animation::{AnimatedTrack, AnimationBlock, TrackContext, life_ramp};
use crate::config::RuntimeConfig;
use crate::coordinate::{fix_coord_system, fixed16_to_float};
use crate::error::{M2Error, Result};
use crate::skeleton::Skeleton;

/// Breakpoint of the size and color ramps
const RAMP_MID: f32 = 0.5;

/// Texture coordinates of one atlas tile, corner order follows the emitter
pub type TileCoords = [Vec2; 4];

/// Animation position of an emitter update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EmitterFrame {
    pub animation: usize,
    pub time: u32,
    pub global_time: u32,
}

/// A particle emitter and its live particles
#[derive(Debug, Clone)]
pub struct ParticleSystem {
    pub emitter: Emitter,
    /// Raw flag word; exact values select legacy spawn formulas
    pub flags: u32,
    /// Position relative to the bone
    pub pos: Vec3,
    /// Bone the emitter is attached to
    pub parent: usize,
    /// Index into the model's texture table
    pub texture: u16,
    pub blend: u8,
    /// Tile corner rotation, -1 for tail-first particles
    pub order: i32,
    pub rows: u16,
    pub cols: u16,
    pub speed: AnimatedTrack<f32>,
    pub variation: AnimatedTrack<f32>,
    pub spread: AnimatedTrack<f32>,
    pub lat: AnimatedTrack<f32>,
    pub gravity: AnimatedTrack<f32>,
    pub lifespan: AnimatedTrack<f32>,
    pub rate: AnimatedTrack<f32>,
    pub area_length: AnimatedTrack<f32>,
    pub area_width: AnimatedTrack<f32>,
    pub deceleration: AnimatedTrack<f32>,
    pub enabled: AnimatedTrack<u8>,
    /// Start, middle and end colors
    pub colors: [Vec4; 3],
    /// Start, middle and end sizes
    pub sizes: [f32; 3],
    pub slowdown: f32,
    pub rotation: f32,
    /// Particles face the camera
    pub billboard: bool,
    tiles: Vec<TileCoords>,
    particles: Vec<Particle>,
    rem: f32,
    cap: usize,
    rng: StdRng,
}

impl ParticleSystem {
    /// Build a particle system from its record
    pub fn decode(
        index: usize,
        record: &ParticleEmitterRecord,
        ctx: &TrackContext<'_>,
        config: &RuntimeConfig,
    ) -> Result<Self> {
        let shape =
            EmitterShape::from_raw(record.emitter_type).ok_or_else(|| M2Error::InvalidEmitter {
                index,
                reason: format!("unsupported emitter type {}", record.emitter_type),
            })?;

        let emitter_error = |err: M2Error| M2Error::InvalidEmitter {
            index,
            reason: err.to_string(),
        };
        let track = |block: &AnimationBlock<f32>| {
            AnimatedTrack::decode(block, ctx, |v: f32| v).map_err(emitter_error)
        };

        let colors_rgb = record.color.read_values(&ctx.main).map_err(emitter_error)?;
        let alphas = record.alpha.read_values(&ctx.main).map_err(emitter_error)?;
        let scales = record.scale.read_values(&ctx.main).map_err(emitter_error)?;
        let size_scales = record.size_scales();

        let mut colors = [Vec4::ONE; 3];
        let mut sizes = [1.0; 3];
        for i in 0..3 {
            let rgb = key_or_last(&colors_rgb, i).unwrap_or(Vec3::splat(255.0));
            let alpha = key_or_last(&alphas, i).map_or(1.0, fixed16_to_float);
            colors[i] = (rgb / 255.0).extend(alpha);
            sizes[i] = key_or_last(&scales, i).map_or(1.0, |s| s.x) * size_scales[i];
        }

        let rows = record.rows.max(1);
        let cols = record.cols.max(1);
        let order = if record.particle_type > 0 { -1 } else { 0 };

        let rng = match config.particle_seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(index as u64)),
            None => StdRng::from_os_rng(),
        };

        Ok(Self {
            emitter: shape.into(),
            flags: record.flags,
            pos: fix_coord_system(record.position),
            parent: usize::from(record.bone),
            texture: record.texture,
            blend: record.blend,
            order,
            rows,
            cols,
            speed: track(&record.speed)?,
            variation: track(&record.variation)?,
            spread: track(&record.vertical_range)?,
            lat: track(&record.horizontal_range)?,
            gravity: track(&record.gravity)?,
            lifespan: track(&record.lifespan)?,
            rate: track(&record.rate)?,
            area_length: track(&record.area_length)?,
            area_width: track(&record.area_width)?,
            deceleration: track(&record.z_source)?,
            enabled: AnimatedTrack::decode(&record.enabled, ctx, |v: u8| v).map_err(emitter_error)?,
            colors,
            sizes,
            slowdown: record.drag,
            rotation: record.spin,
            billboard: !ParticleFlags::from_bits_retain(record.flags)
                .contains(ParticleFlags::NO_BILLBOARD),
            tiles: build_tiles(rows, cols, order),
            particles: Vec::new(),
            rem: 0.0,
            cap: config.particle_cap(),
            rng,
        })
    }

    /// A system with default tracks, mostly for tests and tools
    pub fn new(emitter: Emitter, parent: usize, cap: usize, seed: u64) -> Self {
        Self {
            emitter,
            flags: 0,
            pos: Vec3::ZERO,
            parent,
            texture: 0,
            blend: 0,
            order: 0,
            rows: 1,
            cols: 1,
            speed: AnimatedTrack::default(),
            variation: AnimatedTrack::default(),
            spread: AnimatedTrack::default(),
            lat: AnimatedTrack::default(),
            gravity: AnimatedTrack::default(),
            lifespan: AnimatedTrack::default(),
            rate: AnimatedTrack::default(),
            area_length: AnimatedTrack::default(),
            area_width: AnimatedTrack::default(),
            deceleration: AnimatedTrack::default(),
            enabled: AnimatedTrack::default(),
            colors: [Vec4::ONE; 3],
            sizes: [1.0; 3],
            slowdown: 0.0,
            rotation: 0.0,
            billboard: true,
            tiles: build_tiles(1, 1, 0),
            particles: Vec::new(),
            rem: 0.0,
            cap,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Change the atlas layout and rebuild the tile table
    pub fn set_tiles(&mut self, rows: u16, cols: u16) {
        self.rows = rows.max(1);
        self.cols = cols.max(1);
        self.tiles = build_tiles(self.rows, self.cols, self.order);
    }

    /// Live particles
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// Atlas tile coordinates, `rows * cols` entries
    pub fn tiles(&self) -> &[TileCoords] {
        &self.tiles
    }

    /// Fractional spawn count carried to the next update
    pub fn remainder(&self) -> f32 {
        self.rem
    }

    /// Hard cap on live particles
    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Drop all live particles and the spawn remainder
    pub fn reset(&mut self) {
        self.particles.clear();
        self.rem = 0.0;
    }

    /// Replace the random generator, `None` seeds from the OS
    pub fn reseed(&mut self, seed: Option<u64>) {
        self.rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
    }

    /// Advance the system by `dt` seconds
    pub fn update(&mut self, skeleton: &Skeleton, frame: EmitterFrame, dt: f32) {
        let EmitterFrame {
            animation: anim,
            time,
            global_time: gt,
        } = frame;

        let grav = self.gravity.get_value(anim, time, gt);
        let deaccel = self.deceleration.get_value(anim, time, gt);

        let rate = self.rate.get_value(anim, time, gt);
        let life = self.lifespan.get_value(anim, time, gt);
        let to_spawn = if life != 0.0 {
            dt * rate / life + self.rem
        } else {
            self.rem
        };

        if to_spawn < 1.0 {
            self.rem = to_spawn.max(0.0);
        } else {
            let whole = to_spawn.floor();
            let room = self.cap.saturating_sub(self.particles.len());
            let count = (whole as usize).min(room);
            self.rem = to_spawn - whole;

            let enabled = !self.enabled.uses(anim) || self.enabled.get_value(anim, time, gt) != 0;
            match skeleton.bone(self.parent) {
                Some(bone) if enabled && count > 0 => {
                    let params = SpawnParams {
                        w: self.area_length.get_value(anim, time, gt) * 0.5,
                        l: self.area_width.get_value(anim, time, gt) * 0.5,
                        speed: self.speed.get_value(anim, time, gt),
                        variation: self.variation.get_value(anim, time, gt),
                        spread: self.spread.get_value(anim, time, gt),
                        lat: self.lat.get_value(anim, time, gt),
                        lifespan: life,
                    };
                    let source = SpawnSource {
                        flags: self.flags,
                        pos: self.pos,
                        tile_count: self.tiles.len(),
                    };
                    self.particles.reserve(count);
                    for _ in 0..count {
                        let p = self.emitter.new_particle(&source, &params, bone, &mut self.rng);
                        self.particles.push(p);
                    }
                }
                None if count > 0 => {
                    log::debug!(
                        "Particle emitter bone {} is missing, nothing spawned",
                        self.parent
                    );
                }
                _ => {}
            }
        }

        let (sizes, colors, slowdown) = (self.sizes, self.colors, self.slowdown);
        self.particles.retain_mut(|p| {
            p.integrate(dt, grav, deaccel, slowdown);
            let rlife = p.relative_life();
            p.size = life_ramp(rlife, RAMP_MID, sizes[0], sizes[1], sizes[2]);
            p.color = life_ramp(rlife, RAMP_MID, colors[0], colors[1], colors[2]);
            rlife < 1.0
        });
    }
}

fn key_or_last<T: Copy>(keys: &[T], i: usize) -> Option<T> {
    keys.get(i).or_else(|| keys.last()).copied()
}

/// Tile table of a `rows x cols` atlas
///
/// Corners are rotated by `order`, so tail-first particles start at a
/// different corner.
pub fn build_tiles(rows: u16, cols: u16, order: i32) -> Vec<TileCoords> {
    let rows = u32::from(rows.max(1));
    let cols = u32::from(cols.max(1));
    (0..rows * cols)
        .map(|num| {
            let x = num % cols;
            let y = num / cols;
            let a = Vec2::new(x as f32 / cols as f32, y as f32 / rows as f32);
            let b = Vec2::new((x + 1) as f32 / cols as f32, (y + 1) as f32 / rows as f32);
            let corners = [a, Vec2::new(b.x, a.y), b, Vec2::new(a.x, b.y)];

            let mut tile = [Vec2::ZERO; 4];
            for (i, corner) in corners.into_iter().enumerate() {
                let slot = (i as i32 + 4 - order).rem_euclid(4) as usize;
                tile[slot] = corner;
            }
            tile
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::InterpolationType;
    use crate::skeleton::Bone;
    use test_case::test_case;

    fn constant(v: f32) -> AnimatedTrack<f32> {
        AnimatedTrack::from_keyframes(InterpolationType::Linear, vec![vec![(0, v)]])
    }

    fn system(rate: f32, lifespan: f32) -> ParticleSystem {
        let mut sys = ParticleSystem::new(Emitter::Plane, 0, 10_000, 42);
        sys.rate = constant(rate);
        sys.lifespan = constant(lifespan);
        sys
    }

    fn skeleton() -> Skeleton {
        Skeleton::new(vec![Bone::default()], 8)
    }

    #[test]
    fn test_fraction_accumulates() {
        let skeleton = skeleton();
        let mut sys = system(1.0, 1.0);
        sys.update(&skeleton, EmitterFrame::default(), 0.25);
        assert!(sys.particles().is_empty());
        assert_eq!(sys.remainder(), 0.25);

        sys.update(&skeleton, EmitterFrame::default(), 0.75);
        assert_eq!(sys.particles().len(), 1);
        assert_eq!(sys.remainder(), 0.0);
    }

    #[test_case(4, 0.25 ; "quarter seconds")]
    #[test_case(8, 0.125 ; "eighth seconds")]
    #[test_case(32, 0.031_25 ; "small steps")]
    fn test_small_steps_spawn_like_one_step(steps: usize, dt: f32) {
        let skeleton = skeleton();
        let mut stepped = system(6.0, 2.0);
        for _ in 0..steps {
            stepped.update(&skeleton, EmitterFrame::default(), dt);
        }

        let mut single = system(6.0, 2.0);
        single.update(&skeleton, EmitterFrame::default(), steps as f32 * dt);

        assert_eq!(single.particles().len(), 3);
        assert_eq!(stepped.particles().len(), single.particles().len());
        assert_eq!(stepped.remainder(), single.remainder());
    }

    #[test]
    fn test_zero_lifespan_spawns_nothing() {
        let skeleton = skeleton();
        let mut sys = system(100.0, 0.0);
        sys.update(&skeleton, EmitterFrame::default(), 1.0);
        assert!(sys.particles().is_empty());
    }

    #[test]
    fn test_disabled_emitter_keeps_remainder() {
        let skeleton = skeleton();
        let mut sys = system(4.0, 1.0);
        sys.enabled = AnimatedTrack::from_keyframes(InterpolationType::None, vec![vec![(0, 0u8)]]);
        sys.update(&skeleton, EmitterFrame::default(), 1.25);
        assert!(sys.particles().is_empty());
        assert_eq!(sys.remainder(), 0.0);
    }

    #[test]
    fn test_particles_expire() {
        let skeleton = skeleton();
        let mut sys = system(4.0, 1.0);
        sys.update(&skeleton, EmitterFrame::default(), 0.5);
        assert_eq!(sys.particles().len(), 2);
        sys.rate = constant(0.0);
        sys.update(&skeleton, EmitterFrame::default(), 0.5);
        assert!(sys.particles().is_empty());
    }

    #[test]
    fn test_color_ramp() {
        let skeleton = skeleton();
        let mut sys = system(4.0, 1.0);
        sys.colors = [Vec4::ZERO, Vec4::ONE, Vec4::ZERO];
        sys.sizes = [0.0, 2.0, 4.0];
        sys.update(&skeleton, EmitterFrame::default(), 0.25);
        let p = sys.particles()[0];
        assert!((p.size - 1.0).abs() < 1e-5);
        assert!(p.color.abs_diff_eq(Vec4::splat(0.5), 1e-5));
    }

    #[test]
    fn test_tiles() {
        let tiles = build_tiles(2, 2, 0);
        assert_eq!(tiles.len(), 4);
        assert_eq!(tiles[3][0], Vec2::new(0.5, 0.5));
        assert_eq!(tiles[3][2], Vec2::new(1.0, 1.0));

        let rotated = build_tiles(1, 1, -1);
        assert_eq!(rotated[0][1], Vec2::new(0.0, 0.0));
        assert_eq!(rotated[0][0], Vec2::new(0.0, 1.0));
    }
}
