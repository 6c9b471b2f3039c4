//! Spawn geometry of the two emitter shapes
//!
//! Several exact flag values select legacy formulas that specific assets
//! depend on. They are kept verbatim, including their random draw order.

use glam::{Mat3, Mat4, Vec3};
use rand::Rng;
use std::f32::consts::PI;

use super::definition::EmitterShape;
use super::particle::Particle;
use crate::skeleton::Bone;

/// Flag value of halo emitters on plane emitters
const FLAGS_HALO: u32 = 1041;
/// Flag value of weapon flame emitters
const FLAGS_WEAPON_FLAME: u32 = 25;
/// Flag value of weapon glow emitters
const FLAGS_WEAPON_GLOW: u32 = 17;
/// Weapon effects on bones with a parent below this spawn at the pivot;
/// parent 0 counts as well as roots, so this is not `< 0`.
const WEAPON_PIVOT_PARENT: i16 = 1;
/// Flag values of flattened sphere emitters
const FLAGS_SPHERE_HALO: [u32; 2] = [57, 313];
/// Sphere emitters shoot along the bone's up axis
const FLAG_SPHERE_AS_SOURCE: u32 = 0x100;

const UP: Vec3 = Vec3::Y;
const DOWN: Vec3 = Vec3::NEG_Y;

/// Uniform random float in `[lo, hi]`, tolerating reversed or empty ranges
pub(crate) fn rand_float<R: Rng>(rng: &mut R, lo: f32, hi: f32) -> f32 {
    if !(lo.is_finite() && hi.is_finite()) || lo == hi {
        return if lo.is_finite() { lo } else { 0.0 };
    }
    rng.random_range(lo.min(hi)..=lo.max(hi))
}

/// Random rotation within `spread1`/`spread2`, scaled by the projected emitter size
pub fn spread_matrix<R: Rng>(rng: &mut R, spread1: f32, spread2: f32, w: f32, l: f32) -> Mat4 {
    let a0 = rand_float(rng, -spread1, spread1) / 2.0;
    let a1 = rand_float(rng, -spread2, spread2) / 2.0;
    let size = a0.cos().abs() * l + a0.sin().abs() * w;
    Mat4::from_mat3(Mat3::from_rotation_x(a0) * Mat3::from_rotation_z(a1) * size)
}

/// Values sampled from the emitter's tracks for one spawn batch
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SpawnParams {
    /// Half the spawn area length
    pub w: f32,
    /// Half the spawn area width
    pub l: f32,
    pub speed: f32,
    pub variation: f32,
    pub spread: f32,
    pub lat: f32,
    pub lifespan: f32,
}

/// Static emitter data consulted while spawning
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnSource {
    /// Raw flag word
    pub flags: u32,
    /// Emitter position relative to its bone
    pub pos: Vec3,
    /// Number of tiles in the texture atlas
    pub tile_count: usize,
}

/// Emitter shape with its spawn routine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emitter {
    Plane,
    Sphere,
}

impl From<EmitterShape> for Emitter {
    fn from(shape: EmitterShape) -> Self {
        match shape {
            EmitterShape::Plane => Self::Plane,
            EmitterShape::Sphere => Self::Sphere,
        }
    }
}

impl Emitter {
    /// Create one particle relative to the emitter's bone
    pub fn new_particle<R: Rng>(
        self,
        source: &SpawnSource,
        params: &SpawnParams,
        bone: &Bone,
        rng: &mut R,
    ) -> Particle {
        let mut p = match self {
            Self::Plane => plane_particle(source, params, bone, rng),
            Self::Sphere => sphere_particle(source, params, bone, rng),
        };

        p.life = 0.0;
        p.maxlife = if params.lifespan == 0.0 { 1.0 } else { params.lifespan };
        p.origin = p.pos;
        p.tile = if source.tile_count > 1 {
            rng.random_range(0..source.tile_count)
        } else {
            0
        };
        p
    }
}

fn plane_particle<R: Rng>(
    source: &SpawnSource,
    params: &SpawnParams,
    bone: &Bone,
    rng: &mut R,
) -> Particle {
    let SpawnParams {
        w,
        l,
        speed: spd,
        variation: var,
        spread: spr,
        ..
    } = *params;
    let mrot = bone.mrot * spread_matrix(rng, spr, spr, 1.0, 1.0);
    let mut p = Particle::default();

    match source.flags {
        FLAGS_HALO => {
            let offset = Vec3::new(rand_float(rng, -l, l), 0.0, rand_float(rng, -w, w));
            p.pos = bone.mat.transform_point3(source.pos + offset);
            let t = rand_float(rng, 0.0, 2.0 * PI);
            // The ring replaces the rectangle draw above.
            p.pos = Vec3::new(0.0, source.pos.y + 0.15, source.pos.z)
                + Vec3::new(t.cos() / 8.0, 0.0, t.sin() / 8.0);
            p.dir = UP;
            p.speed = UP * spd * rand_float(rng, 0.0, var);
        }
        FLAGS_WEAPON_FLAME if bone.parent < WEAPON_PIVOT_PARENT => {
            let offset = Vec3::new(
                rand_float(rng, -l, l),
                rand_float(rng, -l, l),
                rand_float(rng, -w, w),
            );
            p.pos = bone.pivot + source.pos + offset;
            p.dir = mrot.transform_vector3(UP).normalize_or_zero();
        }
        FLAGS_WEAPON_FLAME => {
            let offset = Vec3::new(
                rand_float(rng, -l, l),
                rand_float(rng, -l, l),
                rand_float(rng, -w, w),
            );
            p.pos = bone.mat.transform_point3(source.pos + offset);
            let dir = Vec3::new(bone.mat.y_axis.y, 0.0, 0.0);
            p.speed = dir.normalize_or_zero() * spd * rand_float(rng, 0.0, var * 2.0);
        }
        FLAGS_WEAPON_GLOW if bone.parent < WEAPON_PIVOT_PARENT => {
            let offset = Vec3::new(rand_float(rng, -l, l), 0.0, rand_float(rng, -w, w));
            p.pos = bone.pivot + source.pos + offset;
            p.dir = mrot.transform_vector3(UP).normalize_or_zero();
        }
        _ => {
            let offset = Vec3::new(rand_float(rng, -l, l), 0.0, rand_float(rng, -w, w));
            p.pos = bone.mat.transform_point3(source.pos + offset);
            let dir = mrot.transform_vector3(UP);
            p.dir = dir;
            p.down = DOWN;
            p.speed = dir.normalize_or_zero() * spd * (1.0 + rand_float(rng, -var, var));
        }
    }
    p
}

fn sphere_particle<R: Rng>(
    source: &SpawnSource,
    params: &SpawnParams,
    bone: &Bone,
    rng: &mut R,
) -> Particle {
    let SpawnParams {
        w,
        l,
        speed: spd,
        variation: var,
        spread: spr,
        lat: spr2,
        ..
    } = *params;

    let radius = rand_float(rng, 0.0, 1.0);
    let t = if spr == 0.0 {
        rand_float(rng, -PI, PI)
    } else {
        rand_float(rng, -spr, spr)
    };
    let mrot = bone.mrot * spread_matrix(rng, spr * 2.0, spr2 * 2.0, w, l);

    let mut p = Particle::default();
    let mut dir = Vec3::ZERO;

    if FLAGS_SPHERE_HALO.contains(&source.flags) {
        let bdir = Vec3::new(w * t.cos() * 1.6, 0.0, l * t.sin() * 1.6);
        p.pos = bone.mat.transform_point3(source.pos + bdir);
        if bdir.length_squared() == 0.0 {
            p.speed = Vec3::ZERO;
        } else {
            let launch = bone.mrot.transform_vector3(bdir.normalize());
            p.speed = launch.normalize_or_zero() * spd * (1.0 + rand_float(rng, -var, var));
        }
    } else {
        let mut bdir = mrot.transform_vector3(UP) * radius;
        std::mem::swap(&mut bdir.y, &mut bdir.z);
        p.pos = bone.mat.transform_point3(source.pos) + bdir;

        let as_source = source.flags & FLAG_SPHERE_AS_SOURCE != 0;
        if bdir.length_squared() == 0.0 && !as_source {
            p.speed = Vec3::ZERO;
            dir = bone.mrot.transform_vector3(UP);
        } else {
            dir = if as_source {
                bone.mrot.transform_vector3(UP)
            } else {
                bdir.normalize()
            };
            p.speed = dir.normalize_or_zero() * spd * (1.0 + rand_float(rng, -var, var));
        }
    }

    p.dir = dir.normalize_or_zero();
    p.down = DOWN;
    p
}
