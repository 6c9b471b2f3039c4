//! Particle emitters for M2 models
//!
//! Each emitter definition becomes a [`ParticleSystem`] attached to a bone.
//! Systems spawn particles at a rate driven by their animated tracks, using
//! the spawn geometry of their [`Emitter`] shape, then integrate gravity,
//! deceleration and drag every update. Size and color follow a two-segment
//! ramp over each particle's lifetime.
//!
//! # Usage
//!
//! ```rust,ignore
//! use wow_m2_runtime::particles::EmitterFrame;
//!
//! skeleton.evaluate(&pose);
//! for system in &mut particle_systems {
//!     system.update(&skeleton, EmitterFrame { animation, time, global_time }, dt);
//! }
//! ```

pub mod definition;
pub mod emitter;
pub mod particle;
pub mod system;

pub use definition::{EmitterShape, ParticleEmitterRecord, ParticleFlags};
pub use emitter::{Emitter, SpawnParams, SpawnSource, spread_matrix};
pub use particle::Particle;
pub use system::{EmitterFrame, ParticleSystem, TileCoords, build_tiles};
