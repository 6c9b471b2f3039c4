//! Runtime configuration

#[cfg(feature = "serde-support")]
use serde::{Deserialize, Serialize};

/// Hard cap on live particles per particle system
pub const MAX_PARTICLES: usize = 10_000;

/// Configuration shared by the loader, decoder and per-frame simulation
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde-support", serde(default))]
pub struct RuntimeConfig {
    /// Number of background threads decoding queued models
    pub loader_threads: usize,
    /// Maximum number of live particles in one particle system
    pub max_particles: usize,
    /// Maximum parent chain length followed while computing bone matrices
    pub max_bone_depth: usize,
    /// Fetch `.anim` companion files for sequences that are not embedded
    pub load_external_animations: bool,
    /// Fixed seed for particle randomization, `None` seeds from the OS
    pub particle_seed: Option<u64>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            loader_threads: 2,
            max_particles: MAX_PARTICLES,
            max_bone_depth: 256,
            load_external_animations: true,
            particle_seed: None,
        }
    }
}

impl RuntimeConfig {
    /// Particle cap clamped to the hard limit
    pub fn particle_cap(&self) -> usize {
        self.max_particles.min(MAX_PARTICLES)
    }
}
