//! M2 animation system
//!
//! This module provides the time side of model animation:
//! - Animated tracks with step, linear and Hermite interpolation
//! - Global sequences that loop independently of the active clip
//! - Sequence records, including companion `.anim` file naming
//! - The animation clock that maps elapsed time onto sub-animations
//!
//! # Example
//!
//! ```rust,ignore
//! use wow_m2_runtime::animation::AnimationClock;
//!
//! let clock = AnimationClock::new(model.sequences());
//! if let Some(active) = clock.resolve(animation_id, elapsed_ms) {
//!     let t = bone.translation.get_value(active.sequence_index, active.local_time, global_ms);
//! }
//! ```

pub mod clock;
pub mod sequence;
pub mod track;
pub mod types;

pub use clock::{AnimationClock, ResolvedAnimation};
pub use sequence::{AnimationSequence, SequenceFlags, SequenceRecord};
pub use track::{AnimatedTrack, AnimationBlock, FakeAnimationBlock, KeyframeSource, TrackContext};
pub use types::{Interpolate, InterpolationType, life_ramp};
