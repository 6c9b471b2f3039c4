//! Resolution of (animation id, elapsed time) into a concrete sequence and local time

use std::collections::{BTreeMap, HashMap};

use super::sequence::AnimationSequence;

/// Result of resolving an animation id at some elapsed time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedAnimation {
    /// Index of the active sequence in the model's sequence table
    pub sequence_index: usize,
    /// Time inside the active sequence, in milliseconds
    pub local_time: u32,
}

/// Sub-animations grouped by animation id and ordered by sub id
#[derive(Debug, Clone, Default)]
pub struct AnimationClock {
    animations: HashMap<u16, BTreeMap<u16, AnimationSequence>>,
}

impl AnimationClock {
    /// Register every sequence of a model
    pub fn new(sequences: &[AnimationSequence]) -> Self {
        let mut animations: HashMap<u16, BTreeMap<u16, AnimationSequence>> = HashMap::new();
        for sequence in sequences {
            animations
                .entry(sequence.id)
                .or_default()
                .insert(sequence.sub_id, *sequence);
        }
        Self { animations }
    }

    /// Check if any sequence is registered for `animation_id`
    pub fn has_animation(&self, animation_id: u16) -> bool {
        self.animations.contains_key(&animation_id)
    }

    /// Registered animation ids
    pub fn animation_ids(&self) -> impl Iterator<Item = u16> + '_ {
        self.animations.keys().copied()
    }

    /// Summed length of every sub-animation of `animation_id`
    pub fn total_length(&self, animation_id: u16) -> Option<u64> {
        self.animations
            .get(&animation_id)
            .map(|subs| subs.values().map(|s| u64::from(s.length)).sum())
    }

    /// Resolve the active sub-animation for `animation_id` after `elapsed_ms`
    ///
    /// Returns `None` when the id has no sequences; the caller skips animating.
    pub fn resolve(&self, animation_id: u16, elapsed_ms: u64) -> Option<ResolvedAnimation> {
        let subs = self.animations.get(&animation_id)?;
        let total: u64 = subs.values().map(|s| u64::from(s.length)).sum();
        if total == 0 {
            return None;
        }

        let mut t = elapsed_ms % total;
        for sequence in subs.values() {
            let length = u64::from(sequence.length);
            if t < length {
                return Some(ResolvedAnimation {
                    sequence_index: sequence.index,
                    local_time: t as u32,
                });
            }
            t -= length;
        }

        None
    }
}
