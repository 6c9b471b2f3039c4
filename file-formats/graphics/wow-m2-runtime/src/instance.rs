//! Per-instance runtime state
//!
//! A [`Model`] is immutable once decoded and can back any number of
//! [`ModelInstance`]s. Each instance owns the mutable parts: its own copy of
//! the skeleton, particle systems and ribbons, the active animation and the
//! elapsed time. Instances of models whose pose does not depend on the
//! camera can share one evaluated pose per frame through a [`PoseCache`].

use glam::Mat4;
use std::collections::HashMap;
use std::sync::Arc;

use crate::animation::ResolvedAnimation;
use crate::chunks::{LightState, TextureType};
use crate::config::RuntimeConfig;
use crate::error::{M2Error, Result};
use crate::model::Model;
use crate::particles::{EmitterFrame, ParticleSystem};
use crate::provider::TextureRef;
use crate::render::{
    RenderBackend, RenderPass, RenderStateCache, ReplaceableTextures, activate_pass,
};
use crate::ribbon::RibbonEmitter;
use crate::skeleton::{PoseInput, Skeleton};

/// Animation id of the stand animation
pub const ANIMATION_STAND: u16 = 0;

/// Identifies one evaluated pose of a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoseKey {
    /// Caller-chosen frame counter
    pub frame: u64,
    pub animation: usize,
    pub time: u32,
    pub global_time: u32,
}

/// Last evaluated bone matrices per model
#[derive(Debug, Default)]
pub struct PoseCache {
    poses: HashMap<String, (PoseKey, Vec<(Mat4, Mat4)>)>,
}

impl PoseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pose of `model` evaluated under `key`
    pub fn get(&self, model: &str, key: PoseKey) -> Option<&[(Mat4, Mat4)]> {
        self.poses
            .get(model)
            .filter(|(cached, _)| *cached == key)
            .map(|(_, pose)| pose.as_slice())
    }

    /// Store a pose, replacing whatever the model had before
    pub fn insert(&mut self, model: &str, key: PoseKey, pose: Vec<(Mat4, Mat4)>) {
        self.poses.insert(model.to_string(), (key, pose));
    }

    pub fn remove(&mut self, model: &str) {
        self.poses.remove(model);
    }

    pub fn clear(&mut self) {
        self.poses.clear();
    }

    pub fn len(&self) -> usize {
        self.poses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }
}

/// Outcome of one [`ModelInstance::update`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameState {
    /// Active sequence, `None` when the animation id has no sequences
    pub animation: Option<ResolvedAnimation>,
    /// Position fed to tracks, emitters and draw preparation
    pub frame: EmitterFrame,
    /// Whether the pose came from the cache
    pub shared_pose: bool,
}

/// One placed copy of a model
#[derive(Debug, Clone)]
pub struct ModelInstance {
    model: Arc<Model>,
    skeleton: Skeleton,
    particle_systems: Vec<ParticleSystem>,
    ribbons: Vec<RibbonEmitter>,
    animation_id: u16,
    elapsed_ms: u64,
    global_time: u32,
    frame: EmitterFrame,
    /// Textures bound to replaceable slots for this instance
    pub replaceable: ReplaceableTextures,
    /// Camera/model-view matrix used by billboarded bones
    pub model_view: Mat4,
}

impl ModelInstance {
    /// New instance playing the stand animation
    pub fn new(model: Arc<Model>, config: &RuntimeConfig) -> Self {
        let mut particle_systems = model.particle_systems.clone();
        for (i, system) in particle_systems.iter_mut().enumerate() {
            system.reseed(config.particle_seed.map(|seed| seed.wrapping_add(i as u64)));
        }

        Self {
            skeleton: model.skeleton.clone(),
            ribbons: model.ribbons.clone(),
            replaceable: model.default_replaceable_textures().clone(),
            particle_systems,
            animation_id: ANIMATION_STAND,
            elapsed_ms: 0,
            global_time: 0,
            frame: EmitterFrame::default(),
            model_view: Mat4::IDENTITY,
            model,
        }
    }

    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }

    pub fn skeleton(&self) -> &Skeleton {
        &self.skeleton
    }

    pub fn particle_systems(&self) -> &[ParticleSystem] {
        &self.particle_systems
    }

    pub fn ribbons(&self) -> &[RibbonEmitter] {
        &self.ribbons
    }

    pub fn animation_id(&self) -> u16 {
        self.animation_id
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }

    /// Switch to another animation id, restarting its clock
    pub fn set_animation(&mut self, animation_id: u16) -> Result<()> {
        if !self.model.clock.has_animation(animation_id) {
            return Err(M2Error::UnknownAnimation(animation_id));
        }
        if animation_id != self.animation_id {
            self.animation_id = animation_id;
            self.elapsed_ms = 0;
        }
        Ok(())
    }

    /// Bind a texture to a replaceable slot of this instance
    pub fn set_replaceable_texture(&mut self, texture_type: TextureType, texture: TextureRef) {
        self.replaceable.set(texture_type, texture);
    }

    /// Advance time by `dt_ms` and recompute pose, particles and ribbons
    ///
    /// When the model needs no per-instance pose, `cache` is consulted with a
    /// key built from `frame` and the resolved animation position.
    pub fn update(&mut self, dt_ms: u32, frame: u64, cache: Option<&mut PoseCache>) -> FrameState {
        self.elapsed_ms = self.elapsed_ms.saturating_add(u64::from(dt_ms));
        self.global_time = self.global_time.wrapping_add(dt_ms);

        let Some(resolved) = self.model.resolve_animation(self.animation_id, self.elapsed_ms) else {
            return FrameState {
                animation: None,
                frame: self.frame,
                shared_pose: false,
            };
        };

        self.frame = EmitterFrame {
            animation: resolved.sequence_index,
            time: resolved.local_time,
            global_time: self.global_time,
        };

        let shared_pose = self.evaluate_pose(frame, cache);

        let dt = dt_ms as f32 / 1000.0;
        for system in &mut self.particle_systems {
            system.update(&self.skeleton, self.frame, dt);
        }
        for ribbon in &mut self.ribbons {
            ribbon.setup(&self.skeleton, self.frame);
        }

        FrameState {
            animation: Some(resolved),
            frame: self.frame,
            shared_pose,
        }
    }

    fn evaluate_pose(&mut self, frame: u64, cache: Option<&mut PoseCache>) -> bool {
        let input = PoseInput {
            model_view: self.model_view,
            animation: self.frame.animation,
            time: self.frame.time,
            global_time: self.frame.global_time,
        };

        let cache = cache.filter(|_| !self.model.requires_per_instance_animation());
        let Some(cache) = cache else {
            self.skeleton.evaluate(&input);
            return false;
        };

        let key = PoseKey {
            frame,
            animation: input.animation,
            time: input.time,
            global_time: input.global_time,
        };
        if let Some(pose) = cache.get(&self.model.path, key) {
            self.skeleton.apply_pose(pose);
            return true;
        }

        self.skeleton.evaluate(&input);
        cache.insert(&self.model.path, key, self.skeleton.pose());
        false
    }

    /// Drop all particles and restart ribbons at their anchors
    pub fn reset_emitters(&mut self) {
        for system in &mut self.particle_systems {
            system.reset();
        }
        self.ribbons.clone_from(&self.model.ribbons);
    }

    /// Light values for the current pose
    pub fn lights(&self) -> Vec<LightState> {
        self.model.light_states(&self.skeleton, self.frame)
    }

    /// Bone matrices of the current pose, for skinning upload
    pub fn bone_matrices(&self) -> Vec<Mat4> {
        self.skeleton.bone_matrices()
    }

    /// Activate every drawable pass in order, calling `draw` after each
    ///
    /// Returns the number of passes drawn.
    pub fn draw<B, F>(&self, cache: &mut RenderStateCache, backend: &mut B, mut draw: F) -> usize
    where
        B: RenderBackend + ?Sized,
        F: FnMut(&mut B, &RenderPass),
    {
        let ctx = self.model.draw_context(&self.replaceable, self.frame);
        let mut drawn = 0;
        for pass in &self.model.render_passes {
            if activate_pass(pass, &ctx, cache, backend) {
                draw(backend, pass);
                drawn += 1;
            }
        }
        drawn
    }
}
