//! Runtime for World of Warcraft M2 models
//!
//! Decodes version 264 models and their first skin profile into static
//! tables once, then animates them every frame: skeletal poses, particle
//! systems, ribbon trails and render pass state.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use wow_m2_runtime::{MemoryProvider, ModelInstance, ModelLoader, PoseCache, RuntimeConfig};
//!
//! let config = RuntimeConfig::default();
//! let loader = ModelLoader::new(Arc::new(files), config.clone());
//! let handle = loader.load("Creature\\Bear\\Bear.m2");
//!
//! if let Some(model) = handle.wait_until_loaded() {
//!     let mut instance = ModelInstance::new(model, &config);
//!     let mut poses = PoseCache::new();
//!     instance.update(16, frame, Some(&mut poses));
//!     instance.draw(&mut state_cache, &mut backend, |backend, pass| {
//!         // draw the submesh of `pass`
//!     });
//! }
//! ```

pub mod animation;
pub mod buffer;
pub mod chunks;
pub mod config;
pub mod coordinate;
pub mod error;
pub mod header;
pub mod instance;
pub mod loader;
pub mod model;
pub mod particles;
pub mod provider;
pub mod render;
pub mod ribbon;
pub mod skeleton;
pub mod skin;

pub use animation::{AnimatedTrack, AnimationClock, AnimationSequence, ResolvedAnimation};
pub use config::RuntimeConfig;
pub use error::{M2Error, Result};
pub use header::ModelHeader;
pub use instance::{FrameState, ModelInstance, PoseCache, PoseKey};
pub use loader::{LoadState, ModelHandle, ModelLoader};
pub use model::{AnimationKinds, FakeGeometry, Model};
pub use particles::{EmitterFrame, ParticleSystem};
pub use provider::{
    DirectoryProvider, FileProvider, MemoryProvider, TextureHandle, TextureProvider, TextureRef,
};
pub use render::{
    PixelShader, RenderBackend, RenderPass, RenderPassDescriptor, RenderStateCache,
    ReplaceableTextures,
};
pub use ribbon::RibbonEmitter;
pub use skeleton::{Bone, PoseInput, Skeleton};
pub use skin::Skin;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
