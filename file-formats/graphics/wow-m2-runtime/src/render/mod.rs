//! Render pass resolution and per-frame activation
//!
//! Passes are resolved once at load time from the skin's texture units:
//! legacy shader ids are reconstructed, stacked material layers are merged
//! into their base pass, pixel shaders are selected and the result is sorted
//! into draw order. Every frame [`prepare_draw`] turns a pass into a
//! [`RenderPassDescriptor`] using the animated color, transparency and UV
//! tracks, and [`RenderStateCache`] forwards only the changed state to a
//! [`RenderBackend`].

pub mod draw;
pub mod pass;
pub mod resolver;
pub mod shader;

pub use draw::{
    DrawContext, RenderBackend, RenderPassDescriptor, RenderStateCache, ReplaceableTextures,
    TextureBindings, activate_pass, prepare_draw,
};
pub use pass::{RenderPass, TextureUnitLookup};
pub use resolver::{MaterialTables, resolve_render_passes};
pub use shader::PixelShader;
