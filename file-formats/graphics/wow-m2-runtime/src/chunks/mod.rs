//! Fixed-size records of the model file and their decoded runtime forms

pub mod color;
pub mod light;
pub mod material;
pub mod texture;
pub mod texture_animation;
pub mod transparency;
pub mod vertex;

pub use color::{ColorRecord, ModelColor};
pub use light::{LightRecord, LightState, LightType, ModelLight};
pub use material::{BlendMode, RenderFlagRecord, RenderFlags};
pub use texture::{ModelTexture, TextureRecord, TextureType};
pub use texture_animation::{TextureAnimation, TextureAnimationRecord};
pub use transparency::{ModelTransparency, TransparencyRecord};
pub use vertex::{ModelVertex, VertexBuffers};
