//! Per-frame activation of render passes and the backend state cache

use glam::{Mat4, Vec4};
use std::collections::HashMap;

use crate::chunks::{
    BlendMode, ModelColor, ModelTransparency, RenderFlagRecord, RenderFlags, TextureAnimation,
    TextureType,
};
use crate::provider::TextureRef;
use crate::render::pass::RenderPass;
use crate::render::shader::PixelShader;

/// Sink for the state changes of a draw
///
/// Each call is only made when the value differs from the previous pass
/// applied through the same [`RenderStateCache`].
pub trait RenderBackend {
    fn set_blend_mode(&mut self, blend: BlendMode);
    /// Back-face culling, disabled for two-sided passes
    fn set_culling(&mut self, enabled: bool);
    fn set_depth_write(&mut self, enabled: bool);
    fn set_fog(&mut self, enabled: bool);
    fn set_lighting(&mut self, enabled: bool);
    fn bind_texture(&mut self, slot: usize, texture: Option<TextureRef>);
    fn set_uv_matrix(&mut self, slot: usize, matrix: Mat4);
    fn set_pixel_shader(&mut self, shader: PixelShader);
    fn set_mesh_color(&mut self, color: Vec4);
}

/// Everything the backend needs to draw one pass
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub struct RenderPassDescriptor {
    pub blend_mode: BlendMode,
    pub two_sided: bool,
    pub z_buffered: bool,
    pub unfogged: bool,
    pub unlit: bool,
    pub textures: [Option<TextureRef>; 2],
    pub uv_matrices: [Mat4; 2],
    pub pixel_shader: PixelShader,
    pub mesh_color: Vec4,
}

/// Textures bound to replaceable slots, keyed by texture type
#[derive(Debug, Clone, Default)]
pub struct ReplaceableTextures {
    slots: HashMap<u32, TextureRef>,
}

impl ReplaceableTextures {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a texture to the slot of a texture type
    pub fn set(&mut self, texture_type: TextureType, texture: TextureRef) {
        self.slots.insert(texture_type.raw(), texture);
    }

    pub fn get(&self, texture_type: TextureType) -> Option<TextureRef> {
        self.slots.get(&texture_type.raw()).copied()
    }

    pub fn clear(&mut self, texture_type: TextureType) -> Option<TextureRef> {
        self.slots.remove(&texture_type.raw())
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Texture lookup of a model, with per-instance replaceable slots
#[derive(Debug, Clone, Copy)]
pub struct TextureBindings<'a> {
    /// Texture loaded for every model texture, if any
    pub loaded: &'a [Option<TextureRef>],
    pub types: &'a [TextureType],
    pub replaceable: &'a ReplaceableTextures,
}

impl TextureBindings<'_> {
    /// Texture bound for model texture `index`
    ///
    /// Special textures prefer the instance's replaceable slot and fall back
    /// to their placeholder.
    pub fn resolve(&self, index: usize) -> Option<TextureRef> {
        let loaded = self.loaded.get(index).copied().flatten();
        match self.types.get(index) {
            Some(&ty) if ty != TextureType::Inline => self.replaceable.get(ty).or(loaded),
            _ => loaded,
        }
    }
}

/// Per-frame inputs of [`prepare_draw`]
#[derive(Debug, Clone, Copy)]
pub struct DrawContext<'a> {
    pub render_flags: &'a [RenderFlagRecord],
    pub colors: &'a [ModelColor],
    pub transparency: &'a [ModelTransparency],
    pub transparency_lookup: &'a [i16],
    pub texture_animations: &'a [TextureAnimation],
    /// Visibility of every submesh, missing entries are visible
    pub submesh_visible: &'a [bool],
    pub textures: TextureBindings<'a>,
    pub animation: usize,
    pub time: u32,
    pub global_time: u32,
}

/// Build the descriptor of a pass for this frame, `None` to skip it
pub fn prepare_draw(pass: &RenderPass, ctx: &DrawContext<'_>) -> Option<RenderPassDescriptor> {
    if !ctx.submesh_visible.get(pass.submesh).copied().unwrap_or(true) {
        return None;
    }
    let pixel_shader = pass.pixel_shader?;

    let (anim, time, gt) = (ctx.animation, ctx.time, ctx.global_time);

    let mut mesh_color = Vec4::ONE;
    let mut emissive_alpha = None;
    let color = usize::try_from(pass.color_index)
        .ok()
        .and_then(|i| ctx.colors.get(i));
    if let Some(color) = color {
        if color.color.uses(anim) {
            mesh_color = color.color.get_value(anim, time, gt).extend(1.0);
        }
        if color.opacity.uses(anim) {
            mesh_color.w = color.opacity.get_value(anim, time, gt);
        }
        emissive_alpha = Some(mesh_color.w);
    }

    let transparency = ctx
        .transparency_lookup
        .get(usize::from(pass.transparency_combo_index))
        .and_then(|&i| usize::try_from(i).ok())
        .and_then(|i| ctx.transparency.get(i));
    // Sampled at the start of animation 0, whatever is playing.
    if let Some(transparency) = transparency
        && transparency.trans.uses(0)
    {
        let weight = transparency.trans.get_value(0, 0, gt);
        mesh_color.w *= weight;
        emissive_alpha = emissive_alpha.map(|a| a * weight);
    }

    if mesh_color.w <= 0.0 || emissive_alpha.is_some_and(|a| a <= 0.0) {
        return None;
    }

    let flags = ctx
        .render_flags
        .get(usize::from(pass.renderflag_index))
        .copied()
        .unwrap_or_default();

    let mut textures = [None; 2];
    let mut uv_matrices = [Mat4::IDENTITY; 2];
    for slot in 0..pass.slot_count() {
        textures[slot] = pass.textures[slot].and_then(|i| ctx.textures.resolve(i));
        let animation = pass.uv_animations[slot].and_then(|i| ctx.texture_animations.get(i));
        if let Some(animation) = animation {
            uv_matrices[slot] = animation.matrix(anim, time, gt);
        }
    }

    Some(RenderPassDescriptor {
        blend_mode: flags.blend,
        two_sided: flags.flags.contains(RenderFlags::TWO_SIDED),
        z_buffered: !flags.flags.contains(RenderFlags::NO_ZBUFFER),
        unfogged: flags.flags.contains(RenderFlags::UNFOGGED),
        unlit: flags.flags.contains(RenderFlags::UNLIT),
        textures,
        uv_matrices,
        pixel_shader,
        mesh_color,
    })
}

/// Last state emitted to a backend
#[derive(Debug, Clone, Default)]
pub struct RenderStateCache {
    blend: Option<BlendMode>,
    culling: Option<bool>,
    depth_write: Option<bool>,
    fog: Option<bool>,
    lighting: Option<bool>,
    textures: [Option<Option<TextureRef>>; 2],
    uv_matrices: [Option<Mat4>; 2],
    pixel_shader: Option<PixelShader>,
    mesh_color: Option<Vec4>,
}

fn changed<T: PartialEq + Copy>(cached: &mut Option<T>, value: T) -> bool {
    if *cached == Some(value) {
        return false;
    }
    *cached = Some(value);
    true
}

impl RenderStateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything, the next pass emits its full state
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Emit the state of `descriptor` that differs from the previous one
    pub fn apply<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        descriptor: &RenderPassDescriptor,
    ) {
        if changed(&mut self.blend, descriptor.blend_mode) {
            backend.set_blend_mode(descriptor.blend_mode);
        }
        if changed(&mut self.culling, !descriptor.two_sided) {
            backend.set_culling(!descriptor.two_sided);
        }
        if changed(&mut self.depth_write, descriptor.z_buffered) {
            backend.set_depth_write(descriptor.z_buffered);
        }
        if changed(&mut self.fog, !descriptor.unfogged) {
            backend.set_fog(!descriptor.unfogged);
        }
        if changed(&mut self.lighting, !descriptor.unlit) {
            backend.set_lighting(!descriptor.unlit);
        }
        for slot in 0..2 {
            if changed(&mut self.textures[slot], descriptor.textures[slot]) {
                backend.bind_texture(slot, descriptor.textures[slot]);
            }
            if changed(&mut self.uv_matrices[slot], descriptor.uv_matrices[slot]) {
                backend.set_uv_matrix(slot, descriptor.uv_matrices[slot]);
            }
        }
        if changed(&mut self.pixel_shader, descriptor.pixel_shader) {
            backend.set_pixel_shader(descriptor.pixel_shader);
        }
        if changed(&mut self.mesh_color, descriptor.mesh_color) {
            backend.set_mesh_color(descriptor.mesh_color);
        }
    }
}

/// Prepare a pass and emit its state, returning whether it should be drawn
pub fn activate_pass<B: RenderBackend + ?Sized>(
    pass: &RenderPass,
    ctx: &DrawContext<'_>,
    cache: &mut RenderStateCache,
    backend: &mut B,
) -> bool {
    match prepare_draw(pass, ctx) {
        Some(descriptor) => {
            cache.apply(backend, &descriptor);
            true
        }
        None => false,
    }
}
