use crate::chunks::BlendMode;
use crate::render::shader::PixelShader;
use crate::skin::TextureUnit;

/// Texture-unit lookup value selecting how a slot samples its coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub enum TextureUnitLookup {
    /// Sphere environment mapping (-1 in the file)
    Environment,
    /// First texture coordinate set
    FirstSet,
    /// Second texture coordinate set
    SecondSet,
    /// Anything else
    #[default]
    None,
}

impl TextureUnitLookup {
    pub fn from_raw(value: i16) -> Self {
        match value {
            -1 => Self::Environment,
            0 => Self::FirstSet,
            1 => Self::SecondSet,
            _ => Self::None,
        }
    }
}

/// One resolved draw of a submesh with up to two textures
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPass {
    pub flags: u8,
    pub priority_plane: i8,
    /// Shader id after reconstruction and layer merging
    pub shader_id: u16,
    pub submesh: usize,
    pub geoset_index: u16,
    /// Index into the color table, -1 for none
    pub color_index: i16,
    pub renderflag_index: u16,
    pub material_layer: u16,
    pub texture_count: u16,
    pub texture_combo_index: u16,
    pub texture_coord_combo_index: u16,
    pub transparency_combo_index: u16,
    pub animation_combo_index: u16,
    /// Blend mode of the render flag entry, used for ordering
    pub blend: BlendMode,
    /// Model texture indices of both slots
    pub textures: [Option<usize>; 2],
    /// Texture animation indices of both slots
    pub uv_animations: [Option<usize>; 2],
    pub tu_lookups: [TextureUnitLookup; 2],
    /// `None` once the pass is known not to draw
    pub pixel_shader: Option<PixelShader>,
    /// Minimum X of the submesh's vertices, last sort key
    pub ordering_x: f32,
}

impl RenderPass {
    /// Pass for a texture unit before any resolution
    pub fn from_unit(unit: &TextureUnit) -> Self {
        Self {
            flags: unit.flags,
            priority_plane: unit.priority_plane,
            shader_id: unit.shader_id,
            submesh: usize::from(unit.submesh),
            geoset_index: unit.geoset_index,
            color_index: unit.color_index,
            renderflag_index: unit.renderflag_index,
            material_layer: unit.material_layer,
            texture_count: unit.texture_count,
            texture_combo_index: unit.texture_combo_index,
            texture_coord_combo_index: unit.texture_coord_combo_index,
            transparency_combo_index: unit.transparency_combo_index,
            animation_combo_index: unit.animation_combo_index,
            blend: BlendMode::Opaque,
            textures: [None; 2],
            uv_animations: [None; 2],
            tu_lookups: [TextureUnitLookup::None; 2],
            pixel_shader: None,
            ordering_x: 0.0,
        }
    }

    /// Number of texture slots the pass samples
    pub fn slot_count(&self) -> usize {
        usize::from(self.texture_count).clamp(1, 2)
    }
}
