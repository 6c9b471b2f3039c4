//! Legacy shader id reconstruction and pixel shader selection
//!
//! The 16-bit shader id is a fixed external bit layout:
//!
//! ```text
//! bit 15       resolved layer combination, low bits select an alpha combiner
//! bit 14       second texture slot samples the environment map
//! bits 4..=6   fragment mode of the first texture
//! bit 7        first slot samples the environment map (override table only)
//! bits 0..=2   fragment mode of the second texture
//! bit 3        second slot samples the environment map (override table only)
//! ```

/// Id already resolved by layer merging
pub const SHADER_RESOLVED: u16 = 0x8000;
/// The merged-away layer of a combination, never drawn
pub const SHADER_MERGED_LAYER: u16 = SHADER_RESOLVED;
/// Second slot uses environment mapping
pub const SHADER_ENV_SECOND: u16 = 0x4000;
/// Environment bit of one slot value before packing
pub const SHADER_ENV_SLOT: u16 = 0x8;
/// Shift of the first slot's value
pub const SHADER_FIRST_SHIFT: u16 = 4;
/// Mask of one fragment mode
pub const SHADER_MODE_MASK: u16 = 0x7;
/// Mask of the combiner selector of resolved ids
pub const SHADER_RESOLVED_MASK: u16 = 0x7FFF;
/// Id consulted when a single-texture mode is unknown
pub const SHADER_SINGLE_FALLBACK: u16 = 0x11;

/// Resolved combiner: opaque base, mod2x layer without alpha, alpha output
pub const RESOLVED_MOD2X_NA_ALPHA: u16 = SHADER_RESOLVED | 1;
/// Resolved combiner: opaque base, additive alpha layer
pub const RESOLVED_ADD_ALPHA: u16 = SHADER_RESOLVED | 2;
/// Resolved combiner: opaque base, additive alpha layer, alpha output
pub const RESOLVED_ADD_ALPHA_ALPHA: u16 = SHADER_RESOLVED | 3;

/// Fragment combiner selected for a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
#[repr(u16)]
pub enum PixelShader {
    Opaque = 0,
    Decal,
    Add,
    Mod2x,
    Fade,
    Mod,
    OpaqueOpaque,
    OpaqueAdd,
    OpaqueMod2x,
    OpaqueMod2xNA,
    OpaqueAddNA,
    OpaqueMod,
    ModOpaque,
    ModAdd,
    ModMod2x,
    ModMod2xNA,
    ModAddNA,
    ModMod,
    AddMod,
    Mod2xMod2x,
    OpaqueMod2xNAAlpha,
    OpaqueAddAlpha,
    OpaqueAddAlphaAlpha,
}

impl PixelShader {
    /// Numeric id handed to the backend
    pub fn id(self) -> u16 {
        self as u16
    }
}

/// Fragment mode of the first texture
pub fn first_mode(shader_id: u16) -> u16 {
    (shader_id >> SHADER_FIRST_SHIFT) & SHADER_MODE_MASK
}

/// Fragment mode of the second texture
pub fn second_mode(shader_id: u16) -> u16 {
    shader_id & SHADER_MODE_MASK
}

/// Shader id of a pass when the model has no blend-override table
pub fn legacy_shader_id(blended: bool, environment: bool) -> u16 {
    let mut shader = u16::from(blended);
    shader <<= SHADER_FIRST_SHIFT;
    if environment {
        shader |= SHADER_ENV_SECOND;
    }
    shader
}

/// Pack the two slot values read from a blend-override table
///
/// `slots[i]` is the override value of slot `i` with its environment flag.
pub fn pack_override_shader_id(slots: [(u16, bool); 2], texture_count: usize) -> u16 {
    let mut values = [0u16; 2];
    for (i, (value, environment)) in slots.iter().enumerate().take(texture_count.min(2)) {
        values[i] = *value;
        if *environment {
            values[i] |= SHADER_ENV_SLOT;
        }
    }

    let mut shader = (values[0] << SHADER_FIRST_SHIFT) | values[1];
    if texture_count >= 2 && slots[1].1 {
        shader |= SHADER_ENV_SECOND;
    }
    shader
}

/// Select the pixel shader of a pass, `None` when the pass must not draw
pub fn pixel_shader(texture_count: u16, shader_id: u16) -> Option<PixelShader> {
    if shader_id & SHADER_RESOLVED != 0 {
        return match shader_id & SHADER_RESOLVED_MASK {
            1 => Some(PixelShader::OpaqueMod2xNAAlpha),
            2 => Some(PixelShader::OpaqueAddAlpha),
            3 => Some(PixelShader::OpaqueAddAlphaAlpha),
            _ => None,
        };
    }

    if texture_count <= 1 {
        single_texture_shader(first_mode(shader_id))
            .or_else(|| single_texture_shader(first_mode(SHADER_SINGLE_FALLBACK)))
    } else {
        two_texture_shader(first_mode(shader_id), second_mode(shader_id))
    }
}

fn single_texture_shader(mode: u16) -> Option<PixelShader> {
    match mode {
        0 => Some(PixelShader::Opaque),
        1 => Some(PixelShader::Mod),
        2 => Some(PixelShader::Decal),
        3 => Some(PixelShader::Add),
        4 => Some(PixelShader::Mod2x),
        5 => Some(PixelShader::Fade),
        _ => None,
    }
}

fn two_texture_shader(mode1: u16, mode2: u16) -> Option<PixelShader> {
    use PixelShader::*;

    match (mode1, mode2) {
        (0, 0) => Some(OpaqueOpaque),
        (0, 1) => Some(OpaqueMod),
        (0, 3) => Some(OpaqueAdd),
        (0, 4) => Some(OpaqueMod2x),
        (0, 6) => Some(OpaqueMod2xNA),
        (0, 7) => Some(OpaqueAddNA),
        (1, 0) => Some(ModOpaque),
        (1, 1) => Some(ModMod),
        (1, 3) => Some(ModAdd),
        (1, 4) => Some(ModMod2x),
        (1, 6) => Some(ModMod2xNA),
        (1, 7) => Some(ModAddNA),
        (3, 1) => Some(AddMod),
        (4, 4) => Some(Mod2xMod2x),
        _ => None,
    }
}
