//! Load-time resolution of skin texture units into ordered render passes

use glam::Vec3;

use crate::chunks::{BlendMode, RenderFlagRecord};
use crate::render::pass::{RenderPass, TextureUnitLookup};
use crate::render::shader::{
    RESOLVED_ADD_ALPHA, RESOLVED_ADD_ALPHA_ALPHA, RESOLVED_MOD2X_NA_ALPHA, SHADER_MERGED_LAYER,
    SHADER_RESOLVED, legacy_shader_id, pack_override_shader_id, pixel_shader,
};
use crate::skin::{Skin, SkinSubmesh};

/// Texture-unit lookup value of the environment map
const ENVIRONMENT_LOOKUP: i16 = -1;

/// Model tables consulted while resolving passes
#[derive(Debug, Clone, Copy, Default)]
pub struct MaterialTables<'a> {
    pub render_flags: &'a [RenderFlagRecord],
    pub texture_lookup: &'a [i16],
    pub texture_unit_lookup: &'a [i16],
    pub transparency_lookup: &'a [i16],
    pub texture_animation_lookup: &'a [i16],
    /// Present when the model header carries the blend-override flag
    pub blend_overrides: Option<&'a [u16]>,
}

impl MaterialTables<'_> {
    fn render_flag(&self, index: u16) -> RenderFlagRecord {
        self.render_flags
            .get(usize::from(index))
            .copied()
            .unwrap_or_default()
    }

    fn unit_lookup(&self, index: usize) -> Option<i16> {
        self.texture_unit_lookup.get(index).copied()
    }

    fn transparency(&self, combo: u16) -> Option<i16> {
        self.transparency_lookup.get(usize::from(combo)).copied()
    }

    fn texture(&self, combo: u16) -> Option<i16> {
        self.texture_lookup.get(usize::from(combo)).copied()
    }
}

/// Build, fix up, filter and sort the render passes of a skin
///
/// Passes left without a pixel shader, merged-away layers included, are
/// removed from the result.
pub fn resolve_render_passes(
    skin: &Skin,
    positions: &[Vec3],
    tables: &MaterialTables<'_>,
) -> Vec<RenderPass> {
    let mut passes = build_passes(skin, positions, tables);
    fix_shader_id_blend_override(&mut passes, tables);
    fix_shader_id_layer(&mut passes, tables);
    compute_pixel_shaders(&mut passes);

    let before = passes.len();
    passes.retain(|p| p.pixel_shader.is_some());
    if passes.len() != before {
        log::debug!(
            "Dropped {} of {} render passes without a pixel shader",
            before - passes.len(),
            before
        );
    }

    sort_passes(&mut passes);
    passes
}

/// One pass per texture unit, referencing a valid submesh
pub fn build_passes(
    skin: &Skin,
    positions: &[Vec3],
    tables: &MaterialTables<'_>,
) -> Vec<RenderPass> {
    let mut passes = Vec::with_capacity(skin.texture_units.len());

    for unit in &skin.texture_units {
        let Some(submesh) = skin.submeshes.get(usize::from(unit.submesh)) else {
            log::warn!(
                "Texture unit references submesh {} of {}",
                unit.submesh,
                skin.submeshes.len()
            );
            continue;
        };

        let mut pass = RenderPass::from_unit(unit);
        pass.blend = tables.render_flag(unit.renderflag_index).blend;
        pass.ordering_x = submesh_min_x(skin, submesh, positions);
        passes.push(pass);
    }

    passes
}

fn submesh_min_x(skin: &Skin, submesh: &SkinSubmesh, positions: &[Vec3]) -> f32 {
    let start = submesh.first_index() as usize;
    let end = start + usize::from(submesh.index_count);

    let min = skin
        .indices
        .get(start..end)
        .unwrap_or_default()
        .iter()
        .filter_map(|&i| positions.get(usize::from(i)))
        .fold(f32::INFINITY, |acc, p| acc.min(p.x));

    if min.is_finite() { min } else { 0.0 }
}

/// Reconstruct legacy shader ids from render flags and the override table
pub fn fix_shader_id_blend_override(passes: &mut [RenderPass], tables: &MaterialTables<'_>) {
    for pass in passes.iter_mut() {
        if pass.shader_id & SHADER_RESOLVED != 0 {
            continue;
        }

        let coord_combo = usize::from(pass.texture_coord_combo_index);
        let last = coord_combo + usize::from(pass.texture_count.max(1)) - 1;
        if last >= tables.texture_unit_lookup.len() {
            log::warn!(
                "Texture coord combo {} with {} textures runs past the lookup table of {}",
                coord_combo,
                pass.texture_count,
                tables.texture_unit_lookup.len()
            );
            pass.shader_id = 0;
            pass.texture_count = 1;
            continue;
        }

        let blended = tables.render_flag(pass.renderflag_index).blend.is_blended();
        let is_environment =
            |slot: usize| tables.unit_lookup(coord_combo + slot) == Some(ENVIRONMENT_LOOKUP);

        pass.shader_id = match tables.blend_overrides {
            None => legacy_shader_id(blended, is_environment(0)),
            Some(overrides) => {
                let count = pass.slot_count();
                let mut slots = [(0u16, false); 2];
                for (i, slot) in slots.iter_mut().enumerate().take(count) {
                    let index = usize::from(pass.shader_id) + i;
                    let mut value = match overrides.get(index) {
                        Some(&value) => value,
                        None => {
                            log::warn!(
                                "Blend override {} outside table of {}",
                                index,
                                overrides.len()
                            );
                            0
                        }
                    };
                    if i == 0 && !blended {
                        value = 0;
                    }
                    *slot = (value, is_environment(i));
                }
                pack_override_shader_id(slots, count)
            }
        };
    }
}

fn populate_slots(pass: &mut RenderPass, tables: &MaterialTables<'_>) {
    let index = |table: &[i16], combo: u16, slot: usize| {
        table
            .get(usize::from(combo) + slot)
            .and_then(|&v| usize::try_from(v).ok())
    };

    for slot in 0..pass.slot_count() {
        pass.textures[slot] = index(tables.texture_lookup, pass.texture_combo_index, slot);
        pass.uv_animations[slot] = index(
            tables.texture_animation_lookup,
            pass.animation_combo_index,
            slot,
        );
        pass.tu_lookups[slot] = tables
            .unit_lookup(usize::from(pass.texture_coord_combo_index) + slot)
            .map_or(TextureUnitLookup::None, TextureUnitLookup::from_raw);
    }
}

/// Populate texture slots and merge material layers into their base pass
///
/// A run starts at every pass with material layer 0 or with a render flag
/// different from the previous pass. Layered passes of the run may fold into
/// the run's first pass as its second texture.
pub fn fix_shader_id_layer(passes: &mut [RenderPass], tables: &MaterialTables<'_>) {
    for pass in passes.iter_mut() {
        populate_slots(pass, tables);
    }

    if passes.iter().all(|p| p.material_layer == 0) {
        return;
    }

    let mut base = 0;
    for i in 0..passes.len() {
        let starts_run = i == 0
            || passes[i].material_layer == 0
            || passes[i].renderflag_index != passes[i - 1].renderflag_index;
        if starts_run {
            base = i;
            continue;
        }

        let Some(shader_id) = merged_shader_id(&passes[base], &passes[i], tables) else {
            continue;
        };

        let layer = &mut passes[i];
        layer.shader_id = SHADER_MERGED_LAYER;
        let (texture, uv_animation, tu_lookup) =
            (layer.textures[0], layer.uv_animations[0], layer.tu_lookups[0]);

        let base_pass = &mut passes[base];
        base_pass.shader_id = shader_id;
        base_pass.texture_count = 2;
        base_pass.textures[1] = texture;
        base_pass.uv_animations[1] = uv_animation;
        base_pass.tu_lookups[1] = tu_lookup;
    }
}

fn merged_shader_id(
    base: &RenderPass,
    layer: &RenderPass,
    tables: &MaterialTables<'_>,
) -> Option<u16> {
    if base.texture_count != 1 || base.shader_id & SHADER_RESOLVED != 0 {
        return None;
    }

    let transparency = tables.transparency(layer.transparency_combo_index);
    let base_transparency = tables.transparency(base.transparency_combo_index);
    if transparency.is_none() || transparency != base_transparency {
        return None;
    }

    let same_texture =
        tables.texture(layer.texture_combo_index) == tables.texture(base.texture_combo_index);
    // Environment (-1), out of range and missing lookups all count as unlooked-up.
    let unlooked = !matches!(
        tables.unit_lookup(usize::from(layer.texture_coord_combo_index)),
        Some(0..=2)
    );

    match tables.render_flag(layer.renderflag_index).blend {
        BlendMode::AlphaKey | BlendMode::Alpha if same_texture => Some(RESOLVED_ADD_ALPHA_ALPHA),
        BlendMode::AlphaKey | BlendMode::Alpha => Some(RESOLVED_ADD_ALPHA),
        BlendMode::Add if layer.texture_count == 1 && unlooked => Some(RESOLVED_ADD_ALPHA),
        BlendMode::Mod2x if layer.texture_count == 1 && unlooked => Some(RESOLVED_MOD2X_NA_ALPHA),
        _ => None,
    }
}

/// Select the pixel shader of every pass
pub fn compute_pixel_shaders(passes: &mut [RenderPass]) {
    for pass in passes.iter_mut() {
        pass.pixel_shader = pixel_shader(pass.texture_count, pass.shader_id);
    }
}

/// Order by priority plane, then blend mode, then submesh position
pub fn sort_passes(passes: &mut [RenderPass]) {
    passes.sort_by(|a, b| {
        a.priority_plane
            .cmp(&b.priority_plane)
            .then(a.blend.cmp(&b.blend))
            .then(a.ordering_x.total_cmp(&b.ordering_x))
    });
}
