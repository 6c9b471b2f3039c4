//! Decoded model: static tables, skeleton template, emitters and render passes

use glam::Vec3;
use std::collections::BTreeMap;

use crate::animation::{
    AnimationClock, AnimationSequence, KeyframeSource, ResolvedAnimation, TrackContext,
};
use crate::buffer::{ByteBufferView, read_table, read_table_lenient};
use crate::chunks::texture::WEAPON_REFLECT_TEXTURE;
use crate::chunks::{
    LightState, ModelColor, ModelLight, ModelTexture, ModelTransparency, ModelVertex,
    RenderFlagRecord, TextureAnimation, TextureType, VertexBuffers,
};
use crate::config::RuntimeConfig;
use crate::error::{M2Error, Result};
use crate::header::{ModelFlags, ModelHeader};
use crate::particles::{EmitterFrame, ParticleSystem};
use crate::provider::{FileProvider, TextureProvider, TextureRef};
use crate::render::{
    DrawContext, MaterialTables, RenderPass, ReplaceableTextures, TextureBindings,
    resolve_render_passes,
};
use crate::ribbon::RibbonEmitter;
use crate::skeleton::{Bone, Skeleton};
use crate::skin::{Skin, SkinSubmesh};

/// Triangles of the fallback cuboid
pub const FAKE_GEOMETRY_INDICES: [u16; 36] = [
    0, 1, 2, 2, 3, 0, //
    0, 4, 5, 5, 1, 0, //
    0, 3, 7, 7, 4, 0, //
    1, 5, 6, 6, 2, 1, //
    2, 6, 7, 7, 3, 2, //
    5, 4, 6, 4, 7, 6, //
];

/// Cuboid standing in for models without render passes, used for picking
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FakeGeometry {
    pub vertices: [Vec3; 8],
    pub indices: [u16; 36],
}

impl FakeGeometry {
    /// Box spanning `bounds`; flat axes are widened to one unit
    pub fn from_bounds(bounds: [Vec3; 2]) -> Self {
        let mut min = bounds[0].min(bounds[1]);
        let mut max = bounds[0].max(bounds[1]);
        if !min.is_finite() || !max.is_finite() {
            min = Vec3::ZERO;
            max = Vec3::ZERO;
        }

        let center = (min + max) * 0.5;
        let flat = (max - min).cmple(Vec3::ZERO);
        min = Vec3::select(flat, center - Vec3::splat(0.5), min);
        max = Vec3::select(flat, center + Vec3::splat(0.5), max);

        Self {
            vertices: [
                Vec3::new(min.x, max.y, min.z),
                Vec3::new(min.x, max.y, max.z),
                Vec3::new(max.x, max.y, max.z),
                Vec3::new(max.x, max.y, min.z),
                Vec3::new(min.x, min.y, min.z),
                Vec3::new(min.x, min.y, max.z),
                Vec3::new(max.x, min.y, max.z),
                Vec3::new(max.x, min.y, min.z),
            ],
            indices: FAKE_GEOMETRY_INDICES,
        }
    }
}

/// What makes a model change over time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AnimationKinds {
    /// Vertices weighted to billboarded or transformed bones
    pub geometry: bool,
    pub texture: bool,
    /// Animated bone tracks, or any light, camera or emitter
    pub bones: bool,
    /// Animated color, opacity or transparency
    pub colors: bool,
}

impl AnimationKinds {
    pub fn any(self) -> bool {
        self.geometry || self.texture || self.bones || self.colors
    }
}

/// A fully decoded model
///
/// Static data is shared by every instance. Per-instance state (pose,
/// particles, ribbons, animation time) lives in
/// [`ModelInstance`](crate::instance::ModelInstance).
#[derive(Debug, Clone)]
pub struct Model {
    pub path: String,
    pub name: String,
    pub header: ModelHeader,
    pub flags: ModelFlags,
    pub global_sequences: Vec<u32>,
    pub sequences: Vec<AnimationSequence>,
    pub clock: AnimationClock,
    /// Bone template, copied into every instance
    pub skeleton: Skeleton,
    pub key_bone_lookup: Vec<i16>,
    pub vertices: VertexBuffers,
    /// Triangle list of the first skin profile
    pub indices: Vec<u16>,
    pub submeshes: Vec<SkinSubmesh>,
    submesh_visible: Vec<bool>,
    pub textures: Vec<ModelTexture>,
    pub texture_types: Vec<TextureType>,
    /// Default filenames of replaceable slots, by raw texture type
    pub replace_textures: BTreeMap<u32, String>,
    pub colors: Vec<ModelColor>,
    pub transparency: Vec<ModelTransparency>,
    pub texture_animations: Vec<TextureAnimation>,
    pub render_flags: Vec<RenderFlagRecord>,
    pub texture_lookup: Vec<i16>,
    pub texture_unit_lookup: Vec<i16>,
    pub transparency_lookup: Vec<i16>,
    pub texture_animation_lookup: Vec<i16>,
    pub blend_overrides: Option<Vec<u16>>,
    pub lights: Vec<ModelLight>,
    /// Emitter templates, copied into every instance
    pub particle_systems: Vec<ParticleSystem>,
    pub ribbons: Vec<RibbonEmitter>,
    pub render_passes: Vec<RenderPass>,
    pub fake_geometry: Option<FakeGeometry>,
    pub animation: AnimationKinds,
    per_instance: bool,
    loaded_textures: Vec<Option<TextureRef>>,
    default_replaceable: ReplaceableTextures,
}

impl Model {
    /// Open a model and its first skin profile through `files`
    pub fn load(path: &str, files: &dyn FileProvider, config: &RuntimeConfig) -> Result<Self> {
        let data = files
            .open(path)
            .ok_or_else(|| M2Error::NotFound(path.to_string()))?;

        let skin_path = Skin::file_name(path);
        let skin = files.open(&skin_path);
        if skin.is_none() {
            log::warn!("Skin profile {} not found, {} has no render passes", skin_path, path);
        }

        Self::decode(path, &data, skin.as_deref(), files, config)
    }

    /// Decode a model buffer and an optional skin buffer
    ///
    /// `files` is only consulted for `.anim` companion files. A missing or
    /// broken skin leaves the model without render passes; a broken emitter
    /// is dropped. Everything else that fails to decode fails the model.
    pub fn decode(
        path: &str,
        data: &[u8],
        skin: Option<&[u8]>,
        files: &dyn FileProvider,
        config: &RuntimeConfig,
    ) -> Result<Self> {
        if data.is_empty() {
            return Err(M2Error::EmptyFile(path.to_string()));
        }

        let view = ByteBufferView::new(data);
        let header = ModelHeader::parse(&mut view.clone())?;

        let name_bytes = read_table_lenient(&view, &header.name, "model name");
        let name_end = memchr::memchr(0, &name_bytes).unwrap_or(name_bytes.len());
        let name = String::from_utf8_lossy(&name_bytes[..name_end]).into_owned();

        let global_sequences = read_table(&view, &header.global_sequences, "global sequences")?;
        let sequences: Vec<AnimationSequence> = read_table(&view, &header.sequences, "sequences")?
            .iter()
            .enumerate()
            .map(|(i, record)| AnimationSequence::from_record(i, record))
            .collect();

        let external = load_external_animations(path, &sequences, files, config);
        let mut ctx = TrackContext::new(data, &global_sequences);
        ctx.external = sequences
            .iter()
            .zip(&external)
            .map(|(sequence, bytes)| match bytes {
                Some(bytes) => KeyframeSource::External(bytes),
                None if sequence.needs_external_file() => KeyframeSource::Missing,
                None => KeyframeSource::Embedded,
            })
            .collect();

        let bones = read_table(&view, &header.bones, "bones")?
            .iter()
            .map(|record| Bone::decode(record, &ctx))
            .collect::<Result<Vec<_>>>()?;

        let raw_vertices: Vec<ModelVertex> = read_table(&view, &header.vertices, "vertices")?
            .into_iter()
            .map(ModelVertex::fix_coord_system)
            .collect();
        let (geometry_animated, per_instance) = classify_geometry(&raw_vertices, &bones);
        let vertices = VertexBuffers::from_vertices(&raw_vertices);

        let mut replace_textures = BTreeMap::new();
        let mut textures = Vec::new();
        for record in read_table(&view, &header.textures, "textures")? {
            let texture = ModelTexture::decode(&record, &view);
            if texture.texture_type == TextureType::WeaponBlade {
                replace_textures.insert(
                    TextureType::WeaponBlade.raw(),
                    WEAPON_REFLECT_TEXTURE.to_string(),
                );
            }
            textures.push(texture);
        }
        let texture_types = textures.iter().map(|t| t.texture_type).collect();

        let colors = read_table(&view, &header.colors, "colors")?
            .iter()
            .map(|record| ModelColor::decode(record, &ctx))
            .collect::<Result<Vec<_>>>()?;
        let transparency = read_table(&view, &header.transparency, "transparency")?
            .iter()
            .map(|record| ModelTransparency::decode(record, &ctx))
            .collect::<Result<Vec<_>>>()?;
        let texture_animations =
            read_table(&view, &header.texture_animations, "texture animations")?
                .iter()
                .map(|record| TextureAnimation::decode(record, &ctx))
                .collect::<Result<Vec<_>>>()?;

        let render_flags = read_table(&view, &header.render_flags, "render flags")?;
        let key_bone_lookup = read_table(&view, &header.key_bone_lookup, "key bone lookup")?;
        let texture_lookup = read_table(&view, &header.texture_lookup, "texture lookup")?;
        let texture_unit_lookup =
            read_table(&view, &header.texture_unit_lookup, "texture unit lookup")?;
        let transparency_lookup =
            read_table(&view, &header.transparency_lookup, "transparency lookup")?;
        let texture_animation_lookup = read_table(
            &view,
            &header.texture_animation_lookup,
            "texture animation lookup",
        )?;
        let blend_overrides = header
            .blend_mode_overrides
            .map(|table| read_table(&view, &table, "blend mode overrides"))
            .transpose()?;

        let mut lights = Vec::new();
        for (i, record) in read_table_lenient(&view, &header.lights, "lights").iter().enumerate() {
            match ModelLight::decode(record, &ctx) {
                Ok(light) => lights.push(light),
                Err(err) => log::warn!("Dropping light {} of {}: {}", i, path, err),
            }
        }

        let bone_count = bones.len();
        let mut particle_systems = Vec::new();
        let particle_records =
            read_table_lenient(&view, &header.particle_emitters, "particle emitters");
        for (i, record) in particle_records.iter().enumerate() {
            let system = ParticleSystem::decode(i, record, &ctx, config)
                .and_then(|system| {
                    check_emitter_bone(i, system.parent, bone_count).map(|()| system)
                });
            match system {
                Ok(system) => particle_systems.push(system),
                Err(err) => log::warn!("Dropping particle emitter of {}: {}", path, err),
            }
        }

        let mut ribbons = Vec::new();
        let ribbon_records = read_table_lenient(&view, &header.ribbon_emitters, "ribbon emitters");
        for (i, record) in ribbon_records.iter().enumerate() {
            let ribbon = RibbonEmitter::decode(i, record, &ctx)
                .and_then(|ribbon| {
                    check_emitter_bone(i, ribbon.parent, bone_count).map(|()| ribbon)
                });
            match ribbon {
                Ok(ribbon) => ribbons.push(ribbon),
                Err(err) => log::warn!("Dropping ribbon emitter of {}: {}", path, err),
            }
        }

        let skin = match skin.map(Skin::parse) {
            Some(Ok(skin)) => Some(skin),
            Some(Err(err)) => {
                log::warn!("Skin profile of {} is unreadable: {}", path, err);
                None
            }
            None => None,
        };

        let (indices, submeshes, render_passes) = match skin {
            Some(skin) => {
                let tables = MaterialTables {
                    render_flags: &render_flags,
                    texture_lookup: &texture_lookup,
                    texture_unit_lookup: &texture_unit_lookup,
                    transparency_lookup: &transparency_lookup,
                    texture_animation_lookup: &texture_animation_lookup,
                    blend_overrides: blend_overrides.as_deref(),
                };
                let passes = resolve_render_passes(&skin, &vertices.positions, &tables);
                (skin.indices, skin.submeshes, passes)
            }
            None => (Vec::new(), Vec::new(), Vec::new()),
        };

        let fake_geometry = render_passes
            .is_empty()
            .then(|| FakeGeometry::from_bounds(header.bounding_box));

        let animation = AnimationKinds {
            geometry: geometry_animated,
            texture: !texture_animations.is_empty(),
            bones: bones.iter().any(Bone::has_animated_tracks)
                || header.lights.count > 0
                || header.cameras.count > 0
                || header.particle_emitters.count > 0
                || header.ribbon_emitters.count > 0,
            colors: colors.iter().any(ModelColor::is_animated)
                || transparency.iter().any(|t| t.trans.is_animated()),
        };

        log::debug!(
            "Decoded {}: {} bones, {} sequences, {} render passes, {} particle systems, {} ribbons",
            path,
            bones.len(),
            sequences.len(),
            render_passes.len(),
            particle_systems.len(),
            ribbons.len()
        );

        Ok(Self {
            path: path.to_string(),
            name,
            flags: header.flags,
            clock: AnimationClock::new(&sequences),
            skeleton: Skeleton::new(bones, config.max_bone_depth),
            submesh_visible: vec![true; submeshes.len()],
            loaded_textures: vec![None; textures.len()],
            header,
            global_sequences,
            sequences,
            key_bone_lookup,
            vertices,
            indices,
            submeshes,
            textures,
            texture_types,
            replace_textures,
            colors,
            transparency,
            texture_animations,
            render_flags,
            texture_lookup,
            texture_unit_lookup,
            transparency_lookup,
            texture_animation_lookup,
            blend_overrides,
            lights,
            particle_systems,
            ribbons,
            render_passes,
            fake_geometry,
            animation,
            per_instance,
            default_replaceable: ReplaceableTextures::new(),
        })
    }

    /// Check if anything in the model changes over time
    pub fn is_animated(&self) -> bool {
        self.animation.any()
    }

    /// Check if the pose depends on the camera and cannot be shared
    pub fn requires_per_instance_animation(&self) -> bool {
        self.per_instance
    }

    /// Active sequence and local time of `animation_id` after `elapsed_ms`
    pub fn resolve_animation(
        &self,
        animation_id: u16,
        elapsed_ms: u64,
    ) -> Option<ResolvedAnimation> {
        self.clock.resolve(animation_id, elapsed_ms)
    }

    pub fn submesh_visible(&self, index: usize) -> bool {
        self.submesh_visible.get(index).copied().unwrap_or(true)
    }

    /// Show or hide a submesh, returns false for unknown submeshes
    pub fn set_submesh_visible(&mut self, index: usize, visible: bool) -> bool {
        match self.submesh_visible.get_mut(index) {
            Some(slot) => {
                *slot = visible;
                true
            }
            None => false,
        }
    }

    pub fn show_all_submeshes(&mut self) {
        self.submesh_visible.fill(true);
    }

    /// Request every texture and replaceable default from `provider`
    pub fn bind_textures(&mut self, provider: &dyn TextureProvider) {
        self.loaded_textures = self
            .textures
            .iter()
            .map(|texture| {
                let loaded = provider.load(&texture.filename);
                if loaded.is_none() {
                    log::debug!("Texture {} of {} not available", texture.filename, self.path);
                }
                loaded
            })
            .collect();

        let mut replaceable = ReplaceableTextures::new();
        for (&raw_type, filename) in &self.replace_textures {
            if let Some(texture) = provider.load(filename) {
                replaceable.set(TextureType::from_raw(raw_type), texture);
            }
        }
        self.default_replaceable = replaceable;
    }

    /// Textures returned by the last [`Model::bind_textures`]
    pub fn loaded_textures(&self) -> &[Option<TextureRef>] {
        &self.loaded_textures
    }

    /// Replaceable slots filled with the model's own defaults
    pub fn default_replaceable_textures(&self) -> &ReplaceableTextures {
        &self.default_replaceable
    }

    /// Tables consulted by render pass resolution
    pub fn material_tables(&self) -> MaterialTables<'_> {
        MaterialTables {
            render_flags: &self.render_flags,
            texture_lookup: &self.texture_lookup,
            texture_unit_lookup: &self.texture_unit_lookup,
            transparency_lookup: &self.transparency_lookup,
            texture_animation_lookup: &self.texture_animation_lookup,
            blend_overrides: self.blend_overrides.as_deref(),
        }
    }

    /// Inputs of [`prepare_draw`](crate::render::prepare_draw) for one frame
    pub fn draw_context<'a>(
        &'a self,
        replaceable: &'a ReplaceableTextures,
        frame: EmitterFrame,
    ) -> DrawContext<'a> {
        DrawContext {
            render_flags: &self.render_flags,
            colors: &self.colors,
            transparency: &self.transparency,
            transparency_lookup: &self.transparency_lookup,
            texture_animations: &self.texture_animations,
            submesh_visible: &self.submesh_visible,
            textures: TextureBindings {
                loaded: &self.loaded_textures,
                types: &self.texture_types,
                replaceable,
            },
            animation: frame.animation,
            time: frame.time,
            global_time: frame.global_time,
        }
    }

    /// Light values for the current pose of `skeleton`
    pub fn light_states(&self, skeleton: &Skeleton, frame: EmitterFrame) -> Vec<LightState> {
        self.lights
            .iter()
            .map(|light| light.evaluate(skeleton, frame.animation, frame.time, frame.global_time))
            .collect()
    }
}

fn load_external_animations(
    path: &str,
    sequences: &[AnimationSequence],
    files: &dyn FileProvider,
    config: &RuntimeConfig,
) -> Vec<Option<Vec<u8>>> {
    sequences
        .iter()
        .map(|sequence| {
            if !config.load_external_animations || !sequence.needs_external_file() {
                return None;
            }
            let anim_path = sequence.external_file_name(path);
            match files.open(&anim_path) {
                Some(bytes) if !bytes.is_empty() => Some(bytes),
                _ => {
                    log::debug!("Animation file {} not available", anim_path);
                    None
                }
            }
        })
        .collect()
}

/// Geometry animation and per-instance requirement from vertex weights
fn classify_geometry(vertices: &[ModelVertex], bones: &[Bone]) -> (bool, bool) {
    let mut animated = false;
    let mut per_instance = false;

    for vertex in vertices {
        for bone in vertex.weighted_bones().filter_map(|b| bones.get(b)) {
            if bone.flags.is_transformed() {
                animated = true;
                per_instance |= bone.flags.is_billboard();
            }
        }
        if per_instance {
            break;
        }
    }

    (animated, per_instance)
}

fn check_emitter_bone(index: usize, bone: usize, bone_count: usize) -> Result<()> {
    if bone >= bone_count {
        return Err(M2Error::InvalidEmitter {
            index,
            reason: format!("bone {} of {} does not exist", bone, bone_count),
        });
    }
    Ok(())
}
