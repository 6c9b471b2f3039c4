//! Integration tests for model decoding

mod common;

use common::*;
use glam::Vec3;
use pretty_assertions::assert_eq;
use rstest::{fixture, rstest};
use wow_m2_runtime::chunks::TextureType;
use wow_m2_runtime::render::PixelShader;
use wow_m2_runtime::{M2Error, MemoryProvider, Model, RuntimeConfig};

const MODEL_PATH: &str = "World\\Generic\\Test.m2";

#[fixture]
fn config() -> RuntimeConfig {
    init_logging();
    RuntimeConfig {
        particle_seed: Some(7),
        ..RuntimeConfig::default()
    }
}

fn quad_model(builder: &mut ModelBuilder) {
    builder
        .name("Test")
        .stand(1000)
        .bones(&[BoneSpec::root()])
        .vertices(&[
            VertexSpec::at([0.0, 0.0, 0.0]),
            VertexSpec::at([1.0, 0.0, 0.0]),
            VertexSpec::at([1.0, 0.0, 1.0]),
            VertexSpec::at([0.0, 0.0, 1.0]),
        ])
        .textures(&[(0, "World\\Generic\\Test.blp")])
        .render_flags(&[(0, 0), (0, 2)])
        .lookup(OFS_TEXTURE_LOOKUP, &[0])
        .lookup(OFS_TEXTURE_UNIT_LOOKUP, &[0])
        .lookup(OFS_TRANSPARENCY_LOOKUP, &[0])
        .lookup(OFS_TEXTURE_ANIMATION_LOOKUP, &[-1]);
    let weight = builder.constant(32767i16, 1);
    builder
        .transparency(&[weight])
        .bounding_box(Vec3::ZERO, Vec3::new(1.0, 0.0, 1.0));
}

fn quad_skin() -> Vec<u8> {
    build_skin(
        4,
        &[0, 1, 2, 2, 3, 0],
        &[
            SubmeshSpec {
                id: 0,
                index_start: 0,
                index_count: 3,
            },
            SubmeshSpec {
                id: 1,
                index_start: 3,
                index_count: 3,
            },
        ],
        &[UnitSpec::new(0, 0), UnitSpec::new(1, 1)],
    )
}

#[rstest]
fn test_decode_static_model(config: RuntimeConfig) {
    let mut builder = ModelBuilder::new();
    quad_model(&mut builder);
    let data = builder.build();
    let skin = quad_skin();

    let files = MemoryProvider::new();
    let model = Model::decode(MODEL_PATH, &data, Some(&skin), &files, &config).unwrap();

    assert_eq!(model.name, "Test");
    assert_eq!(model.sequences.len(), 1);
    assert_eq!(model.skeleton.len(), 1);
    assert_eq!(model.vertices.len(), 4);
    assert_eq!(model.indices, vec![0, 1, 2, 2, 3, 0]);
    assert_eq!(model.textures[0].filename, "World\\Generic\\Test.blp");
    assert!(model.fake_geometry.is_none());
    assert!(!model.is_animated());
    assert!(!model.requires_per_instance_animation());

    assert_eq!(model.render_passes.len(), 2);
    assert_eq!(model.render_passes[0].pixel_shader, Some(PixelShader::Opaque));
    assert_eq!(model.render_passes[1].pixel_shader, Some(PixelShader::Mod));
    assert_eq!(model.render_passes[0].textures, [Some(0), None]);
}

#[rstest]
fn test_model_without_skin_gets_fake_geometry(config: RuntimeConfig) {
    let mut builder = ModelBuilder::new();
    quad_model(&mut builder);
    let data = builder.build();

    let files = MemoryProvider::new();
    files.insert(MODEL_PATH, data);
    let model = Model::load(MODEL_PATH, &files, &config).unwrap();

    assert!(model.render_passes.is_empty());
    let fake = model.fake_geometry.unwrap();
    assert_eq!(fake.indices.len(), 36);
    // The flat Y extent of the box is widened around its center.
    let min_y = fake.vertices.iter().map(|v| v.y).fold(f32::INFINITY, f32::min);
    let max_y = fake.vertices.iter().map(|v| v.y).fold(f32::NEG_INFINITY, f32::max);
    assert_eq!(max_y - min_y, 1.0);
}

#[rstest]
fn test_skin_is_loaded_next_to_model(config: RuntimeConfig) {
    let mut builder = ModelBuilder::new();
    quad_model(&mut builder);

    let files = MemoryProvider::new();
    files.insert(MODEL_PATH, builder.build());
    files.insert("World\\Generic\\Test00.skin", quad_skin());

    let model = Model::load(MODEL_PATH, &files, &config).unwrap();
    assert_eq!(model.render_passes.len(), 2);
    assert_eq!(model.submeshes.len(), 2);
}

#[rstest]
fn test_broken_skin_is_not_fatal(config: RuntimeConfig) {
    let mut builder = ModelBuilder::new();
    quad_model(&mut builder);
    let data = builder.build();

    let files = MemoryProvider::new();
    let model = Model::decode(MODEL_PATH, &data, Some(b"SKIX"), &files, &config).unwrap();
    assert!(model.render_passes.is_empty());
    assert!(model.fake_geometry.is_some());
}

#[rstest]
fn test_header_errors(config: RuntimeConfig) {
    let files = MemoryProvider::new();

    let mut data = ModelBuilder::new().build();
    data[0..4].copy_from_slice(b"MD21");
    let err = Model::decode(MODEL_PATH, &data, None, &files, &config).unwrap_err();
    assert!(matches!(err, M2Error::InvalidMagic { .. }));

    let mut data = ModelBuilder::new().build();
    data[4..8].copy_from_slice(&256u32.to_le_bytes());
    let err = Model::decode(MODEL_PATH, &data, None, &files, &config).unwrap_err();
    assert!(matches!(err, M2Error::UnsupportedVersion(256)));

    let data = ModelBuilder::new().build();
    let err = Model::decode(MODEL_PATH, &data[..16], None, &files, &config).unwrap_err();
    assert!(matches!(err, M2Error::Io(_)));
}

#[rstest]
fn test_table_out_of_bounds(config: RuntimeConfig) {
    let mut builder = ModelBuilder::new();
    builder.bones(&[BoneSpec::root()]);
    let mut data = builder.build();
    // Claim far more bones than the buffer holds.
    data[OFS_BONES..OFS_BONES + 4].copy_from_slice(&1000u32.to_le_bytes());

    let files = MemoryProvider::new();
    let err = Model::decode(MODEL_PATH, &data, None, &files, &config).unwrap_err();
    assert!(matches!(err, M2Error::OutOfBounds { table: "bones", .. }));
}

fn external_animation_model() -> (Vec<u8>, Vec<u8>) {
    let mut builder = ModelBuilder::new();
    builder.sequences(&[(0, 0, 1000, 0)]);
    let translation = builder.track(1, -1, &[vec![(0, [1.0f32, 2.0, 3.0])]]);
    let mut bone = BoneSpec::root();
    bone.flags = 0x200;
    bone.translation = translation;
    builder.bones(&[bone]);
    let data = builder.build();

    let needle: Vec<u8> = [1.0f32, 2.0, 3.0].iter().flat_map(|v| v.to_le_bytes()).collect();
    let at = data
        .windows(needle.len())
        .position(|w| w == needle.as_slice())
        .unwrap();
    let mut anim = data.clone();
    let replacement: Vec<u8> = [4.0f32, 5.0, 6.0].iter().flat_map(|v| v.to_le_bytes()).collect();
    anim[at..at + 12].copy_from_slice(&replacement);
    // Scrub the main copy so only the companion file holds real keyframes.
    let mut data = data;
    data[at..at + 12].copy_from_slice(&[0; 12]);
    (data, anim)
}

#[rstest]
fn test_external_animation_file(config: RuntimeConfig) {
    let (data, anim) = external_animation_model();
    let files = MemoryProvider::new();
    files.insert("World\\Generic\\Test0000-00.anim", anim);

    let model = Model::decode(MODEL_PATH, &data, None, &files, &config).unwrap();
    let bone = model.skeleton.bone(0).unwrap();
    assert!(bone.translation.uses(0));
    // File space (4, 5, 6) in runtime space.
    assert_eq!(bone.translation.get_value(0, 0, 0), Vec3::new(4.0, 6.0, -5.0));
    assert!(model.animation.bones);
}

#[rstest]
fn test_missing_external_animation_leaves_tracks_empty(config: RuntimeConfig) {
    let (data, _) = external_animation_model();
    let files = MemoryProvider::new();

    let model = Model::decode(MODEL_PATH, &data, None, &files, &config).unwrap();
    let bone = model.skeleton.bone(0).unwrap();
    assert!(!bone.translation.uses(0));
}

#[rstest]
fn test_external_animations_can_be_disabled(mut config: RuntimeConfig) {
    let (data, anim) = external_animation_model();
    let files = MemoryProvider::new();
    files.insert("World\\Generic\\Test0000-00.anim", anim);
    config.load_external_animations = false;

    let model = Model::decode(MODEL_PATH, &data, None, &files, &config).unwrap();
    assert!(!model.skeleton.bone(0).unwrap().translation.uses(0));
}

#[rstest]
fn test_invalid_emitters_are_dropped(config: RuntimeConfig) {
    let mut builder = ModelBuilder::new();
    builder
        .stand(1000)
        .bones(&[BoneSpec::root(), BoneSpec::child(0)])
        .particle_emitters(&[
            particle_record(1, 0),
            particle_record(0, 0),
            particle_record(2, 1),
            particle_record(1, 9),
        ])
        .ribbon_emitters(&[ribbon_record(1, 10.0, 0.1), ribbon_record(7, 10.0, 0.1)]);
    let data = builder.build();

    let files = MemoryProvider::new();
    let model = Model::decode(MODEL_PATH, &data, None, &files, &config).unwrap();

    assert_eq!(model.particle_systems.len(), 2);
    assert_eq!(model.particle_systems[0].parent, 0);
    assert_eq!(model.particle_systems[1].parent, 1);
    assert_eq!(model.ribbons.len(), 1);
    assert_eq!(model.ribbons[0].parent, 1);
    // Emitter definitions alone make the model animated.
    assert!(model.animation.bones);
}

#[rstest]
fn test_geometry_animation_and_billboards(config: RuntimeConfig) {
    let mut builder = ModelBuilder::new();
    let mut billboard = BoneSpec::root();
    billboard.flags = 0x8;
    let vertex = VertexSpec {
        position: [0.0; 3],
        weights: [255, 0, 0, 0],
        bones: [1, 0, 0, 0],
    };
    builder
        .stand(1000)
        .bones(&[BoneSpec::root(), billboard])
        .vertices(&[vertex]);
    let data = builder.build();

    let files = MemoryProvider::new();
    let model = Model::decode(MODEL_PATH, &data, None, &files, &config).unwrap();
    assert!(model.animation.geometry);
    assert!(model.requires_per_instance_animation());
    assert!(model.is_animated());
}

#[rstest]
fn test_weapon_blade_registers_reflection(config: RuntimeConfig) {
    let mut builder = ModelBuilder::new();
    builder.textures(&[(0, "Item\\Sword.blp"), (3, "")]);
    let data = builder.build();

    let files = MemoryProvider::new();
    let model = Model::decode(MODEL_PATH, &data, None, &files, &config).unwrap();
    assert_eq!(model.texture_types, vec![TextureType::Inline, TextureType::WeaponBlade]);
    assert!(model.textures[1].is_special());
    assert_eq!(model.textures[0].filename, "Item\\Sword.blp");
    assert_eq!(
        model.textures[1].filename,
        "Item\\ObjectComponents\\Weapon\\ArmorReflect4.BLP"
    );
    assert_eq!(
        model.replace_textures.get(&3).map(String::as_str),
        Some("Item\\ObjectComponents\\Weapon\\ArmorReflect4.BLP")
    );
}

#[rstest]
fn test_load_from_directory(config: RuntimeConfig) {
    let mut builder = ModelBuilder::new();
    quad_model(&mut builder);

    let dir = tempfile::tempdir().unwrap();
    let model_dir = dir.path().join("World").join("Generic");
    std::fs::create_dir_all(&model_dir).unwrap();
    std::fs::write(model_dir.join("Test.m2"), builder.build()).unwrap();
    std::fs::write(model_dir.join("Test00.skin"), quad_skin()).unwrap();

    let files = wow_m2_runtime::DirectoryProvider::new(dir.path());
    let model = Model::load("world\\generic\\test.m2", &files, &config).unwrap();
    assert_eq!(model.render_passes.len(), 2);
}
