//! Builders for small binary models and skins used by the integration tests

#![allow(dead_code)]

use glam::Vec3;

/// Header plus room for the blend override array
pub const HEADER_AREA: usize = 0x138;

pub const OFS_NAME: usize = 0x08;
pub const OFS_FLAGS: usize = 0x10;
pub const OFS_GLOBAL_SEQUENCES: usize = 0x14;
pub const OFS_SEQUENCES: usize = 0x1C;
pub const OFS_BONES: usize = 0x2C;
pub const OFS_VERTICES: usize = 0x3C;
pub const OFS_COLORS: usize = 0x48;
pub const OFS_TEXTURES: usize = 0x50;
pub const OFS_TRANSPARENCY: usize = 0x58;
pub const OFS_TEXTURE_ANIMATIONS: usize = 0x60;
pub const OFS_RENDER_FLAGS: usize = 0x70;
pub const OFS_TEXTURE_LOOKUP: usize = 0x80;
pub const OFS_TEXTURE_UNIT_LOOKUP: usize = 0x88;
pub const OFS_TRANSPARENCY_LOOKUP: usize = 0x90;
pub const OFS_TEXTURE_ANIMATION_LOOKUP: usize = 0x98;
pub const OFS_BOUNDING_BOX: usize = 0xA0;
pub const OFS_LIGHTS: usize = 0x108;
pub const OFS_RIBBONS: usize = 0x120;
pub const OFS_PARTICLES: usize = 0x128;
pub const OFS_BLEND_OVERRIDES: usize = 0x130;

pub const PARTICLE_RECORD_SIZE: usize = 476;
pub const RIBBON_RECORD_SIZE: usize = 176;

pub const SEQUENCE_EMBEDDED: u32 = 0x20;

pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .is_test(true)
        .try_init();
}

/// A keyframe value as stored in the file
pub trait KeyValue {
    fn put(&self, out: &mut Vec<u8>);
}

impl KeyValue for f32 {
    fn put(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }
}

impl KeyValue for i16 {
    fn put(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }
}

impl KeyValue for u16 {
    fn put(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }
}

impl KeyValue for u8 {
    fn put(&self, out: &mut Vec<u8>) {
        out.push(*self);
    }
}

impl KeyValue for [f32; 3] {
    fn put(&self, out: &mut Vec<u8>) {
        for v in self {
            v.put(out);
        }
    }
}

impl KeyValue for [i16; 4] {
    fn put(&self, out: &mut Vec<u8>) {
        for v in self {
            v.put(out);
        }
    }
}

fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put_vec3(out: &mut Vec<u8>, v: Vec3) {
    for c in v.to_array() {
        c.put(out);
    }
}

/// A track block with no keyframes
pub fn empty_track() -> Vec<u8> {
    let mut block = Vec::with_capacity(20);
    block.extend_from_slice(&0u16.to_le_bytes());
    block.extend_from_slice(&(-1i16).to_le_bytes());
    block.extend_from_slice(&[0; 16]);
    block
}

pub struct BoneSpec {
    pub flags: u32,
    pub parent: i16,
    pub pivot: [f32; 3],
    pub translation: Vec<u8>,
    pub rotation: Vec<u8>,
    pub scale: Vec<u8>,
}

impl BoneSpec {
    pub fn root() -> Self {
        Self::child(-1)
    }

    pub fn child(parent: i16) -> Self {
        Self {
            flags: 0,
            parent,
            pivot: [0.0; 3],
            translation: empty_track(),
            rotation: empty_track(),
            scale: empty_track(),
        }
    }
}

#[derive(Clone, Copy)]
pub struct VertexSpec {
    pub position: [f32; 3],
    pub weights: [u8; 4],
    pub bones: [u8; 4],
}

impl VertexSpec {
    pub fn at(position: [f32; 3]) -> Self {
        Self {
            position,
            weights: [255, 0, 0, 0],
            bones: [0; 4],
        }
    }
}

/// Assembles a version 264 model buffer
pub struct ModelBuilder {
    data: Vec<u8>,
}

impl Default for ModelBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelBuilder {
    pub fn new() -> Self {
        let mut data = vec![0; HEADER_AREA];
        data[0..4].copy_from_slice(b"MD20");
        data[4..8].copy_from_slice(&264u32.to_le_bytes());
        Self { data }
    }

    fn set_u32(&mut self, at: usize, v: u32) {
        self.data[at..at + 4].copy_from_slice(&v.to_le_bytes());
    }

    fn set_array(&mut self, at: usize, count: usize, offset: u32) {
        self.set_u32(at, count as u32);
        self.set_u32(at + 4, offset);
    }

    /// Append raw bytes, returning their offset
    pub fn append(&mut self, bytes: &[u8]) -> u32 {
        let offset = self.data.len() as u32;
        self.data.extend_from_slice(bytes);
        offset
    }

    /// Append `count` records and point the header array at `header_at` to them
    pub fn table(&mut self, header_at: usize, count: usize, bytes: &[u8]) -> &mut Self {
        let offset = if count == 0 { 0 } else { self.append(bytes) };
        self.set_array(header_at, count, offset);
        self
    }

    pub fn flags(&mut self, flags: u32) -> &mut Self {
        let current = u32::from_le_bytes([
            self.data[OFS_FLAGS],
            self.data[OFS_FLAGS + 1],
            self.data[OFS_FLAGS + 2],
            self.data[OFS_FLAGS + 3],
        ]);
        self.set_u32(OFS_FLAGS, current | flags);
        self
    }

    pub fn name(&mut self, name: &str) -> &mut Self {
        let mut bytes = name.as_bytes().to_vec();
        bytes.push(0);
        self.table(OFS_NAME, bytes.len(), &bytes)
    }

    /// Animated block with one key list per animation, returning its 20 bytes
    pub fn track<V: KeyValue>(
        &mut self,
        interpolation: u16,
        global_sequence: i16,
        keys: &[Vec<(u32, V)>],
    ) -> Vec<u8> {
        let mut time_headers = Vec::new();
        let mut value_headers = Vec::new();
        for anim in keys {
            let mut times = Vec::new();
            let mut values = Vec::new();
            for (t, v) in anim {
                put_u32(&mut times, *t);
                v.put(&mut values);
            }
            let times_at = if anim.is_empty() { 0 } else { self.append(&times) };
            let values_at = if anim.is_empty() { 0 } else { self.append(&values) };
            put_u32(&mut time_headers, anim.len() as u32);
            put_u32(&mut time_headers, times_at);
            put_u32(&mut value_headers, anim.len() as u32);
            put_u32(&mut value_headers, values_at);
        }
        let times_at = if keys.is_empty() { 0 } else { self.append(&time_headers) };
        let values_at = if keys.is_empty() { 0 } else { self.append(&value_headers) };

        let mut block = Vec::with_capacity(20);
        interpolation.put(&mut block);
        global_sequence.put(&mut block);
        put_u32(&mut block, keys.len() as u32);
        put_u32(&mut block, times_at);
        put_u32(&mut block, keys.len() as u32);
        put_u32(&mut block, values_at);
        block
    }

    /// Single-key track that holds `value` in every animation
    pub fn constant<V: KeyValue + Copy>(&mut self, value: V, animations: usize) -> Vec<u8> {
        let keys: Vec<Vec<(u32, V)>> = (0..animations.max(1)).map(|_| vec![(0, value)]).collect();
        self.track(0, -1, &keys)
    }

    pub fn global_sequences(&mut self, lengths: &[u32]) -> &mut Self {
        let mut bytes = Vec::new();
        for &l in lengths {
            put_u32(&mut bytes, l);
        }
        self.table(OFS_GLOBAL_SEQUENCES, lengths.len(), &bytes)
    }

    /// Sequences as `(id, sub_id, length, flags)`
    pub fn sequences(&mut self, sequences: &[(u16, u16, u32, u32)]) -> &mut Self {
        let mut bytes = Vec::new();
        for &(id, sub_id, length, flags) in sequences {
            id.put(&mut bytes);
            sub_id.put(&mut bytes);
            put_u32(&mut bytes, length);
            0.0f32.put(&mut bytes);
            put_u32(&mut bytes, flags);
            bytes.extend_from_slice(&[0; 64 - 16]);
        }
        self.table(OFS_SEQUENCES, sequences.len(), &bytes)
    }

    /// One embedded stand sequence of `length` milliseconds
    pub fn stand(&mut self, length: u32) -> &mut Self {
        self.sequences(&[(0, 0, length, SEQUENCE_EMBEDDED)])
    }

    pub fn bones(&mut self, bones: &[BoneSpec]) -> &mut Self {
        let mut bytes = Vec::new();
        for bone in bones {
            bytes.extend_from_slice(&(-1i32).to_le_bytes());
            put_u32(&mut bytes, bone.flags);
            bone.parent.put(&mut bytes);
            0u16.put(&mut bytes);
            put_u32(&mut bytes, 0);
            bytes.extend_from_slice(&bone.translation);
            bytes.extend_from_slice(&bone.rotation);
            bytes.extend_from_slice(&bone.scale);
            bone.pivot.put(&mut bytes);
        }
        self.table(OFS_BONES, bones.len(), &bytes)
    }

    pub fn vertices(&mut self, vertices: &[VertexSpec]) -> &mut Self {
        let mut bytes = Vec::new();
        for v in vertices {
            v.position.put(&mut bytes);
            bytes.extend_from_slice(&v.weights);
            bytes.extend_from_slice(&v.bones);
            [0.0f32, 0.0, 1.0].put(&mut bytes);
            bytes.extend_from_slice(&[0; 16]);
        }
        self.table(OFS_VERTICES, vertices.len(), &bytes)
    }

    /// Textures as `(type, filename)`, filenames only stored for type 0
    pub fn textures(&mut self, textures: &[(u32, &str)]) -> &mut Self {
        let mut bytes = Vec::new();
        for &(texture_type, filename) in textures {
            let (len, offset) = if filename.is_empty() {
                (0, 0)
            } else {
                let mut name = filename.as_bytes().to_vec();
                name.push(0);
                (name.len() as u32, self.append(&name))
            };
            put_u32(&mut bytes, texture_type);
            put_u32(&mut bytes, 0);
            put_u32(&mut bytes, len);
            put_u32(&mut bytes, offset);
        }
        self.table(OFS_TEXTURES, textures.len(), &bytes)
    }

    /// Render flag entries as `(flags, blend)`
    pub fn render_flags(&mut self, entries: &[(u16, u16)]) -> &mut Self {
        let mut bytes = Vec::new();
        for &(flags, blend) in entries {
            flags.put(&mut bytes);
            blend.put(&mut bytes);
        }
        self.table(OFS_RENDER_FLAGS, entries.len(), &bytes)
    }

    pub fn lookup(&mut self, header_at: usize, values: &[i16]) -> &mut Self {
        let mut bytes = Vec::new();
        for v in values {
            v.put(&mut bytes);
        }
        self.table(header_at, values.len(), &bytes)
    }

    /// Colors from `(color block, opacity block)` pairs
    pub fn colors(&mut self, colors: &[(Vec<u8>, Vec<u8>)]) -> &mut Self {
        let mut bytes = Vec::new();
        for (color, opacity) in colors {
            bytes.extend_from_slice(color);
            bytes.extend_from_slice(opacity);
        }
        self.table(OFS_COLORS, colors.len(), &bytes)
    }

    pub fn transparency(&mut self, blocks: &[Vec<u8>]) -> &mut Self {
        let bytes = blocks.concat();
        self.table(OFS_TRANSPARENCY, blocks.len(), &bytes)
    }

    pub fn bounding_box(&mut self, min: Vec3, max: Vec3) -> &mut Self {
        let mut bytes = Vec::new();
        put_vec3(&mut bytes, min);
        put_vec3(&mut bytes, max);
        self.data[OFS_BOUNDING_BOX..OFS_BOUNDING_BOX + 24].copy_from_slice(&bytes);
        self
    }

    pub fn blend_overrides(&mut self, overrides: &[u16]) -> &mut Self {
        let mut bytes = Vec::new();
        for v in overrides {
            v.put(&mut bytes);
        }
        self.flags(0x8);
        self.table(OFS_BLEND_OVERRIDES, overrides.len(), &bytes)
    }

    pub fn particle_emitters(&mut self, records: &[Vec<u8>]) -> &mut Self {
        let bytes = records.concat();
        self.table(OFS_PARTICLES, records.len(), &bytes)
    }

    pub fn ribbon_emitters(&mut self, records: &[Vec<u8>]) -> &mut Self {
        let bytes = records.concat();
        self.table(OFS_RIBBONS, records.len(), &bytes)
    }

    pub fn build(&self) -> Vec<u8> {
        self.data.clone()
    }
}

/// Particle record with no tracks, attached to `bone`
pub fn particle_record(emitter_type: u8, bone: u16) -> Vec<u8> {
    let mut record = vec![0; PARTICLE_RECORD_SIZE];
    record[20..22].copy_from_slice(&bone.to_le_bytes());
    record[41] = emitter_type;
    // Every animated block gets a -1 global sequence.
    for block in [52, 72, 92, 112, 132, 152, 176, 200, 220, 240, 456] {
        record[block + 2..block + 4].copy_from_slice(&(-1i16).to_le_bytes());
    }
    record
}

/// Ribbon record with no tracks, attached to `bone`
pub fn ribbon_record(bone: u32, edges_per_second: f32, edge_lifetime: f32) -> Vec<u8> {
    let mut record = vec![0; RIBBON_RECORD_SIZE];
    record[4..8].copy_from_slice(&bone.to_le_bytes());
    for block in [36, 56, 76, 96, 132, 152] {
        record[block + 2..block + 4].copy_from_slice(&(-1i16).to_le_bytes());
    }
    record[116..120].copy_from_slice(&edges_per_second.to_le_bytes());
    record[120..124].copy_from_slice(&edge_lifetime.to_le_bytes());
    record
}

/// Submesh covering `index_count` indices from `index_start`
#[derive(Clone, Copy)]
pub struct SubmeshSpec {
    pub id: u16,
    pub index_start: u16,
    pub index_count: u16,
}

/// Texture unit fields in file order
#[derive(Clone, Copy, Default)]
pub struct UnitSpec {
    pub flags: u8,
    pub priority_plane: i8,
    pub shader_id: u16,
    pub submesh: u16,
    pub color_index: i16,
    pub renderflag_index: u16,
    pub material_layer: u16,
    pub texture_count: u16,
    pub texture_combo_index: u16,
    pub texture_coord_combo_index: u16,
    pub transparency_combo_index: u16,
    pub animation_combo_index: u16,
}

impl UnitSpec {
    pub fn new(submesh: u16, renderflag_index: u16) -> Self {
        Self {
            submesh,
            renderflag_index,
            color_index: -1,
            texture_count: 1,
            ..Self::default()
        }
    }
}

/// Skin buffer whose vertex lookup is the identity over `vertex_count` vertices
pub fn build_skin(
    vertex_count: u16,
    triangles: &[u16],
    submeshes: &[SubmeshSpec],
    units: &[UnitSpec],
) -> Vec<u8> {
    let mut body = Vec::new();
    let base = 48u32;

    let lookup_at = base + body.len() as u32;
    for v in 0..vertex_count {
        v.put(&mut body);
    }
    let triangles_at = base + body.len() as u32;
    for t in triangles {
        t.put(&mut body);
    }
    let submeshes_at = base + body.len() as u32;
    for s in submeshes {
        for v in [s.id, 0, 0, vertex_count, s.index_start, s.index_count, 0, 0, 0, 0] {
            v.put(&mut body);
        }
        body.extend_from_slice(&[0; 28]);
    }
    let units_at = base + body.len() as u32;
    for u in units {
        body.push(u.flags);
        body.push(u.priority_plane as u8);
        u.shader_id.put(&mut body);
        u.submesh.put(&mut body);
        u.submesh.put(&mut body);
        u.color_index.put(&mut body);
        u.renderflag_index.put(&mut body);
        u.material_layer.put(&mut body);
        u.texture_count.put(&mut body);
        u.texture_combo_index.put(&mut body);
        u.texture_coord_combo_index.put(&mut body);
        u.transparency_combo_index.put(&mut body);
        u.animation_combo_index.put(&mut body);
    }

    let mut data = Vec::with_capacity(48 + body.len());
    data.extend_from_slice(b"SKIN");
    for (count, offset) in [
        (u32::from(vertex_count), lookup_at),
        (triangles.len() as u32, triangles_at),
        (0, 0),
        (submeshes.len() as u32, submeshes_at),
        (units.len() as u32, units_at),
    ] {
        put_u32(&mut data, count);
        put_u32(&mut data, offset);
    }
    put_u32(&mut data, 0);
    data.extend_from_slice(&body);
    data
}
