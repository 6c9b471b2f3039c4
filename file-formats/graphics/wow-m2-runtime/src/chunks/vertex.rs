use byteorder::ReadBytesExt;
use glam::{Vec2, Vec3};
use std::io::Read;

use crate::buffer::{Record, read_vec2, read_vec3};
use crate::coordinate::fix_coord_system;
use crate::error::Result;

/// Vertex as stored in the model (48 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ModelVertex {
    pub position: Vec3,
    /// Bone weights, 0-255
    pub bone_weights: [u8; 4],
    /// Bone indices into the bone table
    pub bone_indices: [u8; 4],
    pub normal: Vec3,
    /// Two texture coordinate sets
    pub tex_coords: [Vec2; 2],
}

impl Record for ModelVertex {
    const SIZE: usize = 48;

    fn parse<R: Read>(reader: &mut R) -> Result<Self> {
        let position = read_vec3(reader)?;
        let mut bone_weights = [0u8; 4];
        reader.read_exact(&mut bone_weights)?;
        let mut bone_indices = [0u8; 4];
        reader.read_exact(&mut bone_indices)?;
        let normal = read_vec3(reader)?;
        let tex_coords = [read_vec2(reader)?, read_vec2(reader)?];

        Ok(Self {
            position,
            bone_weights,
            bone_indices,
            normal,
            tex_coords,
        })
    }
}

impl ModelVertex {
    /// Move position and normal into runtime space
    pub fn fix_coord_system(self) -> Self {
        Self {
            position: fix_coord_system(self.position),
            normal: fix_coord_system(self.normal),
            ..self
        }
    }

    /// Bone indices that carry a non-zero weight
    pub fn weighted_bones(&self) -> impl Iterator<Item = usize> + '_ {
        self.bone_weights
            .iter()
            .zip(self.bone_indices.iter())
            .filter(|(w, _)| **w > 0)
            .map(|(_, b)| usize::from(*b))
    }
}

/// Flat, GPU-ready vertex streams decoded once at load time
#[derive(Debug, Clone, Default)]
pub struct VertexBuffers {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub bone_weights: Vec<[u8; 4]>,
    pub bone_indices: Vec<[u8; 4]>,
    pub tex_coords0: Vec<Vec2>,
    pub tex_coords1: Vec<Vec2>,
}

impl VertexBuffers {
    /// Split vertices into separate streams
    pub fn from_vertices(vertices: &[ModelVertex]) -> Self {
        let mut buffers = Self {
            positions: Vec::with_capacity(vertices.len()),
            normals: Vec::with_capacity(vertices.len()),
            bone_weights: Vec::with_capacity(vertices.len()),
            bone_indices: Vec::with_capacity(vertices.len()),
            tex_coords0: Vec::with_capacity(vertices.len()),
            tex_coords1: Vec::with_capacity(vertices.len()),
        };
        for v in vertices {
            buffers.positions.push(v.position);
            buffers.normals.push(v.normal);
            buffers.bone_weights.push(v.bone_weights);
            buffers.bone_indices.push(v.bone_indices);
            buffers.tex_coords0.push(v.tex_coords[0]);
            buffers.tex_coords1.push(v.tex_coords[1]);
        }
        buffers
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}
