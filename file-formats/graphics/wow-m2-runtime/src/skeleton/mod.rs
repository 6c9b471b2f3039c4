//! Bone hierarchy evaluation
//!
//! Bones are stored in an arena and addressed by index. Each pass resets every
//! bone's `calc` flag, then walks the bones in storage order; a bone computes
//! its parent first when the parent has not been visited yet.
//!
//! For a bone flagged as transformed or billboarded the local matrix is
//!
//! ```text
//! M = T(pivot) * T(anim) * R(anim) * S(anim) * T(-pivot)
//! ```
//!
//! with each animated factor applied only when the track has keys for the
//! active animation. Other bones use the identity. `mat = parent.mat * M`.
//! The normal matrix `mrot` is `parent.mrot * R` when the bone has rotation
//! keys for the active animation and the identity otherwise.

pub mod bone;

use glam::{Mat4, Vec3, Vec4};

pub use bone::{Bone, BoneFlags, BoneRecord, rotation_matrix};

/// Inputs of one skeleton pass
#[derive(Debug, Clone, Copy)]
pub struct PoseInput {
    /// Camera/model-view matrix, used by billboarded bones
    pub model_view: Mat4,
    /// Sequence index of the active animation
    pub animation: usize,
    /// Local time inside the active animation, in milliseconds
    pub time: u32,
    /// Time driving global sequences, in milliseconds
    pub global_time: u32,
}

/// The bones of a model and their matrices for the current pass
#[derive(Debug, Clone, Default)]
pub struct Skeleton {
    bones: Vec<Bone>,
    max_depth: usize,
}

impl Skeleton {
    /// Create a skeleton from decoded bones
    pub fn new(bones: Vec<Bone>, max_depth: usize) -> Self {
        Self {
            bones,
            max_depth: max_depth.max(1),
        }
    }

    /// The bones in storage order
    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    /// Mutable access to the bones
    pub fn bones_mut(&mut self) -> &mut [Bone] {
        &mut self.bones
    }

    /// Bone by index
    pub fn bone(&self, index: usize) -> Option<&Bone> {
        self.bones.get(index)
    }

    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    /// Recompute `mat` and `mrot` for every bone
    pub fn evaluate(&mut self, input: &PoseInput) {
        for bone in &mut self.bones {
            bone.calc = false;
        }
        for index in 0..self.bones.len() {
            self.calc_matrix(index, input, 0);
        }
    }

    /// World matrix of every bone, for skinning upload
    pub fn bone_matrices(&self) -> Vec<Mat4> {
        self.bones.iter().map(|b| b.mat).collect()
    }

    /// Overwrite the matrices with a previously evaluated pose
    pub fn apply_pose(&mut self, pose: &[(Mat4, Mat4)]) {
        for (bone, (mat, mrot)) in self.bones.iter_mut().zip(pose) {
            bone.mat = *mat;
            bone.mrot = *mrot;
            bone.calc = true;
        }
    }

    /// Snapshot of `(mat, mrot)` for every bone
    pub fn pose(&self) -> Vec<(Mat4, Mat4)> {
        self.bones.iter().map(|b| (b.mat, b.mrot)).collect()
    }

    fn calc_matrix(&mut self, index: usize, input: &PoseInput, depth: usize) {
        if self.bones[index].calc {
            return;
        }

        let (local, rotation) = local_matrix(&self.bones[index], input);

        let parent = match self.bones[index].parent_index() {
            Some(p) if p < self.bones.len() && p != index && depth < self.max_depth => {
                self.calc_matrix(p, input, depth + 1);
                Some((self.bones[p].mat, self.bones[p].mrot))
            }
            Some(p) => {
                log::warn!(
                    "Bone {} has unusable parent {} at depth {}, treating it as a root",
                    index,
                    p,
                    depth
                );
                None
            }
            None => None,
        };

        let bone = &mut self.bones[index];
        bone.mat = match parent {
            Some((parent_mat, _)) => parent_mat * local,
            None => local,
        };
        bone.mrot = match (rotation, parent) {
            (Some(r), Some((_, parent_mrot))) => parent_mrot * r,
            (Some(r), None) => r,
            (None, _) => Mat4::IDENTITY,
        };
        bone.calc = true;
    }
}

/// Local matrix of a bone and, when it has rotation keys, its rotation matrix
fn local_matrix(bone: &Bone, input: &PoseInput) -> (Mat4, Option<Mat4>) {
    let anim = input.animation;

    let rotation = bone
        .rotation
        .uses(anim)
        .then(|| rotation_matrix(bone.rotation.get_value(anim, input.time, input.global_time)));

    if !bone.flags.is_transformed() {
        return (Mat4::IDENTITY, rotation);
    }

    let mut m = Mat4::from_translation(bone.pivot);
    if bone.translation.uses(anim) {
        let t = bone.translation.get_value(anim, input.time, input.global_time);
        m *= Mat4::from_translation(t);
    }
    if let Some(r) = rotation {
        m *= r;
    }
    if bone.scale.uses(anim) {
        let s = bone.scale.get_value(anim, input.time, input.global_time);
        m *= Mat4::from_scale(s);
    }

    if bone.flags.is_billboard() {
        // Cylindrical locks are not specialized; they keep the animated matrix.
        let right = input.model_view.row(0).truncate();
        let up = input.model_view.row(1).truncate();
        m.y_axis = Vec4::new(up.x, up.y, up.z, m.y_axis.w);
        m.z_axis = Vec4::new(-right.x, -right.y, -right.z, m.z_axis.w);
    }

    m *= Mat4::from_translation(-bone.pivot);
    (m, rotation)
}

/// Translation part of a matrix
pub fn matrix_translation(m: &Mat4) -> Vec3 {
    m.w_axis.truncate()
}
