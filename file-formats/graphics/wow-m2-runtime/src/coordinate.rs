//! Coordinate system correction applied while decoding
//!
//! Model files are authored Z-up. The runtime works Y-up, so every position,
//! normal, pivot and bone rotation is converted once at load time:
//!
//! - positions and normals: `(x, y, z) -> (x, z, -y)`
//! - rotations: `(x, y, z, w) -> (-x, -z, y, w)`
//! - scales: `(x, y, z) -> (x, z, y)`

use crate::buffer::PackedQuat;
use glam::{Quat, Vec3};

/// Convert a position or direction from file space to runtime space
pub fn fix_coord_system(v: Vec3) -> Vec3 {
    Vec3::new(v.x, v.z, -v.y)
}

/// Convert a rotation from file space to runtime space
pub fn fix_coord_system_quat(q: Quat) -> Quat {
    Quat::from_xyzw(-q.x, -q.z, q.y, q.w)
}

/// Convert a scale vector from file space to runtime space
pub fn fix_coord_system_scale(v: Vec3) -> Vec3 {
    Vec3::new(v.x, v.z, v.y)
}

/// Expand one packed quaternion component to a float in `[-1, 1]`
pub fn short_to_float(v: i16) -> f32 {
    let v = i32::from(v);
    let expanded = if v < 0 { v + 32768 } else { v - 32767 };
    expanded as f32 / 32767.0
}

/// Fixed-point opacity or weight (`i16` where 32767 is 1.0) to float
pub fn fixed16_to_float(v: i16) -> f32 {
    f32::from(v) / 32767.0
}

/// Unpack a 16-bit quaternion and move it into runtime space
pub fn unpack_quat(packed: PackedQuat) -> Quat {
    let [x, y, z, w] = packed.0;
    fix_coord_system_quat(Quat::from_xyzw(
        short_to_float(x),
        short_to_float(y),
        short_to_float(z),
        short_to_float(w),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fix_position() {
        let v = fix_coord_system(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(v, Vec3::new(1.0, 3.0, -2.0));
    }

    #[test]
    fn test_fix_quat() {
        let q = fix_coord_system_quat(Quat::from_xyzw(0.1, 0.2, 0.3, 0.9));
        assert_eq!(q, Quat::from_xyzw(-0.1, -0.3, 0.2, 0.9));
    }

    #[test]
    fn test_fix_scale() {
        let v = fix_coord_system_scale(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(v, Vec3::new(1.0, 3.0, 2.0));
    }

    #[test]
    fn test_short_to_float_extremes() {
        assert!((short_to_float(-1) - 1.0).abs() < 0.0001);
        assert!((short_to_float(32767) - 0.0).abs() < 0.0001);
        assert!((short_to_float(0) + 1.0).abs() < 0.0001);
    }

    #[test]
    fn test_packed_identity() {
        // x, y, z = 32767 -> 0.0, w = -1 -> 1.0
        let q = unpack_quat(PackedQuat([32767, 32767, 32767, -1]));
        assert!(q.abs_diff_eq(Quat::IDENTITY, 0.0001));
    }

    #[test]
    fn test_fixed16() {
        assert!((fixed16_to_float(32767) - 1.0).abs() < f32::EPSILON);
        assert_eq!(fixed16_to_float(0), 0.0);
    }
}
