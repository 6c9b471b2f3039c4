//! Common types for the M2 animation system

use glam::{Quat, Vec2, Vec3, Vec4};

/// Interpolation type stored in every animation block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InterpolationType {
    /// Step to the earlier keyframe
    #[default]
    None,
    /// Linear (spherical for rotations)
    Linear,
    /// Cubic Bezier, evaluated with the Hermite basis
    Bezier,
    /// Cubic Hermite with in/out tangents
    Hermite,
}

impl InterpolationType {
    /// Convert from the raw `u16` value
    pub fn from_raw(value: u16) -> Self {
        match value {
            1 => Self::Linear,
            2 => Self::Bezier,
            3 => Self::Hermite,
            _ => Self::None,
        }
    }

    /// Check if keyframe values are stored as (value, in, out) triples
    pub fn has_tangents(self) -> bool {
        matches!(self, Self::Bezier | Self::Hermite)
    }
}

/// Values that can be blended between two keyframes
pub trait Interpolate: Copy + Default {
    /// Blend from `self` to `other` by `t` in `[0, 1]`
    fn interpolate(&self, other: &Self, t: f32) -> Self;

    /// Cubic Hermite blend using the out tangent of `self` and the in tangent of `other`
    fn hermite(&self, other: &Self, in_tangent: &Self, out_tangent: &Self, t: f32) -> Self;
}

/// Hermite basis weights for `t`
fn hermite_basis(t: f32) -> [f32; 4] {
    let t2 = t * t;
    let t3 = t2 * t;
    [
        2.0 * t3 - 3.0 * t2 + 1.0,
        -2.0 * t3 + 3.0 * t2,
        t3 - 2.0 * t2 + t,
        t3 - t2,
    ]
}

macro_rules! impl_vector_interpolate {
    ($($ty:ty),*) => {
        $(
            impl Interpolate for $ty {
                fn interpolate(&self, other: &Self, t: f32) -> Self {
                    *self * (1.0 - t) + *other * t
                }

                fn hermite(
                    &self,
                    other: &Self,
                    in_tangent: &Self,
                    out_tangent: &Self,
                    t: f32,
                ) -> Self {
                    let [h1, h2, h3, h4] = hermite_basis(t);
                    *self * h1 + *other * h2 + *in_tangent * h3 + *out_tangent * h4
                }
            }
        )*
    };
}

impl_vector_interpolate!(f32, Vec2, Vec3, Vec4);

impl Interpolate for Quat {
    fn interpolate(&self, other: &Self, t: f32) -> Self {
        self.slerp(*other, t)
    }

    fn hermite(&self, other: &Self, _in_tangent: &Self, _out_tangent: &Self, t: f32) -> Self {
        // Rotations have no meaningful tangent blend; use the arc.
        self.slerp(*other, t)
    }
}

impl Interpolate for u8 {
    fn interpolate(&self, _other: &Self, _t: f32) -> Self {
        *self
    }

    fn hermite(&self, _other: &Self, _in_tangent: &Self, _out_tangent: &Self, _t: f32) -> Self {
        *self
    }
}

impl Interpolate for u16 {
    fn interpolate(&self, _other: &Self, _t: f32) -> Self {
        *self
    }

    fn hermite(&self, _other: &Self, _in_tangent: &Self, _out_tangent: &Self, _t: f32) -> Self {
        *self
    }
}

/// Two-segment ramp over a normalized lifetime
///
/// Blends `a -> b` while `life <= mid`, then `b -> c`.
pub fn life_ramp<T: Interpolate>(life: f32, mid: f32, a: T, b: T, c: T) -> T {
    if life <= mid {
        a.interpolate(&b, life / mid)
    } else {
        b.interpolate(&c, (life - mid) / (1.0 - mid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolation_type_from_raw() {
        assert_eq!(InterpolationType::from_raw(0), InterpolationType::None);
        assert_eq!(InterpolationType::from_raw(1), InterpolationType::Linear);
        assert_eq!(InterpolationType::from_raw(3), InterpolationType::Hermite);
        assert_eq!(InterpolationType::from_raw(99), InterpolationType::None);
        assert!(InterpolationType::Bezier.has_tangents());
    }

    #[test]
    fn test_vec3_interpolate() {
        let a = Vec3::ZERO;
        let b = Vec3::new(2.0, 4.0, 6.0);
        assert_eq!(a.interpolate(&b, 0.5), Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_hermite_endpoints() {
        let a = 1.0f32;
        let b = 5.0f32;
        assert!((a.hermite(&b, &0.0, &0.0, 0.0) - 1.0).abs() < 0.0001);
        assert!((a.hermite(&b, &0.0, &0.0, 1.0) - 5.0).abs() < 0.0001);
        assert!((a.hermite(&b, &0.0, &0.0, 0.5) - 3.0).abs() < 0.0001);
    }

    #[test]
    fn test_life_ramp() {
        assert!((life_ramp(0.25, 0.5, 0.0f32, 1.0, 3.0) - 0.5).abs() < 0.0001);
        assert!((life_ramp(0.75, 0.5, 0.0f32, 1.0, 3.0) - 2.0).abs() < 0.0001);
        assert!((life_ramp(1.0, 0.5, 0.0f32, 1.0, 3.0) - 3.0).abs() < 0.0001);
    }
}
