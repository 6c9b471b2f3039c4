//! Individual particle representation

use glam::{Vec3, Vec4};

/// A single live particle
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Particle {
    /// Current position
    pub pos: Vec3,
    /// Spawn position
    pub origin: Vec3,
    /// Launch direction, used for deceleration
    pub dir: Vec3,
    /// Gravity direction
    pub down: Vec3,
    pub speed: Vec3,
    pub size: f32,
    pub color: Vec4,
    /// Age in seconds
    pub life: f32,
    /// Lifespan in seconds, never 0
    pub maxlife: f32,
    /// Index into the emitter's tile table
    pub tile: usize,
}

impl Particle {
    /// Age as a fraction of the lifespan
    #[inline]
    pub fn relative_life(&self) -> f32 {
        self.life / self.maxlife
    }

    /// Check if the particle is still alive
    #[inline]
    pub fn is_alive(&self) -> bool {
        self.relative_life() < 1.0
    }

    /// Advance kinematics by `dt` seconds
    ///
    /// `slowdown` damps the velocity by `exp(-slowdown * life)` when positive.
    pub fn integrate(&mut self, dt: f32, gravity: f32, deceleration: f32, slowdown: f32) {
        self.speed += (self.down * gravity - self.dir * deceleration) * dt;
        let damping = if slowdown > 0.0 {
            (-slowdown * self.life).exp()
        } else {
            1.0
        };
        self.pos += self.speed * damping * dt;
        self.life += dt;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn particle() -> Particle {
        Particle {
            maxlife: 2.0,
            ..Particle::default()
        }
    }

    #[test]
    fn test_life_fraction() {
        let mut p = particle();
        assert!(p.is_alive());
        p.life = 1.0;
        assert_eq!(p.relative_life(), 0.5);
        p.life = 2.0;
        assert!(!p.is_alive());
    }

    #[test]
    fn test_gravity_pulls_along_down() {
        let mut p = Particle {
            down: Vec3::new(0.0, -1.0, 0.0),
            ..particle()
        };
        p.integrate(1.0, 2.0, 0.0, 0.0);
        assert_eq!(p.speed, Vec3::new(0.0, -2.0, 0.0));
        assert_eq!(p.pos, Vec3::new(0.0, -2.0, 0.0));
        assert_eq!(p.life, 1.0);
    }

    #[test]
    fn test_deceleration_opposes_direction() {
        let mut p = Particle {
            dir: Vec3::X,
            speed: Vec3::new(5.0, 0.0, 0.0),
            ..particle()
        };
        p.integrate(0.5, 0.0, 2.0, 0.0);
        assert_eq!(p.speed, Vec3::new(4.0, 0.0, 0.0));
    }

    #[test]
    fn test_slowdown_damps_motion() {
        let mut p = Particle {
            speed: Vec3::X,
            life: 1.0,
            maxlife: 10.0,
            ..Particle::default()
        };
        p.integrate(1.0, 0.0, 0.0, 1.0);
        assert!((p.pos.x - (-1.0f32).exp()).abs() < 1e-6);
    }
}
