use crate::{Quat, Vec3};

/// A ray in 3D space with origin and direction.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    /// Create a new ray.
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self { origin, direction }
    }

    /// Get the point along the ray at parameter t.
    ///
    /// Returns: origin + t * direction
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// An infinite plane `normal · p = distance`, used to stand in for a detected
/// real-world surface.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub distance: f32,
}

impl Plane {
    /// Horizontal floor at height `y`, facing up.
    pub fn horizontal(y: f32) -> Self {
        Self {
            normal: Vec3::Y,
            distance: y,
        }
    }

    /// Ray parameter of the intersection, if the ray hits the front of the
    /// plane at a positive distance.
    pub fn intersect(&self, ray: &Ray) -> Option<f32> {
        let denom = self.normal.dot(ray.direction);
        if denom.abs() < 1e-6 {
            return None;
        }

        let t = (self.distance - self.normal.dot(ray.origin)) / denom;
        (t > 0.0).then_some(t)
    }

    /// Orientation whose local +Y is the plane normal.
    pub fn orientation(&self) -> Quat {
        Quat::from_rotation_arc(Vec3::Y, self.normal.normalize())
    }
}
