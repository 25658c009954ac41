// Re-export glam for convenience
pub use glam::*;

// Vista math types
mod aabb;
mod camera;
mod pose;
mod ray;

pub use aabb::Aabb;
pub use camera::Camera;
pub use pose::Pose;
pub use ray::{Plane, Ray};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glam_reexport() {
        let m = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(m.transform_point3(Vec3::ZERO), Vec3::new(1.0, 2.0, 3.0));
    }
}
