use glam::{Mat4, Vec3, Vec4};

use crate::{Pose, Ray};

/// Perspective camera driven by the device viewer pose.
#[derive(Debug, Clone, Copy)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    /// Create a new camera looking from `position` at `target`.
    pub fn new(position: Vec3, target: Vec3, aspect: f32) -> Self {
        Self {
            position,
            target,
            up: Vec3::Y,
            fov_y: 60.0_f32.to_radians(),
            aspect,
            near: 0.1,
            far: 100.0,
        }
    }

    /// Set projection parameters (vertical fov in degrees).
    pub fn with_projection(mut self, fov_y_degrees: f32, near: f32, far: f32) -> Self {
        self.fov_y = fov_y_degrees.to_radians();
        self.near = near;
        self.far = far;
        self
    }

    /// Get the view matrix (world → camera space)
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    /// Get the projection matrix (camera → clip space)
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far)
    }

    /// Get the combined view-projection matrix
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Update aspect ratio (e.g., on window resize)
    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
    }

    /// Place the camera at a viewer pose. The pose looks down its local -Z.
    pub fn set_pose(&mut self, pose: &Pose) {
        let forward = pose.orientation * Vec3::NEG_Z;
        self.position = pose.position;
        self.target = pose.position + forward;
        self.up = pose.orientation * Vec3::Y;
    }

    /// World-space ray through a point in normalized device coordinates
    /// (x, y in [-1, 1], +y up).
    pub fn ray_through_ndc(&self, ndc_x: f32, ndc_y: f32) -> Ray {
        let inv = self.view_projection_matrix().inverse();
        let near = inv * Vec4::new(ndc_x, ndc_y, 0.0, 1.0);
        let far = inv * Vec4::new(ndc_x, ndc_y, 1.0, 1.0);
        let near = near.truncate() / near.w;
        let far = far.truncate() / far.w;

        Ray::new(near, (far - near).normalize())
    }
}
