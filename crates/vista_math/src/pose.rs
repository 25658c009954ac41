use crate::{Mat4, Quat, Vec3};

/// A rigid transform (position + orientation) reported by the tracking device.
///
/// Hit-test poses arrive as column-major 4x4 matrices; scale is discarded when
/// decomposing since device poses are rigid.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub orientation: Quat,
}

impl Pose {
    pub const IDENTITY: Pose = Pose {
        position: Vec3::ZERO,
        orientation: Quat::IDENTITY,
    };

    pub fn new(position: Vec3, orientation: Quat) -> Self {
        Self {
            position,
            orientation,
        }
    }

    pub fn from_translation(position: Vec3) -> Self {
        Self::new(position, Quat::IDENTITY)
    }

    /// Decompose a rigid transform matrix.
    pub fn from_matrix(matrix: &Mat4) -> Self {
        let (_scale, orientation, position) = matrix.to_scale_rotation_translation();
        Self {
            position,
            orientation: orientation.normalize(),
        }
    }

    /// Build from a column-major float array, the layout device APIs use.
    pub fn from_cols_array(cols: &[f32; 16]) -> Self {
        Self::from_matrix(&Mat4::from_cols_array(cols))
    }

    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.orientation, self.position)
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}
