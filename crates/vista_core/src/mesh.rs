//! Triangle mesh geometry.
//!
//! GPU-agnostic: the render crate uploads these into vertex buffers and keys
//! its buffer cache on the `Arc<Mesh>` identity, so meshes are immutable once
//! shared.

use std::f32::consts::TAU;

use vista_math::{Aabb, Vec3};

/// A mesh consisting of vertex positions, optional normals, and triangle indices.
#[derive(Clone, Debug)]
pub struct Mesh {
    /// Vertex positions (one Vec3 per vertex)
    pub positions: Vec<Vec3>,

    /// Vertex normals (optional - call `ensure_normals()` before upload)
    pub normals: Option<Vec<Vec3>>,

    /// Triangle indices (every 3 indices form a triangle, CCW front faces)
    pub indices: Vec<u32>,

    /// Axis-aligned bounding box in mesh-local space
    pub bounds: Aabb,
}

impl Mesh {
    /// Create a new mesh from positions and indices, optionally with normals.
    ///
    /// If normals are not provided, they will NOT be automatically computed.
    pub fn new(positions: Vec<Vec3>, indices: Vec<u32>, normals: Option<Vec<Vec3>>) -> Self {
        let bounds = Aabb::from_point_cloud(&positions);
        Self {
            positions,
            normals,
            indices,
            bounds,
        }
    }

    /// Flat ring lying in the XZ plane, facing +Y.
    ///
    /// This is the reticle shape: a thin annulus the size of a coaster.
    pub fn ring(inner_radius: f32, outer_radius: f32, segments: u32) -> Self {
        let segments = segments.max(3);
        let mut positions = Vec::with_capacity(segments as usize * 2);

        for i in 0..segments {
            let theta = i as f32 / segments as f32 * TAU;
            let (sin, cos) = theta.sin_cos();
            positions.push(Vec3::new(cos * inner_radius, 0.0, sin * inner_radius));
            positions.push(Vec3::new(cos * outer_radius, 0.0, sin * outer_radius));
        }

        let mut indices = Vec::with_capacity(segments as usize * 6);
        for i in 0..segments {
            let inner = i * 2;
            let outer = inner + 1;
            let next_inner = ((i + 1) % segments) * 2;
            let next_outer = next_inner + 1;
            // Wound so the face normal points up (+Y)
            indices.extend_from_slice(&[inner, next_inner, outer]);
            indices.extend_from_slice(&[outer, next_inner, next_outer]);
        }

        let normals = vec![Vec3::Y; positions.len()];
        Self::new(positions, indices, Some(normals))
    }

    /// Axis-aligned box with its base on y = 0, centered in X and Z.
    pub fn cuboid(size: Vec3) -> Self {
        let (x, y, z) = (size.x * 0.5, size.y, size.z * 0.5);
        let corner = Vec3::new;
        // Corners counter-clockwise seen from outside
        let faces: [(Vec3, [Vec3; 4]); 6] = [
            (
                Vec3::X,
                [corner(x, 0.0, z), corner(x, 0.0, -z), corner(x, y, -z), corner(x, y, z)],
            ),
            (
                Vec3::NEG_X,
                [corner(-x, 0.0, -z), corner(-x, 0.0, z), corner(-x, y, z), corner(-x, y, -z)],
            ),
            (
                Vec3::Y,
                [corner(-x, y, z), corner(x, y, z), corner(x, y, -z), corner(-x, y, -z)],
            ),
            (
                Vec3::NEG_Y,
                [corner(-x, 0.0, -z), corner(x, 0.0, -z), corner(x, 0.0, z), corner(-x, 0.0, z)],
            ),
            (
                Vec3::Z,
                [corner(-x, 0.0, z), corner(x, 0.0, z), corner(x, y, z), corner(-x, y, z)],
            ),
            (
                Vec3::NEG_Z,
                [corner(x, 0.0, -z), corner(-x, 0.0, -z), corner(-x, y, -z), corner(x, y, -z)],
            ),
        ];

        let mut positions = Vec::with_capacity(24);
        let mut normals = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        for (normal, corners) in faces {
            let base = positions.len() as u32;
            positions.extend_from_slice(&corners);
            normals.extend_from_slice(&[normal; 4]);
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        Self::new(positions, indices, Some(normals))
    }

    /// Compute smooth vertex normals by averaging face normals.
    ///
    /// Each vertex normal is the normalized average of the normals of all
    /// faces sharing that vertex. Indices out of range are skipped.
    pub fn compute_normals(&mut self) {
        let vertex_count = self.positions.len();
        let mut normals = vec![Vec3::ZERO; vertex_count];

        for face in self.indices.chunks_exact(3) {
            let (i0, i1, i2) = (face[0] as usize, face[1] as usize, face[2] as usize);
            if i0 >= vertex_count || i1 >= vertex_count || i2 >= vertex_count {
                continue;
            }

            let p0 = self.positions[i0];
            let face_normal = (self.positions[i1] - p0).cross(self.positions[i2] - p0);

            normals[i0] += face_normal;
            normals[i1] += face_normal;
            normals[i2] += face_normal;
        }

        for normal in &mut normals {
            *normal = normal.try_normalize().unwrap_or(Vec3::Y);
        }

        self.normals = Some(normals);
    }

    /// Ensure the mesh has per-vertex normals, computing them if necessary.
    pub fn ensure_normals(&mut self) {
        let should_compute = match &self.normals {
            None => true,
            Some(normals) => normals.len() != self.positions.len(),
        };

        if should_compute {
            if let Some(normals) = &self.normals {
                log::debug!(
                    "Normals array length ({}) doesn't match vertex count ({}), computing smooth normals",
                    normals.len(),
                    self.positions.len()
                );
            }
            self.compute_normals();
        }
    }

    /// Get the number of triangles in the mesh.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Get the number of vertices in the mesh.
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mesh_creation() {
        let positions = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ];
        let mesh = Mesh::new(positions, vec![0, 1, 2], None);

        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.triangle_count(), 1);
        assert!(mesh.normals.is_none());
    }

    #[test]
    fn test_compute_normals_ccw() {
        let positions = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ];
        // CCW viewed from +Z produces normal pointing +Z
        let mut mesh = Mesh::new(positions, vec![0, 1, 2], None);
        mesh.compute_normals();

        for normal in mesh.normals.as_ref().unwrap() {
            assert!((normal.z - 1.0).abs() < 0.001);
        }
    }

    #[test]
    fn test_bounds_computation() {
        let positions = vec![
            Vec3::new(-1.0, -2.0, -3.0),
            Vec3::new(4.0, 5.0, 6.0),
            Vec3::new(0.0, 0.0, 0.0),
        ];
        let mesh = Mesh::new(positions, vec![0, 1, 2], None);

        assert_eq!(mesh.bounds.min, Vec3::new(-1.0, -2.0, -3.0));
        assert_eq!(mesh.bounds.max, Vec3::new(4.0, 5.0, 6.0));
    }

    #[test]
    fn test_ring_is_flat_and_sized() {
        let ring = Mesh::ring(0.15, 0.2, 32);

        assert_eq!(ring.vertex_count(), 64);
        assert_eq!(ring.triangle_count(), 64);
        assert_eq!(ring.bounds.size().y, 0.0);
        assert!((ring.bounds.max.x - 0.2).abs() < 1e-5);

        // Winding agrees with the stored +Y normals
        let mut recomputed = ring.clone();
        recomputed.compute_normals();
        for n in recomputed.normals.unwrap() {
            assert!(n.y > 0.99);
        }
    }

    #[test]
    fn test_cuboid_bounds() {
        let cube = Mesh::cuboid(Vec3::new(2.0, 1.0, 0.5));

        assert_eq!(cube.triangle_count(), 12);
        assert_eq!(cube.bounds.min, Vec3::new(-1.0, 0.0, -0.25));
        assert_eq!(cube.bounds.max, Vec3::new(1.0, 1.0, 0.25));
    }

    #[test]
    fn test_cuboid_faces_wind_outward() {
        let cube = Mesh::cuboid(Vec3::new(2.0, 1.0, 0.5));
        let normals = cube.normals.as_ref().unwrap();
        assert_eq!(cube.vertex_count(), 24);
        assert_eq!(cube.triangle_count(), 12);

        for face in cube.indices.chunks_exact(3) {
            let [a, b, c] = [0, 1, 2].map(|i| cube.positions[face[i] as usize]);
            let winding = (b - a).cross(c - a).normalize();
            assert!(winding.dot(normals[face[0] as usize]) > 0.99, "face {:?} winds inward", face);
        }
    }

    #[test]
    fn test_ensure_normals_replaces_mismatched() {
        let mut mesh = Mesh::new(
            vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            vec![0, 1, 2],
            Some(vec![Vec3::Z]),
        );
        mesh.ensure_normals();
        assert_eq!(mesh.normals.as_ref().unwrap().len(), 3);
    }
}
