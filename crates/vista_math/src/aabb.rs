use crate::{Mat4, Vec3};

/// Axis-aligned bounding box of a model or mesh.
///
/// Unlike a BVH box this is never padded: a flat or point-like model keeps its
/// true zero extent so callers can detect degenerate geometry.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// An empty box (contains nothing). `surrounding` with it is the identity.
    pub const EMPTY: Aabb = Aabb {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    /// Create an AABB from two corner points.
    pub fn from_points(a: Vec3, b: Vec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Smallest box containing every point, or `EMPTY` for no points.
    pub fn from_point_cloud(points: &[Vec3]) -> Self {
        points.iter().fold(Self::EMPTY, |acc, &p| acc.include(p))
    }

    /// Create an AABB that surrounds two other AABBs.
    pub fn surrounding(box0: &Aabb, box1: &Aabb) -> Self {
        Self {
            min: box0.min.min(box1.min),
            max: box0.max.max(box1.max),
        }
    }

    /// Grow the box to contain `point`.
    pub fn include(self, point: Vec3) -> Self {
        Self {
            min: self.min.min(point),
            max: self.max.max(point),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Extent along each axis. Zero for an empty box.
    pub fn size(&self) -> Vec3 {
        if self.is_empty() {
            Vec3::ZERO
        } else {
            self.max - self.min
        }
    }

    /// Largest of the three extents.
    pub fn max_extent(&self) -> f32 {
        self.size().max_element()
    }

    /// Returns the center point of the bounding box.
    pub fn centroid(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Bounding box of all 8 corners after transforming by `matrix`.
    pub fn transformed(&self, matrix: &Mat4) -> Aabb {
        if self.is_empty() {
            return *self;
        }

        let (lo, hi) = (self.min, self.max);
        let corners = [
            Vec3::new(lo.x, lo.y, lo.z),
            Vec3::new(hi.x, lo.y, lo.z),
            Vec3::new(lo.x, hi.y, lo.z),
            Vec3::new(hi.x, hi.y, lo.z),
            Vec3::new(lo.x, lo.y, hi.z),
            Vec3::new(hi.x, lo.y, hi.z),
            Vec3::new(lo.x, hi.y, hi.z),
            Vec3::new(hi.x, hi.y, hi.z),
        ];

        corners
            .iter()
            .fold(Aabb::EMPTY, |acc, &c| acc.include(matrix.transform_point3(c)))
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aabb_from_points() {
        let aabb = Aabb::from_points(Vec3::new(10.0, 0.0, 10.0), Vec3::new(0.0, 10.0, 0.0));

        assert_eq!(aabb.min, Vec3::ZERO);
        assert_eq!(aabb.max, Vec3::splat(10.0));
    }

    #[test]
    fn test_aabb_surrounding() {
        let box1 = Aabb::from_points(Vec3::ZERO, Vec3::new(5.0, 5.0, 5.0));
        let box2 = Aabb::from_points(Vec3::new(3.0, 3.0, 3.0), Vec3::new(10.0, 10.0, 10.0));
        let surrounding = Aabb::surrounding(&box1, &box2);

        assert_eq!(surrounding.min.x, 0.0);
        assert_eq!(surrounding.max.x, 10.0);
    }

    #[test]
    fn test_empty_is_identity_for_surrounding() {
        let b = Aabb::from_points(Vec3::ONE, Vec3::splat(2.0));
        assert_eq!(Aabb::surrounding(&Aabb::EMPTY, &b), b);
        assert!(Aabb::EMPTY.is_empty());
        assert_eq!(Aabb::EMPTY.size(), Vec3::ZERO);
    }

    #[test]
    fn test_degenerate_box_keeps_zero_extent() {
        let flat = Aabb::from_point_cloud(&[Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0)]);
        assert_eq!(flat.size(), Vec3::new(2.0, 0.0, 0.0));

        let point = Aabb::from_point_cloud(&[Vec3::ONE]);
        assert!(!point.is_empty());
        assert_eq!(point.max_extent(), 0.0);
    }

    #[test]
    fn test_aabb_centroid() {
        let aabb = Aabb::from_points(Vec3::ZERO, Vec3::new(10.0, 10.0, 10.0));
        assert_eq!(aabb.centroid(), Vec3::new(5.0, 5.0, 5.0));
    }

    #[test]
    fn test_transformed_translation() {
        let mat = Mat4::from_translation(Vec3::new(5.0, 5.0, 5.0));
        let aabb = Aabb::from_points(Vec3::ZERO, Vec3::ONE);
        let t = aabb.transformed(&mat);

        assert!((t.min - Vec3::splat(5.0)).length() < 0.001);
        assert!((t.max - Vec3::splat(6.0)).length() < 0.001);
    }

    #[test]
    fn test_transformed_scale_changes_extent() {
        let mat = Mat4::from_scale(Vec3::new(2.0, 3.0, 4.0));
        let t = Aabb::from_points(Vec3::ZERO, Vec3::ONE).transformed(&mat);

        assert!((t.size() - Vec3::new(2.0, 3.0, 4.0)).length() < 0.001);
        assert!((t.max_extent() - 4.0).abs() < 0.001);
    }
}
