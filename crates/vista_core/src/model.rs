//! Model graphs: the node trees that loaders produce and placement clones.

use std::sync::Arc;

use vista_math::{Aabb, Mat4, Pose, Quat, Vec3, Vec4};

use crate::mesh::Mesh;

/// Surface appearance of a model node.
#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    /// Material name (from the MTL library, if any)
    pub name: String,

    /// Base colour, RGB plus opacity in `w`
    pub base_color: Vec4,

    /// Skip lighting (used for the reticle)
    pub unlit: bool,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: String::new(),
            base_color: Vec4::new(0.8, 0.8, 0.8, 1.0),
            unlit: false,
        }
    }
}

impl Material {
    pub fn new(name: impl Into<String>, color: Vec3) -> Self {
        Self {
            name: name.into(),
            base_color: color.extend(1.0),
            ..Default::default()
        }
    }

    /// Flat-shaded, possibly translucent material.
    pub fn unlit(name: impl Into<String>, color: Vec3, opacity: f32) -> Self {
        Self {
            name: name.into(),
            base_color: color.extend(opacity),
            unlit: true,
        }
    }

    pub fn is_transparent(&self) -> bool {
        self.base_color.w < 1.0
    }
}

/// Transform components that can be composed into a matrix.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    /// Create a new transform with only translation.
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Default::default()
        }
    }

    /// Rigid transform taken directly from a device pose.
    pub fn from_pose(pose: &Pose) -> Self {
        Self {
            translation: pose.position,
            rotation: pose.orientation,
            scale: Vec3::ONE,
        }
    }

    /// Decomposes the matrix into translation, rotation, and scale.
    pub fn from_matrix(matrix: Mat4) -> Self {
        let (scale, rotation, translation) = matrix.to_scale_rotation_translation();
        Self {
            translation,
            rotation,
            scale,
        }
    }

    /// Order: Scale -> Rotate -> Translate (SRT)
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

/// One node in a model graph.
///
/// Meshes and materials are shared through `Arc` and never mutated after
/// loading; the node tree itself (names, transforms, children) is owned, so
/// cloning a graph gives an independent hierarchy over the same buffers.
#[derive(Clone, Debug, Default)]
pub struct ModelNode {
    pub name: String,
    pub transform: Transform,
    pub mesh: Option<Arc<Mesh>>,
    pub material: Option<Arc<Material>>,
    pub children: Vec<ModelNode>,
}

impl ModelNode {
    /// Empty grouping node.
    pub fn group(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Leaf node drawing `mesh`.
    pub fn with_mesh(name: impl Into<String>, mesh: Arc<Mesh>, material: Option<Arc<Material>>) -> Self {
        Self {
            name: name.into(),
            mesh: Some(mesh),
            material,
            ..Default::default()
        }
    }

    pub fn add_child(&mut self, child: ModelNode) {
        self.children.push(child);
    }

    /// Visit every node carrying a mesh together with its accumulated matrix.
    pub fn visit_meshes<F>(&self, parent: Mat4, f: &mut F)
    where
        F: FnMut(&Mat4, &Arc<Mesh>, Option<&Arc<Material>>),
    {
        let world = parent * self.transform.to_matrix();
        if let Some(mesh) = &self.mesh {
            f(&world, mesh, self.material.as_ref());
        }
        for child in &self.children {
            child.visit_meshes(world, f);
        }
    }

    /// Bounds of all meshes under this node, in the node's parent space.
    pub fn bounds(&self) -> Aabb {
        let mut bounds = Aabb::EMPTY;
        self.visit_meshes(Mat4::IDENTITY, &mut |world, mesh, _| {
            bounds = Aabb::surrounding(&bounds, &mesh.bounds.transformed(world));
        });
        bounds
    }

    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(ModelNode::node_count).sum::<usize>()
    }

    pub fn triangle_count(&self) -> usize {
        let mut count = 0;
        self.visit_meshes(Mat4::IDENTITY, &mut |_, mesh, _| count += mesh.triangle_count());
        count
    }
}

/// A loaded model: the root of a node tree.
pub type ModelGraph = ModelNode;
