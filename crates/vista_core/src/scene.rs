//! Scene graph drawn each frame.
//!
//! Objects are keyed by `NodeId` so the placement path can remove exactly the
//! instance it inserted. The scene is owned by the engine and only mutated on
//! the frame thread.

use std::collections::BTreeMap;

use vista_math::{Mat4, Vec3};

use crate::model::{ModelGraph, Transform};

/// Stable handle to an object in a [`Scene`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u64);

/// A light contributing to the shaded pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Light {
    Ambient { color: Vec3, intensity: f32 },
    Directional { color: Vec3, intensity: f32, position: Vec3 },
    /// Real-world lighting reported by the AR device. Replaces the key light
    /// while present; `direction` points toward the light.
    Estimated {
        ambient: Vec3,
        color: Vec3,
        intensity: f32,
        direction: Vec3,
    },
}

impl Light {
    pub fn is_estimated(&self) -> bool {
        matches!(self, Light::Estimated { .. })
    }
}

/// A top-level object: a model graph placed with a root transform.
#[derive(Clone, Debug)]
pub struct SceneObject {
    pub name: String,
    pub graph: ModelGraph,
    pub transform: Transform,
    pub visible: bool,
}

impl SceneObject {
    pub fn new(name: impl Into<String>, graph: ModelGraph, transform: Transform) -> Self {
        Self {
            name: name.into(),
            graph,
            transform,
            visible: true,
        }
    }

    /// Get the 4x4 model matrix for this object.
    pub fn model_matrix(&self) -> Mat4 {
        self.transform.to_matrix()
    }
}

#[derive(Clone, Debug, Default)]
pub struct Scene {
    objects: BTreeMap<NodeId, SceneObject>,
    next_id: u64,
    pub lights: Vec<Light>,
}

impl Scene {
    /// Create an empty scene with no lights.
    pub fn new() -> Self {
        Self::default()
    }

    /// Soft white ambient plus a key light up and to the right.
    pub fn with_default_lighting() -> Self {
        let mut scene = Self::new();
        scene.lights.push(Light::Ambient {
            color: Vec3::ONE,
            intensity: 0.5,
        });
        scene.lights.push(Light::Directional {
            color: Vec3::ONE,
            intensity: 0.8,
            position: Vec3::new(5.0, 5.0, 5.0),
        });
        scene
    }

    pub fn estimated_light(&self) -> Option<&Light> {
        self.lights.iter().find(|light| light.is_estimated())
    }

    /// Insert the estimated light, replacing any previous one.
    pub fn set_estimated_light(&mut self, light: Light) {
        self.clear_estimated_light();
        self.lights.push(light);
    }

    /// Returns true if an estimated light was removed.
    pub fn clear_estimated_light(&mut self) -> bool {
        let before = self.lights.len();
        self.lights.retain(|light| !light.is_estimated());
        self.lights.len() != before
    }

    pub fn add(&mut self, object: SceneObject) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        log::trace!("Scene add {:?} '{}'", id, object.name);
        self.objects.insert(id, object);
        id
    }

    pub fn remove(&mut self, id: NodeId) -> Option<SceneObject> {
        let removed = self.objects.remove(&id);
        if removed.is_some() {
            log::trace!("Scene remove {:?}", id);
        }
        removed
    }

    pub fn get(&self, id: NodeId) -> Option<&SceneObject> {
        self.objects.get(&id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut SceneObject> {
        self.objects.get_mut(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.objects.contains_key(&id)
    }

    /// Objects in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &SceneObject)> {
        self.objects.iter().map(|(id, obj)| (*id, obj))
    }

    pub fn visible_objects(&self) -> impl Iterator<Item = &SceneObject> {
        self.objects.values().filter(|obj| obj.visible)
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Get total triangle count across visible objects.
    pub fn total_triangle_count(&self) -> usize {
        self.visible_objects().map(|obj| obj.graph.triangle_count()).sum()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::mesh::Mesh;
    use crate::model::ModelNode;

    fn cube_object(name: &str) -> SceneObject {
        let graph = ModelNode::with_mesh(name, Arc::new(Mesh::cuboid(Vec3::ONE)), None);
        SceneObject::new(name, graph, Transform::default())
    }

    #[test]
    fn test_add_remove() {
        let mut scene = Scene::new();
        let a = scene.add(cube_object("a"));
        let b = scene.add(cube_object("b"));

        assert_ne!(a, b);
        assert_eq!(scene.object_count(), 2);
        assert_eq!(scene.remove(a).map(|o| o.name), Some("a".to_string()));
        assert!(scene.remove(a).is_none());
        assert!(scene.contains(b));
        assert_eq!(scene.object_count(), 1);
    }

    #[test]
    fn test_ids_not_reused_after_remove() {
        let mut scene = Scene::new();
        let a = scene.add(cube_object("a"));
        scene.remove(a);
        let b = scene.add(cube_object("b"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_hidden_objects_excluded() {
        let mut scene = Scene::new();
        let a = scene.add(cube_object("a"));
        scene.add(cube_object("b"));
        scene.get_mut(a).unwrap().visible = false;

        assert_eq!(scene.visible_objects().count(), 1);
        assert_eq!(scene.total_triangle_count(), 12);
    }

    #[test]
    fn test_default_lighting() {
        let scene = Scene::with_default_lighting();
        assert_eq!(scene.lights.len(), 2);
        assert!(matches!(scene.lights[0], Light::Ambient { intensity, .. } if intensity == 0.5));
    }

    #[test]
    fn test_estimated_light_replaced_not_stacked() {
        let mut scene = Scene::with_default_lighting();
        let estimate = |intensity| Light::Estimated {
            ambient: Vec3::splat(0.2),
            color: Vec3::ONE,
            intensity,
            direction: Vec3::Y,
        };

        scene.set_estimated_light(estimate(1.0));
        scene.set_estimated_light(estimate(2.0));
        assert_eq!(scene.lights.len(), 3);
        assert!(matches!(
            scene.estimated_light(),
            Some(Light::Estimated { intensity, .. }) if *intensity == 2.0
        ));

        assert!(scene.clear_estimated_light());
        assert!(!scene.clear_estimated_light());
        assert_eq!(scene.lights.len(), 2);
        assert!(scene.estimated_light().is_none());
    }
}
