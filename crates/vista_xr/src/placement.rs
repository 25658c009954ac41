//! Reticle and model placement.
//!
//! The reticle is a flat ring that follows the nearest surface hit. A user
//! trigger while it is visible puts a copy of the model under the catalog
//! cursor at the reticle pose, replacing any previous placement, and moves
//! the cursor on to the next model.

use std::sync::Arc;

use vista_core::{AssetCache, Material, Mesh, ModelNode, NodeId, Scene, SceneObject, Transform};
use vista_math::{Aabb, Pose, Vec3};

use crate::config::ReticleConfig;

/// Uniform scale that brings the largest box dimension to one unit.
///
/// `None` for an empty box, a zero-size box, or non-finite extents; such
/// models are placed at native size.
pub fn scale_factor(bounds: &Aabb) -> Option<f32> {
    let extent = bounds.max_extent();
    if extent.is_finite() && extent > 0.0 {
        Some(1.0 / extent)
    } else {
        None
    }
}

/// Surface indicator object in the scene.
#[derive(Debug)]
pub struct Reticle {
    node: NodeId,
    visible: bool,
    transform: Transform,
}

impl Reticle {
    /// Add the (hidden) reticle to `scene`.
    pub fn new(scene: &mut Scene, config: &ReticleConfig) -> Self {
        let mesh = Mesh::ring(config.inner_radius, config.outer_radius, config.segments);
        let material = Material::unlit("reticle", Vec3::from_array(config.color), config.opacity);
        let graph = ModelNode::with_mesh("reticle", Arc::new(mesh), Some(Arc::new(material)));

        let mut object = SceneObject::new("reticle", graph, Transform::default());
        object.visible = false;
        let node = scene.add(object);

        Self {
            node,
            visible: false,
            transform: Transform::default(),
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Last surface transform. Kept while hidden.
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn pose(&self) -> Pose {
        Pose::new(self.transform.translation, self.transform.rotation)
    }

    /// Show the reticle at `pose`, or hide it without moving it.
    pub fn update(&mut self, pose: Option<Pose>, scene: &mut Scene) {
        match pose {
            Some(pose) => {
                self.transform = Transform::from_pose(&pose);
                self.visible = true;
            }
            None => self.visible = false,
        }
        self.sync(scene);
    }

    pub fn hide(&mut self, scene: &mut Scene) {
        self.update(None, scene);
    }

    fn sync(&self, scene: &mut Scene) {
        if let Some(object) = scene.get_mut(self.node) {
            object.visible = self.visible;
            object.transform = self.transform;
        }
    }
}

/// Result of a successful placement.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub node: NodeId,
    pub id: String,
    /// Uniform scale applied, `None` for degenerate bounds.
    pub scale: Option<f32>,
}

#[derive(Debug)]
pub struct PlacementController {
    reticle: Reticle,
    cursor: usize,
    placed: Option<NodeId>,
}

impl PlacementController {
    pub fn new(scene: &mut Scene, config: &ReticleConfig) -> Self {
        Self {
            reticle: Reticle::new(scene, config),
            cursor: 0,
            placed: None,
        }
    }

    pub fn reticle(&self) -> &Reticle {
        &self.reticle
    }

    pub fn update_reticle(&mut self, pose: Option<Pose>, scene: &mut Scene) {
        self.reticle.update(pose, scene);
    }

    /// Catalog index of the next model to place.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// The placed instance, if any.
    pub fn placed(&self) -> Option<NodeId> {
        self.placed
    }

    /// Handle a user trigger. Places at the reticle if it is visible and the
    /// model under the cursor has loaded; otherwise does nothing.
    pub fn on_trigger(&mut self, assets: &AssetCache, scene: &mut Scene) -> Option<Placement> {
        if !self.reticle.is_visible() {
            log::trace!("Trigger ignored: no surface under reticle");
            return None;
        }
        let pose = self.reticle.pose();
        self.place(&pose, assets, scene)
    }

    /// Replace the placed instance with the cursor's model at `pose`.
    pub fn place(&mut self, pose: &Pose, assets: &AssetCache, scene: &mut Scene) -> Option<Placement> {
        let id = assets.id_at(self.cursor)?;
        let (Some(asset), Some(graph)) = (assets.get(id), assets.clone_graph(id)) else {
            log::debug!("Trigger ignored: model '{}' is not loaded", id);
            return None;
        };

        if let Some(previous) = self.placed.take() {
            scene.remove(previous);
        }

        let mut transform = Transform::from_pose(pose);
        let scale = scale_factor(&asset.bounds());
        match scale {
            Some(scale) => transform.scale = Vec3::splat(scale),
            None => log::debug!("Model '{}' has degenerate bounds, placing at native size", id),
        }

        let node = scene.add(SceneObject::new(id, graph, transform));
        self.placed = Some(node);
        self.cursor = (self.cursor + 1) % assets.len();

        log::info!("Placed '{}' at {:?}", id, pose.position);
        Some(Placement {
            node,
            id: id.to_string(),
            scale,
        })
    }

    /// Remove the placed instance and hide the reticle.
    pub fn reset(&mut self, scene: &mut Scene) {
        if let Some(previous) = self.placed.take() {
            scene.remove(previous);
        }
        self.reticle.hide(scene);
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;
    use vista_core::assets::MemoryLoader;
    use vista_core::CatalogEntry;

    use super::*;

    fn model(size: Vec3) -> ModelNode {
        ModelNode::with_mesh("body", Arc::new(Mesh::cuboid(size)), None)
    }

    fn loaded_cache(entries: &[(&str, Vec3)]) -> AssetCache {
        let mut loader = MemoryLoader::new();
        let mut catalog = Vec::new();
        for (id, size) in entries {
            loader = loader.with_model(*id, model(*size));
            catalog.push(CatalogEntry::new(*id, *id));
        }
        let mut cache = AssetCache::new(catalog);
        block_on(cache.preload(&loader)).unwrap();
        cache
    }

    fn floor_hit() -> Pose {
        Pose::from_translation(Vec3::new(0.5, 0.0, -1.0))
    }

    #[test]
    fn test_scale_factor() {
        let bounds = Aabb::from_points(Vec3::ZERO, Vec3::new(2.0, 0.5, 4.0));
        assert_eq!(scale_factor(&bounds), Some(0.25));

        assert_eq!(scale_factor(&Aabb::EMPTY), None);
        assert_eq!(scale_factor(&Aabb::from_points(Vec3::ONE, Vec3::ONE)), None);
        let infinite = Aabb::from_points(Vec3::ZERO, Vec3::new(f32::INFINITY, 1.0, 1.0));
        assert_eq!(scale_factor(&infinite), None);
    }

    #[test]
    fn test_reticle_hidden_keeps_transform() {
        let mut scene = Scene::new();
        let mut reticle = Reticle::new(&mut scene, &ReticleConfig::default());
        assert!(!reticle.is_visible());
        assert!(!scene.get(reticle.node()).unwrap().visible);

        reticle.update(Some(floor_hit()), &mut scene);
        assert!(reticle.is_visible());
        assert_eq!(reticle.pose(), floor_hit());

        reticle.update(None, &mut scene);
        assert!(!reticle.is_visible());
        assert_eq!(reticle.pose(), floor_hit());
        let object = scene.get(reticle.node()).unwrap();
        assert!(!object.visible);
        assert_eq!(object.transform.translation, floor_hit().position);
    }

    #[test]
    fn test_reticle_material() {
        let mut scene = Scene::new();
        let reticle = Reticle::new(&mut scene, &ReticleConfig::default());
        let graph = &scene.get(reticle.node()).unwrap().graph;
        let material = graph.material.as_ref().unwrap();
        assert!(material.unlit);
        assert!(material.is_transparent());
        assert_eq!(graph.mesh.as_ref().unwrap().triangle_count(), 64);
    }

    #[test]
    fn test_trigger_requires_visible_reticle() {
        let cache = loaded_cache(&[("a", Vec3::ONE)]);
        let mut scene = Scene::new();
        let mut placement = PlacementController::new(&mut scene, &ReticleConfig::default());

        assert!(placement.on_trigger(&cache, &mut scene).is_none());
        assert_eq!(placement.cursor(), 0);
        assert_eq!(scene.object_count(), 1);
    }

    #[test]
    fn test_place_scales_and_advances() {
        let cache = loaded_cache(&[("a", Vec3::new(2.0, 1.0, 1.0)), ("b", Vec3::ONE)]);
        let mut scene = Scene::new();
        let mut placement = PlacementController::new(&mut scene, &ReticleConfig::default());
        placement.update_reticle(Some(floor_hit()), &mut scene);

        let placed = placement.on_trigger(&cache, &mut scene).unwrap();
        assert_eq!(placed.id, "a");
        assert_eq!(placed.scale, Some(0.5));
        assert_eq!(placement.cursor(), 1);

        let object = scene.get(placed.node).unwrap();
        assert_eq!(object.transform.scale, Vec3::splat(0.5));
        assert_eq!(object.transform.translation, floor_hit().position);
    }

    #[test]
    fn test_single_placed_instance() {
        let cache = loaded_cache(&[("a", Vec3::ONE), ("b", Vec3::ONE), ("c", Vec3::ONE)]);
        let mut scene = Scene::new();
        let mut placement = PlacementController::new(&mut scene, &ReticleConfig::default());
        placement.update_reticle(Some(floor_hit()), &mut scene);

        for n in 1..=7 {
            let placed = placement.on_trigger(&cache, &mut scene).unwrap();
            assert_eq!(placement.cursor(), n % 3);
            assert_eq!(placement.placed(), Some(placed.node));
            // reticle + one model
            assert_eq!(scene.object_count(), 2);
        }
    }

    #[test]
    fn test_placed_copy_is_independent_of_cache() {
        let cache = loaded_cache(&[("a", Vec3::ONE)]);
        let mut scene = Scene::new();
        let mut placement = PlacementController::new(&mut scene, &ReticleConfig::default());
        let placed = placement.place(&floor_hit(), &cache, &mut scene).unwrap();

        let object = scene.get_mut(placed.node).unwrap();
        object.graph.transform.translation = Vec3::splat(9.0);
        object.graph.name = "moved".to_string();

        let cached = cache.get("a").unwrap().graph();
        assert_eq!(cached.transform.translation, Vec3::ZERO);
        assert_eq!(cached.name, "body");
        // Geometry is shared, not copied
        assert!(Arc::ptr_eq(
            cached.mesh.as_ref().unwrap(),
            scene.get(placed.node).unwrap().graph.mesh.as_ref().unwrap()
        ));
    }

    #[test]
    fn test_degenerate_model_placed_at_native_size() {
        let point = Mesh::new(vec![Vec3::ZERO; 3], vec![0, 1, 2], None);
        let flat = ModelNode::with_mesh("point", Arc::new(point), None);
        let loader = MemoryLoader::new().with_model("flat", flat);
        let mut cache = AssetCache::new(vec![CatalogEntry::new("flat", "flat")]);
        block_on(cache.preload(&loader)).unwrap();

        let mut scene = Scene::new();
        let mut placement = PlacementController::new(&mut scene, &ReticleConfig::default());
        let placed = placement.place(&floor_hit(), &cache, &mut scene).unwrap();

        assert_eq!(placed.scale, None);
        assert_eq!(scene.get(placed.node).unwrap().transform.scale, Vec3::ONE);
    }

    #[test]
    fn test_unloaded_cursor_refuses_without_mutation() {
        let loader = MemoryLoader::new().with_model("a", model(Vec3::ONE));
        let catalog = vec![CatalogEntry::new("a", "a"), CatalogEntry::new("b", "missing")];
        let mut cache = AssetCache::new(catalog);
        block_on(cache.preload(&loader)).unwrap();

        let mut scene = Scene::new();
        let mut placement = PlacementController::new(&mut scene, &ReticleConfig::default());
        placement.update_reticle(Some(floor_hit()), &mut scene);

        let first = placement.on_trigger(&cache, &mut scene).unwrap();
        assert_eq!(placement.cursor(), 1);

        assert!(placement.on_trigger(&cache, &mut scene).is_none());
        assert_eq!(placement.cursor(), 1);
        assert_eq!(placement.placed(), Some(first.node));
        assert!(scene.contains(first.node));
    }

    #[test]
    fn test_reset_removes_instance_and_hides_reticle() {
        let cache = loaded_cache(&[("a", Vec3::ONE)]);
        let mut scene = Scene::new();
        let mut placement = PlacementController::new(&mut scene, &ReticleConfig::default());
        placement.update_reticle(Some(floor_hit()), &mut scene);
        let placed = placement.on_trigger(&cache, &mut scene).unwrap();

        placement.reset(&mut scene);
        placement.reset(&mut scene);
        assert!(!scene.contains(placed.node));
        assert!(!placement.reticle().is_visible());
        assert_eq!(scene.object_count(), 1);
    }
}
