use futures::future::join_all;

use super::{AssetError, AssetLoader, CatalogEntry, LoadProgress, LoadStatus, ModelAsset, PreloadError};
use crate::model::ModelGraph;

/// Result of loading one catalog entry.
#[derive(Debug)]
pub struct LoadOutcome {
    pub id: String,
    pub result: Result<ModelAsset, AssetError>,
}

/// Summary of a completed preload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreloadReport {
    /// Identifiers now usable for placement
    pub loaded: Vec<String>,
    /// `(identifier, reason)` for every entry that failed
    pub failed: Vec<(String, String)>,
}

impl PreloadReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// A catalog entry together with its load status and, once loaded, the asset.
#[derive(Debug, Clone)]
pub struct ModelCacheEntry {
    catalog: CatalogEntry,
    status: LoadStatus,
    asset: Option<ModelAsset>,
}

impl ModelCacheEntry {
    pub fn catalog(&self) -> &CatalogEntry {
        &self.catalog
    }

    pub fn status(&self) -> &LoadStatus {
        &self.status
    }

    pub fn asset(&self) -> Option<&ModelAsset> {
        self.asset.as_ref()
    }
}

/// Load every catalog entry concurrently and wait for all of them.
///
/// Each entry gets its own outcome; a failure never cancels its siblings.
/// Outcomes come back in catalog order.
pub async fn load_catalog<L>(loader: &L, catalog: &[CatalogEntry]) -> Vec<LoadOutcome>
where
    L: AssetLoader + ?Sized,
{
    let loads = catalog.iter().map(|entry| async move {
        let id = entry.id.as_str();
        let report = move |progress: LoadProgress| {
            if let Some(percent) = progress.percent() {
                log::debug!("Loading {}: {:.2}% loaded", id, percent);
            }
        };

        let result = loader
            .load(&entry.source, &report)
            .await
            .map(|graph| ModelAsset::new(id, graph));

        LoadOutcome {
            id: entry.id.clone(),
            result,
        }
    });

    join_all(loads).await
}

/// Fixed-catalog model cache.
///
/// Entries start `Pending`, become `Loaded` or `Failed` exactly once, and a
/// loaded asset is never replaced.
#[derive(Debug, Clone, Default)]
pub struct AssetCache {
    entries: Vec<ModelCacheEntry>,
}

impl AssetCache {
    pub fn new(catalog: Vec<CatalogEntry>) -> Self {
        let entries = catalog
            .into_iter()
            .map(|catalog| ModelCacheEntry {
                catalog,
                status: LoadStatus::Pending,
                asset: None,
            })
            .collect();
        Self { entries }
    }

    /// Load the whole catalog through `loader` and record the outcomes.
    pub async fn preload<L>(&mut self, loader: &L) -> Result<PreloadReport, PreloadError>
    where
        L: AssetLoader + ?Sized,
    {
        let catalog = self.catalog_entries();
        let outcomes = load_catalog(loader, &catalog).await;
        self.apply(outcomes)
    }

    /// Snapshot of the catalog, for callers that drive `load_catalog` themselves.
    pub fn catalog_entries(&self) -> Vec<CatalogEntry> {
        self.entries.iter().map(|e| e.catalog.clone()).collect()
    }

    /// Record load outcomes.
    ///
    /// Fails only if an entry marked `required` did not load; the successful
    /// entries are still recorded in that case.
    pub fn apply(&mut self, outcomes: Vec<LoadOutcome>) -> Result<PreloadReport, PreloadError> {
        let mut report = PreloadReport::default();

        for outcome in outcomes {
            let Some(entry) = self.entries.iter_mut().find(|e| e.catalog.id == outcome.id) else {
                log::warn!("Ignoring load outcome for unknown asset '{}'", outcome.id);
                continue;
            };

            if entry.status == LoadStatus::Loaded {
                log::warn!("Asset '{}' already loaded, keeping the cached copy", outcome.id);
                continue;
            }

            match outcome.result {
                Ok(asset) => {
                    let size = asset.bounds().size();
                    log::info!(
                        "Preloaded model: {} ({} triangles, size {:.3} x {:.3} x {:.3})",
                        outcome.id,
                        asset.graph().triangle_count(),
                        size.x,
                        size.y,
                        size.z
                    );
                    entry.status = LoadStatus::Loaded;
                    entry.asset = Some(asset);
                    report.loaded.push(outcome.id);
                }
                Err(err) => {
                    log::error!("Error preloading model {}: {}", outcome.id, err);
                    entry.status = LoadStatus::Failed(err.to_string());
                    report.failed.push((outcome.id, err.to_string()));
                }
            }
        }

        let required_failed: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.catalog.required && matches!(e.status, LoadStatus::Failed(_)))
            .map(|e| e.catalog.id.clone())
            .collect();

        if required_failed.is_empty() {
            Ok(report)
        } else {
            Err(PreloadError::RequiredAssetsFailed(required_failed))
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ModelCacheEntry] {
        &self.entries
    }

    /// Identifier at a catalog position.
    pub fn id_at(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(|e| e.catalog.id.as_str())
    }

    pub fn status(&self, id: &str) -> Option<&LoadStatus> {
        self.entry(id).map(|e| &e.status)
    }

    pub fn is_loaded(&self, id: &str) -> bool {
        matches!(self.status(id), Some(LoadStatus::Loaded))
    }

    /// True once no entry is still pending.
    pub fn is_settled(&self) -> bool {
        self.entries.iter().all(|e| e.status != LoadStatus::Pending)
    }

    pub fn loaded_count(&self) -> usize {
        self.entries.iter().filter(|e| e.status == LoadStatus::Loaded).count()
    }

    /// Identifiers whose load failed.
    pub fn failed(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| matches!(e.status, LoadStatus::Failed(_)))
            .map(|e| e.catalog.id.as_str())
            .collect()
    }

    /// The cached asset, if loaded.
    pub fn get(&self, id: &str) -> Option<&ModelAsset> {
        self.entry(id).and_then(|e| e.asset.as_ref())
    }

    /// Copy of the cached graph for a new placement.
    pub fn clone_graph(&self, id: &str) -> Option<ModelGraph> {
        self.get(id).map(|asset| asset.graph().clone())
    }

    fn entry(&self, id: &str) -> Option<&ModelCacheEntry> {
        self.entries.iter().find(|e| e.catalog.id == id)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use futures::executor::block_on;
    use vista_math::Vec3;

    use super::*;
    use crate::assets::MemoryLoader;
    use crate::mesh::Mesh;
    use crate::model::ModelNode;

    fn cube(size: Vec3) -> ModelGraph {
        ModelNode::with_mesh("cube", Arc::new(Mesh::cuboid(size)), None)
    }

    fn catalog() -> Vec<CatalogEntry> {
        vec![
            CatalogEntry::new("pot", "models/pot.obj"),
            CatalogEntry::new("sofa", "models/sofa.obj"),
        ]
    }

    #[test]
    fn test_preload_all_succeed() {
        let loader = MemoryLoader::new()
            .with_model("models/pot.obj", cube(Vec3::ONE))
            .with_model("models/sofa.obj", cube(Vec3::new(2.0, 1.0, 1.0)));
        let mut cache = AssetCache::new(catalog());

        assert!(!cache.is_settled());
        let report = block_on(cache.preload(&loader)).unwrap();

        assert_eq!(report.loaded, vec!["pot".to_string(), "sofa".to_string()]);
        assert!(report.is_complete());
        assert!(cache.is_settled());
        assert_eq!(cache.loaded_count(), 2);
        assert!((cache.get("sofa").unwrap().bounds().max_extent() - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_partial_failure_degrades() {
        let loader = MemoryLoader::new()
            .with_model("models/pot.obj", cube(Vec3::ONE))
            .with_failure("models/sofa.obj", "corrupt file");
        let mut cache = AssetCache::new(catalog());

        let report = block_on(cache.preload(&loader)).unwrap();

        assert_eq!(report.loaded, vec!["pot".to_string()]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "sofa");
        assert!(cache.is_loaded("pot"));
        assert!(!cache.is_loaded("sofa"));
        assert_eq!(cache.failed(), vec!["sofa"]);
        assert!(cache.get("sofa").is_none());
        assert!(matches!(cache.status("sofa"), Some(LoadStatus::Failed(_))));
    }

    #[test]
    fn test_required_failure_fails_preload_but_keeps_siblings() {
        let loader = MemoryLoader::new().with_model("models/pot.obj", cube(Vec3::ONE));
        let mut cache = AssetCache::new(vec![
            CatalogEntry::new("pot", "models/pot.obj"),
            CatalogEntry::new("sofa", "models/sofa.obj").required(),
        ]);

        let err = block_on(cache.preload(&loader)).unwrap_err();

        assert_eq!(err, PreloadError::RequiredAssetsFailed(vec!["sofa".to_string()]));
        assert!(cache.is_loaded("pot"));
    }

    #[test]
    fn test_loaded_asset_is_never_replaced() {
        let loader = MemoryLoader::new().with_model("models/pot.obj", cube(Vec3::ONE));
        let mut cache = AssetCache::new(vec![CatalogEntry::new("pot", "models/pot.obj")]);
        block_on(cache.preload(&loader)).unwrap();

        let replacement = LoadOutcome {
            id: "pot".to_string(),
            result: Ok(ModelAsset::new("pot", cube(Vec3::splat(9.0)))),
        };
        let report = cache.apply(vec![replacement]).unwrap();

        assert!(report.loaded.is_empty());
        assert!((cache.get("pot").unwrap().bounds().max_extent() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_clone_graph_does_not_alias_cache() {
        let loader = MemoryLoader::new().with_model("models/pot.obj", cube(Vec3::ONE));
        let mut cache = AssetCache::new(vec![CatalogEntry::new("pot", "models/pot.obj")]);
        block_on(cache.preload(&loader)).unwrap();

        let mut copy = cache.clone_graph("pot").unwrap();
        copy.transform.scale = Vec3::splat(3.0);

        assert_eq!(cache.get("pot").unwrap().graph().transform.scale, Vec3::ONE);
        assert!(cache.clone_graph("missing").is_none());
    }

    #[test]
    fn test_id_at_follows_catalog_order() {
        let cache = AssetCache::new(catalog());
        assert_eq!(cache.id_at(0), Some("pot"));
        assert_eq!(cache.id_at(1), Some("sofa"));
        assert_eq!(cache.id_at(2), None);
        assert_eq!(cache.status("pot"), Some(&LoadStatus::Pending));
    }
}
