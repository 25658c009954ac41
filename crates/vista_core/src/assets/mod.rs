//! Model asset loading and caching.
//!
//! Loading is host-provided through [`AssetLoader`]; the cache owns the
//! fixed catalog, runs every load concurrently and records a status per
//! entry so one bad asset never blocks the rest.

mod cache;
mod memory;
mod obj;

use std::path::PathBuf;

use futures::future::LocalBoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use vista_math::Aabb;

use crate::model::ModelGraph;

pub use cache::{load_catalog, AssetCache, LoadOutcome, ModelCacheEntry, PreloadReport};
pub use memory::MemoryLoader;
pub use obj::ObjLoader;

/// Errors that can occur while loading a single asset.
#[derive(Error, Debug)]
pub enum AssetError {
    #[error("IO error reading {path}: {cause}")]
    Io { path: PathBuf, cause: std::io::Error },

    #[error("OBJ parse error in {path}: {cause}")]
    Obj { path: PathBuf, cause: tobj::LoadError },

    #[error("No geometry found in {0}")]
    NoGeometry(String),

    #[error("Unknown asset source: {0}")]
    NotFound(String),

    #[error("Loader dropped the request for {0}")]
    Cancelled(String),

    #[error("{0}")]
    Other(String),
}

/// Errors reported by a whole-catalog preload.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PreloadError {
    #[error("Required assets failed to load: {}", .0.join(", "))]
    RequiredAssetsFailed(Vec<String>),
}

/// Byte-level progress of one load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadProgress {
    pub loaded_bytes: u64,
    pub total_bytes: u64,
}

impl LoadProgress {
    pub fn new(loaded_bytes: u64, total_bytes: u64) -> Self {
        Self {
            loaded_bytes,
            total_bytes,
        }
    }

    /// Completion percentage, if the total is known.
    pub fn percent(&self) -> Option<f64> {
        (self.total_bytes > 0).then(|| self.loaded_bytes as f64 / self.total_bytes as f64 * 100.0)
    }
}

/// Progress callback handed to a loader for the duration of one load.
pub type ProgressFn<'a> = &'a dyn Fn(LoadProgress);

/// Host-provided asset loading.
///
/// Implementations must not block the caller: long work belongs on a worker
/// and is awaited through the returned future.
pub trait AssetLoader {
    fn load<'a>(
        &'a self,
        source: &'a str,
        progress: ProgressFn<'a>,
    ) -> LocalBoxFuture<'a, Result<ModelGraph, AssetError>>;
}

/// One placeable model in the fixed catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Identifier used by the placement cursor
    pub id: String,

    /// Loader-relative source path or URL
    pub source: String,

    /// A failure of a required entry fails the whole preload
    #[serde(default)]
    pub required: bool,
}

impl CatalogEntry {
    pub fn new(id: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            required: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// An immutable loaded model with its bounding box computed once.
#[derive(Debug, Clone)]
pub struct ModelAsset {
    id: String,
    graph: ModelGraph,
    bounds: Aabb,
}

impl ModelAsset {
    pub fn new(id: impl Into<String>, graph: ModelGraph) -> Self {
        let bounds = graph.bounds();
        Self {
            id: id.into(),
            graph,
            bounds,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn graph(&self) -> &ModelGraph {
        &self.graph
    }

    pub fn bounds(&self) -> Aabb {
        self.bounds
    }
}

/// Load state of one catalog entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    Pending,
    Loaded,
    Failed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_percent() {
        assert_eq!(LoadProgress::new(50, 200).percent(), Some(25.0));
        assert_eq!(LoadProgress::new(10, 0).percent(), None);
    }

    #[test]
    fn test_catalog_entry_required_defaults_false() {
        let entry: CatalogEntry = serde_json::from_str(r#"{"id":"sofa","source":"models/sofa.obj"}"#).unwrap();
        assert_eq!(entry, CatalogEntry::new("sofa", "models/sofa.obj"));
        assert!(CatalogEntry::new("a", "a.obj").required().required);
    }
}
