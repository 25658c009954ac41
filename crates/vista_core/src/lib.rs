//! Vista Core - scene graph and model assets for the AR placement engine.
//!
//! This crate provides:
//!
//! - **Geometry**: `Mesh`, plus the reticle ring and simple primitives
//! - **Model graphs**: `ModelNode` trees with per-node transforms and materials
//! - **Scene graph**: `Scene`, the id-keyed set of objects the renderer draws
//! - **Assets**: the `AssetLoader` seam, an OBJ loader and the `AssetCache`
//! - **Rendering seam**: the `RenderTarget` trait the engine draws through
//!
//! # Example
//!
//! ```ignore
//! use vista_core::assets::{AssetCache, CatalogEntry, ObjLoader};
//!
//! let mut cache = AssetCache::new(vec![CatalogEntry::new("sofa", "models/sofa.obj")]);
//! let report = pollster::block_on(cache.preload(&ObjLoader::new(".")))?;
//! println!("{} of {} models ready", report.loaded.len(), cache.len());
//! ```

pub mod assets;
pub mod mesh;
pub mod model;
pub mod render;
pub mod scene;

// Re-export commonly used types
pub use assets::{AssetCache, AssetError, AssetLoader, CatalogEntry, LoadStatus, ModelAsset};
pub use mesh::Mesh;
pub use model::{Material, ModelGraph, ModelNode, Transform};
pub use render::{RecordingTarget, RenderError, RenderTarget};
pub use scene::{Light, NodeId, Scene, SceneObject};
