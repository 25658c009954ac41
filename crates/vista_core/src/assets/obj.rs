use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::channel::oneshot;
use futures::future::{FutureExt, LocalBoxFuture};
use vista_math::Vec3;

use super::{AssetError, AssetLoader, LoadProgress, ProgressFn};
use crate::mesh::Mesh;
use crate::model::{Material, ModelGraph, ModelNode};

/// Loads Wavefront OBJ models relative to a root directory.
///
/// File access and parsing run on the rayon pool; the returned future only
/// waits for the worker, so polling it never blocks the frame thread.
#[derive(Debug, Clone)]
pub struct ObjLoader {
    root: PathBuf,
}

impl ObjLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl AssetLoader for ObjLoader {
    fn load<'a>(
        &'a self,
        source: &'a str,
        progress: ProgressFn<'a>,
    ) -> LocalBoxFuture<'a, Result<ModelGraph, AssetError>> {
        let path = self.root.join(source);

        async move {
            let (size_tx, size_rx) = oneshot::channel();
            let (done_tx, done_rx) = oneshot::channel();
            rayon::spawn(move || {
                // A dropped receiver means the load was abandoned
                let total = match std::fs::metadata(&path) {
                    Ok(metadata) => metadata.len(),
                    Err(cause) => {
                        let _ = size_tx.send(Err(AssetError::Io { path, cause }));
                        return;
                    }
                };
                let _ = size_tx.send(Ok(total));
                let _ = done_tx.send(parse_obj(&path));
            });

            let cancelled = || AssetError::Cancelled(source.to_string());
            let total = size_rx.await.map_err(|_| cancelled())??;
            progress(LoadProgress::new(0, total));

            let graph = done_rx.await.map_err(|_| cancelled())??;
            progress(LoadProgress::new(total, total));
            Ok(graph)
        }
        .boxed_local()
    }
}

/// Parse an OBJ file (and its MTL library, if any) into a model graph with
/// one child node per OBJ object.
fn parse_obj(path: &Path) -> Result<ModelGraph, AssetError> {
    let (models, materials) = tobj::load_obj(
        path,
        &tobj::LoadOptions {
            single_index: true,
            triangulate: true,
            ..Default::default()
        },
    )
    .map_err(|cause| AssetError::Obj {
        path: path.to_path_buf(),
        cause,
    })?;

    let materials: Vec<Arc<Material>> = match materials {
        Ok(materials) => materials
            .iter()
            .map(|m| {
                let color = m.diffuse.map(Vec3::from_array).unwrap_or(Vec3::splat(0.8));
                let opacity = m.dissolve.unwrap_or(1.0);
                Arc::new(Material {
                    name: m.name.clone(),
                    base_color: color.extend(opacity),
                    unlit: false,
                })
            })
            .collect(),
        Err(err) => {
            log::warn!("No usable materials for {}: {}", path.display(), err);
            Vec::new()
        }
    };

    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unnamed");
    let mut root = ModelNode::group(name);

    for model in models {
        let mesh = &model.mesh;
        if mesh.indices.is_empty() {
            log::debug!("Skipping empty object '{}' in {}", model.name, path.display());
            continue;
        }

        let positions = mesh
            .positions
            .chunks_exact(3)
            .map(|p| Vec3::new(p[0], p[1], p[2]))
            .collect();
        let normals = (!mesh.normals.is_empty()).then(|| {
            mesh.normals
                .chunks_exact(3)
                .map(|n| Vec3::new(n[0], n[1], n[2]))
                .collect()
        });

        let mut geometry = Mesh::new(positions, mesh.indices.clone(), normals);
        geometry.ensure_normals();

        let material = mesh.material_id.and_then(|id| materials.get(id).cloned());
        root.add_child(ModelNode::with_mesh(model.name, Arc::new(geometry), material));
    }

    if root.children.is_empty() {
        return Err(AssetError::NoGeometry(path.display().to_string()));
    }

    Ok(root)
}
