use std::collections::HashMap;

use futures::future::{self, FutureExt, LocalBoxFuture};

use super::{AssetError, AssetLoader, LoadProgress, ProgressFn};
use crate::model::ModelGraph;

/// Loader serving prebuilt graphs from memory.
///
/// Used for built-in demo models and as a test double; every load resolves
/// on first poll.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    models: HashMap<String, ModelGraph>,
    failures: HashMap<String, String>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, source: impl Into<String>, graph: ModelGraph) -> Self {
        self.models.insert(source.into(), graph);
        self
    }

    /// Make loads of `source` fail with `reason`.
    pub fn with_failure(mut self, source: impl Into<String>, reason: impl Into<String>) -> Self {
        self.failures.insert(source.into(), reason.into());
        self
    }
}

impl AssetLoader for MemoryLoader {
    fn load<'a>(
        &'a self,
        source: &'a str,
        progress: ProgressFn<'a>,
    ) -> LocalBoxFuture<'a, Result<ModelGraph, AssetError>> {
        let result = if let Some(reason) = self.failures.get(source) {
            Err(AssetError::Other(reason.clone()))
        } else if let Some(graph) = self.models.get(source) {
            progress(LoadProgress::new(1, 1));
            Ok(graph.clone())
        } else {
            Err(AssetError::NotFound(source.to_string()))
        };
        future::ready(result).boxed_local()
    }
}
