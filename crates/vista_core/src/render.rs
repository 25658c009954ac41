//! Render target seam.
//!
//! The engine hands the scene and camera to a `RenderTarget` once per tick,
//! after the reticle has been updated. The wgpu implementation lives in
//! `vista_render`; tests use [`RecordingTarget`].

use thiserror::Error;
use vista_math::{Camera, Mat4};

use crate::scene::Scene;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// Surface lost or outdated; the target reconfigures and skips the frame.
    #[error("Render surface lost")]
    SurfaceLost,

    #[error("Out of GPU memory")]
    OutOfMemory,

    #[error("Render failed: {0}")]
    Other(String),
}

pub trait RenderTarget {
    /// Zero sizes are ignored by callers.
    fn resize(&mut self, width: u32, height: u32);

    /// Draw one frame. With `passthrough` set the clear colour is transparent
    /// so the camera feed shows through.
    fn render(&mut self, scene: &Scene, camera: &Camera, passthrough: bool) -> Result<(), RenderError>;
}

/// Snapshot of one `render` call.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedFrame {
    pub visible_objects: Vec<String>,
    pub view_projection: Mat4,
    pub passthrough: bool,
}

/// Target that records what it was asked to draw.
#[derive(Debug, Default)]
pub struct RecordingTarget {
    pub frames: Vec<RenderedFrame>,
    pub size: (u32, u32),
    /// Error returned from the next `render` call.
    pub fail_next: Option<RenderError>,
}

impl RecordingTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<&RenderedFrame> {
        self.frames.last()
    }
}

impl RenderTarget for RecordingTarget {
    fn resize(&mut self, width: u32, height: u32) {
        self.size = (width, height);
    }

    fn render(&mut self, scene: &Scene, camera: &Camera, passthrough: bool) -> Result<(), RenderError> {
        if let Some(err) = self.fail_next.take() {
            return Err(err);
        }
        self.frames.push(RenderedFrame {
            visible_objects: scene.visible_objects().map(|obj| obj.name.clone()).collect(),
            view_projection: camera.view_projection_matrix(),
            passthrough,
        });
        Ok(())
    }
}
