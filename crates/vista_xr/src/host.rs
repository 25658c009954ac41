//! Traits the host platform implements: capability query, session, reference
//! spaces, hit-test sources and per-frame data.
//!
//! Async requests return `'static` local futures; the engine runs them on its
//! frame executor and observes completion on a later tick.

use std::fmt;

use futures::future::LocalBoxFuture;
use serde::{Deserialize, Serialize};
use vista_math::{Pose, Vec3};

use crate::error::HostError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionMode {
    ImmersiveAr,
    ImmersiveVr,
    Inline,
}

/// Session features negotiated at request time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Feature {
    HitTest,
    DepthSensing,
    LightEstimation,
    Anchors,
    DomOverlay,
    PlaneDetection,
}

impl Feature {
    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::HitTest => "hit-test",
            Feature::DepthSensing => "depth-sensing",
            Feature::LightEstimation => "light-estimation",
            Feature::Anchors => "anchors",
            Feature::DomOverlay => "dom-overlay",
            Feature::PlaneDetection => "plane-detection",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceSpaceKind {
    /// Tracks the device itself; origin of hit-test rays.
    Viewer,
    /// World-stable origin near where the session started.
    Local,
}

/// Capability list for a session request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionInit {
    pub required_features: Vec<Feature>,
    pub optional_features: Vec<Feature>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The device or user agent ended the session.
    Ended,
}

/// Capability query and session factory.
pub trait XrRuntime {
    type Session: XrSession;

    /// Fails with [`HostError::Unavailable`] when the host has no XR API.
    fn is_session_supported(&self, mode: SessionMode) -> LocalBoxFuture<'static, Result<bool, HostError>>;

    fn request_session(
        &self,
        mode: SessionMode,
        init: &SessionInit,
    ) -> LocalBoxFuture<'static, Result<Self::Session, HostError>>;
}

/// Handle to an immersive session. Cloning yields another handle to the
/// same session.
pub trait XrSession: Clone + 'static {
    type Space: Clone + 'static;
    type HitTestSource: HitTestSource + 'static;
    type Frame: XrFrame<Space = Self::Space, HitTestSource = Self::HitTestSource>;

    fn enabled_features(&self) -> Vec<Feature>;

    fn request_reference_space(
        &self,
        kind: ReferenceSpaceKind,
    ) -> LocalBoxFuture<'static, Result<Self::Space, HostError>>;

    /// `None` when the session cannot hit-test at all.
    fn request_hit_test_source(
        &self,
        space: &Self::Space,
    ) -> Option<LocalBoxFuture<'static, Result<Self::HitTestSource, HostError>>>;

    fn end(&self) -> LocalBoxFuture<'static, Result<(), HostError>>;

    /// Next pending lifecycle event, if any.
    fn poll_event(&self) -> Option<SessionEvent>;
}

pub trait HitTestSource {
    /// Stop producing results. Must be safe to call more than once.
    fn cancel(&self);
}

/// One candidate surface point from a hit-test.
pub trait HitTestResult {
    type Space;

    fn pose(&self, space: &Self::Space) -> Option<Pose>;
}

/// Real-world lighting reported by the device, in the space it was queried in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightEstimate {
    /// Ambient colour * intensity
    pub ambient: Vec3,
    pub primary_color: Vec3,
    pub primary_intensity: f32,
    /// Unit vector pointing toward the dominant light
    pub primary_direction: Vec3,
}

/// Data delivered with one device frame.
pub trait XrFrame {
    type Space;
    type HitTestSource;
    type HitTestResult: HitTestResult<Space = Self::Space>;

    /// Results ordered nearest first. Empty is a normal outcome.
    fn hit_test_results(&self, source: &Self::HitTestSource) -> Vec<Self::HitTestResult>;

    fn viewer_pose(&self, space: &Self::Space) -> Option<Pose>;

    /// `None` while the device has no estimate (or never provides one).
    fn light_estimate(&self, _space: &Self::Space) -> Option<LightEstimate> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_names_match_serde() {
        for feature in [
            Feature::HitTest,
            Feature::DepthSensing,
            Feature::LightEstimation,
            Feature::Anchors,
        ] {
            let json = serde_json::to_string(&feature).unwrap();
            assert_eq!(json, format!("\"{}\"", feature));
        }
    }
}
