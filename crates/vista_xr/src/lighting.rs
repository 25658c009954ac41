//! Device light estimation.
//!
//! While the session has `light-estimation` and the device reports an
//! estimate, the scene carries one [`Light::Estimated`] that follows it.
//! A frame without an estimate ends estimation and removes the light; so
//! does the end of the session.

use vista_core::{Light, Scene};
use vista_math::Vec3;

use crate::host::LightEstimate;

#[derive(Debug, Default)]
pub struct LightEstimator {
    estimating: bool,
    updates: u64,
}

impl LightEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_estimating(&self) -> bool {
        self.estimating
    }

    /// Estimates applied since the last start.
    pub fn updates(&self) -> u64 {
        self.updates
    }

    /// Apply this frame's estimate, or end estimation when there is none.
    pub fn update(&mut self, estimate: Option<LightEstimate>, scene: &mut Scene) {
        let Some(estimate) = estimate else {
            self.clear(scene);
            return;
        };

        if !self.estimating {
            log::info!("Light estimation started");
            self.estimating = true;
            self.updates = 0;
        }
        self.updates += 1;
        scene.set_estimated_light(to_light(&estimate));
    }

    /// Remove the estimated light. Safe to call when not estimating.
    pub fn clear(&mut self, scene: &mut Scene) {
        let removed = scene.clear_estimated_light();
        if self.estimating {
            log::info!("Light estimation ended after {} updates", self.updates);
        } else if removed {
            log::debug!("Removed stale estimated light");
        }
        self.estimating = false;
    }
}

fn to_light(estimate: &LightEstimate) -> Light {
    Light::Estimated {
        ambient: estimate.ambient,
        color: estimate.primary_color,
        intensity: estimate.primary_intensity,
        direction: estimate.primary_direction.try_normalize().unwrap_or(Vec3::Y),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimate(intensity: f32) -> LightEstimate {
        LightEstimate {
            ambient: Vec3::splat(0.1),
            primary_color: Vec3::ONE,
            primary_intensity: intensity,
            primary_direction: Vec3::new(0.0, 2.0, 0.0),
        }
    }

    #[test]
    fn test_estimate_adds_single_light() {
        let mut scene = Scene::with_default_lighting();
        let mut lighting = LightEstimator::new();

        lighting.update(Some(estimate(1.0)), &mut scene);
        lighting.update(Some(estimate(3.0)), &mut scene);

        assert!(lighting.is_estimating());
        assert_eq!(lighting.updates(), 2);
        assert_eq!(scene.lights.len(), 3);
        match scene.estimated_light() {
            Some(Light::Estimated {
                intensity, direction, ..
            }) => {
                assert_eq!(*intensity, 3.0);
                assert_eq!(*direction, Vec3::Y);
            }
            other => panic!("expected estimated light, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_estimate_ends_estimation() {
        let mut scene = Scene::with_default_lighting();
        let mut lighting = LightEstimator::new();
        lighting.update(Some(estimate(1.0)), &mut scene);

        lighting.update(None, &mut scene);
        assert!(!lighting.is_estimating());
        assert!(scene.estimated_light().is_none());
        assert_eq!(scene.lights.len(), 2);

        // Restart counts from zero
        lighting.update(Some(estimate(1.0)), &mut scene);
        assert_eq!(lighting.updates(), 1);
    }

    #[test]
    fn test_zero_direction_points_up() {
        let mut scene = Scene::new();
        let mut lighting = LightEstimator::new();
        let mut flat = estimate(1.0);
        flat.primary_direction = Vec3::ZERO;

        lighting.update(Some(flat), &mut scene);
        assert!(matches!(
            scene.estimated_light(),
            Some(Light::Estimated { direction, .. }) if *direction == Vec3::Y
        ));
    }

    #[test]
    fn test_clear_is_idempotent() {
        let mut scene = Scene::with_default_lighting();
        let mut lighting = LightEstimator::new();
        lighting.clear(&mut scene);
        lighting.update(Some(estimate(1.0)), &mut scene);
        lighting.clear(&mut scene);
        lighting.clear(&mut scene);

        assert!(!lighting.is_estimating());
        assert_eq!(scene.lights.len(), 2);
    }
}
