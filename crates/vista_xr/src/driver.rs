//! Per-frame orchestration.
//!
//! The host calls [`FrameDriver::tick`] from its frame callback. Each tick:
//!
//! 1. runs ready async work on the frame executor,
//! 2. absorbs session and preload completions,
//! 3. with an active session and a frame: starts tracking if needed,
//!    updates the reticle from the nearest hit, the camera from the viewer
//!    pose and the estimated light from the device's light estimate,
//! 4. renders.
//!
//! Nothing here blocks; work started in one tick is observed in a later one.

use std::rc::Rc;
use std::time::{Duration, Instant};

use vista_core::assets::{load_catalog, LoadOutcome, PreloadError, PreloadReport};
use vista_core::{AssetCache, AssetLoader, LoadStatus, RenderTarget, Scene};
use vista_math::{Camera, Vec3};

use crate::config::EngineConfig;
use crate::error::{XrError, XrResult};
use crate::executor::{FrameExecutor, Pending, PendingState};
use crate::host::{Feature, XrFrame, XrRuntime, XrSession};
use crate::lighting::LightEstimator;
use crate::placement::{Placement, PlacementController};
use crate::session::{SessionManager, SessionState, SessionTransition};
use crate::tracker::EnvironmentTracker;

/// Frame type delivered by runtime `R`'s sessions.
pub type FrameOf<R> = <<R as XrRuntime>::Session as XrSession>::Frame;

#[derive(Debug, Clone, Default)]
pub struct FrameStats {
    pub frames: u64,
    pub last_timestamp: Option<f64>,
    pub last_tick: Duration,
    /// Ticks that ran longer than the configured budget
    pub over_budget: u64,
}

pub struct FrameDriver<R: XrRuntime, T: RenderTarget> {
    executor: FrameExecutor,
    session: SessionManager<R>,
    tracker: EnvironmentTracker<R::Session>,
    placement: PlacementController,
    lighting: LightEstimator,
    assets: AssetCache,
    preload: Option<Pending<Vec<LoadOutcome>>>,
    preload_result: Option<Result<PreloadReport, PreloadError>>,
    asset_failures: Vec<XrError>,
    scene: Scene,
    camera: Camera,
    target: T,
    config: EngineConfig,
    stats: FrameStats,
}

impl<R: XrRuntime, T: RenderTarget> FrameDriver<R, T> {
    pub fn new(runtime: R, target: T, config: EngineConfig) -> Self {
        let mut scene = Scene::with_default_lighting();
        let placement = PlacementController::new(&mut scene, &config.reticle);
        let camera = Camera::new(Vec3::ZERO, Vec3::NEG_Z, 1.0).with_projection(
            config.camera.fov_y_degrees,
            config.camera.near,
            config.camera.far,
        );

        Self {
            executor: FrameExecutor::new(),
            session: SessionManager::new(runtime, config.session.mode),
            tracker: EnvironmentTracker::new(config.tracking.clone()),
            placement,
            lighting: LightEstimator::new(),
            assets: AssetCache::new(config.catalog.clone()),
            preload: None,
            preload_result: None,
            asset_failures: Vec::new(),
            scene,
            camera,
            target,
            config,
            stats: FrameStats::default(),
        }
    }

    /// Start loading the whole catalog. Models become placeable once every
    /// load has finished.
    pub fn preload<L>(&mut self, loader: Rc<L>)
    where
        L: AssetLoader + 'static,
    {
        if self.preload.is_some() || self.preload_result.is_some() {
            log::warn!("Preload already started");
            return;
        }

        let catalog = self.assets.catalog_entries();
        log::info!("Preloading {} models", catalog.len());
        self.preload = Some(
            self.executor
                .spawn(async move { load_catalog(loader.as_ref(), &catalog).await }),
        );
    }

    /// Issue the AR capability query.
    pub fn check_support(&mut self) {
        self.session.check_support(&self.executor);
    }

    /// Request an AR session with the configured features.
    pub fn enter_ar(&mut self) -> XrResult<()> {
        self.session.start(&self.executor, self.config.session.init())
    }

    /// End the AR session, releasing tracking and the placed model.
    pub fn exit_ar(&mut self) {
        if let Some(transition) = self.session.end(&self.executor) {
            self.handle_transition(transition);
        }
    }

    /// User trigger (tap, controller select).
    pub fn on_select(&mut self) -> Option<Placement> {
        if !self.session.is_active() {
            return None;
        }
        self.placement.on_trigger(&self.assets, &mut self.scene)
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.camera.set_aspect(width as f32 / height as f32);
        self.target.resize(width, height);
    }

    /// Run ready async work and absorb its results without rendering.
    pub fn pump(&mut self) {
        self.executor.run_until_stalled();
        self.poll_preload();

        while let Some(transition) = self.session.poll(&self.executor) {
            self.handle_transition(transition);
        }

        let epoch = self.session.active().map(|active| active.epoch);
        self.tracker.poll(epoch);
    }

    /// One frame. `frame` is `None` when the host has no XR frame for this
    /// callback (no session, or the desktop fallback loop).
    pub fn tick(&mut self, timestamp: f64, frame: Option<&FrameOf<R>>) {
        let started = Instant::now();
        self.pump();

        if let (Some(active), Some(frame)) = (self.session.active(), frame) {
            self.tracker.init_hit_test_source(active, &self.executor);

            let pose = self.tracker.update_pose(frame);
            self.placement.update_reticle(pose, &mut self.scene);

            if let Some(viewer) = self.tracker.viewer_pose(frame) {
                self.camera.set_pose(&viewer);
            }

            if active.has_feature(Feature::LightEstimation) {
                if let Some(spaces) = self.tracker.spaces() {
                    let estimate = frame.light_estimate(&spaces.local);
                    self.lighting.update(estimate, &mut self.scene);
                }
            }
        }

        let passthrough = self.session.is_active();
        if let Err(err) = self.target.render(&self.scene, &self.camera, passthrough) {
            log::warn!("Render failed: {}", err);
        }

        self.record_tick(timestamp, started.elapsed());
    }

    fn record_tick(&mut self, timestamp: f64, elapsed: Duration) {
        self.stats.frames += 1;
        self.stats.last_timestamp = Some(timestamp);
        self.stats.last_tick = elapsed;

        let budget_ms = f64::from(self.config.frame_budget_ms);
        let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
        if elapsed_ms > budget_ms {
            self.stats.over_budget += 1;
            log::debug!(
                "Frame {} took {:.2}ms (budget {:.2}ms)",
                self.stats.frames,
                elapsed_ms,
                budget_ms
            );
        }
    }

    fn poll_preload(&mut self) {
        let Some(pending) = self.preload.as_mut() else {
            return;
        };
        let outcomes = match pending.poll_ready() {
            PendingState::Waiting => return,
            PendingState::Ready(outcomes) => outcomes,
            PendingState::Dropped => {
                log::error!("Preload task dropped");
                Vec::new()
            }
        };
        self.preload = None;

        let result = self.assets.apply(outcomes);
        self.asset_failures = self
            .assets
            .entries()
            .iter()
            .filter_map(|entry| match entry.status() {
                LoadStatus::Failed(reason) => Some(XrError::AssetLoadFailed {
                    id: entry.catalog().id.clone(),
                    reason: reason.clone(),
                }),
                _ => None,
            })
            .collect();

        match &result {
            Ok(report) => log::info!(
                "Preload finished: {} loaded, {} failed",
                report.loaded.len(),
                report.failed.len()
            ),
            Err(err) => log::error!("{}", err),
        }
        self.preload_result = Some(result);
    }

    fn handle_transition(&mut self, transition: SessionTransition) {
        match transition {
            SessionTransition::Ended { epoch, by_device } => {
                log::debug!("Releasing session {} resources (device: {})", epoch, by_device);
                self.tracker.teardown();
                self.placement.reset(&mut self.scene);
                self.lighting.clear(&mut self.scene);
            }
            SessionTransition::Started { epoch } => {
                log::debug!("Session {} active, tracking starts on next frame", epoch);
            }
            SessionTransition::SupportResolved { .. } | SessionTransition::StartFailed(_) => {}
        }
    }

    /// Text for the host's status overlay, most important first.
    pub fn status_message(&self) -> Option<String> {
        if let Some(err) = self.session.message() {
            return Some(err.to_string());
        }
        if let Some(Err(err)) = &self.preload_result {
            return Some(err.to_string());
        }
        if self.session.is_active() {
            return self.tracker.hint().map(str::to_string);
        }
        None
    }

    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }

    pub fn session(&self) -> &SessionManager<R> {
        &self.session
    }

    pub fn tracker(&self) -> &EnvironmentTracker<R::Session> {
        &self.tracker
    }

    pub fn placement(&self) -> &PlacementController {
        &self.placement
    }

    pub fn lighting(&self) -> &LightEstimator {
        &self.lighting
    }

    pub fn assets(&self) -> &AssetCache {
        &self.assets
    }

    /// `Some` once the preload join has completed.
    pub fn preload_result(&self) -> Option<&Result<PreloadReport, PreloadError>> {
        self.preload_result.as_ref()
    }

    /// One entry per catalog model that failed to load; those models are
    /// skipped by placement.
    pub fn asset_failures(&self) -> &[XrError] {
        &self.asset_failures
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn target_mut(&mut self) -> &mut T {
        &mut self.target
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }
}
