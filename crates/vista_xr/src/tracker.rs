//! Surface tracking: the viewer/local reference spaces and the hit-test
//! source that turns each frame into a candidate surface pose.
//!
//! Initialization is one async chain (viewer space, hit-test source on it,
//! local space) run on the frame executor. It either yields all three or
//! nothing. A failed chain is retried on a later tick; a chain that finishes
//! after its session is gone is discarded and its source cancelled.

use vista_math::Pose;

use crate::config::TrackingConfig;
use crate::error::XrError;
use crate::executor::{FrameExecutor, Pending, PendingState};
use crate::host::{HitTestResult, HitTestSource, ReferenceSpaceKind, XrFrame, XrSession};
use crate::session::ActiveSession;

const SEARCHING_HINT: &str = "Looking for a surface. Move your device slowly.";

/// Resources owned while tracking is ready.
pub struct TrackingSpaces<S: XrSession> {
    pub viewer: S::Space,
    pub local: S::Space,
    pub hit_test_source: S::HitTestSource,
    pub epoch: u64,
}

/// Observable tracker state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackingStatus {
    Idle,
    Initializing,
    Ready,
    Failed { attempts: u32, error: XrError },
    /// Retry budget used up for this session.
    Exhausted { attempts: u32 },
}

enum TrackerState<S: XrSession> {
    Idle,
    Initializing,
    Ready(TrackingSpaces<S>),
    Failed { attempts: u32, error: XrError },
    Exhausted { attempts: u32 },
}

type InitResult<S> = Result<TrackingSpaces<S>, XrError>;

struct InitRequest<S: XrSession> {
    epoch: u64,
    pending: Pending<InitResult<S>>,
}

pub struct EnvironmentTracker<S: XrSession> {
    config: TrackingConfig,
    state: TrackerState<S>,
    in_flight: Option<InitRequest<S>>,
    /// Chains started for a session that has since ended.
    orphans: Vec<Pending<InitResult<S>>>,
    /// Consecutive failed chains this session.
    failures: u32,
}

impl<S: XrSession> EnvironmentTracker<S> {
    pub fn new(config: TrackingConfig) -> Self {
        Self {
            config,
            state: TrackerState::Idle,
            in_flight: None,
            orphans: Vec::new(),
            failures: 0,
        }
    }

    pub fn status(&self) -> TrackingStatus {
        match &self.state {
            TrackerState::Idle => TrackingStatus::Idle,
            TrackerState::Initializing => TrackingStatus::Initializing,
            TrackerState::Ready(_) => TrackingStatus::Ready,
            TrackerState::Failed { attempts, error } => TrackingStatus::Failed {
                attempts: *attempts,
                error: error.clone(),
            },
            TrackerState::Exhausted { attempts } => TrackingStatus::Exhausted { attempts: *attempts },
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, TrackerState::Ready(_))
    }

    /// Tracking resources, once initialization has succeeded.
    pub fn spaces(&self) -> Option<&TrackingSpaces<S>> {
        match &self.state {
            TrackerState::Ready(spaces) => Some(spaces),
            _ => None,
        }
    }

    /// Persistent user hint while tracking keeps failing.
    pub fn hint(&self) -> Option<&str> {
        match self.state {
            TrackerState::Failed { .. } | TrackerState::Exhausted { .. } => Some(SEARCHING_HINT),
            _ => None,
        }
    }

    /// Start the initialization chain for `active` unless tracking is
    /// already ready, a chain is in flight, or retries are exhausted.
    ///
    /// A retry after a failure keeps the `Failed` state (and the hint) until
    /// the new chain resolves.
    pub fn init_hit_test_source(&mut self, active: &ActiveSession<S>, executor: &FrameExecutor) {
        if self.in_flight.is_some() {
            return;
        }
        let stale = match &self.state {
            TrackerState::Initializing | TrackerState::Exhausted { .. } => return,
            TrackerState::Ready(spaces) => {
                if spaces.epoch == active.epoch {
                    return;
                }
                true
            }
            TrackerState::Idle | TrackerState::Failed { .. } => false,
        };
        if stale {
            self.teardown();
        }

        log::debug!("Initializing hit-test source for session {}", active.epoch);
        let pending = executor.spawn(init_spaces(active.session.clone(), active.epoch));
        self.in_flight = Some(InitRequest {
            epoch: active.epoch,
            pending,
        });
        if matches!(self.state, TrackerState::Idle) {
            self.state = TrackerState::Initializing;
        }
    }

    /// Absorb a completed initialization chain. `current_epoch` is the
    /// active session's epoch, or `None` when no session is active.
    pub fn poll(&mut self, current_epoch: Option<u64>) {
        self.reap_orphans();

        let Some(request) = self.in_flight.as_mut() else {
            return;
        };
        let result = match request.pending.poll_ready() {
            PendingState::Waiting => return,
            PendingState::Ready(result) => result,
            PendingState::Dropped => Err(XrError::TrackingInitFailed("initialization dropped".into())),
        };
        let epoch = request.epoch;
        self.in_flight = None;

        if Some(epoch) != current_epoch {
            log::debug!("Discarding tracking init for stale session {}", epoch);
            if let Ok(spaces) = result {
                spaces.hit_test_source.cancel();
            }
            self.state = TrackerState::Idle;
            return;
        }

        match result {
            Ok(spaces) => {
                log::info!("Hit-test source ready for session {}", epoch);
                self.failures = 0;
                self.state = TrackerState::Ready(spaces);
            }
            Err(error) => self.record_failure(error),
        }
    }

    fn record_failure(&mut self, error: XrError) {
        self.failures += 1;
        let attempts = self.failures;

        let every = self.config.log_every_n_failures.max(1);
        if attempts == 1 || attempts % every == 0 {
            log::warn!("Hit test source initialization failed ({} attempts): {}", attempts, error);
        } else {
            log::debug!("Hit test source initialization failed ({} attempts): {}", attempts, error);
        }

        self.state = match self.config.max_init_attempts {
            Some(max) if attempts >= max => {
                log::warn!("Giving up on surface tracking after {} attempts", attempts);
                TrackerState::Exhausted { attempts }
            }
            _ => TrackerState::Failed { attempts, error },
        };
    }

    fn reap_orphans(&mut self) {
        self.orphans.retain_mut(|pending| match pending.poll_ready() {
            PendingState::Waiting => true,
            PendingState::Ready(Ok(spaces)) => {
                log::debug!("Cancelling hit-test source from ended session {}", spaces.epoch);
                spaces.hit_test_source.cancel();
                false
            }
            PendingState::Ready(Err(_)) | PendingState::Dropped => false,
        });
    }

    /// Pose of the nearest surface hit this frame, in local space. `None`
    /// when tracking is not ready, nothing was hit, or the nearest hit has
    /// no pose in local space.
    pub fn update_pose(&self, frame: &S::Frame) -> Option<Pose> {
        let spaces = self.spaces()?;
        let results = frame.hit_test_results(&spaces.hit_test_source);
        results.first()?.pose(&spaces.local)
    }

    /// Device pose in local space.
    pub fn viewer_pose(&self, frame: &S::Frame) -> Option<Pose> {
        let spaces = self.spaces()?;
        frame.viewer_pose(&spaces.local)
    }

    /// Cancel the hit-test source and drop both spaces. Safe to call in any
    /// state and more than once.
    pub fn teardown(&mut self) {
        if let Some(request) = self.in_flight.take() {
            self.orphans.push(request.pending);
        }
        self.failures = 0;
        if let TrackerState::Ready(spaces) = std::mem::replace(&mut self.state, TrackerState::Idle) {
            spaces.hit_test_source.cancel();
            log::info!("Hit-test source for session {} released", spaces.epoch);
        }
    }
}

async fn init_spaces<S: XrSession>(session: S, epoch: u64) -> InitResult<S> {
    let viewer = session
        .request_reference_space(ReferenceSpaceKind::Viewer)
        .await
        .map_err(|err| XrError::TrackingInitFailed(format!("viewer space: {}", err)))?;

    let source_request = session
        .request_hit_test_source(&viewer)
        .ok_or_else(|| XrError::TrackingInitFailed("hit-test not supported by session".into()))?;
    let hit_test_source = source_request
        .await
        .map_err(|err| XrError::TrackingInitFailed(format!("hit-test source: {}", err)))?;

    match session.request_reference_space(ReferenceSpaceKind::Local).await {
        Ok(local) => Ok(TrackingSpaces {
            viewer,
            local,
            hit_test_source,
            epoch,
        }),
        Err(err) => {
            hit_test_source.cancel();
            Err(XrError::TrackingInitFailed(format!("local space: {}", err)))
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;
    use vista_math::Vec3;

    use super::*;
    use crate::host::{Feature, SessionInit, SessionMode, XrRuntime};
    use crate::sim::{SimFrame, SimRuntime, SimSession};

    fn session(runtime: &SimRuntime, epoch: u64) -> ActiveSession<SimSession> {
        let init = SessionInit {
            required_features: vec![Feature::HitTest],
            optional_features: vec![],
        };
        let session = block_on(runtime.request_session(SessionMode::ImmersiveAr, &init)).unwrap();
        ActiveSession {
            features: session.enabled_features(),
            session,
            epoch,
        }
    }

    fn tick(tracker: &mut EnvironmentTracker<SimSession>, executor: &mut FrameExecutor, epoch: u64) {
        executor.run_until_stalled();
        tracker.poll(Some(epoch));
    }

    #[test]
    fn test_init_then_pose() {
        let runtime = SimRuntime::new();
        let active = session(&runtime, 1);
        let mut executor = FrameExecutor::new();
        let mut tracker = EnvironmentTracker::new(TrackingConfig::default());

        tracker.init_hit_test_source(&active, &executor);
        assert_eq!(tracker.status(), TrackingStatus::Initializing);
        tick(&mut tracker, &mut executor, 1);
        assert!(tracker.is_ready());

        let pose = Pose::from_translation(Vec3::new(0.0, 0.0, -1.0));
        assert_eq!(tracker.update_pose(&SimFrame::with_hit(pose)), Some(pose));
        assert_eq!(tracker.update_pose(&SimFrame::empty()), None);
    }

    #[test]
    fn test_first_result_without_pose_gives_none() {
        let runtime = SimRuntime::new();
        let active = session(&runtime, 1);
        let mut executor = FrameExecutor::new();
        let mut tracker = EnvironmentTracker::new(TrackingConfig::default());
        tracker.init_hit_test_source(&active, &executor);
        tick(&mut tracker, &mut executor, 1);

        let frame = SimFrame::empty().push_hit(None).push_hit(Some(Pose::IDENTITY));
        assert_eq!(tracker.update_pose(&frame), None);
    }

    #[test]
    fn test_no_duplicate_request_while_in_flight() {
        let runtime = SimRuntime::new();
        runtime.hold_hit_test_sources();
        let active = session(&runtime, 1);
        let mut executor = FrameExecutor::new();
        let mut tracker = EnvironmentTracker::new(TrackingConfig::default());

        for _ in 0..3 {
            tracker.init_hit_test_source(&active, &executor);
            tick(&mut tracker, &mut executor, 1);
        }
        assert_eq!(runtime.hit_test_requests(), 1);

        runtime.release_hit_test_sources();
        tick(&mut tracker, &mut executor, 1);
        assert!(tracker.is_ready());

        tracker.init_hit_test_source(&active, &executor);
        assert_eq!(runtime.hit_test_requests(), 1);
    }

    #[test]
    fn test_failure_retried_next_tick() {
        let runtime = SimRuntime::new();
        runtime.fail_hit_test_sources(2);
        let active = session(&runtime, 1);
        let mut executor = FrameExecutor::new();
        let mut tracker = EnvironmentTracker::new(TrackingConfig::default());

        tracker.init_hit_test_source(&active, &executor);
        tick(&mut tracker, &mut executor, 1);
        assert!(matches!(tracker.status(), TrackingStatus::Failed { attempts: 1, .. }));
        assert!(tracker.hint().is_some());

        tracker.init_hit_test_source(&active, &executor);
        tick(&mut tracker, &mut executor, 1);
        assert!(matches!(tracker.status(), TrackingStatus::Failed { attempts: 2, .. }));

        tracker.init_hit_test_source(&active, &executor);
        tick(&mut tracker, &mut executor, 1);
        assert!(tracker.is_ready());
        assert!(tracker.hint().is_none());
        assert_eq!(runtime.hit_test_requests(), 3);
    }

    #[test]
    fn test_retry_budget_exhausts() {
        let runtime = SimRuntime::new();
        runtime.fail_hit_test_sources(10);
        let active = session(&runtime, 1);
        let mut executor = FrameExecutor::new();
        let config = TrackingConfig {
            max_init_attempts: Some(2),
            ..Default::default()
        };
        let mut tracker = EnvironmentTracker::new(config);

        for _ in 0..5 {
            tracker.init_hit_test_source(&active, &executor);
            tick(&mut tracker, &mut executor, 1);
        }
        assert_eq!(tracker.status(), TrackingStatus::Exhausted { attempts: 2 });
        assert_eq!(runtime.hit_test_requests(), 2);
    }

    #[test]
    fn test_local_space_failure_cancels_source() {
        let runtime = SimRuntime::new();
        runtime.fail_local_spaces(1);
        let active = session(&runtime, 1);
        let mut executor = FrameExecutor::new();
        let mut tracker = EnvironmentTracker::new(TrackingConfig::default());

        tracker.init_hit_test_source(&active, &executor);
        tick(&mut tracker, &mut executor, 1);

        assert!(matches!(tracker.status(), TrackingStatus::Failed { .. }));
        assert_eq!(runtime.live_sources(), 0);
        assert_eq!(runtime.cancelled_sources(), 1);
    }

    #[test]
    fn test_session_without_hit_test_fails() {
        let runtime = SimRuntime::new().without_hit_test();
        let active = session(&runtime, 1);
        let mut executor = FrameExecutor::new();
        let mut tracker = EnvironmentTracker::new(TrackingConfig::default());

        tracker.init_hit_test_source(&active, &executor);
        tick(&mut tracker, &mut executor, 1);
        assert!(matches!(
            tracker.status(),
            TrackingStatus::Failed {
                error: XrError::TrackingInitFailed(_),
                ..
            }
        ));
    }

    #[test]
    fn test_teardown_cancels_and_is_idempotent() {
        let runtime = SimRuntime::new();
        let active = session(&runtime, 1);
        let mut executor = FrameExecutor::new();
        let mut tracker = EnvironmentTracker::new(TrackingConfig::default());
        tracker.init_hit_test_source(&active, &executor);
        tick(&mut tracker, &mut executor, 1);

        tracker.teardown();
        tracker.teardown();
        assert_eq!(tracker.status(), TrackingStatus::Idle);
        assert_eq!(runtime.cancelled_sources(), 1);
        assert_eq!(tracker.update_pose(&SimFrame::with_hit(Pose::IDENTITY)), None);
    }

    #[test]
    fn test_late_completion_after_teardown_is_cancelled() {
        let runtime = SimRuntime::new();
        runtime.hold_hit_test_sources();
        let active = session(&runtime, 1);
        let mut executor = FrameExecutor::new();
        let mut tracker = EnvironmentTracker::new(TrackingConfig::default());

        tracker.init_hit_test_source(&active, &executor);
        tick(&mut tracker, &mut executor, 1);
        tracker.teardown();

        runtime.release_hit_test_sources();
        executor.run_until_stalled();
        tracker.poll(None);

        assert_eq!(tracker.status(), TrackingStatus::Idle);
        assert_eq!(runtime.live_sources(), 0);
    }

    #[test]
    fn test_stale_epoch_result_discarded() {
        let runtime = SimRuntime::new();
        let active = session(&runtime, 1);
        let mut executor = FrameExecutor::new();
        let mut tracker = EnvironmentTracker::new(TrackingConfig::default());

        tracker.init_hit_test_source(&active, &executor);
        executor.run_until_stalled();
        tracker.poll(Some(2));

        assert_eq!(tracker.status(), TrackingStatus::Idle);
        assert_eq!(runtime.cancelled_sources(), 1);
    }
}
