//! Scriptable in-process XR host.
//!
//! Used by the integration tests and by the desktop viewer, which feeds it
//! mouse-ray hits against a floor plane. All handles share one
//! `Rc<RefCell<SimState>>` so a test can script failures up front and
//! inspect what the engine asked for afterwards.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use futures::channel::oneshot;
use futures::future::{self, FutureExt, LocalBoxFuture};
use vista_math::Pose;

use crate::error::HostError;
use crate::host::{
    Feature, HitTestResult, HitTestSource, LightEstimate, ReferenceSpaceKind, SessionEvent, SessionInit,
    SessionMode, XrFrame, XrRuntime, XrSession,
};

type SessionReply = oneshot::Sender<Result<SimSession, HostError>>;
type SourceReply = oneshot::Sender<Result<SimHitTestSource, HostError>>;

struct SessionRecord {
    ended: bool,
    events: VecDeque<SessionEvent>,
}

struct SimState {
    supported: Result<bool, HostError>,
    rejection: Option<String>,
    /// `None` grants everything requested
    granted: Option<Vec<Feature>>,
    hit_test_supported: bool,
    failing_sources: u32,
    failing_local_spaces: u32,
    hold_sessions: bool,
    held_sessions: Vec<(SessionReply, SimSession)>,
    hold_sources: bool,
    held_sources: Vec<(SourceReply, SimHitTestSource)>,
    support_queries: u32,
    session_requests: u32,
    source_requests: u32,
    sessions: Vec<SessionRecord>,
    sources: Vec<Rc<Cell<bool>>>,
}

impl Default for SimState {
    fn default() -> Self {
        Self {
            supported: Ok(true),
            rejection: None,
            granted: None,
            hit_test_supported: true,
            failing_sources: 0,
            failing_local_spaces: 0,
            hold_sessions: false,
            held_sessions: Vec::new(),
            hold_sources: false,
            held_sources: Vec::new(),
            support_queries: 0,
            session_requests: 0,
            source_requests: 0,
            sessions: Vec::new(),
            sources: Vec::new(),
        }
    }
}

impl SimState {
    fn new_source(&mut self) -> SimHitTestSource {
        let cancelled = Rc::new(Cell::new(false));
        self.sources.push(cancelled.clone());
        SimHitTestSource {
            id: self.sources.len() - 1,
            cancelled,
        }
    }
}

/// Simulated device. Cloning shares the same device.
#[derive(Clone, Default)]
pub struct SimRuntime {
    state: Rc<RefCell<SimState>>,
}

impl SimRuntime {
    /// A device that supports AR and grants every requested feature.
    pub fn new() -> Self {
        Self::default()
    }

    /// Capability query answers `false`.
    pub fn unsupported() -> Self {
        let runtime = Self::new();
        runtime.state.borrow_mut().supported = Ok(false);
        runtime
    }

    /// No XR API at all; the capability query fails.
    pub fn unavailable() -> Self {
        let runtime = Self::new();
        runtime.state.borrow_mut().supported = Err(HostError::Unavailable);
        runtime
    }

    pub fn reject_sessions(self, reason: impl Into<String>) -> Self {
        self.state.borrow_mut().rejection = Some(reason.into());
        self
    }

    /// Grant only these features (intersected with what is requested).
    pub fn grant_only(self, features: &[Feature]) -> Self {
        self.state.borrow_mut().granted = Some(features.to_vec());
        self
    }

    /// Sessions cannot create hit-test sources at all.
    pub fn without_hit_test(self) -> Self {
        self.state.borrow_mut().hit_test_supported = false;
        self
    }

    /// The next `count` hit-test source requests are rejected.
    pub fn fail_hit_test_sources(&self, count: u32) {
        self.state.borrow_mut().failing_sources = count;
    }

    /// The next `count` local reference space requests are rejected.
    pub fn fail_local_spaces(&self, count: u32) {
        self.state.borrow_mut().failing_local_spaces = count;
    }

    /// Keep session requests pending until [`release_sessions`](Self::release_sessions).
    pub fn hold_sessions(&self) {
        self.state.borrow_mut().hold_sessions = true;
    }

    pub fn release_sessions(&self) {
        let held = {
            let mut state = self.state.borrow_mut();
            state.hold_sessions = false;
            std::mem::take(&mut state.held_sessions)
        };
        for (reply, session) in held {
            let _ = reply.send(Ok(session));
        }
    }

    /// Keep hit-test source requests pending until
    /// [`release_hit_test_sources`](Self::release_hit_test_sources).
    pub fn hold_hit_test_sources(&self) {
        self.state.borrow_mut().hold_sources = true;
    }

    pub fn release_hit_test_sources(&self) {
        let held = {
            let mut state = self.state.borrow_mut();
            state.hold_sources = false;
            std::mem::take(&mut state.held_sources)
        };
        for (reply, source) in held {
            let _ = reply.send(Ok(source));
        }
    }

    /// The device ends the most recent live session.
    pub fn end_from_device(&self) {
        let mut state = self.state.borrow_mut();
        if let Some(record) = state.sessions.iter_mut().rev().find(|record| !record.ended) {
            record.ended = true;
            record.events.push_back(SessionEvent::Ended);
        }
    }

    pub fn support_queries(&self) -> u32 {
        self.state.borrow().support_queries
    }

    pub fn session_requests(&self) -> u32 {
        self.state.borrow().session_requests
    }

    pub fn hit_test_requests(&self) -> u32 {
        self.state.borrow().source_requests
    }

    /// Sources created and not yet cancelled.
    pub fn live_sources(&self) -> usize {
        self.state.borrow().sources.iter().filter(|c| !c.get()).count()
    }

    pub fn cancelled_sources(&self) -> usize {
        self.state.borrow().sources.iter().filter(|c| c.get()).count()
    }

    pub fn sessions_started(&self) -> usize {
        self.state.borrow().sessions.len()
    }

    pub fn sessions_ended(&self) -> usize {
        self.state.borrow().sessions.iter().filter(|record| record.ended).count()
    }
}

impl XrRuntime for SimRuntime {
    type Session = SimSession;

    fn is_session_supported(&self, mode: SessionMode) -> LocalBoxFuture<'static, Result<bool, HostError>> {
        let mut state = self.state.borrow_mut();
        state.support_queries += 1;
        let answer = state.supported.clone().map(|ok| ok && mode != SessionMode::ImmersiveVr);
        future::ready(answer).boxed_local()
    }

    fn request_session(
        &self,
        _mode: SessionMode,
        init: &SessionInit,
    ) -> LocalBoxFuture<'static, Result<SimSession, HostError>> {
        let mut state = self.state.borrow_mut();
        state.session_requests += 1;

        if let Some(reason) = state.rejection.clone() {
            return future::ready(Err(HostError::Rejected(reason))).boxed_local();
        }

        let features = init
            .required_features
            .iter()
            .chain(&init.optional_features)
            .copied()
            .filter(|f| state.granted.as_ref().map_or(true, |granted| granted.contains(f)))
            .collect();

        state.sessions.push(SessionRecord {
            ended: false,
            events: VecDeque::new(),
        });
        let session = SimSession {
            index: state.sessions.len() - 1,
            features: Rc::new(features),
            state: self.state.clone(),
        };

        if state.hold_sessions {
            let (tx, rx) = oneshot::channel();
            state.held_sessions.push((tx, session));
            return async move { rx.await.unwrap_or(Err(HostError::SessionEnded)) }.boxed_local();
        }
        future::ready(Ok(session)).boxed_local()
    }
}

#[derive(Clone)]
pub struct SimSession {
    index: usize,
    features: Rc<Vec<Feature>>,
    state: Rc<RefCell<SimState>>,
}

impl SimSession {
    pub fn is_ended(&self) -> bool {
        self.state.borrow().sessions[self.index].ended
    }
}

impl XrSession for SimSession {
    type Space = SimSpace;
    type HitTestSource = SimHitTestSource;
    type Frame = SimFrame;

    fn enabled_features(&self) -> Vec<Feature> {
        self.features.as_ref().clone()
    }

    fn request_reference_space(
        &self,
        kind: ReferenceSpaceKind,
    ) -> LocalBoxFuture<'static, Result<SimSpace, HostError>> {
        let mut state = self.state.borrow_mut();
        let result = if state.sessions[self.index].ended {
            Err(HostError::SessionEnded)
        } else if kind == ReferenceSpaceKind::Local && state.failing_local_spaces > 0 {
            state.failing_local_spaces -= 1;
            Err(HostError::Rejected("local space unavailable".into()))
        } else {
            Ok(SimSpace { kind })
        };
        future::ready(result).boxed_local()
    }

    fn request_hit_test_source(
        &self,
        _space: &SimSpace,
    ) -> Option<LocalBoxFuture<'static, Result<SimHitTestSource, HostError>>> {
        let mut state = self.state.borrow_mut();
        if !state.hit_test_supported || !self.features.contains(&Feature::HitTest) {
            return None;
        }
        state.source_requests += 1;

        if state.sessions[self.index].ended {
            return Some(future::ready(Err(HostError::SessionEnded)).boxed_local());
        }
        if state.failing_sources > 0 {
            state.failing_sources -= 1;
            return Some(future::ready(Err(HostError::Rejected("tracking not ready".into()))).boxed_local());
        }

        let source = state.new_source();
        if state.hold_sources {
            let (tx, rx) = oneshot::channel();
            state.held_sources.push((tx, source));
            return Some(async move { rx.await.unwrap_or(Err(HostError::SessionEnded)) }.boxed_local());
        }
        Some(future::ready(Ok(source)).boxed_local())
    }

    fn end(&self) -> LocalBoxFuture<'static, Result<(), HostError>> {
        let mut state = self.state.borrow_mut();
        let record = &mut state.sessions[self.index];
        let result = if record.ended {
            Err(HostError::SessionEnded)
        } else {
            record.ended = true;
            Ok(())
        };
        future::ready(result).boxed_local()
    }

    fn poll_event(&self) -> Option<SessionEvent> {
        self.state.borrow_mut().sessions[self.index].events.pop_front()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimSpace {
    pub kind: ReferenceSpaceKind,
}

#[derive(Debug, Clone)]
pub struct SimHitTestSource {
    id: usize,
    cancelled: Rc<Cell<bool>>,
}

impl SimHitTestSource {
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }
}

impl HitTestSource for SimHitTestSource {
    fn cancel(&self) {
        if !self.cancelled.replace(true) {
            log::debug!("Hit-test source {} cancelled", self.id);
        }
    }
}

/// One scripted hit. `pose: None` models a result the host cannot express
/// in the requested space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimHit {
    pub pose: Option<Pose>,
}

impl HitTestResult for SimHit {
    type Space = SimSpace;

    fn pose(&self, _space: &SimSpace) -> Option<Pose> {
        self.pose
    }
}

/// Frame data handed to `tick`.
#[derive(Debug, Clone, Default)]
pub struct SimFrame {
    pub hits: Vec<SimHit>,
    pub viewer: Option<Pose>,
    pub light: Option<LightEstimate>,
}

impl SimFrame {
    /// A frame in which nothing was hit.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_hit(pose: Pose) -> Self {
        Self {
            hits: vec![SimHit { pose: Some(pose) }],
            ..Self::default()
        }
    }

    pub fn with_viewer(mut self, pose: Pose) -> Self {
        self.viewer = Some(pose);
        self
    }

    pub fn with_light(mut self, estimate: LightEstimate) -> Self {
        self.light = Some(estimate);
        self
    }

    pub fn push_hit(mut self, pose: Option<Pose>) -> Self {
        self.hits.push(SimHit { pose });
        self
    }
}

impl XrFrame for SimFrame {
    type Space = SimSpace;
    type HitTestSource = SimHitTestSource;
    type HitTestResult = SimHit;

    fn hit_test_results(&self, source: &SimHitTestSource) -> Vec<SimHit> {
        if source.is_cancelled() {
            return Vec::new();
        }
        self.hits.clone()
    }

    fn viewer_pose(&self, _space: &SimSpace) -> Option<Pose> {
        self.viewer
    }

    fn light_estimate(&self, _space: &SimSpace) -> Option<LightEstimate> {
        self.light
    }
}
