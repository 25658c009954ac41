//! Session lifecycle: capability check, session request and teardown.
//!
//! State is an explicit machine that the frame driver reads each tick:
//!
//! ```text
//! Unchecked -> Checking -> Unsupported
//!                       -> Inactive -> Requesting -> Active -> Inactive
//!                                                 -> Inactive (rejected)
//! ```

use crate::error::{HostError, XrError, XrResult};
use crate::executor::{FrameExecutor, Pending, PendingState};
use crate::host::{Feature, SessionEvent, SessionInit, SessionMode, XrRuntime, XrSession};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unchecked,
    Checking,
    Unsupported,
    Inactive,
    Requesting,
    Active,
}

/// State change observed by [`SessionManager::poll`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionTransition {
    SupportResolved { supported: bool },
    Started { epoch: u64 },
    StartFailed(XrError),
    Ended { epoch: u64, by_device: bool },
}

/// The live session plus what was negotiated for it.
#[derive(Debug, Clone)]
pub struct ActiveSession<S> {
    pub session: S,
    pub features: Vec<Feature>,
    /// Increments with every session; stale async results compare against it.
    pub epoch: u64,
}

impl<S> ActiveSession<S> {
    pub fn has_feature(&self, feature: Feature) -> bool {
        self.features.contains(&feature)
    }
}

struct SessionRequest<S> {
    pending: Pending<Result<S, HostError>>,
    init: SessionInit,
}

pub struct SessionManager<R: XrRuntime> {
    runtime: R,
    mode: SessionMode,
    state: SessionState,
    support_check: Option<Pending<Result<bool, HostError>>>,
    request: Option<SessionRequest<R::Session>>,
    /// Requests cancelled by `end()`; any session they produce is ended
    abandoned: Vec<Pending<Result<R::Session, HostError>>>,
    active: Option<ActiveSession<R::Session>>,
    epoch: u64,
    message: Option<XrError>,
}

impl<R: XrRuntime> SessionManager<R> {
    pub fn new(runtime: R, mode: SessionMode) -> Self {
        Self {
            runtime,
            mode,
            state: SessionState::Unchecked,
            support_check: None,
            request: None,
            abandoned: Vec::new(),
            active: None,
            epoch: 0,
            message: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// `Some` once the capability check has resolved.
    pub fn is_supported(&self) -> Option<bool> {
        match self.state {
            SessionState::Unchecked | SessionState::Checking => None,
            SessionState::Unsupported => Some(false),
            _ => Some(true),
        }
    }

    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }

    pub fn active(&self) -> Option<&ActiveSession<R::Session>> {
        self.active.as_ref()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// User-visible problem, if any (unsupported device, rejected request).
    pub fn message(&self) -> Option<&XrError> {
        self.message.as_ref()
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    /// Issue the capability query. Only the first call does anything; the
    /// answer arrives through [`poll`](Self::poll).
    pub fn check_support(&mut self, executor: &FrameExecutor) {
        if self.state != SessionState::Unchecked {
            return;
        }

        log::info!("Checking support for {:?}", self.mode);
        self.support_check = Some(executor.spawn(self.runtime.is_session_supported(self.mode)));
        self.state = SessionState::Checking;
    }

    /// Request an immersive session with the given capability list.
    ///
    /// Only valid from `Inactive`. The outcome arrives through
    /// [`poll`](Self::poll).
    pub fn start(&mut self, executor: &FrameExecutor, init: SessionInit) -> XrResult<()> {
        match self.state {
            SessionState::Inactive => {}
            SessionState::Unsupported => return Err(XrError::CapabilityUnsupported),
            SessionState::Unchecked | SessionState::Checking => {
                return Err(XrError::SessionNegotiationFailed(
                    "capability check has not completed".into(),
                ))
            }
            SessionState::Requesting | SessionState::Active => {
                log::warn!("Session start ignored in state {:?}", self.state);
                return Err(XrError::SessionNegotiationFailed("a session is already running".into()));
            }
        }

        log::info!(
            "Requesting {:?} session (required: {:?}, optional: {:?})",
            self.mode,
            init.required_features,
            init.optional_features
        );
        let pending = executor.spawn(self.runtime.request_session(self.mode, &init));
        self.request = Some(SessionRequest { pending, init });
        self.message = None;
        self.state = SessionState::Requesting;
        Ok(())
    }

    /// End the session. Idempotent: a no-op when nothing is running, and it
    /// always leaves the manager `Inactive` (or wherever the capability check
    /// left it) even if the host reports an error.
    pub fn end(&mut self, executor: &FrameExecutor) -> Option<SessionTransition> {
        match self.state {
            SessionState::Active => {
                self.state = SessionState::Inactive;
                let active = self.active.take()?;
                let epoch = active.epoch;
                let end = active.session.end();
                executor.spawn_detached(async move {
                    if let Err(err) = end.await {
                        log::warn!("Host reported error ending session {}: {}", epoch, err);
                    }
                });
                log::info!("Session {} ended", epoch);
                Some(SessionTransition::Ended {
                    epoch,
                    by_device: false,
                })
            }
            SessionState::Requesting => {
                if let Some(request) = self.request.take() {
                    self.abandoned.push(request.pending);
                }
                self.state = SessionState::Inactive;
                log::info!("Session request abandoned");
                None
            }
            _ => None,
        }
    }

    /// Absorb completed async operations and device events.
    pub fn poll(&mut self, executor: &FrameExecutor) -> Option<SessionTransition> {
        self.reap_abandoned(executor);
        if let Some(transition) = self.poll_support_check() {
            return Some(transition);
        }
        if let Some(transition) = self.poll_request(executor) {
            return Some(transition);
        }
        self.poll_device_events()
    }

    fn poll_support_check(&mut self) -> Option<SessionTransition> {
        let check = self.support_check.as_mut()?;
        let supported = match check.poll_ready() {
            PendingState::Waiting => return None,
            PendingState::Ready(Ok(supported)) => supported,
            PendingState::Ready(Err(err)) => {
                log::warn!("Capability check failed: {}", err);
                false
            }
            PendingState::Dropped => {
                log::warn!("Capability check was dropped");
                false
            }
        };
        self.support_check = None;

        if supported {
            log::info!("{:?} sessions supported", self.mode);
            self.state = SessionState::Inactive;
        } else {
            log::info!("{:?} sessions not supported", self.mode);
            self.state = SessionState::Unsupported;
            self.message = Some(XrError::CapabilityUnsupported);
        }
        Some(SessionTransition::SupportResolved { supported })
    }

    fn poll_request(&mut self, executor: &FrameExecutor) -> Option<SessionTransition> {
        let request = self.request.as_mut()?;
        let result = match request.pending.poll_ready() {
            PendingState::Waiting => return None,
            PendingState::Ready(result) => result,
            PendingState::Dropped => Err(HostError::Rejected("request dropped".into())),
        };
        let request = self.request.take()?;

        match result {
            Ok(session) => {
                let features = session.enabled_features();
                if let Some(missing) = request
                    .init
                    .required_features
                    .iter()
                    .find(|f| !features.contains(f))
                {
                    let err = XrError::SessionNegotiationFailed(format!(
                        "required feature '{}' not granted",
                        missing
                    ));
                    log::warn!("{}", err);
                    let end = session.end();
                    executor.spawn_detached(async move {
                        let _ = end.await;
                    });
                    return Some(self.fail_start(err));
                }

                for optional in &request.init.optional_features {
                    if !features.contains(optional) {
                        log::debug!("Optional feature '{}' not granted", optional);
                    }
                }

                self.epoch += 1;
                log::info!("Session {} started with features {:?}", self.epoch, features);
                self.active = Some(ActiveSession {
                    session,
                    features,
                    epoch: self.epoch,
                });
                self.state = SessionState::Active;
                Some(SessionTransition::Started { epoch: self.epoch })
            }
            Err(err) => {
                let err = XrError::SessionNegotiationFailed(err.to_string());
                log::warn!("{}", err);
                Some(self.fail_start(err))
            }
        }
    }

    fn reap_abandoned(&mut self, executor: &FrameExecutor) {
        self.abandoned.retain_mut(|pending| match pending.poll_ready() {
            PendingState::Waiting => true,
            PendingState::Ready(Ok(session)) => {
                log::info!("Ending session that resolved after being abandoned");
                let end = session.end();
                executor.spawn_detached(async move {
                    let _ = end.await;
                });
                false
            }
            PendingState::Ready(Err(_)) | PendingState::Dropped => false,
        });
    }

    fn fail_start(&mut self, err: XrError) -> SessionTransition {
        self.state = SessionState::Inactive;
        self.message = Some(err.clone());
        SessionTransition::StartFailed(err)
    }

    fn poll_device_events(&mut self) -> Option<SessionTransition> {
        let active = self.active.as_ref()?;
        match active.session.poll_event()? {
            SessionEvent::Ended => {
                let epoch = active.epoch;
                self.active = None;
                self.state = SessionState::Inactive;
                log::info!("Session {} ended by device", epoch);
                Some(SessionTransition::Ended {
                    epoch,
                    by_device: true,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimRuntime;

    fn init() -> SessionInit {
        SessionInit {
            required_features: vec![Feature::HitTest, Feature::DepthSensing],
            optional_features: vec![Feature::LightEstimation],
        }
    }

    fn settle(
        manager: &mut SessionManager<SimRuntime>,
        executor: &mut FrameExecutor,
    ) -> Vec<SessionTransition> {
        executor.run_until_stalled();
        let mut transitions = Vec::new();
        while let Some(t) = manager.poll(executor) {
            transitions.push(t);
        }
        executor.run_until_stalled();
        transitions
    }

    fn checked_manager(runtime: &SimRuntime, executor: &mut FrameExecutor) -> SessionManager<SimRuntime> {
        let mut manager = SessionManager::new(runtime.clone(), SessionMode::ImmersiveAr);
        manager.check_support(executor);
        settle(&mut manager, executor);
        manager
    }

    #[test]
    fn test_support_check_runs_once() {
        let runtime = SimRuntime::new();
        let mut executor = FrameExecutor::new();
        let mut manager = SessionManager::new(runtime.clone(), SessionMode::ImmersiveAr);
        assert_eq!(manager.is_supported(), None);

        manager.check_support(&executor);
        manager.check_support(&executor);
        assert_eq!(manager.state(), SessionState::Checking);
        assert_eq!(
            settle(&mut manager, &mut executor),
            vec![SessionTransition::SupportResolved { supported: true }]
        );
        assert_eq!(manager.state(), SessionState::Inactive);
        assert_eq!(runtime.support_queries(), 1);
    }

    #[test]
    fn test_missing_api_reports_unsupported() {
        let runtime = SimRuntime::unavailable();
        let mut executor = FrameExecutor::new();
        let mut manager = checked_manager(&runtime, &mut executor);

        assert_eq!(manager.is_supported(), Some(false));
        assert_eq!(manager.message(), Some(&XrError::CapabilityUnsupported));
        assert_eq!(manager.start(&executor, init()), Err(XrError::CapabilityUnsupported));
        assert_eq!(runtime.session_requests(), 0);
    }

    #[test]
    fn test_start_and_end() {
        let runtime = SimRuntime::new();
        let mut executor = FrameExecutor::new();
        let mut manager = checked_manager(&runtime, &mut executor);

        manager.start(&executor, init()).unwrap();
        assert_eq!(manager.state(), SessionState::Requesting);
        assert_eq!(
            settle(&mut manager, &mut executor),
            vec![SessionTransition::Started { epoch: 1 }]
        );
        assert!(manager.is_active());
        assert!(manager.active().unwrap().has_feature(Feature::LightEstimation));

        assert_eq!(
            manager.end(&executor),
            Some(SessionTransition::Ended {
                epoch: 1,
                by_device: false
            })
        );
        assert_eq!(manager.end(&executor), None);
        settle(&mut manager, &mut executor);
        assert_eq!(manager.state(), SessionState::Inactive);
        assert_eq!(runtime.sessions_ended(), 1);
    }

    #[test]
    fn test_start_while_active_refused() {
        let runtime = SimRuntime::new();
        let mut executor = FrameExecutor::new();
        let mut manager = checked_manager(&runtime, &mut executor);
        manager.start(&executor, init()).unwrap();
        settle(&mut manager, &mut executor);

        assert!(manager.start(&executor, init()).is_err());
        assert_eq!(runtime.session_requests(), 1);
        assert_eq!(manager.epoch(), 1);
    }

    #[test]
    fn test_rejected_request_returns_inactive() {
        let runtime = SimRuntime::new().reject_sessions("user declined");
        let mut executor = FrameExecutor::new();
        let mut manager = checked_manager(&runtime, &mut executor);

        manager.start(&executor, init()).unwrap();
        let transitions = settle(&mut manager, &mut executor);
        assert!(matches!(
            transitions.as_slice(),
            [SessionTransition::StartFailed(XrError::SessionNegotiationFailed(_))]
        ));
        assert_eq!(manager.state(), SessionState::Inactive);
        assert!(manager.message().is_some());

        // Recoverable: a later attempt is allowed
        assert!(manager.start(&executor, init()).is_ok());
    }

    #[test]
    fn test_missing_required_feature_ends_session() {
        let runtime = SimRuntime::new().grant_only(&[Feature::HitTest]);
        let mut executor = FrameExecutor::new();
        let mut manager = checked_manager(&runtime, &mut executor);

        manager.start(&executor, init()).unwrap();
        let transitions = settle(&mut manager, &mut executor);
        assert!(matches!(transitions.as_slice(), [SessionTransition::StartFailed(_)]));
        assert!(!manager.is_active());
        assert_eq!(runtime.sessions_ended(), 1);
    }

    #[test]
    fn test_device_end_observed() {
        let runtime = SimRuntime::new();
        let mut executor = FrameExecutor::new();
        let mut manager = checked_manager(&runtime, &mut executor);
        manager.start(&executor, init()).unwrap();
        settle(&mut manager, &mut executor);

        runtime.end_from_device();
        assert_eq!(
            settle(&mut manager, &mut executor),
            vec![SessionTransition::Ended {
                epoch: 1,
                by_device: true
            }]
        );
        assert_eq!(manager.state(), SessionState::Inactive);
        assert_eq!(manager.end(&executor), None);
    }

    #[test]
    fn test_abandoned_request_is_ended_when_it_resolves() {
        let runtime = SimRuntime::new();
        runtime.hold_sessions();
        let mut executor = FrameExecutor::new();
        let mut manager = checked_manager(&runtime, &mut executor);

        manager.start(&executor, init()).unwrap();
        settle(&mut manager, &mut executor);
        assert_eq!(manager.end(&executor), None);
        assert_eq!(manager.state(), SessionState::Inactive);

        runtime.release_sessions();
        assert!(settle(&mut manager, &mut executor).is_empty());
        assert!(!manager.is_active());
        assert_eq!(runtime.sessions_ended(), 1);
    }

    #[test]
    fn test_epoch_increments_per_session() {
        let runtime = SimRuntime::new();
        let mut executor = FrameExecutor::new();
        let mut manager = checked_manager(&runtime, &mut executor);

        for expected in 1..=3 {
            manager.start(&executor, init()).unwrap();
            settle(&mut manager, &mut executor);
            assert_eq!(manager.active().map(|a| a.epoch), Some(expected));
            manager.end(&executor);
        }
    }
}
