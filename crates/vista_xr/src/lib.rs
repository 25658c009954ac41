//! Vista XR - AR session lifecycle, surface tracking and model placement.
//!
//! The engine is driven from the host's frame callback through
//! [`FrameDriver::tick`]. Host capabilities (session negotiation, reference
//! spaces, hit-testing) come in through the traits in [`host`]; the
//! [`sim`] module implements them in-process for tests and the desktop
//! viewer.
//!
//! # Example
//!
//! ```ignore
//! use std::rc::Rc;
//! use vista_core::{assets::MemoryLoader, RecordingTarget};
//! use vista_xr::{sim::{SimFrame, SimRuntime}, EngineConfig, FrameDriver};
//!
//! let mut driver = FrameDriver::new(SimRuntime::new(), RecordingTarget::new(), EngineConfig::default());
//! driver.preload(Rc::new(MemoryLoader::new()));
//! driver.check_support();
//! driver.tick(0.0, None);
//! driver.enter_ar()?;
//! driver.tick(16.0, Some(&SimFrame::empty()));
//! ```

pub mod config;
pub mod driver;
pub mod error;
pub mod executor;
pub mod host;
pub mod lighting;
pub mod placement;
pub mod session;
pub mod sim;
pub mod tracker;

pub use config::{CameraConfig, ConfigError, EngineConfig, ReticleConfig, SessionConfig, TrackingConfig};
pub use driver::{FrameDriver, FrameOf, FrameStats};
pub use error::{HostError, XrError, XrResult};
pub use executor::{FrameExecutor, Pending, PendingState};
pub use host::{Feature, LightEstimate, SessionInit, SessionMode, XrFrame, XrRuntime, XrSession};
pub use lighting::LightEstimator;
pub use placement::{scale_factor, Placement, PlacementController, Reticle};
pub use session::{ActiveSession, SessionManager, SessionState, SessionTransition};
pub use tracker::{EnvironmentTracker, TrackingStatus};
