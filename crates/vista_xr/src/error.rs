use thiserror::Error;

/// Failures reported by the host XR runtime.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    /// The capability API itself is absent (no XR runtime on this host).
    #[error("XR runtime not available")]
    Unavailable,

    #[error("Feature not supported: {0}")]
    NotSupported(String),

    #[error("Request rejected: {0}")]
    Rejected(String),

    /// The session ended while the request was outstanding.
    #[error("Session has ended")]
    SessionEnded,
}

/// Engine-level failures. None of these stop the frame loop; they surface as
/// user-visible status or a logged skip.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum XrError {
    #[error("AR not supported on this device")]
    CapabilityUnsupported,

    #[error("Could not start AR session: {0}")]
    SessionNegotiationFailed(String),

    #[error("Surface tracking unavailable: {0}")]
    TrackingInitFailed(String),

    #[error("Model '{id}' failed to load: {reason}")]
    AssetLoadFailed { id: String, reason: String },
}

/// Result type for engine operations.
pub type XrResult<T> = Result<T, XrError>;
