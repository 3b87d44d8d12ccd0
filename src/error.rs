//! Failure taxonomy for endpoint resolution and client negotiation.

use thiserror::Error;

/// Raw failure from a platform activation or query call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlatformError {
    /// Native platform error code.
    #[error("platform call failed with error {0:#010X}")]
    Code(i32),
    /// Failure with no native code attached (e.g. from the enumeration host).
    #[error("{0}")]
    Other(String),
}

/// Condition codes an initialize call can come back with.
///
/// These mirror the platform conditions the negotiation loop dispatches on;
/// anything else travels as [`InitError::Platform`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InitError {
    /// The device does not support the requested format/rate combination.
    /// Recoverable: the negotiator advances to the next candidate.
    #[error("format not supported by the device")]
    UnsupportedFormat,
    /// The requested buffer size is not aligned to the device period.
    /// Recoverable once per trial: re-activate with the corrected size.
    #[error("buffer size is not aligned to the device period")]
    BufferSizeNotAligned,
    /// The handle was already initialized (stale handle reuse artifact).
    /// Recoverable once: a fresh activation clears it.
    #[error("client handle was already initialized")]
    AlreadyInitialized,
    /// Another client owns the device.
    #[error("device is in use by another client")]
    DeviceInUse,
    /// Exclusive mode is disabled for this device.
    #[error("exclusive mode is not allowed on this device")]
    ExclusiveModeNotAllowed,
    /// Any other native error code.
    #[error("initialize failed with error {0:#010X}")]
    Platform(i32),
}

/// Why one share mode's negotiation died.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModeError {
    /// Activating a client handle on the endpoint failed.
    #[error("failed to activate a client on the endpoint: {0}")]
    Activation(#[source] PlatformError),
    /// A required device query (period, corrected buffer size) failed.
    #[error("device query failed: {0}")]
    Query(#[source] PlatformError),
    /// The device rejected the stream with a non-recoverable condition.
    #[error("device rejected the stream: {0}")]
    Rejected(#[source] InitError),
    /// Every format and rate candidate was rejected as unsupported.
    #[error("every format and rate candidate was rejected")]
    Exhausted,
}

/// Terminal negotiation failure, tagged with the phase that died.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NegotiationError {
    /// The endpoint list could not be produced.
    #[error("failed to enumerate audio endpoints: {0}")]
    Enumeration(#[source] PlatformError),
    /// The endpoint list is empty.
    #[error("no audio endpoints are available")]
    NoEndpoints,
    /// No identifier was given and the platform has no default endpoint.
    #[error("no default audio endpoint: {0}")]
    NoDefaultEndpoint(#[source] PlatformError),
    /// The resolved endpoint could not be opened.
    #[error("endpoint is unavailable: {0}")]
    Endpoint(#[source] PlatformError),
    /// Both share modes were tried and neither produced a client.
    #[error("negotiation exhausted: exclusive failed ({exclusive}), shared failed ({shared})")]
    Exhausted {
        exclusive: ModeError,
        shared: ModeError,
    },
}
