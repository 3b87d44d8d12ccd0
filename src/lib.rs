//! Audio output device negotiation for low-latency streaming clients.
//!
//! Given a requested device, sample format, sample rate, and latency target,
//! [`open`] produces a working, opened streaming client against the
//! platform's audio session API, falling back through a deterministic
//! sequence of alternative configurations until one succeeds: exclusive then
//! shared mode (or the reverse), the requested sample format then the other,
//! the requested rate then a fixed preference list. The result reports the
//! configuration actually achieved, which may differ from the request.
//!
//! # Components
//! - [`endpoint`] - resolves a device name or index to an endpoint handle
//! - [`format`] - the format/rate fallback plan and wire-level descriptors
//! - [`negotiate`] - exclusive/shared negotiation and the orchestrator
//! - [`platform`] - traits over the platform's audio session API
//! - [`enumerate`] - cpal-backed endpoint listing for device pickers
//! - [`error`] - the failure taxonomy
//!
//! Negotiation is synchronous and single-threaded: it runs to completion on
//! the calling thread, holds at most one live client handle at any instant,
//! and transfers the winning handle to the caller without retaining it.

pub mod endpoint;
pub mod enumerate;
pub mod error;
pub mod format;
pub mod negotiate;
pub mod platform;

pub use endpoint::resolve;
pub use enumerate::{capture_endpoints, render_endpoints};
pub use error::{InitError, ModeError, NegotiationError, PlatformError};
pub use format::{FormatCandidate, FormatPlan, FormatTag, PREFERRED_RATES, WaveFormat};
pub use negotiate::{ClientRequest, NegotiatedClient, open, open_endpoint};
pub use platform::{
    AudioClient, AudioEndpoint, AudioPlatform, DevicePeriod, Direction, EndpointDescriptor,
    REFTIME_PER_MS, REFTIME_PER_SEC, ReferenceTime, ShareMode,
};
