//! Exclusive/shared client negotiation and the orchestrator.
//!
//! [`open`] resolves the requested device, then tries the preferred share
//! mode and falls back to the other, each mode walking the [`FormatPlan`]
//! until the device accepts a configuration. The caller gets the opened
//! client together with the configuration actually achieved, which may
//! differ from the request in mode, sample format, and rate.

use std::fmt;

use tracing::{info, warn};

use crate::endpoint::resolve;
use crate::error::{InitError, ModeError, NegotiationError};
use crate::format::{FormatPlan, WaveFormat};
use crate::platform::{
    AudioClient, AudioEndpoint, AudioPlatform, Direction, REFTIME_PER_MS, REFTIME_PER_SEC,
    ReferenceTime, ShareMode,
};

/// Immutable negotiation input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClientRequest {
    /// Prefer exclusive (device-owned, minimum-latency) mode.
    pub prefer_exclusive: bool,
    /// Prefer 32-bit float samples over 16-bit PCM.
    pub prefer_float: bool,
    /// Requested sample rate in Hz; 0 means unspecified.
    pub sample_rate: u32,
    /// Latency target in milliseconds.
    pub latency_ms: u32,
}

/// A successfully negotiated, opened streaming client.
///
/// Ownership of the handle transfers to the caller; the engine retains
/// nothing. The diagnostic fields are best-effort and may be absent.
pub struct NegotiatedClient {
    pub client: Box<dyn AudioClient>,
    /// Mode actually achieved; may differ from the request after fallback.
    pub exclusive: bool,
    pub float_format: bool,
    pub sample_rate: u32,
    /// Buffer duration the client was initialized with, in 100 ns units.
    /// 0 in shared mode, where the platform sizes its own buffering.
    pub buffer_duration: ReferenceTime,
    pub device_period: Option<ReferenceTime>,
    pub stream_latency: Option<ReferenceTime>,
    pub buffer_frames: Option<u32>,
}

impl NegotiatedClient {
    /// Latency implied by the achieved configuration, for reporting.
    ///
    /// Exclusive mode: buffer length over rate. Shared mode: stream latency
    /// plus device period. Absent diagnostics count as zero.
    pub fn observed_latency_ms(&self) -> f64 {
        if self.exclusive {
            self.buffer_frames.unwrap_or(0) as f64 * 1000.0 / self.sample_rate as f64
        } else {
            (self.stream_latency.unwrap_or(0) + self.device_period.unwrap_or(0)) as f64
                / REFTIME_PER_MS as f64
        }
    }

    /// Hand the opened client handle to the caller.
    pub fn into_client(self) -> Box<dyn AudioClient> {
        self.client
    }
}

impl fmt::Debug for NegotiatedClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NegotiatedClient")
            .field("exclusive", &self.exclusive)
            .field("float_format", &self.float_format)
            .field("sample_rate", &self.sample_rate)
            .field("buffer_duration", &self.buffer_duration)
            .field("device_period", &self.device_period)
            .field("stream_latency", &self.stream_latency)
            .field("buffer_frames", &self.buffer_frames)
            .finish_non_exhaustive()
    }
}

/// Outcome of one mode's negotiation.
struct ModeSuccess {
    client: Box<dyn AudioClient>,
    float_format: bool,
    sample_rate: u32,
    buffer_duration: ReferenceTime,
}

/// Buffer duration matching a device-reported frame count, in 100 ns units.
pub(crate) fn aligned_duration(frames: u32, rate: u32) -> ReferenceTime {
    (10_000.0 * 1000.0 / rate as f64 * frames as f64 + 0.5) as ReferenceTime
}

fn negotiate_exclusive(
    endpoint: &dyn AudioEndpoint,
    request: ClientRequest,
) -> Result<ModeSuccess, ModeError> {
    let mut client = endpoint.activate().map_err(ModeError::Activation)?;
    let period = client.device_period().map_err(ModeError::Query)?;

    // Latency target in 100 ns units, floored at the device minimum.
    let mut buffer_duration =
        (request.latency_ms as ReferenceTime * REFTIME_PER_MS).max(period.minimum);

    for candidate in FormatPlan::new(request.prefer_float, request.sample_rate) {
        info!(
            "initializing client (exclusive, {candidate}, {} ms)",
            request.latency_ms
        );
        let format = WaveFormat::stereo(candidate);
        let mut result = client.initialize(ShareMode::Exclusive, &format, buffer_duration);

        if result == Err(InitError::BufferSizeNotAligned) {
            // The format was accepted but the size was not; the failed handle
            // knows the aligned frame count. Re-activate and retry exactly
            // once with the corrected duration.
            let frames = client.buffer_size().map_err(ModeError::Query)?;
            drop(client);
            client = endpoint.activate().map_err(ModeError::Activation)?;
            buffer_duration = aligned_duration(frames, candidate.rate);
            result = client.initialize(ShareMode::Exclusive, &format, buffer_duration);
        }
        if result == Err(InitError::AlreadyInitialized) {
            // Stale handle reuse artifact; a fresh activation clears it.
            drop(client);
            client = endpoint.activate().map_err(ModeError::Activation)?;
            result = client.initialize(ShareMode::Exclusive, &format, buffer_duration);
        }
        match result {
            Ok(()) => {
                return Ok(ModeSuccess {
                    client,
                    float_format: candidate.float,
                    sample_rate: candidate.rate,
                    buffer_duration,
                });
            }
            Err(InitError::UnsupportedFormat) => warn!("unsupported format"),
            Err(err) => return Err(ModeError::Rejected(err)),
        }
    }
    Err(ModeError::Exhausted)
}

fn negotiate_shared(
    endpoint: &dyn AudioEndpoint,
    request: ClientRequest,
) -> Result<ModeSuccess, ModeError> {
    let mut client = endpoint.activate().map_err(ModeError::Activation)?;

    for candidate in FormatPlan::new(request.prefer_float, request.sample_rate) {
        info!(
            "initializing client (shared, {candidate}, {} ms)",
            request.latency_ms
        );
        let format = WaveFormat::stereo(candidate);
        // Zero duration asks the platform to pick its own buffering.
        let mut result = client.initialize(ShareMode::Shared, &format, 0);

        if result == Err(InitError::AlreadyInitialized) {
            drop(client);
            client = endpoint.activate().map_err(ModeError::Activation)?;
            result = client.initialize(ShareMode::Shared, &format, 0);
        }
        match result {
            Ok(()) => {
                return Ok(ModeSuccess {
                    client,
                    float_format: candidate.float,
                    sample_rate: candidate.rate,
                    buffer_duration: 0,
                });
            }
            Err(InitError::UnsupportedFormat) => warn!("unsupported format"),
            Err(err) => return Err(ModeError::Rejected(err)),
        }
    }
    Err(ModeError::Exhausted)
}

/// Negotiate and open a streaming client for a request.
///
/// Resolves `device` (name, index, or the default when `None`) to a render
/// endpoint and runs [`open_endpoint`] against it.
pub fn open(
    platform: &dyn AudioPlatform,
    device: Option<&str>,
    request: ClientRequest,
) -> Result<NegotiatedClient, NegotiationError> {
    let endpoint = resolve(platform, device, Direction::Render)?;
    open_endpoint(endpoint.as_ref(), request)
}

/// Negotiate and open a streaming client on an already-resolved endpoint.
pub fn open_endpoint(
    endpoint: &dyn AudioEndpoint,
    request: ClientRequest,
) -> Result<NegotiatedClient, NegotiationError> {
    let (success, exclusive) = if request.prefer_exclusive {
        match negotiate_exclusive(endpoint, request) {
            Ok(success) => (success, true),
            Err(exclusive_err) => match negotiate_shared(endpoint, request) {
                // The achieved mode differs from the request; report it.
                Ok(success) => (success, false),
                Err(shared_err) => {
                    return Err(NegotiationError::Exhausted {
                        exclusive: exclusive_err,
                        shared: shared_err,
                    });
                }
            },
        }
    } else {
        match negotiate_shared(endpoint, request) {
            Ok(success) => (success, false),
            Err(shared_err) => match negotiate_exclusive(endpoint, request) {
                Ok(success) => (success, true),
                Err(exclusive_err) => {
                    return Err(NegotiationError::Exhausted {
                        exclusive: exclusive_err,
                        shared: shared_err,
                    });
                }
            },
        }
    };

    let ModeSuccess {
        client,
        float_format,
        sample_rate,
        buffer_duration,
    } = success;
    let mut negotiated = NegotiatedClient {
        client,
        exclusive,
        float_format,
        sample_rate,
        buffer_duration,
        device_period: None,
        stream_latency: None,
        buffer_frames: None,
    };

    // The queries below are allowed to fail; we only lose reporting detail.
    match negotiated.client.device_period() {
        Ok(period) => {
            negotiated.device_period = Some(if exclusive {
                period.minimum
            } else {
                period.default
            });
        }
        Err(err) => warn!("device period query failed: {err}"),
    }
    if !exclusive {
        match negotiated.client.stream_latency() {
            Ok(latency) => negotiated.stream_latency = Some(latency),
            Err(err) => warn!("stream latency query failed: {err}"),
        }
    }
    match negotiated.client.buffer_size() {
        Ok(frames) => negotiated.buffer_frames = Some(frames),
        Err(err) => warn!("buffer size query failed: {err}"),
    }

    let mode = if exclusive {
        ShareMode::Exclusive
    } else {
        ShareMode::Shared
    };
    info!(
        "client initialized ({mode}, {}, {sample_rate} Hz, {:.1} ms)",
        if float_format { "float" } else { "pcm" },
        negotiated.observed_latency_ms()
    );
    let frames = negotiated.buffer_frames.unwrap_or(0);
    info!(
        "client buffer length is {frames} frames ({:.1} ms)",
        frames as f64 * 1000.0 / sample_rate as f64
    );
    let period = negotiated.device_period.unwrap_or(0);
    info!(
        "device period is {:.1} ms ({} frames)",
        period as f64 / REFTIME_PER_MS as f64,
        period * sample_rate as ReferenceTime / REFTIME_PER_SEC
    );

    Ok(negotiated)
}
