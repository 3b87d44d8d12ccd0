//! Traits over the platform's audio session API.
//!
//! The negotiation engine talks to the OS through these seams only:
//!
//! - [`AudioPlatform`] - endpoint enumeration and lookup
//! - [`AudioEndpoint`] - a resolved device that can activate client handles
//! - [`AudioClient`] - one opened streaming-client handle
//!
//! A client handle is released when the box is dropped, so "at most one live
//! handle during the search" reduces to dropping the loser before the next
//! [`AudioEndpoint::activate`] call.

use std::fmt;

use crate::error::{InitError, PlatformError};
use crate::format::WaveFormat;

/// Stream direction of an endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    Render,
    Capture,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Render => "render",
            Direction::Capture => "capture",
        })
    }
}

/// Whether the client owns the device outright or goes through the system mixer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShareMode {
    Exclusive,
    Shared,
}

impl fmt::Display for ShareMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ShareMode::Exclusive => "exclusive",
            ShareMode::Shared => "shared",
        })
    }
}

/// Platform time value in 100 ns units.
pub type ReferenceTime = i64;

/// 100 ns units per millisecond.
pub const REFTIME_PER_MS: ReferenceTime = 10_000;

/// 100 ns units per second.
pub const REFTIME_PER_SEC: ReferenceTime = 10_000_000;

/// One enumerable audio endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EndpointDescriptor {
    /// Platform-native handle string, opaque to the engine.
    pub id: String,
    /// Human-readable device name shown to users.
    pub display_name: String,
}

/// Scheduling periods reported by an opened client.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DevicePeriod {
    /// Period the engine thread runs at in shared mode.
    pub default: ReferenceTime,
    /// Minimum period the device supports; floors exclusive buffer durations.
    pub minimum: ReferenceTime,
}

/// Endpoint enumeration and lookup.
///
/// `endpoints` and `endpoint` must agree on ordering: index `i` of the
/// descriptor list opens the same device as `endpoint(direction, i)`.
pub trait AudioPlatform {
    fn endpoints(&self, direction: Direction) -> Result<Vec<EndpointDescriptor>, PlatformError>;

    fn endpoint(
        &self,
        direction: Direction,
        index: usize,
    ) -> Result<Box<dyn AudioEndpoint>, PlatformError>;

    fn default_endpoint(
        &self,
        direction: Direction,
    ) -> Result<Box<dyn AudioEndpoint>, PlatformError>;
}

/// A resolved device endpoint.
pub trait AudioEndpoint {
    /// Create a fresh streaming-client handle on this endpoint.
    ///
    /// May be called repeatedly; each call yields an independent handle.
    fn activate(&self) -> Result<Box<dyn AudioClient>, PlatformError>;
}

impl fmt::Debug for dyn AudioEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("dyn AudioEndpoint")
    }
}

/// One opened streaming-client handle. Dropping it releases the handle.
pub trait AudioClient {
    /// Initialize the stream with event-driven callback delivery and
    /// no-persist semantics. `buffer_duration` is in 100 ns units; 0 asks the
    /// platform to choose its own buffering (shared mode).
    fn initialize(
        &mut self,
        mode: ShareMode,
        format: &WaveFormat,
        buffer_duration: ReferenceTime,
    ) -> Result<(), InitError>;

    fn device_period(&self) -> Result<DevicePeriod, PlatformError>;

    /// Allocated buffer length in frames. Also valid on a handle whose
    /// initialize failed with a misaligned buffer size, where it reports the
    /// corrected frame count.
    fn buffer_size(&self) -> Result<u32, PlatformError>;

    fn stream_latency(&self) -> Result<ReferenceTime, PlatformError>;
}

#[cfg(test)]
pub(crate) mod fake {
    //! Scripted platform for resolver and negotiation tests.

    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use super::*;
    use crate::negotiate::aligned_duration;

    /// One initialize call as the fake device saw it.
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub struct Attempt {
        pub mode: ShareMode,
        pub float: bool,
        pub rate: u32,
        pub buffer_duration: ReferenceTime,
    }

    /// Scripted device behavior for one share mode.
    #[derive(Default)]
    pub struct ModeScript {
        /// (float, rate) pairs this device accepts.
        pub supported: Vec<(bool, u32)>,
        /// Error returned for one specific (float, rate) trial, overriding
        /// the supported list.
        pub hard_error: Option<(bool, u32, InitError)>,
        /// Corrected frame count; a supported exclusive trial whose duration
        /// does not match it fails with `BufferSizeNotAligned` once.
        pub misalign_frames: Option<u32>,
        /// Keep reporting the misalignment even for corrected durations.
        pub misalign_always: bool,
        /// First initialize call in this mode reports `AlreadyInitialized`.
        pub stale_first: bool,
    }

    pub struct FakeState {
        pub exclusive: ModeScript,
        pub shared: ModeScript,
        /// Fail the next N activate calls.
        pub fail_activations: Cell<u32>,
        pub period: Cell<DevicePeriod>,
        pub latency: Cell<ReferenceTime>,
        pub buffer_frames: Cell<u32>,
        pub fail_period_query: Cell<bool>,
        pub fail_latency_query: Cell<bool>,
        pub fail_buffer_query: Cell<bool>,
        pub attempts: RefCell<Vec<Attempt>>,
        pub activations: Cell<u32>,
        pub live_clients: Cell<u32>,
        pub max_live_clients: Cell<u32>,
        misalign_pending: Cell<bool>,
        stale_pending_exclusive: Cell<bool>,
        stale_pending_shared: Cell<bool>,
    }

    impl FakeState {
        pub fn new(exclusive: ModeScript, shared: ModeScript) -> Rc<Self> {
            let misalign_pending = exclusive.misalign_frames.is_some();
            let stale_exclusive = exclusive.stale_first;
            let stale_shared = shared.stale_first;
            Rc::new(Self {
                exclusive,
                shared,
                fail_activations: Cell::new(0),
                period: Cell::new(DevicePeriod {
                    default: 100_000,
                    minimum: 30_000,
                }),
                latency: Cell::new(150_000),
                buffer_frames: Cell::new(1024),
                fail_period_query: Cell::new(false),
                fail_latency_query: Cell::new(false),
                fail_buffer_query: Cell::new(false),
                attempts: RefCell::new(Vec::new()),
                activations: Cell::new(0),
                live_clients: Cell::new(0),
                max_live_clients: Cell::new(0),
                misalign_pending: Cell::new(misalign_pending),
                stale_pending_exclusive: Cell::new(stale_exclusive),
                stale_pending_shared: Cell::new(stale_shared),
            })
        }

        /// Device accepting the given pairs in both modes.
        pub fn accepting(pairs: &[(bool, u32)]) -> Rc<Self> {
            Self::new(
                ModeScript {
                    supported: pairs.to_vec(),
                    ..Default::default()
                },
                ModeScript {
                    supported: pairs.to_vec(),
                    ..Default::default()
                },
            )
        }

        /// Device rejecting everything in both modes.
        pub fn rejecting() -> Rc<Self> {
            Self::accepting(&[])
        }

        fn script(&self, mode: ShareMode) -> &ModeScript {
            match mode {
                ShareMode::Exclusive => &self.exclusive,
                ShareMode::Shared => &self.shared,
            }
        }

        /// Attempts seen in one mode, as (float, rate) pairs.
        pub fn attempted_pairs(&self, mode: ShareMode) -> Vec<(bool, u32)> {
            self.attempts
                .borrow()
                .iter()
                .filter(|a| a.mode == mode)
                .map(|a| (a.float, a.rate))
                .collect()
        }
    }

    /// Builds endpoints off a shared scripted state.
    pub trait MakeEndpoint {
        fn endpoint(&self) -> FakeEndpoint;
    }

    impl MakeEndpoint for Rc<FakeState> {
        fn endpoint(&self) -> FakeEndpoint {
            FakeEndpoint {
                state: self.clone(),
            }
        }
    }

    pub struct FakeEndpoint {
        state: Rc<FakeState>,
    }

    impl AudioEndpoint for FakeEndpoint {
        fn activate(&self) -> Result<Box<dyn AudioClient>, PlatformError> {
            let st = &self.state;
            if st.fail_activations.get() > 0 {
                st.fail_activations.set(st.fail_activations.get() - 1);
                return Err(PlatformError::Code(0x8889_0001u32 as i32));
            }
            st.activations.set(st.activations.get() + 1);
            st.live_clients.set(st.live_clients.get() + 1);
            st.max_live_clients
                .set(st.max_live_clients.get().max(st.live_clients.get()));
            Ok(Box::new(FakeClient {
                state: st.clone(),
                reported_frames: None,
            }))
        }
    }

    pub struct FakeClient {
        state: Rc<FakeState>,
        /// Frame count this handle reports after a misaligned initialize.
        reported_frames: Option<u32>,
    }

    impl Drop for FakeClient {
        fn drop(&mut self) {
            let live = self.state.live_clients.get();
            self.state.live_clients.set(live - 1);
        }
    }

    impl AudioClient for FakeClient {
        fn initialize(
            &mut self,
            mode: ShareMode,
            format: &WaveFormat,
            buffer_duration: ReferenceTime,
        ) -> Result<(), InitError> {
            let st = self.state.clone();
            st.attempts.borrow_mut().push(Attempt {
                mode,
                float: format.is_float(),
                rate: format.sample_rate,
                buffer_duration,
            });

            let stale = match mode {
                ShareMode::Exclusive => &st.stale_pending_exclusive,
                ShareMode::Shared => &st.stale_pending_shared,
            };
            if stale.replace(false) {
                return Err(InitError::AlreadyInitialized);
            }

            let script = st.script(mode);
            if let Some((float, rate, err)) = &script.hard_error {
                if *float == format.is_float() && *rate == format.sample_rate {
                    return Err(err.clone());
                }
            }
            if !script
                .supported
                .contains(&(format.is_float(), format.sample_rate))
            {
                return Err(InitError::UnsupportedFormat);
            }
            if mode == ShareMode::Exclusive {
                if let Some(frames) = script.misalign_frames {
                    let aligned = aligned_duration(frames, format.sample_rate);
                    if script.misalign_always
                        || (st.misalign_pending.get() && buffer_duration != aligned)
                    {
                        self.reported_frames = Some(frames);
                        return Err(InitError::BufferSizeNotAligned);
                    }
                    st.misalign_pending.set(false);
                }
            }
            Ok(())
        }

        fn device_period(&self) -> Result<DevicePeriod, PlatformError> {
            if self.state.fail_period_query.get() {
                return Err(PlatformError::Code(0x8007_0005u32 as i32));
            }
            Ok(self.state.period.get())
        }

        fn buffer_size(&self) -> Result<u32, PlatformError> {
            if let Some(frames) = self.reported_frames {
                return Ok(frames);
            }
            if self.state.fail_buffer_query.get() {
                return Err(PlatformError::Code(0x8007_0005u32 as i32));
            }
            Ok(self.state.buffer_frames.get())
        }

        fn stream_latency(&self) -> Result<ReferenceTime, PlatformError> {
            if self.state.fail_latency_query.get() {
                return Err(PlatformError::Code(0x8007_0005u32 as i32));
            }
            Ok(self.state.latency.get())
        }
    }

    /// Platform whose named endpoints all share one scripted device state.
    pub struct FakePlatform {
        pub names: Vec<String>,
        pub state: Rc<FakeState>,
        pub has_default: bool,
        pub opened_index: Cell<Option<usize>>,
        pub opened_default: Cell<bool>,
    }

    impl FakePlatform {
        pub fn new(names: &[&str], state: Rc<FakeState>) -> Self {
            Self {
                names: names.iter().map(|s| s.to_string()).collect(),
                state,
                has_default: true,
                opened_index: Cell::new(None),
                opened_default: Cell::new(false),
            }
        }
    }

    impl AudioPlatform for FakePlatform {
        fn endpoints(
            &self,
            _direction: Direction,
        ) -> Result<Vec<EndpointDescriptor>, PlatformError> {
            Ok(self
                .names
                .iter()
                .enumerate()
                .map(|(i, name)| EndpointDescriptor {
                    id: format!("{{endpoint.{i}}}"),
                    display_name: name.clone(),
                })
                .collect())
        }

        fn endpoint(
            &self,
            _direction: Direction,
            index: usize,
        ) -> Result<Box<dyn AudioEndpoint>, PlatformError> {
            if index >= self.names.len() {
                return Err(PlatformError::Other(format!("no endpoint at index {index}")));
            }
            self.opened_index.set(Some(index));
            Ok(Box::new(self.state.endpoint()))
        }

        fn default_endpoint(
            &self,
            _direction: Direction,
        ) -> Result<Box<dyn AudioEndpoint>, PlatformError> {
            if !self.has_default {
                return Err(PlatformError::Other("no default endpoint".into()));
            }
            self.opened_default.set(true);
            Ok(Box::new(self.state.endpoint()))
        }
    }
}
