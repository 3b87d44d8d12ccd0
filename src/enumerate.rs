//! Endpoint listing through cpal's default host.
//!
//! The enumeration collaborator of the engine: an ordered list of
//! [`EndpointDescriptor`]s whose indices line up with the host's device
//! order. Device pickers and cpal-sourced [`crate::platform::AudioPlatform`]
//! implementations read their names from here.

use cpal::traits::{DeviceTrait, HostTrait};
use tracing::warn;

use crate::error::PlatformError;
use crate::platform::{Direction, EndpointDescriptor};

/// List render (output) endpoints in host order.
pub fn render_endpoints() -> Result<Vec<EndpointDescriptor>, PlatformError> {
    endpoints(Direction::Render)
}

/// List capture (input) endpoints in host order.
pub fn capture_endpoints() -> Result<Vec<EndpointDescriptor>, PlatformError> {
    endpoints(Direction::Capture)
}

fn endpoints(direction: Direction) -> Result<Vec<EndpointDescriptor>, PlatformError> {
    let host = cpal::default_host();
    let devices = match direction {
        Direction::Render => host.output_devices(),
        Direction::Capture => host.input_devices(),
    }
    .map_err(|err| {
        PlatformError::Other(format!("failed to enumerate {direction} devices: {err}"))
    })?;

    let mut list = Vec::new();
    for (index, device) in devices.enumerate() {
        match device.name() {
            Ok(name) => list.push(EndpointDescriptor {
                id: name.clone(),
                display_name: name,
            }),
            Err(err) => warn!("skipping unnamed {direction} device {index}: {err}"),
        }
    }
    Ok(list)
}
