//! Endpoint resolution: device name or index to a concrete endpoint handle.

use tracing::{error, info, warn};

use crate::error::NegotiationError;
use crate::platform::{AudioEndpoint, AudioPlatform, Direction};

/// Resolve a user-supplied device identifier to an endpoint handle.
///
/// With no identifier the platform's default endpoint for `direction` is
/// used. Otherwise the enumerated display names are scanned in list order for
/// an exact match; an identifier starting with a digit that matches no name
/// is reinterpreted as a numeric index into the same list. An identifier that
/// resolves to nothing falls back to the first available device: for a
/// best-effort override, some device beats no device.
pub fn resolve(
    platform: &dyn AudioPlatform,
    id: Option<&str>,
    direction: Direction,
) -> Result<Box<dyn AudioEndpoint>, NegotiationError> {
    let Some(id) = id else {
        info!("opening default {direction} endpoint");
        return platform.default_endpoint(direction).map_err(|err| {
            error!("failed to open default {direction} endpoint: {err}");
            NegotiationError::NoDefaultEndpoint(err)
        });
    };

    info!("resolving {direction} endpoint \"{id}\"");
    let endpoints = platform.endpoints(direction).map_err(|err| {
        warn!("failed to enumerate {direction} endpoints: {err}");
        NegotiationError::Enumeration(err)
    })?;
    if endpoints.is_empty() {
        return Err(NegotiationError::NoEndpoints);
    }

    let mut index = None;
    for (i, descriptor) in endpoints.iter().enumerate() {
        info!("{i}: {}", descriptor.display_name);
        if descriptor.display_name == id {
            index = Some(i);
            break;
        }
    }

    if index.is_none() {
        // No name matched; the user may have typed a slot number instead.
        if let Some(i) = parse_device_index(id) {
            info!("no name matched, treating \"{id}\" as device index {i}");
            if i < endpoints.len() {
                index = Some(i);
            }
        }
    }

    let index = index.unwrap_or(0);
    platform
        .endpoint(direction, index)
        .map_err(NegotiationError::Endpoint)
}

/// Leading-prefix numeric parse, base 10 or 0x-prefixed hex, matching
/// `strtoul(id, NULL, 0)`. Returns `None` unless `id` starts with a digit.
fn parse_device_index(id: &str) -> Option<usize> {
    if !id.chars().next()?.is_ascii_digit() {
        return None;
    }
    let (digits, radix) = match id.strip_prefix("0x").or_else(|| id.strip_prefix("0X")) {
        Some(rest) if rest.chars().next().is_some_and(|c| c.is_ascii_hexdigit()) => (rest, 16),
        _ => (id, 10),
    };
    let len = digits
        .chars()
        .take_while(|c| c.is_digit(radix))
        .count();
    usize::from_str_radix(&digits[..len], radix).ok()
}
