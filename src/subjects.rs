//! Bus subject naming shared by every component that talks to the bus.
//!
//! Three namespaces coexist:
//! - per-drone command subjects: `drone.<id>.<op>` (wildcard-subscribed by
//!   the command router),
//! - flat service subjects: `drone.<op>` (request/reply façade; the drone
//!   id travels out-of-band in a path header),
//! - telemetry subjects: `telemetry.<id>` with `telemetry.>` for bulk
//!   subscription.

use thiserror::Error;

/// Domain prefix for command and service subjects.
pub const COMMAND_DOMAIN: &str = "drone";

/// Domain prefix for telemetry subjects.
pub const TELEMETRY_DOMAIN: &str = "telemetry";

/// Wildcard pattern covering every drone's telemetry stream.
pub const TELEMETRY_PATTERN: &str = "telemetry.>";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("invalid subject: {0}")]
    TooFewSegments(String),
    #[error("invalid drone ID: {0}")]
    BadId(String),
    #[error("missing drone ID in path")]
    MissingId,
}

/// Telemetry subject for one drone.
pub fn telemetry_subject(drone_id: usize) -> String {
    format!("{}.{}", TELEMETRY_DOMAIN, drone_id)
}

/// Command subject addressing one drone, e.g. `drone.3.takeoff`.
pub fn command_subject(drone_id: usize, op: &str) -> String {
    format!("{}.{}.{}", COMMAND_DOMAIN, drone_id, op)
}

/// Wildcard pattern matching one operation across all drones.
pub fn command_pattern(op: &str) -> String {
    format!("{}.*.{}", COMMAND_DOMAIN, op)
}

/// Service subject for a façade endpoint, e.g. `drone.list`.
pub fn service_subject(service: &str, op: &str) -> String {
    format!("{}.{}", service, op)
}

/// Extracts the drone id from a command subject of the form
/// `drone.<id>.<op>`. The id segment must be present and numeric.
pub fn parse_drone_id(subject: &str) -> Result<usize, AddressError> {
    let mut parts = subject.split('.');
    let _domain = parts
        .next()
        .ok_or_else(|| AddressError::TooFewSegments(subject.to_string()))?;
    let id_segment = parts
        .next()
        .ok_or_else(|| AddressError::TooFewSegments(subject.to_string()))?;
    id_segment
        .parse::<usize>()
        .map_err(|_| AddressError::BadId(id_segment.to_string()))
}

/// NATS-style pattern matching: `*` matches exactly one token, `>` matches
/// one or more trailing tokens.
pub fn subject_matches(pattern: &str, subject: &str) -> bool {
    let mut pat = pattern.split('.');
    let mut sub = subject.split('.');

    loop {
        match (pat.next(), sub.next()) {
            (Some(">"), Some(_)) => return true,
            (Some("*"), Some(_)) => continue,
            (Some(p), Some(s)) if p == s => continue,
            (None, None) => return true,
            _ => return false,
        }
    }
}
