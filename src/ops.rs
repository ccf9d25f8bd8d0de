//! Drone operations shared by both ingress paths.
//!
//! The command router and the request/reply façade decode their traffic
//! differently, but every mutation and every snapshot funnels through
//! here, so the two surfaces cannot drift apart semantically. Every
//! function takes the fleet lock itself and holds it for the shortest
//! span covering one drone's read-modify-write (or one full read sweep).

use crate::commands::Command;
use crate::fleet::{Fleet, FlightMode};
use crate::subjects::AddressError;
use crate::telemetry::TelemetrySnapshot;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Address(#[from] AddressError),
    #[error("drone {0} not found")]
    NotFound(usize),
    #[error("invalid JSON payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("unknown mode: {0}")]
    UnknownMode(String),
}

/// Applies one command to one drone under the exclusive guard. Either the
/// drone exists and the whole mutation lands, or nothing changes.
pub fn apply(fleet: &Fleet, id: usize, command: &Command) -> Result<(), CommandError> {
    let mut drones = fleet.write();
    let drone = drones.get_mut(id).ok_or(CommandError::NotFound(id))?;

    match command {
        Command::Arm => drone.arm(),
        Command::Disarm => drone.disarm(),
        Command::Takeoff { altitude } => {
            drone.set_flight_mode(FlightMode::AltitudeHold);
            drone.altitude_hold = *altitude;
            // Overshoot hover throttle to start the climb.
            let throttle = drone.hover_throttle_percent() * 1.2;
            drone.set_throttle(throttle);
        }
        Command::Land => {
            drone.set_flight_mode(FlightMode::AltitudeHold);
            drone.altitude_hold = 0.0;
            // Undershoot hover throttle to start the descent.
            let throttle = drone.hover_throttle_percent() * 0.8;
            drone.set_throttle(throttle);
        }
        Command::GotoAltitude { y, .. } => {
            // Lateral x/z is not applied: the flight controller only
            // exposes an altitude-hold axis.
            drone.set_flight_mode(FlightMode::AltitudeHold);
            drone.altitude_hold = *y;
        }
        Command::SetManualInput { throttle, .. } => {
            // Yaw/pitch/roll are accepted but have no drone operation yet.
            drone.set_flight_mode(FlightMode::Manual);
            drone.set_throttle(throttle * 100.0);
        }
        Command::SetMode { mode } => drone.set_flight_mode(*mode),
        Command::EmergencyStop => drone.disarm(),
    }

    Ok(())
}

/// Captures one drone's telemetry under the shared guard.
pub fn snapshot(fleet: &Fleet, id: usize) -> Result<TelemetrySnapshot, CommandError> {
    let drones = fleet.read();
    let drone = drones.get(id).ok_or(CommandError::NotFound(id))?;
    Ok(TelemetrySnapshot::capture(id, drone))
}

/// Captures the whole fleet in index order under one shared-guard hold.
pub fn snapshot_all(fleet: &Fleet) -> Vec<TelemetrySnapshot> {
    let drones = fleet.read();
    drones
        .iter()
        .enumerate()
        .map(|(id, drone)| TelemetrySnapshot::capture(id, drone))
        .collect()
}
