//! Fleet state container and the minimal drone model the bridge mutates.
//!
//! The simulation engine (physics integration, battery drain, flight-mode
//! control loops) lives outside this crate; what the bridge needs is the
//! observable, mutable per-drone state and one readers-writer lock
//! serializing all access to it.

use serde::{Deserialize, Serialize};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Throttle the flight controller settles at to hold altitude, in percent.
/// The real value is physics-derived; the bridge only needs a stable
/// reference point for the takeoff/land offsets.
pub const HOVER_THROTTLE_PERCENT: f64 = 55.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlightMode {
    Manual,
    AltitudeHold,
    Hover,
}

impl FlightMode {
    /// Wire name used in telemetry, matching the dashboard contract.
    pub fn as_str(&self) -> &'static str {
        match self {
            FlightMode::Manual => "Manual",
            FlightMode::AltitudeHold => "AltitudeHold",
            FlightMode::Hover => "Hover",
        }
    }

    /// Case-insensitive parse of the mode names accepted on the wire.
    /// Returns `None` for anything outside the recognized set.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "manual" => Some(FlightMode::Manual),
            "altitudehold" | "altitude" => Some(FlightMode::AltitudeHold),
            "hover" => Some(FlightMode::Hover),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Observable state of one drone. Created by the fleet at startup and
/// mutated only through [`crate::ops`] while the fleet lock is held.
#[derive(Debug, Clone, PartialEq)]
pub struct Drone {
    pub armed: bool,
    pub flight_mode: FlightMode,
    pub throttle_percent: f64,
    pub altitude_hold: f64,
    pub position: Vec3,
    pub velocity: Vec3,
    pub rotation: Vec3,
    pub battery_percent: f64,
    pub on_ground: bool,
    pub destroyed: bool,
}

impl Drone {
    pub fn new() -> Self {
        Self {
            armed: false,
            flight_mode: FlightMode::Manual,
            throttle_percent: 0.0,
            altitude_hold: 0.0,
            position: Vec3::default(),
            velocity: Vec3::default(),
            rotation: Vec3::default(),
            battery_percent: 100.0,
            on_ground: true,
            destroyed: false,
        }
    }

    pub fn arm(&mut self) {
        self.armed = true;
    }

    pub fn disarm(&mut self) {
        self.armed = false;
    }

    pub fn set_flight_mode(&mut self, mode: FlightMode) {
        self.flight_mode = mode;
    }

    /// Sets throttle, clamped to the controller's 0-100% range.
    pub fn set_throttle(&mut self, percent: f64) {
        self.throttle_percent = percent.clamp(0.0, 100.0);
    }

    /// Throttle needed to hold the current altitude.
    pub fn hover_throttle_percent(&self) -> f64 {
        HOVER_THROTTLE_PERCENT
    }
}

impl Default for Drone {
    fn default() -> Self {
        Self::new()
    }
}

/// The State Guard: a fixed-size drone collection behind one
/// readers-writer lock. Command application takes the write side for a
/// single drone's read-modify-write; telemetry sweeps take the read side
/// for the whole collection.
#[derive(Debug)]
pub struct Fleet {
    drones: RwLock<Vec<Drone>>,
    count: usize,
}

impl Fleet {
    /// Creates a fleet of `count` drones in their grounded initial state.
    pub fn new(count: usize) -> Self {
        let drones = (0..count).map(|_| Drone::new()).collect();
        Self {
            drones: RwLock::new(drones),
            count,
        }
    }

    /// Number of drones. Fixed for the lifetime of the fleet, so no lock
    /// is needed to read it.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Shared-read access to the whole collection.
    pub fn read(&self) -> RwLockReadGuard<'_, Vec<Drone>> {
        self.drones.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Exclusive access to the whole collection.
    pub fn write(&self) -> RwLockWriteGuard<'_, Vec<Drone>> {
        self.drones.write().unwrap_or_else(PoisonError::into_inner)
    }
}
