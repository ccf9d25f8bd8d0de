//! Telemetry snapshots and the periodic publish loop.

use crate::bus::Bus;
use crate::fleet::{Drone, Fleet, Vec3};
use crate::subjects::telemetry_subject;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{info, warn};

/// Default publish rate. One message per drone per tick.
pub const DEFAULT_TELEMETRY_HZ: f64 = 10.0;

/// Point-in-time view of one drone, published to `telemetry.<id>` and
/// returned by the façade's list/status endpoints. Field names are the
/// wire contract consumed by the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySnapshot {
    pub id: usize,
    /// Capture time, milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub position: Vec3,
    pub velocity: Vec3,
    pub rotation: Vec3,
    pub battery: f64,
    pub flight_mode: String,
    pub throttle: f64,
    pub armed: bool,
    pub on_ground: bool,
    pub destroyed: bool,
}

impl TelemetrySnapshot {
    /// Reads every field of `drone` in one go. The caller must hold the
    /// fleet guard so the snapshot cannot observe a torn mutation.
    pub fn capture(id: usize, drone: &Drone) -> Self {
        Self {
            id,
            timestamp: epoch_millis(),
            position: drone.position,
            velocity: drone.velocity,
            rotation: drone.rotation,
            battery: drone.battery_percent,
            flight_mode: drone.flight_mode.as_str().to_string(),
            throttle: drone.throttle_percent,
            armed: drone.armed,
            on_ground: drone.on_ground,
            destroyed: drone.destroyed,
        }
    }
}

fn epoch_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Publishes one snapshot per drone on a fixed schedule until stopped.
///
/// The loop owns nothing but the schedule: per-drone encode or publish
/// failures are logged and skipped, never fatal. [`stop`](Self::stop)
/// signals the loop and waits for it to exit, so the owner can tear down
/// the bus knowing no further publish will happen.
pub struct TelemetryPublisher {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl TelemetryPublisher {
    /// Spawns the publish loop at `hz` ticks per second. Rates that do
    /// not yield a usable period (non-finite, ≤ 0, or degenerate finite
    /// values) fall back to the default rate.
    pub fn start(bus: Arc<dyn Bus>, fleet: Arc<Fleet>, hz: f64) -> Self {
        let period = tick_period(hz);
        let hz = 1.0 / period.as_secs_f64();
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!(hz, "telemetry publisher started");

            loop {
                tokio::select! {
                    _ = stop_rx.changed() => break,
                    _ = ticker.tick() => publish_sweep(bus.as_ref(), &fleet),
                }
            }
            info!("telemetry publisher stopped");
        });

        Self { stop_tx, handle }
    }

    /// Signals the loop to exit and waits until it has. No message is
    /// published after this returns.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        let _ = self.handle.await;
    }
}

/// Tick period for a requested rate. `tokio::time::interval` panics on a
/// zero period, and `Duration` conversion rejects periods beyond its
/// range, so anything outside a sane rate falls back to the default:
/// non-finite or non-positive rates, rates so high the period rounds to
/// zero, and rates so low the period overflows.
fn tick_period(hz: f64) -> Duration {
    let hz = if hz.is_finite() && hz > 0.0 {
        hz
    } else {
        DEFAULT_TELEMETRY_HZ
    };
    Duration::try_from_secs_f64(1.0 / hz)
        .ok()
        .filter(|period| !period.is_zero())
        .unwrap_or_else(|| Duration::from_secs_f64(1.0 / DEFAULT_TELEMETRY_HZ))
}

/// One tick: shared-read guard held across the full fleet sweep.
fn publish_sweep(bus: &dyn Bus, fleet: &Fleet) {
    let drones = fleet.read();
    for (id, drone) in drones.iter().enumerate() {
        let snapshot = TelemetrySnapshot::capture(id, drone);
        let payload = match serde_json::to_vec(&snapshot) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(id, "telemetry encode failed: {e}");
                continue;
            }
        };
        if let Err(e) = bus.publish(&telemetry_subject(id), payload) {
            warn!(id, "telemetry publish failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_serializes_with_wire_field_names() {
        let drone = Drone::new();
        let snapshot = TelemetrySnapshot::capture(2, &drone);
        let json: serde_json::Value =
            serde_json::from_slice(&serde_json::to_vec(&snapshot).unwrap()).unwrap();

        assert_eq!(json["id"], 2);
        assert_eq!(json["flightMode"], "Manual");
        assert_eq!(json["onGround"], true);
        assert_eq!(json["armed"], false);
        assert_eq!(json["battery"], 100.0);
        assert!(json["position"]["x"].is_number());
        assert!(json["timestamp"].is_i64());
    }

    #[test]
    fn tick_period_for_sane_rates() {
        assert_eq!(tick_period(10.0), Duration::from_millis(100));
        assert_eq!(tick_period(1.0), Duration::from_secs(1));
    }

    #[test]
    fn tick_period_rejects_degenerate_rates() {
        let default = Duration::from_secs_f64(1.0 / DEFAULT_TELEMETRY_HZ);
        assert_eq!(tick_period(f64::INFINITY), default);
        assert_eq!(tick_period(f64::NAN), default);
        assert_eq!(tick_period(0.0), default);
        assert_eq!(tick_period(-5.0), default);
        // Finite but unusable: period rounds to zero / overflows Duration.
        assert_eq!(tick_period(1e300), default);
        assert_eq!(tick_period(1e-300), default);
        assert_eq!(tick_period(f64::MAX), default);
    }
}
