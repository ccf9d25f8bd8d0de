//! # Drone Bus Bridge
//!
//! Bridges a shared, mutable drone-fleet state to a publish/subscribe
//! message bus: inbound bus messages become mutations of per-drone state,
//! periodic snapshots of that state become outbound telemetry broadcasts,
//! and a request/reply façade lets path-addressed callers (an HTTP
//! gateway) perform the same operations synchronously.
//!
//! ## Architecture
//!
//! - [`subjects`] - Subject naming scheme shared by every component
//! - [`fleet`] - Drone state and the readers-writer State Guard
//! - [`bus`] - Transport seam: `Bus` trait and the in-process bus
//! - [`commands`] - Command vocabulary and wire payload decoding
//! - [`ops`] - Drone operations shared by both ingress paths
//! - [`router`] - Fire-and-forget command ingress (`drone.<id>.<op>`)
//! - [`telemetry`] - Snapshots and the periodic publish loop
//! - [`service`] - Synchronous request/reply façade (`drone.<op>`)
//!
//! ## Quick start
//!
//! ```rust
//! use dronebus::bus::InProcessBus;
//! use dronebus::fleet::Fleet;
//! use dronebus::router::CommandRouter;
//! use dronebus::telemetry::TelemetryPublisher;
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let bus: Arc<dyn dronebus::bus::Bus> = Arc::new(InProcessBus::new());
//! let fleet = Arc::new(Fleet::new(4));
//!
//! let router = CommandRouter::start(Arc::clone(&bus), Arc::clone(&fleet));
//! let publisher = TelemetryPublisher::start(Arc::clone(&bus), Arc::clone(&fleet), 10.0);
//!
//! // ... drive the fleet over the bus ...
//!
//! publisher.stop().await;
//! router.stop().await;
//! # }
//! ```

pub mod bus;
pub mod commands;
pub mod fleet;
pub mod ops;
pub mod router;
pub mod service;
pub mod subjects;
pub mod telemetry;

// Re-export main public types for convenience
pub use bus::{Bus, InProcessBus, Message};
pub use commands::{Command, CommandOp};
pub use fleet::{Drone, Fleet, FlightMode};
pub use router::CommandRouter;
pub use service::{FleetService, ServiceConfig};
pub use telemetry::{TelemetryPublisher, TelemetrySnapshot};
