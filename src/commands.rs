//! Command vocabulary and wire payload decoding.
//!
//! Payloads arrive as small JSON bodies keyed by the operation segment of
//! the subject (or the endpoint name on the service path). Decoding
//! validates everything once at the boundary; downstream code only ever
//! sees a well-formed [`Command`].

use crate::fleet::FlightMode;
use crate::ops::CommandError;
use serde::{Deserialize, Serialize};

/// Altitude-hold target used when a takeoff request carries no altitude
/// (or a non-positive one), in meters.
pub const DEFAULT_TAKEOFF_ALTITUDE: f64 = 10.0;

/// The eight per-drone operations, as they appear in subject names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOp {
    Arm,
    Disarm,
    Takeoff,
    Land,
    Goto,
    Input,
    Mode,
    Stop,
}

impl CommandOp {
    pub const ALL: [CommandOp; 8] = [
        CommandOp::Arm,
        CommandOp::Disarm,
        CommandOp::Takeoff,
        CommandOp::Land,
        CommandOp::Goto,
        CommandOp::Input,
        CommandOp::Mode,
        CommandOp::Stop,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CommandOp::Arm => "arm",
            CommandOp::Disarm => "disarm",
            CommandOp::Takeoff => "takeoff",
            CommandOp::Land => "land",
            CommandOp::Goto => "goto",
            CommandOp::Input => "input",
            CommandOp::Mode => "mode",
            CommandOp::Stop => "stop",
        }
    }
}

/// A fully decoded, validated drone command. Both ingress paths (the
/// fire-and-forget router and the request/reply façade) produce these and
/// hand them to [`crate::ops::apply`].
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Arm,
    Disarm,
    Takeoff { altitude: f64 },
    Land,
    /// Only `y` (altitude) is honored; lateral positioning is outside the
    /// flight controller's reach. `x`/`z` are kept so the wire contract
    /// stays stable.
    GotoAltitude { x: f64, y: f64, z: f64 },
    /// Only `throttle` is honored; yaw/pitch/roll have no drone operation
    /// wired up yet.
    SetManualInput {
        throttle: f64,
        yaw: f64,
        pitch: f64,
        roll: f64,
    },
    SetMode { mode: FlightMode },
    EmergencyStop,
}

/// Body of `takeoff`. The body itself is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TakeoffCmd {
    #[serde(default)]
    pub altitude: f64,
}

/// Body of `goto`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GotoCmd {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

/// Body of `input`. Throttle is a 0-1 fraction on the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputCmd {
    #[serde(default)]
    pub throttle: f64,
    #[serde(default)]
    pub yaw: f64,
    #[serde(default)]
    pub pitch: f64,
    #[serde(default)]
    pub roll: f64,
}

/// Body of `mode`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModeCmd {
    #[serde(default)]
    pub mode: String,
}

/// Decodes `body` as the payload of `op`. Arm/disarm/land/stop take no
/// body; takeoff tolerates an absent body and falls back to the default
/// altitude; the rest require valid JSON.
pub fn decode(op: CommandOp, body: &[u8]) -> Result<Command, CommandError> {
    match op {
        CommandOp::Arm => Ok(Command::Arm),
        CommandOp::Disarm => Ok(Command::Disarm),
        CommandOp::Land => Ok(Command::Land),
        CommandOp::Stop => Ok(Command::EmergencyStop),
        CommandOp::Takeoff => {
            let cmd: TakeoffCmd = if body.is_empty() {
                TakeoffCmd::default()
            } else {
                serde_json::from_slice(body)?
            };
            let altitude = if cmd.altitude <= 0.0 {
                DEFAULT_TAKEOFF_ALTITUDE
            } else {
                cmd.altitude
            };
            Ok(Command::Takeoff { altitude })
        }
        CommandOp::Goto => {
            let cmd: GotoCmd = serde_json::from_slice(body)?;
            Ok(Command::GotoAltitude {
                x: cmd.x,
                y: cmd.y,
                z: cmd.z,
            })
        }
        CommandOp::Input => {
            let cmd: InputCmd = serde_json::from_slice(body)?;
            Ok(Command::SetManualInput {
                throttle: cmd.throttle,
                yaw: cmd.yaw,
                pitch: cmd.pitch,
                roll: cmd.roll,
            })
        }
        CommandOp::Mode => {
            let cmd: ModeCmd = serde_json::from_slice(body)?;
            let mode = FlightMode::parse(&cmd.mode)
                .ok_or_else(|| CommandError::UnknownMode(cmd.mode.clone()))?;
            Ok(Command::SetMode { mode })
        }
    }
}
