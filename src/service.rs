//! Synchronous request/reply façade.
//!
//! Registers one endpoint per operation under a service identity so a
//! gateway can route path-style HTTP calls onto the bus. The drone id
//! travels in the `X-Original-Path` header (`/<resource>/<id>/<op>`),
//! not in the subject; the reply carries a JSON envelope plus the HTTP
//! status code in the `X-Status-Code` header.

use crate::bus::{Bus, Headers, Message};
use crate::commands::{decode, Command, CommandOp};
use crate::fleet::Fleet;
use crate::ops::{self, CommandError};
use crate::subjects::{service_subject, AddressError};
use crate::telemetry::TelemetrySnapshot;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub const HEADER_ORIGINAL_PATH: &str = "X-Original-Path";
pub const HEADER_STATUS_CODE: &str = "X-Status-Code";
pub const HEADER_CONTENT_TYPE: &str = "Content-Type";

const STATUS_OK: u16 = 200;
const STATUS_BAD_REQUEST: u16 = 400;
const STATUS_NOT_FOUND: u16 = 404;

/// Service identity announced to the gateway.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub name: String,
    pub version: String,
    pub description: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "drone".to_string(),
            version: "1.0.0".to_string(),
            description: "UAV simulator fleet API".to_string(),
        }
    }
}

/// The nine façade endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    List,
    Status,
    Arm,
    Disarm,
    Takeoff,
    Land,
    Goto,
    Mode,
    Stop,
}

impl Endpoint {
    pub const ALL: [Endpoint; 9] = [
        Endpoint::List,
        Endpoint::Status,
        Endpoint::Arm,
        Endpoint::Disarm,
        Endpoint::Takeoff,
        Endpoint::Land,
        Endpoint::Goto,
        Endpoint::Mode,
        Endpoint::Stop,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::List => "list",
            Endpoint::Status => "status",
            Endpoint::Arm => "arm",
            Endpoint::Disarm => "disarm",
            Endpoint::Takeoff => "takeoff",
            Endpoint::Land => "land",
            Endpoint::Goto => "goto",
            Endpoint::Mode => "mode",
            Endpoint::Stop => "stop",
        }
    }
}

/// Standard success/error envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DroneResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DroneResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            error: None,
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DroneListResponse {
    pub count: usize,
    pub drones: Vec<TelemetrySnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DroneStatusResponse {
    pub success: bool,
    pub drone: TelemetrySnapshot,
}

/// The running façade: one subscription and task per endpoint.
pub struct FleetService {
    bus: Arc<dyn Bus>,
    sub_ids: Vec<u64>,
    tasks: Vec<JoinHandle<()>>,
}

impl FleetService {
    pub fn start(bus: Arc<dyn Bus>, fleet: Arc<Fleet>, config: ServiceConfig) -> Self {
        let mut sub_ids = Vec::with_capacity(Endpoint::ALL.len());
        let mut tasks = Vec::with_capacity(Endpoint::ALL.len());

        for endpoint in Endpoint::ALL {
            let sub = bus.subscribe(&service_subject(&config.name, endpoint.as_str()));
            sub_ids.push(sub.id);
            let fleet = Arc::clone(&fleet);
            let bus = Arc::clone(&bus);
            tasks.push(tokio::spawn(run_endpoint(endpoint, sub.rx, fleet, bus)));
        }

        info!(
            name = %config.name,
            version = %config.version,
            description = %config.description,
            "fleet service started"
        );
        Self { bus, sub_ids, tasks }
    }

    /// Revokes every endpoint subscription and waits for in-flight
    /// requests to be answered.
    pub async fn stop(self) {
        for id in &self.sub_ids {
            self.bus.unsubscribe(*id);
        }
        for task in self.tasks {
            let _ = task.await;
        }
        info!("fleet service stopped");
    }
}

async fn run_endpoint(
    endpoint: Endpoint,
    mut rx: UnboundedReceiver<Message>,
    fleet: Arc<Fleet>,
    bus: Arc<dyn Bus>,
) {
    while let Some(msg) = rx.recv().await {
        handle_request(endpoint, &msg, &fleet, bus.as_ref());
    }
}

fn handle_request(endpoint: Endpoint, msg: &Message, fleet: &Fleet, bus: &dyn Bus) {
    match execute(endpoint, msg, fleet) {
        Ok((status, body)) => respond(bus, msg, status, body),
        Err(err) => {
            let status = status_for(&err);
            warn!(endpoint = endpoint.as_str(), status, "{err}");
            let body = serde_json::to_vec(&DroneResponse::error(err.to_string()))
                .unwrap_or_else(|_| b"{\"success\":false}".to_vec());
            respond(bus, msg, status, body);
        }
    }
}

/// Runs one endpoint to completion: id extraction, body decode, the drone
/// operation under the guard. Nothing partially applies; any error here
/// means no state changed.
fn execute(
    endpoint: Endpoint,
    msg: &Message,
    fleet: &Fleet,
) -> Result<(u16, Vec<u8>), CommandError> {
    let path_id = parse_path_id(msg)?;

    match endpoint {
        Endpoint::List => {
            let drones = ops::snapshot_all(fleet);
            let resp = DroneListResponse {
                count: drones.len(),
                drones,
            };
            Ok((STATUS_OK, serde_json::to_vec(&resp)?))
        }
        Endpoint::Status => {
            let id = require_id(path_id)?;
            let drone = ops::snapshot(fleet, id)?;
            let resp = DroneStatusResponse {
                success: true,
                drone,
            };
            Ok((STATUS_OK, serde_json::to_vec(&resp)?))
        }
        Endpoint::Arm => run_command(fleet, path_id, CommandOp::Arm, msg),
        Endpoint::Disarm => run_command(fleet, path_id, CommandOp::Disarm, msg),
        Endpoint::Takeoff => run_command(fleet, path_id, CommandOp::Takeoff, msg),
        Endpoint::Land => run_command(fleet, path_id, CommandOp::Land, msg),
        Endpoint::Goto => run_command(fleet, path_id, CommandOp::Goto, msg),
        Endpoint::Mode => run_command(fleet, path_id, CommandOp::Mode, msg),
        Endpoint::Stop => run_command(fleet, path_id, CommandOp::Stop, msg),
    }
}

fn run_command(
    fleet: &Fleet,
    path_id: Option<usize>,
    op: CommandOp,
    msg: &Message,
) -> Result<(u16, Vec<u8>), CommandError> {
    let id = require_id(path_id)?;
    let command = decode(op, &msg.payload)?;
    ops::apply(fleet, id, &command)?;
    let message = success_message(id, &command);
    info!(op = op.as_str(), drone = id, "{message}");
    let resp = DroneResponse::success(message);
    Ok((STATUS_OK, serde_json::to_vec(&resp)?))
}

/// Extracts the drone id from the gateway's original-path header,
/// `/<resource>/<id>/<op>`. A path without an id segment is legal and
/// means "no specific drone".
fn parse_path_id(msg: &Message) -> Result<Option<usize>, CommandError> {
    let path = msg.header(HEADER_ORIGINAL_PATH).unwrap_or("");
    let segments: Vec<&str> = path
        .trim_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();

    if segments.len() < 2 {
        return Ok(None);
    }
    segments[1]
        .parse::<usize>()
        .map(Some)
        .map_err(|_| AddressError::BadId(segments[1].to_string()).into())
}

fn require_id(id: Option<usize>) -> Result<usize, CommandError> {
    id.ok_or_else(|| AddressError::MissingId.into())
}

fn status_for(err: &CommandError) -> u16 {
    match err {
        CommandError::NotFound(_) => STATUS_NOT_FOUND,
        CommandError::Address(_) | CommandError::Decode(_) | CommandError::UnknownMode(_) => {
            STATUS_BAD_REQUEST
        }
    }
}

fn success_message(id: usize, command: &Command) -> String {
    match command {
        Command::Arm => format!("drone {id} armed"),
        Command::Disarm => format!("drone {id} disarmed"),
        Command::Takeoff { altitude } => format!("drone {id} taking off to {altitude:.1}m"),
        Command::Land => format!("drone {id} landing"),
        Command::GotoAltitude { y, .. } => {
            format!("drone {id} going to altitude {y:.1} (lateral not yet supported)")
        }
        Command::SetManualInput { .. } => format!("drone {id} manual input set"),
        Command::SetMode { mode } => format!("drone {id} mode set to {}", mode.as_str()),
        Command::EmergencyStop => format!("drone {id} emergency stopped"),
    }
}

/// Sends the JSON reply with the status code in its side-channel header.
/// Requests without a reply subject get their result dropped.
fn respond(bus: &dyn Bus, request: &Message, status: u16, body: Vec<u8>) {
    let Some(reply) = request.reply.as_deref() else {
        warn!(subject = %request.subject, "request without reply subject");
        return;
    };

    let mut headers = Headers::new();
    headers.insert(HEADER_CONTENT_TYPE.to_string(), "application/json".to_string());
    headers.insert(HEADER_STATUS_CODE.to_string(), status.to_string());

    let msg = Message {
        subject: reply.to_string(),
        payload: body,
        headers,
        reply: None,
    };
    if let Err(e) = bus.publish_message(msg) {
        warn!(subject = %request.subject, "reply publish failed: {e}");
    }
}
