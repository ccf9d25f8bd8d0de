//! Fire-and-forget command ingress.
//!
//! One wildcard subscription per operation (`drone.*.arm`, ...), one task
//! per subscription. Commands address a single drone through the subject;
//! anything that fails to parse, decode, or resolve is logged and dropped
//! without a reply, and never disturbs other messages or drones.

use crate::bus::{Bus, Message};
use crate::commands::{decode, CommandOp};
use crate::fleet::Fleet;
use crate::ops;
use crate::subjects::{command_pattern, parse_drone_id};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub struct CommandRouter {
    bus: Arc<dyn Bus>,
    sub_ids: Vec<u64>,
    tasks: Vec<JoinHandle<()>>,
}

impl CommandRouter {
    /// Subscribes to every command operation and starts dispatching.
    pub fn start(bus: Arc<dyn Bus>, fleet: Arc<Fleet>) -> Self {
        let mut sub_ids = Vec::with_capacity(CommandOp::ALL.len());
        let mut tasks = Vec::with_capacity(CommandOp::ALL.len());

        for op in CommandOp::ALL {
            let sub = bus.subscribe(&command_pattern(op.as_str()));
            sub_ids.push(sub.id);
            let fleet = Arc::clone(&fleet);
            tasks.push(tokio::spawn(run_subscription(op, sub.rx, fleet)));
        }

        info!(
            operations = CommandOp::ALL.len(),
            "command router subscribed"
        );
        Self { bus, sub_ids, tasks }
    }

    /// Revokes every subscription and waits for in-flight messages to
    /// finish dispatching.
    pub async fn stop(self) {
        for id in &self.sub_ids {
            self.bus.unsubscribe(*id);
        }
        for task in self.tasks {
            let _ = task.await;
        }
        info!("command router stopped");
    }
}

async fn run_subscription(op: CommandOp, mut rx: UnboundedReceiver<Message>, fleet: Arc<Fleet>) {
    while let Some(msg) = rx.recv().await {
        dispatch(op, &msg, &fleet);
    }
}

fn dispatch(op: CommandOp, msg: &Message, fleet: &Fleet) {
    let id = match parse_drone_id(&msg.subject) {
        Ok(id) => id,
        Err(e) => {
            warn!(op = op.as_str(), subject = %msg.subject, "{e}");
            return;
        }
    };

    let command = match decode(op, &msg.payload) {
        Ok(command) => command,
        Err(e) => {
            warn!(op = op.as_str(), drone = id, "{e}");
            return;
        }
    };

    match ops::apply(fleet, id, &command) {
        Ok(()) => debug!(op = op.as_str(), drone = id, "command applied"),
        Err(e) => warn!(op = op.as_str(), drone = id, "{e}"),
    }
}
