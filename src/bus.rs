//! Transport seam between the bridge and whatever message bus carries the
//! traffic.
//!
//! The bridge only ever needs publish, wildcard subscribe, and per-
//! subscription revocation; reconnection, delivery guarantees, and
//! authentication are the transport's problem. [`InProcessBus`] is the
//! channel-backed implementation used by the demo binary and the
//! integration tests.

use crate::subjects::subject_matches;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

pub type Headers = HashMap<String, String>;

/// One bus message: a subject, an opaque payload, optional string headers,
/// and an optional reply subject for request/reply traffic.
#[derive(Debug, Clone)]
pub struct Message {
    pub subject: String,
    pub payload: Vec<u8>,
    pub headers: Headers,
    pub reply: Option<String>,
}

impl Message {
    pub fn new(subject: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            subject: subject.into(),
            payload,
            headers: Headers::new(),
            reply: None,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

#[derive(Debug, Error)]
pub enum BusError {
    #[error("bus is closed")]
    Closed,
    #[error("request on {0} timed out")]
    Timeout(String),
    #[error("no reply received on {0}")]
    NoReply(String),
}

/// An active subscription. Dropping the receiver (or calling
/// [`Bus::unsubscribe`] with `id`) stops delivery.
#[derive(Debug)]
pub struct Subscription {
    pub id: u64,
    pub rx: mpsc::UnboundedReceiver<Message>,
}

/// Publish/subscribe primitives the bridge is written against.
pub trait Bus: Send + Sync {
    /// Publishes a bare payload to `subject`. Best-effort: delivery to
    /// slow or gone subscribers is not reported.
    fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), BusError>;

    /// Publishes a full message, headers and reply subject included.
    fn publish_message(&self, msg: Message) -> Result<(), BusError>;

    /// Subscribes to a subject pattern (`*` one token, `>` tail).
    fn subscribe(&self, pattern: &str) -> Subscription;

    /// Revokes one subscription.
    fn unsubscribe(&self, id: u64);

    /// Returns a unique inbox subject for request/reply.
    fn new_inbox(&self) -> String;

    /// Closes the bus: all subscriptions end once delivered messages are
    /// drained, and further publishes fail with [`BusError::Closed`].
    fn close(&self);
}

/// Sends `msg` to `subject` and waits for one reply on a fresh inbox.
pub async fn request(
    bus: &dyn Bus,
    subject: &str,
    headers: Headers,
    payload: Vec<u8>,
    timeout: Duration,
) -> Result<Message, BusError> {
    let inbox = bus.new_inbox();
    let mut sub = bus.subscribe(&inbox);

    let msg = Message {
        subject: subject.to_string(),
        payload,
        headers,
        reply: Some(inbox),
    };
    bus.publish_message(msg)?;

    let reply = tokio::time::timeout(timeout, sub.rx.recv()).await;
    bus.unsubscribe(sub.id);
    match reply {
        Ok(Some(msg)) => Ok(msg),
        Ok(None) => Err(BusError::NoReply(subject.to_string())),
        Err(_) => Err(BusError::Timeout(subject.to_string())),
    }
}

struct SubEntry {
    id: u64,
    pattern: String,
    tx: mpsc::UnboundedSender<Message>,
}

/// Channel-backed bus for single-process deployments and tests. Delivery
/// is at-most-once per subscriber, in publish order per subscription.
pub struct InProcessBus {
    subs: Mutex<Vec<SubEntry>>,
    next_id: AtomicU64,
    closed: AtomicBool,
}

impl InProcessBus {
    pub fn new() -> Self {
        Self {
            subs: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
        }
    }

    fn subs(&self) -> std::sync::MutexGuard<'_, Vec<SubEntry>> {
        self.subs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for InProcessBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Bus for InProcessBus {
    fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), BusError> {
        self.publish_message(Message::new(subject, payload))
    }

    fn publish_message(&self, msg: Message) -> Result<(), BusError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(BusError::Closed);
        }
        let mut subs = self.subs();
        // Prune subscriptions whose receiver is gone.
        subs.retain(|entry| !entry.tx.is_closed());
        for entry in subs.iter() {
            if subject_matches(&entry.pattern, &msg.subject) {
                let _ = entry.tx.send(msg.clone());
            }
        }
        Ok(())
    }

    fn subscribe(&self, pattern: &str) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subs().push(SubEntry {
            id,
            pattern: pattern.to_string(),
            tx,
        });
        Subscription { id, rx }
    }

    fn unsubscribe(&self, id: u64) {
        self.subs().retain(|entry| entry.id != id);
    }

    fn new_inbox(&self) -> String {
        format!("_INBOX.{}", self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        // Dropping the senders lets subscribers drain what was already
        // delivered and then observe end-of-stream.
        self.subs().clear();
    }
}
