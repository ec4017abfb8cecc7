//! Event Emission Channel
//!
//! One-way delivery of named events to the client side of the boundary. No
//! acknowledgement flows back; responses arrive through the handler façade.

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::mpsc;

/// Arrival event asking the client for a presentation decision
pub const HANDLE_NOTIFICATION_EVENT: &str = "onHandleNotification";

/// Fallback event emitted when no decision arrived in time
pub const HANDLE_NOTIFICATION_TIMEOUT_EVENT: &str = "onHandleNotificationTimeout";

/// Plain "a notification was received" announcement
pub const DID_RECEIVE_NOTIFICATION_EVENT: &str = "onDidReceiveNotification";

/// The transport dropped messages before they were delivered
pub const DELETED_MESSAGES_EVENT: &str = "onDeletedMessages";

/// Publish primitive towards the client
pub trait EventEmitter: Send + Sync {
    /// Fire-and-forget; the client may be absent
    fn emit(&self, event_name: &str, body: Value);
}

/// A named event as seen by the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmittedEvent {
    pub name: String,
    pub body: Value,
}

impl EmittedEvent {
    pub fn new(name: impl Into<String>, body: Value) -> Self {
        Self {
            name: name.into(),
            body,
        }
    }

    /// Identifier carried in `{id, notification}` bodies
    pub fn id(&self) -> Option<&str> {
        self.body.get("id").and_then(Value::as_str)
    }

    pub fn notification(&self) -> Option<&Value> {
        self.body.get("notification")
    }
}

/// Body shared by the arrival and timeout events
pub fn notification_body(identifier: &str, payload: &Value) -> Value {
    json!({
        "id": identifier,
        "notification": payload,
    })
}

/// Emitter backed by an unbounded tokio channel
#[derive(Debug, Clone)]
pub struct ChannelEmitter {
    sender: mpsc::UnboundedSender<EmittedEvent>,
}

impl ChannelEmitter {
    pub fn new(sender: mpsc::UnboundedSender<EmittedEvent>) -> Self {
        Self { sender }
    }

    /// Emitter plus the receiving end for the client
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<EmittedEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self::new(sender), receiver)
    }
}

impl EventEmitter for ChannelEmitter {
    fn emit(&self, event_name: &str, body: Value) {
        if self.sender.send(EmittedEvent::new(event_name, body)).is_err() {
            debug!("No client listening, dropped '{}' event", event_name);
        }
    }
}
