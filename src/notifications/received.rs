//! Received-notification forwarding
//!
//! Announces every arrival to the client regardless of how it is handled.

use std::sync::Arc;
use serde_json::Value;

use crate::notifications::emitter::{
    notification_body, EventEmitter, DELETED_MESSAGES_EVENT, DID_RECEIVE_NOTIFICATION_EVENT,
};
use crate::notifications::listener::{ListenerError, NotificationListener};
use crate::notifications::message::IncomingMessage;

pub struct ReceivedNotificationForwarder {
    emitter: Arc<dyn EventEmitter>,
}

impl ReceivedNotificationForwarder {
    pub fn new(emitter: Arc<dyn EventEmitter>) -> Self {
        Self { emitter }
    }
}

impl NotificationListener for ReceivedNotificationForwarder {
    fn on_message(&self, message: &IncomingMessage) -> Result<(), ListenerError> {
        self.emitter.emit(
            DID_RECEIVE_NOTIFICATION_EVENT,
            notification_body(message.identifier(), message.payload()),
        );
        Ok(())
    }

    fn on_deleted_messages(&self) -> Result<(), ListenerError> {
        self.emitter.emit(DELETED_MESSAGES_EVENT, Value::Object(Default::default()));
        Ok(())
    }

    fn listener_name(&self) -> String {
        "ReceivedNotificationForwarder".to_string()
    }
}
