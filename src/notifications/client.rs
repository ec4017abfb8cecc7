//! Client Delegate Bridge
//!
//! The client half of the handling protocol. A [`NotificationDelegate`]
//! decides how each announced notification is presented; [`ClientBridge`]
//! listens on the event channel, asks the delegate and submits the answer.

use std::sync::Arc;
use async_trait::async_trait;
use log::{debug, trace};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::notifications::emitter::{
    EmittedEvent, HANDLE_NOTIFICATION_EVENT, HANDLE_NOTIFICATION_TIMEOUT_EVENT,
};
use crate::notifications::error::{NotificationHandlingError, PresentationError};
use crate::notifications::handler::NotificationHandler;
use crate::notifications::presenter::ResponseBehavior;

/// Client-side decision maker
#[async_trait]
pub trait NotificationDelegate: Send + Sync {
    /// Decide how `notification` should be presented
    async fn handle_notification(&self, notification: &Value) -> Result<ResponseBehavior, PresentationError>;

    /// The decision for `id` was accepted
    fn handle_success(&self, _id: &str) {}

    /// Handling `id` failed or timed out
    fn handle_error(&self, _error: NotificationHandlingError) {}
}

/// Delegate answering every notification with the same behavior
#[derive(Debug, Clone)]
pub struct StaticDelegate {
    behavior: ResponseBehavior,
}

impl StaticDelegate {
    pub fn new(behavior: ResponseBehavior) -> Self {
        Self { behavior }
    }

    pub fn show() -> Self {
        Self::new(ResponseBehavior::new(json!({
            "shouldShowAlert": true,
            "shouldPlaySound": true,
            "shouldSetBadge": false,
        })))
    }

    pub fn suppress() -> Self {
        Self::new(ResponseBehavior::new(json!({
            "shouldShowAlert": false,
            "shouldPlaySound": false,
            "shouldSetBadge": false,
        })))
    }
}

#[async_trait]
impl NotificationDelegate for StaticDelegate {
    async fn handle_notification(&self, _notification: &Value) -> Result<ResponseBehavior, PresentationError> {
        Ok(self.behavior.clone())
    }
}

#[derive(Clone)]
pub struct ClientBridge {
    handler: Arc<NotificationHandler>,
    delegate: Arc<dyn NotificationDelegate>,
}

impl ClientBridge {
    pub fn new(handler: Arc<NotificationHandler>, delegate: Arc<dyn NotificationDelegate>) -> Self {
        Self { handler, delegate }
    }

    /// Handle one event to completion
    pub async fn handle_event(&self, event: EmittedEvent) {
        match event.name.as_str() {
            HANDLE_NOTIFICATION_EVENT => self.on_handle_notification(event).await,
            HANDLE_NOTIFICATION_TIMEOUT_EVENT => self.on_timeout(event),
            other => trace!("Client bridge ignoring '{}' event", other),
        }
    }

    /// Handle one event on its own task so a slow delegate does not hold up the channel
    pub fn dispatch(&self, event: EmittedEvent) -> JoinHandle<()> {
        let bridge = self.clone();
        tokio::spawn(async move { bridge.handle_event(event).await })
    }

    /// Consume the event channel until every sender is gone
    pub async fn run(self, mut events: mpsc::UnboundedReceiver<EmittedEvent>) {
        while let Some(event) = events.recv().await {
            self.dispatch(event);
        }
        debug!("Client bridge event channel closed");
    }

    async fn on_handle_notification(&self, event: EmittedEvent) {
        let Some(id) = event.id().map(str::to_string) else {
            debug!("Dropping '{}' event without an id", event.name);
            return;
        };
        let notification = event.notification().cloned().unwrap_or(Value::Null);

        let behavior = match self.delegate.handle_notification(&notification).await {
            Ok(behavior) => behavior,
            Err(source) => {
                self.delegate
                    .handle_error(NotificationHandlingError::Delegate { id, source });
                return;
            }
        };

        match self.handler.handle_notification_async(&id, behavior).await {
            Ok(()) => self.delegate.handle_success(&id),
            Err(e) => self.delegate.handle_error(e.into()),
        }
    }

    fn on_timeout(&self, event: EmittedEvent) {
        let Some(id) = event.id().map(str::to_string) else {
            return;
        };
        let notification = event.notification().cloned().unwrap_or(Value::Null);
        self.delegate
            .handle_error(NotificationHandlingError::Timeout { id, notification });
    }
}
