//! Notification Handler
//!
//! Façade between the delivery channel and the client. Arrivals coming through
//! the listener registry become dispatch tasks; client decisions come back
//! through [`NotificationHandler::submit_response`].
//!
//! The handler registers itself with the listener registry on
//! [`activate`](NotificationHandler::activate) and must be
//! [`deactivate`](NotificationHandler::deactivate)d to be released.

use std::sync::{Arc, Weak};
use std::time::Duration;
use log::{debug, info, warn};
use parking_lot::RwLock;
use thiserror::Error;
use tokio::runtime::Handle;

use crate::notifications::emitter::EventEmitter;
use crate::notifications::error::{HandlerError, HandlerResult};
use crate::notifications::listener::{ListenerError, ListenerRegistry, NotificationListener};
use crate::notifications::message::{generate_identifier, IncomingMessage};
use crate::notifications::presenter::{NotificationPresenter, ResponseBehavior};
use crate::notifications::registry::DispatchTaskRegistry;
use crate::notifications::task::{DispatchTask, TaskContext, TaskOwner, DEFAULT_RESPONSE_TIMEOUT};

/// Handler tuning
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerConfig {
    /// How long the client has to submit a decision
    pub response_timeout: Duration,

    /// Time out every pending task when the handler is deactivated
    pub finalize_on_deactivate: bool,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            finalize_on_deactivate: true,
        }
    }
}

/// Handler configuration errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Response timeout must be greater than zero")]
    InvalidResponseTimeout,
}

impl HandlerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.response_timeout.is_zero() {
            return Err(ConfigError::InvalidResponseTimeout);
        }
        Ok(())
    }
}

pub struct NotificationHandler {
    listeners: Arc<ListenerRegistry>,
    tasks: Arc<DispatchTaskRegistry>,
    context: TaskContext,
    config: HandlerConfig,
    active: RwLock<bool>,
    this: Weak<NotificationHandler>,
}

impl NotificationHandler {
    pub fn new(
        listeners: Arc<ListenerRegistry>,
        emitter: Arc<dyn EventEmitter>,
        presenter: Arc<dyn NotificationPresenter>,
        config: HandlerConfig,
        runtime: Handle,
    ) -> Arc<Self> {
        let context = TaskContext::new(emitter, presenter, config.response_timeout, runtime);
        Arc::new_cyclic(|this| Self {
            listeners,
            tasks: Arc::new(DispatchTaskRegistry::new()),
            context,
            config,
            active: RwLock::new(false),
            this: this.clone(),
        })
    }

    pub fn config(&self) -> &HandlerConfig {
        &self.config
    }

    pub fn is_active(&self) -> bool {
        *self.active.read()
    }

    /// Start receiving arrivals; calling it twice registers once
    pub fn activate(&self) {
        let mut active = self.active.write();
        if *active {
            return;
        }
        if let Some(listener) = self.as_listener() {
            self.listeners.add_listener(listener);
            *active = true;
            debug!("Notification handler activated");
        }
    }

    /// Stop receiving arrivals and settle the tasks still pending
    pub fn deactivate(&self) {
        {
            let mut active = self.active.write();
            if !*active {
                return;
            }
            if let Some(listener) = self.as_listener() {
                self.listeners.remove_listener(&listener);
            }
            *active = false;
        }

        if self.config.finalize_on_deactivate {
            let expired = self
                .tasks
                .pending()
                .into_iter()
                .filter(|task| task.handle_timeout())
                .count();
            if expired > 0 {
                info!("Timed out {} pending notification(s) on deactivation", expired);
            }
        } else if !self.tasks.is_empty() {
            debug!("Leaving {} pending notification(s) to their timers", self.tasks.len());
        }
        debug!("Notification handler deactivated");
    }

    /// Client decision for a pending notification
    pub fn submit_response(&self, identifier: &str, behavior: &ResponseBehavior) -> HandlerResult<()> {
        let task = self
            .tasks
            .get(identifier)
            .ok_or_else(|| HandlerError::already_handled(identifier))?;
        debug!("Received response for notification {}", identifier);
        task.handle_response(behavior)
    }

    /// Client boundary entry point, `handleNotificationAsync(identifier, behavior)`
    pub async fn handle_notification_async(
        &self,
        identifier: &str,
        behavior: ResponseBehavior,
    ) -> HandlerResult<()> {
        self.submit_response(identifier, &behavior)
    }

    /// Drop a finished task; absent identifiers are ignored
    pub fn on_task_finished(&self, task: &DispatchTask) {
        self.tasks.on_task_finished(task);
    }

    pub fn is_pending(&self, identifier: &str) -> bool {
        self.tasks.contains(identifier)
    }

    pub fn pending_count(&self) -> usize {
        self.tasks.len()
    }

    /// Wait until no task is pending
    pub async fn wait_until_idle(&self) {
        self.tasks.wait_until_empty().await;
    }

    fn as_listener(&self) -> Option<Arc<dyn NotificationListener>> {
        self.this.upgrade().map(|handler| handler as Arc<dyn NotificationListener>)
    }

    fn task_owner(&self) -> Weak<dyn TaskOwner> {
        let owner: Weak<DispatchTaskRegistry> = Arc::downgrade(&self.tasks);
        owner
    }
}

impl NotificationListener for NotificationHandler {
    fn on_message(&self, message: &IncomingMessage) -> Result<(), ListenerError> {
        // Held across insert and start so deactivation cannot interleave.
        let active = self.active.read();
        if !*active {
            warn!("Handler inactive, ignoring notification {}", message.identifier());
            return Ok(());
        }

        debug!("Received notification {}", message.identifier());
        let mut message = message.clone();
        loop {
            let task = Arc::new(DispatchTask::new(
                message.clone(),
                self.context.clone(),
                self.task_owner(),
            ));
            // Registered before start so an immediate response finds it.
            if self.tasks.insert(Arc::clone(&task)) {
                task.start();
                return Ok(());
            }
            // The pending task keeps its identifier; this arrival gets a fresh one.
            let identifier = generate_identifier();
            warn!(
                "Notification {} is already pending, handling duplicate as {}",
                message.identifier(),
                identifier
            );
            message = IncomingMessage::new(Some(identifier), message.payload().clone());
        }
    }

    fn on_deleted_messages(&self) -> Result<(), ListenerError> {
        debug!("Delivery channel reported deleted messages");
        Ok(())
    }

    fn listener_name(&self) -> String {
        "NotificationHandler".to_string()
    }
}
