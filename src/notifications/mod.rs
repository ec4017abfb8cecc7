//! Push Notification Dispatch
//!
//! Mediates between a push delivery channel and a client that decides,
//! asynchronously, how each notification is presented.
//!
//! # Architecture
//!
//! - **ListenerRegistry**: fans delivery channel events out to listeners
//! - **EventEmitter**: one-way event channel towards the client
//! - **DispatchTask**: per-notification `Pending → Resolved | TimedOut` state machine
//! - **DispatchTaskRegistry**: identifier-keyed table of pending tasks
//! - **NotificationHandler**: turns arrivals into tasks and accepts client decisions
//!
//! # Example Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use pushgate::notifications::{
//!     ChannelEmitter, HandlerConfig, IncomingMessage, ListenerRegistry, LoggingPresenter,
//!     NotificationHandler, ResponseBehavior,
//! };
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let listeners = Arc::new(ListenerRegistry::new());
//! let (emitter, mut events) = ChannelEmitter::channel();
//! let handler = NotificationHandler::new(
//!     listeners.clone(),
//!     Arc::new(emitter),
//!     Arc::new(LoggingPresenter),
//!     HandlerConfig::default(),
//!     tokio::runtime::Handle::current(),
//! );
//! handler.activate();
//!
//! listeners.dispatch_message(&IncomingMessage::new(None, serde_json::json!({"title": "Hi"})));
//! if let Some(event) = events.recv().await {
//!     let id = event.id().unwrap_or_default().to_string();
//!     handler.submit_response(&id, &ResponseBehavior::new(serde_json::json!({"show": true})))?;
//! }
//! handler.deactivate();
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod emitter;
pub mod error;
pub mod handler;
pub mod listener;
pub mod message;
pub mod presenter;
pub mod received;
pub mod registry;
pub mod task;


pub use client::{ClientBridge, NotificationDelegate, StaticDelegate};
pub use emitter::{ChannelEmitter, EmittedEvent, EventEmitter};
pub use error::{HandlerError, HandlerResult, NotificationHandlingError, PresentationError};
pub use handler::{ConfigError, HandlerConfig, NotificationHandler};
pub use listener::{ListenerRegistry, NotificationListener};
pub use message::{IncomingMessage, RemoteMessage, RemoteNotification};
pub use presenter::{LoggingPresenter, NotificationPresenter, ResponseBehavior};
pub use received::ReceivedNotificationForwarder;
pub use registry::DispatchTaskRegistry;
pub use task::{DispatchTask, TaskState};
