//! Presentation Collaborator
//!
//! The core never interprets a client's behavior; it hands it to a presenter
//! exactly once per resolved notification.

use log::info;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::notifications::error::PresentationError;

/// Client instructions for showing or suppressing a notification
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResponseBehavior(pub Value);

impl ResponseBehavior {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

impl From<Value> for ResponseBehavior {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// Platform hook that renders or suppresses a resolved notification
pub trait NotificationPresenter: Send + Sync {
    fn present(
        &self,
        identifier: &str,
        payload: &Value,
        behavior: &ResponseBehavior,
    ) -> Result<(), PresentationError>;
}

/// Presenter that only records what would be shown
#[derive(Debug, Default, Clone)]
pub struct LoggingPresenter;

impl NotificationPresenter for LoggingPresenter {
    fn present(
        &self,
        identifier: &str,
        _payload: &Value,
        behavior: &ResponseBehavior,
    ) -> Result<(), PresentationError> {
        info!("Showing notification {} with params: {}", identifier, behavior.as_value());
        Ok(())
    }
}
