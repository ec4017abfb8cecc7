//! Notification Handling Error Types
//!
//! Failures surfaced by the handler façade and by the client-side bridge.
//! Listener failures never reach a caller; they are logged at the fan-out site.

use serde_json::Value;
use thiserror::Error;

/// Result type for handler operations
pub type HandlerResult<T> = Result<T, HandlerError>;

/// Error code reported when a response arrives for a notification that is no longer pending
pub const ERR_NOTIFICATION_HANDLED: &str = "ERR_NOTIFICATION_HANDLED";

/// Error code reported when presenting a resolved notification failed
pub const ERR_NOTIFICATION_PRESENTATION: &str = "ERR_NOTIFICATION_PRESENTATION";

/// Error code reported to the client when a notification timed out
pub const ERR_NOTIFICATION_TIMEOUT: &str = "ERR_NOTIFICATION_TIMEOUT";

/// Failure raised by a presentation collaborator
#[derive(Debug, Error, Clone, PartialEq)]
#[error("{message}")]
pub struct PresentationError {
    pub message: String,
}

impl PresentationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Errors returned to a client submitting a presentation decision
#[derive(Debug, Error, Clone, PartialEq)]
pub enum HandlerError {
    /// The identifier is not pending: resolved, timed out, or never seen
    #[error("Failed to handle notification {identifier}, it has already been handled.")]
    AlreadyHandled { identifier: String },

    /// The task committed to `Resolved` but presenting it failed
    #[error("Failed to present notification {identifier}: {source}")]
    Presentation {
        identifier: String,
        #[source]
        source: PresentationError,
    },
}

impl HandlerError {
    pub fn already_handled(identifier: impl Into<String>) -> Self {
        Self::AlreadyHandled {
            identifier: identifier.into(),
        }
    }

    pub fn presentation(identifier: impl Into<String>, source: PresentationError) -> Self {
        Self::Presentation {
            identifier: identifier.into(),
            source,
        }
    }

    /// Stable code exposed across the client boundary
    pub fn code(&self) -> &'static str {
        match self {
            HandlerError::AlreadyHandled { .. } => ERR_NOTIFICATION_HANDLED,
            HandlerError::Presentation { .. } => ERR_NOTIFICATION_PRESENTATION,
        }
    }

    pub fn identifier(&self) -> &str {
        match self {
            HandlerError::AlreadyHandled { identifier }
            | HandlerError::Presentation { identifier, .. } => identifier,
        }
    }
}

/// Errors delivered to a client delegate
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NotificationHandlingError {
    /// No decision was submitted within the response window
    #[error("Notification handling timed out for ID {id}.")]
    Timeout { id: String, notification: Value },

    /// The delegate could not produce a behavior
    #[error("Delegate failed to handle notification {id}: {source}")]
    Delegate {
        id: String,
        #[source]
        source: PresentationError,
    },

    /// Submitting the decision was rejected
    #[error(transparent)]
    Handler(#[from] HandlerError),
}

impl NotificationHandlingError {
    pub fn code(&self) -> Option<&'static str> {
        match self {
            NotificationHandlingError::Timeout { .. } => Some(ERR_NOTIFICATION_TIMEOUT),
            NotificationHandlingError::Delegate { .. } => None,
            NotificationHandlingError::Handler(e) => Some(e.code()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_already_handled_message_names_identifier() {
        let error = HandlerError::already_handled("m1");
        assert_eq!(
            error.to_string(),
            "Failed to handle notification m1, it has already been handled."
        );
        assert_eq!(error.code(), ERR_NOTIFICATION_HANDLED);
        assert_eq!(error.identifier(), "m1");
    }

    #[test]
    fn test_presentation_error_is_distinct() {
        let error = HandlerError::presentation("m1", PresentationError::new("channel missing"));
        assert_eq!(error.code(), ERR_NOTIFICATION_PRESENTATION);
        assert!(error.to_string().contains("channel missing"));
        assert!(std::error::Error::source(&error).is_some());
    }

    #[test]
    fn test_timeout_error_code() {
        let error = NotificationHandlingError::Timeout {
            id: "m2".to_string(),
            notification: serde_json::json!({"title": "Hi"}),
        };
        assert_eq!(error.code(), Some(ERR_NOTIFICATION_TIMEOUT));
        assert_eq!(error.to_string(), "Notification handling timed out for ID m2.");
    }
}
