//! Incoming Message Types
//!
//! `RemoteMessage` is the shape the delivery channel hands us. `IncomingMessage`
//! is what the rest of the system works with: a stable identifier plus the
//! serialized payload that is passed through to the client untouched.

use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Display portion of a push message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteNotification {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sound: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub click_action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
}

/// Raw message as surfaced by the push transport
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collapse_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification: Option<RemoteNotification>,
}

impl RemoteMessage {
    /// Convert to the structured form delivered to the client
    pub fn to_payload(&self) -> Value {
        // Every field is a plain string/number/map, so serialization cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// One arrived notification with its resolved identifier
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingMessage {
    identifier: String,
    payload: Value,
}

impl IncomingMessage {
    /// Build a message, generating an identifier when the transport gave none
    pub fn new(identifier: Option<String>, payload: Value) -> Self {
        let identifier = identifier
            .filter(|id| !id.is_empty())
            .unwrap_or_else(generate_identifier);
        Self { identifier, payload }
    }

    pub fn from_remote(message: &RemoteMessage) -> Self {
        Self::new(message.message_id.clone(), message.to_payload())
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }
}

impl From<RemoteMessage> for IncomingMessage {
    fn from(message: RemoteMessage) -> Self {
        Self::from_remote(&message)
    }
}

/// Fresh random token for messages without a transport id
pub fn generate_identifier() -> String {
    Uuid::new_v4().to_string()
}
