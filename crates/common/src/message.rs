// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreErrorCode;
use crate::ids::{DeviceId, MessageId};

/// The three message kinds the fluent builders produce. Protocol-specific
/// kinds beyond these three are an external collaborator (`ProtocolSupport`)
/// concern and are represented here only as the `Other` escape hatch so the
/// envelope's `kind` field stays bit-compatible with the wire schema
/// (`type ∈ {function, readProperty, writeProperty, …}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageKind {
    Function,
    ReadProperty,
    WriteProperty,
    Other(String),
}

/// The wire envelope, bit-exact field names for cross-node compatibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEnvelope {
    pub message_id: MessageId,
    pub device_id: DeviceId,
    pub timestamp: i64,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(default)]
    pub headers: HashMap<String, Value>,
    #[serde(default)]
    pub body: Value,
}

impl MessageEnvelope {
    pub fn new(device_id: DeviceId, kind: MessageKind, timestamp: i64) -> Self {
        Self {
            message_id: MessageId::generate(),
            device_id,
            timestamp,
            kind,
            headers: HashMap::new(),
            body: Value::Null,
        }
    }
}

/// A scalar or structured config value. `Value::Null` is rejected on
/// write; this wrapper exists so that rejection is enforced at the type's
/// construction boundary rather than scattered across call sites.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigValue(Value);

impl ConfigValue {
    /// Build a [`ConfigValue`], rejecting `null`. Mirrors `put(k, v)`'s
    /// `ILLEGAL_ARGUMENT` rule so every caller gets the check for free.
    pub fn new(value: Value) -> Result<Self, crate::error::CoreError> {
        if value.is_null() {
            return Err(crate::error::CoreError::new(
                CoreErrorCode::IllegalArgument,
                "config value must not be null",
            ));
        }
        Ok(Self(value))
    }

    pub fn into_inner(self) -> Value {
        self.0
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

impl TryFrom<Value> for ConfigValue {
    type Error = crate::error::CoreError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// The dynamic reply payload typing: represents the raw value a gateway
/// wrote to the reply bucket before `convert_reply` turns it into a typed
/// reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RawReply {
    /// Nothing was in the bucket (timeout with no partial reply, or the
    /// gateway never wrote one).
    None,
    /// The gateway (or `send()`'s own offline/timeout path) wrote an
    /// error code directly.
    ErrorCodeV(CoreErrorCode),
    /// A JSON value already shaped like the expected reply type.
    Typed(Value),
    /// A JSON string to be parsed.
    JsonString(String),
    /// Some other envelope-shaped message, to be re-serialized then
    /// deserialized as the expected reply type.
    Generic(MessageEnvelope),
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
