// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `convert_reply` and the reply types it produces.
//!
//! The interceptor chain's `after_reply` hook operates on
//! [`ReplyEnvelope`], whose payload is a `serde_json::Value`,
//! rather than on the caller's statically-typed target — a JSON value is
//! the only representation every interceptor implementation can mutate
//! without the chain being generic over the caller's reply type. The
//! payload is deserialized into the caller's concrete type only in the
//! final step, producing [`Reply<T>`].

use devicemesh_common::error::CoreErrorCode;
use devicemesh_common::ids::MessageId;
use devicemesh_common::message::RawReply;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// The reply after `convertReply` but before it is deserialized into the
/// caller's target type; what interceptors see and may mutate.
#[derive(Debug, Clone)]
pub struct ReplyEnvelope {
    pub message_id: MessageId,
    pub error: Option<CoreErrorCode>,
    pub payload: Value,
}

/// The final, typed reply handed back to callers of `send()` /
/// `retrieveReply()`.
#[derive(Debug, Clone)]
pub struct Reply<T> {
    pub message_id: MessageId,
    pub error: Option<CoreErrorCode>,
    pub value: Option<T>,
}

impl<T> Reply<T> {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn error(message_id: MessageId, error: CoreErrorCode) -> Self {
        Self { message_id, error: Some(error), value: None }
    }
}

/// The dynamic-typing dispatch for a raw reply payload, expressed as a
/// pattern match over the tagged [`RawReply`] variant instead of runtime
/// `instanceof` checks.
///
/// `request_message_id` is copied onto the result regardless of what the
/// raw reply carries, so every reply echoes back the id of the request
/// it answers even when the gateway's payload carries none.
pub fn convert_reply(raw: RawReply, request_message_id: &MessageId) -> ReplyEnvelope {
    let message_id = request_message_id.clone();
    match raw {
        RawReply::None => {
            ReplyEnvelope { message_id, error: Some(CoreErrorCode::NoReply), payload: Value::Null }
        }
        RawReply::ErrorCodeV(code) => ReplyEnvelope { message_id, error: Some(code), payload: Value::Null },
        RawReply::Typed(value) => ReplyEnvelope { message_id, error: None, payload: value },
        RawReply::JsonString(s) => match serde_json::from_str::<Value>(&s) {
            Ok(value) => ReplyEnvelope { message_id, error: None, payload: value },
            Err(_) => ReplyEnvelope {
                message_id,
                error: Some(CoreErrorCode::UnsupportedMessage),
                payload: Value::Null,
            },
        },
        RawReply::Generic(envelope) => match serde_json::to_value(&envelope) {
            Ok(value) => ReplyEnvelope { message_id, error: None, payload: value },
            Err(_) => ReplyEnvelope {
                message_id,
                error: Some(CoreErrorCode::UnsupportedMessage),
                payload: Value::Null,
            },
        },
    }
}

/// Deserialize a [`ReplyEnvelope`]'s payload into the caller's target
/// type. If the envelope already carries an error, the target is never
/// deserialized — the error is propagated as-is.
pub fn finalize_reply<T: DeserializeOwned>(envelope: ReplyEnvelope) -> Reply<T> {
    if let Some(error) = envelope.error {
        return Reply { message_id: envelope.message_id, error: Some(error), value: None };
    }
    match serde_json::from_value::<T>(envelope.payload) {
        Ok(value) => Reply { message_id: envelope.message_id, error: None, value: Some(value) },
        Err(_) => Reply {
            message_id: envelope.message_id,
            error: Some(CoreErrorCode::UnsupportedMessage),
            value: None,
        },
    }
}

#[cfg(test)]
#[path = "reply_tests.rs"]
mod tests;
