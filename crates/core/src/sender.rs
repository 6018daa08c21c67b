// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Message Sender: the fluent builders and the cross-node
//! request/reply rendezvous algorithm itself.
//!
//! `MessageSender` and its builders are fully self-contained — all
//! mutable session/reply state lives in the coordination store, so a
//! builder never needs so much as a weak reference back to the
//! `DeviceOperation` it was built from. It holds cheap `Arc`-cloned
//! context plus its own [`SessionHandle`].

use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use devicemesh_common::error::{CoreError, CoreErrorCode};
use devicemesh_common::ids::{DeviceId, MessageId, ProductId};
use devicemesh_common::message::{MessageEnvelope, MessageKind, RawReply};
use devicemesh_coordination::CoordinationClient;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::device::{DeviceInfo, RegistryContext};
use crate::interceptor::{run_after_reply, run_pre_send};
use crate::metadata::ParameterMetadata;
use crate::reply::{convert_reply, finalize_reply, Reply, ReplyEnvelope};
use crate::session::SessionHandle;

fn now_millis() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as i64).unwrap_or(0)
}

/// Per-device entry point for the three fluent builders. No inheritance
/// hierarchy between them — each is a small, independent builder value.
pub struct MessageSender {
    ctx: RegistryContext,
    session: SessionHandle,
    device_id: DeviceId,
    product_id: ProductId,
}

impl MessageSender {
    pub fn new(ctx: RegistryContext, device_info: DeviceInfo, session: SessionHandle) -> Self {
        Self { ctx, session, device_id: device_info.id, product_id: device_info.product_id }
    }

    fn new_envelope(&self, kind: MessageKind) -> MessageEnvelope {
        MessageEnvelope::new(self.device_id.clone(), kind, now_millis())
    }

    pub fn invoke_function(&self, function: impl Into<String>) -> FunctionInvokeBuilder {
        FunctionInvokeBuilder {
            ctx: self.ctx.clone(),
            session: self.session.clone(),
            product_id: self.product_id.clone(),
            envelope: self.new_envelope(MessageKind::Function),
            function: function.into(),
            args: HashMap::new(),
            max_await: None,
        }
    }

    pub fn read_property(&self, property: impl Into<String>) -> ReadPropertyBuilder {
        ReadPropertyBuilder {
            ctx: self.ctx.clone(),
            session: self.session.clone(),
            envelope: self.new_envelope(MessageKind::ReadProperty),
            property: property.into(),
            max_await: None,
        }
    }

    pub fn write_property(&self, property: impl Into<String>, value: Value) -> WritePropertyBuilder {
        WritePropertyBuilder {
            ctx: self.ctx.clone(),
            session: self.session.clone(),
            envelope: self.new_envelope(MessageKind::WriteProperty),
            property: property.into(),
            value,
            max_await: None,
        }
    }

    /// `retrieveReply(messageId, ctor)`: performs only the bucket-read and
    /// reply-conversion steps of `send()` without publishing, to fetch a
    /// previously stored asynchronous reply. Intentionally bypasses
    /// interceptors — they only wrap `send()`.
    pub async fn retrieve_reply<T: DeserializeOwned>(&self, message_id: MessageId) -> Result<Reply<T>, CoreError> {
        retrieve_stored_reply(&self.ctx, message_id).await
    }
}

macro_rules! fluent_envelope_methods {
    () => {
        /// Overrides the auto-generated `messageId`.
        pub fn message_id(mut self, id: MessageId) -> Self {
            self.envelope.message_id = id;
            self
        }

        /// Sets a single header field.
        pub fn header(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
            self.envelope.headers.insert(key.into(), value.into());
            self
        }

        /// Arbitrary mutation of the outgoing envelope before it is sent.
        pub fn custom(mut self, configurator: impl FnOnce(&mut MessageEnvelope)) -> Self {
            configurator(&mut self.envelope);
            self
        }

        /// Overrides the process-wide reply timeout for this call only.
        /// The reply bucket/semaphore TTL is derived from this value the
        /// same way the default is, so a longer override also keeps the
        /// reply alive longer on the gateway side.
        pub fn max_await(mut self, duration: Duration) -> Self {
            self.max_await = Some(duration);
            self
        }
    };
}

/// `invokeFunction(name)`'s builder. Supports `validate(resultConsumer)`
/// in addition to the common fluent setters.
pub struct FunctionInvokeBuilder {
    ctx: RegistryContext,
    session: SessionHandle,
    product_id: ProductId,
    envelope: MessageEnvelope,
    function: String,
    args: HashMap<String, Value>,
    max_await: Option<Duration>,
}

impl FunctionInvokeBuilder {
    fluent_envelope_methods!();

    pub fn arg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.insert(name.into(), value.into());
        self
    }

    pub fn message_id_of(&self) -> &MessageId {
        &self.envelope.message_id
    }

    /// Looks up the function's metadata, failing `FUNCTION_UNDEFINED` if
    /// missing, `ILLEGAL_ARGUMENT` if the parameter count mismatches, and
    /// `PARAMETER_UNDEFINED` for unknown argument names; invokes
    /// `result_consumer` per input with its parameter metadata.
    pub async fn validate(
        &self,
        mut result_consumer: impl FnMut(&ParameterMetadata, &Value),
    ) -> Result<(), CoreError> {
        let metadata = self
            .ctx
            .metadata
            .resolve(&self.product_id, &self.function)
            .await?
            .ok_or_else(|| CoreError::new(CoreErrorCode::FunctionUndefined, self.function.clone()))?;

        if metadata.parameters.len() != self.args.len() {
            return Err(CoreError::new(
                CoreErrorCode::IllegalArgument,
                format!(
                    "function {} expects {} parameters, got {}",
                    self.function,
                    metadata.parameters.len(),
                    self.args.len()
                ),
            ));
        }
        for (name, value) in &self.args {
            let param = metadata
                .parameter(name)
                .ok_or_else(|| CoreError::new(CoreErrorCode::ParameterUndefined, name.clone()))?;
            result_consumer(param, value);
        }
        Ok(())
    }

    pub async fn send<T: DeserializeOwned + Send + 'static>(self) -> Result<Reply<T>, CoreError> {
        let mut envelope = self.envelope;
        envelope.body = json!({ "function": self.function, "args": self.args });
        dispatch_send(self.ctx, self.session, envelope, self.max_await).await
    }

    pub async fn retrieve_reply<T: DeserializeOwned>(&self) -> Result<Reply<T>, CoreError> {
        retrieve_stored_reply(&self.ctx, self.envelope.message_id.clone()).await
    }
}

/// `readProperty(name)`'s builder.
pub struct ReadPropertyBuilder {
    ctx: RegistryContext,
    session: SessionHandle,
    envelope: MessageEnvelope,
    property: String,
    max_await: Option<Duration>,
}

impl ReadPropertyBuilder {
    fluent_envelope_methods!();

    pub async fn send<T: DeserializeOwned + Send + 'static>(self) -> Result<Reply<T>, CoreError> {
        let mut envelope = self.envelope;
        envelope.body = json!({ "property": self.property });
        dispatch_send(self.ctx, self.session, envelope, self.max_await).await
    }

    pub async fn retrieve_reply<T: DeserializeOwned>(&self) -> Result<Reply<T>, CoreError> {
        retrieve_stored_reply(&self.ctx, self.envelope.message_id.clone()).await
    }
}

/// `writeProperty(name, value)`'s builder.
pub struct WritePropertyBuilder {
    ctx: RegistryContext,
    session: SessionHandle,
    envelope: MessageEnvelope,
    property: String,
    value: Value,
    max_await: Option<Duration>,
}

impl WritePropertyBuilder {
    fluent_envelope_methods!();

    pub async fn send<T: DeserializeOwned + Send + 'static>(self) -> Result<Reply<T>, CoreError> {
        let mut envelope = self.envelope;
        envelope.body = json!({ "property": self.property, "value": self.value });
        dispatch_send(self.ctx, self.session, envelope, self.max_await).await
    }

    pub async fn retrieve_reply<T: DeserializeOwned>(&self) -> Result<Reply<T>, CoreError> {
        retrieve_stored_reply(&self.ctx, self.envelope.message_id.clone()).await
    }
}

/// Runs `send()`'s algorithm on a spawned task so a caller cancelling
/// their awaited future does not abort the in-flight rendezvous: the
/// bucket write/cleanup on the gateway side is unaffected, and the reply
/// is simply discarded on this end.
async fn dispatch_send<T>(
    ctx: RegistryContext,
    session: SessionHandle,
    envelope: MessageEnvelope,
    max_await: Option<Duration>,
) -> Result<Reply<T>, CoreError>
where
    T: DeserializeOwned + Send + 'static,
{
    let (tx, rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        let result = run_send_algorithm::<T>(ctx, session, envelope, max_await).await;
        let _ = tx.send(result);
    });
    match rx.await {
        Ok(result) => result,
        Err(_) => Err(CoreError::new(CoreErrorCode::SystemError, "send task terminated without a result")),
    }
}

/// The rendezvous algorithm behind every builder's `send()`: publish to
/// the owning gateway, acquire a reply semaphore sized to the observed
/// subscriber count, then read and convert whatever the gateway wrote
/// to the reply bucket.
async fn run_send_algorithm<T>(
    ctx: RegistryContext,
    session: SessionHandle,
    mut envelope: MessageEnvelope,
    max_await: Option<Duration>,
) -> Result<Reply<T>, CoreError>
where
    T: DeserializeOwned,
{
    let message_id = envelope.message_id.clone();

    // Read serverId; empty -> CLIENT_OFFLINE reply.
    let server_id = match session.get_server_id().await {
        Ok(Some(id)) => id,
        Ok(None) => return Ok(Reply::error(message_id, CoreErrorCode::ClientOffline)),
        Err(e) => {
            tracing::warn!(error = %e, "coordination error reading session state during send");
            return Ok(Reply::error(message_id, CoreErrorCode::SystemError));
        }
    };

    // Pre-send interceptor chain. Failures here surface as future
    // failure, not as a reply error.
    let chain = ctx.interceptor_snapshot();
    run_pre_send(&chain, &mut envelope).await?;

    // Publish to the owning gateway's accept topic.
    let topic = devicemesh_coordination::keys::message_accept_topic(&server_id);
    let payload = match serde_json::to_vec(&envelope) {
        Ok(bytes) => bytes,
        Err(e) => return Err(CoreError::new(CoreErrorCode::SystemError, e.to_string())),
    };
    let subscriber_count = match ctx.store.topic_publish(&topic, payload).await {
        Ok(n) => n,
        Err(e) => {
            tracing::warn!(error = %e, "coordination error publishing to gateway topic");
            return Ok(Reply::error(message_id, CoreErrorCode::SystemError));
        }
    };

    // No subscriber -> self-heal, then CLIENT_OFFLINE.
    if subscriber_count == 0 {
        if let Err(e) = session.check_state().await {
            tracing::warn!(error = %e, "liveness self-heal probe failed");
        }
        return Ok(Reply::error(message_id, CoreErrorCode::ClientOffline));
    }

    // More than one subscriber is unusual but not fatal.
    if subscriber_count > 1 {
        tracing::warn!(device_id = %envelope.device_id, server_id = %server_id, count = subscriber_count, "duplicate gateway subscribers for device");
    }

    // Reply semaphore, sized to require every subscriber to release —
    // tolerates duplicate gateway subscriptions by design.
    let semaphore_key = devicemesh_coordination::keys::reply_semaphore(&message_id);
    let max_await = max_await.unwrap_or_else(|| ctx.config.max_await());
    let ttl = ctx.config.reply_ttl_for(max_await);
    if let Err(e) = ctx.store.semaphore_try_set(&semaphore_key, 0).await {
        tracing::warn!(error = %e, "coordination error initializing reply semaphore");
        return Ok(Reply::error(message_id, CoreErrorCode::SystemError));
    }
    if let Err(e) = ctx.store.semaphore_expire(&semaphore_key, ttl).await {
        tracing::warn!(error = %e, "coordination error setting reply semaphore ttl");
    }
    let acquire_result = ctx.store.semaphore_acquire(&semaphore_key, subscriber_count as u32, max_await).await;

    // Read-and-delete the reply bucket regardless of whether the acquire
    // timed out — a partial reply may still be present.
    let reply_bucket = devicemesh_coordination::keys::message_reply_bucket(&message_id);
    let raw_bytes = ctx.store.bucket_get_and_delete(&reply_bucket).await;

    // Delete the semaphore unconditionally.
    let _ = ctx.store.semaphore_delete(&semaphore_key).await;

    if let Err(e) = acquire_result {
        tracing::warn!(error = %e, "coordination error acquiring reply semaphore");
        return Ok(Reply::error(message_id, CoreErrorCode::SystemError));
    }

    let raw_reply = match raw_bytes {
        Ok(Some(bytes)) => match serde_json::from_slice::<RawReply>(&bytes) {
            Ok(raw) => raw,
            Err(_) => RawReply::JsonString(String::from_utf8_lossy(&bytes).into_owned()),
        },
        Ok(None) => RawReply::None,
        Err(e) => {
            tracing::warn!(error = %e, "coordination error reading reply bucket");
            RawReply::None
        }
    };

    // convertReply.
    let mut reply_envelope: ReplyEnvelope = convert_reply(raw_reply, &message_id);

    // After-reply interceptor chain, then finalize into T.
    run_after_reply(&chain, &envelope, &mut reply_envelope).await?;
    Ok(finalize_reply(reply_envelope))
}

/// `retrieveReply`'s implementation: the bucket-read and reply-conversion
/// steps only, no publish, no interceptors.
async fn retrieve_stored_reply<T: DeserializeOwned>(ctx: &RegistryContext, message_id: MessageId) -> Result<Reply<T>, CoreError> {
    let reply_bucket = devicemesh_coordination::keys::message_reply_bucket(&message_id);
    let raw_reply = match ctx.store.bucket_get_and_delete(&reply_bucket).await? {
        Some(bytes) => serde_json::from_slice::<RawReply>(&bytes)
            .unwrap_or_else(|_| RawReply::JsonString(String::from_utf8_lossy(&bytes).into_owned())),
        None => RawReply::None,
    };
    let envelope = convert_reply(raw_reply, &message_id);
    Ok(finalize_reply(envelope))
}

#[cfg(test)]
#[path = "sender_tests.rs"]
mod tests;
