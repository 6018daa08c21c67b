// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Message Handler: the gateway side of the rendezvous. Registers
//! per-device message consumers on this node's accept topic and
//! publishes replies that unblock a sender's semaphore wait.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use devicemesh_common::error::CoreError;
use devicemesh_common::ids::{DeviceId, MessageId};
use devicemesh_common::message::{MessageEnvelope, RawReply};
use devicemesh_coordination::CoordinationClient;
use tokio::sync::{mpsc, Mutex, OnceCell};

/// A gateway-authored reply, ready to unblock the sender waiting on
/// `reply_msg.message_id`.
#[derive(Debug, Clone)]
pub struct ReplyMessage {
    pub message_id: MessageId,
    pub raw: RawReply,
}

struct Shared {
    store: Arc<dyn CoordinationClient>,
    server_id: String,
    reply_ttl: std::time::Duration,
    subscription: OnceCell<()>,
    routes: Mutex<HashMap<DeviceId, mpsc::UnboundedSender<MessageEnvelope>>>,
}

/// Registers per-device handlers on this node's accept topic and writes
/// replies. One `MessageHandler` per gateway process, identified by its
/// `server_id`. Cheap to clone (an `Arc`-backed handle), so a
/// `handle_message` callback can hold its own clone to call
/// `reply`/`mark_message_async` from within.
///
/// `handle_message` is commonly called once per device hosted by this
/// gateway; every call after the first shares the same underlying
/// `topic_subscribe` on `device:message:accept:{server_id}`, so a publish
/// to that topic sees exactly one subscriber per gateway process, not one
/// per registered device.
#[derive(Clone)]
pub struct MessageHandler {
    shared: Arc<Shared>,
}

impl MessageHandler {
    pub fn new(store: Arc<dyn CoordinationClient>, server_id: impl Into<String>, reply_ttl: std::time::Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                store,
                server_id: server_id.into(),
                reply_ttl,
                subscription: OnceCell::new(),
                routes: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// `handleMessage(deviceId, handler)`: routes messages addressed to
    /// `device_id` arriving on `device:message:accept:{server_id}` to
    /// `handler(msg)`. Multiple devices may be registered against the
    /// same `MessageHandler`; the accept topic is subscribed exactly once
    /// per handler (lazily, on first call), and incoming messages are
    /// demultiplexed to the registered device's own queue. Delivery is
    /// concurrent across devices (each has its own drain task) and
    /// serialized per device (messages for one device are processed one
    /// at a time by that task).
    pub async fn handle_message<F, Fut>(&self, device_id: DeviceId, handler: F) -> Result<(), CoreError>
    where
        F: Fn(MessageEnvelope) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<MessageEnvelope>();
        self.shared.routes.lock().await.insert(device_id, tx);

        tokio::spawn(async move {
            while let Some(envelope) = rx.recv().await {
                handler(envelope).await;
            }
        });

        self.ensure_subscribed().await
    }

    /// Starts the single shared subscription on first use. Subsequent
    /// calls (from later `handle_message` registrations) are no-ops.
    async fn ensure_subscribed(&self) -> Result<(), CoreError> {
        let shared = self.shared.clone();
        self.shared
            .subscription
            .get_or_try_init(|| async move {
                let topic = devicemesh_coordination::keys::message_accept_topic(&shared.server_id);
                let mut subscription = shared.store.topic_subscribe(&topic).await?;
                tokio::spawn(async move {
                    while let Some(bytes) = subscription.recv().await {
                        let Ok(envelope) = serde_json::from_slice::<MessageEnvelope>(&bytes) else { continue };
                        let routes = shared.routes.lock().await;
                        if let Some(tx) = routes.get(&envelope.device_id) {
                            let _ = tx.send(envelope);
                        }
                    }
                });
                Ok::<(), CoreError>(())
            })
            .await?;
        Ok(())
    }

    /// `reply(replyMsg)`: writes the reply bucket, then releases one
    /// permit on the reply semaphore. Both steps happen even if the
    /// waiter has already timed out — bucket TTL cleans up either way.
    pub async fn reply(&self, reply_msg: ReplyMessage) -> Result<(), CoreError> {
        let bucket = devicemesh_coordination::keys::message_reply_bucket(&reply_msg.message_id);
        let bytes = serde_json::to_vec(&reply_msg.raw)
            .map_err(|e| CoreError::new(devicemesh_common::error::CoreErrorCode::SystemError, e.to_string()))?;
        self.shared.store.bucket_set(&bucket, bytes, Some(self.shared.reply_ttl)).await?;

        let semaphore = devicemesh_coordination::keys::reply_semaphore(&reply_msg.message_id);
        self.shared.store.semaphore_release(&semaphore, 1).await
    }

    /// `markMessageAsync(messageId)`: for fire-and-forget messages,
    /// releases the semaphore immediately without writing a reply bucket
    /// so the sender isn't blocked waiting for one.
    pub async fn mark_message_async(&self, message_id: &MessageId) -> Result<(), CoreError> {
        let semaphore = devicemesh_coordination::keys::reply_semaphore(message_id);
        self.shared.store.semaphore_release(&semaphore, 1).await
    }
}

#[cfg(test)]
#[path = "handler_tests.rs"]
mod tests;
