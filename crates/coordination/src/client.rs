// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use devicemesh_common::error::CoreError;
use tokio::sync::mpsc;

/// A live topic subscription. Dropping it unsubscribes. Hands callers a
/// receiver end rather than a callback registration token.
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
    // Kept alive only so the backend can hook cleanup into Drop later;
    // no behavior depends on it today.
    _unsubscribe: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(rx: mpsc::UnboundedReceiver<Vec<u8>>) -> Self {
        Self { rx, _unsubscribe: None }
    }

    pub fn with_unsubscribe(
        rx: mpsc::UnboundedReceiver<Vec<u8>>,
        unsubscribe: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self { rx, _unsubscribe: Some(Box::new(unsubscribe)) }
    }

    /// Await the next published payload, or `None` once the topic closes.
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        self.rx.recv().await
    }
}

/// Thin abstraction over the shared coordination store: topics (pub/sub),
/// buckets (get-and-delete with TTL), distributed semaphores, and
/// per-entity hash maps. Every fallible operation surfaces backend
/// failures as [`CoreErrorCode::CoordinationError`].
///
/// `bucket_get` is a non-consuming read alongside `bucket_get_and_delete`,
/// needed to read persistent device/product records without consuming
/// them whenever the rendezvous path only needs get-and-delete.
#[async_trait]
pub trait CoordinationClient: Send + Sync {
    // -- topics (pub/sub) --------------------------------------------------

    /// Publish `payload` to `topic`, returning the number of subscribers
    /// that received it.
    async fn topic_publish(&self, topic: &str, payload: Vec<u8>) -> Result<usize, CoreError>;

    /// Subscribe to `topic`. Delivery happens on an internal worker task;
    /// the caller drains the returned [`Subscription`].
    async fn topic_subscribe(&self, topic: &str) -> Result<Subscription, CoreError>;

    // -- buckets (single value, optional TTL) ------------------------------

    async fn bucket_set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<(), CoreError>;

    async fn bucket_get(&self, key: &str) -> Result<Option<Vec<u8>>, CoreError>;

    async fn bucket_get_and_delete(&self, key: &str) -> Result<Option<Vec<u8>>, CoreError>;

    async fn bucket_delete(&self, key: &str) -> Result<(), CoreError>;

    // -- semaphores ---------------------------------------------------------

    /// Initialize the semaphore at `key` with `permits` available,
    /// returning `false` if it already exists.
    async fn semaphore_try_set(&self, key: &str, permits: u32) -> Result<bool, CoreError>;

    /// Block (cooperatively) until `n` permits have been released, or
    /// `timeout` elapses. Returns `true` if all `n` were acquired.
    async fn semaphore_acquire(
        &self,
        key: &str,
        n: u32,
        timeout: Duration,
    ) -> Result<bool, CoreError>;

    async fn semaphore_release(&self, key: &str, n: u32) -> Result<(), CoreError>;

    async fn semaphore_expire(&self, key: &str, ttl: Duration) -> Result<(), CoreError>;

    async fn semaphore_delete(&self, key: &str) -> Result<(), CoreError>;

    /// Whether a semaphore currently exists at `key` (used by tests and
    /// by invariant checks).
    async fn semaphore_exists(&self, key: &str) -> Result<bool, CoreError>;

    // -- maps (per-entity field -> value) ------------------------------------

    async fn map_put(&self, key: &str, field: &str, value: Vec<u8>) -> Result<(), CoreError>;

    async fn map_get(&self, key: &str, field: &str) -> Result<Option<Vec<u8>>, CoreError>;

    async fn map_get_all(&self, key: &str) -> Result<HashMap<String, Vec<u8>>, CoreError>;

    async fn map_remove(&self, key: &str, field: &str) -> Result<Option<Vec<u8>>, CoreError>;

    /// Delete every field of the map at `key` (used by `unregister`).
    async fn map_delete(&self, key: &str) -> Result<(), CoreError>;
}

pub(crate) fn coordination_err(context: &str, err: impl std::error::Error + Send + Sync + 'static) -> CoreError {
    CoreError::coordination(anyhow::Error::new(err).context(context.to_owned()))
}
