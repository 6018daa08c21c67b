// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process test double for [`CoordinationClient`]. Every unit and
//! integration test in this workspace runs against this backend instead
//! of a live Redis server.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use devicemesh_common::error::CoreError;
use tokio::sync::{broadcast, mpsc, Mutex, Notify, RwLock};

use crate::client::{CoordinationClient, Subscription};

struct BucketEntry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

struct SemaphoreEntry {
    available: i64,
    notify: Arc<Notify>,
    expires_at: Option<Instant>,
}

/// In-memory coordination backend. Not a production deployment mode — see
/// [`RedisCoordinationClient`](crate::redis_backend::RedisCoordinationClient)
/// for that.
#[derive(Default)]
pub struct InMemoryCoordinationClient {
    topics: RwLock<HashMap<String, broadcast::Sender<Vec<u8>>>>,
    buckets: Mutex<HashMap<String, BucketEntry>>,
    semaphores: Mutex<HashMap<String, SemaphoreEntry>>,
    maps: RwLock<HashMap<String, HashMap<String, Vec<u8>>>>,
}

impl InMemoryCoordinationClient {
    pub fn new() -> Self {
        Self::default()
    }

    async fn topic_sender(&self, topic: &str) -> broadcast::Sender<Vec<u8>> {
        if let Some(tx) = self.topics.read().await.get(topic) {
            return tx.clone();
        }
        let mut topics = self.topics.write().await;
        topics.entry(topic.to_owned()).or_insert_with(|| broadcast::channel(256).0).clone()
    }
}

#[async_trait]
impl CoordinationClient for InMemoryCoordinationClient {
    async fn topic_publish(&self, topic: &str, payload: Vec<u8>) -> Result<usize, CoreError> {
        let tx = self.topic_sender(topic).await;
        // `send` errors only when there are zero receivers; that's a
        // legitimate "nobody subscribed" outcome, not a coordination
        // failure, so it maps to ack count 0 rather than Err.
        Ok(tx.send(payload).unwrap_or(0))
    }

    async fn topic_subscribe(&self, topic: &str) -> Result<Subscription, CoreError> {
        let tx = self.topic_sender(topic).await;
        let mut rx = tx.subscribe();
        let (fwd_tx, fwd_rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(payload) => {
                        if fwd_tx.send(payload).is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        Ok(Subscription::new(fwd_rx))
    }

    async fn bucket_set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<(), CoreError> {
        let expires_at = ttl.map(|d| Instant::now() + d);
        self.buckets.lock().await.insert(key.to_owned(), BucketEntry { value, expires_at });
        Ok(())
    }

    async fn bucket_get(&self, key: &str) -> Result<Option<Vec<u8>>, CoreError> {
        let mut buckets = self.buckets.lock().await;
        match buckets.get(key) {
            Some(entry) if entry.expires_at.is_none_or(|at| at > Instant::now()) => {
                Ok(Some(entry.value.clone()))
            }
            Some(_) => {
                buckets.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn bucket_get_and_delete(&self, key: &str) -> Result<Option<Vec<u8>>, CoreError> {
        let mut buckets = self.buckets.lock().await;
        match buckets.remove(key) {
            Some(entry) if entry.expires_at.is_none_or(|at| at > Instant::now()) => {
                Ok(Some(entry.value))
            }
            _ => Ok(None),
        }
    }

    async fn bucket_delete(&self, key: &str) -> Result<(), CoreError> {
        self.buckets.lock().await.remove(key);
        Ok(())
    }

    async fn semaphore_try_set(&self, key: &str, permits: u32) -> Result<bool, CoreError> {
        let mut sems = self.semaphores.lock().await;
        evict_if_expired(&mut sems, key);
        if sems.contains_key(key) {
            return Ok(false);
        }
        sems.insert(
            key.to_owned(),
            SemaphoreEntry {
                available: permits as i64,
                notify: Arc::new(Notify::new()),
                expires_at: None,
            },
        );
        Ok(true)
    }

    async fn semaphore_acquire(
        &self,
        key: &str,
        n: u32,
        timeout: Duration,
    ) -> Result<bool, CoreError> {
        let deadline = Instant::now() + timeout;
        loop {
            let notify = {
                let mut sems = self.semaphores.lock().await;
                evict_if_expired(&mut sems, key);
                let Some(entry) = sems.get_mut(key) else {
                    return Ok(false);
                };
                if entry.available >= n as i64 {
                    entry.available -= n as i64;
                    return Ok(true);
                }
                Arc::clone(&entry.notify)
            };

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(false);
            }
            let _ = tokio::time::timeout(remaining, notify.notified()).await;
            if Instant::now() >= deadline {
                // One last check in case the permits arrived right at the
                // deadline, then give up.
                let mut sems = self.semaphores.lock().await;
                evict_if_expired(&mut sems, key);
                if let Some(entry) = sems.get_mut(key) {
                    if entry.available >= n as i64 {
                        entry.available -= n as i64;
                        return Ok(true);
                    }
                }
                return Ok(false);
            }
        }
    }

    async fn semaphore_release(&self, key: &str, n: u32) -> Result<(), CoreError> {
        let mut sems = self.semaphores.lock().await;
        evict_if_expired(&mut sems, key);
        if let Some(entry) = sems.get_mut(key) {
            entry.available += n as i64;
            entry.notify.notify_waiters();
        }
        Ok(())
    }

    async fn semaphore_expire(&self, key: &str, ttl: Duration) -> Result<(), CoreError> {
        let mut sems = self.semaphores.lock().await;
        evict_if_expired(&mut sems, key);
        if let Some(entry) = sems.get_mut(key) {
            entry.expires_at = Some(Instant::now() + ttl);
        }
        Ok(())
    }

    async fn semaphore_delete(&self, key: &str) -> Result<(), CoreError> {
        self.semaphores.lock().await.remove(key);
        Ok(())
    }

    async fn semaphore_exists(&self, key: &str) -> Result<bool, CoreError> {
        let mut sems = self.semaphores.lock().await;
        evict_if_expired(&mut sems, key);
        Ok(sems.contains_key(key))
    }

    async fn map_put(&self, key: &str, field: &str, value: Vec<u8>) -> Result<(), CoreError> {
        let mut maps = self.maps.write().await;
        maps.entry(key.to_owned()).or_default().insert(field.to_owned(), value);
        Ok(())
    }

    async fn map_get(&self, key: &str, field: &str) -> Result<Option<Vec<u8>>, CoreError> {
        let maps = self.maps.read().await;
        Ok(maps.get(key).and_then(|m| m.get(field)).cloned())
    }

    async fn map_get_all(&self, key: &str) -> Result<HashMap<String, Vec<u8>>, CoreError> {
        let maps = self.maps.read().await;
        Ok(maps.get(key).cloned().unwrap_or_default())
    }

    async fn map_remove(&self, key: &str, field: &str) -> Result<Option<Vec<u8>>, CoreError> {
        let mut maps = self.maps.write().await;
        Ok(maps.get_mut(key).and_then(|m| m.remove(field)))
    }

    async fn map_delete(&self, key: &str) -> Result<(), CoreError> {
        self.maps.write().await.remove(key);
        Ok(())
    }
}

fn evict_if_expired(sems: &mut HashMap<String, SemaphoreEntry>, key: &str) {
    if let Some(entry) = sems.get(key) {
        if entry.expires_at.is_some_and(|at| at <= Instant::now()) {
            sems.remove(key);
        }
    }
}

#[cfg(test)]
#[path = "memory_backend_tests.rs"]
mod tests;
