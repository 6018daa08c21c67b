// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Production [`CoordinationClient`] backend, built on `redis` with the
//! `tokio-comp` + `connection-manager` features (see DESIGN.md for why
//! this crate rather than a hand-rolled protocol client).

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use devicemesh_common::error::CoreError;
use futures_util::StreamExt;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Script};
use tokio::sync::mpsc;

use crate::client::{coordination_err, CoordinationClient, Subscription};

/// Lua script for an atomic "acquire n permits if available" check.
/// Returns `-1` if the semaphore key doesn't exist (expired or never
/// created), `1` on success, `0` if not enough permits are available yet.
const ACQUIRE_SCRIPT: &str = r#"
local avail = tonumber(redis.call('GET', KEYS[1]))
if avail == nil then
    return -1
end
if avail >= tonumber(ARGV[1]) then
    redis.call('DECRBY', KEYS[1], ARGV[1])
    return 1
end
return 0
"#;

/// How often `semaphore_acquire` re-checks while waiting. Redis has no
/// native blocking multi-permit primitive, so this backend polls with a
/// bounded interval, the same shape used elsewhere for a condition with
/// no native wakeup.
const ACQUIRE_POLL_INTERVAL: Duration = Duration::from_millis(25);

pub struct RedisCoordinationClient {
    client: Client,
    conn: ConnectionManager,
}

impl RedisCoordinationClient {
    pub async fn connect(url: &str) -> Result<Self, CoreError> {
        let client = Client::open(url).map_err(|e| coordination_err("redis open", e))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| coordination_err("redis connect", e))?;
        Ok(Self { client, conn })
    }
}

#[async_trait]
impl CoordinationClient for RedisCoordinationClient {
    async fn topic_publish(&self, topic: &str, payload: Vec<u8>) -> Result<usize, CoreError> {
        let mut conn = self.conn.clone();
        let acks: i64 =
            conn.publish(topic, payload).await.map_err(|e| coordination_err("publish", e))?;
        Ok(acks.max(0) as usize)
    }

    async fn topic_subscribe(&self, topic: &str) -> Result<Subscription, CoreError> {
        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(|e| coordination_err("pubsub connect", e))?;
        pubsub.subscribe(topic).await.map_err(|e| coordination_err("subscribe", e))?;

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let mut stream = pubsub.on_message();
            while let Some(msg) = stream.next().await {
                let payload: Vec<u8> = match msg.get_payload() {
                    Ok(p) => p,
                    Err(_) => continue,
                };
                if tx.send(payload).is_err() {
                    break;
                }
            }
        });
        Ok(Subscription::new(rx))
    }

    async fn bucket_set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<(), CoreError> {
        let mut conn = self.conn.clone();
        match ttl {
            Some(d) => {
                let _: () = conn
                    .set_ex(key, value, d.as_secs().max(1))
                    .await
                    .map_err(|e| coordination_err("bucket set_ex", e))?;
            }
            None => {
                let _: () =
                    conn.set(key, value).await.map_err(|e| coordination_err("bucket set", e))?;
            }
        }
        Ok(())
    }

    async fn bucket_get(&self, key: &str) -> Result<Option<Vec<u8>>, CoreError> {
        let mut conn = self.conn.clone();
        conn.get(key).await.map_err(|e| coordination_err("bucket get", e))
    }

    async fn bucket_get_and_delete(&self, key: &str) -> Result<Option<Vec<u8>>, CoreError> {
        let mut conn = self.conn.clone();
        redis::cmd("GETDEL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| coordination_err("bucket getdel", e))
    }

    async fn bucket_delete(&self, key: &str) -> Result<(), CoreError> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await.map_err(|e| coordination_err("bucket del", e))?;
        Ok(())
    }

    async fn semaphore_try_set(&self, key: &str, permits: u32) -> Result<bool, CoreError> {
        let mut conn = self.conn.clone();
        let opts = redis::SetOptions::default().conditional_set(redis::ExistenceCheck::NX);
        let result: Option<String> = conn
            .set_options(key, permits, opts)
            .await
            .map_err(|e| coordination_err("semaphore try_set", e))?;
        Ok(result.is_some())
    }

    async fn semaphore_acquire(
        &self,
        key: &str,
        n: u32,
        timeout: Duration,
    ) -> Result<bool, CoreError> {
        let script = Script::new(ACQUIRE_SCRIPT);
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let mut conn = self.conn.clone();
            let outcome: i64 = script
                .key(key)
                .arg(n)
                .invoke_async(&mut conn)
                .await
                .map_err(|e| coordination_err("semaphore acquire script", e))?;
            match outcome {
                -1 => return Ok(false),
                1 => return Ok(true),
                _ => {}
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(ACQUIRE_POLL_INTERVAL.min(deadline - tokio::time::Instant::now()))
                .await;
        }
    }

    async fn semaphore_release(&self, key: &str, n: u32) -> Result<(), CoreError> {
        let mut conn = self.conn.clone();
        let _: i64 =
            conn.incr(key, n).await.map_err(|e| coordination_err("semaphore release", e))?;
        Ok(())
    }

    async fn semaphore_expire(&self, key: &str, ttl: Duration) -> Result<(), CoreError> {
        let mut conn = self.conn.clone();
        let _: bool = conn
            .expire(key, ttl.as_secs().max(1) as i64)
            .await
            .map_err(|e| coordination_err("semaphore expire", e))?;
        Ok(())
    }

    async fn semaphore_delete(&self, key: &str) -> Result<(), CoreError> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await.map_err(|e| coordination_err("semaphore delete", e))?;
        Ok(())
    }

    async fn semaphore_exists(&self, key: &str) -> Result<bool, CoreError> {
        let mut conn = self.conn.clone();
        conn.exists(key).await.map_err(|e| coordination_err("semaphore exists", e))
    }

    async fn map_put(&self, key: &str, field: &str, value: Vec<u8>) -> Result<(), CoreError> {
        let mut conn = self.conn.clone();
        let _: () =
            conn.hset(key, field, value).await.map_err(|e| coordination_err("map put", e))?;
        Ok(())
    }

    async fn map_get(&self, key: &str, field: &str) -> Result<Option<Vec<u8>>, CoreError> {
        let mut conn = self.conn.clone();
        conn.hget(key, field).await.map_err(|e| coordination_err("map get", e))
    }

    async fn map_get_all(&self, key: &str) -> Result<HashMap<String, Vec<u8>>, CoreError> {
        let mut conn = self.conn.clone();
        conn.hgetall(key).await.map_err(|e| coordination_err("map get_all", e))
    }

    async fn map_remove(&self, key: &str, field: &str) -> Result<Option<Vec<u8>>, CoreError> {
        let mut conn = self.conn.clone();
        let prior: Option<Vec<u8>> =
            conn.hget(key, field).await.map_err(|e| coordination_err("map remove get", e))?;
        let _: () =
            conn.hdel(key, field).await.map_err(|e| coordination_err("map remove del", e))?;
        Ok(prior)
    }

    async fn map_delete(&self, key: &str) -> Result<(), CoreError> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await.map_err(|e| coordination_err("map delete", e))?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "redis_backend_tests.rs"]
mod tests;
