// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Device Session State: online/offline tracking with server-id /
//! session-id, plus liveness reconciliation via the liveness topic.

use std::sync::Arc;
use std::time::Duration;

use devicemesh_common::error::CoreError;
use devicemesh_common::ids::DeviceId;
use devicemesh_coordination::CoordinationClient;
use serde::{Deserialize, Serialize};

/// `unknown → offline → online ⇄ offline`; `unknown` is terminal and is
/// reached only after `unregister`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    Unknown,
    Offline,
    Online,
    NoActive,
}

/// The persisted record at `device:state:{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionRecord {
    state: SessionState,
    #[serde(default)]
    server_id: Option<String>,
    #[serde(default)]
    session_id: Option<String>,
    last_ping_ts: i64,
}

impl SessionRecord {
    fn offline() -> Self {
        Self { state: SessionState::Offline, server_id: None, session_id: None, last_ping_ts: 0 }
    }
}

/// A device's session handle: reads and mutates `device:state:{id}`, and
/// performs the liveness self-heal probe.
#[derive(Clone)]
pub struct SessionHandle {
    store: Arc<dyn CoordinationClient>,
    device_id: DeviceId,
    state_check_timeout: Duration,
}

impl SessionHandle {
    pub fn new(store: Arc<dyn CoordinationClient>, device_id: DeviceId, state_check_timeout: Duration) -> Self {
        Self { store, device_id, state_check_timeout }
    }

    fn key(&self) -> String {
        devicemesh_coordination::keys::device_state(&self.device_id)
    }

    async fn read(&self) -> Result<SessionRecord, CoreError> {
        match self.store.bucket_get(&self.key()).await? {
            Some(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                CoreError::new(devicemesh_common::error::CoreErrorCode::SystemError, e.to_string())
            }),
            None => Ok(SessionRecord { state: SessionState::Unknown, server_id: None, session_id: None, last_ping_ts: 0 }),
        }
    }

    async fn write(&self, record: &SessionRecord) -> Result<(), CoreError> {
        let bytes = serde_json::to_vec(record).map_err(|e| {
            CoreError::new(devicemesh_common::error::CoreErrorCode::SystemError, e.to_string())
        })?;
        self.store.bucket_set(&self.key(), bytes, None).await
    }

    /// Called by `register(info)`: creates an initial session state of
    /// `offline` if none exists yet, preserving existing state on
    /// re-register.
    pub(crate) async fn ensure_initialized(&self) -> Result<(), CoreError> {
        if self.store.bucket_get(&self.key()).await?.is_none() {
            self.write(&SessionRecord::offline()).await?;
        }
        Ok(())
    }

    pub(crate) async fn reset_to_unknown(&self) -> Result<(), CoreError> {
        self.store.bucket_delete(&self.key()).await
    }

    /// `online(serverId, sessionId)`: sets state atomically and publishes
    /// `device:online`.
    pub async fn online(&self, server_id: String, session_id: String, now_ts: i64) -> Result<(), CoreError> {
        let record = SessionRecord {
            state: SessionState::Online,
            server_id: Some(server_id),
            session_id: Some(session_id),
            last_ping_ts: now_ts,
        };
        self.write(&record).await?;
        let _ = self.store.topic_publish("device:online", self.device_id.as_str().as_bytes().to_vec()).await?;
        Ok(())
    }

    /// `offline()`: clears server-id/session-id and publishes
    /// `device:offline`.
    pub async fn offline(&self) -> Result<(), CoreError> {
        self.write(&SessionRecord::offline()).await?;
        let _ = self.store.topic_publish("device:offline", self.device_id.as_str().as_bytes().to_vec()).await?;
        Ok(())
    }

    pub async fn is_online(&self) -> Result<bool, CoreError> {
        Ok(self.read().await?.state == SessionState::Online)
    }

    pub async fn get_server_id(&self) -> Result<Option<String>, CoreError> {
        Ok(self.read().await?.server_id)
    }

    pub async fn get_session_id(&self) -> Result<Option<String>, CoreError> {
        Ok(self.read().await?.session_id)
    }

    pub async fn state(&self) -> Result<SessionState, CoreError> {
        Ok(self.read().await?.state)
    }

    /// `checkState()` / the self-heal probe reused by `send()`'s
    /// no-subscriber path. Probes the owning gateway on the liveness
    /// topic; if nothing answers within `state_check_timeout`, the
    /// session transitions to `offline`.
    pub async fn check_state(&self) -> Result<SessionState, CoreError> {
        let record = self.read().await?;
        if record.state != SessionState::Online {
            return Ok(record.state);
        }
        let Some(server_id) = record.server_id.clone() else {
            return Ok(record.state);
        };
        let acks = self.probe_liveness(&server_id).await?;
        if acks == 0 {
            self.offline().await?;
            return Ok(SessionState::Offline);
        }
        Ok(SessionState::Online)
    }

    /// Publishes to `device:alive:check:{serverId}` and returns the
    /// subscriber ack count within `state_check_timeout`. Shared by
    /// `check_state` and `send()`'s self-heal path so the two call sites
    /// cannot drift.
    pub async fn probe_liveness(&self, server_id: &str) -> Result<usize, CoreError> {
        let topic = devicemesh_coordination::keys::alive_check_topic(server_id);
        tokio::time::timeout(self.state_check_timeout, self.store.topic_publish(&topic, Vec::new()))
            .await
            .unwrap_or(Ok(0))
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
