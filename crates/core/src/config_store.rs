// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Config Store: a per-entity key-value map, keyed at
//! `device:cfg:{id}` or `product:cfg:{id}`, with product-to-device
//! inheritance composed one level up in
//! [`crate::device::DeviceOperation::config_store`].

use std::collections::HashMap;
use std::sync::Arc;

use devicemesh_common::error::CoreError;
use devicemesh_common::message::ConfigValue;
use devicemesh_coordination::CoordinationClient;

/// Which entity kind a [`ConfigStore`] is scoped to. Only used to pick the
/// right key builder; the read/write logic is identical either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Product,
    Device,
}

/// A single entity's config map, backed by `map(key)` on the coordination
/// client.
pub struct ConfigStore {
    store: Arc<dyn CoordinationClient>,
    key: String,
}

impl ConfigStore {
    pub fn new(store: Arc<dyn CoordinationClient>, scope: Scope, entity_id: &str) -> Self {
        let key = match scope {
            Scope::Product => devicemesh_coordination::keys::product_cfg(&entity_id.into()),
            Scope::Device => devicemesh_coordination::keys::device_cfg(&entity_id.into()),
        };
        Self { store, key }
    }

    /// `put(k, v)`: rejects `v == null` with `ILLEGAL_ARGUMENT` (enforced
    /// by [`ConfigValue::new`] at the call site before this is reached).
    pub async fn put(&self, k: &str, v: ConfigValue) -> Result<(), CoreError> {
        let bytes = serde_json::to_vec(v.as_value())
            .map_err(|e| CoreError::new(devicemesh_common::error::CoreErrorCode::IllegalArgument, e.to_string()))?;
        self.store.map_put(&self.key, k, bytes).await
    }

    /// `putAll(m)`: per-entry writes, not atomic. `None` or an empty map
    /// is a no-op, never an error.
    pub async fn put_all(&self, entries: Option<HashMap<String, ConfigValue>>) -> Result<(), CoreError> {
        let Some(entries) = entries else { return Ok(()) };
        for (k, v) in entries {
            self.put(&k, v).await?;
        }
        Ok(())
    }

    pub async fn get(&self, k: &str) -> Result<Option<ConfigValue>, CoreError> {
        let Some(bytes) = self.store.map_get(&self.key, k).await? else { return Ok(None) };
        decode(&bytes)
    }

    /// `getAll()` with no arguments: the full snapshot for this entity
    /// alone (inheritance is composed by the caller, see
    /// [`crate::device::DeviceOperation::config_store`]).
    pub async fn get_all(&self) -> Result<HashMap<String, ConfigValue>, CoreError> {
        let raw = self.store.map_get_all(&self.key).await?;
        let mut out = HashMap::with_capacity(raw.len());
        for (k, bytes) in raw {
            if let Some(v) = decode(&bytes)? {
                out.insert(k, v);
            }
        }
        Ok(out)
    }

    /// `remove(k)`: returns the prior value, or `None` if it was unset.
    pub async fn remove(&self, k: &str) -> Result<Option<ConfigValue>, CoreError> {
        let Some(bytes) = self.store.map_remove(&self.key, k).await? else { return Ok(None) };
        decode(&bytes)
    }

    pub async fn clear(&self) -> Result<(), CoreError> {
        self.store.map_delete(&self.key).await
    }
}

fn decode(bytes: &[u8]) -> Result<Option<ConfigValue>, CoreError> {
    let value: serde_json::Value = serde_json::from_slice(bytes)
        .map_err(|e| CoreError::new(devicemesh_common::error::CoreErrorCode::SystemError, e.to_string()))?;
    Ok(Some(ConfigValue::try_from(value)?))
}

/// Composes a device-level store over its product-level store: device
/// shadows product, never a field-level merge of a single key's value.
/// `product` is `None` when the device id has no resolvable `productId`
/// (an unregistered device) — reads then fall back to the device's own
/// values only, and writes are unaffected either way.
pub struct InheritingConfigStore {
    pub device: ConfigStore,
    pub product: Option<ConfigStore>,
}

impl InheritingConfigStore {
    /// `device.get(k)`: device value if present, otherwise product value.
    pub async fn get(&self, k: &str) -> Result<Option<ConfigValue>, CoreError> {
        if let Some(v) = self.device.get(k).await? {
            return Ok(Some(v));
        }
        match &self.product {
            Some(product) => product.get(k).await,
            None => Ok(None),
        }
    }

    /// `device.getAll(keys…)`: composes keys from both scopes with device
    /// shadowing product; keys present in neither are omitted.
    pub async fn get_many(&self, keys: &[&str]) -> Result<HashMap<String, ConfigValue>, CoreError> {
        let mut out = HashMap::with_capacity(keys.len());
        for &k in keys {
            if let Some(v) = self.get(k).await? {
                out.insert(k.to_owned(), v);
            }
        }
        Ok(out)
    }

    /// `device.getAll()` (no args): the merged snapshot, device shadowing
    /// product.
    pub async fn get_all(&self) -> Result<HashMap<String, ConfigValue>, CoreError> {
        let mut merged = match &self.product {
            Some(product) => product.get_all().await?,
            None => HashMap::new(),
        };
        merged.extend(self.device.get_all().await?);
        Ok(merged)
    }
}

#[cfg(test)]
#[path = "config_store_tests.rs"]
mod tests;
