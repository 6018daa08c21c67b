// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Product Registry: CRUD and config for product definitions, plus
//! protocol resolution through the external `ProtocolSupport`
//! collaborator.

use std::sync::Arc;

use async_trait::async_trait;
use devicemesh_common::error::{CoreError, CoreErrorCode};
use devicemesh_common::ids::ProductId;
use devicemesh_coordination::CoordinationClient;
use serde::{Deserialize, Serialize};

use crate::config_store::{ConfigStore, Scope};

/// `{id, name, projectId, protocol, ...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductInfo {
    pub id: ProductId,
    pub name: String,
    pub project_id: String,
    pub protocol: String,
}

/// Resolves a product's protocol implementation. External collaborator;
/// production wiring supplies the real protocol catalog.
#[async_trait]
pub trait ProtocolSupport: Send + Sync {
    async fn resolve(&self, protocol: &str) -> Option<Arc<dyn std::any::Any + Send + Sync>>;
}

/// A handle to a single product, as returned by
/// [`ProductRegistry::get_product`].
pub struct ProductHandle {
    store: Arc<dyn CoordinationClient>,
    protocols: Arc<dyn ProtocolSupport>,
    id: ProductId,
}

impl ProductHandle {
    /// `update(info)`: overwrites the product record wholesale.
    pub async fn update(&self, info: ProductInfo) -> Result<(), CoreError> {
        let bytes = serde_json::to_vec(&info)
            .map_err(|e| CoreError::new(CoreErrorCode::IllegalArgument, e.to_string()))?;
        self.store.bucket_set(&devicemesh_coordination::keys::product_info(&self.id), bytes, None).await
    }

    pub async fn get(&self) -> Result<Option<ProductInfo>, CoreError> {
        let Some(bytes) = self.store.bucket_get(&devicemesh_coordination::keys::product_info(&self.id)).await?
        else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| CoreError::new(CoreErrorCode::SystemError, e.to_string()))
    }

    /// `getProtocol()`: resolves via the external `ProtocolSupport`
    /// collaborator; fails `PROTOCOL_NOT_FOUND` if absent.
    pub async fn get_protocol(&self) -> Result<Arc<dyn std::any::Any + Send + Sync>, CoreError> {
        let info = self
            .get()
            .await?
            .ok_or_else(|| CoreError::new(CoreErrorCode::ProductNotFound, self.id.to_string()))?;
        self.protocols
            .resolve(&info.protocol)
            .await
            .ok_or_else(|| CoreError::new(CoreErrorCode::ProtocolNotFound, info.protocol))
    }

    pub fn config_store(&self) -> ConfigStore {
        ConfigStore::new(self.store.clone(), Scope::Product, self.id.as_str())
    }
}

/// Owns the shared coordination client and protocol resolver, producing
/// [`ProductHandle`]s on demand.
pub struct ProductRegistry {
    store: Arc<dyn CoordinationClient>,
    protocols: Arc<dyn ProtocolSupport>,
}

impl ProductRegistry {
    pub fn new(store: Arc<dyn CoordinationClient>, protocols: Arc<dyn ProtocolSupport>) -> Self {
        Self { store, protocols }
    }

    /// `getProduct(id)`: always returns a handle, whether or not the
    /// product has been registered yet (mirrors `DeviceRegistry::
    /// get_device`'s always-a-handle behavior).
    pub fn get_product(&self, id: ProductId) -> ProductHandle {
        ProductHandle { store: self.store.clone(), protocols: self.protocols.clone(), id }
    }
}

#[cfg(test)]
#[path = "product_tests.rs"]
mod tests;
