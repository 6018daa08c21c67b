// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test harness for end-to-end scenarios.
//!
//! There is no bootstrap binary in this workspace (CLI/bootstrap is an
//! external collaborator), so "end-to-end" here means: a
//! [`devicemesh_core::DeviceRegistry`] on one simulated node and a
//! [`devicemesh_core::MessageHandler`] on another, both talking through a
//! single shared [`InMemoryCoordinationClient`] exactly as two real
//! processes would talk through a shared Redis — the cross-node
//! rendezvous is exercised for real, only the transport is in-process.

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use devicemesh_common::config::CoreConfig;
use devicemesh_common::ids::ProductId;
use devicemesh_coordination::{CoordinationClient, InMemoryCoordinationClient};
use devicemesh_core::{DeviceRegistry, FunctionMetadata, FunctionMetadataResolver, ProductRegistry, ProtocolSupport};

/// A `ProtocolSupport` that resolves nothing; these scenarios never call
/// `getProtocol()`, so any resolution attempt is a test bug.
pub struct NoProtocols;

#[async_trait]
impl ProtocolSupport for NoProtocols {
    async fn resolve(&self, _protocol: &str) -> Option<Arc<dyn Any + Send + Sync>> {
        None
    }
}

/// A function metadata table fixed at construction, for `validate()` and
/// for sends that never call it.
pub struct StaticFunctions(Vec<(ProductId, FunctionMetadata)>);

impl StaticFunctions {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn with(mut self, product_id: &str, meta: FunctionMetadata) -> Self {
        self.0.push((ProductId::from(product_id), meta));
        self
    }
}

impl Default for StaticFunctions {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FunctionMetadataResolver for StaticFunctions {
    async fn resolve(
        &self,
        product_id: &ProductId,
        function: &str,
    ) -> Result<Option<FunctionMetadata>, devicemesh_common::error::CoreError> {
        Ok(self
            .0
            .iter()
            .find(|(p, m)| p == product_id && m.name == function)
            .map(|(_, m)| m.clone()))
    }
}

/// A fully-wired "node": shares `store` with every other node constructed
/// against the same `InMemoryCoordinationClient`, exactly as two
/// processes share one Redis deployment.
pub struct Node {
    pub store: Arc<dyn CoordinationClient>,
    pub products: Arc<ProductRegistry>,
    pub devices: DeviceRegistry,
}

impl Node {
    /// Build a node against a shared store, with a given reply-timeout
    /// config. `functions` supplies the function metadata resolved by
    /// `validate()`.
    pub fn new(store: Arc<dyn CoordinationClient>, config: CoreConfig, functions: Arc<dyn FunctionMetadataResolver>) -> Self {
        let products = Arc::new(ProductRegistry::new(store.clone(), Arc::new(NoProtocols)));
        let devices = DeviceRegistry::new(store.clone(), config, products.clone(), functions);
        Self { store, products, devices }
    }

    /// Convenience: a node with default config and no function metadata
    /// (offline/timeout/self-heal scenarios never call `validate()`).
    pub fn with_defaults(store: Arc<dyn CoordinationClient>) -> Self {
        Self::new(store, CoreConfig::testing(), Arc::new(StaticFunctions::new()))
    }
}

/// A fresh shared store, the way a test would stand up a Redis instance
/// for an integration run.
pub fn shared_store() -> Arc<dyn CoordinationClient> {
    Arc::new(InMemoryCoordinationClient::new())
}
