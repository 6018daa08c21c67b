// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Device Registry: CRUD, lookup, and lifecycle for devices, binding
//! them to products and producing per-device [`DeviceOperation`] handles.

use std::sync::{Arc, RwLock};

use devicemesh_common::error::{CoreError, CoreErrorCode};
use devicemesh_common::ids::{DeviceId, ProductId};
use devicemesh_coordination::CoordinationClient;
use serde::{Deserialize, Serialize};

use crate::config_store::{ConfigStore, InheritingConfigStore, Scope};
use crate::interceptor::Interceptor;
use crate::metadata::FunctionMetadataResolver;
use crate::product::ProductRegistry;
use crate::sender::MessageSender;
use crate::session::SessionHandle;

/// `{id, productId, productName, protocol override?, creatorId,
/// projectId, type, ...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub id: DeviceId,
    pub product_id: ProductId,
    pub product_name: String,
    #[serde(default)]
    pub protocol_override: Option<String>,
    pub creator_id: String,
    pub project_id: String,
    #[serde(rename = "type")]
    pub device_type: String,
}

/// Context shared by every [`DeviceOperation`] and [`MessageSender`]
/// produced by a [`DeviceRegistry`]: the coordination client, the config,
/// the interceptor chain, and the function metadata resolver. Cheap to
/// clone (an `Arc` bundle), so `MessageSender` holds an owned copy rather
/// than a reference back to its `DeviceOperation` — there is no cycle to
/// break with a weak reference since neither side owns the other.
#[derive(Clone)]
pub struct RegistryContext {
    pub store: Arc<dyn CoordinationClient>,
    pub config: devicemesh_common::config::CoreConfig,
    pub interceptors: Arc<RwLock<Vec<Arc<dyn Interceptor>>>>,
    pub metadata: Arc<dyn FunctionMetadataResolver>,
}

impl RegistryContext {
    /// A read-only snapshot of the interceptor chain, safe to hold across
    /// an `.await` without racing concurrent registrations.
    pub fn interceptor_snapshot(&self) -> Vec<Arc<dyn Interceptor>> {
        self.interceptors.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// A handle to a single device, as returned by [`DeviceRegistry::
/// register`] / [`DeviceRegistry::get_device`]. Always constructible,
/// even for an id that was never registered.
pub struct DeviceOperation {
    ctx: RegistryContext,
    products: Arc<ProductRegistry>,
    id: DeviceId,
}

impl DeviceOperation {
    fn new(ctx: RegistryContext, products: Arc<ProductRegistry>, id: DeviceId) -> Self {
        Self { ctx, products, id }
    }

    pub fn id(&self) -> &DeviceId {
        &self.id
    }

    pub async fn info(&self) -> Result<Option<DeviceInfo>, CoreError> {
        let Some(bytes) = self.ctx.store.bucket_get(&devicemesh_coordination::keys::device_info(&self.id)).await?
        else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes).map(Some).map_err(|e| CoreError::new(CoreErrorCode::SystemError, e.to_string()))
    }

    /// Resolves the owning product, failing `PRODUCT_NOT_FOUND` if the
    /// device record is missing or its `productId` does not resolve.
    async fn require_info(&self) -> Result<DeviceInfo, CoreError> {
        self.info().await?.ok_or_else(|| CoreError::new(CoreErrorCode::DeviceNotFound, self.id.to_string()))
    }

    pub fn session(&self) -> SessionHandle {
        SessionHandle::new(self.ctx.store.clone(), self.id.clone(), self.ctx.config.state_check_timeout())
    }

    /// `device.getAll`/`get`/`put` etc. compose this device's config
    /// store with its product's, device shadowing product. Unlike
    /// `sender()`, this never fails `DEVICE_NOT_FOUND` for an
    /// unregistered id — config puts/gets are plain per-id map
    /// operations; only the product-inheritance side needs a resolved
    /// `productId`, and it degrades to device-only reads when there
    /// isn't one.
    pub async fn config_store(&self) -> Result<InheritingConfigStore, CoreError> {
        let product = match self.info().await? {
            Some(info) => Some(ConfigStore::new(self.ctx.store.clone(), Scope::Product, info.product_id.as_str())),
            None => None,
        };
        Ok(InheritingConfigStore { device: ConfigStore::new(self.ctx.store.clone(), Scope::Device, self.id.as_str()), product })
    }

    pub fn product_handle(&self, product_id: ProductId) -> crate::product::ProductHandle {
        self.products.get_product(product_id)
    }

    /// Builds this device's [`MessageSender`], lazily. Fails
    /// `DEVICE_NOT_FOUND` for an id that was never registered,
    /// since every fluent builder needs the device's `productId` to
    /// resolve function metadata.
    pub async fn sender(&self) -> Result<MessageSender, CoreError> {
        let info = self.require_info().await?;
        Ok(MessageSender::new(self.ctx.clone(), info, self.session()))
    }
}

/// Owns the shared coordination client, config, interceptor chain, and
/// metadata resolver, producing [`DeviceOperation`] handles on demand.
pub struct DeviceRegistry {
    ctx: RegistryContext,
    products: Arc<ProductRegistry>,
}

impl DeviceRegistry {
    pub fn new(
        store: Arc<dyn CoordinationClient>,
        config: devicemesh_common::config::CoreConfig,
        products: Arc<ProductRegistry>,
        metadata: Arc<dyn FunctionMetadataResolver>,
    ) -> Self {
        Self {
            ctx: RegistryContext { store, config, interceptors: Arc::new(RwLock::new(Vec::new())), metadata },
            products,
        }
    }

    /// `addInterceptor(i)`: appended to the chain applied to every sender
    /// produced by this registry.
    pub fn add_interceptor(&self, interceptor: Arc<dyn Interceptor>) {
        self.ctx.interceptors.write().unwrap_or_else(|e| e.into_inner()).push(interceptor);
    }

    /// `register(info) → DeviceOperation`: persists the record, creates
    /// an initial `offline` session state (preserved on re-register),
    /// and returns a handle.
    pub async fn register(&self, info: DeviceInfo) -> Result<DeviceOperation, CoreError> {
        let id = info.id.clone();
        let bytes = serde_json::to_vec(&info).map_err(|e| CoreError::new(CoreErrorCode::IllegalArgument, e.to_string()))?;
        self.ctx.store.bucket_set(&devicemesh_coordination::keys::device_info(&id), bytes, None).await?;

        let op = DeviceOperation::new(self.ctx.clone(), self.products.clone(), id.clone());
        op.session().ensure_initialized().await?;
        Ok(op)
    }

    /// `getDevice(id) → DeviceOperation`: always returns a handle.
    pub fn get_device(&self, id: DeviceId) -> DeviceOperation {
        DeviceOperation::new(self.ctx.clone(), self.products.clone(), id)
    }

    /// `unregister(id)`: deletes the record, session state, and all
    /// device-scoped config.
    pub async fn unregister(&self, id: DeviceId) -> Result<(), CoreError> {
        self.ctx.store.bucket_delete(&devicemesh_coordination::keys::device_info(&id)).await?;
        let op = self.get_device(id.clone());
        op.session().reset_to_unknown().await?;
        ConfigStore::new(self.ctx.store.clone(), Scope::Device, id.as_str()).clear().await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "device_tests.rs"]
mod tests;
