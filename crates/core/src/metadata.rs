// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Function metadata resolution for `FunctionInvokeBuilder::validate`.
//! The concrete protocol resolver (`DeviceMetadata`) is an external
//! collaborator out of scope here; this module defines the seam
//! (`FunctionMetadataResolver`) production wiring implements, plus the
//! minimal structs needed to exercise `validate()` against it.

use async_trait::async_trait;
use devicemesh_common::error::CoreError;
use devicemesh_common::ids::ProductId;

/// Describes one parameter of a device function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterMetadata {
    pub name: String,
    pub required: bool,
}

/// Describes a single invocable device function, as resolved from a
/// product's protocol definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionMetadata {
    pub name: String,
    pub parameters: Vec<ParameterMetadata>,
}

impl FunctionMetadata {
    pub fn parameter(&self, name: &str) -> Option<&ParameterMetadata> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

/// The seam `FunctionInvokeBuilder::validate` resolves function metadata
/// through. Production wiring supplies an implementation backed by the
/// product's `ProtocolSupport`; tests use a static lookup table.
#[async_trait]
pub trait FunctionMetadataResolver: Send + Sync {
    /// Look up `function` for `product_id`, or `None` if the product
    /// defines no such function.
    async fn resolve(
        &self,
        product_id: &ProductId,
        function: &str,
    ) -> Result<Option<FunctionMetadata>, CoreError>;
}

#[cfg(test)]
#[path = "metadata_tests.rs"]
mod tests;
