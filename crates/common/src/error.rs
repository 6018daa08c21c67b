// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

/// Error kinds surfaced across the registry, config store, and dispatch
/// core. Some are carried as a reply field (`CLIENT_OFFLINE`, `NO_REPLY`,
/// `UNSUPPORTED_MESSAGE`, `SYSTEM_ERROR`) and never appear as `Err`; the
/// rest propagate through `Result` via [`CoreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum CoreErrorCode {
    ClientOffline,
    NoReply,
    UnsupportedMessage,
    SystemError,
    FunctionUndefined,
    ParameterUndefined,
    IllegalArgument,
    ProductNotFound,
    ProtocolNotFound,
    DeviceNotFound,
    CoordinationError,
}

impl CoreErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClientOffline => "CLIENT_OFFLINE",
            Self::NoReply => "NO_REPLY",
            Self::UnsupportedMessage => "UNSUPPORTED_MESSAGE",
            Self::SystemError => "SYSTEM_ERROR",
            Self::FunctionUndefined => "FUNCTION_UNDEFINED",
            Self::ParameterUndefined => "PARAMETER_UNDEFINED",
            Self::IllegalArgument => "ILLEGAL_ARGUMENT",
            Self::ProductNotFound => "PRODUCT_NOT_FOUND",
            Self::ProtocolNotFound => "PROTOCOL_NOT_FOUND",
            Self::DeviceNotFound => "DEVICE_NOT_FOUND",
            Self::CoordinationError => "COORDINATION_ERROR",
        }
    }

    /// Whether this kind is ever surfaced through a reply's `.error(kind)`
    /// field rather than thrown as an exception at the call site.
    pub fn is_reply_kind(&self) -> bool {
        matches!(self, Self::ClientOffline | Self::NoReply | Self::UnsupportedMessage | Self::SystemError)
    }
}

impl fmt::Display for CoreErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed error for call sites that propagate failure via `Result` (the
/// validation builder, registry metadata lookups, and coordination
/// transport failures). Reply-carried kinds never construct this type.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("{code}: {message}")]
    Simple { code: CoreErrorCode, message: String },

    #[error("coordination backend error: {0}")]
    Coordination(#[source] anyhow::Error),
}

impl CoreError {
    pub fn new(code: CoreErrorCode, message: impl Into<String>) -> Self {
        Self::Simple { code, message: message.into() }
    }

    pub fn coordination(err: impl Into<anyhow::Error>) -> Self {
        Self::Coordination(err.into())
    }

    pub fn code(&self) -> CoreErrorCode {
        match self {
            Self::Simple { code, .. } => *code,
            Self::Coordination(_) => CoreErrorCode::CoordinationError,
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
