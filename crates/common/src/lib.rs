// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared types for the device registry and message-dispatch plane:
//! identifiers, the wire envelope, error taxonomy, and recognized
//! configuration. Every other crate in this workspace builds on these.

pub mod config;
pub mod error;
pub mod ids;
pub mod message;

pub use config::CoreConfig;
pub use error::{CoreError, CoreErrorCode};
pub use ids::{DeviceId, MessageId, ProductId};
pub use message::{ConfigValue, MessageEnvelope, MessageKind, RawReply};
