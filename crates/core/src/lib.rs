// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The registry and dispatch core of the device mesh: the config store,
//! product registry, device registry, device session state machine,
//! message sender, and message handler. Everything here talks to the
//! shared coordination store only through
//! `devicemesh_coordination::CoordinationClient` — never to a concrete
//! backend directly.

pub mod config_store;
pub mod device;
pub mod handler;
pub mod interceptor;
pub mod metadata;
pub mod product;
pub mod reply;
pub mod sender;
pub mod session;

pub use config_store::{ConfigStore, InheritingConfigStore, Scope};
pub use device::{DeviceInfo, DeviceOperation, DeviceRegistry, RegistryContext};
pub use handler::{MessageHandler, ReplyMessage};
pub use interceptor::{run_after_reply, run_pre_send, Interceptor};
pub use metadata::{FunctionMetadata, FunctionMetadataResolver, ParameterMetadata};
pub use product::{ProductHandle, ProductInfo, ProductRegistry, ProtocolSupport};
pub use reply::{convert_reply, finalize_reply, Reply, ReplyEnvelope};
pub use sender::{FunctionInvokeBuilder, MessageSender, ReadPropertyBuilder, WritePropertyBuilder};
pub use session::{SessionHandle, SessionState};
