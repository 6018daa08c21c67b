// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deterministic key builders for the shared-store key schema. Bit-exact
//! so peer nodes running any implementation of this core interoperate.

use devicemesh_common::{DeviceId, MessageId, ProductId};

pub fn device_info(id: &DeviceId) -> String {
    format!("device:info:{id}")
}

pub fn device_cfg(id: &DeviceId) -> String {
    format!("device:cfg:{id}")
}

pub fn product_info(id: &ProductId) -> String {
    format!("product:info:{id}")
}

pub fn product_cfg(id: &ProductId) -> String {
    format!("product:cfg:{id}")
}

pub fn device_state(id: &DeviceId) -> String {
    format!("device:state:{id}")
}

pub fn message_accept_topic(server_id: &str) -> String {
    format!("device:message:accept:{server_id}")
}

pub fn message_reply_bucket(message_id: &MessageId) -> String {
    format!("device:message:reply:{message_id}")
}

pub fn reply_semaphore(message_id: &MessageId) -> String {
    format!("device:reply:{message_id}")
}

pub fn alive_check_topic(server_id: &str) -> String {
    format!("device:alive:check:{server_id}")
}

#[cfg(test)]
#[path = "keys_tests.rs"]
mod tests;
