// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

#[test]
fn config_value_rejects_null() {
    let err = ConfigValue::new(Value::Null).unwrap_err();
    assert_eq!(err.code(), CoreErrorCode::IllegalArgument);
}

#[test]
fn config_value_accepts_non_null_scalars_and_objects() {
    assert!(ConfigValue::new(json!(42)).is_ok());
    assert!(ConfigValue::new(json!("hello")).is_ok());
    assert!(ConfigValue::new(json!({"a": 1})).is_ok());
}

#[test]
fn envelope_new_generates_a_fresh_message_id() {
    let a = MessageEnvelope::new(DeviceId::from("d1"), MessageKind::Function, 0);
    let b = MessageEnvelope::new(DeviceId::from("d1"), MessageKind::Function, 0);
    assert_ne!(a.message_id, b.message_id);
}

#[test]
fn envelope_round_trips_through_json() {
    let mut env = MessageEnvelope::new(DeviceId::from("d1"), MessageKind::ReadProperty, 1000);
    env.body = json!({"property": "temperature"});
    let raw = serde_json::to_string(&env).unwrap();
    let parsed: MessageEnvelope = serde_json::from_str(&raw).unwrap();
    assert_eq!(parsed.message_id, env.message_id);
    assert_eq!(parsed.device_id, env.device_id);
    assert_eq!(parsed.body, env.body);
}
