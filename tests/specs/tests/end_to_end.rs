// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Six end-to-end scenarios, each run across two in-process "nodes"
//! sharing one coordination store — a caller-side device registry and a
//! gateway-side [`MessageHandler`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use devicemesh_common::config::CoreConfig;
use devicemesh_common::error::{CoreError, CoreErrorCode};
use devicemesh_common::ids::DeviceId;
use devicemesh_common::message::{MessageEnvelope, RawReply};
use devicemesh_coordination::CoordinationClient;
use devicemesh_core::{
    DeviceInfo, FunctionMetadata, Interceptor, MessageHandler, ParameterMetadata, Reply, ReplyEnvelope, ReplyMessage,
};
use devicemesh_specs::{shared_store, Node, StaticFunctions};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize, PartialEq)]
struct InvokeResult {
    success: bool,
    message: String,
}

fn device_info(id: &str, product_id: &str) -> DeviceInfo {
    DeviceInfo {
        id: DeviceId::from(id),
        product_id: devicemesh_common::ids::ProductId::from(product_id),
        product_name: "widget".to_owned(),
        protocol_override: None,
        creator_id: "user1".to_owned(),
        project_id: "proj1".to_owned(),
        device_type: "sensor".to_owned(),
    }
}

#[tokio::test]
async fn happy_path_function_invoke() {
    let store = shared_store();
    let caller = Node::with_defaults(store.clone());
    caller.devices.register(device_info("d1", "p1")).await.unwrap();
    let op = caller.devices.get_device(DeviceId::from("d1"));
    op.session().online("srv1".to_owned(), "ses1".to_owned(), 1).await.unwrap();

    // Gateway side: a handler subscribed on srv1 that replies "ok".
    let gateway = MessageHandler::new(store.clone(), "srv1", Duration::from_secs(40));
    gateway
        .handle_message(DeviceId::from("d1"), {
            let gateway = gateway.clone();
            move |msg: MessageEnvelope| {
                let gateway = gateway.clone();
                async move {
                    let reply = ReplyMessage {
                        message_id: msg.message_id,
                        raw: RawReply::Typed(json!({"success": true, "message": "ok"})),
                    };
                    gateway.reply(reply).await.unwrap();
                }
            }
        })
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    let sender = op.sender().await.unwrap();
    let builder = sender.invoke_function("test").arg("x", json!(1));
    let request_id = builder.message_id_of().clone();
    let reply: Reply<InvokeResult> =
        tokio::time::timeout(Duration::from_secs(1), builder.send()).await.unwrap().unwrap();

    assert!(reply.is_success());
    assert_eq!(reply.message_id, request_id);
    assert_eq!(reply.value.unwrap(), InvokeResult { success: true, message: "ok".to_owned() });
}

#[tokio::test]
async fn offline_send_is_fast_and_client_offline() {
    let store = shared_store();
    let caller = Node::with_defaults(store);
    caller.devices.register(device_info("d2", "p1")).await.unwrap();
    let op = caller.devices.get_device(DeviceId::from("d2"));
    let sender = op.sender().await.unwrap();

    let started = tokio::time::Instant::now();
    let reply: Reply<InvokeResult> = sender.invoke_function("test").arg("x", json!(1)).send().await.unwrap();
    assert_eq!(reply.error, Some(CoreErrorCode::ClientOffline));
    assert!(started.elapsed() < Duration::from_millis(200));
}

#[tokio::test]
async fn timeout_yields_no_reply_and_cleans_up() {
    let store = shared_store();
    let mut config = CoreConfig::testing();
    config.max_await_secs = 1;
    config.reply_ttl_padding_secs = 0;
    let caller = Node::new(store.clone(), config, Arc::new(StaticFunctions::new()));
    caller.devices.register(device_info("d3", "p1")).await.unwrap();
    let op = caller.devices.get_device(DeviceId::from("d3"));
    op.session().online("srvX".to_owned(), "ses1".to_owned(), 1).await.unwrap();

    // A gateway subscribes but never replies.
    let topic = devicemesh_coordination::keys::message_accept_topic("srvX");
    let _silent = store.topic_subscribe(&topic).await.unwrap();

    let sender = op.sender().await.unwrap();
    let reply: Reply<InvokeResult> =
        tokio::time::timeout(Duration::from_secs(2), sender.invoke_function("test").arg("x", json!(1)).send())
            .await
            .unwrap()
            .unwrap();
    assert_eq!(reply.error, Some(CoreErrorCode::NoReply));

    let sem_key = devicemesh_coordination::keys::reply_semaphore(&reply.message_id);
    assert!(!store.semaphore_exists(&sem_key).await.unwrap());
    let reply_bucket = devicemesh_coordination::keys::message_reply_bucket(&reply.message_id);
    assert!(store.bucket_get(&reply_bucket).await.unwrap().is_none());
}

#[tokio::test]
async fn stale_gateway_self_heals_to_offline() {
    let store = shared_store();
    let caller = Node::with_defaults(store);
    caller.devices.register(device_info("d4", "p1")).await.unwrap();
    let op = caller.devices.get_device(DeviceId::from("d4"));
    op.session().online("srv-dead".to_owned(), "ses1".to_owned(), 1).await.unwrap();

    let sender = op.sender().await.unwrap();
    let reply: Reply<InvokeResult> = sender.invoke_function("test").arg("x", json!(1)).send().await.unwrap();
    assert_eq!(reply.error, Some(CoreErrorCode::ClientOffline));
    assert!(!op.session().is_online().await.unwrap());
}

#[tokio::test]
async fn config_inheritance_composes_product_and_device_keys() {
    let store = shared_store();
    let caller = Node::with_defaults(store);
    let op = caller.devices.register(device_info("d5", "p")).await.unwrap();

    let product_handle = op.product_handle(devicemesh_common::ids::ProductId::from("p"));
    product_handle
        .config_store()
        .put("k1", devicemesh_common::message::ConfigValue::new(json!("a")).unwrap())
        .await
        .unwrap();

    let cfg = op.config_store().await.unwrap();
    cfg.device.put("k2", devicemesh_common::message::ConfigValue::new(json!("b")).unwrap()).await.unwrap();

    let merged = cfg.get_many(&["k1", "k2", "k3"]).await.unwrap();
    assert_eq!(merged.get("k1").unwrap().as_value(), &json!("a"));
    assert_eq!(merged.get("k2").unwrap().as_value(), &json!("b"));
    assert!(!merged.contains_key("k3"));
}

struct UppercaseMessage;

#[async_trait]
impl Interceptor for UppercaseMessage {
    async fn after_reply(&self, _message: &MessageEnvelope, reply: &mut ReplyEnvelope) -> Result<(), CoreError> {
        if let Some(s) = reply.payload.get("message").and_then(|v| v.as_str()) {
            let upper = s.to_uppercase();
            reply.payload["message"] = json!(upper);
        }
        Ok(())
    }
}

#[tokio::test]
async fn registered_interceptor_rewrites_the_reply() {
    let store = shared_store();
    let caller = Node::with_defaults(store.clone());
    caller.devices.add_interceptor(Arc::new(UppercaseMessage));
    caller.devices.register(device_info("d1", "p1")).await.unwrap();
    let op = caller.devices.get_device(DeviceId::from("d1"));
    op.session().online("srv1".to_owned(), "ses1".to_owned(), 1).await.unwrap();

    let gateway = MessageHandler::new(store.clone(), "srv1", Duration::from_secs(40));
    gateway
        .handle_message(DeviceId::from("d1"), {
            let gateway = gateway.clone();
            move |msg: MessageEnvelope| {
                let gateway = gateway.clone();
                async move {
                    let reply = ReplyMessage {
                        message_id: msg.message_id,
                        raw: RawReply::Typed(json!({"success": true, "message": "ok"})),
                    };
                    gateway.reply(reply).await.unwrap();
                }
            }
        })
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    let sender = op.sender().await.unwrap();
    let reply: Reply<InvokeResult> =
        tokio::time::timeout(Duration::from_secs(1), sender.invoke_function("test").arg("x", json!(1)).send())
            .await
            .unwrap()
            .unwrap();

    assert!(reply.is_success());
    assert_eq!(reply.value.unwrap().message, "OK");
}

#[tokio::test]
async fn validate_surfaces_function_metadata_errors_at_the_call_site() {
    let store = shared_store();
    let functions = Arc::new(
        StaticFunctions::new()
            .with("p1", FunctionMetadata { name: "test".to_owned(), parameters: vec![ParameterMetadata { name: "x".to_owned(), required: true }] }),
    );
    let caller = Node::new(store, CoreConfig::testing(), functions);
    caller.devices.register(device_info("d1", "p1")).await.unwrap();
    let op = caller.devices.get_device(DeviceId::from("d1"));
    let sender = op.sender().await.unwrap();

    let missing = sender.invoke_function("missing");
    assert_eq!(missing.validate(|_, _| {}).await.unwrap_err().code(), CoreErrorCode::FunctionUndefined);

    let wrong_arity = sender.invoke_function("test");
    assert_eq!(wrong_arity.validate(|_, _| {}).await.unwrap_err().code(), CoreErrorCode::IllegalArgument);

    let ok = sender.invoke_function("test").arg("x", json!(1));
    assert!(ok.validate(|_, _| {}).await.is_ok());
}
