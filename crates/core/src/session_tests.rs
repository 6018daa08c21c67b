// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Duration;

use devicemesh_coordination::InMemoryCoordinationClient;

use super::*;

fn handle(store: Arc<dyn CoordinationClient>, id: &str) -> SessionHandle {
    SessionHandle::new(store, DeviceId::from(id), Duration::from_millis(200))
}

#[tokio::test]
async fn unregistered_device_state_is_unknown() {
    let store: Arc<dyn CoordinationClient> = Arc::new(InMemoryCoordinationClient::new());
    let h = handle(store, "d1");
    assert_eq!(h.state().await.unwrap(), SessionState::Unknown);
}

#[tokio::test]
async fn ensure_initialized_sets_offline_once() {
    let store: Arc<dyn CoordinationClient> = Arc::new(InMemoryCoordinationClient::new());
    let h = handle(store, "d1");
    h.ensure_initialized().await.unwrap();
    assert_eq!(h.state().await.unwrap(), SessionState::Offline);

    h.online("srv1".to_owned(), "ses1".to_owned(), 1).await.unwrap();
    h.ensure_initialized().await.unwrap();
    assert_eq!(h.state().await.unwrap(), SessionState::Online);
}

#[tokio::test]
async fn online_sets_server_and_session_id_atomically() {
    let store: Arc<dyn CoordinationClient> = Arc::new(InMemoryCoordinationClient::new());
    let h = handle(store, "d2");
    h.online("srv1".to_owned(), "ses1".to_owned(), 42).await.unwrap();
    assert!(h.is_online().await.unwrap());
    assert_eq!(h.get_server_id().await.unwrap(), Some("srv1".to_owned()));
    assert_eq!(h.get_session_id().await.unwrap(), Some("ses1".to_owned()));
}

#[tokio::test]
async fn offline_clears_server_and_session_id() {
    let store: Arc<dyn CoordinationClient> = Arc::new(InMemoryCoordinationClient::new());
    let h = handle(store, "d2");
    h.online("srv1".to_owned(), "ses1".to_owned(), 42).await.unwrap();
    h.offline().await.unwrap();
    assert!(!h.is_online().await.unwrap());
    assert_eq!(h.get_server_id().await.unwrap(), None);
    assert_eq!(h.get_session_id().await.unwrap(), None);
}

#[tokio::test]
async fn reset_to_unknown_drops_the_record_entirely() {
    let store: Arc<dyn CoordinationClient> = Arc::new(InMemoryCoordinationClient::new());
    let h = handle(store, "d2");
    h.online("srv1".to_owned(), "ses1".to_owned(), 42).await.unwrap();
    h.reset_to_unknown().await.unwrap();
    assert_eq!(h.state().await.unwrap(), SessionState::Unknown);
}

#[tokio::test]
async fn check_state_on_offline_device_is_a_no_op() {
    let store: Arc<dyn CoordinationClient> = Arc::new(InMemoryCoordinationClient::new());
    let h = handle(store, "d3");
    h.ensure_initialized().await.unwrap();
    assert_eq!(h.check_state().await.unwrap(), SessionState::Offline);
}

#[tokio::test]
async fn check_state_self_heals_when_no_one_subscribes_to_the_stale_gateway() {
    let store: Arc<dyn CoordinationClient> = Arc::new(InMemoryCoordinationClient::new());
    let h = handle(store, "d4");
    h.online("srv-dead".to_owned(), "ses1".to_owned(), 1).await.unwrap();

    let result = h.check_state().await.unwrap();
    assert_eq!(result, SessionState::Offline);
    assert!(!h.is_online().await.unwrap());
}

#[tokio::test]
async fn check_state_stays_online_when_the_gateway_answers() {
    let store: Arc<dyn CoordinationClient> = Arc::new(InMemoryCoordinationClient::new());
    let h = handle(store.clone(), "d5");
    h.online("srv1".to_owned(), "ses1".to_owned(), 1).await.unwrap();

    let topic = devicemesh_coordination::keys::alive_check_topic("srv1");
    let _subscription = store.topic_subscribe(&topic).await.unwrap();

    let result = h.check_state().await.unwrap();
    assert_eq!(result, SessionState::Online);
}
