// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn generate_produces_unique_ids() {
    let a = MessageId::generate();
    let b = MessageId::generate();
    assert_ne!(a, b);
}

#[test]
fn display_round_trips_the_raw_string() {
    let id = DeviceId::from("d1");
    assert_eq!(id.to_string(), "d1");
    assert_eq!(id.as_str(), "d1");
}

#[test]
fn ids_are_usable_as_map_keys() {
    let mut map = std::collections::HashMap::new();
    map.insert(ProductId::from("p1"), 42);
    assert_eq!(map.get(&ProductId::from("p1")), Some(&42));
}
