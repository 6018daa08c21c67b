// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn testing_defaults_match_the_documented_cli_defaults() {
    let cfg = CoreConfig::testing();
    assert_eq!(cfg.max_await_secs, 30);
    assert_eq!(cfg.state_check_timeout_ms, 2000);
    assert_eq!(cfg.reply_ttl_padding_secs, 10);
}

#[test]
fn reply_ttl_is_max_await_plus_padding() {
    let mut cfg = CoreConfig::testing();
    cfg.max_await_secs = 5;
    cfg.reply_ttl_padding_secs = 2;
    assert_eq!(cfg.reply_ttl(), Duration::from_secs(7));
    assert_eq!(cfg.max_await(), Duration::from_secs(5));
}

#[test]
fn reply_ttl_for_keeps_the_same_padding_as_the_configured_default() {
    let mut cfg = CoreConfig::testing();
    cfg.max_await_secs = 30;
    cfg.reply_ttl_padding_secs = 2;
    assert_eq!(cfg.reply_ttl_for(Duration::from_secs(1)), Duration::from_secs(3));
}
