// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

/// Configuration recognized by the core. An external bootstrap binary
/// (out of scope here) flattens this into its own `clap::Parser`; tests
/// and library embedders construct it directly with
/// [`CoreConfig::testing`] or `clap::Parser::parse_from`.
#[derive(Debug, Clone, clap::Args)]
pub struct CoreConfig {
    /// Default reply timeout, in seconds (`device.message.await.max-seconds`).
    #[arg(long = "max-await-secs", default_value_t = 30, env = "DEVMESH_MAX_AWAIT_SECS")]
    pub max_await_secs: u64,

    /// Liveness probe window, in milliseconds (`device.state.check-timeout-ms`).
    #[arg(
        long = "state-check-timeout-ms",
        default_value_t = 2000,
        env = "DEVMESH_STATE_CHECK_TIMEOUT_MS"
    )]
    pub state_check_timeout_ms: u64,

    /// Extra TTL seconds over `max_await_secs`
    /// (`device.message.reply.ttl-padding-seconds`).
    #[arg(
        long = "reply-ttl-padding-secs",
        default_value_t = 10,
        env = "DEVMESH_REPLY_TTL_PADDING_SECS"
    )]
    pub reply_ttl_padding_secs: u64,

    /// Connection string for the coordination backend.
    #[arg(long = "redis-url", default_value = "redis://127.0.0.1/", env = "DEVMESH_REDIS_URL")]
    pub redis_url: String,
}

impl CoreConfig {
    /// A config with documented defaults, for tests and library embedders
    /// that do not parse CLI args.
    pub fn testing() -> Self {
        Self {
            max_await_secs: 30,
            state_check_timeout_ms: 2000,
            reply_ttl_padding_secs: 10,
            redis_url: "redis://127.0.0.1/".to_owned(),
        }
    }

    pub fn max_await(&self) -> Duration {
        Duration::from_secs(self.max_await_secs)
    }

    pub fn state_check_timeout(&self) -> Duration {
        Duration::from_millis(self.state_check_timeout_ms)
    }

    /// Reply bucket / semaphore TTL: `maxAwaitSeconds + reply_ttl_padding_secs`.
    pub fn reply_ttl(&self) -> Duration {
        self.reply_ttl_for(self.max_await())
    }

    /// Reply bucket / semaphore TTL for a caller-supplied `max_await`,
    /// keeping the same padding as [`CoreConfig::reply_ttl`].
    pub fn reply_ttl_for(&self, max_await: Duration) -> Duration {
        max_await + Duration::from_secs(self.reply_ttl_padding_secs)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
