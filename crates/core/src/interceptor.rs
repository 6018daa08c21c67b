// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The interceptor chain: ordered `{preSend, afterReply}` hooks applied
//! uniformly to every outgoing message. The chain is append-only after
//! registry construction; every sender takes an owned snapshot
//! (`Vec<Arc<dyn Interceptor>>`) so concurrent registration never races a
//! send in progress.

use async_trait::async_trait;
use devicemesh_common::error::CoreError;
use devicemesh_common::message::MessageEnvelope;

use crate::reply::ReplyEnvelope;

/// A single hook in the chain. Both methods default to a no-op so
/// implementors only override what they need.
#[async_trait]
pub trait Interceptor: Send + Sync {
    /// Called before `send()` publishes the outgoing message; may rewrite
    /// it in place.
    async fn pre_send(&self, message: &mut MessageEnvelope) -> Result<(), CoreError> {
        let _ = message;
        Ok(())
    }

    /// Called after `convert_reply` has produced a reply, before the
    /// caller's future resolves. Operates on the reply's JSON payload,
    /// not yet deserialized into the caller's target type — see
    /// `reply.rs` for why.
    async fn after_reply(&self, message: &MessageEnvelope, reply: &mut ReplyEnvelope) -> Result<(), CoreError> {
        let _ = (message, reply);
        Ok(())
    }
}

/// Run every interceptor's `pre_send` in registration order.
pub async fn run_pre_send(
    chain: &[std::sync::Arc<dyn Interceptor>],
    message: &mut MessageEnvelope,
) -> Result<(), CoreError> {
    for interceptor in chain {
        interceptor.pre_send(message).await?;
    }
    Ok(())
}

/// Run every interceptor's `after_reply` in registration order.
pub async fn run_after_reply(
    chain: &[std::sync::Arc<dyn Interceptor>],
    message: &MessageEnvelope,
    reply: &mut ReplyEnvelope,
) -> Result<(), CoreError> {
    for interceptor in chain {
        interceptor.after_reply(message, reply).await?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "interceptor_tests.rs"]
mod tests;
