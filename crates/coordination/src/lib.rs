// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Coordination Client: a thin abstraction over a Redis-like shared
//! store supporting pub/sub topics, get-and-delete buckets, distributed
//! semaphores, and per-entity hash maps.
//!
//! Everything upstream of this crate (`devicemesh-core`) talks to the
//! store only through the [`CoordinationClient`] trait, never to Redis
//! directly — a narrow transport seam upstream code never bypasses.

pub mod client;
pub mod keys;
pub mod memory_backend;
pub mod redis_backend;

pub use client::{CoordinationClient, Subscription};
pub use memory_backend::InMemoryCoordinationClient;
pub use redis_backend::RedisCoordinationClient;
