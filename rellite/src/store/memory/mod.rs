// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Bundled in-memory relational store
//!
//! Reference implementation of the store boundary: per-entity tables with
//! store-assigned primary keys, server timestamps, full constraint
//! enforcement, cascade deletion, and transaction overlays. The test suite
//! and any embedded use run against it; production deployments substitute
//! their own [`StoreConnection`](crate::store::StoreConnection)
//! implementation.

mod connection;
mod engine;
mod pool;

pub use connection::MemoryConnection;
pub use pool::{ConnectionPool, PoolConfig, PoolPermit};

use crate::registry::SchemaRegistry;
use engine::StoreInner;
use std::sync::Arc;

/// Handle to one in-memory store; cheap to clone, shared by all connections
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<StoreInner>,
}

impl MemoryStore {
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self {
            inner: Arc::new(StoreInner::new(registry)),
        }
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.inner.registry
    }

    /// Open an unpooled connection (tests and embedded use)
    pub fn connect(&self) -> MemoryConnection {
        MemoryConnection::new(Arc::clone(&self.inner), None)
    }

    pub(crate) fn connect_with_permit(&self, permit: pool::PoolPermit) -> MemoryConnection {
        MemoryConnection::new(Arc::clone(&self.inner), Some(permit))
    }
}
