// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Session factory
//!
//! Explicit, passed-in configuration with an explicit lifecycle: create one
//! factory at process start, hand out sessions from it, dispose at
//! shutdown. Never a module-level singleton.

use super::async_session::AsyncSession;
use super::error::SessionResult;
use super::sync::Session;
use crate::store::{ConnectionPool, MemoryConnection, MemoryStore, PoolConfig};

/// Creates execution sessions backed by a bounded connection pool.
///
/// The sync and async modes share one pool and one plan vocabulary; the
/// mode is purely a property of the session handed out.
pub struct SessionFactory {
    pool: ConnectionPool,
}

impl SessionFactory {
    pub fn new(store: MemoryStore, config: PoolConfig) -> Self {
        log::info!(
            "session factory created (pool size {}, acquire timeout {:?})",
            config.max_connections,
            config.acquire_timeout
        );
        Self {
            pool: ConnectionPool::new(store, config),
        }
    }

    /// Open a synchronous unit of work. Waits up to the configured timeout
    /// for a pooled connection, then fails with `ResourceExhausted`.
    pub fn session(&self) -> SessionResult<Session<MemoryConnection>> {
        let conn = self.pool.acquire()?;
        let registry = self.registry();
        Session::new(conn, registry)
    }

    /// Open an asynchronous unit of work with the same acquisition rules
    pub async fn async_session(&self) -> SessionResult<AsyncSession<MemoryConnection>> {
        let conn = self.pool.acquire_async().await?;
        let registry = self.registry();
        AsyncSession::new(conn, registry).await
    }

    fn registry(&self) -> std::sync::Arc<crate::registry::SchemaRegistry> {
        // the pool's store owns the registry
        std::sync::Arc::clone(self.store().registry())
    }

    fn store(&self) -> &MemoryStore {
        self.pool.store()
    }

    /// Tear the factory down. Live sessions keep their connections until
    /// they finish; no new sessions can be created afterwards.
    pub fn dispose(self) {
        log::info!("session factory disposed");
    }
}
