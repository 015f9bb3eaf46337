// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Bounded connection pool for the in-memory store
//!
//! The pool caps how many sessions can hold live connections at once.
//! Acquiring blocks (or, in async mode, suspends) until a slot frees up or
//! the configured timeout elapses, which surfaces as `ResourceExhausted`;
//! whether and when to retry is the caller's decision.

use super::connection::MemoryConnection;
use super::MemoryStore;
use crate::store::error::{StoreError, StoreResult};
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Pool sizing and acquire behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolConfig {
    pub max_connections: usize,
    pub acquire_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 5,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug)]
struct PoolState {
    available: Mutex<usize>,
    freed: Condvar,
}

/// Hands out bounded connections to one memory store
#[derive(Clone)]
pub struct ConnectionPool {
    store: MemoryStore,
    state: Arc<PoolState>,
    config: PoolConfig,
}

impl ConnectionPool {
    pub fn new(store: MemoryStore, config: PoolConfig) -> Self {
        let state = Arc::new(PoolState {
            available: Mutex::new(config.max_connections),
            freed: Condvar::new(),
        });
        Self {
            store,
            state,
            config,
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    /// Blocking acquire; fails with `ResourceExhausted` after the timeout
    pub fn acquire(&self) -> StoreResult<MemoryConnection> {
        let deadline = Instant::now() + self.config.acquire_timeout;
        let mut available = self.state.available.lock();
        while *available == 0 {
            if self
                .state
                .freed
                .wait_until(&mut available, deadline)
                .timed_out()
                && *available == 0
            {
                return Err(StoreError::ResourceExhausted {
                    waited_ms: self.config.acquire_timeout.as_millis() as u64,
                });
            }
        }
        *available -= 1;
        drop(available);
        Ok(self.store.connect_with_permit(PoolPermit {
            state: Arc::clone(&self.state),
        }))
    }

    /// Suspending acquire with the same timeout semantics
    pub async fn acquire_async(&self) -> StoreResult<MemoryConnection> {
        let deadline = Instant::now() + self.config.acquire_timeout;
        loop {
            {
                let mut available = self.state.available.lock();
                if *available > 0 {
                    *available -= 1;
                    drop(available);
                    return Ok(self.store.connect_with_permit(PoolPermit {
                        state: Arc::clone(&self.state),
                    }));
                }
            }
            if Instant::now() >= deadline {
                return Err(StoreError::ResourceExhausted {
                    waited_ms: self.config.acquire_timeout.as_millis() as u64,
                });
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }
}

/// Returns its pool slot when dropped
#[derive(Debug)]
pub struct PoolPermit {
    state: Arc<PoolState>,
}

impl Drop for PoolPermit {
    fn drop(&mut self) {
        let mut available = self.state.available.lock();
        *available += 1;
        self.state.freed.notify_one();
    }
}
