// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Memory store connections
//!
//! A connection owns at most one open transaction overlay. Dropping the
//! connection (or the pool permit it holds) discards anything uncommitted.

use super::engine::{apply_writes, commit_overlay, Snapshot, StoreInner, TxnOverlay};
use super::pool::PoolPermit;
use crate::exec::Evaluator;
use crate::plan::QueryPlan;
use crate::store::error::{StoreError, StoreResult};
use crate::store::row::Row;
use crate::store::{AsyncStoreConnection, StoreConnection, WriteOp};
use crate::value::Value;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// One live connection to the in-memory store
#[derive(Debug)]
pub struct MemoryConnection {
    inner: Arc<StoreInner>,
    overlay: Option<TxnOverlay>,
    // held for the connection's lifetime; dropping it frees the pool slot
    _permit: Option<PoolPermit>,
}

impl MemoryConnection {
    pub(crate) fn new(inner: Arc<StoreInner>, permit: Option<PoolPermit>) -> Self {
        Self {
            inner,
            overlay: None,
            _permit: permit,
        }
    }

    fn overlay_mut(&mut self) -> StoreResult<&mut TxnOverlay> {
        self.overlay.as_mut().ok_or(StoreError::NoTransaction)
    }
}

impl StoreConnection for MemoryConnection {
    fn begin(&mut self) -> StoreResult<()> {
        if self.overlay.is_some() {
            return Err(StoreError::Rejected(
                "transaction already open on this connection".to_string(),
            ));
        }
        self.overlay = Some(TxnOverlay::default());
        Ok(())
    }

    fn apply(&mut self, writes: &[WriteOp]) -> StoreResult<Vec<i64>> {
        let inner = Arc::clone(&self.inner);
        let overlay = self.overlay_mut()?;
        apply_writes(&inner, overlay, writes)
    }

    fn execute(
        &mut self,
        plan: &QueryPlan,
        params: &HashMap<String, Value>,
    ) -> StoreResult<Vec<Row>> {
        let overlay = self.overlay.as_ref().ok_or(StoreError::NoTransaction)?;
        let snapshot = Snapshot::new(&self.inner, Some(overlay));
        let evaluator = Evaluator::new(&self.inner.registry, &snapshot, params);
        log::debug!("executing plan over {:?}", plan.source);
        evaluator
            .evaluate(plan)
            .map_err(|e| StoreError::Rejected(e.to_string()))
    }

    fn commit(&mut self) -> StoreResult<()> {
        let overlay = self.overlay.take().ok_or(StoreError::NoTransaction)?;
        commit_overlay(&self.inner, overlay);
        Ok(())
    }

    fn rollback(&mut self) {
        self.overlay = None;
    }
}

// The in-memory store answers without real I/O, so the async face simply
// delegates; callers still get suspension points at every round trip.
#[async_trait]
impl AsyncStoreConnection for MemoryConnection {
    async fn begin(&mut self) -> StoreResult<()> {
        StoreConnection::begin(self)
    }

    async fn apply(&mut self, writes: &[WriteOp]) -> StoreResult<Vec<i64>> {
        StoreConnection::apply(self, writes)
    }

    async fn execute(
        &mut self,
        plan: &QueryPlan,
        params: &HashMap<String, Value>,
    ) -> StoreResult<Vec<Row>> {
        StoreConnection::execute(self, plan, params)
    }

    async fn commit(&mut self) -> StoreResult<()> {
        StoreConnection::commit(self)
    }

    async fn rollback(&mut self) {
        StoreConnection::rollback(self)
    }
}
