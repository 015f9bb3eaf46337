// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Asynchronous execution session
//!
//! Identical unit-of-work semantics to [`Session`](super::Session); the
//! only difference is that the caller suspends at each store round trip.
//! Dropping an async session without committing relies on the connection's
//! own drop behavior to discard the open transaction, since `Drop` cannot
//! await.

use super::error::{SessionError, SessionResult};
use super::sync::UnitState;
use crate::plan::{Predicate, QueryBuilder, QueryPlan};
use crate::registry::SchemaRegistry;
use crate::store::{AsyncStoreConnection, Row, WriteOp};
use crate::value::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use uuid::Uuid;

/// A scoped unit of work in async mode
pub struct AsyncSession<C: AsyncStoreConnection> {
    id: String,
    conn: C,
    registry: Arc<SchemaRegistry>,
    pending: Vec<WriteOp>,
    state: UnitState,
    round_trips: usize,
}

impl<C: AsyncStoreConnection> AsyncSession<C> {
    /// Wrap an already-acquired connection. Opens the store transaction.
    pub async fn new(mut conn: C, registry: Arc<SchemaRegistry>) -> SessionResult<Self> {
        conn.begin().await?;
        let id = Uuid::new_v4().to_string();
        log::debug!("async session {} opened", id);
        Ok(Self {
            id,
            conn,
            registry,
            pending: Vec::new(),
            state: UnitState::Active,
            round_trips: 0,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn registry(&self) -> Arc<SchemaRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn round_trips(&self) -> usize {
        self.round_trips
    }

    fn ensure_active(&self) -> SessionResult<()> {
        match self.state {
            UnitState::Active => Ok(()),
            UnitState::Discarded => Err(SessionError::UnitOfWorkDiscarded),
            UnitState::Completed => Err(SessionError::Completed),
        }
    }

    async fn discard(&mut self) {
        log::warn!("async session {} discarded; pending writes dropped", self.id);
        self.pending.clear();
        self.conn.rollback().await;
        self.state = UnitState::Discarded;
    }

    pub fn insert(
        &mut self,
        entity: &str,
        values: BTreeMap<String, Value>,
    ) -> SessionResult<()> {
        self.ensure_active()?;
        self.registry.entity(entity)?;
        self.pending.push(WriteOp::Insert {
            entity: entity.to_string(),
            values,
        });
        Ok(())
    }

    pub fn update(
        &mut self,
        entity: &str,
        id: i64,
        changes: BTreeMap<String, Value>,
    ) -> SessionResult<()> {
        self.ensure_active()?;
        self.registry.entity(entity)?;
        self.pending.push(WriteOp::Update {
            entity: entity.to_string(),
            id,
            changes,
        });
        Ok(())
    }

    pub fn delete(&mut self, entity: &str, id: i64) -> SessionResult<()> {
        self.ensure_active()?;
        self.registry.entity(entity)?;
        self.pending.push(WriteOp::Delete {
            entity: entity.to_string(),
            id,
        });
        Ok(())
    }

    /// Send queued writes without committing; see
    /// [`Session::flush`](super::Session::flush)
    pub async fn flush(&mut self) -> SessionResult<Vec<i64>> {
        self.ensure_active()?;
        if self.pending.is_empty() {
            return Ok(Vec::new());
        }
        let writes = std::mem::take(&mut self.pending);
        self.round_trips += 1;
        match self.conn.apply(&writes).await {
            Ok(ids) => Ok(ids),
            Err(e) => {
                self.discard().await;
                Err(e.into())
            }
        }
    }

    pub async fn execute(&mut self, plan: &QueryPlan) -> SessionResult<Vec<Row>> {
        self.execute_with_params(plan, &HashMap::new()).await
    }

    pub async fn execute_with_params(
        &mut self,
        plan: &QueryPlan,
        params: &HashMap<String, Value>,
    ) -> SessionResult<Vec<Row>> {
        self.flush().await?;
        self.ensure_active()?;
        self.round_trips += 1;
        match self.conn.execute(plan, params).await {
            Ok(rows) => Ok(rows),
            Err(e) => {
                self.discard().await;
                Err(e.into())
            }
        }
    }

    pub async fn get(&mut self, entity: &str, id: i64) -> SessionResult<Option<Row>> {
        let registry = self.registry();
        let entity_def = registry.entity(entity)?;
        let plan = QueryBuilder::new(&registry)
            .select(entity)
            .filter(Predicate::eq(entity_def.primary_key.clone(), id))
            .limit(1)
            .build()?;
        Ok(self.execute(&plan).await?.into_iter().next())
    }

    pub async fn commit(mut self) -> SessionResult<()> {
        self.flush().await?;
        self.ensure_active()?;
        match self.conn.commit().await {
            Ok(()) => {
                self.state = UnitState::Completed;
                log::debug!("async session {} committed", self.id);
                Ok(())
            }
            Err(e) => {
                self.discard().await;
                Err(e.into())
            }
        }
    }

    pub async fn rollback(mut self) {
        self.pending.clear();
        self.conn.rollback().await;
        self.state = UnitState::Completed;
        log::debug!("async session {} rolled back", self.id);
    }
}
