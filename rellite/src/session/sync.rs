// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Synchronous execution session

use super::error::{SessionError, SessionResult};
use crate::plan::{Predicate, QueryBuilder, QueryPlan};
use crate::registry::SchemaRegistry;
use crate::store::{Row, StoreConnection, WriteOp};
use crate::value::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use uuid::Uuid;

/// Lifecycle of a unit of work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnitState {
    Active,
    Discarded,
    Completed,
}

/// A scoped unit of work over one store connection.
///
/// Writes queue locally until `flush`, `execute`, or `commit` sends them.
/// Any store failure discards everything pending and poisons the session;
/// dropping without commit discards as well. Plans run strictly in
/// submission order on the single underlying connection.
#[derive(Debug)]
pub struct Session<C: StoreConnection> {
    id: String,
    conn: C,
    registry: Arc<SchemaRegistry>,
    pending: Vec<WriteOp>,
    state: UnitState,
    round_trips: usize,
}

impl<C: StoreConnection> Session<C> {
    /// Wrap an already-acquired connection. Opens the store transaction.
    pub fn new(mut conn: C, registry: Arc<SchemaRegistry>) -> SessionResult<Self> {
        conn.begin()?;
        let id = Uuid::new_v4().to_string();
        log::debug!("session {} opened", id);
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

    /// Store round trips this session has issued so far
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

    fn discard(&mut self) {
        log::warn!("session {} discarded; pending writes dropped", self.id);
        self.pending.clear();
        self.conn.rollback();
        self.state = UnitState::Discarded;
    }

    /// Queue an insert; the primary key is assigned at flush
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

    /// Queue a column update for an existing row
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

    /// Queue a delete; dependent rows cascade per the schema
    pub fn delete(&mut self, entity: &str, id: i64) -> SessionResult<()> {
        self.ensure_active()?;
        self.registry.entity(entity)?;
        self.pending.push(WriteOp::Delete {
            entity: entity.to_string(),
            id,
        });
        Ok(())
    }

    /// Send queued writes inside the open transaction without committing.
    ///
    /// Returns the store-assigned primary keys of the flushed inserts in
    /// submission order. Reads issued afterwards in this unit of work
    /// observe the flushed rows, including server-assigned values.
    pub fn flush(&mut self) -> SessionResult<Vec<i64>> {
        self.ensure_active()?;
        if self.pending.is_empty() {
            return Ok(Vec::new());
        }
        let writes = std::mem::take(&mut self.pending);
        self.round_trips += 1;
        match self.conn.apply(&writes) {
            Ok(ids) => Ok(ids),
            Err(e) => {
                self.discard();
                Err(e.into())
            }
        }
    }

    /// Evaluate a plan inside this unit of work, flushing queued writes
    /// first
    pub fn execute(&mut self, plan: &QueryPlan) -> SessionResult<Vec<Row>> {
        self.execute_with_params(plan, &HashMap::new())
    }

    /// `execute` with bound parameters substituted into the plan
    pub fn execute_with_params(
        &mut self,
        plan: &QueryPlan,
        params: &HashMap<String, Value>,
    ) -> SessionResult<Vec<Row>> {
        self.flush()?;
        self.ensure_active()?;
        self.round_trips += 1;
        match self.conn.execute(plan, params) {
            Ok(rows) => Ok(rows),
            Err(e) => {
                self.discard();
                Err(e.into())
            }
        }
    }

    /// Fetch one row by primary key
    pub fn get(&mut self, entity: &str, id: i64) -> SessionResult<Option<Row>> {
        let registry = self.registry();
        let entity_def = registry.entity(entity)?;
        let plan = QueryBuilder::new(&registry)
            .select(entity)
            .filter(Predicate::eq(entity_def.primary_key.clone(), id))
            .limit(1)
            .build()?;
        Ok(self.execute(&plan)?.into_iter().next())
    }

    /// Flush anything pending and publish the unit of work
    pub fn commit(mut self) -> SessionResult<()> {
        self.flush()?;
        self.ensure_active()?;
        match self.conn.commit() {
            Ok(()) => {
                self.state = UnitState::Completed;
                log::debug!("session {} committed", self.id);
                Ok(())
            }
            Err(e) => {
                self.discard();
                Err(e.into())
            }
        }
    }

    /// Explicitly discard the unit of work
    pub fn rollback(mut self) {
        self.pending.clear();
        self.conn.rollback();
        self.state = UnitState::Completed;
        log::debug!("session {} rolled back", self.id);
    }
}

impl<C: StoreConnection> Drop for Session<C> {
    fn drop(&mut self) {
        if self.state == UnitState::Active {
            self.conn.rollback();
        }
    }
}
