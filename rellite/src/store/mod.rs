// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Store boundary
//!
//! The relational store is an external collaborator reached through the
//! connection traits below: it accepts query plans and write operations and
//! answers with rows, store-assigned ids, or a store-level error. Sessions
//! own exactly one connection for the span of one unit of work.
//!
//! [`memory`] provides the bundled in-memory reference store the test suite
//! runs against.

pub mod error;
pub mod memory;
pub mod row;

pub use error::{StoreError, StoreResult};
pub use memory::{ConnectionPool, MemoryConnection, MemoryStore, PoolConfig};
pub use row::{record, Row};

use crate::plan::QueryPlan;
use crate::value::Value;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};

/// One pending write inside a unit of work
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Insert a row; the primary key is store-assigned
    Insert {
        entity: String,
        values: BTreeMap<String, Value>,
    },
    /// Update columns of an existing row
    Update {
        entity: String,
        id: i64,
        changes: BTreeMap<String, Value>,
    },
    /// Delete a row, cascading per the schema's foreign keys
    Delete { entity: String, id: i64 },
}

/// Synchronous store connection: the caller's thread blocks on each round
/// trip.
///
/// `apply` returns the store-assigned primary keys of the applied inserts in
/// submission order. Writes applied inside an open transaction are visible
/// to that transaction's reads and nobody else's until `commit`.
pub trait StoreConnection: Send {
    fn begin(&mut self) -> StoreResult<()>;
    fn apply(&mut self, writes: &[WriteOp]) -> StoreResult<Vec<i64>>;
    fn execute(
        &mut self,
        plan: &QueryPlan,
        params: &HashMap<String, Value>,
    ) -> StoreResult<Vec<Row>>;
    fn commit(&mut self) -> StoreResult<()>;
    fn rollback(&mut self);
}

/// Asynchronous store connection: the caller suspends at each round trip.
/// Semantics are identical to [`StoreConnection`].
#[async_trait]
pub trait AsyncStoreConnection: Send {
    async fn begin(&mut self) -> StoreResult<()>;
    async fn apply(&mut self, writes: &[WriteOp]) -> StoreResult<Vec<i64>>;
    async fn execute(
        &mut self,
        plan: &QueryPlan,
        params: &HashMap<String, Value>,
    ) -> StoreResult<Vec<Row>>;
    async fn commit(&mut self) -> StoreResult<()>;
    async fn rollback(&mut self);
}
