// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Query plans: pure, serializable expression trees
//!
//! A [`QueryPlan`] describes a select over an entity or a named derived
//! table, with filters, an optional relationship join, grouping, window
//! projections, ordering, and a limit. Construction is validated against the
//! schema registry and never touches the store; only an execution session
//! evaluates plans.

pub mod builder;
pub mod error;
pub mod expr;

pub use builder::{QueryBuilder, SelectBuilder};
pub use error::{PlanResult, ValidationError};
pub use expr::{
    AggregateFn, BinaryOp, CmpOp, ColumnRef, Predicate, ScalarExpr, SortDirection, SortKey,
};

use serde::{Deserialize, Serialize};

/// What a plan reads from: a declared entity or a derived table registered
/// on the plan itself
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SourceRef {
    Entity(String),
    Derived(String),
}

impl SourceRef {
    /// Display name used in validation errors
    pub fn name(&self) -> &str {
        match self {
            SourceRef::Entity(name) | SourceRef::Derived(name) => name,
        }
    }
}

/// How a derived table was introduced. Both wrap an inner plan as a named
/// source; CTEs are the composable, multi-level variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DerivedKind {
    Subquery,
    Cte,
}

/// An inner plan exposed to the outer plan under a name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedTable {
    pub name: String,
    pub kind: DerivedKind,
    pub plan: QueryPlan,
}

/// A relationship join attached to an entity select. The joined side's
/// columns appear in result rows under `<relationship>.<column>` keys;
/// parents without a match survive with null child columns (left outer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Join {
    pub relationship: String,
}

/// One projected output of a plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Projection {
    /// Every column of the source (and of the joined side, if any)
    AllColumns,
    /// A single column, optionally renamed
    Column {
        column: ColumnRef,
        alias: Option<String>,
    },
    /// A computed expression under a mandatory alias
    Expr { expr: ScalarExpr, alias: String },
}

impl Projection {
    /// Output key this projection produces in result rows
    pub fn output_name(&self) -> Option<String> {
        match self {
            Projection::AllColumns => None,
            Projection::Column { column, alias } => {
                Some(alias.clone().unwrap_or_else(|| column.key()))
            }
            Projection::Expr { alias, .. } => Some(alias.clone()),
        }
    }
}

/// An executable query plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPlan {
    pub source: SourceRef,
    /// Named derived tables this plan's source may refer to
    pub derived: Vec<DerivedTable>,
    pub join: Option<Join>,
    pub filter: Option<Predicate>,
    pub projections: Vec<Projection>,
    pub group_by: Vec<ColumnRef>,
    pub having: Option<Predicate>,
    pub order_by: Vec<SortKey>,
    pub limit: Option<usize>,
}

impl QueryPlan {
    /// Find a derived table registered on this plan
    pub fn find_derived(&self, name: &str) -> Option<&DerivedTable> {
        self.derived.iter().find(|d| d.name == name)
    }
}
