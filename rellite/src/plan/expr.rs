// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Scalar and predicate expression trees
//!
//! Expressions are pure data: building one never touches the store. The
//! evaluator interprets them against result rows, and the schema registry
//! embeds `Predicate` values in relationship and check-constraint
//! declarations so that filters stay statically checkable instead of being
//! free-form strings.

use crate::value::Value;
use serde::{Deserialize, Serialize};

/// Reference to a column, optionally qualified by a relationship alias.
///
/// Unqualified references resolve against the plan's source entity; a
/// qualifier names a joined relationship slot (e.g. `resumes.title` inside a
/// worker/resumes join).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnRef {
    pub qualifier: Option<String>,
    pub column: String,
}

impl ColumnRef {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            qualifier: None,
            column: column.into(),
        }
    }

    pub fn qualified(qualifier: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            qualifier: Some(qualifier.into()),
            column: column.into(),
        }
    }

    /// Row key this reference resolves to (`col` or `qualifier.col`)
    pub fn key(&self) -> String {
        match &self.qualifier {
            Some(q) => format!("{}.{}", q, self.column),
            None => self.column.clone(),
        }
    }
}

/// Comparison operators for range predicates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CmpOp {
    Lt,
    Le,
    Gt,
    Ge,
}

/// Arithmetic operators for scalar expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// Aggregate functions usable in grouped and windowed contexts.
///
/// `Avg` over integer inputs truncates toward zero when projected, matching
/// the SQL idiom of casting the average back to an integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregateFn {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

/// A scalar expression evaluated per result row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScalarExpr {
    /// Column reference
    Column(ColumnRef),

    /// Literal value
    Literal(Value),

    /// Named bind parameter, supplied at execution time
    Parameter(String),

    /// Binary arithmetic over two scalar operands
    Binary {
        left: Box<ScalarExpr>,
        op: BinaryOp,
        right: Box<ScalarExpr>,
    },

    /// Aggregate over the rows of the current group (group context only)
    Aggregate {
        func: AggregateFn,
        arg: Box<ScalarExpr>,
    },

    /// Running aggregate over the rows sharing this row's partition key.
    ///
    /// Usable anywhere a scalar is, so a row's own column can be combined
    /// arithmetically with its partition aggregate ("difference from group
    /// average").
    Windowed {
        func: AggregateFn,
        arg: Box<ScalarExpr>,
        partition_by: Vec<ColumnRef>,
    },
}

impl ScalarExpr {
    pub fn column(name: impl Into<String>) -> Self {
        ScalarExpr::Column(ColumnRef::new(name))
    }

    pub fn qualified_column(qualifier: impl Into<String>, name: impl Into<String>) -> Self {
        ScalarExpr::Column(ColumnRef::qualified(qualifier, name))
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        ScalarExpr::Literal(value.into())
    }

    pub fn parameter(name: impl Into<String>) -> Self {
        ScalarExpr::Parameter(name.into())
    }

    pub fn binary(left: ScalarExpr, op: BinaryOp, right: ScalarExpr) -> Self {
        ScalarExpr::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    /// Convenience for `left - right`, the shape windowed difference
    /// projections take
    pub fn sub(left: ScalarExpr, right: ScalarExpr) -> Self {
        ScalarExpr::binary(left, BinaryOp::Sub, right)
    }

    pub fn windowed(
        func: AggregateFn,
        arg: ScalarExpr,
        partition_by: Vec<ColumnRef>,
    ) -> Self {
        ScalarExpr::Windowed {
            func,
            arg: Box::new(arg),
            partition_by,
        }
    }

    pub fn aggregate(func: AggregateFn, arg: ScalarExpr) -> Self {
        ScalarExpr::Aggregate {
            func,
            arg: Box::new(arg),
        }
    }

    /// Collect every column reference in this expression
    pub fn collect_columns<'a>(&'a self, out: &mut Vec<&'a ColumnRef>) {
        match self {
            ScalarExpr::Column(col) => out.push(col),
            ScalarExpr::Literal(_) | ScalarExpr::Parameter(_) => {}
            ScalarExpr::Binary { left, right, .. } => {
                left.collect_columns(out);
                right.collect_columns(out);
            }
            ScalarExpr::Aggregate { arg, .. } => arg.collect_columns(out),
            ScalarExpr::Windowed {
                arg, partition_by, ..
            } => {
                arg.collect_columns(out);
                out.extend(partition_by.iter());
            }
        }
    }

    /// Whether this expression contains a windowed aggregate anywhere
    pub fn contains_window(&self) -> bool {
        match self {
            ScalarExpr::Windowed { .. } => true,
            ScalarExpr::Binary { left, right, .. } => {
                left.contains_window() || right.contains_window()
            }
            ScalarExpr::Aggregate { arg, .. } => arg.contains_window(),
            _ => false,
        }
    }

    /// Whether this expression contains a grouped aggregate anywhere
    pub fn contains_aggregate(&self) -> bool {
        match self {
            ScalarExpr::Aggregate { .. } => true,
            ScalarExpr::Binary { left, right, .. } => {
                left.contains_aggregate() || right.contains_aggregate()
            }
            _ => false,
        }
    }
}

/// A filter predicate tree: equality, range, substring-contains, set
/// membership, and conjunction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    Eq {
        left: ScalarExpr,
        right: ScalarExpr,
    },
    Cmp {
        left: ScalarExpr,
        op: CmpOp,
        right: ScalarExpr,
    },
    Contains {
        column: ColumnRef,
        needle: String,
        case_insensitive: bool,
    },
    InSet {
        column: ColumnRef,
        values: Vec<Value>,
    },
    And(Vec<Predicate>),
}

impl Predicate {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::Eq {
            left: ScalarExpr::column(column),
            right: ScalarExpr::Literal(value.into()),
        }
    }

    pub fn cmp(column: impl Into<String>, op: CmpOp, value: impl Into<Value>) -> Self {
        Predicate::Cmp {
            left: ScalarExpr::column(column),
            op,
            right: ScalarExpr::Literal(value.into()),
        }
    }

    pub fn ge(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::cmp(column, CmpOp::Ge, value)
    }

    pub fn gt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::cmp(column, CmpOp::Gt, value)
    }

    pub fn le(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::cmp(column, CmpOp::Le, value)
    }

    pub fn lt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::cmp(column, CmpOp::Lt, value)
    }

    /// Case-sensitive substring match
    pub fn contains(column: impl Into<String>, needle: impl Into<String>) -> Self {
        Predicate::Contains {
            column: ColumnRef::new(column),
            needle: needle.into(),
            case_insensitive: false,
        }
    }

    /// Case-insensitive substring match
    pub fn icontains(column: impl Into<String>, needle: impl Into<String>) -> Self {
        Predicate::Contains {
            column: ColumnRef::new(column),
            needle: needle.into(),
            case_insensitive: true,
        }
    }

    pub fn in_set(column: impl Into<String>, values: Vec<Value>) -> Self {
        Predicate::InSet {
            column: ColumnRef::new(column),
            values,
        }
    }

    pub fn and(predicates: Vec<Predicate>) -> Self {
        Predicate::And(predicates)
    }

    /// Collect every column reference in this predicate
    pub fn collect_columns<'a>(&'a self, out: &mut Vec<&'a ColumnRef>) {
        match self {
            Predicate::Eq { left, right } => {
                left.collect_columns(out);
                right.collect_columns(out);
            }
            Predicate::Cmp { left, right, .. } => {
                left.collect_columns(out);
                right.collect_columns(out);
            }
            Predicate::Contains { column, .. } | Predicate::InSet { column, .. } => {
                out.push(column)
            }
            Predicate::And(children) => {
                for child in children {
                    child.collect_columns(out);
                }
            }
        }
    }

    /// Whether this predicate contains a grouped aggregate (HAVING clauses do)
    pub fn contains_aggregate(&self) -> bool {
        match self {
            Predicate::Eq { left, right } | Predicate::Cmp { left, right, .. } => {
                left.contains_aggregate() || right.contains_aggregate()
            }
            Predicate::And(children) => children.iter().any(|c| c.contains_aggregate()),
            _ => false,
        }
    }
}

/// Sort direction for ORDER BY keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// One ORDER BY key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortKey {
    pub expr: ScalarExpr,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn asc(expr: ScalarExpr) -> Self {
        Self {
            expr,
            direction: SortDirection::Ascending,
        }
    }

    pub fn desc(expr: ScalarExpr) -> Self {
        Self {
            expr,
            direction: SortDirection::Descending,
        }
    }
}
