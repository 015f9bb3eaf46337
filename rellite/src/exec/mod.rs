// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Plan evaluation against a store snapshot
//!
//! The evaluator is how the bundled in-memory store answers query plans. It
//! interprets the plan tree over a [`Dataset`] — a point-in-time view of the
//! tables a transaction can see — and produces result rows. Pipeline order
//! follows SQL: source, join, filter, group/window, projection, order,
//! limit.

pub mod error;
pub mod evaluator;

pub use error::{ExecError, ExecResult};
pub use evaluator::Evaluator;

use crate::store::Row;

/// A point-in-time, transaction-local view of the store's tables.
///
/// `scan` returns every visible row of an entity in primary-key ascending
/// order; the evaluator relies on that base ordering for its stable
/// tie-breaks.
pub trait Dataset {
    fn scan(&self, entity: &str) -> ExecResult<Vec<Row>>;
}
