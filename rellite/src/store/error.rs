// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Store-level error types
//!
//! Every failure here surfaces to the caller unchanged; the owning unit of
//! work discards its pending writes first. Retrying is the caller's
//! decision, never the store's.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// The store rejected a write: check constraint, foreign key, enum or
    /// length bound, not-null, or uniqueness
    #[error("constraint `{constraint}` violated on `{entity}`: {detail}")]
    ConstraintViolation {
        entity: String,
        constraint: String,
        detail: String,
    },

    /// No free connection became available within the configured timeout
    #[error("connection pool exhausted after {waited_ms} ms")]
    ResourceExhausted { waited_ms: u64 },

    /// Transport-level failure talking to the store
    #[error("connection failure: {0}")]
    ConnectionFailure(String),

    /// The store could not evaluate the submitted plan or write
    #[error("store rejected request: {0}")]
    Rejected(String),

    /// A write referenced a row that does not exist
    #[error("no row with id {id} in `{entity}`")]
    RowNotFound { entity: String, id: i64 },

    /// Operation issued outside an open transaction
    #[error("no open transaction")]
    NoTransaction,
}

impl StoreError {
    pub fn constraint(
        entity: impl Into<String>,
        constraint: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        StoreError::ConstraintViolation {
            entity: entity.into(),
            constraint: constraint.into(),
            detail: detail.into(),
        }
    }

    /// Whether this error is a constraint violation
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, StoreError::ConstraintViolation { .. })
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
