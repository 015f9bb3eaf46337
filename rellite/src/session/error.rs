// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Error types for execution sessions

use crate::plan::ValidationError;
use crate::registry::ConfigurationError;
use crate::store::StoreError;
use thiserror::Error;

/// Umbrella error for everything a unit of work can surface.
///
/// A store failure inside the unit of work discards its pending writes
/// before the error reaches the caller; the session then rejects further
/// use with `UnitOfWorkDiscarded`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("unit of work was discarded after a failure")]
    UnitOfWorkDiscarded,

    #[error("unit of work already completed")]
    Completed,
}

impl SessionError {
    /// Whether the underlying cause is a store constraint violation
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, SessionError::Store(e) if e.is_constraint_violation())
    }
}

pub type SessionResult<T> = Result<T, SessionError>;
