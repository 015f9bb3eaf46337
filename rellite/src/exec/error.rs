// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Evaluation error types

use crate::registry::ConfigurationError;
use thiserror::Error;

/// Failure while evaluating a plan against a snapshot. Plans are validated
/// at build time, so these surface mostly for internal misuse or genuinely
/// dynamic conditions (unbound parameters, division by zero).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecError {
    #[error("unknown table `{0}`")]
    UnknownTable(String),

    #[error("unknown column `{0}` in result row")]
    UnknownColumn(String),

    #[error("unknown derived table `{0}`")]
    UnknownDerivedTable(String),

    #[error("unbound parameter `{0}`")]
    UnboundParameter(String),

    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("schema lookup failed: {0}")]
    Schema(String),
}

impl From<ConfigurationError> for ExecError {
    fn from(err: ConfigurationError) -> Self {
        ExecError::Schema(err.to_string())
    }
}

pub type ExecResult<T> = Result<T, ExecError>;
