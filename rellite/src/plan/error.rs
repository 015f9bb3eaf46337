// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Error types for plan construction

use crate::registry::ConfigurationError;
use thiserror::Error;

/// Malformed plan construction. Fatal to the single operation being built;
/// the caller gets the error, nothing reaches the store.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("unknown column `{column}` on `{source}`")]
    UnknownColumn { r#source: String, column: String },

    #[error("unknown qualifier `{qualifier}` for column `{column}`")]
    UnknownQualifier { qualifier: String, column: String },

    #[error("unknown derived table `{0}`")]
    UnknownDerivedTable(String),

    #[error("HAVING requires GROUP BY")]
    HavingWithoutGroupBy,

    #[error("aggregate used outside a grouped query")]
    AggregateOutsideGroup,

    #[error("column `{0}` projected in a grouped query but not in GROUP BY")]
    NonGroupedColumn(String),

    #[error("window partition list is empty")]
    EmptyPartition,

    #[error("window functions cannot be combined with GROUP BY")]
    WindowInGroupedQuery,

    #[error("joins are only supported on entity sources")]
    JoinOnDerivedSource,

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

pub type PlanResult<T> = Result<T, ValidationError>;
