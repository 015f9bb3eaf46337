// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Error types for the schema registry

use thiserror::Error;

/// Programmer errors in schema declaration or lookup. These are fatal and
/// never retried: an unknown name means the caller's code disagrees with the
/// declared schema.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("unknown entity `{0}`")]
    UnknownEntity(String),

    #[error("unknown column `{column}` on entity `{entity}`")]
    UnknownColumn { entity: String, column: String },

    #[error("unknown relationship `{relationship}` on entity `{entity}`")]
    UnknownRelationship {
        entity: String,
        relationship: String,
    },

    #[error("entity `{0}` declared more than once")]
    DuplicateEntity(String),

    #[error("invalid declaration for entity `{entity}`: {message}")]
    InvalidDeclaration { entity: String, message: String },
}

pub type RegistryResult<T> = Result<T, ConfigurationError>;
