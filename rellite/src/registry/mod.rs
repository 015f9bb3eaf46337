// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Schema registry: static descriptions of entities, columns, and
//! relationships. Pure lookup, no side effects.

pub mod error;
pub mod registry;
pub mod types;

pub use error::{ConfigurationError, RegistryResult};
pub use registry::{RegistryBuilder, SchemaRegistry};
pub use types::{
    Cardinality, CheckConstraint, ColumnDef, ColumnType, DefaultPolicy, EntityDef, ForeignKey,
    OnDelete, OnUpdate, Ownership, RelationshipDef, UniqueConstraint,
};
