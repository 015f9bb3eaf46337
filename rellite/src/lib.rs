// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! RelLite - A typed relationship-loading query layer
//!
//! RelLite maps a declared entity schema onto a transactional row store and
//! loads related rows through interchangeable strategies.
//!
//! # Features
//!
//! - **Schema Registry**: Entities, typed columns, constraints, and named
//!   relationships declared up front and validated as a whole
//! - **Query Builder**: Typed plans with filters, grouped aggregates,
//!   windowed expressions, and subquery/CTE composition
//! - **Relationship Loading**: Lazy, joined, and select-in strategies that
//!   produce identical object graphs at different round-trip costs
//! - **Unit of Work**: Sessions queue writes and flush them atomically
//!   inside a store transaction, in sync and async execution modes
//! - **Constraint Enforcement**: Not-null, length, enum, check, unique, and
//!   foreign-key rules with cascade and restrict delete behavior
//!
//! # Usage
//!
//! ```no_run
//! use rellite::registry::{ColumnDef, EntityDef, RegistryBuilder, RelationshipDef};
//! use rellite::session::SessionFactory;
//! use rellite::store::{record, MemoryStore, PoolConfig};
//! use std::sync::Arc;
//!
//! let registry = Arc::new(
//!     RegistryBuilder::new()
//!         .entity(EntityDef::new("workers").column(ColumnDef::text("username", 255)))
//!         .build()
//!         .unwrap(),
//! );
//! let store = MemoryStore::new(Arc::clone(&registry));
//! let factory = SessionFactory::new(store, PoolConfig::default());
//!
//! let mut session = factory.session().unwrap();
//! session.insert("workers", record(&[("username", "michel".into())])).unwrap();
//! session.commit().unwrap();
//! ```

pub mod exec;
pub mod loader;
pub mod plan;
pub mod registry;
pub mod session;
pub mod store;
pub mod value;

pub use loader::{LoadStrategy, LoadedParent, RelationshipLoader};
pub use plan::{QueryBuilder, QueryPlan};
pub use registry::SchemaRegistry;
pub use session::{AsyncSession, Session, SessionFactory};
pub use store::{MemoryStore, Row};
pub use value::Value;

/// RelLite version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name used in log targets
pub const CRATE_NAME: &str = env!("CARGO_PKG_NAME");
