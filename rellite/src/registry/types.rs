// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Schema declaration types
//!
//! Entities, columns, relationships, and constraints are plain data consumed
//! by the query builder, the relationship loaders, and the store. The
//! registry owns no behavior beyond lookup; stores enforce the declared
//! constraints, builders validate column references against them.

use crate::plan::expr::Predicate;
use serde::{Deserialize, Serialize};

/// Semantic type of a column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnType {
    Int,
    /// Bounded text; `max_len` of `None` means unbounded
    Text { max_len: Option<usize> },
    /// Closed set of text values
    Enum { variants: Vec<String> },
    Timestamp,
}

/// Default-value policy applied by the store when an insert omits the column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DefaultPolicy {
    None,
    /// Store assigns the current UTC timestamp at insert
    ServerTimestamp,
}

/// Refresh policy applied by the store when an update touches the row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OnUpdate {
    None,
    /// Store refreshes the column to the current UTC timestamp
    ServerTimestamp,
}

/// What happens to referencing rows when the referenced row is deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OnDelete {
    Cascade,
    Restrict,
}

/// Foreign key declaration on a column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Referenced entity (its primary key is the referenced column)
    pub entity: String,
    pub on_delete: OnDelete,
}

/// One column of an entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub ty: ColumnType,
    pub nullable: bool,
    pub default: DefaultPolicy,
    pub on_update: OnUpdate,
    pub references: Option<ForeignKey>,
    /// Hint for substring-search columns; carried for store backends that
    /// index, ignored by the in-memory store
    pub indexed: bool,
}

impl ColumnDef {
    fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            ty,
            nullable: false,
            default: DefaultPolicy::None,
            on_update: OnUpdate::None,
            references: None,
            indexed: false,
        }
    }

    pub fn int(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Int)
    }

    pub fn text(name: impl Into<String>, max_len: usize) -> Self {
        Self::new(
            name,
            ColumnType::Text {
                max_len: Some(max_len),
            },
        )
    }

    pub fn unbounded_text(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Text { max_len: None })
    }

    pub fn enumeration(name: impl Into<String>, variants: &[&str]) -> Self {
        Self::new(
            name,
            ColumnType::Enum {
                variants: variants.iter().map(|v| v.to_string()).collect(),
            },
        )
    }

    pub fn timestamp(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Timestamp)
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn server_default_now(mut self) -> Self {
        self.default = DefaultPolicy::ServerTimestamp;
        self
    }

    pub fn refresh_on_update(mut self) -> Self {
        self.on_update = OnUpdate::ServerTimestamp;
        self
    }

    pub fn foreign_key(mut self, entity: impl Into<String>, on_delete: OnDelete) -> Self {
        self.references = Some(ForeignKey {
            entity: entity.into(),
            on_delete,
        });
        self
    }

    pub fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }
}

/// Row-level check constraint, a typed predicate evaluated by the store.
///
/// SQL semantics: the constraint is violated only when the predicate
/// evaluates to definite false; rows with NULL in a referenced column pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckConstraint {
    pub name: String,
    pub predicate: Predicate,
}

impl CheckConstraint {
    pub fn new(name: impl Into<String>, predicate: Predicate) -> Self {
        Self {
            name: name.into(),
            predicate,
        }
    }
}

/// Multi-column uniqueness constraint (models composite keys on association
/// entities that carry a surrogate primary key)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniqueConstraint {
    pub name: String,
    pub columns: Vec<String>,
}

impl UniqueConstraint {
    pub fn new(name: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// Cardinality and key wiring of a relationship
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Cardinality {
    /// This entity's `fk_column` points at the target's primary key
    ManyToOne { fk_column: String },
    /// The target's `fk_column` points back at this entity's primary key
    OneToMany { fk_column: String },
    /// Resolved through an association entity: `source_key` on the
    /// association references this entity, `target_key` references the peer
    ManyToMany {
        association: String,
        source_key: String,
        target_key: String,
    },
}

/// Which side of a bidirectional relationship carries the foreign key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ownership {
    Owning,
    Inverse,
}

/// A declared relationship from one entity to another.
///
/// `filter` is an optional typed join predicate over the target entity's
/// columns ("only part-time resumes"); every loading strategy applies it
/// identically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipDef {
    pub name: String,
    pub target: String,
    pub cardinality: Cardinality,
    pub ownership: Ownership,
    pub filter: Option<Predicate>,
}

impl RelationshipDef {
    pub fn one_to_many(
        name: impl Into<String>,
        target: impl Into<String>,
        fk_column: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            cardinality: Cardinality::OneToMany {
                fk_column: fk_column.into(),
            },
            ownership: Ownership::Inverse,
            filter: None,
        }
    }

    pub fn many_to_one(
        name: impl Into<String>,
        target: impl Into<String>,
        fk_column: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            cardinality: Cardinality::ManyToOne {
                fk_column: fk_column.into(),
            },
            ownership: Ownership::Owning,
            filter: None,
        }
    }

    pub fn many_to_many(
        name: impl Into<String>,
        target: impl Into<String>,
        association: impl Into<String>,
        source_key: impl Into<String>,
        target_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            cardinality: Cardinality::ManyToMany {
                association: association.into(),
                source_key: source_key.into(),
                target_key: target_key.into(),
            },
            ownership: Ownership::Owning,
            filter: None,
        }
    }

    /// Attach a typed join predicate evaluated against the target entity
    pub fn filtered(mut self, predicate: Predicate) -> Self {
        self.filter = Some(predicate);
        self
    }

    pub fn inverse(mut self) -> Self {
        self.ownership = Ownership::Inverse;
        self
    }
}

/// Full declaration of one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDef {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    /// Name of the integer primary key column, assigned by the store
    pub primary_key: String,
    pub checks: Vec<CheckConstraint>,
    pub uniques: Vec<UniqueConstraint>,
    pub relationships: Vec<RelationshipDef>,
}

impl EntityDef {
    /// Start declaring an entity; the `id` integer primary key is implicit
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: vec![ColumnDef::int("id")],
            primary_key: "id".to_string(),
            checks: Vec::new(),
            uniques: Vec::new(),
            relationships: Vec::new(),
        }
    }

    pub fn column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    pub fn check(mut self, check: CheckConstraint) -> Self {
        self.checks.push(check);
        self
    }

    pub fn unique(mut self, unique: UniqueConstraint) -> Self {
        self.uniques.push(unique);
        self
    }

    pub fn relationship(mut self, relationship: RelationshipDef) -> Self {
        self.relationships.push(relationship);
        self
    }

    /// Look up a column by name
    pub fn find_column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.find_column(name).is_some()
    }

    /// Look up a relationship by name
    pub fn find_relationship(&self, name: &str) -> Option<&RelationshipDef> {
        self.relationships.iter().find(|r| r.name == name)
    }

    /// Names of every column, in declaration order
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}
