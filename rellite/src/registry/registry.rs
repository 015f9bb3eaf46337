// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Schema registry: pure lookup over declared entities
//!
//! Populated once at process start through [`RegistryBuilder`] (the schema
//! declaration interface), then shared read-only behind an `Arc`. Lookup of
//! an undeclared name is a [`ConfigurationError`].

use super::error::{ConfigurationError, RegistryResult};
use super::types::{Cardinality, ColumnDef, EntityDef, RelationshipDef};
use std::collections::HashMap;

/// Immutable registry of entity definitions
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    entities: HashMap<String, EntityDef>,
}

impl SchemaRegistry {
    /// Start declaring a schema
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Look up an entity definition
    pub fn entity(&self, name: &str) -> RegistryResult<&EntityDef> {
        self.entities
            .get(name)
            .ok_or_else(|| ConfigurationError::UnknownEntity(name.to_string()))
    }

    /// Look up a column definition on an entity
    pub fn column(&self, entity: &str, column: &str) -> RegistryResult<&ColumnDef> {
        self.entity(entity)?
            .find_column(column)
            .ok_or_else(|| ConfigurationError::UnknownColumn {
                entity: entity.to_string(),
                column: column.to_string(),
            })
    }

    /// Look up a relationship declared on an entity
    pub fn relationship(&self, entity: &str, name: &str) -> RegistryResult<&RelationshipDef> {
        self.entity(entity)?
            .find_relationship(name)
            .ok_or_else(|| ConfigurationError::UnknownRelationship {
                entity: entity.to_string(),
                relationship: name.to_string(),
            })
    }

    /// Names of all declared entities
    pub fn entity_names(&self) -> Vec<String> {
        self.entities.keys().cloned().collect()
    }

    /// Entities whose columns reference `entity` via a foreign key, together
    /// with the referencing column. Drives cascade deletion in the store.
    pub fn referencing_columns(&self, entity: &str) -> Vec<(&EntityDef, &ColumnDef)> {
        let mut refs = Vec::new();
        for def in self.entities.values() {
            for column in &def.columns {
                if let Some(fk) = &column.references {
                    if fk.entity == entity {
                        refs.push((def, column));
                    }
                }
            }
        }
        refs
    }
}

/// Builder for [`SchemaRegistry`]; `build` validates the whole declaration
pub struct RegistryBuilder {
    entities: Vec<EntityDef>,
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self {
            entities: Vec::new(),
        }
    }

    pub fn entity(mut self, entity: EntityDef) -> Self {
        self.entities.push(entity);
        self
    }

    /// Validate the declaration set and freeze it into a registry.
    ///
    /// Rejected: duplicate entity names, missing primary key columns,
    /// foreign keys or relationships naming undeclared entities, relationship
    /// key columns that do not exist, and filter or check predicates that
    /// reference unknown columns.
    pub fn build(self) -> RegistryResult<SchemaRegistry> {
        let mut entities: HashMap<String, EntityDef> = HashMap::new();
        for entity in &self.entities {
            if entities.contains_key(&entity.name) {
                return Err(ConfigurationError::DuplicateEntity(entity.name.clone()));
            }
            entities.insert(entity.name.clone(), entity.clone());
        }

        let registry = SchemaRegistry { entities };
        for entity in &self.entities {
            validate_entity(&registry, entity)?;
        }

        log::info!(
            "schema registry built with {} entities",
            registry.entities.len()
        );
        Ok(registry)
    }
}

fn validate_entity(registry: &SchemaRegistry, entity: &EntityDef) -> RegistryResult<()> {
    let invalid = |message: String| ConfigurationError::InvalidDeclaration {
        entity: entity.name.clone(),
        message,
    };

    if !entity.has_column(&entity.primary_key) {
        return Err(invalid(format!(
            "primary key column `{}` is not declared",
            entity.primary_key
        )));
    }

    for column in &entity.columns {
        if let Some(fk) = &column.references {
            if !registry.entities.contains_key(&fk.entity) {
                return Err(invalid(format!(
                    "column `{}` references undeclared entity `{}`",
                    column.name, fk.entity
                )));
            }
        }
    }

    for check in &entity.checks {
        let mut columns = Vec::new();
        check.predicate.collect_columns(&mut columns);
        for col in columns {
            if !entity.has_column(&col.column) {
                return Err(invalid(format!(
                    "check `{}` references unknown column `{}`",
                    check.name, col.column
                )));
            }
        }
    }

    for unique in &entity.uniques {
        for col in &unique.columns {
            if !entity.has_column(col) {
                return Err(invalid(format!(
                    "unique constraint `{}` references unknown column `{}`",
                    unique.name, col
                )));
            }
        }
    }

    for rel in &entity.relationships {
        let target = registry.entities.get(&rel.target).ok_or_else(|| {
            invalid(format!(
                "relationship `{}` targets undeclared entity `{}`",
                rel.name, rel.target
            ))
        })?;

        match &rel.cardinality {
            Cardinality::ManyToOne { fk_column } => {
                if !entity.has_column(fk_column) {
                    return Err(invalid(format!(
                        "relationship `{}` uses unknown local column `{}`",
                        rel.name, fk_column
                    )));
                }
            }
            Cardinality::OneToMany { fk_column } => {
                if !target.has_column(fk_column) {
                    return Err(invalid(format!(
                        "relationship `{}` uses unknown column `{}` on `{}`",
                        rel.name, fk_column, rel.target
                    )));
                }
            }
            Cardinality::ManyToMany {
                association,
                source_key,
                target_key,
            } => {
                let assoc = registry.entities.get(association).ok_or_else(|| {
                    invalid(format!(
                        "relationship `{}` uses undeclared association entity `{}`",
                        rel.name, association
                    ))
                })?;
                for key in [source_key, target_key] {
                    if !assoc.has_column(key) {
                        return Err(invalid(format!(
                            "relationship `{}` uses unknown column `{}` on `{}`",
                            rel.name, key, association
                        )));
                    }
                }
            }
        }

        if let Some(filter) = &rel.filter {
            let mut columns = Vec::new();
            filter.collect_columns(&mut columns);
            for col in columns {
                if !target.has_column(&col.column) {
                    return Err(invalid(format!(
                        "relationship `{}` filter references unknown column `{}` on `{}`",
                        rel.name, col.column, rel.target
                    )));
                }
            }
        }
    }

    Ok(())
}
