// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Deferred-per-parent loading
//!
//! Issues one child fetch per parent (two for many-to-many), mirroring an
//! attribute access that triggers a load on demand. Round trips grow linearly
//! with the parent set, which is exactly the cost profile the batched
//! strategies exist to avoid.

use super::plans;
use super::{LoadedParent, RelationshipLoader};
use crate::registry::Cardinality;
use crate::session::{Session, SessionResult};
use crate::store::{Row, StoreConnection};

pub struct LazyLoader;

impl<C: StoreConnection> RelationshipLoader<C> for LazyLoader {
    fn resolve(
        &self,
        session: &mut Session<C>,
        entity: &str,
        relationship: &str,
        parents: &[Row],
    ) -> SessionResult<Vec<LoadedParent>> {
        let registry = session.registry();
        let bound = plans::bind(&registry, entity, relationship)?;
        let mut out = Vec::with_capacity(parents.len());
        for parent in parents {
            let id = plans::parent_id(parent, &bound)?;
            let children = match &bound.rel.cardinality {
                Cardinality::OneToMany { fk_column } => {
                    let plan =
                        plans::children_of_parent_plan(&registry, &bound, fk_column, id)?;
                    session.execute(&plan)?
                }
                Cardinality::ManyToOne { fk_column } => {
                    match parent.get(fk_column).and_then(crate::value::Value::as_int) {
                        Some(target_id) => {
                            let plan =
                                plans::targets_by_id_plan(&registry, &bound, &[target_id])?;
                            session.execute(&plan)?
                        }
                        None => Vec::new(),
                    }
                }
                Cardinality::ManyToMany {
                    association,
                    source_key,
                    target_key,
                } => {
                    let assoc_pk = bound
                        .association_pk
                        .as_deref()
                        .unwrap_or(&bound.target_pk);
                    let assoc_plan = plans::association_plan(
                        &registry, association, assoc_pk, source_key, &[id],
                    )?;
                    let associations = session.execute(&assoc_plan)?;
                    let target_ids =
                        plans::association_target_ids(&associations, target_key);
                    if target_ids.is_empty() {
                        Vec::new()
                    } else {
                        let plan =
                            plans::targets_by_id_plan(&registry, &bound, &target_ids)?;
                        session.execute(&plan)?
                    }
                }
            };
            out.push(LoadedParent {
                parent: parent.clone(),
                children,
            });
        }
        Ok(out)
    }
}
