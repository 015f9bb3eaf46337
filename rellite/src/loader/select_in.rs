// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Batched-by-key loading
//!
//! One extra fetch covers the whole parent set: children are selected with
//! the parent keys in an `IN` predicate and stitched back by foreign key.
//! Many-to-many relationships spend a third fetch on the association rows.
//! Child rows are never duplicated across the wire, unlike joined loading
//! where each child repeats its parent's columns.

use super::plans;
use super::{LoadedParent, RelationshipLoader};
use crate::registry::Cardinality;
use crate::session::{Session, SessionResult};
use crate::store::{Row, StoreConnection};

pub struct SelectInLoader;

impl<C: StoreConnection> RelationshipLoader<C> for SelectInLoader {
    fn resolve(
        &self,
        session: &mut Session<C>,
        entity: &str,
        relationship: &str,
        parents: &[Row],
    ) -> SessionResult<Vec<LoadedParent>> {
        let registry = session.registry();
        let bound = plans::bind(&registry, entity, relationship)?;
        let ids = plans::parent_ids(parents, &bound)?;
        match bound.rel.cardinality.clone() {
            Cardinality::OneToMany { fk_column } => {
                let plan = plans::children_in_set_plan(&registry, &bound, &fk_column, &ids)?;
                let children = session.execute(&plan)?;
                plans::stitch_by_fk(parents, children, &bound, &fk_column)
            }
            Cardinality::ManyToOne { fk_column } => {
                let target_ids: Vec<i64> = {
                    let mut seen = Vec::new();
                    for parent in parents {
                        if let Some(id) =
                            parent.get(&fk_column).and_then(crate::value::Value::as_int)
                        {
                            if !seen.contains(&id) {
                                seen.push(id);
                            }
                        }
                    }
                    seen
                };
                let targets = if target_ids.is_empty() {
                    Vec::new()
                } else {
                    let plan = plans::targets_by_id_plan(&registry, &bound, &target_ids)?;
                    session.execute(&plan)?
                };
                let mut out = Vec::with_capacity(parents.len());
                for parent in parents {
                    let fk = parent.get(&fk_column).and_then(crate::value::Value::as_int);
                    let children = targets
                        .iter()
                        .filter(|t| {
                            t.get(&bound.target_pk).and_then(crate::value::Value::as_int)
                                == fk
                        })
                        .cloned()
                        .collect();
                    out.push(LoadedParent {
                        parent: parent.clone(),
                        children,
                    });
                }
                Ok(out)
            }
            Cardinality::ManyToMany {
                association,
                source_key,
                target_key,
            } => {
                let assoc_pk = bound
                    .association_pk
                    .clone()
                    .unwrap_or_else(|| bound.target_pk.clone());
                let assoc_plan = plans::association_plan(
                    &registry,
                    &association,
                    &assoc_pk,
                    &source_key,
                    &ids,
                )?;
                let associations = session.execute(&assoc_plan)?;
                let target_ids = plans::association_target_ids(&associations, &target_key);
                let targets = if target_ids.is_empty() {
                    Vec::new()
                } else {
                    let plan = plans::targets_by_id_plan(&registry, &bound, &target_ids)?;
                    session.execute(&plan)?
                };
                plans::stitch_by_association(
                    parents,
                    &associations,
                    targets,
                    &bound,
                    &source_key,
                    &target_key,
                )
            }
        }
    }
}
