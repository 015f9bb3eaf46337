// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Relationship loading strategies
//!
//! A relationship declared in the registry can be materialized three ways:
//! deferred per parent ([`LazyLoader`]), in one joined fetch
//! ([`JoinedLoader`]), or batched with the parent keys in an `IN` predicate
//! ([`SelectInLoader`]). The strategies trade round trips against payload
//! shape but are observationally equivalent: for the same parents and the
//! same relationship they produce identical object graphs, including any
//! filter the relationship declares and the by-primary-key ordering of each
//! child list.

mod joined;
mod lazy;
mod plans;
mod select_in;

pub use joined::JoinedLoader;
pub use lazy::LazyLoader;
pub use select_in::SelectInLoader;

use crate::registry::Cardinality;
use crate::session::{AsyncSession, Session, SessionResult};
use crate::store::{AsyncStoreConnection, Row, StoreConnection};
use serde::{Deserialize, Serialize};

/// Which loading strategy to spend round trips on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStrategy {
    /// One child fetch per parent, issued on demand
    Lazy,
    /// One combined fetch through a left-outer join
    Joined,
    /// One batched child fetch keyed by the parent id set
    SelectIn,
}

impl LoadStrategy {
    /// The loader implementing this strategy
    pub fn loader<C: StoreConnection>(self) -> Box<dyn RelationshipLoader<C>> {
        match self {
            LoadStrategy::Lazy => Box::new(LazyLoader),
            LoadStrategy::Joined => Box::new(JoinedLoader),
            LoadStrategy::SelectIn => Box::new(SelectInLoader),
        }
    }
}

/// One parent row with its resolved children
///
/// `children` is empty for parents with no related rows, holds at most one
/// row for many-to-one relationships, and is always sorted by the child
/// primary key ascending.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedParent {
    pub parent: Row,
    pub children: Vec<Row>,
}

/// Resolves a declared relationship for a set of already-fetched parents
pub trait RelationshipLoader<C: StoreConnection> {
    /// Attach the related rows of `relationship` to each row in `parents`
    ///
    /// # Arguments
    /// * `session` - Session the child fetches run on
    /// * `entity` - Entity the parents were fetched from
    /// * `relationship` - Declared relationship name on that entity
    /// * `parents` - Parent rows, returned back in this order
    ///
    /// # Returns
    /// One [`LoadedParent`] per input parent, or a `ConfigurationError` when
    /// the relationship is not declared on the entity.
    fn resolve(
        &self,
        session: &mut Session<C>,
        entity: &str,
        relationship: &str,
        parents: &[Row],
    ) -> SessionResult<Vec<LoadedParent>>;
}

/// Resolve a relationship on an async session
///
/// Mirrors [`RelationshipLoader::resolve`] for the async execution mode,
/// dispatching on the strategy directly since async trait objects would
/// force a boxed future per fetch.
pub async fn resolve_async<C: AsyncStoreConnection>(
    strategy: LoadStrategy,
    session: &mut AsyncSession<C>,
    entity: &str,
    relationship: &str,
    parents: &[Row],
) -> SessionResult<Vec<LoadedParent>> {
    let registry = session.registry();
    let bound = plans::bind(&registry, entity, relationship)?;
    match strategy {
        LoadStrategy::Lazy => {
            let mut out = Vec::with_capacity(parents.len());
            for parent in parents {
                let id = plans::parent_id(parent, &bound)?;
                let children = match &bound.rel.cardinality {
                    Cardinality::OneToMany { fk_column } => {
                        let plan = plans::children_of_parent_plan(
                            &registry, &bound, fk_column, id,
                        )?;
                        session.execute(&plan).await?
                    }
                    Cardinality::ManyToOne { fk_column } => {
                        match parent.get(fk_column).and_then(crate::value::Value::as_int) {
                            Some(target_id) => {
                                let plan = plans::targets_by_id_plan(
                                    &registry,
                                    &bound,
                                    &[target_id],
                                )?;
                                session.execute(&plan).await?
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
                        let associations = session.execute(&assoc_plan).await?;
                        let target_ids =
                            plans::association_target_ids(&associations, target_key);
                        if target_ids.is_empty() {
                            Vec::new()
                        } else {
                            let plan =
                                plans::targets_by_id_plan(&registry, &bound, &target_ids)?;
                            session.execute(&plan).await?
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
        LoadStrategy::Joined => {
            let ids = plans::parent_ids(parents, &bound)?;
            let plan = plans::joined_plan(&registry, &bound, &ids)?;
            let rows = session.execute(&plan).await?;
            plans::stitch_joined(parents, rows, &bound)
        }
        LoadStrategy::SelectIn => {
            let ids = plans::parent_ids(parents, &bound)?;
            match bound.rel.cardinality.clone() {
                Cardinality::OneToMany { fk_column } => {
                    let plan =
                        plans::children_in_set_plan(&registry, &bound, &fk_column, &ids)?;
                    let children = session.execute(&plan).await?;
                    plans::stitch_by_fk(parents, children, &bound, &fk_column)
                }
                Cardinality::ManyToOne { fk_column } => {
                    let mut target_ids = Vec::new();
                    for parent in parents {
                        if let Some(id) =
                            parent.get(&fk_column).and_then(crate::value::Value::as_int)
                        {
                            if !target_ids.contains(&id) {
                                target_ids.push(id);
                            }
                        }
                    }
                    let targets = if target_ids.is_empty() {
                        Vec::new()
                    } else {
                        let plan =
                            plans::targets_by_id_plan(&registry, &bound, &target_ids)?;
                        session.execute(&plan).await?
                    };
                    let mut out = Vec::with_capacity(parents.len());
                    for parent in parents {
                        let fk =
                            parent.get(&fk_column).and_then(crate::value::Value::as_int);
                        let children = targets
                            .iter()
                            .filter(|t| {
                                t.get(&bound.target_pk)
                                    .and_then(crate::value::Value::as_int)
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
                    let associations = session.execute(&assoc_plan).await?;
                    let target_ids =
                        plans::association_target_ids(&associations, &target_key);
                    let targets = if target_ids.is_empty() {
                        Vec::new()
                    } else {
                        let plan =
                            plans::targets_by_id_plan(&registry, &bound, &target_ids)?;
                        session.execute(&plan).await?
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
}
