// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Shared plan construction and stitching for the loading strategies
//!
//! Every strategy resolves the same relationship through these helpers, so
//! the declared join predicate and the children-by-primary-key ordering are
//! applied identically no matter how many round trips a strategy spends.

use super::LoadedParent;
use crate::plan::{Predicate, QueryBuilder, QueryPlan, SortDirection, ValidationError};
use crate::registry::{Cardinality, RelationshipDef, SchemaRegistry};
use crate::session::{SessionError, SessionResult};
use crate::store::Row;
use crate::value::Value;
use std::collections::HashMap;

/// A relationship resolved against the registry, with the key columns both
/// sides stitch on
pub(crate) struct BoundRelationship {
    pub parent_entity: String,
    pub parent_pk: String,
    pub rel: RelationshipDef,
    pub target_pk: String,
    /// Primary key of the association entity, for many-to-many
    pub association_pk: Option<String>,
}

/// Look the relationship up; an undeclared name is a `ConfigurationError`
pub(crate) fn bind(
    registry: &SchemaRegistry,
    entity: &str,
    relationship: &str,
) -> SessionResult<BoundRelationship> {
    let parent = registry.entity(entity)?;
    let rel = registry.relationship(entity, relationship)?.clone();
    let target = registry.entity(&rel.target)?;
    let association_pk = match &rel.cardinality {
        Cardinality::ManyToMany { association, .. } => {
            Some(registry.entity(association)?.primary_key.clone())
        }
        _ => None,
    };
    Ok(BoundRelationship {
        parent_entity: parent.name.clone(),
        parent_pk: parent.primary_key.clone(),
        target_pk: target.primary_key.clone(),
        rel,
        association_pk,
    })
}

/// Primary key of one already-fetched parent row
pub(crate) fn parent_id(row: &Row, bound: &BoundRelationship) -> SessionResult<i64> {
    row.get(&bound.parent_pk)
        .and_then(Value::as_int)
        .ok_or_else(|| {
            SessionError::Validation(ValidationError::UnknownColumn {
                source: bound.parent_entity.clone(),
                column: bound.parent_pk.clone(),
            })
        })
}

/// Distinct parent ids in first-seen order
pub(crate) fn parent_ids(
    parents: &[Row],
    bound: &BoundRelationship,
) -> SessionResult<Vec<i64>> {
    let mut ids = Vec::with_capacity(parents.len());
    for parent in parents {
        let id = parent_id(parent, bound)?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

fn with_relationship_filter(key_predicate: Predicate, rel: &RelationshipDef) -> Predicate {
    match &rel.filter {
        Some(filter) => Predicate::And(vec![key_predicate, filter.clone()]),
        None => key_predicate,
    }
}

/// Children of a single parent (deferred-per-parent, one-to-many)
pub(crate) fn children_of_parent_plan(
    registry: &SchemaRegistry,
    bound: &BoundRelationship,
    fk_column: &str,
    parent: i64,
) -> SessionResult<QueryPlan> {
    let plan = QueryBuilder::new(registry)
        .select(bound.rel.target.clone())
        .filter(with_relationship_filter(
            Predicate::eq(fk_column, parent),
            &bound.rel,
        ))
        .order_by_column(bound.target_pk.clone(), SortDirection::Ascending)
        .build()?;
    Ok(plan)
}

/// Children of a whole parent set (batched-by-key, one-to-many)
pub(crate) fn children_in_set_plan(
    registry: &SchemaRegistry,
    bound: &BoundRelationship,
    fk_column: &str,
    parents: &[i64],
) -> SessionResult<QueryPlan> {
    let values = parents.iter().map(|id| Value::Int(*id)).collect();
    let plan = QueryBuilder::new(registry)
        .select(bound.rel.target.clone())
        .filter(with_relationship_filter(
            Predicate::in_set(fk_column, values),
            &bound.rel,
        ))
        .order_by_column(bound.target_pk.clone(), SortDirection::Ascending)
        .build()?;
    Ok(plan)
}

/// Target rows by primary key (the second fetch of many-to-many loading)
pub(crate) fn targets_by_id_plan(
    registry: &SchemaRegistry,
    bound: &BoundRelationship,
    ids: &[i64],
) -> SessionResult<QueryPlan> {
    let values = ids.iter().map(|id| Value::Int(*id)).collect();
    let plan = QueryBuilder::new(registry)
        .select(bound.rel.target.clone())
        .filter(with_relationship_filter(
            Predicate::in_set(bound.target_pk.clone(), values),
            &bound.rel,
        ))
        .order_by_column(bound.target_pk.clone(), SortDirection::Ascending)
        .build()?;
    Ok(plan)
}

/// Association rows whose source key falls in the parent id set
pub(crate) fn association_plan(
    registry: &SchemaRegistry,
    association: &str,
    association_pk: &str,
    source_key: &str,
    parents: &[i64],
) -> SessionResult<QueryPlan> {
    let values = parents.iter().map(|id| Value::Int(*id)).collect();
    let plan = QueryBuilder::new(registry)
        .select(association)
        .filter(Predicate::in_set(source_key, values))
        .order_by_column(association_pk, SortDirection::Ascending)
        .build()?;
    Ok(plan)
}

/// One combined fetch: parent joined to the relationship, restricted to the
/// requested parents
pub(crate) fn joined_plan(
    registry: &SchemaRegistry,
    bound: &BoundRelationship,
    parents: &[i64],
) -> SessionResult<QueryPlan> {
    let values = parents.iter().map(|id| Value::Int(*id)).collect();
    let plan = QueryBuilder::new(registry)
        .select(bound.parent_entity.clone())
        .join(bound.rel.name.clone())
        .filter(Predicate::in_set(bound.parent_pk.clone(), values))
        .build()?;
    Ok(plan)
}

/// Attach fetched children to their parents, in parent input order, each
/// child list sorted by primary key ascending
pub(crate) fn stitch_by_fk(
    parents: &[Row],
    children: Vec<Row>,
    bound: &BoundRelationship,
    fk_column: &str,
) -> SessionResult<Vec<LoadedParent>> {
    let mut by_fk: HashMap<i64, Vec<Row>> = HashMap::new();
    for child in children {
        if let Some(fk) = child.get(fk_column).and_then(Value::as_int) {
            by_fk.entry(fk).or_default().push(child);
        }
    }
    let mut out = Vec::with_capacity(parents.len());
    for parent in parents {
        let id = parent_id(parent, bound)?;
        let mut attached = by_fk.get(&id).cloned().unwrap_or_default();
        sort_by_pk(&mut attached, &bound.target_pk);
        out.push(LoadedParent {
            parent: parent.clone(),
            children: attached,
        });
    }
    Ok(out)
}

/// Attach many-to-many peers via the association's key pairs
pub(crate) fn stitch_by_association(
    parents: &[Row],
    associations: &[Row],
    targets: Vec<Row>,
    bound: &BoundRelationship,
    source_key: &str,
    target_key: &str,
) -> SessionResult<Vec<LoadedParent>> {
    let mut targets_by_pk: HashMap<i64, Row> = HashMap::new();
    for target in targets {
        if let Some(pk) = target.get(&bound.target_pk).and_then(Value::as_int) {
            targets_by_pk.insert(pk, target);
        }
    }
    let mut peers: HashMap<i64, Vec<Row>> = HashMap::new();
    for assoc in associations {
        let src = assoc.get(source_key).and_then(Value::as_int);
        let dst = assoc.get(target_key).and_then(Value::as_int);
        if let (Some(src), Some(dst)) = (src, dst) {
            if let Some(target) = targets_by_pk.get(&dst) {
                peers.entry(src).or_default().push(target.clone());
            }
        }
    }
    let mut out = Vec::with_capacity(parents.len());
    for parent in parents {
        let id = parent_id(parent, bound)?;
        let mut attached = peers.get(&id).cloned().unwrap_or_default();
        sort_by_pk(&mut attached, &bound.target_pk);
        out.push(LoadedParent {
            parent: parent.clone(),
            children: attached,
        });
    }
    Ok(out)
}

/// Split joined fetch rows back into per-parent child lists
pub(crate) fn stitch_joined(
    parents: &[Row],
    joined: Vec<Row>,
    bound: &BoundRelationship,
) -> SessionResult<Vec<LoadedParent>> {
    let mut by_parent: HashMap<i64, Vec<Row>> = HashMap::new();
    for row in joined {
        let pid = match row.get(&bound.parent_pk).and_then(Value::as_int) {
            Some(pid) => pid,
            None => continue,
        };
        let child = row.extract_prefixed(&bound.rel.name);
        // a left-outer row with no match carries a null child primary key
        if child.get(&bound.target_pk).map(|v| !v.is_null()) == Some(true) {
            by_parent.entry(pid).or_default().push(child);
        } else {
            by_parent.entry(pid).or_default();
        }
    }
    let mut out = Vec::with_capacity(parents.len());
    for parent in parents {
        let id = parent_id(parent, bound)?;
        let mut attached = by_parent.get(&id).cloned().unwrap_or_default();
        sort_by_pk(&mut attached, &bound.target_pk);
        out.push(LoadedParent {
            parent: parent.clone(),
            children: attached,
        });
    }
    Ok(out)
}

pub(crate) fn sort_by_pk(rows: &mut [Row], pk: &str) {
    rows.sort_by_key(|row| row.get(pk).and_then(Value::as_int).unwrap_or(i64::MAX));
}

/// Target ids referenced by a set of association rows, in association order
pub(crate) fn association_target_ids(associations: &[Row], target_key: &str) -> Vec<i64> {
    let mut ids = Vec::with_capacity(associations.len());
    for assoc in associations {
        if let Some(id) = assoc.get(target_key).and_then(Value::as_int) {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }
    ids
}
