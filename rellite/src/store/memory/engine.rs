// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! In-memory table engine
//!
//! Committed rows live in per-entity B-tree tables keyed by primary key.
//! A transaction stages its writes in an overlay that shadows the base
//! tables for its own reads; commit publishes the overlay under the write
//! lock. Primary keys come from per-entity sequences that, like database
//! sequences, do not roll back.

use crate::exec::{evaluator, Dataset, ExecError, ExecResult};
use crate::registry::{ColumnType, EntityDef, OnDelete, OnUpdate, SchemaRegistry};
use crate::store::error::{StoreError, StoreResult};
use crate::store::row::Row;
use crate::store::WriteOp;
use crate::value::Value;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

type RowData = BTreeMap<String, Value>;

#[derive(Debug, Default)]
struct Table {
    rows: BTreeMap<i64, RowData>,
}

/// Shared engine state behind every connection
#[derive(Debug)]
pub(crate) struct StoreInner {
    pub(crate) registry: Arc<SchemaRegistry>,
    tables: RwLock<HashMap<String, Table>>,
    sequences: Mutex<HashMap<String, i64>>,
}

impl StoreInner {
    pub(crate) fn new(registry: Arc<SchemaRegistry>) -> Self {
        let mut tables = HashMap::new();
        let mut sequences = HashMap::new();
        for name in registry.entity_names() {
            tables.insert(name.clone(), Table::default());
            sequences.insert(name, 1i64);
        }
        Self {
            registry,
            tables: RwLock::new(tables),
            sequences: Mutex::new(sequences),
        }
    }

    fn next_id(&self, entity: &str) -> StoreResult<i64> {
        let mut sequences = self.sequences.lock();
        let counter = sequences
            .get_mut(entity)
            .ok_or_else(|| StoreError::Rejected(format!("unknown entity `{}`", entity)))?;
        let id = *counter;
        *counter += 1;
        Ok(id)
    }
}

/// Staged, uncommitted writes of one transaction.
///
/// `Some(row)` shadows (or adds) a row, `None` marks it deleted.
#[derive(Debug, Default)]
pub(crate) struct TxnOverlay {
    staged: HashMap<String, BTreeMap<i64, Option<RowData>>>,
}

impl TxnOverlay {
    fn staged_row(&self, entity: &str, id: i64) -> Option<&Option<RowData>> {
        self.staged.get(entity).and_then(|t| t.get(&id))
    }

    fn stage(&mut self, entity: &str, id: i64, row: Option<RowData>) {
        self.staged
            .entry(entity.to_string())
            .or_default()
            .insert(id, row);
    }
}

/// Transaction-local view of the tables: base rows shadowed by the overlay
pub(crate) struct Snapshot<'a> {
    inner: &'a StoreInner,
    overlay: Option<&'a TxnOverlay>,
}

impl<'a> Snapshot<'a> {
    pub(crate) fn new(inner: &'a StoreInner, overlay: Option<&'a TxnOverlay>) -> Self {
        Self { inner, overlay }
    }

    fn visible(&self, entity: &str) -> ExecResult<BTreeMap<i64, RowData>> {
        let tables = self.inner.tables.read();
        let table = tables
            .get(entity)
            .ok_or_else(|| ExecError::UnknownTable(entity.to_string()))?;
        let mut merged = table.rows.clone();
        if let Some(overlay) = self.overlay {
            if let Some(staged) = overlay.staged.get(entity) {
                for (id, op) in staged {
                    match op {
                        Some(row) => {
                            merged.insert(*id, row.clone());
                        }
                        None => {
                            merged.remove(id);
                        }
                    }
                }
            }
        }
        Ok(merged)
    }

    fn visible_row(&self, entity: &str, id: i64) -> ExecResult<Option<RowData>> {
        if let Some(overlay) = self.overlay {
            if let Some(staged) = overlay.staged_row(entity, id) {
                return Ok(staged.clone());
            }
        }
        let tables = self.inner.tables.read();
        let table = tables
            .get(entity)
            .ok_or_else(|| ExecError::UnknownTable(entity.to_string()))?;
        Ok(table.rows.get(&id).cloned())
    }
}

impl Dataset for Snapshot<'_> {
    fn scan(&self, entity: &str) -> ExecResult<Vec<Row>> {
        Ok(self
            .visible(entity)?
            .into_values()
            .map(Row::from_columns)
            .collect())
    }
}

/// Stage a batch of writes into the overlay, validating every constraint
/// against the transaction's view. Assigned insert ids are returned in
/// submission order.
pub(crate) fn apply_writes(
    inner: &StoreInner,
    overlay: &mut TxnOverlay,
    writes: &[WriteOp],
) -> StoreResult<Vec<i64>> {
    let mut assigned = Vec::new();
    for write in writes {
        match write {
            WriteOp::Insert { entity, values } => {
                let id = insert_row(inner, overlay, entity, values)?;
                assigned.push(id);
            }
            WriteOp::Update {
                entity,
                id,
                changes,
            } => update_row(inner, overlay, entity, *id, changes)?,
            WriteOp::Delete { entity, id } => delete_row(inner, overlay, entity, *id)?,
        }
    }
    Ok(assigned)
}

/// Publish a transaction's overlay into the base tables
pub(crate) fn commit_overlay(inner: &StoreInner, overlay: TxnOverlay) {
    let mut tables = inner.tables.write();
    for (entity, staged) in overlay.staged {
        if let Some(table) = tables.get_mut(&entity) {
            for (id, op) in staged {
                match op {
                    Some(row) => {
                        table.rows.insert(id, row);
                    }
                    None => {
                        table.rows.remove(&id);
                    }
                }
            }
        }
    }
}

fn entity_def<'a>(inner: &'a StoreInner, entity: &str) -> StoreResult<&'a EntityDef> {
    inner
        .registry
        .entity(entity)
        .map_err(|e| StoreError::Rejected(e.to_string()))
}

fn insert_row(
    inner: &StoreInner,
    overlay: &mut TxnOverlay,
    entity: &str,
    values: &RowData,
) -> StoreResult<i64> {
    let def = entity_def(inner, entity)?;
    if values.contains_key(&def.primary_key) {
        return Err(StoreError::Rejected(format!(
            "primary key `{}` of `{}` is store-assigned",
            def.primary_key, entity
        )));
    }
    for key in values.keys() {
        if !def.has_column(key) {
            return Err(StoreError::Rejected(format!(
                "unknown column `{}` on `{}`",
                key, entity
            )));
        }
    }

    let id = inner.next_id(entity)?;
    let mut row: RowData = BTreeMap::new();
    row.insert(def.primary_key.clone(), Value::Int(id));
    for column in &def.columns {
        if column.name == def.primary_key {
            continue;
        }
        let value = match values.get(&column.name) {
            Some(v) => v.clone(),
            None => match column.default {
                crate::registry::DefaultPolicy::ServerTimestamp => {
                    Value::Timestamp(Utc::now())
                }
                crate::registry::DefaultPolicy::None => Value::Null,
            },
        };
        row.insert(column.name.clone(), value);
    }

    validate_row(inner, overlay, def, &row, id)?;
    overlay.stage(entity, id, Some(row));
    Ok(id)
}

fn update_row(
    inner: &StoreInner,
    overlay: &mut TxnOverlay,
    entity: &str,
    id: i64,
    changes: &RowData,
) -> StoreResult<()> {
    let def = entity_def(inner, entity)?;
    let snapshot = Snapshot::new(inner, Some(overlay));
    let mut row = snapshot
        .visible_row(entity, id)
        .map_err(|e| StoreError::Rejected(e.to_string()))?
        .ok_or(StoreError::RowNotFound {
            entity: entity.to_string(),
            id,
        })?;

    for (key, value) in changes {
        if key == &def.primary_key {
            return Err(StoreError::Rejected(format!(
                "primary key `{}` of `{}` is immutable",
                key, entity
            )));
        }
        if !def.has_column(key) {
            return Err(StoreError::Rejected(format!(
                "unknown column `{}` on `{}`",
                key, entity
            )));
        }
        row.insert(key.clone(), value.clone());
    }
    for column in &def.columns {
        if column.on_update == OnUpdate::ServerTimestamp {
            row.insert(column.name.clone(), Value::Timestamp(Utc::now()));
        }
    }

    validate_row(inner, overlay, def, &row, id)?;
    overlay.stage(entity, id, Some(row));
    Ok(())
}

fn delete_row(
    inner: &StoreInner,
    overlay: &mut TxnOverlay,
    entity: &str,
    id: i64,
) -> StoreResult<()> {
    // already staged as deleted: nothing to do, also breaks FK cycles
    if matches!(overlay.staged_row(entity, id), Some(None)) {
        return Ok(());
    }
    {
        let snapshot = Snapshot::new(inner, Some(overlay));
        let existing = snapshot
            .visible_row(entity, id)
            .map_err(|e| StoreError::Rejected(e.to_string()))?;
        if existing.is_none() {
            return Err(StoreError::RowNotFound {
                entity: entity.to_string(),
                id,
            });
        }
    }
    overlay.stage(entity, id, None);

    // cascade through reverse foreign keys
    let referencing: Vec<(String, String, OnDelete)> = inner
        .registry
        .referencing_columns(entity)
        .into_iter()
        .map(|(def, col)| {
            (
                def.name.clone(),
                col.name.clone(),
                col.references
                    .as_ref()
                    .map(|r| r.on_delete)
                    .unwrap_or(OnDelete::Restrict),
            )
        })
        .collect();

    for (ref_entity, ref_column, on_delete) in referencing {
        let dependent_ids: Vec<i64> = {
            let snapshot = Snapshot::new(inner, Some(overlay));
            let rows = snapshot
                .visible(&ref_entity)
                .map_err(|e| StoreError::Rejected(e.to_string()))?;
            rows.iter()
                .filter(|(_, row)| {
                    row.get(&ref_column).and_then(Value::as_int) == Some(id)
                })
                .map(|(rid, _)| *rid)
                .collect()
        };
        if dependent_ids.is_empty() {
            continue;
        }
        match on_delete {
            OnDelete::Cascade => {
                for dependent in dependent_ids {
                    delete_row(inner, overlay, &ref_entity, dependent)?;
                }
            }
            OnDelete::Restrict => {
                return Err(StoreError::constraint(
                    entity,
                    format!("fk_{}_{}", ref_entity, ref_column),
                    format!(
                        "{} rows in `{}` still reference id {}",
                        dependent_ids.len(),
                        ref_entity,
                        id
                    ),
                ));
            }
        }
    }
    Ok(())
}

/// Enforce declared constraints on a candidate row: types, bounds, enum
/// membership, not-null, foreign keys, checks, and uniques
fn validate_row(
    inner: &StoreInner,
    overlay: &TxnOverlay,
    def: &EntityDef,
    row: &RowData,
    row_id: i64,
) -> StoreResult<()> {
    for column in &def.columns {
        let value = row.get(&column.name).unwrap_or(&Value::Null);

        if value.is_null() {
            if !column.nullable && column.name != def.primary_key {
                return Err(StoreError::constraint(
                    &def.name,
                    format!("not_null_{}", column.name),
                    format!("column `{}` cannot be null", column.name),
                ));
            }
            continue;
        }

        match &column.ty {
            ColumnType::Int => {
                if value.as_int().is_none() {
                    return Err(type_violation(def, column.name.as_str(), value));
                }
            }
            ColumnType::Text { max_len } => match value.as_text() {
                Some(text) => {
                    if let Some(max) = max_len {
                        if text.chars().count() > *max {
                            return Err(StoreError::constraint(
                                &def.name,
                                format!("length_{}", column.name),
                                format!(
                                    "value exceeds {} characters for `{}`",
                                    max, column.name
                                ),
                            ));
                        }
                    }
                }
                None => return Err(type_violation(def, column.name.as_str(), value)),
            },
            ColumnType::Enum { variants } => match value.as_text() {
                Some(text) if variants.iter().any(|v| v == text) => {}
                _ => {
                    return Err(StoreError::constraint(
                        &def.name,
                        format!("enum_{}", column.name),
                        format!(
                            "`{}` is not a valid `{}` value",
                            value, column.name
                        ),
                    ))
                }
            },
            ColumnType::Timestamp => {
                if value.as_timestamp().is_none() {
                    return Err(type_violation(def, column.name.as_str(), value));
                }
            }
        }

        if let Some(fk) = &column.references {
            let target_id = value.as_int().ok_or_else(|| {
                type_violation(def, column.name.as_str(), value)
            })?;
            let snapshot = Snapshot::new(inner, Some(overlay));
            let exists = snapshot
                .visible_row(&fk.entity, target_id)
                .map_err(|e| StoreError::Rejected(e.to_string()))?
                .is_some();
            if !exists {
                return Err(StoreError::constraint(
                    &def.name,
                    format!("fk_{}", column.name),
                    format!("no `{}` row with id {}", fk.entity, target_id),
                ));
            }
        }
    }

    let as_row = Row::from_columns(row.clone());
    for check in &def.checks {
        let holds = evaluator::check_holds(&check.predicate, &as_row)
            .map_err(|e| StoreError::Rejected(e.to_string()))?;
        if !holds {
            return Err(StoreError::constraint(
                &def.name,
                &check.name,
                "check constraint violated".to_string(),
            ));
        }
    }

    for unique in &def.uniques {
        let candidate: Vec<&Value> = unique
            .columns
            .iter()
            .map(|c| row.get(c).unwrap_or(&Value::Null))
            .collect();
        if candidate.iter().any(|v| v.is_null()) {
            continue;
        }
        let snapshot = Snapshot::new(inner, Some(overlay));
        let rows = snapshot
            .visible(&def.name)
            .map_err(|e| StoreError::Rejected(e.to_string()))?;
        for (other_id, other) in rows {
            if other_id == row_id {
                continue;
            }
            let same = unique
                .columns
                .iter()
                .zip(candidate.iter())
                .all(|(col, value)| other.get(col) == Some(*value));
            if same {
                return Err(StoreError::constraint(
                    &def.name,
                    &unique.name,
                    format!("duplicate value for ({})", unique.columns.join(", ")),
                ));
            }
        }
    }

    Ok(())
}

fn type_violation(def: &EntityDef, column: &str, value: &Value) -> StoreError {
    StoreError::constraint(
        &def.name,
        format!("type_{}", column),
        format!("{} value not valid for column `{}`", value.type_name(), column),
    )
}
