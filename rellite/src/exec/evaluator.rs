// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Query plan evaluator

use super::error::{ExecError, ExecResult};
use super::Dataset;
use crate::plan::expr::{
    AggregateFn, BinaryOp, CmpOp, ColumnRef, Predicate, ScalarExpr, SortDirection,
};
use crate::plan::{Join, Projection, QueryPlan, SourceRef};
use crate::registry::{Cardinality, SchemaRegistry};
use crate::store::Row;
use crate::value::Value;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Evaluates query plans over a dataset snapshot
pub struct Evaluator<'a> {
    registry: &'a SchemaRegistry,
    data: &'a dyn Dataset,
    params: &'a HashMap<String, Value>,
}

/// Evaluation context for a single scalar/predicate evaluation.
///
/// `group` is set inside grouped queries, `window_rows` inside ungrouped
/// queries so windowed aggregates can see the whole filtered row set.
struct EvalCtx<'a> {
    params: &'a HashMap<String, Value>,
    group: Option<&'a [Row]>,
    window_rows: Option<&'a [Row]>,
}

impl<'a> Evaluator<'a> {
    pub fn new(
        registry: &'a SchemaRegistry,
        data: &'a dyn Dataset,
        params: &'a HashMap<String, Value>,
    ) -> Self {
        Self {
            registry,
            data,
            params,
        }
    }

    /// Run the full pipeline for one plan
    pub fn evaluate(&self, plan: &QueryPlan) -> ExecResult<Vec<Row>> {
        let mut rows = self.source_rows(plan)?;

        if let Some(join) = &plan.join {
            rows = self.join_rows(plan, join, rows)?;
        }

        if let Some(filter) = &plan.filter {
            let ctx = self.plain_ctx();
            let mut kept = Vec::with_capacity(rows.len());
            for row in rows {
                if eval_predicate(filter, &row, &ctx)? {
                    kept.push(row);
                }
            }
            rows = kept;
        }

        let mut out = if plan.group_by.is_empty() {
            self.project_rows(plan, &rows)?
        } else {
            self.project_groups(plan, &rows)?
        };

        if !plan.order_by.is_empty() {
            self.order_rows(plan, &mut out)?;
        }

        if let Some(limit) = plan.limit {
            out.truncate(limit);
        }

        Ok(out)
    }

    fn plain_ctx(&self) -> EvalCtx<'a> {
        EvalCtx {
            params: self.params,
            group: None,
            window_rows: None,
        }
    }

    /// Resolve the plan's source: an entity scan or a recursively evaluated
    /// derived table
    fn source_rows(&self, plan: &QueryPlan) -> ExecResult<Vec<Row>> {
        match &plan.source {
            SourceRef::Entity(name) => self.data.scan(name),
            SourceRef::Derived(name) => {
                let table = plan
                    .find_derived(name)
                    .ok_or_else(|| ExecError::UnknownDerivedTable(name.clone()))?;
                self.evaluate(&table.plan)
            }
        }
    }

    /// Left-outer relationship join: every parent row survives; matching
    /// child rows fan out, non-matching parents carry null child columns.
    /// The relationship's declared filter is applied to the child side
    /// before matching, so every consumer sees the same filtered subset.
    fn join_rows(&self, plan: &QueryPlan, join: &Join, parents: Vec<Row>) -> ExecResult<Vec<Row>> {
        let parent_name = match &plan.source {
            SourceRef::Entity(name) => name,
            SourceRef::Derived(name) => return Err(ExecError::UnknownTable(name.clone())),
        };
        let parent_def = self.registry.entity(parent_name)?;
        let rel = self.registry.relationship(parent_name, &join.relationship)?;
        let target_def = self.registry.entity(&rel.target)?;
        let target_pk = target_def.primary_key.as_str();

        let mut targets = self.data.scan(&rel.target)?;
        if let Some(filter) = &rel.filter {
            let ctx = self.plain_ctx();
            let mut kept = Vec::with_capacity(targets.len());
            for row in targets {
                if eval_predicate(filter, &row, &ctx)? {
                    kept.push(row);
                }
            }
            targets = kept;
        }

        let target_columns = target_def.column_names();
        let prefix = &join.relationship;
        let mut out = Vec::new();

        match &rel.cardinality {
            Cardinality::OneToMany { fk_column } => {
                let mut by_fk: HashMap<i64, Vec<&Row>> = HashMap::new();
                for child in &targets {
                    if let Some(fk) = child.get(fk_column).and_then(Value::as_int) {
                        by_fk.entry(fk).or_default().push(child);
                    }
                }
                for parent in &parents {
                    let pid = parent.get(&parent_def.primary_key).and_then(Value::as_int);
                    let children = pid.and_then(|id| by_fk.get(&id));
                    match children {
                        Some(children) if !children.is_empty() => {
                            for child in children {
                                out.push(combine(parent, Some(child), prefix, &target_columns));
                            }
                        }
                        _ => out.push(combine(parent, None, prefix, &target_columns)),
                    }
                }
            }
            Cardinality::ManyToOne { fk_column } => {
                let mut by_pk: HashMap<i64, &Row> = HashMap::new();
                for target in &targets {
                    if let Some(pk) = target.get(target_pk).and_then(Value::as_int) {
                        by_pk.insert(pk, target);
                    }
                }
                for parent in &parents {
                    let target = parent
                        .get(fk_column)
                        .and_then(Value::as_int)
                        .and_then(|fk| by_pk.get(&fk).copied());
                    out.push(combine(parent, target, prefix, &target_columns));
                }
            }
            Cardinality::ManyToMany {
                association,
                source_key,
                target_key,
            } => {
                let assoc_rows = self.data.scan(association)?;
                let mut by_pk: HashMap<i64, &Row> = HashMap::new();
                for target in &targets {
                    if let Some(pk) = target.get(target_pk).and_then(Value::as_int) {
                        by_pk.insert(pk, target);
                    }
                }
                let mut peers: HashMap<i64, Vec<&Row>> = HashMap::new();
                for assoc in &assoc_rows {
                    let src = assoc.get(source_key).and_then(Value::as_int);
                    let dst = assoc.get(target_key).and_then(Value::as_int);
                    if let (Some(src), Some(dst)) = (src, dst) {
                        // rel.filter already dropped filtered-out peers from by_pk
                        if let Some(peer) = by_pk.get(&dst) {
                            peers.entry(src).or_default().push(*peer);
                        }
                    }
                }
                for list in peers.values_mut() {
                    list.sort_by(|a, b| {
                        let a = a.get(target_pk).and_then(Value::as_int).unwrap_or(0);
                        let b = b.get(target_pk).and_then(Value::as_int).unwrap_or(0);
                        a.cmp(&b)
                    });
                }
                for parent in &parents {
                    let pid = parent.get(&parent_def.primary_key).and_then(Value::as_int);
                    let list = pid.and_then(|id| peers.get(&id));
                    match list {
                        Some(list) if !list.is_empty() => {
                            for peer in list {
                                out.push(combine(parent, Some(peer), prefix, &target_columns));
                            }
                        }
                        _ => out.push(combine(parent, None, prefix, &target_columns)),
                    }
                }
            }
        }

        Ok(out)
    }

    /// Ungrouped projection; windowed aggregates see the whole filtered set
    fn project_rows(&self, plan: &QueryPlan, rows: &[Row]) -> ExecResult<Vec<Row>> {
        let ctx = EvalCtx {
            params: self.params,
            group: None,
            window_rows: Some(rows),
        };
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let mut projected = Row::new();
            for projection in &plan.projections {
                match projection {
                    Projection::AllColumns => {
                        for (key, value) in row.iter() {
                            projected.set(key.clone(), value.clone());
                        }
                    }
                    Projection::Column { column, alias } => {
                        let key = column.key();
                        let value = row
                            .get(&key)
                            .cloned()
                            .ok_or_else(|| ExecError::UnknownColumn(key.clone()))?;
                        projected.set(alias.clone().unwrap_or(key), value);
                    }
                    Projection::Expr { expr, alias } => {
                        let value = eval_scalar(expr, row, &ctx)?;
                        projected.set(alias.clone(), value);
                    }
                }
            }
            out.push(projected);
        }
        Ok(out)
    }

    /// Grouped projection with HAVING. Groups are emitted in ascending key
    /// order so grouped results are deterministic.
    fn project_groups(&self, plan: &QueryPlan, rows: &[Row]) -> ExecResult<Vec<Row>> {
        let mut keys: Vec<Vec<Value>> = Vec::new();
        let mut groups: Vec<Vec<Row>> = Vec::new();
        let ctx = self.plain_ctx();

        for row in rows {
            let mut key = Vec::with_capacity(plan.group_by.len());
            for col in &plan.group_by {
                key.push(eval_column(col, row)?);
            }
            match keys.iter().position(|k| k == &key) {
                Some(idx) => groups[idx].push(row.clone()),
                None => {
                    keys.push(key);
                    groups.push(vec![row.clone()]);
                }
            }
        }

        let mut order: Vec<usize> = (0..keys.len()).collect();
        order.sort_by(|&a, &b| compare_key_vecs(&keys[a], &keys[b]));

        let mut out = Vec::new();
        for idx in order {
            let group = &groups[idx];
            let representative = &group[0];
            let group_ctx = EvalCtx {
                params: ctx.params,
                group: Some(group),
                window_rows: None,
            };

            if let Some(having) = &plan.having {
                if !eval_predicate(having, representative, &group_ctx)? {
                    continue;
                }
            }

            let mut projected = Row::new();
            for projection in &plan.projections {
                match projection {
                    Projection::AllColumns => {
                        return Err(ExecError::TypeMismatch(
                            "cannot project all columns in a grouped query".to_string(),
                        ))
                    }
                    Projection::Column { column, alias } => {
                        let value = eval_column(column, representative)?;
                        projected.set(alias.clone().unwrap_or_else(|| column.key()), value);
                    }
                    Projection::Expr { expr, alias } => {
                        let value = eval_scalar(expr, representative, &group_ctx)?;
                        projected.set(alias.clone(), value);
                    }
                }
            }
            out.push(projected);
        }
        Ok(out)
    }

    /// Sort output rows. Rows are pre-sorted by primary key ascending when
    /// an `id` column is present, then stably sorted by the requested keys,
    /// so ties keep primary-key order.
    fn order_rows(&self, plan: &QueryPlan, rows: &mut Vec<Row>) -> ExecResult<()> {
        if rows.iter().all(|r| r.id().is_some()) {
            rows.sort_by_key(|r| r.id().unwrap_or(i64::MAX));
        }

        let mut keyed: Vec<(Vec<Value>, Row)> = Vec::with_capacity(rows.len());
        for row in rows.drain(..) {
            let mut key = Vec::with_capacity(plan.order_by.len());
            for sort in &plan.order_by {
                // sort keys resolve against the projected output row
                let value = match &sort.expr {
                    ScalarExpr::Column(col) => eval_column(col, &row)?,
                    other => {
                        let ctx = self.plain_ctx();
                        eval_scalar(other, &row, &ctx)?
                    }
                };
                key.push(value);
            }
            keyed.push((key, row));
        }

        keyed.sort_by(|(a, _), (b, _)| {
            for (idx, sort) in plan.order_by.iter().enumerate() {
                let ord = a[idx].sort_key_cmp(&b[idx]);
                let ord = match sort.direction {
                    SortDirection::Ascending => ord,
                    SortDirection::Descending => ord.reverse(),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });

        rows.extend(keyed.into_iter().map(|(_, row)| row));
        Ok(())
    }
}

/// Combine a parent row with an optional child row under `prefix.` keys
fn combine(parent: &Row, child: Option<&Row>, prefix: &str, child_columns: &[String]) -> Row {
    let mut out = parent.clone();
    for column in child_columns {
        let value = child
            .and_then(|c| c.get(column))
            .cloned()
            .unwrap_or(Value::Null);
        out.set(format!("{}.{}", prefix, column), value);
    }
    out
}

fn eval_column(col: &ColumnRef, row: &Row) -> ExecResult<Value> {
    let key = col.key();
    row.get(&key)
        .cloned()
        .ok_or(ExecError::UnknownColumn(key))
}

fn eval_scalar(expr: &ScalarExpr, row: &Row, ctx: &EvalCtx<'_>) -> ExecResult<Value> {
    match expr {
        ScalarExpr::Column(col) => eval_column(col, row),
        ScalarExpr::Literal(value) => Ok(value.clone()),
        ScalarExpr::Parameter(name) => ctx
            .params
            .get(name)
            .cloned()
            .ok_or_else(|| ExecError::UnboundParameter(name.clone())),
        ScalarExpr::Binary { left, op, right } => {
            let l = eval_scalar(left, row, ctx)?;
            let r = eval_scalar(right, row, ctx)?;
            eval_arithmetic(&l, *op, &r)
        }
        ScalarExpr::Aggregate { func, arg } => {
            let group = ctx.group.ok_or_else(|| {
                ExecError::TypeMismatch("aggregate evaluated outside a group".to_string())
            })?;
            eval_aggregate(*func, arg, group, ctx)
        }
        ScalarExpr::Windowed {
            func,
            arg,
            partition_by,
        } => {
            let all = ctx.window_rows.ok_or_else(|| {
                ExecError::TypeMismatch("window evaluated without a row set".to_string())
            })?;
            let mut key = Vec::with_capacity(partition_by.len());
            for col in partition_by {
                key.push(eval_column(col, row)?);
            }
            let mut partition: Vec<Row> = Vec::new();
            for candidate in all {
                let mut candidate_key = Vec::with_capacity(partition_by.len());
                for col in partition_by {
                    candidate_key.push(eval_column(col, candidate)?);
                }
                if candidate_key == key {
                    partition.push(candidate.clone());
                }
            }
            eval_aggregate(*func, arg, &partition, ctx)
        }
    }
}

fn eval_arithmetic(left: &Value, op: BinaryOp, right: &Value) -> ExecResult<Value> {
    if left.is_null() || right.is_null() {
        return Ok(Value::Null);
    }
    let (l, r) = match (left.as_int(), right.as_int()) {
        (Some(l), Some(r)) => (l, r),
        _ => {
            return Err(ExecError::TypeMismatch(format!(
                "arithmetic requires integers, got {} and {}",
                left.type_name(),
                right.type_name()
            )))
        }
    };
    let result = match op {
        BinaryOp::Add => l + r,
        BinaryOp::Sub => l - r,
        BinaryOp::Mul => l * r,
        BinaryOp::Div => {
            if r == 0 {
                return Err(ExecError::DivisionByZero);
            }
            l / r
        }
    };
    Ok(Value::Int(result))
}

/// Aggregate `arg` over `rows`. Nulls are skipped; the aggregate of an empty
/// or all-null input is `Null` except `Count`, which is zero. `Avg` over
/// integers truncates toward zero.
fn eval_aggregate(
    func: AggregateFn,
    arg: &ScalarExpr,
    rows: &[Row],
    ctx: &EvalCtx<'_>,
) -> ExecResult<Value> {
    let inner = EvalCtx {
        params: ctx.params,
        group: None,
        window_rows: None,
    };
    let mut values = Vec::with_capacity(rows.len());
    for row in rows {
        let value = eval_scalar(arg, row, &inner)?;
        if !value.is_null() {
            values.push(value);
        }
    }

    match func {
        AggregateFn::Count => Ok(Value::Int(values.len() as i64)),
        AggregateFn::Sum | AggregateFn::Avg => {
            if values.is_empty() {
                return Ok(Value::Null);
            }
            let mut sum: i64 = 0;
            for value in &values {
                sum += value.as_int().ok_or_else(|| {
                    ExecError::TypeMismatch(format!(
                        "cannot aggregate {} values numerically",
                        value.type_name()
                    ))
                })?;
            }
            match func {
                AggregateFn::Sum => Ok(Value::Int(sum)),
                // integer division truncates toward zero, the SQL
                // avg(...)::int idiom
                _ => Ok(Value::Int(sum / values.len() as i64)),
            }
        }
        AggregateFn::Min => Ok(values
            .into_iter()
            .min_by(|a, b| a.sort_key_cmp(b))
            .unwrap_or(Value::Null)),
        AggregateFn::Max => Ok(values
            .into_iter()
            .max_by(|a, b| a.sort_key_cmp(b))
            .unwrap_or(Value::Null)),
    }
}

fn eval_predicate(pred: &Predicate, row: &Row, ctx: &EvalCtx<'_>) -> ExecResult<bool> {
    match pred {
        Predicate::Eq { left, right } => {
            let l = eval_scalar(left, row, ctx)?;
            let r = eval_scalar(right, row, ctx)?;
            Ok(!l.is_null() && !r.is_null() && l == r)
        }
        Predicate::Cmp { left, op, right } => {
            let l = eval_scalar(left, row, ctx)?;
            let r = eval_scalar(right, row, ctx)?;
            Ok(match l.compare(&r) {
                Some(ord) => match op {
                    CmpOp::Lt => ord == Ordering::Less,
                    CmpOp::Le => ord != Ordering::Greater,
                    CmpOp::Gt => ord == Ordering::Greater,
                    CmpOp::Ge => ord != Ordering::Less,
                },
                None => false,
            })
        }
        Predicate::Contains {
            column,
            needle,
            case_insensitive,
        } => {
            let value = eval_column(column, row)?;
            Ok(match value.as_text() {
                Some(text) => {
                    if *case_insensitive {
                        text.to_lowercase().contains(&needle.to_lowercase())
                    } else {
                        text.contains(needle.as_str())
                    }
                }
                None => false,
            })
        }
        Predicate::InSet { column, values } => {
            let value = eval_column(column, row)?;
            Ok(!value.is_null() && values.contains(&value))
        }
        Predicate::And(children) => {
            for child in children {
                if !eval_predicate(child, row, ctx)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
    }
}

/// Row-level check-constraint evaluation with SQL tri-state semantics: a
/// predicate touching a null column passes.
pub fn check_holds(pred: &Predicate, row: &Row) -> ExecResult<bool> {
    let mut columns = Vec::new();
    pred.collect_columns(&mut columns);
    for col in columns {
        match row.get(&col.key()) {
            Some(value) if value.is_null() => return Ok(true),
            None => return Ok(true),
            _ => {}
        }
    }
    let params = HashMap::new();
    let ctx = EvalCtx {
        params: &params,
        group: None,
        window_rows: None,
    };
    eval_predicate(pred, row, &ctx)
}

/// Plain row-level predicate evaluation without parameters; used by the
/// store when applying relationship filters and checks
pub fn row_matches(pred: &Predicate, row: &Row) -> ExecResult<bool> {
    let params = HashMap::new();
    let ctx = EvalCtx {
        params: &params,
        group: None,
        window_rows: None,
    };
    eval_predicate(pred, row, &ctx)
}

fn compare_key_vecs(a: &[Value], b: &[Value]) -> Ordering {
    for (l, r) in a.iter().zip(b.iter()) {
        let ord = l.sort_key_cmp(r);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}
