// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Query builder
//!
//! [`QueryBuilder`] is the entry point: it borrows the schema registry and
//! hands out [`SelectBuilder`]s. All column references are checked at
//! `build` time against the source entity (or the output columns of a
//! derived table), so an executed plan can only fail for store-side reasons.

use super::error::{PlanResult, ValidationError};
use super::expr::{
    AggregateFn, ColumnRef, Predicate, ScalarExpr, SortDirection, SortKey,
};
use super::{DerivedKind, DerivedTable, Join, Projection, QueryPlan, SourceRef};
use crate::registry::SchemaRegistry;

/// Entry point for building validated query plans
pub struct QueryBuilder<'r> {
    registry: &'r SchemaRegistry,
}

impl<'r> QueryBuilder<'r> {
    pub fn new(registry: &'r SchemaRegistry) -> Self {
        Self { registry }
    }

    /// Select from a declared entity
    pub fn select(&self, entity: impl Into<String>) -> SelectBuilder<'r> {
        SelectBuilder::new(self.registry, SourceRef::Entity(entity.into()))
    }

    /// Select from a derived table registered via `with_cte`/`with_subquery`
    pub fn select_derived(&self, name: impl Into<String>) -> SelectBuilder<'r> {
        SelectBuilder::new(self.registry, SourceRef::Derived(name.into()))
    }
}

/// Accumulates one select; `build` validates and freezes it
pub struct SelectBuilder<'r> {
    registry: &'r SchemaRegistry,
    source: SourceRef,
    derived: Vec<DerivedTable>,
    join: Option<Join>,
    filter: Option<Predicate>,
    projections: Vec<Projection>,
    group_by: Vec<ColumnRef>,
    having: Option<Predicate>,
    order_by: Vec<SortKey>,
    limit: Option<usize>,
}

impl<'r> SelectBuilder<'r> {
    fn new(registry: &'r SchemaRegistry, source: SourceRef) -> Self {
        Self {
            registry,
            source,
            derived: Vec::new(),
            join: None,
            filter: None,
            projections: Vec::new(),
            group_by: Vec::new(),
            having: None,
            order_by: Vec::new(),
            limit: None,
        }
    }

    /// Register an inner plan as a named subquery source
    pub fn with_subquery(mut self, name: impl Into<String>, plan: QueryPlan) -> Self {
        self.derived.push(DerivedTable {
            name: name.into(),
            kind: DerivedKind::Subquery,
            plan,
        });
        self
    }

    /// Register an inner plan as a named CTE source
    pub fn with_cte(mut self, name: impl Into<String>, plan: QueryPlan) -> Self {
        self.derived.push(DerivedTable {
            name: name.into(),
            kind: DerivedKind::Cte,
            plan,
        });
        self
    }

    /// Join a declared relationship; the joined side's columns become
    /// available under the relationship name as qualifier
    pub fn join(mut self, relationship: impl Into<String>) -> Self {
        self.join = Some(Join {
            relationship: relationship.into(),
        });
        self
    }

    /// Filter rows; multiple calls are conjoined
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => Predicate::And(vec![existing, predicate]),
            None => predicate,
        });
        self
    }

    /// Project a plain column
    pub fn project(mut self, column: impl Into<String>) -> Self {
        self.projections.push(Projection::Column {
            column: ColumnRef::new(column),
            alias: None,
        });
        self
    }

    /// Project several plain columns
    pub fn project_columns(mut self, columns: &[&str]) -> Self {
        for column in columns {
            self.projections.push(Projection::Column {
                column: ColumnRef::new(*column),
                alias: None,
            });
        }
        self
    }

    /// Project every source column (plus joined columns, if any)
    pub fn project_all(mut self) -> Self {
        self.projections.push(Projection::AllColumns);
        self
    }

    /// Project a computed expression under an alias
    pub fn project_expr(mut self, alias: impl Into<String>, expr: ScalarExpr) -> Self {
        self.projections.push(Projection::Expr {
            expr,
            alias: alias.into(),
        });
        self
    }

    /// Project a running aggregate per partition (window function)
    pub fn window(
        self,
        alias: impl Into<String>,
        func: AggregateFn,
        column: impl Into<String>,
        partition_by: &[&str],
    ) -> Self {
        let expr = ScalarExpr::windowed(
            func,
            ScalarExpr::column(column),
            partition_by.iter().map(|c| ColumnRef::new(*c)).collect(),
        );
        self.project_expr(alias, expr)
    }

    pub fn group_by(mut self, columns: &[&str]) -> Self {
        self.group_by
            .extend(columns.iter().map(|c| ColumnRef::new(*c)));
        self
    }

    pub fn having(mut self, predicate: Predicate) -> Self {
        self.having = Some(match self.having.take() {
            Some(existing) => Predicate::And(vec![existing, predicate]),
            None => predicate,
        });
        self
    }

    pub fn order_by(mut self, expr: ScalarExpr, direction: SortDirection) -> Self {
        self.order_by.push(SortKey { expr, direction });
        self
    }

    pub fn order_by_column(self, column: impl Into<String>, direction: SortDirection) -> Self {
        self.order_by(ScalarExpr::column(column), direction)
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Validate and freeze the plan
    pub fn build(mut self) -> PlanResult<QueryPlan> {
        if self.projections.is_empty() {
            self.projections.push(Projection::AllColumns);
        }

        let scope = self.resolve_scope()?;
        self.validate(&scope)?;

        Ok(QueryPlan {
            source: self.source,
            derived: self.derived,
            join: self.join,
            filter: self.filter,
            projections: self.projections,
            group_by: self.group_by,
            having: self.having,
            order_by: self.order_by,
            limit: self.limit,
        })
    }

    /// Columns visible to this select: the source's own columns plus, for a
    /// joined entity select, the join target's columns under the
    /// relationship-name qualifier
    fn resolve_scope(&self) -> PlanResult<Scope> {
        match &self.source {
            SourceRef::Entity(name) => {
                let entity = self.registry.entity(name)?;
                let joined = match &self.join {
                    Some(join) => {
                        let rel = self.registry.relationship(name, &join.relationship)?;
                        let target = self.registry.entity(&rel.target)?;
                        Some((join.relationship.clone(), target.column_names()))
                    }
                    None => None,
                };
                Ok(Scope {
                    source_name: name.clone(),
                    base: entity.column_names(),
                    joined,
                })
            }
            SourceRef::Derived(name) => {
                if self.join.is_some() {
                    return Err(ValidationError::JoinOnDerivedSource);
                }
                let table = self
                    .derived
                    .iter()
                    .find(|d| d.name == *name)
                    .ok_or_else(|| ValidationError::UnknownDerivedTable(name.clone()))?;
                Ok(Scope {
                    source_name: name.clone(),
                    base: output_columns(&table.plan, self.registry)?,
                    joined: None,
                })
            }
        }
    }

    fn validate(&self, scope: &Scope) -> PlanResult<()> {
        let grouped = !self.group_by.is_empty();

        let mut columns: Vec<&ColumnRef> = Vec::new();
        if let Some(filter) = &self.filter {
            filter.collect_columns(&mut columns);
            if filter.contains_aggregate() {
                return Err(ValidationError::AggregateOutsideGroup);
            }
        }
        for projection in &self.projections {
            if let Projection::Column { column, .. } = projection {
                columns.push(column);
            }
            if let Projection::Expr { expr, .. } = projection {
                expr.collect_columns(&mut columns);
                if expr.contains_aggregate() && !grouped {
                    return Err(ValidationError::AggregateOutsideGroup);
                }
                if expr.contains_window() {
                    if grouped {
                        return Err(ValidationError::WindowInGroupedQuery);
                    }
                    check_partitions(expr)?;
                }
            }
        }
        columns.extend(self.group_by.iter());
        if let Some(having) = &self.having {
            if !grouped {
                return Err(ValidationError::HavingWithoutGroupBy);
            }
            having.collect_columns(&mut columns);
        }
        // sort keys may also name projection outputs (computed aliases)
        let output_names: Vec<String> = self
            .projections
            .iter()
            .filter_map(|p| p.output_name())
            .collect();
        for key in &self.order_by {
            if key.expr.contains_window() && grouped {
                return Err(ValidationError::WindowInGroupedQuery);
            }
            let mut sort_columns = Vec::new();
            key.expr.collect_columns(&mut sort_columns);
            for column in sort_columns {
                if column.qualifier.is_none() && output_names.contains(&column.column) {
                    continue;
                }
                scope.check(column)?;
            }
        }

        for column in columns {
            scope.check(column)?;
        }

        if grouped {
            for projection in &self.projections {
                match projection {
                    Projection::AllColumns => {
                        return Err(ValidationError::NonGroupedColumn("*".to_string()))
                    }
                    Projection::Column { column, .. } => {
                        if !self.group_by.contains(column) {
                            return Err(ValidationError::NonGroupedColumn(column.key()));
                        }
                    }
                    Projection::Expr { .. } => {}
                }
            }
        }

        Ok(())
    }
}

/// Column scope a plan is validated against
struct Scope {
    source_name: String,
    base: Vec<String>,
    joined: Option<(String, Vec<String>)>,
}

impl Scope {
    fn check(&self, column: &ColumnRef) -> PlanResult<()> {
        match &column.qualifier {
            None => {
                if self.base.iter().any(|c| c == &column.column) {
                    Ok(())
                } else {
                    Err(ValidationError::UnknownColumn {
                        source: self.source_name.clone(),
                        column: column.column.clone(),
                    })
                }
            }
            Some(qualifier) => match &self.joined {
                Some((name, cols)) if name == qualifier => {
                    if cols.iter().any(|c| c == &column.column) {
                        Ok(())
                    } else {
                        Err(ValidationError::UnknownColumn {
                            source: qualifier.clone(),
                            column: column.column.clone(),
                        })
                    }
                }
                _ => Err(ValidationError::UnknownQualifier {
                    qualifier: qualifier.clone(),
                    column: column.column.clone(),
                }),
            },
        }
    }
}

fn check_partitions(expr: &ScalarExpr) -> PlanResult<()> {
    match expr {
        ScalarExpr::Windowed { partition_by, .. } => {
            if partition_by.is_empty() {
                Err(ValidationError::EmptyPartition)
            } else {
                Ok(())
            }
        }
        ScalarExpr::Binary { left, right, .. } => {
            check_partitions(left)?;
            check_partitions(right)
        }
        ScalarExpr::Aggregate { arg, .. } => check_partitions(arg),
        _ => Ok(()),
    }
}

/// Output column names a plan produces, used to validate selects over
/// derived tables
pub fn output_columns(plan: &QueryPlan, registry: &SchemaRegistry) -> PlanResult<Vec<String>> {
    let mut base: Vec<String> = Vec::new();
    let has_all = plan
        .projections
        .iter()
        .any(|p| matches!(p, Projection::AllColumns));

    if has_all {
        match &plan.source {
            SourceRef::Entity(name) => {
                let entity = registry.entity(name)?;
                base.extend(entity.column_names());
                if let Some(join) = &plan.join {
                    let rel = registry.relationship(name, &join.relationship)?;
                    let target = registry.entity(&rel.target)?;
                    base.extend(
                        target
                            .column_names()
                            .into_iter()
                            .map(|c| format!("{}.{}", join.relationship, c)),
                    );
                }
            }
            SourceRef::Derived(name) => {
                let table = plan
                    .find_derived(name)
                    .ok_or_else(|| ValidationError::UnknownDerivedTable(name.clone()))?;
                base.extend(output_columns(&table.plan, registry)?);
            }
        }
    }

    for projection in &plan.projections {
        if let Some(name) = projection.output_name() {
            if !base.contains(&name) {
                base.push(name);
            }
        }
    }
    Ok(base)
}
