// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Query plan execution tests
//!
//! Grouped aggregates, windowed expressions, subquery/CTE composition,
//! ordering, and parameter binding against the seeded hiring store.

#[path = "testutils/mod.rs"]
mod testutils;

use rellite::plan::{AggregateFn, Predicate, QueryBuilder, QueryPlan, ScalarExpr, SortDirection};
use rellite::session::SessionError;
use rellite::value::Value;
use std::collections::HashMap;
use testutils::hiring_fixture::HiringFixture;

fn int(row: &rellite::Row, column: &str) -> i64 {
    row.get(column)
        .and_then(Value::as_int)
        .unwrap_or_else(|| panic!("expected integer in {}", column))
}

fn text<'a>(row: &'a rellite::Row, column: &str) -> &'a str {
    row.get(column)
        .and_then(Value::as_text)
        .unwrap_or_else(|| panic!("expected text in {}", column))
}

#[test]
fn test_grouped_average_compensation_with_having() {
    let fixture = HiringFixture::seeded();
    let mut session = fixture.factory.session().expect("session");
    let registry = session.registry();

    // average compensation per workload, python resumes above 40k only
    let plan = QueryBuilder::new(&registry)
        .select("resumes")
        .filter(Predicate::and(vec![
            Predicate::icontains("title", "python"),
            Predicate::gt("compensation", 40_000),
        ]))
        .project("workload")
        .project_expr(
            "avg_compensation",
            ScalarExpr::aggregate(AggregateFn::Avg, ScalarExpr::column("compensation")),
        )
        .group_by(&["workload"])
        .having(Predicate::Cmp {
            left: ScalarExpr::aggregate(AggregateFn::Avg, ScalarExpr::column("compensation")),
            op: rellite::plan::CmpOp::Gt,
            right: ScalarExpr::literal(70_000),
        })
        .build()
        .expect("plan");

    let rows = session.execute(&plan).expect("execute");
    assert_eq!(rows.len(), 2);
    // groups come back in ascending key order
    assert_eq!(text(&rows[0], "workload"), "fulltime");
    assert_eq!(int(&rows[0], "avg_compensation"), 100_000);
    assert_eq!(text(&rows[1], "workload"), "parttime");
    assert_eq!(int(&rows[1], "avg_compensation"), 250_000);
    session.rollback();
}

#[test]
fn test_having_prunes_groups() {
    let fixture = HiringFixture::seeded();
    let mut session = fixture.factory.session().expect("session");
    let registry = session.registry();

    let plan = QueryBuilder::new(&registry)
        .select("resumes")
        .project("workload")
        .project_expr(
            "avg_compensation",
            ScalarExpr::aggregate(AggregateFn::Avg, ScalarExpr::column("compensation")),
        )
        .group_by(&["workload"])
        .having(Predicate::Cmp {
            left: ScalarExpr::aggregate(AggregateFn::Avg, ScalarExpr::column("compensation")),
            op: rellite::plan::CmpOp::Gt,
            right: ScalarExpr::literal(200_000),
        })
        .build()
        .expect("plan");

    // fulltime avg is 166666, only parttime (250000) survives
    let rows = session.execute(&plan).expect("execute");
    assert_eq!(rows.len(), 1);
    assert_eq!(text(&rows[0], "workload"), "parttime");
    session.rollback();
}

#[test]
fn test_windowed_difference_from_partition_average() {
    let fixture = HiringFixture::seeded();
    let mut session = fixture.factory.session().expect("session");
    let registry = session.registry();

    let avg_for_workload = ScalarExpr::windowed(
        AggregateFn::Avg,
        ScalarExpr::column("compensation"),
        vec![rellite::plan::ColumnRef::new("workload")],
    );
    let plan = QueryBuilder::new(&registry)
        .select("resumes")
        .project_columns(&["id", "workload", "compensation"])
        .project_expr("avg_workload_compensation", avg_for_workload.clone())
        .project_expr(
            "compensation_diff",
            ScalarExpr::sub(ScalarExpr::column("compensation"), avg_for_workload),
        )
        .build()
        .expect("plan");

    let rows = session.execute(&plan).expect("execute");
    assert_eq!(rows.len(), 4);
    // fulltime partition: (50000 + 150000 + 300000) / 3 truncates to 166666
    assert_eq!(int(&rows[0], "avg_workload_compensation"), 166_666);
    assert_eq!(int(&rows[0], "compensation_diff"), -116_666);
    assert_eq!(int(&rows[1], "compensation_diff"), -16_666);
    // parttime partition is the single 250000 row
    assert_eq!(int(&rows[2], "avg_workload_compensation"), 250_000);
    assert_eq!(int(&rows[2], "compensation_diff"), 0);
    assert_eq!(int(&rows[3], "compensation_diff"), 133_334);
    session.rollback();
}

#[test]
fn test_subquery_into_cte_into_ordered_select() {
    let fixture = HiringFixture::seeded();
    let mut session = fixture.factory.session().expect("session");
    let registry = session.registry();

    let windowed = QueryBuilder::new(&registry)
        .select("resumes")
        .project_columns(&["id", "workload", "compensation"])
        .window(
            "avg_workload_compensation",
            AggregateFn::Avg,
            "compensation",
            &["workload"],
        )
        .build()
        .expect("inner plan");

    let with_diff = QueryBuilder::new(&registry)
        .select_derived("helper")
        .with_subquery("helper", windowed)
        .project_columns(&["id", "workload", "compensation"])
        .project_expr(
            "compensation_diff",
            ScalarExpr::sub(
                ScalarExpr::column("compensation"),
                ScalarExpr::column("avg_workload_compensation"),
            ),
        )
        .build()
        .expect("middle plan");

    let plan = QueryBuilder::new(&registry)
        .select_derived("resumes_diff")
        .with_cte("resumes_diff", with_diff)
        .order_by_column("compensation_diff", SortDirection::Descending)
        .build()
        .expect("outer plan");

    let rows = session.execute(&plan).expect("execute");
    let ids: Vec<i64> = rows.iter().map(|r| int(r, "id")).collect();
    assert_eq!(ids, vec![4, 3, 2, 1]);
    assert_eq!(int(&rows[0], "compensation_diff"), 133_334);
    assert_eq!(int(&rows[3], "compensation_diff"), -116_666);
    session.rollback();
}

#[test]
fn test_order_ties_break_by_primary_key() {
    let fixture = HiringFixture::seeded();
    let mut session = fixture.factory.session().expect("session");
    let registry = session.registry();

    let plan = QueryBuilder::new(&registry)
        .select("resumes")
        .order_by_column("workload", SortDirection::Ascending)
        .build()
        .expect("plan");

    // three fulltime rows tie on the sort key and keep id order
    let rows = session.execute(&plan).expect("execute");
    let ids: Vec<i64> = rows.iter().map(|r| int(r, "id")).collect();
    assert_eq!(ids, vec![1, 2, 4, 3]);
    session.rollback();
}

#[test]
fn test_order_by_projected_alias_with_limit() {
    let fixture = HiringFixture::seeded();
    let mut session = fixture.factory.session().expect("session");
    let registry = session.registry();

    let plan = QueryBuilder::new(&registry)
        .select("resumes")
        .project_columns(&["id", "title"])
        .project_expr("pay", ScalarExpr::column("compensation"))
        .order_by_column("pay", SortDirection::Descending)
        .limit(2)
        .build()
        .expect("plan");

    let rows = session.execute(&plan).expect("execute");
    let ids: Vec<i64> = rows.iter().map(|r| int(r, "id")).collect();
    assert_eq!(ids, vec![4, 3]);
    session.rollback();
}

#[test]
fn test_parameter_binding() {
    let fixture = HiringFixture::seeded();
    let mut session = fixture.factory.session().expect("session");
    let registry = session.registry();

    let plan = QueryBuilder::new(&registry)
        .select("resumes")
        .filter(Predicate::Eq {
            left: ScalarExpr::column("workload"),
            right: ScalarExpr::parameter("workload"),
        })
        .build()
        .expect("plan");

    let mut params = HashMap::new();
    params.insert("workload".to_string(), Value::Text("parttime".to_string()));
    let rows = session
        .execute_with_params(&plan, &params)
        .expect("execute");
    assert_eq!(rows.len(), 1);
    assert_eq!(int(&rows[0], "id"), 3);

    // same plan, unbound parameter
    let err = session.execute(&plan).expect_err("unbound parameter");
    assert!(matches!(err, SessionError::Store(_)));
    session.rollback();
}

#[test]
fn test_joined_plan_projects_child_columns_under_relationship_prefix() {
    let fixture = HiringFixture::seeded();
    let mut session = fixture.factory.session().expect("session");
    let registry = session.registry();

    let plan = QueryBuilder::new(&registry)
        .select("workers")
        .join("resumes")
        .filter(Predicate::Eq {
            left: ScalarExpr::qualified_column("resumes", "workload"),
            right: ScalarExpr::literal("parttime"),
        })
        .build()
        .expect("plan");

    let rows = session.execute(&plan).expect("execute");
    assert_eq!(rows.len(), 1);
    assert_eq!(text(&rows[0], "username"), "John");
    assert_eq!(int(&rows[0], "resumes.id"), 3);
    assert_eq!(text(&rows[0], "resumes.title"), "Python Data Engineer");
    session.rollback();
}

#[test]
fn test_plan_serializes_round_trip() {
    let fixture = HiringFixture::new();
    let registry = fixture.registry;

    let plan = QueryBuilder::new(&registry)
        .select("resumes")
        .filter(Predicate::icontains("title", "python"))
        .project_columns(&["id", "workload"])
        .window("avg_comp", AggregateFn::Avg, "compensation", &["workload"])
        .order_by_column("id", SortDirection::Ascending)
        .limit(10)
        .build()
        .expect("plan");

    let encoded = serde_json::to_string(&plan).expect("serialize");
    let decoded: QueryPlan = serde_json::from_str(&encoded).expect("deserialize");
    assert_eq!(plan, decoded);
}
