// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Loading strategy tests
//!
//! The three strategies trade round trips against payload shape; these tests
//! pin the contract that they are otherwise indistinguishable: same parents,
//! same relationship, same object graph.

#[path = "testutils/mod.rs"]
mod testutils;

use rellite::loader::{JoinedLoader, LazyLoader, LoadStrategy, RelationshipLoader, SelectInLoader};
use rellite::plan::QueryBuilder;
use rellite::session::SessionError;
use rellite::store::Row;
use rellite::value::Value;
use testutils::hiring_fixture::HiringFixture;

fn fetch_all(
    session: &mut rellite::Session<rellite::store::MemoryConnection>,
    entity: &str,
) -> Vec<Row> {
    let registry = session.registry();
    let plan = QueryBuilder::new(&registry)
        .select(entity)
        .build()
        .expect("plan");
    session.execute(&plan).expect("fetch parents")
}

fn child_ids(loaded: &rellite::LoadedParent) -> Vec<i64> {
    loaded
        .children
        .iter()
        .map(|c| c.id().expect("child id"))
        .collect()
}

#[test]
fn test_strategies_agree_on_one_to_many() {
    let fixture = HiringFixture::seeded();
    let mut session = fixture.factory.session().expect("session");
    let workers = fetch_all(&mut session, "workers");
    assert_eq!(workers.len(), 2);

    let lazy = LazyLoader
        .resolve(&mut session, "workers", "resumes", &workers)
        .expect("lazy");
    let joined = JoinedLoader
        .resolve(&mut session, "workers", "resumes", &workers)
        .expect("joined");
    let select_in = SelectInLoader
        .resolve(&mut session, "workers", "resumes", &workers)
        .expect("select_in");

    assert_eq!(lazy, joined);
    assert_eq!(joined, select_in);

    assert_eq!(child_ids(&lazy[0]), vec![1, 2]);
    assert_eq!(child_ids(&lazy[1]), vec![3, 4]);
    assert_eq!(
        lazy[1].children[1].get("title"),
        Some(&Value::Text("Data Scientist".to_string()))
    );
    session.rollback();
}

#[test]
fn test_filtered_relationship_applies_under_every_strategy() {
    let fixture = HiringFixture::seeded();
    let mut session = fixture.factory.session().expect("session");
    let workers = fetch_all(&mut session, "workers");

    for strategy in [LoadStrategy::Lazy, LoadStrategy::Joined, LoadStrategy::SelectIn] {
        let loaded = strategy
            .loader()
            .resolve(&mut session, "workers", "resumes_parttime", &workers)
            .expect("resolve");
        assert_eq!(loaded.len(), 2, "{:?}", strategy);
        assert!(loaded[0].children.is_empty(), "{:?}", strategy);
        assert_eq!(child_ids(&loaded[1]), vec![3], "{:?}", strategy);
        assert_eq!(
            loaded[1].children[0].get("workload"),
            Some(&Value::Text("parttime".to_string())),
            "{:?}",
            strategy
        );
    }
    session.rollback();
}

#[test]
fn test_strategies_agree_on_many_to_many() {
    let fixture = HiringFixture::seeded();
    let mut session = fixture.factory.session().expect("session");
    let resumes = fetch_all(&mut session, "resumes");
    assert_eq!(resumes.len(), 4);

    let lazy = LazyLoader
        .resolve(&mut session, "resumes", "vacancies_replied", &resumes)
        .expect("lazy");
    let joined = JoinedLoader
        .resolve(&mut session, "resumes", "vacancies_replied", &resumes)
        .expect("joined");
    let select_in = SelectInLoader
        .resolve(&mut session, "resumes", "vacancies_replied", &resumes)
        .expect("select_in");

    assert_eq!(lazy, joined);
    assert_eq!(joined, select_in);

    assert_eq!(child_ids(&lazy[0]), vec![1]);
    assert!(lazy[1].children.is_empty());
    assert_eq!(child_ids(&lazy[2]), vec![1, 2]);
    assert!(lazy[3].children.is_empty());
    session.rollback();
}

#[test]
fn test_many_to_one_attaches_at_most_one_parent() {
    let fixture = HiringFixture::seeded();
    let mut session = fixture.factory.session().expect("session");
    let resumes = fetch_all(&mut session, "resumes");

    for strategy in [LoadStrategy::Lazy, LoadStrategy::Joined, LoadStrategy::SelectIn] {
        let loaded = strategy
            .loader()
            .resolve(&mut session, "resumes", "worker", &resumes)
            .expect("resolve");
        for (resume, loaded) in resumes.iter().zip(&loaded) {
            assert_eq!(loaded.children.len(), 1, "{:?}", strategy);
            assert_eq!(
                loaded.children[0].id(),
                resume.get("worker_id").and_then(Value::as_int),
                "{:?}",
                strategy
            );
        }
    }
    session.rollback();
}

#[test]
fn test_children_sorted_by_primary_key() {
    let fixture = HiringFixture::seeded();
    let mut session = fixture.factory.session().expect("session");
    let workers = fetch_all(&mut session, "workers");

    for strategy in [LoadStrategy::Lazy, LoadStrategy::Joined, LoadStrategy::SelectIn] {
        let loaded = strategy
            .loader()
            .resolve(&mut session, "workers", "resumes", &workers)
            .expect("resolve");
        for parent in &loaded {
            let ids = child_ids(parent);
            let mut sorted = ids.clone();
            sorted.sort_unstable();
            assert_eq!(ids, sorted, "{:?}", strategy);
        }
    }
    session.rollback();
}

#[test]
fn test_round_trip_costs() {
    let fixture = HiringFixture::seeded();

    // deferred: one fetch per parent
    let mut session = fixture.factory.session().expect("session");
    let workers = fetch_all(&mut session, "workers");
    let before = session.round_trips();
    LazyLoader
        .resolve(&mut session, "workers", "resumes", &workers)
        .expect("lazy");
    assert_eq!(session.round_trips() - before, workers.len());
    session.rollback();

    // joined: one combined fetch
    let mut session = fixture.factory.session().expect("session");
    let workers = fetch_all(&mut session, "workers");
    let before = session.round_trips();
    JoinedLoader
        .resolve(&mut session, "workers", "resumes", &workers)
        .expect("joined");
    assert_eq!(session.round_trips() - before, 1);
    session.rollback();

    // batched: one extra fetch, two for many-to-many
    let mut session = fixture.factory.session().expect("session");
    let workers = fetch_all(&mut session, "workers");
    let before = session.round_trips();
    SelectInLoader
        .resolve(&mut session, "workers", "resumes", &workers)
        .expect("select_in");
    assert_eq!(session.round_trips() - before, 1);

    let resumes = fetch_all(&mut session, "resumes");
    let before = session.round_trips();
    SelectInLoader
        .resolve(&mut session, "resumes", "vacancies_replied", &resumes)
        .expect("select_in m2m");
    assert_eq!(session.round_trips() - before, 2);
    session.rollback();
}

#[test]
fn test_undeclared_relationship_is_a_configuration_error() {
    let fixture = HiringFixture::seeded();
    let mut session = fixture.factory.session().expect("session");
    let workers = fetch_all(&mut session, "workers");

    let err = LazyLoader
        .resolve(&mut session, "workers", "hobbies", &workers)
        .expect_err("undeclared relationship");
    assert!(matches!(err, SessionError::Configuration(_)));
    session.rollback();
}
