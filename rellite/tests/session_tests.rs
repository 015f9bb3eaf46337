// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Unit-of-work and constraint enforcement tests
//!
//! Sessions queue writes and send them atomically; the store enforces the
//! declared schema at write time. Both halves are exercised here against
//! the seeded hiring fixture.

#[path = "testutils/mod.rs"]
mod testutils;

use rellite::plan::QueryBuilder;
use rellite::registry::{ColumnDef, EntityDef, OnDelete, RegistryBuilder};
use rellite::session::{Session, SessionError, SessionFactory};
use rellite::store::{record, MemoryStore, PoolConfig, Row, StoreConnection, StoreError, WriteOp};
use rellite::value::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use testutils::hiring_fixture::{hiring_registry, HiringFixture};

fn count_rows(factory: &SessionFactory, entity: &str) -> usize {
    let mut session = factory.session().expect("session");
    let registry = session.registry();
    let plan = QueryBuilder::new(&registry)
        .select(entity)
        .build()
        .expect("plan");
    let n = session.execute(&plan).expect("execute").len();
    session.rollback();
    n
}

#[test]
fn test_commit_publishes_rollback_discards() {
    let fixture = HiringFixture::seeded();

    let mut session = fixture.factory.session().expect("session");
    session
        .insert("workers", record(&[("username", "Artem".into())]))
        .expect("insert");
    session.commit().expect("commit");
    assert_eq!(count_rows(&fixture.factory, "workers"), 3);

    let mut session = fixture.factory.session().expect("session");
    session
        .insert("workers", record(&[("username", "Roman".into())]))
        .expect("insert");
    session.flush().expect("flush");
    session.rollback();
    assert_eq!(count_rows(&fixture.factory, "workers"), 3);
}

#[test]
fn test_dropped_session_discards_flushed_writes() {
    let fixture = HiringFixture::seeded();
    {
        let mut session = fixture.factory.session().expect("session");
        session
            .insert("workers", record(&[("username", "Petr".into())]))
            .expect("insert");
        session.flush().expect("flush");
    }
    assert_eq!(count_rows(&fixture.factory, "workers"), 2);
}

#[test]
fn test_failed_flush_discards_the_whole_unit() {
    let fixture = HiringFixture::seeded();

    let mut session = fixture.factory.session().expect("session");
    session
        .insert("workers", record(&[("username", "Artem".into())]))
        .expect("insert worker");
    session
        .insert(
            "resumes",
            record(&[
                ("title", "Underpaid".into()),
                ("compensation", (-1i64).into()),
                ("workload", "fulltime".into()),
                ("worker_id", 1i64.into()),
            ]),
        )
        .expect("queue resume");

    let err = session.flush().expect_err("negative compensation");
    assert!(err.is_constraint_violation(), "{err}");

    // the unit is poisoned from here on
    let err = session
        .insert("workers", record(&[("username", "Roman".into())]))
        .expect_err("discarded");
    assert!(matches!(err, SessionError::UnitOfWorkDiscarded));
    drop(session);

    // the valid worker queued before the failure was not applied either
    assert_eq!(count_rows(&fixture.factory, "workers"), 2);
}

#[test]
fn test_foreign_key_must_reference_existing_row() {
    let fixture = HiringFixture::seeded();
    let mut session = fixture.factory.session().expect("session");
    session
        .insert(
            "resumes",
            record(&[
                ("title", "Orphan".into()),
                ("compensation", 1i64.into()),
                ("workload", "fulltime".into()),
                ("worker_id", 99i64.into()),
            ]),
        )
        .expect("queue");
    let err = session.flush().expect_err("dangling worker_id");
    assert!(err.is_constraint_violation(), "{err}");
}

#[test]
fn test_enum_and_length_bounds() {
    let fixture = HiringFixture::seeded();

    let mut session = fixture.factory.session().expect("session");
    session
        .insert(
            "resumes",
            record(&[
                ("title", "Weekend Hacker".into()),
                ("compensation", 1i64.into()),
                ("workload", "weekend".into()),
                ("worker_id", 1i64.into()),
            ]),
        )
        .expect("queue");
    assert!(session.flush().expect_err("bad enum").is_constraint_violation());

    let mut session = fixture.factory.session().expect("session");
    session
        .insert(
            "resumes",
            record(&[
                ("title", "x".repeat(256).into()),
                ("compensation", 1i64.into()),
                ("workload", "fulltime".into()),
                ("worker_id", 1i64.into()),
            ]),
        )
        .expect("queue");
    assert!(session.flush().expect_err("title too long").is_constraint_violation());
}

#[test]
fn test_unique_constraint_on_association() {
    let fixture = HiringFixture::seeded();
    let mut session = fixture.factory.session().expect("session");
    session
        .insert(
            "vacancy_replies",
            record(&[
                ("resume_id", 1i64.into()),
                ("vacancy_id", 1i64.into()),
                ("cover_letter", "me again".into()),
            ]),
        )
        .expect("queue");
    let err = session.flush().expect_err("duplicate reply");
    assert!(err.is_constraint_violation(), "{err}");
}

#[test]
fn test_primary_key_is_store_assigned() {
    let fixture = HiringFixture::seeded();
    let mut session = fixture.factory.session().expect("session");
    session
        .insert(
            "workers",
            record(&[("id", 42i64.into()), ("username", "Imposter".into())]),
        )
        .expect("queue");
    let err = session.flush().expect_err("client-assigned pk");
    assert!(matches!(err, SessionError::Store(StoreError::Rejected(_))));
}

#[test]
fn test_cascade_delete_runs_transitively() {
    let fixture = HiringFixture::seeded();

    // worker 2 owns resumes 3 and 4; resume 3 carries two replies
    let mut session = fixture.factory.session().expect("session");
    session.delete("workers", 2).expect("queue delete");
    session.commit().expect("commit");

    assert_eq!(count_rows(&fixture.factory, "workers"), 1);
    assert_eq!(count_rows(&fixture.factory, "resumes"), 2);
    assert_eq!(count_rows(&fixture.factory, "vacancy_replies"), 1);
}

#[test]
fn test_restrict_blocks_delete_of_referenced_row() {
    let registry = Arc::new(
        RegistryBuilder::new()
            .entity(EntityDef::new("teams").column(ColumnDef::text("name", 64)))
            .entity(
                EntityDef::new("members")
                    .column(ColumnDef::text("name", 64))
                    .column(ColumnDef::int("team_id").foreign_key("teams", OnDelete::Restrict)),
            )
            .build()
            .expect("schema"),
    );
    let store = MemoryStore::new(Arc::clone(&registry));
    let factory = SessionFactory::new(store, PoolConfig::default());

    let mut session = factory.session().expect("session");
    session
        .insert("teams", record(&[("name", "core".into())]))
        .expect("team");
    session
        .insert(
            "members",
            record(&[("name", "ana".into()), ("team_id", 1i64.into())]),
        )
        .expect("member");
    session.commit().expect("commit");

    let mut session = factory.session().expect("session");
    session.delete("teams", 1).expect("queue");
    let err = session.flush().expect_err("restricted");
    assert!(err.is_constraint_violation(), "{err}");
}

#[test]
fn test_delete_of_missing_row_fails() {
    let fixture = HiringFixture::seeded();
    let mut session = fixture.factory.session().expect("session");
    session.delete("workers", 99).expect("queue");
    let err = session.flush().expect_err("missing row");
    assert!(matches!(
        err,
        SessionError::Store(StoreError::RowNotFound { id: 99, .. })
    ));
}

#[test]
fn test_flush_reads_back_server_assigned_values() {
    let fixture = HiringFixture::seeded();
    let mut session = fixture.factory.session().expect("session");
    session
        .insert(
            "resumes",
            record(&[
                ("title", "Rust Developer".into()),
                ("compensation", 120_000i64.into()),
                ("workload", "fulltime".into()),
                ("worker_id", 1i64.into()),
            ]),
        )
        .expect("queue");
    let ids = session.flush().expect("flush");
    assert_eq!(ids.len(), 1);

    // own writes are visible before commit, timestamps already assigned
    let row = session.get("resumes", ids[0]).expect("get").expect("row");
    assert!(matches!(row.get("created_at"), Some(Value::Timestamp(_))));
    assert_eq!(row.get("created_at"), row.get("updated_at"));

    // but not to a second unit of work
    assert_eq!(count_rows(&fixture.factory, "resumes"), 4);
    session.commit().expect("commit");
    assert_eq!(count_rows(&fixture.factory, "resumes"), 5);
}

#[test]
fn test_update_refreshes_updated_at_and_keeps_created_at() {
    let fixture = HiringFixture::seeded();
    let mut session = fixture.factory.session().expect("session");
    let before = session.get("resumes", 1).expect("get").expect("row");
    let created = before.get("created_at").cloned().expect("created_at");

    std::thread::sleep(Duration::from_millis(5));
    session
        .update("resumes", 1, record(&[("compensation", 55_000i64.into())]))
        .expect("queue");
    session.flush().expect("flush");

    let after = session.get("resumes", 1).expect("get").expect("row");
    assert_eq!(after.get("compensation"), Some(&Value::Int(55_000)));
    assert_eq!(after.get("created_at"), Some(&created));
    let (created, updated) = match (after.get("created_at"), after.get("updated_at")) {
        (Some(Value::Timestamp(c)), Some(Value::Timestamp(u))) => (*c, *u),
        other => panic!("expected timestamps, got {:?}", other),
    };
    assert!(updated > created);
    session.rollback();
}

#[test]
fn test_primary_key_is_immutable() {
    let fixture = HiringFixture::seeded();
    let mut session = fixture.factory.session().expect("session");
    session
        .update("workers", 1, record(&[("id", 7i64.into())]))
        .expect("queue");
    let err = session.flush().expect_err("pk update");
    assert!(matches!(err, SessionError::Store(StoreError::Rejected(_))));
}

#[test]
fn test_pool_exhaustion_surfaces_resource_exhausted() {
    let fixture = HiringFixture::with_pool(PoolConfig {
        max_connections: 1,
        acquire_timeout: Duration::from_millis(50),
    });

    let held = fixture.factory.session().expect("first session");
    let err = fixture.factory.session().expect_err("pool is exhausted");
    assert!(matches!(
        err,
        SessionError::Store(StoreError::ResourceExhausted { .. })
    ));
    held.rollback();

    // slot freed, acquisition works again
    let session = fixture.factory.session().expect("after release");
    session.rollback();
}

/// Connection stub that fails every write, for transport-error paths
struct FailingConnection;

impl StoreConnection for FailingConnection {
    fn begin(&mut self) -> Result<(), StoreError> {
        Ok(())
    }

    fn apply(&mut self, _writes: &[WriteOp]) -> Result<Vec<i64>, StoreError> {
        Err(StoreError::ConnectionFailure("socket closed".to_string()))
    }

    fn execute(
        &mut self,
        _plan: &rellite::QueryPlan,
        _params: &HashMap<String, Value>,
    ) -> Result<Vec<Row>, StoreError> {
        Err(StoreError::ConnectionFailure("socket closed".to_string()))
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        Err(StoreError::ConnectionFailure("socket closed".to_string()))
    }

    fn rollback(&mut self) {}
}

#[test]
fn test_connection_failure_poisons_the_session() {
    let registry = hiring_registry();
    let mut session = Session::new(FailingConnection, registry).expect("session");
    session
        .insert("workers", record(&[("username", "ghost".into())]))
        .expect("queue");

    let err = session.flush().expect_err("transport failure");
    assert!(matches!(
        err,
        SessionError::Store(StoreError::ConnectionFailure(_))
    ));
    let err = session.flush().expect_err("poisoned");
    assert!(matches!(err, SessionError::UnitOfWorkDiscarded));
}
