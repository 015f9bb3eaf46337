// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Hiring-domain fixture shared across the integration suites
//!
//! Declares the reference schema (workers, resumes, vacancies, and the
//! vacancy_replies association) and seeds the rows the query and loader
//! tests assert against.

use rellite::plan::Predicate;
use rellite::registry::{
    CheckConstraint, ColumnDef, EntityDef, OnDelete, RegistryBuilder, RelationshipDef,
    SchemaRegistry, UniqueConstraint,
};
use rellite::session::SessionFactory;
use rellite::store::{record, MemoryStore, PoolConfig};
use rellite::value::Value;
use std::sync::Arc;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// The reference hiring schema
pub fn hiring_registry() -> Arc<SchemaRegistry> {
    let workers = EntityDef::new("workers")
        .column(ColumnDef::text("username", 255))
        .relationship(RelationshipDef::one_to_many("resumes", "resumes", "worker_id"))
        .relationship(
            RelationshipDef::one_to_many("resumes_parttime", "resumes", "worker_id")
                .filtered(Predicate::eq("workload", "parttime")),
        );

    let resumes = EntityDef::new("resumes")
        .column(ColumnDef::text("title", 255).indexed())
        .column(ColumnDef::int("compensation").nullable())
        .column(ColumnDef::enumeration("workload", &["parttime", "fulltime"]))
        .column(ColumnDef::int("worker_id").foreign_key("workers", OnDelete::Cascade))
        .column(ColumnDef::timestamp("created_at").server_default_now())
        .column(
            ColumnDef::timestamp("updated_at")
                .server_default_now()
                .refresh_on_update(),
        )
        .check(CheckConstraint::new(
            "check_compensation_positive",
            Predicate::ge("compensation", 0),
        ))
        .relationship(RelationshipDef::many_to_one("worker", "workers", "worker_id"))
        .relationship(RelationshipDef::many_to_many(
            "vacancies_replied",
            "vacancies",
            "vacancy_replies",
            "resume_id",
            "vacancy_id",
        ));

    let vacancies = EntityDef::new("vacancies")
        .column(ColumnDef::text("title", 255))
        .column(ColumnDef::int("compensation").nullable())
        .relationship(
            RelationshipDef::many_to_many(
                "resumes_replied",
                "resumes",
                "vacancy_replies",
                "vacancy_id",
                "resume_id",
            )
            .inverse(),
        );

    let vacancy_replies = EntityDef::new("vacancy_replies")
        .column(ColumnDef::int("resume_id").foreign_key("resumes", OnDelete::Cascade))
        .column(ColumnDef::int("vacancy_id").foreign_key("vacancies", OnDelete::Cascade))
        .column(ColumnDef::unbounded_text("cover_letter").nullable())
        .unique(UniqueConstraint::new(
            "uq_resume_vacancy",
            &["resume_id", "vacancy_id"],
        ));

    Arc::new(
        RegistryBuilder::new()
            .entity(workers)
            .entity(resumes)
            .entity(vacancies)
            .entity(vacancy_replies)
            .build()
            .expect("hiring schema is valid"),
    )
}

pub struct HiringFixture {
    pub registry: Arc<SchemaRegistry>,
    pub factory: SessionFactory,
}

impl HiringFixture {
    /// Empty store over the hiring schema
    pub fn new() -> Self {
        init_logging();
        let registry = hiring_registry();
        let store = MemoryStore::new(Arc::clone(&registry));
        let factory = SessionFactory::new(store, PoolConfig::default());
        Self { registry, factory }
    }

    /// Fixture with a custom pool, for exhaustion tests
    pub fn with_pool(config: PoolConfig) -> Self {
        init_logging();
        let registry = hiring_registry();
        let store = MemoryStore::new(Arc::clone(&registry));
        let factory = SessionFactory::new(store, config);
        Self { registry, factory }
    }

    /// Store seeded with the reference data set:
    ///
    /// workers: 1 Michel, 2 John
    /// resumes: 1 "Python Junior Developer" 50000 fulltime (worker 1)
    ///          2 "Python Developer"        150000 fulltime (worker 1)
    ///          3 "Python Data Engineer"    250000 parttime (worker 2)
    ///          4 "Data Scientist"          300000 fulltime (worker 2)
    /// vacancies: 1 "Senior Python Developer" 200000, 2 "ML Engineer" 280000
    /// replies: resume 1 -> vacancy 1, resume 3 -> vacancy 1, resume 3 -> vacancy 2
    pub fn seeded() -> Self {
        let fixture = Self::new();
        let mut session = fixture.factory.session().expect("session");

        for username in ["Michel", "John"] {
            session
                .insert("workers", record(&[("username", username.into())]))
                .expect("insert worker");
        }
        let resumes: &[(&str, i64, &str, i64)] = &[
            ("Python Junior Developer", 50_000, "fulltime", 1),
            ("Python Developer", 150_000, "fulltime", 1),
            ("Python Data Engineer", 250_000, "parttime", 2),
            ("Data Scientist", 300_000, "fulltime", 2),
        ];
        for (title, compensation, workload, worker_id) in resumes {
            session
                .insert(
                    "resumes",
                    record(&[
                        ("title", (*title).into()),
                        ("compensation", (*compensation).into()),
                        ("workload", (*workload).into()),
                        ("worker_id", (*worker_id).into()),
                    ]),
                )
                .expect("insert resume");
        }
        for (title, compensation) in [("Senior Python Developer", 200_000), ("ML Engineer", 280_000)]
        {
            session
                .insert(
                    "vacancies",
                    record(&[("title", title.into()), ("compensation", compensation.into())]),
                )
                .expect("insert vacancy");
        }
        for (resume_id, vacancy_id) in [(1i64, 1i64), (3, 1), (3, 2)] {
            session
                .insert(
                    "vacancy_replies",
                    record(&[
                        ("resume_id", resume_id.into()),
                        ("vacancy_id", vacancy_id.into()),
                        ("cover_letter", Value::Null),
                    ]),
                )
                .expect("insert reply");
        }
        session.commit().expect("seed commit");
        fixture
    }
}
