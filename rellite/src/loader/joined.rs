// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Single-fetch joined loading
//!
//! Fetches parents and children together through a left-outer join and splits
//! the widened rows back into per-parent child lists. Parents without a match
//! still appear, with an empty list. One round trip regardless of how many
//! parents are being resolved.

use super::plans;
use super::{LoadedParent, RelationshipLoader};
use crate::session::{Session, SessionResult};
use crate::store::{Row, StoreConnection};

pub struct JoinedLoader;

impl<C: StoreConnection> RelationshipLoader<C> for JoinedLoader {
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
        let plan = plans::joined_plan(&registry, &bound, &ids)?;
        let rows = session.execute(&plan)?;
        plans::stitch_joined(parents, rows, &bound)
    }
}
