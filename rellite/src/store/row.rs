// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Result rows returned by the store

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One result row: column key to value.
///
/// Joined plans qualify the joined side's keys as
/// `<relationship>.<column>`; everything else is the bare column name or
/// projection alias.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Row {
    columns: BTreeMap<String, Value>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_columns(columns: BTreeMap<String, Value>) -> Self {
        Self { columns }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.columns.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.columns.insert(key.into(), value);
    }

    /// The row's integer primary key, when a bare `id` column is present
    pub fn id(&self) -> Option<i64> {
        self.get("id").and_then(Value::as_int)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.columns.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.columns.iter()
    }

    pub fn into_columns(self) -> BTreeMap<String, Value> {
        self.columns
    }

    /// Split off the sub-row stored under `prefix.` keys, dropping the
    /// prefix. Used to recover the joined side from a joined fetch.
    pub fn extract_prefixed(&self, prefix: &str) -> Row {
        let needle = format!("{}.", prefix);
        let mut columns = BTreeMap::new();
        for (key, value) in &self.columns {
            if let Some(stripped) = key.strip_prefix(&needle) {
                columns.insert(stripped.to_string(), value.clone());
            }
        }
        Row { columns }
    }

    /// The row without any `prefix.`-qualified columns
    pub fn without_prefixed(&self) -> Row {
        let mut columns = BTreeMap::new();
        for (key, value) in &self.columns {
            if !key.contains('.') {
                columns.insert(key.clone(), value.clone());
            }
        }
        Row { columns }
    }
}

impl FromIterator<(String, Value)> for Row {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self {
            columns: iter.into_iter().collect(),
        }
    }
}

/// Convenience constructor for write payloads and expected-row assertions
pub fn record(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}
