// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Execution sessions: scoped units of work over one store connection
//!
//! A session queues writes, flushes them inside an open transaction, and on
//! `commit` publishes everything at once; any failure discards all pending
//! writes before surfacing. Sync and async sessions share identical
//! semantics and differ only in how the caller waits.

pub mod async_session;
pub mod error;
pub mod factory;
pub mod sync;

pub use async_session::AsyncSession;
pub use error::{SessionError, SessionResult};
pub use factory::SessionFactory;
pub use sync::Session;
