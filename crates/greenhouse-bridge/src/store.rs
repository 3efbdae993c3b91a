// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Snapshot store abstraction
//!
//! Defines the trait for document backends (SQLite today).

use crate::state::Snapshot;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Collection snapshots are written to
pub const COLLECTION: &str = "sensorData";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Store lock poisoned")]
    Poisoned,

    #[error("Corrupt row {id}: {reason}")]
    Corrupt { id: i64, reason: String },
}

/// A snapshot as read back from the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSnapshot {
    pub id: String,

    #[serde(flatten)]
    pub snapshot: Snapshot,
}

/// Snapshot store trait
///
/// Backend-agnostic interface for writing and listing snapshots.
pub trait SnapshotStore: Send + Sync {
    /// Append a snapshot, returning it with its assigned id
    fn save(&self, snapshot: &Snapshot) -> Result<StoredSnapshot, StoreError>;

    /// Most recent snapshots first, at most `limit`
    fn history(&self, limit: usize) -> Result<Vec<StoredSnapshot>, StoreError>;

    /// Get total number of snapshots stored
    fn count(&self) -> Result<usize, StoreError>;

    /// Delete all snapshots
    fn clear(&self) -> Result<(), StoreError>;
}
