// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! SQLite snapshot backend
//!
//! Each snapshot is one row in the `sensorData` table.

use crate::state::{Snapshot, SwitchStatus};
use crate::store::{SnapshotStore, StoreError, StoredSnapshot, COLLECTION};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::sync::{Mutex, MutexGuard};

/// SQLite snapshot store
///
/// Thread-safe via internal Mutex (SQLite Connection is not Sync).
///
/// # Schema
///
/// ```sql
/// CREATE TABLE sensorData (
///     id INTEGER PRIMARY KEY AUTOINCREMENT,
///     temperature REAL NOT NULL,
///     air_humidity REAL NOT NULL,
///     soil_humidity REAL NOT NULL,
///     pump_status TEXT NOT NULL,
///     valve_status TEXT NOT NULL,
///     relay1_status TEXT NOT NULL,
///     relay2_status TEXT NOT NULL,
///     timestamp_ms INTEGER NOT NULL
/// );
/// CREATE INDEX idx_sensor_data_timestamp ON sensorData(timestamp_ms);
/// ```
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

type RawRow = (i64, f64, f64, f64, String, String, String, String, i64);

impl SqliteStore {
    /// Open (or create) a file-based database
    pub fn new(path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn new_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        let conn = self.lock()?;

        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {COLLECTION} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    temperature REAL NOT NULL,
                    air_humidity REAL NOT NULL,
                    soil_humidity REAL NOT NULL,
                    pump_status TEXT NOT NULL,
                    valve_status TEXT NOT NULL,
                    relay1_status TEXT NOT NULL,
                    relay2_status TEXT NOT NULL,
                    timestamp_ms INTEGER NOT NULL
                )"
            ),
            [],
        )?;

        conn.execute(
            &format!(
                "CREATE INDEX IF NOT EXISTS idx_sensor_data_timestamp ON {COLLECTION}(timestamp_ms)"
            ),
            [],
        )?;

        Ok(())
    }

    fn read_row(row: &rusqlite::Row) -> rusqlite::Result<RawRow> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
            row.get(6)?,
            row.get(7)?,
            row.get(8)?,
        ))
    }

    fn decode(row: RawRow) -> Result<StoredSnapshot, StoreError> {
        let (id, temperature, air_humidity, soil_humidity, pump, valve, relay1, relay2, ts) = row;

        let status = |s: &str| {
            s.parse::<SwitchStatus>().map_err(|e| StoreError::Corrupt {
                id,
                reason: e.to_string(),
            })
        };
        let timestamp = DateTime::<Utc>::from_timestamp_millis(ts).ok_or(StoreError::Corrupt {
            id,
            reason: format!("timestamp {} out of range", ts),
        })?;

        Ok(StoredSnapshot {
            id: id.to_string(),
            snapshot: Snapshot {
                temperature,
                air_humidity,
                soil_humidity,
                pump_status: status(&pump)?,
                valve_status: status(&valve)?,
                relay1_status: status(&relay1)?,
                relay2_status: status(&relay2)?,
                timestamp,
            },
        })
    }
}

impl SnapshotStore for SqliteStore {
    fn save(&self, snapshot: &Snapshot) -> Result<StoredSnapshot, StoreError> {
        let timestamp_ms = snapshot.timestamp.timestamp_millis();
        let conn = self.lock()?;
        conn.execute(
            &format!(
                "INSERT INTO {COLLECTION} (temperature, air_humidity, soil_humidity,
                    pump_status, valve_status, relay1_status, relay2_status, timestamp_ms)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
            ),
            params![
                snapshot.temperature,
                snapshot.air_humidity,
                snapshot.soil_humidity,
                snapshot.pump_status.as_str(),
                snapshot.valve_status.as_str(),
                snapshot.relay1_status.as_str(),
                snapshot.relay2_status.as_str(),
                timestamp_ms,
            ],
        )?;

        // Stored precision is milliseconds
        let timestamp =
            DateTime::<Utc>::from_timestamp_millis(timestamp_ms).unwrap_or(snapshot.timestamp);

        Ok(StoredSnapshot {
            id: conn.last_insert_rowid().to_string(),
            snapshot: Snapshot {
                timestamp,
                ..snapshot.clone()
            },
        })
    }

    fn history(&self, limit: usize) -> Result<Vec<StoredSnapshot>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT id, temperature, air_humidity, soil_humidity,
                    pump_status, valve_status, relay1_status, relay2_status, timestamp_ms
             FROM {COLLECTION}
             ORDER BY timestamp_ms DESC, id DESC
             LIMIT ?1"
        ))?;

        let limit = limit.min(i64::MAX as usize) as i64;
        let rows = stmt
            .query_map([limit], Self::read_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(Self::decode).collect()
    }

    fn count(&self) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {COLLECTION}"), [], |row| {
            row.get(0)
        })?;

        Ok(count as usize)
    }

    fn clear(&self) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(&format!("DELETE FROM {COLLECTION}"), [])?;
        Ok(())
    }
}
