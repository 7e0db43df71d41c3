// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Webhook delivery log: append-mostly SQLite record of every push delivery,
// including the ones rejected for a bad signature.
//
// Schema:
//   webhook_log(
//     id            INTEGER PRIMARY KEY AUTOINCREMENT,
//     received_at   TEXT    NOT NULL,   -- RFC 3339
//     payload       TEXT    NOT NULL,   -- raw body, lossy UTF-8
//     payload_hash  TEXT    NOT NULL,   -- SHA-256 hex digest
//     signature     TEXT,               -- header value as received
//     verified      INTEGER NOT NULL,   -- 0 / 1
//     processed     INTEGER NOT NULL,   -- 0 / 1, set once an order was imported
//     error         TEXT                -- rejection or processing error
//   )

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use ticketpress_core::error::{Result, TicketpressError};

use crate::signature::payload_digest;

const CREATE_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS webhook_log (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    received_at   TEXT    NOT NULL,
    payload       TEXT    NOT NULL,
    payload_hash  TEXT    NOT NULL,
    signature     TEXT,
    verified      INTEGER NOT NULL DEFAULT 0,
    processed     INTEGER NOT NULL DEFAULT 0,
    error         TEXT
);";

fn db_err(e: rusqlite::Error) -> TicketpressError {
    TicketpressError::Database(e.to_string())
}

/// One logged delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEntry {
    pub id: i64,
    pub received_at: String,
    pub payload: String,
    pub payload_hash: String,
    pub signature: Option<String>,
    pub verified: bool,
    pub processed: bool,
    pub error: Option<String>,
}

/// Delivery log backed by its own SQLite database.
///
/// The connection sits behind a `Mutex` so the log can be shared between
/// concurrently running webhook handlers.
pub struct WebhookLog {
    conn: Mutex<Connection>,
}

impl WebhookLog {
    /// Open (or create) the log database at `path`.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(db_err)?;

        conn.execute_batch("PRAGMA journal_mode = WAL;")
            .map_err(db_err)?;
        conn.execute_batch(CREATE_TABLE_SQL).map_err(db_err)?;

        debug!("webhook log opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory log (useful for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        conn.execute_batch(CREATE_TABLE_SQL).map_err(db_err)?;

        debug!("in-memory webhook log opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| TicketpressError::Database("webhook log lock poisoned".into()))
    }

    /// Record a delivery as received.  Returns the new entry id.
    #[instrument(skip(self, payload, signature), fields(len = payload.len()))]
    pub fn record(&self, payload: &[u8], signature: Option<&str>) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO webhook_log (received_at, payload, payload_hash, signature)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                Utc::now().to_rfc3339(),
                String::from_utf8_lossy(payload),
                payload_digest(payload),
                signature,
            ],
        )
        .map_err(db_err)?;

        let id = conn.last_insert_rowid();
        debug!(id, "webhook delivery recorded");
        Ok(id)
    }

    pub fn mark_verified(&self, id: i64, verified: bool) -> Result<()> {
        self.conn()?
            .execute(
                "UPDATE webhook_log SET verified = ?1 WHERE id = ?2",
                params![verified as i32, id],
            )
            .map_err(db_err)?;
        Ok(())
    }

    pub fn mark_processed(&self, id: i64) -> Result<()> {
        self.conn()?
            .execute(
                "UPDATE webhook_log SET processed = 1 WHERE id = ?1",
                params![id],
            )
            .map_err(db_err)?;
        Ok(())
    }

    pub fn mark_error(&self, id: i64, error: &str) -> Result<()> {
        self.conn()?
            .execute(
                "UPDATE webhook_log SET error = ?1 WHERE id = ?2",
                params![error, id],
            )
            .map_err(db_err)?;
        Ok(())
    }

    /// Most recent `limit` deliveries, newest first.
    pub fn recent(&self, limit: u32) -> Result<Vec<WebhookEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, received_at, payload, payload_hash, signature,
                        verified, processed, error
                 FROM webhook_log
                 ORDER BY id DESC
                 LIMIT ?1",
            )
            .map_err(db_err)?;

        let rows = stmt
            .query_map(params![limit], |row| {
                Ok(WebhookEntry {
                    id: row.get(0)?,
                    received_at: row.get(1)?,
                    payload: row.get(2)?,
                    payload_hash: row.get(3)?,
                    signature: row.get(4)?,
                    verified: row.get::<_, i32>(5)? != 0,
                    processed: row.get::<_, i32>(6)? != 0,
                    error: row.get(7)?,
                })
            })
            .map_err(db_err)?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row.map_err(db_err)?);
        }
        Ok(entries)
    }

    pub fn count(&self) -> Result<u64> {
        self.conn()?
            .query_row("SELECT COUNT(*) FROM webhook_log", [], |row| row.get(0))
            .map_err(db_err)
    }
}
