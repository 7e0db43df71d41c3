// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Durable order and print job store backed by SQLite.
//
// This is the source of truth for every order and job.  Deduplication is the
// UNIQUE constraint on `orders.external_id`; every job state transition is a
// single conditional UPDATE so that a row changed underneath an in-flight
// delivery (deleted, swept, retried) is never written back.
//
// All methods are synchronous.  Each holds the connection lock only for the
// duration of one statement or transaction.

use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use rust_decimal::Decimal;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use ticketpress_core::error::{Result, TicketpressError};
use ticketpress_core::types::{
    DocumentKind, JobId, JobStatus, LineItem, NewOrder, Order, OrderId, PrintJob, QueueStatus,
    Settings,
};

const SCHEMA_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS orders (
        id              TEXT PRIMARY KEY,
        external_id     INTEGER UNIQUE,
        order_number    TEXT NOT NULL,
        status          TEXT NOT NULL,
        customer_name   TEXT NOT NULL,
        customer_email  TEXT,
        line_items      TEXT NOT NULL,
        subtotal        TEXT NOT NULL,
        shipping_total  TEXT NOT NULL,
        tax_total       TEXT NOT NULL,
        grand_total     TEXT NOT NULL,
        notes           TEXT,
        created_at      TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS print_jobs (
        id              TEXT PRIMARY KEY,
        order_id        TEXT NOT NULL REFERENCES orders(id) ON DELETE CASCADE,
        kind            TEXT NOT NULL,
        status          TEXT NOT NULL,
        priority        INTEGER NOT NULL,
        attempts        INTEGER NOT NULL DEFAULT 0,
        last_error      TEXT,
        dispatch_id     TEXT,
        completed_at    TEXT,
        created_at      TEXT NOT NULL,
        updated_at      TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS print_jobs_dispatch
        ON print_jobs (status, priority DESC, created_at);

    CREATE TABLE IF NOT EXISTS settings (
        id    INTEGER PRIMARY KEY CHECK (id = 1),
        data  TEXT NOT NULL
    );
"#;

const ORDER_COLUMNS: &str = "id, external_id, order_number, status, customer_name, customer_email,
     line_items, subtotal, shipping_total, tax_total, grand_total, notes, created_at";

const JOB_COLUMNS: &str = "id, order_id, kind, status, priority, attempts, last_error,
     dispatch_id, completed_at, created_at, updated_at";

fn db_err(e: rusqlite::Error) -> TicketpressError {
    TicketpressError::Database(e.to_string())
}

/// Only a UNIQUE index failure means "already stored"; NOT NULL, CHECK and
/// foreign-key failures are real errors.
fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

/// Stored timestamps are microsecond precision so values read back compare
/// equal to the ones handed out.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

fn ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Result of inserting a new order.
#[derive(Debug, Clone)]
pub enum Insertion {
    /// The order was new; both jobs were created in the same transaction.
    Created { order: Order, jobs: Vec<PrintJob> },
    /// An order with the same external id already existed.
    Existing(Order),
}

/// Outcome of a stale-job sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StaleSweep {
    pub requeued: usize,
    pub failed: usize,
}

/// Order and job store.  Shared as `Arc<Store>`.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (or create) the store at `path`, in WAL mode with foreign keys on.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref()).map_err(db_err)?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(db_err)?;
        let store = Self::init(conn)?;
        info!("order store opened");
        Ok(store)
    }

    /// Open an in-memory store (useful for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        let store = Self::init(conn)?;
        debug!("in-memory order store opened");
        Ok(store)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(db_err)?;
        conn.execute_batch(SCHEMA_SQL).map_err(db_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| TicketpressError::Database("store lock poisoned".into()))
    }

    // -----------------------------------------------------------------------
    // Orders
    // -----------------------------------------------------------------------

    /// Insert `new` together with one pending job per document kind.
    ///
    /// If an order with the same external id is already stored, nothing is
    /// written and the existing order is returned.  This holds under
    /// concurrent callers: the UNIQUE constraint decides the winner.
    #[instrument(skip(self, new), fields(external_id = new.external_id))]
    pub fn insert_order(&self, new: NewOrder) -> Result<Insertion> {
        let external_id = new.external_id;
        let created_at = now();
        let order = Order::from_new(new, created_at);
        let line_items = serde_json::to_string(&order.line_items)?;

        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(db_err)?;

        let inserted = tx.execute(
            "INSERT INTO orders (id, external_id, order_number, status, customer_name,
             customer_email, line_items, subtotal, shipping_total, tax_total, grand_total,
             notes, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                order.id.to_string(),
                order.external_id,
                order.order_number,
                order.status,
                order.customer_name,
                order.customer_email,
                line_items,
                order.subtotal.to_string(),
                order.shipping_total.to_string(),
                order.tax_total.to_string(),
                order.grand_total.to_string(),
                order.notes,
                ts(order.created_at),
            ],
        );

        match inserted {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => {
                drop(tx);
                debug!(external_id, "order already stored");
                let existing = query_order_by_external_id(&conn, external_id)?
                    .ok_or_else(|| TicketpressError::order_not_found(external_id))?;
                return Ok(Insertion::Existing(existing));
            }
            Err(e) => return Err(db_err(e)),
        }

        let mut jobs = Vec::with_capacity(DocumentKind::ALL.len());
        for kind in DocumentKind::ALL {
            jobs.push(insert_job(&tx, order.id, kind, created_at)?);
        }
        tx.commit().map_err(db_err)?;

        info!(order_id = %order.id, external_id, "order stored with print jobs");
        Ok(Insertion::Created { order, jobs })
    }

    /// `true` if an order with this external id is stored.  Read-only.
    pub fn order_exists(&self, external_id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM orders WHERE external_id = ?1",
                params![external_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)?;
        Ok(found.is_some())
    }

    pub fn find_order_by_external_id(&self, external_id: i64) -> Result<Option<Order>> {
        let conn = self.conn()?;
        query_order_by_external_id(&conn, external_id)
    }

    #[instrument(skip(self), fields(order_id = %id))]
    pub fn get_order(&self, id: &OrderId) -> Result<Option<Order>> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1"),
            params![id.to_string()],
            row_to_order,
        )
        .optional()
        .map_err(db_err)
    }

    pub fn order_count(&self) -> Result<u64> {
        self.conn()?
            .query_row("SELECT COUNT(*) FROM orders", [], |row| row.get(0))
            .map_err(db_err)
    }

    /// One page of orders, newest first, with the total number of matches.
    /// `search` matches the order number, customer name or email.
    pub fn list_orders(
        &self,
        search: Option<&str>,
        limit: u32,
        offset: u32,
    ) -> Result<(Vec<Order>, u64)> {
        let conn = self.conn()?;
        let pattern = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{s}%"));
        let filter = "WHERE (?1 IS NULL OR order_number LIKE ?1 OR customer_name LIKE ?1
                      OR customer_email LIKE ?1)";

        let total: u64 = conn
            .query_row(
                &format!("SELECT COUNT(*) FROM orders {filter}"),
                params![pattern],
                |row| row.get(0),
            )
            .map_err(db_err)?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {ORDER_COLUMNS} FROM orders {filter}
                 ORDER BY created_at DESC, rowid DESC LIMIT ?2 OFFSET ?3"
            ))
            .map_err(db_err)?;
        let orders = stmt
            .query_map(params![pattern, limit, offset], row_to_order)
            .map_err(db_err)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(db_err)?;
        Ok((orders, total))
    }

    /// Rows written through this connection since it was opened.
    pub fn total_changes(&self) -> Result<u64> {
        self.conn()?
            .query_row("SELECT total_changes()", [], |row| row.get(0))
            .map_err(db_err)
    }

    // -----------------------------------------------------------------------
    // Jobs
    // -----------------------------------------------------------------------

    /// Every job for one order, oldest first.
    pub fn jobs_for_order(&self, order_id: &OrderId) -> Result<Vec<PrintJob>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {JOB_COLUMNS} FROM print_jobs WHERE order_id = ?1
                 ORDER BY created_at ASC, rowid ASC"
            ))
            .map_err(db_err)?;
        let jobs = stmt
            .query_map(params![order_id.to_string()], row_to_job)
            .map_err(db_err)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(db_err)?;
        Ok(jobs)
    }

    /// Create fresh pending jobs of the given kinds for an existing order.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub fn create_jobs(&self, order_id: &OrderId, kinds: &[DocumentKind]) -> Result<Vec<PrintJob>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(db_err)?;
        let created_at = now();
        let mut jobs = Vec::with_capacity(kinds.len());
        for &kind in kinds {
            jobs.push(insert_job(&tx, *order_id, kind, created_at)?);
        }
        tx.commit().map_err(db_err)?;
        debug!(count = jobs.len(), "print jobs created");
        Ok(jobs)
    }

    #[instrument(skip(self), fields(job_id = %id))]
    pub fn get_job(&self, id: &JobId) -> Result<Option<PrintJob>> {
        let conn = self.conn()?;
        query_job(&conn, id)
    }

    /// Jobs newest first, optionally filtered by status.
    pub fn list_jobs(&self, status: Option<JobStatus>, limit: u32) -> Result<Vec<PrintJob>> {
        let conn = self.conn()?;
        let sql = match status {
            Some(_) => format!(
                "SELECT {JOB_COLUMNS} FROM print_jobs WHERE status = ?1
                 ORDER BY created_at DESC, rowid DESC LIMIT ?2"
            ),
            None => format!(
                "SELECT {JOB_COLUMNS} FROM print_jobs
                 ORDER BY created_at DESC, rowid DESC LIMIT ?1"
            ),
        };
        let mut stmt = conn.prepare(&sql).map_err(db_err)?;
        let rows = match status {
            Some(s) => stmt.query_map(params![s.as_str(), limit], row_to_job),
            None => stmt.query_map(params![limit], row_to_job),
        }
        .map_err(db_err)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(db_err)
    }

    /// Pending jobs in dispatch order: priority descending, then oldest first.
    pub fn pending_jobs(&self) -> Result<Vec<PrintJob>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {JOB_COLUMNS} FROM print_jobs WHERE status = 'pending'
                 ORDER BY priority DESC, created_at ASC, rowid ASC"
            ))
            .map_err(db_err)?;
        let jobs = stmt
            .query_map([], row_to_job)
            .map_err(db_err)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(db_err)?;
        Ok(jobs)
    }

    /// pending → processing.  Increments `attempts` and records
    /// `dispatch_id`.  Returns `None` if the job is gone or not pending.
    #[instrument(skip(self), fields(job_id = %id))]
    pub fn claim_job(&self, id: &JobId, dispatch_id: &str) -> Result<Option<PrintJob>> {
        let conn = self.conn()?;
        let changed = conn
            .execute(
                "UPDATE print_jobs
                 SET status = 'processing', attempts = attempts + 1, dispatch_id = ?1,
                     updated_at = ?2
                 WHERE id = ?3 AND status = 'pending'",
                params![dispatch_id, ts(now()), id.to_string()],
            )
            .map_err(db_err)?;
        if changed == 0 {
            return Ok(None);
        }
        query_job(&conn, id)
    }

    /// processing → completed, for the dispatch that claimed the job.
    pub fn complete_job(&self, id: &JobId, dispatch_id: &str) -> Result<bool> {
        let stamp = ts(now());
        self.transition(
            "UPDATE print_jobs
             SET status = 'completed', last_error = NULL, completed_at = ?1, updated_at = ?1
             WHERE id = ?2 AND status = 'processing' AND dispatch_id = ?3",
            params![stamp, id.to_string(), dispatch_id],
        )
    }

    /// processing → pending after a retryable failure.
    pub fn release_job(&self, id: &JobId, dispatch_id: &str, error: &str) -> Result<bool> {
        self.transition(
            "UPDATE print_jobs
             SET status = 'pending', last_error = ?1, updated_at = ?2
             WHERE id = ?3 AND status = 'processing' AND dispatch_id = ?4",
            params![error, ts(now()), id.to_string(), dispatch_id],
        )
    }

    /// processing → failed.
    pub fn fail_job(&self, id: &JobId, dispatch_id: &str, error: &str) -> Result<bool> {
        self.transition(
            "UPDATE print_jobs
             SET status = 'failed', last_error = ?1, updated_at = ?2
             WHERE id = ?3 AND status = 'processing' AND dispatch_id = ?4",
            params![error, ts(now()), id.to_string(), dispatch_id],
        )
    }

    /// failed → pending with the error cleared.  `attempts` is left alone.
    pub fn reset_failed(&self, id: &JobId) -> Result<bool> {
        self.transition(
            "UPDATE print_jobs
             SET status = 'pending', last_error = NULL, dispatch_id = NULL, updated_at = ?1
             WHERE id = ?2 AND status = 'failed'",
            params![ts(now()), id.to_string()],
        )
    }

    /// Delete a job whatever its state.  Returns `false` if it did not exist.
    #[instrument(skip(self), fields(job_id = %id))]
    pub fn delete_job(&self, id: &JobId) -> Result<bool> {
        let deleted = self.transition(
            "DELETE FROM print_jobs WHERE id = ?1",
            params![id.to_string()],
        )?;
        if deleted {
            info!(job_id = %id, "job deleted");
        }
        Ok(deleted)
    }

    fn transition(&self, sql: &str, params: impl rusqlite::Params) -> Result<bool> {
        let changed = self.conn()?.execute(sql, params).map_err(db_err)?;
        Ok(changed > 0)
    }

    /// Recover jobs left in `processing` since before `cutoff`.
    ///
    /// Jobs with attempts to spare go back to pending; the rest are failed.
    /// `in_flight` is skipped so a slow but live delivery is never pulled out
    /// from under the worker.
    #[instrument(skip(self))]
    pub fn requeue_stale(
        &self,
        cutoff: DateTime<Utc>,
        max_attempts: u32,
        in_flight: Option<JobId>,
    ) -> Result<StaleSweep> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(db_err)?;
        let stamp = ts(now());
        let cutoff = ts(cutoff);
        let skip = in_flight.map(|id| id.to_string()).unwrap_or_default();

        let failed = tx
            .execute(
                "UPDATE print_jobs
                 SET status = 'failed', dispatch_id = NULL, updated_at = ?1,
                     last_error = 'delivery interrupted; attempt limit reached'
                 WHERE status = 'processing' AND updated_at <= ?2 AND id != ?3
                   AND attempts >= ?4",
                params![stamp, cutoff, skip, max_attempts],
            )
            .map_err(db_err)?;
        let requeued = tx
            .execute(
                "UPDATE print_jobs
                 SET status = 'pending', dispatch_id = NULL, updated_at = ?1,
                     last_error = 'delivery interrupted'
                 WHERE status = 'processing' AND updated_at <= ?2 AND id != ?3",
                params![stamp, cutoff, skip],
            )
            .map_err(db_err)?;
        tx.commit().map_err(db_err)?;

        if requeued + failed > 0 {
            warn!(requeued, failed, "recovered stale processing jobs");
        }
        Ok(StaleSweep { requeued, failed })
    }

    pub fn queue_status(&self) -> Result<QueueStatus> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT status, COUNT(*) FROM print_jobs GROUP BY status")
            .map_err(db_err)?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, u64>(1)?)))
            .map_err(db_err)?;

        let mut status = QueueStatus::default();
        for row in rows {
            let (name, count) = row.map_err(db_err)?;
            match JobStatus::from_str(&name) {
                Ok(JobStatus::Pending) => status.pending = count,
                Ok(JobStatus::Processing) => status.processing = count,
                Ok(JobStatus::Completed) => status.completed = count,
                Ok(JobStatus::Failed) => status.failed = count,
                Err(_) => warn!(status = %name, "unknown job status in store"),
            }
        }
        Ok(status)
    }

    // -----------------------------------------------------------------------
    // Settings
    // -----------------------------------------------------------------------

    /// Current printer settings, or the defaults if none were saved.
    pub fn load_settings(&self) -> Result<Settings> {
        let conn = self.conn()?;
        let data: Option<String> = conn
            .query_row("SELECT data FROM settings WHERE id = 1", [], |row| row.get(0))
            .optional()
            .map_err(db_err)?;
        match data {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Settings::default()),
        }
    }

    pub fn save_settings(&self, settings: &Settings) -> Result<()> {
        let json = serde_json::to_string(settings)?;
        self.conn()?
            .execute(
                "INSERT INTO settings (id, data) VALUES (1, ?1)
                 ON CONFLICT(id) DO UPDATE SET data = excluded.data",
                params![json],
            )
            .map_err(db_err)?;
        info!("settings saved");
        Ok(())
    }

    /// Store `settings` only if nothing was saved yet.  Returns `true` if
    /// they were written.
    pub fn seed_settings(&self, settings: &Settings) -> Result<bool> {
        let json = serde_json::to_string(settings)?;
        let changed = self
            .conn()?
            .execute(
                "INSERT OR IGNORE INTO settings (id, data) VALUES (1, ?1)",
                params![json],
            )
            .map_err(db_err)?;
        Ok(changed > 0)
    }
}

// ---------------------------------------------------------------------------
// Queries shared by several methods
// ---------------------------------------------------------------------------

fn insert_job(
    conn: &Connection,
    order_id: OrderId,
    kind: DocumentKind,
    created_at: DateTime<Utc>,
) -> Result<PrintJob> {
    let mut job = PrintJob::new(order_id, kind);
    job.created_at = created_at;
    job.updated_at = created_at;

    conn.execute(
        "INSERT INTO print_jobs (id, order_id, kind, status, priority, attempts,
         created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
        params![
            job.id.to_string(),
            job.order_id.to_string(),
            job.kind.as_str(),
            job.status.as_str(),
            job.priority,
            job.attempts,
            ts(job.created_at),
        ],
    )
    .map_err(db_err)?;
    Ok(job)
}

fn query_job(conn: &Connection, id: &JobId) -> Result<Option<PrintJob>> {
    conn.query_row(
        &format!("SELECT {JOB_COLUMNS} FROM print_jobs WHERE id = ?1"),
        params![id.to_string()],
        row_to_job,
    )
    .optional()
    .map_err(db_err)
}

fn query_order_by_external_id(conn: &Connection, external_id: i64) -> Result<Option<Order>> {
    conn.query_row(
        &format!("SELECT {ORDER_COLUMNS} FROM orders WHERE external_id = ?1"),
        params![external_id],
        row_to_order,
    )
    .optional()
    .map_err(db_err)
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn conversion_err<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

fn parse_uuid(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw).map_err(|e| conversion_err(idx, e))
}

fn parse_time(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_err(idx, e))
}

fn parse_decimal(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let raw: String = row.get(idx)?;
    Decimal::from_str(&raw).map_err(|e| conversion_err(idx, e))
}

fn parse_enum<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = TicketpressError>,
{
    let raw: String = row.get(idx)?;
    T::from_str(&raw).map_err(|e| conversion_err(idx, e))
}

/// Column order must match `ORDER_COLUMNS`.
fn row_to_order(row: &Row<'_>) -> rusqlite::Result<Order> {
    let line_items_json: String = row.get(6)?;
    let line_items: Vec<LineItem> =
        serde_json::from_str(&line_items_json).map_err(|e| conversion_err(6, e))?;

    Ok(Order {
        id: OrderId(parse_uuid(row, 0)?),
        external_id: row.get(1)?,
        order_number: row.get(2)?,
        status: row.get(3)?,
        customer_name: row.get(4)?,
        customer_email: row.get(5)?,
        line_items,
        subtotal: parse_decimal(row, 7)?,
        shipping_total: parse_decimal(row, 8)?,
        tax_total: parse_decimal(row, 9)?,
        grand_total: parse_decimal(row, 10)?,
        notes: row.get(11)?,
        created_at: parse_time(row, 12)?,
    })
}

/// Column order must match `JOB_COLUMNS`.
fn row_to_job(row: &Row<'_>) -> rusqlite::Result<PrintJob> {
    let completed_at = match row.get::<_, Option<String>>(8)? {
        Some(_) => Some(parse_time(row, 8)?),
        None => None,
    };

    Ok(PrintJob {
        id: JobId(parse_uuid(row, 0)?),
        order_id: OrderId(parse_uuid(row, 1)?),
        kind: parse_enum(row, 2)?,
        status: parse_enum(row, 3)?,
        priority: row.get(4)?,
        attempts: row.get(5)?,
        last_error: row.get(6)?,
        dispatch_id: row.get(7)?,
        completed_at,
        created_at: parse_time(row, 9)?,
        updated_at: parse_time(row, 10)?,
    })
}
