// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Ticketpress order printer bridge.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TicketpressError;

/// Unique identifier for a print job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = TicketpressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| TicketpressError::Validation(format!("job id {s:?}: {e}")))
    }
}

/// Internal identifier for an imported order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub Uuid);

impl OrderId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for OrderId {
    type Err = TicketpressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| TicketpressError::Validation(format!("order id {s:?}: {e}")))
    }
}

/// The two documents printed for every order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    /// Customer-facing itemised receipt.
    Receipt,
    /// Large-print ticket for the kitchen.
    Kitchen,
}

impl DocumentKind {
    /// Both kinds, in the order they are created for a new order.
    pub const ALL: [DocumentKind; 2] = [DocumentKind::Kitchen, DocumentKind::Receipt];

    /// Dispatch priority (higher = more urgent). Kitchen tickets always beat
    /// receipts so food preparation starts first.
    pub fn priority(&self) -> i32 {
        match self {
            Self::Kitchen => 10,
            Self::Receipt => 0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Receipt => "receipt",
            Self::Kitchen => "kitchen",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentKind {
    type Err = TicketpressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "receipt" => Ok(Self::Receipt),
            "kitchen" => Ok(Self::Kitchen),
            other => Err(TicketpressError::Validation(format!(
                "unknown document kind {other:?}"
            ))),
        }
    }
}

/// Lifecycle states of a print job.
///
/// ```text
/// pending --dequeue--> processing --success--> completed
/// processing --failure, attempts < max--> pending (after backoff)
/// processing --failure, attempts >= max--> failed
/// failed --manual retry--> pending
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Waiting for (re)dispatch.
    Pending,
    /// Currently being transmitted to the printer.
    Processing,
    /// Printed. Terminal.
    Completed,
    /// Automatic retries exhausted or permanent error. Left only by manual retry.
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = TicketpressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(TicketpressError::Validation(format!(
                "unknown job status {other:?}"
            ))),
        }
    }
}

/// Classification of errors for retry logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorClass {
    /// Network failure or timeout. Safe to retry automatically.
    Transient,
    /// An operator must act (manual retry or delete).
    UserAction,
    /// Retrying cannot help: missing order, malformed record.
    Permanent,
}

/// Customer-visible option on a line item (size, extras, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variation {
    pub key: String,
    pub value: String,
}

/// One ordered product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: i64,
    pub name: String,
    pub quantity: u32,
    /// Line total as resolved upstream (quantity already applied).
    pub total: Decimal,
    #[serde(default)]
    pub variations: Vec<Variation>,
}

/// An order as produced by ingestion, before it is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    /// Upstream order id: the dedup key.
    pub external_id: i64,
    pub order_number: String,
    pub status: String,
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub line_items: Vec<LineItem>,
    pub subtotal: Decimal,
    pub shipping_total: Decimal,
    pub tax_total: Decimal,
    pub grand_total: Decimal,
    pub notes: Option<String>,
}

/// A persisted order. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub external_id: Option<i64>,
    pub order_number: String,
    pub status: String,
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub line_items: Vec<LineItem>,
    pub subtotal: Decimal,
    pub shipping_total: Decimal,
    pub tax_total: Decimal,
    pub grand_total: Decimal,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Materialise a `NewOrder` with a fresh id and creation time.
    pub fn from_new(new: NewOrder, created_at: DateTime<Utc>) -> Self {
        Self {
            id: OrderId::new(),
            external_id: Some(new.external_id),
            order_number: new.order_number,
            status: new.status,
            customer_name: new.customer_name,
            customer_email: new.customer_email,
            line_items: new.line_items,
            subtotal: new.subtotal,
            shipping_total: new.shipping_total,
            tax_total: new.tax_total,
            grand_total: new.grand_total,
            notes: new.notes,
            created_at,
        }
    }
}

/// A single document to print for an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintJob {
    pub id: JobId,
    pub order_id: OrderId,
    pub kind: DocumentKind,
    pub status: JobStatus,
    /// Higher = dispatched earlier.
    pub priority: i32,
    /// Number of delivery attempts started. Never decreases.
    pub attempts: u32,
    pub last_error: Option<String>,
    /// Correlation id of the most recent dispatch.
    pub dispatch_id: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PrintJob {
    pub fn new(order_id: OrderId, kind: DocumentKind) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            order_id,
            kind,
            status: JobStatus::Pending,
            priority: kind.priority(),
            attempts: 0,
            last_error: None,
            dispatch_id: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Count of jobs in each state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    pub pending: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
}

/// Printer address and display settings. Singleton owned by the
/// configuration layer; read-only to the print pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub printer_ip: String,
    pub printer_port: u16,
    pub store_name: String,
    pub store_address: String,
    pub store_phone: String,
    pub store_footer: String,
    /// Characters per line on receipts.
    pub receipt_width: usize,
    /// Characters per line on kitchen tickets.
    pub kitchen_width: usize,
    pub currency_symbol: String,
    /// Offset applied when rendering timestamps.
    pub utc_offset_minutes: i32,
}

/// Default raw TCP print port (HP JetDirect).
pub const RAW_PORT: u16 = 9100;

impl Default for Settings {
    fn default() -> Self {
        Self {
            printer_ip: "192.168.1.100".into(),
            printer_port: RAW_PORT,
            store_name: "My Store".into(),
            store_address: String::new(),
            store_phone: String::new(),
            store_footer: "Thank you for your order!".into(),
            receipt_width: 48,
            kitchen_width: 42,
            currency_symbol: "$".into(),
            utc_offset_minutes: 0,
        }
    }
}
