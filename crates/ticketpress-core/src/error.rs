// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Ticketpress.

use thiserror::Error;

/// Top-level error type for all Ticketpress operations.
#[derive(Debug, Error)]
pub enum TicketpressError {
    // -- Ingestion errors --
    /// Malformed input. Never retried; surfaced for audit.
    #[error("invalid input: {0}")]
    Validation(String),

    /// Webhook signature missing or wrong.
    #[error("signature verification failed: {0}")]
    Authenticity(String),

    #[error("order source request failed: {0}")]
    Upstream(String),

    // -- Delivery errors --
    /// Network or timeout failure while talking to the printer.
    #[error("printer delivery failed: {0}")]
    TransientDelivery(String),

    #[error("delivery abandoned after {attempts} attempts: {last_error}")]
    ExhaustedRetries { attempts: u32, last_error: String },

    // -- Lookup errors --
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    // -- Storage / persistence --
    #[error("database error: {0}")]
    Database(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TicketpressError {
    pub fn job_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            entity: "print job",
            id: id.to_string(),
        }
    }

    pub fn order_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            entity: "order",
            id: id.to_string(),
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, TicketpressError>;
