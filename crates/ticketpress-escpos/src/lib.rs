// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// ticketpress-escpos: turns an order into ESC/POS bytes.
//
// Encoding is a pure function of (order, settings, kind): no I/O, no clock,
// no randomness.  The same inputs always produce the same bytes.

pub mod escpos;
pub mod format;
pub mod kitchen;
pub mod receipt;

use chrono::{DateTime, Utc};
use tracing::debug;

use ticketpress_core::types::{DocumentKind, Order, Settings};

pub use escpos::EscPosBuilder;
pub use format::{format_currency, format_date_time, pad_line, separator};

/// Encode `order` as the document of the given `kind`.
pub fn encode(order: &Order, settings: &Settings, kind: DocumentKind) -> Vec<u8> {
    let bytes = match kind {
        DocumentKind::Receipt => receipt::render(order, settings),
        DocumentKind::Kitchen => kitchen::render(order, settings),
    };
    debug!(order = %order.order_number, %kind, len = bytes.len(), "document encoded");
    bytes
}

/// Encode the printer test page.  `now` is passed in to keep this pure.
pub fn encode_test_page(settings: &Settings, now: DateTime<Utc>) -> Vec<u8> {
    receipt::render_test_page(settings, now)
}
