// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// ticketpress-security: authenticity of pushed orders.
//
// Webhook deliveries are signed with a shared secret; this crate verifies
// those signatures and keeps an audit trail of every delivery, accepted or
// not.

pub mod signature;
pub mod webhook_log;

pub use signature::{SIGNATURE_HEADER, payload_digest, sign, verify};
pub use webhook_log::{WebhookEntry, WebhookLog};
