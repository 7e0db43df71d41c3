// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Webhook authenticity: HMAC-SHA256 over the exact raw request body,
// transmitted base64-encoded in a request header.
//
// Verification goes through `ring::hmac::verify`, which compares tags in
// constant time.  The body must be the bytes as received: re-serialising
// parsed JSON changes whitespace and key order and breaks the signature.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use ring::hmac;
use sha2::{Digest, Sha256};

use ticketpress_core::error::{Result, TicketpressError};

/// Header carrying the signature on WooCommerce webhook deliveries.
pub const SIGNATURE_HEADER: &str = "x-wc-webhook-signature";

/// Compute the base64 HMAC-SHA256 signature of `payload` under `secret`.
pub fn sign(secret: &str, payload: &[u8]) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
    STANDARD.encode(hmac::sign(&key, payload).as_ref())
}

/// Verify `signature` (base64) against `payload`.
///
/// A missing secret, a missing or empty header, undecodable base64 and a tag
/// mismatch all yield `TicketpressError::Authenticity`.
pub fn verify(secret: Option<&str>, payload: &[u8], signature: Option<&str>) -> Result<()> {
    let secret = secret
        .filter(|s| !s.is_empty())
        .ok_or_else(|| TicketpressError::Authenticity("no webhook secret configured".into()))?;

    let signature = signature
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| TicketpressError::Authenticity("missing signature header".into()))?;

    let tag = STANDARD
        .decode(signature)
        .map_err(|e| TicketpressError::Authenticity(format!("signature is not base64: {e}")))?;

    let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
    hmac::verify(&key, payload, &tag)
        .map_err(|_| TicketpressError::Authenticity("signature mismatch".into()))
}

/// SHA-256 of `data` as lowercase hex, used to fingerprint logged payloads.
pub fn payload_digest(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
