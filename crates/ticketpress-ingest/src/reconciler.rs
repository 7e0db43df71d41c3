// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Reconciler: turns upstream orders into stored orders plus queued print
// jobs, exactly once per upstream id.
//
// Pushes (webhooks) and pulls (polling) both land here.  Neither path checks
// for an existing order before writing; the store's UNIQUE(external_id)
// decides, so a push and a poll racing on the same order still produce one
// order and one pair of jobs.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use ticketpress_core::error::Result;
use ticketpress_core::types::{JobId, Order, PrintJob};
use ticketpress_print::{Insertion, Scheduler, Store, Transport};
use ticketpress_security::{WebhookLog, verify};

use crate::woo::WooOrder;

/// Where freshly created jobs are submitted for printing.
pub trait JobSink: Send + Sync {
    /// Returns `false` if the job was already queued.
    fn enqueue(&self, job_id: &JobId) -> Result<bool>;
}

impl<T: Transport> JobSink for Scheduler<T> {
    fn enqueue(&self, job_id: &JobId) -> Result<bool> {
        Scheduler::enqueue(self, job_id)
    }
}

/// What `import` did.
#[derive(Debug, Clone)]
pub enum ImportOutcome {
    /// New order stored; `jobs` are kitchen first, then receipt.
    Created { order: Order, jobs: Vec<PrintJob> },
    /// The upstream id was already stored.  Nothing was written.
    AlreadyPresent(Order),
}

impl ImportOutcome {
    pub fn order(&self) -> &Order {
        match self {
            ImportOutcome::Created { order, .. } => order,
            ImportOutcome::AlreadyPresent(order) => order,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, ImportOutcome::Created { .. })
    }
}

/// Response body for a webhook delivery.  The HTTP status is always 200;
/// this says what actually happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushOutcome {
    pub received: bool,
    pub processed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

impl PushOutcome {
    fn processed() -> Self {
        Self {
            received: true,
            processed: true,
            reason: None,
        }
    }

    fn declined(reason: &'static str) -> Self {
        Self {
            received: true,
            processed: false,
            reason: Some(reason),
        }
    }
}

pub const REASON_INVALID_SIGNATURE: &str = "invalid_signature";
pub const REASON_INVALID_PAYLOAD: &str = "invalid_payload";
pub const REASON_NOT_PRINTABLE: &str = "status_not_printable";
pub const REASON_PROCESSING_ERROR: &str = "processing_error";

pub struct Reconciler {
    store: Arc<Store>,
    sink: Arc<dyn JobSink>,
    webhook_log: Arc<WebhookLog>,
    webhook_secret: Option<String>,
    printable_statuses: Vec<String>,
}

impl Reconciler {
    /// Without further configuration every push is rejected (no secret) and
    /// only `processing` and `on-hold` orders are imported.
    pub fn new(store: Arc<Store>, sink: Arc<dyn JobSink>, webhook_log: Arc<WebhookLog>) -> Self {
        Self {
            store,
            sink,
            webhook_log,
            webhook_secret: None,
            printable_statuses: vec!["processing".into(), "on-hold".into()],
        }
    }

    pub fn with_webhook_secret(mut self, secret: Option<String>) -> Self {
        self.webhook_secret = secret.filter(|s| !s.is_empty());
        self
    }

    pub fn with_printable_statuses(mut self, statuses: Vec<String>) -> Self {
        self.printable_statuses = statuses;
        self
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn printable_statuses(&self) -> &[String] {
        &self.printable_statuses
    }

    pub fn is_printable(&self, status: &str) -> bool {
        self.printable_statuses.iter().any(|s| s == status)
    }

    /// Store `order` with its two jobs and queue them, unless it is already
    /// stored.  Does not look at the status; callers filter.
    #[instrument(skip(self, order), fields(external_id = order.id))]
    pub fn import(&self, order: &WooOrder) -> Result<ImportOutcome> {
        let new = order.to_new_order()?;
        match self.store.insert_order(new)? {
            Insertion::Created { order, jobs } => {
                for job in &jobs {
                    // The row is durable already; if this fails the next
                    // sweep or restart ranks it.
                    if let Err(e) = self.sink.enqueue(&job.id) {
                        warn!(job_id = %job.id, error = %e, "could not queue new job");
                    }
                }
                info!(
                    order_id = %order.id,
                    order_number = %order.order_number,
                    "order imported and queued for printing"
                );
                Ok(ImportOutcome::Created { order, jobs })
            }
            Insertion::Existing(order) => {
                debug!(order_id = %order.id, "order already imported");
                Ok(ImportOutcome::AlreadyPresent(order))
            }
        }
    }

    /// Handle one webhook delivery.  Never fails: every outcome is logged
    /// and reported in the returned body.
    #[instrument(skip_all, fields(len = body.len()))]
    pub fn handle_push(&self, body: &[u8], signature: Option<&str>) -> PushOutcome {
        let entry = match self.webhook_log.record(body, signature) {
            Ok(id) => Some(id),
            Err(e) => {
                error!(error = %e, "could not write webhook log");
                None
            }
        };

        if let Err(e) = verify(self.webhook_secret.as_deref(), body, signature) {
            warn!(error = %e, "webhook rejected");
            self.annotate(entry, |log, id| log.mark_error(id, &e.to_string()));
            return PushOutcome::declined(REASON_INVALID_SIGNATURE);
        }
        self.annotate(entry, |log, id| log.mark_verified(id, true));

        let order: WooOrder = match serde_json::from_slice(body) {
            Ok(order) => order,
            Err(e) => {
                warn!(error = %e, "webhook body is not an order");
                self.annotate(entry, |log, id| log.mark_error(id, &e.to_string()));
                return PushOutcome::declined(REASON_INVALID_PAYLOAD);
            }
        };

        if !self.is_printable(&order.status) {
            info!(external_id = order.id, status = %order.status, "order status not printable; ignored");
            return PushOutcome::declined(REASON_NOT_PRINTABLE);
        }

        match self.import(&order) {
            Ok(_) => {
                self.annotate(entry, |log, id| log.mark_processed(id));
                PushOutcome::processed()
            }
            Err(e) => {
                error!(external_id = order.id, error = %e, "webhook processing failed");
                self.annotate(entry, |log, id| log.mark_error(id, &e.to_string()));
                PushOutcome::declined(REASON_PROCESSING_ERROR)
            }
        }
    }

    fn annotate(&self, entry: Option<i64>, update: impl FnOnce(&WebhookLog, i64) -> Result<()>) {
        if let Some(id) = entry {
            if let Err(e) = update(&self.webhook_log, id) {
                error!(entry = id, error = %e, "could not update webhook log");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{RecordingSink, woo_order, woo_order_json};
    use ticketpress_core::types::DocumentKind;
    use ticketpress_security::sign;

    const SECRET: &str = "whsec_test";

    struct Fixture {
        store: Arc<Store>,
        sink: Arc<RecordingSink>,
        log: Arc<WebhookLog>,
        reconciler: Arc<Reconciler>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let sink = Arc::new(RecordingSink::default());
        let log = Arc::new(WebhookLog::open_in_memory().unwrap());
        let reconciler = Reconciler::new(Arc::clone(&store), sink.clone(), Arc::clone(&log))
            .with_webhook_secret(Some(SECRET.into()));
        Fixture {
            store,
            sink,
            log,
            reconciler: Arc::new(reconciler),
        }
    }

    #[test]
    fn import_creates_order_and_queues_kitchen_first() {
        let f = fixture();
        let outcome = f.reconciler.import(&woo_order(1001, "processing")).unwrap();

        let ImportOutcome::Created { jobs, .. } = &outcome else {
            panic!("expected a new order");
        };
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].kind, DocumentKind::Kitchen);
        assert_eq!(f.sink.queued(), vec![jobs[0].id, jobs[1].id]);
    }

    #[test]
    fn second_import_is_a_no_op() {
        let f = fixture();
        let first = f.reconciler.import(&woo_order(42, "processing")).unwrap();
        let changes = f.store.total_changes().unwrap();

        let second = f.reconciler.import(&woo_order(42, "processing")).unwrap();
        assert!(!second.is_created());
        assert_eq!(second.order().id, first.order().id);
        assert_eq!(f.store.total_changes().unwrap(), changes);
        assert_eq!(f.sink.queued().len(), 2);
    }

    #[test]
    fn concurrent_imports_store_one_order() {
        let f = fixture();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let reconciler = Arc::clone(&f.reconciler);
                std::thread::spawn(move || reconciler.import(&woo_order(9, "processing")).unwrap())
            })
            .collect();
        let created = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(ImportOutcome::is_created)
            .count();

        assert_eq!(created, 1);
        assert_eq!(f.store.order_count().unwrap(), 1);
        assert_eq!(f.store.queue_status().unwrap().pending, 2);
        assert_eq!(f.sink.queued().len(), 2);
    }

    #[test]
    fn signed_push_is_processed() {
        let f = fixture();
        let body = woo_order_json(1001, "processing");
        let signature = sign(SECRET, body.as_bytes());

        let outcome = f.reconciler.handle_push(body.as_bytes(), Some(&signature));
        assert_eq!(outcome, PushOutcome::processed());
        assert_eq!(f.store.order_count().unwrap(), 1);

        let entry = &f.log.recent(1).unwrap()[0];
        assert!(entry.verified);
        assert!(entry.processed);
        assert_eq!(entry.error, None);
    }

    #[test]
    fn bad_signature_changes_nothing() {
        let f = fixture();
        let body = woo_order_json(1001, "processing");
        let forged = sign("wrong secret", body.as_bytes());

        let outcome = f.reconciler.handle_push(body.as_bytes(), Some(&forged));
        assert_eq!(outcome, PushOutcome::declined(REASON_INVALID_SIGNATURE));
        assert_eq!(f.store.order_count().unwrap(), 0);
        assert!(f.sink.queued().is_empty());

        let entry = &f.log.recent(1).unwrap()[0];
        assert!(!entry.verified);
        assert!(!entry.processed);
        assert!(entry.error.is_some());
    }

    #[test]
    fn missing_secret_rejects_even_signed_pushes() {
        let f = fixture();
        let reconciler = Reconciler::new(Arc::clone(&f.store), f.sink.clone(), Arc::clone(&f.log));
        let body = woo_order_json(3, "processing");
        let signature = sign(SECRET, body.as_bytes());

        let outcome = reconciler.handle_push(body.as_bytes(), Some(&signature));
        assert_eq!(outcome.reason, Some(REASON_INVALID_SIGNATURE));
        assert_eq!(f.store.order_count().unwrap(), 0);
    }

    #[test]
    fn unprintable_status_is_acknowledged_but_ignored() {
        let f = fixture();
        let body = woo_order_json(12, "pending");
        let signature = sign(SECRET, body.as_bytes());

        let outcome = f.reconciler.handle_push(body.as_bytes(), Some(&signature));
        assert_eq!(outcome, PushOutcome::declined(REASON_NOT_PRINTABLE));
        assert!(outcome.received);
        assert_eq!(f.store.order_count().unwrap(), 0);
    }

    #[test]
    fn signed_garbage_is_declined() {
        let f = fixture();
        let body = b"webhook_id=17";
        let signature = sign(SECRET, body);

        let outcome = f.reconciler.handle_push(body, Some(&signature));
        assert_eq!(outcome, PushOutcome::declined(REASON_INVALID_PAYLOAD));
        assert_eq!(f.log.count().unwrap(), 1);
    }

    #[test]
    fn unparsable_money_is_a_processing_error() {
        let f = fixture();
        let mut order = woo_order(8, "processing");
        order.total = Some("lots".into());
        let body = serde_json::to_vec(&order).unwrap();
        let signature = sign(SECRET, &body);

        let outcome = f.reconciler.handle_push(&body, Some(&signature));
        assert_eq!(outcome, PushOutcome::declined(REASON_PROCESSING_ERROR));
        assert_eq!(f.store.order_count().unwrap(), 0);
        assert!(f.log.recent(1).unwrap()[0].error.is_some());
    }

    #[test]
    fn push_body_serialises_without_empty_reason() {
        let json = serde_json::to_value(PushOutcome::processed()).unwrap();
        assert_eq!(json, serde_json::json!({ "received": true, "processed": true }));

        let json = serde_json::to_value(PushOutcome::declined(REASON_INVALID_SIGNATURE)).unwrap();
        assert_eq!(json["reason"], "invalid_signature");
    }
}
