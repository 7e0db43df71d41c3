// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Ticketpress Ingest: WooCommerce orders in, queued print jobs out.
//
// Two paths feed the same reconciler: signed webhook pushes and a periodic
// poll of the REST API.  Either may see an order first; it is stored and
// printed once.

pub mod poll;
pub mod reconciler;
pub mod woo;

pub use poll::{OrderSource, PollReport, Poller, WooClient};
pub use reconciler::{ImportOutcome, JobSink, PushOutcome, Reconciler};
pub use woo::{WooBilling, WooLineItem, WooMeta, WooOrder};

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use ticketpress_core::error::Result;
    use ticketpress_core::types::JobId;
    use ticketpress_print::Transport;

    use crate::poll::OrderSource;
    use crate::reconciler::JobSink;
    use crate::woo::WooOrder;

    /// A webhook body as WooCommerce sends it, trimmed to what we read.
    pub fn woo_order_json(id: i64, status: &str) -> String {
        serde_json::json!({
            "id": id,
            "number": id.to_string(),
            "status": status,
            "currency": "USD",
            "total": "29.95",
            "shipping_total": "0.00",
            "total_tax": "5.45",
            "customer_note": "Ring the bell",
            "billing": {
                "first_name": "Jane",
                "last_name": "Doe",
                "email": "jane@example.com"
            },
            "line_items": [
                {
                    "id": 31,
                    "name": "Cheeseburger",
                    "quantity": 2,
                    "subtotal": "21.00",
                    "total": "21.00",
                    "meta_data": [
                        { "id": 301, "key": "_reduced_stock", "value": "2" },
                        { "id": 302, "key": "note", "value": "no onions",
                          "display_key": "Note", "display_value": "no onions" }
                    ]
                },
                {
                    "id": 32,
                    "name": "Fries",
                    "quantity": 1,
                    "subtotal": "3.50",
                    "total": "3.50",
                    "meta_data": []
                }
            ]
        })
        .to_string()
    }

    pub fn woo_order(id: i64, status: &str) -> WooOrder {
        serde_json::from_str(&woo_order_json(id, status)).unwrap()
    }

    /// Remembers what was enqueued, in order.
    #[derive(Default)]
    pub struct RecordingSink {
        queued: Mutex<Vec<JobId>>,
    }

    impl RecordingSink {
        pub fn queued(&self) -> Vec<JobId> {
            self.queued.lock().unwrap().clone()
        }
    }

    impl JobSink for RecordingSink {
        fn enqueue(&self, job_id: &JobId) -> Result<bool> {
            let mut queued = self.queued.lock().unwrap();
            if queued.contains(job_id) {
                return Ok(false);
            }
            queued.push(*job_id);
            Ok(true)
        }
    }

    /// Replays a fixed list of fetch results, then returns empty batches.
    pub struct ScriptedSource {
        script: Mutex<VecDeque<Result<Vec<WooOrder>>>>,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedSource {
        pub fn new(script: Vec<Result<Vec<WooOrder>>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        pub fn calls(&self) -> Arc<AtomicUsize> {
            Arc::clone(&self.calls)
        }
    }

    impl OrderSource for ScriptedSource {
        async fn fetch_orders(&self, _statuses: &[String]) -> Result<Vec<WooOrder>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.script.lock().unwrap().pop_front();
            next.unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    /// Printer that accepts everything and keeps a copy.
    #[derive(Clone, Default)]
    pub struct CapturePrinter {
        pub received: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    impl Transport for CapturePrinter {
        async fn send(&self, _host: &str, _port: u16, bytes: &[u8]) -> Result<()> {
            self.received.lock().unwrap().push(bytes.to_vec());
            Ok(())
        }

        async fn probe(&self, _host: &str, _port: u16) -> bool {
            true
        }
    }
}
