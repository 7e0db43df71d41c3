// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Ticketpress Print: durable order/job store, retry policy, raw TCP
// transport, and the single-flight scheduler that ties them together.

pub mod raw_client;
pub mod retry;
pub mod scheduler;
pub mod store;

pub use raw_client::{RAW_PORT, RawClient, Transport};
pub use retry::RetryConfig;
pub use scheduler::{Scheduler, SchedulerConfig};
pub use store::{Insertion, Store};
