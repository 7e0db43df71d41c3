// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Shared service state handed to every HTTP handler.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use ticketpress_core::AppConfig;
use ticketpress_core::error::Result;
use ticketpress_ingest::Reconciler;
use ticketpress_print::{RawClient, Scheduler, SchedulerConfig, Store};
use ticketpress_security::WebhookLog;

/// Everything the API needs.  Cheap to clone; every field is an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<Scheduler<RawClient>>,
    pub reconciler: Arc<Reconciler>,
    pub webhook_log: Arc<WebhookLog>,
}

impl AppState {
    /// Open the databases under `data_dir` (paths in `config` may also be
    /// absolute) and wire the services together.
    pub fn open(config: &AppConfig, data_dir: &Path) -> Result<Self> {
        let store = Store::open(data_dir.join(&config.database_path))?;
        let webhook_log = WebhookLog::open(data_dir.join(&config.webhook_log_path))?;
        Self::assemble(config, store, webhook_log, RawClient::new())
    }

    /// Same wiring over in-memory databases.
    #[cfg(test)]
    pub fn in_memory(config: &AppConfig, transport: RawClient) -> Result<Self> {
        Self::assemble(
            config,
            Store::open_in_memory()?,
            WebhookLog::open_in_memory()?,
            transport,
        )
    }

    fn assemble(
        config: &AppConfig,
        store: Store,
        webhook_log: WebhookLog,
        transport: RawClient,
    ) -> Result<Self> {
        let store = Arc::new(store);
        let webhook_log = Arc::new(webhook_log);

        if store.seed_settings(&config.printer)? {
            info!(
                printer = %format!("{}:{}", config.printer.printer_ip, config.printer.printer_port),
                "printer settings seeded from configuration"
            );
        }

        let scheduler = Arc::new(Scheduler::new(
            Arc::clone(&store),
            transport,
            SchedulerConfig {
                stale_after: Duration::from_secs(config.stale_after_secs),
                ..SchedulerConfig::default()
            },
        ));
        let reconciler = Reconciler::new(store, scheduler.clone(), Arc::clone(&webhook_log))
            .with_webhook_secret(config.webhook_secret.clone())
            .with_printable_statuses(config.printable_statuses.clone());

        Ok(Self {
            scheduler,
            reconciler: Arc::new(reconciler),
            webhook_log,
        })
    }

    pub fn store(&self) -> &Arc<Store> {
        self.scheduler.store()
    }
}
