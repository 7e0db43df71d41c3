// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pull-based ingestion: fetch recent printable orders from WooCommerce on a
// fixed interval and hand the unseen ones to the reconciler.
//
// Polling is the safety net for missed webhooks.  Almost every cycle finds
// only orders that are already stored, so those are skipped on a read-only
// existence check and never reach the write path.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};

use ticketpress_core::config::WooCommerceConfig;
use ticketpress_core::error::{Result, TicketpressError};

use crate::reconciler::{ImportOutcome, Reconciler};
use crate::woo::WooOrder;

/// Orders requested per poll.
pub const PAGE_SIZE: u32 = 20;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Something that lists upstream orders.
pub trait OrderSource: Send + Sync + 'static {
    /// Most recent orders whose status is one of `statuses`.
    fn fetch_orders(&self, statuses: &[String])
    -> impl Future<Output = Result<Vec<WooOrder>>> + Send;
}

/// WooCommerce REST API client.
#[derive(Debug, Clone)]
pub struct WooClient {
    http: reqwest::Client,
    config: WooCommerceConfig,
}

impl WooClient {
    pub fn new(config: WooCommerceConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| TicketpressError::Upstream(format!("HTTP client: {e}")))?;
        Ok(Self { http, config })
    }
}

impl OrderSource for WooClient {
    #[instrument(skip(self))]
    async fn fetch_orders(&self, statuses: &[String]) -> Result<Vec<WooOrder>> {
        let WooCommerceConfig {
            url: Some(url),
            consumer_key: Some(key),
            consumer_secret: Some(secret),
        } = &self.config
        else {
            warn!("WooCommerce credentials not configured; skipping poll");
            return Ok(Vec::new());
        };

        let endpoint = format!("{}/wp-json/wc/v3/orders", url.trim_end_matches('/'));
        let response = self
            .http
            .get(&endpoint)
            .query(&[
                ("status", statuses.join(",")),
                ("per_page", PAGE_SIZE.to_string()),
            ])
            .basic_auth(key, Some(secret))
            .send()
            .await
            .map_err(|e| TicketpressError::Upstream(format!("GET {endpoint}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TicketpressError::Upstream(format!(
                "WooCommerce API returned {status}"
            )));
        }

        let orders: Vec<WooOrder> = response
            .json()
            .await
            .map_err(|e| TicketpressError::Upstream(format!("decode orders: {e}")))?;
        debug!(count = orders.len(), "orders fetched");
        Ok(orders)
    }
}

/// Counts from one poll cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollReport {
    pub fetched: usize,
    pub imported: usize,
    /// Already stored, or not printable.
    pub skipped: usize,
    pub failed: usize,
}

struct PollInner<S> {
    source: S,
    reconciler: Arc<Reconciler>,
    interval: Duration,
}

impl<S: OrderSource> PollInner<S> {
    async fn poll_once(&self) -> Result<PollReport> {
        let orders = self
            .source
            .fetch_orders(self.reconciler.printable_statuses())
            .await?;

        let mut report = PollReport {
            fetched: orders.len(),
            ..PollReport::default()
        };
        for order in &orders {
            // The API filter is advisory; some stores ignore it.
            if !self.reconciler.is_printable(&order.status) {
                report.skipped += 1;
                continue;
            }
            match self.reconciler.store().order_exists(order.id) {
                Ok(true) => {
                    report.skipped += 1;
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    error!(external_id = order.id, error = %e, "existence check failed");
                    report.failed += 1;
                    continue;
                }
            }
            match self.reconciler.import(order) {
                Ok(ImportOutcome::Created { .. }) => {
                    info!(external_id = order.id, "polling found a new order");
                    report.imported += 1;
                }
                // Lost a race with a push.
                Ok(ImportOutcome::AlreadyPresent(_)) => report.skipped += 1,
                Err(e) => {
                    warn!(external_id = order.id, error = %e, "could not import polled order");
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    async fn run(self: Arc<Self>, shutdown: Arc<Notify>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.notified() => {
                    debug!("poller received shutdown signal");
                    break;
                }
                // The first tick fires immediately.
                _ = ticker.tick() => {
                    match self.poll_once().await {
                        Ok(report) if report.imported > 0 || report.failed > 0 => {
                            info!(?report, "poll cycle finished");
                        }
                        Ok(report) => debug!(?report, "poll cycle finished"),
                        Err(e) => warn!(error = %e, "poll cycle failed; trying again next interval"),
                    }
                }
            }
        }
    }
}

/// Periodic order poller.
pub struct Poller<S: OrderSource> {
    inner: Arc<PollInner<S>>,
    shutdown: Arc<Notify>,
    task: AsyncMutex<Option<JoinHandle<()>>>,
}

impl<S: OrderSource> Poller<S> {
    pub fn new(source: S, reconciler: Arc<Reconciler>, interval: Duration) -> Self {
        Self {
            inner: Arc::new(PollInner {
                source,
                reconciler,
                interval,
            }),
            shutdown: Arc::new(Notify::new()),
            task: AsyncMutex::new(None),
        }
    }

    pub async fn is_running(&self) -> bool {
        self.task.lock().await.is_some()
    }

    /// Spawn the polling loop.  Does nothing if it is already running.
    pub async fn start(&self) {
        let mut task = self.task.lock().await;
        if task.is_some() {
            debug!("poller already running");
            return;
        }
        let inner = Arc::clone(&self.inner);
        *task = Some(tokio::spawn(inner.run(Arc::clone(&self.shutdown))));
        info!(interval_secs = self.inner.interval.as_secs(), "order polling started");
    }

    /// Stop the loop, letting a cycle in progress finish first.
    pub async fn stop(&self) {
        let Some(handle) = self.task.lock().await.take() else {
            return;
        };
        self.shutdown.notify_one();
        if let Err(e) = handle.await {
            error!(error = %e, "poller task ended abnormally");
        }
        info!("order polling stopped");
    }

    /// Run one cycle now, independent of the timer.
    pub async fn poll_once(&self) -> Result<PollReport> {
        self.inner.poll_once().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{RecordingSink, ScriptedSource, woo_order};
    use axum::extract::{Query, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::get;
    use axum::{Json, Router};
    use std::collections::HashMap;
    use ticketpress_print::Store;
    use ticketpress_security::WebhookLog;

    fn reconciler() -> Arc<Reconciler> {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let log = Arc::new(WebhookLog::open_in_memory().unwrap());
        Arc::new(Reconciler::new(
            store,
            Arc::new(RecordingSink::default()),
            log,
        ))
    }

    #[tokio::test]
    async fn new_orders_are_imported_and_seen_ones_skipped() {
        let reconciler = reconciler();
        let source = ScriptedSource::new(vec![
            Ok(vec![woo_order(1, "processing"), woo_order(2, "on-hold")]),
            Ok(vec![
                woo_order(1, "processing"),
                woo_order(2, "on-hold"),
                woo_order(3, "processing"),
            ]),
        ]);
        let poller = Poller::new(source, Arc::clone(&reconciler), Duration::from_secs(60));

        let first = poller.poll_once().await.unwrap();
        assert_eq!(first.imported, 2);

        let second = poller.poll_once().await.unwrap();
        assert_eq!(
            second,
            PollReport {
                fetched: 3,
                imported: 1,
                skipped: 2,
                failed: 0
            }
        );
        assert_eq!(reconciler.store().order_count().unwrap(), 3);
    }

    #[tokio::test]
    async fn unprintable_and_malformed_orders_do_not_stop_the_cycle() {
        let reconciler = reconciler();
        let mut broken = woo_order(5, "processing");
        broken.total = None;
        let source = ScriptedSource::new(vec![Ok(vec![
            woo_order(4, "completed"),
            broken,
            woo_order(6, "processing"),
        ])]);
        let poller = Poller::new(source, Arc::clone(&reconciler), Duration::from_secs(60));

        let report = poller.poll_once().await.unwrap();
        assert_eq!(report.imported, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.failed, 1);
    }

    #[tokio::test]
    async fn fetch_error_surfaces_from_poll_once() {
        let source = ScriptedSource::new(vec![Err(TicketpressError::Upstream("503".into()))]);
        let poller = Poller::new(source, reconciler(), Duration::from_secs(60));
        assert!(matches!(
            poller.poll_once().await,
            Err(TicketpressError::Upstream(_))
        ));
    }

    #[tokio::test]
    async fn loop_polls_immediately_and_survives_errors() {
        let reconciler = reconciler();
        let source = ScriptedSource::new(vec![
            Err(TicketpressError::Upstream("timeout".into())),
            Ok(vec![woo_order(11, "processing")]),
        ]);
        let calls = source.calls();
        let poller = Poller::new(source, Arc::clone(&reconciler), Duration::from_millis(20));

        poller.start().await;
        poller.start().await;
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while reconciler.store().order_count().unwrap() == 0 {
            assert!(tokio::time::Instant::now() < deadline, "order never imported");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        poller.stop().await;
        assert!(!poller.is_running().await);

        let after_stop = calls.load(std::sync::atomic::Ordering::SeqCst);
        assert!(after_stop >= 2);
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), after_stop);
    }

    #[tokio::test]
    async fn unconfigured_client_returns_nothing() {
        let client = WooClient::new(WooCommerceConfig::default()).unwrap();
        let orders = client.fetch_orders(&["processing".into()]).await.unwrap();
        assert!(orders.is_empty());
    }

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn configured(url: String) -> WooCommerceConfig {
        WooCommerceConfig {
            url: Some(format!("{url}/")),
            consumer_key: Some("ck_test".into()),
            consumer_secret: Some("cs_test".into()),
        }
    }

    #[tokio::test]
    async fn client_sends_filter_and_credentials() {
        async fn orders(
            Query(query): Query<HashMap<String, String>>,
            headers: HeaderMap,
        ) -> std::result::Result<Json<Vec<WooOrder>>, StatusCode> {
            // "ck_test:cs_test" in base64.
            let expected = "Basic Y2tfdGVzdDpjc190ZXN0";
            if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some(expected) {
                return Err(StatusCode::UNAUTHORIZED);
            }
            assert_eq!(query.get("status").map(String::as_str), Some("processing,on-hold"));
            assert_eq!(query.get("per_page").map(String::as_str), Some("20"));
            Ok(Json(vec![woo_order(1001, "processing")]))
        }

        let base = serve(Router::new().route("/wp-json/wc/v3/orders", get(orders))).await;
        let client = WooClient::new(configured(base)).unwrap();

        let fetched = client
            .fetch_orders(&["processing".into(), "on-hold".into()])
            .await
            .unwrap();
        assert_eq!(fetched, vec![woo_order(1001, "processing")]);
    }

    #[tokio::test]
    async fn non_success_status_is_upstream_error() {
        async fn down(State(code): State<StatusCode>) -> StatusCode {
            code
        }
        let app = Router::new()
            .route("/wp-json/wc/v3/orders", get(down))
            .with_state(StatusCode::SERVICE_UNAVAILABLE);
        let client = WooClient::new(configured(serve(app).await)).unwrap();

        let err = client.fetch_orders(&["processing".into()]).await.unwrap_err();
        assert!(matches!(err, TicketpressError::Upstream(_)));
    }
}
