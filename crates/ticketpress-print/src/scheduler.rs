// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Print scheduler: priority-ordered, single-flight delivery with bounded
// automatic retry.
//
// Two pieces of state are kept in step here:
//
//   * the durable job rows in `Store` (what happened, and the source of truth
//     across restarts), and
//   * an in-memory ranking (what to send next): a max-heap keyed on
//     (priority, enqueue sequence) plus membership sets.  They make enqueue
//     idempotent and reserve jobs that are in flight or waiting out a
//     backoff timer, so a sweep cannot rank them early.
//
// One worker task drains the ranking.  Each send additionally holds the
// device lock, which the test-page path takes too, so two byte streams never
// interleave on the printer.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Mutex as AsyncMutex, Notify, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use ticketpress_core::error::{Result, TicketpressError};
use ticketpress_core::types::{DocumentKind, JobId, JobStatus, OrderId, PrintJob, QueueStatus};
use ticketpress_escpos::{encode, encode_test_page};

use crate::raw_client::Transport;
use crate::retry::{RetryConfig, RetryDecision, should_retry};
use crate::store::Store;

/// Scheduler tuning.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub retry: RetryConfig,
    /// A job in `processing` for longer than this is presumed abandoned.
    pub stale_after: Duration,
    /// How often to look for abandoned jobs.
    pub sweep_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            stale_after: Duration::from_secs(300),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

// ---------------------------------------------------------------------------
// Ranking
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq)]
struct Ranked {
    priority: i32,
    seq: u64,
    job_id: JobId,
}

impl Ord for Ranked {
    /// Higher priority first; equal priority goes to the earlier enqueue.
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// `queued` holds ids with a live heap entry; heap entries whose id has left
/// it are stale and skipped when popped.  `reserved` holds ids that are being
/// delivered or waiting out a backoff timer.  An id is in at most one of the
/// two sets, and nothing can rank a reserved id until it is settled or its
/// backoff elapses.
#[derive(Debug, Default)]
struct Ranking {
    heap: BinaryHeap<Ranked>,
    queued: HashSet<JobId>,
    reserved: HashSet<JobId>,
    next_seq: u64,
}

impl Ranking {
    /// Rank a job unless it is already queued or reserved.
    fn insert(&mut self, job_id: JobId, priority: i32) -> bool {
        if self.reserved.contains(&job_id) || !self.queued.insert(job_id) {
            return false;
        }
        self.push(job_id, priority);
        true
    }

    fn push(&mut self, job_id: JobId, priority: i32) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Ranked {
            priority,
            seq,
            job_id,
        });
    }

    /// Next job to deliver.  It stays reserved until `settle` or `release`.
    fn pop(&mut self) -> Option<JobId> {
        while let Some(ranked) = self.heap.pop() {
            if self.queued.remove(&ranked.job_id) {
                self.reserved.insert(ranked.job_id);
                return Some(ranked.job_id);
            }
        }
        None
    }

    /// Backoff elapsed: rank a reserved job, unless it was removed meanwhile.
    fn release(&mut self, job_id: JobId, priority: i32) -> bool {
        if !self.reserved.remove(&job_id) {
            return false;
        }
        self.queued.insert(job_id);
        self.push(job_id, priority);
        true
    }

    /// Delivery finished without a retry pending; the id may be ranked again.
    fn settle(&mut self, job_id: &JobId) {
        self.reserved.remove(job_id);
    }

    fn forget(&mut self, job_id: &JobId) {
        self.queued.remove(job_id);
        self.reserved.remove(job_id);
    }
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

struct Inner<T> {
    store: Arc<Store>,
    transport: T,
    config: SchedulerConfig,
    ranking: Mutex<Ranking>,
    /// Signalled whenever something becomes dispatchable.
    wake: Notify,
    /// Held for the whole of every send.
    device: AsyncMutex<()>,
    in_flight: Mutex<Option<JobId>>,
    shutdown: watch::Sender<bool>,
}

impl<T: Transport> Inner<T> {
    // Every critical section below leaves the ranking consistent, so a
    // poisoned lock is safe to keep using.
    fn ranking(&self) -> MutexGuard<'_, Ranking> {
        self.ranking.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn in_flight(&self) -> MutexGuard<'_, Option<JobId>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn rank(&self, job_id: JobId, priority: i32) -> bool {
        let queued = self.ranking().insert(job_id, priority);
        if queued {
            self.wake.notify_one();
        }
        queued
    }

    /// Rank every pending row not already queued or held.
    fn rank_pending(&self) -> Result<usize> {
        let pending = self.store.pending_jobs()?;
        let added = {
            let mut ranking = self.ranking();
            pending
                .iter()
                .filter(|job| ranking.insert(job.id, job.priority))
                .count()
        };
        if added > 0 {
            debug!(added, "pending jobs ranked");
            self.wake.notify_one();
        }
        Ok(added)
    }

    fn sweep(&self) -> Result<()> {
        let stale_after = chrono::Duration::from_std(self.config.stale_after)
            .map_err(|e| TicketpressError::Validation(format!("stale_after out of range: {e}")))?;
        let Some(cutoff) = Utc::now().checked_sub_signed(stale_after) else {
            return Ok(());
        };
        let in_flight = *self.in_flight();
        self.store
            .requeue_stale(cutoff, self.config.retry.max_attempts, in_flight)?;
        // Also catches jobs whose claim failed on a store error.
        self.rank_pending()?;
        Ok(())
    }

    async fn run_worker(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!("print worker started");
        loop {
            if *shutdown.borrow() {
                break;
            }
            let next = self.ranking().pop();
            match next {
                Some(job_id) => self.dispatch(job_id).await,
                None => {
                    tokio::select! {
                        _ = self.wake.notified() => {}
                        _ = shutdown.changed() => {}
                    }
                }
            }
        }
        info!("print worker stopped");
    }

    async fn run_sweeper(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let period = self.config.sweep_interval.max(Duration::from_millis(10));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick is immediate and `start` has just reconciled.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep() {
                        error!(error = %e, "stale job sweep failed");
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
        debug!("stale job sweeper stopped");
    }

    #[instrument(skip_all, fields(job_id = %job_id))]
    async fn dispatch(self: &Arc<Self>, job_id: JobId) {
        let dispatch_id = Uuid::new_v4().to_string();
        let job = match self.store.claim_job(&job_id, &dispatch_id) {
            Ok(Some(job)) => job,
            Ok(None) => {
                debug!("job no longer pending; skipped");
                self.ranking().settle(&job_id);
                return;
            }
            Err(e) => {
                error!(error = %e, "could not claim job; next sweep will re-rank it");
                self.ranking().settle(&job_id);
                return;
            }
        };

        *self.in_flight() = Some(job_id);
        info!(kind = %job.kind, attempt = job.attempts, "dispatching print job");

        let recorded = match self.deliver(&job).await {
            Ok(()) => {
                self.ranking().settle(&job_id);
                let done = self.store.complete_job(&job_id, &dispatch_id);
                if matches!(done, Ok(true)) {
                    info!(kind = %job.kind, "print job completed");
                }
                done
            }
            Err(e) => self.record_failure(&job, &dispatch_id, &e),
        };
        *self.in_flight() = None;

        match recorded {
            Ok(true) => {}
            Ok(false) => warn!("job changed during delivery; result discarded"),
            Err(e) => error!(error = %e, "could not record delivery result"),
        }
    }

    async fn deliver(&self, job: &PrintJob) -> Result<()> {
        let order = self
            .store
            .get_order(&job.order_id)?
            .ok_or_else(|| TicketpressError::order_not_found(job.order_id))?;
        let settings = self.store.load_settings()?;
        let bytes = encode(&order, &settings, job.kind);

        let _device = self.device.lock().await;
        self.transport
            .send(&settings.printer_ip, settings.printer_port, &bytes)
            .await
    }

    /// Record a failed delivery.  A job scheduled for retry stays reserved
    /// until its timer fires, so a sweep that sees it `pending` again cannot
    /// rank it early.  Any other outcome settles the job while its row is
    /// still `processing`, before a manual retry can touch it.
    fn record_failure(
        self: &Arc<Self>,
        job: &PrintJob,
        dispatch_id: &str,
        err: &TicketpressError,
    ) -> Result<bool> {
        let message = err.to_string();
        match should_retry(err, job.attempts, &self.config.retry) {
            RetryDecision::RetryAfter(delay) => {
                let released = self.store.release_job(&job.id, dispatch_id, &message);
                if let Ok(true) = released {
                    warn!(
                        error = %message,
                        attempt = job.attempts,
                        delay_ms = delay.as_millis() as u64,
                        "delivery failed; will retry"
                    );
                    self.schedule_release(job.id, job.priority, delay);
                } else {
                    self.ranking().settle(&job.id);
                }
                released
            }
            RetryDecision::GiveUp(class) => {
                warn!(error = %message, ?class, "delivery failed; not retrying");
                self.ranking().settle(&job.id);
                self.store.fail_job(&job.id, dispatch_id, &message)
            }
            RetryDecision::Exhausted => {
                let exhausted = TicketpressError::ExhaustedRetries {
                    attempts: job.attempts,
                    last_error: message,
                };
                warn!(error = %exhausted, "print job failed");
                self.ranking().settle(&job.id);
                self.store
                    .fail_job(&job.id, dispatch_id, &exhausted.to_string())
            }
        }
    }

    fn schedule_release(self: &Arc<Self>, job_id: JobId, priority: i32, delay: Duration) {
        let inner: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = inner.upgrade() {
                if inner.ranking().release(job_id, priority) {
                    debug!(job_id = %job_id, "backoff elapsed; job re-ranked");
                    inner.wake.notify_one();
                }
            }
        });
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Durable, priority-ordered, single-flight print scheduler.
///
/// Construct once and share (typically as `Arc<Scheduler<RawClient>>`).
/// Jobs can be enqueued before `start`; nothing is sent until it is called.
pub struct Scheduler<T: Transport> {
    inner: Arc<Inner<T>>,
    tasks: AsyncMutex<Vec<JoinHandle<()>>>,
}

impl<T: Transport> Scheduler<T> {
    pub fn new(store: Arc<Store>, transport: T, config: SchedulerConfig) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                store,
                transport,
                config,
                ranking: Mutex::new(Ranking::default()),
                wake: Notify::new(),
                device: AsyncMutex::new(()),
                in_flight: Mutex::new(None),
                shutdown,
            }),
            tasks: AsyncMutex::new(Vec::new()),
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.inner.store
    }

    pub async fn is_running(&self) -> bool {
        !self.tasks.lock().await.is_empty()
    }

    /// Recover leftovers, rank pending jobs and spawn the worker and sweeper.
    /// Calling `start` on a running scheduler does nothing.
    pub async fn start(&self) -> Result<()> {
        let mut tasks = self.tasks.lock().await;
        if !tasks.is_empty() {
            debug!("scheduler already running");
            return Ok(());
        }

        let inner = &self.inner;
        // Nothing of ours is in flight before the worker exists, so every
        // `processing` row is a leftover from an earlier run.
        let recovered =
            inner
                .store
                .requeue_stale(Utc::now(), inner.config.retry.max_attempts, None)?;
        let ranked = inner.rank_pending()?;

        inner.shutdown.send_replace(false);
        tasks.push(tokio::spawn(
            Arc::clone(inner).run_worker(inner.shutdown.subscribe()),
        ));
        tasks.push(tokio::spawn(
            Arc::clone(inner).run_sweeper(inner.shutdown.subscribe()),
        ));

        info!(
            ranked,
            requeued = recovered.requeued,
            failed = recovered.failed,
            "scheduler started"
        );
        Ok(())
    }

    /// Signal shutdown and wait for the worker and sweeper to exit.  A send
    /// in progress is allowed to finish and its result is recorded.
    pub async fn stop(&self) {
        let mut tasks = self.tasks.lock().await;
        if tasks.is_empty() {
            return;
        }

        info!("stopping scheduler");
        self.inner.shutdown.send_replace(true);
        for handle in tasks.drain(..) {
            if let Err(e) = handle.await {
                error!(error = %e, "scheduler task ended abnormally");
            }
        }
        info!("scheduler stopped");
    }

    /// Submit a pending job for dispatch.  Returns `false` if it was already
    /// queued (or waiting out a backoff), in which case nothing changes.
    #[instrument(skip(self), fields(job_id = %job_id))]
    pub fn enqueue(&self, job_id: &JobId) -> Result<bool> {
        let job = self.job(job_id)?;
        if job.status != JobStatus::Pending {
            return Err(TicketpressError::Validation(format!(
                "job {job_id} is {} and cannot be enqueued",
                job.status
            )));
        }
        let queued = self.inner.rank(job.id, job.priority);
        debug!(queued, "enqueue");
        Ok(queued)
    }

    pub fn status(&self) -> Result<QueueStatus> {
        self.inner.store.queue_status()
    }

    pub fn list_jobs(&self, status: Option<JobStatus>, limit: u32) -> Result<Vec<PrintJob>> {
        self.inner.store.list_jobs(status, limit)
    }

    pub fn job(&self, job_id: &JobId) -> Result<PrintJob> {
        self.inner
            .store
            .get_job(job_id)?
            .ok_or_else(|| TicketpressError::job_not_found(job_id))
    }

    /// failed → pending, error cleared, and re-ranked.  The attempt counter
    /// is kept, so a retried job gets one more delivery before failing
    /// again.
    #[instrument(skip(self), fields(job_id = %job_id))]
    pub fn retry(&self, job_id: &JobId) -> Result<PrintJob> {
        if !self.inner.store.reset_failed(job_id)? {
            let job = self.job(job_id)?;
            return Err(TicketpressError::Validation(format!(
                "only failed jobs can be retried; job {job_id} is {}",
                job.status
            )));
        }
        let job = self.job(job_id)?;
        self.inner.rank(job.id, job.priority);
        info!("job queued for manual retry");
        Ok(job)
    }

    /// Delete a job in any state.  If it is mid-delivery the send runs to
    /// completion and its result is discarded.
    #[instrument(skip(self), fields(job_id = %job_id))]
    pub fn remove(&self, job_id: &JobId) -> Result<()> {
        if !self.inner.store.delete_job(job_id)? {
            return Err(TicketpressError::job_not_found(job_id));
        }
        self.inner.ranking().forget(job_id);
        Ok(())
    }

    /// Print `kinds` again for an existing order as fresh jobs.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub fn reprint(&self, order_id: &OrderId, kinds: &[DocumentKind]) -> Result<Vec<PrintJob>> {
        if self.inner.store.get_order(order_id)?.is_none() {
            return Err(TicketpressError::order_not_found(order_id));
        }
        let jobs = self.inner.store.create_jobs(order_id, kinds)?;
        for job in &jobs {
            self.inner.rank(job.id, job.priority);
        }
        info!(count = jobs.len(), "reprint queued");
        Ok(jobs)
    }

    /// Print the test page now, outside the job queue.  Waits for any
    /// delivery in progress to finish first.
    pub async fn print_test_page(&self) -> Result<()> {
        let settings = self.inner.store.load_settings()?;
        let bytes = encode_test_page(&settings, Utc::now());

        let _device = self.inner.device.lock().await;
        self.inner
            .transport
            .send(&settings.printer_ip, settings.printer_port, &bytes)
            .await
    }

    /// Whether the configured printer accepts connections.
    pub async fn probe_printer(&self) -> Result<bool> {
        let settings = self.inner.store.load_settings()?;
        Ok(self
            .inner
            .transport
            .probe(&settings.printer_ip, settings.printer_port)
            .await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Insertion;
    use crate::test_support::new_order;
    use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering::SeqCst};
    use std::time::Instant;
    use ticketpress_core::types::Order;
    use tokio::sync::Semaphore;

    #[derive(Debug, Clone)]
    struct Delivery {
        bytes: Vec<u8>,
        started: Instant,
        finished: Instant,
        at: tokio::time::Instant,
    }

    impl Delivery {
        fn contains(&self, needle: &[u8]) -> bool {
            self.bytes.windows(needle.len()).any(|w| w == needle)
        }

        fn label(&self) -> String {
            let kind = if self.contains(b"ORDERED:") {
                "kitchen"
            } else {
                "receipt"
            };
            let order = if self.contains(b"1001") { "1001" } else { "2002" };
            format!("{kind}-{order}")
        }
    }

    /// Fake printer: records every payload with its time window.
    #[derive(Default)]
    struct Device {
        sends: Mutex<Vec<Delivery>>,
        active: AtomicUsize,
        max_active: AtomicUsize,
        fail_next: AtomicU32,
        always_fail: AtomicBool,
        delay: Duration,
        gate: Option<Semaphore>,
    }

    impl Device {
        fn sends(&self) -> Vec<Delivery> {
            self.sends.lock().unwrap().clone()
        }

        fn send_count(&self) -> usize {
            self.sends.lock().unwrap().len()
        }
    }

    #[derive(Clone)]
    struct FakePrinter(Arc<Device>);

    impl Transport for FakePrinter {
        async fn send(&self, _host: &str, _port: u16, bytes: &[u8]) -> Result<()> {
            let device = &self.0;
            let started = Instant::now();
            let active = device.active.fetch_add(1, SeqCst) + 1;
            device.max_active.fetch_max(active, SeqCst);

            tokio::time::sleep(device.delay).await;
            if let Some(gate) = &device.gate {
                let _permit = gate.acquire().await;
            }

            device.active.fetch_sub(1, SeqCst);
            device.sends.lock().unwrap().push(Delivery {
                bytes: bytes.to_vec(),
                started,
                finished: Instant::now(),
                at: tokio::time::Instant::now(),
            });

            let fail_once = device
                .fail_next
                .fetch_update(SeqCst, SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if device.always_fail.load(SeqCst) || fail_once {
                Err(TicketpressError::TransientDelivery("simulated paper jam".into()))
            } else {
                Ok(())
            }
        }

        async fn probe(&self, _host: &str, _port: u16) -> bool {
            true
        }
    }

    fn fast_config() -> SchedulerConfig {
        SchedulerConfig {
            retry: RetryConfig {
                max_attempts: 5,
                base_delay: Duration::from_millis(5),
                max_delay: Duration::from_millis(40),
            },
            ..SchedulerConfig::default()
        }
    }

    fn setup(device: Device, config: SchedulerConfig) -> (Scheduler<FakePrinter>, Arc<Device>) {
        let device = Arc::new(device);
        let store = Arc::new(Store::open_in_memory().expect("open in-memory store"));
        let scheduler = Scheduler::new(store, FakePrinter(Arc::clone(&device)), config);
        (scheduler, device)
    }

    fn add_order<T: Transport>(scheduler: &Scheduler<T>, external_id: i64) -> (Order, Vec<PrintJob>) {
        match scheduler.store().insert_order(new_order(external_id)).unwrap() {
            Insertion::Created { order, jobs } => (order, jobs),
            Insertion::Existing(_) => panic!("order {external_id} already stored"),
        }
    }

    async fn wait_until(mut done: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !done() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    fn completed<T: Transport>(scheduler: &Scheduler<T>) -> u64 {
        scheduler.status().unwrap().completed
    }

    #[tokio::test]
    async fn kitchen_tickets_print_before_receipts() {
        let (scheduler, device) = setup(Device::default(), fast_config());
        add_order(&scheduler, 1001);
        add_order(&scheduler, 2002);

        scheduler.start().await.unwrap();
        wait_until(|| completed(&scheduler) == 4).await;
        scheduler.stop().await;

        let labels: Vec<String> = device.sends().iter().map(Delivery::label).collect();
        assert_eq!(
            labels,
            vec!["kitchen-1001", "kitchen-2002", "receipt-1001", "receipt-2002"]
        );
    }

    #[tokio::test]
    async fn processing_windows_never_overlap() {
        let device = Device {
            delay: Duration::from_millis(15),
            ..Device::default()
        };
        let (scheduler, device) = setup(device, fast_config());
        scheduler.start().await.unwrap();

        for external_id in [1001, 2002, 3003] {
            let (_, jobs) = add_order(&scheduler, external_id);
            for job in &jobs {
                scheduler.enqueue(&job.id).unwrap();
            }
        }
        wait_until(|| completed(&scheduler) == 6).await;
        scheduler.stop().await;

        assert_eq!(device.max_active.load(SeqCst), 1);
        let mut sends = device.sends();
        sends.sort_by_key(|d| d.started);
        for pair in sends.windows(2) {
            assert!(pair[0].finished <= pair[1].started);
        }
    }

    #[tokio::test]
    async fn enqueue_is_idempotent() {
        let (scheduler, device) = setup(Device::default(), fast_config());
        let (_, jobs) = add_order(&scheduler, 1001);

        assert!(scheduler.enqueue(&jobs[0].id).unwrap());
        assert!(!scheduler.enqueue(&jobs[0].id).unwrap());

        scheduler.start().await.unwrap();
        wait_until(|| completed(&scheduler) == 2).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        scheduler.stop().await;

        assert_eq!(device.send_count(), 2);
        let err = scheduler.enqueue(&jobs[0].id).unwrap_err();
        assert!(matches!(err, TicketpressError::Validation(_)));
    }

    #[tokio::test]
    async fn persistent_failure_stops_at_five_attempts() {
        let device = Device {
            always_fail: AtomicBool::new(true),
            ..Device::default()
        };
        let (scheduler, device) = setup(device, fast_config());
        let (_, jobs) = add_order(&scheduler, 1001);

        scheduler.start().await.unwrap();
        wait_until(|| scheduler.status().unwrap().failed == 2).await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        for job in &jobs {
            let job = scheduler.job(&job.id).unwrap();
            assert_eq!(job.status, JobStatus::Failed);
            assert_eq!(job.attempts, 5);
            assert!(job.last_error.as_deref().unwrap().contains("5 attempts"));
        }
        // Never resubmitted after the cap.
        assert_eq!(device.send_count(), 10);
        scheduler.stop().await;
    }

    #[tokio::test]
    async fn transient_failure_is_retried() {
        let device = Device {
            fail_next: AtomicU32::new(1),
            ..Device::default()
        };
        let (scheduler, device) = setup(device, fast_config());
        let (_, jobs) = add_order(&scheduler, 1001);

        scheduler.start().await.unwrap();
        wait_until(|| completed(&scheduler) == 2).await;
        scheduler.stop().await;

        let kitchen = scheduler.job(&jobs[0].id).unwrap();
        assert_eq!(kitchen.attempts, 2);
        assert!(kitchen.last_error.is_none());
        assert_eq!(scheduler.job(&jobs[1].id).unwrap().attempts, 1);
        assert_eq!(device.send_count(), 3);
    }

    #[tokio::test]
    async fn manual_retry_grants_one_more_attempt() {
        let device = Device {
            always_fail: AtomicBool::new(true),
            ..Device::default()
        };
        let config = SchedulerConfig {
            retry: RetryConfig {
                max_attempts: 2,
                ..fast_config().retry
            },
            ..fast_config()
        };
        let (scheduler, device) = setup(device, config);
        let (_, jobs) = add_order(&scheduler, 1001);
        let kitchen = jobs[0].id;

        scheduler.start().await.unwrap();
        wait_until(|| scheduler.status().unwrap().failed == 2).await;

        device.always_fail.store(false, SeqCst);
        let retried = scheduler.retry(&kitchen).unwrap();
        assert_eq!(retried.status, JobStatus::Pending);
        assert_eq!(retried.attempts, 2);
        assert!(retried.last_error.is_none());

        wait_until(|| completed(&scheduler) == 1).await;
        scheduler.stop().await;
        assert_eq!(scheduler.job(&kitchen).unwrap().attempts, 3);

        // Only failed jobs can be retried.
        let err = scheduler.retry(&kitchen).unwrap_err();
        assert!(matches!(err, TicketpressError::Validation(_)));
        let err = scheduler.retry(&JobId::new()).unwrap_err();
        assert!(matches!(err, TicketpressError::NotFound { .. }));
    }

    #[tokio::test]
    async fn removing_in_flight_job_discards_its_result() {
        let device = Device {
            gate: Some(Semaphore::new(0)),
            ..Device::default()
        };
        let (scheduler, device) = setup(device, fast_config());
        let (_, jobs) = add_order(&scheduler, 1001);
        let (kitchen, receipt) = (jobs[0].id, jobs[1].id);

        scheduler.start().await.unwrap();
        wait_until(|| device.active.load(SeqCst) == 1).await;
        assert_eq!(scheduler.job(&kitchen).unwrap().status, JobStatus::Processing);

        scheduler.remove(&kitchen).unwrap();
        if let Some(gate) = &device.gate {
            gate.add_permits(10);
        }

        wait_until(|| completed(&scheduler) == 1).await;
        scheduler.stop().await;

        assert!(matches!(
            scheduler.job(&kitchen).unwrap_err(),
            TicketpressError::NotFound { .. }
        ));
        assert_eq!(scheduler.job(&receipt).unwrap().status, JobStatus::Completed);
        assert_eq!(
            scheduler.status().unwrap(),
            QueueStatus {
                completed: 1,
                ..QueueStatus::default()
            }
        );
        assert!(scheduler.remove(&kitchen).is_err());
    }

    #[tokio::test]
    async fn leftover_processing_job_is_recovered_on_start() {
        let (scheduler, device) = setup(Device::default(), fast_config());
        let (_, jobs) = add_order(&scheduler, 1001);
        scheduler
            .store()
            .claim_job(&jobs[0].id, "crashed-run")
            .unwrap()
            .expect("claimed");

        scheduler.start().await.unwrap();
        wait_until(|| completed(&scheduler) == 2).await;
        scheduler.stop().await;

        assert_eq!(scheduler.job(&jobs[0].id).unwrap().attempts, 2);
        assert_eq!(device.send_count(), 2);
    }

    #[tokio::test]
    async fn reprint_creates_fresh_jobs() {
        let (scheduler, device) = setup(Device::default(), fast_config());
        let (order, _) = add_order(&scheduler, 1001);

        scheduler.start().await.unwrap();
        wait_until(|| completed(&scheduler) == 2).await;

        let again = scheduler.reprint(&order.id, &[DocumentKind::Receipt]).unwrap();
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].priority, 0);
        wait_until(|| completed(&scheduler) == 3).await;
        scheduler.stop().await;

        assert_eq!(device.sends()[2].label(), "receipt-1001");
        let err = scheduler
            .reprint(&OrderId::new(), &DocumentKind::ALL)
            .unwrap_err();
        assert!(matches!(err, TicketpressError::NotFound { .. }));
    }

    #[tokio::test]
    async fn nothing_is_sent_while_stopped() {
        let (scheduler, device) = setup(Device::default(), fast_config());

        scheduler.start().await.unwrap();
        scheduler.start().await.unwrap();
        assert!(scheduler.is_running().await);
        scheduler.stop().await;
        scheduler.stop().await;
        assert!(!scheduler.is_running().await);

        let (_, jobs) = add_order(&scheduler, 1001);
        scheduler.enqueue(&jobs[0].id).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(device.send_count(), 0);

        scheduler.start().await.unwrap();
        wait_until(|| completed(&scheduler) == 2).await;
        scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_page_and_probe_use_the_device() {
        let (scheduler, device) = setup(Device::default(), fast_config());

        scheduler.print_test_page().await.unwrap();
        assert!(scheduler.probe_printer().await.unwrap());

        let sends = device.sends();
        assert_eq!(sends.len(), 1);
        assert!(sends[0].contains(b"*** TEST PRINT ***"));
    }

    #[test]
    fn ranking_orders_by_priority_then_sequence() {
        let mut ranking = Ranking::default();
        let (low, high_a, high_b) = (JobId::new(), JobId::new(), JobId::new());
        ranking.insert(low, 0);
        ranking.insert(high_a, 10);
        ranking.insert(high_b, 10);
        assert!(!ranking.insert(high_a, 10));

        assert_eq!(ranking.pop(), Some(high_a));
        assert_eq!(ranking.pop(), Some(high_b));
        assert_eq!(ranking.pop(), Some(low));
        assert_eq!(ranking.pop(), None);
    }

    #[test]
    fn popped_job_cannot_be_ranked_until_settled() {
        let mut ranking = Ranking::default();
        let job = JobId::new();

        ranking.insert(job, 10);
        assert_eq!(ranking.pop(), Some(job));
        // A sweep that read the row while it was still pending.
        assert!(!ranking.insert(job, 10));
        assert_eq!(ranking.pop(), None);

        ranking.settle(&job);
        assert!(ranking.insert(job, 10));
        assert_eq!(ranking.pop(), Some(job));
    }

    #[test]
    fn backoff_reservation_and_forgotten_jobs() {
        let mut ranking = Ranking::default();
        let (waiting, gone) = (JobId::new(), JobId::new());

        ranking.insert(waiting, 0);
        assert_eq!(ranking.pop(), Some(waiting));
        assert!(!ranking.insert(waiting, 0));
        assert!(ranking.release(waiting, 0));
        assert!(!ranking.release(waiting, 0));
        assert_eq!(ranking.pop(), Some(waiting));

        ranking.insert(gone, 5);
        ranking.forget(&gone);
        assert_eq!(ranking.pop(), None);
        assert_eq!(ranking.pop(), None);

        ranking.insert(gone, 5);
        assert_eq!(ranking.pop(), Some(gone));
        ranking.forget(&gone);
        assert!(!ranking.release(gone, 5));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_job_waits_out_its_backoff() {
        let device = Device {
            always_fail: AtomicBool::new(true),
            ..Device::default()
        };
        // Sweep far more often than the backoff to give it every chance to
        // rank a waiting job early.
        let config = SchedulerConfig {
            sweep_interval: Duration::from_millis(10),
            ..SchedulerConfig::default()
        };
        let (scheduler, device) = setup(device, config);
        for external_id in [1001, 2002] {
            add_order(&scheduler, external_id);
        }

        scheduler.start().await.unwrap();
        for _ in 0..20_000 {
            if scheduler.status().unwrap().failed == 4 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        scheduler.stop().await;
        assert_eq!(scheduler.status().unwrap().failed, 4);

        let sends = device.sends();
        assert_eq!(sends.len(), 20);
        for label in ["kitchen-1001", "receipt-1001", "kitchen-2002", "receipt-2002"] {
            let attempts: Vec<tokio::time::Instant> = sends
                .iter()
                .filter(|d| d.label() == label)
                .map(|d| d.at)
                .collect();
            assert_eq!(attempts.len(), 5, "{label}");
            for (n, pair) in attempts.windows(2).enumerate() {
                let expected = Duration::from_secs(5 << n);
                let gap = pair[1] - pair[0];
                assert!(
                    gap >= expected && gap < expected + Duration::from_secs(1),
                    "{label}: attempt {} came {gap:?} after the previous one, expected {expected:?}",
                    n + 2
                );
            }
        }
    }
}
