//! Sync Queue Module
//!
//! Durable FIFO of mutating operations, replayed against the transport
//! while online with a bounded number of attempts per operation.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, Mutex, Notify};
use tracing::{debug, info, warn};

use crate::cache::duration_ms;
use crate::clock::Clock;
use crate::connectivity::ConnectivityMonitor;
use crate::persistence::{self, DurableStore, QUEUE_NAMESPACE};
use crate::queue::{BackoffPolicy, ExhaustedOperation, NewOperation, SyncOperation};
use crate::transport::{Transport, TransportError};

// == Queue Settings ==
#[derive(Debug, Clone, PartialEq)]
pub struct QueueSettings {
    /// Retry ceiling for operations that do not set their own
    pub max_attempts: u32,
    pub backoff: BackoffPolicy,
    /// Upper bound on a single transport call
    pub execute_timeout: Duration,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: BackoffPolicy::default(),
            execute_timeout: Duration::from_secs(30),
        }
    }
}

// == Drain Report ==
/// Per-drain tally.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    /// Transport calls made
    pub attempted: usize,
    pub succeeded: usize,
    /// Failed and re-queued
    pub retried: usize,
    /// Held back by backoff without an attempt
    pub deferred: usize,
    /// Failed for the last time and dropped
    pub exhausted: usize,
    /// True when the drain did nothing because the agent was offline or
    /// another drain was already running
    pub skipped: bool,
}

impl DrainReport {
    fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Default)]
struct QueueState {
    /// Live queue; new and retried operations are appended here
    pending: VecDeque<SyncOperation>,
    /// Unresolved remainder of the batch being drained
    in_flight: VecDeque<SyncOperation>,
}

impl QueueState {
    fn snapshot(&self) -> Vec<SyncOperation> {
        self.in_flight.iter().chain(self.pending.iter()).cloned().collect()
    }

    fn len(&self) -> usize {
        self.in_flight.len() + self.pending.len()
    }

    /// Pops the batch head if it is still `id` (a `clear` may have dropped it).
    fn resolve_head(&mut self, id: &str) -> bool {
        if self.in_flight.front().is_some_and(|op| op.id == id) {
            self.in_flight.pop_front();
            true
        } else {
            false
        }
    }
}

/// Resets the draining flag however the drain future ends.
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// == Sync Queue ==
pub struct SyncQueue {
    state: Mutex<QueueState>,
    draining: AtomicBool,
    wake: Notify,
    /// Unix ms of the last completed drain, 0 if none yet
    last_drain_at: AtomicU64,
    settings: QueueSettings,
    transport: Arc<dyn Transport>,
    store: Arc<dyn DurableStore>,
    clock: Arc<dyn Clock>,
    connectivity: ConnectivityMonitor,
    exhausted_tx: Option<mpsc::UnboundedSender<ExhaustedOperation>>,
}

impl SyncQueue {
    // == Constructor ==
    pub fn new(
        settings: QueueSettings,
        transport: Arc<dyn Transport>,
        store: Arc<dyn DurableStore>,
        clock: Arc<dyn Clock>,
        connectivity: ConnectivityMonitor,
        exhausted_tx: Option<mpsc::UnboundedSender<ExhaustedOperation>>,
    ) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            draining: AtomicBool::new(false),
            wake: Notify::new(),
            last_drain_at: AtomicU64::new(0),
            settings,
            transport,
            store,
            clock,
            connectivity,
            exhausted_tx,
        }
    }

    // == Load ==
    /// Restores pending operations from the durable store.
    /// Returns the number restored.
    pub async fn load(&self) -> usize {
        let items: Vec<SyncOperation> =
            persistence::load_items(self.store.as_ref(), QUEUE_NAMESPACE).await;

        let mut state = self.state.lock().await;
        state.in_flight.clear();
        state.pending = items.into_iter().filter(|op| !op.is_exhausted()).collect();

        info!("Sync queue restored: {} pending operations", state.pending.len());
        state.pending.len()
    }

    // == Enqueue ==
    /// Appends an operation to the live queue and returns its id.
    ///
    /// While online this also wakes the background drain task; it does not
    /// wait for the operation to run.
    pub async fn enqueue(&self, op: NewOperation) -> String {
        let operation = SyncOperation::from_new(op, self.settings.max_attempts, self.clock.now_ms());
        let id = operation.id.clone();
        debug!("Queued {} as {}", operation.target, id);

        {
            let mut state = self.state.lock().await;
            state.pending.push_back(operation);
            self.persist(&state).await;
        }

        if self.connectivity.is_online() {
            self.wake.notify_one();
        }
        id
    }

    // == Drain ==
    /// Replays queued operations in order, one at a time.
    ///
    /// Operations enqueued while this runs wait for the next drain. A failed
    /// operation goes to the back of the live queue, behind anything that
    /// arrived meanwhile, until its attempts are spent; then it is dropped
    /// and reported on the exhaustion channel. A failure the upstream will
    /// never accept (see [`TransportError::is_retryable`]) is dropped and
    /// reported on its first occurrence.
    ///
    /// Does nothing while offline or while another drain is running.
    pub async fn drain(&self) -> DrainReport {
        if !self.connectivity.is_online() {
            debug!("Drain skipped: offline");
            return DrainReport::skipped();
        }
        if self
            .draining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Drain skipped: already in progress");
            return DrainReport::skipped();
        }
        let _guard = DrainGuard(&self.draining);

        let batch = {
            let mut state = self.state.lock().await;
            // Leftovers of an interrupted drain stay ahead of newer work
            let pending: Vec<SyncOperation> = state.pending.drain(..).collect();
            state.in_flight.extend(pending);
            state.in_flight.len()
        };
        if batch == 0 {
            return DrainReport::default();
        }
        info!("Draining {} queued operations", batch);

        let mut report = DrainReport::default();
        loop {
            if !self.connectivity.is_online() {
                info!("Went offline mid-drain; remaining operations stay queued");
                break;
            }

            let head = self.state.lock().await.in_flight.front().cloned();
            let Some(mut op) = head else { break };

            let now = self.clock.now_ms();
            if op.is_backing_off(now) {
                let mut state = self.state.lock().await;
                if state.resolve_head(&op.id) {
                    state.pending.push_back(op);
                    report.deferred += 1;
                }
                self.persist(&state).await;
                continue;
            }

            report.attempted += 1;
            let result = self.execute(&op).await;

            let mut state = self.state.lock().await;
            let still_queued = state.resolve_head(&op.id);
            match result {
                Ok(()) => {
                    report.succeeded += 1;
                    debug!("Operation {} ({}) succeeded", op.id, op.target);
                }
                Err(e) => {
                    op.attempt_count += 1;
                    op.last_error = Some(e.to_string());

                    if op.is_exhausted() || !e.is_retryable() {
                        report.exhausted += 1;
                        if still_queued {
                            self.report_exhausted(op, e);
                        }
                    } else {
                        report.retried += 1;
                        let delay = self.settings.backoff.delay(op.attempt_count);
                        op.next_attempt_at = (!delay.is_zero())
                            .then(|| self.clock.now_ms().saturating_add(duration_ms(delay)));
                        debug!(
                            "Operation {} ({}) failed attempt {}/{}: {}",
                            op.id, op.target, op.attempt_count, op.max_attempts, e
                        );
                        if still_queued {
                            state.pending.push_back(op);
                        }
                    }
                }
            }
            self.persist(&state).await;
        }

        self.last_drain_at.store(self.clock.now_ms(), Ordering::Release);
        info!(
            "Drain finished: {} succeeded, {} retried, {} deferred, {} exhausted",
            report.succeeded, report.retried, report.deferred, report.exhausted
        );
        report
    }

    // == Size ==
    /// Number of unresolved operations, including any in the current batch.
    pub async fn size(&self) -> usize {
        self.state.lock().await.len()
    }

    // == Clear ==
    /// Drops every queued operation, including the unprocessed rest of a
    /// running drain.
    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        let dropped = state.len();
        state.pending.clear();
        state.in_flight.clear();
        self.persist(&state).await;
        info!("Sync queue cleared ({} operations dropped)", dropped);
    }

    /// Copies of the unresolved operations in execution order.
    pub async fn pending(&self) -> Vec<SyncOperation> {
        self.state.lock().await.snapshot()
    }

    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::Acquire)
    }

    /// Unix ms at which the last drain finished.
    pub fn last_drain_at(&self) -> Option<u64> {
        match self.last_drain_at.load(Ordering::Acquire) {
            0 => None,
            at => Some(at),
        }
    }

    /// Resolves once a drain has been requested by an online enqueue.
    pub async fn drain_requested(&self) {
        self.wake.notified().await;
    }

    // == Internals ==
    async fn execute(&self, op: &SyncOperation) -> Result<(), TransportError> {
        match tokio::time::timeout(self.settings.execute_timeout, self.transport.execute(op)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout),
        }
    }

    fn report_exhausted(&self, operation: SyncOperation, error: TransportError) {
        warn!(
            "Operation {} ({}) permanently failed after {} attempt(s): {}",
            operation.id, operation.target, operation.attempt_count, error
        );
        if let Some(tx) = &self.exhausted_tx {
            let report = ExhaustedOperation {
                operation,
                error: error.to_string(),
            };
            if tx.send(report).is_err() {
                debug!("Exhaustion receiver dropped");
            }
        }
    }

    async fn persist(&self, state: &QueueState) {
        persistence::save_items(
            self.store.as_ref(),
            QUEUE_NAMESPACE,
            state.snapshot(),
            self.clock.now_ms(),
        )
        .await;
    }
}

impl std::fmt::Debug for SyncQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncQueue")
            .field("settings", &self.settings)
            .field("draining", &self.is_draining())
            .field("last_drain_at", &self.last_drain_at())
            .finish()
    }
}
