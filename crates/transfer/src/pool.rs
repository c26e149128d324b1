//! Bounded worker pool and retry coordinator.
//!
//! Two bounded FIFO queues connect the pieces: the work queue carries
//! ranges waiting for an attempt, the result queue carries ranges with
//! their outcome attached. Workers pull from the first and push to the
//! second; the coordinator (running on the caller's task) feeds the work
//! queue, re-queues failures, and counts successes down to zero. Once the
//! count hits zero the work queue is closed and every worker task is
//! joined before [`TransferPool::run`] returns.

use std::collections::{HashSet, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::TransferError;
use crate::range::{CompletionTag, TransferRange};
use crate::retry::RetryPolicy;

/// Future returned by one range attempt.
pub type TransferFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Option<CompletionTag>, TransferError>> + Send + 'a>>;

/// The platform-specific work performed for one range.
///
/// Implementations should return [`TransferError::Transfer`] for failures
/// worth retrying. The pool races every attempt against its cancellation
/// token, so implementations need not watch for cancellation themselves.
pub trait RangeTransfer: Send + Sync + 'static {
    fn transfer<'a>(&'a self, range: &'a TransferRange) -> TransferFuture<'a>;
}

/// Pool sizing and retry behaviour.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolConfig {
    /// Upper bound on concurrent workers.
    pub concurrency: usize,
    pub retry: RetryPolicy,
}

impl PoolConfig {
    pub fn new(concurrency: usize, retry: RetryPolicy) -> Self {
        Self { concurrency, retry }
    }
}

/// Progress notification emitted while a transfer runs.
#[derive(Debug, Clone, PartialEq)]
pub enum TransferEvent {
    /// A range finished successfully.
    RangeCompleted {
        sequence: u64,
        bytes: u64,
        completed: usize,
        total: usize,
    },
    /// A range attempt failed and the range was re-queued.
    RangeRetrying {
        sequence: u64,
        attempt: u32,
        error: String,
        delay: Duration,
    },
}

/// Final state of one successful range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedRange {
    pub sequence: u64,
    pub start: u64,
    pub end: u64,
    pub attempts: u32,
    /// Tag from the last (successful) attempt.
    pub tag: Option<CompletionTag>,
}

/// Outcome of a successful [`TransferPool::run`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferReport {
    /// Completed ranges ordered by sequence number.
    pub completed: Vec<CompletedRange>,
    /// Number of workers that were spawned.
    pub workers: usize,
    /// Attempts made across all ranges, retries included.
    pub total_attempts: u64,
}

impl TransferReport {
    /// Bytes covered by the completed ranges.
    pub fn bytes(&self) -> u64 {
        self.completed.iter().map(|r| r.end - r.start).sum()
    }
}

/// A range travelling back from a worker with its outcome attached.
struct RangeOutcome {
    range: TransferRange,
    result: Result<Option<CompletionTag>, TransferError>,
}

/// Runs range transfers on a bounded set of tokio tasks.
pub struct TransferPool {
    config: PoolConfig,
    events_tx: Option<mpsc::Sender<TransferEvent>>,
}

impl TransferPool {
    pub fn new(config: PoolConfig) -> Self {
        Self {
            config,
            events_tx: None,
        }
    }

    /// Sends progress events to `events_tx`. Events are dropped rather
    /// than awaited when the channel is full.
    pub fn with_events(mut self, events_tx: mpsc::Sender<TransferEvent>) -> Self {
        self.events_tx = Some(events_tx);
        self
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Transfers every range, retrying failures per the retry policy.
    ///
    /// Spawns `min(concurrency, ranges.len())` workers (at least one when
    /// there is work) and blocks until all ranges succeed, one range
    /// exhausts its retries, or `cancel` fires. On any error the remaining
    /// in-flight attempts are aborted. Worker tasks are always joined
    /// before this returns.
    pub async fn run<T: RangeTransfer>(
        &self,
        ranges: Vec<TransferRange>,
        transfer: Arc<T>,
        cancel: &CancellationToken,
    ) -> Result<TransferReport, TransferError> {
        let total = ranges.len();
        if total == 0 {
            debug!("nothing to transfer");
            return Ok(TransferReport::default());
        }
        if cancel.is_cancelled() {
            return Err(TransferError::Cancelled);
        }

        let worker_count = self.config.concurrency.clamp(1, total);
        // Child token: aborting our own workers must not cancel the caller.
        let pool_cancel = cancel.child_token();

        let (work_tx, work_rx) = mpsc::channel::<TransferRange>(worker_count);
        let (result_tx, mut result_rx) = mpsc::channel::<RangeOutcome>(worker_count);
        let work_rx = Arc::new(Mutex::new(work_rx));

        let mut workers = JoinSet::new();
        for worker in 0..worker_count {
            workers.spawn(worker_loop(
                worker,
                Arc::clone(&work_rx),
                result_tx.clone(),
                Arc::clone(&transfer),
                self.config.retry.clone(),
                pool_cancel.clone(),
            ));
        }
        drop(result_tx);

        debug!(ranges = total, workers = worker_count, "transfer pool started");

        let result = self
            .coordinate(ranges, work_tx, &mut result_rx, &mut workers, &pool_cancel)
            .await;

        if result.is_err() {
            pool_cancel.cancel();
        }
        // Unblocks any worker still trying to publish a result.
        drop(result_rx);

        let mut panicked = false;
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined
                && e.is_panic()
            {
                error!(error = %e, "transfer worker panicked");
                panicked = true;
            }
        }

        let mut report = result?;
        if panicked {
            return Err(TransferError::WorkerPanicked);
        }
        report.workers = worker_count;
        info!(
            ranges = total,
            attempts = report.total_attempts,
            bytes = report.bytes(),
            "transfer complete"
        );
        Ok(report)
    }

    /// Feeds the work queue and folds results until every range succeeded.
    ///
    /// Consumes `work_tx`, so the work queue closes when this returns.
    async fn coordinate(
        &self,
        ranges: Vec<TransferRange>,
        work_tx: mpsc::Sender<TransferRange>,
        result_rx: &mut mpsc::Receiver<RangeOutcome>,
        workers: &mut JoinSet<()>,
        cancel: &CancellationToken,
    ) -> Result<TransferReport, TransferError> {
        let total = ranges.len();
        let mut pending: VecDeque<TransferRange> = ranges.into();
        let mut outstanding = total;
        let mut done: HashSet<u64> = HashSet::with_capacity(total);
        let mut report = TransferReport {
            completed: Vec::with_capacity(total),
            ..TransferReport::default()
        };

        while outstanding > 0 {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    debug!(outstanding, "transfer cancelled");
                    return Err(TransferError::Cancelled);
                }

                Some(joined) = workers.join_next() => {
                    // Workers only exit on their own once the queue closes,
                    // which cannot happen while ranges are outstanding.
                    return Err(match joined {
                        Err(e) if e.is_panic() => {
                            error!(error = %e, "transfer worker panicked");
                            TransferError::WorkerPanicked
                        }
                        _ => TransferError::PoolStopped,
                    });
                }

                permit = work_tx.reserve(), if !pending.is_empty() => {
                    let permit = permit.map_err(|_| TransferError::PoolStopped)?;
                    if let Some(range) = pending.pop_front() {
                        trace!(sequence = range.sequence, attempt = range.attempts + 1, "range queued");
                        permit.send(range);
                    }
                }

                outcome = result_rx.recv() => {
                    let Some(RangeOutcome { mut range, result }) = outcome else {
                        return Err(TransferError::PoolStopped);
                    };
                    report.total_attempts += 1;

                    match result {
                        Ok(tag) => {
                            if !done.insert(range.sequence) {
                                warn!(sequence = range.sequence, "ignoring duplicate completion");
                                continue;
                            }
                            outstanding -= 1;
                            debug!(
                                sequence = range.sequence,
                                attempts = range.attempts,
                                outstanding,
                                "range complete"
                            );
                            self.emit(TransferEvent::RangeCompleted {
                                sequence: range.sequence,
                                bytes: range.len(),
                                completed: total - outstanding,
                                total,
                            });
                            report.completed.push(CompletedRange {
                                sequence: range.sequence,
                                start: range.start,
                                end: range.end,
                                attempts: range.attempts,
                                tag,
                            });
                        }
                        Err(TransferError::Cancelled) => return Err(TransferError::Cancelled),
                        Err(e) => {
                            let last_error = range.last_error.take().unwrap_or_else(|| e.to_string());
                            if !self.config.retry.allows_retry(range.attempts) {
                                error!(
                                    sequence = range.sequence,
                                    attempts = range.attempts,
                                    error = %last_error,
                                    "range exhausted its retries"
                                );
                                return Err(TransferError::RetriesExhausted {
                                    sequence: range.sequence,
                                    attempts: range.attempts,
                                    last_error,
                                });
                            }
                            let delay = self.config.retry.delay_for_attempt(range.attempts);
                            warn!(
                                sequence = range.sequence,
                                attempt = range.attempts,
                                error = %last_error,
                                retry_in_ms = delay.as_millis() as u64,
                                "range transfer failed, retrying"
                            );
                            self.emit(TransferEvent::RangeRetrying {
                                sequence: range.sequence,
                                attempt: range.attempts,
                                error: last_error,
                                delay,
                            });
                            pending.push_back(range);
                        }
                    }
                }
            }
        }

        report.completed.sort_by_key(|r| r.sequence);
        Ok(report)
    }

    fn emit(&self, event: TransferEvent) {
        if let Some(tx) = &self.events_tx {
            let _ = tx.try_send(event);
        }
    }
}

/// Pulls ranges until the work queue is closed and drained.
async fn worker_loop<T: RangeTransfer>(
    worker: usize,
    queue: Arc<Mutex<mpsc::Receiver<TransferRange>>>,
    results: mpsc::Sender<RangeOutcome>,
    transfer: Arc<T>,
    retry: RetryPolicy,
    cancel: CancellationToken,
) {
    loop {
        let next = {
            let mut queue = queue.lock().await;
            tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                range = queue.recv() => range,
            }
        };
        let Some(mut range) = next else {
            break;
        };

        if range.attempts > 0 {
            let delay = retry.delay_for_attempt(range.attempts);
            if !delay.is_zero() {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }

        range.attempts += 1;
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TransferError::Cancelled),
            result = transfer.transfer(&range) => result,
        };
        if let Err(e) = &result {
            range.last_error = Some(e.to_string());
        }

        if results.send(RangeOutcome { range, result }).await.is_err() {
            break;
        }
    }
    trace!(worker, "transfer worker exiting");
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    use super::*;
    use crate::range::plan;

    /// Scripted transfer: each sequence fails a fixed number of times,
    /// then succeeds with a tag naming the attempt.
    #[derive(Default)]
    struct Scripted {
        failures: HashMap<u64, u32>,
        calls: StdMutex<HashMap<u64, u32>>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        delay: Duration,
    }

    impl Scripted {
        fn failing(failures: &[(u64, u32)]) -> Self {
            Self {
                failures: failures.iter().copied().collect(),
                ..Self::default()
            }
        }

        fn calls_for(&self, sequence: u64) -> u32 {
            self.calls.lock().unwrap().get(&sequence).copied().unwrap_or(0)
        }

        fn total_calls(&self) -> u32 {
            self.calls.lock().unwrap().values().sum()
        }
    }

    impl RangeTransfer for Scripted {
        fn transfer<'a>(&'a self, range: &'a TransferRange) -> TransferFuture<'a> {
            Box::pin(async move {
                let call = {
                    let mut calls = self.calls.lock().unwrap();
                    let n = calls.entry(range.sequence).or_insert(0);
                    *n += 1;
                    *n
                };
                let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(now, Ordering::SeqCst);
                if !self.delay.is_zero() {
                    tokio::time::sleep(self.delay).await;
                }
                self.in_flight.fetch_sub(1, Ordering::SeqCst);

                let fail_times = self.failures.get(&range.sequence).copied().unwrap_or(0);
                if call <= fail_times {
                    Err(TransferError::Transfer(format!("transient failure {call}")))
                } else {
                    Ok(Some(CompletionTag(format!("{}-{}", range.sequence, call))))
                }
            })
        }
    }

    fn pool(concurrency: usize, max_attempts: u32) -> TransferPool {
        TransferPool::new(PoolConfig::new(
            concurrency,
            RetryPolicy::immediate(max_attempts),
        ))
    }

    fn ranges(total: u64, part: u64) -> Vec<TransferRange> {
        plan(total, std::num::NonZeroU64::new(part).unwrap())
    }

    #[tokio::test]
    async fn empty_transfer_completes_without_workers() {
        let transfer = Arc::new(Scripted::default());
        let report = pool(8, 3)
            .run(Vec::new(), Arc::clone(&transfer), &CancellationToken::new())
            .await
            .unwrap();
        assert!(report.completed.is_empty());
        assert_eq!(report.workers, 0);
        assert_eq!(transfer.total_calls(), 0);
    }

    #[tokio::test]
    async fn all_ranges_succeed_first_try() {
        let transfer = Arc::new(Scripted::default());
        let report = pool(8, 3)
            .run(ranges(25, 10), Arc::clone(&transfer), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.workers, 3, "never more workers than ranges");
        assert_eq!(report.total_attempts, 3);
        let seqs: Vec<u64> = report.completed.iter().map(|r| r.sequence).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
        assert_eq!(report.bytes(), 25);
        assert_eq!(report.completed[2].start, 20);
        assert_eq!(report.completed[2].end, 25);
    }

    #[tokio::test]
    async fn failed_range_is_retried_and_keeps_last_tag() {
        let transfer = Arc::new(Scripted::failing(&[(2, 3)]));
        let report = pool(4, 5)
            .run(ranges(40, 10), Arc::clone(&transfer), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.completed.len(), 4);
        assert_eq!(transfer.calls_for(2), 4);
        assert_eq!(transfer.calls_for(1), 1);
        let second = &report.completed[1];
        assert_eq!(second.sequence, 2);
        assert_eq!(second.attempts, 4);
        assert_eq!(second.start, 10, "retries keep the original bounds");
        assert_eq!(second.end, 20);
        assert_eq!(second.tag, Some(CompletionTag("2-4".into())));
        assert_eq!(report.total_attempts, 7);
    }

    #[tokio::test]
    async fn each_range_completes_exactly_once() {
        let transfer = Arc::new(Scripted::failing(&[(1, 1), (5, 2), (9, 1)]));
        let (tx, mut rx) = mpsc::channel(64);
        let report = pool(3, 5)
            .with_events(tx)
            .run(ranges(100, 10), Arc::clone(&transfer), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.completed.len(), 10);
        let seqs: Vec<u64> = report.completed.iter().map(|r| r.sequence).collect();
        assert_eq!(seqs, (1..=10).collect::<Vec<_>>());

        let mut completions: HashMap<u64, usize> = HashMap::new();
        let mut last_completed = 0;
        while let Ok(event) = rx.try_recv() {
            if let TransferEvent::RangeCompleted {
                sequence,
                completed,
                ..
            } = event
            {
                *completions.entry(sequence).or_insert(0) += 1;
                assert_eq!(completed, last_completed + 1, "completion count moves by one");
                last_completed = completed;
            }
        }
        assert_eq!(completions.len(), 10);
        assert!(completions.values().all(|&n| n == 1), "{completions:?}");
        assert_eq!(last_completed, 10);
    }

    #[tokio::test]
    async fn exhausted_retries_surface_the_sequence() {
        let transfer = Arc::new(Scripted::failing(&[(3, u32::MAX)]));
        let err = pool(2, 3)
            .run(ranges(50, 10), Arc::clone(&transfer), &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            TransferError::RetriesExhausted {
                sequence,
                attempts,
                last_error,
            } => {
                assert_eq!(sequence, 3);
                assert_eq!(attempts, 3);
                assert!(last_error.contains("transient failure 3"), "{last_error}");
            }
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
        assert_eq!(transfer.calls_for(3), 3);
    }

    #[tokio::test]
    async fn concurrency_is_bounded() {
        let transfer = Arc::new(Scripted {
            delay: Duration::from_millis(20),
            ..Scripted::default()
        });
        let report = pool(3, 1)
            .run(ranges(120, 10), Arc::clone(&transfer), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.workers, 3);
        assert_eq!(report.completed.len(), 12);
        let peak = transfer.peak.load(Ordering::SeqCst);
        assert!(peak <= 3, "peak concurrency {peak} exceeds pool size");
    }

    #[tokio::test]
    async fn cancellation_unblocks_the_join_point() {
        let transfer = Arc::new(Scripted {
            delay: Duration::from_secs(3600),
            ..Scripted::default()
        });
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = pool(4, 3)
            .run(ranges(40, 10), Arc::clone(&transfer), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::Cancelled));
        assert_eq!(transfer.in_flight.load(Ordering::SeqCst), 4, "aborted mid-call");
    }

    #[tokio::test]
    async fn already_cancelled_does_no_work() {
        let transfer = Arc::new(Scripted::default());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = pool(4, 3)
            .run(ranges(40, 10), Arc::clone(&transfer), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::Cancelled));
        assert_eq!(transfer.total_calls(), 0);
    }

    #[tokio::test]
    async fn failure_does_not_cancel_the_caller_token() {
        let transfer = Arc::new(Scripted::failing(&[(1, u32::MAX)]));
        let cancel = CancellationToken::new();
        let _ = pool(2, 2)
            .run(ranges(20, 10), Arc::clone(&transfer), &cancel)
            .await;
        assert!(!cancel.is_cancelled());
    }

    #[tokio::test]
    async fn events_report_retries_and_completions() {
        let transfer = Arc::new(Scripted::failing(&[(1, 1)]));
        let (tx, mut rx) = mpsc::channel(64);
        pool(1, 3)
            .with_events(tx)
            .run(ranges(20, 10), Arc::clone(&transfer), &CancellationToken::new())
            .await
            .unwrap();

        let mut events = Vec::new();
        while let Ok(e) = rx.try_recv() {
            events.push(e);
        }
        assert!(events.iter().any(|e| matches!(
            e,
            TransferEvent::RangeRetrying { sequence: 1, attempt: 1, .. }
        )));
        let completions = events
            .iter()
            .filter(|e| matches!(e, TransferEvent::RangeCompleted { .. }))
            .count();
        assert_eq!(completions, 2);
        assert!(events.iter().any(|e| matches!(
            e,
            TransferEvent::RangeCompleted { completed: 2, total: 2, .. }
        )));
    }

    struct Panicky;

    impl RangeTransfer for Panicky {
        fn transfer<'a>(&'a self, range: &'a TransferRange) -> TransferFuture<'a> {
            Box::pin(async move {
                if range.sequence == 2 {
                    panic!("boom");
                }
                Ok(None)
            })
        }
    }

    #[tokio::test]
    async fn worker_panic_is_reported() {
        let err = pool(2, 3)
            .run(ranges(30, 10), Arc::new(Panicky), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::WorkerPanicked), "{err:?}");
    }
}
