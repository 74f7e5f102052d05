use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use foundatio_core::CancellationToken;
use foundatio_lock::{AcquireOptions, LockProvider};
use foundatio_queue::{Queue, QueueEntry};

use crate::error::JobError;
use crate::interval::JobInterval;

/// User logic run against each dequeued entry (spec §4.6's `process_entry`
/// closure, modeled as a trait the way [`foundatio_queue::QueueEventHandler`]
/// and `foundatio_queue::WorkItemHandler` are).
#[async_trait]
pub trait EntryProcessor<T>: Send + Sync {
    async fn process(&self, entry: &QueueEntry<T>) -> Result<(), JobError>;
}

/// Optional per-entry mutual-exclusion hook (spec §4.6's `get_entry_lock`).
/// When present, [`JobRunner`] acquires this lock with zero wait before
/// handing the entry to the processor; if the lock can't be acquired
/// immediately, the entry is abandoned instead of processed, rather than
/// blocking the job loop on contention another holder is actively working
/// through.
pub trait EntryLock<T>: Send + Sync {
    /// The lock resource name to acquire for this entry, e.g.
    /// `format!("job:{}:{}", job_name, entry.envelope.id)`.
    fn resource_for(&self, entry: &QueueEntry<T>) -> String;

    fn provider(&self) -> Arc<dyn LockProvider>;
}

/// Outcome of a single [`JobRunner::run_once`] iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobIterationOutcome {
    /// An entry was dequeued, processed, and completed.
    Processed,
    /// The queue had nothing to dequeue within the wait timeout.
    NoWork,
    /// An entry was dequeued but its per-entry lock could not be acquired
    /// immediately; it was abandoned instead of processed.
    LockUnavailable,
}

/// Bridges a user `process_entry` function into a continuous loop against a
/// [`Queue`] (spec §4.6, C6), optionally guarded by a [`LockProvider`]
/// lease per entry.
pub struct JobRunner<T> {
    queue: Arc<dyn Queue<T>>,
    processor: Arc<dyn EntryProcessor<T>>,
    entry_lock: Option<Arc<dyn EntryLock<T>>>,
    wait_timeout: Option<Duration>,
}

impl<T> JobRunner<T>
where
    T: Send + Sync + 'static,
{
    #[must_use]
    pub fn new(queue: Arc<dyn Queue<T>>, processor: Arc<dyn EntryProcessor<T>>) -> Self {
        Self {
            queue,
            processor,
            entry_lock: None,
            wait_timeout: Some(Duration::from_secs(1)),
        }
    }

    #[must_use]
    pub fn with_entry_lock(mut self, entry_lock: Arc<dyn EntryLock<T>>) -> Self {
        self.entry_lock = Some(entry_lock);
        self
    }

    #[must_use]
    pub fn with_wait_timeout(mut self, wait_timeout: Option<Duration>) -> Self {
        self.wait_timeout = wait_timeout;
        self
    }

    /// Dequeue at most one entry and process it. Returns
    /// [`JobIterationOutcome::NoWork`] rather than erroring when the queue
    /// is empty.
    #[instrument(skip(self, cancel))]
    pub async fn run_once(&self, cancel: CancellationToken) -> Result<JobIterationOutcome, JobError> {
        let Some(entry) = self.queue.dequeue(self.wait_timeout, cancel).await? else {
            return Ok(JobIterationOutcome::NoWork);
        };

        if let Some(entry_lock) = &self.entry_lock {
            let resource = entry_lock.resource_for(&entry);
            let zero_wait = CancellationToken::new();
            zero_wait.cancel();

            let provider = entry_lock.provider();
            let lock = provider
                .clone()
                .acquire(&resource, AcquireOptions::default(), zero_wait)
                .await?;

            let Some(lock) = lock else {
                debug!(resource, "entry lock unavailable, abandoning entry");
                self.queue.abandon(&entry).await?;
                return Ok(JobIterationOutcome::LockUnavailable);
            };

            let result = self.processor.process(&entry).await;
            if let Err(err) = provider.release(&lock.resource, &lock.lock_id).await {
                warn!(resource, error = %err, "failed to release entry lock");
            }
            self.finish(entry, result).await?;
            return Ok(JobIterationOutcome::Processed);
        }

        let result = self.processor.process(&entry).await;
        self.finish(entry, result).await?;
        Ok(JobIterationOutcome::Processed)
    }

    async fn finish(&self, entry: QueueEntry<T>, result: Result<(), JobError>) -> Result<(), JobError> {
        match result {
            Ok(()) => {
                if !entry.is_terminal() {
                    self.queue.complete(&entry).await?;
                }
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "job processing failed, abandoning entry");
                self.queue.record_error();
                if !entry.is_terminal() {
                    self.queue.abandon(&entry).await?;
                }
                Err(err)
            }
        }
    }

    /// Run up to `count` iterations, stopping early if `cancel` fires.
    /// Processing errors are logged and do not stop the loop — only
    /// cancellation does.
    pub async fn run_n_times(&self, count: usize, cancel: CancellationToken) {
        for _ in 0..count {
            if cancel.is_cancelled() {
                break;
            }
            if let Err(err) = self.run_once(cancel.clone()).await {
                warn!(error = %err, "iteration failed");
            }
        }
    }

    /// Run forever until `cancel` fires, sleeping `interval` between
    /// iterations that found no work.
    pub async fn run_continuous(&self, cancel: CancellationToken, interval: JobInterval) {
        let mut consecutive_idle = 0u32;
        loop {
            if cancel.is_cancelled() {
                break;
            }

            match self.run_once(cancel.clone()).await {
                Ok(JobIterationOutcome::NoWork) => {
                    consecutive_idle += 1;
                    let delay = interval.delay_for(consecutive_idle - 1);
                    if !delay.is_zero() {
                        tokio::select! {
                            () = tokio::time::sleep(delay) => {}
                            () = cancel.cancelled() => break,
                        }
                    }
                }
                Ok(_) => consecutive_idle = 0,
                Err(err) => {
                    warn!(error = %err, "iteration failed");
                    consecutive_idle = 0;
                }
            }
        }
    }

    /// Spawn [`Self::run_continuous`] as a background task.
    #[must_use]
    pub fn spawn_continuous(self: Arc<Self>, cancel: CancellationToken, interval: JobInterval) -> JoinHandle<()>
    where
        T: 'static,
    {
        tokio::spawn(async move { self.run_continuous(cancel, interval).await })
    }
}
