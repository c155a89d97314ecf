//! Bounded pool of browser-page tasks.
//!
//! Each enqueued item runs on its own page from the shared driver, at most
//! `max_concurrency` at a time, with per-attempt timeout and bounded retry.
//! Results go to the channel the caller passes in with the item.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;

use crate::error::ScraperError;
use crate::retry::{is_fatal, is_retriable};
use crate::session::{BrowserDriver, HeadlessSession};

/// Work that runs against one browser page.
#[async_trait]
pub trait PageTask<S: HeadlessSession>: Send + Sync + 'static {
    type Payload: Clone + Send + Sync + 'static;
    type Output: Send + 'static;

    /// Short description of an item, used in logs.
    fn label(&self, payload: &Self::Payload) -> String;

    /// # Errors
    ///
    /// Any [`ScraperError`]; the pool decides whether to retry.
    async fn run(&self, session: &S, payload: Self::Payload) -> Result<Self::Output, ScraperError>;
}

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_concurrency: usize,
    /// Retries after the first attempt.
    pub retry_limit: u32,
    pub retry_delay: Duration,
    pub task_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 3,
            retry_limit: 3,
            retry_delay: Duration::from_secs(5),
            task_timeout: Duration::from_secs(60),
        }
    }
}

/// How the enqueued items ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolReport {
    pub succeeded: usize,
    pub failed: usize,
    /// Items never finished because the pool halted or was shut down.
    pub skipped: usize,
}

enum Outcome {
    Succeeded,
    Failed,
    Skipped,
    Fatal(ScraperError),
}

pub struct WorkerPool<D: BrowserDriver> {
    driver: Arc<D>,
    config: PoolConfig,
    permits: Arc<Semaphore>,
    halted: Arc<AtomicBool>,
    jobs: JoinSet<Outcome>,
}

impl<D: BrowserDriver> WorkerPool<D> {
    pub fn new(driver: Arc<D>, config: PoolConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrency.max(1)));
        Self {
            driver,
            config,
            permits,
            halted: Arc::new(AtomicBool::new(false)),
            jobs: JoinSet::new(),
        }
    }

    /// Schedule `payload` on `task`. The output is sent on `results` when an
    /// attempt succeeds.
    pub fn enqueue<T>(
        &mut self,
        task: &Arc<T>,
        payload: T::Payload,
        results: mpsc::UnboundedSender<T::Output>,
    ) where
        T: PageTask<D::Session>,
    {
        let job = Job {
            driver: Arc::clone(&self.driver),
            task: Arc::clone(task),
            config: self.config.clone(),
            permits: Arc::clone(&self.permits),
            halted: Arc::clone(&self.halted),
        };
        self.jobs.spawn(job.run(payload, results));
    }

    /// Number of items not yet finished.
    pub fn pending(&self) -> usize {
        self.jobs.len()
    }

    /// Wait until every enqueued item has finished.
    ///
    /// # Errors
    ///
    /// Returns the first run-ending error (lost browser, credential
    /// exhaustion). After that the pool starts no new attempts.
    pub async fn await_idle(&mut self) -> Result<PoolReport, ScraperError> {
        let mut report = PoolReport::default();
        let mut fatal: Option<ScraperError> = None;

        while let Some(joined) = self.jobs.join_next().await {
            match joined {
                Ok(Outcome::Succeeded) => report.succeeded += 1,
                Ok(Outcome::Failed) => report.failed += 1,
                Ok(Outcome::Skipped) => report.skipped += 1,
                Ok(Outcome::Fatal(err)) => {
                    report.failed += 1;
                    fatal.get_or_insert(err);
                }
                Err(e) if e.is_cancelled() => report.skipped += 1,
                Err(e) => {
                    tracing::error!(error = %e, "pool task panicked");
                    report.failed += 1;
                }
            }
        }

        match fatal {
            Some(err) => Err(err),
            None => Ok(report),
        }
    }

    /// Abort in-flight items and close the browser.
    ///
    /// # Errors
    ///
    /// Returns the driver's error if the browser does not close cleanly.
    pub async fn shutdown(&mut self) -> Result<(), ScraperError> {
        self.halted.store(true, Ordering::SeqCst);
        self.jobs.abort_all();
        while self.jobs.join_next().await.is_some() {}
        self.driver.shutdown().await
    }
}

struct Job<D: BrowserDriver, T> {
    driver: Arc<D>,
    task: Arc<T>,
    config: PoolConfig,
    permits: Arc<Semaphore>,
    halted: Arc<AtomicBool>,
}

impl<D, T> Job<D, T>
where
    D: BrowserDriver,
    T: PageTask<D::Session>,
{
    async fn run(self, payload: T::Payload, results: mpsc::UnboundedSender<T::Output>) -> Outcome {
        let label = self.task.label(&payload);
        let retry_limit = self.config.retry_limit;

        for attempt in 0..=retry_limit {
            if self.halted.load(Ordering::SeqCst) {
                return Outcome::Skipped;
            }
            let Ok(permit) = self.permits.acquire().await else {
                return Outcome::Skipped;
            };
            if self.halted.load(Ordering::SeqCst) {
                return Outcome::Skipped;
            }

            let err = match self.attempt(payload.clone(), &label).await {
                Ok(output) => {
                    if results.send(output).is_err() {
                        tracing::warn!(task = %label, "result receiver dropped");
                    }
                    return Outcome::Succeeded;
                }
                Err(err) => err,
            };

            if is_fatal(&err) {
                self.halted.store(true, Ordering::SeqCst);
                tracing::error!(task = %label, error = %err, "fatal error, halting pool");
                return Outcome::Fatal(err);
            }

            let will_retry = is_retriable(&err) && attempt < retry_limit;
            if matches!(err, ScraperError::Interstitial { .. }) {
                tracing::info!(task = %label, attempt, will_retry, "interstitial page served");
            } else {
                tracing::warn!(task = %label, attempt, will_retry, error = %err, "task attempt failed");
            }
            if !will_retry {
                tracing::warn!(task = %label, attempts = attempt + 1, "skipping item");
                return Outcome::Failed;
            }
            drop(permit);
            tokio::time::sleep(self.config.retry_delay).await;
        }
        Outcome::Failed
    }

    async fn attempt(&self, payload: T::Payload, label: &str) -> Result<T::Output, ScraperError> {
        let session = self.driver.open_session().await?;
        let timeout = self.config.task_timeout;
        let result = tokio::time::timeout(timeout, self.task.run(&session, payload))
            .await
            .unwrap_or_else(|_| {
                Err(ScraperError::Timeout {
                    what: label.to_owned(),
                    after_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                })
            });
        if let Err(e) = session.close().await {
            tracing::debug!(task = %label, error = %e, "closing page failed");
        }
        result
    }
}
