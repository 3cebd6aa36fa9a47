//! Synchronous execution: submit a job, then poll until it is `done`.
//!
//! The loop ends only when a fetched job is terminal. A fetch that fails with
//! `TransientRead` is retried according to [`TransientRetry`]; any other error ends
//! the run. Deadline and cancellation are checked before every create, fetch and sleep,
//! and also bound the in-flight call.

use crate::cancel::CancellationToken;
use crate::config::DEFAULT_POLL_INTERVAL;
use pm_types::{ApiError, Job, JobApi, JobRequest};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

/// What to do when a poll fails with a transient read error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientRetry {
    /// Retry for as long as the errors keep coming. Pair with a deadline.
    Unbounded,
    /// Give up after `max_consecutive` transient failures in a row, waiting `backoff`
    /// between attempts. The count resets after any successful fetch.
    Limited {
        max_consecutive: u32,
        backoff: Duration,
    },
}

impl Default for TransientRetry {
    fn default() -> Self {
        TransientRetry::Limited {
            max_consecutive: 10,
            backoff: Duration::ZERO,
        }
    }
}

impl TransientRetry {
    pub fn limited(max_consecutive: u32) -> Self {
        TransientRetry::Limited {
            max_consecutive,
            backoff: Duration::ZERO,
        }
    }

    /// Whether another attempt is allowed after `consecutive` failures in a row.
    pub fn allows(&self, consecutive: u32) -> bool {
        match self {
            TransientRetry::Unbounded => true,
            TransientRetry::Limited {
                max_consecutive, ..
            } => consecutive <= *max_consecutive,
        }
    }

    pub fn backoff(&self) -> Duration {
        match self {
            TransientRetry::Unbounded => Duration::ZERO,
            TransientRetry::Limited { backoff, .. } => *backoff,
        }
    }
}

/// Bounds for one synchronous run. The default waits forever.
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    pub deadline: Option<Instant>,
    pub cancel: Option<CancellationToken>,
}

impl ExecuteOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + timeout),
            cancel: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn check(&self) -> Result<(), ApiError> {
        if self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
            return Err(ApiError::Cancelled);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(ApiError::DeadlineExceeded);
        }
        Ok(())
    }

    /// Run `fut` unless cancellation or the deadline comes first.
    async fn bound<T, F>(&self, fut: F) -> Result<T, ApiError>
    where
        F: Future<Output = Result<T, ApiError>>,
    {
        let cancelled = async {
            match &self.cancel {
                Some(token) => token.cancelled().await,
                None => std::future::pending().await,
            }
        };
        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };
        tokio::select! {
            res = fut => res,
            _ = cancelled => Err(ApiError::Cancelled),
            _ = expired => Err(ApiError::DeadlineExceeded),
        }
    }

    async fn sleep(&self, duration: Duration) -> Result<(), ApiError> {
        self.check()?;
        self.bound(async {
            tokio::time::sleep(duration).await;
            Ok(())
        })
        .await
    }
}

/// Polling state machine over any [`JobApi`].
#[derive(Debug, Clone)]
pub struct SyncExecutor {
    poll_interval: Duration,
    transient_retry: TransientRetry,
}

impl Default for SyncExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl SyncExecutor {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            transient_retry: TransientRetry::default(),
        }
    }

    pub fn with_transient_retry(mut self, retry: TransientRetry) -> Self {
        self.transient_retry = retry;
        self
    }

    /// Create the job, then fetch it until `status == done` and return that snapshot.
    ///
    /// Creation is never retried here.
    pub async fn run<A>(&self, api: &A, req: &JobRequest, opts: &ExecuteOptions) -> Result<Job, ApiError>
    where
        A: JobApi + ?Sized,
    {
        opts.check()?;
        let created = opts.bound(api.create_job(req)).await?;
        let uuid = created.uuid;
        debug!(uuid = %uuid, status = %created.status, "job submitted");

        let mut count = PollCount::default();
        loop {
            opts.check()?;
            match opts.bound(api.get_job(&uuid)).await {
                Ok(job) => {
                    count.fetched();
                    if job.status.is_terminal() {
                        info!(uuid = %uuid, polls = count.polls, failed = job.failed(), "job done");
                        return Ok(job);
                    }
                    trace!(uuid = %uuid, status = %job.status, polls = count.polls, "job not done yet");
                    opts.sleep(self.poll_interval).await?;
                }
                Err(e) if e.is_transient() => {
                    let transient = count.failed();
                    if !self.transient_retry.allows(transient) {
                        warn!(uuid = %uuid, attempts = transient, error = %e, "giving up after transient poll failures");
                        return Err(e);
                    }
                    warn!(uuid = %uuid, attempt = transient, error = %e, "transient poll failure, retrying");
                    let backoff = self.transient_retry.backoff();
                    if !backoff.is_zero() {
                        opts.sleep(backoff).await?;
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Poll bookkeeping for one run. Saturates so unbounded runs cannot overflow.
#[derive(Debug, Default)]
struct PollCount {
    polls: u32,
    transient: u32,
}

impl PollCount {
    fn fetched(&mut self) {
        self.polls = self.polls.saturating_add(1);
        self.transient = 0;
    }

    /// Returns the number of consecutive transient failures so far.
    fn failed(&mut self) -> u32 {
        self.transient = self.transient.saturating_add(1);
        self.transient
    }
}
