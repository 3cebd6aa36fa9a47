//! Job resource abstraction.

use crate::{ApiError, Job, JobPage, JobRequest, ListJobs};
use async_trait::async_trait;

/// The four primitive operations on `/jobs`.
///
/// Implementations own no per-job state; every call returns a fresh snapshot.
#[async_trait]
pub trait JobApi: Send + Sync {
    /// List one page of jobs, optionally filtered by status.
    async fn list_jobs(&self, query: &ListJobs) -> Result<JobPage, ApiError>;

    /// Submit a job for execution. Blank code fails with `EmptyCode` before any I/O.
    async fn create_job(&self, req: &JobRequest) -> Result<Job, ApiError>;

    /// Fetch one job by uuid.
    async fn get_job(&self, uuid: &str) -> Result<Job, ApiError>;

    /// Delete one job by uuid.
    async fn delete_job(&self, uuid: &str) -> Result<(), ApiError>;
}
