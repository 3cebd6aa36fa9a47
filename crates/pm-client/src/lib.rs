//! HTTP client for the puppet-master job API.
//!
//! [`PuppetMasterClient`] implements [`JobApi`] over HTTPS + JSON and can run a
//! job to completion with [`PuppetMasterClient::execute_sync`].

mod cancel;
mod client;
mod config;
mod request;
mod response;
mod sync;

#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use cancel::CancellationToken;
pub use client::PuppetMasterClient;
pub use config::{ClientConfig, DEFAULT_POLL_INTERVAL};
pub use pm_types::{
    ApiError, Job, JobApi, JobPage, JobRequest, JobStatus, ListJobs, LogEntry, PaginationLinks,
    PaginationMeta,
};
pub use sync::{ExecuteOptions, SyncExecutor, TransientRetry};

#[cfg(any(test, feature = "test-util"))]
pub use mock::MockJobApi;
