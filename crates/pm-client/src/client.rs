//! HTTP implementation of `JobApi`.

use crate::config::ClientConfig;
use crate::request::{dump_request, dump_response, Endpoint};
use crate::response::{decode, expect_empty, transport_error, DataEnvelope, Expect};
use crate::sync::{ExecuteOptions, SyncExecutor, TransientRetry};
use async_trait::async_trait;
use pm_types::{ApiError, Job, JobApi, JobPage, JobRequest, ListJobs};
use reqwest::{Method, StatusCode};
use std::time::Duration;
use tracing::{debug, instrument};

const JOBS: &str = "jobs";

/// Client for the `/jobs` resource of a puppet-master service.
///
/// Safe to share between tasks; the setters take `&mut self`, so change configuration
/// before sharing or behind your own lock.
#[derive(Clone)]
pub struct PuppetMasterClient {
    http: reqwest::Client,
    endpoint: Endpoint,
    debug: bool,
    poll_interval: Duration,
    transient_retry: TransientRetry,
}

impl PuppetMasterClient {
    /// Unscoped client with default settings.
    pub fn new(endpoint: &str, api_token: &str) -> Result<Self, ApiError> {
        Self::from_config(ClientConfig::new(endpoint, api_token))
    }

    pub fn from_config(config: ClientConfig) -> Result<Self, ApiError> {
        let endpoint = Endpoint::new(&config.endpoint, &config.api_token, config.team.as_deref())?;
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            endpoint,
            debug: config.debug,
            poll_interval: config.poll_interval,
            transient_retry: config.transient_retry,
        })
    }

    pub fn from_env() -> Result<Self, ApiError> {
        Self::from_config(ClientConfig::from_env()?)
    }

    /// Use a preconfigured `reqwest::Client` (proxies, TLS roots, pooling).
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_transient_retry(mut self, retry: TransientRetry) -> Self {
        self.transient_retry = retry;
        self
    }

    pub fn enable_debug_logs(&mut self) {
        self.debug = true;
    }

    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }

    pub fn set_poll_interval(&mut self, interval: Duration) {
        self.poll_interval = interval;
    }

    pub fn set_transient_retry(&mut self, retry: TransientRetry) {
        self.transient_retry = retry;
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn team(&self) -> Option<&str> {
        self.endpoint.team()
    }

    /// Submit `req` and wait until the job is `done`. Runs until the service finishes it.
    pub async fn execute_sync(&self, req: &JobRequest) -> Result<Job, ApiError> {
        self.execute_sync_with(req, &ExecuteOptions::default()).await
    }

    /// Like [`execute_sync`](Self::execute_sync), bounded by a deadline and/or cancellation token.
    pub async fn execute_sync_with(
        &self,
        req: &JobRequest,
        opts: &ExecuteOptions,
    ) -> Result<Job, ApiError> {
        SyncExecutor::new(self.poll_interval)
            .with_transient_retry(self.transient_retry)
            .run(self, req, opts)
            .await
    }

    /// Send and read the whole body; the connection is released on every path.
    async fn send(&self, request: reqwest::Request) -> Result<(StatusCode, Vec<u8>), ApiError> {
        if self.debug {
            dump_request(&request);
        }
        let res = self.http.execute(request).await.map_err(transport_error)?;
        let status = res.status();
        let headers = self.debug.then(|| res.headers().clone());
        let body = res.bytes().await.map_err(transport_error)?.to_vec();
        if let Some(headers) = headers {
            dump_response(status, &headers, &body);
        }
        Ok((status, body))
    }
}

impl std::fmt::Debug for PuppetMasterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PuppetMasterClient")
            .field("endpoint", &self.endpoint)
            .field("debug", &self.debug)
            .field("poll_interval", &self.poll_interval)
            .field("transient_retry", &self.transient_retry)
            .finish()
    }
}

#[async_trait]
impl JobApi for PuppetMasterClient {
    #[instrument(skip(self), level = "debug")]
    async fn list_jobs(&self, query: &ListJobs) -> Result<JobPage, ApiError> {
        let request = self.endpoint.request(
            &self.http,
            Method::GET,
            &[JOBS],
            &query.query_pairs(),
            None,
        )?;
        let (status, body) = self.send(request).await?;
        decode(status, &body, Expect::Read)
    }

    #[instrument(skip_all, level = "debug")]
    async fn create_job(&self, req: &JobRequest) -> Result<Job, ApiError> {
        if !req.has_code() {
            return Err(ApiError::EmptyCode);
        }
        let payload =
            serde_json::to_vec(req).map_err(|e| ApiError::Transport(format!("encode job: {}", e)))?;
        let request = self
            .endpoint
            .request(&self.http, Method::POST, &[JOBS], &[], Some(payload))?;
        let (status, body) = self.send(request).await?;
        let created: DataEnvelope<Job> = decode(status, &body, Expect::Create)?;
        debug!(uuid = %created.data.uuid, "job created");
        Ok(created.data)
    }

    #[instrument(skip(self), level = "debug")]
    async fn get_job(&self, uuid: &str) -> Result<Job, ApiError> {
        let request = self
            .endpoint
            .request(&self.http, Method::GET, &[JOBS, uuid], &[], None)?;
        let (status, body) = self.send(request).await?;
        let job: DataEnvelope<Job> = decode(status, &body, Expect::Read)?;
        Ok(job.data)
    }

    #[instrument(skip(self), level = "debug")]
    async fn delete_job(&self, uuid: &str) -> Result<(), ApiError> {
        let request = self
            .endpoint
            .request(&self.http, Method::DELETE, &[JOBS, uuid], &[], None)?;
        let (status, body) = self.send(request).await?;
        expect_empty(status, &body, Expect::Delete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_token_fails_construction() {
        for token in ["", "   ", "\n\t"] {
            let err = PuppetMasterClient::new("http://localhost", token).unwrap_err();
            assert!(matches!(err, ApiError::EmptyCredential), "token {:?}", token);
        }
    }

    #[test]
    fn non_blank_token_constructs() {
        for token in ["a", " 12345 ", "secret-token"] {
            assert!(PuppetMasterClient::new("http://localhost", token).is_ok());
        }
    }

    #[test]
    fn setters_change_configuration() {
        let mut client = PuppetMasterClient::new("http://localhost", "t")
            .unwrap()
            .with_poll_interval(Duration::from_millis(20));
        assert_eq!(client.poll_interval(), Duration::from_millis(20));
        client.set_poll_interval(Duration::from_secs(2));
        assert_eq!(client.poll_interval(), Duration::from_secs(2));
        client.enable_debug_logs();
        assert!(format!("{:?}", client).contains("debug: true"));
    }

    #[test]
    fn debug_output_hides_token() {
        let client = PuppetMasterClient::from_config(
            ClientConfig::new("http://localhost", "very-secret").with_team("ops"),
        )
        .unwrap();
        let rendered = format!("{:?}", client);
        assert!(!rendered.contains("very-secret"));
        assert_eq!(client.team(), Some("ops"));
    }
}
