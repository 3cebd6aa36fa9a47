//! Request and response DTOs for the `/jobs` resource.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// Lifecycle state of a job as reported by the service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Created,
    Queued,
    Done,
    /// Any status this client does not know about yet, including a missing one.
    #[default]
    #[serde(other)]
    Unknown,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Created => "created",
            JobStatus::Queued => "queued",
            JobStatus::Done => "done",
            JobStatus::Unknown => "unknown",
        }
    }

    /// `done` is the only terminal state; failed executions also end up here with `error` set.
    pub fn is_terminal(self) -> bool {
        self == JobStatus::Done
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "created" => Ok(JobStatus::Created),
            "queued" => Ok(JobStatus::Queued),
            "done" => Ok(JobStatus::Done),
            other => Err(format!(
                "unknown job status {:?} (expected created, queued or done)",
                other
            )),
        }
    }
}

/// One log line emitted by the executor while running a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub time: DateTime<Utc>,
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub message: String,
}

/// Snapshot of a job: status, submitted code, results and logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub uuid: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: JobStatus,
    #[serde(default)]
    pub code: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub vars: HashMap<String, String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub modules: HashMap<String, String>,
    /// Set only when execution failed; the job is still `done`.
    #[serde(default, deserialize_with = "empty_as_none")]
    pub error: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub logs: Vec<LogEntry>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub results: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub duration: i64,
}

impl Job {
    pub fn is_done(&self) -> bool {
        self.status.is_terminal()
    }

    /// True when the job finished with an execution error.
    pub fn failed(&self) -> bool {
        self.is_done() && self.error.is_some()
    }
}

impl PartialEq for Job {
    fn eq(&self, other: &Self) -> bool {
        self.uuid == other.uuid
            && self.status == other.status
            && self.code == other.code
            && string_maps_equal(&self.vars, &other.vars)
            && string_maps_equal(&self.modules, &other.modules)
            && self.error == other.error
            && logs_equal(&self.logs, &other.logs)
            && results_equal(&self.results, &other.results)
            && self.started_at == other.started_at
            && self.finished_at == other.finished_at
            && self.duration == other.duration
    }
}

fn string_maps_equal(a: &HashMap<String, String>, b: &HashMap<String, String>) -> bool {
    a.len() == b.len() && a.iter().all(|(k, v)| b.get(k) == Some(v))
}

fn results_equal(
    a: &HashMap<String, serde_json::Value>,
    b: &HashMap<String, serde_json::Value>,
) -> bool {
    a.len() == b.len() && a.iter().all(|(k, v)| b.get(k) == Some(v))
}

// Order-sensitive: logs are chronological.
fn logs_equal(a: &[LogEntry], b: &[LogEntry]) -> bool {
    a.len() == b.len()
        && a.iter().zip(b).all(|(x, y)| {
            x.time == y.time && x.level == y.level && x.message == y.message
        })
}

/// Create-job payload (POST /jobs).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobRequest {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub vars: HashMap<String, String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub modules: HashMap<String, String>,
}

impl JobRequest {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            ..Self::default()
        }
    }

    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    pub fn with_module(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.modules.insert(name.into(), source.into());
        self
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Code must contain something other than whitespace.
    pub fn has_code(&self) -> bool {
        !self.code.trim().is_empty()
    }
}

/// Links to neighbouring pages of a job listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaginationLinks {
    #[serde(default)]
    pub first: Option<String>,
    #[serde(default)]
    pub last: Option<String>,
    #[serde(default)]
    pub prev: Option<String>,
    #[serde(default)]
    pub next: Option<String>,
}

/// Position of a page within the whole listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaginationMeta {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub first_page: Option<u32>,
    #[serde(default)]
    pub current_page: u32,
    #[serde(default)]
    pub last_page: u32,
    #[serde(default)]
    pub per_page: u32,
    #[serde(default)]
    pub from: Option<u32>,
    #[serde(default)]
    pub to: Option<u32>,
    #[serde(default)]
    pub total: u32,
}

/// One page of jobs (GET /jobs). Detached from the client: fetch the next page explicitly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobPage {
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: Vec<Job>,
    #[serde(default)]
    pub links: PaginationLinks,
    #[serde(default)]
    pub meta: PaginationMeta,
}

impl JobPage {
    pub fn has_next(&self) -> bool {
        self.links.next.is_some() || self.meta.current_page < self.meta.last_page
    }
}

/// Filter and pagination for listing jobs. Zero values mean "server default".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListJobs {
    pub status: Option<JobStatus>,
    pub page: u32,
    pub per_page: u32,
}

impl ListJobs {
    pub fn page(page: u32, per_page: u32) -> Self {
        Self {
            status: None,
            page,
            per_page,
        }
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Query parameters to send; unset and zero values are left out.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::with_capacity(3);
        if let Some(status) = self.status {
            pairs.push(("status", status.as_str().to_string()));
        }
        if self.page > 0 {
            pairs.push(("page", self.page.to_string()));
        }
        if self.per_page > 0 {
            pairs.push(("per_page", self.per_page.to_string()));
        }
        pairs
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.filter(|s| !s.is_empty()))
}
