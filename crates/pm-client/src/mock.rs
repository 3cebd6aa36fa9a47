//! In-memory `JobApi` for tests: no network, scripted poll outcomes, call counters.

use async_trait::async_trait;
use pm_types::{ApiError, Job, JobApi, JobPage, JobRequest, JobStatus, ListJobs, PaginationMeta};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

enum Scripted {
    Status(JobStatus),
    Error(ApiError),
}

/// Jobs are kept in creation order. `get_job` on a known uuid first drains the script
/// queue (see [`push_status`](Self::push_status) / [`push_error`](Self::push_error)),
/// then falls back to the stored job.
#[derive(Default)]
pub struct MockJobApi {
    jobs: Mutex<Vec<Job>>,
    script: Mutex<VecDeque<Scripted>>,
    create_error: Mutex<Option<ApiError>>,
    creates: AtomicUsize,
    gets: AtomicUsize,
    deletes: AtomicUsize,
    lists: AtomicUsize,
}

impl MockJobApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next `get_job` reports this status (and the stored job keeps it).
    pub fn push_status(&self, status: JobStatus) {
        lock(&self.script).push_back(Scripted::Status(status));
    }

    /// Next `get_job` fails with `err`.
    pub fn push_error(&self, err: ApiError) {
        lock(&self.script).push_back(Scripted::Error(err));
    }

    /// Next `create_job` fails with `err`.
    pub fn fail_next_create(&self, err: ApiError) {
        *lock(&self.create_error) = Some(err);
    }

    pub fn create_calls(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn get_calls(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

fn new_job(req: &JobRequest) -> Job {
    Job {
        uuid: uuid::Uuid::new_v4().to_string(),
        status: JobStatus::Created,
        code: req.code.clone(),
        vars: req.vars.clone(),
        modules: req.modules.clone(),
        error: None,
        logs: Vec::new(),
        results: HashMap::new(),
        started_at: None,
        finished_at: None,
        duration: 0,
    }
}

#[async_trait]
impl JobApi for MockJobApi {
    async fn list_jobs(&self, query: &ListJobs) -> Result<JobPage, ApiError> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        let jobs = lock(&self.jobs);
        let matching: Vec<Job> = jobs
            .iter()
            .filter(|j| query.status.map_or(true, |s| j.status == s))
            .cloned()
            .collect();
        let per_page = if query.per_page == 0 { 15 } else { query.per_page };
        let page = query.page.max(1);
        let total = matching.len() as u32;
        let data: Vec<Job> = matching
            .into_iter()
            .skip(((page - 1) * per_page) as usize)
            .take(per_page as usize)
            .collect();
        Ok(JobPage {
            data,
            meta: PaginationMeta {
                current_page: page,
                last_page: total.div_ceil(per_page).max(1),
                per_page,
                total,
                ..PaginationMeta::default()
            },
            ..JobPage::default()
        })
    }

    async fn create_job(&self, req: &JobRequest) -> Result<Job, ApiError> {
        if !req.has_code() {
            return Err(ApiError::EmptyCode);
        }
        self.creates.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = lock(&self.create_error).take() {
            return Err(err);
        }
        let job = new_job(req);
        lock(&self.jobs).push(job.clone());
        Ok(job)
    }

    async fn get_job(&self, uuid: &str) -> Result<Job, ApiError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        let mut jobs = lock(&self.jobs);
        let job = jobs
            .iter_mut()
            .find(|j| j.uuid == uuid)
            .ok_or(ApiError::NotFound)?;
        // Unknown uuids leave the script untouched.
        let next = lock(&self.script).pop_front();
        match next {
            Some(Scripted::Error(err)) => Err(err),
            Some(Scripted::Status(status)) => {
                job.status = status;
                Ok(job.clone())
            }
            None => Ok(job.clone()),
        }
    }

    async fn delete_job(&self, uuid: &str) -> Result<(), ApiError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        let mut jobs = lock(&self.jobs);
        let before = jobs.len();
        jobs.retain(|j| j.uuid != uuid);
        if jobs.len() == before {
            return Err(ApiError::NotFound);
        }
        Ok(())
    }
}
