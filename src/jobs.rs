//! Job lifecycle management: start, watch, cancel, and delete audit runs.
//!
//! The manager keeps a registry of live jobs (progress counters and cancel
//! flags) next to the durable rows in the store. Rows outlive the process;
//! registry entries last only as long as the crawl task.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{self, ConfigError, CrawlConfig};
use crate::models::{CrawlJob, JobStatus};
use crate::progress::{JobProgress, ProgressSnapshot, SharedProgress};
use crate::runner::{CrawlRunner, RunnerError};
use crate::store::{AuditStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Runner(#[from] RunnerError),

    #[error("no job with id {0}")]
    NotFound(Uuid),

    #[error("job {0} is still running; cancel it before deleting")]
    StillRunning(Uuid),

    #[error("crawl task failed: {0}")]
    TaskFailed(String),
}

/// Live state for one in-process crawl.
struct JobHandle {
    progress: SharedProgress,
    cancel: Arc<AtomicBool>,
    task: Mutex<Option<JoinHandle<CrawlJob>>>,
}

#[derive(Clone)]
pub struct JobManager {
    store: Arc<AuditStore>,
    live: Arc<DashMap<Uuid, Arc<JobHandle>>>,
}

impl JobManager {
    pub fn new(store: Arc<AuditStore>) -> Self {
        Self {
            store,
            live: Arc::new(DashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<AuditStore> {
        &self.store
    }

    /// Validate, persist as pending, and launch a crawl. Returns the pending
    /// job row; the crawl proceeds in a background task.
    pub fn start_job(
        &self,
        target_url: &str,
        crawl_config: CrawlConfig,
    ) -> Result<CrawlJob, JobError> {
        config::validate_target_url(target_url)?;
        crawl_config.validate()?;

        let job = CrawlJob::new(target_url.to_string(), crawl_config);
        self.store.put_job(&job)?;

        let progress: SharedProgress = Arc::new(JobProgress::new());
        let cancel = Arc::new(AtomicBool::new(false));
        let runner = CrawlRunner::new(
            job.clone(),
            Arc::clone(&self.store),
            Arc::clone(&progress),
            Arc::clone(&cancel),
        )?;

        let handle = Arc::new(JobHandle {
            progress,
            cancel,
            task: Mutex::new(None),
        });
        self.live.insert(job.id, Arc::clone(&handle));

        let live = Arc::clone(&self.live);
        let job_id = job.id;
        let task = tokio::spawn(async move {
            let final_job = runner.run().await;
            live.remove(&job_id);
            final_job
        });
        *handle.task.lock() = Some(task);

        info!(job_id = %job.id, target = %job.target_url, "job started");
        Ok(job)
    }

    /// Request cancellation. Idempotent: cancelling a finished or already
    /// cancelled job reports its current status and changes nothing.
    pub fn cancel(&self, job_id: &Uuid) -> Result<JobStatus, JobError> {
        if let Some(handle) = self.live.get(job_id) {
            handle.cancel.store(true, Ordering::SeqCst);
            info!(job_id = %job_id, "cancellation requested");
            return Ok(JobStatus::Running);
        }

        let Some(mut job) = self.store.get_job(job_id)? else {
            return Err(JobError::NotFound(*job_id));
        };
        if job.status.is_terminal() {
            return Ok(job.status);
        }

        // No live handle but the row is not terminal: the owning process is
        // gone. Settle the row so it does not read as running forever.
        warn!(job_id = %job_id, status = %job.status, "cancelling orphaned job row");
        job.status = JobStatus::Cancelled;
        job.completed_at = Some(chrono::Utc::now());
        self.store.finish_job(&job)?;
        Ok(JobStatus::Cancelled)
    }

    pub fn get(&self, job_id: &Uuid) -> Result<CrawlJob, JobError> {
        self.store
            .get_job(job_id)?
            .ok_or(JobError::NotFound(*job_id))
    }

    pub fn list(&self) -> Result<Vec<CrawlJob>, JobError> {
        Ok(self.store.list_jobs()?)
    }

    /// Live counters for a running job, or `None` once it has settled.
    pub fn live_progress(&self, job_id: &Uuid) -> Option<ProgressSnapshot> {
        self.live.get(job_id).map(|handle| handle.progress.snapshot())
    }

    pub fn is_live(&self, job_id: &Uuid) -> bool {
        self.live.contains_key(job_id)
    }

    /// Block until the job's crawl task finishes and return the terminal
    /// row. Falls back to the stored row when the job is not live.
    pub async fn wait(&self, job_id: &Uuid) -> Result<CrawlJob, JobError> {
        let task = self
            .live
            .get(job_id)
            .and_then(|handle| handle.task.lock().take());
        match task {
            Some(task) => task
                .await
                .map_err(|e| JobError::TaskFailed(e.to_string())),
            None => self.get(job_id),
        }
    }

    /// Delete a finished job and all of its results.
    pub fn delete(&self, job_id: &Uuid) -> Result<(), JobError> {
        if self.live.contains_key(job_id) {
            return Err(JobError::StillRunning(*job_id));
        }
        if !self.store.delete_job(job_id)? {
            return Err(JobError::NotFound(*job_id));
        }
        info!(job_id = %job_id, "job deleted");
        Ok(())
    }
}
