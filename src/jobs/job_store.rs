//! Background scan job tracking
//!
//! A job is created when a bulk scan is submitted, updated as each target
//! finishes, and kept until a client has seen its terminal state once or
//! the TTL runs out.

use crate::scanner::{analyze_bulk_with_progress, ScanResult, SiteAnalyzer};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Completed,
    Error,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// Snapshot of a scan job as returned to pollers
#[derive(Debug, Clone, Serialize)]
pub struct ScanJob {
    pub status: JobStatus,
    pub progress: String,
    pub finished: usize,
    pub total: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Vec<ScanResult>>,
}

#[derive(Debug)]
struct JobEntry {
    job: ScanJob,
    touched_at: Instant,
}

/// In-process registry of scan jobs, safe to share between tasks
#[derive(Debug)]
pub struct ScanJobStore {
    jobs: Mutex<HashMap<String, JobEntry>>,
    ttl: Duration,
}

impl ScanJobStore {
    /// Creates an empty store
    ///
    /// # Arguments
    ///
    /// * `ttl` - How long a job survives without being updated or polled
    pub fn new(ttl: Duration) -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    // Entries are plain data, so a poisoned lock still holds a usable map
    fn lock(&self) -> MutexGuard<'_, HashMap<String, JobEntry>> {
        self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Registers a running job for `total` targets
    ///
    /// # Returns
    ///
    /// The new job ID
    pub fn create(&self, total: usize) -> String {
        let id = Uuid::new_v4().to_string();
        let mut jobs = self.lock();
        Self::purge_locked(&mut jobs, self.ttl);
        jobs.insert(
            id.clone(),
            JobEntry {
                job: ScanJob {
                    status: JobStatus::Running,
                    progress: format!("Skenuji 0/{}", total),
                    finished: 0,
                    total,
                    result: None,
                },
                touched_at: Instant::now(),
            },
        );
        id
    }

    /// Records that `finished` of `total` targets are done
    pub fn update_progress(&self, id: &str, finished: usize, total: usize) {
        if let Some(entry) = self.lock().get_mut(id) {
            entry.job.finished = finished;
            entry.job.total = total;
            entry.job.progress = format!("Skenuji {}/{}", finished, total);
            entry.touched_at = Instant::now();
        }
    }

    /// Stores the results and marks the job completed
    pub fn complete(&self, id: &str, results: Vec<ScanResult>) {
        if let Some(entry) = self.lock().get_mut(id) {
            let complete = results.iter().filter(|r| r.is_complete()).count();
            entry.job.status = JobStatus::Completed;
            entry.job.finished = results.len();
            entry.job.progress = format!(
                "Hotovo: {} úspěšně, {} chyb",
                complete,
                results.len() - complete
            );
            entry.job.result = Some(results);
            entry.touched_at = Instant::now();
        }
    }

    /// Marks the job failed
    pub fn fail(&self, id: &str, message: impl Into<String>) {
        if let Some(entry) = self.lock().get_mut(id) {
            entry.job.status = JobStatus::Error;
            entry.job.progress = message.into();
            entry.touched_at = Instant::now();
        }
    }

    /// Returns the job's current state
    ///
    /// A terminal state is handed out once and then forgotten. Unknown and
    /// expired jobs return `None`.
    pub fn poll(&self, id: &str) -> Option<ScanJob> {
        let mut jobs = self.lock();
        Self::purge_locked(&mut jobs, self.ttl);

        let terminal = jobs.get(id)?.job.status.is_terminal();
        if terminal {
            debug!("Scan job {} delivered; removing", id);
            return jobs.remove(id).map(|entry| entry.job);
        }
        jobs.get(id).map(|entry| entry.job.clone())
    }

    /// Drops jobs not touched within the TTL
    ///
    /// # Returns
    ///
    /// Number of jobs removed
    pub fn purge_expired(&self) -> usize {
        Self::purge_locked(&mut self.lock(), self.ttl)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn purge_locked(jobs: &mut HashMap<String, JobEntry>, ttl: Duration) -> usize {
        let before = jobs.len();
        jobs.retain(|_, entry| entry.touched_at.elapsed() < ttl);
        before - jobs.len()
    }
}

/// Starts a background bulk scan tracked by `store`
///
/// # Returns
///
/// The job ID to poll
pub fn spawn_bulk_scan(store: Arc<ScanJobStore>, analyzer: SiteAnalyzer, urls: Vec<String>) -> String {
    let id = store.create(urls.len().min(crate::scanner::MAX_BULK_URLS));
    info!("Scan job {} started for {} targets", id, urls.len());

    let job_id = id.clone();
    tokio::spawn(async move {
        let progress_store = Arc::clone(&store);
        let progress_id = job_id.clone();
        let results = analyze_bulk_with_progress(&analyzer, &urls, move |finished, total| {
            progress_store.update_progress(&progress_id, finished, total);
        })
        .await;
        store.complete(&job_id, results);
        info!("Scan job {} finished", job_id);
    });

    id
}
