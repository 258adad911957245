use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use uuid::Uuid;

/// Maximum size for captured command output before truncation (1MB)
pub const MAX_OUTPUT_SIZE: usize = 1024 * 1024;

/// Represents the status of a deploy job
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Success,
    Failed,
}

/// One cookbook deploy with its metadata and execution details
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployJob {
    pub id: String,
    pub artifact: String,
    pub committer: String,
    pub status: JobStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub output: Option<String>,
    pub output_truncated: bool,
    pub error: Option<String>,
}

impl DeployJob {
    /// Create a new job in Queued status
    pub fn new(artifact: String, committer: String) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            artifact,
            committer,
            status: JobStatus::Queued,
            started_at: Utc::now(),
            completed_at: None,
            output: None,
            output_truncated: false,
            error: None,
        }
    }

    /// Mark job as running
    pub fn mark_running(&mut self) {
        self.status = JobStatus::Running;
    }

    /// Mark job as successful with output (truncates if too large)
    pub fn mark_success(&mut self, mut output: String) {
        self.status = JobStatus::Success;
        self.completed_at = Some(Utc::now());

        if output.len() > MAX_OUTPUT_SIZE {
            output.truncate(MAX_OUTPUT_SIZE);
            output.push_str("\n... (output truncated)");
            self.output_truncated = true;
        }

        self.output = Some(output);
    }

    /// Mark job as failed with error
    pub fn mark_failed(&mut self, error: String) {
        self.status = JobStatus::Failed;
        self.completed_at = Some(Utc::now());
        self.error = Some(error);
    }
}

/// In-memory ring of recent deploy jobs. Jobs are ephemeral; once the ring
/// is full the oldest entry is dropped.
pub struct JobStore {
    jobs: VecDeque<DeployJob>,
    max_jobs: usize,
}

impl JobStore {
    pub fn new(max_jobs: usize) -> Self {
        Self {
            jobs: VecDeque::new(),
            max_jobs,
        }
    }

    pub fn add_job(&mut self, job: DeployJob) {
        if self.jobs.len() == self.max_jobs {
            self.jobs.pop_front();
        }
        self.jobs.push_back(job);
    }

    /// Applies `update` to the job with the given id, if it is still retained.
    pub fn update_job<F>(&mut self, id: &str, update: F)
    where
        F: FnOnce(&mut DeployJob),
    {
        if let Some(job) = self.jobs.iter_mut().find(|job| job.id == id) {
            update(job);
        }
    }

    pub fn get_job(&self, id: &str) -> Option<&DeployJob> {
        self.jobs.iter().find(|job| job.id == id)
    }

    /// Most recent jobs first
    pub fn get_recent_jobs(&self, count: usize) -> Vec<DeployJob> {
        self.jobs.iter().rev().take(count).cloned().collect()
    }

    pub fn get_current_job(&self) -> Option<DeployJob> {
        self.jobs
            .iter()
            .find(|job| job.status == JobStatus::Running)
            .cloned()
    }

    pub fn get_queued_count(&self) -> usize {
        self.jobs
            .iter()
            .filter(|job| job.status == JobStatus::Queued)
            .count()
    }
}
