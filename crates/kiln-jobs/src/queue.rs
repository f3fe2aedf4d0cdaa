//! In-memory job queue.
//!
//! The queue exclusively owns every [`Job`] and is the only place job state
//! changes. One mutex guards all state; every value handed out is a copy.
//! Jobs are never removed.

use crate::error::{JobError, JobResult};
use crate::job::{Job, JobId, JobRequest, JobStatus};
use crate::metrics::JobMetrics;
use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Default page size for [`JobQueue::list_jobs`].
pub const DEFAULT_LIST_LIMIT: usize = 100;

#[derive(Debug)]
struct Entry {
    job: Job,
    /// Submission order, the final tie-break.
    seq: u64,
}

impl Entry {
    fn order_key(&self) -> (Reverse<i32>, chrono::DateTime<Utc>, u64) {
        (Reverse(self.job.priority), self.job.created_at, self.seq)
    }
}

#[derive(Debug, Default)]
struct QueueState {
    jobs: HashMap<JobId, Entry>,
    next_seq: u64,
}

/// Job counts grouped by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSummary {
    pub queued: usize,
    pub starting: usize,
    pub printing: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub total: usize,
}

impl QueueSummary {
    fn record(&mut self, status: JobStatus) {
        match status {
            JobStatus::Queued => self.queued += 1,
            JobStatus::Starting => self.starting += 1,
            JobStatus::Printing => self.printing += 1,
            JobStatus::Completed => self.completed += 1,
            JobStatus::Failed => self.failed += 1,
            JobStatus::Cancelled => self.cancelled += 1,
        }
        self.total += 1;
    }

    /// Jobs waiting for a device.
    pub fn pending(&self) -> usize {
        self.queued
    }

    /// Jobs occupying a device.
    pub fn active(&self) -> usize {
        self.starting + self.printing
    }

    /// Count for one status.
    pub fn count(&self, status: JobStatus) -> usize {
        match status {
            JobStatus::Queued => self.queued,
            JobStatus::Starting => self.starting,
            JobStatus::Printing => self.printing,
            JobStatus::Completed => self.completed,
            JobStatus::Failed => self.failed,
            JobStatus::Cancelled => self.cancelled,
        }
    }
}

/// Thread-safe ordered job collection.
///
/// Dispatch order is priority descending, then creation time ascending,
/// then submission order.
#[derive(Debug, Default)]
pub struct JobQueue {
    state: Mutex<QueueState>,
}

impl JobQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a Queued job. Never fails; the file is not validated.
    pub fn submit(&self, request: JobRequest) -> JobId {
        let job = Job::new(request);
        let id = job.id.clone();
        let targeted = job.target_device.is_some();

        info!(
            job_id = %id,
            file = %job.file_name,
            target_device = ?job.target_device,
            priority = job.priority,
            submitted_by = %job.submitted_by,
            "Job submitted"
        );

        let mut state = self.state.lock();
        let seq = state.next_seq;
        state.next_seq += 1;
        state.jobs.insert(id.clone(), Entry { job, seq });
        drop(state);

        JobMetrics::job_submitted(targeted);
        id
    }

    /// Returns a snapshot of one job.
    pub fn get_job(&self, job_id: &JobId) -> JobResult<Job> {
        self.state
            .lock()
            .jobs
            .get(job_id)
            .map(|entry| entry.job.clone())
            .ok_or_else(|| JobError::NotFound(job_id.clone()))
    }

    /// Cancels a job that has not reached a terminal state.
    ///
    /// A job already on a device is marked Cancelled but the device keeps
    /// printing; stopping it takes an explicit `cancel_print`.
    pub fn cancel(&self, job_id: &JobId) -> JobResult<Job> {
        let job = self.transition(job_id, JobStatus::Cancelled, |_| {})?;
        JobMetrics::job_cancelled();
        info!(job_id = %job_id, device = ?job.assigned_device, "Job cancelled");
        Ok(job)
    }

    /// Claims a Queued job for `device`.
    pub fn mark_starting(&self, job_id: &JobId, device: &str) -> JobResult<Job> {
        let job = self.transition(job_id, JobStatus::Starting, |job| {
            job.started_at = Some(Utc::now());
            job.assigned_device = Some(device.to_string());
        })?;
        debug!(job_id = %job_id, device = %device, "Job starting");
        Ok(job)
    }

    /// Records that the device accepted the start command.
    pub fn mark_printing(&self, job_id: &JobId) -> JobResult<Job> {
        let job = self.transition(job_id, JobStatus::Printing, |_| {})?;
        info!(job_id = %job_id, device = ?job.assigned_device, "Job printing");
        Ok(job)
    }

    /// Records a finished print.
    pub fn mark_completed(&self, job_id: &JobId) -> JobResult<Job> {
        let job = self.transition(job_id, JobStatus::Completed, |_| {})?;
        JobMetrics::job_completed();
        info!(job_id = %job_id, device = ?job.assigned_device, "Job completed");
        Ok(job)
    }

    /// Records a failure with its reason.
    pub fn mark_failed(&self, job_id: &JobId, error: impl Into<String>) -> JobResult<Job> {
        let error = error.into();
        let job = self.transition(job_id, JobStatus::Failed, |job| {
            job.error = Some(error.clone());
        })?;
        warn!(job_id = %job_id, device = ?job.assigned_device, error = %error, "Job failed");
        Ok(job)
    }

    fn transition(
        &self,
        job_id: &JobId,
        to: JobStatus,
        apply: impl FnOnce(&mut Job),
    ) -> JobResult<Job> {
        let mut state = self.state.lock();
        let entry = state
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| JobError::NotFound(job_id.clone()))?;

        let from = entry.job.status;
        if !from.can_transition_to(to) {
            return Err(JobError::invalid_transition(job_id, from, to));
        }

        entry.job.status = to;
        apply(&mut entry.job);
        if to.is_terminal() {
            entry.job.completed_at = Some(Utc::now());
        }
        Ok(entry.job.clone())
    }

    /// Lists jobs in dispatch order.
    ///
    /// `device` matches jobs targeting or assigned to that device.
    pub fn list_jobs(&self, status: Option<JobStatus>, device: Option<&str>, limit: usize) -> Vec<Job> {
        let state = self.state.lock();
        let mut entries: Vec<&Entry> = state
            .jobs
            .values()
            .filter(|entry| status.map_or(true, |s| entry.job.status == s))
            .filter(|entry| {
                device.map_or(true, |d| {
                    entry.job.target_device.as_deref() == Some(d)
                        || entry.job.assigned_device.as_deref() == Some(d)
                })
            })
            .collect();

        entries.sort_by_key(|entry| entry.order_key());
        entries
            .into_iter()
            .take(limit)
            .map(|entry| entry.job.clone())
            .collect()
    }

    /// Highest-priority Queued job that may run on `device`.
    ///
    /// With `None`, only untargeted jobs match.
    pub fn next_job(&self, device: Option<&str>) -> Option<Job> {
        self.state
            .lock()
            .jobs
            .values()
            .filter(|entry| entry.job.status == JobStatus::Queued)
            .filter(|entry| entry.job.is_eligible_for(device))
            .min_by_key(|entry| entry.order_key())
            .map(|entry| entry.job.clone())
    }

    /// Number of Queued jobs.
    pub fn pending_count(&self) -> usize {
        self.count_where(|status| status == JobStatus::Queued)
    }

    /// Number of Starting or Printing jobs.
    pub fn active_count(&self) -> usize {
        self.count_where(|status| status.is_active())
    }

    /// Number of jobs ever submitted.
    pub fn total_count(&self) -> usize {
        self.state.lock().jobs.len()
    }

    fn count_where(&self, predicate: impl Fn(JobStatus) -> bool) -> usize {
        self.state
            .lock()
            .jobs
            .values()
            .filter(|entry| predicate(entry.job.status))
            .count()
    }

    /// Counts by status.
    pub fn summary(&self) -> QueueSummary {
        let state = self.state.lock();
        let mut summary = QueueSummary::default();
        for entry in state.jobs.values() {
            summary.record(entry.job.status);
        }
        summary
    }
}
