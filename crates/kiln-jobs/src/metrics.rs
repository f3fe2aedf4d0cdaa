//! Metrics for job queue and scheduler monitoring.
//!
//! Recorded through the `metrics` facade; without an installed recorder
//! every call is a no-op.

use crate::scheduler::TickReport;
use metrics::{counter, describe_counter, describe_gauge, gauge};

/// Metric names for the job system.
pub mod names {
    /// Total jobs submitted.
    pub const JOBS_SUBMITTED_TOTAL: &str = "kiln_jobs_submitted_total";
    /// Total jobs accepted by a device.
    pub const JOBS_DISPATCHED_TOTAL: &str = "kiln_jobs_dispatched_total";
    /// Total jobs completed.
    pub const JOBS_COMPLETED_TOTAL: &str = "kiln_jobs_completed_total";
    /// Total jobs failed.
    pub const JOBS_FAILED_TOTAL: &str = "kiln_jobs_failed_total";
    /// Total jobs cancelled.
    pub const JOBS_CANCELLED_TOTAL: &str = "kiln_jobs_cancelled_total";
    /// Total scheduler ticks.
    pub const SCHEDULER_TICKS_TOTAL: &str = "kiln_scheduler_ticks_total";

    /// Current queued jobs.
    pub const JOBS_PENDING: &str = "kiln_jobs_pending";
    /// Current starting or printing jobs.
    pub const JOBS_ACTIVE: &str = "kiln_jobs_active";
    /// Devices that reported Idle on the last tick.
    pub const DEVICES_IDLE: &str = "kiln_devices_idle";
}

/// Register all metric descriptions.
pub fn register_metrics() {
    describe_counter!(names::JOBS_SUBMITTED_TOTAL, "Total number of jobs submitted");
    describe_counter!(
        names::JOBS_DISPATCHED_TOTAL,
        "Total number of jobs accepted by a device"
    );
    describe_counter!(names::JOBS_COMPLETED_TOTAL, "Total number of jobs completed");
    describe_counter!(names::JOBS_FAILED_TOTAL, "Total number of jobs that failed");
    describe_counter!(names::JOBS_CANCELLED_TOTAL, "Total number of jobs cancelled");
    describe_counter!(
        names::SCHEDULER_TICKS_TOTAL,
        "Total number of scheduler reconcile/dispatch ticks"
    );

    describe_gauge!(names::JOBS_PENDING, "Current number of queued jobs");
    describe_gauge!(
        names::JOBS_ACTIVE,
        "Current number of starting or printing jobs"
    );
    describe_gauge!(
        names::DEVICES_IDLE,
        "Number of devices reporting idle on the last tick"
    );
}

/// Job lifecycle metrics recorder.
#[derive(Clone)]
pub struct JobMetrics;

impl JobMetrics {
    /// Record a job submitted.
    pub fn job_submitted(targeted: bool) {
        counter!(
            names::JOBS_SUBMITTED_TOTAL,
            "targeted" => targeted.to_string()
        )
        .increment(1);
    }

    /// Record a job accepted by a device.
    pub fn job_dispatched(device: &str) {
        counter!(names::JOBS_DISPATCHED_TOTAL, "device" => device.to_string()).increment(1);
    }

    /// Record a job completed.
    pub fn job_completed() {
        counter!(names::JOBS_COMPLETED_TOTAL).increment(1);
    }

    /// Record a job failed.
    pub fn job_failed(stage: &'static str) {
        counter!(names::JOBS_FAILED_TOTAL, "stage" => stage).increment(1);
    }

    /// Record a job cancelled.
    pub fn job_cancelled() {
        counter!(names::JOBS_CANCELLED_TOTAL).increment(1);
    }

    /// Update queue size gauges.
    pub fn update_queue_sizes(pending: usize, active: usize) {
        gauge!(names::JOBS_PENDING).set(pending as f64);
        gauge!(names::JOBS_ACTIVE).set(active as f64);
    }
}

/// Scheduler metrics recorder.
#[derive(Clone)]
pub struct SchedulerMetrics;

impl SchedulerMetrics {
    /// Record one completed tick.
    pub fn tick_completed(report: &TickReport) {
        let outcome = if report.is_empty() { "noop" } else { "changed" };
        counter!(names::SCHEDULER_TICKS_TOTAL, "outcome" => outcome).increment(1);
    }

    /// Update the idle device gauge.
    pub fn update_idle_devices(idle: usize) {
        gauge!(names::DEVICES_IDLE).set(idle as f64);
    }
}
