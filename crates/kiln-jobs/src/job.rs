//! Fabrication job record and its state machine.

use crate::error::JobResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique job identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Creates a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the job ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Job lifecycle status.
///
/// ```text
/// Queued ──► Starting ──► Printing ──► Completed
///   │           │  │          │  │
///   │           │  └► Failed ◄┘  │
///   └───────────┴──► Cancelled ◄─┘
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Waiting for an idle device.
    #[default]
    Queued,
    /// Claimed by the scheduler; start command in flight.
    Starting,
    /// The device accepted the start command.
    Printing,
    /// Finished on the device.
    Completed,
    /// Dispatch or print failed.
    Failed,
    /// Cancelled by a caller.
    Cancelled,
}

impl JobStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [JobStatus; 6] = [
        JobStatus::Queued,
        JobStatus::Starting,
        JobStatus::Printing,
        JobStatus::Completed,
        JobStatus::Failed,
        JobStatus::Cancelled,
    ];

    /// Returns the canonical lowercase name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Starting => "starting",
            JobStatus::Printing => "printing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    /// Terminal jobs never change again.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Jobs occupying a device.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, JobStatus::Starting | JobStatus::Printing)
    }

    /// Returns true if `self -> next` is a legal transition.
    #[must_use]
    pub const fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Queued, JobStatus::Starting | JobStatus::Cancelled)
                | (
                    JobStatus::Starting,
                    JobStatus::Printing | JobStatus::Failed | JobStatus::Cancelled
                )
                | (
                    JobStatus::Printing,
                    JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
                )
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown job status: {}", s))
    }
}

/// What a caller asks the queue to print.
#[derive(Debug, Clone, Default)]
pub struct JobRequest {
    pub file_name: String,
    pub target_device: Option<String>,
    pub submitted_by: String,
    pub priority: i32,
    pub metadata: HashMap<String, Value>,
}

impl JobRequest {
    /// Creates a request for any capable device, priority 0.
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            submitted_by: "unknown".to_string(),
            ..Default::default()
        }
    }

    /// Pins the job to one device.
    #[must_use]
    pub fn target(mut self, device: impl Into<String>) -> Self {
        self.target_device = Some(device.into());
        self
    }

    #[must_use]
    pub fn submitted_by(mut self, who: impl Into<String>) -> Self {
        self.submitted_by = who.into();
        self
    }

    /// Higher is more urgent.
    #[must_use]
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A fabrication job.
///
/// Snapshots handed out by the queue are copies; mutating one has no effect
/// on the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub file_name: String,
    /// Device the job must run on; `None` means any idle device.
    pub target_device: Option<String>,
    /// Device the scheduler dispatched the job to.
    #[serde(default)]
    pub assigned_device: Option<String>,
    pub status: JobStatus,
    pub submitted_by: String,
    pub priority: i32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl Job {
    /// Creates a Queued job from a request.
    pub fn new(request: JobRequest) -> Self {
        Self {
            id: JobId::new(),
            file_name: request.file_name,
            target_device: request.target_device,
            assigned_device: None,
            status: JobStatus::Queued,
            submitted_by: request.submitted_by,
            priority: request.priority,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error: None,
            metadata: request.metadata,
        }
    }

    /// True if this job may run on `device`.
    pub fn is_eligible_for(&self, device: Option<&str>) -> bool {
        match (&self.target_device, device) {
            (None, _) => true,
            (Some(target), Some(device)) => target == device,
            (Some(_), None) => false,
        }
    }

    /// Serializes to a JSON string.
    pub fn to_json(&self) -> JobResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserializes from a JSON string.
    pub fn from_json(json: &str) -> JobResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_id_generation() {
        let id1 = JobId::new();
        let id2 = JobId::new();
        assert_ne!(id1, id2);
        assert_eq!(serde_json::to_string(&id1).unwrap(), format!("\"{}\"", id1));
    }

    #[test]
    fn test_new_job_is_queued() {
        let job = Job::new(JobRequest::new("benchy.gcode").submitted_by("alice").priority(3));
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.priority, 3);
        assert!(job.started_at.is_none());
        assert!(job.completed_at.is_none());
        assert!(job.error.is_none());
        assert_eq!(JobStatus::default(), JobStatus::Queued);
    }

    #[test]
    fn test_status_strings() {
        for status in JobStatus::ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
        }
        assert_eq!("PRINTING".parse::<JobStatus>().unwrap(), JobStatus::Printing);
        assert!("running".parse::<JobStatus>().is_err());
    }

    #[test]
    fn test_transitions() {
        use JobStatus::*;

        assert!(Queued.can_transition_to(Starting));
        assert!(Queued.can_transition_to(Cancelled));
        assert!(!Queued.can_transition_to(Printing));
        assert!(!Queued.can_transition_to(Completed));

        assert!(Starting.can_transition_to(Printing));
        assert!(Starting.can_transition_to(Failed));
        assert!(!Starting.can_transition_to(Queued));

        assert!(Printing.can_transition_to(Completed));
        assert!(!Printing.can_transition_to(Starting));

        for terminal in [Completed, Failed, Cancelled] {
            assert!(terminal.is_terminal());
            for next in JobStatus::ALL {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_active_statuses() {
        assert!(JobStatus::Starting.is_active());
        assert!(JobStatus::Printing.is_active());
        assert!(!JobStatus::Queued.is_active());
        assert!(!JobStatus::Completed.is_active());
    }

    #[test]
    fn test_eligibility() {
        let any = Job::new(JobRequest::new("a.gcode"));
        let pinned = Job::new(JobRequest::new("b.gcode").target("voron"));

        assert!(any.is_eligible_for(None));
        assert!(any.is_eligible_for(Some("voron")));
        assert!(pinned.is_eligible_for(Some("voron")));
        assert!(!pinned.is_eligible_for(Some("mk4")));
        assert!(!pinned.is_eligible_for(None));
    }

    #[test]
    fn test_json_round_trip() {
        let mut job = Job::new(
            JobRequest::new("bracket.gcode")
                .target("mk4")
                .submitted_by("agent")
                .priority(-2)
                .metadata("material", "PETG")
                .metadata("copies", 4),
        );
        job.status = JobStatus::Failed;
        job.assigned_device = Some("mk4".to_string());
        job.started_at = Some(Utc::now());
        job.completed_at = Some(Utc::now());
        job.error = Some("Printer is busy".to_string());

        let json = job.to_json().unwrap();
        assert!(json.contains("\"status\":\"failed\""));

        let restored = Job::from_json(&json).unwrap();
        assert_eq!(restored, job);
    }
}
