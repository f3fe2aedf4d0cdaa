//! Queue ordering and state machine behaviour through the public API.

use kiln_core::KilnError;
use kiln_jobs::{Job, JobError, JobQueue, JobRequest, JobStatus, DEFAULT_LIST_LIMIT};

#[test]
fn test_list_ordered_by_priority_then_age() {
    let queue = JobQueue::new();
    let low = queue.submit(JobRequest::new("low.gcode").priority(-1));
    let first = queue.submit(JobRequest::new("first.gcode"));
    let urgent = queue.submit(JobRequest::new("urgent.gcode").priority(10));
    let second = queue.submit(JobRequest::new("second.gcode"));

    let ids: Vec<_> = queue
        .list_jobs(None, None, DEFAULT_LIST_LIMIT)
        .into_iter()
        .map(|job| job.id)
        .collect();

    assert_eq!(ids, vec![urgent, first, second, low]);
}

#[test]
fn test_next_job_respects_target() {
    let queue = JobQueue::new();
    let pinned = queue.submit(JobRequest::new("pinned.gcode").target("printerY").priority(9));
    let open = queue.submit(JobRequest::new("open.gcode"));

    let next = queue.next_job(Some("printerX")).unwrap();
    assert_eq!(next.id, open);

    let next = queue.next_job(Some("printerY")).unwrap();
    assert_eq!(next.id, pinned);

    let next = queue.next_job(None).unwrap();
    assert_eq!(next.id, open);
}

#[test]
fn test_cancel_from_every_live_state() {
    let queue = JobQueue::new();

    let queued = queue.submit(JobRequest::new("a.gcode"));
    assert_eq!(queue.cancel(&queued).unwrap().status, JobStatus::Cancelled);

    let starting = queue.submit(JobRequest::new("b.gcode"));
    queue.mark_starting(&starting, "voron").unwrap();
    assert_eq!(queue.cancel(&starting).unwrap().status, JobStatus::Cancelled);

    let printing = queue.submit(JobRequest::new("c.gcode"));
    queue.mark_starting(&printing, "voron").unwrap();
    queue.mark_printing(&printing).unwrap();
    let cancelled = queue.cancel(&printing).unwrap();
    assert_eq!(cancelled.status, JobStatus::Cancelled);
    assert!(cancelled.completed_at.is_some());
}

#[test]
fn test_cancel_terminal_is_invalid_state() {
    let queue = JobQueue::new();
    let id = queue.submit(JobRequest::new("a.gcode"));
    queue.cancel(&id).unwrap();

    let err = queue.cancel(&id).unwrap_err();
    assert!(matches!(err, JobError::InvalidState { .. }));
    assert!(err.is_caller_error());

    let kiln: KilnError = err.into();
    assert!(matches!(kiln, KilnError::InvalidState(_)));
}

#[test]
fn test_unknown_job_is_not_found() {
    let queue = JobQueue::new();
    let err = queue.get_job(&"nope".into()).unwrap_err();
    assert!(matches!(err, JobError::NotFound(_)));

    let kiln: KilnError = err.into();
    assert!(matches!(kiln, KilnError::NotFound { .. }));
}

#[test]
fn test_status_never_regresses() {
    let queue = JobQueue::new();
    let id = queue.submit(JobRequest::new("a.gcode"));
    assert_eq!(queue.get_job(&id).unwrap().status, JobStatus::Queued);

    queue.mark_starting(&id, "voron").unwrap();
    queue.mark_printing(&id).unwrap();
    queue.mark_completed(&id).unwrap();

    assert!(queue.mark_starting(&id, "voron").is_err());
    assert!(queue.mark_printing(&id).is_err());
    assert!(queue.mark_failed(&id, "late").is_err());
    assert_eq!(queue.get_job(&id).unwrap().status, JobStatus::Completed);
}

#[test]
fn test_snapshot_round_trips_through_json() {
    let queue = JobQueue::new();
    let id = queue.submit(
        JobRequest::new("bracket.gcode")
            .target("mk4")
            .submitted_by("agent")
            .metadata("material", "PLA"),
    );
    queue.mark_starting(&id, "mk4").unwrap();
    queue.mark_failed(&id, "Nozzle clog").unwrap();

    let job = queue.get_job(&id).unwrap();
    let json = job.to_json().unwrap();
    assert!(json.contains("\"status\":\"failed\""));
    assert_eq!(Job::from_json(&json).unwrap(), job);
}

#[test]
fn test_summary_counts() {
    let queue = JobQueue::new();
    queue.submit(JobRequest::new("a.gcode"));
    let b = queue.submit(JobRequest::new("b.gcode"));
    let c = queue.submit(JobRequest::new("c.gcode"));
    queue.mark_starting(&b, "voron").unwrap();
    queue.cancel(&c).unwrap();

    let summary = queue.summary();
    assert_eq!(summary.queued, 1);
    assert_eq!(summary.starting, 1);
    assert_eq!(summary.cancelled, 1);
    assert_eq!(summary.total, 3);
    assert_eq!(queue.pending_count(), 1);
    assert_eq!(queue.active_count(), 1);
}
