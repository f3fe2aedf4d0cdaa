//! Kiln Jobs - Print Job Queue and Scheduler
//!
//! - [`JobQueue`]: in-memory, priority-ordered queue owning every job record
//!   and enforcing the job state machine
//! - [`JobScheduler`]: periodic reconcile-then-dispatch loop matching queued
//!   jobs to idle devices and folding device state back into the queue
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                       JobScheduler                          │
//! │                                                             │
//! │   tick ──► reconcile ──────────────► dispatch               │
//! │              │  poll active devices      │ idle devices      │
//! │              ▼                           ▼                   │
//! │   ┌──────────────────┐       ┌──────────────────────┐       │
//! │   │     JobQueue     │◄──────│    DeviceRegistry    │       │
//! │   │ queued/starting/ │ claim │  adapters + polling  │       │
//! │   │ printing/...     │       └──────────────────────┘       │
//! │   └────────┬─────────┘                                      │
//! │            ▼                                                 │
//! │        EventBus  (job.dispatched, job.completed, ...)        │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use kiln_jobs::{JobQueue, JobRequest, JobScheduler, SchedulerConfig};
//!
//! let queue = Arc::new(JobQueue::new());
//! queue.submit(JobRequest::new("benchy.gcode").priority(5));
//!
//! let scheduler = Arc::new(JobScheduler::new(queue, registry, events, SchedulerConfig::default()));
//! scheduler.start()?;
//! // ...
//! scheduler.stop().await;
//! ```

pub mod config;
pub mod error;
pub mod job;
pub mod metrics;
pub mod queue;
pub mod scheduler;

pub use config::{SchedulerConfig, DEFAULT_POLL_INTERVAL};
pub use error::{JobError, JobResult};
pub use job::{Job, JobId, JobRequest, JobStatus};
pub use metrics::{register_metrics, JobMetrics, SchedulerMetrics};
pub use queue::{JobQueue, QueueSummary, DEFAULT_LIST_LIMIT};
pub use scheduler::{JobScheduler, TickReport};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::job::{Job, JobId, JobRequest, JobStatus};
    pub use crate::queue::JobQueue;
    pub use crate::scheduler::JobScheduler;
    pub use crate::{JobError, JobResult};
}
