//! Wiring for the job queue, device registry, event bus and scheduler.
//!
//! [`ControlPlane`] constructs every component explicitly and injects the
//! shared handles into the scheduler. Callers submit and cancel jobs and
//! manage devices through it so the matching events get published.

use kiln_config::{AppConfig, DeviceConfig};
use kiln_core::{EventBus, EventType, KilnError, KilnResult};
use kiln_devices::{AdapterFactory, DeviceAdapter, DeviceRegistry, DeviceStatus};
use kiln_jobs::{
    Job, JobId, JobQueue, JobRequest, JobScheduler, JobStatus, QueueSummary, SchedulerConfig,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

/// `source` stamped on events published from the control plane.
pub const EVENT_SOURCE: &str = "control_plane";

/// Owns the shared orchestration components.
pub struct ControlPlane {
    queue: Arc<JobQueue>,
    registry: Arc<DeviceRegistry>,
    events: Arc<EventBus>,
    scheduler: Arc<JobScheduler>,
    factory: AdapterFactory,
}

impl ControlPlane {
    /// Builds the components with no devices registered.
    pub fn new(config: &AppConfig, factory: AdapterFactory) -> Self {
        let queue = Arc::new(JobQueue::new());
        let registry = Arc::new(DeviceRegistry::with_poll_timeout(
            config.scheduler.device_poll_timeout(),
        ));
        let events = Arc::new(EventBus::new(
            config.events.capacity,
            config.events.history_size,
        ));
        let scheduler = Arc::new(JobScheduler::new(
            Arc::clone(&queue),
            Arc::clone(&registry),
            Arc::clone(&events),
            SchedulerConfig::from(&config.scheduler),
        ));

        Self {
            queue,
            registry,
            events,
            scheduler,
            factory,
        }
    }

    /// Builds the components and registers every configured device.
    ///
    /// Fails on the first device whose protocol is unknown or whose
    /// settings are incomplete.
    pub fn from_config(config: &AppConfig) -> KilnResult<Self> {
        let plane = Self::new(config, AdapterFactory::with_builtin());
        for device in &config.devices {
            plane.register_device(device)?;
        }
        info!(devices = plane.registry.len(), "Control plane ready");
        Ok(plane)
    }

    pub fn queue(&self) -> &Arc<JobQueue> {
        &self.queue
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn scheduler(&self) -> &Arc<JobScheduler> {
        &self.scheduler
    }

    /// Queues a job and publishes `job.submitted`.
    ///
    /// A target device need not be registered yet; the job waits until it is.
    pub fn submit_job(&self, request: JobRequest) -> KilnResult<JobId> {
        if request.file_name.trim().is_empty() {
            return Err(KilnError::validation("file_name must not be empty"));
        }

        let job_id = self.queue.submit(request);
        let job = self.queue.get_job(&job_id)?;
        self.events.publish(
            EventType::JobSubmitted,
            json!({
                "job_id": job.id,
                "file_name": job.file_name,
                "target_device": job.target_device,
                "priority": job.priority,
                "submitted_by": job.submitted_by,
            }),
            EVENT_SOURCE,
        );
        Ok(job_id)
    }

    /// Cancels a job and publishes `job.cancelled`.
    ///
    /// A job already on a device keeps printing there; use
    /// [`ControlPlane::abort_print`] to stop the device too.
    pub fn cancel_job(&self, job_id: &JobId) -> KilnResult<Job> {
        let job = self.queue.cancel(job_id)?;
        self.events.publish(
            EventType::JobCancelled,
            json!({
                "job_id": job.id,
                "device": job.assigned_device,
            }),
            EVENT_SOURCE,
        );
        Ok(job)
    }

    /// Cancels a job and sends `cancel_print` to the device it runs on.
    ///
    /// The job stays Cancelled even if the device command fails.
    pub async fn abort_print(&self, job_id: &JobId) -> KilnResult<Job> {
        let before = self.queue.get_job(job_id)?;
        let job = self.cancel_job(job_id)?;

        if before.status == JobStatus::Queued {
            return Ok(job);
        }
        let Some(device) = job.assigned_device.as_deref() else {
            return Ok(job);
        };

        let adapter = self.registry.get(device)?;
        if let Err(e) = adapter.cancel_print().await {
            warn!(job_id = %job_id, device = %device, error = %e, "Device cancel failed");
            return Err(e.into());
        }
        info!(job_id = %job_id, device = %device, "Print aborted on device");
        Ok(job)
    }

    pub fn get_job(&self, job_id: &JobId) -> KilnResult<Job> {
        Ok(self.queue.get_job(job_id)?)
    }

    pub fn list_jobs(&self, status: Option<JobStatus>, device: Option<&str>, limit: usize) -> Vec<Job> {
        self.queue.list_jobs(status, device, limit)
    }

    pub fn summary(&self) -> QueueSummary {
        self.queue.summary()
    }

    /// Builds a device from configuration and registers it.
    pub fn register_device(&self, config: &DeviceConfig) -> KilnResult<()> {
        let adapter = self.factory.build(config)?;
        self.register_adapter(&config.name, adapter);
        Ok(())
    }

    /// Registers a prebuilt adapter and publishes `device.registered`.
    ///
    /// Returns true if an existing device of the same name was replaced.
    pub fn register_adapter(&self, name: &str, adapter: Arc<dyn DeviceAdapter>) -> bool {
        let protocol = adapter.capabilities().protocol;
        let replaced = self.registry.register(name, adapter);
        self.events.publish(
            EventType::DeviceRegistered,
            json!({
                "device": name,
                "protocol": protocol,
                "replaced": replaced,
            }),
            EVENT_SOURCE,
        );
        replaced
    }

    /// Removes a device and publishes `device.unregistered`.
    ///
    /// Jobs dispatched to it fail on the next scheduler tick.
    pub fn unregister_device(&self, name: &str) -> KilnResult<()> {
        if !self.registry.unregister(name) {
            return Err(KilnError::not_found("Device", name));
        }
        self.events.publish(
            EventType::DeviceUnregistered,
            json!({"device": name}),
            EVENT_SOURCE,
        );
        Ok(())
    }

    /// Live state of every registered device.
    pub async fn device_status(&self) -> Vec<DeviceStatus> {
        self.registry.status_all().await
    }

    /// Starts the background scheduler loop.
    pub fn start(&self) -> KilnResult<()> {
        self.scheduler.start().map_err(KilnError::from)
    }

    /// Stops the scheduler loop and waits for it to exit.
    pub async fn shutdown(&self) {
        self.scheduler.stop().await;
        let summary = self.queue.summary();
        info!(
            queued = summary.queued,
            active = summary.active(),
            "Control plane stopped"
        );
    }
}
