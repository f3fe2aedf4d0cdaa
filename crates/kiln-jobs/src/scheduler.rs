//! Reconcile-and-dispatch scheduler.
//!
//! Each [`JobScheduler::tick`] runs two ordered phases:
//!
//! 1. **Reconcile** every job believed to be on a device against the
//!    device's live state: Idle completes the job, Error fails it, Printing
//!    publishes progress, a vanished device fails it. Transient poll errors
//!    are logged and retried on the next tick.
//! 2. **Dispatch** the best eligible queued job to every idle device that
//!    is not still busy, claiming it before the start command is sent.
//!
//! No queue or registry lock is held across device I/O, and no error
//! escapes a tick. Concurrent ticks are serialized.

use crate::config::SchedulerConfig;
use crate::error::{JobError, JobResult};
use crate::job::{Job, JobId};
use crate::metrics::{JobMetrics, SchedulerMetrics};
use crate::queue::JobQueue;
use futures::FutureExt;
use kiln_core::{EventBus, EventType};
use kiln_devices::{guarded_call, panic_message, DeviceAdapter, DeviceRegistry, DeviceState, PrinterPhase};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// What one tick changed. Purely observational.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickReport {
    /// Jobs a device accepted this tick.
    pub dispatched: Vec<JobId>,
    /// Jobs observed finished this tick.
    pub completed: Vec<JobId>,
    /// Jobs failed this tick, during either phase.
    pub failed: Vec<JobId>,
    /// Dispatch records examined during reconcile.
    pub checked: usize,
}

impl TickReport {
    /// True when the tick changed nothing.
    pub fn is_empty(&self) -> bool {
        self.dispatched.is_empty() && self.completed.is_empty() && self.failed.is_empty()
    }
}

/// Background job scheduler.
pub struct JobScheduler {
    queue: Arc<JobQueue>,
    registry: Arc<DeviceRegistry>,
    events: Arc<EventBus>,
    config: SchedulerConfig,
    /// job_id -> device for jobs believed to be on a device.
    active: Mutex<HashMap<JobId, String>>,
    tick_lock: tokio::sync::Mutex<()>,
    shutdown_tx: broadcast::Sender<()>,
    running: AtomicBool,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl JobScheduler {
    /// Creates a stopped scheduler.
    pub fn new(
        queue: Arc<JobQueue>,
        registry: Arc<DeviceRegistry>,
        events: Arc<EventBus>,
        config: SchedulerConfig,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            queue,
            registry,
            events,
            config,
            active: Mutex::new(HashMap::new()),
            tick_lock: tokio::sync::Mutex::new(()),
            shutdown_tx,
            running: AtomicBool::new(false),
            handle: Mutex::new(None),
        }
    }

    /// Snapshot of jobs believed to be on a device.
    pub fn active_jobs(&self) -> HashMap<JobId, String> {
        self.active.lock().clone()
    }

    /// Check if the background loop is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Runs one reconcile phase followed by one dispatch phase.
    pub async fn tick(&self) -> TickReport {
        let _guard = self.tick_lock.lock().await;
        let mut report = TickReport::default();

        self.reconcile(&mut report).await;
        self.dispatch(&mut report).await;

        JobMetrics::update_queue_sizes(self.queue.pending_count(), self.queue.active_count());
        SchedulerMetrics::tick_completed(&report);

        if !report.is_empty() {
            info!(
                dispatched = report.dispatched.len(),
                completed = report.completed.len(),
                failed = report.failed.len(),
                checked = report.checked,
                "Scheduler tick"
            );
        }
        report
    }

    async fn reconcile(&self, report: &mut TickReport) {
        let records: Vec<(JobId, String)> = self
            .active
            .lock()
            .iter()
            .map(|(job_id, device)| (job_id.clone(), device.clone()))
            .collect();
        report.checked = records.len();

        for (job_id, device) in records {
            match self.queue.get_job(&job_id) {
                Ok(job) if job.status.is_terminal() => {
                    debug!(job_id = %job_id, status = %job.status, "Dispatched job already terminal");
                    self.forget(&job_id);
                    continue;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(job_id = %job_id, error = %e, "Dispatched job missing from queue");
                    self.forget(&job_id);
                    continue;
                }
            }

            let adapter = match self.registry.get(&device) {
                Ok(adapter) => adapter,
                Err(_) => {
                    let message = format!("Device '{}' no longer registered", device);
                    self.fail_active(&job_id, &device, &message, report);
                    continue;
                }
            };

            match self.registry.poll_state(&device, adapter.as_ref()).await {
                Ok(state) => {
                    self.apply_observed(&job_id, &device, adapter.as_ref(), &state, report)
                        .await;
                }
                Err(e) => {
                    warn!(
                        job_id = %job_id,
                        device = %device,
                        error = %e,
                        "Device poll failed, will retry next tick"
                    );
                }
            }
        }
    }

    async fn apply_observed(
        &self,
        job_id: &JobId,
        device: &str,
        adapter: &dyn DeviceAdapter,
        state: &DeviceState,
        report: &mut TickReport,
    ) {
        match state.phase {
            PrinterPhase::Idle => match self.queue.mark_completed(job_id) {
                Ok(job) => {
                    self.forget(job_id);
                    report.completed.push(job_id.clone());
                    self.events.publish(
                        EventType::JobCompleted,
                        json!({
                            "job_id": job_id,
                            "device": device,
                            "file_name": job.file_name,
                        }),
                        &self.config.event_source,
                    );
                }
                Err(e) => {
                    warn!(job_id = %job_id, error = %e, "Could not complete job");
                    self.forget(job_id);
                }
            },
            PrinterPhase::Error => {
                let detail = state.error_message.as_deref().unwrap_or("unknown error");
                let message = format!("Device '{}' reported an error: {}", device, detail);
                self.fail_active(job_id, device, &message, report);
            }
            PrinterPhase::Printing => {
                let progress = tokio::time::timeout(
                    self.registry.poll_timeout(),
                    guarded_call(device, adapter.get_job()),
                )
                .await;
                match progress {
                    Ok(Ok(progress)) => {
                        self.events.publish(
                            EventType::JobProgress,
                            json!({
                                "job_id": job_id,
                                "device": device,
                                "progress": progress.progress,
                                "file_name": progress.file_name,
                            }),
                            &self.config.event_source,
                        );
                    }
                    Ok(Err(e)) => {
                        debug!(job_id = %job_id, device = %device, error = %e, "Progress poll failed");
                    }
                    Err(_) => {
                        debug!(job_id = %job_id, device = %device, "Progress poll timed out");
                    }
                }
            }
            PrinterPhase::Paused | PrinterPhase::Offline | PrinterPhase::Unknown => {
                debug!(job_id = %job_id, device = %device, phase = %state.phase, "No change");
            }
        }
    }

    async fn dispatch(&self, report: &mut TickReport) {
        let idle = self.registry.get_idle_printers().await;
        SchedulerMetrics::update_idle_devices(idle.len());

        let busy: HashSet<String> = self.active.lock().values().cloned().collect();

        for (device, adapter) in idle {
            if busy.contains(&device) {
                debug!(device = %device, "Idle device still holds a dispatch record");
                continue;
            }

            let Some(candidate) = self.queue.next_job(Some(&device)) else {
                continue;
            };

            // Claim first so no other device can take it.
            let job = match self.queue.mark_starting(&candidate.id, &device) {
                Ok(job) => job,
                Err(e) => {
                    debug!(job_id = %candidate.id, error = %e, "Job claimed elsewhere");
                    continue;
                }
            };

            match guarded_call(&device, adapter.start_print(&job.file_name)).await {
                Ok(ack) => self.record_started(&job, &device, &ack.message, report),
                Err(e) => {
                    let message = if e.is_rejection() {
                        e.message.clone()
                    } else {
                        e.to_string()
                    };
                    warn!(job_id = %job.id, device = %device, error = %e, "Start command failed");
                    if self.queue.mark_failed(&job.id, &message).is_ok() {
                        JobMetrics::job_failed("dispatch");
                        report.failed.push(job.id.clone());
                        self.publish_failed(&job.id, &device, &message);
                    }
                }
            }
        }
    }

    fn record_started(&self, job: &Job, device: &str, ack: &str, report: &mut TickReport) {
        match self.queue.mark_printing(&job.id) {
            Ok(_) => {
                self.active.lock().insert(job.id.clone(), device.to_string());
                JobMetrics::job_dispatched(device);
                report.dispatched.push(job.id.clone());
                self.events.publish(
                    EventType::JobDispatched,
                    json!({
                        "job_id": job.id,
                        "device": device,
                        "file_name": job.file_name,
                        "message": ack,
                    }),
                    &self.config.event_source,
                );
            }
            // Cancelled while the start command was in flight; the device
            // keeps printing until someone calls cancel_print.
            Err(e) => {
                warn!(job_id = %job.id, device = %device, error = %e, "Job changed during start");
            }
        }
    }

    fn fail_active(&self, job_id: &JobId, device: &str, message: &str, report: &mut TickReport) {
        self.forget(job_id);
        match self.queue.mark_failed(job_id, message) {
            Ok(_) => {
                JobMetrics::job_failed("reconcile");
                report.failed.push(job_id.clone());
                self.publish_failed(job_id, device, message);
            }
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "Could not fail job");
            }
        }
    }

    fn publish_failed(&self, job_id: &JobId, device: &str, message: &str) {
        self.events.publish(
            EventType::JobFailed,
            json!({
                "job_id": job_id,
                "device": device,
                "error": message,
            }),
            &self.config.event_source,
        );
    }

    fn forget(&self, job_id: &JobId) {
        self.active.lock().remove(job_id);
    }

    /// Spawns the background loop: tick, then sleep `poll_interval`.
    ///
    /// A panic inside a tick is logged and the loop keeps going.
    pub fn start(self: &Arc<Self>) -> JobResult<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(JobError::Scheduler("Scheduler already running".to_string()));
        }

        info!(
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "Starting scheduler"
        );

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let scheduler = Arc::clone(self);

        let handle = tokio::spawn(async move {
            loop {
                if let Err(panic) = AssertUnwindSafe(scheduler.tick()).catch_unwind().await {
                    error!(panic = %panic_message(panic.as_ref()), "Scheduler tick panicked");
                }

                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(scheduler.config.poll_interval) => {}
                }
            }
            scheduler.running.store(false, Ordering::SeqCst);
        });

        *self.handle.lock() = Some(handle);
        self.events.publish(
            EventType::SchedulerStarted,
            json!({"poll_interval_ms": self.config.poll_interval.as_millis() as u64}),
            &self.config.event_source,
        );
        Ok(())
    }

    /// Signals the loop to exit and waits for it.
    ///
    /// Safe to call when the loop was never started.
    pub async fn stop(&self) {
        let handle = self.handle.lock().take();
        let Some(handle) = handle else {
            debug!("Scheduler not running");
            return;
        };

        let _ = self.shutdown_tx.send(());
        if let Err(e) = handle.await {
            error!(error = %e, "Scheduler task ended abnormally");
        }
        self.running.store(false, Ordering::SeqCst);

        self.events.publish(
            EventType::SchedulerStopped,
            json!({"active_jobs": self.active.lock().len()}),
            &self.config.event_source,
        );
        info!("Scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{JobRequest, JobStatus};
    use async_trait::async_trait;
    use kiln_devices::{
        CommandAck, DeviceCapabilities, DeviceError, DeviceResult, JobProgress, SimulatedPrinter,
    };
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    struct Harness {
        queue: Arc<JobQueue>,
        registry: Arc<DeviceRegistry>,
        events: Arc<EventBus>,
        scheduler: Arc<JobScheduler>,
    }

    fn harness() -> Harness {
        let queue = Arc::new(JobQueue::new());
        let registry = Arc::new(DeviceRegistry::with_poll_timeout(Duration::from_secs(1)));
        let events = Arc::new(EventBus::default());
        let scheduler = Arc::new(JobScheduler::new(
            Arc::clone(&queue),
            Arc::clone(&registry),
            Arc::clone(&events),
            SchedulerConfig::default().with_poll_interval(Duration::from_millis(20)),
        ));
        Harness {
            queue,
            registry,
            events,
            scheduler,
        }
    }

    fn add_printer(h: &Harness, name: &str) -> Arc<SimulatedPrinter> {
        let printer = Arc::new(SimulatedPrinter::new(name));
        h.registry.register(name, printer.clone());
        printer
    }

    /// Adapter whose state poll panics.
    struct PanickingPrinter {
        polls: AtomicUsize,
    }

    #[async_trait]
    impl DeviceAdapter for PanickingPrinter {
        fn name(&self) -> &str {
            "boom"
        }

        fn capabilities(&self) -> DeviceCapabilities {
            DeviceCapabilities::full("test")
        }

        async fn get_state(&self) -> DeviceResult<DeviceState> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            panic!("firmware exploded");
        }

        async fn get_job(&self) -> DeviceResult<JobProgress> {
            Ok(JobProgress::default())
        }

        async fn start_print(&self, _file_name: &str) -> DeviceResult<CommandAck> {
            Ok(CommandAck::default())
        }

        async fn cancel_print(&self) -> DeviceResult<CommandAck> {
            Ok(CommandAck::default())
        }

        async fn emergency_stop(&self) -> DeviceResult<CommandAck> {
            Ok(CommandAck::default())
        }
    }

    /// Idle adapter whose start command panics.
    struct PanicOnStart;

    #[async_trait]
    impl DeviceAdapter for PanicOnStart {
        fn name(&self) -> &str {
            "fragile"
        }

        fn capabilities(&self) -> DeviceCapabilities {
            DeviceCapabilities::full("test")
        }

        async fn get_state(&self) -> DeviceResult<DeviceState> {
            Ok(DeviceState::with_phase(PrinterPhase::Idle))
        }

        async fn get_job(&self) -> DeviceResult<JobProgress> {
            Ok(JobProgress::default())
        }

        async fn start_print(&self, file_name: &str) -> DeviceResult<CommandAck> {
            panic!("cannot open {}", file_name);
        }

        async fn cancel_print(&self) -> DeviceResult<CommandAck> {
            Ok(CommandAck::default())
        }

        async fn emergency_stop(&self) -> DeviceResult<CommandAck> {
            Ok(CommandAck::default())
        }
    }

    #[tokio::test]
    async fn test_empty_tick() {
        let h = harness();
        for _ in 0..3 {
            let report = h.scheduler.tick().await;
            assert!(report.is_empty());
            assert_eq!(report.checked, 0);
        }
    }

    #[tokio::test]
    async fn test_dispatch_marks_printing() {
        let h = harness();
        let printer = add_printer(&h, "voron");
        let id = h.queue.submit(JobRequest::new("benchy.gcode"));

        let report = h.scheduler.tick().await;
        assert_eq!(report.dispatched, vec![id.clone()]);

        let job = h.queue.get_job(&id).unwrap();
        assert_eq!(job.status, JobStatus::Printing);
        assert_eq!(job.assigned_device.as_deref(), Some("voron"));
        assert!(job.started_at.is_some());
        assert_eq!(printer.started_files(), vec!["benchy.gcode".to_string()]);
        assert_eq!(h.scheduler.active_jobs().get(&id).map(String::as_str), Some("voron"));
    }

    #[tokio::test]
    async fn test_one_job_per_device_per_tick() {
        let h = harness();
        add_printer(&h, "a");
        add_printer(&h, "b");
        let first = h.queue.submit(JobRequest::new("1.gcode"));
        let second = h.queue.submit(JobRequest::new("2.gcode"));
        let third = h.queue.submit(JobRequest::new("3.gcode"));

        let report = h.scheduler.tick().await;
        assert_eq!(report.dispatched.len(), 2);
        assert!(report.dispatched.contains(&first));
        assert!(report.dispatched.contains(&second));
        assert_eq!(h.queue.get_job(&third).unwrap().status, JobStatus::Queued);
    }

    #[tokio::test]
    async fn test_rejected_start_fails_job_with_device_message() {
        let h = harness();
        let printer = add_printer(&h, "voron");
        printer.reject_next_start("Filament runout detected");
        let id = h.queue.submit(JobRequest::new("benchy.gcode"));
        let mut rx = h.events.subscribe();

        let report = h.scheduler.tick().await;
        assert_eq!(report.failed, vec![id.clone()]);
        assert!(report.dispatched.is_empty());

        let job = h.queue.get_job(&id).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("Filament runout detected"));
        assert!(h.scheduler.active_jobs().is_empty());

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, EventType::JobFailed);
        assert_eq!(event.str_field("error"), Some("Filament runout detected"));
    }

    #[tokio::test]
    async fn test_transport_failure_on_start_is_not_requeued() {
        let h = harness();
        let printer = add_printer(&h, "voron");
        printer.fail_next_start(DeviceError::unreachable("voron", "connection reset"));
        let id = h.queue.submit(JobRequest::new("a.gcode"));

        h.scheduler.tick().await;
        let job = h.queue.get_job(&id).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error.unwrap().contains("connection reset"));

        let report = h.scheduler.tick().await;
        assert!(report.is_empty());
    }

    #[tokio::test]
    async fn test_error_phase_fails_job() {
        let h = harness();
        let printer = add_printer(&h, "voron");
        let id = h.queue.submit(JobRequest::new("a.gcode"));
        h.scheduler.tick().await;

        printer.set_phase(PrinterPhase::Error);
        let report = h.scheduler.tick().await;

        assert_eq!(report.failed, vec![id.clone()]);
        assert_eq!(report.checked, 1);
        let job = h.queue.get_job(&id).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error.unwrap().contains("simulated fault"));
    }

    #[tokio::test]
    async fn test_printing_publishes_progress() {
        let h = harness();
        let printer = add_printer(&h, "voron");
        let id = h.queue.submit(JobRequest::new("a.gcode"));
        h.scheduler.tick().await;

        printer.set_progress(37.5);
        let report = h.scheduler.tick().await;
        assert!(report.is_empty());
        assert_eq!(report.checked, 1);

        let progress = h.events.recent_of_type(EventType::JobProgress, 1);
        assert_eq!(progress.len(), 1);
        assert_eq!(progress[0].str_field("job_id"), Some(id.as_str()));
        assert_eq!(progress[0].data["progress"], json!(37.5));
    }

    #[tokio::test]
    async fn test_paused_and_unreachable_change_nothing() {
        let h = harness();
        let printer = add_printer(&h, "voron");
        let id = h.queue.submit(JobRequest::new("a.gcode"));
        h.scheduler.tick().await;

        printer.set_phase(PrinterPhase::Paused);
        assert!(h.scheduler.tick().await.is_empty());

        printer.set_reachable(false);
        assert!(h.scheduler.tick().await.is_empty());

        assert_eq!(h.queue.get_job(&id).unwrap().status, JobStatus::Printing);
        assert!(h.scheduler.active_jobs().contains_key(&id));
    }

    #[tokio::test]
    async fn test_cancelled_while_printing_clears_record() {
        let h = harness();
        let printer = add_printer(&h, "voron");
        let id = h.queue.submit(JobRequest::new("a.gcode"));
        h.scheduler.tick().await;

        h.queue.cancel(&id).unwrap();
        let report = h.scheduler.tick().await;

        assert_eq!(report.checked, 1);
        assert!(report.completed.is_empty());
        assert!(h.scheduler.active_jobs().is_empty());
        assert_eq!(h.queue.get_job(&id).unwrap().status, JobStatus::Cancelled);
        // The device is not stopped by a queue-level cancel.
        assert_eq!(printer.phase(), PrinterPhase::Printing);
    }

    #[tokio::test]
    async fn test_busy_device_gets_nothing_new() {
        let h = harness();
        let printer = add_printer(&h, "voron");
        h.queue.submit(JobRequest::new("a.gcode"));
        let second = h.queue.submit(JobRequest::new("b.gcode"));
        h.scheduler.tick().await;

        let report = h.scheduler.tick().await;
        assert!(report.dispatched.is_empty());
        assert_eq!(h.queue.get_job(&second).unwrap().status, JobStatus::Queued);

        printer.finish_print();
        let report = h.scheduler.tick().await;
        assert_eq!(report.completed.len(), 1);
        assert_eq!(report.dispatched, vec![second]);
    }

    #[tokio::test]
    async fn test_stop_without_start() {
        let h = harness();
        h.scheduler.stop().await;
        assert!(!h.scheduler.is_running());
    }

    #[tokio::test]
    async fn test_start_twice_fails() {
        let h = harness();
        h.scheduler.start().unwrap();
        assert!(matches!(h.scheduler.start(), Err(JobError::Scheduler(_))));
        h.scheduler.stop().await;
        assert!(!h.scheduler.is_running());
    }

    #[tokio::test]
    async fn test_loop_dispatches_and_stops() {
        let h = harness();
        add_printer(&h, "voron");
        let id = h.queue.submit(JobRequest::new("a.gcode"));

        h.scheduler.start().unwrap();
        assert!(h.scheduler.is_running());

        for _ in 0..50 {
            if h.queue.get_job(&id).unwrap().status == JobStatus::Printing {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(h.queue.get_job(&id).unwrap().status, JobStatus::Printing);

        h.scheduler.stop().await;
        assert!(!h.scheduler.is_running());
        assert_eq!(h.events.recent_of_type(EventType::SchedulerStopped, 1).len(), 1);
    }

    #[tokio::test]
    async fn test_loop_keeps_polling_panicking_device() {
        let h = harness();
        let boom = Arc::new(PanickingPrinter {
            polls: AtomicUsize::new(0),
        });
        h.registry.register("boom", boom.clone());

        h.scheduler.start().unwrap();
        for _ in 0..100 {
            if boom.polls.load(Ordering::SeqCst) >= 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert!(boom.polls.load(Ordering::SeqCst) >= 3);
        assert!(h.scheduler.is_running());
        h.scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_panicking_device_does_not_block_dispatch() {
        let h = harness();
        h.registry.register(
            "boom",
            Arc::new(PanickingPrinter {
                polls: AtomicUsize::new(0),
            }),
        );
        add_printer(&h, "printerX");
        let id = h.queue.submit(JobRequest::new("a.gcode"));

        let report = h.scheduler.tick().await;
        assert_eq!(report.dispatched, vec![id.clone()]);

        let job = h.queue.get_job(&id).unwrap();
        assert_eq!(job.status, JobStatus::Printing);
        assert_eq!(job.assigned_device.as_deref(), Some("printerX"));
    }

    #[tokio::test]
    async fn test_panicking_start_fails_claimed_job() {
        let h = harness();
        h.registry.register("fragile", Arc::new(PanicOnStart));
        let id = h.queue.submit(JobRequest::new("a.gcode"));

        let report = h.scheduler.tick().await;
        assert_eq!(report.failed, vec![id.clone()]);
        assert!(report.dispatched.is_empty());

        let job = h.queue.get_job(&id).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error.unwrap().contains("cannot open a.gcode"));
        assert!(h.scheduler.active_jobs().is_empty());
        assert_eq!(h.queue.summary().active(), 0);
        assert_eq!(h.events.recent_of_type(EventType::JobFailed, 1).len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_during_start_keeps_job_cancelled() {
        let h = harness();
        let printer = add_printer(&h, "voron");
        let hold = printer.hold_next_start();
        let first = h.queue.submit(JobRequest::new("a.gcode"));
        let second = h.queue.submit(JobRequest::new("b.gcode"));

        let (report, ()) = tokio::join!(h.scheduler.tick(), async {
            hold.entered().await;
            assert_eq!(h.queue.get_job(&first).unwrap().status, JobStatus::Starting);
            h.queue.cancel(&first).unwrap();
            hold.release();
        });

        assert!(report.dispatched.is_empty());
        assert!(report.failed.is_empty());
        assert_eq!(h.queue.get_job(&first).unwrap().status, JobStatus::Cancelled);
        assert!(h.scheduler.active_jobs().is_empty());
        assert!(h.events.recent_of_type(EventType::JobDispatched, 10).is_empty());
        assert_eq!(printer.phase(), PrinterPhase::Printing);

        // The device is still busy with the cancelled file.
        let report = h.scheduler.tick().await;
        assert!(report.dispatched.is_empty());
        assert_eq!(h.queue.get_job(&second).unwrap().status, JobStatus::Queued);
        assert_eq!(printer.started_files(), vec!["a.gcode".to_string()]);
    }
}
