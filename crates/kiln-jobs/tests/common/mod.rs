//! Shared wiring for scheduler integration tests.

use kiln_core::EventBus;
use kiln_devices::{DeviceRegistry, SimulatedPrinter};
use kiln_jobs::{JobQueue, JobScheduler, SchedulerConfig};
use std::sync::Arc;
use std::time::Duration;

/// Queue, registry, bus and scheduler wired together over simulated printers.
pub struct TestPlant {
    pub queue: Arc<JobQueue>,
    pub registry: Arc<DeviceRegistry>,
    pub events: Arc<EventBus>,
    pub scheduler: Arc<JobScheduler>,
}

impl TestPlant {
    pub fn new() -> Self {
        let queue = Arc::new(JobQueue::new());
        let registry = Arc::new(DeviceRegistry::with_poll_timeout(Duration::from_secs(1)));
        let events = Arc::new(EventBus::default());
        let scheduler = Arc::new(JobScheduler::new(
            Arc::clone(&queue),
            Arc::clone(&registry),
            Arc::clone(&events),
            SchedulerConfig::default().with_poll_interval(Duration::from_millis(25)),
        ));

        Self {
            queue,
            registry,
            events,
            scheduler,
        }
    }

    /// Registers an idle simulated printer and returns a handle for scripting it.
    pub fn add_printer(&self, name: &str) -> Arc<SimulatedPrinter> {
        let printer = Arc::new(SimulatedPrinter::new(name));
        self.registry.register(name, printer.clone());
        printer
    }
}
