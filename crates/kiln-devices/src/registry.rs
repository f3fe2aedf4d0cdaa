//! Device registry for tracking connected devices.
//!
//! Maps logical names to adapters. The registry caches no device state:
//! every query that needs state polls the devices live, outside the lock.

use crate::adapter::{guarded_call, DeviceAdapter};
use crate::error::{DeviceError, DeviceResult};
use crate::types::DeviceState;
use futures::future::join_all;
use kiln_core::{KilnError, KilnResult};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default upper bound on a single `get_state` poll.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of polling one device.
#[derive(Debug, Clone)]
pub struct DeviceStatus {
    /// Registered name.
    pub name: String,
    /// Live state, or why it could not be read.
    pub state: DeviceResult<DeviceState>,
}

/// Registry of device adapters keyed by logical name.
pub struct DeviceRegistry {
    /// Registered adapters by name.
    devices: RwLock<HashMap<String, Arc<dyn DeviceAdapter>>>,
    /// Upper bound on each state poll.
    poll_timeout: Duration,
    /// Counter for total registrations.
    registration_count: AtomicU64,
}

impl DeviceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::with_poll_timeout(DEFAULT_POLL_TIMEOUT)
    }

    /// Create an empty registry with a custom poll timeout.
    pub fn with_poll_timeout(poll_timeout: Duration) -> Self {
        Self {
            devices: RwLock::new(HashMap::new()),
            poll_timeout,
            registration_count: AtomicU64::new(0),
        }
    }

    /// Register a device, replacing any previous entry with the same name.
    ///
    /// Returns true if an existing entry was replaced.
    pub fn register(&self, name: impl Into<String>, adapter: Arc<dyn DeviceAdapter>) -> bool {
        let name = name.into();
        let protocol = adapter.capabilities().protocol;
        let seq = self.registration_count.fetch_add(1, Ordering::Relaxed) + 1;

        let replaced = self.devices.write().insert(name.clone(), adapter).is_some();

        info!(
            device = %name,
            protocol = %protocol,
            replaced,
            registration_seq = seq,
            "Device registered"
        );

        replaced
    }

    /// Unregister a device.
    pub fn unregister(&self, name: &str) -> bool {
        let removed = self.devices.write().remove(name).is_some();
        if removed {
            info!(device = %name, "Device unregistered");
        }
        removed
    }

    /// Look up an adapter by name.
    pub fn get(&self, name: &str) -> KilnResult<Arc<dyn DeviceAdapter>> {
        self.devices
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| KilnError::not_found("Device", name))
    }

    /// Check if a device is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.devices.read().contains_key(name)
    }

    /// Registered names, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.devices.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered devices.
    pub fn len(&self) -> usize {
        self.devices.read().len()
    }

    /// True when no device is registered.
    pub fn is_empty(&self) -> bool {
        self.devices.read().is_empty()
    }

    /// Per-poll timeout.
    pub fn poll_timeout(&self) -> Duration {
        self.poll_timeout
    }

    fn snapshot(&self) -> Vec<(String, Arc<dyn DeviceAdapter>)> {
        let mut entries: Vec<_> = self
            .devices
            .read()
            .iter()
            .map(|(name, adapter)| (name.clone(), Arc::clone(adapter)))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// Poll one adapter, bounded by the registry's timeout.
    ///
    /// A panicking adapter yields a `Protocol` error for that device only.
    pub async fn poll_state(&self, name: &str, adapter: &dyn DeviceAdapter) -> DeviceResult<DeviceState> {
        match tokio::time::timeout(self.poll_timeout, guarded_call(name, adapter.get_state())).await {
            Ok(result) => result,
            Err(_) => Err(DeviceError::timeout(
                name,
                format!("State poll timed out after {:?}", self.poll_timeout),
            )),
        }
    }

    /// Poll every registered device concurrently.
    ///
    /// The membership snapshot is taken once; devices registered or removed
    /// while polling are not reflected in the result.
    pub async fn status_all(&self) -> Vec<DeviceStatus> {
        let entries = self.snapshot();
        let polls = entries.iter().map(|(name, adapter)| async move {
            DeviceStatus {
                name: name.clone(),
                state: self.poll_state(name, adapter.as_ref()).await,
            }
        });
        join_all(polls).await
    }

    /// Devices currently reporting Idle, sorted by name.
    ///
    /// Devices that fail to answer are skipped and logged.
    pub async fn get_idle_printers(&self) -> Vec<(String, Arc<dyn DeviceAdapter>)> {
        let entries = self.snapshot();
        let polls = entries.iter().map(|(name, adapter)| async move {
            self.poll_state(name, adapter.as_ref()).await
        });
        let states = join_all(polls).await;

        entries
            .into_iter()
            .zip(states)
            .filter_map(|((name, adapter), state)| match state {
                Ok(state) if state.is_idle() => Some((name, adapter)),
                Ok(state) => {
                    debug!(device = %name, phase = %state.phase, "Device not idle");
                    None
                }
                Err(e) => {
                    warn!(device = %name, error = %e, "Device state poll failed");
                    None
                }
            })
            .collect()
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
