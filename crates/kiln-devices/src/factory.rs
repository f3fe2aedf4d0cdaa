//! Builds adapters from configuration, keyed by protocol name.

use crate::adapter::DeviceAdapter;
use crate::{moonraker, octoprint, simulated};
use crate::{MoonrakerClient, OctoPrintClient, SimulatedPrinter};
use kiln_config::DeviceConfig;
use kiln_core::{KilnError, KilnResult};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Constructor for one protocol.
pub type AdapterConstructor =
    Arc<dyn Fn(&DeviceConfig) -> KilnResult<Arc<dyn DeviceAdapter>> + Send + Sync>;

/// Registry of adapter constructors.
///
/// Protocols without a bundled client (MQTT brokers, vendor clouds) are
/// added with [`AdapterFactory::register`].
#[derive(Clone, Default)]
pub struct AdapterFactory {
    constructors: HashMap<String, AdapterConstructor>,
}

impl AdapterFactory {
    /// An empty factory.
    pub fn new() -> Self {
        Self::default()
    }

    /// A factory that knows the bundled protocols.
    pub fn with_builtin() -> Self {
        let mut factory = Self::new();
        factory.register(octoprint::PROTOCOL, |config| {
            Ok(Arc::new(OctoPrintClient::from_config(config)?) as Arc<dyn DeviceAdapter>)
        });
        factory.register(moonraker::PROTOCOL, |config| {
            Ok(Arc::new(MoonrakerClient::from_config(config)?) as Arc<dyn DeviceAdapter>)
        });
        factory.register(simulated::PROTOCOL, |config| {
            Ok(Arc::new(SimulatedPrinter::new(&config.name)) as Arc<dyn DeviceAdapter>)
        });
        factory
    }

    /// Adds or replaces the constructor for `protocol`.
    pub fn register<F>(&mut self, protocol: impl Into<String>, constructor: F)
    where
        F: Fn(&DeviceConfig) -> KilnResult<Arc<dyn DeviceAdapter>> + Send + Sync + 'static,
    {
        self.constructors
            .insert(protocol.into().to_lowercase(), Arc::new(constructor));
    }

    /// Known protocol names, sorted.
    pub fn protocols(&self) -> Vec<String> {
        let mut protocols: Vec<String> = self.constructors.keys().cloned().collect();
        protocols.sort();
        protocols
    }

    /// Builds the adapter described by `config`.
    pub fn build(&self, config: &DeviceConfig) -> KilnResult<Arc<dyn DeviceAdapter>> {
        let protocol = config.protocol.to_lowercase();
        let constructor = self.constructors.get(&protocol).ok_or_else(|| {
            KilnError::Configuration(format!(
                "Unknown protocol '{}' for device '{}' (known: {})",
                config.protocol,
                config.name,
                self.protocols().join(", ")
            ))
        })?;

        debug!(device = %config.name, protocol = %protocol, "Building device adapter");
        constructor(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_protocols() {
        let factory = AdapterFactory::with_builtin();
        assert_eq!(
            factory.protocols(),
            vec!["moonraker".to_string(), "octoprint".to_string(), "simulated".to_string()]
        );
    }

    #[test]
    fn test_build_simulated() {
        let factory = AdapterFactory::with_builtin();
        let adapter = factory.build(&DeviceConfig::new("bench", "Simulated")).unwrap();
        assert_eq!(adapter.name(), "bench");
        assert_eq!(adapter.capabilities().protocol, "simulated");
    }

    #[test]
    fn test_build_octoprint_from_host() {
        let factory = AdapterFactory::with_builtin();
        let config = DeviceConfig::new("mk4", "octoprint")
            .with_host("http://mk4.local")
            .with_api_key("secret");
        let adapter = factory.build(&config).unwrap();
        assert_eq!(adapter.capabilities().protocol, "octoprint");
    }

    #[test]
    fn test_unknown_protocol() {
        let factory = AdapterFactory::with_builtin();
        let err = factory
            .build(&DeviceConfig::new("x1", "bambu"))
            .err()
            .unwrap();
        assert!(matches!(err, KilnError::Configuration(msg) if msg.contains("bambu")));
    }

    #[test]
    fn test_custom_protocol() {
        let mut factory = AdapterFactory::new();
        factory.register("mqtt", |config| {
            Ok(Arc::new(SimulatedPrinter::new(format!("mqtt-{}", config.name))) as Arc<dyn DeviceAdapter>)
        });

        let adapter = factory.build(&DeviceConfig::new("a1", "mqtt")).unwrap();
        assert_eq!(adapter.name(), "mqtt-a1");
    }
}
