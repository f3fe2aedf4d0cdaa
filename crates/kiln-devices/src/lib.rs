//! # Kiln Devices
//!
//! Uniform access to physical fabrication devices.
//!
//! Every protocol client implements [`DeviceAdapter`]. Adapters are built
//! from configuration by an [`AdapterFactory`] keyed on protocol name and
//! owned by a [`DeviceRegistry`], which enumerates idle devices by polling
//! each one live. Nothing here caches device state.
//!
//! Bundled protocols:
//!
//! - `octoprint` - [`OctoPrintClient`], REST polling with `X-Api-Key`
//! - `moonraker` - [`MoonrakerClient`], Klipper's Moonraker REST API
//! - `simulated` - [`SimulatedPrinter`], scriptable in-memory device

pub mod adapter;
pub mod error;
pub mod factory;
mod http;
pub mod moonraker;
pub mod octoprint;
pub mod registry;
pub mod simulated;
pub mod types;

pub use adapter::{guarded_call, DeviceAdapter};
pub use error::{panic_message, DeviceError, DeviceErrorKind, DeviceResult};
pub use factory::{AdapterConstructor, AdapterFactory};
pub use moonraker::MoonrakerClient;
pub use octoprint::OctoPrintClient;
pub use registry::{DeviceRegistry, DeviceStatus, DEFAULT_POLL_TIMEOUT};
pub use simulated::{SimulatedPrinter, StartHold};
pub use types::{BuildVolume, CommandAck, DeviceCapabilities, DeviceState, JobProgress, PrinterPhase};
