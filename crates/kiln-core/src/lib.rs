//! # Kiln Core
//!
//! Foundational types shared by every Kiln crate: the unified error type,
//! the observability event bus, and process-wide logging setup.

pub mod error;
pub mod events;
#[cfg(feature = "logging")]
pub mod logging;
pub mod result;

pub use error::*;
pub use events::{Event, EventBus, EventType, DEFAULT_EVENT_CAPACITY, DEFAULT_HISTORY_SIZE};
pub use result::*;
