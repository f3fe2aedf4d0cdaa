//! # Kiln Server Library
//!
//! Component wiring and startup helpers for the Kiln control plane process.

pub mod control_plane;
pub mod startup;

pub use control_plane::{ControlPlane, EVENT_SOURCE};
