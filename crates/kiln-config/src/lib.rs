//! # Kiln Config
//!
//! Layered configuration for the Kiln control plane: TOML files, `.env`,
//! and `KILN__`-prefixed environment variables, validated before use.

mod app_config;
mod loader;
mod validation;

pub use app_config::*;
pub use loader::*;
pub use validation::*;
